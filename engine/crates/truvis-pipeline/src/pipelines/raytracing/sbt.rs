use std::rc::Rc;

use ash::vk;

use crate::error::{PipelineError, Result};
use crate::foundation::device::PipelineDevice;

pub(crate) mod helper {
    /// `align` 必须是 2 的幂
    #[inline]
    pub fn align_up(x: u32, align: u32) -> u32 {
        (x + (align - 1)) & !(align - 1)
    }
}

/// SBT 中每个 region 引用的 shader group index
///
/// raygen 只有一个 record，其他 region 中 record 的顺序即 shader 中使用的 index
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GfxSbtLayout {
    pub raygen: Option<u32>,
    pub miss: Vec<u32>,
    pub hit: Vec<u32>,
    pub callable: Vec<u32>,
}
impl GfxSbtLayout {
    /// 所有 record 引用的 shader group 都需要存在
    pub fn validate(&self, group_count: u32) -> Result<u32> {
        let raygen = self.raygen.ok_or(PipelineError::MissingRayGenRecord)?;

        let all_groups = std::iter::once(&raygen).chain(&self.miss).chain(&self.hit).chain(&self.callable);
        if let Some(&index) = all_groups.into_iter().find(|index| **index >= group_count) {
            return Err(PipelineError::InvalidShaderGroupIndex {
                index,
                count: group_count,
            });
        }

        Ok(raygen)
    }
}

/// SBT 中各个 region 的大小，不包含地址
///
/// - 每个 record 的大小为 handle size 按照 handle alignment 对齐
/// - 每个 region 的起始位置都需要按照 base alignment 对齐
/// - raygen region 只有一个 record，它的 stride 和 size 相等
/// - region 的顺序为 raygen, miss, hit, callable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GfxSbtRegionLayout {
    pub handle_size: u32,
    pub handle_stride: u32,
    pub base_alignment: u32,

    pub raygen_size: u32,
    pub miss_size: u32,
    pub hit_size: u32,
    pub callable_size: u32,
}
impl GfxSbtRegionLayout {
    pub fn new(
        rt_pipeline_props: &vk::PhysicalDeviceRayTracingPipelinePropertiesKHR,
        miss_count: u32,
        hit_count: u32,
        callable_count: u32,
    ) -> Self {
        let base_alignment = rt_pipeline_props.shader_group_base_alignment;

        // 因为不需要 user data，所以可以直接使用 shader group handle size
        let handle_stride = helper::align_up(
            rt_pipeline_props.shader_group_handle_size,
            rt_pipeline_props.shader_group_handle_alignment,
        );

        // 每一个 region 需要使用 base align 进行对齐
        let region_size = |count: u32| helper::align_up(count * handle_stride, base_alignment);

        Self {
            handle_size: rt_pipeline_props.shader_group_handle_size,
            handle_stride,
            base_alignment,

            raygen_size: helper::align_up(handle_stride, base_alignment),
            miss_size: region_size(miss_count),
            hit_size: region_size(hit_count),
            callable_size: region_size(callable_count),
        }
    }

    #[inline]
    pub fn miss_offset(&self) -> u32 {
        self.raygen_size
    }

    #[inline]
    pub fn hit_offset(&self) -> u32 {
        self.miss_offset() + self.miss_size
    }

    #[inline]
    pub fn callable_offset(&self) -> u32 {
        self.hit_offset() + self.hit_size
    }

    #[inline]
    pub fn total_size(&self) -> u32 {
        self.callable_offset() + self.callable_size
    }

    /// 空的 region 地址为 0
    fn region(
        base_address: vk::DeviceAddress,
        offset: u32,
        size: u32,
        stride: u32,
    ) -> vk::StridedDeviceAddressRegionKHR {
        if size == 0 {
            return vk::StridedDeviceAddressRegionKHR::default();
        }
        vk::StridedDeviceAddressRegionKHR::default()
            .device_address(base_address + offset as vk::DeviceAddress)
            .stride(stride as vk::DeviceSize)
            .size(size as vk::DeviceSize)
    }
}

/// ray tracing pipeline 使用的 shader binding table
///
/// 持有 SBT buffer，需要在 pipeline 之前销毁
pub struct GfxShaderBindingTable {
    buffer: vk::Buffer,
    region_layout: GfxSbtRegionLayout,

    raygen_region: vk::StridedDeviceAddressRegionKHR,
    miss_region: vk::StridedDeviceAddressRegionKHR,
    hit_region: vk::StridedDeviceAddressRegionKHR,
    callable_region: vk::StridedDeviceAddressRegionKHR,

    device: Rc<dyn PipelineDevice>,
}
impl GfxShaderBindingTable {
    /// 从 pipeline 中获取 shader group 的 handle，并按照 `layout` 写入到 SBT 中
    pub fn new(
        device: Rc<dyn PipelineDevice>,
        pipeline: vk::Pipeline,
        group_count: u32,
        layout: &GfxSbtLayout,
        debug_name: &str,
    ) -> Result<Self> {
        let raygen = layout.validate(group_count)?;

        let rt_pipeline_props = device.rt_pipeline_properties();
        let region_layout = GfxSbtRegionLayout::new(
            &rt_pipeline_props,
            layout.miss.len() as u32,
            layout.hit.len() as u32,
            layout.callable.len() as u32,
        );

        let handle_size = region_layout.handle_size as usize;
        let handle_stride = region_layout.handle_stride as usize;
        let shader_group_handle_data = device.get_ray_tracing_shader_group_handles(
            pipeline,
            0,
            group_count,
            group_count as usize * handle_size,
        )?;

        // 先在 host 上组织好 SBT 的内容，再一次性上传
        let mut sbt_data = vec![0u8; region_layout.total_size() as usize];
        let mut copy_shader_group_handle = |group_handle_idx: u32, dst_offset: usize| {
            let start_bytes = group_handle_idx as usize * handle_size;
            sbt_data[dst_offset..dst_offset + handle_size]
                .copy_from_slice(&shader_group_handle_data[start_bytes..start_bytes + handle_size]);
        };

        copy_shader_group_handle(raygen, 0);
        for (region_offset, groups) in [
            (region_layout.miss_offset(), &layout.miss),
            (region_layout.hit_offset(), &layout.hit),
            (region_layout.callable_offset(), &layout.callable),
        ] {
            for (idx, group_handle_idx) in groups.iter().enumerate() {
                copy_shader_group_handle(*group_handle_idx, region_offset as usize + idx * handle_stride);
            }
        }

        let sbt_alloc = device.create_sbt_buffer(
            &sbt_data,
            region_layout.base_alignment as vk::DeviceSize,
            &format!("{debug_name}-sbt"),
        )?;
        let sbt_address = sbt_alloc.device_address;

        log::info!(
            "create sbt {}: raygen {}, miss {}x{}, hit {}x{}, callable {}x{}, {} bytes",
            debug_name,
            raygen,
            layout.miss.len(),
            region_layout.handle_stride,
            layout.hit.len(),
            region_layout.handle_stride,
            layout.callable.len(),
            region_layout.handle_stride,
            region_layout.total_size()
        );

        Ok(Self {
            buffer: sbt_alloc.buffer,
            region_layout,

            // raygen 的 stride 需要和 size 一样
            raygen_region: GfxSbtRegionLayout::region(
                sbt_address,
                0,
                region_layout.raygen_size,
                region_layout.raygen_size,
            ),
            miss_region: GfxSbtRegionLayout::region(
                sbt_address,
                region_layout.miss_offset(),
                region_layout.miss_size,
                region_layout.handle_stride,
            ),
            hit_region: GfxSbtRegionLayout::region(
                sbt_address,
                region_layout.hit_offset(),
                region_layout.hit_size,
                region_layout.handle_stride,
            ),
            callable_region: GfxSbtRegionLayout::region(
                sbt_address,
                region_layout.callable_offset(),
                region_layout.callable_size,
                region_layout.handle_stride,
            ),

            device,
        })
    }

    pub fn destroy(&mut self) {
        if self.buffer == vk::Buffer::null() {
            return;
        }
        log::info!("destroy sbt buffer {:?}", self.buffer);
        self.device.destroy_sbt_buffer(self.buffer);
        self.buffer = vk::Buffer::null();

        self.raygen_region = Default::default();
        self.miss_region = Default::default();
        self.hit_region = Default::default();
        self.callable_region = Default::default();
    }
}
// getters
impl GfxShaderBindingTable {
    #[inline]
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn region_layout(&self) -> &GfxSbtRegionLayout {
        &self.region_layout
    }

    #[inline]
    pub fn raygen_region(&self) -> &vk::StridedDeviceAddressRegionKHR {
        &self.raygen_region
    }

    #[inline]
    pub fn miss_region(&self) -> &vk::StridedDeviceAddressRegionKHR {
        &self.miss_region
    }

    #[inline]
    pub fn hit_region(&self) -> &vk::StridedDeviceAddressRegionKHR {
        &self.hit_region
    }

    #[inline]
    pub fn callable_region(&self) -> &vk::StridedDeviceAddressRegionKHR {
        &self.callable_region
    }
}
impl Drop for GfxShaderBindingTable {
    fn drop(&mut self) {
        self.destroy();
    }
}
