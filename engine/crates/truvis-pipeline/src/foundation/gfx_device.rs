use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr::null_mut;

use ash::{prelude::VkResult, vk};
use vk_mem::Alloc;

use crate::foundation::device::{GfxSbtBufferAlloc, PipelineDevice};
use crate::settings::GfxPipelineSettings;

/// 基于 ash 的 [`PipelineDevice`] 实现
///
/// 不负责创建 `ash::Device`，只是在已有的 device 上加载 pipeline 相关的扩展函数，
/// 并查询 physical device 的属性。
///
/// # 扩展支持
/// - Ray Tracing Pipeline (KHR)
/// - Mesh Shader (EXT)
/// - Debug Utils (EXT)，可以通过 settings 关闭
pub struct GfxDevice {
    pub(crate) device: ash::Device,
    pub(crate) ray_tracing_pipeline: ash::khr::ray_tracing_pipeline::Device,
    pub(crate) mesh_shader: ash::ext::mesh_shader::Device,
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,

    basic_props: vk::PhysicalDeviceProperties,
    rt_pipeline_props: vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static>,

    /// 只用于 SBT buffer 的分配
    vm_allocator: vk_mem::Allocator,
    sbt_allocations: RefCell<HashMap<vk::Buffer, vk_mem::Allocation>>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        device: ash::Device,
        settings: &GfxPipelineSettings,
    ) -> VkResult<Self> {
        let (basic_props, rt_pipeline_props) = unsafe {
            let mut pdevice_raytracing_props = vk::PhysicalDeviceRayTracingPipelinePropertiesKHR::default();
            let mut pdevice_props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut pdevice_raytracing_props);
            instance.get_physical_device_properties2(pdevice, &mut pdevice_props2);

            let basic_props = pdevice_props2.properties;
            log::info!("pipeline device: {:?}", CStr::from_ptr(basic_props.device_name.as_ptr()));

            pdevice_raytracing_props.p_next = null_mut();
            log::debug!("ray tracing pipeline props:\n{:#?}", pdevice_raytracing_props);
            (basic_props, pdevice_raytracing_props)
        };

        // 由于 vma 需要引用 Instance 以及 Device，需要在 device 创建完成之后再初始化
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, &device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;
        vma_ci.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;
        let vm_allocator = unsafe { vk_mem::Allocator::new(vma_ci)? };

        let debug_utils = settings.debug_names.then(|| ash::ext::debug_utils::Device::new(instance, &device));

        Ok(Self {
            ray_tracing_pipeline: ash::khr::ray_tracing_pipeline::Device::new(instance, &device),
            mesh_shader: ash::ext::mesh_shader::Device::new(instance, &device),
            debug_utils,
            device,
            basic_props,
            rt_pipeline_props,
            vm_allocator,
            sbt_allocations: RefCell::new(HashMap::new()),
        })
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }
}

impl PipelineDevice for GfxDevice {
    #[inline]
    fn physical_device_properties(&self) -> vk::PhysicalDeviceProperties {
        self.basic_props
    }

    #[inline]
    fn rt_pipeline_properties(&self) -> vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static> {
        self.rt_pipeline_props
    }

    fn create_pipeline_layout(&self, create_info: &vk::PipelineLayoutCreateInfo) -> VkResult<vk::PipelineLayout> {
        unsafe { self.device.create_pipeline_layout(create_info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(cache, std::slice::from_ref(create_info), None)
                .map_err(|(_, err)| err)?
        };
        Ok(pipelines[0])
    }

    fn create_compute_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::ComputePipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(cache, std::slice::from_ref(create_info), None)
                .map_err(|(_, err)| err)?
        };
        Ok(pipelines[0])
    }

    fn create_ray_tracing_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::RayTracingPipelineCreateInfoKHR,
    ) -> VkResult<vk::Pipeline> {
        let mut pipeline = vk::Pipeline::null();
        unsafe {
            (self.ray_tracing_pipeline.fp().create_ray_tracing_pipelines_khr)(
                self.device.handle(),
                vk::DeferredOperationKHR::null(),
                cache,
                1,
                create_info,
                std::ptr::null(),
                &mut pipeline,
            )
            .result()?;
        }
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn get_ray_tracing_shader_group_handles(
        &self,
        pipeline: vk::Pipeline,
        first_group: u32,
        group_count: u32,
        data_size: usize,
    ) -> VkResult<Vec<u8>> {
        unsafe {
            self.ray_tracing_pipeline.get_ray_tracing_shader_group_handles(
                pipeline,
                first_group,
                group_count,
                data_size,
            )
        }
    }

    fn create_sbt_buffer(
        &self,
        data: &[u8],
        alignment: vk::DeviceSize,
        debug_name: &str,
    ) -> VkResult<GfxSbtBufferAlloc> {
        let buffer_ci = vk::BufferCreateInfo::default().size(data.len() as vk::DeviceSize).usage(
            vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR
                | vk::BufferUsageFlags::TRANSFER_SRC
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        );
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
            ..Default::default()
        };

        unsafe {
            let (buffer, mut allocation) =
                self.vm_allocator.create_buffer_with_alignment(&buffer_ci, &alloc_ci, alignment)?;

            // SBT 只写入一次，写完之后就不需要保持 map
            let upload = (|| -> VkResult<()> {
                let mapped_ptr = self.vm_allocator.map_memory(&mut allocation)?;
                std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr, data.len());
                let flushed = self.vm_allocator.flush_allocation(&allocation, 0, data.len() as vk::DeviceSize);
                self.vm_allocator.unmap_memory(&mut allocation);
                flushed
            })();
            if let Err(err) = upload {
                self.vm_allocator.destroy_buffer(buffer, &mut allocation);
                return Err(err);
            }

            let device_address =
                self.device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer));

            self.set_object_debug_name(vk::ObjectType::BUFFER, vk::Handle::as_raw(buffer), debug_name);
            self.sbt_allocations.borrow_mut().insert(buffer, allocation);

            Ok(GfxSbtBufferAlloc {
                buffer,
                device_address,
            })
        }
    }

    fn destroy_sbt_buffer(&self, buffer: vk::Buffer) {
        match self.sbt_allocations.borrow_mut().remove(&buffer) {
            Some(mut allocation) => unsafe { self.vm_allocator.destroy_buffer(buffer, &mut allocation) },
            None => log::warn!("destroy unknown sbt buffer: {:?}", buffer),
        }
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> VkResult<vk::PipelineCache> {
        let pipeline_cache_ci = vk::PipelineCacheCreateInfo::default().initial_data(initial_data);
        unsafe { self.device.create_pipeline_cache(&pipeline_cache_ci, None) }
    }

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        unsafe { self.device.destroy_pipeline_cache(cache, None) }
    }

    fn get_pipeline_cache_data(&self, cache: vk::PipelineCache) -> VkResult<Vec<u8>> {
        unsafe { self.device.get_pipeline_cache_data(cache) }
    }

    fn merge_pipeline_caches(&self, dst: vk::PipelineCache, src: &[vk::PipelineCache]) -> VkResult<()> {
        unsafe { self.device.merge_pipeline_caches(dst, src) }
    }

    fn set_object_debug_name(&self, object_type: vk::ObjectType, raw_handle: u64, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            log::warn!("debug name contains nul byte: {}", name);
            return;
        };

        let name_info = vk::DebugUtilsObjectNameInfoEXT {
            object_type,
            object_handle: raw_handle,
            p_object_name: name.as_ptr(),
            ..Default::default()
        };
        if let Err(err) = unsafe { debug_utils.set_debug_utils_object_name(&name_info) } {
            log::warn!("failed to set debug name {:?}: {:?}", name, err);
        }
    }
}

impl Drop for GfxDevice {
    fn drop(&mut self) {
        let mut sbt_allocations = self.sbt_allocations.borrow_mut();
        if !sbt_allocations.is_empty() {
            log::warn!("{} sbt buffers are still alive when GfxDevice drops", sbt_allocations.len());
        }
        for (buffer, mut allocation) in sbt_allocations.drain() {
            unsafe { self.vm_allocator.destroy_buffer(buffer, &mut allocation) };
        }
    }
}
