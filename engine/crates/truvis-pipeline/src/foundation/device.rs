use ash::{prelude::VkResult, vk};

use crate::pipelines::pipeline_cache::GfxPipelineCacheHeader;

/// 上传完成的 shader binding table buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxSbtBufferAlloc {
    pub buffer: vk::Buffer,
    pub device_address: vk::DeviceAddress,
}

/// pipeline 层所依赖的设备接口
///
/// 所有 native 对象的创建与销毁都经过这里。pipeline 对象持有 `Rc<dyn PipelineDevice>`，
/// 因此设备的生命周期一定长于 pipeline。
///
/// 真实的实现是 [`crate::foundation::gfx_device::GfxDevice`]，测试中使用记录调用的 fake device。
pub trait PipelineDevice {
    fn physical_device_properties(&self) -> vk::PhysicalDeviceProperties;

    fn rt_pipeline_properties(&self) -> vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static>;

    fn create_pipeline_layout(&self, create_info: &vk::PipelineLayoutCreateInfo) -> VkResult<vk::PipelineLayout>;

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline>;

    fn create_compute_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::ComputePipelineCreateInfo,
    ) -> VkResult<vk::Pipeline>;

    fn create_ray_tracing_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::RayTracingPipelineCreateInfoKHR,
    ) -> VkResult<vk::Pipeline>;

    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// 连续 `group_count` 个 shader group 的 handle，总大小为 `data_size` 字节
    fn get_ray_tracing_shader_group_handles(
        &self,
        pipeline: vk::Pipeline,
        first_group: u32,
        group_count: u32,
        data_size: usize,
    ) -> VkResult<Vec<u8>>;

    /// 创建 SBT buffer，并将 `data` 写入其中
    ///
    /// buffer 的起始地址需要按照 `alignment` 对齐
    fn create_sbt_buffer(
        &self,
        data: &[u8],
        alignment: vk::DeviceSize,
        debug_name: &str,
    ) -> VkResult<GfxSbtBufferAlloc>;

    fn destroy_sbt_buffer(&self, buffer: vk::Buffer);

    /// `initial_data` 为空表示创建一个空的 cache
    fn create_pipeline_cache(&self, initial_data: &[u8]) -> VkResult<vk::PipelineCache>;

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache);

    fn get_pipeline_cache_data(&self, cache: vk::PipelineCache) -> VkResult<Vec<u8>>;

    fn merge_pipeline_caches(&self, dst: vk::PipelineCache, src: &[vk::PipelineCache]) -> VkResult<()>;

    /// 持久化的 pipeline cache 是否可以被当前的 driver 使用
    ///
    /// pipeline cache uuid 中编码了 driver 的版本信息
    fn is_pipeline_cache_valid(&self, header: &GfxPipelineCacheHeader) -> bool {
        let props = self.physical_device_properties();
        header.header_size as usize >= size_of::<GfxPipelineCacheHeader>()
            && header.header_version == vk::PipelineCacheHeaderVersion::ONE.as_raw() as u32
            && header.vendor_id == props.vendor_id
            && header.device_id == props.device_id
            && header.pipeline_cache_uuid == props.pipeline_cache_uuid
    }

    fn set_object_debug_name(&self, _object_type: vk::ObjectType, _raw_handle: u64, _name: &str) {}
}
