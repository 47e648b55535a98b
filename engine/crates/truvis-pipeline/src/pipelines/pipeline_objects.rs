use ash::{prelude::VkResult, vk};

use crate::error::Result;
use crate::foundation::debug::set_handle_debug_name;
use crate::foundation::device::PipelineDevice;

/// 一个 pipeline 独占的 native 对象：pipeline 以及它的 layout
///
/// 两者同时创建，同时销毁；销毁时先 pipeline 再 layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GfxPipelineObjects {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}
impl GfxPipelineObjects {
    /// 先创建 layout，再通过 `create_pipeline` 创建 pipeline
    ///
    /// pipeline 创建失败时会销毁已经创建的 layout
    pub fn create(
        device: &dyn PipelineDevice,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        debug_name: &str,
        create_pipeline: impl FnOnce(vk::PipelineLayout) -> VkResult<vk::Pipeline>,
    ) -> Result<Self> {
        let pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let layout = device.create_pipeline_layout(&pipeline_layout_ci)?;
        set_handle_debug_name(device, layout, format!("GfxPipelineLayout::{debug_name}"));

        let pipeline = match create_pipeline(layout) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                log::error!("failed to create pipeline {}: {:?}", debug_name, err);
                device.destroy_pipeline_layout(layout);
                return Err(err.into());
            }
        };

        Ok(Self { pipeline, layout })
    }

    pub fn destroy(self, device: &dyn PipelineDevice) {
        device.destroy_pipeline(self.pipeline);
        device.destroy_pipeline_layout(self.layout);
    }
}
