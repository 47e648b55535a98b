use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;

use crate::commands::command_recorder::GfxCommandRecorder;
use crate::error::{PipelineError, Result};
use crate::foundation::debug::{DebugType, set_debug_name};
use crate::foundation::device::PipelineDevice;
use crate::pipelines::bindings::GfxPipelineBindings;
use crate::pipelines::pipeline_objects::GfxPipelineObjects;
use crate::pipelines::push_constant::GfxPushConstantRanges;
use crate::pipelines::shader::GfxShaderStageInfo;

#[derive(Clone, Debug, Default)]
pub struct GfxComputePipelineCreateInfo {
    shader_stage: Option<GfxShaderStageInfo>,
    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_ranges: GfxPushConstantRanges,
    pipeline_cache: vk::PipelineCache,
}
// builder
impl GfxComputePipelineCreateInfo {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    #[inline]
    pub fn shader_stage(&mut self, module: vk::ShaderModule, entry_point: &'static CStr) -> &mut Self {
        self.shader_stage = Some(GfxShaderStageInfo::new(vk::ShaderStageFlags::COMPUTE, module, entry_point));
        self
    }

    /// builder
    #[inline]
    pub fn add_descriptor_set_layout(&mut self, layout: vk::DescriptorSetLayout) -> &mut Self {
        self.descriptor_set_layouts.push(layout);
        self
    }

    /// builder
    #[inline]
    pub fn add_push_constant(&mut self, stage: vk::ShaderStageFlags, offset: u32, size: u32) -> &mut Self {
        self.push_constant_ranges.add_range(stage, offset, size);
        self
    }

    /// 参数类型 `P` 作为整个 push constant，从 offset 0 开始
    #[inline]
    pub fn push_constant_of<P: bytemuck::Pod>(&mut self) -> &mut Self {
        self.add_push_constant(vk::ShaderStageFlags::COMPUTE, 0, size_of::<P>() as u32)
    }

    /// builder
    #[inline]
    pub fn pipeline_cache(&mut self, cache: vk::PipelineCache) -> &mut Self {
        self.pipeline_cache = cache;
        self
    }
}

pub struct GfxComputePipeline {
    objects: Option<GfxPipelineObjects>,
    push_constant_ranges: GfxPushConstantRanges,

    device: Rc<dyn PipelineDevice>,
}
impl GfxComputePipeline {
    pub fn new(
        device: Rc<dyn PipelineDevice>,
        create_info: &GfxComputePipelineCreateInfo,
        debug_name: &str,
    ) -> Result<Self> {
        let shader_stage = create_info.shader_stage.ok_or(PipelineError::MissingComputeShader)?;
        let stage_info = shader_stage.stage_create_info();

        let objects = GfxPipelineObjects::create(
            device.as_ref(),
            &create_info.descriptor_set_layouts,
            create_info.push_constant_ranges.ranges(),
            debug_name,
            |layout| {
                let pipeline_ci = vk::ComputePipelineCreateInfo::default().stage(stage_info).layout(layout);
                device.create_compute_pipeline(create_info.pipeline_cache, &pipeline_ci)
            },
        )?;

        let pipeline = Self {
            objects: Some(objects),
            push_constant_ranges: create_info.push_constant_ranges.clone(),
            device,
        };
        set_debug_name(pipeline.device.as_ref(), &pipeline, debug_name);
        log::info!("create compute pipeline: {}", debug_name);

        Ok(pipeline)
    }

    /// bind pipeline, descriptor sets, push constants，然后 dispatch
    pub fn dispatch(
        &self,
        cmd: &dyn GfxCommandRecorder,
        bindings: &GfxPipelineBindings,
        group_count: glam::UVec3,
    ) -> Result<()> {
        let objects = self.objects.ok_or(PipelineError::PipelineDestroyed)?;
        bindings.validate(&self.push_constant_ranges)?;

        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::COMPUTE, objects.pipeline);
        bindings.record(cmd, vk::PipelineBindPoint::COMPUTE, objects.layout);

        // 执行计算
        cmd.cmd_dispatch(group_count);
        Ok(())
    }

    pub fn destroy(&mut self) {
        if let Some(objects) = self.objects.take() {
            objects.destroy(self.device.as_ref());
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.objects.map_or(vk::Pipeline::null(), |objects| objects.pipeline)
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.objects.map_or(vk::PipelineLayout::null(), |objects| objects.layout)
    }
}
impl Drop for GfxComputePipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}
impl DebugType for GfxComputePipeline {
    fn debug_type_name() -> &'static str {
        "GfxComputePipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle()
    }
}
