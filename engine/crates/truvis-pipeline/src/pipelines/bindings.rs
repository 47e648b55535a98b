use ash::vk;

use crate::commands::command_recorder::GfxCommandRecorder;
use crate::error::Result;
use crate::pipelines::push_constant::{GfxPushConstant, GfxPushConstantRanges};

/// 每次 draw / dispatch / trace 时传入的资源绑定
#[derive(Debug, Clone, Copy, Default)]
pub struct GfxPipelineBindings<'a> {
    pub first_set: u32,
    pub descriptor_sets: &'a [vk::DescriptorSet],
    pub dynamic_offsets: &'a [u32],
    /// 按照给定的顺序 push，与创建 layout 时的顺序无关
    pub push_constants: &'a [GfxPushConstant<'a>],
}
// builder
impl<'a> GfxPipelineBindings<'a> {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn descriptor_sets(mut self, first_set: u32, sets: &'a [vk::DescriptorSet], dynamic_offsets: &'a [u32]) -> Self {
        self.first_set = first_set;
        self.descriptor_sets = sets;
        self.dynamic_offsets = dynamic_offsets;
        self
    }

    #[inline]
    pub fn push_constants(mut self, push_constants: &'a [GfxPushConstant<'a>]) -> Self {
        self.push_constants = push_constants;
        self
    }
}
impl GfxPipelineBindings<'_> {
    #[inline]
    pub(crate) fn validate(&self, declared: &GfxPushConstantRanges) -> Result<()> {
        declared.validate(self.push_constants)
    }

    /// 绑定 descriptor sets 并 push 所有的 push constants
    pub(crate) fn record(
        &self,
        cmd: &dyn GfxCommandRecorder,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
    ) {
        if !self.descriptor_sets.is_empty() {
            cmd.cmd_bind_descriptor_sets(bind_point, layout, self.first_set, self.descriptor_sets, self.dynamic_offsets);
        }
        for push_constant in self.push_constants {
            cmd.cmd_push_constants(layout, push_constant.stage, push_constant.offset, push_constant.data);
        }
    }
}
