use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::command_recorder::GfxCommandRecorder;
use crate::error::{PipelineError, Result};
use crate::foundation::debug::{DebugType, set_debug_name};
use crate::foundation::device::PipelineDevice;
use crate::pipelines::bindings::GfxPipelineBindings;
use crate::pipelines::pipeline_objects::GfxPipelineObjects;
use crate::pipelines::push_constant::GfxPushConstantRanges;
use crate::pipelines::raytracing::sbt::{GfxSbtLayout, GfxShaderBindingTable};
use crate::pipelines::shader::{GfxShaderGroupInfo, GfxShaderStageInfo};
use crate::settings::GfxPipelineSettings;

/// ray tracing pipeline 的 create info
///
/// shader stage 与 shader group 都按照添加的顺序编号：
/// - `add_shader` 返回 stage index，用于组成 shader group
/// - `*_shader_record` 返回 group index，同时将该 group 放入对应的 SBT region
pub struct GfxRtPipelineCreateInfo {
    shader_stages: Vec<GfxShaderStageInfo>,
    shader_groups: Vec<GfxShaderGroupInfo>,
    sbt_layout: GfxSbtLayout,

    /// 这个仅仅是用来分配栈内存的，并不会在超过递归深度后让调用被丢弃
    max_recursion: u32,

    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_ranges: GfxPushConstantRanges,
    pipeline_cache: vk::PipelineCache,
}
impl Default for GfxRtPipelineCreateInfo {
    fn default() -> Self {
        Self {
            shader_stages: vec![],
            shader_groups: vec![],
            sbt_layout: GfxSbtLayout::default(),
            max_recursion: GfxPipelineSettings::DEFAULT_MAX_RAY_RECURSION,
            descriptor_set_layouts: vec![],
            push_constant_ranges: GfxPushConstantRanges::new(),
            pipeline_cache: vk::PipelineCache::null(),
        }
    }
}
// builder
impl GfxRtPipelineCreateInfo {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回 stage index
    pub fn add_shader(&mut self, stage: GfxShaderStageInfo) -> u32 {
        self.shader_stages.push(stage);
        self.shader_stages.len() as u32 - 1
    }

    fn add_shader_group(&mut self, group: GfxShaderGroupInfo) -> u32 {
        self.shader_groups.push(group);
        self.shader_groups.len() as u32 - 1
    }

    /// SBT 中只有一个 raygen record，重复设置会替换 SBT 中的 record，
    /// 但之前的 shader group 仍然保留在 pipeline 中
    pub fn set_ray_generation_shader_record(&mut self, stage: u32) -> u32 {
        let group = self.add_shader_group(GfxShaderGroupInfo::general(stage));
        if let Some(prev) = self.sbt_layout.raygen.replace(group) {
            log::debug!("replace raygen record: group {} -> {}", prev, group);
        }
        group
    }

    pub fn add_miss_shader_record(&mut self, stage: u32) -> u32 {
        let group = self.add_shader_group(GfxShaderGroupInfo::general(stage));
        self.sbt_layout.miss.push(group);
        group
    }

    pub fn add_callable_shader_record(&mut self, stage: u32) -> u32 {
        let group = self.add_shader_group(GfxShaderGroupInfo::general(stage));
        self.sbt_layout.callable.push(group);
        group
    }

    pub fn add_triangle_hit_shader_record(&mut self, closest_hit: u32, any_hit: Option<u32>) -> u32 {
        let group = self.add_shader_group(GfxShaderGroupInfo::triangles_hit(closest_hit, any_hit));
        self.sbt_layout.hit.push(group);
        group
    }

    /// 用于 AABB 几何体，intersection shader 是必须的
    pub fn add_procedural_hit_shader_record(
        &mut self,
        intersection: u32,
        closest_hit: Option<u32>,
        any_hit: Option<u32>,
    ) -> u32 {
        let group = self.add_shader_group(GfxShaderGroupInfo::procedural_hit(intersection, closest_hit, any_hit));
        self.sbt_layout.hit.push(group);
        group
    }

    /// builder
    #[inline]
    pub fn set_max_recursion(&mut self, max_recursion: u32) -> &mut Self {
        self.max_recursion = max_recursion;
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

    /// builder
    #[inline]
    pub fn pipeline_cache(&mut self, cache: vk::PipelineCache) -> &mut Self {
        self.pipeline_cache = cache;
        self
    }

    pub fn apply_settings(&mut self, settings: &GfxPipelineSettings) -> &mut Self {
        self.max_recursion = settings.max_ray_recursion;
        self
    }
}
// getters
impl GfxRtPipelineCreateInfo {
    #[inline]
    pub fn shader_stages(&self) -> &[GfxShaderStageInfo] {
        &self.shader_stages
    }

    #[inline]
    pub fn shader_groups(&self) -> &[GfxShaderGroupInfo] {
        &self.shader_groups
    }

    #[inline]
    pub fn sbt_layout(&self) -> &GfxSbtLayout {
        &self.sbt_layout
    }

    #[inline]
    pub fn max_recursion(&self) -> u32 {
        self.max_recursion
    }

    /// shader group 引用的 stage 都需要存在
    fn validate_stage_indices(&self) -> Result<()> {
        let stage_count = self.shader_stages.len() as u32;
        match self.shader_groups.iter().flat_map(GfxShaderGroupInfo::referenced_stages).find(|idx| *idx >= stage_count) {
            Some(index) => Err(PipelineError::InvalidShaderStageIndex {
                index,
                count: stage_count,
            }),
            None => Ok(()),
        }
    }
}

pub struct GfxRtPipeline {
    /// 需要在 pipeline 之前销毁
    sbt: Option<GfxShaderBindingTable>,
    objects: Option<GfxPipelineObjects>,

    push_constant_ranges: GfxPushConstantRanges,

    device: Rc<dyn PipelineDevice>,
}
impl GfxRtPipeline {
    pub fn new(device: Rc<dyn PipelineDevice>, create_info: &GfxRtPipelineCreateInfo, debug_name: &str) -> Result<Self> {
        create_info.validate_stage_indices()?;
        let group_count = create_info.shader_groups.len() as u32;
        create_info.sbt_layout.validate(group_count)?;

        let max_recursion_limit = device.rt_pipeline_properties().max_ray_recursion_depth;
        let max_recursion = if create_info.max_recursion > max_recursion_limit {
            log::warn!(
                "max ray recursion {} exceeds device limit {}, clamped",
                create_info.max_recursion,
                max_recursion_limit
            );
            max_recursion_limit
        } else {
            create_info.max_recursion
        };

        let stage_infos = create_info.shader_stages.iter().map(GfxShaderStageInfo::stage_create_info).collect_vec();
        let shader_groups =
            create_info.shader_groups.iter().map(GfxShaderGroupInfo::group_create_info).collect_vec();

        let objects = GfxPipelineObjects::create(
            device.as_ref(),
            &create_info.descriptor_set_layouts,
            create_info.push_constant_ranges.ranges(),
            debug_name,
            |layout| {
                let pipeline_ci = vk::RayTracingPipelineCreateInfoKHR::default()
                    .stages(&stage_infos)
                    .groups(&shader_groups)
                    .layout(layout)
                    // 需要手动跟踪递归深度
                    .max_pipeline_ray_recursion_depth(max_recursion);
                device.create_ray_tracing_pipeline(create_info.pipeline_cache, &pipeline_ci)
            },
        )?;

        let sbt = match GfxShaderBindingTable::new(
            device.clone(),
            objects.pipeline,
            group_count,
            &create_info.sbt_layout,
            debug_name,
        ) {
            Ok(sbt) => sbt,
            Err(err) => {
                log::error!("failed to create sbt for {}: {}", debug_name, err);
                objects.destroy(device.as_ref());
                return Err(err);
            }
        };

        let pipeline = Self {
            sbt: Some(sbt),
            objects: Some(objects),
            push_constant_ranges: create_info.push_constant_ranges.clone(),
            device,
        };
        set_debug_name(pipeline.device.as_ref(), &pipeline, debug_name);
        log::info!(
            "create ray tracing pipeline: {}, {} stages, {} groups",
            debug_name,
            stage_infos.len(),
            group_count
        );

        Ok(pipeline)
    }

    /// bind pipeline, descriptor sets, push constants，然后 trace rays
    pub fn trace_rays(
        &self,
        cmd: &dyn GfxCommandRecorder,
        bindings: &GfxPipelineBindings,
        extent: glam::UVec3,
    ) -> Result<()> {
        let (Some(objects), Some(sbt)) = (self.objects, self.sbt.as_ref()) else {
            return Err(PipelineError::PipelineDestroyed);
        };
        bindings.validate(&self.push_constant_ranges)?;

        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::RAY_TRACING_KHR, objects.pipeline);
        bindings.record(cmd, vk::PipelineBindPoint::RAY_TRACING_KHR, objects.layout);
        cmd.cmd_trace_rays(sbt.raygen_region(), sbt.miss_region(), sbt.hit_region(), sbt.callable_region(), extent);
        Ok(())
    }

    /// 销毁顺序：SBT buffer, pipeline, pipeline layout
    pub fn destroy(&mut self) {
        if let Some(mut sbt) = self.sbt.take() {
            sbt.destroy();
        }
        if let Some(objects) = self.objects.take() {
            objects.destroy(self.device.as_ref());
        }
    }
}
// getters
impl GfxRtPipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.objects.map_or(vk::Pipeline::null(), |objects| objects.pipeline)
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.objects.map_or(vk::PipelineLayout::null(), |objects| objects.layout)
    }

    #[inline]
    pub fn sbt(&self) -> Option<&GfxShaderBindingTable> {
        self.sbt.as_ref()
    }
}
impl Drop for GfxRtPipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}
impl DebugType for GfxRtPipeline {
    fn debug_type_name() -> &'static str {
        "GfxRtPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle()
    }
}
