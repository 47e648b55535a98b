use std::borrow::Cow;
use std::ffi::CStr;
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
use crate::pipelines::render_pass::GfxRenderPassLayout;
use crate::pipelines::shader::GfxShaderStageInfo;
use crate::pipelines::vertex_layout::GfxVertexLayout;
use crate::settings::{GfxPipelineSettings, IndexedDrawPolicy};

/// pipeline 所绑定的 render pass 以及 subpass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxSubpassBinding {
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

pub struct GfxGraphicsPipelineCreateInfo {
    shader_stages: Vec<GfxShaderStageInfo>,

    vertex_binding_desc: Vec<vk::VertexInputBindingDescription>,
    vertex_attribute_desc: Vec<vk::VertexInputAttributeDescription>,

    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_ranges: GfxPushConstantRanges,

    pipeline_cache: vk::PipelineCache,

    primitive_topology: vk::PrimitiveTopology,

    rasterize_state_info: vk::PipelineRasterizationStateCreateInfo<'static>,

    /// 由 subpass 的第一个 color attachment 决定
    msaa_sample: vk::SampleCountFlags,
    min_sample_shading: f32,

    /// 和 subpass 的 color attachments 一一对应
    color_attach_blend_states: Vec<vk::PipelineColorBlendAttachmentState>,
    blend_info: vk::PipelineColorBlendStateCreateInfo<'static>,

    /// subpass 没有 depth attachment 时为 None
    depth_stencil_info: Option<vk::PipelineDepthStencilStateCreateInfo<'static>>,

    dynamic_states: Vec<vk::DynamicState>,

    subpass_binding: Option<GfxSubpassBinding>,

    indexed_draw_policy: IndexedDrawPolicy,
}
impl Default for GfxGraphicsPipelineCreateInfo {
    fn default() -> Self {
        Self {
            shader_stages: vec![],

            vertex_binding_desc: vec![],
            vertex_attribute_desc: vec![],

            descriptor_set_layouts: vec![],
            push_constant_ranges: GfxPushConstantRanges::new(),

            pipeline_cache: vk::PipelineCache::null(),

            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,

            rasterize_state_info: vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                .cull_mode(vk::CullModeFlags::BACK)
                // 按照 OpenGL 的传统，将 CCW 视为 front face
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false),
            msaa_sample: vk::SampleCountFlags::TYPE_1,
            min_sample_shading: GfxPipelineSettings::DEFAULT_MIN_SAMPLE_SHADING,

            color_attach_blend_states: vec![],
            blend_info: vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .blend_constants([0.0, 0.0, 0.0, 0.0]),

            depth_stencil_info: None,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],

            subpass_binding: None,

            indexed_draw_policy: IndexedDrawPolicy::default(),
        }
    }
}
// builder
impl GfxGraphicsPipelineCreateInfo {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    #[inline]
    pub fn add_shader(&mut self, stage: GfxShaderStageInfo) -> &mut Self {
        self.shader_stages.push(stage);
        self
    }

    /// builder
    #[inline]
    pub fn vertex_shader_stage(&mut self, module: vk::ShaderModule, entry_point: &'static CStr) -> &mut Self {
        self.add_shader(GfxShaderStageInfo::new(vk::ShaderStageFlags::VERTEX, module, entry_point))
    }

    /// builder
    #[inline]
    pub fn fragment_shader_stage(&mut self, module: vk::ShaderModule, entry_point: &'static CStr) -> &mut Self {
        self.add_shader(GfxShaderStageInfo::new(vk::ShaderStageFlags::FRAGMENT, module, entry_point))
    }

    /// builder
    #[inline]
    pub fn mesh_shader_stage(&mut self, module: vk::ShaderModule, entry_point: &'static CStr) -> &mut Self {
        self.add_shader(GfxShaderStageInfo::new(vk::ShaderStageFlags::MESH_EXT, module, entry_point))
    }

    /// builder
    #[inline]
    pub fn task_shader_stage(&mut self, module: vk::ShaderModule, entry_point: &'static CStr) -> &mut Self {
        self.add_shader(GfxShaderStageInfo::new(vk::ShaderStageFlags::TASK_EXT, module, entry_point))
    }

    /// 每个 vertex layout 占用一个 binding，binding index 按照添加的顺序递增
    pub fn add_vertex_input_layout(&mut self, layout: &dyn GfxVertexLayout) -> &mut Self {
        let binding = self.vertex_binding_desc.len() as u32;
        self.vertex_binding_desc.push(layout.binding_description(binding));
        self.vertex_attribute_desc.extend(layout.attribute_descriptions(binding));
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

    /// builder
    #[inline]
    pub fn min_sample_shading(&mut self, min_sample_shading: f32) -> &mut Self {
        self.min_sample_shading = min_sample_shading;
        self
    }

    /// builder
    #[inline]
    pub fn indexed_draw_policy(&mut self, policy: IndexedDrawPolicy) -> &mut Self {
        self.indexed_draw_policy = policy;
        self
    }

    pub fn apply_settings(&mut self, settings: &GfxPipelineSettings) -> &mut Self {
        self.min_sample_shading = settings.min_sample_shading;
        self.indexed_draw_policy = settings.indexed_draw_policy;
        self
    }

    /// 根据 subpass 的 attachments 决定 MSAA、depth stencil 以及 blend 状态
    ///
    /// 重复调用会覆盖之前的结果
    pub fn bind_to_subpass(&mut self, render_pass: &dyn GfxRenderPassLayout, subpass: u32) -> Result<&mut Self> {
        let subpass_count = render_pass.subpass_count();
        if subpass >= subpass_count {
            return Err(PipelineError::InvalidSubpass {
                subpass,
                count: subpass_count,
            });
        }

        let color_attachments = render_pass.color_attachments(subpass);
        self.msaa_sample = color_attachments
            .first()
            .map_or(vk::SampleCountFlags::TYPE_1, |attach| render_pass.attachment_samples(attach.attachment));
        self.color_attach_blend_states = vec![Self::alpha_blend_state(); color_attachments.len()];

        self.depth_stencil_info = render_pass.depth_stencil_attachment(subpass).map(|attach| {
            vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(!is_depth_read_only_layout(attach.layout))
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false)
        });

        self.subpass_binding = Some(GfxSubpassBinding {
            render_pass: render_pass.vk_render_pass(),
            subpass,
        });

        log::debug!(
            "bind graphics pipeline to subpass {}: {} color attachments, msaa: {:?}, depth: {}",
            subpass,
            color_attachments.len(),
            self.msaa_sample,
            self.depth_stencil_info.is_some()
        );
        Ok(self)
    }

    /// 将某个 color attachment 的混合方式改为加法混合
    pub fn set_color_attachment_as_additive(&mut self, index: usize) -> Result<&mut Self> {
        if self.subpass_binding.is_none() {
            return Err(PipelineError::NotBoundToSubpass);
        }
        let count = self.color_attach_blend_states.len();
        let state = self
            .color_attach_blend_states
            .get_mut(index)
            .ok_or(PipelineError::ColorAttachmentOutOfRange { index, count })?;
        *state = Self::additive_blend_state();
        Ok(self)
    }
}
// getters
impl GfxGraphicsPipelineCreateInfo {
    #[inline]
    pub fn color_blend_attachments(&self) -> &[vk::PipelineColorBlendAttachmentState] {
        &self.color_attach_blend_states
    }

    #[inline]
    pub fn depth_stencil_state(&self) -> Option<&vk::PipelineDepthStencilStateCreateInfo<'static>> {
        self.depth_stencil_info.as_ref()
    }

    #[inline]
    pub fn sample_count(&self) -> vk::SampleCountFlags {
        self.msaa_sample
    }

    #[inline]
    pub fn vertex_bindings(&self) -> &[vk::VertexInputBindingDescription] {
        &self.vertex_binding_desc
    }

    #[inline]
    pub fn vertex_attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.vertex_attribute_desc
    }

    #[inline]
    pub fn push_constant_ranges(&self) -> &GfxPushConstantRanges {
        &self.push_constant_ranges
    }

    #[inline]
    pub fn subpass_binding(&self) -> Option<GfxSubpassBinding> {
        self.subpass_binding
    }
}
// blend presets
impl GfxGraphicsPipelineCreateInfo {
    /// 标准的 alpha 混合
    pub fn alpha_blend_state() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }

    /// 颜色和 alpha 都直接相加，用于累积
    pub fn additive_blend_state() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ONE)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }
}

/// 只读的 depth layout，此时不能写入 depth
fn is_depth_read_only_layout(layout: vk::ImageLayout) -> bool {
    matches!(
        layout,
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            | vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL
            | vk::ImageLayout::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL
    )
}

/// 没有指定 offsets 时，所有 vertex buffer 都从 0 开始
fn vertex_buffer_offsets<'a>(
    buffers: &[vk::Buffer],
    offsets: Option<&'a [vk::DeviceSize]>,
) -> Result<Cow<'a, [vk::DeviceSize]>> {
    match offsets {
        None => Ok(Cow::Owned(vec![0; buffers.len()])),
        Some(offsets) if offsets.len() == buffers.len() => Ok(Cow::Borrowed(offsets)),
        Some(offsets) => Err(PipelineError::VertexOffsetCountMismatch {
            buffers: buffers.len(),
            offsets: offsets.len(),
        }),
    }
}

/// 非 indexed draw 的参数
#[derive(Debug, Clone, Copy, Default)]
pub struct GfxDrawArgs<'a> {
    /// 从 binding 0 开始绑定，为空时不绑定
    pub vertex_buffers: &'a [vk::Buffer],
    pub vertex_offsets: Option<&'a [vk::DeviceSize]>,
    pub vertex_count: u32,
}

/// indexed draw 的参数
#[derive(Debug, Clone, Copy)]
pub struct GfxDrawIndexedArgs<'a> {
    pub vertex_buffers: &'a [vk::Buffer],
    pub vertex_offsets: Option<&'a [vk::DeviceSize]>,
    pub index_buffer: vk::Buffer,
    pub index_offset: Option<vk::DeviceSize>,
    pub index_type: vk::IndexType,
    pub index_count: u32,
}
impl Default for GfxDrawIndexedArgs<'_> {
    fn default() -> Self {
        Self {
            vertex_buffers: &[],
            vertex_offsets: None,
            index_buffer: vk::Buffer::null(),
            index_offset: None,
            index_type: vk::IndexType::UINT32,
            index_count: 0,
        }
    }
}

pub struct GfxGraphicsPipeline {
    /// destroy 之后为 None
    objects: Option<GfxPipelineObjects>,
    subpass_binding: Option<GfxSubpassBinding>,

    push_constant_ranges: GfxPushConstantRanges,
    indexed_draw_policy: IndexedDrawPolicy,

    device: Rc<dyn PipelineDevice>,
}
impl GfxGraphicsPipeline {
    pub fn new(
        device: Rc<dyn PipelineDevice>,
        create_info: &GfxGraphicsPipelineCreateInfo,
        debug_name: &str,
    ) -> Result<Self> {
        let subpass_binding = create_info.subpass_binding.ok_or(PipelineError::NotBoundToSubpass)?;

        let shader_stages_info =
            create_info.shader_stages.iter().map(GfxShaderStageInfo::stage_create_info).collect_vec();

        // 顶点和 index
        let vertex_input_state_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&create_info.vertex_binding_desc)
            .vertex_attribute_descriptions(&create_info.vertex_attribute_desc);

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(create_info.primitive_topology)
            .primitive_restart_enable(false);

        // viewport 和 scissor 具体值由 dynamic 决定，但是数量由该 create info 决定
        let viewport_info = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        // MSAA 配置
        let msaa_info = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(create_info.msaa_sample)
            .sample_shading_enable(true)
            .min_sample_shading(create_info.min_sample_shading);

        // 混合设置：需要为每个 color attachment 分别指定
        let color_blend_info = create_info.blend_info.attachments(&create_info.color_attach_blend_states);

        let dynamic_state_info =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&create_info.dynamic_states);

        // =======================================
        // === 创建 pipeline

        let objects = GfxPipelineObjects::create(
            device.as_ref(),
            &create_info.descriptor_set_layouts,
            create_info.push_constant_ranges.ranges(),
            debug_name,
            |layout| {
                let mut pipeline_info = vk::GraphicsPipelineCreateInfo::default()
                    .stages(&shader_stages_info)
                    .vertex_input_state(&vertex_input_state_info)
                    .input_assembly_state(&input_assembly_info)
                    .viewport_state(&viewport_info)
                    .rasterization_state(&create_info.rasterize_state_info)
                    .multisample_state(&msaa_info)
                    .color_blend_state(&color_blend_info)
                    .dynamic_state(&dynamic_state_info)
                    .layout(layout)
                    .render_pass(subpass_binding.render_pass)
                    .subpass(subpass_binding.subpass);
                // 没有 depth attachment 时不能提供 depth stencil state
                if let Some(depth_stencil_info) = &create_info.depth_stencil_info {
                    pipeline_info = pipeline_info.depth_stencil_state(depth_stencil_info);
                }

                device.create_graphics_pipeline(create_info.pipeline_cache, &pipeline_info)
            },
        )?;

        let pipeline = Self {
            objects: Some(objects),
            subpass_binding: Some(subpass_binding),
            push_constant_ranges: create_info.push_constant_ranges.clone(),
            indexed_draw_policy: create_info.indexed_draw_policy,
            device,
        };
        set_debug_name(pipeline.device.as_ref(), &pipeline, debug_name);
        log::info!("create graphics pipeline: {}", debug_name);

        Ok(pipeline)
    }

    /// 先销毁 pipeline 再销毁 layout，可以重复调用
    pub fn destroy(&mut self) {
        if let Some(objects) = self.objects.take() {
            objects.destroy(self.device.as_ref());
        }
        self.subpass_binding = None;
    }
}
// getters
impl GfxGraphicsPipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.objects.map_or(vk::Pipeline::null(), |objects| objects.pipeline)
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.objects.map_or(vk::PipelineLayout::null(), |objects| objects.layout)
    }

    #[inline]
    pub fn subpass_binding(&self) -> Option<GfxSubpassBinding> {
        self.subpass_binding
    }

    #[inline]
    pub fn push_constant_ranges(&self) -> &GfxPushConstantRanges {
        &self.push_constant_ranges
    }
}
// draw
impl GfxGraphicsPipeline {
    #[inline]
    fn live_objects(&self) -> Result<GfxPipelineObjects> {
        self.objects.ok_or(PipelineError::PipelineDestroyed)
    }

    /// 所有 draw 共用的部分：pipeline, viewport, scissor, descriptor sets, push constants
    fn record_prologue(
        &self,
        cmd: &dyn GfxCommandRecorder,
        objects: GfxPipelineObjects,
        extent: vk::Extent2D,
        bindings: &GfxPipelineBindings,
    ) {
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, objects.pipeline);
        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        cmd.cmd_set_scissor(
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            }],
        );
        bindings.record(cmd, vk::PipelineBindPoint::GRAPHICS, objects.layout);
    }

    pub fn draw(
        &self,
        cmd: &dyn GfxCommandRecorder,
        extent: vk::Extent2D,
        bindings: &GfxPipelineBindings,
        args: &GfxDrawArgs,
    ) -> Result<()> {
        let objects = self.live_objects()?;
        bindings.validate(&self.push_constant_ranges)?;
        let vertex_offsets = vertex_buffer_offsets(args.vertex_buffers, args.vertex_offsets)?;

        self.record_prologue(cmd, objects, extent, bindings);
        if !args.vertex_buffers.is_empty() {
            cmd.cmd_bind_vertex_buffers(0, args.vertex_buffers, &vertex_offsets);
        }
        cmd.cmd_draw(args.vertex_count, 1, 0, 0);
        Ok(())
    }

    /// 在 [`IndexedDrawPolicy::RequireVertexBuffers`] 下至少需要一个 vertex buffer
    pub fn draw_indexed(
        &self,
        cmd: &dyn GfxCommandRecorder,
        extent: vk::Extent2D,
        bindings: &GfxPipelineBindings,
        args: &GfxDrawIndexedArgs,
    ) -> Result<()> {
        let objects = self.live_objects()?;
        if args.index_buffer == vk::Buffer::null() {
            return Err(PipelineError::MissingIndexBuffer);
        }
        if self.indexed_draw_policy == IndexedDrawPolicy::RequireVertexBuffers && args.vertex_buffers.is_empty() {
            return Err(PipelineError::MissingVertexBuffers);
        }
        bindings.validate(&self.push_constant_ranges)?;
        let vertex_offsets = vertex_buffer_offsets(args.vertex_buffers, args.vertex_offsets)?;

        self.record_prologue(cmd, objects, extent, bindings);
        if !args.vertex_buffers.is_empty() {
            cmd.cmd_bind_vertex_buffers(0, args.vertex_buffers, &vertex_offsets);
        }
        cmd.cmd_bind_index_buffer(args.index_buffer, args.index_offset.unwrap_or(0), args.index_type);
        cmd.cmd_draw_indexed(args.index_count, 1, 0, 0, 0);
        Ok(())
    }

    /// mesh shader pipeline 使用，不绑定任何 buffer
    pub fn draw_mesh_tasks(
        &self,
        cmd: &dyn GfxCommandRecorder,
        extent: vk::Extent2D,
        bindings: &GfxPipelineBindings,
        group_count: glam::UVec3,
    ) -> Result<()> {
        let objects = self.live_objects()?;
        bindings.validate(&self.push_constant_ranges)?;

        self.record_prologue(cmd, objects, extent, bindings);
        cmd.cmd_draw_mesh_tasks(group_count);
        Ok(())
    }
}
impl Drop for GfxGraphicsPipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}
impl DebugType for GfxGraphicsPipeline {
    fn debug_type_name() -> &'static str {
        "GfxGraphicsPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle()
    }
}
