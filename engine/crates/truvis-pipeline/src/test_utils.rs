//! 测试用的 fake device 与 fake command buffer
//!
//! 不需要 GPU：handle 是递增的整数，create info 中需要检查的字段会被拷贝下来

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use ash::{prelude::VkResult, vk, vk::Handle};

use crate::commands::command_recorder::GfxCommandRecorder;
use crate::foundation::device::{GfxSbtBufferAlloc, PipelineDevice};
use crate::pipelines::pipeline_cache::GfxPipelineCacheHeader;
use crate::pipelines::shader::GfxShaderGroupInfo;

pub const VENDOR_ID: u32 = 0x10DE;
pub const DEVICE_ID: u32 = 0x2684;
pub const PIPELINE_CACHE_UUID: [u8; vk::UUID_SIZE] = [7; vk::UUID_SIZE];

pub const SHADER_GROUP_HANDLE_SIZE: u32 = 32;
pub const SHADER_GROUP_HANDLE_ALIGNMENT: u32 = 32;
pub const SHADER_GROUP_BASE_ALIGNMENT: u32 = 64;

pub const SBT_BASE_ADDRESS: vk::DeviceAddress = 0x1_0000;

/// 第 `group` 个 shader group 的 handle
pub fn fake_group_handle(group: u32) -> Vec<u8> {
    vec![0xA0 + group as u8; SHADER_GROUP_HANDLE_SIZE as usize]
}

/// 一个可以通过校验的 pipeline cache 文件内容
pub fn valid_cache_blob(payload: &[u8]) -> Vec<u8> {
    cache_blob(VENDOR_ID, DEVICE_ID, PIPELINE_CACHE_UUID, payload)
}

pub fn cache_blob(vendor_id: u32, device_id: u32, uuid: [u8; vk::UUID_SIZE], payload: &[u8]) -> Vec<u8> {
    let header = GfxPipelineCacheHeader {
        header_size: size_of::<GfxPipelineCacheHeader>() as u32,
        header_version: vk::PipelineCacheHeaderVersion::ONE.as_raw() as u32,
        vendor_id,
        device_id,
        pipeline_cache_uuid: uuid,
    };
    let mut blob = bytemuck::bytes_of(&header).to_vec();
    blob.extend_from_slice(payload);
    blob
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    CreatePipelineLayout(vk::PipelineLayout),
    DestroyPipelineLayout(vk::PipelineLayout),
    CreatePipeline(vk::Pipeline),
    DestroyPipeline(vk::Pipeline),
    CreateSbtBuffer(vk::Buffer),
    DestroySbtBuffer(vk::Buffer),
    CreatePipelineCache(vk::PipelineCache),
    DestroyPipelineCache(vk::PipelineCache),
    MergePipelineCaches(vk::PipelineCache, Vec<vk::PipelineCache>),
}

#[derive(Debug, Clone)]
pub struct LayoutSummary {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineSummary {
    pub cache: vk::PipelineCache,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub stages: Vec<vk::ShaderStageFlags>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
    pub depth_bias_enable: bool,
    pub rasterization_samples: vk::SampleCountFlags,
    pub sample_shading_enable: bool,
    pub min_sample_shading: f32,
    pub viewport_count: u32,
    pub scissor_count: u32,
    pub color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    pub depth_stencil: Option<vk::PipelineDepthStencilStateCreateInfo<'static>>,
    pub dynamic_states: Vec<vk::DynamicState>,
}

#[derive(Debug, Clone)]
pub struct ComputePipelineSummary {
    pub cache: vk::PipelineCache,
    pub layout: vk::PipelineLayout,
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
}

#[derive(Debug, Clone)]
pub struct RtPipelineSummary {
    pub cache: vk::PipelineCache,
    pub layout: vk::PipelineLayout,
    pub stages: Vec<vk::ShaderStageFlags>,
    pub groups: Vec<GfxShaderGroupInfo>,
    pub max_recursion: u32,
}

#[derive(Debug, Clone)]
pub struct SbtUpload {
    pub buffer: vk::Buffer,
    pub data: Vec<u8>,
    pub alignment: vk::DeviceSize,
}

/// 记录所有调用的 [`PipelineDevice`]
#[derive(Default)]
pub struct RecordingDevice {
    next_handle: Cell<u64>,

    pub calls: RefCell<Vec<DeviceCall>>,
    pub layouts: RefCell<Vec<LayoutSummary>>,
    pub graphics_pipelines: RefCell<Vec<GraphicsPipelineSummary>>,
    pub compute_pipelines: RefCell<Vec<ComputePipelineSummary>>,
    pub rt_pipelines: RefCell<Vec<RtPipelineSummary>>,
    pub sbt_uploads: RefCell<Vec<SbtUpload>>,
    pub cache_initial_data: RefCell<Vec<Vec<u8>>>,
    cache_data: RefCell<HashMap<vk::PipelineCache, Vec<u8>>>,
    /// (object type, raw handle, name)
    pub debug_names: RefCell<Vec<(vk::ObjectType, u64, String)>>,

    /// 下一次创建 pipeline 时返回错误
    pub fail_next_pipeline: Cell<bool>,
    /// 下一次创建 SBT buffer 时返回错误
    pub fail_next_sbt: Cell<bool>,
}
impl RecordingDevice {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            next_handle: Cell::new(1),
            ..Default::default()
        })
    }

    fn next_raw(&self) -> u64 {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        raw
    }

    fn push_call(&self, call: DeviceCall) {
        self.calls.borrow_mut().push(call);
    }

    fn take_failure(&self) -> VkResult<()> {
        if self.fail_next_pipeline.replace(false) {
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        } else {
            Ok(())
        }
    }

    fn new_pipeline(&self) -> vk::Pipeline {
        let pipeline = vk::Pipeline::from_raw(self.next_raw());
        self.push_call(DeviceCall::CreatePipeline(pipeline));
        pipeline
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    pub fn last_graphics_pipeline(&self) -> GraphicsPipelineSummary {
        self.graphics_pipelines.borrow().last().cloned().expect("no graphics pipeline created")
    }

    pub fn last_layout(&self) -> LayoutSummary {
        self.layouts.borrow().last().cloned().expect("no pipeline layout created")
    }
}

unsafe fn slice_of<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, count as usize) }
    }
}

impl PipelineDevice for RecordingDevice {
    fn physical_device_properties(&self) -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            vendor_id: VENDOR_ID,
            device_id: DEVICE_ID,
            pipeline_cache_uuid: PIPELINE_CACHE_UUID,
            ..Default::default()
        }
    }

    fn rt_pipeline_properties(&self) -> vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static> {
        vk::PhysicalDeviceRayTracingPipelinePropertiesKHR {
            shader_group_handle_size: SHADER_GROUP_HANDLE_SIZE,
            shader_group_handle_alignment: SHADER_GROUP_HANDLE_ALIGNMENT,
            shader_group_base_alignment: SHADER_GROUP_BASE_ALIGNMENT,
            max_ray_recursion_depth: 31,
            ..Default::default()
        }
    }

    fn set_object_debug_name(&self, object_type: vk::ObjectType, raw_handle: u64, name: &str) {
        self.debug_names.borrow_mut().push((object_type, raw_handle, name.to_string()));
    }

    fn create_pipeline_layout(&self, create_info: &vk::PipelineLayoutCreateInfo) -> VkResult<vk::PipelineLayout> {
        let summary = unsafe {
            LayoutSummary {
                set_layouts: slice_of(create_info.p_set_layouts, create_info.set_layout_count).to_vec(),
                push_constant_ranges: slice_of(
                    create_info.p_push_constant_ranges,
                    create_info.push_constant_range_count,
                )
                .to_vec(),
            }
        };
        self.layouts.borrow_mut().push(summary);

        let layout = vk::PipelineLayout::from_raw(self.next_raw());
        self.push_call(DeviceCall::CreatePipelineLayout(layout));
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.push_call(DeviceCall::DestroyPipelineLayout(layout));
    }

    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        self.take_failure()?;

        let summary = unsafe {
            let stages = slice_of(create_info.p_stages, create_info.stage_count);
            let vertex_input = &*create_info.p_vertex_input_state;
            let input_assembly = &*create_info.p_input_assembly_state;
            let viewport = &*create_info.p_viewport_state;
            let rasterization = &*create_info.p_rasterization_state;
            let multisample = &*create_info.p_multisample_state;
            let color_blend = &*create_info.p_color_blend_state;
            let dynamic = &*create_info.p_dynamic_state;
            let depth_stencil = create_info.p_depth_stencil_state.as_ref().map(|info| {
                let mut info = *info;
                info.p_next = std::ptr::null();
                std::mem::transmute::<
                    vk::PipelineDepthStencilStateCreateInfo<'_>,
                    vk::PipelineDepthStencilStateCreateInfo<'static>,
                >(info)
            });

            GraphicsPipelineSummary {
                cache,
                layout: create_info.layout,
                render_pass: create_info.render_pass,
                subpass: create_info.subpass,
                stages: stages.iter().map(|stage| stage.stage).collect(),
                vertex_bindings: slice_of(
                    vertex_input.p_vertex_binding_descriptions,
                    vertex_input.vertex_binding_description_count,
                )
                .to_vec(),
                vertex_attributes: slice_of(
                    vertex_input.p_vertex_attribute_descriptions,
                    vertex_input.vertex_attribute_description_count,
                )
                .to_vec(),
                topology: input_assembly.topology,
                polygon_mode: rasterization.polygon_mode,
                cull_mode: rasterization.cull_mode,
                front_face: rasterization.front_face,
                line_width: rasterization.line_width,
                depth_bias_enable: rasterization.depth_bias_enable == vk::TRUE,
                rasterization_samples: multisample.rasterization_samples,
                sample_shading_enable: multisample.sample_shading_enable == vk::TRUE,
                min_sample_shading: multisample.min_sample_shading,
                viewport_count: viewport.viewport_count,
                scissor_count: viewport.scissor_count,
                color_blend_attachments: slice_of(color_blend.p_attachments, color_blend.attachment_count).to_vec(),
                depth_stencil,
                dynamic_states: slice_of(dynamic.p_dynamic_states, dynamic.dynamic_state_count).to_vec(),
            }
        };
        self.graphics_pipelines.borrow_mut().push(summary);

        Ok(self.new_pipeline())
    }

    fn create_compute_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::ComputePipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        self.take_failure()?;

        self.compute_pipelines.borrow_mut().push(ComputePipelineSummary {
            cache,
            layout: create_info.layout,
            stage: create_info.stage.stage,
            module: create_info.stage.module,
        });

        Ok(self.new_pipeline())
    }

    fn create_ray_tracing_pipeline(
        &self,
        cache: vk::PipelineCache,
        create_info: &vk::RayTracingPipelineCreateInfoKHR,
    ) -> VkResult<vk::Pipeline> {
        self.take_failure()?;

        let summary = unsafe {
            RtPipelineSummary {
                cache,
                layout: create_info.layout,
                stages: slice_of(create_info.p_stages, create_info.stage_count).iter().map(|s| s.stage).collect(),
                groups: slice_of(create_info.p_groups, create_info.group_count)
                    .iter()
                    .map(|group| GfxShaderGroupInfo {
                        ty: group.ty,
                        general: group.general_shader,
                        closest_hit: group.closest_hit_shader,
                        any_hit: group.any_hit_shader,
                        intersection: group.intersection_shader,
                    })
                    .collect(),
                max_recursion: create_info.max_pipeline_ray_recursion_depth,
            }
        };
        self.rt_pipelines.borrow_mut().push(summary);

        Ok(self.new_pipeline())
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.push_call(DeviceCall::DestroyPipeline(pipeline));
    }

    fn get_ray_tracing_shader_group_handles(
        &self,
        _pipeline: vk::Pipeline,
        first_group: u32,
        group_count: u32,
        data_size: usize,
    ) -> VkResult<Vec<u8>> {
        assert_eq!(data_size, (group_count * SHADER_GROUP_HANDLE_SIZE) as usize);
        Ok((first_group..first_group + group_count).flat_map(fake_group_handle).collect())
    }

    fn create_sbt_buffer(
        &self,
        data: &[u8],
        alignment: vk::DeviceSize,
        _debug_name: &str,
    ) -> VkResult<GfxSbtBufferAlloc> {
        if self.fail_next_sbt.replace(false) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        let buffer = vk::Buffer::from_raw(self.next_raw());
        self.push_call(DeviceCall::CreateSbtBuffer(buffer));
        self.sbt_uploads.borrow_mut().push(SbtUpload {
            buffer,
            data: data.to_vec(),
            alignment,
        });
        Ok(GfxSbtBufferAlloc {
            buffer,
            device_address: SBT_BASE_ADDRESS,
        })
    }

    fn destroy_sbt_buffer(&self, buffer: vk::Buffer) {
        self.push_call(DeviceCall::DestroySbtBuffer(buffer));
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> VkResult<vk::PipelineCache> {
        let cache = vk::PipelineCache::from_raw(self.next_raw());
        self.push_call(DeviceCall::CreatePipelineCache(cache));
        self.cache_initial_data.borrow_mut().push(initial_data.to_vec());

        let data = if initial_data.is_empty() {
            valid_cache_blob(b"driver-data")
        } else {
            initial_data.to_vec()
        };
        self.cache_data.borrow_mut().insert(cache, data);
        Ok(cache)
    }

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        self.push_call(DeviceCall::DestroyPipelineCache(cache));
    }

    fn get_pipeline_cache_data(&self, cache: vk::PipelineCache) -> VkResult<Vec<u8>> {
        self.cache_data.borrow().get(&cache).cloned().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn merge_pipeline_caches(&self, dst: vk::PipelineCache, src: &[vk::PipelineCache]) -> VkResult<()> {
        self.push_call(DeviceCall::MergePipelineCaches(dst, src.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSummary {
    pub device_address: vk::DeviceAddress,
    pub stride: vk::DeviceSize,
    pub size: vk::DeviceSize,
}
impl From<&vk::StridedDeviceAddressRegionKHR> for RegionSummary {
    fn from(region: &vk::StridedDeviceAddressRegionKHR) -> Self {
        Self {
            device_address: region.device_address,
            stride: region.stride,
            size: region.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BindPipeline(vk::PipelineBindPoint, vk::Pipeline),
    SetViewport {
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    SetScissor(vk::Extent2D),
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
        dynamic_offsets: Vec<u32>,
    },
    PushConstants {
        layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    BindVertexBuffers {
        first_binding: u32,
        buffers: Vec<vk::Buffer>,
        offsets: Vec<vk::DeviceSize>,
    },
    BindIndexBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
    },
    DrawMeshTasks(glam::UVec3),
    Dispatch(glam::UVec3),
    TraceRays {
        raygen: RegionSummary,
        miss: RegionSummary,
        hit: RegionSummary,
        callable: RegionSummary,
        extent: glam::UVec3,
    },
}

/// 记录所有命令的 [`GfxCommandRecorder`]
#[derive(Default)]
pub struct RecordingCommandBuffer {
    pub commands: RefCell<Vec<RecordedCommand>>,
}
impl RecordingCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.borrow().clone()
    }

    fn push(&self, command: RecordedCommand) {
        self.commands.borrow_mut().push(command);
    }
}
impl GfxCommandRecorder for RecordingCommandBuffer {
    fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.push(RecordedCommand::BindPipeline(bind_point, pipeline));
    }

    fn cmd_set_viewport(&self, _first_viewport: u32, viewports: &[vk::Viewport]) {
        for viewport in viewports {
            self.push(RecordedCommand::SetViewport {
                width: viewport.width,
                height: viewport.height,
                min_depth: viewport.min_depth,
                max_depth: viewport.max_depth,
            });
        }
    }

    fn cmd_set_scissor(&self, _first_scissor: u32, scissors: &[vk::Rect2D]) {
        for scissor in scissors {
            self.push(RecordedCommand::SetScissor(scissor.extent));
        }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.push(RecordedCommand::BindDescriptorSets {
            bind_point,
            layout,
            first_set,
            sets: descriptor_sets.to_vec(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn cmd_push_constants(&self, layout: vk::PipelineLayout, stage: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        self.push(RecordedCommand::PushConstants {
            layout,
            stage,
            offset,
            data: data.to_vec(),
        });
    }

    fn cmd_bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        self.push(RecordedCommand::BindVertexBuffers {
            first_binding,
            buffers: buffers.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn cmd_bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        self.push(RecordedCommand::BindIndexBuffer {
            buffer,
            offset,
            index_type,
        });
    }

    fn cmd_draw(&self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.push(RecordedCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn cmd_draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.push(RecordedCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
        });
    }

    fn cmd_draw_mesh_tasks(&self, group_count: glam::UVec3) {
        self.push(RecordedCommand::DrawMeshTasks(group_count));
    }

    fn cmd_dispatch(&self, group_count: glam::UVec3) {
        self.push(RecordedCommand::Dispatch(group_count));
    }

    fn cmd_trace_rays(
        &self,
        raygen_table: &vk::StridedDeviceAddressRegionKHR,
        miss_table: &vk::StridedDeviceAddressRegionKHR,
        hit_table: &vk::StridedDeviceAddressRegionKHR,
        callable_table: &vk::StridedDeviceAddressRegionKHR,
        extent: glam::UVec3,
    ) {
        self.push(RecordedCommand::TraceRays {
            raygen: raygen_table.into(),
            miss: miss_table.into(),
            hit: hit_table.into(),
            callable: callable_table.into(),
            extent,
        });
    }
}
