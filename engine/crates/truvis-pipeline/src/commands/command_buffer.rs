use std::rc::Rc;

use ash::vk;

use crate::commands::command_recorder::GfxCommandRecorder;
use crate::foundation::gfx_device::GfxDevice;

/// 命令缓冲封装
///
/// command buffer 的分配、begin / end 以及提交由调用者负责，
/// 这里只是把 pipeline 需要的命令转发到 ash。
///
/// # 使用示例
/// ```ignore
/// let cmd = GfxCommandBuffer::new(device.clone(), vk_command_buffer);
/// pipeline.draw(&cmd, extent, &bindings, &args)?;
/// ```
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    device: Rc<GfxDevice>,
}
impl GfxCommandBuffer {
    #[inline]
    pub fn new(device: Rc<GfxDevice>, vk_handle: vk::CommandBuffer) -> Self {
        Self { vk_handle, device }
    }

    /// getter
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}

impl GfxCommandRecorder for GfxCommandBuffer {
    #[inline]
    fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.device.cmd_bind_pipeline(self.vk_handle, bind_point, pipeline) }
    }

    #[inline]
    fn cmd_set_viewport(&self, first_viewport: u32, viewports: &[vk::Viewport]) {
        unsafe { self.device.device.cmd_set_viewport(self.vk_handle, first_viewport, viewports) }
    }

    #[inline]
    fn cmd_set_scissor(&self, first_scissor: u32, scissors: &[vk::Rect2D]) {
        unsafe { self.device.device.cmd_set_scissor(self.vk_handle, first_scissor, scissors) }
    }

    #[inline]
    fn cmd_bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device.device.cmd_bind_descriptor_sets(
                self.vk_handle,
                bind_point,
                layout,
                first_set,
                descriptor_sets,
                dynamic_offsets,
            )
        }
    }

    #[inline]
    fn cmd_push_constants(&self, layout: vk::PipelineLayout, stage: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        unsafe { self.device.device.cmd_push_constants(self.vk_handle, layout, stage, offset, data) }
    }

    #[inline]
    fn cmd_bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe { self.device.device.cmd_bind_vertex_buffers(self.vk_handle, first_binding, buffers, offsets) }
    }

    #[inline]
    fn cmd_bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe { self.device.device.cmd_bind_index_buffer(self.vk_handle, buffer, offset, index_type) }
    }

    #[inline]
    fn cmd_draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device.device.cmd_draw(self.vk_handle, vertex_count, instance_count, first_vertex, first_instance)
        }
    }

    #[inline]
    fn cmd_draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.device.cmd_draw_indexed(
                self.vk_handle,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        }
    }

    #[inline]
    fn cmd_draw_mesh_tasks(&self, group_count: glam::UVec3) {
        unsafe {
            self.device.mesh_shader.cmd_draw_mesh_tasks(self.vk_handle, group_count.x, group_count.y, group_count.z)
        }
    }

    #[inline]
    fn cmd_dispatch(&self, group_count: glam::UVec3) {
        unsafe { self.device.device.cmd_dispatch(self.vk_handle, group_count.x, group_count.y, group_count.z) }
    }

    #[inline]
    fn cmd_trace_rays(
        &self,
        raygen_table: &vk::StridedDeviceAddressRegionKHR,
        miss_table: &vk::StridedDeviceAddressRegionKHR,
        hit_table: &vk::StridedDeviceAddressRegionKHR,
        callable_table: &vk::StridedDeviceAddressRegionKHR,
        extent: glam::UVec3,
    ) {
        unsafe {
            self.device.ray_tracing_pipeline.cmd_trace_rays(
                self.vk_handle,
                raygen_table,
                miss_table,
                hit_table,
                callable_table,
                extent.x,
                extent.y,
                extent.z,
            )
        }
    }
}
