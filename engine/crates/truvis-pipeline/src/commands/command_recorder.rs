use ash::vk;

/// pipeline 在录制阶段需要的命令
///
/// 由调用者提供录制上下文，pipeline 只负责发出 bind / push / draw 等命令。
pub trait GfxCommandRecorder {
    /// - command type: state
    /// - supported queue types: graphics, compute
    fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);

    /// - command type: state
    /// - supported queue types: graphics
    fn cmd_set_viewport(&self, first_viewport: u32, viewports: &[vk::Viewport]);

    /// - command type: state
    /// - supported queue types: graphics
    fn cmd_set_scissor(&self, first_scissor: u32, scissors: &[vk::Rect2D]);

    /// - command type: state
    /// - supported queue types: graphics, compute
    fn cmd_bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );

    /// - command type: state
    /// - supported queue types: graphics, compute
    fn cmd_push_constants(&self, layout: vk::PipelineLayout, stage: vk::ShaderStageFlags, offset: u32, data: &[u8]);

    /// - command type: state
    /// - supported queue types: graphics
    fn cmd_bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]);

    /// - command type: state
    /// - supported queue types: graphics
    fn cmd_bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType);

    /// - command type: action
    /// - supported queue types: graphics
    fn cmd_draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    /// - command type: action
    /// - supported queue types: graphics
    fn cmd_draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    /// - command type: action
    /// - supported queue types: graphics
    fn cmd_draw_mesh_tasks(&self, group_count: glam::UVec3);

    /// - command type: action
    /// - supported queue types: compute
    fn cmd_dispatch(&self, group_count: glam::UVec3);

    /// - command type: action
    /// - supported queue types: compute
    fn cmd_trace_rays(
        &self,
        raygen_table: &vk::StridedDeviceAddressRegionKHR,
        miss_table: &vk::StridedDeviceAddressRegionKHR,
        hit_table: &vk::StridedDeviceAddressRegionKHR,
        callable_table: &vk::StridedDeviceAddressRegionKHR,
        extent: glam::UVec3,
    );
}
