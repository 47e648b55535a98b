use std::mem::offset_of;

use ash::vk;

/// Vertex Buffer 中顶点布局的 trait 定义
///
/// binding index 由 pipeline builder 按照添加顺序分配，
/// 返回的 binding / attribute 描述都需要使用这个 binding
pub trait GfxVertexLayout {
    fn binding_description(&self, binding: u32) -> vk::VertexInputBindingDescription;

    fn attribute_descriptions(&self, binding: u32) -> Vec<vk::VertexInputAttributeDescription>;
}

#[repr(C)]
#[derive(Clone, Debug, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// AoS 的顶点 buffer 布局，包含：Positions, Normals, UVs
pub struct VertexLayoutAoS3D;

impl GfxVertexLayout for VertexLayoutAoS3D {
    fn binding_description(&self, binding: u32) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding,
            stride: size_of::<Vertex3D>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    fn attribute_descriptions(&self, binding: u32) -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            // positions
            vk::VertexInputAttributeDescription {
                binding,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex3D, position) as u32,
            },
            // normals
            vk::VertexInputAttributeDescription {
                binding,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex3D, normal) as u32,
            },
            // uvs
            vk::VertexInputAttributeDescription {
                binding,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex3D, uv) as u32,
            },
        ]
    }
}
