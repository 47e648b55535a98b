use ash::vk;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// pipeline 层的所有错误
///
/// - 前置条件不满足：调用顺序或参数有误，不可恢复
/// - driver 错误：创建 native 对象时被拒绝
/// - pipeline cache 文件缺失或者 header 不匹配 *不是* 错误，会退化为空的 cache
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pipeline settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("pipeline has been destroyed")]
    PipelineDestroyed,

    #[error("graphics pipeline is not bound to a subpass")]
    NotBoundToSubpass,

    #[error("subpass {subpass} does not exist, render pass has {count} subpasses")]
    InvalidSubpass { subpass: u32, count: u32 },

    #[error("color attachment {index} out of range, subpass has {count} color attachments")]
    ColorAttachmentOutOfRange { index: usize, count: usize },

    #[error("compute pipeline requires a compute shader stage")]
    MissingComputeShader,

    #[error("shader binding table has no ray generation record")]
    MissingRayGenRecord,

    #[error("shader group {index} does not exist, pipeline has {count} shader groups")]
    InvalidShaderGroupIndex { index: u32, count: u32 },

    #[error("shader stage {index} does not exist, pipeline has {count} shader stages")]
    InvalidShaderStageIndex { index: u32, count: u32 },

    #[error("indexed draw requires at least one vertex buffer")]
    MissingVertexBuffers,

    #[error("indexed draw requires an index buffer")]
    MissingIndexBuffer,

    #[error("{offsets} vertex buffer offsets supplied for {buffers} vertex buffers")]
    VertexOffsetCountMismatch { buffers: usize, offsets: usize },

    #[error("push constant (stage: {stage:?}, offset: {offset}, size: {size}) is not covered by any declared range")]
    PushConstantOutOfRange {
        stage: vk::ShaderStageFlags,
        offset: u32,
        size: u32,
    },
}
