//! Truvis Pipeline 层
//!
//! 对 Vulkan pipeline 对象模型的一层薄封装：
//! - graphics / compute / ray tracing pipeline 的创建、绑定与销毁
//! - ray tracing 的 shader binding table 布局
//! - 可持久化的 pipeline cache
//!
//! 所有 native 对象都通过显式传入的 [`foundation::device::PipelineDevice`] 创建和销毁，
//! 录制命令则通过 [`commands::command_recorder::GfxCommandRecorder`]。

pub mod commands;
pub mod error;
pub mod foundation;
pub mod pipelines;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{PipelineError, Result};
