//! ray tracing pipeline 以及 shader binding table

pub mod rt_pipeline;
pub mod sbt;
