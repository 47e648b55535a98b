//! 各类 pipeline 的创建、绑定以及 pipeline cache
//!
//! 每一种 pipeline 都有一个对应的 `*CreateInfo` builder，构建完成后交给 pipeline 的 `new` 创建 native 对象。

pub mod bindings;
pub mod compute_pipeline;
pub mod graphics_pipeline;
pub mod pipeline_cache;
pub mod pipeline_objects;
pub mod push_constant;
pub mod raytracing;
pub mod render_pass;
pub mod shader;
pub mod vertex_layout;
