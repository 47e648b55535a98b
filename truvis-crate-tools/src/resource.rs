use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
/// 避免使用硬编码相对路径，确保在不同构建环境下路径一致。
///
/// # 使用示例
/// ```ignore
/// let cache = TruvisPath::pipeline_cache_path("main.bin"); // target/pipeline-cache/main.bin
/// let config = TruvisPath::config_path("pipeline.toml");   // config/pipeline.toml
/// ```
pub struct TruvisPath {}
// 核心路径
impl TruvisPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 从当前包的位置推导workspace目录
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// 根目录下
impl TruvisPath {
    /// 获取 `target/pipeline-cache/` 目录下的 pipeline cache 文件
    ///
    /// pipeline cache 和 driver 相关，不应该提交到仓库中
    pub fn pipeline_cache_path(filename: &str) -> PathBuf {
        Self::target_path().join("pipeline-cache").join(filename)
    }

    /// 获取 `config/` 目录下的配置文件
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }
}
