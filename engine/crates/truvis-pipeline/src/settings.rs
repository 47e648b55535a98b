use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use truvis_crate_tools::resource::TruvisPath;

use crate::error::Result;

/// indexed draw 时对 vertex buffer 的要求
///
/// 使用 vertex pulling（在 shader 中直接读取 storage buffer）时，
/// indexed draw 并不需要绑定任何 vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexedDrawPolicy {
    /// 至少需要一个 vertex buffer
    #[default]
    RequireVertexBuffers,
    /// 允许不绑定 vertex buffer
    AllowVertexPulling,
}

/// pipeline 层的配置，可以从 TOML 文件中加载
///
/// ```toml
/// pipeline_cache_path = "pipeline_cache.bin"
/// min_sample_shading = 0.2
/// indexed_draw_policy = "allow-vertex-pulling"
/// max_ray_recursion = 2
/// debug_names = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GfxPipelineSettings {
    /// pipeline cache 文件，相对路径基于工作区根目录
    pub pipeline_cache_path: Option<PathBuf>,
    /// sample shading 的最小比例
    pub min_sample_shading: f32,
    pub indexed_draw_policy: IndexedDrawPolicy,
    /// ray tracing pipeline 默认的最大递归深度
    pub max_ray_recursion: u32,
    /// 是否为创建出的 native 对象设置 debug name
    pub debug_names: bool,
}
impl Default for GfxPipelineSettings {
    fn default() -> Self {
        Self {
            pipeline_cache_path: None,
            min_sample_shading: Self::DEFAULT_MIN_SAMPLE_SHADING,
            indexed_draw_policy: IndexedDrawPolicy::default(),
            max_ray_recursion: Self::DEFAULT_MAX_RAY_RECURSION,
            debug_names: true,
        }
    }
}
impl GfxPipelineSettings {
    pub const DEFAULT_MIN_SAMPLE_SHADING: f32 = 0.2;
    pub const DEFAULT_MAX_RAY_RECURSION: u32 = 1;

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml_str(&content)?;
        log::info!("load pipeline settings from {:?}", path.as_ref());
        Ok(settings)
    }

    /// pipeline cache 文件的绝对路径
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        self.pipeline_cache_path.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                TruvisPath::workspace_path().join(path)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let settings = GfxPipelineSettings::from_toml_str("").unwrap();
        assert_eq!(settings, GfxPipelineSettings::default());
        assert_eq!(settings.max_ray_recursion, 1);
        assert_eq!(settings.indexed_draw_policy, IndexedDrawPolicy::RequireVertexBuffers);
    }

    #[test]
    fn test_partial_toml() {
        let settings = GfxPipelineSettings::from_toml_str(
            r#"
            pipeline_cache_path = "cache/pipeline.bin"
            indexed_draw_policy = "allow-vertex-pulling"
            max_ray_recursion = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.indexed_draw_policy, IndexedDrawPolicy::AllowVertexPulling);
        assert_eq!(settings.max_ray_recursion, 3);
        assert_eq!(settings.min_sample_shading, GfxPipelineSettings::DEFAULT_MIN_SAMPLE_SHADING);

        let path = settings.resolved_cache_path().unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("cache/pipeline.bin"));
    }

    #[test]
    fn test_invalid_policy_is_error() {
        let result = GfxPipelineSettings::from_toml_str(r#"indexed_draw_policy = "sometimes""#);
        assert!(matches!(result, Err(crate::PipelineError::Settings(_))));
    }
}
