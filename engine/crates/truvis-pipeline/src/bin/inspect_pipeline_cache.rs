//! 查看 pipeline cache 文件的 header
//!
//! ```text
//! cargo run --bin inspect-pipeline-cache -- [settings.toml]
//! ```
//!
//! 没有指定配置文件时使用 `config/pipeline.toml`，不存在则使用默认配置。

use anyhow::Context;
use ash::vk;
use itertools::Itertools;
use truvis_crate_tools::init_log::init_log;
use truvis_crate_tools::resource::TruvisPath;
use truvis_pipeline::pipelines::pipeline_cache::GfxPipelineCacheHeader;
use truvis_pipeline::settings::GfxPipelineSettings;

const DEFAULT_CACHE_FILE: &str = "pipeline_cache.bin";

fn load_settings() -> anyhow::Result<GfxPipelineSettings> {
    let settings_path = match std::env::args().nth(1) {
        Some(path) => path.into(),
        None => {
            let default_path = TruvisPath::config_path("pipeline.toml");
            if !default_path.exists() {
                log::info!("{} not found, use default settings", default_path.display());
                return Ok(GfxPipelineSettings::default());
            }
            default_path
        }
    };

    GfxPipelineSettings::from_file(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))
}

fn main() -> anyhow::Result<()> {
    init_log(log::LevelFilter::Info);

    let settings = load_settings()?;
    let cache_path =
        settings.resolved_cache_path().unwrap_or_else(|| TruvisPath::pipeline_cache_path(DEFAULT_CACHE_FILE));

    let data = std::fs::read(&cache_path)
        .with_context(|| format!("failed to read pipeline cache {}", cache_path.display()))?;
    let header = GfxPipelineCacheHeader::parse(&data)
        .with_context(|| format!("pipeline cache {} is too short: {} bytes", cache_path.display(), data.len()))?;

    log::info!("pipeline cache: {}", cache_path.display());
    log::info!("  total size: {} bytes", data.len());
    log::info!("  header size: {}", header.header_size);
    log::info!("  header version: {}", header.header_version);
    log::info!("  vendor id: {:#06x}", header.vendor_id);
    log::info!("  device id: {:#06x}", header.device_id);
    log::info!(
        "  pipeline cache uuid: {}",
        header.pipeline_cache_uuid.iter().map(|byte| format!("{byte:02x}")).join("")
    );

    if header.header_version != vk::PipelineCacheHeaderVersion::ONE.as_raw() as u32 {
        log::warn!("unknown header version, the cache will be ignored");
    }
    if (header.header_size as usize) < size_of::<GfxPipelineCacheHeader>() {
        log::warn!("header size is smaller than {} bytes, the cache will be ignored", size_of::<GfxPipelineCacheHeader>());
    }

    Ok(())
}
