use std::path::{Path, PathBuf};
use std::rc::Rc;

use ash::vk;

use crate::error::Result;
use crate::foundation::debug::{DebugType, set_debug_name};
use crate::foundation::device::PipelineDevice;
use crate::settings::GfxPipelineSettings;

/// `vkGetPipelineCacheData` 返回数据的 header（`VK_PIPELINE_CACHE_HEADER_VERSION_ONE`）
///
/// 文件中的数据是小端序，和 driver 写出时一致
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GfxPipelineCacheHeader {
    pub header_size: u32,
    pub header_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    /// 包含了 driver 版本信息
    pub pipeline_cache_uuid: [u8; vk::UUID_SIZE],
}
impl GfxPipelineCacheHeader {
    /// 数据不足一个 header 时返回 None
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header_bytes = data.get(..size_of::<Self>())?;
        Some(bytemuck::pod_read_unaligned(header_bytes))
    }
}

#[derive(Clone, Debug, Default)]
pub struct GfxPipelineCacheCreateInfo {
    /// 用于初始化 cache 的文件，文件不存在或者不匹配时会创建一个空的 cache
    pub source_path: Option<PathBuf>,
}
impl GfxPipelineCacheCreateInfo {
    #[inline]
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: Some(source_path.into()),
        }
    }

    #[inline]
    pub fn from_settings(settings: &GfxPipelineSettings) -> Self {
        Self {
            source_path: settings.resolved_cache_path(),
        }
    }
}

/// pipeline cache，可以从文件中恢复，也可以写回到文件中
pub struct GfxPipelineCache {
    handle: vk::PipelineCache,
    /// 是否使用了文件中的数据进行初始化
    seeded: bool,

    device: Rc<dyn PipelineDevice>,
}
impl GfxPipelineCache {
    pub fn new(
        device: Rc<dyn PipelineDevice>,
        create_info: &GfxPipelineCacheCreateInfo,
        debug_name: &str,
    ) -> Result<Self> {
        let initial_data = match &create_info.source_path {
            Some(path) => Self::load_cache_file(device.as_ref(), path),
            None => {
                log::info!("no pipeline cache file specified, create an empty pipeline cache");
                None
            }
        };

        let handle = device.create_pipeline_cache(initial_data.as_deref().unwrap_or_default())?;
        let cache = Self {
            handle,
            seeded: initial_data.is_some(),
            device,
        };
        set_debug_name(cache.device.as_ref(), &cache, debug_name);

        Ok(cache)
    }

    /// 读取并校验 cache 文件，不可用时返回 None
    fn load_cache_file(device: &dyn PipelineDevice, path: &Path) -> Option<Vec<u8>> {
        if !path.exists() {
            log::info!("pipeline cache file {:?} does not exist, create an empty pipeline cache", path);
            return None;
        }

        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                log::warn!("failed to read pipeline cache file {:?}: {}", path, err);
                return None;
            }
        };

        let Some(header) = GfxPipelineCacheHeader::parse(&data) else {
            log::warn!("pipeline cache file {:?} is too short: {} bytes", path, data.len());
            return None;
        };
        if !device.is_pipeline_cache_valid(&header) {
            log::warn!("pipeline cache file {:?} does not match current device: {:?}", path, header);
            return None;
        }

        log::info!("load pipeline cache from {:?}, {} bytes", path, data.len());
        Some(data)
    }

    /// 将 driver 中 cache 的数据写入到文件中，会覆盖已有的文件
    pub fn save_cache_to_file(device: &dyn PipelineDevice, handle: vk::PipelineCache, path: &Path) -> Result<()> {
        let data = device.get_pipeline_cache_data(handle)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &data)?;

        log::info!("save pipeline cache to {:?}, {} bytes", path, data.len());
        Ok(())
    }

    #[inline]
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        Self::save_cache_to_file(self.device.as_ref(), self.handle, path.as_ref())
    }

    /// 将其他 cache 合并到这个 cache 中
    pub fn merge_from(&self, src_caches: &[vk::PipelineCache]) -> Result<()> {
        self.device.merge_pipeline_caches(self.handle, src_caches)?;
        Ok(())
    }

    pub fn destroy(&mut self) {
        if self.handle == vk::PipelineCache::null() {
            return;
        }
        self.device.destroy_pipeline_cache(self.handle);
        self.handle = vk::PipelineCache::null();
        self.seeded = false;
    }
}
// getters
impl GfxPipelineCache {
    #[inline]
    pub fn handle(&self) -> vk::PipelineCache {
        self.handle
    }

    #[inline]
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// cache 已经创建，但没有使用文件中的数据
    #[inline]
    pub fn is_empty_cache(&self) -> bool {
        !self.seeded && self.handle != vk::PipelineCache::null()
    }
}
impl Drop for GfxPipelineCache {
    fn drop(&mut self) {
        self.destroy();
    }
}
impl DebugType for GfxPipelineCache {
    fn debug_type_name() -> &'static str {
        "GfxPipelineCache"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;
    use crate::test_utils::{DEVICE_ID, DeviceCall, PIPELINE_CACHE_UUID, RecordingDevice, cache_blob, valid_cache_blob};

    fn temp_cache_path() -> PathBuf {
        std::env::temp_dir().join(format!("truvis-pipeline-cache-{}.bin", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_valid_file_seeds_cache() {
        let path = temp_cache_path();
        let blob = valid_cache_blob(b"compiled pipelines");
        std::fs::write(&path, &blob).unwrap();

        let device = RecordingDevice::new();
        let cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::new(&path), "test").unwrap();

        assert!(cache.is_seeded());
        assert!(!cache.is_empty_cache());
        assert_ne!(cache.handle(), vk::PipelineCache::null());
        assert_eq!(device.cache_initial_data.borrow()[0], blob);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_creates_empty_cache() {
        let device = RecordingDevice::new();
        let cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::new(temp_cache_path()), "test").unwrap();

        assert!(!cache.is_seeded());
        assert!(cache.is_empty_cache());
        assert!(device.cache_initial_data.borrow()[0].is_empty());

        let no_path = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::default(), "test").unwrap();
        assert!(no_path.is_empty_cache());
    }

    #[test]
    fn test_mismatched_header_is_treated_as_missing() {
        let path = temp_cache_path();
        std::fs::write(&path, cache_blob(0x1002, DEVICE_ID, PIPELINE_CACHE_UUID, b"other vendor")).unwrap();

        let device = RecordingDevice::new();
        let cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::new(&path), "test").unwrap();
        assert!(!cache.is_seeded());
        assert!(cache.is_empty_cache());

        // driver 升级之后 uuid 会变化
        std::fs::write(&path, cache_blob(crate::test_utils::VENDOR_ID, DEVICE_ID, [1; 16], b"")).unwrap();
        let cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::new(&path), "test").unwrap();
        assert!(cache.is_empty_cache());

        std::fs::write(&path, [0u8; 7]).unwrap();
        let cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::new(&path), "test").unwrap();
        assert!(cache.is_empty_cache());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_save_writes_driver_data() {
        let device = RecordingDevice::new();
        let cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::default(), "test").unwrap();

        let path = std::env::temp_dir().join(format!("truvis-pipeline-{}", uuid::Uuid::new_v4())).join("cache.bin");
        cache.save_to_file(&path).unwrap();

        let saved = std::fs::read(&path).unwrap();
        assert_eq!(saved, device.get_pipeline_cache_data(cache.handle()).unwrap());

        let header = GfxPipelineCacheHeader::parse(&saved).unwrap();
        assert!(device.is_pipeline_cache_valid(&header));

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let device = RecordingDevice::new();
        let mut cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::default(), "test").unwrap();
        let handle = cache.handle();

        cache.destroy();
        cache.destroy();
        drop(cache);

        assert_eq!(cache_destroy_count(&device, handle), 1);
    }

    #[test]
    fn test_debug_name_from_caller() {
        let device = RecordingDevice::new();
        let cache = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::default(), "worker-3").unwrap();

        assert_eq!(
            device.debug_names.borrow().last(),
            Some(&(vk::ObjectType::PIPELINE_CACHE, cache.handle().as_raw(), "GfxPipelineCache::worker-3".to_string()))
        );
    }

    #[test]
    fn test_merge_from_other_caches() {
        let device = RecordingDevice::new();
        let main = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::default(), "main").unwrap();
        let worker_a = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::default(), "a").unwrap();
        let worker_b = GfxPipelineCache::new(device.clone(), &GfxPipelineCacheCreateInfo::default(), "b").unwrap();

        main.merge_from(&[worker_a.handle(), worker_b.handle()]).unwrap();

        assert!(device.calls().contains(&DeviceCall::MergePipelineCaches(
            main.handle(),
            vec![worker_a.handle(), worker_b.handle()]
        )));
    }

    fn cache_destroy_count(device: &RecordingDevice, handle: vk::PipelineCache) -> usize {
        device.calls().iter().filter(|call| **call == DeviceCall::DestroyPipelineCache(handle)).count()
    }
}
