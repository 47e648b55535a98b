use std::ffi::CStr;

use ash::vk;

/// pipeline 中的一个 shader stage
///
/// shader module 由调用者创建和销毁，需要保证在 pipeline 创建期间有效
#[derive(Clone, Copy, Debug)]
pub struct GfxShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: &'static CStr,
}
impl GfxShaderStageInfo {
    #[inline]
    pub fn new(stage: vk::ShaderStageFlags, module: vk::ShaderModule, entry_point: &'static CStr) -> Self {
        Self {
            stage,
            module,
            entry_point,
        }
    }

    #[inline]
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default().stage(self.stage).module(self.module).name(self.entry_point)
    }
}

/// 用于 RayTracing Pipeline 的创建
///
/// 在 pipeline create info 的 groups 中，每个 shader group 的 index
///
/// 每个 shader group 可以由多个 shader 组成，每个 shader group 都是独一无二的
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxShaderGroupInfo {
    pub ty: vk::RayTracingShaderGroupTypeKHR,
    pub general: u32,
    pub closest_hit: u32,
    pub any_hit: u32,
    pub intersection: u32,
}
impl GfxShaderGroupInfo {
    pub const fn unused() -> Self {
        Self {
            ty: vk::RayTracingShaderGroupTypeKHR::GENERAL,
            general: vk::SHADER_UNUSED_KHR,
            closest_hit: vk::SHADER_UNUSED_KHR,
            any_hit: vk::SHADER_UNUSED_KHR,
            intersection: vk::SHADER_UNUSED_KHR,
        }
    }

    /// ray gen, miss, callable
    pub const fn general(stage: u32) -> Self {
        Self {
            general: stage,
            ..Self::unused()
        }
    }

    pub fn triangles_hit(closest_hit: u32, any_hit: Option<u32>) -> Self {
        Self {
            ty: vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP,
            closest_hit,
            any_hit: any_hit.unwrap_or(vk::SHADER_UNUSED_KHR),
            ..Self::unused()
        }
    }

    pub fn procedural_hit(intersection: u32, closest_hit: Option<u32>, any_hit: Option<u32>) -> Self {
        Self {
            ty: vk::RayTracingShaderGroupTypeKHR::PROCEDURAL_HIT_GROUP,
            intersection,
            closest_hit: closest_hit.unwrap_or(vk::SHADER_UNUSED_KHR),
            any_hit: any_hit.unwrap_or(vk::SHADER_UNUSED_KHR),
            ..Self::unused()
        }
    }

    /// 该 group 引用到的所有 shader stage index
    pub fn referenced_stages(&self) -> impl Iterator<Item = u32> {
        [self.general, self.closest_hit, self.any_hit, self.intersection]
            .into_iter()
            .filter(|idx| *idx != vk::SHADER_UNUSED_KHR)
    }

    #[inline]
    pub fn group_create_info(&self) -> vk::RayTracingShaderGroupCreateInfoKHR<'static> {
        vk::RayTracingShaderGroupCreateInfoKHR {
            ty: self.ty,
            general_shader: self.general,
            closest_hit_shader: self.closest_hit,
            any_hit_shader: self.any_hit,
            intersection_shader: self.intersection,
            ..Default::default()
        }
    }
}
