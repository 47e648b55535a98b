use ash::vk;

use crate::error::{PipelineError, Result};

/// 录制时传入的一段 push constant 数据
#[derive(Debug, Clone, Copy)]
pub struct GfxPushConstant<'a> {
    pub stage: vk::ShaderStageFlags,
    pub offset: u32,
    pub data: &'a [u8],
}
impl<'a> GfxPushConstant<'a> {
    #[inline]
    pub fn new(stage: vk::ShaderStageFlags, offset: u32, data: &'a [u8]) -> Self {
        Self { stage, offset, data }
    }

    #[inline]
    pub fn from_pod<T: bytemuck::Pod>(stage: vk::ShaderStageFlags, offset: u32, data: &'a T) -> Self {
        Self::new(stage, offset, bytemuck::bytes_of(data))
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }
}

/// pipeline layout 中声明的 push constant ranges
///
/// 按照添加的顺序保存，不做合并，也不检查重叠
#[derive(Debug, Clone, Default)]
pub struct GfxPushConstantRanges {
    ranges: Vec<vk::PushConstantRange>,
}
impl GfxPushConstantRanges {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_range(&mut self, stage: vk::ShaderStageFlags, offset: u32, size: u32) -> &mut Self {
        self.ranges.push(vk::PushConstantRange {
            stage_flags: stage,
            offset,
            size,
        });
        self
    }

    /// 用于创建 pipeline layout
    #[inline]
    pub fn ranges(&self) -> &[vk::PushConstantRange] {
        &self.ranges
    }

    /// 检查一段 push constant 数据是否可以被录制
    ///
    /// - 对于数据 stage 中的每一个 stage bit，包含该 bit 的 range 的并集需要覆盖数据的每一个字节
    /// - 与数据有重叠的 range，其 stage 必须全部包含在数据的 stage 中
    pub fn validate(&self, push_constants: &[GfxPushConstant]) -> Result<()> {
        for push_constant in push_constants {
            if !self.is_valid(push_constant) {
                return Err(PipelineError::PushConstantOutOfRange {
                    stage: push_constant.stage,
                    offset: push_constant.offset,
                    size: push_constant.size(),
                });
            }
        }
        Ok(())
    }

    fn is_valid(&self, push_constant: &GfxPushConstant) -> bool {
        if push_constant.data.is_empty() || push_constant.stage.is_empty() {
            return false;
        }
        let begin = push_constant.offset as u64;
        let end = begin + push_constant.data.len() as u64;

        let stages_covered = stage_bits(push_constant.stage).all(|bit| self.covers(bit, begin, end));
        let overlapping_stages_included = self
            .ranges
            .iter()
            .filter(|range| {
                let range_begin = range.offset as u64;
                let range_end = range_begin + range.size as u64;
                range_begin < end && begin < range_end
            })
            .all(|range| push_constant.stage.contains(range.stage_flags));

        stages_covered && overlapping_stages_included
    }

    /// 包含 `stage` 的 ranges 的并集是否覆盖 `[begin, end)`
    fn covers(&self, stage: vk::ShaderStageFlags, begin: u64, end: u64) -> bool {
        let mut cursor = begin;
        while cursor < end {
            let reach = self
                .ranges
                .iter()
                .filter(|range| range.stage_flags.contains(stage))
                .map(|range| (range.offset as u64, range.offset as u64 + range.size as u64))
                .filter(|&(range_begin, range_end)| range_begin <= cursor && cursor < range_end)
                .map(|(_, range_end)| range_end)
                .max();
            match reach {
                Some(range_end) => cursor = range_end,
                None => return false,
            }
        }
        true
    }
}

/// 将 stage flags 拆分为单个的 bit
fn stage_bits(stage: vk::ShaderStageFlags) -> impl Iterator<Item = vk::ShaderStageFlags> {
    let raw = stage.as_raw();
    (0..u32::BITS).map(|i| 1u32 << i).filter(move |bit| raw & bit != 0).map(vk::ShaderStageFlags::from_raw)
}
