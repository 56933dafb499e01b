//! Conversion of frame data into the region tree reported through the
//! profiler extension API.

use ash::vk;

use crate::data::{
    CommandBufferData, DrawcallData, DrawcallType, FrameData, PipelineData, RenderPassData,
    SubmitBatchData, SubmitData, SubpassData,
};

/// `VkProfilerCommandTypeEXT`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Unknown = 0,
    Draw = 1,
    DrawIndexed = 2,
    DrawIndirect = 3,
    DrawIndexedIndirect = 4,
    DrawIndirectCount = 5,
    DrawIndexedIndirectCount = 6,
    Dispatch = 7,
    DispatchIndirect = 8,
    CopyBuffer = 9,
    CopyBufferToImage = 10,
    CopyImage = 11,
    CopyImageToBuffer = 12,
    ClearAttachments = 13,
    ClearColorImage = 14,
    ClearDepthStencilImage = 15,
    ResolveImage = 16,
    BlitImage = 17,
    FillBuffer = 18,
    UpdateBuffer = 19,
}

impl From<DrawcallType> for CommandType {
    fn from(kind: DrawcallType) -> Self {
        match kind {
            DrawcallType::Draw => CommandType::Draw,
            DrawcallType::DrawIndexed => CommandType::DrawIndexed,
            DrawcallType::DrawIndirect => CommandType::DrawIndirect,
            DrawcallType::DrawIndexedIndirect => CommandType::DrawIndexedIndirect,
            DrawcallType::DrawIndirectCount => CommandType::DrawIndirectCount,
            DrawcallType::DrawIndexedIndirectCount => CommandType::DrawIndexedIndirectCount,
            DrawcallType::Dispatch => CommandType::Dispatch,
            DrawcallType::DispatchIndirect => CommandType::DispatchIndirect,
            DrawcallType::CopyBuffer => CommandType::CopyBuffer,
            DrawcallType::CopyBufferToImage => CommandType::CopyBufferToImage,
            DrawcallType::CopyImage => CommandType::CopyImage,
            DrawcallType::CopyImageToBuffer => CommandType::CopyImageToBuffer,
            DrawcallType::ClearAttachments => CommandType::ClearAttachments,
            DrawcallType::ClearColorImage => CommandType::ClearColorImage,
            DrawcallType::ClearDepthStencilImage => CommandType::ClearDepthStencilImage,
            DrawcallType::ResolveImage => CommandType::ResolveImage,
            DrawcallType::BlitImage => CommandType::BlitImage,
            DrawcallType::FillBuffer => CommandType::FillBuffer,
            DrawcallType::UpdateBuffer => CommandType::UpdateBuffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionKind {
    Frame,
    Submit { queue: vk::Queue },
    SubmitInfo,
    CommandBuffer { handle: vk::CommandBuffer, level: vk::CommandBufferLevel },
    RenderPass { handle: vk::RenderPass, begin_duration: f32, end_duration: f32 },
    Subpass { index: u32, contents: vk::SubpassContents },
    Pipeline { handle: vk::Pipeline },
    Command { command: CommandType },
}

/// A node of the reported region tree. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub kind: RegionKind,
    pub duration: f32,
    pub subregions: Vec<Region>,
}

impl Region {
    /// Number of regions in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.subregions.iter().map(Region::count).sum::<usize>()
    }
}

pub struct RegionBuilder {
    period_ms: f32,
}

impl RegionBuilder {
    /// `timestamp_period` is in nanoseconds per tick.
    pub fn new(timestamp_period: f32) -> Self {
        Self {
            period_ms: timestamp_period / 1_000_000.0,
        }
    }

    pub fn duration(&self, ticks: u64) -> f32 {
        ticks as f32 * self.period_ms
    }

    pub fn frame(&self, data: &FrameData) -> Region {
        Region {
            kind: RegionKind::Frame,
            duration: self.duration(data.ticks),
            subregions: data.submits.iter().map(|s| self.submit(s)).collect(),
        }
    }

    pub fn submit(&self, data: &SubmitBatchData) -> Region {
        Region {
            kind: RegionKind::Submit { queue: data.queue },
            duration: 0.0,
            subregions: data.submits.iter().map(|s| self.submit_info(s)).collect(),
        }
    }

    pub fn submit_info(&self, data: &SubmitData) -> Region {
        Region {
            kind: RegionKind::SubmitInfo,
            duration: 0.0,
            subregions: data.command_buffers.iter().map(|c| self.command_buffer(c)).collect(),
        }
    }

    pub fn command_buffer(&self, data: &CommandBufferData) -> Region {
        Region {
            kind: RegionKind::CommandBuffer {
                handle: data.handle,
                level: data.level,
            },
            duration: self.duration(data.ticks),
            subregions: data.render_passes.iter().map(|r| self.render_pass(r)).collect(),
        }
    }

    pub fn render_pass(&self, data: &RenderPassData) -> Region {
        Region {
            kind: RegionKind::RenderPass {
                handle: data.handle,
                begin_duration: self.duration(data.begin_ticks),
                end_duration: self.duration(data.end_ticks),
            },
            duration: self.duration(data.ticks),
            subregions: data.subpasses.iter().map(|s| self.subpass(s)).collect(),
        }
    }

    /// Inline subpasses list their pipelines; subpasses recorded from
    /// secondary command buffers list those command buffers.
    pub fn subpass(&self, data: &SubpassData) -> Region {
        let subregions = if data.contents == vk::SubpassContents::SECONDARY_COMMAND_BUFFERS {
            data.secondary_command_buffers
                .iter()
                .map(|c| self.command_buffer(c))
                .collect()
        } else {
            data.pipelines.iter().map(|p| self.pipeline(p)).collect()
        };
        Region {
            kind: RegionKind::Subpass {
                index: data.index,
                contents: data.contents,
            },
            duration: self.duration(data.ticks),
            subregions,
        }
    }

    pub fn pipeline(&self, data: &PipelineData) -> Region {
        Region {
            kind: RegionKind::Pipeline { handle: data.handle },
            duration: self.duration(data.ticks),
            subregions: data.drawcalls.iter().map(|d| self.drawcall(d)).collect(),
        }
    }

    pub fn drawcall(&self, data: &DrawcallData) -> Region {
        Region {
            kind: RegionKind::Command {
                command: data.kind.into(),
            },
            duration: self.duration(data.ticks),
            subregions: Vec::new(),
        }
    }
}
