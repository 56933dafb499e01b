//! Resolved profiling data for one frame.
//!
//! Durations are raw GPU ticks; multiply by the device's `timestampPeriod`
//! to get nanoseconds (see [`crate::region::RegionBuilder`]).

use std::time::Duration;

use ash::vk;

/// Kind of a profiled command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawcallType {
    Draw,
    DrawIndexed,
    DrawIndirect,
    DrawIndexedIndirect,
    DrawIndirectCount,
    DrawIndexedIndirectCount,
    Dispatch,
    DispatchIndirect,
    CopyBuffer,
    CopyBufferToImage,
    CopyImage,
    CopyImageToBuffer,
    ClearAttachments,
    ClearColorImage,
    ClearDepthStencilImage,
    ResolveImage,
    BlitImage,
    FillBuffer,
    UpdateBuffer,
}

impl DrawcallType {
    /// Pipeline bind point whose bound pipeline executes this command.
    /// Transfer and clear commands are not tied to a bound pipeline.
    pub fn bind_point(self) -> Option<vk::PipelineBindPoint> {
        match self {
            DrawcallType::Draw
            | DrawcallType::DrawIndexed
            | DrawcallType::DrawIndirect
            | DrawcallType::DrawIndexedIndirect
            | DrawcallType::DrawIndirectCount
            | DrawcallType::DrawIndexedIndirectCount => Some(vk::PipelineBindPoint::GRAPHICS),
            DrawcallType::Dispatch | DrawcallType::DispatchIndirect => {
                Some(vk::PipelineBindPoint::COMPUTE)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawcallData {
    pub kind: DrawcallType,
    pub ticks: u64,
}

/// Commands executed while one pipeline was bound. Commands that do not use a
/// pipeline are grouped under a null handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineData {
    pub handle: vk::Pipeline,
    pub ticks: u64,
    pub drawcalls: Vec<DrawcallData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubpassData {
    pub index: u32,
    pub contents: vk::SubpassContents,
    pub ticks: u64,
    pub pipelines: Vec<PipelineData>,
    pub secondary_command_buffers: Vec<CommandBufferData>,
}

/// A render pass instance. Commands recorded outside of any render pass are
/// collected in a render pass with a null handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassData {
    pub handle: vk::RenderPass,
    pub ticks: u64,
    pub begin_ticks: u64,
    pub end_ticks: u64,
    pub subpasses: Vec<SubpassData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBufferData {
    pub handle: vk::CommandBuffer,
    pub level: vk::CommandBufferLevel,
    pub ticks: u64,
    pub render_passes: Vec<RenderPassData>,
}

/// One `VkSubmitInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitData {
    pub command_buffers: Vec<CommandBufferData>,
}

/// One `vkQueueSubmit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitBatchData {
    pub queue: vk::Queue,
    pub submits: Vec<SubmitData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryHeapData {
    pub heap_index: u32,
    pub allocation_count: u32,
    pub allocated_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryData {
    pub heaps: Vec<MemoryHeapData>,
    pub total_allocation_count: u32,
    pub total_allocated_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameData {
    /// Number of frames finished before this one.
    pub index: u64,
    /// Sum of the command buffer ticks of all submits in the frame.
    pub ticks: u64,
    /// Host time since the previous frame finished.
    pub cpu_time: Duration,
    pub submits: Vec<SubmitBatchData>,
    pub memory: MemoryData,
}

impl FrameData {
    pub fn command_buffers(&self) -> impl Iterator<Item = &CommandBufferData> {
        self.submits
            .iter()
            .flat_map(|batch| batch.submits.iter())
            .flat_map(|submit| submit.command_buffers.iter())
    }
}
