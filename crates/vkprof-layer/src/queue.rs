//! Queue submission and presentation hooks.

use std::mem::size_of;

use ash::vk;
use ash::vk::Handle;
use tracing::{trace, warn};
use vkprof_core::{ProfilerError, SyncMode, TimestampReader};

use crate::dispatch::{raw_slice, DeviceRecord};
use crate::handle_store;

/// Reads timestamps back from the command buffers' query pools, blocking
/// until results are available.
pub struct QueryPoolReader<'a> {
    record: &'a DeviceRecord,
}

impl<'a> QueryPoolReader<'a> {
    pub fn new(record: &'a DeviceRecord) -> Self {
        Self { record }
    }
}

impl TimestampReader for QueryPoolReader<'_> {
    fn read_timestamps(&mut self, command_buffer: vk::CommandBuffer, count: u32) -> vkprof_core::Result<Vec<u64>> {
        let pool = self
            .record
            .query_pools
            .get(&command_buffer)
            .map(|p| *p)
            .ok_or(ProfilerError::HandleNotFound(command_buffer.as_raw()))?;

        let mut timestamps = vec![0u64; count as usize];
        let result = unsafe {
            (self.record.fp.get_query_pool_results)(
                self.record.handle,
                pool,
                0,
                count,
                timestamps.len() * size_of::<u64>(),
                timestamps.as_mut_ptr().cast(),
                size_of::<u64>() as vk::DeviceSize,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
            )
        };
        if result != vk::Result::SUCCESS {
            return Err(result.into());
        }
        Ok(timestamps)
    }
}

pub unsafe extern "system" fn vkprof_QueueSubmit(
    queue: vk::Queue,
    submit_count: u32,
    p_submits: *const vk::SubmitInfo<'_>,
    fence: vk::Fence,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(queue) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let result = unsafe { (record.fp.queue_submit)(queue, submit_count, p_submits, fence) };
    if result != vk::Result::SUCCESS {
        return result;
    }

    let submits: Vec<Vec<vk::CommandBuffer>> = unsafe { raw_slice(p_submits, submit_count) }
        .iter()
        .map(|info| unsafe { raw_slice(info.p_command_buffers, info.command_buffer_count) }.to_vec())
        .collect();
    trace!("submit on {:?}: {} submit infos", queue, submits.len());
    record.profiler.submit(queue, submits);

    if record.profiler.sync_mode() == SyncMode::Submit {
        if let Err(e) = record.profiler.resolve_pending(&mut QueryPoolReader::new(&record)) {
            warn!("failed to resolve submit on {:?}: {}", queue, e);
        }
    }
    result
}

pub unsafe extern "system" fn vkprof_QueuePresentKHR(
    queue: vk::Queue,
    p_present_info: *const vk::PresentInfoKHR<'_>,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(queue) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };

    if let Some(overlay) = record.overlay.lock().as_mut() {
        let result = unsafe { overlay.draw_frame_stats(&record.fp) };
        if result != vk::Result::SUCCESS {
            warn!("overlay recording failed: {:?}", result);
        }
    }

    finish_frame(&record);
    unsafe { (record.swapchain.queue_present_khr)(queue, p_present_info) }
}

/// Read back pending submissions that involve any of `command_buffers`
/// before their query slots are reset or destroyed.
pub fn resolve_if_pending(record: &DeviceRecord, command_buffers: &[vk::CommandBuffer]) {
    if !command_buffers.iter().any(|cb| record.profiler.is_pending(*cb)) {
        return;
    }
    if let Err(e) = record.profiler.resolve_pending(&mut QueryPoolReader::new(record)) {
        warn!("failed to resolve submits ahead of command buffer reuse: {}", e);
    }
}

/// Resolve everything submitted since the last frame and publish it.
pub fn finish_frame(record: &DeviceRecord) -> vk::Result {
    match record.profiler.finish_frame(&mut QueryPoolReader::new(record)) {
        Ok(frame) => {
            trace!("frame {} published, {} ticks", frame.index, frame.ticks);
            vk::Result::SUCCESS
        }
        Err(e) => {
            warn!("frame finished with unreadable timestamps: {}", e);
            e.to_vk_result()
        }
    }
}
