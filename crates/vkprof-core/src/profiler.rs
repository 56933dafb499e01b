use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::command_buffer::{CommandBufferProfiler, TimestampReader, TimestampWriter};
use crate::config::{ProfilerConfig, ProfilerMode, SyncMode};
use crate::data::{FrameData, SubmitBatchData, SubmitData};
use crate::error::{ProfilerError, Result};
use crate::memory::MemoryTracker;
use crate::pipeline::PipelineRegistry;

/// A `vkQueueSubmit` whose timestamps have not been read yet. Recorders are
/// copied at submit time so re-recording before present cannot change what
/// gets resolved.
struct PendingBatch {
    queue: vk::Queue,
    submits: Vec<Vec<CommandBufferProfiler>>,
    secondaries: HashMap<vk::CommandBuffer, CommandBufferProfiler>,
}

impl PendingBatch {
    fn contains(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.submits.iter().flatten().any(|p| p.handle() == command_buffer)
            || self.secondaries.contains_key(&command_buffer)
    }
}

struct FrameState {
    pending: Vec<PendingBatch>,
    collected: Vec<SubmitBatchData>,
    frame_index: u64,
    last_finish: Instant,
}

/// Profiling state owned by one `VkDevice`.
///
/// All methods take `&self`; command buffers recorded on different threads
/// only contend on their map shard.
pub struct DeviceProfiler {
    timestamp_period: f32,
    query_pool_size: u32,
    memory_tracking: bool,
    modes: RwLock<(ProfilerMode, SyncMode)>,
    command_buffers: DashMap<vk::CommandBuffer, CommandBufferProfiler>,
    memory: MemoryTracker,
    pipelines: PipelineRegistry,
    frame: Mutex<FrameState>,
    latest: Mutex<Option<Arc<FrameData>>>,
}

impl DeviceProfiler {
    pub fn new(
        config: &ProfilerConfig,
        timestamp_period: f32,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
    ) -> Self {
        Self {
            timestamp_period,
            query_pool_size: config.query_pool_size,
            memory_tracking: config.memory_tracking,
            modes: RwLock::new((config.mode, config.sync_mode)),
            command_buffers: DashMap::new(),
            memory: MemoryTracker::new(memory_properties),
            pipelines: PipelineRegistry::new(),
            frame: Mutex::new(FrameState {
                pending: Vec::new(),
                collected: Vec::new(),
                frame_index: 0,
                last_finish: Instant::now(),
            }),
            latest: Mutex::new(None),
        }
    }

    /// Nanoseconds per timestamp tick.
    pub fn timestamp_period(&self) -> f32 {
        self.timestamp_period
    }

    pub fn query_pool_size(&self) -> u32 {
        self.query_pool_size
    }

    pub fn mode(&self) -> ProfilerMode {
        self.modes.read().0
    }

    /// Takes effect for command buffers recorded after the call.
    pub fn set_mode(&self, mode: ProfilerMode) {
        debug!("profiler mode set to {:?}", mode);
        self.modes.write().0 = mode;
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.modes.read().1
    }

    pub fn set_sync_mode(&self, sync_mode: SyncMode) {
        debug!("profiler sync mode set to {:?}", sync_mode);
        self.modes.write().1 = sync_mode;
    }

    // ── Memory ──────────────────────────────────────────────

    pub fn memory(&self) -> &MemoryTracker {
        &self.memory
    }

    pub fn on_allocate_memory(&self, memory: vk::DeviceMemory, info: &vk::MemoryAllocateInfo<'_>) {
        if self.memory_tracking {
            trace!("allocated {:?}: {} bytes, type {}", memory, info.allocation_size, info.memory_type_index);
            self.memory.register(memory, info);
        }
    }

    pub fn on_free_memory(&self, memory: vk::DeviceMemory) {
        if self.memory_tracking {
            self.memory.unregister(memory);
        }
    }

    // ── Pipelines ───────────────────────────────────────────

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    pub fn create_pipelines(&self, bind_point: vk::PipelineBindPoint, pipelines: &[(vk::Pipeline, u32)]) {
        self.pipelines.register(bind_point, pipelines);
    }

    pub fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.pipelines.unregister(pipeline);
    }

    // ── Command buffers ─────────────────────────────────────

    pub fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        command_buffers: &[vk::CommandBuffer],
    ) {
        for &cb in command_buffers {
            if cb != vk::CommandBuffer::null() {
                self.command_buffers
                    .insert(cb, CommandBufferProfiler::new(cb, level, pool));
            }
        }
    }

    /// Drop profiler state of freed command buffers.
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        for cb in command_buffers {
            self.command_buffers.remove(cb);
        }
    }

    /// Drop every command buffer allocated from `pool` and return their handles.
    pub fn free_command_pool(&self, pool: vk::CommandPool) -> Vec<vk::CommandBuffer> {
        let freed: Vec<vk::CommandBuffer> = self
            .command_buffers
            .iter()
            .filter(|entry| entry.value().pool() == pool)
            .map(|entry| *entry.key())
            .collect();
        self.free_command_buffers(&freed);
        freed
    }

    pub fn is_tracked(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.command_buffers.contains_key(&command_buffer)
    }

    /// Pool and level the command buffer was allocated with.
    pub fn command_buffer_info(
        &self,
        command_buffer: vk::CommandBuffer,
    ) -> Option<(vk::CommandPool, vk::CommandBufferLevel)> {
        self.command_buffers.get(&command_buffer).map(|p| (p.pool(), p.level()))
    }

    /// Run `f` on the recorder of `command_buffer`. Returns `None` for command
    /// buffers the layer did not see being allocated.
    pub fn with_command_buffer<R>(
        &self,
        command_buffer: vk::CommandBuffer,
        f: impl FnOnce(&mut CommandBufferProfiler) -> R,
    ) -> Option<R> {
        self.command_buffers.get_mut(&command_buffer).map(|mut p| f(&mut p))
    }

    /// Start recording `command_buffer` in the current mode.
    pub fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        capacity: u32,
        writer: &mut dyn TimestampWriter,
    ) {
        let mode = self.mode();
        self.with_command_buffer(command_buffer, |p| p.begin(mode, capacity, writer));
    }

    // ── Submission and frames ───────────────────────────────

    /// Queue a submission for resolution. Command buffers the layer did not
    /// see being allocated are skipped.
    pub fn submit(&self, queue: vk::Queue, submits: Vec<Vec<vk::CommandBuffer>>) {
        let snapshot = |cb: &vk::CommandBuffer| self.command_buffers.get(cb).map(|p| p.clone());
        let submits: Vec<Vec<CommandBufferProfiler>> = submits
            .iter()
            .map(|command_buffers| command_buffers.iter().filter_map(snapshot).collect())
            .collect();
        let secondaries = submits
            .iter()
            .flatten()
            .flat_map(|p| p.executed_secondaries())
            .filter_map(|cb| snapshot(&cb).map(|p| (cb, p)))
            .collect();
        self.frame.lock().pending.push(PendingBatch {
            queue,
            submits,
            secondaries,
        });
    }

    pub fn pending_submit_count(&self) -> usize {
        self.frame.lock().pending.len()
    }

    /// Whether `command_buffer` belongs to a submission not resolved yet.
    pub fn is_pending(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.frame.lock().pending.iter().any(|b| b.contains(command_buffer))
    }

    /// Read back timestamps of every pending submit and move the results
    /// into the current frame. A command buffer whose timestamps cannot be
    /// read keeps its structure with zero ticks; the first error is returned
    /// after all batches are processed.
    pub fn resolve_pending(&self, reader: &mut dyn TimestampReader) -> Result<()> {
        // Reads wait on the GPU; keep the frame unlocked meanwhile.
        let pending = std::mem::take(&mut self.frame.lock().pending);
        let mut first_error: Option<ProfilerError> = None;
        let mut resolved = Vec::with_capacity(pending.len());

        for batch in pending {
            let secondary = |cb: vk::CommandBuffer| {
                batch.secondaries.get(&cb).map(|p| p.resolve(&[], &|_| None))
            };
            let submits = batch
                .submits
                .iter()
                .map(|recorders| SubmitData {
                    command_buffers: recorders
                        .iter()
                        .map(|recorder| {
                            let timestamps = read_recorded(recorder, reader).unwrap_or_else(|e| {
                                warn!("failed to read timestamps of {:?}: {}", recorder.handle(), e);
                                if first_error.is_none() {
                                    first_error = Some(e);
                                }
                                Vec::new()
                            });
                            recorder.resolve(&timestamps, &secondary)
                        })
                        .collect(),
                })
                .collect();
            resolved.push(SubmitBatchData {
                queue: batch.queue,
                submits,
            });
        }
        self.frame.lock().collected.extend(resolved);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Close the current frame and publish it as the latest frame data.
    pub fn finish_frame(&self, reader: &mut dyn TimestampReader) -> Result<Arc<FrameData>> {
        let resolved = self.resolve_pending(reader);

        let data = {
            let mut frame = self.frame.lock();
            let now = Instant::now();
            let submits = std::mem::take(&mut frame.collected);
            let data = FrameData {
                index: frame.frame_index,
                ticks: 0,
                cpu_time: now.duration_since(frame.last_finish),
                submits,
                memory: self.memory.snapshot(),
            };
            frame.frame_index += 1;
            frame.last_finish = now;
            data
        };
        let ticks = data.command_buffers().map(|cb| cb.ticks).sum();
        let data = Arc::new(FrameData { ticks, ..data });

        trace!(
            "frame {} finished: {} submits, {} ticks",
            data.index,
            data.submits.len(),
            data.ticks
        );
        *self.latest.lock() = Some(Arc::clone(&data));
        resolved.map(|_| data)
    }

    /// Data of the most recently finished frame.
    pub fn latest_frame(&self) -> Option<Arc<FrameData>> {
        self.latest.lock().clone()
    }
}

/// Timestamps written by the recording `recorder` holds.
fn read_recorded(recorder: &CommandBufferProfiler, reader: &mut dyn TimestampReader) -> Result<Vec<u64>> {
    match recorder.query_count() {
        0 => Ok(Vec::new()),
        count => reader.read_timestamps(recorder.handle(), count),
    }
}
