//! Integration test: DeviceProfiler
//!
//! Exercises the device-level bookkeeping (memory, pipelines, command
//! buffers) and frame collection with a fake timestamp source.
//!
//! Run with: cargo test --test profiler_test

use std::collections::HashMap;

use ash::vk;
use ash::vk::Handle;
use vkprof_core::data::DrawcallType;
use vkprof_core::{
    DeviceProfiler, ProfilerConfig, ProfilerError, ProfilerMode, SyncMode, TimestampReader, TimestampWriter,
};

struct NullWriter;

impl TimestampWriter for NullWriter {
    fn write_timestamp(&mut self, _stage: vk::PipelineStageFlags, _query: u32) {}
}

/// Serves preset timestamps per command buffer.
#[derive(Default)]
struct FakeReader {
    timestamps: HashMap<vk::CommandBuffer, Vec<u64>>,
    reads: Vec<(vk::CommandBuffer, u32)>,
}

impl TimestampReader for FakeReader {
    fn read_timestamps(&mut self, command_buffer: vk::CommandBuffer, count: u32) -> vkprof_core::Result<Vec<u64>> {
        self.reads.push((command_buffer, count));
        let timestamps = self
            .timestamps
            .get(&command_buffer)
            .ok_or(ProfilerError::HandleNotFound(command_buffer.as_raw()))?;
        Ok(timestamps.iter().copied().take(count as usize).collect())
    }
}

fn memory_properties() -> vk::PhysicalDeviceMemoryProperties {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: 2,
        memory_heap_count: 2,
        ..Default::default()
    };
    props.memory_types[0].heap_index = 0;
    props.memory_types[1].heap_index = 1;
    props
}

fn make_profiler(config: &ProfilerConfig) -> DeviceProfiler {
    DeviceProfiler::new(config, 1.0, &memory_properties())
}

const POOL: u64 = 0x10;
const QUEUE: u64 = 0x20;

/// Allocate and record a primary command buffer with one draw outside any
/// render pass: 4 queries in PerDrawcall mode.
fn record_draw(profiler: &DeviceProfiler, raw: u64) -> vk::CommandBuffer {
    let cb = vk::CommandBuffer::from_raw(raw);
    profiler.allocate_command_buffers(vk::CommandPool::from_raw(POOL), vk::CommandBufferLevel::PRIMARY, &[cb]);
    let mut w = NullWriter;
    profiler.begin_command_buffer(cb, 64, &mut w);
    profiler.with_command_buffer(cb, |p| {
        p.pre_command(DrawcallType::Draw, &mut w);
        p.post_command(&mut w);
        p.end(&mut w);
    });
    cb
}

#[test]
fn test_finish_frame_collects_submits() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let cb = record_draw(&profiler, 0x100);
    profiler.submit(vk::Queue::from_raw(QUEUE), vec![vec![cb]]);
    assert_eq!(profiler.pending_submit_count(), 1);

    let mut reader = FakeReader::default();
    reader.timestamps.insert(cb, vec![0, 10, 25, 40]);
    let frame = profiler.finish_frame(&mut reader).expect("frame");

    assert_eq!(reader.reads, vec![(cb, 4)]);
    assert_eq!(profiler.pending_submit_count(), 0);
    assert_eq!(frame.index, 0);
    assert_eq!(frame.ticks, 40);
    assert_eq!(frame.submits.len(), 1);
    assert_eq!(frame.submits[0].queue, vk::Queue::from_raw(QUEUE));
    let data = &frame.submits[0].submits[0].command_buffers[0];
    assert_eq!(data.handle, cb);
    assert_eq!(data.render_passes[0].subpasses[0].pipelines[0].drawcalls[0].ticks, 15);

    let latest = profiler.latest_frame().map(|f| f.index);
    assert_eq!(latest, Some(0));
}

#[test]
fn test_frames_are_numbered_and_emptied() {
    let profiler = make_profiler(&ProfilerConfig::default());
    assert!(profiler.latest_frame().is_none());

    let mut reader = FakeReader::default();
    for expected in 0..3 {
        let frame = profiler.finish_frame(&mut reader).map(|f| (f.index, f.submits.len()));
        assert_eq!(frame.ok(), Some((expected, 0)));
    }
}

#[test]
fn test_submit_sync_mode_resolves_into_current_frame() {
    let config = ProfilerConfig {
        sync_mode: SyncMode::Submit,
        ..Default::default()
    };
    let profiler = make_profiler(&config);
    assert_eq!(profiler.sync_mode(), SyncMode::Submit);

    let cb = record_draw(&profiler, 0x100);
    let mut reader = FakeReader::default();
    reader.timestamps.insert(cb, vec![0, 1, 2, 3]);

    profiler.submit(vk::Queue::from_raw(QUEUE), vec![vec![cb]]);
    assert!(profiler.resolve_pending(&mut reader).is_ok());
    assert_eq!(profiler.pending_submit_count(), 0);

    // The command buffer is re-recorded before present; the frame keeps the
    // data resolved at submit time.
    let mut w = NullWriter;
    profiler.begin_command_buffer(cb, 64, &mut w);
    let frame = profiler.finish_frame(&mut reader).ok();
    assert_eq!(frame.map(|f| f.ticks), Some(3));
    assert_eq!(reader.reads.len(), 1);
}

#[test]
fn test_rerecording_before_present_resolves_submitted_recording() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let cb = record_draw(&profiler, 0x100);
    profiler.submit(vk::Queue::from_raw(QUEUE), vec![vec![cb]]);
    assert!(profiler.is_pending(cb));

    // Re-recorded after the fence wait, not submitted again.
    let mut w = NullWriter;
    profiler.begin_command_buffer(cb, 64, &mut w);
    profiler.with_command_buffer(cb, |p| {
        for _ in 0..3 {
            p.pre_command(DrawcallType::Dispatch, &mut w);
            p.post_command(&mut w);
        }
        p.end(&mut w);
    });
    assert_eq!(profiler.with_command_buffer(cb, |p| p.query_count()), Some(8));

    let mut reader = FakeReader::default();
    reader.timestamps.insert(cb, vec![0, 10, 25, 40, 50, 60, 70, 80]);
    let frame = profiler.finish_frame(&mut reader).expect("frame");

    assert_eq!(reader.reads, vec![(cb, 4)]);
    assert!(!profiler.is_pending(cb));
    let data = &frame.submits[0].submits[0].command_buffers[0];
    let kinds: Vec<DrawcallType> = data.render_passes[0].subpasses[0].pipelines[0]
        .drawcalls
        .iter()
        .map(|d| d.kind)
        .collect();
    assert_eq!(kinds, vec![DrawcallType::Draw]);
    assert_eq!(data.ticks, 40);
}

#[test]
fn test_secondaries_are_captured_at_submit() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let pool = vk::CommandPool::from_raw(POOL);
    let secondary = vk::CommandBuffer::from_raw(0x200);
    profiler.allocate_command_buffers(pool, vk::CommandBufferLevel::SECONDARY, &[secondary]);
    let mut w = NullWriter;
    profiler.begin_command_buffer(secondary, 0, &mut w);
    profiler.with_command_buffer(secondary, |p| {
        p.pre_command(DrawcallType::CopyBuffer, &mut w);
        p.post_command(&mut w);
        p.end(&mut w);
    });

    let primary = vk::CommandBuffer::from_raw(0x100);
    profiler.allocate_command_buffers(pool, vk::CommandBufferLevel::PRIMARY, &[primary]);
    profiler.begin_command_buffer(primary, 64, &mut w);
    profiler.with_command_buffer(primary, |p| {
        p.pre_execute_commands(&[secondary], &mut w);
        p.post_execute_commands(&mut w);
        p.end(&mut w);
    });
    profiler.submit(vk::Queue::from_raw(QUEUE), vec![vec![primary]]);
    assert!(profiler.is_pending(secondary));

    // Freed before present; the submitted structure survives.
    profiler.free_command_buffers(&[secondary]);

    let mut reader = FakeReader::default();
    reader.timestamps.insert(primary, vec![0, 1, 2, 3]);
    let frame = profiler.finish_frame(&mut reader).expect("frame");
    let subpass = &frame.submits[0].submits[0].command_buffers[0].render_passes[0].subpasses[0];
    let executed = &subpass.secondary_command_buffers;
    assert_eq!(executed.len(), 1);
    let kind = executed[0].render_passes[0].subpasses[0].pipelines[0].drawcalls[0].kind;
    assert_eq!(kind, DrawcallType::CopyBuffer);
}

#[test]
fn test_reader_error_keeps_structure() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let cb = record_draw(&profiler, 0x100);
    profiler.submit(vk::Queue::from_raw(QUEUE), vec![vec![cb]]);

    let mut reader = FakeReader::default();
    let error = profiler.finish_frame(&mut reader).map(|f| f.index);
    assert!(matches!(error, Err(ProfilerError::HandleNotFound(0x100))));

    let frame = profiler.latest_frame().expect("published frame");
    let data = &frame.submits[0].submits[0].command_buffers[0];
    assert_eq!(data.ticks, 0);
    assert_eq!(data.render_passes.len(), 1);
}

#[test]
fn test_untracked_command_buffers_are_skipped() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let unknown = vk::CommandBuffer::from_raw(0x999);
    profiler.submit(vk::Queue::from_raw(QUEUE), vec![vec![unknown]]);

    let mut reader = FakeReader::default();
    let frame = profiler.finish_frame(&mut reader).ok();
    let counts = frame.map(|f| (f.submits.len(), f.submits[0].submits[0].command_buffers.len()));
    assert_eq!(counts, Some((1, 0)));
    assert!(reader.reads.is_empty());
}

#[test]
fn test_secondary_command_buffers_resolve_through_primary() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let pool = vk::CommandPool::from_raw(POOL);
    let secondary = vk::CommandBuffer::from_raw(0x200);
    profiler.allocate_command_buffers(pool, vk::CommandBufferLevel::SECONDARY, &[secondary]);

    let mut w = NullWriter;
    profiler.begin_command_buffer(secondary, 0, &mut w);
    profiler.with_command_buffer(secondary, |p| {
        p.pre_command(DrawcallType::Draw, &mut w);
        p.post_command(&mut w);
        p.end(&mut w);
    });

    let primary = vk::CommandBuffer::from_raw(0x100);
    profiler.allocate_command_buffers(pool, vk::CommandBufferLevel::PRIMARY, &[primary]);
    profiler.begin_command_buffer(primary, 64, &mut w);
    profiler.with_command_buffer(primary, |p| {
        p.pre_execute_commands(&[secondary], &mut w);
        p.post_execute_commands(&mut w);
        p.end(&mut w);
    });
    assert_eq!(profiler.with_command_buffer(primary, |p| p.query_count()), Some(4));
    profiler.submit(vk::Queue::from_raw(QUEUE), vec![vec![primary]]);

    let mut reader = FakeReader::default();
    reader.timestamps.insert(primary, vec![100, 110, 140, 150]);
    let frame = profiler.finish_frame(&mut reader).expect("frame");
    assert_eq!(reader.reads, vec![(primary, 4)]);

    let data = &frame.submits[0].submits[0].command_buffers[0];
    assert_eq!(data.ticks, 50);
    // The primary times the vkCmdExecuteCommands span.
    let render_pass = &data.render_passes[0];
    assert_eq!(render_pass.handle, vk::RenderPass::null());
    assert_eq!(render_pass.ticks, 30);
    let subpass = &render_pass.subpasses[0];
    assert_eq!(subpass.ticks, 30);
    assert_eq!(subpass.contents, vk::SubpassContents::SECONDARY_COMMAND_BUFFERS);
    assert_eq!(subpass.secondary_command_buffers.len(), 1);
    assert_eq!(subpass.secondary_command_buffers[0].handle, secondary);
    assert_eq!(subpass.secondary_command_buffers[0].level, vk::CommandBufferLevel::SECONDARY);
}

#[test]
fn test_mode_change_applies_at_next_begin() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let cb = vk::CommandBuffer::from_raw(0x100);
    profiler.allocate_command_buffers(vk::CommandPool::from_raw(POOL), vk::CommandBufferLevel::PRIMARY, &[cb]);

    let mut w = NullWriter;
    profiler.begin_command_buffer(cb, 64, &mut w);
    profiler.set_mode(ProfilerMode::PerFrame);
    assert_eq!(profiler.with_command_buffer(cb, |p| p.mode()), Some(ProfilerMode::PerDrawcall));

    profiler.begin_command_buffer(cb, 64, &mut w);
    assert_eq!(profiler.with_command_buffer(cb, |p| p.mode()), Some(ProfilerMode::PerFrame));
    assert_eq!(profiler.mode(), ProfilerMode::PerFrame);
}

#[test]
fn test_command_buffer_lifetime() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let pool_a = vk::CommandPool::from_raw(0x10);
    let pool_b = vk::CommandPool::from_raw(0x11);
    let a1 = vk::CommandBuffer::from_raw(0x100);
    let a2 = vk::CommandBuffer::from_raw(0x101);
    let b1 = vk::CommandBuffer::from_raw(0x102);
    profiler.allocate_command_buffers(pool_a, vk::CommandBufferLevel::PRIMARY, &[a1, a2, vk::CommandBuffer::null()]);
    profiler.allocate_command_buffers(pool_b, vk::CommandBufferLevel::SECONDARY, &[b1]);

    assert!(!profiler.is_tracked(vk::CommandBuffer::null()));
    assert_eq!(
        profiler.command_buffer_info(b1),
        Some((pool_b, vk::CommandBufferLevel::SECONDARY))
    );

    profiler.free_command_buffers(&[a1]);
    assert!(!profiler.is_tracked(a1));
    assert!(profiler.is_tracked(a2));

    let mut freed = profiler.free_command_pool(pool_a);
    freed.sort_by_key(|cb| cb.as_raw());
    assert_eq!(freed, vec![a2]);
    assert!(!profiler.is_tracked(a2));
    assert!(profiler.is_tracked(b1));
    assert_eq!(profiler.with_command_buffer(a2, |p| p.query_count()), None);
}

#[test]
fn test_memory_tracking() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let memory = vk::DeviceMemory::from_raw(0x500);
    let info = vk::MemoryAllocateInfo::default()
        .allocation_size(4096)
        .memory_type_index(1);

    profiler.on_allocate_memory(memory, &info);
    let frame = profiler.finish_frame(&mut FakeReader::default()).expect("frame");
    let memory_data = &frame.memory;
    assert_eq!(memory_data.total_allocation_count, 1);
    assert_eq!(memory_data.total_allocated_bytes, 4096);
    assert_eq!(memory_data.heaps[1].allocated_bytes, 4096);
    assert_eq!(memory_data.heaps[0].allocation_count, 0);

    profiler.on_free_memory(memory);
    assert!(profiler.memory().is_empty());
}

#[test]
fn test_memory_tracking_disabled() {
    let config = ProfilerConfig {
        memory_tracking: false,
        ..Default::default()
    };
    let profiler = make_profiler(&config);
    let info = vk::MemoryAllocateInfo::default().allocation_size(64);
    profiler.on_allocate_memory(vk::DeviceMemory::from_raw(0x500), &info);
    assert!(profiler.memory().is_empty());
}

#[test]
fn test_pipeline_registration() {
    let profiler = make_profiler(&ProfilerConfig::default());
    let graphics = vk::Pipeline::from_raw(0x30);
    let compute = vk::Pipeline::from_raw(0x31);

    profiler.create_pipelines(
        vk::PipelineBindPoint::GRAPHICS,
        &[(graphics, 2), (vk::Pipeline::null(), 2)],
    );
    profiler.create_pipelines(vk::PipelineBindPoint::COMPUTE, &[(compute, 1)]);
    assert_eq!(profiler.pipelines().len(), 2);

    let info = profiler.pipelines().get(graphics).map(|i| (i.bind_point, i.stage_count));
    assert_eq!(info, Some((vk::PipelineBindPoint::GRAPHICS, 2)));

    profiler.destroy_pipeline(graphics);
    assert!(profiler.pipelines().get(graphics).is_none());
    assert_eq!(profiler.pipelines().len(), 1);
}
