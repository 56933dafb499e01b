//! Integration test: RegionBuilder
//!
//! Run with: cargo test --test region_test

use std::time::Duration;

use ash::vk;
use ash::vk::Handle;
use vkprof_core::data::*;
use vkprof_core::region::{CommandType, RegionBuilder, RegionKind};

fn sample_frame() -> FrameData {
    let drawcalls = vec![
        DrawcallData { kind: DrawcallType::Draw, ticks: 1_000 },
        DrawcallData { kind: DrawcallType::DispatchIndirect, ticks: 500 },
    ];
    let inline = SubpassData {
        index: 0,
        contents: vk::SubpassContents::INLINE,
        ticks: 1_500,
        pipelines: vec![PipelineData {
            handle: vk::Pipeline::from_raw(0x30),
            ticks: 1_500,
            drawcalls,
        }],
        secondary_command_buffers: Vec::new(),
    };
    let secondary = SubpassData {
        index: 1,
        contents: vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
        ticks: 2_000,
        pipelines: Vec::new(),
        secondary_command_buffers: vec![CommandBufferData {
            handle: vk::CommandBuffer::from_raw(0x200),
            level: vk::CommandBufferLevel::SECONDARY,
            ticks: 2_000,
            render_passes: Vec::new(),
        }],
    };
    FrameData {
        index: 7,
        ticks: 4_000,
        cpu_time: Duration::from_millis(16),
        submits: vec![SubmitBatchData {
            queue: vk::Queue::from_raw(0x20),
            submits: vec![SubmitData {
                command_buffers: vec![CommandBufferData {
                    handle: vk::CommandBuffer::from_raw(0x100),
                    level: vk::CommandBufferLevel::PRIMARY,
                    ticks: 4_000,
                    render_passes: vec![RenderPassData {
                        handle: vk::RenderPass::from_raw(0x40),
                        ticks: 3_800,
                        begin_ticks: 100,
                        end_ticks: 200,
                        subpasses: vec![inline, secondary],
                    }],
                }],
            }],
        }],
        memory: MemoryData::default(),
    }
}

#[test]
fn test_duration_uses_timestamp_period() {
    // 2 ns per tick: 1 000 000 ticks = 2 ms
    let builder = RegionBuilder::new(2.0);
    assert!((builder.duration(1_000_000) - 2.0).abs() < 1e-6);
    assert_eq!(builder.duration(0), 0.0);
}

#[test]
fn test_frame_tree_shape() {
    let builder = RegionBuilder::new(1_000.0);
    let frame = builder.frame(&sample_frame());

    assert_eq!(frame.kind, RegionKind::Frame);
    assert!((frame.duration - 4.0).abs() < 1e-6);
    // frame, submit, submit info, cb, rp, 2 subpasses, pipeline, 2 commands, secondary cb
    assert_eq!(frame.count(), 11);

    let submit = &frame.subregions[0];
    assert_eq!(submit.kind, RegionKind::Submit { queue: vk::Queue::from_raw(0x20) });
    assert_eq!(submit.duration, 0.0);
    let submit_info = &submit.subregions[0];
    assert_eq!(submit_info.kind, RegionKind::SubmitInfo);
    assert_eq!(submit_info.duration, 0.0);

    let cb = &submit_info.subregions[0];
    assert!(matches!(
        cb.kind,
        RegionKind::CommandBuffer { handle, level }
            if handle.as_raw() == 0x100 && level == vk::CommandBufferLevel::PRIMARY
    ));

    let rp = &cb.subregions[0];
    assert!(matches!(
        rp.kind,
        RegionKind::RenderPass { handle, begin_duration, end_duration }
            if handle.as_raw() == 0x40
                && (begin_duration - 0.1).abs() < 1e-6
                && (end_duration - 0.2).abs() < 1e-6
    ));
    assert!((rp.duration - 3.8).abs() < 1e-5);
}

#[test]
fn test_subpass_contents_select_children() {
    let builder = RegionBuilder::new(1_000.0);
    let frame = builder.frame(&sample_frame());
    let rp = &frame.subregions[0].subregions[0].subregions[0].subregions[0];

    let inline = &rp.subregions[0];
    assert_eq!(inline.kind, RegionKind::Subpass { index: 0, contents: vk::SubpassContents::INLINE });
    assert_eq!(inline.subregions.len(), 1);
    assert_eq!(inline.subregions[0].kind, RegionKind::Pipeline { handle: vk::Pipeline::from_raw(0x30) });

    let commands: Vec<RegionKind> = inline.subregions[0].subregions.iter().map(|r| r.kind).collect();
    assert_eq!(
        commands,
        vec![
            RegionKind::Command { command: CommandType::Draw },
            RegionKind::Command { command: CommandType::DispatchIndirect },
        ]
    );

    let secondary = &rp.subregions[1];
    assert_eq!(secondary.subregions.len(), 1);
    assert!(matches!(
        secondary.subregions[0].kind,
        RegionKind::CommandBuffer { level, .. } if level == vk::CommandBufferLevel::SECONDARY
    ));
}

#[test]
fn test_command_type_values() {
    assert_eq!(CommandType::Unknown as i32, 0);
    assert_eq!(CommandType::from(DrawcallType::Draw) as i32, 1);
    assert_eq!(CommandType::from(DrawcallType::DispatchIndirect) as i32, 8);
    assert_eq!(CommandType::from(DrawcallType::UpdateBuffer) as i32, 19);
}
