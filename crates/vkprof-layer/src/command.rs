//! Command buffer recording hooks.
//!
//! Each hook updates the command buffer's recorder, writing timestamps
//! through [`CommandTimestamps`], and forwards the call.

use std::ffi::c_void;

use ash::vk;
use tracing::trace;
use vkprof_core::data::DrawcallType;
use vkprof_core::TimestampWriter;

use crate::dispatch::{raw_slice, DeviceRecord};
use crate::handle_store;
use crate::queue;

/// Writes timestamps into the query pool owned by one command buffer.
/// Without a pool nothing is written.
pub struct CommandTimestamps<'a> {
    fp: &'a ash::DeviceFnV1_0,
    command_buffer: vk::CommandBuffer,
    pool: Option<vk::QueryPool>,
}

impl<'a> CommandTimestamps<'a> {
    pub fn new(record: &'a DeviceRecord, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            fp: &record.fp,
            command_buffer,
            pool: record.query_pools.get(&command_buffer).map(|p| *p),
        }
    }
}

impl TimestampWriter for CommandTimestamps<'_> {
    fn write_timestamp(&mut self, stage: vk::PipelineStageFlags, query: u32) {
        if let Some(pool) = self.pool {
            unsafe { (self.fp.cmd_write_timestamp)(self.command_buffer, stage, pool, query) };
        }
    }
}

/// Record `kind` around the forwarded command.
unsafe fn profile_command(
    command_buffer: vk::CommandBuffer,
    kind: DrawcallType,
    forward: impl FnOnce(&DeviceRecord),
) {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return;
    };
    let mut writer = CommandTimestamps::new(&record, command_buffer);
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.pre_command(kind, &mut writer));
    forward(&record);
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.post_command(&mut writer));
}

pub unsafe extern "system" fn vkprof_BeginCommandBuffer(
    command_buffer: vk::CommandBuffer,
    p_begin_info: *const vk::CommandBufferBeginInfo<'_>,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    // The previous submission of this command buffer must be read before its
    // query pool is reset by the new recording.
    queue::resolve_if_pending(&record, &[command_buffer]);
    let result = unsafe { (record.fp.begin_command_buffer)(command_buffer, p_begin_info) };
    if result != vk::Result::SUCCESS {
        return result;
    }

    // Only primary command buffers on timestamp-capable families get a pool.
    let pool = match record.profiler.command_buffer_info(command_buffer) {
        Some((command_pool, vk::CommandBufferLevel::PRIMARY)) if record.pool_supports_timestamps(command_pool) => {
            record.timestamp_pool(command_buffer)
        }
        _ => None,
    };
    let capacity = match pool {
        Some(pool) => {
            let capacity = record.profiler.query_pool_size();
            unsafe { (record.fp.cmd_reset_query_pool)(command_buffer, pool, 0, capacity) };
            capacity
        }
        None => 0,
    };
    trace!("begin {:?}, {} timestamp slots", command_buffer, capacity);

    let mut writer = CommandTimestamps::new(&record, command_buffer);
    record
        .profiler
        .begin_command_buffer(command_buffer, capacity, &mut writer);
    result
}

pub unsafe extern "system" fn vkprof_EndCommandBuffer(command_buffer: vk::CommandBuffer) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let mut writer = CommandTimestamps::new(&record, command_buffer);
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.end(&mut writer));
    unsafe { (record.fp.end_command_buffer)(command_buffer) }
}

pub unsafe extern "system" fn vkprof_CmdBeginRenderPass(
    command_buffer: vk::CommandBuffer,
    p_render_pass_begin: *const vk::RenderPassBeginInfo<'_>,
    contents: vk::SubpassContents,
) {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return;
    };
    let mut writer = CommandTimestamps::new(&record, command_buffer);
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.pre_begin_render_pass(&mut writer));
    unsafe { (record.fp.cmd_begin_render_pass)(command_buffer, p_render_pass_begin, contents) };

    let render_pass = if p_render_pass_begin.is_null() {
        vk::RenderPass::null()
    } else {
        unsafe { (*p_render_pass_begin).render_pass }
    };
    record.profiler.with_command_buffer(command_buffer, |p| {
        p.post_begin_render_pass(render_pass, contents, &mut writer)
    });
}

pub unsafe extern "system" fn vkprof_CmdNextSubpass(command_buffer: vk::CommandBuffer, contents: vk::SubpassContents) {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return;
    };
    let mut writer = CommandTimestamps::new(&record, command_buffer);
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.next_subpass(contents, &mut writer));
    unsafe { (record.fp.cmd_next_subpass)(command_buffer, contents) };
}

pub unsafe extern "system" fn vkprof_CmdEndRenderPass(command_buffer: vk::CommandBuffer) {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return;
    };
    let mut writer = CommandTimestamps::new(&record, command_buffer);
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.pre_end_render_pass(&mut writer));
    unsafe { (record.fp.cmd_end_render_pass)(command_buffer) };
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.post_end_render_pass(&mut writer));
}

pub unsafe extern "system" fn vkprof_CmdBindPipeline(
    command_buffer: vk::CommandBuffer,
    bind_point: vk::PipelineBindPoint,
    pipeline: vk::Pipeline,
) {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return;
    };
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.bind_pipeline(bind_point, pipeline));
    unsafe { (record.fp.cmd_bind_pipeline)(command_buffer, bind_point, pipeline) };
}

pub unsafe extern "system" fn vkprof_CmdExecuteCommands(
    command_buffer: vk::CommandBuffer,
    command_buffer_count: u32,
    p_command_buffers: *const vk::CommandBuffer,
) {
    let Some(record) = (unsafe { handle_store::device_for(command_buffer) }) else {
        return;
    };
    let secondaries = unsafe { raw_slice(p_command_buffers, command_buffer_count) };
    let mut writer = CommandTimestamps::new(&record, command_buffer);
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.pre_execute_commands(secondaries, &mut writer));
    unsafe { (record.fp.cmd_execute_commands)(command_buffer, command_buffer_count, p_command_buffers) };
    record
        .profiler
        .with_command_buffer(command_buffer, |p| p.post_execute_commands(&mut writer));
}

// ── Draw / dispatch ─────────────────────────────────────────

pub unsafe extern "system" fn vkprof_CmdDraw(
    command_buffer: vk::CommandBuffer,
    vertex_count: u32,
    instance_count: u32,
    first_vertex: u32,
    first_instance: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::Draw, |r| {
            (r.fp.cmd_draw)(command_buffer, vertex_count, instance_count, first_vertex, first_instance)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdDrawIndexed(
    command_buffer: vk::CommandBuffer,
    index_count: u32,
    instance_count: u32,
    first_index: u32,
    vertex_offset: i32,
    first_instance: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::DrawIndexed, |r| {
            (r.fp.cmd_draw_indexed)(
                command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdDrawIndirect(
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    draw_count: u32,
    stride: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::DrawIndirect, |r| {
            (r.fp.cmd_draw_indirect)(command_buffer, buffer, offset, draw_count, stride)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdDrawIndexedIndirect(
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    draw_count: u32,
    stride: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::DrawIndexedIndirect, |r| {
            (r.fp.cmd_draw_indexed_indirect)(command_buffer, buffer, offset, draw_count, stride)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdDrawIndirectCount(
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    count_buffer: vk::Buffer,
    count_buffer_offset: vk::DeviceSize,
    max_draw_count: u32,
    stride: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::DrawIndirectCount, |r| {
            (r.fp_v1_2.cmd_draw_indirect_count)(
                command_buffer,
                buffer,
                offset,
                count_buffer,
                count_buffer_offset,
                max_draw_count,
                stride,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdDrawIndexedIndirectCount(
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    count_buffer: vk::Buffer,
    count_buffer_offset: vk::DeviceSize,
    max_draw_count: u32,
    stride: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::DrawIndexedIndirectCount, |r| {
            (r.fp_v1_2.cmd_draw_indexed_indirect_count)(
                command_buffer,
                buffer,
                offset,
                count_buffer,
                count_buffer_offset,
                max_draw_count,
                stride,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdDispatch(
    command_buffer: vk::CommandBuffer,
    group_count_x: u32,
    group_count_y: u32,
    group_count_z: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::Dispatch, |r| {
            (r.fp.cmd_dispatch)(command_buffer, group_count_x, group_count_y, group_count_z)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdDispatchIndirect(
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::DispatchIndirect, |r| {
            (r.fp.cmd_dispatch_indirect)(command_buffer, buffer, offset)
        })
    }
}

// ── Transfer ────────────────────────────────────────────────

pub unsafe extern "system" fn vkprof_CmdCopyBuffer(
    command_buffer: vk::CommandBuffer,
    src_buffer: vk::Buffer,
    dst_buffer: vk::Buffer,
    region_count: u32,
    p_regions: *const vk::BufferCopy,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::CopyBuffer, |r| {
            (r.fp.cmd_copy_buffer)(command_buffer, src_buffer, dst_buffer, region_count, p_regions)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdCopyBufferToImage(
    command_buffer: vk::CommandBuffer,
    src_buffer: vk::Buffer,
    dst_image: vk::Image,
    dst_image_layout: vk::ImageLayout,
    region_count: u32,
    p_regions: *const vk::BufferImageCopy,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::CopyBufferToImage, |r| {
            (r.fp.cmd_copy_buffer_to_image)(
                command_buffer,
                src_buffer,
                dst_image,
                dst_image_layout,
                region_count,
                p_regions,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdCopyImage(
    command_buffer: vk::CommandBuffer,
    src_image: vk::Image,
    src_image_layout: vk::ImageLayout,
    dst_image: vk::Image,
    dst_image_layout: vk::ImageLayout,
    region_count: u32,
    p_regions: *const vk::ImageCopy,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::CopyImage, |r| {
            (r.fp.cmd_copy_image)(
                command_buffer,
                src_image,
                src_image_layout,
                dst_image,
                dst_image_layout,
                region_count,
                p_regions,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdCopyImageToBuffer(
    command_buffer: vk::CommandBuffer,
    src_image: vk::Image,
    src_image_layout: vk::ImageLayout,
    dst_buffer: vk::Buffer,
    region_count: u32,
    p_regions: *const vk::BufferImageCopy,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::CopyImageToBuffer, |r| {
            (r.fp.cmd_copy_image_to_buffer)(
                command_buffer,
                src_image,
                src_image_layout,
                dst_buffer,
                region_count,
                p_regions,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdClearAttachments(
    command_buffer: vk::CommandBuffer,
    attachment_count: u32,
    p_attachments: *const vk::ClearAttachment,
    rect_count: u32,
    p_rects: *const vk::ClearRect,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::ClearAttachments, |r| {
            (r.fp.cmd_clear_attachments)(command_buffer, attachment_count, p_attachments, rect_count, p_rects)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdClearColorImage(
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    image_layout: vk::ImageLayout,
    p_color: *const vk::ClearColorValue,
    range_count: u32,
    p_ranges: *const vk::ImageSubresourceRange,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::ClearColorImage, |r| {
            (r.fp.cmd_clear_color_image)(command_buffer, image, image_layout, p_color, range_count, p_ranges)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdClearDepthStencilImage(
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    image_layout: vk::ImageLayout,
    p_depth_stencil: *const vk::ClearDepthStencilValue,
    range_count: u32,
    p_ranges: *const vk::ImageSubresourceRange,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::ClearDepthStencilImage, |r| {
            (r.fp.cmd_clear_depth_stencil_image)(
                command_buffer,
                image,
                image_layout,
                p_depth_stencil,
                range_count,
                p_ranges,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdResolveImage(
    command_buffer: vk::CommandBuffer,
    src_image: vk::Image,
    src_image_layout: vk::ImageLayout,
    dst_image: vk::Image,
    dst_image_layout: vk::ImageLayout,
    region_count: u32,
    p_regions: *const vk::ImageResolve,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::ResolveImage, |r| {
            (r.fp.cmd_resolve_image)(
                command_buffer,
                src_image,
                src_image_layout,
                dst_image,
                dst_image_layout,
                region_count,
                p_regions,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdBlitImage(
    command_buffer: vk::CommandBuffer,
    src_image: vk::Image,
    src_image_layout: vk::ImageLayout,
    dst_image: vk::Image,
    dst_image_layout: vk::ImageLayout,
    region_count: u32,
    p_regions: *const vk::ImageBlit,
    filter: vk::Filter,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::BlitImage, |r| {
            (r.fp.cmd_blit_image)(
                command_buffer,
                src_image,
                src_image_layout,
                dst_image,
                dst_image_layout,
                region_count,
                p_regions,
                filter,
            )
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdFillBuffer(
    command_buffer: vk::CommandBuffer,
    dst_buffer: vk::Buffer,
    dst_offset: vk::DeviceSize,
    size: vk::DeviceSize,
    data: u32,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::FillBuffer, |r| {
            (r.fp.cmd_fill_buffer)(command_buffer, dst_buffer, dst_offset, size, data)
        })
    }
}

pub unsafe extern "system" fn vkprof_CmdUpdateBuffer(
    command_buffer: vk::CommandBuffer,
    dst_buffer: vk::Buffer,
    dst_offset: vk::DeviceSize,
    data_size: vk::DeviceSize,
    p_data: *const c_void,
) {
    unsafe {
        profile_command(command_buffer, DrawcallType::UpdateBuffer, |r| {
            (r.fp.cmd_update_buffer)(command_buffer, dst_buffer, dst_offset, data_size, p_data)
        })
    }
}
