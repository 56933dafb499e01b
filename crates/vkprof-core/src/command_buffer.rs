//! Per command buffer recording of the profiled region structure.
//!
//! The layer calls the `pre_*` hooks before forwarding a command and the
//! `post_*` hooks after it. Timestamps are written through a
//! [`TimestampWriter`] into query slots owned by this command buffer; after
//! execution the slots are read back and [`CommandBufferProfiler::resolve`]
//! turns them into [`CommandBufferData`].

use ash::vk;
use tracing::warn;

use crate::config::ProfilerMode;
use crate::data::{
    CommandBufferData, DrawcallData, DrawcallType, PipelineData, RenderPassData, SubpassData,
};
use crate::error::Result;

/// Records GPU timestamps into the command buffer being profiled.
pub trait TimestampWriter {
    fn write_timestamp(&mut self, stage: vk::PipelineStageFlags, query: u32);
}

/// Reads back timestamps written by a finished command buffer.
pub trait TimestampReader {
    /// Returns the first `count` timestamps of the command buffer's query slots.
    fn read_timestamps(&mut self, command_buffer: vk::CommandBuffer, count: u32) -> Result<Vec<u64>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct QuerySpan {
    begin: Option<u32>,
    end: Option<u32>,
}

impl QuerySpan {
    fn ticks(&self, timestamps: &[u64]) -> Option<u64> {
        let begin = *timestamps.get(self.begin? as usize)?;
        let end = *timestamps.get(self.end? as usize)?;
        Some(end.saturating_sub(begin))
    }
}

#[derive(Debug, Clone)]
struct RecordedDrawcall {
    kind: DrawcallType,
    span: QuerySpan,
}

#[derive(Debug, Clone)]
struct RecordedPipeline {
    handle: vk::Pipeline,
    span: QuerySpan,
    open: bool,
    drawcalls: Vec<RecordedDrawcall>,
}

#[derive(Debug, Clone)]
struct RecordedSubpass {
    index: u32,
    contents: vk::SubpassContents,
    pipelines: Vec<RecordedPipeline>,
    secondaries: Vec<vk::CommandBuffer>,
    /// One span per `vkCmdExecuteCommands` recorded in this subpass.
    executions: Vec<QuerySpan>,
}

#[derive(Debug, Clone)]
struct RecordedRenderPass {
    handle: vk::RenderPass,
    begin: QuerySpan,
    end: QuerySpan,
    subpasses: Vec<RecordedSubpass>,
}

impl RecordedSubpass {
    fn new(index: u32, contents: vk::SubpassContents) -> Self {
        Self {
            index,
            contents,
            pipelines: Vec::new(),
            secondaries: Vec::new(),
            executions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandBufferProfiler {
    handle: vk::CommandBuffer,
    level: vk::CommandBufferLevel,
    pool: vk::CommandPool,
    mode: ProfilerMode,
    capacity: u32,
    next_query: u32,
    overflow_reported: bool,
    outstanding: u32,
    span: QuerySpan,
    render_passes: Vec<RecordedRenderPass>,
    pending_render_pass_begin: Option<u32>,
    in_render_pass: bool,
    implicit_open: bool,
    bound_graphics: vk::Pipeline,
    bound_compute: vk::Pipeline,
}

impl CommandBufferProfiler {
    pub fn new(
        handle: vk::CommandBuffer,
        level: vk::CommandBufferLevel,
        pool: vk::CommandPool,
    ) -> Self {
        Self {
            handle,
            level,
            pool,
            mode: ProfilerMode::default(),
            capacity: 0,
            next_query: 0,
            overflow_reported: false,
            outstanding: 0,
            span: QuerySpan::default(),
            render_passes: Vec::new(),
            pending_render_pass_begin: None,
            in_render_pass: false,
            implicit_open: false,
            bound_graphics: vk::Pipeline::null(),
            bound_compute: vk::Pipeline::null(),
        }
    }

    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn level(&self) -> vk::CommandBufferLevel {
        self.level
    }

    pub fn pool(&self) -> vk::CommandPool {
        self.pool
    }

    pub fn mode(&self) -> ProfilerMode {
        self.mode
    }

    /// Number of query slots written by the last recording.
    pub fn query_count(&self) -> u32 {
        self.next_query
    }

    /// Start a new recording. `capacity` is the number of query slots the
    /// layer reset for this recording; 0 records structure only.
    pub fn begin(&mut self, mode: ProfilerMode, capacity: u32, writer: &mut dyn TimestampWriter) {
        let (handle, level, pool) = (self.handle, self.level, self.pool);
        *self = Self::new(handle, level, pool);
        self.mode = mode;
        self.capacity = capacity;
        self.span.begin = self.open(vk::PipelineStageFlags::TOP_OF_PIPE, writer);
    }

    pub fn end(&mut self, writer: &mut dyn TimestampWriter) {
        self.close_pipeline(writer);
        self.implicit_open = false;
        if self.span.begin.is_some() {
            self.span.end = self.close(vk::PipelineStageFlags::BOTTOM_OF_PIPE, writer);
        }
    }

    pub fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        match bind_point {
            vk::PipelineBindPoint::GRAPHICS => self.bound_graphics = pipeline,
            vk::PipelineBindPoint::COMPUTE => self.bound_compute = pipeline,
            _ => {}
        }
    }

    pub fn pre_begin_render_pass(&mut self, writer: &mut dyn TimestampWriter) {
        self.close_pipeline(writer);
        self.implicit_open = false;
        self.pending_render_pass_begin = if self.mode.times_render_passes() {
            self.open(vk::PipelineStageFlags::TOP_OF_PIPE, writer)
        } else {
            None
        };
    }

    pub fn post_begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        contents: vk::SubpassContents,
        writer: &mut dyn TimestampWriter,
    ) {
        let begin = self.pending_render_pass_begin.take();
        let after_begin = match begin {
            Some(_) => self.close(vk::PipelineStageFlags::BOTTOM_OF_PIPE, writer),
            None => None,
        };
        self.render_passes.push(RecordedRenderPass {
            handle: render_pass,
            begin: QuerySpan { begin, end: after_begin },
            end: QuerySpan::default(),
            subpasses: vec![RecordedSubpass::new(0, contents)],
        });
        self.in_render_pass = true;
    }

    /// Called before forwarding `vkCmdNextSubpass`.
    pub fn next_subpass(&mut self, contents: vk::SubpassContents, writer: &mut dyn TimestampWriter) {
        self.close_pipeline(writer);
        if let Some(render_pass) = self.render_passes.last_mut() {
            let index = render_pass.subpasses.last().map_or(0, |s| s.index + 1);
            render_pass.subpasses.push(RecordedSubpass::new(index, contents));
        }
    }

    pub fn pre_end_render_pass(&mut self, writer: &mut dyn TimestampWriter) {
        self.close_pipeline(writer);
        let timed = self
            .render_passes
            .last()
            .is_some_and(|rp| rp.begin.begin.is_some());
        if timed {
            let before_end = self.open(vk::PipelineStageFlags::TOP_OF_PIPE, writer);
            if let Some(render_pass) = self.render_passes.last_mut() {
                render_pass.end.begin = before_end;
            }
        }
    }

    pub fn post_end_render_pass(&mut self, writer: &mut dyn TimestampWriter) {
        let timed = self
            .render_passes
            .last()
            .is_some_and(|rp| rp.end.begin.is_some());
        if timed {
            let after_end = self.close(vk::PipelineStageFlags::BOTTOM_OF_PIPE, writer);
            if let Some(render_pass) = self.render_passes.last_mut() {
                render_pass.end.end = after_end;
            }
        }
        self.in_render_pass = false;
    }

    /// Called before forwarding a profiled command.
    pub fn pre_command(&mut self, kind: DrawcallType, writer: &mut dyn TimestampWriter) {
        self.ensure_subpass(vk::SubpassContents::INLINE, writer);

        let target = match kind.bind_point() {
            Some(vk::PipelineBindPoint::GRAPHICS) => self.bound_graphics,
            Some(vk::PipelineBindPoint::COMPUTE) => self.bound_compute,
            _ => vk::Pipeline::null(),
        };
        let reuse = self
            .current_subpass()
            .and_then(|s| s.pipelines.last())
            .is_some_and(|p| p.open && p.handle == target);
        if !reuse {
            self.close_pipeline(writer);
            let begin = if self.mode.times_pipelines() {
                self.open(vk::PipelineStageFlags::TOP_OF_PIPE, writer)
            } else {
                None
            };
            if let Some(subpass) = self.current_subpass_mut() {
                subpass.pipelines.push(RecordedPipeline {
                    handle: target,
                    span: QuerySpan { begin, end: None },
                    open: true,
                    drawcalls: Vec::new(),
                });
            }
        }

        let begin = if self.mode.times_drawcalls() {
            self.open(vk::PipelineStageFlags::TOP_OF_PIPE, writer)
        } else {
            None
        };
        if let Some(pipeline) = self.current_pipeline_mut() {
            pipeline.drawcalls.push(RecordedDrawcall {
                kind,
                span: QuerySpan { begin, end: None },
            });
        }
    }

    /// Called after forwarding a profiled command.
    pub fn post_command(&mut self, writer: &mut dyn TimestampWriter) {
        let timed = self
            .current_pipeline_mut()
            .and_then(|p| p.drawcalls.last())
            .is_some_and(|d| d.span.begin.is_some() && d.span.end.is_none());
        if timed {
            let end = self.close(vk::PipelineStageFlags::BOTTOM_OF_PIPE, writer);
            if let Some(drawcall) = self.current_pipeline_mut().and_then(|p| p.drawcalls.last_mut()) {
                drawcall.span.end = end;
            }
        }
    }

    /// Called before forwarding `vkCmdExecuteCommands`. Secondaries carry no
    /// timestamps of their own, so the primary times the whole call.
    pub fn pre_execute_commands(
        &mut self,
        secondaries: &[vk::CommandBuffer],
        writer: &mut dyn TimestampWriter,
    ) {
        self.ensure_subpass(vk::SubpassContents::SECONDARY_COMMAND_BUFFERS, writer);
        self.close_pipeline(writer);
        // Bound state is undefined after vkCmdExecuteCommands.
        self.bound_graphics = vk::Pipeline::null();
        self.bound_compute = vk::Pipeline::null();
        let begin = if self.mode.times_pipelines() || self.mode.times_drawcalls() {
            self.open(vk::PipelineStageFlags::TOP_OF_PIPE, writer)
        } else {
            None
        };
        if let Some(subpass) = self.current_subpass_mut() {
            subpass
                .secondaries
                .extend(secondaries.iter().copied().filter(|cb| *cb != vk::CommandBuffer::null()));
            subpass.executions.push(QuerySpan { begin, end: None });
        }
    }

    /// Called after forwarding `vkCmdExecuteCommands`.
    pub fn post_execute_commands(&mut self, writer: &mut dyn TimestampWriter) {
        let timed = self
            .current_subpass()
            .and_then(|s| s.executions.last())
            .is_some_and(|e| e.begin.is_some() && e.end.is_none());
        if timed {
            let end = self.close(vk::PipelineStageFlags::BOTTOM_OF_PIPE, writer);
            if let Some(execution) = self.current_subpass_mut().and_then(|s| s.executions.last_mut()) {
                execution.end = end;
            }
        }
    }

    /// Secondary command buffers executed by this recording.
    pub fn executed_secondaries(&self) -> impl Iterator<Item = vk::CommandBuffer> + '_ {
        self.render_passes
            .iter()
            .flat_map(|rp| rp.subpasses.iter())
            .flat_map(|s| s.secondaries.iter().copied())
    }

    /// Build resolved data from the timestamps read back after execution.
    /// `secondary` resolves command buffers executed through
    /// `vkCmdExecuteCommands`.
    pub fn resolve(
        &self,
        timestamps: &[u64],
        secondary: &dyn Fn(vk::CommandBuffer) -> Option<CommandBufferData>,
    ) -> CommandBufferData {
        let render_passes: Vec<RenderPassData> = self
            .render_passes
            .iter()
            .map(|rp| resolve_render_pass(rp, timestamps, secondary))
            .collect();
        let ticks = self
            .span
            .ticks(timestamps)
            .unwrap_or_else(|| render_passes.iter().map(|rp| rp.ticks).sum());
        CommandBufferData {
            handle: self.handle,
            level: self.level,
            ticks,
            render_passes,
        }
    }

    // ── Recording helpers ───────────────────────────────────

    /// Write an opening marker if a slot is free for it and for its closer,
    /// on top of the closers already owed.
    fn open(&mut self, stage: vk::PipelineStageFlags, writer: &mut dyn TimestampWriter) -> Option<u32> {
        if self.capacity == 0 {
            return None;
        }
        if self.capacity - self.next_query < self.outstanding + 2 {
            if !self.overflow_reported {
                warn!(
                    "command buffer {:?}: timestamp query pool exhausted ({} slots), remaining regions are untimed",
                    self.handle, self.capacity
                );
                self.overflow_reported = true;
            }
            return None;
        }
        self.outstanding += 1;
        Some(self.push_query(stage, writer))
    }

    /// Write the closing marker of a region opened with [`Self::open`].
    fn close(&mut self, stage: vk::PipelineStageFlags, writer: &mut dyn TimestampWriter) -> Option<u32> {
        if self.outstanding == 0 || self.next_query >= self.capacity {
            return None;
        }
        self.outstanding -= 1;
        Some(self.push_query(stage, writer))
    }

    fn push_query(&mut self, stage: vk::PipelineStageFlags, writer: &mut dyn TimestampWriter) -> u32 {
        let query = self.next_query;
        self.next_query += 1;
        writer.write_timestamp(stage, query);
        query
    }

    fn ensure_subpass(&mut self, contents: vk::SubpassContents, writer: &mut dyn TimestampWriter) {
        if !self.in_render_pass && !self.implicit_open {
            self.render_passes.push(RecordedRenderPass {
                handle: vk::RenderPass::null(),
                begin: QuerySpan::default(),
                end: QuerySpan::default(),
                subpasses: vec![RecordedSubpass::new(0, contents)],
            });
            self.implicit_open = true;
            return;
        }
        if !self.implicit_open {
            return;
        }
        // Outside a render pass, inline commands and executed secondaries get
        // separate subpasses of the implicit render pass.
        let switch_from = self
            .current_subpass()
            .filter(|s| s.contents != contents)
            .map(|s| s.index);
        if let Some(index) = switch_from {
            self.close_pipeline(writer);
            if let Some(render_pass) = self.render_passes.last_mut() {
                render_pass.subpasses.push(RecordedSubpass::new(index + 1, contents));
            }
        }
    }

    fn current_subpass(&self) -> Option<&RecordedSubpass> {
        self.render_passes.last().and_then(|rp| rp.subpasses.last())
    }

    fn current_subpass_mut(&mut self) -> Option<&mut RecordedSubpass> {
        self.render_passes.last_mut().and_then(|rp| rp.subpasses.last_mut())
    }

    fn current_pipeline_mut(&mut self) -> Option<&mut RecordedPipeline> {
        self.current_subpass_mut().and_then(|s| s.pipelines.last_mut())
    }

    fn close_pipeline(&mut self, writer: &mut dyn TimestampWriter) {
        let needs_end = self
            .current_subpass()
            .and_then(|s| s.pipelines.last())
            .is_some_and(|p| p.open && p.span.begin.is_some());
        let end = if needs_end {
            self.close(vk::PipelineStageFlags::BOTTOM_OF_PIPE, writer)
        } else {
            None
        };
        if let Some(pipeline) = self.current_pipeline_mut() {
            if pipeline.open {
                pipeline.open = false;
                pipeline.span.end = end;
            }
        }
    }
}

fn resolve_render_pass(
    render_pass: &RecordedRenderPass,
    timestamps: &[u64],
    secondary: &dyn Fn(vk::CommandBuffer) -> Option<CommandBufferData>,
) -> RenderPassData {
    let subpasses: Vec<SubpassData> = render_pass
        .subpasses
        .iter()
        .map(|s| resolve_subpass(s, timestamps, secondary))
        .collect();
    let whole = QuerySpan {
        begin: render_pass.begin.begin,
        end: render_pass.end.end,
    };
    let ticks = whole
        .ticks(timestamps)
        .unwrap_or_else(|| subpasses.iter().map(|s| s.ticks).sum());
    RenderPassData {
        handle: render_pass.handle,
        ticks,
        begin_ticks: render_pass.begin.ticks(timestamps).unwrap_or(0),
        end_ticks: render_pass.end.ticks(timestamps).unwrap_or(0),
        subpasses,
    }
}

fn resolve_subpass(
    subpass: &RecordedSubpass,
    timestamps: &[u64],
    secondary: &dyn Fn(vk::CommandBuffer) -> Option<CommandBufferData>,
) -> SubpassData {
    let pipelines: Vec<PipelineData> = subpass
        .pipelines
        .iter()
        .map(|p| {
            let drawcalls: Vec<DrawcallData> = p
                .drawcalls
                .iter()
                .map(|d| DrawcallData {
                    kind: d.kind,
                    ticks: d.span.ticks(timestamps).unwrap_or(0),
                })
                .collect();
            let ticks = p
                .span
                .ticks(timestamps)
                .unwrap_or_else(|| drawcalls.iter().map(|d| d.ticks).sum());
            PipelineData {
                handle: p.handle,
                ticks,
                drawcalls,
            }
        })
        .collect();
    let secondary_command_buffers: Vec<CommandBufferData> =
        subpass.secondaries.iter().filter_map(|cb| secondary(*cb)).collect();
    let executed: Vec<u64> = subpass
        .executions
        .iter()
        .filter_map(|e| e.ticks(timestamps))
        .collect();
    let executed = if executed.is_empty() {
        secondary_command_buffers.iter().map(|c| c.ticks).sum::<u64>()
    } else {
        executed.iter().sum()
    };
    let ticks = pipelines.iter().map(|p| p.ticks).sum::<u64>() + executed;
    SubpassData {
        index: subpass.index,
        contents: subpass.contents,
        ticks,
        pipelines,
        secondary_command_buffers,
    }
}
