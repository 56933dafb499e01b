//! Profiler extension entry points exposed through `vkGetDeviceProcAddr`.
//!
//! Frame data is handed to the application as a heap-allocated tree of
//! `#[repr(C)]` regions which must be released with
//! `vkFreeProfilerFrameDataEXT`.

use std::ffi::{c_char, c_void};
use std::ptr;

use ash::vk;
use tracing::{debug, warn};
use vkprof_core::data::FrameData;
use vkprof_core::region::{Region, RegionBuilder, RegionKind};
use vkprof_core::{ProfilerMode, SyncMode};

use crate::handle_store;

pub const STRUCTURE_TYPE_PROFILER_DATA_EXT: vk::StructureType = vk::StructureType::from_raw(1_000_999_000);
pub const STRUCTURE_TYPE_PROFILER_REGION_DATA_EXT: vk::StructureType = vk::StructureType::from_raw(1_000_999_001);
pub const STRUCTURE_TYPE_PROFILER_RENDER_PASS_DATA_EXT: vk::StructureType =
    vk::StructureType::from_raw(1_000_999_002);

/// `VkProfilerRegionTypeEXT`
pub const REGION_TYPE_FRAME: i32 = 0;
pub const REGION_TYPE_SUBMIT: i32 = 1;
pub const REGION_TYPE_SUBMIT_INFO: i32 = 2;
pub const REGION_TYPE_COMMAND_BUFFER: i32 = 3;
pub const REGION_TYPE_RENDER_PASS: i32 = 4;
pub const REGION_TYPE_SUBPASS: i32 = 5;
pub const REGION_TYPE_PIPELINE: i32 = 6;
pub const REGION_TYPE_COMMAND: i32 = 7;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SubmitProperties {
    pub queue: vk::Queue,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CommandBufferProperties {
    pub handle: vk::CommandBuffer,
    pub level: vk::CommandBufferLevel,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RenderPassProperties {
    pub handle: vk::RenderPass,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SubpassProperties {
    pub index: u32,
    pub contents: vk::SubpassContents,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PipelineProperties {
    pub handle: vk::Pipeline,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CommandProperties {
    pub command_type: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union RegionProperties {
    pub submit: SubmitProperties,
    pub command_buffer: CommandBufferProperties,
    pub render_pass: RenderPassProperties,
    pub subpass: SubpassProperties,
    pub pipeline: PipelineProperties,
    pub command: CommandProperties,
}

/// `VkProfilerRegionDataEXT`
#[repr(C)]
pub struct ProfilerRegionData {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub region_type: i32,
    pub properties: RegionProperties,
    /// Milliseconds.
    pub duration: f32,
    pub subregion_count: u32,
    pub p_subregions: *mut ProfilerRegionData,
}

impl Default for ProfilerRegionData {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_PROFILER_REGION_DATA_EXT,
            p_next: ptr::null_mut(),
            region_type: REGION_TYPE_FRAME,
            // All union members are plain integers and handles.
            properties: unsafe { std::mem::zeroed() },
            duration: 0.0,
            subregion_count: 0,
            p_subregions: ptr::null_mut(),
        }
    }
}

/// `VkProfilerRenderPassDataEXT`, chained to render pass regions.
#[repr(C)]
pub struct ProfilerRenderPassData {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub begin_duration: f32,
    pub end_duration: f32,
}

/// `VkProfilerDataEXT`
#[repr(C)]
pub struct ProfilerData {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub frame: ProfilerRegionData,
}

impl Default for ProfilerData {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_PROFILER_DATA_EXT,
            p_next: ptr::null_mut(),
            frame: ProfilerRegionData::default(),
        }
    }
}

/// `VkProfilerPerformanceCounterPropertiesEXT`
#[repr(C)]
pub struct ProfilerPerformanceCounterProperties {
    pub short_name: [c_char; vk::MAX_DESCRIPTION_SIZE],
    pub category: [c_char; vk::MAX_DESCRIPTION_SIZE],
    pub description: [c_char; vk::MAX_DESCRIPTION_SIZE],
    pub unit: i32,
    pub storage: i32,
}

/// Convert a region subtree into its C representation. The returned value
/// owns heap memory released by [`free_region`].
pub fn export_region(region: &Region) -> ProfilerRegionData {
    let mut out = ProfilerRegionData {
        duration: region.duration,
        ..ProfilerRegionData::default()
    };
    match region.kind {
        RegionKind::Frame => out.region_type = REGION_TYPE_FRAME,
        RegionKind::Submit { queue } => {
            out.region_type = REGION_TYPE_SUBMIT;
            out.properties.submit = SubmitProperties { queue };
        }
        RegionKind::SubmitInfo => out.region_type = REGION_TYPE_SUBMIT_INFO,
        RegionKind::CommandBuffer { handle, level } => {
            out.region_type = REGION_TYPE_COMMAND_BUFFER;
            out.properties.command_buffer = CommandBufferProperties { handle, level };
        }
        RegionKind::RenderPass {
            handle,
            begin_duration,
            end_duration,
        } => {
            out.region_type = REGION_TYPE_RENDER_PASS;
            out.properties.render_pass = RenderPassProperties { handle };
            let render_pass_data = Box::new(ProfilerRenderPassData {
                s_type: STRUCTURE_TYPE_PROFILER_RENDER_PASS_DATA_EXT,
                p_next: ptr::null_mut(),
                begin_duration,
                end_duration,
            });
            out.p_next = Box::into_raw(render_pass_data).cast();
        }
        RegionKind::Subpass { index, contents } => {
            out.region_type = REGION_TYPE_SUBPASS;
            out.properties.subpass = SubpassProperties { index, contents };
        }
        RegionKind::Pipeline { handle } => {
            out.region_type = REGION_TYPE_PIPELINE;
            out.properties.pipeline = PipelineProperties { handle };
        }
        RegionKind::Command { command } => {
            out.region_type = REGION_TYPE_COMMAND;
            out.properties.command = CommandProperties {
                command_type: command as i32,
            };
        }
    }

    if !region.subregions.is_empty() {
        let subregions: Box<[ProfilerRegionData]> = region.subregions.iter().map(export_region).collect();
        out.subregion_count = subregions.len() as u32;
        out.p_subregions = Box::into_raw(subregions).cast();
    }
    out
}

/// Release everything [`export_region`] allocated for `region`. The struct is
/// left empty, so freeing twice or freeing a zeroed struct does nothing.
///
/// # Safety
/// `region` must be zeroed or produced by [`export_region`].
pub unsafe fn free_region(region: &mut ProfilerRegionData) {
    if !region.p_subregions.is_null() {
        let count = region.subregion_count as usize;
        let mut subregions = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(region.p_subregions, count)) };
        for subregion in subregions.iter_mut() {
            unsafe { free_region(subregion) };
        }
    }
    region.p_subregions = ptr::null_mut();
    region.subregion_count = 0;

    let mut next = region.p_next;
    while !next.is_null() {
        let header = unsafe { &*(next as *const vk::BaseOutStructure<'_>) };
        let following = header.p_next.cast::<c_void>();
        if header.s_type == STRUCTURE_TYPE_PROFILER_RENDER_PASS_DATA_EXT {
            drop(unsafe { Box::from_raw(next.cast::<ProfilerRenderPassData>()) });
        }
        next = following;
    }
    region.p_next = ptr::null_mut();
}

/// Region tree of `frame`, or `VK_NOT_READY` when nothing was submitted.
pub fn export_frame(frame: Option<&FrameData>, timestamp_period: f32) -> Result<ProfilerRegionData, vk::Result> {
    match frame {
        Some(frame) if !frame.submits.is_empty() => {
            Ok(export_region(&RegionBuilder::new(timestamp_period).frame(frame)))
        }
        _ => Err(vk::Result::NOT_READY),
    }
}

pub unsafe extern "system" fn vkprof_SetProfilerModeEXT(device: vk::Device, mode: i32) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    match ProfilerMode::from_raw(mode) {
        Ok(mode) => {
            record.profiler.set_mode(mode);
            vk::Result::SUCCESS
        }
        Err(e) => {
            warn!("{}", e);
            e.to_vk_result()
        }
    }
}

pub unsafe extern "system" fn vkprof_SetProfilerSyncModeEXT(device: vk::Device, sync_mode: i32) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    match SyncMode::from_raw(sync_mode) {
        Ok(sync_mode) => {
            record.profiler.set_sync_mode(sync_mode);
            vk::Result::SUCCESS
        }
        Err(e) => {
            warn!("{}", e);
            e.to_vk_result()
        }
    }
}

pub unsafe extern "system" fn vkprof_GetProfilerFrameDataEXT(device: vk::Device, p_data: *mut ProfilerData) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    if p_data.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    let latest = record.profiler.latest_frame();
    match export_frame(latest.as_deref(), record.profiler.timestamp_period()) {
        Ok(frame) => {
            unsafe { (*p_data).frame = frame };
            vk::Result::SUCCESS
        }
        Err(result) => result,
    }
}

pub unsafe extern "system" fn vkprof_FreeProfilerFrameDataEXT(_device: vk::Device, p_data: *mut ProfilerData) {
    if !p_data.is_null() {
        unsafe { free_region(&mut (*p_data).frame) };
    }
}

pub unsafe extern "system" fn vkprof_FlushProfilerEXT(device: vk::Device) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    debug!("flush requested on {:?}", device);
    crate::queue::finish_frame(&record)
}

/// No vendor metric sources are wired up, so the list is always empty.
pub unsafe extern "system" fn vkprof_EnumerateProfilerPerformanceCounterPropertiesEXT(
    _device: vk::Device,
    p_count: *mut u32,
    _p_properties: *mut ProfilerPerformanceCounterProperties,
) -> vk::Result {
    if p_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    unsafe { *p_count = 0 };
    vk::Result::SUCCESS
}
