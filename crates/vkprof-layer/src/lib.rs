//! vkprof Vulkan layer
//!
//! This cdylib is loaded by the Vulkan loader as `VK_LAYER_profiler`. It
//! intercepts instance, device, command buffer and queue functions, forwards
//! them down the call chain and feeds the per-device profiler on the way.

#![allow(non_snake_case)]

use std::ffi::{c_char, CStr};
use std::sync::OnceLock;

use ash::vk;
use tracing::{debug, info};
use vkprof_core::ProfilerConfig;

pub mod command;
pub mod device;
pub mod dispatch;
pub mod ext;
pub mod handle_store;
pub mod instance;
pub mod link;
pub mod overlay;
pub mod queue;

// ── Configuration singleton ─────────────────────────────────

static CONFIG: OnceLock<ProfilerConfig> = OnceLock::new();

/// Layer configuration, loaded on first use. Also installs logging.
pub fn layer_config() -> &'static ProfilerConfig {
    CONFIG.get_or_init(|| {
        vkprof_common::init_logging();
        let config = ProfilerConfig::load_default_location();
        info!(
            "{} loaded: mode {:?}, sync {:?}, overlay {}",
            vkprof_common::LAYER_NAME,
            config.mode,
            config.sync_mode,
            config.overlay
        );
        config
    })
}

// ── Loader negotiation ──────────────────────────────────────

/// Negotiate the loader/layer interface version.
#[no_mangle]
pub unsafe extern "system" fn vkNegotiateLoaderLayerInterfaceVersion(
    p_version_struct: *mut link::NegotiateLayerInterface,
) -> vk::Result {
    if p_version_struct.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    let negotiate = unsafe { &mut *p_version_struct };
    if negotiate.s_type != link::LAYER_NEGOTIATE_INTERFACE_STRUCT {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    if negotiate.loader_layer_interface_version < link::LAYER_INTERFACE_VERSION {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    layer_config();

    negotiate.loader_layer_interface_version = link::LAYER_INTERFACE_VERSION;
    negotiate.pfn_get_instance_proc_addr = Some(vkprof_GetInstanceProcAddr);
    negotiate.pfn_get_device_proc_addr = Some(vkprof_GetDeviceProcAddr);
    negotiate.pfn_get_physical_device_proc_addr = None;
    debug!("negotiated layer interface version {}", link::LAYER_INTERFACE_VERSION);
    vk::Result::SUCCESS
}

// ── Proc address routing ────────────────────────────────────

macro_rules! hook {
    ($f:path) => {
        Some(unsafe { std::mem::transmute::<*const (), unsafe extern "system" fn()>($f as *const ()) })
    };
}

/// Functions that belong to the layer itself and are answered regardless of
/// what the next layer supports.
fn layer_function(name: &str) -> vk::PFN_vkVoidFunction {
    match name {
        "vkGetInstanceProcAddr" => hook!(vkprof_GetInstanceProcAddr),
        "vkGetDeviceProcAddr" => hook!(vkprof_GetDeviceProcAddr),
        "vkCreateInstance" => hook!(instance::vkprof_CreateInstance),
        "vkDestroyInstance" => hook!(instance::vkprof_DestroyInstance),
        "vkEnumerateInstanceLayerProperties" => hook!(instance::vkprof_EnumerateInstanceLayerProperties),
        "vkEnumerateInstanceExtensionProperties" => hook!(instance::vkprof_EnumerateInstanceExtensionProperties),
        "vkEnumerateDeviceLayerProperties" => hook!(instance::vkprof_EnumerateDeviceLayerProperties),
        "vkEnumerateDeviceExtensionProperties" => hook!(instance::vkprof_EnumerateDeviceExtensionProperties),
        "vkCreateDevice" => hook!(device::vkprof_CreateDevice),
        "vkDestroyDevice" => hook!(device::vkprof_DestroyDevice),
        _ => None,
    }
}

/// Profiler extension functions, only reachable through `vkGetDeviceProcAddr`.
fn extension_function(name: &str) -> vk::PFN_vkVoidFunction {
    match name {
        "vkSetProfilerModeEXT" => hook!(ext::vkprof_SetProfilerModeEXT),
        "vkSetProfilerSyncModeEXT" => hook!(ext::vkprof_SetProfilerSyncModeEXT),
        "vkGetProfilerFrameDataEXT" => hook!(ext::vkprof_GetProfilerFrameDataEXT),
        "vkFreeProfilerFrameDataEXT" => hook!(ext::vkprof_FreeProfilerFrameDataEXT),
        "vkFlushProfilerEXT" => hook!(ext::vkprof_FlushProfilerEXT),
        "vkEnumerateProfilerPerformanceCounterPropertiesEXT" => {
            hook!(ext::vkprof_EnumerateProfilerPerformanceCounterPropertiesEXT)
        }
        _ => None,
    }
}

/// Device-level functions that wrap a function of the next layer. They are
/// only returned when the next layer provides the function too.
fn device_function(name: &str) -> vk::PFN_vkVoidFunction {
    match name {
        // ── Resources ───────────────────────────────────────
        "vkCreateGraphicsPipelines" => hook!(device::vkprof_CreateGraphicsPipelines),
        "vkCreateComputePipelines" => hook!(device::vkprof_CreateComputePipelines),
        "vkDestroyPipeline" => hook!(device::vkprof_DestroyPipeline),
        "vkAllocateMemory" => hook!(device::vkprof_AllocateMemory),
        "vkFreeMemory" => hook!(device::vkprof_FreeMemory),
        "vkCreateCommandPool" => hook!(device::vkprof_CreateCommandPool),
        "vkDestroyCommandPool" => hook!(device::vkprof_DestroyCommandPool),
        "vkAllocateCommandBuffers" => hook!(device::vkprof_AllocateCommandBuffers),
        "vkFreeCommandBuffers" => hook!(device::vkprof_FreeCommandBuffers),

        // ── Command buffers ─────────────────────────────────
        "vkBeginCommandBuffer" => hook!(command::vkprof_BeginCommandBuffer),
        "vkEndCommandBuffer" => hook!(command::vkprof_EndCommandBuffer),
        "vkCmdBeginRenderPass" => hook!(command::vkprof_CmdBeginRenderPass),
        "vkCmdNextSubpass" => hook!(command::vkprof_CmdNextSubpass),
        "vkCmdEndRenderPass" => hook!(command::vkprof_CmdEndRenderPass),
        "vkCmdBindPipeline" => hook!(command::vkprof_CmdBindPipeline),
        "vkCmdExecuteCommands" => hook!(command::vkprof_CmdExecuteCommands),
        "vkCmdDraw" => hook!(command::vkprof_CmdDraw),
        "vkCmdDrawIndexed" => hook!(command::vkprof_CmdDrawIndexed),
        "vkCmdDrawIndirect" => hook!(command::vkprof_CmdDrawIndirect),
        "vkCmdDrawIndexedIndirect" => hook!(command::vkprof_CmdDrawIndexedIndirect),
        "vkCmdDrawIndirectCount" => hook!(command::vkprof_CmdDrawIndirectCount),
        "vkCmdDrawIndexedIndirectCount" => hook!(command::vkprof_CmdDrawIndexedIndirectCount),
        "vkCmdDispatch" => hook!(command::vkprof_CmdDispatch),
        "vkCmdDispatchIndirect" => hook!(command::vkprof_CmdDispatchIndirect),
        "vkCmdCopyBuffer" => hook!(command::vkprof_CmdCopyBuffer),
        "vkCmdCopyBufferToImage" => hook!(command::vkprof_CmdCopyBufferToImage),
        "vkCmdCopyImage" => hook!(command::vkprof_CmdCopyImage),
        "vkCmdCopyImageToBuffer" => hook!(command::vkprof_CmdCopyImageToBuffer),
        "vkCmdClearAttachments" => hook!(command::vkprof_CmdClearAttachments),
        "vkCmdClearColorImage" => hook!(command::vkprof_CmdClearColorImage),
        "vkCmdClearDepthStencilImage" => hook!(command::vkprof_CmdClearDepthStencilImage),
        "vkCmdResolveImage" => hook!(command::vkprof_CmdResolveImage),
        "vkCmdBlitImage" => hook!(command::vkprof_CmdBlitImage),
        "vkCmdFillBuffer" => hook!(command::vkprof_CmdFillBuffer),
        "vkCmdUpdateBuffer" => hook!(command::vkprof_CmdUpdateBuffer),

        // ── Queues ──────────────────────────────────────────
        "vkQueueSubmit" => hook!(queue::vkprof_QueueSubmit),
        "vkQueuePresentKHR" => hook!(queue::vkprof_QueuePresentKHR),
        _ => None,
    }
}

/// Layer `vkGetInstanceProcAddr`.
#[no_mangle]
pub unsafe extern "system" fn vkprof_GetInstanceProcAddr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    let Ok(name) = (unsafe { CStr::from_ptr(p_name) }).to_str() else {
        return None;
    };
    if let Some(f) = layer_function(name) {
        return Some(f);
    }

    let record = unsafe { handle_store::instance_for(instance) }?;
    let next = record.proc_addr(p_name);
    if next.is_some() {
        if let Some(f) = device_function(name) {
            return Some(f);
        }
    }
    next
}

/// Layer `vkGetDeviceProcAddr`.
#[no_mangle]
pub unsafe extern "system" fn vkprof_GetDeviceProcAddr(
    device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    let Ok(name) = (unsafe { CStr::from_ptr(p_name) }).to_str() else {
        return None;
    };
    match name {
        "vkGetDeviceProcAddr" => return hook!(vkprof_GetDeviceProcAddr),
        "vkDestroyDevice" => return hook!(device::vkprof_DestroyDevice),
        "vkEnumerateDeviceLayerProperties" => return hook!(instance::vkprof_EnumerateDeviceLayerProperties),
        "vkEnumerateDeviceExtensionProperties" => {
            return hook!(instance::vkprof_EnumerateDeviceExtensionProperties)
        }
        _ => {}
    }
    if let Some(f) = extension_function(name) {
        return Some(f);
    }

    let record = unsafe { handle_store::device_for(device) }?;
    let next = record.proc_addr(p_name);
    if next.is_some() {
        if let Some(f) = device_function(name) {
            return Some(f);
        }
    }
    next
}
