//! Loader <-> layer ABI structures (`vk_layer.h`).
//!
//! The loader passes the next element of the call chain through the `pNext`
//! chain of `VkInstanceCreateInfo` / `VkDeviceCreateInfo`. Each layer reads
//! its link and advances the chain before calling down.

use std::ffi::{c_char, c_void};

use ash::vk;

pub const LOADER_INSTANCE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(47);
pub const LOADER_DEVICE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(48);

/// `VkLayerFunction`
pub const LAYER_LINK_INFO: u32 = 0;
pub const LOADER_DATA_CALLBACK: u32 = 1;

/// `VkNegotiateLayerStructType::LAYER_NEGOTIATE_INTERFACE_STRUCT`
pub const LAYER_NEGOTIATE_INTERFACE_STRUCT: u32 = 1;

/// Highest loader/layer interface version implemented here.
pub const LAYER_INTERFACE_VERSION: u32 = 2;

pub type PfnGetPhysicalDeviceProcAddr =
    unsafe extern "system" fn(vk::Instance, *const c_char) -> vk::PFN_vkVoidFunction;
pub type PfnSetInstanceLoaderData = unsafe extern "system" fn(vk::Instance, *mut c_void) -> vk::Result;
pub type PfnSetDeviceLoaderData = unsafe extern "system" fn(vk::Device, *mut c_void) -> vk::Result;

#[repr(C)]
pub struct NegotiateLayerInterface {
    pub s_type: u32,
    pub p_next: *mut c_void,
    pub loader_layer_interface_version: u32,
    pub pfn_get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    pub pfn_get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
    pub pfn_get_physical_device_proc_addr: Option<PfnGetPhysicalDeviceProcAddr>,
}

#[repr(C)]
pub struct LayerInstanceLink {
    pub p_next: *mut LayerInstanceLink,
    pub pfn_next_get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub pfn_next_get_physical_device_proc_addr: Option<PfnGetPhysicalDeviceProcAddr>,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union LayerInstancePayload {
    pub layer_info: *mut LayerInstanceLink,
    pub set_instance_loader_data: Option<PfnSetInstanceLoaderData>,
}

#[repr(C)]
pub struct LayerInstanceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: u32,
    pub u: LayerInstancePayload,
}

#[repr(C)]
pub struct LayerDeviceLink {
    pub p_next: *mut LayerDeviceLink,
    pub pfn_next_get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub pfn_next_get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union LayerDevicePayload {
    pub layer_info: *mut LayerDeviceLink,
    pub set_device_loader_data: Option<PfnSetDeviceLoaderData>,
}

#[repr(C)]
pub struct LayerDeviceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: u32,
    pub u: LayerDevicePayload,
}

/// Common prefix of every structure in a `pNext` chain.
#[repr(C)]
struct ChainHeader {
    s_type: vk::StructureType,
    p_next: *const c_void,
}

/// Find the first loader create info of `s_type` carrying `function`.
unsafe fn find_loader_info<T>(mut p: *const c_void, s_type: vk::StructureType, function: u32) -> Option<*mut T> {
    while !p.is_null() {
        let header = unsafe { &*(p as *const ChainHeader) };
        if header.s_type == s_type {
            // Both loader create infos share the `function` field offset.
            let info = unsafe { &*(p as *const LayerInstanceCreateInfo) };
            if info.function == function {
                return Some(p as *mut T);
            }
        }
        p = header.p_next;
    }
    None
}

/// Returns the next layer's link from the instance create info chain.
///
/// # Safety
/// `p_next` must be a valid `pNext` chain.
pub unsafe fn find_instance_link(p_next: *const c_void) -> Option<*mut LayerInstanceLink> {
    let info = unsafe {
        find_loader_info::<LayerInstanceCreateInfo>(p_next, LOADER_INSTANCE_CREATE_INFO, LAYER_LINK_INFO)?
    };
    let link = unsafe { (*info).u.layer_info };
    (!link.is_null()).then_some(link)
}

/// Step the instance link past this layer.
///
/// # Safety
/// `p_next` must be a valid `pNext` chain owned by the loader.
pub unsafe fn advance_instance_link(p_next: *const c_void) {
    if let Some(info) = unsafe {
        find_loader_info::<LayerInstanceCreateInfo>(p_next, LOADER_INSTANCE_CREATE_INFO, LAYER_LINK_INFO)
    } {
        unsafe {
            let link = (*info).u.layer_info;
            if !link.is_null() {
                (*info).u.layer_info = (*link).p_next;
            }
        }
    }
}

/// Returns the next layer's link from the device create info chain.
///
/// # Safety
/// `p_next` must be a valid `pNext` chain.
pub unsafe fn find_device_link(p_next: *const c_void) -> Option<*mut LayerDeviceLink> {
    let info = unsafe {
        find_loader_info::<LayerDeviceCreateInfo>(p_next, LOADER_DEVICE_CREATE_INFO, LAYER_LINK_INFO)?
    };
    let link = unsafe { (*info).u.layer_info };
    (!link.is_null()).then_some(link)
}

/// Step the device link past this layer.
///
/// # Safety
/// `p_next` must be a valid `pNext` chain owned by the loader.
pub unsafe fn advance_device_link(p_next: *const c_void) {
    if let Some(info) = unsafe {
        find_loader_info::<LayerDeviceCreateInfo>(p_next, LOADER_DEVICE_CREATE_INFO, LAYER_LINK_INFO)
    } {
        unsafe {
            let link = (*info).u.layer_info;
            if !link.is_null() {
                (*info).u.layer_info = (*link).p_next;
            }
        }
    }
}

/// Callback that initializes the dispatch pointer of dispatchable objects
/// the layer creates itself.
///
/// # Safety
/// `p_next` must be a valid `pNext` chain.
pub unsafe fn find_device_loader_data_callback(p_next: *const c_void) -> Option<PfnSetDeviceLoaderData> {
    let info = unsafe {
        find_loader_info::<LayerDeviceCreateInfo>(p_next, LOADER_DEVICE_CREATE_INFO, LOADER_DATA_CALLBACK)?
    };
    unsafe { (*info).u.set_device_loader_data }
}
