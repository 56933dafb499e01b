//! Integration test: layer entry points that need no driver
//!
//! Run with: cargo test --test layer_test

use std::ffi::{c_char, CStr};
use std::ptr;

use ash::vk;
use vkprof_layer::instance::*;
use vkprof_layer::link::{NegotiateLayerInterface, LAYER_NEGOTIATE_INTERFACE_STRUCT};
use vkprof_layer::{vkNegotiateLoaderLayerInterfaceVersion, vkprof_GetDeviceProcAddr, vkprof_GetInstanceProcAddr};

fn negotiate_struct(version: u32) -> NegotiateLayerInterface {
    NegotiateLayerInterface {
        s_type: LAYER_NEGOTIATE_INTERFACE_STRUCT,
        p_next: ptr::null_mut(),
        loader_layer_interface_version: version,
        pfn_get_instance_proc_addr: None,
        pfn_get_device_proc_addr: None,
        pfn_get_physical_device_proc_addr: None,
    }
}

#[test]
fn test_negotiate_interface_version() {
    let mut negotiate = negotiate_struct(5);
    let result = unsafe { vkNegotiateLoaderLayerInterfaceVersion(&mut negotiate) };
    assert_eq!(result, vk::Result::SUCCESS);
    assert_eq!(negotiate.loader_layer_interface_version, 2);
    assert!(negotiate.pfn_get_instance_proc_addr.is_some());
    assert!(negotiate.pfn_get_device_proc_addr.is_some());

    let mut old_loader = negotiate_struct(1);
    let result = unsafe { vkNegotiateLoaderLayerInterfaceVersion(&mut old_loader) };
    assert_eq!(result, vk::Result::ERROR_INITIALIZATION_FAILED);

    let result = unsafe { vkNegotiateLoaderLayerInterfaceVersion(ptr::null_mut()) };
    assert_eq!(result, vk::Result::ERROR_INITIALIZATION_FAILED);
}

#[test]
fn test_global_proc_addr() {
    let lookup = |name: &CStr| unsafe { vkprof_GetInstanceProcAddr(vk::Instance::null(), name.as_ptr()) };
    assert!(lookup(c"vkCreateInstance").is_some());
    assert!(lookup(c"vkEnumerateInstanceLayerProperties").is_some());
    assert!(lookup(c"vkGetDeviceProcAddr").is_some());
    // Device commands need an instance to know whether the driver has them.
    assert!(lookup(c"vkCmdDraw").is_none());
    assert!(lookup(c"vkNotAFunction").is_none());
}

#[test]
fn test_device_proc_addr_without_device() {
    let lookup = |name: &CStr| unsafe { vkprof_GetDeviceProcAddr(vk::Device::null(), name.as_ptr()) };
    assert!(lookup(c"vkDestroyDevice").is_some());
    assert!(lookup(c"vkGetProfilerFrameDataEXT").is_some());
    assert!(lookup(c"vkEnumerateProfilerPerformanceCounterPropertiesEXT").is_some());
    assert!(lookup(c"vkQueueSubmit").is_none());
}

#[test]
fn test_enumerate_layer_properties() {
    let mut count = 0u32;
    let result = unsafe { vkprof_EnumerateInstanceLayerProperties(&mut count, ptr::null_mut()) };
    assert_eq!(result, vk::Result::SUCCESS);
    assert_eq!(count, 1);

    let mut properties = vk::LayerProperties::default();
    let result = unsafe { vkprof_EnumerateDeviceLayerProperties(vk::PhysicalDevice::null(), &mut count, &mut properties) };
    assert_eq!(result, vk::Result::SUCCESS);
    let name = unsafe { CStr::from_ptr(properties.layer_name.as_ptr()) };
    assert_eq!(name.to_str().ok(), Some("VK_LAYER_profiler"));

    let mut zero = 0u32;
    let result = unsafe { write_layer_properties(&mut zero, &mut properties) };
    assert_eq!(result, vk::Result::INCOMPLETE);
}

#[test]
fn test_enumerate_extension_properties() {
    let ours = c"VK_LAYER_profiler".as_ptr();
    let other = c"VK_LAYER_other".as_ptr();
    let mut count = 7u32;

    let result = unsafe { vkprof_EnumerateInstanceExtensionProperties(ours, &mut count, ptr::null_mut()) };
    assert_eq!(result, vk::Result::SUCCESS);
    assert_eq!(count, 0);

    let result = unsafe { vkprof_EnumerateInstanceExtensionProperties(other, &mut count, ptr::null_mut()) };
    assert_eq!(result, vk::Result::ERROR_LAYER_NOT_PRESENT);

    count = 3;
    let result = unsafe {
        vkprof_EnumerateDeviceExtensionProperties(vk::PhysicalDevice::null(), ours, &mut count, ptr::null_mut())
    };
    assert_eq!(result, vk::Result::SUCCESS);
    assert_eq!(count, 0);

    let result = unsafe {
        vkprof_EnumerateDeviceExtensionProperties(vk::PhysicalDevice::null(), other, &mut count, ptr::null_mut())
    };
    assert_eq!(result, vk::Result::SUCCESS);
}

#[test]
fn test_write_c_string_truncates() {
    let mut buffer: [c_char; 4] = [1; 4];
    write_c_string("profiler", &mut buffer);
    let text = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    assert_eq!(text.to_bytes(), b"pro");
}
