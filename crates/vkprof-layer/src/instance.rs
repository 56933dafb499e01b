//! Instance creation and layer/extension enumeration.

use std::ffi::{c_char, CStr};

use ash::vk;
use tracing::{error, info};

use crate::dispatch::{dispatch_key, InstanceRecord};
use crate::{handle_store, link};

pub unsafe extern "system" fn vkprof_CreateInstance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    crate::layer_config();
    if p_create_info.is_null() || p_instance.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    let p_next = unsafe { (*p_create_info).p_next };
    let Some(layer_link) = (unsafe { link::find_instance_link(p_next) }) else {
        error!("vkCreateInstance: loader link info missing");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let next_gipa = unsafe { (*layer_link).pfn_next_get_instance_proc_addr };
    unsafe { link::advance_instance_link(p_next) };

    let Some(create_instance) = (unsafe { next_gipa(vk::Instance::null(), c"vkCreateInstance".as_ptr()) }) else {
        error!("vkCreateInstance: next layer does not provide vkCreateInstance");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let create_instance: vk::PFN_vkCreateInstance = unsafe { std::mem::transmute(create_instance) };
    let result = unsafe { create_instance(p_create_info, p_allocator, p_instance) };
    if result != vk::Result::SUCCESS {
        return result;
    }

    let instance = unsafe { *p_instance };
    let record = unsafe { InstanceRecord::load(instance, next_gipa) };
    handle_store::store_instance(unsafe { dispatch_key(instance) }, record);
    info!("instance {:?} created", instance);
    result
}

pub unsafe extern "system" fn vkprof_DestroyInstance(
    instance: vk::Instance,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    if instance == vk::Instance::null() {
        return;
    }
    let Some(record) = handle_store::remove_instance(unsafe { dispatch_key(instance) }) else {
        error!("vkDestroyInstance: unknown instance {:?}", instance);
        return;
    };
    unsafe { (record.fp.destroy_instance)(instance, p_allocator) };
    info!("instance {:?} destroyed", instance);
}

pub unsafe extern "system" fn vkprof_EnumerateInstanceLayerProperties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    unsafe { write_layer_properties(p_property_count, p_properties) }
}

pub unsafe extern "system" fn vkprof_EnumerateInstanceExtensionProperties(
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    _p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if p_property_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    if !unsafe { names_this_layer(p_layer_name) } {
        return vk::Result::ERROR_LAYER_NOT_PRESENT;
    }
    unsafe { *p_property_count = 0 };
    vk::Result::SUCCESS
}

pub unsafe extern "system" fn vkprof_EnumerateDeviceLayerProperties(
    _physical_device: vk::PhysicalDevice,
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    unsafe { write_layer_properties(p_property_count, p_properties) }
}

pub unsafe extern "system" fn vkprof_EnumerateDeviceExtensionProperties(
    physical_device: vk::PhysicalDevice,
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if p_property_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    if unsafe { names_this_layer(p_layer_name) } {
        unsafe { *p_property_count = 0 };
        return vk::Result::SUCCESS;
    }
    if physical_device == vk::PhysicalDevice::null() {
        return vk::Result::SUCCESS;
    }
    let Some(record) = (unsafe { handle_store::instance_for(physical_device) }) else {
        error!("vkEnumerateDeviceExtensionProperties: unknown physical device {:?}", physical_device);
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    unsafe {
        (record.fp.enumerate_device_extension_properties)(
            physical_device,
            p_layer_name,
            p_property_count,
            p_properties,
        )
    }
}

/// Report this layer as the single entry of a layer property query.
///
/// # Safety
/// `p_properties`, when non-null, must point to `*p_property_count` elements.
pub unsafe fn write_layer_properties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    if p_property_count.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    if p_properties.is_null() {
        unsafe { *p_property_count = 1 };
        return vk::Result::SUCCESS;
    }
    if unsafe { *p_property_count } == 0 {
        return vk::Result::INCOMPLETE;
    }

    let mut properties = vk::LayerProperties {
        spec_version: vk::API_VERSION_1_3,
        implementation_version: vkprof_common::LAYER_IMPLEMENTATION_VERSION,
        ..Default::default()
    };
    write_c_string(vkprof_common::LAYER_NAME, &mut properties.layer_name);
    write_c_string(vkprof_common::LAYER_DESCRIPTION, &mut properties.description);
    unsafe {
        *p_properties = properties;
        *p_property_count = 1;
    }
    vk::Result::SUCCESS
}

unsafe fn names_this_layer(p_layer_name: *const c_char) -> bool {
    !p_layer_name.is_null() && unsafe { CStr::from_ptr(p_layer_name) }.to_bytes() == vkprof_common::LAYER_NAME.as_bytes()
}

/// Copy `src` into a fixed-size, NUL-terminated C string field.
pub fn write_c_string(src: &str, dst: &mut [c_char]) {
    let bytes = src.as_bytes();
    let len = std::cmp::min(bytes.len(), dst.len() - 1);
    for (d, b) in dst.iter_mut().zip(&bytes[..len]) {
        *d = *b as c_char;
    }
    dst[len] = 0;
}
