//! Device creation and resource tracking hooks.

use ash::vk;
use tracing::{debug, error, info, warn};

use crate::dispatch::{dispatch_key, raw_slice, DeviceRecord, InstanceRecord};
use crate::overlay::Overlay;
use crate::{handle_store, link, queue};

pub unsafe extern "system" fn vkprof_CreateDevice(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> vk::Result {
    let config = crate::layer_config();
    if p_create_info.is_null() || p_device.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    let create_info = unsafe { &*p_create_info };
    let Some(layer_link) = (unsafe { link::find_device_link(create_info.p_next) }) else {
        error!("vkCreateDevice: loader link info missing");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let next_gipa = unsafe { (*layer_link).pfn_next_get_instance_proc_addr };
    let next_gdpa = unsafe { (*layer_link).pfn_next_get_device_proc_addr };
    let set_loader_data = unsafe { link::find_device_loader_data_callback(create_info.p_next) };
    unsafe { link::advance_device_link(create_info.p_next) };

    let instance = match unsafe { handle_store::instance_for(physical_device) } {
        Some(record) => record,
        None => {
            warn!("vkCreateDevice: physical device {:?} has no instance record", physical_device);
            std::sync::Arc::new(unsafe { InstanceRecord::load(vk::Instance::null(), next_gipa) })
        }
    };

    let Some(create_device) = (unsafe { next_gipa(instance.handle, c"vkCreateDevice".as_ptr()) }) else {
        error!("vkCreateDevice: next layer does not provide vkCreateDevice");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let create_device: vk::PFN_vkCreateDevice = unsafe { std::mem::transmute(create_device) };
    let result = unsafe { create_device(physical_device, p_create_info, p_allocator, p_device) };
    if result != vk::Result::SUCCESS {
        return result;
    }

    let device = unsafe { *p_device };
    let record = unsafe {
        DeviceRecord::new(
            device,
            physical_device,
            next_gdpa,
            set_loader_data,
            &instance,
            create_info,
            config,
        )
    };

    if config.overlay {
        match unsafe { Overlay::initialize(&record) } {
            Ok(overlay) => *record.overlay.lock() = Some(overlay),
            Err(result) => warn!("overlay initialization failed: {:?}", result),
        }
    }

    handle_store::store_device(unsafe { dispatch_key(device) }, record);
    info!("device {:?} created on {:?}", device, physical_device);
    result
}

pub unsafe extern "system" fn vkprof_DestroyDevice(device: vk::Device, p_allocator: *const vk::AllocationCallbacks<'_>) {
    if device == vk::Device::null() {
        return;
    }
    let Some(record) = handle_store::remove_device(unsafe { dispatch_key(device) }) else {
        error!("vkDestroyDevice: unknown device {:?}", device);
        return;
    };
    let destroy_device = record.fp.destroy_device;

    if let Some(mut overlay) = record.overlay.lock().take() {
        unsafe { overlay.destroy(&record.fp) };
    }
    record.release_all_timestamp_pools();

    unsafe { destroy_device(device, p_allocator) };
    info!("device {:?} destroyed", device);
}

// ── Pipelines ───────────────────────────────────────────────

pub unsafe extern "system" fn vkprof_CreateGraphicsPipelines(
    device: vk::Device,
    pipeline_cache: vk::PipelineCache,
    create_info_count: u32,
    p_create_infos: *const vk::GraphicsPipelineCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_pipelines: *mut vk::Pipeline,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let result = unsafe {
        (record.fp.create_graphics_pipelines)(
            device,
            pipeline_cache,
            create_info_count,
            p_create_infos,
            p_allocator,
            p_pipelines,
        )
    };
    if result != vk::Result::SUCCESS {
        return result;
    }

    let infos = unsafe { raw_slice(p_create_infos, create_info_count) };
    let pipelines = unsafe { raw_slice(p_pipelines, create_info_count) };
    let created: Vec<(vk::Pipeline, u32)> = pipelines
        .iter()
        .zip(infos)
        .map(|(pipeline, info)| (*pipeline, info.stage_count))
        .collect();
    record
        .profiler
        .create_pipelines(vk::PipelineBindPoint::GRAPHICS, &created);
    debug!("{} graphics pipelines created", created.len());
    result
}

pub unsafe extern "system" fn vkprof_CreateComputePipelines(
    device: vk::Device,
    pipeline_cache: vk::PipelineCache,
    create_info_count: u32,
    p_create_infos: *const vk::ComputePipelineCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_pipelines: *mut vk::Pipeline,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let result = unsafe {
        (record.fp.create_compute_pipelines)(
            device,
            pipeline_cache,
            create_info_count,
            p_create_infos,
            p_allocator,
            p_pipelines,
        )
    };
    if result != vk::Result::SUCCESS {
        return result;
    }

    let created: Vec<(vk::Pipeline, u32)> = unsafe { raw_slice(p_pipelines, create_info_count) }
        .iter()
        .map(|pipeline| (*pipeline, 1))
        .collect();
    record
        .profiler
        .create_pipelines(vk::PipelineBindPoint::COMPUTE, &created);
    debug!("{} compute pipelines created", created.len());
    result
}

pub unsafe extern "system" fn vkprof_DestroyPipeline(
    device: vk::Device,
    pipeline: vk::Pipeline,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return;
    };
    record.profiler.destroy_pipeline(pipeline);
    unsafe { (record.fp.destroy_pipeline)(device, pipeline, p_allocator) };
}

// ── Memory ──────────────────────────────────────────────────

pub unsafe extern "system" fn vkprof_AllocateMemory(
    device: vk::Device,
    p_allocate_info: *const vk::MemoryAllocateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_memory: *mut vk::DeviceMemory,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let result = unsafe { (record.fp.allocate_memory)(device, p_allocate_info, p_allocator, p_memory) };
    if result != vk::Result::SUCCESS {
        return result;
    }
    unsafe { record.profiler.on_allocate_memory(*p_memory, &*p_allocate_info) };
    result
}

pub unsafe extern "system" fn vkprof_FreeMemory(
    device: vk::Device,
    memory: vk::DeviceMemory,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return;
    };
    unsafe { (record.fp.free_memory)(device, memory, p_allocator) };
    record.profiler.on_free_memory(memory);
}

// ── Command pools and buffers ───────────────────────────────

pub unsafe extern "system" fn vkprof_CreateCommandPool(
    device: vk::Device,
    p_create_info: *const vk::CommandPoolCreateInfo<'_>,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_command_pool: *mut vk::CommandPool,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let result = unsafe { (record.fp.create_command_pool)(device, p_create_info, p_allocator, p_command_pool) };
    if result == vk::Result::SUCCESS {
        let family = unsafe { (*p_create_info).queue_family_index };
        record.command_pools.insert(unsafe { *p_command_pool }, family);
    }
    result
}

pub unsafe extern "system" fn vkprof_DestroyCommandPool(
    device: vk::Device,
    command_pool: vk::CommandPool,
    p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return;
    };
    let freed = record.profiler.free_command_pool(command_pool);
    queue::resolve_if_pending(&record, &freed);
    record.release_timestamp_pools(&freed);
    record.command_pools.remove(&command_pool);
    unsafe { (record.fp.destroy_command_pool)(device, command_pool, p_allocator) };
}

pub unsafe extern "system" fn vkprof_AllocateCommandBuffers(
    device: vk::Device,
    p_allocate_info: *const vk::CommandBufferAllocateInfo<'_>,
    p_command_buffers: *mut vk::CommandBuffer,
) -> vk::Result {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let result = unsafe { (record.fp.allocate_command_buffers)(device, p_allocate_info, p_command_buffers) };
    if result != vk::Result::SUCCESS {
        return result;
    }
    let info = unsafe { &*p_allocate_info };
    let command_buffers = unsafe { raw_slice(p_command_buffers, info.command_buffer_count) };
    record
        .profiler
        .allocate_command_buffers(info.command_pool, info.level, command_buffers);
    result
}

pub unsafe extern "system" fn vkprof_FreeCommandBuffers(
    device: vk::Device,
    command_pool: vk::CommandPool,
    command_buffer_count: u32,
    p_command_buffers: *const vk::CommandBuffer,
) {
    let Some(record) = (unsafe { handle_store::device_for(device) }) else {
        return;
    };
    let command_buffers = unsafe { raw_slice(p_command_buffers, command_buffer_count) };
    queue::resolve_if_pending(&record, command_buffers);
    record.profiler.free_command_buffers(command_buffers);
    record.release_timestamp_pools(command_buffers);
    unsafe { (record.fp.free_command_buffers)(device, command_pool, command_buffer_count, p_command_buffers) };
}
