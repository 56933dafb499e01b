//! Per-instance and per-device forwarding tables.

use std::ffi::{c_char, c_void};
use std::ptr;

use ash::vk;
use ash::vk::Handle;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};
use vkprof_core::queue::QueueRecord;
use vkprof_core::{DeviceProfiler, ProfilerConfig};

use crate::link::PfnSetDeviceLoaderData;
use crate::overlay::Overlay;

/// Loader dispatch table pointer stored in the first word of every
/// dispatchable handle.
///
/// # Safety
/// `handle` must point to a loader-created dispatchable object.
pub unsafe fn dispatch_key<H: Handle>(handle: H) -> usize {
    unsafe { *(handle.as_raw() as usize as *const usize) }
}

/// Build a slice from a Vulkan pointer/count pair. Null pointers yield an
/// empty slice.
///
/// # Safety
/// A non-null `ptr` must point to `count` initialized elements.
pub unsafe fn raw_slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, count as usize) }
    }
}

pub struct InstanceRecord {
    pub handle: vk::Instance,
    pub next_get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    pub fp: ash::InstanceFnV1_0,
}

impl InstanceRecord {
    /// # Safety
    /// `next_gipa` must be the next layer's `vkGetInstanceProcAddr`.
    pub unsafe fn load(instance: vk::Instance, next_gipa: vk::PFN_vkGetInstanceProcAddr) -> Self {
        let fp = ash::InstanceFnV1_0::load(|name| unsafe {
            std::mem::transmute::<vk::PFN_vkVoidFunction, *const c_void>(next_gipa(instance, name.as_ptr()))
        });
        Self {
            handle: instance,
            next_get_instance_proc_addr: next_gipa,
            fp,
        }
    }

    pub fn proc_addr(&self, name: *const c_char) -> vk::PFN_vkVoidFunction {
        unsafe { (self.next_get_instance_proc_addr)(self.handle, name) }
    }
}

pub struct DeviceRecord {
    pub handle: vk::Device,
    pub next_get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
    pub set_loader_data: Option<PfnSetDeviceLoaderData>,
    pub fp: ash::DeviceFnV1_0,
    pub fp_v1_2: ash::DeviceFnV1_2,
    pub swapchain: ash::khr::swapchain::DeviceFn,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub queues: Vec<QueueRecord>,
    pub profiler: DeviceProfiler,
    /// Timestamp query pool of each primary command buffer.
    pub query_pools: DashMap<vk::CommandBuffer, vk::QueryPool>,
    /// Queue family of each command pool.
    pub command_pools: DashMap<vk::CommandPool, u32>,
    pub overlay: Mutex<Option<Overlay>>,
}

impl DeviceRecord {
    /// Load the device tables and capture everything the profiler needs
    /// from the physical device.
    ///
    /// # Safety
    /// `device` must have been created from `create_info` by the next layer
    /// and `next_gdpa` must be its `vkGetDeviceProcAddr`.
    pub unsafe fn new(
        device: vk::Device,
        physical_device: vk::PhysicalDevice,
        next_gdpa: vk::PFN_vkGetDeviceProcAddr,
        set_loader_data: Option<PfnSetDeviceLoaderData>,
        instance: &InstanceRecord,
        create_info: &vk::DeviceCreateInfo<'_>,
        config: &ProfilerConfig,
    ) -> Self {
        let load = |name: &std::ffi::CStr| unsafe {
            std::mem::transmute::<vk::PFN_vkVoidFunction, *const c_void>(next_gdpa(device, name.as_ptr()))
        };
        let fp = ash::DeviceFnV1_0::load(load);
        let fp_v1_2 = ash::DeviceFnV1_2::load(load);
        let swapchain = ash::khr::swapchain::DeviceFn::load(load);

        let mut properties = vk::PhysicalDeviceProperties::default();
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties::default();
        unsafe {
            (instance.fp.get_physical_device_properties)(physical_device, &mut properties);
            (instance.fp.get_physical_device_memory_properties)(physical_device, &mut memory_properties);
        }

        let mut family_count = 0u32;
        unsafe {
            (instance.fp.get_physical_device_queue_family_properties)(
                physical_device,
                &mut family_count,
                ptr::null_mut(),
            );
        }
        let mut queue_families = vec![vk::QueueFamilyProperties::default(); family_count as usize];
        unsafe {
            (instance.fp.get_physical_device_queue_family_properties)(
                physical_device,
                &mut family_count,
                queue_families.as_mut_ptr(),
            );
        }
        queue_families.truncate(family_count as usize);

        let mut queues = Vec::new();
        let queue_infos = unsafe { raw_slice(create_info.p_queue_create_infos, create_info.queue_create_info_count) };
        for info in queue_infos {
            // Queues created with flags are only reachable through vkGetDeviceQueue2.
            if !info.flags.is_empty() {
                continue;
            }
            let priorities = unsafe { raw_slice(info.p_queue_priorities, info.queue_count) };
            for index in 0..info.queue_count {
                let mut handle = vk::Queue::null();
                unsafe { (fp.get_device_queue)(device, info.queue_family_index, index, &mut handle) };
                queues.push(QueueRecord {
                    handle,
                    family_index: info.queue_family_index,
                    index,
                    priority: priorities.get(index as usize).copied().unwrap_or(1.0),
                });
            }
        }

        let timestamp_period = properties.limits.timestamp_period;
        debug!(
            "device {:?}: {} queues, timestamp period {} ns",
            device,
            queues.len(),
            timestamp_period
        );

        Self {
            handle: device,
            next_get_device_proc_addr: next_gdpa,
            set_loader_data,
            fp,
            fp_v1_2,
            swapchain,
            properties,
            queue_families,
            queues,
            profiler: DeviceProfiler::new(config, timestamp_period, &memory_properties),
            query_pools: DashMap::new(),
            command_pools: DashMap::new(),
            overlay: Mutex::new(None),
        }
    }

    pub fn proc_addr(&self, name: *const c_char) -> vk::PFN_vkVoidFunction {
        unsafe { (self.next_get_device_proc_addr)(self.handle, name) }
    }

    /// Whether command buffers from `pool` run on a family that supports
    /// timestamp queries.
    pub fn pool_supports_timestamps(&self, pool: vk::CommandPool) -> bool {
        self.command_pools
            .get(&pool)
            .and_then(|family| self.queue_families.get(*family as usize).copied())
            .is_some_and(|family| family.timestamp_valid_bits > 0)
    }

    /// Timestamp query pool of `command_buffer`, created on first use.
    pub fn timestamp_pool(&self, command_buffer: vk::CommandBuffer) -> Option<vk::QueryPool> {
        if let Some(pool) = self.query_pools.get(&command_buffer) {
            return Some(*pool);
        }
        let query_count = self.profiler.query_pool_size();
        if query_count < 2 {
            return None;
        }
        let info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(query_count);
        let mut pool = vk::QueryPool::null();
        let result = unsafe { (self.fp.create_query_pool)(self.handle, &info, ptr::null(), &mut pool) };
        if result != vk::Result::SUCCESS {
            warn!("failed to create timestamp query pool for {:?}: {:?}", command_buffer, result);
            return None;
        }
        self.query_pools.insert(command_buffer, pool);
        Some(pool)
    }

    /// Destroy the timestamp query pools of `command_buffers`.
    pub fn release_timestamp_pools(&self, command_buffers: &[vk::CommandBuffer]) {
        for cb in command_buffers {
            if let Some((_, pool)) = self.query_pools.remove(cb) {
                unsafe { (self.fp.destroy_query_pool)(self.handle, pool, ptr::null()) };
            }
        }
    }

    pub fn release_all_timestamp_pools(&self) {
        let command_buffers: Vec<vk::CommandBuffer> = self.query_pools.iter().map(|e| *e.key()).collect();
        self.release_timestamp_pools(&command_buffers);
    }
}
