//! Global dispatch-key keyed records for instances and devices.

use std::sync::{Arc, OnceLock};

use ash::vk::Handle;
use dashmap::DashMap;

use crate::dispatch::{dispatch_key, DeviceRecord, InstanceRecord};

macro_rules! record_map {
    ($map_name:ident, $fn_map:ident, $record:ty, $fn_store:ident, $fn_get:ident, $fn_remove:ident) => {
        static $map_name: OnceLock<DashMap<usize, Arc<$record>>> = OnceLock::new();

        fn $fn_map() -> &'static DashMap<usize, Arc<$record>> {
            $map_name.get_or_init(DashMap::new)
        }

        pub fn $fn_store(key: usize, record: $record) -> Arc<$record> {
            let record = Arc::new(record);
            $fn_map().insert(key, Arc::clone(&record));
            record
        }

        pub fn $fn_get(key: usize) -> Option<Arc<$record>> {
            $fn_map().get(&key).map(|v| Arc::clone(&v))
        }

        pub fn $fn_remove(key: usize) -> Option<Arc<$record>> {
            $fn_map().remove(&key).map(|(_, v)| v)
        }
    };
}

record_map!(INSTANCE_MAP, instance_map, InstanceRecord, store_instance, get_instance, remove_instance);
record_map!(DEVICE_MAP, device_map, DeviceRecord, store_device, get_device, remove_device);

/// Instance record of a `VkInstance` or `VkPhysicalDevice`.
///
/// # Safety
/// `handle` must be a live dispatchable handle.
pub unsafe fn instance_for<H: Handle + Copy>(handle: H) -> Option<Arc<InstanceRecord>> {
    if handle.as_raw() == 0 {
        return None;
    }
    get_instance(unsafe { dispatch_key(handle) })
}

/// Device record of a `VkDevice`, `VkQueue` or `VkCommandBuffer`.
///
/// # Safety
/// `handle` must be a live dispatchable handle.
pub unsafe fn device_for<H: Handle + Copy>(handle: H) -> Option<Arc<DeviceRecord>> {
    if handle.as_raw() == 0 {
        return None;
    }
    let record = get_device(unsafe { dispatch_key(handle) });
    if record.is_none() {
        tracing::error!("no device record for {:#x}", handle.as_raw());
    }
    record
}
