//! Integration test: graphics queue selection and memory snapshots
//!
//! Run with: cargo test --test queue_test

use ash::vk;
use ash::vk::Handle;
use vkprof_core::memory::MemoryTracker;
use vkprof_core::queue::{select_graphics_queue, QueueRecord};

fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 4,
        timestamp_valid_bits: 64,
        ..Default::default()
    }
}

fn queue(raw: u64, family_index: u32, priority: f32) -> QueueRecord {
    QueueRecord {
        handle: vk::Queue::from_raw(raw),
        family_index,
        index: 0,
        priority,
    }
}

#[test]
fn test_highest_priority_graphics_queue() {
    let families = [family(vk::QueueFlags::TRANSFER), family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
    let queues = [queue(1, 0, 1.0), queue(2, 1, 0.5), queue(3, 1, 0.75)];
    let selected = select_graphics_queue(&queues, &families).map(|q| q.handle.as_raw());
    assert_eq!(selected, Some(3));
}

#[test]
fn test_ties_keep_first_queue() {
    let families = [family(vk::QueueFlags::GRAPHICS)];
    let queues = [queue(1, 0, 0.5), queue(2, 0, 0.5)];
    assert_eq!(select_graphics_queue(&queues, &families).map(|q| q.handle.as_raw()), Some(1));
}

#[test]
fn test_zero_priority_is_selectable() {
    let families = [family(vk::QueueFlags::GRAPHICS)];
    let queues = [queue(1, 0, 0.0)];
    assert_eq!(select_graphics_queue(&queues, &families).map(|q| q.handle.as_raw()), Some(1));
}

#[test]
fn test_no_graphics_queue() {
    let families = [family(vk::QueueFlags::COMPUTE)];
    let queues = [queue(1, 0, 1.0), queue(2, 5, 1.0)];
    assert!(select_graphics_queue(&queues, &families).is_none());
    assert!(select_graphics_queue(&[], &families).is_none());
}

#[test]
fn test_memory_snapshot_per_heap() {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: 3,
        memory_heap_count: 2,
        ..Default::default()
    };
    props.memory_types[0].heap_index = 0;
    props.memory_types[1].heap_index = 1;
    props.memory_types[2].heap_index = 1;
    let tracker = MemoryTracker::new(&props);

    let allocations = [(0x1, 100, 0), (0x2, 200, 1), (0x3, 300, 2), (0x4, 50, 9)];
    for (raw, size, type_index) in allocations {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(type_index);
        tracker.register(vk::DeviceMemory::from_raw(raw), &info);
    }
    tracker.register(vk::DeviceMemory::null(), &vk::MemoryAllocateInfo::default());
    assert_eq!(tracker.len(), 4);

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.heaps.len(), 2);
    // Unknown type 9 is counted against heap 0.
    assert_eq!(snapshot.heaps[0].allocated_bytes, 150);
    assert_eq!(snapshot.heaps[0].allocation_count, 2);
    assert_eq!(snapshot.heaps[1].allocated_bytes, 500);
    assert_eq!(snapshot.total_allocated_bytes, 650);
    assert_eq!(snapshot.total_allocation_count, 4);

    let freed = tracker.unregister(vk::DeviceMemory::from_raw(0x2)).map(|a| (a.size, a.heap_index));
    assert_eq!(freed, Some((200, 1)));
    assert_eq!(tracker.snapshot().heaps[1].allocated_bytes, 300);
}
