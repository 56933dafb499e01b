//! Device memory allocation tracking.

use ash::vk;
use dashmap::DashMap;

use crate::data::{MemoryData, MemoryHeapData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationInfo {
    pub size: vk::DeviceSize,
    pub memory_type_index: u32,
    pub heap_index: u32,
}

/// Live `VkDeviceMemory` allocations of one device.
pub struct MemoryTracker {
    allocations: DashMap<vk::DeviceMemory, AllocationInfo>,
    /// Memory type index -> heap index
    type_heaps: Vec<u32>,
    heap_count: u32,
}

impl MemoryTracker {
    pub fn new(properties: &vk::PhysicalDeviceMemoryProperties) -> Self {
        let type_count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
        let type_heaps = properties.memory_types[..type_count]
            .iter()
            .map(|t| t.heap_index)
            .collect();
        Self {
            allocations: DashMap::new(),
            type_heaps,
            heap_count: properties.memory_heap_count.min(vk::MAX_MEMORY_HEAPS as u32),
        }
    }

    pub fn register(&self, memory: vk::DeviceMemory, info: &vk::MemoryAllocateInfo<'_>) {
        if memory == vk::DeviceMemory::null() {
            return;
        }
        // Unknown type indices are counted against heap 0.
        let heap_index = self
            .type_heaps
            .get(info.memory_type_index as usize)
            .copied()
            .unwrap_or(0);
        self.allocations.insert(
            memory,
            AllocationInfo {
                size: info.allocation_size,
                memory_type_index: info.memory_type_index,
                heap_index,
            },
        );
    }

    pub fn unregister(&self, memory: vk::DeviceMemory) -> Option<AllocationInfo> {
        self.allocations.remove(&memory).map(|(_, info)| info)
    }

    pub fn get(&self, memory: vk::DeviceMemory) -> Option<AllocationInfo> {
        self.allocations.get(&memory).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Per-heap totals of the live allocations.
    pub fn snapshot(&self) -> MemoryData {
        let heap_count = self.heap_count.max(1);
        let mut heaps: Vec<MemoryHeapData> = (0..heap_count)
            .map(|heap_index| MemoryHeapData {
                heap_index,
                ..Default::default()
            })
            .collect();
        let mut data = MemoryData::default();
        for entry in self.allocations.iter() {
            let info = entry.value();
            if let Some(heap) = heaps.get_mut(info.heap_index as usize) {
                heap.allocation_count += 1;
                heap.allocated_bytes += info.size;
            }
            data.total_allocation_count += 1;
            data.total_allocated_bytes += info.size;
        }
        data.heaps = heaps;
        data
    }
}
