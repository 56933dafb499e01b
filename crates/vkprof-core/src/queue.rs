//! Queues created together with a device.

use ash::vk;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueRecord {
    pub handle: vk::Queue,
    pub family_index: u32,
    pub index: u32,
    pub priority: f32,
}

/// Pick the queue with the highest priority among queues whose family
/// supports graphics. Ties keep the queue that appears first.
pub fn select_graphics_queue(
    queues: &[QueueRecord],
    families: &[vk::QueueFamilyProperties],
) -> Option<QueueRecord> {
    let mut selected: Option<QueueRecord> = None;
    for queue in queues {
        let graphics = families
            .get(queue.family_index as usize)
            .is_some_and(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS));
        if !graphics {
            continue;
        }
        match selected {
            Some(current) if current.priority >= queue.priority => {}
            _ => selected = Some(*queue),
        }
    }
    selected
}
