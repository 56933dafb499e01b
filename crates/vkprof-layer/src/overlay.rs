//! On-screen statistics overlay.
//!
//! Only the GPU objects are set up so far: one command pool on the selected
//! graphics queue family and one primary command buffer, recorded empty on
//! every present and never submitted.

use std::ffi::c_void;
use std::ptr;

use ash::vk;
use ash::vk::Handle;
use tracing::{info, trace};
use vkprof_core::queue::{select_graphics_queue, QueueRecord};

use crate::dispatch::DeviceRecord;

#[derive(Debug)]
pub struct Overlay {
    device: vk::Device,
    graphics_queue: QueueRecord,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
}

impl Overlay {
    /// Create the overlay's command pool and command buffer. Anything created
    /// before a failure is destroyed again.
    ///
    /// # Safety
    /// `record` must describe a live device.
    pub unsafe fn initialize(record: &DeviceRecord) -> Result<Self, vk::Result> {
        let graphics_queue = select_graphics_queue(&record.queues, &record.queue_families)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;

        let mut overlay = Self {
            device: record.handle,
            graphics_queue,
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
        };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_queue.family_index);
        let result = unsafe {
            (record.fp.create_command_pool)(record.handle, &pool_info, ptr::null(), &mut overlay.command_pool)
        };
        if result != vk::Result::SUCCESS {
            overlay.command_pool = vk::CommandPool::null();
            unsafe { overlay.destroy(&record.fp) };
            return Err(result);
        }

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(overlay.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let result = unsafe {
            (record.fp.allocate_command_buffers)(record.handle, &alloc_info, &mut overlay.command_buffer)
        };
        if result != vk::Result::SUCCESS {
            overlay.command_buffer = vk::CommandBuffer::null();
            unsafe { overlay.destroy(&record.fp) };
            return Err(result);
        }

        // Dispatchable objects created below the application need the loader's
        // dispatch pointer before they can be used.
        if let Some(set_loader_data) = record.set_loader_data {
            let result = unsafe { set_loader_data(record.handle, overlay.command_buffer.as_raw() as *mut c_void) };
            if result != vk::Result::SUCCESS {
                unsafe { overlay.destroy(&record.fp) };
                return Err(result);
            }
        }

        info!(
            "overlay initialized on queue family {} (queue {})",
            graphics_queue.family_index, graphics_queue.index
        );
        Ok(overlay)
    }

    /// Release the command buffer and pool. Safe to call more than once.
    ///
    /// # Safety
    /// `fp` must be the table of the device the overlay was created on.
    pub unsafe fn destroy(&mut self, fp: &ash::DeviceFnV1_0) {
        if self.command_buffer != vk::CommandBuffer::null() {
            unsafe { (fp.free_command_buffers)(self.device, self.command_pool, 1, &self.command_buffer) };
            self.command_buffer = vk::CommandBuffer::null();
        }
        if self.command_pool != vk::CommandPool::null() {
            unsafe { (fp.destroy_command_pool)(self.device, self.command_pool, ptr::null()) };
            self.command_pool = vk::CommandPool::null();
        }
    }

    /// Record the frame statistics command buffer.
    ///
    /// # Safety
    /// `fp` must be the table of the device the overlay was created on.
    pub unsafe fn draw_frame_stats(&mut self, fp: &ash::DeviceFnV1_0) -> vk::Result {
        if self.command_buffer == vk::CommandBuffer::null() {
            return vk::Result::SUCCESS;
        }
        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
        let result = unsafe { (fp.begin_command_buffer)(self.command_buffer, &begin_info) };
        if result != vk::Result::SUCCESS {
            return result;
        }
        // TODO: submit once presentation can wait on an overlay semaphore.
        let result = unsafe { (fp.end_command_buffer)(self.command_buffer) };
        trace!(
            "overlay frame recorded for queue family {}: {:?}",
            self.graphics_queue.family_index, result
        );
        result
    }
}
