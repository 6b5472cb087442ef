//! Per-slot GPU resources.
//!
//! Each ring slot owns disjoint storage:
//! - a command buffer for recording the frame
//! - acquire/release semaphores and the in-flight fence
//! - a host-mapped uniform buffer and the set-0 descriptor set pointing at it
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on in_flight (previous use of this slot)
//! 2. Acquire swapchain image (signals image_available)
//! 3. Write uniforms, record command_buffer
//! 4. Reset in_flight, submit:
//!    - wait image_available at COLOR_ATTACHMENT_OUTPUT
//!    - signal render_finished and in_flight
//! 5. Present (waits on render_finished)
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use tessera_rhi::RhiResult;
use tessera_rhi::buffer::{Buffer, BufferUsage};
use tessera_rhi::command::{CommandBuffer, CommandPool};
use tessera_rhi::descriptor::{DescriptorAllocator, write_uniform_buffer};
use tessera_rhi::device::Device;
use tessera_rhi::sync::SlotSync;

use crate::ubo::FrameUniforms;

pub struct FrameResources {
    command_buffer: CommandBuffer,
    sync: SlotSync,
    uniforms: Buffer,
    frame_set: vk::DescriptorSet,
}

impl FrameResources {
    pub fn new(
        device: Arc<Device>,
        pool: &CommandPool,
        descriptors: &mut DescriptorAllocator,
        frame_layout: vk::DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let mut buffers = pool.allocate(1)?;
        let command_buffer = buffers.pop().ok_or(vk::Result::ERROR_OUT_OF_HOST_MEMORY)?;
        let sync = SlotSync::new(device.clone())?;
        let uniforms = Buffer::new(
            device.clone(),
            FrameUniforms::SIZE as vk::DeviceSize,
            BufferUsage::Uniform,
        )?;
        let frame_set = descriptors.allocate(frame_layout)?;
        write_uniform_buffer(&device, frame_set, 0, uniforms.handle());

        Ok(Self {
            command_buffer,
            sync,
            uniforms,
            frame_set,
        })
    }

    /// Creates `count` slots.
    pub fn create_ring(
        device: &Arc<Device>,
        pool: &CommandPool,
        descriptors: &mut DescriptorAllocator,
        frame_layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> RhiResult<Vec<Self>> {
        (0..count)
            .map(|slot| {
                let frame = Self::new(device.clone(), pool, descriptors, frame_layout)?;
                debug!("Created frame resources for slot {}", slot);
                Ok(frame)
            })
            .collect()
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn sync(&self) -> &SlotSync {
        &self.sync
    }

    #[inline]
    pub fn frame_set(&self) -> vk::DescriptorSet {
        self.frame_set
    }

    /// Only valid once the slot's fence has been waited on.
    pub fn write_uniforms(&self, uniforms: &FrameUniforms) -> RhiResult<()> {
        self.uniforms.write(0, bytemuck::bytes_of(uniforms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_resources_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameResources>();
    }
}
