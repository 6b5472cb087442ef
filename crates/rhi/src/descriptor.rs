//! Descriptor set layouts, pools and a growable set allocator.
//!
//! [`DescriptorAllocator`] hands out sets from a chain of pools. When the
//! current pool runs dry it creates a larger one and retries the allocation
//! once; a failure on the fresh pool is reported as
//! [`RhiError::DescriptorPoolExhausted`] and is fatal to the caller.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };
        debug!("Created descriptor pool for {} set(s)", max_sets);
        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Allocates one set, surfacing the raw Vulkan result so callers can
    /// tell exhaustion apart from other failures.
    pub fn allocate(
        &self,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, vk::Result> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        sets.into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_POOL_MEMORY)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Descriptor counts per set, scaled by the number of sets a pool holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolRatio {
    pub ty: vk::DescriptorType,
    pub per_set: f32,
}

/// Pool chain that grows instead of failing.
pub struct DescriptorAllocator {
    device: Arc<Device>,
    ratios: Vec<PoolRatio>,
    sets_per_pool: u32,
    pools: Vec<DescriptorPool>,
}

impl DescriptorAllocator {
    pub const MAX_SETS_PER_POOL: u32 = 4096;

    pub fn new(device: Arc<Device>, initial_sets: u32, ratios: &[PoolRatio]) -> RhiResult<Self> {
        let mut allocator = Self {
            device,
            ratios: ratios.to_vec(),
            sets_per_pool: initial_sets.max(1),
            pools: Vec::new(),
        };
        allocator.grow()?;
        Ok(allocator)
    }

    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        allocate_with_retry(self, |allocator| {
            let pool = allocator
                .pools
                .last()
                .ok_or(vk::Result::ERROR_OUT_OF_POOL_MEMORY)?;
            pool.allocate(layout)
        }, |allocator| allocator.grow())
    }

    /// Pools created so far, including the initial one.
    #[inline]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    fn grow(&mut self) -> RhiResult<()> {
        let sets = self.sets_per_pool;
        let sizes = pool_sizes(&self.ratios, sets);
        self.pools
            .push(DescriptorPool::new(self.device.clone(), sets, &sizes)?);
        if self.pools.len() > 1 {
            info!(
                "Descriptor pool exhausted, grew chain to {} pool(s) ({} sets)",
                self.pools.len(),
                sets
            );
        }
        self.sets_per_pool = (sets * 2).min(Self::MAX_SETS_PER_POOL);
        Ok(())
    }
}

/// Runs `attempt`; on pool exhaustion calls `grow` and attempts exactly once
/// more.
pub fn allocate_with_retry<S, T, A, G>(state: &mut S, mut attempt: A, grow: G) -> RhiResult<T>
where
    A: FnMut(&mut S) -> Result<T, vk::Result>,
    G: FnOnce(&mut S) -> RhiResult<()>,
{
    match attempt(state) {
        Ok(value) => Ok(value),
        Err(e) if is_pool_exhaustion(e) => {
            grow(state)?;
            match attempt(state) {
                Ok(value) => Ok(value),
                Err(e) if is_pool_exhaustion(e) => {
                    Err(RhiError::DescriptorPoolExhausted { retried: true })
                }
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn is_pool_exhaustion(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL
    )
}

fn pool_sizes(ratios: &[PoolRatio], sets: u32) -> Vec<vk::DescriptorPoolSize> {
    ratios
        .iter()
        .map(|ratio| vk::DescriptorPoolSize {
            ty: ratio.ty,
            descriptor_count: ((ratio.per_set * sets as f32).ceil() as u32).max(1),
        })
        .collect()
}

pub fn uniform_buffer_binding(
    binding: u32,
    stages: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(stages)
}

pub fn combined_image_sampler_binding(
    binding: u32,
    stages: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(1)
        .stage_flags(stages)
}

/// Points `binding` of `set` at the whole of `buffer`.
pub fn write_uniform_buffer(device: &Device, set: vk::DescriptorSet, binding: u32, buffer: vk::Buffer) {
    let infos = [vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .range(vk::WHOLE_SIZE)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(&infos);
    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}

pub fn write_combined_image_sampler(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let infos = [vk::DescriptorImageInfo::default()
        .image_view(view)
        .sampler(sampler)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&infos);
    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stand-in pool chain: each pool holds `capacity` sets.
    struct FakeChain {
        pools: Vec<u32>,
        capacity: u32,
        grow_calls: u32,
    }

    impl FakeChain {
        fn allocate(&mut self) -> RhiResult<u32> {
            allocate_with_retry(
                self,
                |chain| match chain.pools.last_mut() {
                    Some(free) if *free > 0 => {
                        *free -= 1;
                        Ok(*free)
                    }
                    _ => Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY),
                },
                |chain| {
                    chain.grow_calls += 1;
                    chain.pools.push(chain.capacity);
                    Ok(())
                },
            )
        }
    }

    #[test]
    fn test_grows_and_retries_once() {
        let mut chain = FakeChain {
            pools: vec![1],
            capacity: 2,
            grow_calls: 0,
        };
        assert!(chain.allocate().is_ok());
        assert_eq!(chain.grow_calls, 0);

        assert!(chain.allocate().is_ok());
        assert_eq!(chain.grow_calls, 1);
        assert_eq!(chain.pools.len(), 2);
    }

    #[test]
    fn test_second_exhaustion_is_fatal() {
        let mut chain = FakeChain {
            pools: vec![0],
            capacity: 0,
            grow_calls: 0,
        };
        let result = chain.allocate();
        assert!(matches!(
            result,
            Err(RhiError::DescriptorPoolExhausted { retried: true })
        ));
        assert_eq!(chain.grow_calls, 1);
    }

    #[test]
    fn test_other_errors_do_not_grow() {
        let mut grew = false;
        let result: RhiResult<()> = allocate_with_retry(
            &mut grew,
            |_| Err(vk::Result::ERROR_DEVICE_LOST),
            |grew| {
                *grew = true;
                Ok(())
            },
        );
        assert!(matches!(
            result,
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert!(!grew);
    }

    #[test]
    fn test_pool_sizes_scale_with_sets() {
        let ratios = [
            PoolRatio {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                per_set: 1.0,
            },
            PoolRatio {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                per_set: 5.0,
            },
        ];
        let sizes = pool_sizes(&ratios, 8);
        assert_eq!(sizes[0].descriptor_count, 8);
        assert_eq!(sizes[1].descriptor_count, 40);
    }
}
