// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Recycles `SoundInstance` objects so fire-and-forget plays do not allocate.

use crate::instance::{PlaybackState, SoundInstance};
use std::sync::{Arc, Weak};
use tether_core::audio::SoundData;
use tether_core::RecyclingPool;

#[derive(Debug)]
pub(crate) struct PoolShared {
    pub(crate) free: RecyclingPool<Arc<SoundInstance>>,
    warm: usize,
}

/// A free-list of [`SoundInstance`]s.
///
/// Instances drawn from the pool carry a back-reference to it and return
/// themselves the moment they transition to `Stopped`, whether through an
/// immediate stop or natural completion. Cloning the pool is cheap and every
/// clone shares the same free-list.
#[derive(Debug, Clone)]
pub struct InstancePool {
    shared: Arc<PoolShared>,
}

impl InstancePool {
    /// Creates a pool with `warm` instances preallocated.
    ///
    /// `warm` is a soft bound: under sustained demand the pool keeps building
    /// new instances, and all of them are recycled afterwards.
    pub fn new(warm: usize) -> Self {
        let shared = Arc::new_cyclic(|home: &Weak<PoolShared>| {
            let home = home.clone();
            PoolShared {
                free: RecyclingPool::with_warm(warm, move || {
                    Arc::new(SoundInstance::pooled(home.clone()))
                }),
                warm,
            }
        });
        log::debug!("Sound instance pool created with {warm} warm instances.");
        Self { shared }
    }

    /// Draws an instance, resets it to defaults, and binds `sample`.
    ///
    /// The returned instance is `Stopped`; hand it to the voice scheduler to
    /// start it.
    pub fn acquire(&self, sample: Arc<SoundData>) -> Arc<SoundInstance> {
        let instance = self.shared.free.acquire();
        instance.reset(sample);

        let created = self.shared.free.created();
        if created > self.shared.warm && self.shared.free.idle() == 0 {
            log::debug!(
                "Sound instance pool grew past its warm size ({created} > {}).",
                self.shared.warm
            );
        }
        instance
    }

    /// Puts back an instance that was acquired but never started.
    ///
    /// Returns `false` (and does nothing) if the instance is not stopped, did
    /// not come from this pool, or is already in the free-list.
    pub fn release(&self, instance: &Arc<SoundInstance>) -> bool {
        if !self.owns(instance) || instance.state() != PlaybackState::Stopped {
            return false;
        }
        instance.recycle()
    }

    /// Returns `true` if `instance` was built by this pool.
    pub fn owns(&self, instance: &SoundInstance) -> bool {
        instance.home_is(&self.shared)
    }

    /// Instances currently waiting in the free-list.
    pub fn idle(&self) -> usize {
        self.shared.free.idle()
    }

    /// Instances this pool has ever built.
    pub fn created(&self) -> usize {
        self.shared.free.created()
    }

    /// The preallocation size.
    pub fn warm(&self) -> usize {
        self.shared.warm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceOrigin;
    use tether_core::audio::VoiceHandle;

    fn sample(len: usize) -> Arc<SoundData> {
        Arc::new(SoundData::new(vec![0.1; len], 1, 44_100))
    }

    #[test]
    fn warm_pool_is_preallocated() {
        let pool = InstancePool::new(4);
        assert_eq!(pool.idle(), 4);
        assert_eq!(pool.created(), 4);
        assert_eq!(pool.warm(), 4);
    }

    #[test]
    fn acquired_instance_is_pooled_and_reset() {
        let pool = InstancePool::new(1);
        let data = sample(16);
        let instance = pool.acquire(data.clone());

        assert_eq!(instance.origin(), InstanceOrigin::Pooled);
        assert!(pool.owns(&instance));
        assert_eq!(instance.generation(), 1);
        assert!(Arc::ptr_eq(&instance.sample().unwrap(), &data));
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn finished_instance_returns_without_residue() {
        let pool = InstancePool::new(1);
        let first = pool.acquire(sample(16));
        first.set_volume(0.3);
        first.set_pitch(2.0);
        first.set_pan(-0.5);
        first.set_looping(true);
        first.attach(VoiceHandle::from_index(0).unwrap());

        assert!(first.finish());
        assert_eq!(pool.idle(), 1);

        let second = pool.acquire(sample(8));
        assert!(Arc::ptr_eq(&first, &second), "same object comes back");
        assert_eq!(second.volume(), 1.0);
        assert_eq!(second.pitch(), 1.0);
        assert_eq!(second.pan(), 0.0);
        assert!(!second.is_looping());
        assert_eq!(second.generation(), 2);
        assert_eq!(second.sample().unwrap().samples.len(), 8);
    }

    #[test]
    fn pool_grows_under_demand() {
        let pool = InstancePool::new(1);
        let a = pool.acquire(sample(4));
        let b = pool.acquire(sample(4));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.created(), 2);

        assert!(pool.release(&a));
        assert!(pool.release(&b));
        assert!(!pool.release(&b), "double release is refused");
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn foreign_and_standalone_instances_are_refused() {
        let pool = InstancePool::new(0);
        let other = InstancePool::new(0);
        let foreign = other.acquire(sample(4));
        let standalone = SoundInstance::new(sample(4));

        assert!(!pool.release(&foreign));
        assert!(!pool.release(&standalone));
        assert_eq!(pool.idle(), 0);
    }
}
