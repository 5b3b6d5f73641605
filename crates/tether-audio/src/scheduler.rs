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

//! Multiplexes a fixed bank of hardware voices across sound instances.

use crate::instance::{InstanceId, SoundInstance};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tether_core::audio::{VoiceBackend, VoiceHandle, VoiceStatus};
use tether_core::telemetry::{VoiceStats, VoiceStatsSnapshot};

/// Ownership of one voice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceSlot {
    Available,
    InUse { owner: Option<InstanceId> },
}

/// Everything guarded by the scheduler's single lock.
struct VoiceTable {
    /// Free handles. Used as a stack: the most recently freed voice goes out first.
    available: Vec<VoiceHandle>,
    /// One entry per voice, indexed by `VoiceHandle::index`.
    slots: Vec<VoiceSlot>,
    /// Bound voices the reconcile sweep watches, in start order.
    playing: Vec<(VoiceHandle, Arc<SoundInstance>)>,
}

impl VoiceTable {
    fn new(capacity: usize) -> Self {
        // Reversed so the first pop hands out voice #1.
        let available = (0..capacity)
            .rev()
            .filter_map(VoiceHandle::from_index)
            .collect();
        Self {
            available,
            slots: vec![VoiceSlot::Available; capacity],
            playing: Vec::new(),
        }
    }

    fn take(&mut self, owner: Option<InstanceId>) -> Option<VoiceHandle> {
        let handle = self.available.pop()?;
        self.slots[handle.index()] = VoiceSlot::InUse { owner };
        Some(handle)
    }

    /// Frees `handle` and detaches the instance bound to it, if any.
    /// `None` means the handle was unknown or already free.
    fn free(&mut self, handle: VoiceHandle) -> Option<Option<Arc<SoundInstance>>> {
        let slot = self.slots.get_mut(handle.index())?;
        if *slot == VoiceSlot::Available {
            return None;
        }
        *slot = VoiceSlot::Available;
        self.available.push(handle);

        let bound = self
            .playing
            .iter()
            .position(|(voice, _)| *voice == handle)
            .map(|i| self.playing.remove(i).1);
        Some(bound)
    }

    fn owner_of(&self, handle: VoiceHandle) -> Option<InstanceId> {
        match self.slots.get(handle.index()) {
            Some(VoiceSlot::InUse { owner }) => *owner,
            _ => None,
        }
    }

    fn in_use(&self) -> usize {
        self.slots.len() - self.available.len()
    }
}

/// Assigns a fixed number of hardware voices to an unbounded stream of play
/// requests and reclaims them when playback ends.
///
/// The scheduler never steals a voice: when the bank is exhausted, new play
/// requests are dropped. Voices come back through [`stop`](Self::stop) with
/// `immediate = true`, an explicit [`release`](Self::release), or the periodic
/// [`reconcile_tick`](Self::reconcile_tick) that notices natural completion.
///
/// All bookkeeping sits behind one mutex, held only for short, bounded
/// sections. Native calls made under it must not block.
pub struct VoiceScheduler {
    backend: Arc<dyn VoiceBackend>,
    table: Mutex<VoiceTable>,
    capacity: usize,
    stats: VoiceStats,
}

impl VoiceScheduler {
    /// Creates a scheduler managing `capacity` voices of `backend`.
    ///
    /// The capacity is clamped to what the backend actually exposes.
    pub fn new(backend: Arc<dyn VoiceBackend>, capacity: usize) -> Self {
        let native = backend.voice_count();
        let capacity = if capacity > native {
            log::warn!(
                "Requested {capacity} voices but the backend exposes {native}; using {native}."
            );
            native
        } else {
            capacity
        };
        log::info!("Voice scheduler managing {capacity} voices.");

        Self {
            backend,
            table: Mutex::new(VoiceTable::new(capacity)),
            capacity,
            stats: VoiceStats::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VoiceTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The size of the voice bank (`N`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Voices currently free.
    pub fn available_count(&self) -> usize {
        self.lock().available.len()
    }

    /// Voices currently handed out.
    pub fn in_use_count(&self) -> usize {
        self.lock().in_use()
    }

    /// Voices bound to an instance and watched by the reconcile sweep.
    pub fn playing_count(&self) -> usize {
        self.lock().playing.len()
    }

    /// Returns `true` if `handle` is in the free set.
    pub fn is_available(&self, handle: VoiceHandle) -> bool {
        self.lock().available.contains(&handle)
    }

    /// The native backend this scheduler drives.
    pub fn backend(&self) -> &Arc<dyn VoiceBackend> {
        &self.backend
    }

    /// Reads the scheduler's counters.
    pub fn stats(&self) -> VoiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// Takes a free voice, or `None` when the bank is exhausted.
    ///
    /// Exhaustion is normal flow: the caller is expected to drop the sound.
    pub fn acquire(&self) -> Option<VoiceHandle> {
        let handle = self.lock().take(None);
        self.record_acquire(handle)
    }

    fn record_acquire(&self, handle: Option<VoiceHandle>) -> Option<VoiceHandle> {
        match handle {
            Some(_) => self.stats.record_acquired(),
            None => {
                self.stats.record_exhausted();
                log::debug!("Voice bank exhausted ({} in use); dropping sound.", self.capacity);
            }
        }
        handle
    }

    /// Returns `handle` to the free set.
    ///
    /// If an instance is bound to it, the voice is stopped and the instance
    /// transitions to `Stopped`. Releasing an unknown or already free handle
    /// does nothing.
    pub fn release(&self, handle: VoiceHandle) {
        let mut table = self.lock();
        let Some(bound) = table.free(handle) else {
            log::trace!("Ignoring release of {handle:?}: not in use.");
            return;
        };
        self.stats.record_released();
        if let Some(instance) = bound {
            self.backend.stop(handle);
            self.backend.unbind(handle);
            instance.finish();
        }
    }

    /// Starts or resumes `instance`.
    ///
    /// An instance that already holds a voice keeps it; no new voice is
    /// acquired. Otherwise one is taken from the bank, the sample is bound,
    /// and native playback starts. Returns `false` when no voice was free, in
    /// which case the instance is left untouched.
    pub fn start_playback(&self, instance: &Arc<SoundInstance>) -> bool {
        let mut table = self.lock();

        if let Some(voice) = instance.voice() {
            if table.owner_of(voice) == Some(instance.id()) {
                self.backend.start(voice);
                instance.resume();
                return true;
            }
            log::warn!(
                "Instance {:?} claims {voice:?} but does not own it; ignoring.",
                instance.id()
            );
            return false;
        }

        let Some(sample) = instance.sample() else {
            log::warn!("Instance {:?} has no sample bound; not starting.", instance.id());
            return false;
        };

        let Some(handle) = self.record_acquire(table.take(Some(instance.id()))) else {
            return false;
        };

        table.playing.push((handle, Arc::clone(instance)));
        self.backend.bind(handle, sample, &instance.params());
        self.backend.start(handle);
        instance.attach(handle);
        true
    }

    /// Pauses a playing instance, keeping its voice.
    pub fn pause(&self, instance: &Arc<SoundInstance>) {
        let table = self.lock();
        let Some(voice) = instance.voice() else {
            return;
        };
        if table.owner_of(voice) == Some(instance.id()) && instance.pause() {
            self.backend.pause(voice);
        }
    }

    /// Stops `instance`.
    ///
    /// With `immediate`, native playback stops, the voice goes back to the
    /// bank, and the instance is `Stopped` before this returns. Otherwise only
    /// the loop flag is cleared and the sound is allowed to play out; the
    /// reconcile sweep reclaims it afterwards.
    pub fn stop(&self, instance: &Arc<SoundInstance>, immediate: bool) {
        if !immediate {
            instance.set_looping(false);
            let table = self.lock();
            if let Some(voice) = instance.voice() {
                if table.owner_of(voice) == Some(instance.id()) {
                    self.backend.set_looping(voice, false);
                }
            }
            return;
        }

        let mut table = self.lock();
        let Some(voice) = instance.voice() else {
            return;
        };
        if table.owner_of(voice) != Some(instance.id()) {
            log::warn!(
                "Instance {:?} claims {voice:?} but does not own it; ignoring stop.",
                instance.id()
            );
            return;
        }

        self.backend.stop(voice);
        self.backend.unbind(voice);
        if table.free(voice).is_some() {
            self.stats.record_released();
        }
        instance.finish();
    }

    /// Pushes the instance's current parameters to its voice, if it has one.
    pub fn apply_params(&self, instance: &Arc<SoundInstance>) {
        let table = self.lock();
        if let Some(voice) = instance.voice() {
            if table.owner_of(voice) == Some(instance.id()) {
                self.backend.apply(voice, &instance.params());
            }
        }
    }

    /// Reclaims every voice whose native playback has finished.
    ///
    /// Walks the playing list in reverse so entries can be removed in place.
    /// Each finished voice is unbound and freed, and its instance becomes
    /// `Stopped` (and, if pooled, goes back to its pool). Returns the number
    /// of voices reclaimed.
    pub fn reconcile_tick(&self) -> usize {
        let mut table = self.lock();
        let mut reclaimed = 0;

        for i in (0..table.playing.len()).rev() {
            let handle = table.playing[i].0;
            if self.backend.status(handle) != VoiceStatus::Stopped {
                continue;
            }

            let (handle, instance) = table.playing.remove(i);
            self.backend.unbind(handle);
            table.slots[handle.index()] = VoiceSlot::Available;
            table.available.push(handle);
            instance.finish();
            reclaimed += 1;
        }

        if reclaimed > 0 {
            for _ in 0..reclaimed {
                self.stats.record_released();
            }
            self.stats.record_reclaimed(reclaimed);
            log::trace!("Reconcile sweep reclaimed {reclaimed} voices.");
        }
        reclaimed
    }

    /// Stops every bound voice immediately. Used at shutdown.
    pub fn stop_all(&self) {
        let mut table = self.lock();
        while let Some((handle, instance)) = table.playing.pop() {
            self.backend.stop(handle);
            self.backend.unbind(handle);
            table.slots[handle.index()] = VoiceSlot::Available;
            table.available.push(handle);
            self.stats.record_released();
            instance.finish();
        }
    }
}

impl fmt::Debug for VoiceScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock();
        f.debug_struct("VoiceScheduler")
            .field("capacity", &self.capacity)
            .field("available", &table.available.len())
            .field("playing", &table.playing.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::PlaybackState;
    use crate::pool::InstancePool;
    use std::collections::HashSet;
    use tether_core::audio::{SoundData, VoiceParams};

    /// A scripted voice bank: tests flip statuses by hand.
    struct FakeBank {
        status: Mutex<Vec<VoiceStatus>>,
        looping: Mutex<Vec<bool>>,
    }

    impl FakeBank {
        fn new(voices: usize) -> Arc<Self> {
            Arc::new(Self {
                status: Mutex::new(vec![VoiceStatus::Stopped; voices]),
                looping: Mutex::new(vec![false; voices]),
            })
        }

        fn finish(&self, voice: VoiceHandle) {
            self.status.lock().unwrap()[voice.index()] = VoiceStatus::Stopped;
        }

        fn native(&self, voice: VoiceHandle) -> VoiceStatus {
            self.status.lock().unwrap()[voice.index()]
        }
    }

    impl VoiceBackend for FakeBank {
        fn voice_count(&self) -> usize {
            self.status.lock().unwrap().len()
        }
        fn bind(&self, voice: VoiceHandle, _sample: Arc<SoundData>, params: &VoiceParams) {
            self.looping.lock().unwrap()[voice.index()] = params.looping;
        }
        fn unbind(&self, _voice: VoiceHandle) {}
        fn start(&self, voice: VoiceHandle) {
            self.status.lock().unwrap()[voice.index()] = VoiceStatus::Playing;
        }
        fn pause(&self, voice: VoiceHandle) {
            self.status.lock().unwrap()[voice.index()] = VoiceStatus::Paused;
        }
        fn stop(&self, voice: VoiceHandle) {
            self.finish(voice);
        }
        fn set_looping(&self, voice: VoiceHandle, looping: bool) {
            self.looping.lock().unwrap()[voice.index()] = looping;
        }
        fn apply(&self, _voice: VoiceHandle, _params: &VoiceParams) {}
        fn status(&self, voice: VoiceHandle) -> VoiceStatus {
            self.native(voice)
        }
    }

    fn sample() -> Arc<SoundData> {
        Arc::new(SoundData::new(vec![0.5; 32], 1, 8_000))
    }

    fn assert_partition(scheduler: &VoiceScheduler) {
        let table = scheduler.lock();
        let free: HashSet<_> = table.available.iter().copied().collect();
        assert_eq!(free.len(), table.available.len(), "duplicate free handle");
        let busy = table
            .slots
            .iter()
            .filter(|slot| matches!(slot, VoiceSlot::InUse { .. }))
            .count();
        assert_eq!(free.len() + busy, scheduler.capacity());
        for handle in &free {
            assert_eq!(table.slots[handle.index()], VoiceSlot::Available);
        }
        for (handle, _) in &table.playing {
            assert!(!free.contains(handle), "playing voice listed as free");
        }
    }

    #[test]
    fn two_voices_three_requests() {
        let scheduler = VoiceScheduler::new(FakeBank::new(2), 2);
        let a = scheduler.acquire();
        let b = scheduler.acquire();
        let c = scheduler.acquire();

        assert!(a.is_some() && b.is_some());
        assert_ne!(a, b);
        assert!(c.is_none());
        assert_eq!(scheduler.stats().exhausted, 1);
        assert_partition(&scheduler);
    }

    #[test]
    fn release_is_idempotent() {
        let scheduler = VoiceScheduler::new(FakeBank::new(2), 2);
        let voice = scheduler.acquire().unwrap();

        scheduler.release(voice);
        scheduler.release(voice);
        scheduler.release(VoiceHandle::from_index(40).unwrap());

        assert_eq!(scheduler.available_count(), 2);
        assert_eq!(scheduler.stats().released, 1);
        assert_partition(&scheduler);
    }

    #[test]
    fn most_recently_freed_voice_is_reused_first() {
        let scheduler = VoiceScheduler::new(FakeBank::new(3), 3);
        let first = scheduler.acquire().unwrap();
        let second = scheduler.acquire().unwrap();
        scheduler.release(first);

        assert_eq!(scheduler.acquire(), Some(first));
        assert_ne!(first, second);
    }

    #[test]
    fn capacity_is_clamped_to_backend() {
        let scheduler = VoiceScheduler::new(FakeBank::new(4), 16);
        assert_eq!(scheduler.capacity(), 4);
        assert_eq!(scheduler.available_count(), 4);
    }

    #[test]
    fn start_playback_binds_a_voice() {
        let bank = FakeBank::new(2);
        let scheduler = VoiceScheduler::new(bank.clone(), 2);
        let instance = SoundInstance::new(sample());

        assert!(scheduler.start_playback(&instance));
        let voice = instance.voice().unwrap();
        assert_eq!(instance.state(), PlaybackState::Playing);
        assert_eq!(bank.native(voice), VoiceStatus::Playing);
        assert_eq!(scheduler.playing_count(), 1);
        assert_partition(&scheduler);
    }

    #[test]
    fn start_playback_twice_keeps_the_same_voice() {
        let scheduler = VoiceScheduler::new(FakeBank::new(4), 4);
        let instance = SoundInstance::new(sample());

        assert!(scheduler.start_playback(&instance));
        let voice = instance.voice();
        assert!(scheduler.start_playback(&instance));

        assert_eq!(instance.voice(), voice);
        assert_eq!(scheduler.stats().acquired, 1, "no second acquire");
        assert_eq!(scheduler.in_use_count(), 1);
    }

    #[test]
    fn exhausted_bank_drops_the_request() {
        let scheduler = VoiceScheduler::new(FakeBank::new(1), 1);
        let first = SoundInstance::new(sample());
        let second = SoundInstance::new(sample());

        assert!(scheduler.start_playback(&first));
        assert!(!scheduler.start_playback(&second));
        assert_eq!(second.state(), PlaybackState::Stopped);
        assert!(second.voice().is_none());
        assert_eq!(first.state(), PlaybackState::Playing, "no eviction");
    }

    #[test]
    fn pause_then_resume_keeps_voice() {
        let bank = FakeBank::new(2);
        let scheduler = VoiceScheduler::new(bank.clone(), 2);
        let instance = SoundInstance::new(sample());
        scheduler.start_playback(&instance);
        let voice = instance.voice().unwrap();

        scheduler.pause(&instance);
        assert_eq!(instance.state(), PlaybackState::Paused);
        assert_eq!(bank.native(voice), VoiceStatus::Paused);
        assert_eq!(scheduler.reconcile_tick(), 0, "paused voices are not reclaimed");

        assert!(scheduler.start_playback(&instance));
        assert_eq!(instance.state(), PlaybackState::Playing);
        assert_eq!(instance.voice(), Some(voice));
    }

    #[test]
    fn immediate_stop_frees_voice_before_returning() {
        let scheduler = VoiceScheduler::new(FakeBank::new(2), 2);
        let instance = SoundInstance::new(sample());
        scheduler.start_playback(&instance);
        let voice = instance.voice().unwrap();

        scheduler.stop(&instance, true);
        assert_eq!(instance.state(), PlaybackState::Stopped);
        assert!(instance.voice().is_none());
        assert!(scheduler.is_available(voice));
        assert_eq!(scheduler.playing_count(), 0);
        assert_partition(&scheduler);
    }

    #[test]
    fn soft_stop_only_clears_looping() {
        let bank = FakeBank::new(2);
        let scheduler = VoiceScheduler::new(bank.clone(), 2);
        let instance = SoundInstance::new(sample());
        instance.set_looping(true);
        scheduler.start_playback(&instance);
        let voice = instance.voice().unwrap();
        assert!(bank.looping.lock().unwrap()[voice.index()]);

        scheduler.stop(&instance, false);
        assert_eq!(instance.state(), PlaybackState::Playing);
        assert!(!instance.is_looping());
        assert!(!bank.looping.lock().unwrap()[voice.index()]);

        bank.finish(voice);
        assert_eq!(scheduler.reconcile_tick(), 1);
        assert_eq!(instance.state(), PlaybackState::Stopped);
    }

    #[test]
    fn stop_without_voice_is_a_no_op() {
        let scheduler = VoiceScheduler::new(FakeBank::new(1), 1);
        let instance = SoundInstance::new(sample());
        scheduler.stop(&instance, true);
        scheduler.pause(&instance);
        scheduler.apply_params(&instance);
        assert_eq!(instance.state(), PlaybackState::Stopped);
        assert_eq!(scheduler.available_count(), 1);
    }

    #[test]
    fn reconcile_removes_only_finished_voices() {
        let bank = FakeBank::new(4);
        let scheduler = VoiceScheduler::new(bank.clone(), 4);
        let instances: Vec<_> = (0..3).map(|_| SoundInstance::new(sample())).collect();
        for instance in &instances {
            assert!(scheduler.start_playback(instance));
        }

        let finished = instances[1].voice().unwrap();
        bank.finish(finished);

        assert_eq!(scheduler.reconcile_tick(), 1);
        assert_eq!(instances[1].state(), PlaybackState::Stopped);
        assert_eq!(instances[0].state(), PlaybackState::Playing);
        assert_eq!(instances[2].state(), PlaybackState::Playing);
        assert!(scheduler.is_available(finished));
        assert_eq!(scheduler.playing_count(), 2);
        assert_eq!(scheduler.stats().reclaimed, 1);
        assert_partition(&scheduler);
    }

    #[test]
    fn natural_completion_recycles_pooled_instance() {
        let bank = FakeBank::new(2);
        let scheduler = VoiceScheduler::new(bank.clone(), 2);
        let pool = InstancePool::new(1);

        let instance = pool.acquire(sample());
        instance.set_volume(0.2);
        assert!(scheduler.start_playback(&instance));
        let voice = instance.voice().unwrap();
        assert_eq!(pool.idle(), 0);

        bank.finish(voice);
        scheduler.reconcile_tick();

        assert_eq!(instance.state(), PlaybackState::Stopped);
        assert!(scheduler.is_available(voice));
        assert_eq!(pool.idle(), 1);

        let next = pool.acquire(sample());
        assert!(Arc::ptr_eq(&instance, &next));
        assert_eq!(next.volume(), 1.0);
    }

    #[test]
    fn release_of_bound_voice_stops_its_instance() {
        let scheduler = VoiceScheduler::new(FakeBank::new(2), 2);
        let instance = SoundInstance::new(sample());
        scheduler.start_playback(&instance);
        let voice = instance.voice().unwrap();

        scheduler.release(voice);
        assert_eq!(instance.state(), PlaybackState::Stopped);
        assert!(instance.voice().is_none());
        assert_eq!(scheduler.playing_count(), 0);
        assert_partition(&scheduler);
    }

    #[test]
    fn stop_all_clears_the_bank() {
        let scheduler = VoiceScheduler::new(FakeBank::new(3), 3);
        let instances: Vec<_> = (0..3).map(|_| SoundInstance::new(sample())).collect();
        for instance in &instances {
            scheduler.start_playback(instance);
        }

        scheduler.stop_all();
        assert!(instances.iter().all(|i| i.state() == PlaybackState::Stopped));
        assert_eq!(scheduler.available_count(), 3);
        assert_partition(&scheduler);
    }
}
