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

//! A caller-side handle to one play of a sound.

use crate::instance::{InstanceId, PlaybackState, SoundInstance};
use crate::scheduler::VoiceScheduler;
use std::fmt;
use std::sync::Arc;

/// Controls one play of a sound after it has been started.
///
/// Pooled instances are reused once they stop, so the handle remembers the
/// generation it was issued for. When the instance has moved on to another
/// play, the handle goes stale: queries report `Stopped` and every control
/// call is ignored.
#[derive(Clone)]
pub struct PlaybackHandle {
    instance: Arc<SoundInstance>,
    generation: u64,
    scheduler: Arc<VoiceScheduler>,
}

impl PlaybackHandle {
    /// Wraps an instance for its current generation.
    ///
    /// Only safe while the caller still holds the instance exclusively. Once
    /// it has been started it may finish and be reused at any moment; use
    /// [`for_generation`](Self::for_generation) with a generation read before
    /// the start.
    pub fn new(instance: Arc<SoundInstance>, scheduler: Arc<VoiceScheduler>) -> Self {
        let generation = instance.generation();
        Self::for_generation(instance, generation, scheduler)
    }

    /// Wraps an instance for a generation read earlier.
    pub fn for_generation(
        instance: Arc<SoundInstance>,
        generation: u64,
        scheduler: Arc<VoiceScheduler>,
    ) -> Self {
        Self {
            instance,
            generation,
            scheduler,
        }
    }

    /// The instance generation this handle was issued for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` while the instance still belongs to this play.
    pub fn is_current(&self) -> bool {
        self.instance.generation() == self.generation
    }

    /// The id of the underlying instance.
    pub fn id(&self) -> InstanceId {
        self.instance.id()
    }

    /// The play's state; `Stopped` once the handle is stale.
    pub fn state(&self) -> PlaybackState {
        if self.is_current() {
            self.instance.state()
        } else {
            PlaybackState::Stopped
        }
    }

    /// Shorthand for `state() == Playing`.
    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    fn with_current(&self, f: impl FnOnce(&Arc<SoundInstance>)) {
        if self.is_current() {
            f(&self.instance);
        } else {
            log::trace!("Ignoring call on stale playback handle {:?}.", self.instance.id());
        }
    }

    /// Changes the gain of the playing sound.
    pub fn set_volume(&self, volume: f32) {
        self.with_current(|instance| {
            instance.set_volume(volume);
            self.scheduler.apply_params(instance);
        });
    }

    /// Changes the playback rate.
    pub fn set_pitch(&self, pitch: f32) {
        self.with_current(|instance| {
            instance.set_pitch(pitch);
            self.scheduler.apply_params(instance);
        });
    }

    /// Changes the stereo balance.
    pub fn set_pan(&self, pan: f32) {
        self.with_current(|instance| {
            instance.set_pan(pan);
            self.scheduler.apply_params(instance);
        });
    }

    /// Moves the emitter.
    pub fn set_position(&self, position: Option<[f32; 3]>) {
        self.with_current(|instance| {
            instance.set_position(position);
            self.scheduler.apply_params(instance);
        });
    }

    /// Pauses, keeping the voice.
    pub fn pause(&self) {
        self.with_current(|instance| self.scheduler.pause(instance));
    }

    /// Resumes a paused play.
    pub fn resume(&self) {
        self.with_current(|instance| {
            if instance.state() == PlaybackState::Paused {
                self.scheduler.start_playback(instance);
            }
        });
    }

    /// Stops the play. See [`VoiceScheduler::stop`] for `immediate`.
    pub fn stop(&self, immediate: bool) {
        self.with_current(|instance| self.scheduler.stop(instance, immediate));
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("instance", &self.instance.id())
            .field("generation", &self.generation)
            .field("current", &self.is_current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::InstancePool;
    use std::sync::Mutex;
    use tether_core::audio::{SoundData, VoiceBackend, VoiceHandle, VoiceParams, VoiceStatus};

    #[derive(Default)]
    struct RecordingBank {
        applied: Mutex<Vec<(VoiceHandle, f32)>>,
    }

    impl VoiceBackend for RecordingBank {
        fn voice_count(&self) -> usize {
            2
        }
        fn bind(&self, _: VoiceHandle, _: Arc<SoundData>, _: &VoiceParams) {}
        fn unbind(&self, _: VoiceHandle) {}
        fn start(&self, _: VoiceHandle) {}
        fn pause(&self, _: VoiceHandle) {}
        fn stop(&self, _: VoiceHandle) {}
        fn set_looping(&self, _: VoiceHandle, _: bool) {}
        fn apply(&self, voice: VoiceHandle, params: &VoiceParams) {
            self.applied.lock().unwrap().push((voice, params.volume));
        }
        fn status(&self, _: VoiceHandle) -> VoiceStatus {
            VoiceStatus::Playing
        }
    }

    fn sample() -> Arc<SoundData> {
        Arc::new(SoundData::new(vec![0.0; 8], 1, 8_000))
    }

    #[test]
    fn parameter_changes_reach_the_voice() {
        let bank = Arc::new(RecordingBank::default());
        let scheduler = Arc::new(VoiceScheduler::new(bank.clone(), 2));
        let instance = SoundInstance::new(sample());
        scheduler.start_playback(&instance);

        let handle = PlaybackHandle::new(instance.clone(), scheduler);
        handle.set_volume(0.25);

        let voice = instance.voice().unwrap();
        assert_eq!(bank.applied.lock().unwrap().as_slice(), &[(voice, 0.25)]);
    }

    #[test]
    fn pause_and_resume_through_the_handle() {
        let scheduler = Arc::new(VoiceScheduler::new(Arc::new(RecordingBank::default()), 2));
        let instance = SoundInstance::new(sample());
        scheduler.start_playback(&instance);
        let handle = PlaybackHandle::new(instance, scheduler);

        handle.pause();
        assert_eq!(handle.state(), PlaybackState::Paused);
        handle.resume();
        assert!(handle.is_playing());
    }

    #[test]
    fn handle_goes_stale_after_recycling() {
        let scheduler = Arc::new(VoiceScheduler::new(Arc::new(RecordingBank::default()), 2));
        let pool = InstancePool::new(1);

        let instance = pool.acquire(sample());
        scheduler.start_playback(&instance);
        let old = PlaybackHandle::new(instance.clone(), scheduler.clone());
        old.stop(true);
        assert!(old.is_current(), "stopping alone does not advance the generation");

        let reused = pool.acquire(sample());
        assert!(Arc::ptr_eq(&instance, &reused));
        scheduler.start_playback(&reused);

        assert!(!old.is_current());
        assert_eq!(old.state(), PlaybackState::Stopped);
        old.stop(true);
        old.set_volume(0.0);
        assert_eq!(reused.state(), PlaybackState::Playing, "stale handle must not touch the new play");
        assert_eq!(reused.volume(), 1.0);
    }

    #[test]
    fn handle_for_an_earlier_generation_is_stale() {
        let scheduler = Arc::new(VoiceScheduler::new(Arc::new(RecordingBank::default()), 2));
        let pool = InstancePool::new(1);

        let instance = pool.acquire(sample());
        let issued = instance.generation();
        scheduler.start_playback(&instance);
        scheduler.stop(&instance, true);
        let reused = pool.acquire(sample());
        scheduler.start_playback(&reused);

        let late = PlaybackHandle::for_generation(reused.clone(), issued, scheduler);
        assert_eq!(late.generation(), issued);
        assert!(!late.is_current());
        late.pause();
        assert_eq!(reused.state(), PlaybackState::Playing);
    }
}
