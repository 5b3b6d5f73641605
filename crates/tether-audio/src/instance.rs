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

//! Defines `SoundInstance`, one logical request to play a sound.

use crate::pool::PoolShared;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tether_core::audio::{SoundData, VoiceHandle, VoiceParams};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for a [`SoundInstance`] object.
///
/// The id belongs to the object, not to one play: a recycled instance keeps
/// its id and bumps its [`generation`](SoundInstance::generation) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// The logical playback state of a [`SoundInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// Holds no voice.
    #[default]
    Stopped,
    /// Holds a voice that is producing sound.
    Playing,
    /// Holds a voice that is holding its position.
    Paused,
}

/// Where an instance came from, and so where it goes when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOrigin {
    /// Built directly by the caller; never recycled.
    Standalone,
    /// Drawn from an [`InstancePool`](crate::InstancePool); goes back on `Stopped`.
    Pooled,
}

#[derive(Debug)]
struct InstanceState {
    sample: Option<Arc<SoundData>>,
    params: VoiceParams,
    voice: Option<VoiceHandle>,
    playback: PlaybackState,
    generation: u64,
    in_pool: bool,
}

impl InstanceState {
    fn new(sample: Option<Arc<SoundData>>, in_pool: bool) -> Self {
        Self {
            sample,
            params: VoiceParams::default(),
            voice: None,
            playback: PlaybackState::Stopped,
            generation: 0,
            in_pool,
        }
    }
}

/// A logical sound: sample data plus playback parameters, realized by at most
/// one hardware voice at a time.
///
/// Invariant: [`voice`](Self::voice) is `Some` exactly when the state is
/// `Playing` or `Paused`. Only the voice scheduler moves an instance between
/// states.
///
/// Each instance guards its fields with a short internal lock, but it is meant
/// to be driven by one logical owner at a time. Two threads tweaking the same
/// instance concurrently get last-writer-wins.
#[derive(Debug)]
pub struct SoundInstance {
    id: InstanceId,
    home: Option<Weak<PoolShared>>,
    state: Mutex<InstanceState>,
}

impl SoundInstance {
    /// Creates a standalone instance. It is never returned to a pool.
    pub fn new(sample: Arc<SoundData>) -> Arc<Self> {
        Arc::new(Self {
            id: InstanceId::next(),
            home: None,
            state: Mutex::new(InstanceState::new(Some(sample), false)),
        })
    }

    pub(crate) fn pooled(home: Weak<PoolShared>) -> Self {
        Self {
            id: InstanceId::next(),
            home: Some(home),
            state: Mutex::new(InstanceState::new(None, true)),
        }
    }

    pub(crate) fn home_is(&self, pool: &Arc<PoolShared>) -> bool {
        self.home
            .as_ref()
            .is_some_and(|home| std::ptr::eq(home.as_ptr(), Arc::as_ptr(pool)))
    }

    fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// This object's id.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Whether this instance recycles itself when it stops.
    pub fn origin(&self) -> InstanceOrigin {
        if self.home.is_some() {
            InstanceOrigin::Pooled
        } else {
            InstanceOrigin::Standalone
        }
    }

    /// Counts how many times the instance has been drawn from its pool.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// The sample this instance plays, if one is bound.
    pub fn sample(&self) -> Option<Arc<SoundData>> {
        self.lock().sample.clone()
    }

    /// The current playback state.
    pub fn state(&self) -> PlaybackState {
        self.lock().playback
    }

    /// The voice realizing this instance, if any.
    pub fn voice(&self) -> Option<VoiceHandle> {
        self.lock().voice
    }

    /// A copy of all playback parameters.
    pub fn params(&self) -> VoiceParams {
        self.lock().params
    }

    /// Linear gain.
    pub fn volume(&self) -> f32 {
        self.lock().params.volume
    }

    /// Sets the linear gain; negative or NaN values clamp to silence.
    pub fn set_volume(&self, volume: f32) {
        self.lock().params.volume = volume.max(0.0);
    }

    /// Playback rate multiplier.
    pub fn pitch(&self) -> f32 {
        self.lock().params.pitch
    }

    /// Sets the playback rate; values that are not finite and positive are ignored.
    pub fn set_pitch(&self, pitch: f32) {
        if pitch.is_finite() && pitch > 0.0 {
            self.lock().params.pitch = pitch;
        }
    }

    /// Stereo balance.
    pub fn pan(&self) -> f32 {
        self.lock().params.pan
    }

    /// Sets the stereo balance, clamped to `[-1.0, 1.0]`. NaN is ignored.
    pub fn set_pan(&self, pan: f32) {
        if !pan.is_nan() {
            self.lock().params.pan = pan.clamp(-1.0, 1.0);
        }
    }

    /// Whether playback wraps around at the end of the data.
    pub fn is_looping(&self) -> bool {
        self.lock().params.looping
    }

    /// Sets the loop flag. Use the scheduler to change it on a playing voice.
    pub fn set_looping(&self, looping: bool) {
        self.lock().params.looping = looping;
    }

    /// World-space emitter position.
    pub fn position(&self) -> Option<[f32; 3]> {
        self.lock().params.position
    }

    /// Places the emitter in the world, or `None` for a flat 2-D sound.
    /// A position with a non-finite coordinate counts as `None`.
    pub fn set_position(&self, position: Option<[f32; 3]>) {
        let params = VoiceParams {
            position,
            ..VoiceParams::default()
        };
        self.lock().params.position = params.sanitized().position;
    }

    /// World-space emitter velocity.
    pub fn velocity(&self) -> [f32; 3] {
        self.lock().params.velocity
    }

    /// Sets the emitter velocity.
    pub fn set_velocity(&self, velocity: [f32; 3]) {
        self.lock().params.velocity = velocity;
    }

    /// Overwrites every parameter at once, after [`VoiceParams::sanitized`].
    pub fn set_params(&self, params: VoiceParams) {
        self.lock().params = params.sanitized();
    }

    // --- Scheduler-side transitions ---

    /// Binds `voice` and enters `Playing`.
    pub(crate) fn attach(&self, voice: VoiceHandle) {
        let mut state = self.lock();
        state.voice = Some(voice);
        state.playback = PlaybackState::Playing;
    }

    /// `Paused -> Playing` on the voice already held.
    pub(crate) fn resume(&self) {
        let mut state = self.lock();
        if state.voice.is_some() {
            state.playback = PlaybackState::Playing;
        }
    }

    /// `Playing -> Paused`. Returns `false` for any other state.
    pub(crate) fn pause(&self) -> bool {
        let mut state = self.lock();
        if state.playback == PlaybackState::Playing {
            state.playback = PlaybackState::Paused;
            true
        } else {
            false
        }
    }

    /// Drops the voice and enters `Stopped`. A pooled instance then goes
    /// straight back to its pool.
    ///
    /// Returns `true` if this call performed the transition.
    pub(crate) fn finish(self: &Arc<Self>) -> bool {
        let recycle = {
            let mut state = self.lock();
            if state.playback == PlaybackState::Stopped && state.voice.is_none() {
                return false;
            }
            state.voice = None;
            state.playback = PlaybackState::Stopped;
            self.mark_in_pool(&mut state)
        };
        if let Some(pool) = recycle {
            pool.free.release(Arc::clone(self));
        }
        true
    }

    /// Sends a stopped, pooled instance home. Used when a play request never
    /// got a voice, so the instance never reached `Playing`.
    pub(crate) fn recycle(self: &Arc<Self>) -> bool {
        let recycle = {
            let mut state = self.lock();
            if state.playback != PlaybackState::Stopped {
                return false;
            }
            self.mark_in_pool(&mut state)
        };
        match recycle {
            Some(pool) => {
                pool.free.release(Arc::clone(self));
                true
            }
            None => false,
        }
    }

    fn mark_in_pool(&self, state: &mut InstanceState) -> Option<Arc<PoolShared>> {
        if state.in_pool {
            return None;
        }
        let pool = self.home.as_ref()?.upgrade()?;
        state.in_pool = true;
        state.sample = None;
        Some(pool)
    }

    /// Prepares a pooled instance for a new play: defaults, new sample, new generation.
    pub(crate) fn reset(&self, sample: Arc<SoundData>) {
        let mut state = self.lock();
        state.sample = Some(sample);
        state.params = VoiceParams::default();
        state.voice = None;
        state.playback = PlaybackState::Stopped;
        state.generation += 1;
        state.in_pool = false;
    }
}
