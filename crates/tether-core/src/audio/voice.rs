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

//! Hardware voice identifiers and the native voice contract.

use super::SoundData;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Identifies one hardware playback channel.
///
/// Handles are numbered `1..=N` when the voice bank is created and are never
/// created or destroyed afterwards, only reassigned. Zero is not a valid
/// handle, so `Option<VoiceHandle>` is the "no voice" state at no extra cost.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(NonZeroU32);

impl VoiceHandle {
    /// Builds the handle for the zero-based slot `index`.
    pub fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(Self)
    }

    /// Builds a handle from its raw, one-based id. Zero yields `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw, one-based id.
    pub fn raw(self) -> u32 {
        self.0.get()
    }

    /// The zero-based slot index.
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Voice#{}", self.0)
    }
}

/// Playback status as reported by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceStatus {
    /// Not playing: never started, stopped, or reached the end of its data.
    Stopped,
    /// Producing sound.
    Playing,
    /// Holding its position.
    Paused,
}

/// Per-voice playback parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Linear gain, `1.0` is unity.
    pub volume: f32,
    /// Playback rate multiplier, `1.0` is the recorded pitch.
    pub pitch: f32,
    /// Stereo balance in `[-1.0, 1.0]`, `0.0` is centered.
    pub pan: f32,
    /// Restart from the beginning when the data runs out.
    pub looping: bool,
    /// World-space emitter position; `None` plays the sound unspatialized.
    pub position: Option<[f32; 3]>,
    /// World-space emitter velocity.
    pub velocity: [f32; 3],
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            pan: 0.0,
            looping: false,
            position: None,
            velocity: [0.0; 3],
        }
    }
}

impl VoiceParams {
    /// Returns a copy that every backend can play.
    ///
    /// Volume is clamped at silence, pan to `[-1.0, 1.0]`. A pitch that is not
    /// a finite positive number, or any other non-finite field, falls back to
    /// its default: a zero or NaN rate would never reach the end of the data.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let finite3 = |v: [f32; 3]| v.iter().all(|c| c.is_finite());

        Self {
            volume: if self.volume.is_finite() {
                self.volume.max(0.0)
            } else {
                defaults.volume
            },
            pitch: if self.pitch.is_finite() && self.pitch > 0.0 {
                self.pitch
            } else {
                defaults.pitch
            },
            pan: if self.pan.is_finite() {
                self.pan.clamp(-1.0, 1.0)
            } else {
                defaults.pan
            },
            looping: self.looping,
            position: self.position.filter(|p| finite3(*p)),
            velocity: if finite3(self.velocity) {
                self.velocity
            } else {
                defaults.velocity
            },
        }
    }
}

/// The native side of a fixed bank of playback voices.
///
/// Implementations must accept calls from any thread. The scheduler issues
/// them from application threads and from its reconcile thread, sometimes
/// while holding its own lock, so no method may block for long or call back
/// into the scheduler.
///
/// Calls naming a voice outside the bank are ignored.
pub trait VoiceBackend: Send + Sync {
    /// The number of voices the bank exposes.
    fn voice_count(&self) -> usize;

    /// Attaches sample data and initial parameters to a voice.
    fn bind(&self, voice: VoiceHandle, sample: Arc<SoundData>, params: &VoiceParams);

    /// Detaches whatever sample data the voice holds.
    fn unbind(&self, voice: VoiceHandle);

    /// Starts or resumes playback.
    fn start(&self, voice: VoiceHandle);

    /// Pauses playback, keeping the position.
    fn pause(&self, voice: VoiceHandle);

    /// Stops playback and rewinds.
    fn stop(&self, voice: VoiceHandle);

    /// Changes the loop flag of a playing voice.
    fn set_looping(&self, voice: VoiceHandle, looping: bool);

    /// Pushes updated parameters to a bound voice.
    fn apply(&self, voice: VoiceHandle, params: &VoiceParams);

    /// Queries the current native status.
    fn status(&self, voice: VoiceHandle) -> VoiceStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_index() {
        let handle = VoiceHandle::from_index(0).unwrap();
        assert_eq!(handle.raw(), 1);
        assert_eq!(handle.index(), 0);
        assert_eq!(format!("{handle:?}"), "Voice#1");
    }

    #[test]
    fn zero_is_not_a_handle() {
        assert!(VoiceHandle::from_raw(0).is_none());
        assert!(VoiceHandle::from_index(u32::MAX as usize).is_none());
    }

    #[test]
    fn sanitized_rejects_rates_that_never_advance() {
        for pitch in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            let params = VoiceParams {
                pitch,
                ..VoiceParams::default()
            };
            assert_eq!(params.sanitized().pitch, 1.0, "pitch {pitch} must fall back");
        }
    }

    #[test]
    fn sanitized_clamps_gain_and_balance() {
        let params = VoiceParams {
            volume: -0.5,
            pitch: 0.5,
            pan: 4.0,
            looping: true,
            position: Some([f32::NAN, 0.0, 0.0]),
            velocity: [f32::INFINITY, 0.0, 0.0],
        }
        .sanitized();

        assert_eq!(params.volume, 0.0);
        assert_eq!(params.pitch, 0.5);
        assert_eq!(params.pan, 1.0);
        assert!(params.looping);
        assert_eq!(params.position, None);
        assert_eq!(params.velocity, [0.0; 3]);
        assert_eq!(VoiceParams::default().sanitized(), VoiceParams::default());
    }
}
