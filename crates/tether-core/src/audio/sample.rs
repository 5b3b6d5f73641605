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

use std::time::Duration;

/// Decoded audio, ready for playback.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]`. A `SoundData` is immutable
/// once loaded and is shared between sound instances behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundData {
    /// The raw, interleaved audio samples (`[L, R, L, R, ...]` for stereo).
    pub samples: Vec<f32>,
    /// The number of channels in the audio data (1 for mono, 2 for stereo).
    pub channels: u16,
    /// The number of frames per second (e.g., 44100 Hz).
    pub sample_rate: u32,
}

impl SoundData {
    /// Creates a new sound from interleaved samples.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// The number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Playback length at unit pitch.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns `true` if there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}
