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

//! Defines the abstract `AudioDevice` trait.

use anyhow::Result;
use std::any::Any;
use std::fmt;

/// A struct providing information about the audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// The number of channels (e.g., 2 for stereo).
    pub channels: u16,
    /// The number of samples per second (e.g., 44100 Hz).
    pub sample_rate: u32,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48_000,
        }
    }
}

/// Keeps a running output stream alive. Dropping it stops playback.
pub struct AudioStream {
    _guard: Box<dyn Any>,
    info: StreamInfo,
}

impl AudioStream {
    /// Wraps a backend-specific stream object.
    pub fn new(guard: Box<dyn Any>, info: StreamInfo) -> Self {
        Self {
            _guard: guard,
            info,
        }
    }

    /// The format negotiated with the device.
    pub fn info(&self) -> StreamInfo {
        self.info
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream").field("info", &self.info).finish()
    }
}

/// The abstract contract for a hardware audio output backend.
///
/// The design is callback-driven: the engine provides a function that the
/// backend calls on its own audio thread whenever it needs more samples.
pub trait AudioDevice: Send {
    /// Initializes and starts the audio stream.
    ///
    /// # Arguments
    ///
    /// * `on_mix_needed`: Called repeatedly on the device's audio thread. It must
    ///   fill the provided buffer with interleaved samples (`[L, R, L, R, ...]`).
    ///
    /// # Returns
    ///
    /// A guard that keeps the stream running until it is dropped.
    fn start(
        self: Box<Self>,
        on_mix_needed: Box<dyn FnMut(&mut [f32], &StreamInfo) + Send>,
    ) -> Result<AudioStream>;
}
