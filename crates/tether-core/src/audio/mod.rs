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

//! Contracts between the voice scheduler and the native audio layer.
//!
//! - [`SoundData`]: decoded, immutable sample data shared between instances.
//! - [`VoiceHandle`] and [`VoiceBackend`]: the fixed bank of hardware voices and
//!   the calls the scheduler issues against it.
//! - [`AudioDevice`]: the output stream that pulls mixed audio from a backend.

pub mod device;
mod sample;
mod voice;

pub use self::device::{AudioDevice, AudioStream, StreamInfo};
pub use self::sample::SoundData;
pub use self::voice::{VoiceBackend, VoiceHandle, VoiceParams, VoiceStatus};
