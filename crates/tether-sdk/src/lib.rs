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

//! The public-facing entry point for Tether.
//!
//! An [`Engine`] is built once, on the thread that owns the native audio
//! context, and bundles everything that used to be process-wide: the
//! owner-thread dispatcher, the voice scheduler with its reconcile thread, and
//! the sound instance pool. Share pieces of it with other threads through the
//! `Arc`s its accessors return.

mod engine;

pub use engine::{Engine, EngineBuilder};

/// Everything a typical caller needs in scope.
pub mod prelude {
    pub use crate::{Engine, EngineBuilder};
    pub use tether_audio::{InstancePool, PlaybackHandle, PlaybackState, SoundInstance, VoiceScheduler};
    pub use tether_core::audio::{SoundData, StreamInfo, VoiceBackend, VoiceParams};
    pub use tether_core::dispatch::{DrainReport, NativeResource};
    pub use tether_core::{DispatchError, EngineConfig, OwnerThreadDispatcher};
    pub use tether_infra::{load_wav, load_wav_file, Listener, MixerVoiceBank};
}
