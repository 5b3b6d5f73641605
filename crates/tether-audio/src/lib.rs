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

//! # Tether Audio
//!
//! Voice multiplexing on top of a fixed native voice bank.
//!
//! - [`VoiceScheduler`] hands out voices, tracks which instance holds which,
//!   and reclaims them.
//! - [`SoundInstance`] is one logical sound; [`InstancePool`] recycles them.
//! - [`ReconcileLoop`] periodically sweeps for voices that finished on their
//!   own.
//! - [`PlaybackHandle`] is what callers keep to steer one play.

#![warn(missing_docs)]

mod instance;
mod playback;
mod pool;
mod reconcile;
mod scheduler;

pub use instance::{InstanceId, InstanceOrigin, PlaybackState, SoundInstance};
pub use playback::PlaybackHandle;
pub use pool::InstancePool;
pub use reconcile::ReconcileLoop;
pub use scheduler::VoiceScheduler;
