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

//! # Tether Core
//!
//! Foundational crate containing the owner-thread dispatcher, the recycling
//! pools it is built on, and the interface contracts for the audio layer.
//!
//! Higher-level crates (`tether-audio`, `tether-infra`, `tether-sdk`) build the
//! voice scheduler and the concrete backends on top of these primitives.

#![warn(missing_docs)]

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod telemetry;

pub use config::EngineConfig;
pub use dispatch::{DispatchError, OwnerThreadDispatcher, RecyclingPool};
