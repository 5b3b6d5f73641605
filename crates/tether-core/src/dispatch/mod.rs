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

//! Marshals work onto the single thread allowed to touch the native context.
//!
//! Native graphics and audio handles are only valid on one dedicated "owner"
//! thread. The [`OwnerThreadDispatcher`] lets any other thread either run an
//! action there and wait for it ([`OwnerThreadDispatcher::run_blocking`]) or
//! queue it to run at the owner's next tick ([`OwnerThreadDispatcher::enqueue1`]
//! and friends). The owner drains the queue once per frame.
//!
//! Deferred calls built from plain function pointers travel in pooled
//! [`CaptureSlot`]s, so steady-state teardown traffic does not allocate.
//! [`NativeResource`] wraps a native handle and uses that path from its `Drop`.

mod capture;
mod dispatcher;
mod error;
mod pool;
mod resource;

pub use self::capture::{CaptureArgs, CapturePool, CaptureSlot};
pub use self::dispatcher::{DrainReport, OwnerThreadDispatcher};
pub use self::error::DispatchError;
pub use self::pool::RecyclingPool;
pub use self::resource::NativeResource;
