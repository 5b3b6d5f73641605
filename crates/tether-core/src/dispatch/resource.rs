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

//! Ownership wrapper for handles that must be deleted on the owner thread.

use super::dispatcher::OwnerThreadDispatcher;
use std::fmt;
use std::sync::Arc;

/// Owns a native handle (GPU buffer, texture, audio buffer id, ...) and
/// guarantees its delete call runs on the dispatcher's owner thread.
///
/// Dropping the wrapper on the owner thread deletes immediately. Dropping it
/// anywhere else queues the delete through a pooled capture slot, and it runs
/// at the owner's next drain.
pub struct NativeResource<H: Send + 'static> {
    handle: Option<H>,
    delete: fn(H),
    dispatcher: Arc<OwnerThreadDispatcher>,
}

impl<H: Send + 'static> NativeResource<H> {
    /// Takes ownership of `handle`; `delete` is called exactly once, on the owner thread.
    pub fn new(handle: H, delete: fn(H), dispatcher: Arc<OwnerThreadDispatcher>) -> Self {
        Self {
            handle: Some(handle),
            delete,
            dispatcher,
        }
    }

    /// Borrows the native handle.
    pub fn handle(&self) -> &H {
        match &self.handle {
            Some(handle) => handle,
            // Only `Drop` and `into_inner` take the handle, and both consume `self`.
            None => unreachable!("native handle taken before drop"),
        }
    }

    /// Gives up ownership without deleting; the caller becomes responsible.
    pub fn into_inner(mut self) -> H {
        match self.handle.take() {
            Some(handle) => handle,
            None => unreachable!("native handle taken before drop"),
        }
    }
}

impl<H: Send + 'static> Drop for NativeResource<H> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.dispatcher.is_owner_thread() {
            (self.delete)(handle);
        } else {
            self.dispatcher.enqueue1(self.delete, handle);
        }
    }
}

impl<H: Send + fmt::Debug + 'static> fmt::Debug for NativeResource<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeResource")
            .field("handle", &self.handle)
            .finish()
    }
}
