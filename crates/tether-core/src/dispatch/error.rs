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

//! Error type for the owner-thread dispatcher.

use std::any::Any;
use std::thread::ThreadId;
use thiserror::Error;

/// An error surfaced by [`OwnerThreadDispatcher`](super::OwnerThreadDispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// An owner-only operation was attempted from another thread.
    #[error("operation requires the owner thread {owner:?}, called from {caller:?}")]
    NotOwnerThread {
        /// The thread the dispatcher is bound to.
        owner: ThreadId,
        /// The thread that made the call.
        caller: ThreadId,
    },
    /// The submitted action panicked while running on the owner thread.
    #[error("dispatched action panicked: {message}")]
    ActionPanicked {
        /// The panic payload, when it was a string.
        message: String,
    },
    /// The queue went away before the action could run.
    #[error("dispatcher queue disconnected before the action ran")]
    Disconnected,
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
