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

use super::capture::{CaptureArgs, CaptureRegistry, ClosureCall, Deferred};
use super::error::{panic_message, DispatchError};
use crate::telemetry::{DispatchStats, DispatchStatsSnapshot};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};

/// Default number of slots preallocated per capture shape.
const DEFAULT_CAPTURE_WARM: usize = 16;

/// One pending queue entry.
struct Job {
    call: Box<dyn Deferred>,
    /// `true` when a `run_blocking` caller is parked on this entry.
    blocking: bool,
}

/// The outcome of one [`OwnerThreadDispatcher::drain`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries run during this drain.
    pub executed: usize,
    /// Entries among them that panicked.
    pub faulted: usize,
}

/// Runs native-context work on the one thread allowed to do it.
///
/// The dispatcher remembers the thread that constructed it as its owner.
/// Any thread may submit work; only the owner executes it, in FIFO order, when
/// it calls [`drain`](Self::drain) once per tick.
///
/// Construct one per engine on the owner thread and share it behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tether_core::OwnerThreadDispatcher;
///
/// fn delete_buffer(id: u32) {
///     // the native delete call lives here
///     let _ = id;
/// }
///
/// let dispatcher = Arc::new(OwnerThreadDispatcher::new());
/// let remote = dispatcher.clone();
/// std::thread::spawn(move || remote.enqueue1(delete_buffer, 7))
///     .join()
///     .unwrap();
///
/// let report = dispatcher.drain().unwrap();
/// assert_eq!(report.executed, 1);
/// ```
pub struct OwnerThreadDispatcher {
    owner: ThreadId,
    sender: flume::Sender<Job>,
    receiver: flume::Receiver<Job>,
    captures: CaptureRegistry,
    stats: DispatchStats,
}

impl OwnerThreadDispatcher {
    /// Creates a dispatcher owned by the calling thread.
    pub fn new() -> Self {
        Self::with_capture_warm(DEFAULT_CAPTURE_WARM)
    }

    /// Creates a dispatcher owned by the calling thread, preallocating
    /// `capture_warm` slots for each argument shape the first time it is used.
    pub fn with_capture_warm(capture_warm: usize) -> Self {
        let (sender, receiver) = flume::unbounded();
        let owner = thread::current().id();
        log::info!("Owner-thread dispatcher bound to thread {owner:?}.");
        Self {
            owner,
            sender,
            receiver,
            captures: CaptureRegistry::new(capture_warm),
            stats: DispatchStats::default(),
        }
    }

    /// The thread this dispatcher executes work on.
    pub fn owner_thread(&self) -> ThreadId {
        self.owner
    }

    /// Returns `true` when called from the owner thread.
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// The number of entries waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Reads the dispatcher's counters.
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs `action` on the owner thread and returns its result.
    ///
    /// On the owner thread the action runs immediately and the queue is never
    /// touched. From any other thread the action is queued and the caller
    /// blocks until the owner drains it. There is no timeout: if the owner
    /// thread never drains, the caller never returns.
    ///
    /// A panic inside a queued action is caught on the owner thread, logged,
    /// and returned here as [`DispatchError::ActionPanicked`]. On the owner
    /// thread a panic simply propagates to the caller.
    pub fn run_blocking<R, F>(&self, action: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            self.stats.record_inline();
            return Ok(action());
        }

        let (done_tx, done_rx) = flume::bounded::<Result<R, DispatchError>>(1);
        let call = ClosureCall(move || match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(value) => {
                let _ = done_tx.send(Ok(value));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let _ = done_tx.send(Err(DispatchError::ActionPanicked { message }));
                // Let the drain loop log and count it like any other fault.
                panic::resume_unwind(payload);
            }
        });

        self.stats.record_blocking();
        self.push(Job {
            call: Box::new(call),
            blocking: true,
        })?;

        done_rx.recv().map_err(|_| DispatchError::Disconnected)?
    }

    /// Queues `action()` to run at the owner's next drain.
    pub fn enqueue0(&self, action: fn()) {
        self.enqueue_capture::<()>(action, ());
    }

    /// Queues `action(a)` to run at the owner's next drain.
    ///
    /// This is the path resource owners use to defer a native delete.
    pub fn enqueue1<A>(&self, action: fn(A), a: A)
    where
        A: Send + 'static,
    {
        self.enqueue_capture::<(A,)>(action, (a,));
    }

    /// Queues `action(a, b)` to run at the owner's next drain.
    pub fn enqueue2<A, B>(&self, action: fn(A, B), a: A, b: B)
    where
        A: Send + 'static,
        B: Send + 'static,
    {
        self.enqueue_capture::<(A, B)>(action, (a, b));
    }

    /// Queues `action(a, b, c)` to run at the owner's next drain.
    pub fn enqueue3<A, B, C>(&self, action: fn(A, B, C), a: A, b: B, c: C)
    where
        A: Send + 'static,
        B: Send + 'static,
        C: Send + 'static,
    {
        self.enqueue_capture::<(A, B, C)>(action, (a, b, c));
    }

    /// Queues `action(a, b, c, d)` to run at the owner's next drain.
    pub fn enqueue4<A, B, C, D>(&self, action: fn(A, B, C, D), a: A, b: B, c: C, d: D)
    where
        A: Send + 'static,
        B: Send + 'static,
        C: Send + 'static,
        D: Send + 'static,
    {
        self.enqueue_capture::<(A, B, C, D)>(action, (a, b, c, d));
    }

    /// Queues an arbitrary closure to run at the owner's next drain.
    ///
    /// This allocates once per call. Prefer the `enqueueN` functions on hot
    /// teardown paths.
    pub fn enqueue_closure<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Job {
            call: Box::new(ClosureCall(action)),
            blocking: false,
        };
        if let Err(e) = self.push(job) {
            log::error!("Failed to enqueue deferred closure: {e}");
        }
    }

    fn enqueue_capture<A: CaptureArgs>(&self, action: A::Func, args: A) {
        let mut slot = self.captures.pool::<A>().acquire();
        slot.fill(action, args);
        let job = Job {
            call: slot,
            blocking: false,
        };
        if let Err(e) = self.push(job) {
            log::error!("Failed to enqueue deferred call (arity {}): {e}", A::ARITY);
        }
    }

    fn push(&self, job: Job) -> Result<(), DispatchError> {
        self.sender
            .send(job)
            .map_err(|_| DispatchError::Disconnected)?;
        self.stats.record_enqueued();
        Ok(())
    }

    /// Executes the entries queued at the moment of the call, in FIFO order.
    ///
    /// Must be called from the owner thread, once per tick. Entries that
    /// arrive while the drain is running wait for the next one: this drains
    /// a snapshot, not a fixpoint.
    ///
    /// A panicking entry is logged and skipped; the remaining entries still
    /// run, and a parked `run_blocking` caller is released with the fault.
    pub fn drain(&self) -> Result<DrainReport, DispatchError> {
        if !self.is_owner_thread() {
            let caller = thread::current().id();
            log::error!(
                "Dispatcher drain attempted from {caller:?}; only {:?} may drain.",
                self.owner
            );
            return Err(DispatchError::NotOwnerThread {
                owner: self.owner,
                caller,
            });
        }

        let mut report = DrainReport::default();
        let snapshot = self.receiver.len();
        for _ in 0..snapshot {
            let Ok(job) = self.receiver.try_recv() else {
                break;
            };

            let blocking = job.blocking;
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || job.call.run()));
            report.executed += 1;
            let faulted = outcome.is_err();
            if let Err(payload) = outcome {
                report.faulted += 1;
                log::error!(
                    "Dispatched {} action panicked on the owner thread: {}",
                    if blocking { "blocking" } else { "deferred" },
                    panic_message(payload.as_ref())
                );
            }
            self.stats.record_executed(faulted);
        }

        if report.executed > 0 {
            log::trace!(
                "Drained {} dispatcher entries ({} faulted).",
                report.executed,
                report.faulted
            );
        }
        Ok(report)
    }
}

impl Default for OwnerThreadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OwnerThreadDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerThreadDispatcher")
            .field("owner", &self.owner)
            .field("pending", &self.pending())
            .field("captures", &self.captures)
            .finish()
    }
}
