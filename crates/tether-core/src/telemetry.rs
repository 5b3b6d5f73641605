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

//! Lightweight counters for the dispatcher and the voice scheduler.
//!
//! Each subsystem owns its own set of atomic counters and bumps them with
//! `Ordering::Relaxed`. Readers take a [`snapshot`](DispatchStats::snapshot)
//! and get a plain `Copy` struct back, which is what the engine logs on
//! shutdown.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for an [`OwnerThreadDispatcher`](crate::OwnerThreadDispatcher).
#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    executed: AtomicU64,
    faulted: AtomicU64,
    blocking_calls: AtomicU64,
    inline_calls: AtomicU64,
}

/// A point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    /// Entries pushed onto the pending queue.
    pub enqueued: u64,
    /// Entries run by a drain, faulted ones included.
    pub executed: u64,
    /// Entries that panicked while being drained.
    pub faulted: u64,
    /// `run_blocking` calls that had to wait for the owner thread.
    pub blocking_calls: u64,
    /// `run_blocking` calls made on the owner thread and run in place.
    pub inline_calls: u64,
}

impl DispatchStatsSnapshot {
    /// Entries that were queued but have not been drained yet.
    pub fn backlog(&self) -> u64 {
        self.enqueued.saturating_sub(self.executed)
    }
}

impl DispatchStats {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self, faulted: bool) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if faulted {
            self.faulted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_blocking(&self) {
        self.blocking_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inline(&self) {
        self.inline_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            blocking_calls: self.blocking_calls.load(Ordering::Relaxed),
            inline_calls: self.inline_calls.load(Ordering::Relaxed),
        }
    }
}

/// Live counters for a voice scheduler.
#[derive(Debug, Default)]
pub struct VoiceStats {
    acquired: AtomicU64,
    released: AtomicU64,
    exhausted: AtomicU64,
    reclaimed: AtomicU64,
}

/// A point-in-time copy of [`VoiceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceStatsSnapshot {
    /// Voices handed out.
    pub acquired: u64,
    /// Voices returned to the free set, by any path.
    pub released: u64,
    /// Acquire attempts that found no free voice.
    pub exhausted: u64,
    /// Voices reclaimed by the reconcile sweep after natural completion.
    pub reclaimed: u64,
}

impl VoiceStatsSnapshot {
    /// Voices currently handed out, as seen by the counters.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

impl VoiceStats {
    /// Counts one successful acquire.
    pub fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one release.
    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one acquire that came back empty.
    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `count` voices reclaimed by one sweep.
    pub fn record_reclaimed(&self, count: usize) {
        self.reclaimed.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> VoiceStatsSnapshot {
        VoiceStatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}
