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

//! The background thread that reclaims voices after natural completion.

use crate::scheduler::VoiceScheduler;
use anyhow::Context;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const THREAD_NAME: &str = "tether-voice-reconcile";

/// Runs [`VoiceScheduler::reconcile_tick`] on a fixed period.
///
/// The loop owns its thread. Dropping the handle (or calling
/// [`shutdown`](Self::shutdown)) wakes the thread, lets it finish the sweep in
/// progress, and joins it.
#[derive(Debug)]
pub struct ReconcileLoop {
    shutdown: Option<flume::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    interval: Duration,
}

impl ReconcileLoop {
    /// Spawns the reconcile thread.
    pub fn spawn(scheduler: Arc<VoiceScheduler>, interval: Duration) -> anyhow::Result<Self> {
        let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                log::info!("Voice reconcile loop started ({}ms period).", interval.as_millis());
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(flume::RecvTimeoutError::Timeout) => {
                            scheduler.reconcile_tick();
                        }
                        // An explicit signal or a dropped sender both mean stop.
                        Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("Voice reconcile loop stopped.");
            })
            .context("failed to spawn the voice reconcile thread")?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
            interval,
        })
    }

    /// The sweep period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` while the thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    /// Stops the thread and waits for it. Calling it twice is harmless.
    pub fn shutdown(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Voice reconcile thread panicked.");
            }
        }
    }
}

impl Drop for ReconcileLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
