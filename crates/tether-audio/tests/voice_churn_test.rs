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

//! Many threads playing and stopping sounds against a small voice bank while
//! the reconcile loop sweeps in the background.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tether_audio::{InstancePool, PlaybackHandle, PlaybackState, ReconcileLoop, VoiceScheduler};
use tether_core::audio::{SoundData, VoiceBackend, VoiceHandle, VoiceParams, VoiceStatus};

/// Voices "finish" after a few status polls unless they loop.
struct CountdownBank {
    remaining: Mutex<Vec<Option<u32>>>,
    binds: AtomicUsize,
    unbinds: AtomicUsize,
}

impl CountdownBank {
    const POLLS: u32 = 3;

    fn new(voices: usize) -> Self {
        Self {
            remaining: Mutex::new(vec![None; voices]),
            binds: AtomicUsize::new(0),
            unbinds: AtomicUsize::new(0),
        }
    }
}

impl VoiceBackend for CountdownBank {
    fn voice_count(&self) -> usize {
        self.remaining.lock().unwrap().len()
    }
    fn bind(&self, _: VoiceHandle, _: Arc<SoundData>, _: &VoiceParams) {
        self.binds.fetch_add(1, Ordering::Relaxed);
    }
    fn unbind(&self, _: VoiceHandle) {
        self.unbinds.fetch_add(1, Ordering::Relaxed);
    }
    fn start(&self, voice: VoiceHandle) {
        self.remaining.lock().unwrap()[voice.index()] = Some(Self::POLLS);
    }
    fn pause(&self, _: VoiceHandle) {}
    fn stop(&self, voice: VoiceHandle) {
        self.remaining.lock().unwrap()[voice.index()] = None;
    }
    fn set_looping(&self, _: VoiceHandle, _: bool) {}
    fn apply(&self, _: VoiceHandle, _: &VoiceParams) {}
    fn status(&self, voice: VoiceHandle) -> VoiceStatus {
        let mut remaining = self.remaining.lock().unwrap();
        match &mut remaining[voice.index()] {
            Some(0) | None => VoiceStatus::Stopped,
            Some(polls) => {
                *polls -= 1;
                VoiceStatus::Playing
            }
        }
    }
}

#[test]
fn voice_bank_stays_partitioned_under_churn() {
    const VOICES: usize = 8;
    const THREADS: u32 = 6;
    const PLAYS: u32 = 200;

    let bank = Arc::new(CountdownBank::new(VOICES));
    let scheduler = Arc::new(VoiceScheduler::new(bank.clone(), VOICES));
    let pool = InstancePool::new(4);
    let reconcile = ReconcileLoop::spawn(scheduler.clone(), Duration::from_millis(1)).unwrap();
    let sample = Arc::new(SoundData::new(vec![0.2; 64], 1, 22_050));
    let dropped = Arc::new(AtomicU32::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let scheduler = scheduler.clone();
            let pool = pool.clone();
            let sample = sample.clone();
            let dropped = dropped.clone();
            thread::spawn(move || {
                for play in 0..PLAYS {
                    let instance = pool.acquire(sample.clone());
                    let generation = instance.generation();
                    if !scheduler.start_playback(&instance) {
                        assert!(pool.release(&instance));
                        dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let handle = PlaybackHandle::for_generation(instance, generation, scheduler.clone());
                    if (play + worker) % 3 == 0 {
                        handle.stop(true);
                        assert_eq!(handle.state(), PlaybackState::Stopped);
                    }
                    assert!(scheduler.in_use_count() <= VOICES);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    // Let every remaining voice count down and be swept.
    let mut waited = 0;
    while scheduler.playing_count() > 0 && waited < 5_000 {
        thread::sleep(Duration::from_millis(1));
        waited += 1;
    }
    drop(reconcile);

    assert_eq!(scheduler.playing_count(), 0);
    assert_eq!(scheduler.available_count(), VOICES);
    assert_eq!(scheduler.in_use_count(), 0);

    let stats = scheduler.stats();
    assert_eq!(stats.outstanding(), 0);
    assert_eq!(stats.exhausted as u32, dropped.load(Ordering::Relaxed));
    assert_eq!(stats.acquired + stats.exhausted, u64::from(THREADS * PLAYS));
    assert_eq!(bank.binds.load(Ordering::Relaxed), bank.unbinds.load(Ordering::Relaxed));

    // Every instance made its way back home.
    assert_eq!(pool.idle(), pool.created());
}
