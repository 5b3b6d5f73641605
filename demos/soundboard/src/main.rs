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

//! Worker threads fire short sounds and release native buffers while the main
//! thread plays the owner: it ticks the dispatcher and feeds the mixer.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tether_infra::CpalAudioDevice;
use tether_sdk::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "soundboard")]
#[command(about = "Fires sounds from worker threads against a fixed voice bank")]
struct Cli {
    /// TOML engine config; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// WAV file to play; a synthesized blip is used when omitted.
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Number of worker threads.
    #[arg(long, default_value_t = 4)]
    workers: u32,

    /// Sounds each worker tries to play.
    #[arg(long, default_value_t = 32)]
    plays: u32,

    /// Owner-thread tick period in milliseconds.
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Play through the default output device instead of mixing headless.
    #[arg(long)]
    device: bool,
}

static BUFFERS_FREED: AtomicU32 = AtomicU32::new(0);

/// Stands in for a native buffer delete that must run on the owner thread.
fn free_native_buffer(id: u32) {
    BUFFERS_FREED.fetch_add(1, Ordering::Relaxed);
    log::trace!("Freed native buffer {id} on {:?}.", thread::current().name());
}

fn synth_blip(sample_rate: u32) -> SoundData {
    let frames = sample_rate as usize / 8;
    let samples = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = 1.0 - i as f32 / frames as f32;
            (t * 660.0 * std::f32::consts::TAU).sin() * envelope * 0.4
        })
        .collect();
    SoundData::new(samples, 1, sample_rate)
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;

    let sound = Arc::new(match &cli.wav {
        Some(path) => load_wav_file(path)?,
        None => synth_blip(48_000),
    });

    let engine = Engine::new(config)?;
    let stream = if cli.device {
        Some(engine.start_output(Box::new(CpalAudioDevice::new()))?)
    } else {
        None
    };
    let stream_info = stream.as_ref().map(|s| s.info()).unwrap_or_default();
    let tick = Duration::from_millis(cli.tick_ms);
    let frames_per_tick = ((stream_info.sample_rate as u64 * cli.tick_ms / 1000) as usize).max(1);
    let mut headless_buffer = vec![0.0; frames_per_tick * stream_info.channels as usize];

    let dropped = AtomicU32::new(0);
    let dispatcher = engine.dispatcher().clone();

    thread::scope(|scope| {
        let workers: Vec<_> = (0..cli.workers)
            .map(|worker| {
                let engine = &engine;
                let sound = sound.clone();
                let dropped = &dropped;
                let dispatcher = dispatcher.clone();
                thread::Builder::new()
                    .name(format!("worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        for play in 0..cli.plays {
                            let params = VoiceParams {
                                pan: (play as f32 * 0.37).sin(),
                                volume: 0.5,
                                ..VoiceParams::default()
                            };
                            if engine.play(sound.clone(), params).is_none() {
                                dropped.fetch_add(1, Ordering::Relaxed);
                            }

                            let buffer = engine.native_resource(worker * 1_000 + play, free_native_buffer);
                            drop(buffer);

                            if play % 8 == 0 {
                                let owner = dispatcher.run_blocking(|| thread::current().name().map(str::to_owned));
                                log::debug!("worker-{worker} reached owner thread {owner:?}.");
                            }
                            thread::sleep(tick / 2);
                        }
                    })
            })
            .collect::<Result<_, _>>()?;

        while workers.iter().any(|worker| !worker.is_finished()) {
            let report = engine.tick()?;
            if report.faulted > 0 {
                log::warn!("{} deferred calls panicked this tick.", report.faulted);
            }
            if stream.is_none() {
                if let Some(mixer) = engine.mixer() {
                    mixer.mix(&mut headless_buffer, &stream_info);
                }
            }
            thread::sleep(tick);
        }
        anyhow::Ok(())
    })?;

    // Let the tail of the last sounds ring out and be reclaimed.
    while engine.scheduler().playing_count() > 0 {
        engine.tick()?;
        if stream.is_none() {
            if let Some(mixer) = engine.mixer() {
                mixer.mix(&mut headless_buffer, &stream_info);
            }
        }
        thread::sleep(tick);
    }
    engine.tick()?;

    log::info!(
        "{} plays requested, {} dropped for lack of a voice, {} native buffers freed on the owner thread.",
        cli.workers * cli.plays,
        dropped.load(Ordering::Relaxed),
        BUFFERS_FREED.load(Ordering::Relaxed)
    );
    drop(stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tick_period_is_rejected() {
        assert!(Cli::try_parse_from(["soundboard", "--tick-ms", "0"]).is_err());
    }

    #[test]
    fn tick_period_defaults_to_sixteen_ms() {
        let cli = Cli::try_parse_from(["soundboard"]).unwrap();
        assert_eq!(cli.tick_ms, 16);
        assert!(!cli.device);
    }
}
