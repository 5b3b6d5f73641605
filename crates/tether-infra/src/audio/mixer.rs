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

//! A software voice bank that mixes every playing voice into one output buffer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tether_core::audio::{SoundData, StreamInfo, VoiceBackend, VoiceHandle, VoiceParams, VoiceStatus};

/// Where the listener stands, for voices that carry a world position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    /// World-space position.
    pub position: [f32; 3],
    /// Unit vector pointing to the listener's right.
    pub right: [f32; 3],
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            right: [1.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug)]
struct MixerVoice {
    sample: Option<Arc<SoundData>>,
    params: VoiceParams,
    /// Position in source frames.
    cursor: f64,
    status: VoiceStatus,
}

impl Default for MixerVoice {
    fn default() -> Self {
        Self {
            sample: None,
            params: VoiceParams::default(),
            cursor: 0.0,
            status: VoiceStatus::Stopped,
        }
    }
}

impl MixerVoice {

    /// Left and right gains from the voice's own pan or, when it has a
    /// position, from where it sits relative to the listener.
    fn gains(&self, listener: &Listener) -> (f32, f32) {
        let mut volume = self.params.volume;
        let mut pan = (self.params.pan + 1.0) * 0.5;

        if let Some(position) = self.params.position {
            let to_source = sub(position, listener.position);
            let distance = length(to_source);

            volume *= 1.0 / (1.0 + distance * distance);
            if distance > 0.001 {
                let direction = to_source.map(|c| c / distance);
                pan = (dot(direction, listener.right) + 1.0) * 0.5;
            }
        }

        let pan = pan.clamp(0.0, 1.0);
        (volume * (1.0 - pan).sqrt(), volume * pan.sqrt())
    }
}

#[derive(Debug)]
struct MixerState {
    voices: Vec<MixerVoice>,
    listener: Listener,
}

/// A [`VoiceBackend`] whose voices are mixed in software.
///
/// The audio callback calls [`mix`](Self::mix); a voice that runs off the end
/// of its data without looping reports [`VoiceStatus::Stopped`] from then on,
/// which is what the scheduler's reconcile sweep looks for.
#[derive(Debug)]
pub struct MixerVoiceBank {
    state: Mutex<MixerState>,
}

impl MixerVoiceBank {
    /// Creates a bank with `voices` voices.
    pub fn new(voices: usize) -> Self {
        let voices = (0..voices).map(|_| MixerVoice::default()).collect();
        Self {
            state: Mutex::new(MixerState {
                voices,
                listener: Listener::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_voice(&self, voice: VoiceHandle, f: impl FnOnce(&mut MixerVoice)) {
        if let Some(slot) = self.lock().voices.get_mut(voice.index()) {
            f(slot);
        }
    }

    /// Moves the listener.
    pub fn set_listener(&self, listener: Listener) {
        self.lock().listener = listener;
    }

    /// The current listener.
    pub fn listener(&self) -> Listener {
        self.lock().listener
    }

    /// Mixes all playing voices into `output_buffer`, overwriting it.
    pub fn mix(&self, output_buffer: &mut [f32], stream_info: &StreamInfo) {
        output_buffer.fill(0.0);
        if stream_info.channels == 0 || stream_info.sample_rate == 0 {
            return;
        }

        let mut state = self.lock();
        let listener = state.listener;
        let out_channels = stream_info.channels as usize;
        let frames_to_write = output_buffer.len() / out_channels;

        for voice in state.voices.iter_mut() {
            if voice.status != VoiceStatus::Playing {
                continue;
            }
            let Some(sound) = voice.sample.clone() else {
                voice.status = VoiceStatus::Stopped;
                continue;
            };

            let channels = sound.channels as usize;
            let num_frames = sound.frames();
            if num_frames == 0 {
                voice.status = VoiceStatus::Stopped;
                continue;
            }

            let step = f64::from(sound.sample_rate) / f64::from(stream_info.sample_rate)
                * f64::from(voice.params.pitch);
            let (vol_l, vol_r) = voice.gains(&listener);

            for i in 0..frames_to_write {
                if voice.cursor >= num_frames as f64 {
                    if voice.params.looping {
                        voice.cursor %= num_frames as f64;
                    } else {
                        voice.cursor = 0.0;
                        voice.status = VoiceStatus::Stopped;
                        break;
                    }
                }

                let frame = voice.cursor.floor() as usize;
                let fract = voice.cursor.fract() as f32;
                let next = (frame + 1) % num_frames;

                // First channel only; multichannel sources are folded to mono before panning.
                let s1 = sound.samples[frame * channels];
                let s2 = sound.samples[next * channels];
                let sample = s1 + (s2 - s1) * fract;

                let out = i * out_channels;
                if out_channels >= 2 {
                    output_buffer[out] += sample * vol_l;
                    output_buffer[out + 1] += sample * vol_r;
                } else {
                    output_buffer[out] += sample * voice.params.volume;
                }

                voice.cursor += step;
            }
        }

        // Limiter
        for sample in output_buffer.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

impl VoiceBackend for MixerVoiceBank {
    fn voice_count(&self) -> usize {
        self.lock().voices.len()
    }

    fn bind(&self, voice: VoiceHandle, sample: Arc<SoundData>, params: &VoiceParams) {
        self.with_voice(voice, |slot| {
            slot.sample = Some(sample);
            slot.params = params.sanitized();
            slot.cursor = 0.0;
            slot.status = VoiceStatus::Stopped;
        });
    }

    fn unbind(&self, voice: VoiceHandle) {
        self.with_voice(voice, |slot| *slot = MixerVoice::default());
    }

    fn start(&self, voice: VoiceHandle) {
        self.with_voice(voice, |slot| {
            if slot.sample.is_some() {
                slot.status = VoiceStatus::Playing;
            }
        });
    }

    fn pause(&self, voice: VoiceHandle) {
        self.with_voice(voice, |slot| {
            if slot.status == VoiceStatus::Playing {
                slot.status = VoiceStatus::Paused;
            }
        });
    }

    fn stop(&self, voice: VoiceHandle) {
        self.with_voice(voice, |slot| {
            slot.status = VoiceStatus::Stopped;
            slot.cursor = 0.0;
        });
    }

    fn set_looping(&self, voice: VoiceHandle, looping: bool) {
        self.with_voice(voice, |slot| slot.params.looping = looping);
    }

    fn apply(&self, voice: VoiceHandle, params: &VoiceParams) {
        self.with_voice(voice, |slot| slot.params = params.sanitized());
    }

    fn status(&self, voice: VoiceHandle) -> VoiceStatus {
        self.lock()
            .voices
            .get(voice.index())
            .map_or(VoiceStatus::Stopped, |slot| slot.status)
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn length(v: [f32; 3]) -> f32 {
    dot(v, v).sqrt()
}
