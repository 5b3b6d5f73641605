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

//! Defines `Engine`, the context object tying the subsystems together.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tether_audio::{InstancePool, PlaybackHandle, ReconcileLoop, SoundInstance, VoiceScheduler};
use tether_core::audio::{AudioDevice, AudioStream, SoundData, StreamInfo, VoiceBackend, VoiceParams};
use tether_core::dispatch::{DrainReport, NativeResource};
use tether_core::{DispatchError, EngineConfig, OwnerThreadDispatcher};
use tether_infra::MixerVoiceBank;

/// Configures and builds an [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    backend: Option<Arc<dyn VoiceBackend>>,
    reconcile_thread: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Starts from [`EngineConfig::default`].
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            backend: None,
            reconcile_thread: true,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Drives a custom voice backend instead of the built-in software mixer.
    pub fn backend(mut self, backend: Arc<dyn VoiceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Skips the background reconcile thread; call
    /// [`Engine::reconcile`] yourself.
    pub fn manual_reconcile(mut self) -> Self {
        self.reconcile_thread = false;
        self
    }

    /// Builds the engine. The calling thread becomes the dispatcher's owner.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;
        let config = self.config;

        let (backend, mixer) = match self.backend {
            Some(backend) => (backend, None),
            None => {
                let mixer = Arc::new(MixerVoiceBank::new(config.voices));
                (mixer.clone() as Arc<dyn VoiceBackend>, Some(mixer))
            }
        };

        let dispatcher = Arc::new(OwnerThreadDispatcher::with_capture_warm(
            config.capture_pool_warm,
        ));
        let scheduler = Arc::new(VoiceScheduler::new(backend, config.voices));
        let instances = InstancePool::new(config.instance_pool_warm);
        let reconcile = if self.reconcile_thread {
            Some(ReconcileLoop::spawn(scheduler.clone(), config.reconcile_interval())?)
        } else {
            None
        };

        log::info!(
            "Engine ready: {} voices, {} pooled instances, reconcile {}.",
            scheduler.capacity(),
            config.instance_pool_warm,
            if reconcile.is_some() { "threaded" } else { "manual" }
        );

        Ok(Engine {
            config,
            dispatcher,
            scheduler,
            instances,
            mixer,
            reconcile,
        })
    }
}

/// The running engine.
///
/// Dropping it stops the reconcile thread, silences every voice, runs any
/// work still queued for the owner thread, and logs a telemetry summary.
pub struct Engine {
    config: EngineConfig,
    dispatcher: Arc<OwnerThreadDispatcher>,
    scheduler: Arc<VoiceScheduler>,
    instances: InstancePool,
    mixer: Option<Arc<MixerVoiceBank>>,
    reconcile: Option<ReconcileLoop>,
}

impl Engine {
    /// Builds an engine from `config` with the default software mixer.
    pub fn new(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new().config(config).build()
    }

    /// Returns a builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The settings the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The owner-thread dispatcher.
    pub fn dispatcher(&self) -> &Arc<OwnerThreadDispatcher> {
        &self.dispatcher
    }

    /// The voice scheduler.
    pub fn scheduler(&self) -> &Arc<VoiceScheduler> {
        &self.scheduler
    }

    /// The sound instance pool.
    pub fn instances(&self) -> &InstancePool {
        &self.instances
    }

    /// The built-in software mixer, unless a custom backend was supplied.
    pub fn mixer(&self) -> Option<&Arc<MixerVoiceBank>> {
        self.mixer.as_ref()
    }

    /// Runs one frame of owner-thread work. Call it once per tick from the
    /// thread that built the engine.
    pub fn tick(&self) -> Result<DrainReport, DispatchError> {
        self.dispatcher.drain()
    }

    /// Runs one reconcile sweep now. Returns the number of voices reclaimed.
    pub fn reconcile(&self) -> usize {
        self.scheduler.reconcile_tick()
    }

    /// Fire-and-forget playback of `sample` with `params`.
    ///
    /// The instance comes from the pool and returns to it on its own when the
    /// sound ends. Returns `None` when every voice is busy; the sound is
    /// dropped.
    pub fn play(&self, sample: Arc<SoundData>, params: VoiceParams) -> Option<PlaybackHandle> {
        let instance = self.instances.acquire(sample);
        instance.set_params(params);
        // Read before starting: a short sound can finish and be reused before
        // `start_playback` returns.
        let generation = instance.generation();
        if self.scheduler.start_playback(&instance) {
            Some(PlaybackHandle::for_generation(
                instance,
                generation,
                self.scheduler.clone(),
            ))
        } else {
            self.instances.release(&instance);
            None
        }
    }

    /// Creates a standalone instance the caller keeps and may replay.
    pub fn create_instance(&self, sample: Arc<SoundData>) -> Arc<SoundInstance> {
        SoundInstance::new(sample)
    }

    /// Starts or resumes a caller-held instance. `None` when no voice is free.
    pub fn start(&self, instance: &Arc<SoundInstance>) -> Option<PlaybackHandle> {
        let generation = instance.generation();
        self.scheduler.start_playback(instance).then(|| {
            PlaybackHandle::for_generation(instance.clone(), generation, self.scheduler.clone())
        })
    }

    /// Wraps a native handle so it is deleted on the owner thread.
    pub fn native_resource<H: Send + 'static>(&self, handle: H, delete: fn(H)) -> NativeResource<H> {
        NativeResource::new(handle, delete, self.dispatcher.clone())
    }

    /// Opens `device` and feeds it from the software mixer.
    ///
    /// Fails when the engine was built around a custom backend, since there is
    /// nothing in-process to mix.
    pub fn start_output(&self, device: Box<dyn AudioDevice>) -> Result<AudioStream> {
        let mixer = self
            .mixer
            .clone()
            .ok_or_else(|| anyhow!("engine has no software mixer to feed an output device"))?;
        device.start(Box::new(move |buffer: &mut [f32], info: &StreamInfo| {
            mixer.mix(buffer, info)
        }))
    }

    /// Logs the dispatcher and voice counters.
    pub fn log_telemetry_summary(&self) {
        let dispatch = self.dispatcher.stats();
        let voices = self.scheduler.stats();

        log::info!("--- Telemetry Summary ---");
        log::info!(
            "  Dispatch: {} enqueued, {} executed, {} faulted, {} blocking, {} inline",
            dispatch.enqueued,
            dispatch.executed,
            dispatch.faulted,
            dispatch.blocking_calls,
            dispatch.inline_calls
        );
        log::info!(
            "  Voices: {} acquired, {} released, {} reclaimed, {} dropped (exhausted)",
            voices.acquired,
            voices.released,
            voices.reclaimed,
            voices.exhausted
        );
        log::info!(
            "  Instances: {} created, {} idle",
            self.instances.created(),
            self.instances.idle()
        );
        log::info!("-------------------------");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        log::info!("Engine is being dropped. Performing controlled shutdown...");

        if let Some(mut reconcile) = self.reconcile.take() {
            reconcile.shutdown();
        }
        self.scheduler.stop_all();

        if self.dispatcher.is_owner_thread() {
            if let Err(err) = self.dispatcher.drain() {
                log::warn!("Final drain failed: {err}");
            }
        } else {
            log::warn!(
                "Engine dropped off its owner thread; {} queued calls will not run.",
                self.dispatcher.pending()
            );
        }

        self.log_telemetry_summary();
        log::info!("Engine shutdown complete.");
    }
}
