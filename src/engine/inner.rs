//! State shared between the public handle, decode tasks and the device
//! callback. Everything here runs under one lock and never blocks.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{duration_or_zero, unit_level, EngineConfig};
use crate::dsp::analyser::bass_level;
use crate::dsp::sampler::SampleBuffer;
use crate::graph::{AudioContext, ParamKind};
use crate::synth::{self, SynthType};

use super::bus::{BusId, BusMixer};
use super::instance::{InstanceKind, InstanceState, InstanceTable, PlayOptions, PlaybackInstance};
use super::lifecycle::{EngineState, Lifecycle};
use super::loader::SampleLoader;
use super::pending::{PendingQueue, PendingRequest};
use super::registry::{Registration, SampleRef, SoundDescriptor, SoundRegistry};
use super::scheduler::{TeardownScheduler, TEARDOWN_SLACK};

/// Level reported for a bus that was never set and has no graph yet.
pub const UNSET_VOLUME: f64 = 0.5;

/// A sample start waiting on a decode.
#[derive(Debug, Clone)]
pub struct DeferredStart {
    pub instance_id: String,
    pub sound_id: String,
    pub source: SampleRef,
    pub descriptor: SoundDescriptor,
    pub options: PlayOptions,
    pub cancelled: Arc<AtomicBool>,
}

pub struct EngineCore {
    pub(crate) config: EngineConfig,
    lifecycle: Lifecycle,
    registry: SoundRegistry,
    loader: Arc<SampleLoader>,
    ctx: Option<AudioContext>,
    buses: Option<BusMixer>,
    instances: InstanceTable,
    pending: PendingQueue,
    teardown: TeardownScheduler,
    /// Buses the caller set before a graph existed.
    preset_levels: HashSet<BusId>,
    rng: StdRng,
}

impl EngineCore {
    pub fn new(config: EngineConfig, loader: Arc<SampleLoader>) -> Self {
        EngineCore {
            config,
            lifecycle: Lifecycle::new(),
            registry: SoundRegistry::new(),
            loader,
            ctx: None,
            buses: None,
            instances: InstanceTable::new(),
            pending: PendingQueue::new(),
            teardown: TeardownScheduler::new(),
            preset_levels: HashSet::new(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> EngineState {
        self.lifecycle.state()
    }

    pub fn registry(&self) -> &SoundRegistry {
        &self.registry
    }

    pub fn context(&self) -> Option<&AudioContext> {
        self.ctx.as_ref()
    }

    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn register(&mut self, id: &str, descriptor: SoundDescriptor) {
        if self.lifecycle.is_disposed() {
            tracing::debug!(id, "ignoring registration after dispose");
            return;
        }
        let source = descriptor.source.clone();
        match self.registry.register(id, descriptor) {
            Registration::Replaced { source_changed: true } => {
                tracing::debug!(id, "source changed, dropping cached audio");
                self.loader.track(id, &source);
            }
            Registration::Added | Registration::Replaced { source_changed: false } => {
                self.loader.track(id, &source);
            }
            Registration::Rejected => {}
        }
    }

    /// Build the context and bus graph at `sample_rate`. Returns deferred
    /// sample starts from the flushed queue.
    pub fn build_graph(&mut self, sample_rate: f64) -> Vec<DeferredStart> {
        let mut ctx = AudioContext::new(sample_rate, self.config.block_size);
        let mut buses = BusMixer::build(&mut ctx, &self.config.bus_levels, self.config.analyser);
        if self.lifecycle.is_muted() {
            buses.set_muted(&mut ctx, true);
        }
        self.ctx = Some(ctx);
        self.buses = Some(buses);
        tracing::info!(sample_rate, "audio graph ready");
        if self.lifecycle.init_succeeded() { self.flush() } else { Vec::new() }
    }

    pub fn init_failed(&mut self, reason: &str) {
        tracing::error!(reason, "audio platform unavailable, engine stays silent");
        self.lifecycle.init_failed();
    }

    pub fn play(
        &mut self,
        sound_id: &str,
        options: PlayOptions,
    ) -> (String, Option<DeferredStart>) {
        let instance_id = options
            .instance_id
            .clone()
            .unwrap_or_else(|| self.instances.next_id(sound_id));
        if self.lifecycle.is_disposed() {
            return (instance_id, None);
        }
        let Some(descriptor) = self.registry.get(sound_id).cloned() else {
            tracing::warn!(sound_id, "play of unregistered sound ignored");
            return (instance_id, None);
        };
        if !self.lifecycle.accepts_playback() {
            self.pending.push(PendingRequest::Sample {
                sound_id: sound_id.to_string(),
                descriptor,
                instance_id: instance_id.clone(),
                options,
            });
            return (instance_id, None);
        }
        let deferred = self.start_sample(&instance_id, sound_id, descriptor, options);
        (instance_id, deferred)
    }

    fn start_sample(
        &mut self,
        instance_id: &str,
        sound_id: &str,
        descriptor: SoundDescriptor,
        options: PlayOptions,
    ) -> Option<DeferredStart> {
        self.replace_existing(instance_id);
        if let Some(buffer) = self.loader.cached(sound_id) {
            self.spawn_sample(instance_id, sound_id, &descriptor, &options, buffer);
            return None;
        }
        if self.loader.is_settled(sound_id) {
            tracing::debug!(sound_id, "sample failed to load earlier, not playing");
            return None;
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        self.instances.insert(PlaybackInstance::loading(
            instance_id.to_string(),
            sound_id.to_string(),
            Arc::clone(&cancelled),
        ));
        Some(DeferredStart {
            instance_id: instance_id.to_string(),
            sound_id: sound_id.to_string(),
            source: descriptor.source.clone(),
            descriptor,
            options,
            cancelled,
        })
    }

    /// A decode finished. Starts the instance unless it was stopped (or the
    /// engine disposed) in the meantime.
    pub fn finish_deferred(&mut self, start: DeferredStart, buffer: Option<Arc<SampleBuffer>>) {
        let still_wanted = match self.instances.get(&start.instance_id).map(|i| &i.state) {
            Some(InstanceState::Loading { cancelled }) => {
                Arc::ptr_eq(cancelled, &start.cancelled) && !cancelled.load(Ordering::Acquire)
            }
            _ => false,
        };
        if !still_wanted || self.lifecycle.is_disposed() {
            tracing::debug!(instance = %start.instance_id, "stopped before audio started");
            return;
        }
        self.instances.remove(&start.instance_id);
        match buffer {
            Some(buffer) => self.spawn_sample(
                &start.instance_id,
                &start.sound_id,
                &start.descriptor,
                &start.options,
                buffer,
            ),
            None => {
                tracing::debug!(instance = %start.instance_id, "no audio, dropping instance")
            }
        }
    }

    /// Abandon a deferred start that could not be scheduled.
    pub fn abandon(&mut self, instance_id: &str) {
        if self.instances.get(instance_id).is_some_and(PlaybackInstance::is_loading) {
            self.instances.remove(instance_id);
        }
    }

    fn spawn_sample(
        &mut self,
        instance_id: &str,
        sound_id: &str,
        descriptor: &SoundDescriptor,
        options: &PlayOptions,
        buffer: Arc<SampleBuffer>,
    ) {
        let (Some(ctx), Some(buses)) = (self.ctx.as_mut(), self.buses.as_ref()) else {
            return;
        };
        let now = ctx.current_time();
        let scale = options.volume.map_or(Some(1.0), unit_level).unwrap_or_else(|| {
            tracing::warn!(instance = instance_id, "ignoring NaN play volume");
            1.0
        });
        let level = descriptor.default_volume * scale;

        let source = ctx.create_buffer_source(buffer, descriptor.looping);
        let gain = ctx.create_gain(level);
        if let Some(fade) = options.fade_in.map(duration_or_zero).filter(|f| *f > 0.0) {
            if let Some(param) = ctx.param_mut(gain, ParamKind::Gain) {
                param.set_value_at_time(0.0, now);
                param.linear_ramp_to_value_at_time(level, now + fade);
            }
        }
        ctx.connect(source, gain);
        ctx.connect(gain, buses.node(descriptor.bus));
        ctx.start(source, now);

        tracing::debug!(instance = instance_id, sound_id, bus = %descriptor.bus, "sample started");
        self.instances.insert(PlaybackInstance::playing(
            instance_id.to_string(),
            sound_id.to_string(),
            InstanceKind::Sample,
            gain,
            vec![source],
            now,
        ));
    }

    pub fn play_synth(
        &mut self,
        synth: SynthType,
        volume: f64,
        instance_id: Option<String>,
    ) -> String {
        let instance_id = instance_id.unwrap_or_else(|| self.instances.next_id(synth.name()));
        if self.lifecycle.is_disposed() {
            return instance_id;
        }
        if !self.lifecycle.accepts_playback() {
            self.pending.push(PendingRequest::Synth {
                synth,
                volume,
                instance_id: instance_id.clone(),
            });
            return instance_id;
        }
        self.start_synth(&instance_id, synth, volume);
        instance_id
    }

    fn start_synth(&mut self, instance_id: &str, synth: SynthType, volume: f64) {
        self.replace_existing(instance_id);
        let (Some(ctx), Some(buses)) = (self.ctx.as_mut(), self.buses.as_ref()) else {
            return;
        };
        let now = ctx.current_time();
        let gain = ctx.create_gain(1.0);
        ctx.connect(gain, buses.node(synth.bus()));
        let sources = synth::generate(synth, ctx, gain, now, volume, &mut self.rng);
        if sources.is_empty() {
            ctx.remove(gain);
            return;
        }
        tracing::debug!(instance = instance_id, %synth, sources = sources.len(), "synth started");
        self.instances.insert(PlaybackInstance::playing(
            instance_id.to_string(),
            synth.name().to_string(),
            InstanceKind::Synth(synth),
            gain,
            sources,
            now,
        ));
    }

    /// Fade out and schedule teardown. Unknown ids are ignored.
    ///
    /// Fades and teardown deadlines run on the render clock, so a stop issued
    /// while suspended leaves the instance playing (and `is_playing` true)
    /// until the engine resumes and renders past the fade.
    pub fn stop(&mut self, instance_id: &str, fade: f64) {
        if self.pending.cancel(instance_id) {
            tracing::debug!(instance = instance_id, "dropped queued request");
            return;
        }
        let Some(instance) = self.instances.get_mut(instance_id) else {
            return;
        };
        match &instance.state {
            InstanceState::Loading { cancelled } => {
                cancelled.store(true, Ordering::Release);
                self.instances.remove(instance_id);
                return;
            }
            InstanceState::Stopping => return,
            InstanceState::Playing => {}
        }

        let fade = duration_or_zero(fade);
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        if fade == 0.0 {
            self.teardown_instance(instance_id);
            return;
        }
        let now = ctx.current_time();
        if let Some(param) = instance.gain.and_then(|g| ctx.param_mut(g, ParamKind::Gain)) {
            param.cancel_and_hold_at_time(now);
            param.linear_ramp_to_value_at_time(0.0, now + fade);
        }
        instance.state = InstanceState::Stopping;
        self.teardown.schedule(instance_id, now + fade + TEARDOWN_SLACK);
    }

    pub fn stop_all(&mut self, prefix: &str, fade: f64) {
        self.pending.cancel_prefix(prefix);
        for id in self.instances.ids_with_prefix(prefix) {
            self.stop(&id, fade);
        }
    }

    /// Stop every live instance of `synth`.
    pub fn stop_synth(&mut self, synth: SynthType, fade: f64) {
        for id in self.instances.ids_of_kind(InstanceKind::Synth(synth)) {
            self.stop(&id, fade);
        }
        self.pending.cancel_synth(synth);
    }

    pub fn is_playing(&self, prefix: &str) -> bool {
        self.instances.any_with_prefix(prefix)
    }

    /// A caller reused a live instance id; the old playback goes away.
    fn replace_existing(&mut self, instance_id: &str) {
        if self.instances.get(instance_id).is_some() {
            tracing::debug!(instance = instance_id, "instance id reused, replacing");
            self.teardown_instance(instance_id);
        }
    }

    /// Release an instance's nodes now. Idempotent.
    fn teardown_instance(&mut self, instance_id: &str) {
        self.teardown.cancel(instance_id);
        let Some(instance) = self.instances.remove(instance_id) else {
            return;
        };
        if let InstanceState::Loading { cancelled } = &instance.state {
            cancelled.store(true, Ordering::Release);
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let now = ctx.current_time();
        for &source in &instance.sources {
            ctx.stop(source, now);
            ctx.remove(source);
        }
        if let Some(gain) = instance.gain {
            ctx.remove(gain);
        }
        tracing::debug!(instance = instance_id, "instance torn down");
    }

    pub fn set_volume(&mut self, bus: BusId, value: f64, ramp: f64) {
        if value.is_nan() {
            tracing::warn!(%bus, "ignoring NaN volume");
            return;
        }
        match (self.ctx.as_mut(), self.buses.as_ref()) {
            (Some(ctx), Some(buses)) => buses.set_volume(ctx, bus, value, ramp),
            _ if self.lifecycle.is_disposed() => {}
            _ => {
                self.config.bus_levels.set(bus, value);
                self.preset_levels.insert(bus);
            }
        }
    }

    pub fn get_volume(&self, bus: BusId) -> f64 {
        match (self.ctx.as_ref(), self.buses.as_ref()) {
            (Some(ctx), Some(buses)) => buses.volume(ctx, bus),
            _ if self.preset_levels.contains(&bus) => self.config.bus_levels.get(bus),
            _ => UNSET_VOLUME,
        }
    }

    pub fn target_volume(&self, bus: BusId) -> f64 {
        match (self.ctx.as_ref(), self.buses.as_ref()) {
            (Some(ctx), Some(buses)) => buses.target_volume(ctx, bus),
            _ => self.get_volume(bus),
        }
    }

    /// Returns deferred starts when unmuting flushed the queue.
    pub fn mute(&mut self, muted: bool) -> Vec<DeferredStart> {
        if self.lifecycle.is_disposed() {
            return Vec::new();
        }
        let flush = self.lifecycle.set_muted(muted);
        if let (Some(ctx), Some(buses)) = (self.ctx.as_mut(), self.buses.as_mut()) {
            buses.set_muted(ctx, muted);
        }
        tracing::debug!(muted, "mute changed");
        if flush { self.flush() } else { Vec::new() }
    }

    pub fn is_muted(&self) -> bool {
        self.lifecycle.is_muted()
    }

    pub fn suspend(&mut self) {
        if self.lifecycle.suspend() {
            if let Some(ctx) = self.ctx.as_mut() {
                ctx.suspend();
            }
            tracing::debug!("engine suspended");
        }
    }

    pub fn resume(&mut self) -> Vec<DeferredStart> {
        if !self.lifecycle.resume() {
            return Vec::new();
        }
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.resume();
        }
        tracing::debug!("engine resumed");
        if self.lifecycle.accepts_playback() { self.flush() } else { Vec::new() }
    }

    /// Replay queued requests in order, each exactly once.
    fn flush(&mut self) -> Vec<DeferredStart> {
        let requests = self.pending.drain();
        if !requests.is_empty() {
            tracing::debug!(count = requests.len(), "flushing queued playback");
        }
        let mut deferred = Vec::new();
        for request in requests {
            match request {
                PendingRequest::Sample {
                    sound_id,
                    descriptor,
                    instance_id,
                    options,
                } => {
                    deferred.extend(self.start_sample(&instance_id, &sound_id, descriptor, options))
                }
                PendingRequest::Synth {
                    synth,
                    volume,
                    instance_id,
                } => self.start_synth(&instance_id, synth, volume),
            }
        }
        deferred
    }

    pub fn frequency_data(&mut self) -> Option<Vec<u8>> {
        let (ctx, buses) = (self.ctx.as_mut()?, self.buses.as_ref()?);
        ctx.analyser_mut(buses.analyser()).map(|a| a.byte_frequency_data())
    }

    pub fn bass_level(&mut self) -> f64 {
        self.frequency_data().map_or(0.0, |data| bass_level(&data))
    }

    pub fn current_time(&self) -> f64 {
        self.ctx.as_ref().map_or(0.0, AudioContext::current_time)
    }

    /// Fill an interleaved buffer. Instance bookkeeping runs after every
    /// block so natural ends and due teardowns land on block boundaries.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let Some(block) = self.ctx.as_ref().map(|c| c.block_size() * channels) else {
            out.fill(0.0);
            return;
        };
        for chunk in out.chunks_mut(block) {
            if let Some(ctx) = self.ctx.as_mut() {
                ctx.render(chunk, channels);
            } else {
                chunk.fill(0.0);
            }
            self.after_block();
        }
    }

    fn after_block(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let ended = ctx.take_ended();
        let now = ctx.current_time();
        for source in ended {
            if let Some(id) = self.instances.source_ended(source) {
                self.teardown.cancel(&id);
                tracing::debug!(instance = %id, "instance finished");
            }
        }
        for id in self.teardown.take_due(now) {
            self.teardown_instance(&id);
        }
    }

    /// Tear everything down. Terminal and idempotent.
    pub fn dispose(&mut self) {
        if !self.lifecycle.dispose() {
            return;
        }
        for id in self.instances.ids() {
            self.teardown_instance(&id);
        }
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.close();
        }
        self.ctx = None;
        self.buses = None;
        self.pending.clear();
        self.teardown.clear();
        self.registry.clear();
        self.loader.clear();
        tracing::info!("audio engine disposed");
    }
}
