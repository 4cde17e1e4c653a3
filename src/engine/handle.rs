//! `AudioEngine`: the public handle.
//!
//! Nothing on `AudioEngine` returns an error or panics once it is built.
//! Unknown sounds, failed decodes, calls before `init` and calls after
//! `dispose` all degrade to logged no-ops.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::EngineConfig;
use crate::error::AudioError;
use crate::synth::SynthType;

use super::backend::{self, Backend};
use super::inner::{DeferredStart, EngineCore};
use super::loader::SampleLoader;
use super::{BusId, EngineState, PlayOptions, SampleRef, SoundDescriptor};

/// Fade used by the companion stops of looping synths.
pub const LOOP_FADE: f64 = 0.3;

/// Where decode tasks run: the caller's runtime if there is one, otherwise
/// a small runtime owned by the engine.
enum TaskRuntime {
    Shared(Handle),
    Owned(Runtime),
}

impl TaskRuntime {
    fn capture() -> Option<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Some(TaskRuntime::Shared(handle));
        }
        match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("casino-audio-io")
            .enable_all()
            .build()
        {
            Ok(runtime) => Some(TaskRuntime::Owned(runtime)),
            Err(e) => {
                tracing::warn!("no async runtime for sample loading: {e}");
                None
            }
        }
    }

    fn handle(&self) -> &Handle {
        match self {
            TaskRuntime::Shared(handle) => handle,
            TaskRuntime::Owned(runtime) => runtime.handle(),
        }
    }
}

pub struct AudioEngine {
    core: Arc<Mutex<EngineCore>>,
    loader: Arc<SampleLoader>,
    config: EngineConfig,
    /// Also serialises `init`.
    backend: Mutex<Option<Backend>>,
    runtime: Option<TaskRuntime>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("state", &self.state())
            .field("backend", &*self.backend.lock())
            .finish_non_exhaustive()
    }
}

impl AudioEngine {
    pub fn new(config: EngineConfig) -> Result<Self, AudioError> {
        config.validate()?;
        let loader = Arc::new(SampleLoader::new());
        let core = EngineCore::new(config.clone(), Arc::clone(&loader));
        Ok(AudioEngine {
            core: Arc::new(Mutex::new(core)),
            loader,
            config,
            backend: Mutex::new(None),
            runtime: TaskRuntime::capture(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Headless engine pulled through `render`.
    pub fn offline(sample_rate: u32) -> Result<Self, AudioError> {
        AudioEngine::new(EngineConfig::offline(sample_rate))
    }

    /// Make procedural noise reproducible.
    pub fn seed_noise(&self, seed: u64) {
        self.core.lock().seed_rng(seed);
    }

    pub fn register(&self, id: &str, descriptor: SoundDescriptor) {
        self.core.lock().register(id, descriptor);
    }

    pub fn register_all<I, S>(&self, sounds: I)
    where
        I: IntoIterator<Item = (S, SoundDescriptor)>,
        S: AsRef<str>,
    {
        let mut core = self.core.lock();
        for (id, descriptor) in sounds {
            core.register(id.as_ref(), descriptor);
        }
    }

    /// Open the output and build the bus graph, then flush anything queued.
    /// Safe to call repeatedly; a platform failure is permanent.
    pub fn init(&self) -> EngineState {
        let mut slot = self.backend.lock();
        if !self.core.lock().lifecycle().can_init() {
            return self.state();
        }
        match backend::open(&self.config, &self.core) {
            Ok((opened, sample_rate)) => {
                *slot = Some(opened);
                let deferred = self.core.lock().build_graph(sample_rate);
                self.spawn_deferred(deferred);
            }
            Err(e) => self.core.lock().init_failed(&e.to_string()),
        }
        self.state()
    }

    /// Play a registered sound. The id comes back immediately, whether the
    /// sound started, is decoding, or was queued.
    pub fn play(&self, id: &str) -> String {
        self.play_with(id, PlayOptions::default())
    }

    pub fn play_with(&self, id: &str, options: PlayOptions) -> String {
        let (instance_id, deferred) = self.core.lock().play(id, options);
        self.spawn_deferred(deferred.into_iter().collect());
        instance_id
    }

    fn spawn_deferred(&self, starts: Vec<DeferredStart>) {
        if starts.is_empty() {
            return;
        }
        let Some(handle) = self.runtime.as_ref().map(TaskRuntime::handle) else {
            let mut core = self.core.lock();
            for start in starts {
                core.abandon(&start.instance_id);
            }
            return;
        };
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        for start in starts {
            let core = Arc::clone(&self.core);
            let loader = Arc::clone(&self.loader);
            tasks.push(handle.spawn(async move {
                let buffer = loader.load(&start.sound_id, &start.source).await;
                core.lock().finish_deferred(start, buffer);
            }));
        }
    }

    /// Wait until every decode started so far has settled and its instance
    /// has either started or been dropped.
    pub async fn wait_for_loads(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        tracing::warn!("sample start task failed: {e}");
                    }
                }
            }
        }
    }

    /// Fade out over the configured default. While suspended the fade waits
    /// for `resume`, see [`AudioEngine::stop_with_fade`].
    pub fn stop(&self, instance_id: &str) {
        self.stop_with_fade(instance_id, self.config.default_fade);
    }

    /// Fade out over `fade` seconds, then release the instance. The fade runs
    /// on the audio clock: a stop issued while suspended keeps `is_playing`
    /// true until the engine resumes and renders past it.
    pub fn stop_with_fade(&self, instance_id: &str, fade: f64) {
        self.core.lock().stop(instance_id, fade);
    }

    /// Stop every instance whose id starts with `prefix`.
    pub fn stop_all(&self, prefix: &str) {
        self.stop_all_with_fade(prefix, self.config.default_fade);
    }

    pub fn stop_all_with_fade(&self, prefix: &str, fade: f64) {
        self.core.lock().stop_all(prefix, fade);
    }

    pub fn is_playing(&self, prefix: &str) -> bool {
        self.core.lock().is_playing(prefix)
    }

    pub fn set_volume(&self, bus: BusId, value: f64) {
        self.set_volume_with_ramp(bus, value, self.config.default_ramp);
    }

    pub fn set_volume_with_ramp(&self, bus: BusId, value: f64, ramp: f64) {
        self.core.lock().set_volume(bus, value, ramp);
    }

    /// Current gain, mid-ramp included.
    pub fn get_volume(&self, bus: BusId) -> f64 {
        self.core.lock().get_volume(bus)
    }

    /// Gain once scheduled ramps complete.
    pub fn target_volume(&self, bus: BusId) -> f64 {
        self.core.lock().target_volume(bus)
    }

    pub fn mute(&self, muted: bool) {
        let deferred = self.core.lock().mute(muted);
        self.spawn_deferred(deferred);
    }

    pub fn is_muted(&self) -> bool {
        self.core.lock().is_muted()
    }

    pub fn play_synth(&self, synth: SynthType, volume: f64) -> String {
        self.core.lock().play_synth(synth, volume, None)
    }

    /// By name, e.g. `"leverPull"`. Unknown names are logged and ignored.
    pub fn play_synth_named(&self, name: &str, volume: f64) -> Option<String> {
        match name.parse::<SynthType>() {
            Ok(synth) => Some(self.play_synth(synth, volume)),
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        }
    }

    pub fn stop_synth(&self, synth: SynthType, fade: f64) {
        self.core.lock().stop_synth(synth, fade);
    }

    pub fn stop_spin_mech(&self) {
        self.stop_synth(SynthType::SpinMech, LOOP_FADE);
    }

    pub fn stop_reel_spin(&self) {
        self.stop_synth(SynthType::ReelSpin, LOOP_FADE);
    }

    /// Byte spectrum of the music bus; `None` until the graph exists.
    pub fn get_frequency_data(&self) -> Option<Vec<u8>> {
        self.core.lock().frequency_data()
    }

    /// Mean of the lowest bins, in [0, 1].
    pub fn get_bass_level(&self) -> f64 {
        self.core.lock().bass_level()
    }

    /// Fetch and decode ahead of time. Settles when every load has either
    /// succeeded or failed.
    pub async fn preload<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sources: Vec<(String, SampleRef)> = {
            let core = self.core.lock();
            ids.into_iter()
                .filter_map(|id| {
                    let id = id.as_ref();
                    match core.registry().get(id) {
                        Some(descriptor) => Some((id.to_string(), descriptor.source.clone())),
                        None => {
                            tracing::warn!(id, "preload of unregistered sound ignored");
                            None
                        }
                    }
                })
                .collect()
        };
        let Some(handle) = self.runtime.as_ref().map(TaskRuntime::handle) else {
            return;
        };

        let total = sources.len();
        let mut set = JoinSet::new();
        for (id, source) in sources {
            let loader = Arc::clone(&self.loader);
            set.spawn_on(async move { loader.load(&id, &source).await.is_some() }, handle);
        }
        let mut loaded = 0;
        while let Some(result) = set.join_next().await {
            if matches!(result, Ok(true)) {
                loaded += 1;
            }
        }
        tracing::debug!(loaded, total, "preload settled");
    }

    pub fn suspend(&self) {
        self.core.lock().suspend();
    }

    pub fn resume(&self) {
        let deferred = self.core.lock().resume();
        self.spawn_deferred(deferred);
    }

    /// Stop everything, close the graph and drop caches. Terminal.
    pub fn dispose(&self) {
        self.core.lock().dispose();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.backend.lock().take();
    }

    /// Pull `frames` mono frames from an offline engine.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render_into(&mut out, 1);
        out
    }

    /// Fill an interleaved buffer with `channels` channels.
    pub fn render_into(&self, out: &mut [f32], channels: usize) {
        self.core.lock().render(out, channels);
    }

    pub fn state(&self) -> EngineState {
        self.core.lock().state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Ids of every tracked instance, sorted.
    pub fn active_instances(&self) -> Vec<String> {
        let mut ids = self.core.lock().instances().ids();
        ids.sort();
        ids
    }

    pub fn pending_len(&self) -> usize {
        self.core.lock().pending_len()
    }

    /// Audio clock in seconds; 0 before init.
    pub fn current_time(&self) -> f64 {
        self.core.lock().current_time()
    }

    /// Source nodes ever created by the graph.
    pub fn created_sources(&self) -> usize {
        self.core.lock().context().map_or(0, |ctx| ctx.created_sources())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
        if let Some(TaskRuntime::Owned(runtime)) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::tests::inline_wav;

    const SR: u32 = 8000;

    fn engine() -> AudioEngine {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let engine = AudioEngine::offline(SR).unwrap();
        engine.seed_noise(3);
        engine
    }

    fn lounge() -> SoundDescriptor {
        SoundDescriptor::new(inline_wav(SR as usize, SR, 8000), BusId::Music).looping(true)
    }

    /// 50 ms one-shot.
    fn blip() -> SoundDescriptor {
        SoundDescriptor::new(inline_wav(400, SR, 8000), BusId::Sfx)
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    fn node_count(engine: &AudioEngine) -> usize {
        engine.core.lock().context().map_or(0, |ctx| ctx.node_count())
    }

    #[tokio::test]
    async fn lounge_queued_before_init_plays_once() {
        let engine = engine();
        engine.register("lounge", lounge());

        let id = engine.play("lounge");
        assert!(id.starts_with("lounge-"));
        assert_eq!(engine.pending_len(), 1);
        assert_eq!(peak(&engine.render(800)), 0.0);

        assert_eq!(engine.init(), EngineState::Ready);
        assert_eq!(engine.pending_len(), 0);
        assert!(engine.is_playing("lounge"));
        engine.wait_for_loads().await;

        assert!(engine.is_playing("lounge"));
        assert_eq!(engine.active_instances(), vec![id]);
        assert!(peak(&engine.render(1600)) > 0.05);
        assert_eq!(engine.created_sources(), 1);
    }

    #[tokio::test]
    async fn queued_requests_replay_exactly_once() {
        let engine = engine();
        engine.register("blip", blip());
        engine.play("blip");
        engine.play_synth(SynthType::Tick, 0.5);
        engine.init();
        engine.wait_for_loads().await;
        assert_eq!(engine.created_sources(), 2);

        engine.mute(true);
        engine.mute(false);
        engine.suspend();
        engine.resume();
        engine.wait_for_loads().await;
        assert_eq!(engine.created_sources(), 2);
    }

    #[tokio::test]
    async fn stop_before_decode_suppresses_start() {
        let engine = engine();
        engine.register("lounge", lounge());
        engine.init();
        let id = engine.play("lounge");
        engine.stop(&id);
        assert!(!engine.is_playing("lounge"));
        engine.wait_for_loads().await;
        assert!(!engine.is_playing("lounge"));
        assert_eq!(engine.created_sources(), 0);
        assert_eq!(peak(&engine.render(800)), 0.0);
    }

    #[tokio::test]
    async fn stop_while_queued_drops_request() {
        let engine = engine();
        engine.register("lounge", lounge());
        let id = engine.play("lounge");
        engine.stop(&id);
        assert_eq!(engine.pending_len(), 0);
        engine.init();
        engine.wait_for_loads().await;
        assert!(!engine.is_playing("lounge"));
    }

    #[tokio::test]
    async fn fade_then_teardown() {
        let engine = engine();
        engine.register("lounge", lounge());
        engine.init();
        let baseline = node_count(&engine);
        let id = engine.play("lounge");
        engine.wait_for_loads().await;
        engine.render(256);
        assert_eq!(node_count(&engine), baseline + 2);

        engine.stop(&id);
        // still fading
        assert!(engine.is_playing("lounge"));
        engine.render(400);
        assert!(engine.is_playing("lounge"));

        engine.render(1600);
        assert!(!engine.is_playing("lounge"));
        assert_eq!(node_count(&engine), baseline);
        // stale stop is a no-op
        engine.stop(&id);
        engine.stop("never-existed");
    }

    #[tokio::test]
    async fn sample_ending_inside_its_fade_tears_down_once() {
        let engine = engine();
        engine.register("blip", blip());
        engine.init();
        let baseline = node_count(&engine);
        let id = engine.play("blip");
        engine.wait_for_loads().await;
        engine.render(200);

        // 25 ms of audio left, 200 ms fade: the sample ends first
        engine.stop_with_fade(&id, 0.2);
        assert!(engine.is_playing("blip"));
        engine.render(400);
        assert!(!engine.is_playing("blip"));
        assert_eq!(node_count(&engine), baseline);

        // run well past fade + slack; the old deadline must not fire on anything
        engine.render(2400);
        assert!(!engine.is_playing("blip"));
        assert!(engine.active_instances().is_empty());
        assert_eq!(node_count(&engine), baseline);
        engine.stop(&id);
    }

    #[tokio::test]
    async fn reregistering_during_decode_keeps_the_new_source() {
        let engine = engine();
        engine.register("blip", blip());
        engine.init();
        engine.play("blip");
        // decode task is spawned but has not run yet
        engine.register("blip", SoundDescriptor::new(inline_wav(800, SR, 8000), BusId::Sfx));
        engine.wait_for_loads().await;
        assert!(engine.loader.cached("blip").is_none());

        engine.play("blip");
        engine.wait_for_loads().await;
        assert_eq!(engine.loader.cached("blip").map(|b| b.len()), Some(800));
    }

    #[tokio::test]
    async fn preload_of_a_replaced_source_does_not_stick() {
        let engine = engine();
        engine.register("blip", blip());
        let loader = Arc::clone(&engine.loader);
        let stale = blip().source;
        engine.register("blip", SoundDescriptor::new(inline_wav(800, SR, 8000), BusId::Sfx));
        loader.load("blip", &stale).await;
        assert!(engine.loader.cached("blip").is_none());

        engine.preload(["blip"]).await;
        assert_eq!(engine.loader.cached("blip").map(|b| b.len()), Some(800));
    }

    #[tokio::test]
    async fn natural_end_removes_instance() {
        let engine = engine();
        engine.register("blip", blip());
        engine.init();
        engine.play("blip");
        engine.wait_for_loads().await;
        assert!(engine.is_playing("blip"));
        engine.render(1600);
        assert!(!engine.is_playing("blip"));
        assert!(engine.active_instances().is_empty());
    }

    #[tokio::test]
    async fn stop_all_leaves_other_sounds() {
        let engine = engine();
        engine.register("lounge", lounge());
        engine.register("bar", lounge().volume(0.5));
        engine.init();
        engine.play("lounge");
        engine.play("lounge");
        let bar = engine.play("bar");
        engine.wait_for_loads().await;
        assert_eq!(engine.active_instances().len(), 3);

        engine.stop_all_with_fade("lounge", 0.0);
        assert!(!engine.is_playing("lounge"));
        assert_eq!(engine.active_instances(), vec![bar]);
    }

    #[tokio::test]
    async fn play_options_scale_and_fade_in() {
        let engine = engine();
        engine.register("lounge", lounge());
        engine.init();
        engine.play_with(
            "lounge",
            PlayOptions {
                instance_id: Some("lounge-intro".into()),
                volume: Some(0.5),
                fade_in: Some(0.5),
            },
        );
        engine.wait_for_loads().await;
        assert!(engine.is_playing("lounge-intro"));
        let early = peak(&engine.render(400));
        engine.render(4000);
        let settled = peak(&engine.render(400));
        assert!(early < settled * 0.5, "early {early} settled {settled}");
    }

    #[test]
    fn volume_is_clamped() {
        let engine = engine();
        engine.set_volume(BusId::Sfx, 2.0);
        assert_eq!(engine.get_volume(BusId::Sfx), 1.0);
        assert_eq!(engine.get_volume(BusId::Ui), 0.5);

        engine.init();
        assert_eq!(engine.get_volume(BusId::Sfx), 1.0);
        for (value, expected) in [(1.5, 1.0), (-0.5, 0.0), (0.25, 0.25)] {
            for bus in BusId::ALL {
                engine.set_volume(bus, value);
                assert_eq!(engine.target_volume(bus), expected);
            }
        }
    }

    #[tokio::test]
    async fn nan_inputs_never_reach_the_mix() {
        let engine = engine();
        engine.set_volume(BusId::Music, f64::NAN);
        assert_eq!(engine.get_volume(BusId::Music), 0.5);

        engine.register("lounge", lounge().volume(f64::NAN));
        engine.init();
        engine.set_volume_with_ramp(BusId::Master, 0.8, 0.0);
        engine.set_volume(BusId::Master, f64::NAN);
        assert_eq!(engine.get_volume(BusId::Master), 0.8);
        assert_eq!(engine.target_volume(BusId::Master), 0.8);

        engine.play_synth(SynthType::CyberBass, f64::NAN);
        engine.play_synth(SynthType::CyberBass, 0.6);
        engine.play_with(
            "lounge",
            PlayOptions {
                volume: Some(f64::NAN),
                fade_in: Some(f64::INFINITY),
                ..PlayOptions::default()
            },
        );
        engine.wait_for_loads().await;
        let out = engine.render(800);
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(peak(&out) > 0.01);

        engine.stop_all_with_fade("cyberBass", f64::INFINITY);
        engine.stop_all_with_fade("lounge", f64::NAN);
        engine.render(128);
        assert!(engine.active_instances().is_empty());
    }

    #[test]
    fn volume_ramps_from_current_value() {
        let engine = engine();
        engine.init();
        engine.set_volume_with_ramp(BusId::Music, 0.0, 0.0);
        engine.set_volume(BusId::Music, 1.0);
        engine.render(400);
        let mid = engine.get_volume(BusId::Music);
        assert!(mid > 0.3 && mid < 0.7, "mid {mid}");
    }

    #[test]
    fn mute_keeps_master_volume() {
        let engine = engine();
        engine.init();
        engine.set_volume(BusId::Master, 0.5);
        engine.render(1600);
        engine.mute(true);
        assert!(engine.is_muted());
        assert!((engine.get_volume(BusId::Master) - 0.5).abs() < 1e-9);

        engine.play_synth(SynthType::CyberBass, 1.0);
        assert_eq!(engine.pending_len(), 1);
        assert_eq!(peak(&engine.render(800)), 0.0);

        engine.mute(false);
        assert_eq!(engine.pending_len(), 0);
        assert!(peak(&engine.render(1600)) > 0.01);
        assert!((engine.get_volume(BusId::Master) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn jackpot_schedules_all_layers() {
        let engine = engine();
        engine.init();
        let id = engine.play_synth(SynthType::Jackpot, 0.6);
        assert!(id.starts_with("jackpot-"));
        assert!(engine.created_sources() >= 9);
        assert!(engine.is_playing("jackpot"));
        engine.render(SR as usize * 3);
        assert!(!engine.is_playing("jackpot"));
    }

    #[test]
    fn spin_mech_runs_until_stopped() {
        let engine = engine();
        engine.init();
        engine.play_synth(SynthType::SpinMech, 0.5);
        engine.render(SR as usize);
        assert!(engine.is_playing("spinMech"));
        engine.stop_spin_mech();
        engine.render(SR as usize / 2);
        assert!(!engine.is_playing("spinMech"));

        engine.play_synth_named("reelSpin", 0.5);
        engine.render(800);
        engine.stop_reel_spin();
        engine.render(SR as usize / 2);
        assert!(!engine.is_playing("reelSpin"));
        assert!(engine.play_synth_named("kazoo", 0.5).is_none());
    }

    #[test]
    fn suspend_holds_clock_and_queues() {
        let engine = engine();
        engine.init();
        engine.render(800);
        engine.suspend();
        assert_eq!(engine.state(), EngineState::Suspended);
        let t = engine.current_time();
        engine.play_synth(SynthType::Select, 0.5);
        assert_eq!(engine.pending_len(), 1);
        assert_eq!(peak(&engine.render(800)), 0.0);
        assert_eq!(engine.current_time(), t);

        engine.resume();
        assert!(engine.is_ready());
        assert_eq!(engine.pending_len(), 0);
        assert!(peak(&engine.render(800)) > 0.0);
    }

    #[test]
    fn stop_while_suspended_finishes_after_resume() {
        let engine = engine();
        engine.init();
        let id = engine.play_synth(SynthType::SpinMech, 0.5);
        engine.render(256);
        engine.suspend();
        engine.stop_with_fade(&id, 0.1);
        engine.render(2400);
        assert!(engine.is_playing(&id));

        engine.resume();
        engine.render(2400);
        assert!(!engine.is_playing(&id));
    }

    #[test]
    fn bass_level_stays_in_range() {
        let engine = engine();
        assert_eq!(engine.get_frequency_data(), None);
        assert_eq!(engine.get_bass_level(), 0.0);
        engine.init();
        let data = engine.get_frequency_data().unwrap();
        assert_eq!(data.len(), 128);
        assert_eq!(engine.get_bass_level(), 0.0);
    }

    #[tokio::test]
    async fn music_moves_the_bass_level() {
        let engine = engine();
        engine.register("lounge", lounge());
        engine.init();
        engine.play("lounge");
        engine.wait_for_loads().await;
        engine.render(2048);
        let level = engine.get_bass_level();
        assert!(level > 0.0 && level <= 1.0, "level {level}");
    }

    #[test]
    fn unknown_sound_is_ignored() {
        let engine = engine();
        engine.init();
        let id = engine.play("nope");
        assert!(id.starts_with("nope-"));
        assert!(!engine.is_playing("nope"));
        assert_eq!(engine.pending_len(), 0);
    }

    #[tokio::test]
    async fn failed_decode_is_cached_as_unavailable() {
        let engine = engine();
        engine.register(
            "broken",
            SoundDescriptor::new(SampleRef::Inline { data: "AAAA".into() }, BusId::Sfx),
        );
        engine.init();
        engine.play("broken");
        engine.wait_for_loads().await;
        assert!(!engine.is_playing("broken"));
        engine.play("broken");
        assert!(!engine.is_playing("broken"));
        assert_eq!(engine.loader.fetch_count(), 1);
    }

    #[tokio::test]
    async fn preload_then_play_starts_synchronously() {
        let engine = engine();
        engine.register_all([("lounge", lounge()), ("blip", blip())]);
        engine.preload(["lounge", "blip", "missing"]).await;
        assert!(engine.loader.cached("lounge").is_some());
        engine.init();
        engine.play("blip");
        // buffer was cached, no decode task needed
        assert_eq!(engine.created_sources(), 1);
    }

    #[tokio::test]
    async fn reregistering_a_new_source_drops_the_cache() {
        let engine = engine();
        engine.register("blip", blip());
        engine.preload(["blip"]).await;
        assert!(engine.loader.cached("blip").is_some());
        engine.register("blip", blip().volume(0.2));
        assert!(engine.loader.cached("blip").is_some());
        engine.register(
            "blip",
            SoundDescriptor::new(inline_wav(800, SR, 100), BusId::Sfx),
        );
        assert!(engine.loader.cached("blip").is_none());
    }

    #[cfg(not(feature = "device"))]
    #[test]
    fn platform_failure_degrades_to_queued_no_ops() {
        let engine = AudioEngine::new(EngineConfig {
            output: crate::config::OutputMode::Device,
            ..EngineConfig::default()
        })
        .unwrap();
        assert_eq!(engine.init(), EngineState::Uninitialized);
        engine.play_synth(SynthType::Tick, 0.5);
        assert_eq!(engine.pending_len(), 1);
        assert_eq!(engine.init(), EngineState::Uninitialized);
        assert_eq!(engine.get_frequency_data(), None);
        engine.dispose();
    }

    #[test]
    fn dispose_is_idempotent_and_terminal() {
        let never = engine();
        never.dispose();
        never.dispose();

        let engine = engine();
        engine.register("blip", blip());
        engine.init();
        engine.play_synth(SynthType::SpinMech, 0.5);
        engine.dispose();
        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);
        assert!(engine.active_instances().is_empty());

        assert_eq!(engine.init(), EngineState::Disposed);
        engine.register("blip", blip());
        let id = engine.play("blip");
        assert!(id.starts_with("blip-"));
        engine.play_synth(SynthType::Tick, 0.5);
        engine.stop(&id);
        engine.stop_all("blip");
        engine.set_volume(BusId::Music, 0.3);
        engine.mute(true);
        engine.suspend();
        engine.resume();
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(engine.get_frequency_data(), None);
        assert_eq!(engine.get_bass_level(), 0.0);
        assert_eq!(peak(&engine.render(256)), 0.0);
        assert!(!engine.is_playing(""));
    }
}
