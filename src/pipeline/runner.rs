//! Pipeline orchestrator: acquire → announce → mix → speak → unmix.
//!
//! [`Orchestrator`] owns the collaborators and runs one utterance at a time.
//! Every trigger (continuous listening, file upload, typed text) spawns a
//! background task on the orchestrator's [`TaskTracker`]; the front end only
//! hears back through the [`Observer`].
//!
//! # Per-utterance flow
//!
//! ```text
//! Utterance
//!   └─▶ observer.on_text_update("{prefix}\n{text}")
//!   └─▶ say(prefix, default voice)                       [blocking pool]
//!   └─▶ NoiseMixer::start(folder)          (only if the folder exists)
//!   └─▶ for word: cancelled? ─yes─▶ break
//!                 voice = rotation.next(previous)
//!                 say(word, voice)  ─err─▶ report + skip  [blocking pool]
//!   └─▶ NoiseSession::stop().await                  (always, if started)
//! ```
//!
//! Synthesis and playback are blocking calls and run on
//! `tokio::task::spawn_blocking`; a word is never interrupted once started.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::audio::{is_audio_file, PlaybackDevice, PlaybackError};
use crate::config::NoiseConfig;
use crate::noise::{NoiseMixer, NoiseSession};
use crate::stt::{RecognitionError, RecognitionSource};
use crate::tts::{SynthesisEngine, SynthesisError, VoiceHandle};
use crate::voice::{ResponsePrefix, VoiceRotation};

use super::observer::Observer;
use super::state::{PipelineRunState, RunState, StartOutcome};
use super::utterance::Utterance;

/// Back-off after the microphone could not be opened.
const CAPTURE_RETRY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Failure to speak one word or phrase.  Never fatal to the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("playback failed: {0}")]
    Playback(#[from] PlaybackError),

    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// UtteranceReport
// ---------------------------------------------------------------------------

/// What happened while speaking one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtteranceReport {
    pub words_spoken: usize,
    pub words_skipped: usize,
    /// Stop or shutdown cut the utterance short.
    pub cancelled: bool,
    /// Noise clips played, or `None` when no noise session ran.
    pub noise_clips: Option<usize>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The external parts the orchestrator drives.
pub struct Collaborators {
    pub recognizer: Arc<dyn RecognitionSource>,
    pub synthesizer: Arc<dyn SynthesisEngine>,
    pub playback: Arc<dyn PlaybackDevice>,
    pub observer: Arc<dyn Observer>,
}

struct Inner {
    recognizer: Arc<dyn RecognitionSource>,
    synthesizer: Arc<dyn SynthesisEngine>,
    playback: Arc<dyn PlaybackDevice>,
    observer: Arc<dyn Observer>,
    rotation: VoiceRotation,
    mixer: NoiseMixer,
    noise_dir: RwLock<Option<PathBuf>>,
    run_state: RunState,
    /// Held for the whole of one utterance; utterances never interleave.
    speaking: tokio::sync::Mutex<()>,
    /// Cancellation for the utterance currently being spoken.
    current: Mutex<Option<CancellationToken>>,
    /// Bumped by every `stop`.  A trigger remembers the value it saw, and its
    /// utterance is dropped if a stop happened before its turn came.
    stop_epoch: AtomicU64,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

/// Drives the speech pipeline.  Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// `shutdown` ends everything: pending listens, the utterance being
    /// spoken and the listening loop.
    pub fn new(
        parts: Collaborators,
        rotation: VoiceRotation,
        noise: NoiseConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let mixer = NoiseMixer::new(Arc::clone(&parts.playback), noise.clone());
        Self {
            inner: Arc::new(Inner {
                recognizer: parts.recognizer,
                synthesizer: parts.synthesizer,
                playback: parts.playback,
                observer: parts.observer,
                rotation,
                mixer,
                noise_dir: RwLock::new(noise.folder),
                run_state: RunState::new(),
                speaking: tokio::sync::Mutex::new(()),
                current: Mutex::new(None),
                stop_epoch: AtomicU64::new(0),
                shutdown,
                tasks: TaskTracker::new(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn run_state(&self) -> PipelineRunState {
        self.inner.run_state.get()
    }

    pub fn is_running(&self) -> bool {
        self.inner.run_state.is_running()
    }

    /// `true` while a noise loop is alive.
    pub fn noise_active(&self) -> bool {
        self.inner.mixer.is_active()
    }

    pub fn noise_folder(&self) -> Option<PathBuf> {
        self.inner
            .noise_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    /// Begin continuous listening.
    ///
    /// Returns the loop's handle when a new loop was spawned; `None` when one
    /// is already running (or was resumed while stopping).
    pub fn start_listening(&self) -> Option<JoinHandle<()>> {
        if self.inner.shutdown.is_cancelled() {
            return None;
        }
        match self.inner.run_state.start() {
            StartOutcome::Started => {
                self.inner.observer.on_run_state_change(PipelineRunState::Listening);
                let this = self.clone();
                Some(self.inner.tasks.spawn(this.listen_loop()))
            }
            StartOutcome::Resumed => {
                log::info!("pipeline: listening resumed");
                self.inner.observer.on_run_state_change(PipelineRunState::Listening);
                None
            }
            StartOutcome::AlreadyRunning => None,
        }
    }

    /// Request stop: the listening loop exits before its next listen, the
    /// utterance being spoken (from any trigger) ends after the current word,
    /// and triggers still waiting for their turn are dropped.  Returns `true`
    /// when continuous listening was active.
    pub fn stop(&self) -> bool {
        self.inner.stop_epoch.fetch_add(1, Ordering::AcqRel);
        let stopped = self.inner.run_state.stop();
        if stopped {
            log::info!("pipeline: stop requested");
            self.inner.observer.on_run_state_change(PipelineRunState::Stopping);
        }
        if let Some(token) = lock(&self.inner.current).as_ref() {
            token.cancel();
        }
        stopped
    }

    /// Start when idle, stop when listening.
    pub fn toggle_listening(&self) -> Option<JoinHandle<()>> {
        if self.is_running() {
            self.stop();
            None
        } else {
            self.start_listening()
        }
    }

    /// Recognize a `.wav` / `.mp3` file and speak the result.
    pub fn upload_file(&self, path: PathBuf) -> Option<JoinHandle<()>> {
        if self.inner.shutdown.is_cancelled() {
            return None;
        }
        if !is_audio_file(&path) {
            self.report(format!(
                "unsupported file {}: expected .wav or .mp3",
                path.display()
            ));
            return None;
        }

        let epoch = self.stop_epoch();
        let this = self.clone();
        Some(self.inner.tasks.spawn(async move {
            match this.inner.recognizer.transcribe_file(&path).await {
                Ok(utterance) => {
                    this.speak_turn(&utterance, epoch).await;
                }
                Err(e) => this.report_recognition(&e),
            }
        }))
    }

    /// Speak typed text.  Blank input is ignored.
    pub fn submit_text(&self, text: &str) -> Option<JoinHandle<()>> {
        if self.inner.shutdown.is_cancelled() {
            return None;
        }
        let utterance = Utterance::from_text(text)?;
        let epoch = self.stop_epoch();
        let this = self.clone();
        Some(self.inner.tasks.spawn(async move {
            this.speak_turn(&utterance, epoch).await;
        }))
    }

    /// Change (or clear) the noise folder.  Takes effect with the next
    /// utterance.
    pub fn select_noise_folder(&self, dir: Option<PathBuf>) {
        match &dir {
            Some(d) => log::info!("noise: folder set to {}", d.display()),
            None => log::info!("noise: disabled"),
        }
        *self
            .inner
            .noise_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dir;
    }

    /// Stop everything and wait for all background tasks to finish.
    pub async fn shutdown(&self) {
        self.stop();
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        log::info!("pipeline: shut down");
    }

    // -----------------------------------------------------------------------
    // Utterance processing
    // -----------------------------------------------------------------------

    /// Announce and speak one utterance, bracketed by a noise session.
    ///
    /// Waits for any utterance already being spoken.  Failures are reported
    /// through the observer and never escape.
    pub async fn speak_utterance(&self, utterance: &Utterance) -> UtteranceReport {
        self.speak_turn(utterance, self.stop_epoch()).await
    }

    /// `epoch` is the stop count seen when the utterance was triggered.
    async fn speak_turn(&self, utterance: &Utterance, epoch: u64) -> UtteranceReport {
        let _turn = self.inner.speaking.lock().await;

        let cancel = self.inner.shutdown.child_token();
        if self.stop_epoch() != epoch {
            cancel.cancel();
        }
        *lock(&self.inner.current) = Some(cancel.clone());
        let report = self.process(utterance, &cancel).await;
        *lock(&self.inner.current) = None;

        log::info!(
            "pipeline: spoke {}/{} word(s){}",
            report.words_spoken,
            utterance.len(),
            if report.cancelled { " (stopped)" } else { "" }
        );
        report
    }

    async fn process(&self, utterance: &Utterance, cancel: &CancellationToken) -> UtteranceReport {
        let mut report = UtteranceReport::default();
        if cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        // ── 1. Announce ───────────────────────────────────────────────────
        let prefix = ResponsePrefix::generate();
        self.inner
            .observer
            .on_text_update(&ResponsePrefix::display(&prefix, utterance.text()));

        let default_voice = self.inner.rotation.default_voice().clone();
        if let Err(e) = self.say(&prefix, &default_voice).await {
            self.report(format!("could not speak the prefix: {e}"));
        }

        // ── 2. Mix-start ──────────────────────────────────────────────────
        let noise = self.start_noise();

        // ── 3. Speak ──────────────────────────────────────────────────────
        let mut previous: Option<VoiceHandle> = None;
        for word in utterance.words() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let voice = self.inner.rotation.next(previous.as_ref());
            match self.say(word, &voice).await {
                Ok(()) => {
                    report.words_spoken += 1;
                    previous = Some(voice);
                }
                Err(e) => {
                    report.words_skipped += 1;
                    self.report(format!("skipped {word:?} ({voice}): {e}"));
                }
            }
        }

        // ── 4. Mix-stop ───────────────────────────────────────────────────
        if let Some(session) = noise {
            report.noise_clips = Some(session.stop().await);
        }

        report
    }

    /// Synthesize and play `text` on the blocking pool.
    async fn say(&self, text: &str, voice: &VoiceHandle) -> Result<(), PipelineError> {
        let synthesizer = Arc::clone(&self.inner.synthesizer);
        let playback = Arc::clone(&self.inner.playback);
        let text = text.to_owned();
        let voice = voice.clone();

        tokio::task::spawn_blocking(move || -> Result<(), PipelineError> {
            let audio = synthesizer.speak(&text, &voice)?;
            playback.play(&audio)?;
            Ok(())
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?
    }

    fn start_noise(&self) -> Option<NoiseSession> {
        let dir = self.noise_folder()?;
        if !dir.is_dir() {
            log::debug!("noise: {} not found, speaking without noise", dir.display());
            return None;
        }
        match self.inner.mixer.start(&dir) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("noise: {e}");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Continuous listening
    // -----------------------------------------------------------------------

    async fn listen_loop(self) {
        log::info!("pipeline: continuous listening started");

        loop {
            if !self.inner.run_state.is_running() {
                if self.inner.run_state.finish() {
                    break;
                }
                continue;
            }
            if self.inner.shutdown.is_cancelled() {
                self.inner.run_state.stop();
                continue;
            }

            match self.inner.recognizer.listen().await {
                Ok(utterance) => {
                    if !self.inner.run_state.is_running() {
                        log::info!(
                            "pipeline: stop requested, dropping {:?}",
                            utterance.text()
                        );
                        continue;
                    }
                    self.speak_utterance(&utterance).await;
                }
                Err(e) => {
                    let back_off = matches!(
                        e,
                        RecognitionError::Capture(_) | RecognitionError::Cancelled
                    );
                    if !matches!(e, RecognitionError::Cancelled) {
                        self.report_recognition(&e);
                    }
                    if back_off {
                        tokio::select! {
                            _ = self.inner.shutdown.cancelled() => {}
                            _ = tokio::time::sleep(CAPTURE_RETRY) => {}
                        }
                    }
                }
            }
        }

        self.inner.observer.on_run_state_change(PipelineRunState::Idle);
        log::info!("pipeline: continuous listening stopped");
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn stop_epoch(&self) -> u64 {
        self.inner.stop_epoch.load(Ordering::Acquire)
    }

    fn report(&self, message: String) {
        log::warn!("pipeline: {message}");
        self.inner.observer.on_error(&message);
    }

    fn report_recognition(&self, e: &RecognitionError) {
        match e {
            RecognitionError::Unintelligible => {
                log::info!("pipeline: {e}");
                self.inner.observer.on_error("Could not understand audio");
            }
            other => {
                log::error!("pipeline: {other}");
                self.inner.observer.on_error(&other.to_string());
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DecodedAudio;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Returns scripted results; each `listen` first takes a permit from
    /// `gate`, so tests can hold the loop inside a listen call.
    struct ScriptedRecognizer {
        script: Mutex<VecDeque<Result<Utterance, RecognitionError>>>,
        gate: Semaphore,
        listens: AtomicUsize,
        files: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<Result<&str, RecognitionError>>, open_permits: usize) -> Arc<Self> {
            let script = script
                .into_iter()
                .map(|r| r.map(|t| Utterance::from_text(t).unwrap()))
                .collect();
            Arc::new(Self {
                script: Mutex::new(script),
                gate: Semaphore::new(open_permits),
                listens: AtomicUsize::new(0),
                files: Mutex::new(Vec::new()),
            })
        }

        fn listens(&self) -> usize {
            self.listens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecognitionSource for ScriptedRecognizer {
        async fn listen(&self) -> Result<Utterance, RecognitionError> {
            self.listens.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Err(RecognitionError::Unintelligible)
                }
            }
        }

        async fn transcribe_file(&self, path: &Path) -> Result<Utterance, RecognitionError> {
            self.files.lock().unwrap().push(path.to_path_buf());
            Ok(Utterance::from_text("from the file").unwrap())
        }
    }

    /// Three voices; fails on one configurable word.
    /// Fails on any text starting with `fail_on`.
    struct FakeSynth {
        spoken: Mutex<Vec<(String, VoiceHandle)>>,
        fail_on: Option<&'static str>,
    }

    impl FakeSynth {
        fn new(fail_on: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
                fail_on,
            })
        }

        fn spoken(&self) -> Vec<(String, VoiceHandle)> {
            self.spoken.lock().unwrap().clone()
        }

        fn texts(&self) -> Vec<String> {
            self.spoken().into_iter().map(|(t, _)| t).collect()
        }
    }

    impl SynthesisEngine for FakeSynth {
        fn speak(&self, text: &str, voice: &VoiceHandle) -> Result<DecodedAudio, SynthesisError> {
            if self.fail_on.is_some_and(|f| text.starts_with(f)) {
                return Err(SynthesisError::Engine(format!("cannot say {text}")));
            }
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), voice.clone()));
            Ok(DecodedAudio::silence(10, 16_000, 1))
        }

        fn voices(&self) -> Result<Vec<VoiceHandle>, SynthesisError> {
            Ok(["a", "b", "c"].into_iter().map(VoiceHandle::new).collect())
        }
    }

    /// Speech buffers from `FakeSynth` are silent; noise clips are not.
    struct FakePlayback {
        delay: Duration,
        speech: AtomicUsize,
        noise: AtomicUsize,
    }

    impl FakePlayback {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                speech: AtomicUsize::new(0),
                noise: AtomicUsize::new(0),
            })
        }
    }

    impl PlaybackDevice for FakePlayback {
        fn play(&self, audio: &DecodedAudio) -> Result<(), PlaybackError> {
            std::thread::sleep(self.delay);
            if audio.samples.iter().any(|s| s.abs() > 0.01) {
                self.noise.fetch_add(1, Ordering::SeqCst);
            } else {
                self.speech.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        texts: Mutex<Vec<String>>,
        states: Mutex<Vec<PipelineRunState>>,
        errors: Mutex<Vec<String>>,
    }

    impl Observer for RecordingObserver {
        fn on_text_update(&self, display: &str) {
            self.texts.lock().unwrap().push(display.to_string());
        }

        fn on_run_state_change(&self, state: PipelineRunState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Harness {
        orch: Orchestrator,
        recognizer: Arc<ScriptedRecognizer>,
        synth: Arc<FakeSynth>,
        playback: Arc<FakePlayback>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(
        recognizer: Arc<ScriptedRecognizer>,
        synth: Arc<FakeSynth>,
        playback: Arc<FakePlayback>,
        noise_dir: Option<&Path>,
    ) -> Harness {
        let observer = Arc::new(RecordingObserver::default());
        let rotation = VoiceRotation::new(synth.voices().unwrap()).unwrap();
        let noise = NoiseConfig {
            folder: noise_dir.map(Path::to_path_buf),
            poll_interval_ms: 10,
            ..NoiseConfig::default()
        };
        let orch = Orchestrator::new(
            Collaborators {
                recognizer: recognizer.clone(),
                synthesizer: synth.clone(),
                playback: playback.clone(),
                observer: observer.clone(),
            },
            rotation,
            noise,
            CancellationToken::new(),
        );
        Harness {
            orch,
            recognizer,
            synth,
            playback,
            observer,
        }
    }

    fn quiet_harness() -> Harness {
        harness(
            ScriptedRecognizer::new(Vec::new(), 1_000),
            FakeSynth::new(None),
            FakePlayback::new(0),
            None,
        )
    }

    fn noise_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        DecodedAudio::new(vec![0.5; 3_200], 16_000, 1)
            .write_wav(dir.path().join("hum.wav"))
            .unwrap();
        dir
    }

    async fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn assert_no_consecutive_repeats(spoken: &[(String, VoiceHandle)]) {
        for pair in spoken.windows(2) {
            assert_ne!(pair[0].1, pair[1].1, "{pair:?}");
        }
    }

    // -----------------------------------------------------------------------
    // One-shot text
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn text_is_announced_then_spoken_word_by_word() {
        let h = quiet_harness();
        h.orch
            .submit_text("one two three four five six")
            .unwrap()
            .await
            .unwrap();

        let spoken = h.synth.spoken();
        assert_eq!(spoken.len(), 7);
        assert!(spoken[0].0.starts_with("Generating response: "));
        assert_eq!(spoken[0].1, VoiceHandle::new("a"));

        let words: Vec<&str> = spoken[1..].iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(words, ["one", "two", "three", "four", "five", "six"]);
        assert_no_consecutive_repeats(&spoken[1..]);

        let texts = h.observer.texts.lock().unwrap().clone();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Generating response: "));
        assert!(texts[0].ends_with("\none two three four five six"));
        assert_eq!(h.playback.speech.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let h = quiet_harness();
        assert!(h.orch.submit_text("  \n\t ").is_none());
        assert!(h.synth.spoken().is_empty());
        assert!(h.observer.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_word_is_skipped_and_the_rest_is_spoken() {
        let h = harness(
            ScriptedRecognizer::new(Vec::new(), 1_000),
            FakeSynth::new(Some("bad")),
            FakePlayback::new(0),
            None,
        );
        let u = Utterance::from_text("good bad fine well").unwrap();
        let report = h.orch.speak_utterance(&u).await;

        assert_eq!(report.words_spoken, 3);
        assert_eq!(report.words_skipped, 1);
        assert!(!report.cancelled);
        assert_eq!(h.observer.errors.lock().unwrap().len(), 1);

        let spoken = h.synth.spoken();
        assert_eq!(h.synth.texts()[1..], ["good", "fine", "well"]);
        assert_no_consecutive_repeats(&spoken[1..]);
    }

    #[tokio::test]
    async fn failed_prefix_still_speaks_the_words() {
        let h = harness(
            ScriptedRecognizer::new(Vec::new(), 1_000),
            FakeSynth::new(Some("Generating response: ")),
            FakePlayback::new(0),
            None,
        );
        let u = Utterance::from_text("still spoken here").unwrap();
        let report = h.orch.speak_utterance(&u).await;

        assert_eq!(report.words_spoken, 3);
        assert_eq!(report.words_skipped, 0);
        assert_eq!(h.synth.texts(), ["still", "spoken", "here"]);
        assert_eq!(h.observer.texts.lock().unwrap().len(), 1);

        let errors = h.observer.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("prefix"));
    }

    // -----------------------------------------------------------------------
    // Noise bracketing
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn noise_stops_even_when_a_word_fails() {
        let dir = noise_dir();
        let h = harness(
            ScriptedRecognizer::new(Vec::new(), 1_000),
            FakeSynth::new(Some("bad")),
            FakePlayback::new(30),
            Some(dir.path()),
        );
        let u = Utterance::from_text("good bad fine").unwrap();
        let report = h.orch.speak_utterance(&u).await;

        assert_eq!(report.words_spoken, 2);
        assert_eq!(report.words_skipped, 1);
        assert!(report.noise_clips.is_some());
        assert!(!h.orch.noise_active());

        let noise_after = h.playback.noise.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.playback.noise.load(Ordering::SeqCst), noise_after);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn noise_runs_only_while_words_are_spoken() {
        let dir = noise_dir();
        let h = harness(
            ScriptedRecognizer::new(Vec::new(), 1_000),
            FakeSynth::new(None),
            FakePlayback::new(30),
            Some(dir.path()),
        );
        let u = Utterance::from_text("alpha beta gamma delta").unwrap();
        let report = h.orch.speak_utterance(&u).await;

        assert_eq!(report.words_spoken, 4);
        assert!(report.noise_clips.unwrap() >= 1);
        assert!(!h.orch.noise_active());

        let noise_after = h.playback.noise.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.playback.noise.load(Ordering::SeqCst), noise_after);
    }

    #[tokio::test]
    async fn no_noise_without_a_folder() {
        let h = quiet_harness();
        let report = h
            .orch
            .speak_utterance(&Utterance::from_text("hi").unwrap())
            .await;
        assert_eq!(report.noise_clips, None);
    }

    #[tokio::test]
    async fn missing_noise_folder_is_not_an_error() {
        let h = quiet_harness();
        h.orch
            .select_noise_folder(Some(PathBuf::from("/nonexistent/noise")));
        let report = h
            .orch
            .speak_utterance(&Utterance::from_text("hi there").unwrap())
            .await;
        assert_eq!(report.noise_clips, None);
        assert_eq!(report.words_spoken, 2);
        assert!(h.observer.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn noise_folder_can_be_changed_and_cleared() {
        let h = quiet_harness();
        assert_eq!(h.orch.noise_folder(), None);
        h.orch.select_noise_folder(Some(PathBuf::from("/tmp/noise")));
        assert_eq!(h.orch.noise_folder(), Some(PathBuf::from("/tmp/noise")));
        h.orch.select_noise_folder(None);
        assert_eq!(h.orch.noise_folder(), None);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_ends_the_utterance_between_words_and_stops_noise() {
        let dir = noise_dir();
        let h = harness(
            ScriptedRecognizer::new(Vec::new(), 1_000),
            FakeSynth::new(None),
            FakePlayback::new(40),
            Some(dir.path()),
        );
        let orch = h.orch.clone();
        let task = tokio::spawn(async move {
            let u = Utterance::from_text("a b c d e f g h i j").unwrap();
            orch.speak_utterance(&u).await
        });

        let synth = h.synth.clone();
        wait_until("two words", || synth.spoken().len() >= 3).await;
        h.orch.stop();
        let report = task.await.unwrap();

        assert!(report.cancelled);
        assert!(report.words_spoken < 10);
        assert_eq!(report.words_spoken, h.synth.spoken().len() - 1);
        assert!(report.noise_clips.is_some());
        assert!(!h.orch.noise_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_drops_text_waiting_for_its_turn() {
        let h = harness(
            ScriptedRecognizer::new(Vec::new(), 1_000),
            FakeSynth::new(None),
            FakePlayback::new(40),
            None,
        );
        let orch = h.orch.clone();
        let first = tokio::spawn(async move {
            let u = Utterance::from_text("one two three four five six").unwrap();
            orch.speak_utterance(&u).await
        });

        let synth = h.synth.clone();
        wait_until("first word", || synth.spoken().len() >= 2).await;
        let queued = h.orch.submit_text("queued words").unwrap();
        h.orch.stop();

        assert!(first.await.unwrap().cancelled);
        queued.await.unwrap();

        let texts = h.synth.texts();
        assert!(!texts.iter().any(|t| t == "queued" || t == "words"), "{texts:?}");
        assert_eq!(h.observer.texts.lock().unwrap().len(), 1);

        // Text submitted after the stop is spoken normally.
        h.orch.submit_text("after").unwrap().await.unwrap();
        assert_eq!(h.synth.texts().last().map(String::as_str), Some("after"));
    }

    // -----------------------------------------------------------------------
    // Continuous listening
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stop_during_listen_prevents_another_listen() {
        let h = harness(
            ScriptedRecognizer::new(vec![Ok("hello world")], 0),
            FakeSynth::new(None),
            FakePlayback::new(0),
            None,
        );
        let handle = h.orch.start_listening().unwrap();
        let rec = h.recognizer.clone();
        wait_until("first listen", || rec.listens() == 1).await;

        assert!(h.orch.stop());
        h.recognizer.gate.add_permits(1);
        handle.await.unwrap();

        assert_eq!(h.recognizer.listens(), 1);
        assert!(h.synth.spoken().is_empty());
        assert_eq!(h.orch.run_state(), PipelineRunState::Idle);
        assert_eq!(
            *h.observer.states.lock().unwrap(),
            vec![
                PipelineRunState::Listening,
                PipelineRunState::Stopping,
                PipelineRunState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn loop_speaks_each_utterance_before_listening_again() {
        let h = harness(
            ScriptedRecognizer::new(vec![Ok("one two")], 1),
            FakeSynth::new(None),
            FakePlayback::new(0),
            None,
        );
        let handle = h.orch.start_listening().unwrap();
        let rec = h.recognizer.clone();
        wait_until("second listen", || rec.listens() == 2).await;

        assert_eq!(h.synth.texts()[1..], ["one", "two"]);

        h.orch.stop();
        h.recognizer.gate.add_permits(1);
        handle.await.unwrap();
        assert_eq!(h.recognizer.listens(), 2);
        assert!(!h.orch.is_running());
    }

    #[tokio::test]
    async fn recognition_failures_do_not_end_the_loop() {
        let h = harness(
            ScriptedRecognizer::new(
                vec![
                    Err(RecognitionError::Transport("503".into())),
                    Err(RecognitionError::Unintelligible),
                    Ok("still here"),
                ],
                3,
            ),
            FakeSynth::new(None),
            FakePlayback::new(0),
            None,
        );
        let handle = h.orch.start_listening().unwrap();
        let rec = h.recognizer.clone();
        wait_until("fourth listen", || rec.listens() == 4).await;

        assert!(h.orch.is_running());
        assert_eq!(h.synth.texts()[1..], ["still", "here"]);
        let errors = h.observer.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("503"));

        h.orch.stop();
        h.recognizer.gate.add_permits(1);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn toggle_starts_and_stops() {
        let h = quiet_harness();
        let handle = h.orch.toggle_listening().unwrap();
        assert!(h.orch.is_running());
        assert!(h.orch.start_listening().is_none());

        assert!(h.orch.toggle_listening().is_none());
        handle.await.unwrap();
        assert_eq!(h.orch.run_state(), PipelineRunState::Idle);
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn upload_speaks_the_transcript() {
        let h = quiet_harness();
        h.orch
            .upload_file(PathBuf::from("talk.MP3"))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(
            *h.recognizer.files.lock().unwrap(),
            vec![PathBuf::from("talk.MP3")]
        );
        assert_eq!(h.synth.texts()[1..], ["from", "the", "file"]);
    }

    #[tokio::test]
    async fn upload_rejects_other_files() {
        let h = quiet_harness();
        assert!(h.orch.upload_file(PathBuf::from("notes.txt")).is_none());
        assert!(h.recognizer.files.lock().unwrap().is_empty());
        assert_eq!(h.observer.errors.lock().unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn shutdown_waits_for_running_tasks_and_refuses_new_ones() {
        let h = quiet_harness();
        let _ = h.orch.submit_text("first second").unwrap();
        h.orch.shutdown().await;

        assert!(h.orch.submit_text("too late").is_none());
        assert!(h.orch.start_listening().is_none());
        assert!(!h.orch.noise_active());
    }
}
