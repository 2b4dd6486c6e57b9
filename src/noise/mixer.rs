//! Background noise loop bracketing one utterance.
//!
//! [`NoiseMixer::start`] spawns a task that keeps picking a random clip,
//! attenuating it, fading its edges and playing it to completion.
//! [`NoiseSession::stop`] cancels the loop and waits for it, so no clip
//! outlives the session.  Cancellation is observed between clips only.
//!
//! The mixer owns a single slot.  The slot permit travels into the task and
//! is released when the task exits, so a second session cannot start until
//! the previous loop has actually finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::library::NoiseLibrary;
use crate::audio::{AudioError, DecodedAudio, PlaybackDevice, PlaybackError};
use crate::config::NoiseConfig;

#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("a noise session is already running")]
    Busy,
}

#[derive(Debug, Error)]
enum ClipError {
    #[error(transparent)]
    Decode(#[from] AudioError),
    #[error(transparent)]
    Play(#[from] PlaybackError),
}

enum ClipOutcome {
    Played(PathBuf),
    NoClip,
    Failed(PathBuf, ClipError),
}

// ---------------------------------------------------------------------------
// NoiseMixer
// ---------------------------------------------------------------------------

pub struct NoiseMixer {
    playback: Arc<dyn PlaybackDevice>,
    config: NoiseConfig,
    slot: Arc<Semaphore>,
}

impl NoiseMixer {
    pub fn new(playback: Arc<dyn PlaybackDevice>, config: NoiseConfig) -> Self {
        Self {
            playback,
            config,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// `true` while a noise loop is alive (including one that was cancelled
    /// but is still finishing its current clip).
    pub fn is_active(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Start looping clips from `dir`.
    ///
    /// Fails with [`NoiseError::Busy`] if the previous session's loop has not
    /// exited yet.
    pub fn start(&self, dir: &Path) -> Result<NoiseSession, NoiseError> {
        let permit = Arc::clone(&self.slot)
            .try_acquire_owned()
            .map_err(|_| NoiseError::Busy)?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            NoiseLibrary::new(dir),
            Arc::clone(&self.playback),
            self.config.clone(),
            cancel.clone(),
            permit,
        ));

        log::debug!("noise: session started on {}", dir.display());
        Ok(NoiseSession {
            cancel,
            task: Some(task),
        })
    }
}

// ---------------------------------------------------------------------------
// NoiseSession
// ---------------------------------------------------------------------------

/// Handle on one running noise loop.
///
/// Dropping the session without calling [`stop`](Self::stop) still signals the
/// loop, but does not wait for it.
pub struct NoiseSession {
    cancel: CancellationToken,
    task: Option<JoinHandle<usize>>,
}

impl NoiseSession {
    /// Signal the loop and wait for it to exit.  Returns the number of clips
    /// played to completion.
    pub async fn stop(mut self) -> usize {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return 0;
        };
        match task.await {
            Ok(played) => {
                log::debug!("noise: session stopped after {played} clip(s)");
                played
            }
            Err(e) => {
                log::error!("noise: loop task failed: {e}");
                0
            }
        }
    }
}

impl Drop for NoiseSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

async fn run_loop(
    library: NoiseLibrary,
    playback: Arc<dyn PlaybackDevice>,
    config: NoiseConfig,
    cancel: CancellationToken,
    _slot: OwnedSemaphorePermit,
) -> usize {
    let poll = Duration::from_millis(config.poll_interval_ms.max(1));
    let mut played = 0usize;

    while !cancel.is_cancelled() {
        let step = {
            let library = library.clone();
            let playback = Arc::clone(&playback);
            let config = config.clone();
            tokio::task::spawn_blocking(move || play_one(&library, playback.as_ref(), &config))
                .await
        };

        let idle = match step {
            Ok(ClipOutcome::Played(path)) => {
                played += 1;
                log::debug!("noise: played {}", path.display());
                false
            }
            Ok(ClipOutcome::NoClip) => true,
            Ok(ClipOutcome::Failed(path, e)) => {
                log::warn!("noise: skipping {}: {e}", path.display());
                true
            }
            Err(e) => {
                log::error!("noise: clip task failed: {e}");
                break;
            }
        };

        if idle {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
    played
}

fn play_one(library: &NoiseLibrary, playback: &dyn PlaybackDevice, config: &NoiseConfig) -> ClipOutcome {
    let Some(path) = library.pick(&mut rand::thread_rng()) else {
        return ClipOutcome::NoClip;
    };
    match prepare(&path, config).map(|clip| playback.play(&clip)) {
        Ok(Ok(())) => ClipOutcome::Played(path),
        Ok(Err(e)) => ClipOutcome::Failed(path, e.into()),
        Err(e) => ClipOutcome::Failed(path, e.into()),
    }
}

fn prepare(path: &Path, config: &NoiseConfig) -> Result<DecodedAudio, AudioError> {
    Ok(DecodedAudio::open(path)?
        .gain_db(-config.attenuation_db)
        .fade_in(config.fade_ms)
        .fade_out(config.fade_ms))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every buffer it is asked to play and "plays" for `delay`.
    struct RecordingPlayback {
        delay: Duration,
        played: Mutex<Vec<DecodedAudio>>,
        playing: AtomicUsize,
        max_concurrent: AtomicUsize,
    }

    impl RecordingPlayback {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                played: Mutex::new(Vec::new()),
                playing: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.played.lock().unwrap().len()
        }
    }

    impl PlaybackDevice for RecordingPlayback {
        fn play(&self, audio: &DecodedAudio) -> Result<(), PlaybackError> {
            let now = self.playing.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.played.lock().unwrap().push(audio.clone());
            self.playing.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> NoiseConfig {
        NoiseConfig {
            poll_interval_ms: 10,
            ..NoiseConfig::default()
        }
    }

    fn noise_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        DecodedAudio::new(vec![0.5; 16_000], 16_000, 1)
            .write_wav(dir.path().join("hum.wav"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not audio").unwrap();
        dir
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn plays_attenuated_faded_clips_until_stopped() {
        let dir = noise_dir();
        let playback = RecordingPlayback::new(20);
        let mixer = NoiseMixer::new(playback.clone(), config());

        let session = mixer.start(dir.path()).unwrap();
        assert!(mixer.is_active());
        tokio::time::sleep(Duration::from_millis(80)).await;
        let played = session.stop().await;

        assert!(played >= 1);
        assert_eq!(played, playback.count());
        assert!(!mixer.is_active());

        let clip = playback.played.lock().unwrap()[0].clone();
        // -8 dB of 0.5 is about 0.199; edges are faded to silence.
        let mid = clip.samples[clip.samples.len() / 2];
        assert!((mid - 0.199).abs() < 0.01, "mid sample {mid}");
        assert!(clip.samples[0].abs() < 1e-6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn nothing_plays_after_stop_returns() {
        let dir = noise_dir();
        let playback = RecordingPlayback::new(15);
        let mixer = NoiseMixer::new(playback.clone(), config());

        let session = mixer.start(dir.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        session.stop().await;

        let after_stop = playback.count();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(playback.count(), after_stop);
        assert_eq!(playback.playing.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_session_is_refused_while_first_runs() {
        let dir = noise_dir();
        let playback = RecordingPlayback::new(10);
        let mixer = NoiseMixer::new(playback.clone(), config());

        let first = mixer.start(dir.path()).unwrap();
        assert!(matches!(mixer.start(dir.path()), Err(NoiseError::Busy)));
        first.stop().await;

        let second = mixer.start(dir.path()).unwrap();
        second.stop().await;
        assert_eq!(playback.max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_folder_idles_without_error() {
        let playback = RecordingPlayback::new(0);
        let mixer = NoiseMixer::new(playback.clone(), config());

        let session = mixer.start(Path::new("/nonexistent/noise")).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(session.stop().await, 0);
        assert_eq!(playback.count(), 0);
        assert!(!mixer.is_active());
    }

    #[tokio::test]
    async fn undecodable_clip_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.wav"), b"not a riff header").unwrap();
        let playback = RecordingPlayback::new(0);
        let mixer = NoiseMixer::new(playback.clone(), config());

        let session = mixer.start(dir.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(session.stop().await, 0);
        assert_eq!(playback.count(), 0);
    }
}
