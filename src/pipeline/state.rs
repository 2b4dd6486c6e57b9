//! Continuous-listening run state.
//!
//! [`PipelineRunState`] is read by the listening loop and written by the
//! start/stop triggers from other tasks, so it lives in an atomic cell,
//! [`RunState`], owned by the orchestrator.

use std::sync::atomic::{AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// PipelineRunState
// ---------------------------------------------------------------------------

/// Lifecycle of the continuous-listening loop.
///
/// ```text
/// Idle ──start──▶ Listening ──stop──▶ Stopping ──loop exits──▶ Idle
///                     ▲                   │
///                     └──────start────────┘   (loop still alive: resumed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineRunState {
    /// No listening loop is running.
    #[default]
    Idle,

    /// The loop is acquiring and speaking utterances.
    Listening,

    /// Stop was requested; the loop exits at its next check.
    Stopping,
}

impl PipelineRunState {
    /// Label for the start/stop control.
    ///
    /// ```
    /// use polyvoice::pipeline::PipelineRunState;
    ///
    /// assert_eq!(PipelineRunState::Idle.label(), "Start listening");
    /// assert_eq!(PipelineRunState::Listening.label(), "Stop listening");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            PipelineRunState::Idle => "Start listening",
            PipelineRunState::Listening => "Stop listening",
            PipelineRunState::Stopping => "Stopping…",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            PipelineRunState::Idle => 0,
            PipelineRunState::Listening => 1,
            PipelineRunState::Stopping => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => PipelineRunState::Listening,
            2 => PipelineRunState::Stopping,
            _ => PipelineRunState::Idle,
        }
    }
}

/// Result of [`RunState::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Idle → Listening; the caller must spawn the loop.
    Started,
    /// Stopping → Listening; the existing loop carries on.
    Resumed,
    /// Already listening; nothing changed.
    AlreadyRunning,
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Atomic [`PipelineRunState`] cell.  All transitions are compare-and-swap.
#[derive(Debug, Default)]
pub struct RunState(AtomicU8);

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PipelineRunState {
        PipelineRunState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `true` only in [`PipelineRunState::Listening`].
    pub fn is_running(&self) -> bool {
        self.get() == PipelineRunState::Listening
    }

    pub fn start(&self) -> StartOutcome {
        loop {
            match self.get() {
                PipelineRunState::Listening => return StartOutcome::AlreadyRunning,
                PipelineRunState::Idle => {
                    if self.swap(PipelineRunState::Idle, PipelineRunState::Listening) {
                        return StartOutcome::Started;
                    }
                }
                PipelineRunState::Stopping => {
                    if self.swap(PipelineRunState::Stopping, PipelineRunState::Listening) {
                        return StartOutcome::Resumed;
                    }
                }
            }
        }
    }

    /// Listening → Stopping.  Returns `false` when not listening.
    pub fn stop(&self) -> bool {
        self.swap(PipelineRunState::Listening, PipelineRunState::Stopping)
    }

    /// Called by the loop when it observes a non-listening state.
    ///
    /// Returns `true` when the loop should exit (state is now `Idle`), and
    /// `false` when a `start` slipped in and the loop must keep going.
    pub fn finish(&self) -> bool {
        match self.0.compare_exchange(
            PipelineRunState::Stopping.to_u8(),
            PipelineRunState::Idle.to_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => PipelineRunState::from_u8(current) != PipelineRunState::Listening,
        }
    }

    fn swap(&self, from: PipelineRunState, to: PipelineRunState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
