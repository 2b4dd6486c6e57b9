//! The front end's view of the pipeline.

use super::state::PipelineRunState;

/// Callbacks the orchestrator makes towards whatever front end drives it.
///
/// Called from background tasks; implementations must not block.
pub trait Observer: Send + Sync {
    /// Replace the text surface (prefix line + recognized/typed text).
    fn on_text_update(&self, display: &str);

    /// The continuous-listening state changed.
    fn on_run_state_change(&self, state: PipelineRunState);

    /// A recoverable failure worth showing to the user.
    fn on_error(&self, _message: &str) {}
}

/// Observer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_text_update(&self, display: &str) {
        log::info!("pipeline: {}", display.replace('\n', " | "));
    }

    fn on_run_state_change(&self, state: PipelineRunState) {
        log::info!("pipeline: run state {state:?}");
    }
}
