//! # Transitions
//!
//! Open/close animation playback, reduced to "play it and tell me when it's done".
//!
//! The navigator only calls a player for paths that have a [`TransitionTiming`]
//! configured. Paths without one open and close instantly.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::core::Transform;

/// Durations of a configured transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionTiming {
    pub open: Duration,
    pub close: Duration,
}

impl TransitionTiming {
    pub fn from_millis(open_ms: u64, close_ms: u64) -> Self {
        Self {
            open: Duration::from_millis(open_ms),
            close: Duration::from_millis(close_ms),
        }
    }
}

/// What a player needs to animate one presenter.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTarget<'a> {
    pub path: &'a str,
    pub transform: Option<Transform>,
    pub timing: TransitionTiming,
}

#[async_trait(?Send)]
pub trait TransitionPlayer {
    /// Returns the name of the player, used in logs.
    fn name(&self) -> &str;

    /// Plays the open transition and resolves once it has finished.
    async fn play_open(&self, target: TransitionTarget<'_>);

    /// Plays the close transition and resolves once it has finished.
    async fn play_close(&self, target: TransitionTarget<'_>);
}

/// Waits out the configured durations on the runtime's timer.
pub struct TimedTransitions;

#[async_trait(?Send)]
impl TransitionPlayer for TimedTransitions {
    fn name(&self) -> &str {
        "timed"
    }

    async fn play_open(&self, target: TransitionTarget<'_>) {
        debug!("Open transition for {} ({:?})", target.path, target.timing.open);
        if !target.timing.open.is_zero() {
            tokio::time::sleep(target.timing.open).await;
        }
    }

    async fn play_close(&self, target: TransitionTarget<'_>) {
        debug!("Close transition for {} ({:?})", target.path, target.timing.close);
        if !target.timing.close.is_zero() {
            tokio::time::sleep(target.timing.close).await;
        }
    }
}

/// Resolves every transition immediately.
pub struct InstantTransitions;

#[async_trait(?Send)]
impl TransitionPlayer for InstantTransitions {
    fn name(&self) -> &str {
        "instant"
    }

    async fn play_open(&self, _target: TransitionTarget<'_>) {}

    async fn play_close(&self, _target: TransitionTarget<'_>) {}
}
