//! Fallback frame driver for hosts without a render loop.
//!
//! Word tracking is meant to run once per rendered frame: hosts with a UI
//! call [`NarrationEngine::tick`] from their own frame callback.  When there
//! is no such callback, [`FrameLoop`] runs `tick` on a fixed tokio interval
//! instead.  Dropping the returned handle aborts the task, so the loop can
//! never outlive its owner.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::PlaybackConfig;

use super::coordinator::NarrationEngine;

pub struct FrameLoop {
    handle: JoinHandle<()>,
    period: Duration,
}

impl FrameLoop {
    /// Start ticking `engine` every `period`.  Must be called from within a
    /// tokio runtime.
    pub fn spawn(engine: NarrationEngine, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Frames missed while the runtime was busy are skipped, not replayed.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                engine.tick();
            }
        });
        log::debug!("engine: frame loop started ({period:?})");
        Self { handle, period }
    }

    /// Start ticking `engine` every `frame_interval_ms`.
    pub fn from_config(engine: NarrationEngine, config: &PlaybackConfig) -> Self {
        Self::spawn(engine, Duration::from_millis(config.frame_interval_ms))
    }

    /// Tick period actually in use (never below 1 ms).
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop ticking.  Equivalent to dropping the handle.
    pub fn stop(self) {}
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
