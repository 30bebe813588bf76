//! Manual fallback trigger
//!
//! When the camera or engine is unavailable, the user can still vote by
//! pressing a button. The press animates a synthetic hold over the same hold
//! duration and on the same clock as a real gesture, then yields the same
//! confirmation a held gesture would.

use thumbvote_core::{GestureClass, SessionMode, Timestamp, TriggerRejected};
use tracing::{debug, info};

use crate::{HoldConfig, HoldOutput, HoldState};

/// Synthetic hold animator
#[derive(Clone, Debug, Default)]
pub struct ManualTrigger {
    state: HoldState,
    config: HoldConfig,
}

impl ManualTrigger {
    pub fn new(config: HoldConfig) -> Self {
        ManualTrigger {
            state: HoldState::new(),
            config,
        }
    }

    /// Start animating a hold of `class`
    ///
    /// Only accepted in `Error` mode and only when no hold is animating.
    pub fn start(
        &mut self,
        class: GestureClass,
        now: Timestamp,
        mode: SessionMode,
    ) -> Result<(), TriggerRejected> {
        match mode {
            SessionMode::Confirming => return Err(TriggerRejected::Confirming),
            SessionMode::Error => {}
            other => return Err(TriggerRejected::WrongMode(other)),
        }
        if let Some(active) = self.state.active() {
            return Err(TriggerRejected::AlreadyAnimating(active));
        }

        debug!(%class, at = %now, "manual hold started");
        self.state.begin(class, now);
        Ok(())
    }

    /// Advance the animation to `now`
    pub fn advance(&mut self, now: Timestamp) -> HoldOutput {
        let Some(class) = self.state.active() else {
            return HoldOutput::IDLE;
        };

        let progress = self.state.progress(now, self.config.hold_duration());
        if progress >= 1.0 {
            info!(%class, "manual hold completed");
            self.state.clear();
            return HoldOutput::confirmed(class);
        }
        HoldOutput::in_progress(progress)
    }

    /// Abort an animation without confirming
    pub fn cancel(&mut self) {
        self.state.clear();
    }

    pub fn is_animating(&self) -> bool {
        !self.state.is_empty()
    }

    pub fn active(&self) -> Option<GestureClass> {
        self.state.active()
    }

    pub fn progress_at(&self, now: Timestamp) -> f64 {
        self.state.progress(now, self.config.hold_duration())
    }
}
