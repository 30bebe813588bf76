//! Session Controller
//!
//! Owns the session mode and the vote tally, and sequences a confirmation:
//!
//! 1. A confirmation (held gesture or manual fallback) enters `Confirming`.
//! 2. After the tally delay the confirmed class is counted.
//! 3. After the cooldown delay the session returns to the mode the vote
//!    started from (`Recognizing` for camera votes, `Error` for fallback votes).
//!
//! Delayed steps live in a timer queue tagged with the liveness generation
//! current when they were scheduled. A step whose generation went stale is
//! dropped without touching the tally or the mode.

use std::time::Duration;

use thumbvote_core::{
    FrameObservation, GestureClass, LoadingPhase, SessionError, SessionMode, SessionSnapshot,
    Timestamp, TriggerRejected, VoteTally,
};
use thumbvote_gesture::{ConfirmationMachine, HoldConfig, HoldOutput, ManualTrigger};
use thumbvote_time::{Liveness, TimerQueue};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{RuntimeConfig, DEFAULT_COOLDOWN_DELAY, DEFAULT_TALLY_DELAY};

/// Timing used by the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub hold: HoldConfig,
    pub tally_delay: Duration,
    pub cooldown_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            hold: HoldConfig::default(),
            tally_delay: DEFAULT_TALLY_DELAY,
            cooldown_delay: DEFAULT_COOLDOWN_DELAY,
        }
    }
}

impl TryFrom<&RuntimeConfig> for SessionConfig {
    type Error = thumbvote_core::ConfigError;

    fn try_from(config: &RuntimeConfig) -> Result<Self, Self::Error> {
        Ok(SessionConfig {
            hold: config.hold()?,
            tally_delay: config.tally_delay,
            cooldown_delay: config.cooldown_delay,
        })
    }
}

/// Delayed steps of a confirmation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionTask {
    /// Count the confirmed class
    RecordVote(GestureClass),
    /// Leave `Confirming`
    EndCooldown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub confirmations: u64,
    pub votes_recorded: u64,
    pub stale_tasks_dropped: u64,
    pub triggers_rejected: u64,
}

/// Session state owner
pub struct SessionController {
    mode: SessionMode,
    loading_phase: LoadingPhase,
    /// Mode to return to once the cooldown ends
    resume_mode: SessionMode,
    tally: VoteTally,
    machine: ConfirmationMachine,
    manual: ManualTrigger,
    timers: TimerQueue<SessionTask>,
    liveness: Liveness,
    error: Option<SessionError>,
    last_confirmed: Option<GestureClass>,
    progress: f64,
    config: SessionConfig,
    stats: ControllerStats,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(config: SessionConfig, liveness: Liveness) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        SessionController {
            mode: SessionMode::Loading,
            loading_phase: LoadingPhase::LoadingModel,
            resume_mode: SessionMode::Recognizing,
            tally: VoteTally::new(),
            machine: ConfirmationMachine::new(config.hold),
            manual: ManualTrigger::new(config.hold),
            timers: TimerQueue::new(),
            liveness,
            error: None,
            last_confirmed: None,
            progress: 0.0,
            config,
            stats: ControllerStats::default(),
            snapshots,
        }
    }

    /// Receive a fresh snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            loading_phase: self.loading_phase,
            progress: self.progress,
            active: self.machine.active().or(self.manual.active()),
            tally: self.tally,
            last_confirmed: self.last_confirmed,
            error_message: self.error.as_ref().map(|e| e.user_message().to_string()),
            fallback_enabled: self.mode == SessionMode::Error && !self.manual.is_animating(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn tally(&self) -> VoteTally {
        self.tally
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Delayed steps still scheduled
    pub fn pending_tasks(&self) -> usize {
        self.timers.len()
    }

    /// Earliest time `advance` has work to do
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    pub fn enter_loading(&mut self, phase: LoadingPhase) {
        self.loading_phase = phase;
        self.error = None;
        self.set_mode(SessionMode::Loading);
        self.publish();
    }

    pub fn enter_recognizing(&mut self) {
        self.error = None;
        self.set_mode(SessionMode::Recognizing);
        self.publish();
    }

    /// Enter `Error`; the manual fallback becomes available
    pub fn fail(&mut self, err: SessionError) {
        error!(error = %err, "session failed");
        self.error = Some(err);
        self.set_mode(SessionMode::Error);
        self.publish();
    }

    /// Feed one frame observation
    pub fn observe(&mut self, obs: &FrameObservation) -> HoldOutput {
        let out = self.machine.observe(obs, self.mode);
        self.progress = out.progress;
        if let Some(class) = out.confirmed {
            self.begin_confirmation(class, obs.timestamp);
        }
        self.publish();
        out
    }

    /// Start the manual fallback for `class`
    pub fn trigger_manual(
        &mut self,
        class: GestureClass,
        now: Timestamp,
    ) -> Result<(), TriggerRejected> {
        if let Err(rejected) = self.manual.start(class, now, self.mode) {
            self.stats.triggers_rejected += 1;
            warn!(%class, reason = %rejected, "manual trigger rejected");
            return Err(rejected);
        }
        self.progress = 0.0;
        self.publish();
        Ok(())
    }

    /// Enter `Confirming` and schedule the tally step
    ///
    /// Ignored unless the session is `Recognizing` or `Error`.
    pub fn begin_confirmation(&mut self, class: GestureClass, now: Timestamp) {
        if !matches!(self.mode, SessionMode::Recognizing | SessionMode::Error) {
            warn!(%class, mode = %self.mode, "confirmation ignored");
            return;
        }

        self.stats.confirmations += 1;
        self.resume_mode = self.mode;
        self.last_confirmed = Some(class);
        self.set_mode(SessionMode::Confirming);
        self.progress = 1.0;

        let generation = self.liveness.generation();
        self.timers.schedule_after(
            now,
            self.config.tally_delay,
            generation,
            SessionTask::RecordVote(class),
        );
        info!(%class, resume = %self.resume_mode, "vote confirmed");
        self.publish();
    }

    /// Run the manual animation and every delayed step due at `now`
    pub fn advance(&mut self, now: Timestamp) {
        if self.manual.is_animating() {
            let out = self.manual.advance(now);
            self.progress = out.progress;
            if let Some(class) = out.confirmed {
                self.begin_confirmation(class, now);
            }
        }

        while let Some(expired) = self.timers.pop_due(now) {
            if !self.liveness.is_live(expired.generation) {
                self.stats.stale_tasks_dropped += 1;
                debug!(task = ?expired.task, "dropping stale task");
                continue;
            }
            match expired.task {
                SessionTask::RecordVote(class) => {
                    self.tally.record(class);
                    self.stats.votes_recorded += 1;
                    info!(
                        %class,
                        positive = self.tally.positive,
                        negative = self.tally.negative,
                        "vote recorded"
                    );
                    // Chain from the deadline so late ticks do not stretch the cooldown
                    self.timers.schedule_after(
                        expired.deadline,
                        self.config.cooldown_delay,
                        expired.generation,
                        SessionTask::EndCooldown,
                    );
                }
                SessionTask::EndCooldown => {
                    self.progress = 0.0;
                    self.set_mode(self.resume_mode);
                }
            }
        }

        self.publish();
    }

    /// Cancel everything in flight; the tally survives
    ///
    /// An abandoned confirmation leaves `Confirming` for the mode the vote
    /// started from, since no cooldown is left to do it.
    pub fn teardown(&mut self) {
        let dropped = self.timers.clear();
        self.machine.reset();
        self.manual.cancel();
        self.progress = 0.0;
        if self.mode == SessionMode::Confirming {
            self.set_mode(self.resume_mode);
        }
        if dropped > 0 {
            debug!(dropped, "pending session tasks cancelled");
        }
        self.publish();
    }

    fn set_mode(&mut self, mode: SessionMode) {
        if self.mode == mode {
            return;
        }
        if self.mode == SessionMode::Recognizing {
            self.machine.reset();
        }
        if mode != SessionMode::Error {
            self.manual.cancel();
        }
        debug!(from = %self.mode, to = %mode, "mode transition");
        self.mode = mode;
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
