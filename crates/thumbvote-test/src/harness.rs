//! End-to-end scenario harness
//!
//! Runs a full `VoteApp` over simulated media and a scripted tick source:
//! - Gesture holds through engine, loop, machine and controller
//! - Startup failures and the manual fallback
//! - Teardown in the middle of startup or a confirmation

use std::time::Duration;

use thumbvote_core::{ConfigError, GestureClass, SessionSnapshot, Timestamp, TriggerRejected};
use thumbvote_runtime::{
    ControllerStats, LoopStats, RuntimeConfig, StartupOutcome, TickReport, VoteApp,
};
use thumbvote_time::{ScriptedTickSource, TickSource};

use crate::simulator::{
    CameraBehavior, FrameOutcome, GestureScript, RecordingSurface, ResourceCounts, ResourceLedger,
    SimulatedCamera, SimulatedLoader,
};

pub type SimulatedApp =
    VoteApp<SimulatedLoader, SimulatedCamera, RecordingSurface, ScriptedTickSource>;

// ============================================================================
// SCENARIO
// ============================================================================

/// Declarative description of one session
#[derive(Clone, Debug)]
pub struct Scenario {
    pub config: RuntimeConfig,
    pub script: GestureScript,
    pub camera: CameraBehavior,
    pub engine_failure: Option<String>,
    pub frame_times: Vec<Timestamp>,
    /// Manual fallback presses, applied before the first tick at or after the time
    pub triggers: Vec<(Timestamp, GestureClass)>,
}

impl Scenario {
    pub fn new(script: GestureScript) -> Self {
        Scenario {
            config: RuntimeConfig::default(),
            script,
            camera: CameraBehavior::default(),
            engine_failure: None,
            frame_times: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn hold_ms(mut self, ms: u64) -> Self {
        self.config.hold_duration = Duration::from_millis(ms);
        self
    }

    pub fn delays_ms(mut self, tally: u64, cooldown: u64) -> Self {
        self.config.tally_delay = Duration::from_millis(tally);
        self.config.cooldown_delay = Duration::from_millis(cooldown);
        self
    }

    pub fn frames_at(mut self, frames_ms: &[u64]) -> Self {
        self.frame_times = frames_ms.iter().map(|&ms| Timestamp::from_millis(ms)).collect();
        self
    }

    /// Frames every `period_ms` from 0 through `until_ms`
    pub fn frames_every(mut self, period_ms: u64, until_ms: u64) -> Self {
        self.frame_times = (0..=until_ms)
            .step_by(period_ms.max(1) as usize)
            .map(Timestamp::from_millis)
            .collect();
        self
    }

    pub fn camera(mut self, behavior: CameraBehavior) -> Self {
        self.camera = behavior;
        self
    }

    pub fn engine_fails(mut self, reason: impl Into<String>) -> Self {
        self.engine_failure = Some(reason.into());
        self
    }

    pub fn trigger(mut self, at_ms: u64, class: GestureClass) -> Self {
        self.triggers.push((Timestamp::from_millis(at_ms), class));
        self.triggers.sort_by_key(|(at, _)| *at);
        self
    }

    /// Assemble the app without mounting it
    pub fn build(&self) -> Result<(SimulatedApp, ResourceLedger), ConfigError> {
        let ledger = ResourceLedger::new();
        let mut loader = SimulatedLoader::new(self.script.clone(), ledger.clone());
        if let Some(reason) = &self.engine_failure {
            loader = loader.failing(reason.clone());
        }
        let camera = SimulatedCamera::new(self.camera.clone(), ledger.clone());
        let surface = RecordingSurface::new(ledger.clone());
        let ticks = ScriptedTickSource::new(self.frame_times.iter().copied());

        let app = VoteApp::new(&self.config, loader, camera, surface, ticks)?;
        Ok((app, ledger))
    }

    /// Mount, drive every scripted frame, tear down
    pub async fn run(self) -> Result<ScenarioResult, ConfigError> {
        let (mut app, ledger) = self.build()?;
        let startup = app.mount().await;

        let mut triggers = self.triggers.iter().peekable();
        let mut result = ScenarioResult {
            startup,
            ..Default::default()
        };

        while let Some((handle, now)) = app.ticks_mut().wait().await {
            while let Some((_, class)) = triggers.next_if(|(at, _)| *at <= now) {
                result.trigger_results.push(app.trigger_manual(*class));
            }
            let report = app.on_tick(handle, now);
            result.reports.push((now, report));
            result.history.push((now, app.snapshot()));
        }

        result.loop_stats = app.frame_loop().stats().clone();
        result.controller_stats = app.controller().stats().clone();
        result.frames_drawn = app.frame_loop().surface().frames_drawn;
        app.teardown();
        result.final_snapshot = app.snapshot();
        result.ledger = ledger.counts();
        result.engine_timestamps = ledger.engine_timestamps();
        Ok(result)
    }
}

/// Everything observed while a scenario ran
#[derive(Clone, Debug)]
pub struct ScenarioResult {
    pub startup: StartupOutcome,
    pub reports: Vec<(Timestamp, TickReport)>,
    /// Snapshot after every tick
    pub history: Vec<(Timestamp, SessionSnapshot)>,
    pub trigger_results: Vec<Result<(), TriggerRejected>>,
    pub final_snapshot: SessionSnapshot,
    pub loop_stats: LoopStats,
    pub controller_stats: ControllerStats,
    pub frames_drawn: u64,
    /// Counts after teardown
    pub ledger: ResourceCounts,
    pub engine_timestamps: Vec<Timestamp>,
}

impl Default for ScenarioResult {
    fn default() -> Self {
        ScenarioResult {
            startup: StartupOutcome::Aborted,
            reports: Vec::new(),
            history: Vec::new(),
            trigger_results: Vec::new(),
            final_snapshot: SessionSnapshot::default(),
            loop_stats: LoopStats::default(),
            controller_stats: ControllerStats::default(),
            frames_drawn: 0,
            ledger: ResourceCounts::default(),
            engine_timestamps: Vec::new(),
        }
    }
}

impl ScenarioResult {
    pub fn progress(&self) -> Vec<f64> {
        self.history.iter().map(|(_, s)| s.progress).collect()
    }

    pub fn snapshot_at(&self, ms: u64) -> Option<&SessionSnapshot> {
        let at = Timestamp::from_millis(ms);
        self.history.iter().find(|(t, _)| *t == at).map(|(_, s)| s)
    }

    /// Confirmations reported by ticks, in order
    pub fn confirmed(&self) -> Vec<(Timestamp, GestureClass)> {
        self.reports
            .iter()
            .filter_map(|(t, r)| match r {
                TickReport::Classified(out) => out.confirmed.map(|c| (*t, c)),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// REFERENCE SCENARIOS
// ============================================================================

fn positive() -> FrameOutcome {
    FrameOutcome::thumb_up()
}

fn negative() -> FrameOutcome {
    FrameOutcome::thumb_down()
}

/// Steady positive hold, confirmed at the 1000ms frame
pub fn scenario_steady_hold() -> Scenario {
    Scenario::new(GestureScript::constant(positive()))
        .hold_ms(1000)
        .frames_at(&[0, 500, 1000])
}

/// A one-frame gap restarts the hold
pub fn scenario_gap_restart() -> Scenario {
    Scenario::new(
        GestureScript::new()
            .at(0, positive())
            .at(300, FrameOutcome::NoHand)
            .at(350, positive()),
    )
    .hold_ms(1000)
    .frames_at(&[0, 300, 350])
}

/// Switching class mid-hold confirms neither
pub fn scenario_class_switch() -> Scenario {
    Scenario::new(GestureScript::new().at(0, positive()).at(400, negative()))
        .hold_ms(1000)
        .frames_at(&[0, 400])
}

/// Camera denied; a single manual Negative vote
pub fn scenario_manual_fallback() -> Scenario {
    Scenario::new(GestureScript::new())
        .hold_ms(1000)
        .camera(CameraBehavior::Deny(
            thumbvote_core::CameraAccessError::PermissionDenied,
        ))
        .frames_every(16, 4000)
        .trigger(0, GestureClass::Negative)
}
