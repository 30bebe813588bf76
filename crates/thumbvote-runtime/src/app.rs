//! Vote application driver
//!
//! Glues the session controller, the frame loop and a tick source into one
//! mountable unit. A single tick drives everything time-based: delayed
//! tally/cooldown steps, the manual fallback animation and frame capture.
//! The next tick is requested at the end of every tick, whatever happened.
//!
//! Hosts talk to a running app through an `AppHandle` (manual votes,
//! viewport resizes, unmount) and watch it through `subscribe`.

use std::sync::Arc;

use thumbvote_core::{ConfigError, GestureClass, SessionSnapshot, Timestamp, TriggerRejected};
use thumbvote_time::{Generation, IntervalTickSource, Liveness, TickHandle, TickSource};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, trace};

use crate::{
    Camera, FrameLoop, RecognizerLoader, RuntimeConfig, SessionConfig, SessionController,
    StartupOutcome, Surface, TickReport,
};

/// Requests from the host while the app runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppCommand {
    /// Manual fallback button pressed
    Trigger(GestureClass),
    /// Browser window or host viewport changed size
    ViewportResized,
}

/// Why `run` returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunExit {
    /// Unmount requested
    Unmounted,
    /// The tick source has nothing left to deliver
    TicksExhausted,
}

enum LoopEvent {
    Shutdown,
    Command(AppCommand),
    Tick(Option<(TickHandle, Timestamp)>),
}

/// Cloneable remote control for a mounted app
#[derive(Clone, Debug)]
pub struct AppHandle {
    liveness: Liveness,
    shutdown: Arc<Notify>,
    commands: mpsc::UnboundedSender<AppCommand>,
}

impl AppHandle {
    pub fn trigger(&self, class: GestureClass) -> bool {
        self.commands.send(AppCommand::Trigger(class)).is_ok()
    }

    pub fn viewport_resized(&self) -> bool {
        self.commands.send(AppCommand::ViewportResized).is_ok()
    }

    /// Invalidate every in-flight continuation and stop the loop
    pub fn unmount(&self) {
        self.liveness.invalidate();
        self.shutdown.notify_one();
    }
}

/// A mountable vote session
pub struct VoteApp<L, C, S, T>
where
    L: RecognizerLoader,
    C: Camera,
    S: Surface,
    T: TickSource,
{
    controller: SessionController,
    frame_loop: FrameLoop<L, C, S>,
    ticks: T,
    liveness: Liveness,
    shutdown: Arc<Notify>,
    commands_tx: mpsc::UnboundedSender<AppCommand>,
    commands_rx: mpsc::UnboundedReceiver<AppCommand>,
    last_tick: Timestamp,
    /// Generation the current mount started under
    mounted: Generation,
    torn_down: bool,
}

impl<L, C, S, T> VoteApp<L, C, S, T>
where
    L: RecognizerLoader,
    C: Camera,
    S: Surface,
    T: TickSource,
{
    pub fn new(
        config: &RuntimeConfig,
        loader: L,
        camera: C,
        surface: S,
        ticks: T,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let liveness = Liveness::new();
        let controller = SessionController::new(SessionConfig::try_from(config)?, liveness.clone());
        let frame_loop = FrameLoop::new(
            loader,
            camera,
            surface,
            config.engine.clone(),
            config.camera,
            config.observation_policy()?,
            liveness.clone(),
        );
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let mounted = liveness.generation();

        Ok(VoteApp {
            controller,
            frame_loop,
            ticks,
            liveness,
            shutdown: Arc::new(Notify::new()),
            commands_tx,
            commands_rx,
            last_tick: Timestamp::ZERO,
            mounted,
            torn_down: false,
        })
    }

    pub fn handle(&self) -> AppHandle {
        AppHandle {
            liveness: self.liveness.clone(),
            shutdown: self.shutdown.clone(),
            commands: self.commands_tx.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.controller.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    /// Acquire resources and schedule the first tick
    ///
    /// Ticks are scheduled on failure too, so the manual fallback animates.
    pub async fn mount(&mut self) -> StartupOutcome {
        self.torn_down = false;
        let generation = self.liveness.generation();
        self.mounted = generation;
        let shutdown = self.shutdown.clone();

        let outcome = {
            let start = self.frame_loop.start(&mut self.controller);
            tokio::pin!(start);
            loop {
                tokio::select! {
                    biased;
                    outcome = &mut start => break outcome,
                    _ = shutdown.notified() => {
                        // A permit left over from an earlier unmount is not ours
                        if !self.liveness.is_live(generation) {
                            break StartupOutcome::Aborted;
                        }
                    }
                }
            }
        };

        if outcome == StartupOutcome::Aborted || !self.liveness.is_live(generation) {
            self.teardown();
            return StartupOutcome::Aborted;
        }

        self.ticks.request_tick();
        info!(mode = %self.controller.mode(), "mounted");
        outcome
    }

    /// Drive ticks and host commands until unmounted or out of ticks
    ///
    /// Tears down before returning.
    pub async fn run(&mut self) -> RunExit {
        let shutdown = self.shutdown.clone();
        let generation = self.mounted;

        let exit = loop {
            if !self.liveness.is_live(generation) {
                break RunExit::Unmounted;
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.notified() => LoopEvent::Shutdown,
                Some(command) = self.commands_rx.recv() => LoopEvent::Command(command),
                fired = self.ticks.wait() => LoopEvent::Tick(fired),
            };

            match event {
                LoopEvent::Shutdown if !self.liveness.is_live(generation) => {
                    break RunExit::Unmounted
                }
                LoopEvent::Shutdown => debug!("stale unmount signal ignored"),
                LoopEvent::Command(command) => self.handle_command(command),
                LoopEvent::Tick(Some((handle, now))) => {
                    self.on_tick(handle, now);
                }
                LoopEvent::Tick(None) => break RunExit::TicksExhausted,
            }
        };

        debug!(?exit, "run loop finished");
        self.teardown();
        exit
    }

    /// Run one tick at `now`
    pub fn on_tick(&mut self, handle: TickHandle, now: Timestamp) -> TickReport {
        trace!(tick = handle.0, at = %now, "tick");
        self.last_tick = now;

        // Stage 1: delayed steps and manual animation
        self.controller.advance(now);

        // Stage 2: capture, draw, classify
        let report = self.frame_loop.tick(now, &mut self.controller);

        // Stage 3: always schedule the next frame
        if !self.torn_down {
            self.ticks.request_tick();
        }
        report
    }

    /// Start the manual fallback, timed from the latest tick
    pub fn trigger_manual(&mut self, class: GestureClass) -> Result<(), TriggerRejected> {
        self.controller.trigger_manual(class, self.last_tick)
    }

    fn handle_command(&mut self, command: AppCommand) {
        match command {
            AppCommand::Trigger(class) => {
                if self.trigger_manual(class).is_ok() {
                    debug!(%class, "manual trigger accepted");
                }
            }
            AppCommand::ViewportResized => {
                self.frame_loop.on_viewport_resize();
            }
        }
    }

    /// Release everything and cancel every pending callback
    ///
    /// Idempotent. The tally survives.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.liveness.invalidate();
        if let Some(pending) = self.ticks.pending() {
            self.ticks.cancel_tick(pending);
        }
        self.frame_loop.teardown();
        self.controller.teardown();
        info!(tally = ?self.controller.tally(), "session torn down");
    }

    /// Tear down and mount again
    pub async fn remount(&mut self) -> StartupOutcome {
        self.teardown();
        self.mount().await
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn frame_loop(&self) -> &FrameLoop<L, C, S> {
        &self.frame_loop
    }

    pub fn frame_loop_mut(&mut self) -> &mut FrameLoop<L, C, S> {
        &mut self.frame_loop
    }

    pub fn ticks(&self) -> &T {
        &self.ticks
    }

    pub fn ticks_mut(&mut self) -> &mut T {
        &mut self.ticks
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }
}

impl<L, C, S> VoteApp<L, C, S, IntervalTickSource>
where
    L: RecognizerLoader,
    C: Camera,
    S: Surface,
{
    /// Real-time app ticking every `config.tick_interval`
    pub fn with_interval_ticks(
        config: &RuntimeConfig,
        loader: L,
        camera: C,
        surface: S,
    ) -> Result<Self, ConfigError> {
        let ticks = IntervalTickSource::new(config.tick_interval);
        Self::new(config, loader, camera, surface, ticks)
    }
}
