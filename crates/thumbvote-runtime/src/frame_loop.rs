//! Capture/render loop and its resource lifecycle
//!
//! Startup acquires the engine, then the camera, then waits for stream
//! metadata. Every await is followed by a liveness check: a resource that
//! arrives after teardown is released on the spot and never installed.
//!
//! Each tick then runs to completion:
//! 1. Skip unless the stream has a current frame
//! 2. Draw the frame (the preview never freezes, whatever the mode)
//! 3. Classify and feed the controller, only while `Recognizing`. A failed
//!    classification feeds "no gesture", so it breaks a hold like a gap does.
//!
//! Teardown stops every track, closes the engine and removes the viewport
//! listener. It is idempotent.

use std::time::Duration;

use thumbvote_core::{FrameObservation, LoadingPhase, SessionError, Timestamp};
use thumbvote_gesture::{HoldOutput, ObservationPolicy};
use thumbvote_time::{Generation, Liveness};
use tracing::{debug, info, warn};

use crate::{
    Camera, CameraConstraints, Dimensions, EngineConfig, EngineSlot, ListenerId, Recognizer,
    RecognizerLoader, SessionController, Surface, VideoStream,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub frames_skipped: u64,
    pub frames_drawn: u64,
    pub frames_classified: u64,
    pub classification_errors: u64,
    pub confirmations: u64,
    pub resizes: u64,
}

/// How startup ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Camera streaming at the given source dimensions
    Ready(Dimensions),
    /// Session moved to `Error`
    Failed(SessionError),
    /// Torn down while a step was in flight
    Aborted,
}

impl StartupOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, StartupOutcome::Ready(_))
    }
}

/// What a single tick did
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickReport {
    /// No stream attached
    Idle,
    /// Stream not ready yet
    NotReady,
    /// Frame drawn, no classification this tick
    Drawn,
    /// Frame classified and fed to the controller
    Classified(HoldOutput),
    /// Engine failed on this frame; the hold was reset and the loop keeps going
    ClassificationFailed,
}

/// Capture/render loop
pub struct FrameLoop<L, C, S>
where
    L: RecognizerLoader,
    C: Camera,
    S: Surface,
{
    loader: L,
    camera: C,
    surface: S,
    engine: EngineSlot<L::Engine>,
    stream: Option<C::Stream>,
    viewport_listener: Option<ListenerId>,
    source: Dimensions,
    policy: ObservationPolicy,
    engine_config: EngineConfig,
    constraints: CameraConstraints,
    liveness: Liveness,
    last_engine_timestamp: Option<Timestamp>,
    stats: LoopStats,
}

impl<L, C, S> FrameLoop<L, C, S>
where
    L: RecognizerLoader,
    C: Camera,
    S: Surface,
{
    pub fn new(
        loader: L,
        camera: C,
        surface: S,
        engine_config: EngineConfig,
        constraints: CameraConstraints,
        policy: ObservationPolicy,
        liveness: Liveness,
    ) -> Self {
        FrameLoop {
            loader,
            camera,
            surface,
            engine: EngineSlot::Unloaded,
            stream: None,
            viewport_listener: None,
            source: Dimensions::default(),
            policy,
            engine_config,
            constraints,
            liveness,
            last_engine_timestamp: None,
            stats: LoopStats::default(),
        }
    }

    /// Acquire the engine and the camera
    ///
    /// Anything still held from a previous start is released first.
    pub async fn start(&mut self, controller: &mut SessionController) -> StartupOutcome {
        self.teardown();
        let generation = self.liveness.generation();
        info!(delegate = ?self.engine_config.delegate, "starting capture session");

        // Stage 1: engine
        controller.enter_loading(LoadingPhase::LoadingModel);
        self.engine.begin_loading();
        let loaded = self.loader.load(&self.engine_config).await;
        if !self.liveness.is_live(generation) {
            if let Ok(mut engine) = loaded {
                engine.close();
            }
            return self.abort("engine load");
        }
        match loaded {
            Ok(engine) => {
                self.engine.install(engine);
                info!("recognition engine ready");
            }
            Err(err) => {
                self.engine.fail(err.clone());
                return fail_session(controller, err.into());
            }
        }

        // Stage 2: camera
        controller.enter_loading(LoadingPhase::StartingCamera);
        let opened = self.camera.open(&self.constraints).await;
        if !self.liveness.is_live(generation) {
            if let Ok(mut stream) = opened {
                stream.stop_tracks();
            }
            return self.abort("camera open");
        }
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => return fail_session(controller, err.into()),
        };

        // Stage 3: stream metadata
        let ready = stream.wait_ready().await;
        if !self.liveness.is_live(generation) {
            stream.stop_tracks();
            return self.abort("stream metadata");
        }
        let source = match ready {
            Ok(source) => source,
            Err(err) => {
                stream.stop_tracks();
                return fail_session(controller, err.into());
            }
        };

        self.source = source;
        self.surface.resize(source);
        self.stream = Some(stream);
        self.viewport_listener = Some(self.surface.add_viewport_listener());
        controller.enter_recognizing();
        info!(%source, "camera streaming");
        StartupOutcome::Ready(source)
    }

    /// One frame of work
    pub fn tick(&mut self, now: Timestamp, controller: &mut SessionController) -> TickReport {
        self.stats.ticks += 1;
        let Some(stream) = self.stream.as_mut() else {
            return TickReport::Idle;
        };

        // Stage 1: readiness
        if !stream.ready_state().has_current_frame() {
            self.stats.frames_skipped += 1;
            return TickReport::NotReady;
        }
        let Some(frame) = stream.current_frame().filter(|f| !f.dimensions.is_empty()) else {
            self.stats.frames_skipped += 1;
            return TickReport::NotReady;
        };

        // Stage 2: draw
        self.surface.draw_frame(&frame);
        self.stats.frames_drawn += 1;

        // Stage 3: classify
        if !controller.mode().accepts_observations() || !self.engine.is_ready() {
            return TickReport::Drawn;
        }
        let timestamp = self.next_engine_timestamp(now);
        let Some(engine) = self.engine.ready_mut() else {
            return TickReport::Drawn;
        };
        match engine.classify(&frame, timestamp) {
            Ok(classification) => {
                self.stats.frames_classified += 1;
                if classification.has_hands() {
                    self.surface.draw_landmarks(&classification.landmarks);
                }
                let obs = self.policy.reduce(&classification, timestamp);
                let out = controller.observe(&obs);
                if out.is_confirmed() {
                    self.stats.confirmations += 1;
                }
                TickReport::Classified(out)
            }
            Err(err) => {
                self.stats.classification_errors += 1;
                warn!(error = %err, frame = frame.sequence, "classification failed; hold reset");
                // Same debounce rule as a lost hand
                controller.observe(&FrameObservation::empty(timestamp));
                TickReport::ClassificationFailed
            }
        }
    }

    /// Viewport changed size; match the surface to the source again
    pub fn on_viewport_resize(&mut self) -> bool {
        if self.viewport_listener.is_none() || self.source.is_empty() {
            return false;
        }
        self.surface.resize(self.source);
        self.stats.resizes += 1;
        true
    }

    /// Release every acquired resource
    pub fn teardown(&mut self) {
        let stopped = self
            .stream
            .take()
            .map(|mut stream| stream.stop_tracks())
            .unwrap_or(0);
        let closed = self.engine.release();
        let listener = self.viewport_listener.take();
        if let Some(id) = listener {
            self.surface.remove_viewport_listener(id);
        }
        self.last_engine_timestamp = None;

        if stopped > 0 || closed || listener.is_some() {
            info!(tracks_stopped = stopped, engine_closed = closed, "capture resources released");
        }
    }

    /// Engine timestamps must strictly increase
    fn next_engine_timestamp(&mut self, now: Timestamp) -> Timestamp {
        let timestamp = match self.last_engine_timestamp {
            Some(last) if now <= last => last.saturating_add(Duration::from_micros(1)),
            _ => now,
        };
        self.last_engine_timestamp = Some(timestamp);
        timestamp
    }

    fn abort(&mut self, step: &'static str) -> StartupOutcome {
        debug!(step, "startup continuation is stale");
        self.teardown();
        StartupOutcome::Aborted
    }

    pub fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    pub fn engine_state(&self) -> &'static str {
        self.engine.name()
    }

    pub fn source_dimensions(&self) -> Dimensions {
        self.source
    }

    pub fn generation(&self) -> Generation {
        self.liveness.generation()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn stream(&self) -> Option<&C::Stream> {
        self.stream.as_ref()
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }
}

fn fail_session(controller: &mut SessionController, err: SessionError) -> StartupOutcome {
    controller.fail(err.clone());
    StartupOutcome::Failed(err)
}

impl<L, C, S> Drop for FrameLoop<L, C, S>
where
    L: RecognizerLoader,
    C: Camera,
    S: Surface,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
