use crate::view::{
    self, AlertView, ModelState, ViewSnapshot, CAMERA_ACCESS_MESSAGE, DETECTION_CYCLE_MESSAGE,
    MODEL_LOAD_MESSAGE,
};
use glance_core::{classify, Alert, AlertChange, AlertDebouncer, Classification};
use glance_hw::{
    CameraError, CameraProvider, CaptureRequest, Overlay, Surface, VideoSource, FACE_BOX_COLOR,
    FACE_BOX_WIDTH,
};
use glance_models::{FaceDetector, LandmarkEstimator, ModelError};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::{self, Runtime};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::{oneshot, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("camera access failed: {0}")]
    CameraAccess(#[from] CameraError),
    #[error("detection cycle failed: {0}")]
    DetectionCycle(String),
    #[error("models are still loading")]
    ModelsLoading,
    #[error("detection halted after an error; restart required")]
    SessionHalted,
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What one loop iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Detection is not running.
    Idle,
    /// The camera had no complete frame yet.
    NotReady,
    Rendered {
        faces: usize,
        classifications: Vec<Classification>,
        raised: Option<Alert>,
    },
}

enum Models<D, L> {
    Loading,
    Ready { detector: D, estimator: L },
    Failed(String),
}

/// All state of the capture and render loop, owned by a single control thread.
///
/// Holds the models, the camera stream (while detecting), the overlay surface
/// and the alert slot. Every mutation goes through `&mut self`, which keeps
/// the alert timer and the per-frame offer path serialized.
pub struct Session<P, D, L, C>
where
    P: CameraProvider,
    D: FaceDetector,
    L: LandmarkEstimator,
    C: Surface,
{
    provider: P,
    request: CaptureRequest,
    models: Models<D, L>,
    source: Option<P::Source>,
    surface: C,
    alerts: AlertDebouncer,
    halted: bool,
    error: Option<String>,
    frames: u64,
}

impl<P, D, L, C> Session<P, D, L, C>
where
    P: CameraProvider,
    D: FaceDetector,
    L: LandmarkEstimator,
    C: Surface,
{
    pub fn new(provider: P, request: CaptureRequest, surface: C) -> Self {
        Self {
            provider,
            request,
            models: Models::Loading,
            source: None,
            surface,
            alerts: AlertDebouncer::default(),
            halted: false,
            error: None,
            frames: 0,
        }
    }

    /// Record the outcome of model loading. A failure is permanent for the session.
    pub fn models_loaded(&mut self, result: Result<(D, L), ModelError>) {
        match result {
            Ok((detector, estimator)) => {
                tracing::info!("models ready");
                self.models = Models::Ready {
                    detector,
                    estimator,
                };
                self.error = None;
            }
            Err(e) => {
                tracing::error!(error = %e, "model load failed");
                self.models = Models::Failed(e.to_string());
                self.error = Some(MODEL_LOAD_MESSAGE.to_string());
            }
        }
    }

    pub fn model_state(&self) -> ModelState {
        match self.models {
            Models::Loading => ModelState::Loading,
            Models::Ready { .. } => ModelState::Ready,
            Models::Failed(_) => ModelState::Failed,
        }
    }

    pub fn is_detecting(&self) -> bool {
        self.source.is_some()
    }

    pub fn surface(&self) -> &C {
        &self.surface
    }

    /// Frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Acquire the camera and begin detecting. A camera failure leaves start available.
    pub fn start(&mut self) -> Result<(), EngineError> {
        match &self.models {
            Models::Loading => return Err(EngineError::ModelsLoading),
            Models::Failed(reason) => return Err(EngineError::ModelLoad(reason.clone())),
            Models::Ready { .. } => {}
        }
        if self.halted {
            return Err(EngineError::SessionHalted);
        }
        if self.is_detecting() {
            return Ok(());
        }

        let source = match self.provider.open(&self.request) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "camera access failed");
                self.error = Some(CAMERA_ACCESS_MESSAGE.to_string());
                return Err(EngineError::CameraAccess(e));
            }
        };

        let (width, height) = source.resolution();
        self.surface.resize(width, height);
        self.source = Some(source);
        self.error = None;

        tracing::info!(width, height, "detection started");
        Ok(())
    }

    /// Stop detecting and release the camera stream.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            tracing::info!(frames = self.frames, "detection stopped");
        }
    }

    /// When the alert timer next fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.alerts.deadline()
    }

    /// Timer path: clear the alert if its display time is over.
    pub fn service_timer(&mut self, now: Instant) -> AlertChange {
        self.alerts.expire(now)
    }

    /// Run one detect, classify and draw iteration.
    ///
    /// Any failure stops detection for good: the camera is released, the
    /// error message is set and later `start` calls are refused.
    pub fn step(&mut self, now: Instant) -> Result<StepOutcome, EngineError> {
        if !self.is_detecting() {
            return Ok(StepOutcome::Idle);
        }

        match self.cycle(now) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(error = %e, "detection cycle failed");
                self.stop();
                self.halted = true;
                self.error = Some(DETECTION_CYCLE_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    fn cycle(&mut self, now: Instant) -> Result<StepOutcome, EngineError> {
        let Models::Ready {
            detector,
            estimator,
        } = &mut self.models
        else {
            return Ok(StepOutcome::Idle);
        };
        let Some(source) = self.source.as_mut() else {
            return Ok(StepOutcome::Idle);
        };

        let Some(frame) = source
            .next_frame()
            .map_err(|e| EngineError::DetectionCycle(e.to_string()))?
        else {
            return Ok(StepOutcome::NotReady);
        };

        let faces = detector
            .detect(&frame)
            .map_err(|e| EngineError::DetectionCycle(e.to_string()))?;

        self.surface.clear();
        self.surface
            .draw_image(&frame)
            .map_err(|e| EngineError::DetectionCycle(e.to_string()))?;

        let mut classifications = Vec::new();
        let mut raised = None;

        if !faces.is_empty() {
            // Landmark sets line up with the detector's boxes by position.
            let sets = estimator
                .estimate(&frame, &faces)
                .map_err(|e| EngineError::DetectionCycle(e.to_string()))?;

            for (i, face) in faces.iter().enumerate() {
                if let Some(classification) = sets.get(i).and_then(classify) {
                    if let AlertChange::Raised(alert) = self.alerts.offer(&classification, now) {
                        raised = Some(alert);
                    }
                    classifications.push(classification);
                }
                self.surface.stroke_rect(face, FACE_BOX_COLOR, FACE_BOX_WIDTH);
            }
        }

        self.frames += 1;
        tracing::trace!(
            seq = frame.sequence,
            faces = faces.len(),
            frames = self.frames,
            "frame rendered"
        );

        Ok(StepOutcome::Rendered {
            faces: faces.len(),
            classifications,
            raised,
        })
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let models = self.model_state();
        let detecting = self.is_detecting();
        ViewSnapshot {
            models,
            detecting,
            start_enabled: models == ModelState::Ready && !detecting && !self.halted,
            start_label: view::start_label(models),
            alert: self.alerts.current().map(AlertView::from),
            error: self.error.clone(),
            frames: self.frames,
        }
    }
}

impl<P, D, L, C> Drop for Session<P, D, L, C>
where
    P: CameraProvider,
    D: FaceDetector,
    L: LandmarkEstimator,
    C: Surface,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Where rendered overlays are written, if anywhere.
#[derive(Debug, Clone, Default)]
pub struct OverlayOutput {
    pub dir: Option<PathBuf>,
    pub every: u64,
}

impl OverlayOutput {
    fn maybe_save(&self, overlay: &Overlay, frames: u64) {
        let Some(dir) = &self.dir else {
            return;
        };
        if self.every == 0 || frames % self.every != 0 {
            return;
        }
        let path = dir.join(format!("overlay-{frames:06}.png"));
        if let Err(e) = overlay.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write overlay");
        }
    }
}

/// Messages sent from handles to the engine thread.
enum EngineRequest {
    Start {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    state: watch::Receiver<ViewSnapshot>,
}

impl EngineHandle {
    /// Request camera start. Fails while models load, after a model or
    /// detection failure, or when the camera cannot be opened.
    pub async fn start(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Start { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request camera start, trying again after a camera failure each time
    /// the user asks for it through `retry`.
    ///
    /// `on_denied` runs after every camera failure, before waiting on `retry`.
    /// Any other failure, or `retry` closing, returns the last error.
    pub async fn start_with_retry<F>(
        &self,
        retry: &mut mpsc::Receiver<()>,
        mut on_denied: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(&EngineError),
    {
        loop {
            match self.start().await {
                Err(e @ EngineError::CameraAccess(_)) => {
                    on_denied(&e);
                    if retry.recv().await.is_none() {
                        return Err(e);
                    }
                    tracing::info!("retrying camera start");
                }
                other => return other,
            }
        }
    }

    /// Request a cooperative stop. Returns once the current iteration has finished.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Stop { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Ask the engine thread to release the camera and exit.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineRequest::Shutdown).await;
    }

    /// Latest published view state.
    pub fn snapshot(&self) -> ViewSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.state.clone()
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Models are loaded on that thread after spawn, so the handle is usable
/// immediately and reports `Loading` until `load_models` returns. The thread
/// then alternates between servicing requests and running one render
/// iteration; while idle it sleeps until a request arrives or the alert
/// timer is due.
pub fn spawn_engine<P, D, L, F>(
    provider: P,
    request: CaptureRequest,
    load_models: F,
    overlay: OverlayOutput,
) -> Result<EngineHandle, EngineError>
where
    P: CameraProvider + Send + 'static,
    D: FaceDetector + 'static,
    L: LandmarkEstimator + 'static,
    F: FnOnce() -> Result<(D, L), ModelError> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);
    let (state_tx, state_rx) = watch::channel(ViewSnapshot::default());

    std::thread::Builder::new()
        .name("glance-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            // Only drives the idle wait on the request channel.
            let rt = match runtime::Builder::new_current_thread().enable_time().build() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build engine runtime");
                    return;
                }
            };

            let surface = Overlay::new(request.width, request.height);
            let mut session: Session<P, D, L, Overlay> = Session::new(provider, request, surface);

            session.models_loaded(load_models());
            publish(&state_tx, &session);

            run_engine(&mut session, &rt, &mut rx, &state_tx, &overlay);

            session.stop();
            publish(&state_tx, &session);
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle {
        tx,
        state: state_rx,
    })
}

fn run_engine<P, D, L>(
    session: &mut Session<P, D, L, Overlay>,
    rt: &Runtime,
    rx: &mut mpsc::Receiver<EngineRequest>,
    state: &watch::Sender<ViewSnapshot>,
    overlay: &OverlayOutput,
) where
    P: CameraProvider,
    D: FaceDetector,
    L: LandmarkEstimator,
{
    loop {
        // Timer path runs before anything else at this instant.
        if session.service_timer(Instant::now()) != AlertChange::Unchanged {
            publish(state, session);
        }

        let next = if session.is_detecting() {
            match rx.try_recv() {
                Ok(req) => Some(req),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => return,
            }
        } else {
            let wait = session
                .deadline()
                .map(|d| d.saturating_duration_since(Instant::now()));
            // Outer `None` is the alert deadline passing, inner `None` a closed channel.
            let received = rt.block_on(async {
                match wait {
                    Some(wait) => tokio::time::timeout(wait, rx.recv()).await.ok(),
                    None => Some(rx.recv().await),
                }
            });
            match received {
                Some(Some(req)) => Some(req),
                Some(None) => return,
                None => None,
            }
        };

        // Publish before replying so callers observe the new state on return.
        if let Some(req) = next {
            match req {
                EngineRequest::Start { reply } => {
                    let result = session.start();
                    publish(state, session);
                    let _ = reply.send(result);
                }
                EngineRequest::Stop { reply } => {
                    session.stop();
                    publish(state, session);
                    let _ = reply.send(());
                }
                EngineRequest::Shutdown => return,
            }
            continue;
        }

        match session.step(Instant::now()) {
            Ok(StepOutcome::Rendered {
                faces,
                classifications,
                raised,
            }) => {
                if let Some(alert) = raised {
                    tracing::info!(
                        emotion = %alert.emotion,
                        confidence = alert.confidence,
                        faces,
                        "emotion alert"
                    );
                }
                tracing::trace!(?classifications, "classified");
                overlay.maybe_save(session.surface(), session.frames());
            }
            Ok(StepOutcome::NotReady) => std::thread::yield_now(),
            Ok(StepOutcome::Idle) => {}
            Err(_) => {}
        }
        publish(state, session);
    }
}

fn publish<P, D, L, C>(state: &watch::Sender<ViewSnapshot>, session: &Session<P, D, L, C>)
where
    P: CameraProvider,
    D: FaceDetector,
    L: LandmarkEstimator,
    C: Surface,
{
    let snapshot = session.snapshot();
    state.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
}
