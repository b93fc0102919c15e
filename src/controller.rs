//! # Session Controller
//!
//! Drives one camera session from launch to a single result.
//!
//! ```text
//! Initializing -> ConfiguringEngine -> AwaitingSession -> SessionActive -> Finalizing -> Terminal
//! ```
//!
//! Engine callbacks may arrive concurrently on any thread. Every state change
//! goes through one mutex, and `Terminal` is absorbing: once a result has
//! been produced, stray engine events are dropped. Notifications that arrive
//! before the session's observers are registered are held back and replayed
//! in arrival order before the session goes active.
//!
//! ```rust,ignore
//! let controller = SessionController::new(configuration, LaunchMode::Capture, engine, listener);
//! let completion = controller.take_completion().unwrap();
//! controller.start().await;
//! let response = completion.await?;
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use crate::action::{LaunchAction, LaunchMode};
use crate::affordances::Affordances;
use crate::configuration::{Configuration, LaunchData};
use crate::engine::{
    CameraEngine, CarouselEvent, EngineEvents, EngineSession, Lens, SessionHandle, StartRequest,
};
use crate::error::{LensKitError, Result};
use crate::events::{SessionEvent, SessionEventStream};
use crate::failure::{translate, EngineFailure};
use crate::guard::LensApplicationGuard;
use crate::listener::CameraListener;
use crate::response::{
    CaptureResult, MediaCapture, Response, DEFAULT_IMAGE_MEDIA_TYPE, DEFAULT_VIDEO_MEDIA_TYPE,
};
use crate::scope::{ResourceScope, Subscription};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Captured,
    Cancelled,
    Failed,
}

impl SessionOutcome {
    fn of(result: &CaptureResult) -> Self {
        match result {
            CaptureResult::Success(_) => Self::Captured,
            CaptureResult::Failure(_) => Self::Failed,
            CaptureResult::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    ConfiguringEngine,
    AwaitingSession,
    SessionActive,
    Finalizing,
    Terminal(SessionOutcome),
}

impl SessionState {
    /// True once a result has been chosen
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finalizing | Self::Terminal(_))
    }
}

/// Compile a prefetch pattern so it only matches whole lens ids
pub fn prefetch_matcher(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| LensKitError::InvalidPattern(e.to_string()))
}

enum Notification {
    Lenses(Vec<Lens>),
    Carousel(CarouselEvent),
    Captured(MediaCapture),
}

struct Inner {
    configuration: Configuration,
    action: LaunchAction,
    engine: Arc<dyn CameraEngine>,
    listener: CameraListener,
    launch_data: LaunchData,
    prefetch: Option<Regex>,
    guard: LensApplicationGuard,
    scope: ResourceScope,
    state: Mutex<SessionState>,
    affordances: Mutex<Affordances>,
    session: Mutex<Option<SessionHandle>>,
    deferred: Mutex<Vec<Notification>>,
    completion: Mutex<Option<oneshot::Sender<Response>>>,
    completion_rx: Mutex<Option<oneshot::Receiver<Response>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
}

/// One camera session. Cheap to clone; clones drive the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("action", &self.inner.action)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

impl SessionController {
    /// Create a controller and derive its UI affordances. The engine is not
    /// touched until [`SessionController::start`].
    pub fn new(
        configuration: Configuration,
        mode: LaunchMode,
        engine: Arc<dyn CameraEngine>,
        listener: CameraListener,
    ) -> Self {
        let action = LaunchAction::for_configuration(&configuration, mode);
        let prefetch = configuration
            .prefetch_pattern()
            .filter(|pattern| !pattern.is_empty())
            .and_then(|pattern| match prefetch_matcher(pattern) {
                Ok(matcher) => Some(matcher),
                Err(e) => {
                    warn!(pattern, error = %e, "prefetch disabled");
                    None
                }
            });
        let launch_data = configuration.launch_data().cloned().unwrap_or_default();
        let guard = LensApplicationGuard::new(configuration.target_lens_id().map(str::to_string));
        let affordances = Affordances::derive(&configuration, mode);

        let (completion, completion_rx) = oneshot::channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let controller = Self {
            inner: Arc::new(Inner {
                configuration,
                action,
                engine,
                listener,
                launch_data,
                prefetch,
                guard,
                scope: ResourceScope::new(),
                state: Mutex::new(SessionState::Initializing),
                affordances: Mutex::new(affordances),
                session: Mutex::new(None),
                deferred: Mutex::new(Vec::new()),
                completion: Mutex::new(Some(completion)),
                completion_rx: Mutex::new(Some(completion_rx)),
                events,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        };

        controller
            .inner
            .transition(SessionState::Initializing, SessionState::ConfiguringEngine);
        let camera = controller.inner.configuration.camera();
        info!(
            action = %action,
            has_api_token = camera.api_token.is_some(),
            lens_groups = controller.inner.configuration.lens_group_ids().len(),
            target_lens = ?controller.inner.configuration.target_lens_id(),
            "session configured"
        );
        controller
    }

    /// Ask the engine to start. Initialization failures finalize the session.
    pub async fn start(&self) {
        let inner = &self.inner;
        if !inner.transition(SessionState::ConfiguringEngine, SessionState::AwaitingSession) {
            debug!(state = ?self.state(), "session already past engine start");
            return;
        }

        let camera = inner.configuration.camera();
        let request = StartRequest {
            api_token: camera.api_token.clone(),
            facing_front: camera.facing_front,
            facing_based_on_lens: camera.facing_based_on_lens,
            affordances: inner.affordances.lock().clone(),
        };
        let events: Arc<dyn EngineEvents> = Arc::new(ControllerEvents {
            inner: Arc::downgrade(inner),
        });

        if let Err(failure) = inner.engine.start(request, events).await {
            error!(error = %failure, "camera engine failed to start");
            inner.finish(CaptureResult::Failure(translate(&failure)));
        }
    }

    /// Finish with `Cancelled`. Returns false if a result was already chosen.
    pub fn cancel(&self) -> bool {
        info!("session cancelled by caller");
        self.inner.finish(CaptureResult::Cancelled)
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub fn action(&self) -> LaunchAction {
        self.inner.action
    }

    pub fn configuration(&self) -> &Configuration {
        &self.inner.configuration
    }

    /// Current affordances. The carousel is disabled once a single-lens
    /// session has applied its lens.
    pub fn affordances(&self) -> Affordances {
        self.inner.affordances.lock().clone()
    }

    pub fn is_lens_applied(&self) -> bool {
        self.inner.guard.is_applied()
    }

    /// Receiver for the one response this session produces. Available once.
    pub fn take_completion(&self) -> Option<oneshot::Receiver<Response>> {
        self.inner.completion_rx.lock().take()
    }

    /// Stream of session events. Available once.
    pub fn take_events(&self) -> Option<SessionEventStream> {
        self.inner
            .events_rx
            .lock()
            .take()
            .map(|rx| Box::pin(UnboundedReceiverStream::new(rx)) as SessionEventStream)
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        {
            let mut state = self.state.lock();
            if *state != from {
                return false;
            }
            *state = to;
        }
        debug!(?from, ?to, "session state changed");
        self.emit(SessionEvent::state_changed(from, to));
        true
    }

    /// Keep `handle` in the scope, or release it right away if the session
    /// has already finished.
    fn adopt(&self, name: &'static str, handle: Box<dyn Subscription>) -> bool {
        match self.scope.try_register(name, handle) {
            Ok(()) => true,
            Err(rejected) => {
                debug!(name, "session finished, releasing late subscription");
                if let Err(e) = rejected.close() {
                    warn!(name, error = %e, "failed to release late subscription");
                }
                false
            }
        }
    }

    fn on_session_available(self: &Arc<Self>, session: Arc<dyn EngineSession>) {
        let state = *self.state.lock();
        if state != SessionState::AwaitingSession {
            debug!(?state, "ignoring session availability");
            return;
        }
        {
            let mut slot = self.session.lock();
            if slot.is_some() {
                warn!("engine reported a second session, ignoring");
                return;
            }
            *slot = Some(SessionHandle::new(Arc::clone(&session)));
        }

        let weak = Arc::downgrade(self);
        let repository = session.observe_lenses(
            &self.configuration.lens_group_ids(),
            Box::new(move |lenses| {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch(Notification::Lenses(lenses));
                }
            }),
        );
        if !self.adopt("lens_repository", repository) {
            self.session.lock().take();
            return;
        }

        let weak = Arc::downgrade(self);
        let carousel = session.observe_carousel(Box::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(Notification::Carousel(event));
            }
        }));
        if !self.adopt("lens_carousel", carousel) {
            self.session.lock().take();
            return;
        }

        session.start_preview(self.configuration.camera().facing_front);

        // Notifications raised while replaying are deferred behind the rest
        // of the queue. The session goes active only once the queue is empty.
        let mut replayed = 0;
        loop {
            let pending = {
                let mut state = self.state.lock();
                if *state != SessionState::AwaitingSession {
                    return;
                }
                let pending = std::mem::take(&mut *self.deferred.lock());
                if pending.is_empty() {
                    *state = SessionState::SessionActive;
                    break;
                }
                pending
            };
            replayed += pending.len();
            for notification in pending {
                self.handle(notification);
            }
        }
        debug!(
            from = ?SessionState::AwaitingSession,
            to = ?SessionState::SessionActive,
            replayed,
            "session state changed"
        );
        self.emit(SessionEvent::state_changed(
            SessionState::AwaitingSession,
            SessionState::SessionActive,
        ));
    }

    fn is_finished(&self) -> bool {
        self.state.lock().is_finished()
    }

    fn dispatch(self: &Arc<Self>, notification: Notification) {
        {
            let state = self.state.lock();
            match *state {
                SessionState::SessionActive => {}
                SessionState::Finalizing | SessionState::Terminal(_) => {
                    debug!(state = ?*state, "ignoring engine notification after session end");
                    return;
                }
                _ => {
                    self.deferred.lock().push(notification);
                    return;
                }
            }
        }
        self.handle(notification);
    }

    fn handle(self: &Arc<Self>, notification: Notification) {
        if self.is_finished() {
            debug!("session ended before notification was handled");
            return;
        }
        match notification {
            Notification::Lenses(lenses) => self.on_lenses(lenses),
            Notification::Carousel(CarouselEvent::ActivatedWithLens { lens_id }) => {
                debug!(lens_id = %lens_id, "carousel activated lens");
                self.listener.notify_lens_change(&lens_id);
                self.emit(SessionEvent::lens_changed(lens_id));
            }
            Notification::Carousel(CarouselEvent::Other) => {}
            Notification::Captured(media) => self.on_captured(media),
        }
    }

    fn on_lenses(&self, lenses: Vec<Lens>) {
        let Some(session) = self.session.lock().as_ref().map(SessionHandle::session) else {
            return;
        };

        if self.is_finished() {
            return;
        }
        let applied = self.guard.offer(&lenses, |lens| {
            info!(lens_id = %lens.id, group_id = %lens.group_id, "applying lens");
            session.apply_lens(lens, &self.launch_data);
        });
        if applied {
            if let Some(target) = self.guard.target() {
                self.emit(SessionEvent::lens_applied(target));
                if self.configuration.single_lens_mode() {
                    self.affordances.lock().carousel.enabled = false;
                    self.emit(SessionEvent::carousel_locked(target));
                }
            }
        }

        if let Some(matcher) = &self.prefetch {
            let matched: Vec<Lens> = lenses
                .iter()
                .filter(|lens| matcher.is_match(&lens.id))
                .cloned()
                .collect();
            if matched.is_empty() {
                return;
            }

            let lens_ids: Vec<String> = matched.iter().map(|lens| lens.id.clone()).collect();
            debug!(count = lens_ids.len(), "prefetching lenses");
            let handle = session.prefetch(&matched);
            if self.adopt("prefetch", handle) {
                self.emit(SessionEvent::prefetch_started(lens_ids));
            }
        }
    }

    fn on_captured(&self, media: MediaCapture) {
        if let MediaCapture::Image { uri, .. } = &media {
            self.listener.notify_image_captured(uri);
            if self.listener.shows_default_preview() {
                self.emit(SessionEvent::preview_requested(uri.as_str()));
            }
        }
        info!(uri = %media.uri(), media_type = %media.media_type(), "media captured");
        self.finish(CaptureResult::Success(media));
    }

    fn on_error(&self, failure: EngineFailure) {
        let error = translate(&failure);
        error!(kind = error.kind().as_str(), cause = %failure, "camera engine failure");
        self.finish(CaptureResult::Failure(error));
    }

    /// Produce the session's only result. Whoever moves the state into
    /// `Finalizing` wins; every later caller is a no-op.
    fn finish(&self, result: CaptureResult) -> bool {
        let from = {
            let mut state = self.state.lock();
            if state.is_finished() {
                debug!(state = ?*state, "result already chosen");
                return false;
            }
            let from = *state;
            *state = SessionState::Finalizing;
            from
        };
        self.emit(SessionEvent::state_changed(from, SessionState::Finalizing));

        let outcome = SessionOutcome::of(&result);
        let response = Response::from(&result);

        let released = self.scope.release_all();
        self.session.lock().take();
        self.deferred.lock().clear();
        debug!(released, "session resources released");

        let terminal = SessionState::Terminal(outcome);
        *self.state.lock() = terminal;
        self.emit(SessionEvent::state_changed(SessionState::Finalizing, terminal));
        self.emit(SessionEvent::finished(outcome));
        info!(?outcome, "session finished");

        if let Some(completion) = self.completion.lock().take() {
            if completion.send(response).is_err() {
                debug!("launch caller went away before completion");
            }
        }
        true
    }
}

struct ControllerEvents {
    inner: Weak<Inner>,
}

impl EngineEvents for ControllerEvents {
    fn session_available(&self, session: Arc<dyn EngineSession>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_session_available(session);
        }
    }

    fn image_captured(&self, uri: String, media_type: Option<String>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch(Notification::Captured(MediaCapture::Image {
                uri,
                media_type: media_type.unwrap_or_else(|| DEFAULT_IMAGE_MEDIA_TYPE.to_string()),
            }));
        }
    }

    fn video_captured(&self, uri: String, media_type: Option<String>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch(Notification::Captured(MediaCapture::Video {
                uri,
                media_type: media_type.unwrap_or_else(|| DEFAULT_VIDEO_MEDIA_TYPE.to_string()),
            }));
        }
    }

    fn error(&self, failure: EngineFailure) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_error(failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{CameraOptions, WithLens, WithLenses};
    use crate::failure::EngineErrorKind;
    use crate::fake_engine::{FakeEngineBuilder, FakeEngineController};
    use crate::response::ResultContract;
    use tokio_stream::StreamExt;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn lens(id: &str) -> Lens {
        Lens::new(id, "G1")
    }

    fn controller_for(
        configuration: impl Into<Configuration>,
        mode: LaunchMode,
        builder: FakeEngineBuilder,
    ) -> (SessionController, FakeEngineController) {
        init_tracing();
        let (engine, control) = builder.build();
        let controller =
            SessionController::new(configuration.into(), mode, Arc::new(engine), CameraListener::new());
        (controller, control)
    }

    async fn active(
        configuration: impl Into<Configuration>,
        mode: LaunchMode,
    ) -> (SessionController, FakeEngineController) {
        let (controller, control) = controller_for(configuration, mode, FakeEngineBuilder::new());
        controller.start().await;
        control.make_session_available();
        assert_eq!(controller.state(), SessionState::SessionActive);
        (controller, control)
    }

    #[test]
    fn test_prefetch_matcher_is_anchored() {
        let matcher = prefetch_matcher("lens_.*").unwrap();
        assert!(matcher.is_match("lens_1"));
        assert!(!matcher.is_match("xlens_1"));

        let matcher = prefetch_matcher("a|b").unwrap();
        assert!(matcher.is_match("a"));
        assert!(!matcher.is_match("ab"));
    }

    #[test]
    fn test_prefetch_matcher_rejects_invalid_pattern() {
        assert!(matches!(
            prefetch_matcher("lens_("),
            Err(LensKitError::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn test_construction_configures_engine() {
        let (controller, control) = controller_for(
            WithLens::new("42", "G1"),
            LaunchMode::Capture,
            FakeEngineBuilder::new(),
        );

        assert_eq!(controller.state(), SessionState::ConfiguringEngine);
        assert_eq!(controller.action(), LaunchAction::CaptureWithLens);
        assert!(control.start_requests().is_empty());
    }

    #[tokio::test]
    async fn test_start_passes_camera_options() {
        let configuration = WithLenses::new(["G1"]).unwrap().camera(CameraOptions {
            api_token: Some("token-1".to_string()),
            facing_front: false,
            facing_based_on_lens: true,
            ..CameraOptions::default()
        });
        let (controller, control) =
            controller_for(configuration, LaunchMode::Play, FakeEngineBuilder::new());
        controller.start().await;

        let requests = control.start_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].api_token.as_deref(), Some("token-1"));
        assert!(!requests[0].facing_front);
        assert!(requests[0].facing_based_on_lens);
        assert!(!requests[0].affordances.capture_button_visible);
        assert_eq!(controller.state(), SessionState::AwaitingSession);
    }

    #[tokio::test]
    async fn test_single_lens_capture_happy_path() {
        let (controller, control) = active(WithLens::new("42", "G1"), LaunchMode::Capture).await;
        let completion = controller.take_completion().unwrap();

        assert_eq!(control.previews(), vec![true]);
        control.publish_lenses(vec![lens("7"), lens("42")]);
        assert_eq!(control.applied_lenses(), vec!["42".to_string()]);
        assert!(!controller.affordances().carousel.enabled);

        control.capture_image("file:///cache/1.jpg", None);

        let result = CaptureResult::from_response(completion.await.unwrap());
        assert_eq!(
            result,
            CaptureResult::Success(MediaCapture::Image {
                uri: "file:///cache/1.jpg".to_string(),
                media_type: "image/jpeg".to_string(),
            })
        );
        assert_eq!(
            controller.state(),
            SessionState::Terminal(SessionOutcome::Captured)
        );
        assert_eq!(control.released(), vec!["lenses", "carousel"]);
    }

    #[tokio::test]
    async fn test_target_applied_once_across_refreshes() {
        let (controller, control) = active(
            WithLenses::new(["G1"]).unwrap().apply_lens_by_id("42"),
            LaunchMode::Capture,
        )
        .await;

        control.publish_lenses(vec![lens("1")]);
        control.publish_lenses(vec![lens("1"), lens("42")]);
        control.publish_lenses(vec![lens("42")]);

        assert_eq!(control.applied_lenses(), vec!["42".to_string()]);
        assert!(controller.is_lens_applied());
        assert!(controller.affordances().carousel.enabled);
    }

    #[tokio::test]
    async fn test_launch_data_reaches_engine() {
        let launch_data = LaunchData::new().with_string("sku", "a-1");
        let (_controller, control) = active(
            WithLens::new("42", "G1").launch_data(launch_data.clone()),
            LaunchMode::Play,
        )
        .await;

        control.publish_lenses(vec![lens("42")]);
        assert_eq!(control.applied_launch_data(), vec![launch_data]);
    }

    #[tokio::test]
    async fn test_missing_target_is_not_a_failure() {
        let (controller, control) = active(WithLens::new("42", "G1"), LaunchMode::Capture).await;

        control.publish_lenses(vec![lens("1"), lens("2")]);
        assert!(control.applied_lenses().is_empty());
        assert_eq!(controller.state(), SessionState::SessionActive);
    }

    #[tokio::test]
    async fn test_prefetch_filters_by_full_match() {
        let (controller, control) = active(
            WithLenses::new(["G1"]).unwrap().prefetch_lens_by_id_pattern("lens_.*"),
            LaunchMode::Capture,
        )
        .await;

        control.publish_lenses(vec![lens("lens_1"), lens("other"), lens("xlens_2"), lens("lens_3")]);
        assert_eq!(
            control.prefetched(),
            vec![vec!["lens_1".to_string(), "lens_3".to_string()]]
        );

        controller.cancel();
        assert_eq!(control.released(), vec!["lenses", "carousel", "prefetch"]);
    }

    #[tokio::test]
    async fn test_prefetch_with_no_match_requests_nothing() {
        let (_controller, control) = active(
            WithLenses::new(["G1"]).unwrap().prefetch_lens_by_id_pattern("lens_.*"),
            LaunchMode::Capture,
        )
        .await;

        control.publish_lenses(vec![lens("other")]);
        assert!(control.prefetched().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_prefetch_pattern_disables_prefetch() {
        let (controller, control) = active(
            WithLenses::new(["G1"]).unwrap().prefetch_lens_by_id_pattern("lens_("),
            LaunchMode::Capture,
        )
        .await;

        control.publish_lenses(vec![lens("lens_(")]);
        assert!(control.prefetched().is_empty());
        assert_eq!(controller.state(), SessionState::SessionActive);
    }

    #[tokio::test]
    async fn test_carousel_activation_notifies_listener() {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&changes);
        let (engine, control) = FakeEngineBuilder::new().build();
        let controller = SessionController::new(
            WithLenses::new(["G1"]).unwrap().into(),
            LaunchMode::Capture,
            Arc::new(engine),
            CameraListener::new().on_lens_change(move |id| seen.lock().push(id.to_string())),
        );
        controller.start().await;
        control.make_session_available();

        control.activate_lens("7");
        control.publish_carousel(CarouselEvent::Other);
        control.activate_lens("9");

        assert_eq!(*changes.lock(), vec!["7".to_string(), "9".to_string()]);
    }

    #[tokio::test]
    async fn test_video_capture_defaults_media_type() {
        let (controller, control) = active(WithLenses::new(["G1"]).unwrap(), LaunchMode::Capture).await;
        let completion = controller.take_completion().unwrap();

        control.capture_video("file:///cache/2.mp4", None);

        let result = CaptureResult::from_response(completion.await.unwrap());
        assert_eq!(
            result,
            CaptureResult::Success(MediaCapture::Video {
                uri: "file:///cache/2.mp4".to_string(),
                media_type: "video/mp4".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_image_capture_requests_default_preview() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&captured);
        let (engine, control) = FakeEngineBuilder::new().build();
        let controller = SessionController::new(
            WithLenses::new(["G1"]).unwrap().into(),
            LaunchMode::Capture,
            Arc::new(engine),
            CameraListener::new().on_image_captured(move |uri| seen.lock().push(uri.to_string())),
        );
        let mut events = controller.take_events().unwrap();
        controller.start().await;
        control.make_session_available();
        control.capture_image("file:///cache/1.jpg", Some("image/png"));

        assert_eq!(*captured.lock(), vec!["file:///cache/1.jpg".to_string()]);

        let mut saw_preview = false;
        while let Some(event) = events.next().await {
            if let SessionEvent::PreviewRequested { uri, .. } = &event {
                assert_eq!(uri, "file:///cache/1.jpg");
                saw_preview = true;
            }
            if matches!(event, SessionEvent::Finished { .. }) {
                break;
            }
        }
        assert!(saw_preview);
    }

    #[tokio::test]
    async fn test_engine_error_finalizes_with_failure() {
        let (controller, control) = active(WithLenses::new(["G1"]).unwrap(), LaunchMode::Capture).await;
        let completion = controller.take_completion().unwrap();

        control.fail(EngineFailure::DeviceNotSupported("no GLES3".to_string()));

        match CaptureResult::from_response(completion.await.unwrap()) {
            CaptureResult::Failure(error) => {
                assert_eq!(error.kind(), EngineErrorKind::DeviceNotSupported);
            }
            other => panic!("Expected Failure, got {:?}", other),
        }
        assert_eq!(controller.state(), SessionState::Terminal(SessionOutcome::Failed));
        assert_eq!(control.released(), vec!["lenses", "carousel"]);
    }

    #[tokio::test]
    async fn test_start_failure_is_reported() {
        let (controller, control) = controller_for(
            WithLenses::new(["G1"]).unwrap(),
            LaunchMode::Capture,
            FakeEngineBuilder::new().fail_start(EngineFailure::UnauthorizedApplication(
                "bad token".to_string(),
            )),
        );
        let completion = controller.take_completion().unwrap();
        controller.start().await;

        match CaptureResult::from_response(completion.await.unwrap()) {
            CaptureResult::Failure(error) => {
                assert_eq!(error.kind(), EngineErrorKind::Unauthorized);
            }
            other => panic!("Expected Failure, got {:?}", other),
        }
        assert!(control.released().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_absorbs_late_events() {
        let (controller, control) = active(WithLens::new("42", "G1"), LaunchMode::Capture).await;
        let mut completion = controller.take_completion().unwrap();

        control.capture_image("file:///cache/1.jpg", None);
        control.fail(EngineFailure::Graphics("context lost".to_string()));
        control.capture_video("file:///cache/2.mp4", None);
        control.publish_lenses(vec![lens("42")]);
        assert!(!controller.cancel());

        assert_eq!(
            controller.state(),
            SessionState::Terminal(SessionOutcome::Captured)
        );
        let response = completion.try_recv().unwrap();
        assert!(matches!(
            CaptureResult::from_response(response),
            CaptureResult::Success(MediaCapture::Image { .. })
        ));
        assert!(control.applied_lenses().is_empty());
        assert_eq!(control.released(), vec!["lenses", "carousel"]);
    }

    #[tokio::test]
    async fn test_cancel_while_awaiting_session() {
        let (controller, control) = controller_for(
            WithLenses::new(["G1"]).unwrap(),
            LaunchMode::Capture,
            FakeEngineBuilder::new(),
        );
        let completion = controller.take_completion().unwrap();
        controller.start().await;

        assert!(controller.cancel());
        assert!(!controller.cancel());
        assert_eq!(
            CaptureResult::from_response(completion.await.unwrap()),
            CaptureResult::Cancelled
        );

        control.make_session_available();
        assert_eq!(
            controller.state(),
            SessionState::Terminal(SessionOutcome::Cancelled)
        );
        assert_eq!(control.open_observers(), 0);
        assert!(control.released().is_empty());
        assert!(controller.inner.scope.is_closed());
        assert_eq!(controller.inner.scope.release_all(), 0);
    }

    #[tokio::test]
    async fn test_cancel_releases_active_session_once() {
        let (controller, control) = active(WithLenses::new(["G1"]).unwrap(), LaunchMode::Capture).await;

        assert!(controller.cancel());
        assert!(!controller.cancel());
        control.fail(EngineFailure::Graphics("lost".to_string()));

        assert_eq!(control.released(), vec!["lenses", "carousel"]);
        assert_eq!(controller.inner.scope.release_all(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_start_skips_engine() {
        let (controller, control) = controller_for(
            WithLenses::new(["G1"]).unwrap(),
            LaunchMode::Play,
            FakeEngineBuilder::new(),
        );
        controller.cancel();
        controller.start().await;

        assert!(control.start_requests().is_empty());
    }

    #[tokio::test]
    async fn test_notifications_during_registration_are_replayed() {
        let (controller, control) = controller_for(
            WithLens::new("42", "G1"),
            LaunchMode::Capture,
            FakeEngineBuilder::new().lenses_on_observe(vec![lens("42")]),
        );
        controller.start().await;
        control.make_session_available();

        assert_eq!(controller.state(), SessionState::SessionActive);
        assert_eq!(control.applied_lenses(), vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn test_notifications_raised_during_replay_keep_arrival_order() {
        init_tracing();
        let (engine, control) = FakeEngineBuilder::new()
            .carousel_on_observe(vec![
                CarouselEvent::ActivatedWithLens { lens_id: "7".to_string() },
                CarouselEvent::ActivatedWithLens { lens_id: "9".to_string() },
            ])
            .build();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&changes);
        let engine_side = control.clone();
        let controller = SessionController::new(
            WithLenses::new(["G1"]).unwrap().into(),
            LaunchMode::Capture,
            Arc::new(engine),
            CameraListener::new().on_lens_change(move |id| {
                seen.lock().push(id.to_string());
                if id == "7" {
                    engine_side.activate_lens("8");
                }
            }),
        );
        controller.start().await;
        control.make_session_available();

        assert_eq!(
            *changes.lock(),
            vec!["7".to_string(), "9".to_string(), "8".to_string()]
        );
        assert_eq!(controller.state(), SessionState::SessionActive);
    }

    #[tokio::test]
    async fn test_notification_handled_after_finish_is_dropped() {
        init_tracing();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&changes);
        let (engine, control) = FakeEngineBuilder::new().build();
        let controller = SessionController::new(
            WithLens::new("42", "G1").into(),
            LaunchMode::Capture,
            Arc::new(engine),
            CameraListener::new().on_lens_change(move |id| seen.lock().push(id.to_string())),
        );
        controller.start().await;
        control.make_session_available();
        controller.cancel();

        controller.inner.handle(Notification::Carousel(CarouselEvent::ActivatedWithLens {
            lens_id: "7".to_string(),
        }));
        controller.inner.handle(Notification::Lenses(vec![lens("42")]));

        assert!(changes.lock().is_empty());
        assert!(control.applied_lenses().is_empty());
        assert!(!controller.is_lens_applied());
    }

    #[tokio::test]
    async fn test_state_events_are_streamed_in_order() {
        let (engine, control) = FakeEngineBuilder::new().session_on_start().build();
        let controller = SessionController::new(
            WithLenses::new(["G1"]).unwrap().into(),
            LaunchMode::Capture,
            Arc::new(engine),
            CameraListener::new(),
        );
        let events = controller.take_events().unwrap();
        controller.start().await;
        control.capture_image("file:///cache/1.jpg", None);

        let transitions: Vec<(SessionState, SessionState)> = events
            .take_while(|event| !matches!(event, SessionEvent::Finished { .. }))
            .filter_map(|event| match event {
                SessionEvent::StateChanged { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect()
            .await;

        assert_eq!(
            transitions,
            vec![
                (SessionState::Initializing, SessionState::ConfiguringEngine),
                (SessionState::ConfiguringEngine, SessionState::AwaitingSession),
                (SessionState::AwaitingSession, SessionState::SessionActive),
                (SessionState::SessionActive, SessionState::Finalizing),
                (
                    SessionState::Finalizing,
                    SessionState::Terminal(SessionOutcome::Captured)
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_capture_and_error_produce_one_result() {
        let (controller, control) = active(WithLenses::new(["G1"]).unwrap(), LaunchMode::Capture).await;
        let mut completion = controller.take_completion().unwrap();

        let capture = {
            let control = control.clone();
            std::thread::spawn(move || control.capture_image("file:///cache/1.jpg", None))
        };
        let failure = {
            let control = control.clone();
            std::thread::spawn(move || control.fail(EngineFailure::Graphics("lost".to_string())))
        };
        let cancel = {
            let controller = controller.clone();
            std::thread::spawn(move || controller.cancel())
        };
        capture.join().unwrap();
        failure.join().unwrap();
        cancel.join().unwrap();

        assert!(controller.state().is_finished());
        assert!(completion.try_recv().is_ok());
        assert_eq!(control.released(), vec!["lenses", "carousel"]);
    }
}
