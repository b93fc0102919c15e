//! # Result Channel
//!
//! The caller-facing side of a launch. A [`ResultChannel`] encodes the
//! configuration into a [`LaunchRequest`], hands it to a [`LaunchTransport`],
//! and resolves the eventual [`Response`] into a typed result.
//!
//! ```rust,ignore
//! let channel = ResultChannel::new(EngineTransport::new(engine));
//! match channel.launch(&WithLens::new("42", "G1").into()).await {
//!     CaptureResult::Success(media) => println!("captured {}", media.uri()),
//!     CaptureResult::Failure(error) => eprintln!("{}", error),
//!     CaptureResult::Cancelled => {}
//! }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::action::{LaunchAction, LaunchMode};
use crate::codec;
use crate::configuration::Configuration;
use crate::controller::SessionController;
use crate::engine::CameraEngine;
use crate::error::Result;
use crate::events::SessionEventStream;
use crate::listener::CameraListener;
use crate::payload::Payload;
use crate::response::{CaptureResult, PlayResult, Response, ResultContract};

/// Outbound launch: an action tag plus the encoded configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub action: LaunchAction,
    pub payload: Payload,
}

impl LaunchRequest {
    pub fn new(configuration: &Configuration, mode: LaunchMode) -> Self {
        Self {
            action: LaunchAction::for_configuration(configuration, mode),
            payload: codec::encode(configuration),
        }
    }

    pub fn configuration(&self) -> Result<Configuration> {
        codec::decode(&self.payload)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

type CancelFn = Arc<dyn Fn() + Send + Sync>;

/// A delivered launch waiting for its response
pub struct PendingResponse {
    response: oneshot::Receiver<Response>,
    cancel: Option<CancelFn>,
    events: Option<SessionEventStream>,
}

impl PendingResponse {
    pub fn new(response: oneshot::Receiver<Response>) -> Self {
        Self {
            response,
            cancel: None,
            events: None,
        }
    }

    /// A response that is already known
    pub fn ready(response: Response) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(response);
        Self::new(rx)
    }

    pub fn with_cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }

    pub fn with_events(mut self, events: SessionEventStream) -> Self {
        self.events = Some(events);
        self
    }

    /// Wait for the response. A transport that goes away without answering
    /// counts as a cancellation.
    async fn wait(self) -> Response {
        match self.response.await {
            Ok(response) => response,
            Err(_) => {
                debug!("launch transport dropped without a response");
                Response::canceled()
            }
        }
    }
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("cancellable", &self.cancel.is_some())
            .field("events", &self.events.is_some())
            .finish()
    }
}

/// Carries launch requests to whatever runs the session
pub trait LaunchTransport: Send + Sync {
    fn deliver(&self, request: LaunchRequest) -> PendingResponse;
}

/// Runs each delivered launch as a [`SessionController`] on the current
/// tokio runtime.
pub struct EngineTransport {
    engine: Arc<dyn CameraEngine>,
    listener: CameraListener,
}

impl EngineTransport {
    pub fn new(engine: Arc<dyn CameraEngine>) -> Self {
        Self {
            engine,
            listener: CameraListener::default(),
        }
    }

    pub fn with_listener(mut self, listener: CameraListener) -> Self {
        self.listener = listener;
        self
    }
}

impl LaunchTransport for EngineTransport {
    fn deliver(&self, request: LaunchRequest) -> PendingResponse {
        let configuration = match request.configuration() {
            Ok(configuration) => configuration,
            Err(e) => {
                warn!(action = %request.action, error = %e, "undecodable launch request");
                return PendingResponse::ready(Response::canceled());
            }
        };
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(action = %request.action, error = %e, "no async runtime to drive the session");
                return PendingResponse::ready(Response::canceled());
            }
        };

        let controller = SessionController::new(
            configuration,
            request.action.mode(),
            Arc::clone(&self.engine),
            self.listener.clone(),
        );
        let Some(completion) = controller.take_completion() else {
            return PendingResponse::ready(Response::canceled());
        };
        let events = controller.take_events();

        let runner = controller.clone();
        runtime.spawn(async move { runner.start().await });

        let mut pending = PendingResponse::new(completion).with_cancel(move || {
            controller.cancel();
        });
        if let Some(events) = events {
            pending = pending.with_events(events);
        }
        pending
    }
}

/// An in-flight launch resolving to `R`
pub struct LaunchHandle<R> {
    action: LaunchAction,
    pending: PendingResponse,
    _result: PhantomData<fn() -> R>,
}

impl<R: ResultContract> LaunchHandle<R> {
    pub fn action(&self) -> LaunchAction {
        self.action
    }

    /// Cancel the session. Harmless after it has finished.
    pub fn cancel(&self) {
        match &self.pending.cancel {
            Some(cancel) => cancel(),
            None => debug!(action = %self.action, "launch is not cancellable"),
        }
    }

    /// Session events, if the transport exposes them. Available once.
    pub fn take_events(&mut self) -> Option<SessionEventStream> {
        self.pending.events.take()
    }

    pub async fn result(self) -> R {
        R::from_response(self.pending.wait().await)
    }
}

impl<R> std::fmt::Debug for LaunchHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchHandle")
            .field("action", &self.action)
            .field("pending", &self.pending)
            .finish()
    }
}

/// Launches sessions and resolves their results
pub struct ResultChannel<T> {
    transport: T,
}

impl<T: LaunchTransport> ResultChannel<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Deliver a launch and return a handle to its eventual result
    pub fn start<R: ResultContract>(&self, configuration: &Configuration) -> LaunchHandle<R> {
        let request = LaunchRequest::new(configuration, R::MODE);
        let action = request.action;
        info!(action = %action, "launching camera session");

        LaunchHandle {
            action,
            pending: self.transport.deliver(request),
            _result: PhantomData,
        }
    }

    /// Capture a photo or video
    pub async fn launch(&self, configuration: &Configuration) -> CaptureResult {
        self.start::<CaptureResult>(configuration).result().await
    }

    /// Play with lenses until the session ends
    pub async fn play(&self, configuration: &Configuration) -> PlayResult {
        self.start::<PlayResult>(configuration).result().await
    }
}
