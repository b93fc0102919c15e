//! # Camera Engine Boundary
//!
//! The external camera-processing engine is reached only through the traits
//! in this module. The engine owns rendering and the lens repository; this
//! crate decides what to ask of it and when.
//!
//! Engine callbacks may arrive on any thread, so every callback type here is
//! `Send + Sync`.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::affordances::Affordances;
use crate::configuration::LaunchData;
use crate::failure::EngineFailure;
use crate::scope::Subscription;

/// A lens as listed by the engine's repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lens {
    pub id: String,
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Lens {
    pub fn new(id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Carousel notifications the session reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarouselEvent {
    /// The user (or the engine) activated this lens in the carousel
    ActivatedWithLens { lens_id: String },
    /// Idle, deactivation and any other carousel change
    Other,
}

/// Observer for "available lenses" notifications
pub type LensesObserver = Box<dyn Fn(Vec<Lens>) + Send + Sync>;

/// Observer for carousel notifications
pub type CarouselObserver = Box<dyn Fn(CarouselEvent) + Send + Sync>;

/// Where the engine delivers its asynchronous outcomes
pub trait EngineEvents: Send + Sync {
    /// The engine session is ready to be configured
    fn session_available(&self, session: Arc<dyn EngineSession>);

    /// A photo was taken. `media_type` defaults to `image/jpeg` when absent.
    fn image_captured(&self, uri: String, media_type: Option<String>);

    /// A video was recorded. `media_type` defaults to `video/mp4` when absent.
    fn video_captured(&self, uri: String, media_type: Option<String>);

    fn error(&self, failure: EngineFailure);
}

/// Everything the engine needs to bring up a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub api_token: Option<String>,
    pub facing_front: bool,
    /// Let the engine pick the facing preferred by each lens
    pub facing_based_on_lens: bool,
    pub affordances: Affordances,
}

/// The camera-processing engine
#[async_trait]
pub trait CameraEngine: Send + Sync {
    /// Start the engine. Outcomes, including the ready session, arrive
    /// through `events`. An `Err` here reports an initialization failure.
    async fn start(
        &self,
        request: StartRequest,
        events: Arc<dyn EngineEvents>,
    ) -> std::result::Result<(), EngineFailure>;
}

/// An active engine session
pub trait EngineSession: Send + Sync {
    /// Observe the lenses available in the given groups. The observer may be
    /// invoked many times until the returned subscription is closed.
    fn observe_lenses(
        &self,
        group_ids: &BTreeSet<String>,
        observer: LensesObserver,
    ) -> Box<dyn Subscription>;

    fn observe_carousel(&self, observer: CarouselObserver) -> Box<dyn Subscription>;

    fn apply_lens(&self, lens: &Lens, launch_data: &LaunchData);

    /// Download lens content ahead of use
    fn prefetch(&self, lenses: &[Lens]) -> Box<dyn Subscription>;

    fn start_preview(&self, facing_front: bool);
}

/// Exclusive reference to the session a controller is driving
pub struct SessionHandle {
    session: Arc<dyn EngineSession>,
}

impl SessionHandle {
    pub(crate) fn new(session: Arc<dyn EngineSession>) -> Self {
        Self { session }
    }

    /// Borrow the session for a call made outside any lock
    pub(crate) fn session(&self) -> Arc<dyn EngineSession> {
        Arc::clone(&self.session)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}
