//! # Fake Camera Engine
//!
//! A scriptable in-memory [`CameraEngine`] for tests. [`FakeEngineBuilder`]
//! produces the engine together with a [`FakeEngineController`] that plays
//! the engine's side of a session: it makes the session available, publishes
//! lenses and carousel events, reports captures and errors, and records every
//! call the session made.
//!
//! ```rust,ignore
//! let (engine, control) = FakeEngineBuilder::new().build();
//! let controller = SessionController::new(configuration, LaunchMode::Capture, Arc::new(engine), listener);
//! controller.start().await;
//! control.make_session_available();
//! control.publish_lenses(vec![Lens::new("42", "G1")]);
//! control.capture_image("file:///cache/1.jpg", None);
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::configuration::LaunchData;
use crate::engine::{
    CameraEngine, CarouselEvent, CarouselObserver, EngineEvents, EngineSession, Lens,
    LensesObserver, StartRequest,
};
use crate::error::Result;
use crate::failure::EngineFailure;
use crate::scope::Subscription;

type LensesFn = dyn Fn(Vec<Lens>) + Send + Sync;
type CarouselFn = dyn Fn(CarouselEvent) + Send + Sync;

struct Registered<F: ?Sized> {
    id: u64,
    observer: Arc<F>,
    open: bool,
}

#[derive(Default)]
struct FakeState {
    events: Option<Arc<dyn EngineEvents>>,
    start_requests: Vec<StartRequest>,
    observed_groups: Vec<BTreeSet<String>>,
    lens_observers: Vec<Registered<LensesFn>>,
    carousel_observers: Vec<Registered<CarouselFn>>,
    applied: Vec<(String, LaunchData)>,
    prefetched: Vec<Vec<String>>,
    previews: Vec<bool>,
    released: Vec<&'static str>,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Shared {
    state: Mutex<FakeState>,
    started: Notify,
    start_failure: Option<EngineFailure>,
    session_on_start: bool,
    lenses_on_observe: Option<Vec<Lens>>,
    carousel_on_observe: Vec<CarouselEvent>,
}

/// Configures a [`FakeEngine`] before the session starts
#[derive(Debug, Default)]
pub struct FakeEngineBuilder {
    start_failure: Option<EngineFailure>,
    session_on_start: bool,
    lenses_on_observe: Option<Vec<Lens>>,
    carousel_on_observe: Vec<CarouselEvent>,
}

impl FakeEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `start` with this failure
    pub fn fail_start(mut self, failure: EngineFailure) -> Self {
        self.start_failure = Some(failure);
        self
    }

    /// Make the session available from inside `start`
    pub fn session_on_start(mut self) -> Self {
        self.session_on_start = true;
        self
    }

    /// Deliver these lenses to each repository observer as it registers
    pub fn lenses_on_observe(mut self, lenses: Vec<Lens>) -> Self {
        self.lenses_on_observe = Some(lenses);
        self
    }

    /// Deliver these carousel events, in order, to each carousel observer
    /// as it registers
    pub fn carousel_on_observe(mut self, events: Vec<CarouselEvent>) -> Self {
        self.carousel_on_observe = events;
        self
    }

    pub fn build(self) -> (FakeEngine, FakeEngineController) {
        let shared = Arc::new(Shared {
            state: Mutex::new(FakeState::default()),
            started: Notify::new(),
            start_failure: self.start_failure,
            session_on_start: self.session_on_start,
            lenses_on_observe: self.lenses_on_observe,
            carousel_on_observe: self.carousel_on_observe,
        });
        (
            FakeEngine {
                shared: Arc::clone(&shared),
            },
            FakeEngineController { shared },
        )
    }
}

pub struct FakeEngine {
    shared: Arc<Shared>,
}

#[async_trait]
impl CameraEngine for FakeEngine {
    async fn start(
        &self,
        request: StartRequest,
        events: Arc<dyn EngineEvents>,
    ) -> std::result::Result<(), EngineFailure> {
        {
            let mut state = self.shared.state.lock();
            state.start_requests.push(request);
            state.events = Some(Arc::clone(&events));
        }
        self.shared.started.notify_waiters();

        if let Some(failure) = &self.shared.start_failure {
            return Err(failure.clone());
        }
        if self.shared.session_on_start {
            events.session_available(Arc::new(FakeSession {
                shared: Arc::clone(&self.shared),
            }));
        }
        Ok(())
    }
}

struct FakeSession {
    shared: Arc<Shared>,
}

impl EngineSession for FakeSession {
    fn observe_lenses(
        &self,
        group_ids: &BTreeSet<String>,
        observer: LensesObserver,
    ) -> Box<dyn Subscription> {
        let observer: Arc<LensesFn> = Arc::from(observer);
        let id = {
            let mut state = self.shared.state.lock();
            let id = state.next_id();
            state.observed_groups.push(group_ids.clone());
            state.lens_observers.push(Registered {
                id,
                observer: Arc::clone(&observer),
                open: true,
            });
            id
        };

        if let Some(lenses) = &self.shared.lenses_on_observe {
            observer(lenses.clone());
        }

        Box::new(FakeSubscription {
            shared: Arc::clone(&self.shared),
            kind: "lenses",
            id: Some(id),
        })
    }

    fn observe_carousel(&self, observer: CarouselObserver) -> Box<dyn Subscription> {
        let observer: Arc<CarouselFn> = Arc::from(observer);
        let id = {
            let mut state = self.shared.state.lock();
            let id = state.next_id();
            state.carousel_observers.push(Registered {
                id,
                observer: Arc::clone(&observer),
                open: true,
            });
            id
        };

        for event in &self.shared.carousel_on_observe {
            observer(event.clone());
        }

        Box::new(FakeSubscription {
            shared: Arc::clone(&self.shared),
            kind: "carousel",
            id: Some(id),
        })
    }

    fn apply_lens(&self, lens: &Lens, launch_data: &LaunchData) {
        self.shared
            .state
            .lock()
            .applied
            .push((lens.id.clone(), launch_data.clone()));
    }

    fn prefetch(&self, lenses: &[Lens]) -> Box<dyn Subscription> {
        self.shared
            .state
            .lock()
            .prefetched
            .push(lenses.iter().map(|lens| lens.id.clone()).collect());

        Box::new(FakeSubscription {
            shared: Arc::clone(&self.shared),
            kind: "prefetch",
            id: None,
        })
    }

    fn start_preview(&self, facing_front: bool) {
        self.shared.state.lock().previews.push(facing_front);
    }
}

struct FakeSubscription {
    shared: Arc<Shared>,
    kind: &'static str,
    id: Option<u64>,
}

impl Subscription for FakeSubscription {
    fn close(self: Box<Self>) -> Result<()> {
        let mut state = self.shared.state.lock();
        if let Some(id) = self.id {
            for registered in state.lens_observers.iter_mut().filter(|r| r.id == id) {
                registered.open = false;
            }
            for registered in state.carousel_observers.iter_mut().filter(|r| r.id == id) {
                registered.open = false;
            }
        }
        state.released.push(self.kind);
        Ok(())
    }
}

/// Drives the engine side of a session and inspects what the session did
#[derive(Clone)]
pub struct FakeEngineController {
    shared: Arc<Shared>,
}

impl FakeEngineController {
    /// Wait until the engine has been asked to start
    pub async fn started(&self) {
        loop {
            let notified = self.shared.started.notified();
            if self.shared.state.lock().events.is_some() {
                return;
            }
            notified.await;
        }
    }

    fn events(&self) -> Option<Arc<dyn EngineEvents>> {
        let events = self.shared.state.lock().events.clone();
        if events.is_none() {
            warn!("fake engine was never started, dropping event");
        }
        events
    }

    pub fn make_session_available(&self) {
        if let Some(events) = self.events() {
            events.session_available(Arc::new(FakeSession {
                shared: Arc::clone(&self.shared),
            }));
        }
    }

    /// Notify every open repository observer
    pub fn publish_lenses(&self, lenses: Vec<Lens>) {
        let observers: Vec<Arc<LensesFn>> = self
            .shared
            .state
            .lock()
            .lens_observers
            .iter()
            .filter(|r| r.open)
            .map(|r| Arc::clone(&r.observer))
            .collect();
        for observer in observers {
            observer(lenses.clone());
        }
    }

    /// Notify every open carousel observer
    pub fn publish_carousel(&self, event: CarouselEvent) {
        let observers: Vec<Arc<CarouselFn>> = self
            .shared
            .state
            .lock()
            .carousel_observers
            .iter()
            .filter(|r| r.open)
            .map(|r| Arc::clone(&r.observer))
            .collect();
        for observer in observers {
            observer(event.clone());
        }
    }

    pub fn activate_lens(&self, lens_id: &str) {
        self.publish_carousel(CarouselEvent::ActivatedWithLens {
            lens_id: lens_id.to_string(),
        });
    }

    pub fn capture_image(&self, uri: &str, media_type: Option<&str>) {
        if let Some(events) = self.events() {
            events.image_captured(uri.to_string(), media_type.map(str::to_string));
        }
    }

    pub fn capture_video(&self, uri: &str, media_type: Option<&str>) {
        if let Some(events) = self.events() {
            events.video_captured(uri.to_string(), media_type.map(str::to_string));
        }
    }

    pub fn fail(&self, failure: EngineFailure) {
        if let Some(events) = self.events() {
            events.error(failure);
        }
    }

    pub fn start_requests(&self) -> Vec<StartRequest> {
        self.shared.state.lock().start_requests.clone()
    }

    pub fn observed_groups(&self) -> Vec<BTreeSet<String>> {
        self.shared.state.lock().observed_groups.clone()
    }

    /// Ids of applied lenses, in order
    pub fn applied_lenses(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .applied
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn applied_launch_data(&self) -> Vec<LaunchData> {
        self.shared
            .state
            .lock()
            .applied
            .iter()
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn prefetched(&self) -> Vec<Vec<String>> {
        self.shared.state.lock().prefetched.clone()
    }

    /// Facing passed to each `start_preview` call
    pub fn previews(&self) -> Vec<bool> {
        self.shared.state.lock().previews.clone()
    }

    /// Kinds of released subscriptions, in release order
    pub fn released(&self) -> Vec<&'static str> {
        self.shared.state.lock().released.clone()
    }

    pub fn open_observers(&self) -> usize {
        let state = self.shared.state.lock();
        state.lens_observers.iter().filter(|r| r.open).count()
            + state.carousel_observers.iter().filter(|r| r.open).count()
    }
}
