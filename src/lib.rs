//! # LensKit
//!
//! Launch a lens-enabled camera session and get exactly one result back.
//!
//! A caller describes the launch declaratively with a [`Configuration`]
//! (one mandated lens, or a carousel of lens groups), hands it to a
//! [`ResultChannel`], and awaits a [`CaptureResult`] or [`PlayResult`].
//! The session itself is driven by a [`SessionController`] talking to an
//! external [`CameraEngine`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lenskit::{CaptureResult, EngineTransport, ResultChannel, WithLenses};
//!
//! let channel = ResultChannel::new(EngineTransport::new(Arc::new(my_engine)));
//! let configuration = WithLenses::new(["G1"])?.apply_lens_by_id("42").into();
//!
//! match channel.launch(&configuration).await {
//!     CaptureResult::Success(media) => println!("{} ({})", media.uri(), media.media_type()),
//!     CaptureResult::Failure(error) => eprintln!("camera failed: {}", error),
//!     CaptureResult::Cancelled => {}
//! }
//! ```

pub mod action;
pub mod affordances;
pub mod channel;
pub mod codec;
pub mod configuration;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod failure;
pub mod guard;
pub mod listener;
pub mod manifest;
pub mod payload;
pub mod response;
pub mod scope;

#[cfg(any(test, feature = "fake-engine"))]
pub mod fake_engine;

pub use action::{LaunchAction, LaunchMode};
pub use affordances::{Adjustment, Affordances, CarouselPolicy, GestureControl};
pub use channel::{EngineTransport, LaunchHandle, LaunchRequest, LaunchTransport, PendingResponse, ResultChannel};
pub use configuration::{
    AdjustmentsConfiguration, CameraOptions, Configuration, FlashConfiguration, LaunchData,
    WithLens, WithLenses,
};
pub use controller::{SessionController, SessionOutcome, SessionState};
pub use engine::{
    CameraEngine, CarouselEvent, CarouselObserver, EngineEvents, EngineSession, Lens,
    LensesObserver, SessionHandle, StartRequest,
};
pub use error::{LensKitError, Result};
pub use events::{SessionEvent, SessionEventStream};
pub use failure::{translate, EngineError, EngineErrorKind, EngineFailure};
pub use guard::LensApplicationGuard;
pub use listener::CameraListener;
pub use manifest::{LaunchManifest, MANIFEST_FILENAME};
pub use payload::{Payload, PayloadValue};
pub use response::{CaptureResult, MediaCapture, PlayResult, Response, ResponseCode, ResultContract};
pub use scope::{ResourceScope, Subscription};
