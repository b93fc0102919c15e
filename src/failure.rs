//! # Engine Failures
//!
//! The engine reports failures in its own terms ([`EngineFailure`]). Callers
//! only ever see the closed [`EngineError`] taxonomy produced by [`translate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{LensKitError, Result};
use crate::payload::Payload;

/// Failures as reported by the camera-processing engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    #[error("unauthorized application: {0}")]
    UnauthorizedApplication(String),

    #[error("device not supported: {0}")]
    DeviceNotSupported(String),

    #[error("missing permissions: {}", .0.join(", "))]
    MissingPermissions(Vec<String>),

    #[error("graphics failure: {0}")]
    Graphics(String),

    #[error("lens processor failure: {0}")]
    LensProcessor(String),

    /// Anything the engine raises that is not one of the above
    #[error("{kind}: {detail}")]
    Other { kind: String, detail: String },
}

/// Failure delivered to the caller through the result channel
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineError {
    /// The application or API token was rejected
    #[error("{message}")]
    Unauthorized {
        message: String,
        cause: Option<String>,
    },

    /// Device lacks the graphics or hardware capability the engine needs
    #[error("{message}")]
    DeviceNotSupported {
        message: String,
        cause: Option<String>,
    },

    /// Required OS permissions were not granted
    #[error("{message}")]
    MissingPermissions {
        message: String,
        cause: Option<String>,
    },

    /// Rendering pipeline failure, possibly recoverable
    #[error("{message}")]
    GraphicsProcessing {
        message: String,
        cause: Option<String>,
    },

    /// Lens logic failed (script error, exhausted resources)
    #[error("{message}")]
    LensesProcessing {
        message: String,
        cause: Option<String>,
    },

    #[error("{message}")]
    Unexpected {
        message: String,
        cause: Option<String>,
    },
}

/// Discriminant of [`EngineError`], as written on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    Unauthorized,
    DeviceNotSupported,
    MissingPermissions,
    GraphicsProcessing,
    LensesProcessing,
    Unexpected,
}

impl EngineErrorKind {
    pub const ALL: [EngineErrorKind; 6] = [
        Self::Unauthorized,
        Self::DeviceNotSupported,
        Self::MissingPermissions,
        Self::GraphicsProcessing,
        Self::LensesProcessing,
        Self::Unexpected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::DeviceNotSupported => "device_not_supported",
            Self::MissingPermissions => "missing_permissions",
            Self::GraphicsProcessing => "graphics_processing",
            Self::LensesProcessing => "lenses_processing",
            Self::Unexpected => "unexpected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

const KIND_SLOT: &str = "kind";
const MESSAGE_SLOT: &str = "message";
const CAUSE_SLOT: &str = "cause";

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>, cause: Option<String>) -> Self {
        let message = message.into();
        match kind {
            EngineErrorKind::Unauthorized => Self::Unauthorized { message, cause },
            EngineErrorKind::DeviceNotSupported => Self::DeviceNotSupported { message, cause },
            EngineErrorKind::MissingPermissions => Self::MissingPermissions { message, cause },
            EngineErrorKind::GraphicsProcessing => Self::GraphicsProcessing { message, cause },
            EngineErrorKind::LensesProcessing => Self::LensesProcessing { message, cause },
            EngineErrorKind::Unexpected => Self::Unexpected { message, cause },
        }
    }

    pub fn kind(&self) -> EngineErrorKind {
        match self {
            Self::Unauthorized { .. } => EngineErrorKind::Unauthorized,
            Self::DeviceNotSupported { .. } => EngineErrorKind::DeviceNotSupported,
            Self::MissingPermissions { .. } => EngineErrorKind::MissingPermissions,
            Self::GraphicsProcessing { .. } => EngineErrorKind::GraphicsProcessing,
            Self::LensesProcessing { .. } => EngineErrorKind::LensesProcessing,
            Self::Unexpected { .. } => EngineErrorKind::Unexpected,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized { message, .. }
            | Self::DeviceNotSupported { message, .. }
            | Self::MissingPermissions { message, .. }
            | Self::GraphicsProcessing { message, .. }
            | Self::LensesProcessing { message, .. }
            | Self::Unexpected { message, .. } => message,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { cause, .. }
            | Self::DeviceNotSupported { cause, .. }
            | Self::MissingPermissions { cause, .. }
            | Self::GraphicsProcessing { cause, .. }
            | Self::LensesProcessing { cause, .. }
            | Self::Unexpected { cause, .. } => cause.as_deref(),
        }
    }

    /// Serialize for the failure slot of a response payload
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.put_string(KIND_SLOT, self.kind().as_str());
        payload.put_string(MESSAGE_SLOT, self.message());
        payload.put_optional_string(CAUSE_SLOT, self.cause());
        payload
    }

    pub fn from_payload(payload: &Payload) -> Result<Self> {
        let kind = payload
            .get_str(KIND_SLOT)?
            .ok_or_else(|| LensKitError::MissingSlot(KIND_SLOT.to_string()))?;
        let kind = EngineErrorKind::parse(kind).ok_or_else(|| {
            LensKitError::invalid_slot(KIND_SLOT, format!("unknown error kind '{}'", kind))
        })?;
        let message = payload
            .get_str(MESSAGE_SLOT)?
            .ok_or_else(|| LensKitError::MissingSlot(MESSAGE_SLOT.to_string()))?;
        let cause = payload.get_str(CAUSE_SLOT)?.map(str::to_string);

        Ok(Self::new(kind, message, cause))
    }
}

/// Map an engine failure onto the caller-facing taxonomy. Total.
pub fn translate(failure: &EngineFailure) -> EngineError {
    let (kind, message) = match failure {
        EngineFailure::UnauthorizedApplication(_) => (
            EngineErrorKind::Unauthorized,
            "Application is not authorized to use the camera engine",
        ),
        EngineFailure::DeviceNotSupported(_) => (
            EngineErrorKind::DeviceNotSupported,
            "Camera engine does not support this device",
        ),
        EngineFailure::MissingPermissions(_) => (
            EngineErrorKind::MissingPermissions,
            "Permissions required to run the camera engine were not granted",
        ),
        EngineFailure::Graphics(_) => (
            EngineErrorKind::GraphicsProcessing,
            "Camera engine encountered a failure in the graphics processing pipeline",
        ),
        EngineFailure::LensProcessor(_) => (
            EngineErrorKind::LensesProcessing,
            "Camera engine encountered a failure in the lenses processing pipeline",
        ),
        EngineFailure::Other { .. } => (
            EngineErrorKind::Unexpected,
            "Camera engine encountered an unexpected failure",
        ),
    };

    EngineError::new(kind, message, Some(failure.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_failures() -> Vec<(EngineFailure, EngineErrorKind)> {
        vec![
            (
                EngineFailure::UnauthorizedApplication("bad token".into()),
                EngineErrorKind::Unauthorized,
            ),
            (
                EngineFailure::DeviceNotSupported("no GLES3".into()),
                EngineErrorKind::DeviceNotSupported,
            ),
            (
                EngineFailure::MissingPermissions(vec!["camera".into(), "microphone".into()]),
                EngineErrorKind::MissingPermissions,
            ),
            (
                EngineFailure::Graphics("context lost".into()),
                EngineErrorKind::GraphicsProcessing,
            ),
            (
                EngineFailure::LensProcessor("script error".into()),
                EngineErrorKind::LensesProcessing,
            ),
        ]
    }

    #[test]
    fn test_every_native_failure_maps_to_its_kind() {
        for (failure, kind) in native_failures() {
            assert_eq!(translate(&failure).kind(), kind, "{:?}", failure);
        }
    }

    #[test]
    fn test_unrecognized_failure_is_unexpected() {
        let failure = EngineFailure::Other {
            kind: "OutOfMemory".into(),
            detail: "allocation failed".into(),
        };
        let error = translate(&failure);

        assert_eq!(error.kind(), EngineErrorKind::Unexpected);
        assert_eq!(error.cause(), Some("OutOfMemory: allocation failed"));
    }

    #[test]
    fn test_translation_keeps_native_cause() {
        let error = translate(&EngineFailure::UnauthorizedApplication("bad token".into()));

        assert_eq!(
            error.message(),
            "Application is not authorized to use the camera engine"
        );
        assert_eq!(error.cause(), Some("unauthorized application: bad token"));
        assert_eq!(error.to_string(), error.message());
    }

    #[test]
    fn test_missing_permissions_display() {
        let failure = EngineFailure::MissingPermissions(vec!["camera".into(), "storage".into()]);
        assert_eq!(failure.to_string(), "missing permissions: camera, storage");
    }

    #[test]
    fn test_kind_strings_parse_back() {
        for kind in EngineErrorKind::ALL {
            assert_eq!(EngineErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EngineErrorKind::parse("meltdown"), None);
    }

    #[test]
    fn test_payload_form_round_trip() {
        let error = translate(&EngineFailure::Graphics("context lost".into()));
        assert_eq!(EngineError::from_payload(&error.to_payload()).unwrap(), error);
    }

    #[test]
    fn test_payload_without_cause() {
        let error = EngineError::new(EngineErrorKind::Unexpected, "boom", None);
        let payload = error.to_payload();

        assert!(!payload.contains("cause"));
        assert_eq!(EngineError::from_payload(&payload).unwrap(), error);
    }

    #[test]
    fn test_payload_with_unknown_kind_is_rejected() {
        let mut payload = Payload::new();
        payload.put_string("kind", "meltdown");
        payload.put_string("message", "boom");

        assert!(EngineError::from_payload(&payload).is_err());
    }

    #[test]
    fn test_json_is_kind_tagged() {
        let error = EngineError::new(EngineErrorKind::LensesProcessing, "lens failed", None);
        let json = serde_json::to_string(&error).unwrap();

        assert!(json.contains("\"kind\":\"lenses_processing\""));
        let parsed: EngineError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, error);
    }
}
