//! # Session Responses
//!
//! What a finished session hands back over the channel, and how the caller
//! turns it into a typed result. Parsing never fails: anything it cannot make
//! sense of becomes a cancellation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::LaunchMode;
use crate::failure::EngineError;
use crate::payload::Payload;

/// Numeric response code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseCode(pub i32);

impl ResponseCode {
    pub const OK: ResponseCode = ResponseCode(-1);
    pub const CANCELED: ResponseCode = ResponseCode(0);
    /// Failure with a serialized [`EngineError`] attached
    pub const FAILURE: ResponseCode = ResponseCode(100);
}

pub mod slots {
    pub const URI: &str = "uri";
    pub const MEDIA_TYPE: &str = "media_type";
    pub const FAILURE: &str = "failure";
}

pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/jpeg";
pub const DEFAULT_VIDEO_MEDIA_TYPE: &str = "video/mp4";

/// Raw response as it crosses the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub code: ResponseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Response {
    pub fn new(code: ResponseCode, payload: Option<Payload>) -> Self {
        Self { code, payload }
    }

    pub fn canceled() -> Self {
        Self::new(ResponseCode::CANCELED, None)
    }

    pub fn media(uri: &str, media_type: &str) -> Self {
        let mut payload = Payload::new();
        payload.put_string(slots::URI, uri);
        payload.put_string(slots::MEDIA_TYPE, media_type);
        Self::new(ResponseCode::OK, Some(payload))
    }

    pub fn failure(error: &EngineError) -> Self {
        let mut payload = Payload::new();
        payload.put_nested(slots::FAILURE, error.to_payload());
        Self::new(ResponseCode::FAILURE, Some(payload))
    }

    fn media_slots(&self) -> Option<(&str, &str)> {
        let payload = self.payload.as_ref()?;
        let uri = payload.get_str(slots::URI).ok().flatten()?;
        let media_type = payload.get_str(slots::MEDIA_TYPE).ok().flatten()?;
        if uri.is_empty() {
            return None;
        }
        Some((uri, media_type))
    }

    fn attached_error(&self) -> Option<EngineError> {
        let payload = self.payload.as_ref()?;
        let nested = payload.get_nested(slots::FAILURE).ok().flatten()?;
        match EngineError::from_payload(nested) {
            Ok(error) => Some(error),
            Err(e) => {
                debug!(error = %e, "undecodable failure payload");
                None
            }
        }
    }
}

/// A captured media file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaCapture {
    Image { uri: String, media_type: String },
    Video { uri: String, media_type: String },
}

impl MediaCapture {
    pub fn uri(&self) -> &str {
        match self {
            Self::Image { uri, .. } | Self::Video { uri, .. } => uri,
        }
    }

    pub fn media_type(&self) -> &str {
        match self {
            Self::Image { media_type, .. } | Self::Video { media_type, .. } => media_type,
        }
    }
}

/// Outcome of a capture launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    Success(MediaCapture),
    Failure(EngineError),
    Cancelled,
}

/// Outcome of a play launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayResult {
    Completed,
    Failure(EngineError),
}

/// Typed result a launch resolves to
pub trait ResultContract: Sized + Send + 'static {
    const MODE: LaunchMode;

    fn from_response(response: Response) -> Self;
}

impl From<&CaptureResult> for Response {
    fn from(result: &CaptureResult) -> Self {
        match result {
            CaptureResult::Success(media) => Response::media(media.uri(), media.media_type()),
            CaptureResult::Failure(error) => Response::failure(error),
            CaptureResult::Cancelled => Response::canceled(),
        }
    }
}

impl ResultContract for CaptureResult {
    const MODE: LaunchMode = LaunchMode::Capture;

    fn from_response(response: Response) -> Self {
        if response.payload.is_none() {
            return Self::Cancelled;
        }

        match response.code {
            ResponseCode::OK => match response.media_slots() {
                Some((uri, media_type)) if media_type.starts_with("image/") => {
                    Self::Success(MediaCapture::Image {
                        uri: uri.to_string(),
                        media_type: media_type.to_string(),
                    })
                }
                Some((uri, media_type)) if media_type.starts_with("video/") => {
                    Self::Success(MediaCapture::Video {
                        uri: uri.to_string(),
                        media_type: media_type.to_string(),
                    })
                }
                other => {
                    debug!(media = ?other, "success response without usable media");
                    Self::Cancelled
                }
            },
            ResponseCode::FAILURE => response
                .attached_error()
                .map_or(Self::Cancelled, Self::Failure),
            code => {
                debug!(code = code.0, "response treated as cancellation");
                Self::Cancelled
            }
        }
    }
}

impl ResultContract for PlayResult {
    const MODE: LaunchMode = LaunchMode::Play;

    fn from_response(response: Response) -> Self {
        match response.code {
            ResponseCode::FAILURE => response
                .attached_error()
                .map_or(Self::Completed, Self::Failure),
            _ => Self::Completed,
        }
    }
}
