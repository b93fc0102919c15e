use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::SystemTime;
use tokio_stream::Stream;

use crate::controller::{SessionOutcome, SessionState};

/// Stream of events observed while a session runs
pub type SessionEventStream = Pin<Box<dyn Stream<Item = SessionEvent> + Send>>;

/// Events emitted by a session controller.
///
/// A UI surface subscribes to these to mirror state, e.g. to disable the
/// carousel once it is locked or to show the default preview of a photo.
///
/// # Example
///
/// ```ignore
/// let mut events = controller.take_events().unwrap();
/// while let Some(event) = events.next().await {
///     if let SessionEvent::CarouselLocked { lens_id, .. } = &event {
///         carousel.lock_to(lens_id);
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    /// The target lens was applied to the engine
    LensApplied {
        lens_id: String,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    /// The carousel activated a lens
    LensChanged {
        lens_id: String,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    /// Single-lens mode: the carousel is now disabled as a whole
    CarouselLocked {
        lens_id: String,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    PrefetchStarted {
        lens_ids: Vec<String>,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    /// A photo was taken and the default preview should be shown
    PreviewRequested {
        uri: String,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    Finished {
        outcome: SessionOutcome,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },
}

impl SessionEvent {
    pub fn state_changed(from: SessionState, to: SessionState) -> Self {
        Self::StateChanged {
            from,
            to,
            timestamp: SystemTime::now(),
        }
    }

    pub fn lens_applied(lens_id: impl Into<String>) -> Self {
        Self::LensApplied {
            lens_id: lens_id.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn lens_changed(lens_id: impl Into<String>) -> Self {
        Self::LensChanged {
            lens_id: lens_id.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn carousel_locked(lens_id: impl Into<String>) -> Self {
        Self::CarouselLocked {
            lens_id: lens_id.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn prefetch_started(lens_ids: Vec<String>) -> Self {
        Self::PrefetchStarted {
            lens_ids,
            timestamp: SystemTime::now(),
        }
    }

    pub fn preview_requested(uri: impl Into<String>) -> Self {
        Self::PreviewRequested {
            uri: uri.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn finished(outcome: SessionOutcome) -> Self {
        Self::Finished {
            outcome,
            timestamp: SystemTime::now(),
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            Self::StateChanged { timestamp, .. } => *timestamp,
            Self::LensApplied { timestamp, .. } => *timestamp,
            Self::LensChanged { timestamp, .. } => *timestamp,
            Self::CarouselLocked { timestamp, .. } => *timestamp,
            Self::PrefetchStarted { timestamp, .. } => *timestamp,
            Self::PreviewRequested { timestamp, .. } => *timestamp,
            Self::Finished { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string (for testing assertions)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "StateChanged",
            Self::LensApplied { .. } => "LensApplied",
            Self::LensChanged { .. } => "LensChanged",
            Self::CarouselLocked { .. } => "CarouselLocked",
            Self::PrefetchStarted { .. } => "PrefetchStarted",
            Self::PreviewRequested { .. } => "PreviewRequested",
            Self::Finished { .. } => "Finished",
        }
    }
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis() as u64)
            .unwrap_or(0);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_changed_event() {
        let event = SessionEvent::state_changed(
            SessionState::AwaitingSession,
            SessionState::SessionActive,
        );

        match event {
            SessionEvent::StateChanged { from, to, .. } => {
                assert_eq!(from, SessionState::AwaitingSession);
                assert_eq!(to, SessionState::SessionActive);
            }
            _ => panic!("Expected StateChanged event"),
        }
    }

    #[test]
    fn test_event_types() {
        assert_eq!(SessionEvent::lens_applied("42").event_type(), "LensApplied");
        assert_eq!(SessionEvent::lens_changed("42").event_type(), "LensChanged");
        assert_eq!(SessionEvent::carousel_locked("42").event_type(), "CarouselLocked");
        assert_eq!(
            SessionEvent::prefetch_started(vec!["a".into()]).event_type(),
            "PrefetchStarted"
        );
        assert_eq!(
            SessionEvent::preview_requested("file:///a.jpg").event_type(),
            "PreviewRequested"
        );
        assert_eq!(
            SessionEvent::finished(SessionOutcome::Cancelled).event_type(),
            "Finished"
        );
    }

    #[test]
    fn test_serialization_is_type_tagged() {
        let event = SessionEvent::finished(SessionOutcome::Captured);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "finished");
        assert_eq!(json["outcome"], "captured");
        assert!(json["timestamp"].is_u64());
    }

    #[test]
    fn test_terminal_state_serialization() {
        let event = SessionEvent::state_changed(
            SessionState::Finalizing,
            SessionState::Terminal(SessionOutcome::Failed),
        );
        let json = serde_json::to_string(&event).unwrap();
        let parsed: SessionEvent = serde_json::from_str(&json).unwrap();

        match parsed {
            SessionEvent::StateChanged { to, .. } => {
                assert_eq!(to, SessionState::Terminal(SessionOutcome::Failed));
            }
            _ => panic!("Expected StateChanged event"),
        }
    }

    #[test]
    fn test_timestamp_round_trips_to_millis() {
        let event = SessionEvent::lens_changed("42");
        let json = serde_json::to_string(&event).unwrap();
        let parsed: SessionEvent = serde_json::from_str(&json).unwrap();

        let original = event.timestamp().duration_since(std::time::UNIX_EPOCH).unwrap();
        let restored = parsed.timestamp().duration_since(std::time::UNIX_EPOCH).unwrap();
        assert_eq!(original.as_millis(), restored.as_millis());
    }
}
