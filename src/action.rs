use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;

/// What the caller expects back from a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Capture a photo or video and return it
    Capture,
    /// Play with lenses; nothing is captured
    Play,
}

impl LaunchMode {
    pub fn capture_enabled(&self) -> bool {
        matches!(self, Self::Capture)
    }
}

/// Action tag carried alongside a launch payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchAction {
    CaptureWithLens,
    CaptureWithLenses,
    PlayWithLens,
    PlayWithLenses,
}

impl LaunchAction {
    pub const ALL: [LaunchAction; 4] = [
        Self::CaptureWithLens,
        Self::CaptureWithLenses,
        Self::PlayWithLens,
        Self::PlayWithLenses,
    ];

    /// Tag for launching `configuration` in `mode`
    pub fn for_configuration(configuration: &Configuration, mode: LaunchMode) -> Self {
        match (configuration, mode) {
            (Configuration::WithLens(_), LaunchMode::Capture) => Self::CaptureWithLens,
            (Configuration::WithLenses(_), LaunchMode::Capture) => Self::CaptureWithLenses,
            (Configuration::WithLens(_), LaunchMode::Play) => Self::PlayWithLens,
            (Configuration::WithLenses(_), LaunchMode::Play) => Self::PlayWithLenses,
        }
    }

    pub fn mode(&self) -> LaunchMode {
        match self {
            Self::CaptureWithLens | Self::CaptureWithLenses => LaunchMode::Capture,
            Self::PlayWithLens | Self::PlayWithLenses => LaunchMode::Play,
        }
    }

    /// Single-lens actions lock the carousel to the target lens
    pub fn single_lens(&self) -> bool {
        matches!(self, Self::CaptureWithLens | Self::PlayWithLens)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaptureWithLens => "capture_with_lens",
            Self::CaptureWithLenses => "capture_with_lenses",
            Self::PlayWithLens => "play_with_lens",
            Self::PlayWithLenses => "play_with_lenses",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == value)
    }
}

impl std::fmt::Display for LaunchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{WithLens, WithLenses};

    #[test]
    fn test_action_for_each_variant_and_mode() {
        let single = Configuration::from(WithLens::new("42", "G1"));
        let carousel = Configuration::from(WithLenses::new(["G1"]).unwrap());

        assert_eq!(
            LaunchAction::for_configuration(&single, LaunchMode::Capture),
            LaunchAction::CaptureWithLens
        );
        assert_eq!(
            LaunchAction::for_configuration(&carousel, LaunchMode::Capture),
            LaunchAction::CaptureWithLenses
        );
        assert_eq!(
            LaunchAction::for_configuration(&single, LaunchMode::Play),
            LaunchAction::PlayWithLens
        );
        assert_eq!(
            LaunchAction::for_configuration(&carousel, LaunchMode::Play),
            LaunchAction::PlayWithLenses
        );
    }

    #[test]
    fn test_mode_and_single_lens() {
        assert_eq!(LaunchAction::PlayWithLens.mode(), LaunchMode::Play);
        assert!(LaunchAction::CaptureWithLens.mode().capture_enabled());
        assert!(LaunchAction::PlayWithLens.single_lens());
        assert!(!LaunchAction::CaptureWithLenses.single_lens());
    }

    #[test]
    fn test_tags_parse_back() {
        for action in LaunchAction::ALL {
            assert_eq!(LaunchAction::parse(&action.to_string()), Some(action));
        }
        assert_eq!(LaunchAction::parse("record"), None);
    }

    #[test]
    fn test_serde_matches_tag() {
        let json = serde_json::to_string(&LaunchAction::PlayWithLenses).unwrap();
        assert_eq!(json, "\"play_with_lenses\"");
    }
}
