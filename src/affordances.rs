//! # UI Affordances
//!
//! Which controls the camera surface exposes, derived purely from the launch
//! configuration and mode. No engine interaction happens here.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::LaunchMode;
use crate::configuration::{Configuration, FlashConfiguration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureControl {
    FocusBySingleTap,
    FacingFlipByDoubleTap,
    ZoomByScaling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    AdaptiveToneMapping,
    Portrait,
}

/// How the lenses carousel behaves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselPolicy {
    pub observed_group_ids: BTreeSet<String>,
    /// Always false: lenses stay enabled for the whole session
    pub close_button_enabled: bool,
    pub disable_idle: bool,
    pub enabled: bool,
    /// In single-lens mode, the only lens whose item stays enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_to: Option<String>,
}

impl CarouselPolicy {
    pub fn item_enabled(&self, lens_id: &str) -> bool {
        self.locked_to.as_deref().map_or(true, |target| target == lens_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordances {
    pub capture_button_visible: bool,
    pub flash_toggle_visible: bool,
    pub ring_flash: bool,
    /// Tint system bars with the flash colour while front flash is active
    pub change_system_bar_colors: bool,
    pub flip_button_visible: bool,
    pub tap_to_focus_visible: bool,
    pub gestures: BTreeSet<GestureControl>,
    pub adjustments: BTreeSet<Adjustment>,
    pub carousel: CarouselPolicy,
}

impl Affordances {
    pub fn derive(configuration: &Configuration, mode: LaunchMode) -> Self {
        let camera = configuration.camera();
        let capture = mode.capture_enabled();

        let (flash_enabled, ring_flash, change_system_bar_colors) = match camera.flash {
            FlashConfiguration::Disabled => (false, false, false),
            FlashConfiguration::Enabled {
                use_ring_flash,
                change_system_bar_colors,
            } => (true, use_ring_flash, change_system_bar_colors),
        };

        let mut gestures = BTreeSet::new();
        if camera.focus_enabled {
            gestures.insert(GestureControl::FocusBySingleTap);
        }
        if camera.facing_flip_enabled {
            gestures.insert(GestureControl::FacingFlipByDoubleTap);
        }
        if camera.zoom_enabled {
            gestures.insert(GestureControl::ZoomByScaling);
        }

        let mut adjustments = BTreeSet::new();
        if camera.adjustments.tone_adjustment_enabled {
            adjustments.insert(Adjustment::AdaptiveToneMapping);
        }
        if camera.adjustments.portrait_adjustment_enabled {
            adjustments.insert(Adjustment::Portrait);
        }

        let carousel = match configuration {
            Configuration::WithLens(config) => CarouselPolicy {
                observed_group_ids: configuration.lens_group_ids(),
                close_button_enabled: false,
                disable_idle: true,
                enabled: config.display_lens_icon,
                locked_to: Some(config.lens_id.clone()),
            },
            Configuration::WithLenses(config) => CarouselPolicy {
                observed_group_ids: config.lens_group_ids().clone(),
                close_button_enabled: false,
                disable_idle: config.idle_state_disabled(),
                enabled: true,
                locked_to: None,
            },
        };

        Self {
            capture_button_visible: capture,
            flash_toggle_visible: capture && flash_enabled,
            ring_flash,
            change_system_bar_colors,
            flip_button_visible: camera.facing_flip_enabled,
            tap_to_focus_visible: camera.focus_enabled,
            gestures,
            adjustments,
            carousel,
        }
    }
}
