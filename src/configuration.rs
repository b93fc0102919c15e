//! # Launch Configuration
//!
//! Declarative description of a camera launch. A [`Configuration`] is built
//! once per launch by the caller and never mutated afterwards.
//!
//! ```rust
//! use lenskit::{CameraOptions, Configuration, FlashConfiguration, WithLens, WithLenses};
//!
//! let single = Configuration::from(WithLens::new("42", "G1"));
//!
//! let carousel = WithLenses::new(["G1", "G2"])
//!     .unwrap()
//!     .prefetch_lens_by_id_pattern("lens_.*")
//!     .camera(CameraOptions {
//!         flash: FlashConfiguration::Disabled,
//!         ..CameraOptions::default()
//!     });
//!
//! assert!(single.single_lens_mode());
//! assert!(!Configuration::from(carousel).single_lens_mode());
//! ```

use std::collections::BTreeSet;

use crate::error::{LensKitError, Result};
use crate::payload::Payload;

/// Camera flash behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashConfiguration {
    Disabled,
    /// Ring flash is used for front flash when `use_ring_flash` is set. System
    /// bars take the flash colour while front flash is active when
    /// `change_system_bar_colors` is set.
    Enabled {
        use_ring_flash: bool,
        change_system_bar_colors: bool,
    },
}

impl FlashConfiguration {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

impl Default for FlashConfiguration {
    fn default() -> Self {
        Self::Enabled {
            use_ring_flash: false,
            change_system_bar_colors: false,
        }
    }
}

/// Independent adjustment feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentsConfiguration {
    pub tone_adjustment_enabled: bool,
    pub portrait_adjustment_enabled: bool,
}

impl Default for AdjustmentsConfiguration {
    fn default() -> Self {
        Self {
            tone_adjustment_enabled: true,
            portrait_adjustment_enabled: true,
        }
    }
}

/// Camera settings shared by every configuration variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraOptions {
    /// Open the front facing camera by default
    pub facing_front: bool,
    /// Enable the facing flip button and double-tap gesture
    pub facing_flip_enabled: bool,
    /// Let each lens choose its preferred facing
    pub facing_based_on_lens: bool,
    pub flash: FlashConfiguration,
    pub adjustments: AdjustmentsConfiguration,
    /// Enable tap-to-focus
    pub focus_enabled: bool,
    /// Enable pinch-to-zoom
    pub zoom_enabled: bool,
    /// Engine API token. When unset the engine falls back to its own lookup.
    pub api_token: Option<String>,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            facing_front: true,
            facing_flip_enabled: true,
            facing_based_on_lens: false,
            flash: FlashConfiguration::default(),
            adjustments: AdjustmentsConfiguration::default(),
            focus_enabled: true,
            zoom_enabled: true,
            api_token: None,
        }
    }
}

/// Opaque parameters handed to the engine when a lens is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchData {
    values: Payload,
}

impl LaunchData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.put_string(key, value);
        self
    }

    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.values.put_int(key, value);
        self
    }

    pub fn with_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.values.put_bool(key, value);
        self
    }

    pub fn with_strings<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.put_strings(key, values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_payload(&self) -> &Payload {
        &self.values
    }

    pub fn from_payload(values: Payload) -> Self {
        Self { values }
    }
}

/// Single-lens mode: one lens applied on start, carousel locked to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithLens {
    pub lens_id: String,
    pub lens_group_id: String,
    /// Show the lens icon in the carousel
    pub display_lens_icon: bool,
    pub launch_data: LaunchData,
    pub camera: CameraOptions,
}

impl WithLens {
    pub fn new(lens_id: impl Into<String>, lens_group_id: impl Into<String>) -> Self {
        Self {
            lens_id: lens_id.into(),
            lens_group_id: lens_group_id.into(),
            display_lens_icon: true,
            launch_data: LaunchData::default(),
            camera: CameraOptions::default(),
        }
    }

    pub fn display_lens_icon(mut self, display: bool) -> Self {
        self.display_lens_icon = display;
        self
    }

    pub fn launch_data(mut self, launch_data: LaunchData) -> Self {
        self.launch_data = launch_data;
        self
    }

    pub fn camera(mut self, camera: CameraOptions) -> Self {
        self.camera = camera;
        self
    }
}

/// Multi-lens carousel mode. Always observes at least one lens group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithLenses {
    lens_group_ids: BTreeSet<String>,
    apply_lens_by_id: Option<String>,
    prefetch_lens_by_id_pattern: Option<String>,
    disable_idle_state: bool,
    camera: CameraOptions,
}

impl WithLenses {
    /// Fails with [`LensKitError::EmptyLensGroups`] when no group id is given.
    pub fn new<I, S>(lens_group_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lens_group_ids: BTreeSet<String> =
            lens_group_ids.into_iter().map(Into::into).collect();
        if lens_group_ids.is_empty() {
            return Err(LensKitError::EmptyLensGroups);
        }

        Ok(Self {
            lens_group_ids,
            apply_lens_by_id: None,
            prefetch_lens_by_id_pattern: None,
            disable_idle_state: true,
            camera: CameraOptions::default(),
        })
    }

    /// Pre-select and apply this lens once it becomes available
    pub fn apply_lens_by_id(mut self, lens_id: impl Into<String>) -> Self {
        self.apply_lens_by_id = Some(lens_id.into());
        self
    }

    /// Prefetch every available lens whose id fully matches this regex
    pub fn prefetch_lens_by_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.prefetch_lens_by_id_pattern = Some(pattern.into());
        self
    }

    pub fn disable_idle_state(mut self, disable: bool) -> Self {
        self.disable_idle_state = disable;
        self
    }

    pub fn camera(mut self, camera: CameraOptions) -> Self {
        self.camera = camera;
        self
    }

    pub fn lens_group_ids(&self) -> &BTreeSet<String> {
        &self.lens_group_ids
    }

    pub fn applied_lens_id(&self) -> Option<&str> {
        self.apply_lens_by_id.as_deref()
    }

    pub fn prefetch_pattern(&self) -> Option<&str> {
        self.prefetch_lens_by_id_pattern.as_deref()
    }

    pub fn idle_state_disabled(&self) -> bool {
        self.disable_idle_state
    }

    pub fn camera_options(&self) -> &CameraOptions {
        &self.camera
    }
}

/// Everything needed to launch a camera session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Configuration {
    WithLens(WithLens),
    WithLenses(WithLenses),
}

impl Configuration {
    pub fn camera(&self) -> &CameraOptions {
        match self {
            Self::WithLens(config) => &config.camera,
            Self::WithLenses(config) => &config.camera,
        }
    }

    /// Lens groups the session repository is filtered by
    pub fn lens_group_ids(&self) -> BTreeSet<String> {
        match self {
            Self::WithLens(config) => BTreeSet::from([config.lens_group_id.clone()]),
            Self::WithLenses(config) => config.lens_group_ids.clone(),
        }
    }

    /// Lens to apply once available, if any
    pub fn target_lens_id(&self) -> Option<&str> {
        match self {
            Self::WithLens(config) => Some(config.lens_id.as_str()),
            Self::WithLenses(config) => config.applied_lens_id(),
        }
    }

    pub fn prefetch_pattern(&self) -> Option<&str> {
        match self {
            Self::WithLens(_) => None,
            Self::WithLenses(config) => config.prefetch_pattern(),
        }
    }

    pub fn launch_data(&self) -> Option<&LaunchData> {
        match self {
            Self::WithLens(config) => Some(&config.launch_data),
            Self::WithLenses(_) => None,
        }
    }

    /// True when the user must not switch away from the target lens
    pub fn single_lens_mode(&self) -> bool {
        matches!(self, Self::WithLens(_))
    }
}

impl From<WithLens> for Configuration {
    fn from(config: WithLens) -> Self {
        Self::WithLens(config)
    }
}

impl From<WithLenses> for Configuration {
    fn from(config: WithLenses) -> Self {
        Self::WithLenses(config)
    }
}
