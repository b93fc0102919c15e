//! # Launch Manifest
//!
//! Describes a launch configuration in a `launch.toml` file, so a host can
//! keep camera settings outside of code.
//!
//! # Example launch.toml
//!
//! ```toml
//! [camera]
//! api_token = "camera-kit-token"
//! facing_front = false
//!
//! [flash]
//! use_ring_flash = true
//!
//! [adjustments]
//! portrait = false
//!
//! [lenses]
//! group_ids = ["G1", "G2"]
//! apply_lens_id = "42"
//! prefetch_pattern = "lens_.*"
//! ```
//!
//! A single-lens launch uses `[lens]` instead of `[lenses]`:
//!
//! ```toml
//! [lens]
//! id = "42"
//! group_id = "G1"
//! display_icon = false
//!
//! [lens.launch_data]
//! sku = "a-1"
//! sizes = ["s", "m"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::configuration::{
    AdjustmentsConfiguration, CameraOptions, Configuration, FlashConfiguration, LaunchData,
    WithLens, WithLenses,
};
use crate::error::{LensKitError, Result};

pub const MANIFEST_FILENAME: &str = "launch.toml";

fn default_true() -> bool {
    true
}

/// Launch configuration parsed from launch.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchManifest {
    #[serde(default)]
    pub camera: CameraSection,

    #[serde(default)]
    pub flash: FlashSection,

    #[serde(default)]
    pub adjustments: AdjustmentsSection,

    /// Single-lens launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<LensSection>,

    /// Carousel launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lenses: Option<LensesSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_true")]
    pub facing_front: bool,
    #[serde(default = "default_true")]
    pub facing_flip_enabled: bool,
    #[serde(default)]
    pub facing_based_on_lens: bool,
    #[serde(default = "default_true")]
    pub focus_enabled: bool,
    #[serde(default = "default_true")]
    pub zoom_enabled: bool,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            api_token: None,
            facing_front: true,
            facing_flip_enabled: true,
            facing_based_on_lens: false,
            focus_enabled: true,
            zoom_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub use_ring_flash: bool,
    #[serde(default)]
    pub change_system_bar_colors: bool,
}

impl Default for FlashSection {
    fn default() -> Self {
        Self {
            enabled: true,
            use_ring_flash: false,
            change_system_bar_colors: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentsSection {
    #[serde(default = "default_true")]
    pub tone: bool,
    #[serde(default = "default_true")]
    pub portrait: bool,
}

impl Default for AdjustmentsSection {
    fn default() -> Self {
        Self {
            tone: true,
            portrait: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensSection {
    pub id: String,
    pub group_id: String,
    #[serde(default = "default_true")]
    pub display_icon: bool,
    /// Strings, integers, booleans, or arrays of strings
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub launch_data: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensesSection {
    pub group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_lens_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub disable_idle_state: bool,
}

impl LaunchManifest {
    /// Parse manifest from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| LensKitError::Manifest(e.to_string()))
    }

    /// Serialize manifest to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LensKitError::Manifest(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// `<config dir>/lenskit/launch.toml`, when the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lenskit").join(MANIFEST_FILENAME))
    }

    fn camera_options(&self) -> CameraOptions {
        let flash = if self.flash.enabled {
            FlashConfiguration::Enabled {
                use_ring_flash: self.flash.use_ring_flash,
                change_system_bar_colors: self.flash.change_system_bar_colors,
            }
        } else {
            FlashConfiguration::Disabled
        };

        CameraOptions {
            facing_front: self.camera.facing_front,
            facing_flip_enabled: self.camera.facing_flip_enabled,
            facing_based_on_lens: self.camera.facing_based_on_lens,
            flash,
            adjustments: AdjustmentsConfiguration {
                tone_adjustment_enabled: self.adjustments.tone,
                portrait_adjustment_enabled: self.adjustments.portrait,
            },
            focus_enabled: self.camera.focus_enabled,
            zoom_enabled: self.camera.zoom_enabled,
            api_token: self.camera.api_token.clone(),
        }
    }

    /// Build the configuration this manifest describes
    pub fn into_configuration(&self) -> Result<Configuration> {
        let camera = self.camera_options();

        match (&self.lens, &self.lenses) {
            (Some(lens), None) => Ok(WithLens::new(&lens.id, &lens.group_id)
                .display_lens_icon(lens.display_icon)
                .launch_data(launch_data_from_table(&lens.launch_data)?)
                .camera(camera)
                .into()),
            (None, Some(lenses)) => {
                let mut config = WithLenses::new(lenses.group_ids.iter().cloned())?
                    .disable_idle_state(lenses.disable_idle_state)
                    .camera(camera);
                if let Some(id) = &lenses.apply_lens_id {
                    config = config.apply_lens_by_id(id);
                }
                if let Some(pattern) = &lenses.prefetch_pattern {
                    config = config.prefetch_lens_by_id_pattern(pattern);
                }
                Ok(config.into())
            }
            (Some(_), Some(_)) => Err(LensKitError::Manifest(
                "only one of [lens] and [lenses] may be given".to_string(),
            )),
            (None, None) => Err(LensKitError::Manifest(
                "one of [lens] or [lenses] is required".to_string(),
            )),
        }
    }
}

fn launch_data_from_table(table: &toml::Table) -> Result<LaunchData> {
    let mut data = LaunchData::new();
    for (key, value) in table {
        data = match value {
            toml::Value::String(s) => data.with_string(key, s),
            toml::Value::Integer(i) => data.with_int(key, *i),
            toml::Value::Boolean(b) => data.with_bool(key, *b),
            toml::Value::Array(items) => {
                let strings = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<String>>>()
                    .ok_or_else(|| {
                        LensKitError::Manifest(format!(
                            "launch_data.{} must be an array of strings",
                            key
                        ))
                    })?;
                data.with_strings(key, strings)
            }
            other => {
                return Err(LensKitError::Manifest(format!(
                    "launch_data.{} has unsupported type {}",
                    key,
                    other.type_str()
                )))
            }
        };
    }
    Ok(data)
}
