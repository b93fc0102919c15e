//! # Configuration Codec
//!
//! Encodes a [`Configuration`] into a flat [`Payload`] and decodes it back on
//! the receiving side. Pure and stateless.
//!
//! Optional values are omitted rather than written as empty strings so that
//! "absent" and "empty" stay distinguishable. Absent slots decode to these
//! defaults:
//!
//! | Slot | Default |
//! |---|---|
//! | `api_token` | none |
//! | `facing_front` | `true` |
//! | `facing_flip_enabled` | `true` |
//! | `facing_based_on_lens` | `false` |
//! | `flash_configuration` | enabled, no ring flash, no system bar colours |
//! | `adjustments_configuration` | tone and portrait enabled |
//! | `focus_enabled` | `true` |
//! | `zoom_enabled` | `true` |
//! | `lens_group_ids` | empty (rejected) |
//! | `apply_lens_id` | none |
//! | `prefetch_lens_id_pattern` | none |
//! | `disable_carousel_idle` | `true` |
//! | `disable_carousel` | `false` |
//! | `lens_launch_data` | empty |
//!
//! Flash and adjustments are nested payloads so their own round trip can be
//! checked in isolation.

use std::collections::BTreeSet;

use crate::configuration::{
    AdjustmentsConfiguration, CameraOptions, Configuration, FlashConfiguration, LaunchData,
    WithLens, WithLenses,
};
use crate::error::{LensKitError, Result};
use crate::payload::Payload;

/// Slot names of the transport payload
pub mod slots {
    pub const CONFIGURATION_TYPE: &str = "configuration_type";
    pub const API_TOKEN: &str = "api_token";
    pub const FACING_FRONT: &str = "facing_front";
    pub const FACING_FLIP_ENABLED: &str = "facing_flip_enabled";
    pub const FACING_BASED_ON_LENS: &str = "facing_based_on_lens";
    pub const FLASH_CONFIGURATION: &str = "flash_configuration";
    pub const ADJUSTMENTS_CONFIGURATION: &str = "adjustments_configuration";
    pub const FOCUS_ENABLED: &str = "focus_enabled";
    pub const ZOOM_ENABLED: &str = "zoom_enabled";
    pub const LENS_GROUP_IDS: &str = "lens_group_ids";
    pub const APPLY_LENS_ID: &str = "apply_lens_id";
    pub const PREFETCH_LENS_ID_PATTERN: &str = "prefetch_lens_id_pattern";
    pub const DISABLE_CAROUSEL_IDLE: &str = "disable_carousel_idle";
    pub const DISABLE_CAROUSEL: &str = "disable_carousel";
    pub const LENS_LAUNCH_DATA: &str = "lens_launch_data";

    pub const FLASH_TYPE: &str = "flash_type";
    pub const USE_RING_FLASH: &str = "use_ring_flash";
    pub const CHANGE_SYSTEM_BAR_COLORS: &str = "change_system_bar_colors";

    pub const TONE_ADJUSTMENT_ENABLED: &str = "tone_adjustment_enabled";
    pub const PORTRAIT_ADJUSTMENT_ENABLED: &str = "portrait_adjustment_enabled";
}

const TYPE_WITH_LENS: &str = "with_lens";
const TYPE_WITH_LENSES: &str = "with_lenses";
const FLASH_DISABLED: &str = "disabled";
const FLASH_ENABLED: &str = "enabled";

/// Encode a configuration. Total over every variant.
pub fn encode(configuration: &Configuration) -> Payload {
    let mut payload = Payload::new();

    match configuration {
        Configuration::WithLens(_) => payload.put_string(slots::CONFIGURATION_TYPE, TYPE_WITH_LENS),
        Configuration::WithLenses(_) => {
            payload.put_string(slots::CONFIGURATION_TYPE, TYPE_WITH_LENSES)
        }
    }

    encode_camera(configuration.camera(), &mut payload);

    match configuration {
        Configuration::WithLens(config) => {
            payload.put_strings(slots::LENS_GROUP_IDS, [config.lens_group_id.as_str()]);
            payload.put_string(slots::APPLY_LENS_ID, config.lens_id.as_str());
            payload.put_bool(slots::DISABLE_CAROUSEL, !config.display_lens_icon);
            if !config.launch_data.is_empty() {
                payload.put_nested(slots::LENS_LAUNCH_DATA, config.launch_data.as_payload().clone());
            }
        }
        Configuration::WithLenses(config) => {
            payload.put_strings(
                slots::LENS_GROUP_IDS,
                config.lens_group_ids().iter().map(String::as_str),
            );
            payload.put_optional_string(slots::APPLY_LENS_ID, config.applied_lens_id());
            payload.put_optional_string(slots::PREFETCH_LENS_ID_PATTERN, config.prefetch_pattern());
            payload.put_bool(slots::DISABLE_CAROUSEL_IDLE, config.idle_state_disabled());
        }
    }

    payload
}

/// Decode a configuration, applying defaults for absent slots.
pub fn decode(payload: &Payload) -> Result<Configuration> {
    let camera = decode_camera(payload)?;
    let lens_group_ids: BTreeSet<String> = payload
        .get_strings(slots::LENS_GROUP_IDS)?
        .map(|ids| ids.iter().cloned().collect())
        .unwrap_or_default();
    let apply_lens_id = payload.get_str(slots::APPLY_LENS_ID)?;

    let single_lens = match payload.get_str(slots::CONFIGURATION_TYPE)? {
        Some(TYPE_WITH_LENS) => true,
        Some(TYPE_WITH_LENSES) => false,
        Some(other) => {
            return Err(LensKitError::invalid_slot(
                slots::CONFIGURATION_TYPE,
                format!("unknown configuration type '{}'", other),
            ))
        }
        None => {
            payload.contains(slots::DISABLE_CAROUSEL)
                && lens_group_ids.len() == 1
                && apply_lens_id.is_some()
        }
    };

    if lens_group_ids.is_empty() {
        return Err(LensKitError::EmptyLensGroups);
    }

    if single_lens {
        if lens_group_ids.len() != 1 {
            return Err(LensKitError::invalid_slot(
                slots::LENS_GROUP_IDS,
                format!("single lens mode expects one group, found {}", lens_group_ids.len()),
            ));
        }
        let lens_id = apply_lens_id
            .ok_or_else(|| LensKitError::MissingSlot(slots::APPLY_LENS_ID.to_string()))?;
        let disable_carousel = payload.get_bool(slots::DISABLE_CAROUSEL)?.unwrap_or(false);
        let launch_data = payload
            .get_nested(slots::LENS_LAUNCH_DATA)?
            .cloned()
            .map(LaunchData::from_payload)
            .unwrap_or_default();
        let lens_group_id = lens_group_ids.into_iter().next().unwrap_or_default();

        return Ok(Configuration::WithLens(WithLens {
            lens_id: lens_id.to_string(),
            lens_group_id,
            display_lens_icon: !disable_carousel,
            launch_data,
            camera,
        }));
    }

    let mut config = WithLenses::new(lens_group_ids)?
        .disable_idle_state(payload.get_bool(slots::DISABLE_CAROUSEL_IDLE)?.unwrap_or(true))
        .camera(camera);
    if let Some(lens_id) = apply_lens_id {
        config = config.apply_lens_by_id(lens_id);
    }
    if let Some(pattern) = payload.get_str(slots::PREFETCH_LENS_ID_PATTERN)? {
        config = config.prefetch_lens_by_id_pattern(pattern);
    }

    Ok(Configuration::WithLenses(config))
}

fn encode_camera(camera: &CameraOptions, payload: &mut Payload) {
    payload.put_optional_string(slots::API_TOKEN, camera.api_token.as_deref());
    payload.put_bool(slots::FACING_FRONT, camera.facing_front);
    payload.put_bool(slots::FACING_FLIP_ENABLED, camera.facing_flip_enabled);
    payload.put_bool(slots::FACING_BASED_ON_LENS, camera.facing_based_on_lens);
    payload.put_nested(slots::FLASH_CONFIGURATION, encode_flash(&camera.flash));
    payload.put_nested(
        slots::ADJUSTMENTS_CONFIGURATION,
        encode_adjustments(&camera.adjustments),
    );
    payload.put_bool(slots::FOCUS_ENABLED, camera.focus_enabled);
    payload.put_bool(slots::ZOOM_ENABLED, camera.zoom_enabled);
}

fn decode_camera(payload: &Payload) -> Result<CameraOptions> {
    let flash = match payload.get_nested(slots::FLASH_CONFIGURATION)? {
        Some(nested) => decode_flash(nested)?,
        None => FlashConfiguration::default(),
    };
    let adjustments = match payload.get_nested(slots::ADJUSTMENTS_CONFIGURATION)? {
        Some(nested) => decode_adjustments(nested)?,
        None => AdjustmentsConfiguration::default(),
    };

    Ok(CameraOptions {
        facing_front: payload.get_bool(slots::FACING_FRONT)?.unwrap_or(true),
        facing_flip_enabled: payload.get_bool(slots::FACING_FLIP_ENABLED)?.unwrap_or(true),
        facing_based_on_lens: payload.get_bool(slots::FACING_BASED_ON_LENS)?.unwrap_or(false),
        flash,
        adjustments,
        focus_enabled: payload.get_bool(slots::FOCUS_ENABLED)?.unwrap_or(true),
        zoom_enabled: payload.get_bool(slots::ZOOM_ENABLED)?.unwrap_or(true),
        api_token: payload.get_str(slots::API_TOKEN)?.map(str::to_string),
    })
}

pub fn encode_flash(flash: &FlashConfiguration) -> Payload {
    let mut payload = Payload::new();
    match flash {
        FlashConfiguration::Disabled => payload.put_string(slots::FLASH_TYPE, FLASH_DISABLED),
        FlashConfiguration::Enabled {
            use_ring_flash,
            change_system_bar_colors,
        } => {
            payload.put_string(slots::FLASH_TYPE, FLASH_ENABLED);
            payload.put_bool(slots::USE_RING_FLASH, *use_ring_flash);
            payload.put_bool(slots::CHANGE_SYSTEM_BAR_COLORS, *change_system_bar_colors);
        }
    }
    payload
}

/// Unknown or missing flash types fall back to the enabled default.
pub fn decode_flash(payload: &Payload) -> Result<FlashConfiguration> {
    match payload.get_str(slots::FLASH_TYPE)? {
        Some(FLASH_DISABLED) => Ok(FlashConfiguration::Disabled),
        Some(FLASH_ENABLED) => Ok(FlashConfiguration::Enabled {
            use_ring_flash: payload.get_bool(slots::USE_RING_FLASH)?.unwrap_or(false),
            change_system_bar_colors: payload
                .get_bool(slots::CHANGE_SYSTEM_BAR_COLORS)?
                .unwrap_or(false),
        }),
        _ => Ok(FlashConfiguration::default()),
    }
}

pub fn encode_adjustments(adjustments: &AdjustmentsConfiguration) -> Payload {
    let mut payload = Payload::new();
    payload.put_bool(slots::TONE_ADJUSTMENT_ENABLED, adjustments.tone_adjustment_enabled);
    payload.put_bool(
        slots::PORTRAIT_ADJUSTMENT_ENABLED,
        adjustments.portrait_adjustment_enabled,
    );
    payload
}

/// Slots missing from a present sub-payload decode as disabled.
pub fn decode_adjustments(payload: &Payload) -> Result<AdjustmentsConfiguration> {
    Ok(AdjustmentsConfiguration {
        tone_adjustment_enabled: payload
            .get_bool(slots::TONE_ADJUSTMENT_ENABLED)?
            .unwrap_or(false),
        portrait_adjustment_enabled: payload
            .get_bool(slots::PORTRAIT_ADJUSTMENT_ENABLED)?
            .unwrap_or(false),
    })
}
