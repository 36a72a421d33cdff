//! Serializable conversion settings.
//!
//! [`ConvertOptions`] selects what to convert; [`EffectsProfile`] holds the
//! tuned constants of the scene's visual effects. Both round-trip through
//! JSON with `camelCase` keys, and every field has a default so partial
//! documents deserialize.
//!
//! # Example
//!
//! ```
//! use icon_recomposer::{ConvertOptions, EffectsProfile};
//!
//! let options = ConvertOptions::from_json(r#"{ "iconName": "AppIcon" }"#).unwrap();
//! assert_eq!(options.icon_name.as_deref(), Some("AppIcon"));
//! assert_eq!(options.canvas, None);
//!
//! // Effects are tuned for a 1024 canvas and scale with it.
//! let half = EffectsProfile::default().scaled(512);
//! assert_eq!(half.shadow.blur, 8.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_CANVAS;

// ============================================================================
// ConvertOptions
// ============================================================================

/// What to convert.
///
/// # JSON Format
///
/// ```json
/// {
///   "iconName": "AppIcon",
///   "canvas": 1024
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Name of the icon inside the catalog. Restricts background gradient
    /// discovery and rendition naming to `iconName/…` records. Derived from
    /// the catalog when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_name: Option<String>,

    /// Scene edge length in pixels. Defaults to the catalog's canvas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<u32>,

    /// Effect constants for the scene.
    #[serde(default)]
    pub effects: EffectsProfile,
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_icon_name(mut self, name: impl Into<String>) -> Self {
        self.icon_name = Some(name.into());
        self
    }

    pub fn with_canvas(mut self, canvas: u32) -> Self {
        self.canvas = Some(canvas);
        self
    }

    pub fn with_effects(mut self, effects: EffectsProfile) -> Self {
        self.effects = effects;
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Effect settings
// ============================================================================

/// Drop shadow constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct ShadowSettings {
    /// Gaussian blur standard deviation.
    pub blur: f64,
    /// Downward offset.
    pub offset: f64,
    /// Multiplier applied to the group's shadow opacity. Catalog opacities
    /// describe full designed strength, not a literal alpha.
    pub opacity_scale: f64,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            blur: 16.0,
            offset: 10.0,
            opacity_scale: 0.35,
        }
    }
}

/// Glass rim and specular highlight constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct SpecularSettings {
    /// Color matrix gain applied to content under the rim.
    pub darken: f64,
    /// Inward erosion radius that sets the rim width.
    pub rim_erode: f64,
    /// Softening blur of the eroded edge.
    pub rim_blur: f64,
    /// Blur of the alpha bump map fed to the lighting.
    pub bump_blur: f64,
    pub surface_scale: f64,
    pub specular_constant: f64,
    pub specular_exponent: f64,
    /// Height of the point light above the canvas. The light sits at the
    /// top center.
    pub light_z: f64,
}

impl Default for SpecularSettings {
    fn default() -> Self {
        Self {
            darken: 0.9,
            rim_erode: 4.0,
            rim_blur: 2.0,
            bump_blur: 15.0,
            surface_scale: 6.0,
            specular_constant: 0.5,
            specular_exponent: 20.0,
            light_z: 500.0,
        }
    }
}

/// Frosted backdrop constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct BackdropSettings {
    /// Blur standard deviation per unit of blur material.
    pub blur_per_unit: f64,
    pub noise_frequency: f64,
    pub noise_octaves: u32,
    pub noise_seed: u32,
    /// Displacement of the blurred backdrop by the noise.
    pub displacement: f64,
}

impl Default for BackdropSettings {
    fn default() -> Self {
        Self {
            blur_per_unit: 100.0,
            noise_frequency: 0.008,
            noise_octaves: 2,
            noise_seed: 1,
            displacement: 10.0,
        }
    }
}

// ============================================================================
// EffectsProfile
// ============================================================================

/// All tuned effect constants, calibrated at [`reference_canvas`].
///
/// [`reference_canvas`]: Self::reference_canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct EffectsProfile {
    /// Canvas edge length the constants were tuned for.
    pub reference_canvas: u32,
    pub shadow: ShadowSettings,
    pub specular: SpecularSettings,
    pub backdrop: BackdropSettings,
}

impl Default for EffectsProfile {
    fn default() -> Self {
        Self {
            reference_canvas: DEFAULT_CANVAS,
            shadow: ShadowSettings::default(),
            specular: SpecularSettings::default(),
            backdrop: BackdropSettings::default(),
        }
    }
}

impl EffectsProfile {
    /// Rescales lengths linearly, and frequencies inversely, from the
    /// reference canvas to `canvas`. Ratios and counts are unchanged. A zero
    /// canvas is treated as one pixel.
    pub fn scaled(&self, canvas: u32) -> Self {
        let canvas = canvas.max(1);
        if self.reference_canvas == 0 || canvas == self.reference_canvas {
            return Self {
                reference_canvas: canvas,
                ..*self
            };
        }
        let k = f64::from(canvas) / f64::from(self.reference_canvas);
        let shadow = ShadowSettings {
            blur: self.shadow.blur * k,
            offset: self.shadow.offset * k,
            ..self.shadow
        };
        let specular = SpecularSettings {
            rim_erode: self.specular.rim_erode * k,
            rim_blur: self.specular.rim_blur * k,
            bump_blur: self.specular.bump_blur * k,
            light_z: self.specular.light_z * k,
            ..self.specular
        };
        let backdrop = BackdropSettings {
            blur_per_unit: self.backdrop.blur_per_unit * k,
            noise_frequency: self.backdrop.noise_frequency / k,
            displacement: self.backdrop.displacement * k,
            ..self.backdrop
        };
        Self {
            reference_canvas: canvas,
            shadow,
            specular,
            backdrop,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Tests
// ============================================================================
