//! Color resolution and gamut conversion.
//!
//! Catalog colors arrive as raw component tuples tagged with a colorspace
//! label. They are canonicalized into a [`Color`], which is either a Display
//! P3 quadruple or an extended-gray pair. sRGB input is converted into
//! Display P3 through CIE XYZ (D65) so it keeps its visual appearance.
//!
//! Extended-range values (outside 0..1) survive every step; clamping only
//! happens when a narrow-gamut fallback is quantized for display.

use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Gamut matrices
// ============================================================================

type Mat3 = [[f64; 3]; 3];

/// Linear sRGB → CIE XYZ (D65).
const SRGB_TO_XYZ: Mat3 = [
    [0.4123908, 0.3575843, 0.1804808],
    [0.2126390, 0.7151687, 0.0721923],
    [0.0193308, 0.1191948, 0.9505322],
];

/// CIE XYZ (D65) → linear Display P3.
const XYZ_TO_P3: Mat3 = [
    [2.4934969, -0.9313836, -0.4027108],
    [-0.8294890, 1.7626641, 0.0236247],
    [0.0358458, -0.0761724, 0.9568845],
];

/// Linear Display P3 → CIE XYZ (D65).
const P3_TO_XYZ: Mat3 = [
    [0.4865709, 0.2656677, 0.1982173],
    [0.2289746, 0.6917385, 0.0792869],
    [0.0000000, 0.0451134, 1.0439444],
];

/// CIE XYZ (D65) → linear sRGB.
const XYZ_TO_SRGB: Mat3 = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040260, 1.0572252],
];

fn mul(m: &Mat3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// sRGB transfer function, decoding direction. Sign-preserving so extended
/// range values stay meaningful.
fn linearize(v: f64) -> f64 {
    let magnitude = v.abs();
    let linear = if magnitude <= 0.04045 {
        magnitude / 12.92
    } else {
        ((magnitude + 0.055) / 1.055).powf(2.4)
    };
    linear.copysign(v)
}

/// Inverse of [`linearize`].
fn gamma_encode(v: f64) -> f64 {
    let magnitude = v.abs();
    let encoded = if magnitude <= 0.0031308 {
        magnitude * 12.92
    } else {
        1.055 * magnitude.powf(1.0 / 2.4) - 0.055
    };
    encoded.copysign(v)
}

/// Converts gamma-encoded sRGB components to gamma-encoded Display P3.
///
/// Display P3 shares the sRGB transfer curve, so only the primaries change.
pub fn srgb_to_display_p3(rgb: [f64; 3]) -> [f64; 3] {
    let linear = rgb.map(linearize);
    let p3 = mul(&XYZ_TO_P3, mul(&SRGB_TO_XYZ, linear));
    p3.map(gamma_encode)
}

/// Converts gamma-encoded Display P3 components to gamma-encoded sRGB.
///
/// The result is not clamped; out-of-gamut P3 colors produce values outside
/// 0..1.
pub fn display_p3_to_srgb(rgb: [f64; 3]) -> [f64; 3] {
    let linear = rgb.map(linearize);
    let srgb = mul(&XYZ_TO_SRGB, mul(&P3_TO_XYZ, linear));
    srgb.map(gamma_encode)
}

// ============================================================================
// Color
// ============================================================================

/// A canonical, resolved color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    /// Gamma-encoded Display P3 components plus alpha.
    DisplayP3 { r: f64, g: f64, b: f64, a: f64 },
    /// Extended-range gray level plus alpha.
    Gray { gray: f64, alpha: f64 },
}

/// Mid-gray used when a color record carries no usable components.
pub const FALLBACK_GRAY: Color = Color::DisplayP3 {
    r: 0.5,
    g: 0.5,
    b: 0.5,
    a: 1.0,
};

const P3_PREFIX: &str = "display-p3:";
const GRAY_PREFIX: &str = "extended-gray:";

impl Color {
    pub fn p3(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self::DisplayP3 { r, g, b, a }
    }

    pub fn gray(gray: f64, alpha: f64) -> Self {
        Self::Gray { gray, alpha }
    }

    /// Returns true for extended-gray colors.
    pub fn is_gray(&self) -> bool {
        matches!(self, Self::Gray { .. })
    }

    pub fn alpha(&self) -> f64 {
        match *self {
            Self::DisplayP3 { a, .. } => a,
            Self::Gray { alpha, .. } => alpha,
        }
    }

    /// The color as wide-gamut RGB. Gray levels expand to equal channels.
    pub fn wide_gamut_rgb(&self) -> [f64; 3] {
        match *self {
            Self::DisplayP3 { r, g, b, .. } => [r, g, b],
            Self::Gray { gray, .. } => [gray; 3],
        }
    }

    /// Narrow-gamut fallback quantized to 8-bit sRGB.
    ///
    /// Gray levels pass through unchanged; Display P3 colors go through the
    /// inverse gamut transform. Channels are clamped to [0, 1] here and only
    /// here.
    pub fn srgb_fallback(&self) -> Srgb<u8> {
        let [r, g, b] = match *self {
            Self::DisplayP3 { r, g, b, .. } => display_p3_to_srgb([r, g, b]),
            Self::Gray { gray, .. } => [gray; 3],
        };
        Srgb::new(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0)).into_format()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DisplayP3 { r, g, b, a } => {
                write!(f, "{P3_PREFIX}{r:.5},{g:.5},{b:.5},{a:.5}")
            }
            Self::Gray { gray, alpha } => write!(f, "{GRAY_PREFIX}{gray:.5},{alpha:.5}"),
        }
    }
}

/// Error returned when a color literal cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseColorError {
    #[error("unknown color space in literal `{0}`")]
    UnknownSpace(String),
    #[error("invalid component in color literal `{0}`")]
    InvalidComponent(String),
}

impl FromStr for Color {
    type Err = ParseColorError;

    /// Parses `display-p3:r,g,b[,a]` or `extended-gray:g[,a]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |body: &str| -> Result<Vec<f64>, ParseColorError> {
            body.split(',')
                .map(|part| {
                    part.trim()
                        .parse::<f64>()
                        .map_err(|_| ParseColorError::InvalidComponent(s.to_string()))
                })
                .collect()
        };

        if let Some(body) = s.strip_prefix(GRAY_PREFIX) {
            let values = parse(body)?;
            return Ok(Self::gray(values[0], values.get(1).copied().unwrap_or(1.0)));
        }
        if let Some(body) = s.strip_prefix(P3_PREFIX) {
            let values = parse(body)?;
            let at = |i: usize, default: f64| values.get(i).copied().unwrap_or(default);
            return Ok(Self::p3(values[0], at(1, 0.0), at(2, 0.0), at(3, 1.0)));
        }
        Err(ParseColorError::UnknownSpace(s.to_string()))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        literal.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "jsonschema")]
impl schemars::JsonSchema for Color {
    fn schema_name() -> String {
        "ColorLiteral".to_string()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(generator)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Source colorspace of raw catalog components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSpace {
    Gray,
    /// Already in the wide gamut; components are used verbatim.
    DisplayP3,
    /// sRGB or extended sRGB; converted into the wide gamut.
    Srgb,
}

impl SourceSpace {
    /// Classifies a catalog colorspace label such as `srgb`,
    /// `extended srgb`, `display-p3` or `gray gamma 22`.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.contains("gray") {
            Self::Gray
        } else if label.contains("p3") {
            Self::DisplayP3
        } else {
            Self::Srgb
        }
    }
}

/// Resolves raw catalog components into a canonical [`Color`].
///
/// Gray-like spaces, and any 2-component tuple, are read as `(gray, alpha)`.
/// Everything else is read as `(r, g, b[, a = 1])`.
///
/// # Example
///
/// ```
/// use icon_recomposer::resolve_color;
///
/// let gray = resolve_color(&[0.25, 0.5], "gray gamma 22");
/// assert_eq!(gray.to_string(), "extended-gray:0.25000,0.50000");
/// ```
pub fn resolve_color(components: &[f64], colorspace: &str) -> Color {
    let space = SourceSpace::from_label(colorspace);
    match components {
        [] => FALLBACK_GRAY,
        [gray] if space == SourceSpace::Gray => Color::gray(*gray, 1.0),
        [gray, alpha, ..] if space == SourceSpace::Gray => Color::gray(*gray, *alpha),
        [gray, alpha] => Color::gray(*gray, *alpha),
        [_] => FALLBACK_GRAY,
        [r, g, b, rest @ ..] => {
            let a = rest.first().copied().unwrap_or(1.0);
            let [r, g, b] = match space {
                SourceSpace::Srgb => srgb_to_display_p3([*r, *g, *b]),
                _ => [*r, *g, *b],
            };
            Color::p3(r, g, b, a)
        }
    }
}
