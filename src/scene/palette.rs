//! CSS custom-property palette with a wide-gamut override.

use std::collections::HashMap;

use crate::appearance::OPACITY_EPSILON;
use crate::color::Color;

/// Distinct colors of a scene in first-use order, each bound to a
/// `--cN` custom property.
#[derive(Debug, Clone, Default)]
pub struct ColorPalette {
    colors: Vec<Color>,
    /// Literal → index into `colors`.
    index: HashMap<String, usize>,
}

impl ColorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a color and returns its `var(--cN)` reference.
    pub fn register(&mut self, color: Color) -> String {
        let literal = color.to_string();
        let next = self.colors.len();
        let slot = *self.index.entry(literal).or_insert_with(|| next);
        if slot == next {
            self.colors.push(color);
        }
        format!("var(--c{slot})")
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Stylesheet declaring every color twice: an 8-bit sRGB fallback on
    /// `:root`, then the Display P3 value for wide-gamut displays.
    pub fn stylesheet(&self) -> String {
        let mut narrow = Vec::with_capacity(self.colors.len());
        let mut wide = Vec::with_capacity(self.colors.len());
        for (i, color) in self.colors.iter().enumerate() {
            narrow.push(format!("    --c{i}: {};", srgb_css(color)));
            wide.push(format!("      --c{i}: {};", p3_css(color)));
        }
        let mut lines = vec![":root {".to_string()];
        lines.extend(narrow);
        lines.push("}".to_string());
        lines.push("@media (color-gamut: p3) {".to_string());
        lines.push("  :root {".to_string());
        lines.extend(wide);
        lines.push("  }".to_string());
        lines.push("}".to_string());
        lines.join("\n")
    }
}

fn is_opaque(alpha: f64) -> bool {
    (alpha - 1.0).abs() < OPACITY_EPSILON
}

fn srgb_css(color: &Color) -> String {
    let rgb = color.srgb_fallback();
    let alpha = color.alpha();
    if is_opaque(alpha) {
        format!("rgb({}, {}, {})", rgb.red, rgb.green, rgb.blue)
    } else {
        format!("rgba({}, {}, {}, {alpha:.4})", rgb.red, rgb.green, rgb.blue)
    }
}

fn p3_css(color: &Color) -> String {
    let [r, g, b] = color.wide_gamut_rgb();
    let alpha = color.alpha();
    if is_opaque(alpha) {
        format!("color(display-p3 {r:.5} {g:.5} {b:.5})")
    } else {
        format!("color(display-p3 {r:.5} {g:.5} {b:.5} / {alpha:.5})")
    }
}
