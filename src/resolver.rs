//! Named color and gradient lookup.
//!
//! [`PaintResolver`] indexes a catalog's `Color` and `Named Gradient`
//! records by name and turns references into resolved [`Color`]s and
//! [`Gradient`]s.

use std::collections::HashMap;

use crate::catalog::{AssetType, Catalog};
use crate::color::{resolve_color, Color};
use crate::gradient::{Gradient, Orientation};

/// Default colorspace label for color records that do not declare one.
const DEFAULT_COLORSPACE: &str = "srgb";

#[derive(Debug, Clone)]
struct ColorSource {
    components: Vec<f64>,
    colorspace: String,
}

#[derive(Debug, Clone)]
struct GradientSource {
    color_names: Vec<String>,
    orientation: Option<Orientation>,
}

/// Resolves color and gradient names declared in one catalog.
#[derive(Debug, Clone, Default)]
pub struct PaintResolver {
    colors: HashMap<String, ColorSource>,
    gradients: HashMap<String, GradientSource>,
    /// Gradient names in catalog order.
    gradient_order: Vec<String>,
    /// Color names in catalog order.
    color_order: Vec<String>,
}

impl PaintResolver {
    /// Indexes the catalog's top-level color and gradient records.
    ///
    /// Color records without components are ignored. When a name repeats,
    /// the last record wins.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut resolver = Self::default();
        for entry in catalog.entries() {
            let Some(name) = entry.name() else { continue };
            match entry.asset_type() {
                AssetType::Color => {
                    let Some(components) = &entry.color_components else { continue };
                    let source = ColorSource {
                        components: components.clone(),
                        colorspace: entry
                            .colorspace
                            .clone()
                            .unwrap_or_else(|| DEFAULT_COLORSPACE.to_string()),
                    };
                    if resolver.colors.insert(name.to_string(), source).is_none() {
                        resolver.color_order.push(name.to_string());
                    }
                }
                AssetType::NamedGradient => {
                    let source = GradientSource {
                        color_names: entry.gradient_colors.clone().unwrap_or_default(),
                        orientation: entry
                            .gradient_start_stop
                            .as_deref()
                            .and_then(Orientation::parse),
                    };
                    if resolver.gradients.insert(name.to_string(), source).is_none() {
                        resolver.gradient_order.push(name.to_string());
                    }
                }
                _ => {}
            }
        }
        resolver
    }

    pub fn is_color(&self, name: &str) -> bool {
        self.colors.contains_key(name)
    }

    pub fn is_gradient(&self, name: &str) -> bool {
        self.gradients.contains_key(name)
    }

    /// Named gradients in catalog declaration order.
    pub fn gradient_names(&self) -> impl Iterator<Item = &str> {
        self.gradient_order.iter().map(String::as_str)
    }

    /// Named colors in catalog declaration order.
    pub fn color_names(&self) -> impl Iterator<Item = &str> {
        self.color_order.iter().map(String::as_str)
    }

    /// Resolves a named color.
    pub fn color(&self, name: &str) -> Option<Color> {
        self.colors
            .get(name)
            .map(|c| resolve_color(&c.components, &c.colorspace))
    }

    /// Resolves a named gradient.
    ///
    /// Stops are resolved in order and accumulation stops at the first name
    /// with no color record. A single resolved stop is duplicated; none
    /// yields `None`.
    pub fn gradient(&self, name: &str) -> Option<Gradient> {
        let source = self.gradients.get(name)?;
        let stops = source
            .color_names
            .iter()
            .map_while(|cn| self.color(cn))
            .collect();
        Gradient::from_stops(stops, source.orientation)
    }

    /// True iff every color the gradient names exists and is gray.
    pub fn classify_gray(&self, name: &str) -> bool {
        let Some(source) = self.gradients.get(name) else {
            return false;
        };
        source
            .color_names
            .iter()
            .all(|cn| self.color(cn).is_some_and(|c| c.is_gray()))
    }

    /// Resolves a layer fill reference, which may name either a color or a
    /// gradient.
    ///
    /// A color becomes a flat two-stop gradient painted from the center
    /// down, matching how recolorable layers are tinted.
    pub fn layer_fill(&self, reference: &str) -> Option<Gradient> {
        if let Some(color) = self.color(reference) {
            return Some(Gradient::solid(color, Some(Orientation::CENTER_TO_BOTTOM)));
        }
        self.gradient(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(json: &str) -> PaintResolver {
        PaintResolver::from_catalog(&Catalog::from_json(json).unwrap())
    }

    const CATALOG: &str = r#"[
        {},
        {"AssetType": "Color", "Name": "red", "Color components": [1, 0, 0, 1], "Colorspace": "srgb"},
        {"AssetType": "Color", "Name": "white", "Color components": [1, 1], "Colorspace": "gray gamma 22"},
        {"AssetType": "Color", "Name": "black", "Color components": [0, 1], "Colorspace": "gray gamma 22"},
        {"AssetType": "Color", "Name": "empty"},
        {"AssetType": "Named Gradient", "Name": "sunset", "Gradient Colors": ["red", "white"], "Gradient Start/Stop": "0,0 - 1,1"},
        {"AssetType": "Named Gradient", "Name": "mono", "Gradient Colors": ["white", "black"]},
        {"AssetType": "Named Gradient", "Name": "broken", "Gradient Colors": ["red", "missing", "white"]},
        {"AssetType": "Named Gradient", "Name": "nothing", "Gradient Colors": ["missing"]},
        {"AssetType": "Named Gradient", "Name": "partial-gray", "Gradient Colors": ["white", "missing"]}
    ]"#;

    #[test]
    fn resolves_gradients_with_orientation() {
        let r = resolver(CATALOG);
        let sunset = r.gradient("sunset").unwrap();
        assert_eq!(sunset.stops().len(), 2);
        assert_eq!(sunset.stops()[1], Color::gray(1.0, 1.0));
        assert_eq!(sunset.orientation.unwrap().stop.x, 1.0);
        assert!(r.gradient("mono").unwrap().orientation.is_none());
    }

    #[test]
    fn stops_at_first_unresolvable_name() {
        let r = resolver(CATALOG);
        let broken = r.gradient("broken").unwrap();
        // Only "red" resolves before the gap, so it is duplicated.
        assert_eq!(broken.stops()[0], broken.stops()[1]);
        assert!(!broken.stops()[0].is_gray());
        assert!(r.gradient("nothing").is_none());
        assert!(r.gradient("unknown").is_none());
    }

    #[test]
    fn gray_classification_requires_every_stop() {
        let r = resolver(CATALOG);
        assert!(r.classify_gray("mono"));
        assert!(!r.classify_gray("sunset"));
        assert!(!r.classify_gray("partial-gray"));
        assert!(!r.classify_gray("unknown"));
    }

    #[test]
    fn color_records_without_components_are_ignored() {
        let r = resolver(CATALOG);
        assert!(!r.is_color("empty"));
        assert_eq!(r.color_names().collect::<Vec<_>>(), ["red", "white", "black"]);
    }

    #[test]
    fn layer_fill_from_color_points_down_from_center() {
        let r = resolver(CATALOG);
        let fill = r.layer_fill("white").unwrap();
        assert_eq!(fill.orientation, Some(Orientation::CENTER_TO_BOTTOM));
        assert_eq!(fill.stops(), &[Color::gray(1.0, 1.0); 2]);

        let gradient_fill = r.layer_fill("sunset").unwrap();
        assert_eq!(gradient_fill, r.gradient("sunset").unwrap());
        assert!(r.layer_fill("missing").is_none());
    }
}
