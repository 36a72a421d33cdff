//! The appearance-resolved icon document.
//!
//! [`IconDocument`] is the portable output of a conversion: a root fill,
//! groups ordered back-to-front, and per-appearance specializations where
//! they differ from the defaults. [`DocumentCompiler`] builds it from an
//! [`IconModel`].
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "fill": { "linear-gradient": ["display-p3:…", "display-p3:…"] },
//!   "groups": [
//!     {
//!       "layers": [{ "image-name": "glyph.svg", "name": "glyph", "glass": true }],
//!       "shadow": { "kind": "neutral", "opacity": 0.5 },
//!       "translucency": { "enabled": true, "value": 0.5 }
//!     }
//!   ],
//!   "supported-platforms": { "squares": "shared" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::appearance::{Appearance, OPACITY_EPSILON};
use crate::catalog::{AssetType, Catalog};
use crate::color::{Color, FALLBACK_GRAY};
use crate::error::{DiagnosticKind, Diagnostics};
use crate::gradient::{Gradient, Orientation};
use crate::model::{GroupRecord, IconModel, LayerRecord, ShadowKind};
use crate::naming::AssetNamer;
use crate::resolver::PaintResolver;

// ============================================================================
// Document types
// ============================================================================

/// A paint for the icon background or a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(untagged)]
pub enum Fill {
    LinearGradient {
        #[serde(rename = "linear-gradient")]
        stops: Vec<Color>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        orientation: Option<Orientation>,
    },
    /// A single color the renderer expands into a gradient itself.
    Automatic {
        #[serde(rename = "automatic-gradient")]
        color: Color,
    },
}

impl Fill {
    /// Colors to paint as gradient stops. An automatic gradient paints as
    /// its color repeated.
    pub fn stops(&self) -> Vec<Color> {
        match self {
            Self::LinearGradient { stops, .. } => stops.clone(),
            Self::Automatic { color } => vec![*color, *color],
        }
    }

    pub fn orientation(&self) -> Option<Orientation> {
        match self {
            Self::LinearGradient { orientation, .. } => *orientation,
            Self::Automatic { .. } => None,
        }
    }
}

impl From<Gradient> for Fill {
    fn from(gradient: Gradient) -> Self {
        let orientation = gradient.orientation;
        Self::LinearGradient {
            stops: gradient.into_stops(),
            orientation,
        }
    }
}

/// A value that replaces the default in one appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct Specialization<T> {
    pub appearance: Appearance,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub struct DocLayer {
    pub image_name: String,
    pub name: String,
    pub glass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fill_specializations: Vec<Specialization<Fill>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opacity_specializations: Vec<Specialization<f64>>,
}

impl DocLayer {
    /// Default opacity, 1.0 when unset.
    pub fn effective_opacity(&self) -> f64 {
        self.opacity.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Lighting {
    Combined,
    /// Each layer is lit on its own; used for bitmap-only groups.
    Individual,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct Shadow {
    pub kind: ShadowKind,
    pub opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct Translucency {
    pub enabled: bool,
    pub value: f64,
}

impl Translucency {
    /// Group opacity implied by the translucency, clamped to `0..=1`.
    pub fn group_opacity(&self) -> f64 {
        if self.enabled {
            (1.0 - self.value).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub struct DocGroup {
    pub layers: Vec<DocLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_material: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<Lighting>,
    pub shadow: Shadow,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub specular: bool,
    pub translucency: Translucency,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum SquareSupport {
    #[default]
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct SupportedPlatforms {
    pub squares: SquareSupport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub circles: Vec<String>,
}

impl SupportedPlatforms {
    fn for_catalog(catalog: &Catalog) -> Self {
        let circles = if catalog.header().targets_ios() {
            vec!["watchOS".to_string()]
        } else {
            Vec::new()
        };
        Self {
            squares: SquareSupport::Shared,
            circles,
        }
    }
}

/// The complete converted icon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub struct IconDocument {
    pub fill: Fill,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fill_specializations: Vec<Specialization<Fill>>,
    /// Back-to-front.
    pub groups: Vec<DocGroup>,
    pub supported_platforms: SupportedPlatforms,
}

impl IconDocument {
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

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================================
// Compiler
// ============================================================================

/// Assembles an [`IconDocument`] from a built model.
pub struct DocumentCompiler<'a> {
    catalog: &'a Catalog,
    paints: &'a PaintResolver,
    namer: &'a dyn AssetNamer,
    icon_name: Option<&'a str>,
}

impl<'a> DocumentCompiler<'a> {
    pub fn new(
        catalog: &'a Catalog,
        paints: &'a PaintResolver,
        namer: &'a dyn AssetNamer,
        icon_name: Option<&'a str>,
    ) -> Self {
        Self {
            catalog,
            paints,
            namer,
            icon_name,
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn compile(&self, model: &IconModel, diagnostics: &mut Diagnostics) -> IconDocument {
        let (fill, fill_specializations) = self.root_fill();

        let groups: Vec<DocGroup> = model
            .groups
            .iter()
            .rev()
            .filter_map(|group| self.group(group, diagnostics))
            .collect();
        tracing::debug!(groups = groups.len(), "compiled document");

        IconDocument {
            fill,
            fill_specializations,
            groups,
            supported_platforms: SupportedPlatforms::for_catalog(self.catalog),
        }
    }

    fn in_scope(&self, name: &str) -> bool {
        match self.icon_name {
            Some(icon) => name.strip_prefix(icon).is_some_and(|r| r.starts_with('/')),
            None => true,
        }
    }

    // ------------------------------------------------------------------------
    // Root fill
    // ------------------------------------------------------------------------

    fn root_fill(&self) -> (Fill, Vec<Specialization<Fill>>) {
        if let Some(found) = self.root_fill_from_stacks() {
            return found;
        }
        tracing::debug!("no stack background, falling back to unreferenced gradients");
        self.root_fill_from_gradients()
    }

    /// Background gradients named by the image stacks, one per appearance.
    fn root_fill_from_stacks(&self) -> Option<(Fill, Vec<Specialization<Fill>>)> {
        let mut backgrounds: Vec<(&str, &str)> = Vec::new();
        for stack in self.catalog.entries_of(AssetType::IconImageStack) {
            let tag = stack.appearance_tag();
            let first = stack
                .layers
                .iter()
                .find(|l| l.asset_type() != AssetType::IconGroup);
            let Some(name) = first.and_then(|l| l.name()) else { continue };
            if self.paints.is_gradient(name) && !backgrounds.iter().any(|(t, _)| *t == tag) {
                backgrounds.push((tag, name));
            }
        }

        let light = backgrounds
            .iter()
            .find(|(tag, _)| Appearance::is_light_tag(tag))
            .or_else(|| {
                backgrounds
                    .iter()
                    .find(|(tag, _)| Appearance::override_key(tag).is_none())
            })
            .map(|(_, name)| *name)?;
        let fill = Fill::from(self.paints.gradient(light)?);

        let mut specializations = Vec::new();
        let dark = backgrounds
            .iter()
            .find(|(tag, _)| Appearance::override_key(tag) == Some(Appearance::Dark))
            .map(|(_, name)| *name);
        if let Some(dark) = dark.filter(|d| *d != light) {
            if let Some(dark_fill) = self.paints.gradient(dark).map(Fill::from) {
                if dark_fill != fill {
                    specializations.push(Specialization {
                        appearance: Appearance::Tinted,
                        value: dark_fill,
                    });
                }
            }
        }
        Some((fill, specializations))
    }

    fn root_fill_from_gradients(&self) -> (Fill, Vec<Specialization<Fill>>) {
        let referenced: Vec<&str> = self
            .catalog
            .entries_of(AssetType::IconGroup)
            .flat_map(|g| g.layers.iter())
            .filter_map(|l| l.layer_gradient_color_name.as_deref())
            .collect();

        let mut fill = None;
        let mut specializations = Vec::new();
        let unreferenced = self
            .paints
            .gradient_names()
            .filter(|name| self.in_scope(name) && !referenced.contains(name));
        for name in unreferenced {
            let Some(gradient) = self.paints.gradient(name) else { continue };
            if self.paints.classify_gray(name) {
                specializations.push(Specialization {
                    appearance: Appearance::Tinted,
                    value: Fill::from(gradient),
                });
            } else if fill.is_none() {
                fill = Some(Fill::from(gradient));
            }
        }
        if let Some(fill) = fill {
            return (fill, specializations);
        }

        let first_named = self
            .paints
            .gradient_names()
            .filter(|name| self.in_scope(name))
            .find_map(|name| self.paints.gradient(name));
        if let Some(gradient) = first_named {
            return (Fill::from(gradient), specializations);
        }

        let color = self
            .paints
            .color_names()
            .find_map(|name| self.paints.color(name))
            .unwrap_or(FALLBACK_GRAY);
        (Fill::Automatic { color }, Vec::new())
    }

    // ------------------------------------------------------------------------
    // Groups and layers
    // ------------------------------------------------------------------------

    fn group(&self, group: &GroupRecord, diagnostics: &mut Diagnostics) -> Option<DocGroup> {
        let layers: Vec<DocLayer> = group
            .layers
            .iter()
            .filter_map(|layer| self.layer(layer, group.specular, diagnostics))
            .collect();
        if layers.is_empty() {
            tracing::debug!(group = %group.identity, "dropping group without layers");
            return None;
        }
        Some(DocGroup {
            layers,
            blur_material: group.blur_strength.map(|b| round_to(b, 5)),
            lighting: group.image_only.then_some(Lighting::Individual),
            shadow: Shadow {
                kind: group.shadow_kind,
                opacity: group.shadow_opacity,
            },
            specular: group.specular,
            translucency: Translucency {
                enabled: group.translucency_enabled,
                value: group.translucency_value,
            },
        })
    }

    fn layer(
        &self,
        layer: &LayerRecord,
        glass: bool,
        diagnostics: &mut Diagnostics,
    ) -> Option<DocLayer> {
        let Some(image_name) = self.namer.image_name(&layer.identity) else {
            diagnostics.push(
                DiagnosticKind::UnresolvedReference,
                &layer.identity,
                "no asset for layer, omitting it",
            );
            return None;
        };
        let values = &layer.values;

        let fill = values
            .default_fill
            .as_deref()
            .and_then(|r| self.layer_fill(r, &layer.identity, diagnostics));

        let mut fill_specializations = Vec::new();
        for (appearance, reference) in &values.fill_overrides {
            let Some(resolved) = self.layer_fill(reference, &layer.identity, diagnostics) else {
                continue;
            };
            if fill.as_ref() != Some(&resolved) {
                fill_specializations.push(Specialization {
                    appearance: *appearance,
                    value: resolved,
                });
            }
        }

        let opacity = ((values.default_opacity - 1.0).abs() > OPACITY_EPSILON)
            .then_some(values.default_opacity);
        let opacity_specializations = values
            .opacity_overrides
            .iter()
            .map(|(appearance, value)| Specialization {
                appearance: *appearance,
                value: *value,
            })
            .collect();

        Some(DocLayer {
            image_name,
            name: layer.display_name().to_string(),
            glass,
            fill,
            fill_specializations,
            opacity,
            opacity_specializations,
        })
    }

    fn layer_fill(
        &self,
        reference: &str,
        identity: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Fill> {
        let fill = self.paints.layer_fill(reference).map(Fill::from);
        if fill.is_none() {
            diagnostics.push(
                DiagnosticKind::UnresolvedReference,
                identity,
                format!("fill `{reference}` names no color or gradient"),
            );
        }
        fill
    }
}
