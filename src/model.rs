//! Group/layer hierarchy construction.
//!
//! The builder walks a [`Catalog`], merges per-appearance records through
//! [`crate::appearance`], and produces the ordered list of [`GroupRecord`]s
//! with their compositing metadata. Groups are kept in catalog declaration
//! order (front-most first).
//!
//! # Fallback ladder
//!
//! When no image stack yields a group:
//!
//! 1. all top-level vector/image records become one flat group;
//! 2. otherwise the highest-resolution pre-rendered image becomes a single
//!    image-only group and the model is flagged as a legacy conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::appearance::{GroupOpacity, LayerVariant, MergedLayer, canonical_index};
use crate::catalog::{AssetType, Catalog, CatalogEntry};
use crate::error::{DiagnosticKind, Diagnostics};

/// Name of the synthetic group used by the fallback ladder.
pub const FALLBACK_GROUP: &str = "default";

// ============================================================================
// Shadow styles
// ============================================================================

/// How a group casts its drop shadow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum ShadowKind {
    #[serde(rename = "none")]
    None,
    /// Achromatic shadow derived from the content's alpha.
    #[serde(rename = "neutral")]
    Neutral,
    /// Shadow tinted by the content's own colors.
    #[serde(rename = "layer-color")]
    Chromatic,
}

/// One entry of the shadow-style code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapping {
    pub kind: ShadowKind,
    /// False for mappings inferred from editor UI ordering rather than
    /// checked against rendered output.
    pub confirmed: bool,
}

/// Looks up a catalog `LayerShadowStyle` code.
pub fn shadow_mapping(code: i64) -> Option<ShadowMapping> {
    let (kind, confirmed) = match code {
        0 => (ShadowKind::None, false),
        1 => (ShadowKind::Neutral, false),
        2 => (ShadowKind::Chromatic, true),
        3 => (ShadowKind::Neutral, true),
        _ => return None,
    };
    Some(ShadowMapping { kind, confirmed })
}

// ============================================================================
// Records
// ============================================================================

/// A point or size in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPair {
    pub x: f64,
    pub y: f64,
}

impl CanvasPair {
    /// Reads `"x,y"` strings, `[x, y]` arrays and `{ "x": .., "y": .. }`
    /// objects.
    fn from_value(value: &Value) -> Option<Self> {
        let (x, y) = match value {
            Value::String(s) => {
                let (x, y) = s.split_once(',')?;
                (x.trim().parse().ok()?, y.trim().parse().ok()?)
            }
            Value::Array(items) => (items.first()?.as_f64()?, items.get(1)?.as_f64()?),
            Value::Object(map) => (map.get("x")?.as_f64()?, map.get("y")?.as_f64()?),
            _ => return None,
        };
        Some(Self { x, y })
    }
}

/// One merged layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    /// Hierarchical catalog name, e.g. `AppIcon/1_person`.
    pub identity: String,
    pub kind: AssetType,
    pub values: MergedLayer,
    pub position: Option<CanvasPair>,
    pub size: Option<CanvasPair>,
}

impl LayerRecord {
    /// Last path segment of the identity.
    pub fn display_name(&self) -> &str {
        self.identity.rsplit('/').next().unwrap_or(&self.identity)
    }

    /// Same identity, fills and opacities in every appearance.
    fn same_content(&self, other: &Self) -> bool {
        self.identity == other.identity && self.values == other.values
    }
}

/// One compositing group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    pub identity: String,
    pub layers: Vec<LayerRecord>,
    pub specular: bool,
    pub shadow_kind: ShadowKind,
    pub shadow_opacity: f64,
    pub translucency_enabled: bool,
    pub translucency_value: f64,
    /// Backdrop blur strength; only present when positive.
    pub blur_strength: Option<f64>,
    /// Set when the group holds no vector layers. Image-only groups never
    /// get glass, specular or translucency.
    pub image_only: bool,
}

impl GroupRecord {
    /// A group with the defaults used when no stack metadata exists.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            layers: Vec::new(),
            specular: true,
            shadow_kind: ShadowKind::Neutral,
            shadow_opacity: 1.0,
            translucency_enabled: true,
            translucency_value: 0.5,
            blur_strength: None,
            image_only: false,
        }
    }

    fn mark_image_only(&mut self) {
        self.image_only = true;
        self.specular = false;
        self.translucency_enabled = false;
    }

    /// Reads compositing properties from the group's stack entry.
    fn apply_stack_properties(&mut self, entry: &CatalogEntry, diagnostics: &mut Diagnostics) {
        self.specular = entry.layer_has_specular.unwrap_or(false)
            || entry.layer_gathers_specular_by_element.unwrap_or(false);

        match entry.layer_shadow_style {
            Some(code) => {
                let mapping = shadow_mapping(code);
                match mapping {
                    None => diagnostics.push(
                        DiagnosticKind::UnconfirmedMapping,
                        &self.identity,
                        format!("unknown shadow style {code}, using neutral"),
                    ),
                    Some(m) if !m.confirmed => diagnostics.push(
                        DiagnosticKind::UnconfirmedMapping,
                        &self.identity,
                        format!("unconfirmed shadow style {code} mapped to {:?}", m.kind),
                    ),
                    Some(_) => {}
                }
                self.shadow_kind = mapping.map_or(ShadowKind::Neutral, |m| m.kind);
                self.shadow_opacity = entry.layer_shadow_opacity.unwrap_or(1.0);
            }
            None => {
                self.shadow_kind = ShadowKind::Neutral;
                self.shadow_opacity = 1.0;
            }
        }

        self.translucency_value = entry.layer_translucency.unwrap_or(0.5);
        self.translucency_enabled = self.translucency_value > 0.0;
        self.blur_strength = entry.layer_blur_strength.filter(|b| *b > 0.0);

        if self.image_only {
            self.specular = false;
            self.translucency_enabled = false;
        }
    }
}

/// The catalog's group hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct IconModel {
    /// Groups in catalog order, front-most first.
    pub groups: Vec<GroupRecord>,
    /// Canvas width and height.
    pub canvas: (u32, u32),
    /// Set when only a pre-rendered composite was available.
    pub legacy: bool,
}

// ============================================================================
// Builder
// ============================================================================

/// Per-appearance layer lists of one `IconGroup`.
#[derive(Default)]
struct GroupSources<'a> {
    /// `(appearance tag, layers)`, one entry per distinct tag.
    appearances: Vec<(&'a str, Vec<&'a CatalogEntry>)>,
    has_vector: bool,
}

/// Builds the group hierarchy for a catalog.
#[tracing::instrument(skip_all)]
pub fn build_model(catalog: &Catalog, diagnostics: &mut Diagnostics) -> IconModel {
    let sources = collect_group_sources(catalog);
    let geometry = collect_geometry(catalog);

    // Stack entries referencing each group, per stack appearance.
    let mut stack_order: Vec<&str> = Vec::new();
    let mut stack_entries: HashMap<&str, Vec<(&str, &CatalogEntry)>> = HashMap::new();
    for stack in catalog.entries_of(AssetType::IconImageStack) {
        let tag = stack.appearance_tag();
        for entry in stack.layers_of(AssetType::IconGroup) {
            let Some(name) = entry.name() else { continue };
            if !stack_entries.contains_key(name) {
                stack_order.push(name);
            }
            stack_entries.entry(name).or_default().push((tag, entry));
        }
    }

    let mut groups = Vec::with_capacity(stack_order.len());
    for name in stack_order {
        let mut group = GroupRecord::new(name);
        let source = sources.get(name);
        group.layers = source
            .map(|s| merge_layers(s, &geometry))
            .unwrap_or_default();
        group.image_only = source.is_some_and(|s| !s.has_vector);

        let entries = &stack_entries[name];
        if let Some(canonical) = canonical_index(entries.iter().map(|(tag, _)| *tag)) {
            group.apply_stack_properties(entries[canonical].1, diagnostics);
        }

        let opacities: Vec<(&str, f64)> = entries
            .iter()
            .map(|(tag, e)| (*tag, e.layer_opacity.unwrap_or(1.0)))
            .collect();
        let group_opacity = GroupOpacity::merge(&opacities);
        group.layers = group
            .layers
            .into_iter()
            .map(|layer| LayerRecord {
                values: layer.values.with_group_opacity(&group_opacity),
                ..layer
            })
            .collect();

        tracing::debug!(group = name, layers = group.layers.len(), "built group");
        groups.push(group);
    }

    let mut legacy = false;
    if groups.is_empty() {
        (groups, legacy) = fallback_groups(catalog, &geometry, diagnostics);
    }

    IconModel {
        groups,
        canvas: catalog.canvas_size(),
        legacy,
    }
}

fn collect_group_sources(catalog: &Catalog) -> HashMap<&str, GroupSources<'_>> {
    let mut sources: HashMap<&str, GroupSources<'_>> = HashMap::new();
    for group in catalog.entries_of(AssetType::IconGroup) {
        let Some(name) = group.name() else { continue };
        let layers: Vec<&CatalogEntry> = group
            .layers
            .iter()
            .filter(|l| l.asset_type().is_composable() && l.name().is_some())
            .collect();
        if layers.is_empty() {
            continue;
        }
        let source = sources.entry(name).or_default();
        source.has_vector |= layers.iter().any(|l| l.asset_type() == AssetType::Vector);
        let tag = group.appearance_tag();
        match source.appearances.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = layers,
            None => source.appearances.push((tag, layers)),
        }
    }
    sources
}

type Geometry = HashMap<String, (Option<CanvasPair>, Option<CanvasPair>)>;

/// First declared position and size per layer identity.
fn collect_geometry(catalog: &Catalog) -> Geometry {
    let mut geometry = Geometry::new();
    let nested = catalog
        .entries_of(AssetType::IconGroup)
        .flat_map(|g| g.layers.iter());
    for layer in nested.chain(catalog.entries().iter()) {
        if !layer.asset_type().is_composable() {
            continue;
        }
        let Some(name) = layer.name() else { continue };
        geometry.entry(name.to_string()).or_insert_with(|| {
            (
                layer.layer_position.as_ref().and_then(CanvasPair::from_value),
                layer.layer_size.as_ref().and_then(CanvasPair::from_value),
            )
        });
    }
    geometry
}

/// Merges the per-appearance layer lists of a group index by index, then
/// drops consecutive duplicates (catalogs repeat a layer once per
/// pixel-density variant).
fn merge_layers(source: &GroupSources<'_>, geometry: &Geometry) -> Vec<LayerRecord> {
    let Some(canonical) = canonical_index(source.appearances.iter().map(|(tag, _)| *tag)) else {
        return Vec::new();
    };
    let base = &source.appearances[canonical].1;

    let mut records: Vec<LayerRecord> = Vec::with_capacity(base.len());
    for (i, entry) in base.iter().enumerate() {
        let variants: Vec<(&str, LayerVariant<'_>)> = source
            .appearances
            .iter()
            .filter_map(|(tag, layers)| {
                let layer = layers.get(i)?;
                Some((
                    *tag,
                    LayerVariant {
                        fill: layer.layer_gradient_color_name.as_deref(),
                        opacity: layer.layer_opacity.unwrap_or(1.0),
                    },
                ))
            })
            .collect();
        let Some(values) = MergedLayer::merge(&variants) else { continue };
        let Some(identity) = entry.name() else { continue };
        let (position, size) = geometry.get(identity).copied().unwrap_or_default();
        let record = LayerRecord {
            identity: identity.to_string(),
            kind: entry.asset_type(),
            values,
            position,
            size,
        };
        if records.last().is_some_and(|prev| prev.same_content(&record)) {
            continue;
        }
        records.push(record);
    }
    records
}

fn plain_layer(identity: &str, kind: AssetType, geometry: &Geometry) -> LayerRecord {
    let (position, size) = geometry.get(identity).copied().unwrap_or_default();
    LayerRecord {
        identity: identity.to_string(),
        kind,
        values: MergedLayer::plain(),
        position,
        size,
    }
}

fn fallback_groups(
    catalog: &Catalog,
    geometry: &Geometry,
    diagnostics: &mut Diagnostics,
) -> (Vec<GroupRecord>, bool) {
    let composable: Vec<&CatalogEntry> = catalog
        .entries()
        .iter()
        .filter(|e| e.asset_type().is_composable() && e.name().is_some())
        .collect();

    if !composable.is_empty() {
        let mut group = GroupRecord::new(FALLBACK_GROUP);
        for entry in &composable {
            if let Some(name) = entry.name() {
                group.layers.push(plain_layer(name, entry.asset_type(), geometry));
            }
        }
        if composable.iter().all(|e| e.asset_type() == AssetType::Image) {
            group.mark_image_only();
        }
        tracing::debug!(layers = group.layers.len(), "no image stack, using flat group");
        return (vec![group], false);
    }

    let icon_name = catalog.icon_name().unwrap_or(FALLBACK_GROUP).to_string();
    let best = catalog
        .entries_of(AssetType::IconImage)
        .filter(|e| e.pixel_area() > 0)
        .fold(None::<&CatalogEntry>, |best, e| match best {
            Some(b) if b.pixel_area() >= e.pixel_area() => Some(b),
            _ => Some(e),
        });

    let Some(best) = best else {
        diagnostics.push(
            DiagnosticKind::UnresolvedReference,
            icon_name,
            "catalog has no image stack, no layers and no pre-rendered image",
        );
        return (Vec::new(), false);
    };

    let identity = best.name().unwrap_or(&icon_name).to_string();
    diagnostics.push(
        DiagnosticKind::DegradedConversion,
        &identity,
        format!(
            "legacy bitmap icon, using {} ({}x{}) as single-layer fallback",
            best.rendition_name.as_deref().unwrap_or("unnamed rendition"),
            best.pixel_width.unwrap_or(0),
            best.pixel_height.unwrap_or(0),
        ),
    );
    let mut group = GroupRecord::new(FALLBACK_GROUP);
    group.mark_image_only();
    group.layers.push(plain_layer(&identity, AssetType::IconImage, geometry));
    (vec![group], true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::Appearance;

    fn build(json: &str) -> (IconModel, Diagnostics) {
        let catalog = Catalog::from_json(json).unwrap();
        let mut diags = Diagnostics::new();
        let model = build_model(&catalog, &mut diags);
        (model, diags)
    }

    #[test]
    fn shadow_table_distinguishes_confirmed_codes() {
        assert_eq!(
            shadow_mapping(2),
            Some(ShadowMapping { kind: ShadowKind::Chromatic, confirmed: true })
        );
        assert!(shadow_mapping(3).unwrap().confirmed);
        assert!(!shadow_mapping(0).unwrap().confirmed);
        assert!(!shadow_mapping(1).unwrap().confirmed);
        assert_eq!(shadow_mapping(9), None);
    }

    #[test]
    fn groups_follow_stack_order_with_properties() {
        let (model, diags) = build(
            r#"[
                {},
                {"AssetType": "IconGroup", "Name": "Front", "Layers": [
                    {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerGradientColorName": "white"}
                ]},
                {"AssetType": "IconGroup", "Name": "Back", "Layers": [
                    {"AssetType": "Image", "Name": "AppIcon/photo"}
                ]},
                {"AssetType": "IconImageStack", "Name": "AppIcon", "CanvasWidth": 1024, "CanvasHeight": 1024, "Layers": [
                    {"AssetType": "IconGroup", "Name": "Front", "LayerHasSpecular": true,
                     "LayerShadowStyle": 2, "LayerShadowOpacity": 0.6, "LayerTranslucency": 0.2,
                     "LayerBlurStrength": 0.3},
                    {"AssetType": "IconGroup", "Name": "Back", "LayerHasSpecular": true, "LayerShadowStyle": 3}
                ]}
            ]"#,
        );
        assert!(diags.is_empty());
        assert!(!model.legacy);

        let names: Vec<_> = model.groups.iter().map(|g| g.identity.as_str()).collect();
        assert_eq!(names, ["Front", "Back"]);

        let front = &model.groups[0];
        assert!(front.specular);
        assert_eq!(front.shadow_kind, ShadowKind::Chromatic);
        assert_eq!(front.shadow_opacity, 0.6);
        assert!(front.translucency_enabled);
        assert_eq!(front.translucency_value, 0.2);
        assert_eq!(front.blur_strength, Some(0.3));
        assert_eq!(front.layers[0].display_name(), "glyph");
        assert_eq!(front.layers[0].values.default_fill.as_deref(), Some("white"));

        let back = &model.groups[1];
        assert!(back.image_only);
        assert!(!back.specular);
        assert!(!back.translucency_enabled);
    }

    #[test]
    fn missing_shadow_metadata_defaults_to_neutral() {
        let (model, _) = build(
            r#"[{}, {"AssetType": "IconImageStack", "Layers": [{"AssetType": "IconGroup", "Name": "G"}]}]"#,
        );
        let g = &model.groups[0];
        assert_eq!(g.shadow_kind, ShadowKind::Neutral);
        assert_eq!(g.shadow_opacity, 1.0);
        assert_eq!(g.translucency_value, 0.5);
        assert!(g.translucency_enabled);
    }

    #[test]
    fn zero_translucency_disables_it() {
        let (model, _) = build(
            r#"[{}, {"AssetType": "IconImageStack", "Layers": [
                {"AssetType": "IconGroup", "Name": "G", "LayerTranslucency": 0}
            ]}]"#,
        );
        assert!(!model.groups[0].translucency_enabled);
    }

    #[test]
    fn assumed_and_unknown_shadow_codes_raise_diagnostics() {
        let (model, diags) = build(
            r#"[{}, {"AssetType": "IconImageStack", "Layers": [
                {"AssetType": "IconGroup", "Name": "A", "LayerShadowStyle": 0},
                {"AssetType": "IconGroup", "Name": "B", "LayerShadowStyle": 7}
            ]}]"#,
        );
        assert_eq!(model.groups[0].shadow_kind, ShadowKind::None);
        assert_eq!(model.groups[1].shadow_kind, ShadowKind::Neutral);
        let subjects: Vec<_> = diags
            .of_kind(DiagnosticKind::UnconfirmedMapping)
            .map(|d| d.subject.as_str())
            .collect();
        assert_eq!(subjects, ["A", "B"]);
    }

    #[test]
    fn appearance_variants_merge_into_one_layer() {
        let (model, _) = build(
            r#"[
                {},
                {"AssetType": "IconGroup", "Name": "G", "Appearance": "UIAppearanceDark", "Layers": [
                    {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerGradientColorName": "black", "LayerOpacity": 0.5}
                ]},
                {"AssetType": "IconGroup", "Name": "G", "Layers": [
                    {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerGradientColorName": "white"}
                ]},
                {"AssetType": "IconImageStack", "Layers": [{"AssetType": "IconGroup", "Name": "G"}]}
            ]"#,
        );
        let layer = &model.groups[0].layers[0];
        assert_eq!(layer.values.default_fill.as_deref(), Some("white"));
        assert_eq!(layer.values.fill_for(Appearance::Dark), Some("black"));
        assert_eq!(layer.values.opacity_for(Appearance::Dark), 0.5);
    }

    #[test]
    fn consecutive_duplicate_layers_are_dropped() {
        let (model, _) = build(
            r#"[
                {},
                {"AssetType": "IconGroup", "Name": "G", "Layers": [
                    {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerOpacity": 0.5, "LayerPosition": "12,34"},
                    {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerOpacity": 0.5},
                    {"AssetType": "Vector", "Name": "AppIcon/other"},
                    {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerOpacity": 0.5}
                ]},
                {"AssetType": "IconImageStack", "Layers": [{"AssetType": "IconGroup", "Name": "G"}]}
            ]"#,
        );
        let layers: Vec<_> = model.groups[0]
            .layers
            .iter()
            .map(LayerRecord::display_name)
            .collect();
        assert_eq!(layers, ["glyph", "other", "glyph"]);
        assert_eq!(
            model.groups[0].layers[0].position,
            Some(CanvasPair { x: 12.0, y: 34.0 })
        );
    }

    #[test]
    fn group_opacity_from_stacks_cascades_into_layers() {
        let (model, _) = build(
            r#"[
                {},
                {"AssetType": "IconGroup", "Name": "G", "Layers": [
                    {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerOpacity": 0.8}
                ]},
                {"AssetType": "IconImageStack", "Layers": [{"AssetType": "IconGroup", "Name": "G", "LayerOpacity": 0.5}]},
                {"AssetType": "IconImageStack", "Appearance": "UIAppearanceDark", "Layers": [{"AssetType": "IconGroup", "Name": "G"}]}
            ]"#,
        );
        let values = &model.groups[0].layers[0].values;
        assert!((values.default_opacity - 0.4).abs() < 1e-9);
        assert!((values.opacity_for(Appearance::Dark) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn flat_group_when_no_stack_exists() {
        let (model, diags) = build(
            r#"[{}, {"AssetType": "Vector", "Name": "AppIcon/a"}, {"AssetType": "Image", "Name": "AppIcon/b"}]"#,
        );
        assert!(!model.legacy);
        assert!(diags.is_empty());
        assert_eq!(model.groups.len(), 1);
        assert_eq!(model.groups[0].identity, FALLBACK_GROUP);
        assert_eq!(model.groups[0].layers.len(), 2);
        assert!(!model.groups[0].image_only);
    }

    #[test]
    fn legacy_fallback_picks_largest_prerendered_image() {
        let (model, diags) = build(
            r#"[
                {},
                {"AssetType": "Icon Image", "Name": "Legacy", "RenditionName": "icon_16.png", "PixelWidth": 16, "PixelHeight": 16},
                {"AssetType": "Icon Image", "Name": "Legacy", "RenditionName": "icon_512.png", "PixelWidth": 512, "PixelHeight": 512},
                {"AssetType": "Icon Image", "Name": "Legacy", "RenditionName": "icon_128.png", "PixelWidth": 128, "PixelHeight": 128}
            ]"#,
        );
        assert!(model.legacy);
        let group = &model.groups[0];
        assert!(group.image_only);
        assert!(!group.specular);
        assert_eq!(group.layers[0].identity, "Legacy");
        let notice = diags.of_kind(DiagnosticKind::DegradedConversion).next().unwrap();
        assert!(notice.message.contains("icon_512.png"));
    }

    #[test]
    fn empty_catalog_reports_missing_content() {
        let (model, diags) = build("[{}]");
        assert!(model.groups.is_empty());
        assert!(diags.has(DiagnosticKind::UnresolvedReference));
    }
}
