//! Vector scene synthesis.
//!
//! [`SceneCompiler`] paints an [`IconDocument`] as one self-contained SVG:
//! a `<style>` block declaring the color palette, a `<defs>` block holding
//! gradients, masks and filters, and a body painting the background and
//! then each group back-to-front.
//!
//! # Architecture
//!
//! Every compositing feature of a group is a [`GroupEffect`]: a pure node
//! transform that knows
//! - whether it applies to a group
//! - which definitions it needs
//! - how it wraps the nodes it is given
//!
//! The backdrop blur wraps everything painted before the group. Rim
//! lighting, drop shadow and sheen then wrap the group's own content, in
//! that order.

mod asset;
mod backdrop;
mod node;
mod palette;
mod shadow;
mod specular;

pub use asset::{
    AssetContent, AssetError, AssetRef, AssetResolver, InlineAsset, NoAssets, inline_asset,
};
pub use backdrop::BackdropBlur;
pub use node::{Element, Node};
pub use palette::ColorPalette;
pub use shadow::DropShadow;
pub use specular::{GlassSheen, RimLight};

use std::collections::HashMap;

use crate::appearance::OPACITY_EPSILON;
use crate::document::{DocGroup, Fill, IconDocument};
use crate::error::{DiagnosticKind, Diagnostics};
use crate::gradient::Orientation;
use crate::profile::EffectsProfile;
use node::{num, url};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const BACKGROUND_FILL_ID: &str = "bg-fill";

// ============================================================================
// Effect Trait
// ============================================================================

/// What an effect sees of the group being painted.
#[derive(Debug, Clone, Copy)]
pub struct EffectInput<'a> {
    /// Position of the group in document order; suffixes every id.
    pub index: usize,
    pub group: &'a DocGroup,
    /// The group's drawable assets with their effective opacities.
    pub silhouette: &'a [(AssetRef, f64)],
    pub canvas: u32,
}

impl<'a> EffectInput<'a> {
    pub fn new(
        index: usize,
        group: &'a DocGroup,
        silhouette: &'a [(AssetRef, f64)],
        canvas: u32,
    ) -> Self {
        Self {
            index,
            group,
            silhouette,
            canvas,
        }
    }
}

/// A compositing feature expressed as a transform over scene nodes.
pub trait GroupEffect {
    /// Returns true if the group asks for this effect.
    fn is_active(&self, group: &DocGroup) -> bool;

    /// Definitions referenced by [`wrap`](Self::wrap)'s output.
    fn defs(&self, input: &EffectInput<'_>) -> Vec<Node>;

    /// Wraps `content`, returning the nodes that replace it.
    fn wrap(&self, input: &EffectInput<'_>, content: Vec<Node>) -> Vec<Node>;
}

/// A mask painting `shapes` by their alpha.
pub fn alpha_mask(id: &str, shapes: impl IntoIterator<Item = Node>) -> Node {
    Element::new("mask")
        .attr("id", id)
        .attr("style", "mask-type: alpha")
        .children(shapes)
        .into()
}

fn opacity_attr(opacity: f64) -> Option<f64> {
    ((opacity - 1.0).abs() > OPACITY_EPSILON).then_some(opacity)
}

// ============================================================================
// Scene Context
// ============================================================================

/// Mutable state of one compile run.
struct SceneContext<'a> {
    assets: &'a dyn AssetResolver,
    canvas: u32,
    palette: ColorPalette,
    defs: Vec<Node>,
    /// Image name → defined asset, `None` once a failure was reported.
    cache: HashMap<String, Option<AssetRef>>,
    next_asset: usize,
}

impl<'a> SceneContext<'a> {
    fn new(assets: &'a dyn AssetResolver, canvas: u32) -> Self {
        Self {
            assets,
            canvas,
            palette: ColorPalette::new(),
            defs: Vec::new(),
            cache: HashMap::new(),
            next_asset: 0,
        }
    }

    /// Inlines an asset into the defs on first use, reporting each failing
    /// name once.
    fn asset(&mut self, image_name: &str, diagnostics: &mut Diagnostics) -> Option<AssetRef> {
        if let Some(cached) = self.cache.get(image_name) {
            return cached.clone();
        }
        let defined = match inline_asset(self.assets, image_name) {
            Ok(asset) => {
                let id = format!("asset-{}", self.next_asset);
                self.next_asset += 1;
                self.defs.push(asset.define(&id, self.canvas));
                Some(AssetRef::new(id))
            }
            Err(err) => {
                let kind = match err {
                    AssetError::Unresolved(_) => DiagnosticKind::UnresolvedReference,
                    _ => DiagnosticKind::UnsupportedAsset,
                };
                diagnostics.push(kind, image_name, format!("{err}, skipping layer"));
                None
            }
        };
        self.cache.insert(image_name.to_string(), defined.clone());
        defined
    }

    /// Defines a linear gradient for `fill` whose stops reference the
    /// palette.
    fn define_gradient(&mut self, id: &str, fill: &Fill) {
        let orientation = fill.orientation().unwrap_or(Orientation::VERTICAL);
        let stops = fill.stops();
        let last = stops.len().saturating_sub(1).max(1) as f64;
        let stops: Vec<Node> = stops
            .into_iter()
            .enumerate()
            .map(|(i, color)| {
                Element::new("stop")
                    .attr("offset", num(i as f64 / last))
                    .attr("stop-color", self.palette.register(color))
                    .into()
            })
            .collect();
        self.defs.push(
            Element::new("linearGradient")
                .attr("id", id)
                .attr("gradientUnits", "objectBoundingBox")
                .attr("x1", num(orientation.start.x))
                .attr("y1", num(orientation.start.y))
                .attr("x2", num(orientation.stop.x))
                .attr("y2", num(orientation.stop.y))
                .children(stops)
                .into(),
        );
    }

    fn canvas_rect(&self) -> Element {
        Element::new("rect")
            .attr("width", self.canvas)
            .attr("height", self.canvas)
    }
}

// ============================================================================
// SceneCompiler
// ============================================================================

/// Paints icon documents as SVG scenes.
///
/// # Example
///
/// ```
/// use icon_recomposer::{Diagnostics, IconDocument, NoAssets, SceneCompiler};
///
/// let doc = IconDocument::from_json(r#"{
///     "fill": { "automatic-gradient": "display-p3:0.20000,0.40000,0.80000,1.00000" },
///     "groups": [],
///     "supported-platforms": { "squares": "shared" }
/// }"#).unwrap();
///
/// let mut diagnostics = Diagnostics::new();
/// let svg = SceneCompiler::new(&NoAssets, 512).compile(&doc, &mut diagnostics);
/// assert!(svg.starts_with("<svg"));
/// assert!(svg.contains("viewBox=\"0 0 512 512\""));
/// ```
pub struct SceneCompiler<'a> {
    assets: &'a dyn AssetResolver,
    canvas: u32,
    effects: EffectsProfile,
}

impl<'a> SceneCompiler<'a> {
    /// Creates a compiler using the default effect constants.
    pub fn new(assets: &'a dyn AssetResolver, canvas: u32) -> Self {
        Self {
            assets,
            canvas,
            effects: EffectsProfile::default(),
        }
    }

    /// Replaces the effect constants. They are rescaled to the canvas.
    pub fn with_effects(mut self, effects: EffectsProfile) -> Self {
        self.effects = effects;
        self
    }

    /// Compiles the document to SVG markup.
    #[tracing::instrument(skip_all, fields(canvas = self.canvas))]
    pub fn compile(&self, document: &IconDocument, diagnostics: &mut Diagnostics) -> String {
        self.compile_tree(document, diagnostics).to_markup()
    }

    /// Compiles the document to an SVG element tree.
    pub fn compile_tree(&self, document: &IconDocument, diagnostics: &mut Diagnostics) -> Element {
        let effects = self.effects.scaled(self.canvas);
        let backdrop = BackdropBlur::new(effects.backdrop);
        let rim = RimLight::new(effects.specular, self.canvas);
        let shadow = DropShadow::new(effects.shadow);
        let sheen = GlassSheen::new(self.canvas);
        let content_effects: [&dyn GroupEffect; 3] = [&rim, &shadow, &sheen];

        let mut ctx = SceneContext::new(self.assets, self.canvas);
        ctx.define_gradient(BACKGROUND_FILL_ID, &document.fill);
        let mut body: Vec<Node> = vec![
            ctx.canvas_rect()
                .attr("fill", url(BACKGROUND_FILL_ID))
                .into(),
        ];

        let mut sheen_defined = false;
        for (index, group) in document.groups.iter().enumerate() {
            let (content, silhouette) = self.group_content(&mut ctx, index, group, diagnostics);
            if content.is_empty() {
                tracing::debug!(group = index, "no drawable layers, skipping group");
                continue;
            }
            let input = EffectInput::new(index, group, &silhouette, self.canvas);

            if backdrop.is_active(group) {
                ctx.defs.extend(backdrop.defs(&input));
                body = backdrop.wrap(&input, body);
            }

            let mut content = content;
            for effect in content_effects {
                if effect.is_active(group) {
                    ctx.defs.extend(effect.defs(&input));
                    content = effect.wrap(&input, content);
                }
            }
            if group.specular && !sheen_defined {
                ctx.defs.push(GlassSheen::gradient());
                sheen_defined = true;
            }

            let opacity = group.translucency.group_opacity();
            let container = Element::new("g")
                .attr_opt("opacity", (opacity < 1.0).then(|| format!("{opacity:.4}")))
                .children(content);
            body.push(container.into());
        }
        tracing::debug!(
            colors = ctx.palette.len(),
            defs = ctx.defs.len(),
            "compiled scene"
        );

        let size = self.canvas.to_string();
        let mut svg = Element::new("svg")
            .attr("xmlns", SVG_NS)
            .attr("viewBox", format!("0 0 {size} {size}"));
        if !ctx.palette.is_empty() {
            svg = svg.child(Element::new("style").child(Node::Text(ctx.palette.stylesheet())));
        }
        if !ctx.defs.is_empty() {
            svg = svg.child(Element::new("defs").children(ctx.defs));
        }
        svg.children(body)
    }

    /// Draws a group's layers in order, returning the nodes and the
    /// silhouette of the assets that could be drawn.
    fn group_content(
        &self,
        ctx: &mut SceneContext<'_>,
        index: usize,
        group: &DocGroup,
        diagnostics: &mut Diagnostics,
    ) -> (Vec<Node>, Vec<(AssetRef, f64)>) {
        let mut content = Vec::new();
        let mut silhouette = Vec::new();
        for (layer_index, layer) in group.layers.iter().enumerate() {
            let Some(asset) = ctx.asset(&layer.image_name, diagnostics) else {
                continue;
            };
            let opacity = layer.effective_opacity();
            let node: Node = match &layer.fill {
                Some(fill) => {
                    let fill_id = format!("fill-g{index}-l{layer_index}");
                    let mask_id = format!("mask-g{index}-l{layer_index}");
                    ctx.define_gradient(&fill_id, fill);
                    ctx.defs.push(alpha_mask(&mask_id, [asset.to_node(None)]));
                    ctx.canvas_rect()
                        .attr("fill", url(&fill_id))
                        .attr("mask", url(&mask_id))
                        .attr_opt("opacity", opacity_attr(opacity).map(num))
                        .into()
                }
                None => asset.to_node(opacity_attr(opacity)),
            };
            content.push(node);
            silhouette.push((asset, opacity));
        }
        (content, silhouette)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::color::Color;
    use crate::document::{DocLayer, Shadow, SupportedPlatforms, Translucency};
    use crate::model::ShadowKind;

    const GLYPH: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1024 1024"><circle cx="512" cy="512" r="300" fill="#fff"/></svg>"##;
    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1024 1024"><rect x="100" y="100" width="800" height="800"/></svg>"##;

    pub(crate) fn layer(image_name: &str) -> DocLayer {
        DocLayer {
            image_name: image_name.to_string(),
            name: image_name.trim_end_matches(".svg").to_string(),
            glass: true,
            fill: None,
            fill_specializations: Vec::new(),
            opacity: None,
            opacity_specializations: Vec::new(),
        }
    }

    pub(crate) fn group_with(specular: bool, kind: ShadowKind, opacity: f64) -> DocGroup {
        DocGroup {
            layers: vec![layer("glyph.svg")],
            blur_material: None,
            lighting: None,
            shadow: Shadow { kind, opacity },
            specular,
            translucency: Translucency {
                enabled: false,
                value: 0.0,
            },
        }
    }

    fn document(groups: Vec<DocGroup>) -> IconDocument {
        IconDocument {
            fill: Fill::LinearGradient {
                stops: vec![Color::p3(1.0, 0.0, 0.0, 1.0), Color::p3(0.0, 0.0, 1.0, 1.0)],
                orientation: None,
            },
            fill_specializations: Vec::new(),
            groups,
            supported_platforms: SupportedPlatforms::default(),
        }
    }

    fn assets() -> HashMap<String, AssetContent> {
        let mut map = HashMap::new();
        map.insert("glyph.svg".to_string(), AssetContent::Markup(GLYPH.to_string()));
        map.insert("square.svg".to_string(), AssetContent::Markup(SQUARE.to_string()));
        map
    }

    fn compile(doc: &IconDocument) -> (Element, Diagnostics) {
        let assets = assets();
        let mut diagnostics = Diagnostics::new();
        let tree = SceneCompiler::new(&assets, 1024).compile_tree(doc, &mut diagnostics);
        (tree, diagnostics)
    }

    /// Body nodes: everything after `<style>` and `<defs>`.
    fn body(tree: &Element) -> Vec<&Element> {
        tree.child_elements()
            .filter(|e| e.name != "style" && e.name != "defs")
            .collect()
    }

    fn defs(tree: &Element) -> &Element {
        tree.child_elements().find(|e| e.name == "defs").unwrap()
    }

    fn count_attr(tree: &Element, key: &str, value: &str) -> usize {
        tree.descendants()
            .iter()
            .filter(|e| e.get(key) == Some(value))
            .count()
    }

    #[test]
    fn background_is_painted_first() {
        let (tree, diagnostics) = compile(&document(vec![group_with(false, ShadowKind::None, 1.0)]));
        assert!(diagnostics.is_empty());
        assert_eq!(tree.get("viewBox"), Some("0 0 1024 1024"));

        let names: Vec<_> = tree.child_elements().map(|e| e.name).collect();
        assert_eq!(names[..2], ["style", "defs"]);

        let body = body(&tree);
        assert_eq!(body[0].name, "rect");
        assert_eq!(body[0].get("fill"), Some("url(#bg-fill)"));
        let bg = defs(&tree)
            .child_elements()
            .find(|e| e.get("id") == Some("bg-fill"))
            .unwrap();
        assert_eq!(bg.get("x1"), Some("0.5"));
        assert_eq!(bg.get("y2"), Some("1"));
        let stops: Vec<_> = bg.child_elements().map(|s| s.get("stop-color").unwrap()).collect();
        assert_eq!(stops, ["var(--c0)", "var(--c1)"]);
    }

    #[test]
    fn stylesheet_declares_each_color_once() {
        let mut doc = document(vec![group_with(false, ShadowKind::None, 1.0)]);
        doc.groups[0].layers[0].fill = Some(Fill::Automatic {
            color: Color::p3(1.0, 0.0, 0.0, 1.0),
        });
        let assets = assets();
        let svg = SceneCompiler::new(&assets, 1024).compile(&doc, &mut Diagnostics::new());
        assert_eq!(svg.matches("--c0:").count(), 2);
        assert_eq!(svg.matches("--c1:").count(), 2);
        assert!(!svg.contains("--c2:"));
        assert!(svg.contains("@media (color-gamut: p3)"));
    }

    #[test]
    fn specular_without_shadow_wraps_once() {
        let (tree, _) = compile(&document(vec![group_with(true, ShadowKind::None, 1.0)]));
        assert_eq!(count_attr(&tree, "filter", "url(#specular-g0)"), 1);
        assert!(
            tree.descendants()
                .iter()
                .all(|e| !e.get("filter").is_some_and(|f| f.contains("shadow")))
        );
        assert_eq!(defs(&tree).count("filter"), 1);
        assert_eq!(count_attr(&tree, "fill", "url(#glass-sheen)"), 1);
    }

    #[test]
    fn shadow_wraps_rim_lit_content() {
        let (tree, _) = compile(&document(vec![group_with(true, ShadowKind::Neutral, 0.5)]));
        let group = body(&tree)[1];
        let shadow = group.child_elements().next().unwrap();
        assert_eq!(shadow.get("filter"), Some("url(#shadow-g0)"));
        let rim = shadow.child_elements().next().unwrap();
        assert_eq!(rim.get("filter"), Some("url(#specular-g0)"));
        // Sheen sits beside the shadowed content.
        let sheen = group.child_elements().nth(1).unwrap();
        assert_eq!(sheen.get("mask"), Some("url(#glass-mask-g0)"));
    }

    #[test]
    fn translucency_sets_container_opacity() {
        let mut translucent = group_with(false, ShadowKind::None, 1.0);
        translucent.translucency = Translucency {
            enabled: true,
            value: 0.5,
        };
        let (tree, _) = compile(&document(vec![translucent]));
        assert_eq!(body(&tree)[1].get("opacity"), Some("0.5000"));

        let mut disabled = group_with(false, ShadowKind::None, 1.0);
        disabled.translucency = Translucency {
            enabled: false,
            value: 0.5,
        };
        let (tree, _) = compile(&document(vec![disabled]));
        assert_eq!(body(&tree)[1].get("opacity"), None);
    }

    #[test]
    fn groups_paint_in_document_order() {
        let mut background = group_with(false, ShadowKind::None, 1.0);
        background.layers = vec![layer("square.svg")];
        let foreground = group_with(false, ShadowKind::None, 1.0);
        let (tree, _) = compile(&document(vec![background, foreground]));

        let body = body(&tree);
        let hrefs: Vec<_> = body[1..]
            .iter()
            .map(|g| g.child_elements().next().unwrap().get("href").unwrap())
            .collect();
        assert_eq!(hrefs, ["#asset-0", "#asset-1"]);

        let defined: Vec<_> = defs(&tree)
            .child_elements()
            .filter(|e| e.get("id").is_some_and(|id| id.starts_with("asset-")))
            .map(|e| e.get("id").unwrap())
            .collect();
        assert_eq!(defined, ["asset-0", "asset-1"]);
        let markup = tree.to_markup();
        assert!(markup.find("<rect x=\"100\"").unwrap() < markup.find("<circle").unwrap());
    }

    #[test]
    fn asset_ids_stay_unique_across_masks_and_effects() {
        let mut map = assets();
        map.insert(
            "dot.svg".to_string(),
            AssetContent::Markup(
                r#"<svg xmlns="http://www.w3.org/2000/svg"><circle id="dot" r="4"/></svg>"#.into(),
            ),
        );
        let mut group = group_with(true, ShadowKind::Neutral, 1.0);
        group.layers = vec![layer("dot.svg"), layer("dot.svg")];
        group.layers[1].fill = Some(Fill::Automatic {
            color: Color::p3(1.0, 0.0, 0.0, 1.0),
        });
        group.blur_material = Some(0.5);
        let doc = document(vec![group]);

        let mut diagnostics = Diagnostics::new();
        let svg = SceneCompiler::new(&map, 1024).compile(&doc, &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(svg.matches("id=\"dot\"").count(), 1);
        assert_eq!(svg.matches("id=\"asset-0\"").count(), 1);
        // Content, fill mask, blur mask and sheen mask reference it.
        assert!(svg.matches("href=\"#asset-0\"").count() >= 4);
    }

    #[test]
    fn blur_wraps_everything_painted_before() {
        let back = group_with(false, ShadowKind::None, 1.0);
        let mut front = group_with(false, ShadowKind::None, 1.0);
        front.layers = vec![layer("square.svg")];
        front.blur_material = Some(0.5);
        let (tree, _) = compile(&document(vec![back, front]));

        let body = body(&tree);
        assert_eq!(body.len(), 3);
        assert_eq!(body[0].get("id"), Some("backdrop-g1"));
        // Background rect and the back group.
        assert_eq!(body[0].children.len(), 2);
        assert_eq!(body[1].name, "use");
        assert_eq!(body[1].get("filter"), Some("url(#blur-g1)"));
        assert_eq!(body[2].name, "g");

        let blur = defs(&tree)
            .descendants()
            .into_iter()
            .find(|e| e.name == "feGaussianBlur")
            .unwrap();
        assert_eq!(blur.get("stdDeviation"), Some("50"));
    }

    #[test]
    fn filled_layer_draws_masked_gradient_rect() {
        let mut group = group_with(false, ShadowKind::None, 1.0);
        group.layers[0].fill = Some(Fill::LinearGradient {
            stops: vec![Color::gray(1.0, 1.0), Color::gray(0.0, 1.0)],
            orientation: Some(Orientation::CENTER_TO_BOTTOM),
        });
        group.layers[0].opacity = Some(0.25);
        let (tree, _) = compile(&document(vec![group]));

        let rect = body(&tree)[1].child_elements().next().unwrap();
        assert_eq!(rect.name, "rect");
        assert_eq!(rect.get("fill"), Some("url(#fill-g0-l0)"));
        assert_eq!(rect.get("mask"), Some("url(#mask-g0-l0)"));
        assert_eq!(rect.get("opacity"), Some("0.25"));
        let gradient = defs(&tree)
            .child_elements()
            .find(|e| e.get("id") == Some("fill-g0-l0"))
            .unwrap();
        assert_eq!(gradient.get("y1"), Some("0.5"));
    }

    #[test]
    fn missing_assets_are_reported_once() {
        let mut group = group_with(false, ShadowKind::None, 1.0);
        group.layers = vec![layer("missing.svg"), layer("missing.svg"), layer("glyph.svg")];
        let (tree, diagnostics) = compile(&document(vec![group]));
        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnresolvedReference).count(), 1);
        assert_eq!(body(&tree)[1].children.len(), 1);

        let mut pdf = group_with(false, ShadowKind::None, 1.0);
        pdf.layers = vec![layer("glyph.pdf")];
        let (tree, diagnostics) = compile(&document(vec![pdf]));
        assert!(diagnostics.has(DiagnosticKind::UnsupportedAsset));
        // Nothing drawable, only the background remains.
        assert_eq!(body(&tree).len(), 1);
    }

    #[test]
    fn effects_scale_with_canvas() {
        let assets = assets();
        let doc = document(vec![group_with(true, ShadowKind::Neutral, 1.0)]);
        let tree = SceneCompiler::new(&assets, 512).compile_tree(&doc, &mut Diagnostics::new());
        let nodes = tree.descendants();
        let shadow_blur = nodes
            .iter()
            .find(|e| e.name == "feGaussianBlur" && e.get("result") == Some("blur"))
            .unwrap();
        assert_eq!(shadow_blur.get("stdDeviation"), Some("8"));
        let light = nodes.iter().find(|e| e.name == "fePointLight").unwrap();
        assert_eq!(light.get("x"), Some("256"));
        assert_eq!(light.get("z"), Some("250"));
    }

    #[test]
    fn compiling_twice_is_identical() {
        let mut blurred = group_with(true, ShadowKind::Chromatic, 0.7);
        blurred.blur_material = Some(0.2);
        let doc = document(vec![group_with(false, ShadowKind::Neutral, 1.0), blurred]);
        let assets = assets();
        let compiler = SceneCompiler::new(&assets, 1024);
        let first = compiler.compile(&doc, &mut Diagnostics::new());
        let second = compiler.compile(&doc, &mut Diagnostics::new());
        assert_eq!(first, second);
    }
}
