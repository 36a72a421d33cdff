//! Glass rim lighting, specular highlight and sheen.

use super::node::{Element, Node, num, url};
use super::{EffectInput, GroupEffect, alpha_mask};
use crate::document::DocGroup;
use crate::profile::SpecularSettings;

/// Id of the shared sheen gradient.
pub const SHEEN_GRADIENT_ID: &str = "glass-sheen";

// ============================================================================
// RimLight
// ============================================================================

/// Lights a bright inner rim along the group's edges and adds a soft
/// top-lit highlight, both over content dimmed slightly for contrast.
#[derive(Debug, Clone, Copy)]
pub struct RimLight {
    settings: SpecularSettings,
    canvas: u32,
}

impl RimLight {
    pub fn new(settings: SpecularSettings, canvas: u32) -> Self {
        Self { settings, canvas }
    }

    pub fn filter_id(index: usize) -> String {
        format!("specular-g{index}")
    }

    fn filter(&self, index: usize) -> Element {
        let s = &self.settings;
        let d = num(s.darken);
        let matrix = format!("{d} 0 0 0 0  0 {d} 0 0 0  0 0 {d} 0 0  0 0 0 1 0");
        let composite = |input: &str, input2: &str, operator: &str| {
            Element::new("feComposite")
                .attr("in", input)
                .attr("in2", input2)
                .attr("operator", operator)
        };

        Element::new("filter")
            .attr("id", Self::filter_id(index))
            .child(
                Element::new("feColorMatrix")
                    .attr("in", "SourceGraphic")
                    .attr("type", "matrix")
                    .attr("values", matrix)
                    .attr("result", "dimmed"),
            )
            // Rim: alpha minus its eroded, softened self.
            .child(
                Element::new("feMorphology")
                    .attr("in", "SourceAlpha")
                    .attr("operator", "erode")
                    .attr("radius", num(s.rim_erode))
                    .attr("result", "shrunk"),
            )
            .child(
                Element::new("feGaussianBlur")
                    .attr("in", "shrunk")
                    .attr("stdDeviation", num(s.rim_blur))
                    .attr("result", "shrunkBlur"),
            )
            .child(
                composite("SourceAlpha", "shrunkBlur", "arithmetic")
                    .attr("k1", 0)
                    .attr("k2", 1)
                    .attr("k3", -1)
                    .attr("k4", 0)
                    .attr("result", "rimAlpha"),
            )
            .child(
                Element::new("feFlood")
                    .attr("flood-color", "white")
                    .attr("result", "white"),
            )
            .child(composite("white", "rimAlpha", "in").attr("result", "rimLit"))
            // Highlight from a blurred alpha bump map.
            .child(
                Element::new("feGaussianBlur")
                    .attr("in", "SourceAlpha")
                    .attr("stdDeviation", num(s.bump_blur))
                    .attr("result", "bump"),
            )
            .child(
                Element::new("feSpecularLighting")
                    .attr("surfaceScale", num(s.surface_scale))
                    .attr("specularConstant", num(s.specular_constant))
                    .attr("specularExponent", num(s.specular_exponent))
                    .attr("lighting-color", "white")
                    .attr("in", "bump")
                    .attr("result", "spec")
                    .child(
                        Element::new("fePointLight")
                            .attr("x", num(f64::from(self.canvas) / 2.0))
                            .attr("y", 0)
                            .attr("z", num(s.light_z)),
                    ),
            )
            .child(composite("spec", "SourceAlpha", "in").attr("result", "specClipped"))
            .child(composite("rimLit", "dimmed", "over").attr("result", "withRim"))
            .child(composite("specClipped", "withRim", "over"))
    }
}

impl GroupEffect for RimLight {
    fn is_active(&self, group: &DocGroup) -> bool {
        group.specular
    }

    fn defs(&self, input: &EffectInput<'_>) -> Vec<Node> {
        vec![self.filter(input.index).into()]
    }

    fn wrap(&self, input: &EffectInput<'_>, content: Vec<Node>) -> Vec<Node> {
        vec![
            Element::new("g")
                .attr("filter", url(&Self::filter_id(input.index)))
                .children(content)
                .into(),
        ]
    }
}

// ============================================================================
// GlassSheen
// ============================================================================

/// Vertical light-to-dark sheen over the group's silhouette.
#[derive(Debug, Clone, Copy)]
pub struct GlassSheen {
    canvas: u32,
}

impl GlassSheen {
    pub fn new(canvas: u32) -> Self {
        Self { canvas }
    }

    pub fn mask_id(index: usize) -> String {
        format!("glass-mask-g{index}")
    }

    /// The shared sheen gradient, emitted once per scene.
    pub fn gradient() -> Node {
        let stop = |offset: &str, color: &str, opacity: &str| {
            Element::new("stop")
                .attr("offset", offset)
                .attr("stop-color", color)
                .attr("stop-opacity", opacity)
        };
        Element::new("linearGradient")
            .attr("id", SHEEN_GRADIENT_ID)
            .attr("gradientUnits", "objectBoundingBox")
            .attr("x1", 0.5)
            .attr("y1", 0)
            .attr("x2", 0.5)
            .attr("y2", 1)
            .child(stop("0", "white", "0.12"))
            .child(stop("0.4", "white", "0"))
            .child(stop("0.6", "black", "0"))
            .child(stop("1", "black", "0.08"))
            .into()
    }
}

impl GroupEffect for GlassSheen {
    fn is_active(&self, group: &DocGroup) -> bool {
        group.specular
    }

    fn defs(&self, input: &EffectInput<'_>) -> Vec<Node> {
        let shapes = input
            .silhouette
            .iter()
            .map(|(asset, _)| asset.to_node(None));
        vec![alpha_mask(&Self::mask_id(input.index), shapes)]
    }

    /// Appends the sheen after the content.
    fn wrap(&self, input: &EffectInput<'_>, mut content: Vec<Node>) -> Vec<Node> {
        content.push(
            Element::new("rect")
                .attr("width", self.canvas)
                .attr("height", self.canvas)
                .attr("fill", url(SHEEN_GRADIENT_ID))
                .attr("mask", url(&Self::mask_id(input.index)))
                .into(),
        );
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShadowKind;
    use crate::profile::SpecularSettings;
    use crate::scene::asset::AssetRef;
    use crate::scene::tests::group_with;

    #[test]
    fn rim_filter_composes_rim_then_highlight() {
        let group = group_with(true, ShadowKind::None, 1.0);
        let input = EffectInput::new(0, &group, &[], 1024);
        let rim = RimLight::new(SpecularSettings::default(), 1024);
        assert!(rim.is_active(&group));

        let defs = rim.defs(&input);
        let filter = defs[0].as_element().unwrap();
        assert_eq!(filter.get("id"), Some("specular-g0"));
        assert_eq!(filter.count("feComposite"), 5);
        assert_eq!(filter.count("feSpecularLighting"), 1);

        let nodes = filter.descendants();
        let matrix = nodes.iter().find(|e| e.name == "feColorMatrix").unwrap();
        assert_eq!(
            matrix.get("values"),
            Some("0.9 0 0 0 0  0 0.9 0 0 0  0 0 0.9 0 0  0 0 0 1 0")
        );
        let light = nodes.iter().find(|e| e.name == "fePointLight").unwrap();
        assert_eq!(light.get("x"), Some("512"));
        assert_eq!(light.get("z"), Some("500"));
        let last = filter.child_elements().last().unwrap();
        assert_eq!(last.get("in"), Some("specClipped"));
        assert_eq!(last.get("in2"), Some("withRim"));
    }

    #[test]
    fn rim_wrap_nests_content_once() {
        let group = group_with(true, ShadowKind::None, 1.0);
        let input = EffectInput::new(3, &group, &[], 1024);
        let content: Vec<Node> = vec![Element::new("rect").into()];
        let wrapped = RimLight::new(SpecularSettings::default(), 1024).wrap(&input, content);
        assert_eq!(wrapped.len(), 1);
        let g = wrapped[0].as_element().unwrap();
        assert_eq!(g.get("filter"), Some("url(#specular-g3)"));
        assert_eq!(g.count("rect"), 1);
    }

    #[test]
    fn sheen_masks_silhouette_and_appends_rect() {
        let group = group_with(true, ShadowKind::None, 1.0);
        let silhouette = [
            (AssetRef::new("asset-0"), 1.0),
            (AssetRef::new("asset-1"), 0.5),
        ];
        let input = EffectInput::new(1, &group, &silhouette, 256);
        let sheen = GlassSheen::new(256);

        let defs = sheen.defs(&input);
        let mask = defs[0].as_element().unwrap();
        assert_eq!(mask.get("id"), Some("glass-mask-g1"));
        assert_eq!(mask.children.len(), 2);
        // The sheen mask ignores layer opacity.
        assert!(mask.descendants().iter().all(|e| e.get("opacity").is_none()));

        let content: Vec<Node> = vec![Element::new("g").into()];
        let out = sheen.wrap(&input, content);
        assert_eq!(out.len(), 2);
        let rect = out[1].as_element().unwrap();
        assert_eq!(rect.get("fill"), Some("url(#glass-sheen)"));
        assert_eq!(rect.get("width"), Some("256"));

        let gradient = GlassSheen::gradient();
        assert_eq!(gradient.as_element().unwrap().count("stop"), 4);
    }
}
