//! Drop shadow effect.

use super::node::{Element, Node, num, url};
use super::{EffectInput, GroupEffect};
use crate::document::DocGroup;
use crate::model::ShadowKind;
use crate::profile::ShadowSettings;

/// Blurs the group's alpha (neutral) or colors (chromatic), offsets it
/// downward and merges it under the content.
#[derive(Debug, Clone, Copy)]
pub struct DropShadow {
    settings: ShadowSettings,
}

impl DropShadow {
    pub fn new(settings: ShadowSettings) -> Self {
        Self { settings }
    }

    pub fn filter_id(index: usize) -> String {
        format!("shadow-g{index}")
    }

    fn filter(&self, index: usize, kind: ShadowKind, opacity: f64) -> Element {
        let source = match kind {
            ShadowKind::Chromatic => "SourceGraphic",
            _ => "SourceAlpha",
        };
        Element::new("filter")
            .attr("id", Self::filter_id(index))
            .attr("x", "-30%")
            .attr("y", "-30%")
            .attr("width", "160%")
            .attr("height", "160%")
            .child(
                Element::new("feGaussianBlur")
                    .attr("in", source)
                    .attr("stdDeviation", num(self.settings.blur))
                    .attr("result", "blur"),
            )
            .child(
                Element::new("feOffset")
                    .attr("in", "blur")
                    .attr("dy", num(self.settings.offset))
                    .attr("result", "offset"),
            )
            .child(
                Element::new("feComponentTransfer")
                    .attr("in", "offset")
                    .attr("result", "shadow")
                    .child(
                        Element::new("feFuncA")
                            .attr("type", "linear")
                            .attr("slope", num(opacity * self.settings.opacity_scale)),
                    ),
            )
            .child(
                Element::new("feMerge")
                    .child(Element::new("feMergeNode").attr("in", "shadow"))
                    .child(Element::new("feMergeNode").attr("in", "SourceGraphic")),
            )
    }
}

impl GroupEffect for DropShadow {
    fn is_active(&self, group: &DocGroup) -> bool {
        group.shadow.kind != ShadowKind::None
    }

    fn defs(&self, input: &EffectInput<'_>) -> Vec<Node> {
        let shadow = input.group.shadow;
        vec![self.filter(input.index, shadow.kind, shadow.opacity).into()]
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
