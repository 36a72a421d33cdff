//! Frosted backdrop blur.
//!
//! SVG has no backdrop filter, so everything painted before the group is
//! wrapped in a referenceable `<g>` and redrawn through a blur, masked to
//! the group's silhouette.

use super::node::{Element, Node, num, url};
use super::{EffectInput, GroupEffect, alpha_mask};
use crate::appearance::OPACITY_EPSILON;
use crate::document::DocGroup;
use crate::profile::BackdropSettings;

#[derive(Debug, Clone, Copy)]
pub struct BackdropBlur {
    settings: BackdropSettings,
}

impl BackdropBlur {
    pub fn new(settings: BackdropSettings) -> Self {
        Self { settings }
    }

    pub fn backdrop_id(index: usize) -> String {
        format!("backdrop-g{index}")
    }

    pub fn filter_id(index: usize) -> String {
        format!("blur-g{index}")
    }

    pub fn mask_id(index: usize) -> String {
        format!("blur-mask-g{index}")
    }

    /// Blur standard deviation for a blur-material amount, rounded to two
    /// decimals.
    pub fn std_deviation(&self, material: f64) -> f64 {
        (material * self.settings.blur_per_unit * 100.0).round() / 100.0
    }

    fn filter(&self, index: usize, material: f64) -> Element {
        let s = &self.settings;
        Element::new("filter")
            .attr("id", Self::filter_id(index))
            .child(
                Element::new("feGaussianBlur")
                    .attr("stdDeviation", num(self.std_deviation(material)))
                    .attr("result", "blurred"),
            )
            .child(
                Element::new("feTurbulence")
                    .attr("type", "fractalNoise")
                    .attr("baseFrequency", num(s.noise_frequency))
                    .attr("numOctaves", s.noise_octaves)
                    .attr("seed", s.noise_seed)
                    .attr("result", "noise"),
            )
            .child(
                Element::new("feDisplacementMap")
                    .attr("in", "blurred")
                    .attr("in2", "noise")
                    .attr("scale", num(s.displacement))
                    .attr("xChannelSelector", "R")
                    .attr("yChannelSelector", "G"),
            )
    }
}

impl GroupEffect for BackdropBlur {
    fn is_active(&self, group: &DocGroup) -> bool {
        group.blur_material.is_some_and(|b| b > 0.0)
    }

    fn defs(&self, input: &EffectInput<'_>) -> Vec<Node> {
        let shapes = input.silhouette.iter().map(|(asset, opacity)| {
            let opacity = ((opacity - 1.0).abs() > OPACITY_EPSILON).then_some(*opacity);
            asset.to_node(opacity)
        });
        let material = input.group.blur_material.unwrap_or(0.0);
        vec![
            alpha_mask(&Self::mask_id(input.index), shapes),
            self.filter(input.index, material).into(),
        ]
    }

    /// Takes everything painted so far, not the group's own content.
    fn wrap(&self, input: &EffectInput<'_>, content: Vec<Node>) -> Vec<Node> {
        let id = Self::backdrop_id(input.index);
        let redraw = Element::new("use")
            .attr("href", format!("#{id}"))
            .attr("filter", url(&Self::filter_id(input.index)))
            .attr("mask", url(&Self::mask_id(input.index)));
        vec![
            Element::new("g").attr("id", id).children(content).into(),
            redraw.into(),
        ]
    }
}
