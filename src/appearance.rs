//! Appearance variants and the merge pass that collapses them.
//!
//! A catalog stores one record per appearance for every layer and group
//! (light, dark, tintable), all sharing the same identity. The merge pass
//! turns each set of sibling records into one immutable value holding the
//! canonical defaults plus a sparse map of per-appearance overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opacity differences at or below this threshold are treated as equal.
pub const OPACITY_EPSILON: f64 = 0.001;

/// Catalog tags that explicitly name the light/default appearance.
const LIGHT_TAGS: &[&str] = &["UIAppearanceLight", "UIAppearanceAny", "NSAppearanceNameAqua"];

// ============================================================================
// Appearance
// ============================================================================

/// A rendering context for which values may be overridden.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    #[default]
    Default,
    Dark,
    Tinted,
}

impl Appearance {
    /// Maps a raw catalog tag to an override key. Tags that are not
    /// recognized dark or tinted tags return `None`.
    pub fn override_key(tag: &str) -> Option<Self> {
        match tag {
            "UIAppearanceDark" | "NSAppearanceNameDarkAqua" => Some(Self::Dark),
            "ISAppearanceTintable" => Some(Self::Tinted),
            _ => None,
        }
    }

    /// Maps a raw catalog tag; unrecognized tags are the default appearance.
    pub fn from_tag(tag: &str) -> Self {
        Self::override_key(tag).unwrap_or_default()
    }

    /// True for tags that explicitly name the light/default appearance.
    pub fn is_light_tag(tag: &str) -> bool {
        LIGHT_TAGS.contains(&tag)
    }
}

/// Picks the record that supplies merged defaults.
///
/// Order of preference: a record explicitly tagged light/default, then the
/// first record whose tag is not a recognized dark/tinted tag, then the
/// first record.
pub fn canonical_index<'a>(tags: impl IntoIterator<Item = &'a str>) -> Option<usize> {
    let tags: Vec<&str> = tags.into_iter().collect();
    tags.iter()
        .position(|t| Appearance::is_light_tag(t))
        .or_else(|| tags.iter().position(|t| Appearance::override_key(t).is_none()))
        .or(if tags.is_empty() { None } else { Some(0) })
}

fn distinct(a: f64, b: f64) -> bool {
    (a - b).abs() > OPACITY_EPSILON
}

// ============================================================================
// Layer merge
// ============================================================================

/// The per-appearance slice of one layer record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerVariant<'a> {
    pub fill: Option<&'a str>,
    pub opacity: f64,
}

/// Canonical layer values plus sparse per-appearance overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedLayer {
    pub default_fill: Option<String>,
    pub default_opacity: f64,
    /// Only appearances that name a fill of their own.
    pub fill_overrides: BTreeMap<Appearance, String>,
    /// Only appearances whose opacity differs from the default.
    pub opacity_overrides: BTreeMap<Appearance, f64>,
}

impl MergedLayer {
    /// A layer with no fill, full opacity and no overrides.
    pub fn plain() -> Self {
        Self {
            default_fill: None,
            default_opacity: 1.0,
            fill_overrides: BTreeMap::new(),
            opacity_overrides: BTreeMap::new(),
        }
    }

    /// Merges sibling records, each paired with its raw appearance tag.
    ///
    /// Records whose tags are neither canonical nor a recognized override are
    /// ignored. Returns `None` for an empty input.
    pub fn merge(variants: &[(&str, LayerVariant<'_>)]) -> Option<Self> {
        let canonical = canonical_index(variants.iter().map(|(tag, _)| *tag))?;
        let base = variants[canonical].1;
        let mut merged = Self {
            default_fill: base.fill.map(str::to_string),
            default_opacity: base.opacity,
            ..Self::plain()
        };
        for (i, (tag, variant)) in variants.iter().enumerate() {
            if i == canonical {
                continue;
            }
            let Some(key) = Appearance::override_key(tag) else { continue };
            if let Some(fill) = variant.fill {
                merged.fill_overrides.insert(key, fill.to_string());
            }
            if distinct(variant.opacity, merged.default_opacity) {
                merged.opacity_overrides.insert(key, variant.opacity);
            }
        }
        Some(merged)
    }

    /// Opacity in effect for an appearance.
    pub fn opacity_for(&self, appearance: Appearance) -> f64 {
        self.opacity_overrides
            .get(&appearance)
            .copied()
            .unwrap_or(self.default_opacity)
    }

    /// Fill reference in effect for an appearance.
    pub fn fill_for(&self, appearance: Appearance) -> Option<&str> {
        self.fill_overrides
            .get(&appearance)
            .or(self.default_fill.as_ref())
            .map(String::as_str)
    }

    /// Multiplies a group's per-appearance opacity into this layer.
    ///
    /// Leaves the layer untouched when the group is fully opaque in every
    /// appearance. Overrides that end up equal to the new default are
    /// dropped.
    pub fn with_group_opacity(self, group: &GroupOpacity) -> Self {
        if !group.is_partial() {
            return self;
        }
        let default_opacity = self.default_opacity * group.default;
        let mut appearances: Vec<Appearance> = self.opacity_overrides.keys().copied().collect();
        appearances.extend(group.overrides.keys().copied());
        appearances.sort();
        appearances.dedup();

        let opacity_overrides = appearances
            .into_iter()
            .filter_map(|appearance| {
                let effective = self.opacity_for(appearance) * group.opacity_for(appearance);
                distinct(effective, default_opacity).then_some((appearance, effective))
            })
            .collect();

        Self {
            default_opacity,
            opacity_overrides,
            ..self
        }
    }
}

// ============================================================================
// Group opacity
// ============================================================================

/// A group's own opacity per appearance, as declared on its stack entries.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOpacity {
    pub default: f64,
    pub overrides: BTreeMap<Appearance, f64>,
}

impl Default for GroupOpacity {
    fn default() -> Self {
        Self {
            default: 1.0,
            overrides: BTreeMap::new(),
        }
    }
}

impl GroupOpacity {
    /// Merges `(tag, opacity)` pairs from the stack entries that reference
    /// the group.
    pub fn merge(variants: &[(&str, f64)]) -> Self {
        let Some(canonical) = canonical_index(variants.iter().map(|(tag, _)| *tag)) else {
            return Self::default();
        };
        let mut merged = Self {
            default: variants[canonical].1,
            overrides: BTreeMap::new(),
        };
        for (i, (tag, opacity)) in variants.iter().enumerate() {
            if i == canonical {
                continue;
            }
            if let Some(key) = Appearance::override_key(tag) {
                merged.overrides.insert(key, *opacity);
            }
        }
        merged
    }

    pub fn opacity_for(&self, appearance: Appearance) -> f64 {
        self.overrides
            .get(&appearance)
            .copied()
            .unwrap_or(self.default)
    }

    /// True when any appearance is less than fully opaque.
    pub fn is_partial(&self) -> bool {
        distinct(self.default, 1.0) || self.overrides.values().any(|o| distinct(*o, 1.0))
    }
}
