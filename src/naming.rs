//! Layer identity to image-name mapping.

use std::collections::HashMap;

use crate::catalog::{AssetType, Catalog};

/// Maps a catalog layer identity (e.g. `AppIcon/1_person`) to the image
/// name written into the document and handed to the asset resolver.
pub trait AssetNamer {
    /// Returns `None` when the layer has no known asset.
    fn image_name(&self, identity: &str) -> Option<String>;
}

impl AssetNamer for HashMap<String, String> {
    fn image_name(&self, identity: &str) -> Option<String> {
        self.get(identity).cloned()
    }
}

/// Namer built from the catalog's own `RenditionName` fields.
///
/// Pre-rendered composites use their highest-resolution rendition. Layers
/// that ship one rendition per locale use the Latin (`-la`) variant, else
/// the first declared one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenditionNames {
    names: HashMap<String, String>,
}

impl RenditionNames {
    /// Collects renditions for records under `icon_name` (the icon itself or
    /// any `icon_name/…` child). With no icon name every record qualifies.
    pub fn from_catalog(catalog: &Catalog, icon_name: Option<&str>) -> Self {
        let in_scope = |name: &str| match icon_name {
            Some(icon) => {
                name == icon || name.strip_prefix(icon).is_some_and(|r| r.starts_with('/'))
            }
            None => true,
        };

        let mut names = HashMap::new();
        let mut best_area: HashMap<&str, u64> = HashMap::new();
        let mut candidates: Vec<(&str, Vec<&str>)> = Vec::new();

        for entry in catalog.entries() {
            let kind = entry.asset_type();
            if !kind.is_composable() && kind != AssetType::IconImage {
                continue;
            }
            let (Some(name), Some(rendition)) = (entry.name(), entry.rendition_name.as_deref())
            else {
                continue;
            };
            if !in_scope(name) || rendition.is_empty() {
                continue;
            }

            if kind == AssetType::IconImage {
                let area = entry.pixel_area();
                if area > best_area.get(name).copied().unwrap_or(0) {
                    best_area.insert(name, area);
                    names.insert(name.to_string(), rendition.to_string());
                }
                continue;
            }

            match candidates.iter_mut().find(|(n, _)| *n == name) {
                Some((_, renditions)) => {
                    if !renditions.contains(&rendition) {
                        renditions.push(rendition);
                    }
                }
                None => candidates.push((name, vec![rendition])),
            }
        }

        for (name, renditions) in candidates {
            if names.contains_key(name) {
                continue;
            }
            let chosen = renditions
                .iter()
                .find(|r| locale_suffix(file_stem(r)) == Some("la"))
                .or(renditions.first());
            if let Some(chosen) = chosen {
                names.insert(name.to_string(), chosen.to_string());
            }
        }

        tracing::debug!(count = names.len(), "collected rendition names");
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl AssetNamer for RenditionNames {
    fn image_name(&self, identity: &str) -> Option<String> {
        self.names.get(identity).cloned()
    }
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// Locale code of a `…-xx` or `…-xx-Script` suffix.
fn locale_suffix(stem: &str) -> Option<&str> {
    let is_code = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_lowercase());
    let (head, last) = stem.rsplit_once('-')?;
    if is_code(last) {
        return Some(last);
    }
    if last.is_empty() || !last.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let (_, code) = head.rsplit_once('-')?;
    is_code(code).then_some(code)
}
