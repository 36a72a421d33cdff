//! Asset lookup and inlining.
//!
//! Vector assets are inlined as markup so scene filters can read their
//! pixels; raster assets become base64 `data:` URIs. Each inlined asset is
//! defined once in `<defs>` and drawn through `<use>` references, so ids
//! inside the asset's markup stay unique.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use resvg::usvg::{Options, Tree};

use super::node::{Element, Node, num};

// ============================================================================
// AssetResolver
// ============================================================================

/// Raw asset content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetContent {
    /// SVG markup.
    Markup(String),
    /// Encoded file bytes (PNG, JPEG, PDF, ...).
    Bytes(Vec<u8>),
}

/// Looks up asset content by the image name recorded in the document.
pub trait AssetResolver {
    fn resolve(&self, image_name: &str) -> Option<AssetContent>;
}

impl AssetResolver for HashMap<String, AssetContent> {
    fn resolve(&self, image_name: &str) -> Option<AssetContent> {
        self.get(image_name).cloned()
    }
}

/// A resolver with no assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetResolver for NoAssets {
    fn resolve(&self, _image_name: &str) -> Option<AssetContent> {
        None
    }
}

// ============================================================================
// Inlining
// ============================================================================

/// Why an asset cannot be inlined.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("asset `{0}` not found")]
    Unresolved(String),
    #[error("PDF asset `{0}` cannot be inlined")]
    Pdf(String),
    #[error("asset `{0}` is not a recognized image format")]
    UnknownFormat(String),
    #[error("asset `{name}` has malformed markup: {reason}")]
    Malformed { name: String, reason: String },
}

/// An asset ready to be placed in the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineAsset {
    /// Inner content of the asset's root `<svg>`.
    Markup(String),
    /// `data:` URI of a raster image.
    DataUri(String),
}

impl InlineAsset {
    /// Full-canvas definition of the asset under `id`.
    pub fn define(&self, id: &str, canvas: u32) -> Node {
        match self {
            Self::Markup(inner) => Element::new("g")
                .attr("id", id)
                .child(Node::Raw(inner.clone()))
                .into(),
            Self::DataUri(uri) => Element::new("image")
                .attr("id", id)
                .attr("href", uri)
                .attr("width", canvas)
                .attr("height", canvas)
                .into(),
        }
    }
}

/// Reference to an asset defined in the scene's `<defs>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    id: String,
}

impl AssetRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `<use>` drawing the asset, with an optional opacity.
    pub fn to_node(&self, opacity: Option<f64>) -> Node {
        Element::new("use")
            .attr("href", format!("#{}", self.id))
            .attr_opt("opacity", opacity.map(num))
            .into()
    }
}

fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Resolves and prepares one asset.
pub fn inline_asset(
    resolver: &dyn AssetResolver,
    image_name: &str,
) -> Result<InlineAsset, AssetError> {
    if is_pdf_name(image_name) {
        return Err(AssetError::Pdf(image_name.to_string()));
    }
    match resolver.resolve(image_name) {
        None => Err(AssetError::Unresolved(image_name.to_string())),
        Some(AssetContent::Markup(markup)) => inline_markup(image_name, &markup),
        Some(AssetContent::Bytes(bytes)) => inline_bytes(image_name, &bytes),
    }
}

fn inline_markup(name: &str, markup: &str) -> Result<InlineAsset, AssetError> {
    let malformed = |reason: String| AssetError::Malformed {
        name: name.to_string(),
        reason,
    };
    Tree::from_str(markup, &Options::default()).map_err(|e| malformed(e.to_string()))?;
    inner_content(markup)
        .map(|inner| InlineAsset::Markup(inner.to_string()))
        .ok_or_else(|| malformed("no root <svg> element".to_string()))
}

fn inline_bytes(name: &str, bytes: &[u8]) -> Result<InlineAsset, AssetError> {
    if bytes.starts_with(b"%PDF") {
        return Err(AssetError::Pdf(name.to_string()));
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        if text.trim_start().starts_with('<') {
            return inline_markup(name, text);
        }
    }
    let format =
        image::guess_format(bytes).map_err(|_| AssetError::UnknownFormat(name.to_string()))?;
    Ok(InlineAsset::DataUri(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    )))
}

/// Content between the root `<svg …>` tag and its closing tag.
fn inner_content(markup: &str) -> Option<&str> {
    let start = markup.find("<svg")?;
    let open_end = start + markup[start..].find('>')?;
    if markup[..open_end].ends_with('/') {
        return Some("");
    }
    let close = markup.rfind("</svg>")?;
    markup.get(open_end + 1..close).map(str::trim)
}
