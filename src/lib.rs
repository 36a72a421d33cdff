//! icon-recomposer: Icon catalog conversion and glass-effect scene synthesis
//!
//! This crate reads a compiled icon catalog (colors, named gradients,
//! grouped vector and image layers with per-appearance overrides and
//! compositing metadata) and produces:
//!
//! - an appearance-resolved [`IconDocument`] ready to serialize as JSON
//! - a self-contained SVG scene approximating the composited rendering
//!   with gradients, masks and filter primitives
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use icon_recomposer::{AssetContent, ConvertOptions, DiagnosticKind, IconConverter};
//!
//! let catalog = r#"[
//!     {"Platform": "ios"},
//!     {"AssetType": "Color", "Name": "AppIcon/sky", "Color components": [0.2, 0.5, 0.9, 1], "Colorspace": "srgb"},
//!     {"AssetType": "Named Gradient", "Name": "AppIcon/bg", "Gradient Colors": ["AppIcon/sky"]},
//!     {"AssetType": "Vector", "Name": "AppIcon/glyph", "RenditionName": "glyph.svg"},
//!     {"AssetType": "IconGroup", "Name": "Main", "Layers": [{"AssetType": "Vector", "Name": "AppIcon/glyph"}]},
//!     {"AssetType": "IconImageStack", "Name": "AppIcon", "Layers": [
//!         {"AssetType": "IconGroup", "Name": "Main", "LayerShadowStyle": 3}
//!     ]}
//! ]"#;
//!
//! let converter = IconConverter::new(ConvertOptions::new());
//! let conversion = converter.convert(catalog).unwrap();
//! assert_eq!(conversion.document.groups.len(), 1);
//! let json = conversion.document.to_json_pretty().unwrap();
//! assert!(json.contains("\"image-name\": \"glyph.svg\""));
//!
//! let mut assets = HashMap::new();
//! assets.insert(
//!     "glyph.svg".to_string(),
//!     AssetContent::Markup(r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="10"/></svg>"#.into()),
//! );
//! let scene = converter.render_scene(&conversion, &assets);
//! assert!(scene.svg.contains("<circle"));
//! assert!(!scene.diagnostics.has(DiagnosticKind::UnresolvedReference));
//! ```
//!
//! # Diagnostics
//!
//! Only a structurally invalid catalog is an error ([`ConvertError`]).
//! Missing references, provisional mappings and assets that cannot be
//! inlined are collected in [`Diagnostics`] next to the result, and each is
//! also emitted as a `tracing` event.
//!
//! # Serializable Options
//!
//! [`ConvertOptions`] and [`EffectsProfile`] round-trip through JSON:
//!
//! ```
//! use icon_recomposer::{ConvertOptions, EffectsProfile};
//!
//! let mut effects = EffectsProfile::default();
//! effects.shadow.opacity_scale = 0.5;
//! let options = ConvertOptions::new().with_icon_name("AppIcon").with_effects(effects);
//!
//! let json = options.to_json().unwrap();
//! assert_eq!(ConvertOptions::from_json(&json).unwrap(), options);
//! ```

mod appearance;
mod catalog;
mod color;
mod converter;
mod document;
mod error;
mod gradient;
mod model;
mod naming;
mod profile;
mod resolver;
mod scene;

pub use appearance::{Appearance, GroupOpacity, MergedLayer};
pub use catalog::{AssetType, Catalog, CatalogEntry, CatalogHeader, DEFAULT_CANVAS, FieldIssue};
pub use color::{Color, ParseColorError, SourceSpace, resolve_color};
pub use converter::{Conversion, IconConverter, RenderedScene};
pub use document::{
    DocGroup, DocLayer, DocumentCompiler, Fill, IconDocument, Lighting, Shadow, Specialization,
    SquareSupport, SupportedPlatforms, Translucency,
};
pub use error::{ConvertError, ConvertResult, Diagnostic, DiagnosticKind, Diagnostics};
pub use gradient::{Gradient, Orientation, UnitPoint};
pub use model::{CanvasPair, GroupRecord, IconModel, LayerRecord, ShadowKind, build_model};
pub use naming::{AssetNamer, RenditionNames};
pub use profile::{
    BackdropSettings, ConvertOptions, EffectsProfile, ShadowSettings, SpecularSettings,
};
pub use resolver::PaintResolver;
pub use scene::{
    AssetContent, AssetError, AssetRef, AssetResolver, BackdropBlur, ColorPalette, DropShadow,
    EffectInput, Element, GlassSheen, GroupEffect, InlineAsset, Node, NoAssets, RimLight,
    SceneCompiler,
};
