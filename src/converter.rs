//! Conversion engine tying the pipeline together.

use crate::catalog::Catalog;
use crate::document::{DocumentCompiler, IconDocument};
use crate::error::{ConvertResult, DiagnosticKind, Diagnostics};
use crate::model::build_model;
use crate::naming::{AssetNamer, RenditionNames};
use crate::profile::ConvertOptions;
use crate::resolver::PaintResolver;
use crate::scene::{AssetResolver, SceneCompiler};

// ============================================================================
// Results
// ============================================================================

/// Output of converting one catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub document: IconDocument,
    /// Findings in the order they were raised.
    pub diagnostics: Diagnostics,
    /// Set when the document was built from a pre-rendered composite.
    pub legacy: bool,
    /// Edge length of the square scene canvas.
    pub canvas: u32,
}

/// A painted scene and the findings raised while painting it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedScene {
    pub svg: String,
    pub diagnostics: Diagnostics,
}

// ============================================================================
// IconConverter
// ============================================================================

/// Main conversion engine.
///
/// `IconConverter` turns a catalog into an [`IconDocument`] and paints
/// documents as SVG scenes.
///
/// # Pipeline
///
/// 1. **Load** - parse and validate the catalog JSON
/// 2. **Resolve** - index colors and gradients by name
/// 3. **Model** - merge appearance variants into the group hierarchy
/// 4. **Document** - resolve fills and names into the portable document
/// 5. **Scene** - paint the document with its compositing effects
///
/// Only step 1 can fail. Later steps record [`Diagnostics`] and keep going.
///
/// # Example
///
/// ```
/// use icon_recomposer::{ConvertOptions, IconConverter, NoAssets};
///
/// let catalog = r#"[
///     {},
///     {"AssetType": "Color", "Name": "AppIcon/blue", "Color components": [0, 0, 1, 1], "Colorspace": "display-p3"}
/// ]"#;
///
/// let converter = IconConverter::new(ConvertOptions::new().with_canvas(256));
/// let conversion = converter.convert(catalog).unwrap();
/// assert!(conversion.document.groups.is_empty());
///
/// let scene = converter.render_scene(&conversion, &NoAssets);
/// assert!(scene.svg.contains("viewBox=\"0 0 256 256\""));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IconConverter {
    options: ConvertOptions,
}

impl IconConverter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Replaces the options.
    pub fn set_options(&mut self, options: ConvertOptions) {
        self.options = options;
    }

    /// Parses and converts a catalog.
    ///
    /// Fails only when the catalog is structurally invalid.
    #[tracing::instrument(skip_all)]
    pub fn convert(&self, json: &str) -> ConvertResult<Conversion> {
        let catalog = Catalog::from_json(json)?;
        Ok(self.convert_catalog(&catalog))
    }

    /// Converts a loaded catalog, naming assets from its renditions.
    pub fn convert_catalog(&self, catalog: &Catalog) -> Conversion {
        let icon_name = self.icon_name(catalog);
        let names = RenditionNames::from_catalog(catalog, icon_name);
        self.convert_with_namer(catalog, &names)
    }

    /// Converts a loaded catalog with a caller-supplied asset namer.
    #[tracing::instrument(skip_all)]
    pub fn convert_with_namer(&self, catalog: &Catalog, namer: &dyn AssetNamer) -> Conversion {
        let icon_name = self.icon_name(catalog);
        let paints = PaintResolver::from_catalog(catalog);
        let mut diagnostics = Diagnostics::new();
        for issue in catalog.issues() {
            diagnostics.push(
                DiagnosticKind::MalformedField,
                issue.record.as_str(),
                issue.to_string(),
            );
        }

        let model = build_model(catalog, &mut diagnostics);
        let document =
            DocumentCompiler::new(catalog, &paints, namer, icon_name).compile(&model, &mut diagnostics);
        let canvas = self.options.canvas.unwrap_or(model.canvas.0);

        tracing::debug!(
            icon = icon_name.unwrap_or_default(),
            groups = document.groups.len(),
            diagnostics = diagnostics.len(),
            "converted catalog"
        );
        Conversion {
            document,
            diagnostics,
            legacy: model.legacy,
            canvas,
        }
    }

    /// Paints a conversion's document at its canvas size.
    pub fn render_scene(&self, conversion: &Conversion, assets: &dyn AssetResolver) -> RenderedScene {
        self.render_document(&conversion.document, conversion.canvas, assets)
    }

    /// Paints any document.
    #[tracing::instrument(skip_all, fields(canvas = canvas))]
    pub fn render_document(
        &self,
        document: &IconDocument,
        canvas: u32,
        assets: &dyn AssetResolver,
    ) -> RenderedScene {
        let mut diagnostics = Diagnostics::new();
        let svg = SceneCompiler::new(assets, canvas)
            .with_effects(self.options.effects)
            .compile(document, &mut diagnostics);
        RenderedScene { svg, diagnostics }
    }

    fn icon_name<'a>(&'a self, catalog: &'a Catalog) -> Option<&'a str> {
        self.options.icon_name.as_deref().or_else(|| catalog.icon_name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Fill;
    use crate::error::ConvertError;
    use crate::model::ShadowKind;
    use crate::scene::AssetContent;

    const RED_ICON: &str = r#"[
        {"Platform": "ios"},
        {"AssetType": "Color", "Name": "AppIcon/red", "Color components": [1, 0, 0, 1], "Colorspace": "srgb"},
        {"AssetType": "Named Gradient", "Name": "AppIcon/bg", "Gradient Colors": ["AppIcon/red", "AppIcon/red"]},
        {"AssetType": "Vector", "Name": "AppIcon/glyph", "RenditionName": "glyph.svg"},
        {"AssetType": "IconGroup", "Name": "Main", "Layers": [
            {"AssetType": "Vector", "Name": "AppIcon/glyph"}
        ]},
        {"AssetType": "IconImageStack", "Name": "AppIcon", "Layers": [
            {"AssetType": "IconGroup", "Name": "Main", "LayerHasSpecular": true, "LayerShadowStyle": 3}
        ]}
    ]"#;

    const GLYPH: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1024 1024"><circle cx="512" cy="512" r="300" fill="#fff"/></svg>"##;

    fn assets() -> HashMap<String, AssetContent> {
        let mut map = HashMap::new();
        map.insert("glyph.svg".to_string(), AssetContent::Markup(GLYPH.to_string()));
        map
    }

    #[test]
    fn srgb_red_gradient_becomes_converted_root_fill() {
        let conversion = IconConverter::default().convert(RED_ICON).unwrap();
        assert!(conversion.diagnostics.is_empty());
        assert!(!conversion.legacy);
        assert_eq!(conversion.canvas, 1024);

        let doc = &conversion.document;
        let Fill::LinearGradient { stops, .. } = &doc.fill else {
            panic!("expected a linear gradient");
        };
        assert_eq!(stops.len(), 2);
        let literal = stops[0].to_string();
        assert_ne!(literal, "display-p3:1.00000,0.00000,0.00000,1.00000");
        assert!(literal.starts_with("display-p3:0.917"));
        assert_eq!(doc.supported_platforms.circles, ["watchOS"]);

        let group = &doc.groups[0];
        assert!(group.layers[0].glass);
        assert_eq!(group.layers[0].image_name, "glyph.svg");
        assert_eq!(group.shadow.kind, ShadowKind::Neutral);
        assert!(group.translucency.enabled);
        assert_eq!(group.translucency.value, 0.5);
    }

    #[test]
    fn foreground_first_catalog_paints_background_first() {
        let json = r#"[
            {},
            {"AssetType": "Vector", "Name": "AppIcon/fg", "RenditionName": "fg.svg"},
            {"AssetType": "Vector", "Name": "AppIcon/bg", "RenditionName": "bg.svg"},
            {"AssetType": "IconGroup", "Name": "Foreground", "Layers": [{"AssetType": "Vector", "Name": "AppIcon/fg"}]},
            {"AssetType": "IconGroup", "Name": "Background", "Layers": [{"AssetType": "Vector", "Name": "AppIcon/bg"}]},
            {"AssetType": "IconImageStack", "Name": "AppIcon", "Layers": [
                {"AssetType": "IconGroup", "Name": "Foreground"},
                {"AssetType": "IconGroup", "Name": "Background"}
            ]}
        ]"#;
        let converter = IconConverter::default();
        let conversion = converter.convert(json).unwrap();
        let names: Vec<_> = conversion
            .document
            .groups
            .iter()
            .map(|g| g.layers[0].name.as_str())
            .collect();
        assert_eq!(names, ["bg", "fg"]);

        let mut assets = HashMap::new();
        assets.insert(
            "fg.svg".to_string(),
            AssetContent::Markup(r#"<svg xmlns="http://www.w3.org/2000/svg"><path id="front" d="M0 0h1v1z"/></svg>"#.into()),
        );
        assets.insert(
            "bg.svg".to_string(),
            AssetContent::Markup(r#"<svg xmlns="http://www.w3.org/2000/svg"><path id="back" d="M0 0h1v1z"/></svg>"#.into()),
        );
        let scene = converter.render_scene(&conversion, &assets);
        assert!(scene.diagnostics.is_empty());
        let back = scene.svg.find("id=\"back\"").unwrap();
        let front = scene.svg.find("id=\"front\"").unwrap();
        assert!(back < front);
    }

    #[test]
    fn zero_translucency_leaves_group_opaque() {
        let json = RED_ICON.replace(
            r#""LayerShadowStyle": 3}"#,
            r#""LayerShadowStyle": 3, "LayerTranslucency": 0}"#,
        );
        let converter = IconConverter::default();
        let conversion = converter.convert(&json).unwrap();
        assert!(!conversion.document.groups[0].translucency.enabled);

        let scene = converter.render_scene(&conversion, &assets());
        assert!(!scene.svg.contains("<g opacity="));
        assert!(scene.svg.contains("<g>"));
    }

    #[test]
    fn translucent_group_is_faded_in_scene() {
        let converter = IconConverter::default();
        let conversion = converter.convert(RED_ICON).unwrap();
        let scene = converter.render_scene(&conversion, &assets());
        assert!(scene.svg.contains("<g opacity=\"0.5000\">"));
        assert!(scene.svg.contains("url(#specular-g0)"));
        assert!(scene.svg.contains("url(#shadow-g0)"));
    }

    #[test]
    fn options_override_canvas_and_names() {
        let converter = IconConverter::new(ConvertOptions::new().with_canvas(512));
        let conversion = converter.convert(RED_ICON).unwrap();
        assert_eq!(conversion.canvas, 512);
        let scene = converter.render_scene(&conversion, &assets());
        assert!(scene.svg.contains("viewBox=\"0 0 512 512\""));

        let catalog = Catalog::from_json(RED_ICON).unwrap();
        let mut names = HashMap::new();
        names.insert("AppIcon/glyph".to_string(), "custom.svg".to_string());
        let conversion = converter.convert_with_namer(&catalog, &names);
        assert_eq!(conversion.document.groups[0].layers[0].image_name, "custom.svg");

        let scene = converter.render_scene(&conversion, &assets());
        assert!(scene.diagnostics.has(DiagnosticKind::UnresolvedReference));
    }

    #[test]
    fn conversion_is_deterministic() {
        let converter = IconConverter::default();
        let first = converter.convert(RED_ICON).unwrap();
        let second = converter.convert(RED_ICON).unwrap();
        assert_eq!(
            first.document.to_json().unwrap(),
            second.document.to_json().unwrap()
        );
        assert_eq!(
            converter.render_scene(&first, &assets()).svg,
            converter.render_scene(&second, &assets()).svg
        );
    }

    #[test]
    fn unknown_shadow_code_is_reported_and_logged() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let json = RED_ICON.replace(r#""LayerShadowStyle": 3"#, r#""LayerShadowStyle": 7"#);
        let conversion = IconConverter::default().convert(&json).unwrap();
        assert!(conversion.diagnostics.has(DiagnosticKind::UnconfirmedMapping));
        assert_eq!(conversion.document.groups[0].shadow.kind, ShadowKind::Neutral);
    }

    #[test]
    fn loosely_typed_stack_fields_keep_the_group() {
        let json = RED_ICON
            .replace(r#""LayerShadowStyle": 3"#, r#""LayerShadowStyle": 2.0"#)
            .replace(
                r#"{"AssetType": "IconImageStack", "Name": "AppIcon","#,
                r#"{"AssetType": "IconImageStack", "Name": "AppIcon", "CanvasWidth": "1024","#,
            );
        let conversion = IconConverter::default().convert(&json).unwrap();
        assert!(conversion.diagnostics.is_empty());
        assert_eq!(conversion.canvas, 1024);
        assert_eq!(conversion.document.groups.len(), 1);
        assert_eq!(conversion.document.groups[0].shadow.kind, ShadowKind::Chromatic);
    }

    #[test]
    fn malformed_stack_field_is_reported_and_group_kept() {
        let json = RED_ICON.replace(r#""LayerShadowStyle": 3"#, r#""LayerShadowStyle": "heavy""#);
        let conversion = IconConverter::default().convert(&json).unwrap();

        let group = &conversion.document.groups[0];
        assert_eq!(group.layers[0].image_name, "glyph.svg");
        assert!(group.layers[0].glass);

        let malformed: Vec<_> = conversion
            .diagnostics
            .of_kind(DiagnosticKind::MalformedField)
            .collect();
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].subject, "Main");
        assert!(malformed[0].message.contains("LayerShadowStyle"));
    }

    #[test]
    fn invalid_catalogs_fail() {
        let converter = IconConverter::default();
        assert!(matches!(converter.convert("{"), Err(ConvertError::Json(_))));
        assert!(matches!(converter.convert("[]"), Err(ConvertError::MissingHeader)));
        assert!(matches!(converter.convert("[1]"), Err(ConvertError::InvalidHeader(_))));
    }
}
