//! Catalog loading.
//!
//! A catalog is the JSON dump of a compiled asset catalog: an array whose
//! first element is a header object, followed by one object per asset
//! record. Records are discriminated by their `AssetType` tag and nest
//! further records under `Layers`.
//!
//! Loading only checks the structure that every later stage relies on (the
//! array shape and the header). Members that are not objects are skipped.
//! Known fields are coerced to their expected types: integral floats and
//! numeric strings count as numbers, numbers and `"true"`/`"false"` as
//! flags. A field that still does not fit is dropped and recorded as a
//! [`FieldIssue`], and the rest of its record is kept.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{ConvertError, ConvertResult};

/// Canvas edge length assumed when a catalog does not declare one.
pub const DEFAULT_CANVAS: u32 = 1024;

// ============================================================================
// AssetType
// ============================================================================

/// Record discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Color,
    NamedGradient,
    Vector,
    Image,
    /// A pre-rendered composite bitmap.
    IconImage,
    IconGroup,
    IconImageStack,
    Other,
}

impl AssetType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Color" => Self::Color,
            "Named Gradient" => Self::NamedGradient,
            "Vector" => Self::Vector,
            "Image" => Self::Image,
            "Icon Image" => Self::IconImage,
            "IconGroup" => Self::IconGroup,
            "IconImageStack" => Self::IconImageStack,
            _ => Self::Other,
        }
    }

    /// Vector and image records can be composed into layers.
    pub fn is_composable(self) -> bool {
        matches!(self, Self::Vector | Self::Image)
    }
}

// ============================================================================
// CatalogEntry
// ============================================================================

/// One typed catalog record. Fields absent from the record are `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogEntry {
    #[serde(rename = "AssetType")]
    asset_type_tag: Option<String>,
    pub name: Option<String>,
    pub appearance: Option<String>,

    #[serde(rename = "Color components")]
    pub color_components: Option<Vec<f64>>,
    pub colorspace: Option<String>,

    #[serde(rename = "Gradient Colors")]
    pub gradient_colors: Option<Vec<String>>,
    #[serde(rename = "Gradient Start/Stop")]
    pub gradient_start_stop: Option<String>,

    #[serde(default, deserialize_with = "lenient_entries")]
    pub layers: Vec<CatalogEntry>,

    pub layer_gradient_color_name: Option<String>,
    pub layer_opacity: Option<f64>,
    pub layer_has_specular: Option<bool>,
    pub layer_gathers_specular_by_element: Option<bool>,
    pub layer_shadow_style: Option<i64>,
    pub layer_shadow_opacity: Option<f64>,
    pub layer_translucency: Option<f64>,
    pub layer_blur_strength: Option<f64>,
    pub layer_position: Option<Value>,
    pub layer_size: Option<Value>,

    pub canvas_width: Option<f64>,
    pub canvas_height: Option<f64>,
    pub pixel_width: Option<u64>,
    pub pixel_height: Option<u64>,
    pub rendition_name: Option<String>,
}

impl CatalogEntry {
    pub fn asset_type(&self) -> AssetType {
        self.asset_type_tag
            .as_deref()
            .map_or(AssetType::Other, AssetType::from_tag)
    }

    /// The record's name, treating an empty string as absent.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Raw appearance tag; records without one belong to the any-appearance
    /// variant.
    pub fn appearance_tag(&self) -> &str {
        self.appearance.as_deref().unwrap_or(ANY_APPEARANCE)
    }

    /// Pixel area of a bitmap record, zero when unknown.
    pub fn pixel_area(&self) -> u64 {
        self.pixel_width
            .unwrap_or(0)
            .saturating_mul(self.pixel_height.unwrap_or(0))
    }

    /// Nested records of the given type.
    pub fn layers_of(&self, kind: AssetType) -> impl Iterator<Item = &CatalogEntry> {
        self.layers.iter().filter(move |l| l.asset_type() == kind)
    }
}

/// Tag assumed for records that carry no `Appearance`.
pub const ANY_APPEARANCE: &str = "UIAppearanceAny";

/// Deserializes an already normalized `Layers` array.
fn lenient_entries<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<CatalogEntry>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
    Ok(raw.into_iter().filter_map(decode_entry).collect())
}

fn entry_from_value(value: Value, issues: &mut Vec<FieldIssue>) -> Option<CatalogEntry> {
    let Value::Object(mut map) = value else {
        return None;
    };
    normalize(&mut map, issues);
    decode_entry(Value::Object(map))
}

fn decode_entry(value: Value) -> Option<CatalogEntry> {
    if !value.is_object() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(entry) => Some(entry),
        Err(err) => {
            tracing::debug!(%err, "skipping malformed catalog record");
            None
        }
    }
}

// ============================================================================
// Field normalization
// ============================================================================

/// Expected JSON shape of a known record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Text,
    Number,
    Integer,
    Count,
    Flag,
    Numbers,
    Texts,
    Records,
}

const FIELD_SHAPES: &[(&str, Shape)] = &[
    ("AssetType", Shape::Text),
    ("Name", Shape::Text),
    ("Appearance", Shape::Text),
    ("Color components", Shape::Numbers),
    ("Colorspace", Shape::Text),
    ("Gradient Colors", Shape::Texts),
    ("Gradient Start/Stop", Shape::Text),
    ("LayerGradientColorName", Shape::Text),
    ("LayerOpacity", Shape::Number),
    ("LayerHasSpecular", Shape::Flag),
    ("LayerGathersSpecularByElement", Shape::Flag),
    ("LayerShadowStyle", Shape::Integer),
    ("LayerShadowOpacity", Shape::Number),
    ("LayerTranslucency", Shape::Number),
    ("LayerBlurStrength", Shape::Number),
    ("CanvasWidth", Shape::Number),
    ("CanvasHeight", Shape::Number),
    ("PixelWidth", Shape::Count),
    ("PixelHeight", Shape::Count),
    ("RenditionName", Shape::Text),
    ("Layers", Shape::Records),
];

/// A record field whose value could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Name of the record, else its asset type.
    pub record: String,
    pub field: &'static str,
    /// JSON kind of the rejected value.
    pub found: &'static str,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field `{}` has an unusable {} value, ignoring it",
            self.field, self.found
        )
    }
}

/// Coerces the known fields of a record to their expected shapes, removing
/// the ones that do not fit. Nested records are normalized too.
fn normalize(map: &mut Map<String, Value>, issues: &mut Vec<FieldIssue>) {
    let record = map
        .get("Name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .or_else(|| map.get("AssetType").and_then(Value::as_str))
        .unwrap_or("unnamed record")
        .to_string();

    for &(field, shape) in FIELD_SHAPES {
        let Some(value) = map.remove(field) else { continue };
        if value.is_null() {
            continue;
        }
        let found = json_kind(&value);
        match coerce(value, shape, issues) {
            Some(value) => {
                map.insert(field.to_string(), value);
            }
            None => issues.push(FieldIssue {
                record: record.clone(),
                field,
                found,
            }),
        }
    }
}

fn coerce(value: Value, shape: Shape, issues: &mut Vec<FieldIssue>) -> Option<Value> {
    match shape {
        Shape::Text => value.is_string().then_some(value),
        Shape::Number => as_number(&value).map(Value::from),
        Shape::Integer => as_integer(&value).map(Value::from),
        Shape::Count => as_count(&value).map(Value::from),
        Shape::Flag => as_flag(&value).map(Value::Bool),
        Shape::Numbers => match &value {
            Value::Array(items) => items
                .iter()
                .map(as_number)
                .collect::<Option<Vec<f64>>>()
                .map(Value::from),
            _ => None,
        },
        Shape::Texts => match value {
            Value::Array(items) if items.iter().all(Value::is_string) => Some(Value::Array(items)),
            _ => None,
        },
        Shape::Records => match value {
            Value::Array(items) => {
                let records = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(mut map) => {
                            normalize(&mut map, issues);
                            Some(Value::Object(map))
                        }
                        _ => None,
                    })
                    .collect();
                Some(Value::Array(records))
            }
            _ => None,
        },
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    as_number(value)
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i64)
}

fn as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    as_number(value)
        .filter(|v| v.fract() == 0.0 && *v >= 0.0)
        .map(|v| v as u64)
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => as_number(value).map(|v| v != 0.0),
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Metadata from the catalog's header record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogHeader {
    /// Target platform, e.g. `macosx` or `macosx-ios`.
    pub platform: Option<String>,
    pub platform_version: Option<String>,
    pub authoring_tool: Option<String>,
}

impl CatalogHeader {
    /// True when the catalog was built for an iOS-family target.
    pub fn targets_ios(&self) -> bool {
        self.platform.as_deref().is_some_and(|p| p.contains("ios"))
    }
}

/// An immutable, validated catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    header: CatalogHeader,
    entries: Vec<CatalogEntry>,
    issues: Vec<FieldIssue>,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Catalog {
    /// Parses and validates a catalog from JSON text.
    pub fn from_json(json: &str) -> ConvertResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Validates an already-parsed catalog.
    ///
    /// Fails when the value is not an array or its first element is missing
    /// or not an object.
    pub fn from_value(value: Value) -> ConvertResult<Self> {
        let Value::Array(items) = value else {
            return Err(ConvertError::NotAnArray(json_kind(&value)));
        };
        let mut items = items.into_iter();
        let header = match items.next() {
            None => return Err(ConvertError::MissingHeader),
            Some(Value::Object(map)) => {
                let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                CatalogHeader {
                    platform: text("Platform"),
                    platform_version: text("PlatformVersion"),
                    authoring_tool: text("Authoring Tool"),
                }
            }
            Some(other) => return Err(ConvertError::InvalidHeader(json_kind(&other))),
        };
        let mut issues = Vec::new();
        let entries: Vec<_> = items
            .filter_map(|item| entry_from_value(item, &mut issues))
            .collect();
        tracing::debug!(records = entries.len(), issues = issues.len(), "loaded catalog");
        Ok(Self {
            header,
            entries,
            issues,
        })
    }

    /// Builds a catalog directly from typed records.
    pub fn from_entries(header: CatalogHeader, entries: Vec<CatalogEntry>) -> Self {
        Self {
            header,
            entries,
            issues: Vec::new(),
        }
    }

    /// Fields that were dropped while loading, in catalog order.
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn header(&self) -> &CatalogHeader {
        &self.header
    }

    /// All top-level records in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Top-level records of one type, in catalog order.
    pub fn entries_of(&self, kind: AssetType) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| e.asset_type() == kind)
    }

    /// Canvas size declared by the first image stack, or the default square.
    pub fn canvas_size(&self) -> (u32, u32) {
        let dim = |v: Option<f64>| v.filter(|v| *v > 0.0).map_or(DEFAULT_CANVAS, |v| v as u32);
        self.entries_of(AssetType::IconImageStack)
            .next()
            .map_or((DEFAULT_CANVAS, DEFAULT_CANVAS), |stack| {
                (dim(stack.canvas_width), dim(stack.canvas_height))
            })
    }

    /// Best guess at the icon's own name: the first image stack's name, else
    /// the first pre-rendered image's name, else the first path segment of
    /// the first named record.
    pub fn icon_name(&self) -> Option<&str> {
        self.entries_of(AssetType::IconImageStack)
            .chain(self.entries_of(AssetType::IconImage))
            .find_map(CatalogEntry::name)
            .or_else(|| {
                self.entries
                    .iter()
                    .find_map(CatalogEntry::name)
                    .and_then(|n| n.split('/').next())
            })
    }
}
