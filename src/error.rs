//! Error and diagnostic types.
//!
//! Only a structurally invalid catalog aborts a conversion. Everything else
//! (missing references, provisional enum mappings, assets that cannot be
//! inlined) is recorded as a [`Diagnostic`] and returned next to the partial
//! result.

use std::fmt;

use serde::Serialize;

/// Convenience result type for fallible conversion entry points.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Fatal errors raised while loading a catalog.
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    /// The input is not valid JSON.
    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The top-level JSON value is not an array of records.
    #[error("catalog must be a JSON array, found {0}")]
    NotAnArray(&'static str),

    /// The catalog array is empty, so there is no header record.
    #[error("catalog has no header record")]
    MissingHeader,

    /// The first record is not an object.
    #[error("catalog header must be an object, found {0}")]
    InvalidHeader(&'static str),
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Category of a non-fatal conversion finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A fill, gradient, color, layer or asset name has no match. The
    /// referencing element is omitted.
    UnresolvedReference,
    /// An enum mapping (e.g. shadow style) has no verified ground truth and
    /// a best guess was used.
    UnconfirmedMapping,
    /// An asset kind the scene compiler cannot inline. The layer is skipped.
    UnsupportedAsset,
    /// A record field has a value of the wrong type. The field is ignored
    /// and the rest of the record is kept.
    MalformedField,
    /// The legacy single-image fallback was taken.
    DegradedConversion,
}

impl DiagnosticKind {
    /// Whether the finding is merely informational.
    pub fn is_notice(self) -> bool {
        matches!(self, Self::DegradedConversion)
    }
}

/// A single non-fatal finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The catalog identity or image name the finding is about.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.kind.is_notice() { "note" } else { "warning" };
        write!(f, "{level}: {}: {}", self.subject, self.message)
    }
}

/// Ordered collection of diagnostics gathered during one run.
///
/// Every pushed entry is mirrored as a `tracing` event so hosts that
/// install a subscriber see findings as they happen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finding.
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        if kind.is_notice() {
            tracing::info!(kind = ?kind, subject = %diagnostic.subject, "{}", diagnostic.message);
        } else {
            tracing::warn!(kind = ?kind, subject = %diagnostic.subject, "{}", diagnostic.message);
        }
        self.entries.push(diagnostic);
    }

    /// Appends every entry of `other`, preserving order. Entries are not
    /// re-logged.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Iterates over findings of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    /// Returns true if any finding of `kind` was recorded.
    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.of_kind(kind).next().is_some()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
