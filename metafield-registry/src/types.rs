//! Core field types for the registry.
//!
//! A [`FieldDefinition`] describes one named metadata attribute: its identity,
//! its taxonomy (type, tier, display level, source), the rules its values must
//! satisfy, and the documentation used for search. All types serialize to and
//! from JSON via serde; enums serialize as their lowercase string values.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::error::RegistryError;
use crate::validation::FieldValidationRule;

/// Implements `as_str`, `ALL`, `Display` and case-insensitive `FromStr` for a
/// unit-only taxonomy enum.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// The serialized string value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = RegistryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                match lower.as_str() {
                    $($s => Ok($ty::$variant),)+
                    _ => Err(RegistryError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// The kind of value a field holds. Drives type checking in validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Sequence,
    Binary,
    Object,
}

string_enum!(FieldType, "field type", {
    String => "string",
    Integer => "integer",
    Float => "float",
    Boolean => "boolean",
    Date => "date",
    Datetime => "datetime",
    Sequence => "sequence",
    Binary => "binary",
    Object => "object",
});

/// Access tier. Ordered: a caller at tier T sees every field tagged `<= T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Professional,
    Forensic,
    Enterprise,
}

string_enum!(Tier, "tier", {
    Free => "free",
    Professional => "professional",
    Forensic => "forensic",
    Enterprise => "enterprise",
});

/// UI verbosity at which a field is shown. Ordered like [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayLevel {
    Simple,
    Advanced,
    Raw,
}

string_enum!(DisplayLevel, "display level", {
    Simple => "simple",
    Advanced => "advanced",
    Raw => "raw",
});

/// The producer family that defined a field.
///
/// Well-known families get their own variant; anything else is kept verbatim
/// in `Other`. Parsing is case-insensitive for the known families, so
/// `"EXIF"` and `FieldSource::Exif` index identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldSource {
    Exif,
    Iptc,
    Xmp,
    Dicom,
    Fits,
    Audio,
    Video,
    Document,
    Email,
    Geospatial,
    Other(String),
}

impl FieldSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exif => "exif",
            Self::Iptc => "iptc",
            Self::Xmp => "xmp",
            Self::Dicom => "dicom",
            Self::Fits => "fits",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
            Self::Email => "email",
            Self::Geospatial => "geospatial",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for FieldSource {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "exif" => Self::Exif,
            "iptc" => Self::Iptc,
            "xmp" => Self::Xmp,
            "dicom" => Self::Dicom,
            "fits" => Self::Fits,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "document" => Self::Document,
            "email" => Self::Email,
            "geospatial" => Self::Geospatial,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for FieldSource {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<FieldSource> for String {
    fn from(source: FieldSource) -> Self {
        match source {
            FieldSource::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documentation and search metadata attached to a field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_value: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub category_tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub search_keywords: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub alias_names: BTreeSet<String>,
    /// Names of related fields. Not required to be symmetric.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub related_fields: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_field: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub child_fields: BTreeSet<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// A field definition: the complete schema for a single metadata attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_id: Ulid,
    /// Canonical cross-source alias. The registry fills this with `name` on
    /// registration when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_name: Option<String>,
    pub field_type: FieldType,
    pub tier: Tier,
    pub display: DisplayLevel,
    pub source: FieldSource,
    #[serde(default)]
    pub metadata: FieldMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rules: Vec<FieldValidationRule>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub compatible_extensions: BTreeSet<String>,
    #[serde(default = "default_version")]
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FieldDefinition {
    /// Create a definition with a fresh ULID, `FREE` tier and `SIMPLE` display.
    pub fn new(name: impl Into<String>, field_type: FieldType, source: impl Into<FieldSource>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            field_id: Ulid::new(),
            standard_name: None,
            field_type,
            tier: Tier::Free,
            display: DisplayLevel::Simple,
            source: source.into(),
            metadata: FieldMetadata::default(),
            validation_rules: Vec::new(),
            is_required: false,
            is_deprecated: false,
            compatible_extensions: BTreeSet::new(),
            version: default_version(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The standard name, falling back to `name`.
    pub fn effective_standard_name(&self) -> &str {
        self.standard_name.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    /// Names of every field this one points at: related, parent and children.
    pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.metadata
            .related_fields
            .iter()
            .map(String::as_str)
            .chain(self.metadata.parent_field.as_deref())
            .chain(self.metadata.child_fields.iter().map(String::as_str))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn with_standard_name(mut self, standard_name: impl Into<String>) -> Self {
        self.standard_name = Some(standard_name.into());
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_display(mut self, display: DisplayLevel) -> Self {
        self.display = display;
        self
    }

    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.metadata.example_value = Some(example.into());
        self
    }

    pub fn with_rule(mut self, rule: FieldValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    pub fn with_category(mut self, tag: impl Into<String>) -> Self {
        self.metadata.category_tags.insert(tag.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.metadata.search_keywords.insert(keyword.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.metadata.alias_names.insert(alias.into());
        self
    }

    pub fn with_related(mut self, name: impl Into<String>) -> Self {
        self.metadata.related_fields.insert(name.into());
        self
    }

    pub fn with_parent(mut self, name: impl Into<String>) -> Self {
        self.metadata.parent_field = Some(name.into());
        self
    }

    pub fn with_child(mut self, name: impl Into<String>) -> Self {
        self.metadata.child_fields.insert(name.into());
        self
    }

    /// Mark the field as extractable from files with this extension id.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.compatible_extensions.insert(extension.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.is_deprecated = true;
        self
    }
}
