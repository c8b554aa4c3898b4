//! Named groupings of field definitions.
//!
//! A collection holds member field names in insertion order. It never owns
//! definitions itself; the registry resolves members to the live definitions
//! in its primary store.

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::FieldSource;

/// A named, ordered set of field references (e.g. "DICOM cardiology fields").
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCollection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: FieldSource,
    fields: IndexSet<String>,
}

impl FieldCollection {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<FieldSource>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            source: source.into(),
            fields: IndexSet::new(),
        }
    }

    /// Number of member fields.
    pub fn total_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, field_name: &str) -> bool {
        self.fields.contains(field_name)
    }

    /// Member names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Add a member. Returns false if it was already present.
    pub(crate) fn insert(&mut self, field_name: &str) -> bool {
        self.fields.insert(field_name.to_string())
    }

    /// Remove a member, keeping the order of the rest. Returns false if absent.
    pub(crate) fn remove(&mut self, field_name: &str) -> bool {
        self.fields.shift_remove(field_name)
    }
}

/// On-disk shape; `total_fields` is derived and ignored on load.
#[derive(Serialize, Deserialize)]
struct CollectionRepr {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    source: FieldSource,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    total_fields: usize,
}

impl Serialize for FieldCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CollectionRepr {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
            fields: self.fields.iter().cloned().collect(),
            total_fields: self.fields.len(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = CollectionRepr::deserialize(deserializer)?;
        Ok(Self {
            id: repr.id,
            name: repr.name,
            description: repr.description,
            source: repr.source,
            fields: repr.fields.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_keeps_insertion_order() {
        let mut c = FieldCollection::new("dicom_cardio", "Cardiology", "ECG fields", "dicom");
        assert!(c.insert("waveform_data"));
        assert!(c.insert("heart_rate"));
        assert!(!c.insert("waveform_data"));
        assert_eq!(c.total_fields(), 2);

        assert!(c.insert("qt_interval"));
        assert!(c.remove("heart_rate"));
        assert!(!c.remove("heart_rate"));
        let names: Vec<&str> = c.field_names().collect();
        assert_eq!(names, vec!["waveform_data", "qt_interval"]);
    }

    #[test]
    fn json_round_trip_reports_total() {
        let mut c = FieldCollection::new("exif_core", "EXIF core", "", "exif");
        c.insert("iso_speed");
        c.insert("f_number");

        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["total_fields"], 2);
        assert_eq!(v["source"], "exif");

        let parsed: FieldCollection = serde_json::from_value(v).unwrap();
        assert_eq!(parsed, c);
    }
}
