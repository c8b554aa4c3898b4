//! Secondary indexes over the primary field store.
//!
//! Each index maps a taxonomy key to the set of field names carrying it.
//! Tier and display indexes are ordered maps so cumulative queries are a
//! range scan. Buckets are sets of names, so the result of indexing a field
//! set does not depend on insertion order, and empty buckets are dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use crate::types::{DisplayLevel, FieldDefinition, FieldSource, FieldType, Tier};

type Bucket = BTreeSet<String>;

/// The six secondary indexes. Derived state only; never a source of truth.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IndexManager {
    by_source: HashMap<FieldSource, Bucket>,
    by_type: HashMap<FieldType, Bucket>,
    by_tier: BTreeMap<Tier, Bucket>,
    by_display: BTreeMap<DisplayLevel, Bucket>,
    by_standard_name: HashMap<String, Bucket>,
    by_extension: HashMap<String, Bucket>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `field` under every key it carries.
    pub fn insert(&mut self, field: &FieldDefinition) {
        let name = &field.name;
        add(&mut self.by_source, field.source.clone(), name);
        add(&mut self.by_type, field.field_type, name);
        self.by_tier
            .entry(field.tier)
            .or_default()
            .insert(name.clone());
        self.by_display
            .entry(field.display)
            .or_default()
            .insert(name.clone());
        add(
            &mut self.by_standard_name,
            field.effective_standard_name().to_string(),
            name,
        );
        for ext in &field.compatible_extensions {
            add(&mut self.by_extension, ext.clone(), name);
        }
    }

    /// Purge `field` from every index, using its keys as they were indexed.
    pub fn remove(&mut self, field: &FieldDefinition) {
        let name = field.name.as_str();
        purge(&mut self.by_source, &field.source, name);
        purge(&mut self.by_type, &field.field_type, name);
        if let Some(bucket) = self.by_tier.get_mut(&field.tier) {
            bucket.remove(name);
            if bucket.is_empty() {
                self.by_tier.remove(&field.tier);
            }
        }
        if let Some(bucket) = self.by_display.get_mut(&field.display) {
            bucket.remove(name);
            if bucket.is_empty() {
                self.by_display.remove(&field.display);
            }
        }
        purge(
            &mut self.by_standard_name,
            field.effective_standard_name(),
            name,
        );
        for ext in &field.compatible_extensions {
            purge(&mut self.by_extension, ext.as_str(), name);
        }
    }

    /// Clear everything and re-index `fields` from scratch.
    pub fn rebuild<'a>(&mut self, fields: impl IntoIterator<Item = &'a FieldDefinition>) {
        self.clear();
        for field in fields {
            self.insert(field);
        }
    }

    pub fn clear(&mut self) {
        self.by_source.clear();
        self.by_type.clear();
        self.by_tier.clear();
        self.by_display.clear();
        self.by_standard_name.clear();
        self.by_extension.clear();
    }

    pub fn names_by_source(&self, source: &FieldSource) -> impl Iterator<Item = &str> {
        iter_bucket(self.by_source.get(source))
    }

    pub fn names_by_type(&self, field_type: FieldType) -> impl Iterator<Item = &str> {
        iter_bucket(self.by_type.get(&field_type))
    }

    /// Names of fields whose tier is at most `tier`.
    pub fn names_up_to_tier(&self, tier: Tier) -> impl Iterator<Item = &str> {
        self.by_tier
            .range(..=tier)
            .flat_map(|(_, bucket)| bucket.iter().map(String::as_str))
    }

    /// Names of fields whose display level is at most `display`.
    pub fn names_up_to_display(&self, display: DisplayLevel) -> impl Iterator<Item = &str> {
        self.by_display
            .range(..=display)
            .flat_map(|(_, bucket)| bucket.iter().map(String::as_str))
    }

    pub fn names_by_standard_name(&self, standard_name: &str) -> impl Iterator<Item = &str> {
        iter_bucket(self.by_standard_name.get(standard_name))
    }

    pub fn names_by_extension(&self, extension: &str) -> impl Iterator<Item = &str> {
        iter_bucket(self.by_extension.get(extension))
    }

    /// Number of distinct keys across all indexes.
    pub fn key_count(&self) -> usize {
        self.by_source.len()
            + self.by_type.len()
            + self.by_tier.len()
            + self.by_display.len()
            + self.by_standard_name.len()
            + self.by_extension.len()
    }
}

fn add<K: Hash + Eq>(index: &mut HashMap<K, Bucket>, key: K, name: &str) {
    index.entry(key).or_default().insert(name.to_string());
}

fn purge<K, Q>(index: &mut HashMap<K, Bucket>, key: &Q, name: &str)
where
    K: Hash + Eq + std::borrow::Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(name);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

fn iter_bucket(bucket: Option<&Bucket>) -> impl Iterator<Item = &str> {
    bucket.into_iter().flat_map(|b| b.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn field(name: &str, tier: Tier, ext: &str) -> FieldDefinition {
        FieldDefinition::new(name, FieldType::String, FieldSource::Exif)
            .with_tier(tier)
            .with_extension(ext)
    }

    #[test]
    fn cumulative_tier_range() {
        let mut idx = IndexManager::new();
        idx.insert(&field("a", Tier::Free, "jpg"));
        idx.insert(&field("b", Tier::Professional, "jpg"));
        idx.insert(&field("c", Tier::Enterprise, "tiff"));

        let free: Vec<_> = idx.names_up_to_tier(Tier::Free).collect();
        assert_eq!(free, vec!["a"]);
        let pro: Vec<_> = idx.names_up_to_tier(Tier::Professional).collect();
        assert_eq!(pro, vec!["a", "b"]);
        assert_eq!(idx.names_up_to_tier(Tier::Enterprise).count(), 3);
        assert_eq!(idx.names_by_extension("jpg").count(), 2);
    }

    #[test]
    fn remove_drops_empty_buckets() {
        let mut idx = IndexManager::new();
        let f = field("a", Tier::Forensic, "dcm");
        idx.insert(&f);
        assert!(idx.key_count() > 0);
        idx.remove(&f);
        assert_eq!(idx.key_count(), 0);
        assert_eq!(idx, IndexManager::new());
    }

    #[test]
    fn standard_name_defaults_to_name() {
        let mut idx = IndexManager::new();
        idx.insert(&field("make", Tier::Free, "jpg"));
        idx.insert(&field("camera_make", Tier::Free, "jpg").with_standard_name("make"));
        let names: Vec<_> = idx.names_by_standard_name("make").collect();
        assert_eq!(names, vec!["camera_make", "make"]);
    }

    proptest! {
        #[test]
        fn rebuild_matches_incremental_in_any_order(
            shapes in proptest::collection::vec((0usize..4, 0usize..3, 0usize..3), 1..20),
            seed in any::<u64>(),
        ) {
            let fields: Vec<FieldDefinition> = shapes
                .iter()
                .enumerate()
                .map(|(i, (tier, display, ext))| {
                    FieldDefinition::new(format!("f{i}"), FieldType::ALL[i % FieldType::ALL.len()], "exif")
                        .with_tier(Tier::ALL[*tier])
                        .with_display(DisplayLevel::ALL[*display])
                        .with_extension(format!("ext{ext}"))
                })
                .collect();

            let mut incremental = IndexManager::new();
            for f in &fields {
                incremental.insert(f);
            }

            let mut shuffled: Vec<&FieldDefinition> = fields.iter().collect();
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();
            let mut rebuilt = IndexManager::new();
            rebuilt.rebuild(shuffled);

            prop_assert_eq!(incremental, rebuilt);
        }
    }
}
