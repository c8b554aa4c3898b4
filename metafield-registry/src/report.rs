//! Aggregate statistics, the human-readable report and the JSON export.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::registry::FieldRegistry;
use crate::types::{DisplayLevel, FieldSource, FieldType, Tier};

/// Point-in-time counts over the registry. Always computed from the store.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RegistryStats {
    pub total_fields: usize,
    pub total_collections: usize,
    pub by_source: BTreeMap<FieldSource, usize>,
    pub by_tier: BTreeMap<Tier, usize>,
    pub by_type: BTreeMap<FieldType, usize>,
    pub by_display: BTreeMap<DisplayLevel, usize>,
    pub deprecated: usize,
    pub required: usize,
}

impl FieldRegistry {
    /// Compute fresh statistics.
    pub fn get_stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total_fields: self.len(),
            total_collections: self.get_all_collections().len(),
            ..RegistryStats::default()
        };
        for field in self.get_all_fields().values() {
            *stats.by_source.entry(field.source.clone()).or_default() += 1;
            *stats.by_tier.entry(field.tier).or_default() += 1;
            *stats.by_type.entry(field.field_type).or_default() += 1;
            *stats.by_display.entry(field.display).or_default() += 1;
            if field.is_deprecated {
                stats.deprecated += 1;
            }
            if field.is_required {
                stats.required += 1;
            }
        }
        stats
    }

    /// Plain-text breakdown by source, tier and display level, plus collections.
    pub fn generate_report(&self) -> String {
        let stats = self.get_stats();
        let mut out = String::new();

        let _ = writeln!(out, "Field Registry Report");
        let _ = writeln!(out, "=====================");
        let _ = writeln!(out, "Total fields: {}", stats.total_fields);
        let _ = writeln!(out, "Total collections: {}", stats.total_collections);
        let _ = writeln!(out, "Required: {}", stats.required);
        let _ = writeln!(out, "Deprecated: {}", stats.deprecated);

        let _ = writeln!(out, "\nFields by source:");
        for (source, count) in &stats.by_source {
            let _ = writeln!(out, "  {source}: {count}");
        }

        let _ = writeln!(out, "\nFields by tier:");
        for tier in Tier::ALL {
            let count = stats.by_tier.get(tier).copied().unwrap_or(0);
            let _ = writeln!(out, "  {tier}: {count}");
        }

        let _ = writeln!(out, "\nFields by display level:");
        for level in DisplayLevel::ALL {
            let count = stats.by_display.get(level).copied().unwrap_or(0);
            let _ = writeln!(out, "  {level}: {count}");
        }

        let _ = writeln!(out, "\nCollections:");
        if stats.total_collections == 0 {
            let _ = writeln!(out, "  (none)");
        }
        for collection in self.get_all_collections().values() {
            let _ = writeln!(
                out,
                "  {} ({}): {} fields [{}]",
                collection.name,
                collection.id,
                collection.total_fields(),
                collection.source
            );
        }

        out
    }

    /// Machine-readable export: a metadata envelope plus every field and collection.
    pub fn export_json(&self) -> Value {
        json!({
            "metadata": {
                "registry_version": self.config().registry_version,
                "exported_at": Utc::now().to_rfc3339(),
                "total_fields": self.len(),
                "total_collections": self.get_all_collections().len(),
            },
            "stats": self.get_stats(),
            "fields": self.get_all_fields(),
            "collections": self.get_all_collections(),
        })
    }
}
