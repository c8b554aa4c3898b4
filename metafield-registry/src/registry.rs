//! FieldRegistry: the main API surface for field definitions and collections.
//!
//! Owns the primary field store (insertion-ordered, keyed by name), the
//! collections, and the derived secondary indexes. Every mutation goes
//! through this type so the indexes can never drift from the store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::{json, Value};
use similar::TextDiff;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::collection::FieldCollection;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::events::{EventBus, EventPayload, RegistryEvent, RegistryListener};
use crate::index::IndexManager;
use crate::persistence::{self, RegistrySnapshot};
use crate::types::{DisplayLevel, FieldDefinition, FieldSource, FieldType, Tier};
use crate::validation::{ValidationEngine, ValidationResult};

/// Query result: field name → definition, ordered by name.
pub type FieldView<'a> = BTreeMap<&'a str, &'a FieldDefinition>;

/// Default cap for [`FieldRegistry::search_fields`].
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Default cap for [`FieldRegistry::find_similar_fields`].
pub const DEFAULT_MAX_SIMILAR: usize = 5;

/// Options for [`FieldRegistry::register_field`].
#[derive(Debug, Clone)]
pub struct RegisterOptions {
    /// Collection to add the field to. Must already exist.
    pub collection: Option<String>,
    /// Check name, description and example value before storing.
    pub validate: bool,
    /// Replace an existing field with the same name.
    pub overwrite: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            collection: None,
            validate: true,
            overwrite: false,
        }
    }
}

impl RegisterOptions {
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// Field definitions and collections registered when a registry is built.
///
/// Producers (per-format field tables) build one of these to declare the
/// fields they can emit. Defaults never replace an existing definition with
/// the same name or field id.
pub struct FieldDefaults {
    fields: Vec<FieldDefinition>,
    collections: Vec<(FieldCollection, Vec<String>)>,
}

impl FieldDefaults {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            collections: Vec::new(),
        }
    }

    /// Add a default field definition.
    pub fn field(mut self, def: FieldDefinition) -> Self {
        self.fields.push(def);
        self
    }

    /// Add a default collection with its member field names.
    pub fn collection<I, S>(mut self, collection: FieldCollection, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections
            .push((collection, members.into_iter().map(Into::into).collect()));
        self
    }

    /// Access the field definitions.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `FieldRegistry`. Created by `FieldRegistry::builder()` or
/// `FieldRegistry::open()`.
pub struct FieldRegistryBuilder {
    config: RegistryConfig,
    defaults: Option<FieldDefaults>,
}

impl FieldRegistryBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = Some(dir.into());
        self
    }

    /// Provide default field definitions and collections.
    pub fn with_defaults(mut self, defaults: FieldDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Build the registry: load per-field files if configured, then seed defaults.
    pub fn build(self) -> Result<FieldRegistry> {
        let mut registry = FieldRegistry::with_config(self.config);

        if registry.config.load_field_files_on_build && registry.config.storage_dir.is_some() {
            registry.load_field_files()?;
        }

        if let Some(defaults) = self.defaults {
            registry.seed_defaults(defaults)?;
        }

        debug!(
            fields = registry.len(),
            collections = registry.collections.len(),
            "field registry built"
        );

        Ok(registry)
    }
}

/// In-memory catalog of field definitions with secondary indexes, collections,
/// validation, persistence and lifecycle events.
#[derive(Debug)]
pub struct FieldRegistry {
    config: RegistryConfig,
    fields: IndexMap<String, FieldDefinition>,
    id_index: HashMap<Ulid, String>,
    collections: IndexMap<String, FieldCollection>,
    indexes: IndexManager,
    engine: ValidationEngine,
    events: EventBus,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRegistry {
    /// An empty, purely in-memory registry.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// An empty registry with the given configuration. Nothing is loaded.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            fields: IndexMap::new(),
            id_index: HashMap::new(),
            collections: IndexMap::new(),
            indexes: IndexManager::new(),
            engine: ValidationEngine::new(),
            events: EventBus::new(),
        }
    }

    pub fn builder() -> FieldRegistryBuilder {
        FieldRegistryBuilder {
            config: RegistryConfig::default(),
            defaults: None,
        }
    }

    /// Builder for a registry persisting under `storage_dir`.
    ///
    /// ```rust,ignore
    /// let registry = FieldRegistry::open("/var/lib/metafields")
    ///     .with_defaults(exif_defaults())
    ///     .build()?;
    /// ```
    pub fn open(storage_dir: impl Into<PathBuf>) -> FieldRegistryBuilder {
        Self::builder().storage_dir(storage_dir)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    // --- Registration ---

    /// Register a field with default options (validate, no overwrite).
    pub fn register(&mut self, field: FieldDefinition) -> Result<bool> {
        self.register_field(field, &RegisterOptions::default())
    }

    /// Register (or with `overwrite`, replace) a field definition.
    pub fn register_field(&mut self, field: FieldDefinition, opts: &RegisterOptions) -> Result<bool> {
        self.register_with(field, opts, true)
    }

    /// Register many fields in order.
    ///
    /// With `fail_on_error` the first failure is returned immediately (fields
    /// registered before it stay registered). Otherwise failures are recorded
    /// as `false` and processing continues.
    pub fn register_field_batch(
        &mut self,
        fields: impl IntoIterator<Item = FieldDefinition>,
        opts: &RegisterOptions,
        fail_on_error: bool,
    ) -> Result<IndexMap<String, bool>> {
        let mut results = IndexMap::new();
        for field in fields {
            let name = field.name.clone();
            match self.register_field(field, opts) {
                Ok(ok) => {
                    results.insert(name, ok);
                }
                Err(e) if fail_on_error => return Err(e),
                Err(e) => {
                    warn!(name = %name, %e, "batch registration failed");
                    results.insert(name, false);
                }
            }
        }
        Ok(results)
    }

    /// Remove a field everywhere. Returns false if it was not registered.
    pub fn unregister_field(&mut self, name: &str) -> bool {
        let Some(field) = self.fields.shift_remove(name) else {
            return false;
        };
        self.indexes.remove(&field);
        self.id_index.remove(&field.field_id);
        for collection in self.collections.values_mut() {
            collection.remove(name);
        }

        if let Some(dir) = self.incremental_dir() {
            if let Err(e) = persistence::delete_field_file(dir, name) {
                warn!(name = %name, %e, "failed to delete field file");
            }
        }

        debug!(name = %name, "unregistered field");

        let mut payload = EventPayload::new();
        payload.insert("field_name".into(), json!(name));
        payload.insert("field_id".into(), json!(field.field_id.to_string()));
        payload.insert("version".into(), json!(field.version));
        self.events.emit(RegistryEvent::FieldUnregistered, &payload);

        true
    }

    // --- Lookups ---

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn get_field_by_id(&self, field_id: &Ulid) -> Option<&FieldDefinition> {
        self.id_index.get(field_id).and_then(|name| self.fields.get(name))
    }

    /// First field (by name) with this standard name, optionally limited to a source.
    pub fn get_field_by_standard_name(
        &self,
        standard_name: &str,
        source: Option<&FieldSource>,
    ) -> Option<&FieldDefinition> {
        self.indexes
            .names_by_standard_name(standard_name)
            .filter_map(|name| self.fields.get(name))
            .find(|f| source.is_none_or(|s| f.source == *s))
    }

    // --- Queries ---

    pub fn get_all_fields(&self) -> FieldView<'_> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    /// All field names in store order.
    pub fn get_all_field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn get_fields_by_source(&self, source: &FieldSource) -> FieldView<'_> {
        self.view(self.indexes.names_by_source(source))
    }

    pub fn get_fields_by_type(&self, field_type: FieldType) -> FieldView<'_> {
        self.view(self.indexes.names_by_type(field_type))
    }

    /// Every field visible at `tier`: all fields whose tier is `<= tier`.
    pub fn get_fields_by_tier(&self, tier: Tier) -> FieldView<'_> {
        self.view(self.indexes.names_up_to_tier(tier))
    }

    /// Every field shown at `display`: all fields whose level is `<= display`.
    pub fn get_fields_for_display(&self, display: DisplayLevel) -> FieldView<'_> {
        self.view(self.indexes.names_up_to_display(display))
    }

    /// Fields extractable from files with the given extension id.
    pub fn get_compatible_fields(&self, extension: &str) -> FieldView<'_> {
        self.view(self.indexes.names_by_extension(extension))
    }

    pub fn get_deprecated_fields(&self) -> FieldView<'_> {
        self.filter(|f| f.is_deprecated)
    }

    pub fn get_required_fields(&self) -> FieldView<'_> {
        self.filter(|f| f.is_required)
    }

    /// Case-insensitive substring search, in store order.
    ///
    /// Matches `name`, `description` and `standard_name`; with `search_metadata`
    /// also `search_keywords`, `category_tags` and `alias_names`.
    pub fn search_fields(
        &self,
        query: &str,
        search_metadata: bool,
        max_results: usize,
    ) -> Vec<&FieldDefinition> {
        let needle = query.to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&needle);
        self.fields
            .values()
            .filter(|f| {
                hit(&f.name)
                    || hit(f.description())
                    || hit(f.effective_standard_name())
                    || (search_metadata
                        && (f.metadata.search_keywords.iter().any(|s| hit(s))
                            || f.metadata.category_tags.iter().any(|s| hit(s))
                            || f.metadata.alias_names.iter().any(|s| hit(s))))
            })
            .take(max_results)
            .collect()
    }

    /// Resolve related, parent and child references of `name`. Dangling
    /// references are skipped; each field appears once.
    pub fn find_related_fields(&self, name: &str) -> Vec<&FieldDefinition> {
        let Some(field) = self.fields.get(name) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        field
            .referenced_fields()
            .filter(|r| seen.insert(*r))
            .filter_map(|r| self.fields.get(r))
            .collect()
    }

    /// Fields whose names are most similar to `name`, best first.
    ///
    /// Scores are a sequence-matcher ratio in `0.0..=1.0` over lowercase names.
    pub fn find_similar_fields(&self, name: &str, max_similar: usize) -> Vec<(&FieldDefinition, f64)> {
        if !self.fields.contains_key(name) {
            return Vec::new();
        }
        let target = name.to_lowercase();
        let mut scored: Vec<(&FieldDefinition, f64)> = self
            .fields
            .values()
            .filter(|f| f.name != name)
            .map(|f| (f, similarity(&target, &f.name.to_lowercase())))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(max_similar);
        scored
    }

    // --- Collections ---

    /// Create an empty collection. Fails if the id is taken.
    pub fn create_collection(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        source: impl Into<FieldSource>,
    ) -> Result<&FieldCollection> {
        if self.collections.contains_key(id) {
            return Err(RegistryError::CollectionAlreadyExists { id: id.to_string() });
        }
        let collection = FieldCollection::new(id, name, description, source);

        let mut payload = EventPayload::new();
        payload.insert("collection_id".into(), json!(id));
        payload.insert("name".into(), json!(name));
        payload.insert("source".into(), json!(collection.source.as_str()));

        self.collections.insert(id.to_string(), collection);
        debug!(id = %id, "created collection");
        self.events.emit(RegistryEvent::CollectionCreated, &payload);

        Ok(&self.collections[id])
    }

    pub fn get_collection(&self, id: &str) -> Option<&FieldCollection> {
        self.collections.get(id)
    }

    /// All collections in creation order.
    pub fn get_all_collections(&self) -> &IndexMap<String, FieldCollection> {
        &self.collections
    }

    /// Live definitions of a collection's members, in collection order.
    pub fn get_collection_fields(&self, id: &str) -> Option<Vec<&FieldDefinition>> {
        let collection = self.collections.get(id)?;
        Some(
            collection
                .field_names()
                .filter_map(|n| self.fields.get(n))
                .collect(),
        )
    }

    /// Add a registered field to a collection. Returns false if already a member.
    pub fn add_field_to_collection(&mut self, collection_id: &str, field_name: &str) -> Result<bool> {
        if !self.fields.contains_key(field_name) {
            return Err(RegistryError::FieldNotFound {
                name: field_name.to_string(),
            });
        }
        let collection = self.collection_mut(collection_id)?;
        Ok(collection.insert(field_name))
    }

    /// Remove a field from a collection. Returns false if it was not a member.
    pub fn remove_field_from_collection(
        &mut self,
        collection_id: &str,
        field_name: &str,
    ) -> Result<bool> {
        if !self.fields.contains_key(field_name) {
            return Err(RegistryError::FieldNotFound {
                name: field_name.to_string(),
            });
        }
        let collection = self.collection_mut(collection_id)?;
        Ok(collection.remove(field_name))
    }

    // --- Validation ---

    /// Validate a value for a named field. Unknown names yield an invalid result.
    pub fn validate_field_value(&self, name: &str, value: &Value) -> ValidationResult {
        match self.fields.get(name) {
            Some(field) => self.engine.validate_value(field, value),
            None => ValidationResult::invalid(format!("unknown field: {name}")),
        }
    }

    /// Validate a producer's raw name → value map, key by key.
    pub fn validate_values<'a, I>(&self, values: I) -> BTreeMap<String, ValidationResult>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        values
            .into_iter()
            .map(|(k, v)| (k.clone(), self.validate_field_value(k, v)))
            .collect()
    }

    /// Structural self-check of every stored definition.
    pub fn validate_all_fields(&self) -> BTreeMap<String, ValidationResult> {
        self.fields
            .iter()
            .map(|(name, f)| (name.clone(), self.engine.validate_definition(f)))
            .collect()
    }

    // --- Persistence ---

    /// Write the whole registry to `path`, or to the configured snapshot path.
    pub fn save_to_disk(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = self.resolve_snapshot_path(path)?;
        let snapshot = RegistrySnapshot {
            version: self.config.registry_version.clone(),
            saved_at: Utc::now(),
            fields: self.fields.clone(),
            collections: self.collections.clone(),
        };
        persistence::write_snapshot(&path, &snapshot)?;
        info!(?path, fields = self.fields.len(), "saved field registry");
        Ok(path)
    }

    /// Load a snapshot, re-registering every field (unvalidated, overwriting)
    /// and every collection. A missing file loads nothing and returns 0.
    ///
    /// A snapshot field whose `field_id` belongs to a different live field
    /// fails the whole load before the registry is touched.
    pub fn load_from_disk(&mut self, path: Option<&Path>) -> Result<usize> {
        let path = self.resolve_snapshot_path(path)?;
        let Some(snapshot) = persistence::read_snapshot(&path)? else {
            warn!(?path, "registry snapshot not found");
            return Ok(0);
        };

        self.check_snapshot_ids(&snapshot)?;

        let opts = RegisterOptions::default().validate(false).overwrite(true);
        let mut loaded = 0;
        for (_, field) in snapshot.fields {
            self.register_with(field, &opts, false)?;
            loaded += 1;
        }

        for (id, stored) in snapshot.collections {
            let mut collection = FieldCollection::new(
                id.as_str(),
                stored.name.as_str(),
                stored.description.as_str(),
                stored.source.clone(),
            );
            for member in stored.field_names().filter(|n| self.fields.contains_key(*n)) {
                collection.insert(member);
            }
            let created = self.collections.insert(id.clone(), collection).is_none();
            if created {
                let mut payload = EventPayload::new();
                payload.insert("collection_id".into(), json!(id));
                payload.insert("name".into(), json!(stored.name));
                payload.insert("source".into(), json!(stored.source.as_str()));
                self.events.emit(RegistryEvent::CollectionCreated, &payload);
            }
        }

        info!(?path, fields = loaded, "loaded field registry");
        Ok(loaded)
    }

    /// Load every per-field file from `<storage_dir>/fields/`, replacing
    /// same-named fields. Returns the number loaded (0 without storage).
    pub fn load_field_files(&mut self) -> Result<usize> {
        let Some(dir) = self.config.storage_dir.clone() else {
            return Ok(0);
        };
        let fields = persistence::read_field_files(&dir)?;
        let mut count = 0;
        for field in fields {
            if let Some(owner) = self.id_index.get(&field.field_id) {
                if *owner != field.name {
                    warn!(name = %field.name, %owner, "skipping field file with duplicate field_id");
                    continue;
                }
            }
            self.insert_field(field);
            count += 1;
        }
        debug!(?dir, fields = count, "loaded field files");
        Ok(count)
    }

    // --- Indexes ---

    /// Clear and recompute every secondary index from the primary store.
    pub fn rebuild_indexes(&mut self) {
        self.indexes.rebuild(self.fields.values());
        self.id_index = self
            .fields
            .values()
            .map(|f| (f.field_id, f.name.clone()))
            .collect();
        debug!(fields = self.fields.len(), "rebuilt indexes");
    }

    /// Read access to the secondary indexes.
    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    // --- Events ---

    /// Subscribe a listener to an event.
    pub fn on(&mut self, event: RegistryEvent, listener: Arc<dyn RegistryListener>) {
        self.events.on(event, listener);
    }

    /// Unsubscribe a listener previously passed to [`on`](Self::on).
    pub fn off(&mut self, event: RegistryEvent, listener: &Arc<dyn RegistryListener>) -> bool {
        self.events.off(event, listener)
    }

    // --- Internal ---

    /// Shared path of `register_field` and snapshot loading. `stamp` refreshes
    /// `updated_at`; loading keeps the persisted value.
    fn register_with(
        &mut self,
        mut field: FieldDefinition,
        opts: &RegisterOptions,
        stamp: bool,
    ) -> Result<bool> {
        if opts.validate {
            let check = self.engine.validate_definition(&field);
            if !check.is_valid {
                return Err(RegistryError::ValidationFailed {
                    field: field.name,
                    errors: check.errors,
                });
            }
        }

        if !opts.overwrite && self.fields.contains_key(&field.name) {
            return Err(RegistryError::FieldAlreadyExists { name: field.name });
        }

        if let Some(owner) = self.id_index.get(&field.field_id) {
            if *owner != field.name {
                return Err(RegistryError::ValidationFailed {
                    errors: vec![format!(
                        "field_id {} is already used by '{}'",
                        field.field_id, owner
                    )],
                    field: field.name,
                });
            }
        }

        if let Some(id) = &opts.collection {
            if !self.collections.contains_key(id) {
                return Err(RegistryError::CollectionNotFound { id: id.clone() });
            }
        }

        if field.standard_name.is_none() {
            field.standard_name = Some(field.name.clone());
        }
        if stamp {
            field.updated_at = Utc::now();
        }

        let name = field.name.clone();
        let new_version = field.version.clone();
        let old = self.insert_field(field);
        let old_version = old.as_ref().map(|f| f.version.clone());

        if let Some(id) = &opts.collection {
            if let Some(collection) = self.collections.get_mut(id) {
                collection.insert(&name);
            }
        }

        self.persist_field(&name);

        debug!(name = %name, replaced = old.is_some(), "registered field");

        let mut payload = EventPayload::new();
        payload.insert("field_name".into(), json!(name));
        payload.insert("old_version".into(), json!(old_version));
        payload.insert("new_version".into(), json!(new_version));
        self.events.emit(RegistryEvent::FieldRegistered, &payload);

        Ok(true)
    }

    /// Put `field` in the store, retiring any previous definition's index entries.
    fn insert_field(&mut self, field: FieldDefinition) -> Option<FieldDefinition> {
        if let Some(prev) = self.fields.get(&field.name) {
            self.indexes.remove(prev);
            self.id_index.remove(&prev.field_id);
        }
        self.indexes.insert(&field);
        self.id_index.insert(field.field_id, field.name.clone());
        self.fields.insert(field.name.clone(), field)
    }

    /// Replay the snapshot's id assignments against the live id index so a
    /// conflicting `field_id` fails the load before anything is mutated.
    fn check_snapshot_ids(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        let mut owners: HashMap<Ulid, &str> = self
            .id_index
            .iter()
            .map(|(id, name)| (*id, name.as_str()))
            .collect();
        let mut ids: HashMap<&str, Ulid> = self
            .fields
            .values()
            .map(|f| (f.name.as_str(), f.field_id))
            .collect();

        for field in snapshot.fields.values() {
            if let Some(prev) = ids.insert(field.name.as_str(), field.field_id) {
                owners.remove(&prev);
            }
            if let Some(owner) = owners.insert(field.field_id, field.name.as_str()) {
                if owner != field.name {
                    return Err(RegistryError::ValidationFailed {
                        field: field.name.clone(),
                        errors: vec![format!(
                            "field_id {} is already used by '{}'",
                            field.field_id, owner
                        )],
                    });
                }
            }
        }
        Ok(())
    }

    fn seed_defaults(&mut self, defaults: FieldDefaults) -> Result<()> {
        let opts = RegisterOptions::default();
        for def in defaults.fields {
            if self.fields.contains_key(&def.name) || self.id_index.contains_key(&def.field_id) {
                continue;
            }
            let name = def.name.clone();
            self.register_field(def, &opts)?;
            debug!(name = %name, "seeded default field");
        }
        for (collection, members) in defaults.collections {
            if !self.collections.contains_key(&collection.id) {
                let id = collection.id.clone();
                self.create_collection(&id, &collection.name, &collection.description, collection.source.clone())?;
            }
            for member in members {
                if self.fields.contains_key(&member) {
                    self.add_field_to_collection(&collection.id, &member)?;
                }
            }
        }
        Ok(())
    }

    fn view<'a>(&'a self, names: impl Iterator<Item = &'a str>) -> FieldView<'a> {
        names
            .filter_map(|n| self.fields.get_key_value(n))
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    fn filter(&self, pred: impl Fn(&FieldDefinition) -> bool) -> FieldView<'_> {
        self.fields
            .iter()
            .filter(|(_, f)| pred(f))
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    fn collection_mut(&mut self, id: &str) -> Result<&mut FieldCollection> {
        self.collections
            .get_mut(id)
            .ok_or_else(|| RegistryError::CollectionNotFound { id: id.to_string() })
    }

    fn incremental_dir(&self) -> Option<&Path> {
        if self.config.persist_incrementally {
            self.config.storage_dir.as_deref()
        } else {
            None
        }
    }

    /// Best-effort write of one field's file.
    fn persist_field(&self, name: &str) {
        let (Some(dir), Some(field)) = (self.incremental_dir(), self.fields.get(name)) else {
            return;
        };
        if let Err(e) = persistence::write_field_file(dir, field) {
            warn!(name = %name, %e, "failed to persist field file");
        }
    }

    fn resolve_snapshot_path(&self, path: Option<&Path>) -> Result<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(|| self.config.snapshot_path())
            .ok_or(RegistryError::NoStoragePath)
    }
}

/// Sequence-matcher similarity ratio of two strings, `0.0..=1.0`.
fn similarity(a: &str, b: &str) -> f64 {
    f64::from(TextDiff::from_chars(a, b).ratio())
}

/// A cloneable handle to one registry behind a single read-write lock.
///
/// The store and all indexes live under the same lock, so a reader never sees
/// a field without its index entries.
#[derive(Clone, Default)]
pub struct SharedFieldRegistry {
    inner: Arc<RwLock<FieldRegistry>>,
}

impl SharedFieldRegistry {
    pub fn new(registry: FieldRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, FieldRegistry> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, FieldRegistry> {
        self.inner.write()
    }

    pub fn register_field(&self, field: FieldDefinition, opts: &RegisterOptions) -> Result<bool> {
        self.inner.write().register_field(field, opts)
    }

    pub fn unregister_field(&self, name: &str) -> bool {
        self.inner.write().unregister_field(name)
    }

    pub fn validate_field_value(&self, name: &str, value: &Value) -> ValidationResult {
        self.inner.read().validate_field_value(name, value)
    }
}
