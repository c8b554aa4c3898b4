//! JSON persistence for the registry.
//!
//! Two independent paths exist:
//!
//! ```text
//! <storage_dir>/
//!   registry.json     ← whole-registry snapshot (save_to_disk / load_from_disk)
//!   fields/           ← one <field_name>.json per field, written on register
//! ```
//!
//! The per-field directory is what the registry reloads on build; the snapshot
//! is an explicit export/import.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::collection::FieldCollection;
use crate::error::{RegistryError, Result};
use crate::types::FieldDefinition;

/// Subdirectory of the storage dir holding per-field files.
pub const FIELDS_DIR: &str = "fields";

/// A full registry snapshot as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrySnapshot {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
    #[serde(default)]
    pub collections: IndexMap<String, FieldCollection>,
}

/// Write a snapshot to `path`, creating parent directories.
pub fn write_snapshot(path: &Path, snapshot: &RegistrySnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_vec_pretty(snapshot)?;
    atomic_write(path, &json)?;
    debug!(
        ?path,
        fields = snapshot.fields.len(),
        collections = snapshot.collections.len(),
        "wrote registry snapshot"
    );
    Ok(())
}

/// Read a snapshot from `path`. Returns `Ok(None)` when the file does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<RegistrySnapshot>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| RegistryError::InvalidSnapshot {
            path: path.to_path_buf(),
            source,
        })
}

/// File path for a field's incremental JSON file.
///
/// Path separators, `%` and NUL are percent-encoded, so distinct names always
/// map to distinct files directly under `fields/`. Loading reads the name from
/// the file contents, never from the file name.
pub fn field_file_path(storage_dir: &Path, name: &str) -> PathBuf {
    let mut file_name = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' | '/' | '\\' | '\0' => {
                let _ = write!(file_name, "%{:02X}", c as u32);
            }
            c => file_name.push(c),
        }
    }
    storage_dir
        .join(FIELDS_DIR)
        .join(format!("{file_name}.json"))
}

/// Write one field to `<storage_dir>/fields/<name>.json`.
pub fn write_field_file(storage_dir: &Path, field: &FieldDefinition) -> Result<()> {
    fs::create_dir_all(storage_dir.join(FIELDS_DIR))?;
    let json = serde_json::to_vec_pretty(field)?;
    atomic_write(&field_file_path(storage_dir, &field.name), &json)
}

/// Delete a field's file. A missing file is not an error.
pub fn delete_field_file(storage_dir: &Path, name: &str) -> Result<()> {
    match fs::remove_file(field_file_path(storage_dir, name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Read every `*.json` field file under `<storage_dir>/fields/`.
///
/// Unparsable files are skipped with a warning. Results are sorted by name so
/// loading is deterministic.
pub fn read_field_files(storage_dir: &Path) -> Result<Vec<FieldDefinition>> {
    let dir = storage_dir.join(FIELDS_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut fields = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<FieldDefinition>(&content) {
            Ok(def) => fields.push(def),
            Err(e) => {
                warn!(?path, %e, "skipping invalid field file");
            }
        }
    }
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(fields)
}

/// Write to a temp file then rename for atomic persistence.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent dir"))?;
    let tmp = dir.join(format!(".tmp_{}", Ulid::new()));
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
