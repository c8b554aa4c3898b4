//! Field registry for extracted metadata
//!
//! `metafield-registry` is an in-memory, indexed catalog of metadata field
//! definitions (camera ISO, DICOM patient id, email headers, ...) and named
//! collections of them. Extraction modules declare the fields they produce;
//! access-control and UI layers query by tier, display level and file
//! extension; extracted values are checked against each field's rules.
//!
//! # Architecture
//!
//! - **Primary store + derived indexes**: definitions keyed by name, with
//!   secondary indexes by source, type, tier, display, standard name and
//!   extension that can be rebuilt from the store at any time
//! - **Cumulative access queries**: tier and display queries return every
//!   field at or below the requested level
//! - **JSON on disk**: one `fields/<name>.json` per field written as fields
//!   change, plus an explicit whole-registry snapshot
//! - **Synchronous events**: listeners observe register/unregister/collection
//!   creation; a failing listener never breaks the caller
//!
//! ```rust,ignore
//! use metafield_registry::{FieldDefinition, FieldRegistry, FieldType, Tier};
//!
//! let mut registry = FieldRegistry::new();
//! registry.register(
//!     FieldDefinition::new("iso_speed", FieldType::Integer, "exif")
//!         .with_description("Sensor sensitivity")
//!         .with_example(100),
//! )?;
//! assert!(registry.validate_field_value("iso_speed", &100.into()).is_valid);
//! let visible = registry.get_fields_by_tier(Tier::Free);
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod index;
pub mod persistence;
pub mod registry;
pub mod report;
pub mod types;
pub mod validation;

pub use collection::FieldCollection;
pub use config::RegistryConfig;
pub use error::{ErrorKind, RegistryError, Result};
pub use events::{EventPayload, ListenerError, RegistryEvent, RegistryListener};
pub use index::IndexManager;
pub use persistence::RegistrySnapshot;
pub use registry::{
    FieldDefaults, FieldRegistry, FieldRegistryBuilder, FieldView, RegisterOptions,
    SharedFieldRegistry, DEFAULT_MAX_RESULTS, DEFAULT_MAX_SIMILAR,
};
pub use report::RegistryStats;
pub use types::{DisplayLevel, FieldDefinition, FieldMetadata, FieldSource, FieldType, Tier};
pub use validation::{FieldValidationRule, RuleKind, ValidationEngine, ValidationResult};
