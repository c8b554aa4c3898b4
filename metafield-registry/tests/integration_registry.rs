//! End-to-end tests for the field registry: producer registration, consumer
//! queries, persistence and lifecycle events.

use std::sync::{Arc, Mutex};

use metafield_registry::{
    DisplayLevel, EventPayload, FieldCollection, FieldDefaults, FieldDefinition, FieldRegistry,
    FieldSource, FieldType, FieldValidationRule, ListenerError, RegisterOptions, RegistryError,
    RegistryEvent, RegistryListener, RuleKind, Tier, DEFAULT_MAX_RESULTS,
};
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn exif_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("iso_speed", FieldType::Integer, FieldSource::Exif)
            .with_description("ISO speed rating")
            .with_example(100)
            .with_extension("jpg")
            .with_extension("cr2")
            .with_keyword("sensitivity"),
        FieldDefinition::new("gps_latitude", FieldType::Float, FieldSource::Exif)
            .with_description("Latitude in decimal degrees")
            .with_tier(Tier::Professional)
            .with_display(DisplayLevel::Advanced)
            .with_rule(FieldValidationRule::new(RuleKind::Range {
                min: Some(-90.0),
                max: Some(90.0),
            }))
            .with_related("gps_longitude")
            .with_extension("jpg"),
        FieldDefinition::new("gps_longitude", FieldType::Float, FieldSource::Exif)
            .with_description("Longitude in decimal degrees")
            .with_tier(Tier::Professional)
            .with_display(DisplayLevel::Advanced)
            .with_related("gps_latitude")
            .with_extension("jpg"),
        FieldDefinition::new("maker_note", FieldType::Binary, FieldSource::Exif)
            .with_description("Vendor maker note blob")
            .with_tier(Tier::Forensic)
            .with_display(DisplayLevel::Raw)
            .with_extension("cr2"),
    ]
}

fn dicom_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("patient_id", FieldType::String, FieldSource::Dicom)
            .with_description("Patient identifier (0010,0020)")
            .with_standard_name("subject_id")
            .with_tier(Tier::Enterprise)
            .with_alias("PatientID")
            .with_category("medical")
            .required(),
        FieldDefinition::new("waveform_data", FieldType::Sequence, FieldSource::Dicom)
            .with_description("ECG waveform samples")
            .with_tier(Tier::Forensic)
            .with_rule(FieldValidationRule::new(RuleKind::MinItems { min: 1 })),
    ]
}

fn populated() -> FieldRegistry {
    let mut reg = FieldRegistry::new();
    reg.create_collection("dicom_cardio", "Cardiology", "Cardiac study fields", "dicom")
        .unwrap();
    reg.register_field_batch(exif_fields(), &RegisterOptions::default(), true)
        .unwrap();
    reg.register_field_batch(
        dicom_fields(),
        &RegisterOptions::default().in_collection("dicom_cardio"),
        true,
    )
    .unwrap();
    reg
}

#[test]
fn producer_batch_then_consumer_queries() {
    let reg = populated();
    assert_eq!(reg.len(), 6);

    let free: Vec<&str> = reg.get_fields_by_tier(Tier::Free).into_keys().collect();
    assert_eq!(free, vec!["iso_speed"]);
    assert_eq!(reg.get_fields_by_tier(Tier::Professional).len(), 3);
    assert_eq!(reg.get_fields_by_tier(Tier::Enterprise).len(), 6);

    assert_eq!(reg.get_fields_for_display(DisplayLevel::Simple).len(), 3);
    assert_eq!(reg.get_fields_for_display(DisplayLevel::Raw).len(), 6);

    let jpg: Vec<&str> = reg.get_compatible_fields("jpg").into_keys().collect();
    assert_eq!(jpg, vec!["gps_latitude", "gps_longitude", "iso_speed"]);
    assert!(reg.get_compatible_fields("mp3").is_empty());

    let subject = reg
        .get_field_by_standard_name("subject_id", Some(&FieldSource::Dicom))
        .unwrap();
    assert_eq!(subject.name, "patient_id");
}

#[test]
fn extracted_values_are_checked_per_key() {
    let reg = populated();
    let extracted: serde_json::Map<String, serde_json::Value> = serde_json::from_value(json!({
        "iso_speed": "800",
        "gps_latitude": 123.4,
        "waveform_data": [],
        "patient_id": null,
        "unknown_tag": 1
    }))
    .unwrap();

    let results = reg.validate_values(&extracted);
    assert!(results["iso_speed"].is_valid);
    assert!(!results["gps_latitude"].is_valid);
    assert!(!results["waveform_data"].is_valid);
    assert!(!results["patient_id"].is_valid);
    assert!(!results["unknown_tag"].is_valid);
}

#[test]
fn iso_speed_scenario() {
    let mut reg = FieldRegistry::new();
    reg.register(
        FieldDefinition::new("iso_speed", FieldType::Integer, "exif")
            .with_description("ISO")
            .with_tier(Tier::Free)
            .with_example(100),
    )
    .unwrap();

    assert!(reg.validate_field_value("iso_speed", &json!(100)).is_valid);
    let result = reg.validate_field_value("iso_speed", &json!("not-a-number"));
    assert!(!result.is_valid);
    assert!(!result.errors.is_empty());
    let tier: Tier = "FREE".parse().unwrap();
    assert!(reg.get_fields_by_tier(tier).contains_key("iso_speed"));
}

#[test]
fn dicom_cardio_collection_scenario() {
    let mut reg = FieldRegistry::new();
    reg.create_collection("dicom_cardio", "Cardiology", "...", "dicom")
        .unwrap();
    let waveform = dicom_fields().remove(1);
    let name = waveform.name.clone();
    reg.register_field(waveform, &RegisterOptions::default().in_collection("dicom_cardio"))
        .unwrap();
    assert_eq!(reg.get_collection("dicom_cardio").unwrap().total_fields(), 1);

    assert!(reg.unregister_field(&name));
    assert_eq!(reg.get_collection("dicom_cardio").unwrap().total_fields(), 0);
}

#[test]
fn search_and_discovery() {
    let reg = populated();

    let gps: Vec<&str> = reg
        .search_fields("GPS", true, DEFAULT_MAX_RESULTS)
        .into_iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(gps, vec!["gps_latitude", "gps_longitude"]);

    assert_eq!(reg.search_fields("patientid", true, DEFAULT_MAX_RESULTS).len(), 1);
    assert!(reg.search_fields("patientid", false, DEFAULT_MAX_RESULTS).is_empty());
    assert_eq!(reg.search_fields("degrees", false, 1).len(), 1);

    let related = reg.find_related_fields("gps_latitude");
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].name, "gps_longitude");

    let similar = reg.find_similar_fields("gps_latitude", 1);
    assert_eq!(similar[0].0.name, "gps_longitude");
}

#[test]
fn snapshot_round_trip_preserves_everything() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("snapshot.json");

    let original = populated();
    original.save_to_disk(Some(&path)).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], "1.0");
    assert!(raw["saved_at"].is_string());
    assert!(raw["fields"]["patient_id"].is_object());
    assert_eq!(raw["collections"]["dicom_cardio"]["total_fields"], 2);

    let mut restored = FieldRegistry::new();
    assert_eq!(restored.load_from_disk(Some(&path)).unwrap(), 6);

    assert_eq!(restored.get_all_fields(), original.get_all_fields());
    assert_eq!(restored.get_all_collections(), original.get_all_collections());
    assert_eq!(restored.indexes(), original.indexes());
}

#[test]
fn load_from_missing_file_returns_zero() {
    let tmp = TempDir::new().unwrap();
    let mut reg = FieldRegistry::new();
    assert_eq!(
        reg.load_from_disk(Some(&tmp.path().join("absent.json")))
            .unwrap(),
        0
    );
    assert!(matches!(
        reg.load_from_disk(None),
        Err(RegistryError::NoStoragePath)
    ));
}

#[test]
fn configured_storage_uses_default_snapshot_path() {
    let tmp = TempDir::new().unwrap();
    let mut reg = FieldRegistry::open(tmp.path())
        .with_defaults(
            FieldDefaults::new()
                .field(exif_fields().remove(0))
                .collection(
                    FieldCollection::new("exif_core", "EXIF core", "", "exif"),
                    ["iso_speed"],
                ),
        )
        .build()
        .unwrap();
    let written = reg.save_to_disk(None).unwrap();
    assert_eq!(written, tmp.path().join("registry.json"));
    assert!(tmp.path().join("fields/iso_speed.json").exists());

    reg.unregister_field("iso_speed");
    assert_eq!(reg.load_from_disk(None).unwrap(), 1);
    assert_eq!(reg.get_collection("exif_core").unwrap().total_fields(), 1);
}

#[test]
fn register_unregister_event_sequence() {
    let mut reg = FieldRegistry::new();
    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener: Arc<dyn RegistryListener> = Arc::new(
        move |event: RegistryEvent, payload: &EventPayload| -> Result<(), ListenerError> {
            let name = payload
                .get("field_name")
                .or_else(|| payload.get("collection_id"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            sink.lock().unwrap().push((event.to_string(), name));
            Ok(())
        },
    );
    for event in [
        RegistryEvent::FieldRegistered,
        RegistryEvent::FieldUnregistered,
        RegistryEvent::CollectionCreated,
    ] {
        reg.on(event, listener.clone());
    }

    reg.create_collection("c", "C", "", "exif").unwrap();
    let field = exif_fields().remove(0);
    reg.register(field).unwrap();
    reg.unregister_field("iso_speed");
    reg.unregister_field("iso_speed");

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("collection_created".to_string(), "c".to_string()),
            ("field_registered".to_string(), "iso_speed".to_string()),
            ("field_unregistered".to_string(), "iso_speed".to_string()),
        ]
    );
}

#[test_log::test]
fn panicking_listener_is_contained() {
    let mut reg = FieldRegistry::new();
    reg.on(
        RegistryEvent::FieldUnregistered,
        Arc::new(
            |_e: RegistryEvent, _p: &EventPayload| -> Result<(), ListenerError> {
                panic!("listener bug")
            },
        ),
    );
    reg.register(exif_fields().remove(0)).unwrap();
    assert!(reg.unregister_field("iso_speed"));
    assert!(reg.is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Register(usize, usize, usize),
    Unregister(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8, 0usize..4, 0usize..3).prop_map(|(n, t, d)| Op::Register(n, t, d)),
        (0usize..8).prop_map(Op::Unregister),
    ]
}

proptest! {
    #[test]
    fn rebuild_never_changes_query_results(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut reg = FieldRegistry::new();
        let overwrite = RegisterOptions::default().overwrite(true);
        for op in ops {
            match op {
                Op::Register(n, t, d) => {
                    let field = FieldDefinition::new(format!("field_{n}"), FieldType::ALL[n % FieldType::ALL.len()], if n % 2 == 0 { "exif" } else { "xmp" })
                        .with_description("generated")
                        .with_tier(Tier::ALL[t])
                        .with_display(DisplayLevel::ALL[d])
                        .with_extension(format!("ext{}", t % 2));
                    reg.register_field(field, &overwrite).unwrap();
                }
                Op::Unregister(n) => {
                    reg.unregister_field(&format!("field_{n}"));
                }
            }
        }

        let snapshot = |reg: &FieldRegistry| {
            let mut out = Vec::new();
            for tier in Tier::ALL {
                out.push(reg.get_fields_by_tier(*tier).into_keys().map(str::to_string).collect::<Vec<_>>());
            }
            for level in DisplayLevel::ALL {
                out.push(reg.get_fields_for_display(*level).into_keys().map(str::to_string).collect());
            }
            for ty in FieldType::ALL {
                out.push(reg.get_fields_by_type(*ty).into_keys().map(str::to_string).collect());
            }
            for source in [FieldSource::Exif, FieldSource::Xmp] {
                out.push(reg.get_fields_by_source(&source).into_keys().map(str::to_string).collect());
            }
            for ext in ["ext0", "ext1"] {
                out.push(reg.get_compatible_fields(ext).into_keys().map(str::to_string).collect());
            }
            out
        };

        let before = snapshot(&reg);
        let indexes_before = reg.indexes().clone();
        reg.rebuild_indexes();
        prop_assert_eq!(snapshot(&reg), before);
        prop_assert_eq!(reg.indexes(), &indexes_before);
    }
}
