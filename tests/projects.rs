use std::fs;
use std::path::Path;

use serde_json::{Map, Value, json};
use tempfile::tempdir;

use tracelinks::{
    CoestDatasetCreator, DatasetCreator, SafaDatasetCreator, StructuredDatasetCreator,
    SupportedDatasetCreator, TraceDatasetSplitter, TraceError, generate_link_id,
};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn write_structured(root: &Path) {
    fs::create_dir_all(root.join("tables")).unwrap();
    fs::write(
        root.join("tables/requirements.csv"),
        "req_id,description\nREQ-1,Users authenticate with a password\nREQ-2,Sessions expire after idle time\nREQ-3,Admins audit logins\n",
    )
    .unwrap();
    fs::write(
        root.join("tables/design.json"),
        r#"{"artifacts": [
            {"id": 10, "content": "AuthService validates credentials"},
            {"id": 11, "content": "SessionManager tracks expiry"},
            {"id": 12, "content": "AuditLog records events"}
        ]}"#,
    )
    .unwrap();
    fs::write(
        root.join("tables/code.csv"),
        "id,content\nauth.rs,fn authenticate\nsession.rs,fn expire\n",
    )
    .unwrap();
    fs::write(
        root.join("tables/req2design.csv"),
        "source,target\nREQ-1,10\nREQ-2,11\nREQ-3,12\n",
    )
    .unwrap();
    fs::write(
        root.join("tables/design2code.json"),
        r#"[{"parent": "10", "child": "auth.rs"}, {"parent": 11, "child": "session.rs"}]"#,
    )
    .unwrap();
    fs::write(
        root.join("definition.json"),
        r#"{
            "artifacts": {
                "Requirement": {"path": "tables/requirements.csv", "cols": {"REQ_ID": "id", "Description": "content"}},
                "Design": {"path": "tables/design.json"},
                "Code": {"path": "tables/code.csv"}
            },
            "traces": {
                "req2design": {"source": "Requirement", "target": "Design", "path": "tables/req2design.csv"},
                "design2code": {"source": "Design", "target": "Code", "path": "tables/design2code.json",
                                "cols": {"parent": "source", "child": "target"}}
            }
        }"#,
    )
    .unwrap();
}

#[test]
fn structured_project_crosses_each_layer_pairing() {
    let temp = tempdir().unwrap();
    write_structured(temp.path());
    let dataset = StructuredDatasetCreator::new(temp.path()).create().unwrap();
    // 3x3 requirement/design links plus 3x2 design/code links.
    assert_eq!(dataset.len(), 15);
    assert_eq!(dataset.pos_link_ids().len(), 5);
    assert!(dataset.pos_link_ids().contains(&generate_link_id("REQ-2", "11")));
    assert!(dataset.pos_link_ids().contains(&generate_link_id("10", "auth.rs")));

    let (train, eval) = TraceDatasetSplitter::new(&dataset)
        .split(0.4, Some("source_random".parse().unwrap()))
        .unwrap();
    assert_eq!(train.len() + eval.len(), dataset.len());
}

#[test]
fn structured_project_via_registry_with_overrides() {
    let temp = tempdir().unwrap();
    write_structured(temp.path());
    fs::write(
        temp.path().join("tables/req2design.csv"),
        "source,target\nREQ-1,10\nREQ-9,11\n",
    )
    .unwrap();

    let strict = SupportedDatasetCreator::Structured
        .build(temp.path(), &Map::new())
        .unwrap();
    match strict.create() {
        Err(TraceError::DataIntegrity { id, .. }) => assert_eq!(id, "REQ-9"),
        other => panic!("expected data integrity error, got {other:?}"),
    }

    let lenient = SupportedDatasetCreator::Structured
        .build(
            temp.path(),
            &args(json!({"overrides": {"ALLOW_MISSING_SOURCE": true}})),
        )
        .unwrap();
    let dataset = lenient.create().unwrap();
    assert_eq!(dataset.pos_link_ids().len(), 3);
}

#[test]
fn unsupported_table_format_is_reported() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("reqs.yaml"), "- id: R1\n").unwrap();
    fs::write(
        temp.path().join("definition.json"),
        r#"{"artifacts": {"Req": {"path": "reqs.yaml"}}, "traces": {}}"#,
    )
    .unwrap();
    let err = StructuredDatasetCreator::new(temp.path()).create().unwrap_err();
    assert!(matches!(err, TraceError::UnsupportedFormat { extension, .. } if extension == "yaml"));
}

#[test]
fn safa_project_with_csv_and_json_tables() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(
        root.join("hazards.json"),
        r#"{"artifacts": [{"name": "HZ-1", "body": "Battery overheats"}, {"name": "HZ-2", "body": "Signal lost"}]}"#,
    )
    .unwrap();
    fs::write(
        root.join("requirements.csv"),
        "name,body\nSR-1,Cut power above 60C\nSR-2,Return home on signal loss\nSR-3,Log telemetry\n",
    )
    .unwrap();
    fs::write(
        root.join("hz2sr.csv"),
        "sourceName,targetName\nHZ-1,SR-1\nHZ-2,SR-2\n",
    )
    .unwrap();
    fs::write(
        root.join("tim.json"),
        r#"{
            "DataFiles": {"Hazard": {"File": "hazards.json"}, "Requirement": {"File": "requirements.csv"}},
            "HazardToRequirement": {"Source": "Hazard", "Target": "Requirement", "File": "hz2sr.csv"}
        }"#,
    )
    .unwrap();

    let dataset = SafaDatasetCreator::new(root).create().unwrap();
    assert_eq!(dataset.len(), 6);
    assert_eq!(dataset.pos_link_ids().len(), 2);
    let summary = dataset.summary();
    assert_eq!(summary.sources, 2);
    assert_eq!(summary.min_query, 3);

    let via_registry = SupportedDatasetCreator::Safa
        .build(root, &Map::new())
        .unwrap()
        .create()
        .unwrap();
    assert_eq!(via_registry.len(), dataset.len());
}

#[test]
fn coest_project_with_linked_targets_only() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("uc")).unwrap();
    fs::create_dir_all(root.join("cc")).unwrap();
    for (name, body) in [("UC01.txt", "Add patient record"), ("UC02.txt", "Print invoice")] {
        fs::write(root.join("uc").join(name), body).unwrap();
    }
    for (name, body) in [
        ("Patient.java", "class Patient"),
        ("Invoice.java", "class Invoice"),
        ("Util.java", "class Util"),
    ] {
        fs::write(root.join("cc").join(name), body).unwrap();
    }
    fs::write(root.join("oracle.txt"), "UC01.txt Patient.java\nUC02.txt Invoice.java\n").unwrap();

    let all = CoestDatasetCreator::new(root)
        .with_source_dir("uc")
        .with_target_dir("cc")
        .with_answer_set("oracle.txt")
        .create()
        .unwrap();
    assert_eq!(all.len(), 6);

    let linked_only = SupportedDatasetCreator::Coest
        .build(
            root,
            &args(json!({
                "sources": "uc",
                "targets": "cc",
                "answer_set": "oracle.txt",
                "use_linked_targets_only": true,
                "cleaning": ["separate_joined_words"]
            })),
        )
        .unwrap()
        .create()
        .unwrap();
    assert_eq!(linked_only.len(), 4);
    assert!(
        linked_only
            .links()
            .values()
            .all(|link| link.target.id != "Util.java")
    );
    let link = linked_only
        .link(generate_link_id("UC01.txt", "Patient.java"))
        .unwrap();
    assert_eq!(link.source.token, "Add patient record");
}
