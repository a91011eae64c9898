use serde_json::json;
use std::sync::Arc;
use stowage::*;

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[test]
fn insert_bumps_counter_only_when_asked() -> anyhow::Result<()> {
    let counter = MemoryCounter::new();
    let store = DocStore::new(MemoryDocumentClient::new(), "metrics")
        .with_counter(Arc::new(counter.clone()));

    store.insert_document(
        "runs",
        doc(json!({"run_id": 7, "state": "done"})),
        &["run_id"],
        true,
    )?;
    store.insert_document(
        "runs",
        doc(json!({"run_id": 8, "state": "done"})),
        &["run_id"],
        false,
    )?;

    assert_eq!(counter.value("runs"), 1);
    assert_eq!(store.count_documents("runs", &Document::new())?, 2);
    Ok(())
}

#[test]
fn insert_without_counter_is_fine() -> anyhow::Result<()> {
    let store = DocStore::new(MemoryDocumentClient::new(), "metrics");
    store.insert_document("runs", doc(json!({"run_id": 1})), &["run_id"], true)?;
    assert_eq!(store.count_documents("runs", &Document::new())?, 1);
    Ok(())
}

#[test]
fn find_filters_by_equality_and_projects_fields() -> anyhow::Result<()> {
    let store = DocStore::new(MemoryDocumentClient::new(), "metrics");
    store.insert_document(
        "jobs",
        doc(json!({"_id": "abc", "name": "etl", "state": "ok", "elapsed": 12})),
        &["name"],
        false,
    )?;
    store.insert_document(
        "jobs",
        doc(json!({"_id": "def", "name": "etl", "state": "failed", "elapsed": 3})),
        &["name"],
        false,
    )?;
    store.insert_document(
        "jobs",
        doc(json!({"_id": "ghi", "name": "other", "state": "ok", "elapsed": 1})),
        &["name"],
        false,
    )?;

    // The driver id never leaks out of a query.
    let all = store.find_documents("jobs", &doc(json!({"name": "etl"})), None)?;
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|d| !d.contains_key("_id")));

    let projected = store.find_documents(
        "jobs",
        &doc(json!({"name": "etl", "state": "ok"})),
        Some(&["elapsed"]),
    )?;
    assert_eq!(projected, vec![doc(json!({"elapsed": 12}))]);

    let none = store.find_documents("jobs", &doc(json!({"name": "missing"})), None)?;
    assert!(none.is_empty());
    Ok(())
}

#[test]
fn count_with_filter() -> anyhow::Result<()> {
    let store = DocStore::new(MemoryDocumentClient::new(), "metrics");
    for state in ["ok", "ok", "failed"] {
        store.insert_document("jobs", doc(json!({"state": state})), &[], false)?;
    }
    assert_eq!(store.count_documents("jobs", &doc(json!({"state": "ok"})))?, 2);
    assert_eq!(store.count_documents("jobs", &doc(json!({"state": "gone"})))?, 0);
    Ok(())
}

#[test]
fn index_creation_is_guarded_by_existence() -> anyhow::Result<()> {
    let client = MemoryDocumentClient::new();
    let store = DocStore::new(client.clone(), "metrics");

    assert!(store.create_index_if_absent("jobs", "run_id", true, true)?);
    assert!(!store.create_index_if_absent("jobs", "run_id", true, true)?);

    // A descending index on the same field has a different name.
    assert!(store.create_index_if_absent("jobs", "run_id", false, false)?);

    assert_eq!(
        client.index_names("jobs")?,
        vec!["run_id_1".to_string(), "run_id_-1".to_string()]
    );
    Ok(())
}
