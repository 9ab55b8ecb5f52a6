//! Report export and review integration tests.
//!
//! Run with: `cargo test -p tram-api --test reports_test`

mod helpers;

use helpers::{fixtures, setup_test_app};
use serde_json::{json, Value};

const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[tokio::test]
async fn test_json_export_filename_and_body() {
    let app = setup_test_app().await;
    let id = app.import_report(&fixtures::acme_report()).await;

    let response = app.get(&format!("/api/reports/{}/json", id)).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.header("content-disposition").to_str().unwrap(),
        "attachment; filename=\"Acme%20Report.json\""
    );
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/json"
    );

    let export: Value = response.json();
    assert_eq!(export["name"], "Acme Report");
    assert_eq!(export["ml_model"], "logreg");
    let sentences = export["sentences"].as_array().unwrap();
    assert_eq!(sentences.len(), 2);
    assert_eq!(sentences[0]["order"], 0);
    assert_eq!(sentences[0]["disposition"], "accept");
    assert_eq!(sentences[0]["mappings"][0]["attack_id"], "T1566");
    assert_eq!(sentences[0]["mappings"][0]["source"], "analyst");
    assert_eq!(sentences[1]["disposition"], Value::Null);
    assert_eq!(sentences[1]["mappings"][0]["attack_id"], "T1003");
    assert_eq!(sentences[1]["mappings"][1]["attack_id"], "T1059");
}

#[tokio::test]
async fn test_exported_json_imports_back() {
    let app = setup_test_app().await;
    let id = app.import_report(&fixtures::acme_report()).await;
    let first: Value = app.get(&format!("/api/reports/{}/json", id)).await.json();

    let copy_id = app.import_report(&first).await;
    assert_ne!(copy_id, id);
    let second: Value = app
        .get(&format!("/api/reports/{}/json", copy_id))
        .await
        .json();

    assert_eq!(first["name"], second["name"]);
    assert_eq!(first["text"], second["text"]);
    assert_eq!(first["sentences"], second["sentences"]);
}

#[tokio::test]
async fn test_docx_export() {
    let app = setup_test_app().await;
    let id = app.import_report(&fixtures::acme_report()).await;

    let response = app.get(&format!("/api/reports/{}/docx", id)).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("content-type").to_str().unwrap(), DOCX);
    assert_eq!(
        response.header("content-disposition").to_str().unwrap(),
        "attachment; filename=\"Acme%20Report.docx\""
    );
    assert!(response.as_bytes().starts_with(b"PK"));
}

#[tokio::test]
async fn test_export_unknown_report_is_not_found() {
    let app = setup_test_app().await;

    assert_eq!(app.get("/api/reports/99/json").await.status_code(), 404);
    assert_eq!(app.get("/api/reports/99/docx").await.status_code(), 404);
}

#[tokio::test]
async fn test_report_summary_and_delete() {
    let app = setup_test_app().await;
    let id = app.import_report(&fixtures::acme_report()).await;

    let summary: Value = app.get(&format!("/api/reports/{}", id)).await.json();
    assert_eq!(summary["name"], "Acme Report");
    assert_eq!(summary["created_by"], helpers::TEST_USER);
    assert_eq!(summary["total_sentences"], 2);
    assert_eq!(summary["accepted_sentences"], 1);
    assert_eq!(summary["reviewing_sentences"], 1);

    let response = app.delete(&format!("/api/reports/{}", id)).await;
    assert_eq!(response.status_code(), 204);
    assert_eq!(app.store.sentence_count(), 0);
    assert_eq!(app.store.mapping_count(), 0);
    assert_eq!(
        app.get(&format!("/api/reports/{}", id)).await.status_code(),
        404
    );
    assert_eq!(
        app.delete(&format!("/api/reports/{}", id)).await.status_code(),
        404
    );
}

#[tokio::test]
async fn test_sentence_review() {
    let app = setup_test_app().await;
    let id = app.import_report(&fixtures::acme_report()).await;

    let sentences: Vec<Value> = app
        .get(&format!("/api/sentences?report-id={}", id))
        .await
        .json();
    assert_eq!(sentences.len(), 2);
    let pending = sentences[1]["id"].as_i64().unwrap();

    let updated: Value = app
        .patch(&format!("/api/sentences/{}", pending))
        .json(&json!({"disposition": "reject"}))
        .await
        .json();
    assert_eq!(updated["disposition"], "reject");

    let summary: Value = app.get(&format!("/api/reports/{}", id)).await.json();
    assert_eq!(summary["reviewing_sentences"], 0);

    let by_technique: Vec<Value> = app
        .get(&format!("/api/sentences?report-id={}&attack-id=T1566", id))
        .await
        .json();
    assert_eq!(by_technique.len(), 1);
    assert_eq!(by_technique[0]["text"], "The actor sent spearphishing emails.");
}

#[tokio::test]
async fn test_mapping_edits() {
    let app = setup_test_app().await;
    let id = app.import_report(&fixtures::acme_report()).await;
    let sentences: Vec<Value> = app
        .get(&format!("/api/sentences?report-id={}", id))
        .await
        .json();
    let sentence_id = sentences[0]["id"].as_i64().unwrap();

    let response = app
        .post("/api/mappings")
        .json(&json!({"sentence": sentence_id, "attack_id": "T1059"}))
        .await;
    assert_eq!(response.status_code(), 201);
    let mapping: Value = response.json();
    assert_eq!(mapping["attack_id"], "T1059");
    assert_eq!(mapping["confidence"].as_f64(), Some(100.0));
    let mapping_id = mapping["id"].as_i64().unwrap();

    let listed: Vec<Value> = app
        .get(&format!("/api/mappings?sentence-id={}", sentence_id))
        .await
        .json();
    assert_eq!(listed.len(), 2);

    let response = app
        .post("/api/mappings")
        .json(&json!({"sentence": sentence_id, "attack_id": "T0000"}))
        .await;
    assert_eq!(response.status_code(), 400);
    assert!(response.json::<Value>()["fields"]["attack_id"].is_array());

    let response = app
        .patch(&format!("/api/mappings/{}", mapping_id))
        .json(&json!({"confidence": 150}))
        .await;
    assert_eq!(response.status_code(), 400);

    let updated: Value = app
        .patch(&format!("/api/mappings/{}", mapping_id))
        .json(&json!({"confidence": 42.5}))
        .await
        .json();
    assert_eq!(updated["confidence"].as_f64(), Some(42.5));

    assert_eq!(
        app.delete(&format!("/api/mappings/{}", mapping_id))
            .await
            .status_code(),
        204
    );
    assert_eq!(
        app.get(&format!("/api/mappings/{}", mapping_id))
            .await
            .status_code(),
        404
    );
}
