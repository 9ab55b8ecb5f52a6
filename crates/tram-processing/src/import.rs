//! Direct report import from an uploaded JSON export.

use std::collections::HashSet;

use tram_core::models::Report;
use tram_core::{AppError, FieldErrors};
use tram_db::{AttackObjectStore, ReportStore};

use crate::export::ReportImport;

/// Validate the uploaded export and create the report with all its
/// sentences and mappings, or nothing at all.
#[tracing::instrument(skip(reports, attack_objects, bytes), fields(size = bytes.len()))]
pub async fn import_report(
    reports: &dyn ReportStore,
    attack_objects: &dyn AttackObjectStore,
    bytes: &[u8],
    creator: &str,
) -> Result<Report, AppError> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| {
        AppError::Validation(FieldErrors::single("file", format!("Invalid JSON: {}", e)))
    })?;

    let known_attack_ids: HashSet<String> = attack_objects
        .list_attack_objects()
        .await?
        .into_iter()
        .map(|o| o.attack_id)
        .collect();

    let import = ReportImport::parse(&value, &known_attack_ids).map_err(|errors| {
        tracing::debug!(errors = %errors, "Rejected report import");
        AppError::Validation(errors)
    })?;

    reports
        .create_report(import.into_new_report(creator, None))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tram_db::test_helpers::InMemoryStore;

    fn store() -> InMemoryStore {
        InMemoryStore::with_attack_objects(&[
            ("T1003", "OS Credential Dumping"),
            ("T1059", "Command and Scripting Interpreter"),
        ])
    }

    #[tokio::test]
    async fn test_import_creates_report_sentences_and_mappings() {
        let store = store();
        let body = br#"{
            "name": "Imported",
            "sentences": [
                {"text": "One.", "mappings": [{"attack_id": "T1003", "confidence": 90}]},
                {"text": "Two.", "mappings": [{"attack_id": "T1059"}, {"attack_id": "T1003"}]}
            ]
        }"#;

        let report = import_report(&store, &store, body, "alice").await.unwrap();
        assert_eq!(report.name, "Imported");
        assert_eq!(report.created_by, "alice");
        assert_eq!(store.sentence_count(), 2);
        assert_eq!(store.mapping_count(), 3);
    }

    #[tokio::test]
    async fn test_sentence_missing_text_creates_nothing() {
        let store = store();
        let body = br#"{
            "name": "Broken",
            "sentences": [
                {"text": "Fine.", "mappings": [{"attack_id": "T1003"}]},
                {"text": "Also fine."},
                {"order": 2}
            ]
        }"#;

        let err = import_report(&store, &store, body, "alice").await.unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.get("sentences[2].text").is_some());
        assert_eq!(store.report_count(), 0);
        assert_eq!(store.sentence_count(), 0);
        assert_eq!(store.mapping_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_file_error() {
        let store = store();
        let err = import_report(&store, &store, b"{not json", "alice")
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().get("file").is_some());
    }
}
