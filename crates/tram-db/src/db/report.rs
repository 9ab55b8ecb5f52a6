use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres};
use tram_core::models::{
    Disposition, Mapping, MappingFilter, NewReport, Report, ReportAggregate, ReportSummary,
    Sentence, SentenceFilter, SentenceWithMappings,
};
use tram_core::{AppError, FieldErrors};

use crate::traits::ReportStore;

const REPORT_COLUMNS: &str =
    "r.id, r.name, r.document_id, r.text, r.ml_model, r.created_by, r.created_on, r.updated_on";
const SENTENCE_COLUMNS: &str = r#"s.id, s.report_id, s.document_id, s.text, s."order", s.disposition"#;
const MAPPING_SELECT: &str = r#"
    SELECT m.id, m.report_id, m.sentence_id, m.attack_object_id, ao.attack_id, m.confidence, m.provenance
    FROM mappings m
    JOIN attack_objects ao ON ao.id = m.attack_object_id
"#;

/// Reports, their sentences and sentence-to-technique mappings
#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn summary_query(filter: &str) -> String {
        format!(
            r#"
            SELECT {},
                COUNT(s.id) AS total_sentences,
                COUNT(s.id) FILTER (WHERE s.disposition = 'accept') AS accepted_sentences,
                COUNT(s.id) FILTER (WHERE s.disposition IS NULL) AS reviewing_sentences
            FROM reports r
            LEFT JOIN sentences s ON s.report_id = r.id
            {}
            GROUP BY r.id
            ORDER BY r.id ASC
            "#,
            REPORT_COLUMNS, filter
        )
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    #[tracing::instrument(skip(self, report), fields(db.table = "reports", db.operation = "insert", sentences = report.sentences.len()))]
    async fn create_report(&self, report: NewReport) -> Result<Report, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for report import")?;

        let mut wanted: Vec<String> = report
            .sentences
            .iter()
            .flat_map(|s| s.mappings.iter().map(|m| m.attack_id.clone()))
            .collect();
        wanted.sort();
        wanted.dedup();

        let attack_object_ids: HashMap<String, i64> = sqlx::query_as::<Postgres, (i64, String)>(
            "SELECT id, attack_id FROM attack_objects WHERE attack_id = ANY($1)",
        )
        .bind(&wanted)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, attack_id)| (attack_id, id))
        .collect();

        let mut errors = FieldErrors::new();
        for (i, sentence) in report.sentences.iter().enumerate() {
            for (j, mapping) in sentence.mappings.iter().enumerate() {
                if !attack_object_ids.contains_key(&mapping.attack_id) {
                    errors.add(
                        format!("sentences[{}].mappings[{}].attack_id", i, j),
                        format!("Unknown attack id \"{}\".", mapping.attack_id),
                    );
                }
            }
        }
        // Dropping the transaction rolls it back
        errors.into_result(())?;

        let created = sqlx::query_as::<Postgres, Report>(
            r#"
            INSERT INTO reports (name, document_id, text, ml_model, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, document_id, text, ml_model, created_by, created_on, updated_on
            "#,
        )
        .bind(&report.name)
        .bind(report.document_id)
        .bind(&report.text)
        .bind(&report.ml_model)
        .bind(&report.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let mut mapping_count = 0usize;
        for sentence in &report.sentences {
            let sentence_id = sqlx::query_scalar::<Postgres, i64>(
                r#"
                INSERT INTO sentences (report_id, document_id, text, "order", disposition)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(created.id)
            .bind(report.document_id)
            .bind(&sentence.text)
            .bind(sentence.order)
            .bind(sentence.disposition)
            .fetch_one(&mut *tx)
            .await?;

            for mapping in &sentence.mappings {
                let attack_object_id = attack_object_ids[&mapping.attack_id];
                sqlx::query(
                    r#"
                    INSERT INTO mappings (report_id, sentence_id, attack_object_id, confidence, provenance)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(created.id)
                .bind(sentence_id)
                .bind(attack_object_id)
                .bind(mapping.confidence)
                .bind(JsonValue::Object(mapping.provenance.clone()))
                .execute(&mut *tx)
                .await?;
                mapping_count += 1;
            }
        }

        tx.commit()
            .await
            .context("Failed to commit transaction for report import")?;

        tracing::info!(
            report_id = created.id,
            name = %created.name,
            sentences = report.sentences.len(),
            mappings = mapping_count,
            created_by = %created.created_by,
            "Report created"
        );

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "reports", db.operation = "select"))]
    async fn list_reports(&self) -> Result<Vec<ReportSummary>, AppError> {
        let reports = sqlx::query_as::<Postgres, ReportSummary>(&Self::summary_query(""))
            .fetch_all(&self.pool)
            .await?;

        Ok(reports)
    }

    #[tracing::instrument(skip(self), fields(db.table = "reports", db.operation = "select", db.record_id = %id))]
    async fn get_report(&self, id: i64) -> Result<Option<ReportSummary>, AppError> {
        let report =
            sqlx::query_as::<Postgres, ReportSummary>(&Self::summary_query("WHERE r.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(report)
    }

    #[tracing::instrument(skip(self), fields(db.table = "reports", db.operation = "select", db.record_id = %id))]
    async fn load_aggregate(&self, id: i64) -> Result<Option<ReportAggregate>, AppError> {
        let Some(report) = sqlx::query_as::<Postgres, Report>(&format!(
            "SELECT {} FROM reports r WHERE r.id = $1",
            REPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let sentences = sqlx::query_as::<Postgres, Sentence>(&format!(
            r#"SELECT {} FROM sentences s WHERE s.report_id = $1 ORDER BY s."order" ASC, s.id ASC"#,
            SENTENCE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mappings = sqlx::query_as::<Postgres, Mapping>(&format!(
            "{} WHERE m.report_id = $1 ORDER BY m.id ASC",
            MAPPING_SELECT
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_sentence: HashMap<i64, Vec<Mapping>> = HashMap::new();
        for mapping in mappings {
            by_sentence.entry(mapping.sentence_id).or_default().push(mapping);
        }

        let sentences = sentences
            .into_iter()
            .map(|sentence| SentenceWithMappings {
                mappings: by_sentence.remove(&sentence.id).unwrap_or_default(),
                sentence,
            })
            .collect();

        Ok(Some(ReportAggregate { report, sentences }))
    }

    #[tracing::instrument(skip(self), fields(db.table = "reports", db.operation = "delete", db.record_id = %id))]
    async fn delete_report(&self, id: i64) -> Result<bool, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for report deletion")?;

        // Sentences and mappings go with the report via ON DELETE CASCADE
        let deleted = sqlx::query_scalar::<Postgres, Option<i64>>(
            "DELETE FROM reports WHERE id = $1 RETURNING document_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(document_id) = deleted else {
            return Ok(false);
        };

        if let Some(document_id) = document_id {
            // Jobs go with the document via ON DELETE CASCADE
            sqlx::query("DELETE FROM documents WHERE id = $1")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit()
            .await
            .context("Failed to commit transaction for report deletion")?;

        tracing::info!(report_id = id, document_id = ?document_id, "Report deleted");

        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(db.table = "sentences", db.operation = "select"))]
    async fn find_sentences(&self, filter: &SentenceFilter) -> Result<Vec<Sentence>, AppError> {
        let sentences = sqlx::query_as::<Postgres, Sentence>(&format!(
            r#"
            SELECT {}
            FROM sentences s
            WHERE ($1::BIGINT IS NULL OR s.report_id = $1)
              AND ($2::TEXT IS NULL OR EXISTS (
                    SELECT 1 FROM mappings m
                    JOIN attack_objects ao ON ao.id = m.attack_object_id
                    WHERE m.sentence_id = s.id AND ao.attack_id = $2))
            ORDER BY s.report_id ASC, s."order" ASC, s.id ASC
            "#,
            SENTENCE_COLUMNS
        ))
        .bind(filter.report_id)
        .bind(filter.attack_id.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(sentences)
    }

    #[tracing::instrument(skip(self), fields(db.table = "sentences", db.operation = "select", db.record_id = %id))]
    async fn get_sentence(&self, id: i64) -> Result<Option<Sentence>, AppError> {
        let sentence = sqlx::query_as::<Postgres, Sentence>(&format!(
            "SELECT {} FROM sentences s WHERE s.id = $1",
            SENTENCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sentence)
    }

    #[tracing::instrument(skip(self), fields(db.table = "sentences", db.operation = "update", db.record_id = %id))]
    async fn update_sentence_disposition(
        &self,
        id: i64,
        disposition: Option<Disposition>,
    ) -> Result<Option<Sentence>, AppError> {
        let sentence = sqlx::query_as::<Postgres, Sentence>(
            r#"
            UPDATE sentences s SET disposition = $2
            WHERE s.id = $1
            RETURNING s.id, s.report_id, s.document_id, s.text, s."order", s.disposition
            "#,
        )
        .bind(id)
        .bind(disposition)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sentence)
    }

    #[tracing::instrument(skip(self), fields(db.table = "mappings", db.operation = "select"))]
    async fn find_mappings(&self, filter: &MappingFilter) -> Result<Vec<Mapping>, AppError> {
        let mappings = sqlx::query_as::<Postgres, Mapping>(&format!(
            "{} WHERE ($1::BIGINT IS NULL OR m.sentence_id = $1) ORDER BY m.id ASC",
            MAPPING_SELECT
        ))
        .bind(filter.sentence_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(mappings)
    }

    #[tracing::instrument(skip(self), fields(db.table = "mappings", db.operation = "select", db.record_id = %id))]
    async fn get_mapping(&self, id: i64) -> Result<Option<Mapping>, AppError> {
        let mapping = sqlx::query_as::<Postgres, Mapping>(&format!(
            "{} WHERE m.id = $1",
            MAPPING_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(mapping)
    }

    #[tracing::instrument(skip(self), fields(db.table = "mappings", db.operation = "insert"))]
    async fn create_mapping(
        &self,
        sentence_id: i64,
        attack_id: &str,
        confidence: Decimal,
    ) -> Result<Mapping, AppError> {
        let report_id = sqlx::query_scalar::<Postgres, i64>(
            "SELECT report_id FROM sentences WHERE id = $1",
        )
        .bind(sentence_id)
        .fetch_optional(&self.pool)
        .await?;

        let attack_object_id = sqlx::query_scalar::<Postgres, i64>(
            "SELECT id FROM attack_objects WHERE attack_id = $1",
        )
        .bind(attack_id)
        .fetch_optional(&self.pool)
        .await?;

        let mut errors = FieldErrors::new();
        if report_id.is_none() {
            errors.add("sentence", format!("Sentence {} does not exist.", sentence_id));
        }
        if attack_object_id.is_none() {
            errors.add("attack_id", format!("Unknown attack id \"{}\".", attack_id));
        }
        let (Some(report_id), Some(attack_object_id)) = (report_id, attack_object_id) else {
            return Err(AppError::Validation(errors));
        };

        let id = sqlx::query_scalar::<Postgres, i64>(
            r#"
            INSERT INTO mappings (report_id, sentence_id, attack_object_id, confidence, provenance)
            VALUES ($1, $2, $3, $4, '{}'::jsonb)
            RETURNING id
            "#,
        )
        .bind(report_id)
        .bind(sentence_id)
        .bind(attack_object_id)
        .bind(confidence)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(mapping_id = id, sentence_id, attack_id = %attack_id, "Mapping created");

        self.get_mapping(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Mapping {} vanished after insert", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "mappings", db.operation = "update", db.record_id = %id))]
    async fn update_mapping_confidence(
        &self,
        id: i64,
        confidence: Decimal,
    ) -> Result<Option<Mapping>, AppError> {
        let updated = sqlx::query("UPDATE mappings SET confidence = $2 WHERE id = $1")
            .bind(id)
            .bind(confidence)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_mapping(id).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "mappings", db.operation = "delete", db.record_id = %id))]
    async fn delete_mapping(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM mappings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
