//! In-memory repositories for testing
//!
//! One lock guards all tables, so every multi-row write is atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use tram_core::models::{
    AttackObject, Disposition, Document, DocumentProcessingJob, JobStatus, JobStatusUpdate,
    Mapping, MappingFilter, NewDocument, NewReport, Report, ReportAggregate, ReportSummary,
    Sentence, SentenceFilter, SentenceWithMappings, TechniqueSentenceCount,
};
use tram_core::{AppError, FieldErrors};

use crate::traits::{AttackObjectStore, IngestionStore, ReportStore};

#[derive(Default)]
struct Tables {
    next_id: i64,
    attack_objects: BTreeMap<i64, AttackObject>,
    documents: BTreeMap<i64, Document>,
    jobs: BTreeMap<i64, DocumentProcessingJob>,
    reports: BTreeMap<i64, Report>,
    sentences: BTreeMap<i64, Sentence>,
    mappings: BTreeMap<i64, Mapping>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn attack_object_by_attack_id(&self, attack_id: &str) -> Option<&AttackObject> {
        self.attack_objects
            .values()
            .find(|o| o.attack_id == attack_id)
    }

    fn summary(&self, report: &Report) -> ReportSummary {
        let sentences: Vec<&Sentence> = self
            .sentences
            .values()
            .filter(|s| s.report_id == report.id)
            .collect();
        ReportSummary {
            report: report.clone(),
            total_sentences: sentences.len() as i64,
            accepted_sentences: sentences
                .iter()
                .filter(|s| s.disposition == Some(Disposition::Accept))
                .count() as i64,
            reviewing_sentences: sentences.iter().filter(|s| s.disposition.is_none()).count()
                as i64,
        }
    }

    fn sorted_sentences<'a>(&'a self, report_id: Option<i64>) -> Vec<&'a Sentence> {
        let mut sentences: Vec<&Sentence> = self
            .sentences
            .values()
            .filter(|s| report_id.map_or(true, |id| s.report_id == id))
            .collect();
        sentences.sort_by_key(|s| (s.report_id, s.order, s.id));
        sentences
    }
}

/// Thread-safe in-memory store implementing all repository traits
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `(attack_id, name)` techniques.
    pub fn with_attack_objects(objects: &[(&str, &str)]) -> Self {
        let store = Self::new();
        for (attack_id, name) in objects {
            store.add_attack_object(attack_id, name);
        }
        store
    }

    pub fn add_attack_object(&self, attack_id: &str, name: &str) -> AttackObject {
        let mut tables = self.lock();
        let id = tables.next_id();
        let now = Utc::now();
        let object = AttackObject {
            id,
            name: name.to_string(),
            stix_id: format!("attack-pattern--{:08}", id),
            attack_id: attack_id.to_string(),
            attack_url: Some(format!(
                "https://attack.mitre.org/techniques/{}",
                attack_id.replace('.', "/")
            )),
            attack_type: Some("technique".to_string()),
            matrix: Some("mitre-attack".to_string()),
            created_on: now,
            updated_on: now,
        };
        tables.attack_objects.insert(id, object.clone());
        object
    }

    /// Make every subsequent write fail as if the database were down.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn report_count(&self) -> usize {
        self.lock().reports.len()
    }

    pub fn sentence_count(&self) -> usize {
        self.lock().sentences.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.lock().mappings.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated database failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AttackObjectStore for InMemoryStore {
    async fn list_attack_objects(&self) -> Result<Vec<AttackObject>, AppError> {
        let mut objects: Vec<AttackObject> =
            self.lock().attack_objects.values().cloned().collect();
        objects.sort_by(|a, b| a.attack_id.cmp(&b.attack_id));
        Ok(objects)
    }

    async fn get_attack_object(&self, id: i64) -> Result<Option<AttackObject>, AppError> {
        Ok(self.lock().attack_objects.get(&id).cloned())
    }

    async fn sentence_counts(&self) -> Result<Vec<TechniqueSentenceCount>, AppError> {
        let tables = self.lock();
        let mut counts: Vec<TechniqueSentenceCount> = tables
            .attack_objects
            .values()
            .map(|object| {
                let mut sentence_ids: Vec<i64> = tables
                    .mappings
                    .values()
                    .filter(|m| m.attack_object_id == object.id)
                    .map(|m| m.sentence_id)
                    .collect();
                sentence_ids.sort_unstable();
                sentence_ids.dedup();
                TechniqueSentenceCount {
                    attack_id: object.attack_id.clone(),
                    name: object.name.clone(),
                    sentence_count: sentence_ids.len() as i64,
                }
            })
            .collect();
        counts.sort_by(|a, b| a.attack_id.cmp(&b.attack_id));
        Ok(counts)
    }
}

#[async_trait]
impl IngestionStore for InMemoryStore {
    async fn create_document_with_job(
        &self,
        document: NewDocument,
    ) -> Result<(Document, DocumentProcessingJob), AppError> {
        self.check_writable()?;
        let mut tables = self.lock();
        let now = Utc::now();

        let doc = Document {
            id: tables.next_id(),
            storage_key: document.storage_key,
            original_name: document.original_name,
            content_type: document.content_type,
            file_size: document.file_size,
            created_by: document.created_by.clone(),
            created_on: now,
        };
        let job = DocumentProcessingJob {
            id: tables.next_id(),
            document_id: doc.id,
            status: JobStatus::Pending,
            message: String::new(),
            created_by: document.created_by,
            created_on: now,
            updated_on: now,
        };

        tables.documents.insert(doc.id, doc.clone());
        tables.jobs.insert(job.id, job.clone());
        Ok((doc, job))
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>, AppError> {
        Ok(self.lock().documents.get(&id).cloned())
    }

    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool, AppError> {
        Ok(self
            .lock()
            .documents
            .values()
            .any(|d| d.storage_key == storage_key))
    }

    async fn get_job(&self, id: i64) -> Result<Option<DocumentProcessingJob>, AppError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<(DocumentProcessingJob, Document)>, AppError> {
        let tables = self.lock();
        Ok(tables
            .jobs
            .values()
            .filter_map(|job| {
                let doc = tables.documents.get(&job.document_id)?.clone();
                Some((job.clone(), doc))
            })
            .collect())
    }

    async fn update_job_status(
        &self,
        id: i64,
        update: JobStatusUpdate,
    ) -> Result<DocumentProcessingJob, AppError> {
        self.check_writable()?;
        let mut tables = self.lock();
        let job = tables
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        if !job.status.can_transition_to(update.status) {
            return Err(AppError::Validation(FieldErrors::single(
                "status",
                format!("Cannot move job from {} to {}", job.status, update.status),
            )));
        }

        job.status = update.status;
        if let Some(message) = update.message {
            job.message = message;
        }
        job.updated_on = Utc::now();
        Ok(job.clone())
    }

    async fn delete_job(&self, id: i64) -> Result<bool, AppError> {
        self.check_writable()?;
        let mut tables = self.lock();
        let Some(job) = tables.jobs.remove(&id) else {
            return Ok(false);
        };

        let referenced = tables
            .reports
            .values()
            .any(|r| r.document_id == Some(job.document_id))
            || tables.jobs.values().any(|j| j.document_id == job.document_id);
        if !referenced {
            tables.documents.remove(&job.document_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn create_report(&self, report: NewReport) -> Result<Report, AppError> {
        self.check_writable()?;
        let mut tables = self.lock();

        let mut errors = FieldErrors::new();
        let mut attack_object_ids: HashMap<String, i64> = HashMap::new();
        for (i, sentence) in report.sentences.iter().enumerate() {
            for (j, mapping) in sentence.mappings.iter().enumerate() {
                match tables.attack_object_by_attack_id(&mapping.attack_id) {
                    Some(object) => {
                        attack_object_ids.insert(mapping.attack_id.clone(), object.id);
                    }
                    None => errors.add(
                        format!("sentences[{}].mappings[{}].attack_id", i, j),
                        format!("Unknown attack id \"{}\".", mapping.attack_id),
                    ),
                }
            }
        }
        errors.into_result(())?;

        let now = Utc::now();
        let created = Report {
            id: tables.next_id(),
            name: report.name,
            document_id: report.document_id,
            text: report.text,
            ml_model: report.ml_model,
            created_by: report.created_by,
            created_on: now,
            updated_on: now,
        };
        tables.reports.insert(created.id, created.clone());

        for sentence in report.sentences {
            let sentence_id = tables.next_id();
            tables.sentences.insert(
                sentence_id,
                Sentence {
                    id: sentence_id,
                    report_id: created.id,
                    document_id: report.document_id,
                    text: sentence.text,
                    order: sentence.order,
                    disposition: sentence.disposition,
                },
            );
            for mapping in sentence.mappings {
                let mapping_id = tables.next_id();
                let attack_object_id = attack_object_ids
                    .get(&mapping.attack_id)
                    .copied()
                    .unwrap_or_default();
                tables.mappings.insert(
                    mapping_id,
                    Mapping {
                        id: mapping_id,
                        report_id: created.id,
                        sentence_id,
                        attack_object_id,
                        attack_id: mapping.attack_id,
                        confidence: mapping.confidence,
                        provenance: JsonValue::Object(mapping.provenance),
                    },
                );
            }
        }

        Ok(created)
    }

    async fn list_reports(&self) -> Result<Vec<ReportSummary>, AppError> {
        let tables = self.lock();
        Ok(tables.reports.values().map(|r| tables.summary(r)).collect())
    }

    async fn get_report(&self, id: i64) -> Result<Option<ReportSummary>, AppError> {
        let tables = self.lock();
        Ok(tables.reports.get(&id).map(|r| tables.summary(r)))
    }

    async fn load_aggregate(&self, id: i64) -> Result<Option<ReportAggregate>, AppError> {
        let tables = self.lock();
        let Some(report) = tables.reports.get(&id).cloned() else {
            return Ok(None);
        };

        let sentences = tables
            .sorted_sentences(Some(id))
            .into_iter()
            .map(|sentence| SentenceWithMappings {
                sentence: sentence.clone(),
                mappings: tables
                    .mappings
                    .values()
                    .filter(|m| m.sentence_id == sentence.id)
                    .cloned()
                    .collect(),
            })
            .collect();

        Ok(Some(ReportAggregate { report, sentences }))
    }

    async fn delete_report(&self, id: i64) -> Result<bool, AppError> {
        self.check_writable()?;
        let mut tables = self.lock();
        let Some(report) = tables.reports.remove(&id) else {
            return Ok(false);
        };

        tables.sentences.retain(|_, s| s.report_id != id);
        tables.mappings.retain(|_, m| m.report_id != id);
        if let Some(document_id) = report.document_id {
            tables.documents.remove(&document_id);
            tables.jobs.retain(|_, j| j.document_id != document_id);
        }
        Ok(true)
    }

    async fn find_sentences(&self, filter: &SentenceFilter) -> Result<Vec<Sentence>, AppError> {
        let tables = self.lock();
        Ok(tables
            .sorted_sentences(filter.report_id)
            .into_iter()
            .filter(|s| match &filter.attack_id {
                Some(attack_id) => tables
                    .mappings
                    .values()
                    .any(|m| m.sentence_id == s.id && &m.attack_id == attack_id),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_sentence(&self, id: i64) -> Result<Option<Sentence>, AppError> {
        Ok(self.lock().sentences.get(&id).cloned())
    }

    async fn update_sentence_disposition(
        &self,
        id: i64,
        disposition: Option<Disposition>,
    ) -> Result<Option<Sentence>, AppError> {
        self.check_writable()?;
        let mut tables = self.lock();
        Ok(tables.sentences.get_mut(&id).map(|s| {
            s.disposition = disposition;
            s.clone()
        }))
    }

    async fn find_mappings(&self, filter: &MappingFilter) -> Result<Vec<Mapping>, AppError> {
        Ok(self
            .lock()
            .mappings
            .values()
            .filter(|m| filter.sentence_id.map_or(true, |id| m.sentence_id == id))
            .cloned()
            .collect())
    }

    async fn get_mapping(&self, id: i64) -> Result<Option<Mapping>, AppError> {
        Ok(self.lock().mappings.get(&id).cloned())
    }

    async fn create_mapping(
        &self,
        sentence_id: i64,
        attack_id: &str,
        confidence: Decimal,
    ) -> Result<Mapping, AppError> {
        self.check_writable()?;
        let mut tables = self.lock();

        let report_id = tables.sentences.get(&sentence_id).map(|s| s.report_id);
        let attack_object_id = tables.attack_object_by_attack_id(attack_id).map(|o| o.id);

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

        let mapping = Mapping {
            id: tables.next_id(),
            report_id,
            sentence_id,
            attack_object_id,
            attack_id: attack_id.to_string(),
            confidence,
            provenance: JsonValue::Object(Map::new()),
        };
        tables.mappings.insert(mapping.id, mapping.clone());
        Ok(mapping)
    }

    async fn update_mapping_confidence(
        &self,
        id: i64,
        confidence: Decimal,
    ) -> Result<Option<Mapping>, AppError> {
        self.check_writable()?;
        let mut tables = self.lock();
        Ok(tables.mappings.get_mut(&id).map(|m| {
            m.confidence = confidence;
            m.clone()
        }))
    }

    async fn delete_mapping(&self, id: i64) -> Result<bool, AppError> {
        self.check_writable()?;
        Ok(self.lock().mappings.remove(&id).is_some())
    }
}
