use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

pub const REPORT_NAME_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Report {
    pub id: i64,
    pub name: String,
    pub document_id: Option<i64>,
    pub text: String,
    pub ml_model: String,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// Report with its review progress, as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReportSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub report: Report,
    pub total_sentences: i64,
    pub accepted_sentences: i64,
    /// Sentences with no disposition yet.
    pub reviewing_sentences: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "disposition", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Accept,
    Reject,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Disposition::Accept => write!(f, "accept"),
            Disposition::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for Disposition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Disposition::Accept),
            "reject" => Ok(Disposition::Reject),
            _ => Err(anyhow::anyhow!("Invalid disposition: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sentence {
    pub id: i64,
    pub report_id: i64,
    pub document_id: Option<i64>,
    pub text: String,
    pub order: i32,
    pub disposition: Option<Disposition>,
}

/// A sentence-to-technique link. `attack_id` is joined in from the technique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Mapping {
    pub id: i64,
    pub report_id: i64,
    pub sentence_id: i64,
    pub attack_object_id: i64,
    pub attack_id: String,
    pub confidence: Decimal,
    /// Extra fields supplied with an imported mapping, kept verbatim.
    pub provenance: JsonValue,
}

impl Mapping {
    pub fn provenance_fields(&self) -> Map<String, JsonValue> {
        match &self.provenance {
            JsonValue::Object(fields) => fields.clone(),
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentenceWithMappings {
    pub sentence: Sentence,
    pub mappings: Vec<Mapping>,
}

/// Everything needed to rebuild a report's canonical export.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportAggregate {
    pub report: Report,
    /// Ordered by `(order, id)`; mappings by id.
    pub sentences: Vec<SentenceWithMappings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub name: String,
    pub text: String,
    pub ml_model: String,
    pub document_id: Option<i64>,
    pub created_by: String,
    pub sentences: Vec<NewSentence>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSentence {
    pub text: String,
    pub order: i32,
    pub disposition: Option<Disposition>,
    pub mappings: Vec<NewMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMapping {
    pub attack_id: String,
    pub confidence: Decimal,
    pub provenance: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMappingRequest {
    #[serde(rename = "sentence")]
    pub sentence_id: i64,
    pub attack_id: String,
    #[serde(default)]
    pub confidence: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMappingRequest {
    pub confidence: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSentenceRequest {
    pub disposition: Option<Disposition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentenceFilter {
    #[serde(rename = "report-id")]
    pub report_id: Option<i64>,
    #[serde(rename = "attack-id")]
    pub attack_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingFilter {
    #[serde(rename = "sentence-id")]
    pub sentence_id: Option<i64>,
}

/// Confidence is a percentage.
pub fn confidence_in_range(confidence: Decimal) -> bool {
    confidence >= Decimal::ZERO && confidence <= Decimal::ONE_HUNDRED
}
