use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A MITRE ATT&CK technique (or other object) that sentences are mapped to.
///
/// Reference data loaded out of band; this service never writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AttackObject {
    pub id: i64,
    pub name: String,
    pub stix_id: String,
    pub attack_id: String,
    pub attack_url: Option<String>,
    pub attack_type: Option<String>,
    pub matrix: Option<String>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// Number of distinct sentences mapped to a technique, across all reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TechniqueSentenceCount {
    pub attack_id: String,
    pub name: String,
    pub sentence_count: i64,
}
