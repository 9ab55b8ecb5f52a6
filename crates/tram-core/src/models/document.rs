use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded source file. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Document {
    pub id: i64,
    pub storage_key: String,
    pub original_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
}

impl Document {
    /// Last path segment of the storage key, used as the download file name.
    pub fn file_name(&self) -> &str {
        self.storage_key
            .rsplit('/')
            .next()
            .unwrap_or(&self.storage_key)
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub storage_key: String,
    pub original_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_last_key_segment() {
        let doc = Document {
            id: 1,
            storage_key: "documents/ab12.pdf".to_string(),
            original_name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            file_size: 4,
            created_by: "alice".to_string(),
            created_on: Utc::now(),
        };
        assert_eq!(doc.file_name(), "ab12.pdf");
    }
}
