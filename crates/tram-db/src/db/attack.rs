use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tram_core::models::{AttackObject, TechniqueSentenceCount};
use tram_core::AppError;

use crate::traits::AttackObjectStore;

const ATTACK_OBJECT_COLUMNS: &str =
    "id, name, stix_id, attack_id, attack_url, attack_type, matrix, created_on, updated_on";

/// Read-only access to the ATT&CK reference data
#[derive(Clone)]
pub struct AttackObjectRepository {
    pool: PgPool,
}

impl AttackObjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttackObjectStore for AttackObjectRepository {
    #[tracing::instrument(skip(self), fields(db.table = "attack_objects", db.operation = "select"))]
    async fn list_attack_objects(&self) -> Result<Vec<AttackObject>, AppError> {
        let objects = sqlx::query_as::<Postgres, AttackObject>(&format!(
            "SELECT {} FROM attack_objects ORDER BY attack_id ASC",
            ATTACK_OBJECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(objects)
    }

    #[tracing::instrument(skip(self), fields(db.table = "attack_objects", db.operation = "select", db.record_id = %id))]
    async fn get_attack_object(&self, id: i64) -> Result<Option<AttackObject>, AppError> {
        let object = sqlx::query_as::<Postgres, AttackObject>(&format!(
            "SELECT {} FROM attack_objects WHERE id = $1",
            ATTACK_OBJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(object)
    }

    #[tracing::instrument(skip(self), fields(db.table = "attack_objects", db.operation = "select"))]
    async fn sentence_counts(&self) -> Result<Vec<TechniqueSentenceCount>, AppError> {
        let counts = sqlx::query_as::<Postgres, TechniqueSentenceCount>(
            r#"
            SELECT ao.attack_id, ao.name, COUNT(DISTINCT m.sentence_id) AS sentence_count
            FROM attack_objects ao
            LEFT JOIN mappings m ON m.attack_object_id = ao.id
            GROUP BY ao.id, ao.attack_id, ao.name
            ORDER BY ao.attack_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}
