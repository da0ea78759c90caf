use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;

use crate::{
    models::{Course, CourseConfig},
    progress::{records_from_document, ProgressDocument},
    store::{
        decode_config, decode_registry, DocumentStore, StoreError, CONFIG_COLLECTION,
        PROGRESS_COLLECTION, REGISTRY_COLLECTION, REGISTRY_ID,
    },
};

pub type Db = Pool<Postgres>;

pub async fn connect(url: &str) -> anyhow::Result<Db> {
    Ok(Pool::<Postgres>::connect(url).await?)
}

/// Documents live in one JSONB table keyed by (collection, id).
#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }

    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>, sqlx::Error> {
        sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn course_registry(&self) -> Result<Vec<Course>, StoreError> {
        match self.fetch(REGISTRY_COLLECTION, REGISTRY_ID).await? {
            Some(body) => decode_registry(body),
            None => {
                tracing::warn!("no course registry document, serving an empty registry");
                Ok(Vec::new())
            }
        }
    }

    async fn progress(&self, student_id: &str) -> Result<Option<ProgressDocument>, StoreError> {
        Ok(self
            .fetch(PROGRESS_COLLECTION, student_id)
            .await?
            .map(records_from_document))
    }

    async fn course_configs(&self, ids: &[String]) -> Result<HashMap<String, CourseConfig>, StoreError> {
        let rows: Vec<(String, serde_json::Value)> = sqlx::query_as(
            "SELECT id, body FROM documents WHERE collection = $1 AND id = ANY($2)",
        )
        .bind(CONFIG_COLLECTION)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, body)| decode_config(&id, body).map(|cfg| (id, cfg)))
            .collect())
    }
}
