//! Document store seam. The core never talks to the store; routes fetch
//! snapshots through a [`DocumentStore`] and hand them over.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    models::{Course, CourseConfig},
    progress::{records_from_document, ProgressDocument},
};

pub const REGISTRY_COLLECTION: &str = "registry";
pub const REGISTRY_ID: &str = "courses";
pub const PROGRESS_COLLECTION: &str = "progress";
pub const CONFIG_COLLECTION: &str = "course_configs";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("malformed document {collection}/{id}: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Courses in registry order; empty when no registry document exists.
    async fn course_registry(&self) -> Result<Vec<Course>, StoreError>;

    async fn progress(&self, student_id: &str) -> Result<Option<ProgressDocument>, StoreError>;

    /// Config documents for the given course ids and unit file ids. Missing
    /// ids are simply absent from the result.
    async fn course_configs(&self, ids: &[String]) -> Result<HashMap<String, CourseConfig>, StoreError>;
}

/// The registry document must be an array; entries that aren't courses are dropped.
pub(crate) fn decode_registry(body: serde_json::Value) -> Result<Vec<Course>, StoreError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_value(body).map_err(|source| StoreError::Decode {
            collection: REGISTRY_COLLECTION.into(),
            id: REGISTRY_ID.into(),
            source,
        })?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Course>(entry) {
            Ok(course) => Some(course),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed course in registry");
                None
            }
        })
        .collect())
}

pub(crate) fn decode_config(id: &str, body: serde_json::Value) -> Option<CourseConfig> {
    match serde_json::from_value(body) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::debug!(id, error = %e, "ignoring malformed config document");
            None
        }
    }
}

/// In-process store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, collection: &str, id: &str, body: serde_json::Value) {
        self.docs
            .write()
            .await
            .insert((collection.to_string(), id.to_string()), body);
    }

    async fn get(&self, collection: &str, id: &str) -> Option<serde_json::Value> {
        self.docs
            .read()
            .await
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn course_registry(&self) -> Result<Vec<Course>, StoreError> {
        match self.get(REGISTRY_COLLECTION, REGISTRY_ID).await {
            Some(body) => decode_registry(body),
            None => Ok(Vec::new()),
        }
    }

    async fn progress(&self, student_id: &str) -> Result<Option<ProgressDocument>, StoreError> {
        Ok(self
            .get(PROGRESS_COLLECTION, student_id)
            .await
            .map(records_from_document))
    }

    async fn course_configs(&self, ids: &[String]) -> Result<HashMap<String, CourseConfig>, StoreError> {
        let mut out = HashMap::new();
        for id in ids {
            if let Some(body) = self.get(CONFIG_COLLECTION, id).await {
                if let Some(cfg) = decode_config(id, body) {
                    out.insert(id.clone(), cfg);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_round_trips_documents() {
        let store = MemoryStore::new();
        store
            .put(
                REGISTRY_COLLECTION,
                REGISTRY_ID,
                json!([
                    { "courseId": "c1", "title": "One", "courseUnits": ["01-unit-a.html"],
                      "classroomUrl": "https://h/01-master-c.html" },
                    "not a course",
                ]),
            )
            .await;
        store
            .put(PROGRESS_COLLECTION, "s1", json!({ "01-unit-a.html": { "total": 3 } }))
            .await;
        store
            .put(CONFIG_COLLECTION, "c1", json!({ "authorizedTeachers": ["t@example.com"] }))
            .await;
        store.put(CONFIG_COLLECTION, "broken", json!(17)).await;

        let courses = store.course_registry().await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].course_id, "c1");

        let progress = store.progress("s1").await.unwrap().unwrap();
        assert_eq!(progress["01-unit-a.html"].total, 3.0);
        assert!(store.progress("nobody").await.unwrap().is_none());

        let ids = vec!["c1".to_string(), "broken".to_string(), "missing".to_string()];
        let configs = store.course_configs(&ids).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert!(configs.contains_key("c1"));
    }

    #[test]
    fn registry_must_be_an_array() {
        let err = decode_registry(json!({ "courseId": "c1" })).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
