use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::{
    headers::{self, Header, HeaderName, HeaderValue},
    TypedHeader,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::RwLock;

use crate::{
    authz::ConfigDocuments,
    dashboard::{build_dashboard, Dashboard, RequestContext},
    models::Course,
    progress::{aggregate, CourseProgressMap},
    registry::CourseRegistry,
    resolver::{resolve_detailed, MatchedBy},
    store::{DocumentStore, StoreError},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    // swapped wholesale on refresh; requests keep the snapshot they started with
    registry: Arc<RwLock<Arc<CourseRegistry>>>,
    admins: Arc<HashSet<String>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, registry: CourseRegistry, admins: HashSet<String>) -> Self {
        Self {
            store,
            registry: Arc::new(RwLock::new(Arc::new(registry))),
            admins: Arc::new(admins),
        }
    }

    /// Load the registry from the store once, at startup.
    pub async fn load(store: Arc<dyn DocumentStore>, admins: HashSet<String>) -> Result<Self, StoreError> {
        let courses = store.course_registry().await?;
        tracing::info!(courses = courses.len(), "course registry loaded");
        Ok(Self::new(store, CourseRegistry::new(courses), admins))
    }

    pub async fn registry(&self) -> Arc<CourseRegistry> {
        self.registry.read().await.clone()
    }

    fn is_admin(&self, email: &str) -> bool {
        self.admins.contains(&email.trim().to_lowercase())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/courses", get(list_courses))
        .route("/api/courses/refresh", post(refresh_courses))
        .route("/api/resolve", get(resolve_key))
        .route("/api/students/:student_id/progress", get(student_progress))
        .route("/api/students/:student_id/dashboard", get(student_dashboard))
        .with_state(state)
}

async fn list_courses(State(state): State<AppState>) -> Json<Vec<Course>> {
    Json(state.registry().await.courses().to_vec())
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshResp {
    pub courses: usize,
}

async fn refresh_courses(
    State(state): State<AppState>,
) -> Result<Json<RefreshResp>, (StatusCode, String)> {
    let courses = state.store.course_registry().await.map_err(e500)?;
    let registry = Arc::new(CourseRegistry::new(courses));
    let count = registry.len();
    *state.registry.write().await = registry;
    tracing::info!(courses = count, "course registry refreshed");
    Ok(Json(RefreshResp { courses: count }))
}

#[derive(Deserialize, Debug)]
pub struct ResolveQuery {
    #[serde(default)]
    pub key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResolveResp {
    pub key: String,
    pub course_id: String,
    pub matched_by: MatchedBy,
}

async fn resolve_key(
    State(state): State<AppState>,
    Query(q): Query<ResolveQuery>,
) -> Result<Json<ResolveResp>, (StatusCode, String)> {
    if q.key.is_empty() {
        return Err(e400("key is required"));
    }
    let registry = state.registry().await;
    let r = resolve_detailed(&q.key, &registry);
    Ok(Json(ResolveResp {
        key: q.key,
        course_id: r.course_id,
        matched_by: r.matched_by,
    }))
}

async fn student_progress(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<CourseProgressMap>, (StatusCode, String)> {
    let registry = state.registry().await;
    let progress = state
        .store
        .progress(&student_id)
        .await
        .map_err(e500)?
        .unwrap_or_default();
    Ok(Json(aggregate(&progress, &registry)))
}

static TEACHER_EMAIL: HeaderName = HeaderName::from_static("x-teacher-email");

/// Signed-in teacher, as set by the authenticating proxy in front of the
/// service. Never read from the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherEmail(pub String);

impl Header for TeacherEmail {
    fn name() -> &'static HeaderName {
        &TEACHER_EMAIL
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let email = value.to_str().map_err(|_| headers::Error::invalid())?.trim();
        if email.is_empty() {
            return Err(headers::Error::invalid());
        }
        Ok(Self(email.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct DashboardQuery {
    #[serde(default, rename = "super")]
    pub super_mode: bool,
    pub course: Option<String>,
}

async fn student_dashboard(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    teacher: Option<TypedHeader<TeacherEmail>>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Dashboard>, (StatusCode, String)> {
    let teacher = teacher.map(|TypedHeader(t)| t.0).unwrap_or_default();
    let registry = state.registry().await;
    if let Some(course_id) = &q.course {
        if registry.get(course_id).is_none() {
            return Err(e404("course not found"));
        }
    }

    let super_mode = if q.super_mode && !state.is_admin(&teacher) {
        tracing::warn!(teacher = %teacher, "super mode requested by non-admin, ignoring");
        false
    } else {
        q.super_mode
    };

    let config_ids = registry.config_ids();
    let (progress, configs) = tokio::try_join!(
        state.store.progress(&student_id),
        state.store.course_configs(&config_ids),
    )
    .map_err(e500)?;

    let ctx = RequestContext::new(teacher)
        .with_super_mode(super_mode)
        .with_course_filter(q.course);
    tracing::info!(request_id = %ctx.request_id, student_id = %student_id, "building dashboard");

    Ok(Json(build_dashboard(
        &ctx,
        &registry,
        &progress.unwrap_or_default(),
        &ConfigDocuments::new(configs),
    )))
}

// --- helpers ---
fn e400<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn e404<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, msg.into())
}

fn e500<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error=%e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::headers::HeaderMapExt;
    use http::HeaderMap;

    #[test]
    fn teacher_email_header_is_trimmed() {
        let mut map = HeaderMap::new();
        map.insert("x-teacher-email", HeaderValue::from_static(" t@example.com "));
        assert_eq!(
            map.typed_get::<TeacherEmail>(),
            Some(TeacherEmail("t@example.com".into()))
        );
    }

    #[test]
    fn blank_teacher_email_header_is_rejected() {
        let mut map = HeaderMap::new();
        map.insert("x-teacher-email", HeaderValue::from_static("  "));
        assert!(map.typed_try_get::<TeacherEmail>().is_err());
        assert_eq!(HeaderMap::new().typed_get::<TeacherEmail>(), None);
    }
}
