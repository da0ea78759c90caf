//! Per-request dashboard composition.
//!
//! Everything here is a pure function of the snapshots handed in; the route
//! layer fetches documents, builds a [`RequestContext`] and calls
//! [`build_dashboard`] once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    authz::{self, ConfigDocuments},
    guide,
    models::{AggregatedCourseProgress, Course, ProgressLog, UnitProgressRecord},
    progress::{aggregate, ProgressDocument},
    registry::{strip_unit_suffix, CourseRegistry},
};

/// State a dashboard request carries. `super_mode` must only be set by a
/// caller that has already checked the user is an administrator.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub teacher_email: String,
    pub super_mode: bool,
    pub course_filter: Option<String>,
}

impl RequestContext {
    pub fn new(teacher_email: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            teacher_email: teacher_email.into(),
            super_mode: false,
            course_filter: None,
        }
    }

    pub fn with_super_mode(mut self, super_mode: bool) -> Self {
        self.super_mode = super_mode;
        self
    }

    pub fn with_course_filter(mut self, course_id: Option<String>) -> Self {
        self.course_filter = course_id;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub request_id: Uuid,
    pub courses: Vec<CourseView>,
    /// Progress buckets whose key matched no registered course.
    pub unresolved: Vec<UnresolvedBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub course_id: String,
    pub title: String,
    pub classroom_url: String,
    pub total: f64,
    pub video: f64,
    pub doc: f64,
    pub page: f64,
    pub units: Vec<UnitView>,
    pub guide_header: String,
    pub guide_footer: String,
    /// Newest first.
    pub logs: Vec<LogView>,
    pub teachers: Vec<TeacherView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    pub unit_id: String,
    /// 1-based; `None` for progress keys outside the course's unit list.
    pub position: Option<usize>,
    pub stats: Option<UnitStats>,
    pub authorized: bool,
    pub classroom_url: Option<String>,
    /// Empty unless `authorized`.
    pub instructor_guide: String,
    pub assignment_guide: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitStats {
    pub total: f64,
    pub video: f64,
    pub doc: f64,
    pub page: f64,
}

impl From<&UnitProgressRecord> for UnitStats {
    fn from(r: &UnitProgressRecord) -> Self {
        Self {
            total: r.total,
            video: r.video,
            doc: r.doc,
            page: r.page,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogView {
    pub at: Option<DateTime<Utc>>,
    pub action: String,
    pub duration: f64,
}

impl From<&ProgressLog> for LogView {
    fn from(log: &ProgressLog) -> Self {
        Self {
            at: log.at(),
            action: log.action.clone(),
            duration: log.duration,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherView {
    pub email_key: String,
    pub name: String,
    pub qualified_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedBucket {
    pub key: String,
    pub total: f64,
}

pub fn build_dashboard(
    ctx: &RequestContext,
    registry: &CourseRegistry,
    progress: &ProgressDocument,
    configs: &ConfigDocuments,
) -> Dashboard {
    let aggregated = aggregate(progress, registry);

    // alias buckets count toward the course that declares the alias; the
    // rest of the non-course buckets are raw keys that fell through
    let mut by_course: BTreeMap<&str, AggregatedCourseProgress> = BTreeMap::new();
    let mut unresolved = Vec::new();
    for (id, bucket) in &aggregated {
        let owner = match registry.get(id) {
            Some(course) => Some(course),
            None => registry.alias_owner(id),
        };
        match owner {
            Some(course) => by_course
                .entry(course.course_id.as_str())
                .or_default()
                .absorb(bucket),
            None => unresolved.push(UnresolvedBucket {
                key: id.clone(),
                total: bucket.total,
            }),
        }
    }
    if ctx.course_filter.is_some() {
        unresolved.clear();
    }

    let empty = AggregatedCourseProgress::default();
    let courses: Vec<CourseView> = registry
        .courses()
        .iter()
        .filter(|c| match &ctx.course_filter {
            Some(id) => &c.course_id == id,
            None => true,
        })
        .map(|course| {
            let bucket = by_course.get(course.course_id.as_str()).unwrap_or(&empty);
            course_view(ctx, course, bucket, configs)
        })
        .collect();

    tracing::debug!(
        request_id = %ctx.request_id,
        courses = courses.len(),
        unresolved = unresolved.len(),
        "dashboard built"
    );

    Dashboard {
        request_id: ctx.request_id,
        courses,
        unresolved,
    }
}

fn course_view(
    ctx: &RequestContext,
    course: &Course,
    bucket: &AggregatedCourseProgress,
    configs: &ConfigDocuments,
) -> CourseView {
    let course_config = configs.course(&course.course_id);
    let guides = guide::extract(
        course_config.and_then(|c| c.instructor_guide.as_ref()),
        course_config.and_then(|c| c.assignment_guide.as_ref()),
    );

    let unit_view = |unit_id: &str, position: Option<usize>, record: Option<&UnitProgressRecord>| {
        let authorized = authz::is_authorized(
            unit_id,
            &course.course_id,
            &ctx.teacher_email,
            configs,
            ctx.super_mode,
        );
        UnitView {
            unit_id: unit_id.to_string(),
            position,
            stats: record.map(UnitStats::from),
            authorized,
            classroom_url: authz::classroom_url_for(course_config, unit_id, &ctx.teacher_email)
                .map(str::to_string),
            instructor_guide: if authorized {
                guides.instructor_for(unit_id, Some(course)).to_string()
            } else {
                String::new()
            },
            assignment_guide: guides.assignment_for(unit_id, Some(course)).to_string(),
        }
    };

    let mut units = Vec::with_capacity(course.course_units.len());
    let mut claimed: Vec<&str> = Vec::new();
    for (idx, unit_id) in course.course_units.iter().enumerate() {
        let record = bucket.units.get_key_value(unit_id.as_str()).or_else(|| {
            let bare = strip_unit_suffix(unit_id);
            bucket
                .units
                .iter()
                .find(|(k, _)| strip_unit_suffix(k) == bare)
        });
        if let Some((key, _)) = record {
            claimed.push(key.as_str());
        }
        units.push(unit_view(unit_id.as_str(), Some(idx + 1), record.map(|(_, r)| r)));
    }
    // progress keys that resolved here but aren't listed units
    for (key, record) in &bucket.units {
        if !claimed.contains(&key.as_str()) {
            units.push(unit_view(key.as_str(), None, Some(record)));
        }
    }

    let teachers = course_config
        .map(|c| {
            let mut t: Vec<TeacherView> = c
                .teacher_details
                .iter()
                .map(|(key, d)| TeacherView {
                    email_key: key.clone(),
                    name: d.name.clone(),
                    qualified_at: d.qualified_at.clone(),
                })
                .collect();
            t.sort_by(|a, b| a.email_key.cmp(&b.email_key));
            t
        })
        .unwrap_or_default();

    CourseView {
        course_id: course.course_id.clone(),
        title: course.title.clone(),
        classroom_url: course.classroom_url.clone(),
        total: bucket.total,
        video: bucket.video,
        doc: bucket.doc,
        page: bucket.page,
        units,
        guide_header: guides.header.clone(),
        guide_footer: guides.footer.clone(),
        logs: bucket.sorted_logs().iter().map(LogView::from).collect(),
        teachers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    const TEACHER: &str = "t@example.com";

    fn registry() -> CourseRegistry {
        CourseRegistry::new(vec![Course {
            course_id: "c1".into(),
            title: "Course One".into(),
            course_units: vec!["01-unit-a.html".into(), "01-unit-b.html".into()],
            classroom_url: "https://h/01-master-c.html".into(),
            aliases: vec![],
        }])
    }

    fn progress() -> ProgressDocument {
        crate::progress::records_from_document(json!({
            "01-unit-a.html": { "total": 100, "video": 60, "doc": 40, "page": 0,
                "logs": [{ "timestamp": 1, "action": "video", "duration": 60 },
                         { "timestamp": 5, "action": "doc", "duration": 40 }] },
            "01-unit-b": { "total": 50, "doc": 50 },
            "01-master-c.html": { "total": 5, "page": 5 },
            "zz-unknown.html": { "total": 7 },
        }))
    }

    fn configs() -> ConfigDocuments {
        let mut docs = HashMap::new();
        docs.insert(
            "c1".to_string(),
            serde_json::from_value(json!({
                "githubClassroomUrls": {
                    "01-unit-b.html": { TEACHER: "https://classroom/b" }
                },
                "teacherDetails": { "t@example_com": { "name": "Tea" } },
                "instructorGuide": {
                    "01-unit-a.html": "<p>guide a</p>",
                    "01-unit-b.html": "<p>guide b</p>",
                    "01-master-c.html": "<p>course</p>",
                },
                "assignmentGuide": { "1": "<p>first</p>" },
            }))
            .unwrap(),
        );
        docs.insert(
            "01-unit-a.html".to_string(),
            serde_json::from_value(json!({ "authorizedTeachers": [TEACHER] })).unwrap(),
        );
        ConfigDocuments::new(docs)
    }

    #[test]
    fn composes_units_guides_and_authorization() {
        let ctx = RequestContext::new(TEACHER);
        let dash = build_dashboard(&ctx, &registry(), &progress(), &configs());

        assert_eq!(dash.courses.len(), 1);
        let c = &dash.courses[0];
        assert_eq!(c.total, 155.0);
        assert_eq!(c.guide_footer, "<p>course</p>");
        assert_eq!(c.logs.iter().map(|l| l.action.as_str()).collect::<Vec<_>>(), vec!["doc", "video"]);
        assert_eq!(c.logs[0].at, DateTime::from_timestamp_millis(5));
        assert_eq!(c.teachers.len(), 1);
        assert_eq!(c.teachers[0].name, "Tea");

        assert_eq!(c.units.len(), 3);
        let a = &c.units[0];
        assert_eq!(a.position, Some(1));
        assert!(a.authorized);
        assert_eq!(a.instructor_guide, "<p>guide a</p>");
        assert_eq!(a.assignment_guide, "<p>first</p>");
        assert_eq!(a.stats.map(|s| s.total), Some(100.0));

        let b = &c.units[1];
        assert!(b.authorized);
        assert_eq!(b.stats.map(|s| s.total), Some(50.0));
        assert_eq!(b.classroom_url.as_deref(), Some("https://classroom/b"));

        let extra = &c.units[2];
        assert_eq!(extra.unit_id, "01-master-c.html");
        assert_eq!(extra.position, None);

        assert_eq!(dash.unresolved.len(), 1);
        assert_eq!(dash.unresolved[0].key, "zz-unknown.html");
    }

    #[test]
    fn alias_progress_counts_toward_its_course() {
        let mut course = registry().courses()[0].clone();
        course.aliases.push("old-c1".into());
        let registry = CourseRegistry::new(vec![course]);
        let progress = crate::progress::records_from_document(json!({
            "old-c1": { "total": 5, "video": 5 },
            "01-unit-a.html": { "total": 10 },
        }));

        let dash = build_dashboard(&RequestContext::new(TEACHER), &registry, &progress, &configs());
        let c = &dash.courses[0];
        assert_eq!(c.total, 15.0);
        assert_eq!(c.video, 5.0);
        assert!(c.units.iter().any(|u| u.unit_id == "old-c1" && u.position.is_none()));
        assert!(dash.unresolved.is_empty());
    }

    #[test]
    fn unauthorized_teacher_gets_no_instructor_guide() {
        let ctx = RequestContext::new("stranger@example.com");
        let dash = build_dashboard(&ctx, &registry(), &progress(), &configs());
        let a = &dash.courses[0].units[0];
        assert!(!a.authorized);
        assert!(a.instructor_guide.is_empty());
        assert_eq!(a.assignment_guide, "<p>first</p>");
    }

    #[test]
    fn super_mode_authorizes_everything() {
        let ctx = RequestContext::new("").with_super_mode(true);
        let dash = build_dashboard(&ctx, &registry(), &progress(), &configs());
        assert!(dash.courses[0].units.iter().all(|u| u.authorized));
    }

    #[test]
    fn course_filter_limits_output() {
        let ctx = RequestContext::new(TEACHER).with_course_filter(Some("other".into()));
        let dash = build_dashboard(&ctx, &registry(), &progress(), &configs());
        assert!(dash.courses.is_empty());
        assert!(dash.unresolved.is_empty());
    }
}
