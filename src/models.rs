use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, MapSkipError, VecSkipError};
use std::collections::{BTreeMap, HashMap};

use crate::registry::strip_unit_suffix;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub course_units: Vec<String>,
    #[serde(default)]
    pub classroom_url: String,
    // extra keys accepted by the title lookup, e.g. retired course ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Course {
    /// 1-based position of `unit_key` within `course_units`, ignoring the
    /// `.html` suffix on either side.
    pub fn unit_position(&self, unit_key: &str) -> Option<usize> {
        let bare = strip_unit_suffix(unit_key);
        self.course_units
            .iter()
            .position(|u| strip_unit_suffix(u) == bare)
            .map(|i| i + 1)
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProgressLog {
    /// epoch milliseconds
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub timestamp: i64,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub action: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub duration: f64,
}

impl ProgressLog {
    pub fn at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Time spent on one unit, in seconds. Wrong-typed or missing numbers read as 0.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UnitProgressRecord {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub total: f64,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub video: f64,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub doc: f64,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub page: f64,
    #[serde_as(deserialize_as = "DefaultOnError<VecSkipError<_>>")]
    #[serde(default)]
    pub logs: Vec<ProgressLog>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AggregatedCourseProgress {
    pub total: f64,
    pub video: f64,
    pub doc: f64,
    pub page: f64,
    /// raw unit key -> record as stored
    pub units: BTreeMap<String, UnitProgressRecord>,
    pub logs: Vec<ProgressLog>,
}

impl AggregatedCourseProgress {
    pub fn unit_total(&self) -> f64 {
        self.units.values().map(|u| u.total).sum()
    }

    /// Fold another bucket in: sums add up, units and logs are appended.
    pub fn absorb(&mut self, other: &AggregatedCourseProgress) {
        self.total += other.total;
        self.video += other.video;
        self.doc += other.doc;
        self.page += other.page;
        self.units
            .extend(other.units.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.logs.extend(other.logs.iter().cloned());
    }

    /// Logs newest first, the order the dashboard renders them in.
    pub fn sorted_logs(&self) -> Vec<ProgressLog> {
        let mut logs = self.logs.clone();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs
    }
}

/// Legacy `githubClassroomUrls` value: usually teacher email -> URL, but
/// older documents hold a single URL string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ClassroomUrls {
    ByTeacher(serde_json::Map<String, serde_json::Value>),
    Single(String),
    Other(serde_json::Value),
}

/// Instructor or assignment guide, keyed per unit or as one legacy blob.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum GuideDocument {
    Keyed(serde_json::Map<String, serde_json::Value>),
    Legacy(String),
    Other(serde_json::Value),
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDetail {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub name: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub qualified_at: Option<String>,
}

/// Configuration document stored under either a course id or a unit file id.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseConfig {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub github_classroom_urls: HashMap<String, ClassroomUrls>,
    #[serde_as(deserialize_as = "DefaultOnError<VecSkipError<_>>")]
    #[serde(default)]
    pub authorized_teachers: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnError<MapSkipError<_, _>>")]
    #[serde(default)]
    pub teacher_details: HashMap<String, TeacherDetail>,
    #[serde(default)]
    pub instructor_guide: Option<GuideDocument>,
    #[serde(default)]
    pub assignment_guide: Option<GuideDocument>,
}
