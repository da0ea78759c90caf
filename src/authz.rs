//! Teacher authorization for a unit, across both stored config shapes.
//!
//! Authorization originally lived inside the course-level
//! `githubClassroomUrls[unit][email]` map and later moved to a unit-level
//! `authorizedTeachers` list. Documents in either shape are still live, so
//! both are consulted.

use std::collections::HashMap;

use crate::models::{ClassroomUrls, CourseConfig, TeacherDetail};

/// Config documents keyed by course id or unit file id.
#[derive(Debug, Clone, Default)]
pub struct ConfigDocuments {
    docs: HashMap<String, CourseConfig>,
}

impl ConfigDocuments {
    pub fn new(docs: HashMap<String, CourseConfig>) -> Self {
        Self { docs }
    }

    /// Unit-level document (carries `authorizedTeachers`).
    pub fn unit(&self, unit_file_id: &str) -> Option<&CourseConfig> {
        self.docs.get(unit_file_id)
    }

    /// Course-level document (carries the legacy classroom map and guides).
    pub fn course(&self, course_id: &str) -> Option<&CourseConfig> {
        self.docs.get(course_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// The two documents an authorization decision reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthSources<'a> {
    pub unit_config: Option<&'a CourseConfig>,
    pub course_config: Option<&'a CourseConfig>,
}

pub fn is_authorized(
    unit_file_id: &str,
    course_id: &str,
    teacher_email: &str,
    configs: &ConfigDocuments,
    super_mode: bool,
) -> bool {
    authorized_by(
        unit_file_id,
        teacher_email,
        AuthSources {
            unit_config: configs.unit(unit_file_id),
            course_config: configs.course(course_id),
        },
        super_mode,
    )
}

/// `super_mode` bypasses everything; callers must only set it for administrators.
pub fn authorized_by(
    unit_file_id: &str,
    teacher_email: &str,
    sources: AuthSources<'_>,
    super_mode: bool,
) -> bool {
    if super_mode {
        return true;
    }
    if teacher_email.is_empty() {
        return false;
    }

    if let Some(unit) = sources.unit_config {
        if unit.authorized_teachers.iter().any(|t| t == teacher_email) {
            return true;
        }
    }

    match sources
        .course_config
        .and_then(|c| c.github_classroom_urls.get(unit_file_id))
    {
        Some(ClassroomUrls::ByTeacher(by_teacher)) => by_teacher.contains_key(teacher_email),
        _ => false,
    }
}

/// The teacher's classroom URL for a unit from the legacy course-level map.
/// A single-string entry applies to every teacher.
pub fn classroom_url_for<'a>(
    course_config: Option<&'a CourseConfig>,
    unit_file_id: &str,
    teacher_email: &str,
) -> Option<&'a str> {
    match course_config?.github_classroom_urls.get(unit_file_id)? {
        ClassroomUrls::ByTeacher(by_teacher) => by_teacher.get(teacher_email)?.as_str(),
        ClassroomUrls::Single(url) => Some(url.as_str()),
        ClassroomUrls::Other(_) => None,
    }
}

/// Key under which `teacherDetails` stores an email: lowercased, with the
/// characters document stores reject in field names replaced by `_`.
pub fn sanitize_email_key(email: &str) -> String {
    email
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '.' | '#' | '$' | '/' | '[' | ']' => '_',
            other => other,
        })
        .collect()
}

pub fn teacher_detail<'a>(config: &'a CourseConfig, email: &str) -> Option<&'a TeacherDetail> {
    config.teacher_details.get(&sanitize_email_key(email))
}
