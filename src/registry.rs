//! Course registry and the file-name conventions derived from it.
//!
//! Courses are loaded once from the store and never mutated; the registry
//! precomputes the id index, the title lookup table and each course's
//! course-code prefix so resolution is a read-only walk.

use percent_encoding::percent_decode_str;
use std::collections::HashMap;

use crate::models::Course;

pub const UNIT_SUFFIX: &str = ".html";

lazy_static::lazy_static! {
    // `basic-01-` or `02-`, anchored at the start of a master file name
    static ref COURSE_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^(?:[A-Za-z0-9]+-\d+-|\d+-)").unwrap();
}

/// Drop a trailing `.html` / `.htm` from a unit key.
pub fn strip_unit_suffix(key: &str) -> &str {
    key.strip_suffix(UNIT_SUFFIX)
        .or_else(|| key.strip_suffix(".htm"))
        .unwrap_or(key)
}

/// Last path segment of a classroom URL, percent-decoded and without its suffix.
pub fn master_file_name(classroom_url: &str) -> Option<String> {
    let path = classroom_url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    Some(strip_unit_suffix(&decoded).to_string())
}

pub fn course_code_prefix(master_name: &str) -> Option<&str> {
    COURSE_CODE_REGEX.find(master_name).map(|m| m.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct CourseRegistry {
    courses: Vec<Course>,
    by_id: HashMap<String, usize>,
    titles: HashMap<String, String>,
    // alias -> index into `courses`
    aliases: HashMap<String, usize>,
    // (course-code prefix, index into `courses`), registry order
    prefixes: Vec<(String, usize)>,
}

impl CourseRegistry {
    pub fn new(courses: Vec<Course>) -> Self {
        let mut by_id = HashMap::new();
        let mut titles = HashMap::new();
        let mut aliases = HashMap::new();
        let mut prefixes = Vec::new();

        for (idx, course) in courses.iter().enumerate() {
            // first definition of an id wins
            by_id.entry(course.course_id.clone()).or_insert(idx);
            titles
                .entry(course.course_id.clone())
                .or_insert_with(|| course.title.clone());
            for alias in &course.aliases {
                titles
                    .entry(alias.clone())
                    .or_insert_with(|| course.title.clone());
                aliases.entry(alias.clone()).or_insert(idx);
            }
            if let Some(name) = master_file_name(&course.classroom_url) {
                if let Some(prefix) = course_code_prefix(&name) {
                    prefixes.push((prefix.to_string(), idx));
                }
            }
        }

        tracing::debug!(
            courses = courses.len(),
            prefixes = prefixes.len(),
            "course registry built"
        );

        Self {
            courses,
            by_id,
            titles,
            aliases,
            prefixes,
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn get(&self, course_id: &str) -> Option<&Course> {
        self.by_id.get(course_id).map(|&i| &self.courses[i])
    }

    /// Title for a course id or alias.
    pub fn title_of(&self, key: &str) -> Option<&str> {
        self.titles.get(key).map(String::as_str)
    }

    /// Course that declares `alias`; the first declaration wins.
    pub fn alias_owner(&self, alias: &str) -> Option<&Course> {
        self.aliases.get(alias).map(|&i| &self.courses[i])
    }

    /// Course-code prefixes in registry order.
    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &Course)> + '_ {
        self.prefixes
            .iter()
            .map(|(p, i)| (p.as_str(), &self.courses[*i]))
    }

    /// Every unit file id and course id a dashboard may need a config for.
    pub fn config_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for course in &self.courses {
            ids.push(course.course_id.clone());
            ids.extend(course.course_units.iter().cloned());
        }
        ids.sort();
        ids.dedup();
        ids
    }
}
