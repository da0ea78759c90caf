//! Maps raw progress keys (historically unit file names) onto course ids.

use serde::{Deserialize, Serialize};

use crate::registry::{strip_unit_suffix, CourseRegistry};

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Exact,
    TitleLookup,
    Prefix,
    /// Nothing matched; the raw key is used as its own course id.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub course_id: String,
    pub matched_by: MatchedBy,
}

pub fn resolve(raw_key: &str, registry: &CourseRegistry) -> String {
    resolve_detailed(raw_key, registry).course_id
}

/// Resolve `raw_key`, first match wins:
/// 1. exact course id
/// 2. key in the title lookup table (course ids plus aliases)
/// 3. course-code prefix of a course's master file, longest prefix wins,
///    equal lengths go to the earlier course in the registry
/// 4. the raw key itself
pub fn resolve_detailed(raw_key: &str, registry: &CourseRegistry) -> Resolution {
    if registry.get(raw_key).is_some() {
        return Resolution {
            course_id: raw_key.to_string(),
            matched_by: MatchedBy::Exact,
        };
    }

    if registry.title_of(raw_key).is_some() {
        return Resolution {
            course_id: raw_key.to_string(),
            matched_by: MatchedBy::TitleLookup,
        };
    }

    let clean_key = strip_unit_suffix(raw_key);
    let mut best: Option<(&str, &str)> = None;
    for (prefix, course) in registry.prefixes() {
        if !clean_key.starts_with(prefix) {
            continue;
        }
        match best {
            Some((current, _)) if current.len() >= prefix.len() => {}
            _ => best = Some((prefix, course.course_id.as_str())),
        }
    }
    if let Some((_, course_id)) = best {
        return Resolution {
            course_id: course_id.to_string(),
            matched_by: MatchedBy::Prefix,
        };
    }

    tracing::warn!(raw_key, "progress key matched no course, bucketing under the raw key");
    Resolution {
        course_id: raw_key.to_string(),
        matched_by: MatchedBy::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;

    fn course(id: &str, url: &str) -> Course {
        Course {
            course_id: id.into(),
            title: id.to_uppercase(),
            course_units: vec![],
            classroom_url: url.into(),
            aliases: vec![],
        }
    }

    fn registry() -> CourseRegistry {
        CourseRegistry::new(vec![
            course("web101", "https://h/courses/02-master-web-app.html"),
            course("basics", "https://h/basic-01-master-intro.html"),
        ])
    }

    #[test]
    fn canonical_ids_resolve_to_themselves() {
        let reg = registry();
        for c in reg.courses() {
            let r = resolve_detailed(&c.course_id, &reg);
            assert_eq!(r.course_id, c.course_id);
            assert_eq!(r.matched_by, MatchedBy::Exact);
        }
    }

    #[test]
    fn alias_resolves_unchanged() {
        let mut c = course("web101", "https://h/02-master-web-app.html");
        c.aliases.push("old-web".into());
        let reg = CourseRegistry::new(vec![c]);
        let r = resolve_detailed("old-web", &reg);
        assert_eq!(r.course_id, "old-web");
        assert_eq!(r.matched_by, MatchedBy::TitleLookup);
    }

    #[test]
    fn unit_file_resolves_by_prefix() {
        let reg = registry();
        assert_eq!(resolve("02-unit-html5-basics.html", &reg), "web101");
        assert_eq!(resolve("basic-01-unit-loops.html", &reg), "basics");
    }

    #[test]
    fn longest_prefix_wins() {
        let reg = CourseRegistry::new(vec![
            course("short", "https://h/01-master-a.html"),
            course("long", "https://h/01-02-master-b.html"),
        ]);
        assert_eq!(resolve("01-02-unit-x.html", &reg), "long");
        assert_eq!(resolve("01-unit-y.html", &reg), "short");
    }

    #[test]
    fn equal_prefixes_go_to_first_course() {
        let reg = CourseRegistry::new(vec![
            course("first", "https://h/03-master-a.html"),
            course("second", "https://h/03-master-b.html"),
        ]);
        assert_eq!(resolve("03-unit.html", &reg), "first");
    }

    #[test]
    fn matched_by_reads_back_from_json() {
        let v = serde_json::to_value(MatchedBy::TitleLookup).unwrap();
        assert_eq!(v, "title_lookup");
        let back: MatchedBy = serde_json::from_value(v).unwrap();
        assert_eq!(back, MatchedBy::TitleLookup);
    }

    #[test]
    fn unknown_key_falls_back_to_itself() {
        let reg = registry();
        let r = resolve_detailed("mystery-page.html", &reg);
        assert_eq!(r.course_id, "mystery-page.html");
        assert_eq!(r.matched_by, MatchedBy::Fallback);
    }
}
