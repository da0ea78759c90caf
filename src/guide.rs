//! Splits instructor and assignment guide documents into per-unit segments.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    models::{Course, GuideDocument},
    registry::{strip_unit_suffix, UNIT_SUFFIX},
};

/// Keys containing this belong to course-wide content and go to the footer.
pub const MASTER_MARKER: &str = "-master-";
pub const FOOTER_SEPARATOR: &str = "<hr>";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideSegments {
    /// Kept for the rendered layout; neither document shape fills it.
    pub header: String,
    pub segments: BTreeMap<String, String>,
    pub footer: String,
    pub assignment_guides: BTreeMap<String, String>,
}

impl GuideSegments {
    pub fn instructor_for(&self, unit_key: &str, course: Option<&Course>) -> &str {
        lookup_unit(&self.segments, unit_key, course)
    }

    pub fn assignment_for(&self, unit_key: &str, course: Option<&Course>) -> &str {
        lookup_unit(&self.assignment_guides, unit_key, course)
    }
}

/// Entries are taken as they are; non-text values are skipped. A key that
/// should be course-wide but lacks [`MASTER_MARKER`] lands in `segments`.
pub fn extract(
    instructor_guide: Option<&GuideDocument>,
    assignment_guide: Option<&GuideDocument>,
) -> GuideSegments {
    let mut out = GuideSegments::default();

    match instructor_guide {
        Some(GuideDocument::Keyed(entries)) => {
            for (key, value) in entries {
                let Some(html) = value.as_str() else {
                    tracing::debug!(key = %key, "skipping non-text instructor guide entry");
                    continue;
                };
                if key.contains(MASTER_MARKER) {
                    if !out.footer.is_empty() {
                        out.footer.push_str(FOOTER_SEPARATOR);
                    }
                    out.footer.push_str(html);
                } else {
                    out.segments.insert(key.clone(), html.to_string());
                }
            }
        }
        Some(GuideDocument::Legacy(blob)) => out.footer = blob.clone(),
        Some(GuideDocument::Other(_)) | None => {}
    }

    if let Some(GuideDocument::Keyed(entries)) = assignment_guide {
        for (key, value) in entries {
            let Some(html) = value.as_str() else {
                tracing::debug!(key = %key, "skipping non-text assignment guide entry");
                continue;
            };
            // later entries overwrite earlier ones under either key
            out.assignment_guides.insert(key.clone(), html.to_string());
            out.assignment_guides
                .insert(strip_unit_suffix(key).to_string(), html.to_string());
        }
    }

    out
}

/// Try the key as given, bare, and suffixed; then the unit's 1-based
/// position in its course. Misses yield an empty string.
fn lookup_unit<'a>(
    map: &'a BTreeMap<String, String>,
    unit_key: &str,
    course: Option<&Course>,
) -> &'a str {
    let bare = strip_unit_suffix(unit_key);
    let suffixed = format!("{bare}{UNIT_SUFFIX}");
    let found = [unit_key, bare, suffixed.as_str()]
        .into_iter()
        .find_map(|k| map.get(k))
        .or_else(|| {
            let position = course?.unit_position(unit_key)?;
            map.get(&position.to_string())
        })
        .map(String::as_str)
        .unwrap_or_default();
    found
}
