//! Rolls per-unit time tracking up into per-course totals.

use std::collections::BTreeMap;

use crate::{
    models::{AggregatedCourseProgress, UnitProgressRecord},
    registry::CourseRegistry,
    resolver::resolve,
};

/// A student's progress document: raw unit key -> record.
pub type ProgressDocument = BTreeMap<String, UnitProgressRecord>;

/// Resolved course id -> rollup.
pub type CourseProgressMap = BTreeMap<String, AggregatedCourseProgress>;

/// Sum every record into the bucket of the course its key resolves to.
///
/// Records are kept verbatim under `units`, so the per-course sums can always
/// be recomputed from them. Logs are concatenated in key order.
pub fn aggregate(raw: &ProgressDocument, registry: &CourseRegistry) -> CourseProgressMap {
    let mut out = CourseProgressMap::new();
    for (raw_key, record) in raw {
        let course_id = resolve(raw_key, registry);
        let bucket = out.entry(course_id).or_default();
        bucket.total += record.total;
        bucket.video += record.video;
        bucket.doc += record.doc;
        bucket.page += record.page;
        bucket.logs.extend(record.logs.iter().cloned());
        bucket.units.insert(raw_key.clone(), record.clone());
    }
    out
}

/// Decode a stored progress document entry by entry. Entries that are not
/// records are dropped; a document that is not an object yields nothing.
pub fn records_from_document(doc: serde_json::Value) -> ProgressDocument {
    let serde_json::Value::Object(entries) = doc else {
        tracing::debug!("progress document is not an object, ignoring");
        return ProgressDocument::new();
    };
    let mut out = ProgressDocument::new();
    for (key, value) in entries {
        match serde_json::from_value::<UnitProgressRecord>(value) {
            Ok(record) => {
                out.insert(key, record);
            }
            Err(e) => tracing::debug!(key = %key, error = %e, "skipping malformed progress entry"),
        }
    }
    out
}
