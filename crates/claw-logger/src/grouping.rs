//! Partitioning of buffered records by entry attributes.
//!
//! Each configured [`GroupKey`] contributes one URL-encoded path segment, in
//! configured order, so `[Level, Module]` lays files out as
//! `{storage}/{level}/{module}/{file}`.

use std::collections::HashMap;
use std::path::PathBuf;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::types::GroupKey;

/// Characters left as-is by URI component encoding.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Records that expose the attributes used for grouping.
pub trait Grouped {
    /// Returns the value of a grouping attribute.
    fn attribute(&self, key: GroupKey) -> &str;
}

/// Encodes one attribute value as a single safe path segment.
///
/// Values made only of dots, and empty values, are escaped so a segment can
/// never walk out of the storage directory.
#[must_use]
pub fn encode_segment(value: &str) -> String {
    if value.is_empty() {
        return "%00".to_string();
    }
    if value.chars().all(|c| c == '.') {
        return "%2E".repeat(value.len());
    }
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Returns the relative directory for a record under the given keys.
pub fn group_dir<R: Grouped>(record: &R, keys: &[GroupKey]) -> PathBuf {
    keys.iter()
        .map(|key| encode_segment(record.attribute(*key)))
        .collect()
}

/// One partition of a grouped flush.
#[derive(Debug)]
pub struct Group<R> {
    /// Directory relative to the storage path.
    pub dir: PathBuf,
    /// Records with their position in the original buffer, in append order.
    pub records: Vec<(usize, R)>,
}

/// Splits records into groups, preserving append order inside each group and
/// first-seen order across groups.
pub fn partition<R: Grouped>(records: Vec<R>, keys: &[GroupKey]) -> Vec<Group<R>> {
    let mut groups: Vec<Group<R>> = Vec::new();
    let mut index: HashMap<PathBuf, usize> = HashMap::new();

    for (position, record) in records.into_iter().enumerate() {
        let dir = group_dir(&record, keys);
        let slot = *index.entry(dir.clone()).or_insert_with(|| {
            groups.push(Group {
                dir,
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push((position, record));
    }

    groups
}
