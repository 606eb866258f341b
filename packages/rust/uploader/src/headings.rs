//! Column heading schemas for CSV imports.
//!
//! A schema lists the base columns a file must carry and the numbered
//! column groups it may carry. Group columns are written as templates with
//! a `#` placeholder for the index, e.g. `attachment_#_title`.

use std::collections::{BTreeSet, HashMap, HashSet};

/// Headings with this prefix are always accepted and never read.
const IGNORED_PREFIX: &str = "ignore_";

/// A repeating group of numbered columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnGroup {
    pub name: &'static str,
    /// Column templates that make up one index of the group.
    pub fields: &'static [&'static str],
    pub max_index: usize,
    /// Indices `1..=required_indices` must be present in every file.
    pub required_indices: usize,
}

/// One entry of a [`HeadingSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingEntry {
    Required(&'static str),
    Group(ColumnGroup),
}

/// One populated index of a group as read from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry<'r> {
    pub index: usize,
    /// Values in the order of [`ColumnGroup::fields`]; blank values are `None`.
    pub values: Vec<Option<&'r str>>,
}

impl<'r> GroupEntry<'r> {
    pub fn value(&self, field: usize) -> Option<&'r str> {
        self.values.get(field).copied().flatten()
    }
}

impl ColumnGroup {
    /// Column name of `field` at `index`.
    pub fn column(&self, field: usize, index: usize) -> String {
        self.fields[field].replacen('#', &index.to_string(), 1)
    }

    fn columns_at(&self, index: usize) -> impl Iterator<Item = String> + '_ {
        (0..self.fields.len()).map(move |field| self.column(field, index))
    }

    /// The index `heading` names within this group, if it is one of its
    /// columns and the index is in range.
    fn index_of(&self, heading: &str) -> Option<usize> {
        self.fields.iter().find_map(|template| {
            let (prefix, suffix) = template.split_once('#')?;
            let digits = heading.strip_prefix(prefix)?.strip_suffix(suffix)?;
            if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits
                .parse::<usize>()
                .ok()
                .filter(|index| (1..=self.max_index).contains(index))
        })
    }

    /// Populated indices of this group in `row`, in index order.
    ///
    /// Reading stops at the first index whose columns are all absent or
    /// blank. Blank values inside a populated index come back as `None`.
    pub fn read<'r>(&self, row: &'r HashMap<String, String>) -> Vec<GroupEntry<'r>> {
        let mut entries = Vec::new();
        for index in 1..=self.max_index {
            let values: Vec<Option<&'r str>> = self
                .columns_at(index)
                .map(|column| {
                    row.get(&column)
                        .map(|v| v.trim())
                        .filter(|v| !v.is_empty())
                })
                .collect();

            if values.iter().all(Option::is_none) {
                break;
            }
            entries.push(GroupEntry { index, values });
        }
        entries
    }

    /// Non-blank values of the first field, in index order.
    pub fn values<'r>(&self, row: &'r HashMap<String, String>) -> Vec<&'r str> {
        self.read(row)
            .into_iter()
            .filter_map(|entry| entry.values.first().copied().flatten())
            .collect()
    }
}

/// The full set of columns a CSV import file may carry.
#[derive(Debug, Clone, Copy)]
pub struct HeadingSchema {
    entries: &'static [HeadingEntry],
}

impl HeadingSchema {
    pub const fn new(entries: &'static [HeadingEntry]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [HeadingEntry] {
        self.entries
    }

    /// Look up a group by name.
    pub fn group(&self, name: &str) -> Option<&'static ColumnGroup> {
        self.entries.iter().find_map(|entry| match entry {
            HeadingEntry::Group(group) if group.name == name => Some(group),
            _ => None,
        })
    }

    /// Problems with a file's heading row, or nothing if it is well formed.
    ///
    /// Produces at most two messages: one listing every missing column,
    /// then one listing every column the schema does not know.
    pub fn validation_errors<S: AsRef<str>>(&self, headings: &[S]) -> Vec<String> {
        let present: HashSet<&str> = headings.iter().map(AsRef::as_ref).collect();
        let mut missing = Vec::new();

        for entry in self.entries {
            match entry {
                HeadingEntry::Required(name) => {
                    if !present.contains(name) {
                        missing.push((*name).to_string());
                    }
                }
                HeadingEntry::Group(group) => {
                    let mut indices: BTreeSet<usize> = (1..=group.required_indices).collect();
                    indices.extend(present.iter().filter_map(|h| group.index_of(h)));

                    for index in indices {
                        missing.extend(group.columns_at(index).filter(|c| !present.contains(c.as_str())));
                    }
                }
            }
        }

        let unexpected: Vec<&str> = headings
            .iter()
            .map(AsRef::as_ref)
            .filter(|heading| !self.accepts(heading))
            .collect();

        let mut errors = Vec::new();
        if !missing.is_empty() {
            errors.push(format!("missing fields: {}", quote_list(&missing)));
        }
        if !unexpected.is_empty() {
            errors.push(format!("unexpected fields: {}", quote_list(&unexpected)));
        }
        errors
    }

    fn accepts(&self, heading: &str) -> bool {
        heading.starts_with(IGNORED_PREFIX)
            || self.entries.iter().any(|entry| match entry {
                HeadingEntry::Required(name) => *name == heading,
                HeadingEntry::Group(group) => group.index_of(heading).is_some(),
            })
    }
}

fn quote_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("'{}'", item.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Detailed guide schema
// ---------------------------------------------------------------------------

pub const TOPICS: ColumnGroup = ColumnGroup {
    name: "topics",
    fields: &["topic_#"],
    max_index: 4,
    required_indices: 2,
};

pub const MAINSTREAM_CATEGORIES: ColumnGroup = ColumnGroup {
    name: "mainstream_categories",
    fields: &["detailed_guidance_category_#"],
    max_index: 4,
    required_indices: 2,
};

pub const DOCUMENT_COLLECTIONS: ColumnGroup = ColumnGroup {
    name: "document_collections",
    fields: &["document_collection_#"],
    max_index: 4,
    required_indices: 2,
};

pub const RELATED_DETAILED_GUIDES: ColumnGroup = ColumnGroup {
    name: "related_detailed_guides",
    fields: &["related_detailed_guide_#"],
    max_index: 10,
    required_indices: 2,
};

pub const RELATED_MAINSTREAM_CONTENT: ColumnGroup = ColumnGroup {
    name: "related_mainstream_content",
    fields: &["related_mainstream_content_url_#", "related_mainstream_content_title_#"],
    max_index: 2,
    required_indices: 2,
};

pub const ATTACHMENTS: ColumnGroup = ColumnGroup {
    name: "attachments",
    fields: &["attachment_#_title", "attachment_#_url"],
    max_index: 99,
    required_indices: 0,
};

pub static DETAILED_GUIDE_HEADINGS: HeadingSchema = HeadingSchema::new(&[
    HeadingEntry::Required("old_url"),
    HeadingEntry::Required("title"),
    HeadingEntry::Required("summary"),
    HeadingEntry::Required("body"),
    HeadingEntry::Required("organisation"),
    HeadingEntry::Group(TOPICS),
    HeadingEntry::Group(MAINSTREAM_CATEGORIES),
    HeadingEntry::Group(DOCUMENT_COLLECTIONS),
    HeadingEntry::Group(RELATED_DETAILED_GUIDES),
    HeadingEntry::Group(RELATED_MAINSTREAM_CONTENT),
    HeadingEntry::Required("first_published"),
    HeadingEntry::Group(ATTACHMENTS),
]);

/// Validate the heading row of a detailed guide import file.
pub fn heading_validation_errors<S: AsRef<str>>(headings: &[S]) -> Vec<String> {
    DETAILED_GUIDE_HEADINGS.validation_errors(headings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_headings() -> Vec<&'static str> {
        vec![
            "old_url",
            "title",
            "summary",
            "body",
            "organisation",
            "topic_1",
            "topic_2",
            "detailed_guidance_category_1",
            "detailed_guidance_category_2",
            "document_collection_1",
            "document_collection_2",
            "related_detailed_guide_1",
            "related_detailed_guide_2",
            "related_mainstream_content_url_1",
            "related_mainstream_content_title_1",
            "related_mainstream_content_url_2",
            "related_mainstream_content_title_2",
            "first_published",
        ]
    }

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn basic_headings_are_valid() {
        assert!(heading_validation_errors(&basic_headings()).is_empty());
    }

    #[test]
    fn complete_attachment_headings_are_valid() {
        let mut headings = basic_headings();
        headings.extend(["attachment_1_url", "attachment_1_title"]);
        assert!(heading_validation_errors(&headings).is_empty());
    }

    #[test]
    fn partial_attachment_pair_is_reported() {
        let mut headings = basic_headings();
        headings.push("attachment_1_title");
        assert_eq!(
            heading_validation_errors(&headings),
            vec!["missing fields: 'attachment_1_url'".to_string()]
        );
    }

    #[test]
    fn url_without_title_is_reported() {
        let mut headings = basic_headings();
        headings.push("attachment_1_url");
        assert_eq!(
            heading_validation_errors(&headings),
            vec!["missing fields: 'attachment_1_title'".to_string()]
        );

        headings.extend(["attachment_1_title", "attachment_2_url"]);
        assert_eq!(
            heading_validation_errors(&headings),
            vec!["missing fields: 'attachment_2_title'".to_string()]
        );
    }

    #[test]
    fn missing_base_headings_are_listed_together() {
        let headings: Vec<&str> = basic_headings()
            .into_iter()
            .filter(|h| *h != "summary" && *h != "topic_2")
            .collect();
        assert_eq!(
            heading_validation_errors(&headings),
            vec!["missing fields: 'summary', 'topic_2'".to_string()]
        );
    }

    #[test]
    fn optional_group_indices_beyond_required_are_accepted() {
        let mut headings = basic_headings();
        headings.extend(["topic_3", "topic_4", "related_detailed_guide_10"]);
        assert!(heading_validation_errors(&headings).is_empty());
    }

    #[test]
    fn unknown_and_out_of_range_headings_are_unexpected() {
        let mut headings = basic_headings();
        headings.extend(["colour", "topic_5", "topic_01", "ignore_notes"]);
        assert_eq!(
            heading_validation_errors(&headings),
            vec!["unexpected fields: 'colour', 'topic_5', 'topic_01'".to_string()]
        );
    }

    #[test]
    fn missing_comes_before_unexpected() {
        let mut headings = basic_headings();
        headings.retain(|h| *h != "body");
        headings.push("bodies");
        assert_eq!(
            heading_validation_errors(&headings),
            vec![
                "missing fields: 'body'".to_string(),
                "unexpected fields: 'bodies'".to_string(),
            ]
        );
    }

    #[test]
    fn read_drops_blank_values_and_stops_at_empty_index() {
        let data = row(&[
            ("document_collection_1", "collection-slug"),
            ("document_collection_2", ""),
            ("document_collection_3", "ignored-after-gap"),
        ]);
        assert_eq!(DOCUMENT_COLLECTIONS.values(&data), vec!["collection-slug"]);
    }

    #[test]
    fn read_keeps_partially_filled_indices() {
        let data = row(&[
            ("attachment_1_title", "Annual report"),
            ("attachment_1_url", " "),
            ("attachment_2_url", "http://example.com/b.pdf"),
        ]);
        let entries = ATTACHMENTS.read(&data);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value(0), Some("Annual report"));
        assert_eq!(entries[0].value(1), None);
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].value(1), Some("http://example.com/b.pdf"));
    }

    #[test]
    fn group_lookup_by_name() {
        assert_eq!(DETAILED_GUIDE_HEADINGS.group("topics"), Some(&TOPICS));
        assert!(DETAILED_GUIDE_HEADINGS.group("people").is_none());
        assert_eq!(ATTACHMENTS.column(1, 12), "attachment_12_url");
    }
}
