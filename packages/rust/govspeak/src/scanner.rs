//! Scanners that find raw references in Govspeak text.
//!
//! Scanners never touch storage. They report what the text *says* it refers
//! to; whether the record exists is the [`Resolver`](crate::Resolver)'s job.

use std::sync::LazyLock;

use publisher_shared::EditionKind;
use regex::Regex;
use tracing::trace;

/// What a raw reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Contact,
    /// An edition, with the format implied by the link that named it.
    Edition(EditionKind),
}

/// A reference as written in the text, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawRef {
    pub kind: RefKind,
    pub id: i64,
}

impl RawRef {
    pub fn contact(id: i64) -> Self {
        Self {
            kind: RefKind::Contact,
            id,
        }
    }

    pub fn edition(kind: EditionKind, id: i64) -> Self {
        Self {
            kind: RefKind::Edition(kind),
            id,
        }
    }
}

/// Finds references in text.
///
/// Implementations return every non-overlapping match in order of
/// appearance, duplicates included. Text that does not match the scanner's
/// syntax exactly is not a reference.
pub trait Scanner {
    fn extract(&self, text: &str) -> Vec<RawRef>;
}

impl<S: Scanner + ?Sized> Scanner for &S {
    fn extract(&self, text: &str) -> Vec<RawRef> {
        (**self).extract(text)
    }
}

/// Runs both scanners and concatenates their results, first scanner first.
impl<A: Scanner, B: Scanner> Scanner for (A, B) {
    fn extract(&self, text: &str) -> Vec<RawRef> {
        let mut refs = self.0.extract(text);
        refs.extend(self.1.extract(text));
        refs
    }
}

// ---------------------------------------------------------------------------
// Contact markers
// ---------------------------------------------------------------------------

/// Matches inline contact markers: `[Contact:<digits>]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactMarkerScanner;

impl Scanner for ContactMarkerScanner {
    fn extract(&self, text: &str) -> Vec<RawRef> {
        static CONTACT_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\[Contact:(\d+)\]").expect("valid contact regex"));

        let refs: Vec<RawRef> = CONTACT_RE
            .captures_iter(text)
            .filter_map(|caps| caps[1].parse::<i64>().ok())
            .map(RawRef::contact)
            .collect();

        trace!(count = refs.len(), "contact markers scanned");
        refs
    }
}

// ---------------------------------------------------------------------------
// Admin edition links
// ---------------------------------------------------------------------------

/// Matches Markdown link targets that point at an edition's admin page,
/// e.g. `[statement](/government/admin/speeches/12)`. The host is optional,
/// so `https://www.gov.uk/government/admin/news/3` counts too. Links whose
/// segment names no known format are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminEditionLinkScanner;

impl Scanner for AdminEditionLinkScanner {
    fn extract(&self, text: &str) -> Vec<RawRef> {
        static ADMIN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\]\((?:https?://[^/\s)]+)?/government/admin/([a-z-]+)/(\d+)(?:[/?#][^)\s]*)?\)")
                .expect("valid admin link regex")
        });

        let refs: Vec<RawRef> = ADMIN_LINK_RE
            .captures_iter(text)
            .filter_map(|caps| {
                let kind = EditionKind::from_admin_segment(&caps[1])?;
                let id = caps[2].parse::<i64>().ok()?;
                Some(RawRef::edition(kind, id))
            })
            .collect();

        trace!(count = refs.len(), "admin edition links scanned");
        refs
    }
}
