//! Reference extraction from Govspeak body text.
//!
//! Edition bodies embed references to other records in two ways:
//! inline contact markers (`[Contact:12]`) and Markdown links to the admin
//! pages of other editions (`[guide](/government/admin/detailed-guides/7)`).
//! A [`Scanner`] finds the raw references, a [`Resolver`] turns each one into
//! a live record, and a [`ReferenceExtractor`] composes the two.

mod extractor;
mod scanner;

pub use extractor::{ContactsExtractor, ReferenceExtractor, Resolver};
pub use scanner::{AdminEditionLinkScanner, ContactMarkerScanner, RawRef, RefKind, Scanner};
