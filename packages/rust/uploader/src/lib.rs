//! Bulk import of detailed guides from CSV files.
//!
//! - [`headings`]: the column schema and heading-row validation
//! - [`DetailedGuideRow`]: maps one record onto edition attributes
//! - [`AttachmentCache`]: fetches attachment files once and keeps them on disk
//!
//! Headings are validated for the whole file before any row is read.

mod attachment_cache;
mod dates;
pub mod headings;
mod logger;
mod lookup;
mod row;

pub use attachment_cache::{AttachmentCache, AttachmentFetcher, AttachmentSource, FileAttachment};
pub use dates::parse_first_published;
pub use headings::{HeadingSchema, heading_validation_errors};
pub use logger::{RecordingRowLogger, RowLogger, RowWarning, TracingRowLogger};
pub use lookup::SlugLookup;
pub use row::{DetailedGuideAttributes, DetailedGuideRow};
