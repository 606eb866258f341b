//! Slug lookups the row importer resolves CSV values against.

use publisher_shared::{Document, EditionKind, MainstreamCategory, Organisation, Result, Topic};
use publisher_storage::Storage;

/// Record stores keyed by slug.
///
/// `Ok(None)` means no record carries the slug. Errors are lookup failures.
#[allow(async_fn_in_trait)]
pub trait SlugLookup {
    async fn organisation(&self, slug: &str) -> Result<Option<Organisation>>;
    async fn topic(&self, slug: &str) -> Result<Option<Topic>>;
    async fn mainstream_category(&self, slug: &str) -> Result<Option<MainstreamCategory>>;
    async fn document(&self, kind: EditionKind, slug: &str) -> Result<Option<Document>>;
}

impl SlugLookup for Storage {
    async fn organisation(&self, slug: &str) -> Result<Option<Organisation>> {
        self.find_organisation_by_slug(slug).await
    }

    async fn topic(&self, slug: &str) -> Result<Option<Topic>> {
        self.find_topic_by_slug(slug).await
    }

    async fn mainstream_category(&self, slug: &str) -> Result<Option<MainstreamCategory>> {
        self.find_mainstream_category_by_slug(slug).await
    }

    async fn document(&self, kind: EditionKind, slug: &str) -> Result<Option<Document>> {
        self.find_document_by_slug(kind, slug).await
    }
}

impl<L: SlugLookup + ?Sized> SlugLookup for &L {
    async fn organisation(&self, slug: &str) -> Result<Option<Organisation>> {
        (**self).organisation(slug).await
    }

    async fn topic(&self, slug: &str) -> Result<Option<Topic>> {
        (**self).topic(slug).await
    }

    async fn mainstream_category(&self, slug: &str) -> Result<Option<MainstreamCategory>> {
        (**self).mainstream_category(slug).await
    }

    async fn document(&self, kind: EditionKind, slug: &str) -> Result<Option<Document>> {
        (**self).document(kind, slug).await
    }
}
