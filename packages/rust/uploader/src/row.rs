//! Mapping of one detailed guide CSV row onto edition attributes.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::instrument;

use publisher_shared::{
    Document, EditionKind, MainstreamCategory, Organisation, Result, Topic,
};

use crate::attachment_cache::{AttachmentFetcher, FileAttachment};
use crate::dates::parse_first_published;
use crate::headings::{
    ATTACHMENTS, DOCUMENT_COLLECTIONS, MAINSTREAM_CATEGORIES, RELATED_DETAILED_GUIDES,
    RELATED_MAINSTREAM_CONTENT, TOPICS,
};
use crate::logger::RowLogger;
use crate::lookup::SlugLookup;

/// Everything a row contributes to a new detailed guide edition.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedGuideAttributes {
    pub title: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub first_published_at: Option<DateTime<Utc>>,
    pub topics: Vec<Topic>,
    pub primary_mainstream_category: Option<MainstreamCategory>,
    pub other_mainstream_categories: Vec<MainstreamCategory>,
    pub related_documents: Vec<Document>,
    pub related_mainstream_content_url: Option<String>,
    pub related_mainstream_content_title: Option<String>,
    pub additional_related_mainstream_content_url: Option<String>,
    pub additional_related_mainstream_content_title: Option<String>,
    pub lead_organisations: Vec<Organisation>,
    pub alternative_format_provider: Option<Organisation>,
    pub attachments: Vec<FileAttachment>,
}

/// One CSV record plus what is needed to resolve it.
///
/// Slug columns that match no record are dropped and logged. Attachment
/// fetch failures and unparseable dates are returned as errors.
pub struct DetailedGuideRow<F, G, L> {
    row: HashMap<String, String>,
    line_number: usize,
    fetcher: F,
    default_organisation: Organisation,
    logger: G,
    lookup: L,
}

impl<F, G, L> DetailedGuideRow<F, G, L>
where
    F: AttachmentFetcher,
    G: RowLogger,
    L: SlugLookup,
{
    pub fn new(
        row: HashMap<String, String>,
        line_number: usize,
        fetcher: F,
        default_organisation: Organisation,
        logger: G,
        lookup: L,
    ) -> Self {
        Self {
            row,
            line_number,
            fetcher,
            default_organisation,
            logger,
            lookup,
        }
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Trimmed value of a column, `None` when absent or blank.
    fn field(&self, column: &str) -> Option<&str> {
        self.row
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn warn(&self, message: &str) {
        self.logger.warn(self.line_number, message);
    }

    // -----------------------------------------------------------------------
    // Plain columns
    // -----------------------------------------------------------------------

    pub fn title(&self) -> &str {
        self.field("title").unwrap_or_default()
    }

    pub fn summary(&self) -> Option<&str> {
        self.field("summary")
    }

    pub fn body(&self) -> Option<&str> {
        self.field("body")
    }

    /// The page this guide is imported from.
    pub fn legacy_url(&self) -> Option<&str> {
        self.field("old_url")
    }

    /// Collection slugs, unresolved. Memberships are added once the
    /// document exists.
    pub fn document_collections(&self) -> Vec<&str> {
        DOCUMENT_COLLECTIONS.values(&self.row)
    }

    pub fn first_published_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.field("first_published")
            .map(parse_first_published)
            .transpose()
    }

    // -----------------------------------------------------------------------
    // Related mainstream content: index 1 is primary, index 2 additional
    // -----------------------------------------------------------------------

    fn mainstream_content(&self, index: usize) -> (Option<&str>, Option<&str>) {
        RELATED_MAINSTREAM_CONTENT
            .read(&self.row)
            .into_iter()
            .find(|entry| entry.index == index)
            .map(|entry| (entry.value(0), entry.value(1)))
            .unwrap_or_default()
    }

    pub fn related_mainstream_content_url(&self) -> Option<&str> {
        self.mainstream_content(1).0
    }

    pub fn related_mainstream_content_title(&self) -> Option<&str> {
        self.mainstream_content(1).1
    }

    pub fn additional_related_mainstream_content_url(&self) -> Option<&str> {
        self.mainstream_content(2).0
    }

    pub fn additional_related_mainstream_content_title(&self) -> Option<&str> {
        self.mainstream_content(2).1
    }

    // -----------------------------------------------------------------------
    // Slug-resolved columns
    // -----------------------------------------------------------------------

    async fn resolve_slugs<'s, T, Fut>(
        &'s self,
        what: &str,
        slugs: Vec<&'s str>,
        find: impl Fn(&'s str) -> Fut,
    ) -> Result<Vec<T>>
    where
        Fut: Future<Output = Result<Option<T>>>,
    {
        let mut found = Vec::with_capacity(slugs.len());
        for slug in slugs {
            match find(slug).await? {
                Some(record) => found.push(record),
                None => self.warn(&format!("unable to find {what} with slug '{slug}'")),
            }
        }
        Ok(found)
    }

    pub async fn topics(&self) -> Result<Vec<Topic>> {
        self.resolve_slugs("topic", TOPICS.values(&self.row), |slug| {
            self.lookup.topic(slug)
        })
        .await
    }

    /// Category named in `detailed_guidance_category_1`.
    pub async fn primary_mainstream_category(&self) -> Result<Option<MainstreamCategory>> {
        let slugs = self.category_slugs(|index| index == 1);
        let found = self
            .resolve_slugs("mainstream category", slugs, |slug| {
                self.lookup.mainstream_category(slug)
            })
            .await?;
        Ok(found.into_iter().next())
    }

    /// Categories named in `detailed_guidance_category_2` onwards.
    pub async fn other_mainstream_categories(&self) -> Result<Vec<MainstreamCategory>> {
        let slugs = self.category_slugs(|index| index >= 2);
        self.resolve_slugs("mainstream category", slugs, |slug| {
            self.lookup.mainstream_category(slug)
        })
        .await
    }

    fn category_slugs(&self, wanted: impl Fn(usize) -> bool) -> Vec<&str> {
        MAINSTREAM_CATEGORIES
            .read(&self.row)
            .into_iter()
            .filter(|entry| wanted(entry.index))
            .filter_map(|entry| entry.value(0))
            .collect()
    }

    /// Documents of other detailed guides named in `related_detailed_guide_N`.
    pub async fn related_documents(&self) -> Result<Vec<Document>> {
        self.resolve_slugs(
            "detailed guide",
            RELATED_DETAILED_GUIDES.values(&self.row),
            |slug| self.lookup.document(EditionKind::DetailedGuide, slug),
        )
        .await
    }

    /// The organisation column, or the default organisation when it is
    /// blank or names no organisation.
    pub async fn organisations(&self) -> Result<Vec<Organisation>> {
        let Some(slug) = self.field("organisation") else {
            return Ok(vec![self.default_organisation.clone()]);
        };

        let found = self
            .resolve_slugs("organisation", vec![slug], |slug| {
                self.lookup.organisation(slug)
            })
            .await?;
        if found.is_empty() {
            return Ok(vec![self.default_organisation.clone()]);
        }
        Ok(found)
    }

    pub async fn lead_organisations(&self) -> Result<Vec<Organisation>> {
        self.organisations().await
    }

    pub async fn alternative_format_provider(&self) -> Result<Option<Organisation>> {
        Ok(self.organisations().await?.into_iter().next())
    }

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    /// Fetch every attachment the row names, in column order.
    pub async fn attachments(&self) -> Result<Vec<FileAttachment>> {
        let mut attachments = Vec::new();
        for entry in ATTACHMENTS.read(&self.row) {
            let Some(url) = entry.value(1) else {
                self.warn(&format!(
                    "attachment {} has a title but no url; skipped",
                    entry.index
                ));
                continue;
            };
            let title = entry.value(0).unwrap_or_default();
            if title.is_empty() {
                self.warn(&format!("attachment {} has no title", entry.index));
            }

            let source = self.fetcher.fetch(url, self.line_number).await?;
            attachments.push(FileAttachment {
                title: title.to_string(),
                source,
            });
        }
        Ok(attachments)
    }

    // -----------------------------------------------------------------------
    // Aggregate
    // -----------------------------------------------------------------------

    /// All attributes of the row. Stops at the first error.
    #[instrument(skip(self), fields(line = self.line_number))]
    pub async fn attributes(&self) -> Result<DetailedGuideAttributes> {
        let organisations = self.organisations().await?;

        Ok(DetailedGuideAttributes {
            title: self.title().to_string(),
            summary: self.summary().map(str::to_string),
            body: self.body().map(str::to_string),
            first_published_at: self.first_published_at()?,
            topics: self.topics().await?,
            primary_mainstream_category: self.primary_mainstream_category().await?,
            other_mainstream_categories: self.other_mainstream_categories().await?,
            related_documents: self.related_documents().await?,
            related_mainstream_content_url: self.related_mainstream_content_url().map(str::to_string),
            related_mainstream_content_title: self
                .related_mainstream_content_title()
                .map(str::to_string),
            additional_related_mainstream_content_url: self
                .additional_related_mainstream_content_url()
                .map(str::to_string),
            additional_related_mainstream_content_title: self
                .additional_related_mainstream_content_title()
                .map(str::to_string),
            alternative_format_provider: organisations.first().cloned(),
            lead_organisations: organisations,
            attachments: self.attachments().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use chrono::TimeZone;
    use publisher_shared::{AttachmentCacheConfig, PublisherError};
    use publisher_storage::{NewEdition, Storage};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::attachment_cache::{AttachmentCache, AttachmentSource};
    use crate::logger::RecordingRowLogger;

    const LINE: usize = 1;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("publisher_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    async fn default_organisation(storage: &Storage) -> Organisation {
        storage
            .insert_organisation("government-digital-service", "Government Digital Service", None)
            .await
            .unwrap();
        storage
            .find_organisation_by_slug("government-digital-service")
            .await
            .unwrap()
            .unwrap()
    }

    /// Serves every URL from a fixture path without touching the network.
    struct StubFetcher;

    impl AttachmentFetcher for StubFetcher {
        async fn fetch(&self, url: &str, _line_number: usize) -> Result<AttachmentSource> {
            Ok(AttachmentSource {
                url: url.to_string(),
                path: PathBuf::from("fixtures/two-pages.pdf"),
                content_type: Some("application/pdf".into()),
                file_size: 1024,
            })
        }
    }

    struct FailingFetcher;

    impl AttachmentFetcher for FailingFetcher {
        async fn fetch(&self, url: &str, line_number: usize) -> Result<AttachmentSource> {
            Err(PublisherError::attachment(url, line_number, "HTTP 500"))
        }
    }

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn new_row<'a>(
        storage: &'a Storage,
        logger: &'a RecordingRowLogger,
        pairs: &[(&str, &str)],
    ) -> DetailedGuideRow<StubFetcher, &'a RecordingRowLogger, &'a Storage> {
        let organisation = default_organisation(storage).await;
        DetailedGuideRow::new(data(pairs), LINE, StubFetcher, organisation, logger, storage)
    }

    #[tokio::test]
    async fn document_collections_reject_blanks() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = new_row(
            &storage,
            &logger,
            &[("document_collection_1", "collection-slug"), ("document_collection_2", "")],
        )
        .await;
        assert_eq!(row.document_collections(), vec!["collection-slug"]);
    }

    #[tokio::test]
    async fn finds_topics_by_slug_and_drops_unknown() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        storage.insert_topic("tax", "Tax").await.unwrap();
        let row = new_row(&storage, &logger, &[("topic_1", "tax"), ("topic_2", "no-such-topic")]).await;

        let topics = row.attributes().await.unwrap().topics;
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].slug, "tax");

        let warnings = logger.take();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line_number, LINE);
        assert!(warnings[0].message.contains("no-such-topic"));
    }

    #[tokio::test]
    async fn mainstream_categories_are_positional() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        storage
            .insert_mainstream_category("my-detailed-guidance", "My Detailed Guidance", "business")
            .await
            .unwrap();
        storage
            .insert_mainstream_category("other-detailed-guidance", "Other Detailed Guidance", "business")
            .await
            .unwrap();
        let row = new_row(
            &storage,
            &logger,
            &[
                ("detailed_guidance_category_1", "my-detailed-guidance"),
                ("detailed_guidance_category_2", "other-detailed-guidance"),
            ],
        )
        .await;

        let attributes = row.attributes().await.unwrap();
        assert_eq!(
            attributes.primary_mainstream_category.map(|c| c.slug).as_deref(),
            Some("my-detailed-guidance")
        );
        let others: Vec<String> = attributes
            .other_mainstream_categories
            .into_iter()
            .map(|c| c.slug)
            .collect();
        assert_eq!(others, vec!["other-detailed-guidance"]);
    }

    #[tokio::test]
    async fn finds_related_detailed_guide_documents() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let (document_id, _) = storage
            .create_document_with_edition(
                "vat-rates",
                NewEdition::new(0, EditionKind::DetailedGuide, "VAT rates"),
            )
            .await
            .unwrap();
        storage
            .create_document_with_edition("budget", NewEdition::new(0, EditionKind::Speech, "Budget"))
            .await
            .unwrap();
        let row = new_row(
            &storage,
            &logger,
            &[("related_detailed_guide_1", "vat-rates"), ("related_detailed_guide_2", "budget")],
        )
        .await;

        let related = row.related_documents().await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, document_id);
    }

    #[tokio::test]
    async fn related_mainstream_content_maps_by_index() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = new_row(
            &storage,
            &logger,
            &[
                ("related_mainstream_content_url_1", "http://example.com/1"),
                ("related_mainstream_content_title_1", "Example 1"),
                ("related_mainstream_content_url_2", "http://example.com/2"),
                ("related_mainstream_content_title_2", "Example 2"),
            ],
        )
        .await;

        let attributes = row.attributes().await.unwrap();
        assert_eq!(attributes.related_mainstream_content_url.as_deref(), Some("http://example.com/1"));
        assert_eq!(attributes.related_mainstream_content_title.as_deref(), Some("Example 1"));
        assert_eq!(
            attributes.additional_related_mainstream_content_url.as_deref(),
            Some("http://example.com/2")
        );
        assert_eq!(
            attributes.additional_related_mainstream_content_title.as_deref(),
            Some("Example 2")
        );
    }

    #[tokio::test]
    async fn lead_organisations_fall_back_to_default() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();

        let row = new_row(&storage, &logger, &[]).await;
        let lead = row.lead_organisations().await.unwrap();
        assert_eq!(lead.len(), 1);
        assert_eq!(lead[0].slug, "government-digital-service");
        assert!(logger.is_empty());

        let row = DetailedGuideRow::new(
            data(&[("organisation", "ministry-of-magic")]),
            LINE,
            StubFetcher,
            lead[0].clone(),
            &logger,
            &storage,
        );
        let lead = row.lead_organisations().await.unwrap();
        assert_eq!(lead[0].slug, "government-digital-service");
        assert_eq!(logger.len(), 1);
        assert_eq!(
            row.alternative_format_provider().await.unwrap().map(|o| o.slug).as_deref(),
            Some("government-digital-service")
        );
    }

    #[tokio::test]
    async fn named_organisation_is_used() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let default = default_organisation(&storage).await;
        storage.insert_organisation("hm-treasury", "HM Treasury", None).await.unwrap();

        let row = DetailedGuideRow::new(
            data(&[("organisation", "hm-treasury")]),
            LINE,
            StubFetcher,
            default,
            &logger,
            &storage,
        );
        let attributes = row.attributes().await.unwrap();
        assert_eq!(attributes.lead_organisations[0].slug, "hm-treasury");
        assert_eq!(
            attributes.alternative_format_provider.map(|o| o.slug).as_deref(),
            Some("hm-treasury")
        );
    }

    #[tokio::test]
    async fn attachments_carry_title_and_source_url() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = new_row(
            &storage,
            &logger,
            &[
                ("attachment_1_title", "first title"),
                ("attachment_1_url", "http://example.com/attachment.pdf"),
            ],
        )
        .await;

        let attachments = row.attachments().await.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].title, "first title");
        assert_eq!(attachments[0].source.url, "http://example.com/attachment.pdf");
    }

    #[tokio::test]
    async fn attachments_fetched_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/attachment.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4".to_vec()),
            )
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let cache = AttachmentCache::new(AttachmentCacheConfig {
            cache_dir: std::env::temp_dir().join(format!("publisher_cache_{}", Uuid::now_v7())),
            timeout: Duration::from_secs(5),
            max_redirects: 2,
        })
        .unwrap();
        let url = format!("{}/attachment.pdf", server.uri());
        let row = DetailedGuideRow::new(
            data(&[("attachment_1_title", "first title"), ("attachment_1_url", url.as_str())]),
            LINE,
            &cache,
            default_organisation(&storage).await,
            &logger,
            &storage,
        );

        let attachments = row.attachments().await.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].title, "first title");
        assert_eq!(attachments[0].source.url, url);
        assert_eq!(attachments[0].source.file_size, 8);
    }

    #[tokio::test]
    async fn attachment_fetch_failures_propagate() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = DetailedGuideRow::new(
            data(&[
                ("title", "Guide"),
                ("attachment_1_title", "first title"),
                ("attachment_1_url", "http://example.com/attachment.pdf"),
            ]),
            9,
            FailingFetcher,
            default_organisation(&storage).await,
            &logger,
            &storage,
        );

        let err = row.attributes().await.unwrap_err();
        assert!(matches!(err, PublisherError::AttachmentRetrieval { line_number: 9, .. }));
    }

    #[tokio::test]
    async fn attachment_without_url_is_skipped() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = new_row(&storage, &logger, &[("attachment_1_title", "orphan")]).await;

        assert!(row.attachments().await.unwrap().is_empty());
        assert_eq!(logger.len(), 1);
    }

    #[tokio::test]
    async fn finds_first_published() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = new_row(&storage, &logger, &[("first_published", "11-Jan-2011")]).await;

        assert_eq!(
            row.attributes().await.unwrap().first_published_at,
            Some(Utc.with_ymd_and_hms(2011, 1, 11, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn invalid_first_published_is_an_error() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = new_row(&storage, &logger, &[("first_published", "soon")]).await;

        assert!(matches!(
            row.attributes().await.unwrap_err(),
            PublisherError::Parse { .. }
        ));
    }

    #[tokio::test]
    async fn plain_columns_are_trimmed() {
        let storage = test_storage().await;
        let logger = RecordingRowLogger::new();
        let row = new_row(
            &storage,
            &logger,
            &[
                ("old_url", " http://legacy.example.com/vat "),
                ("title", "  VAT  "),
                ("summary", ""),
                ("body", "See [Contact:1]"),
            ],
        )
        .await;

        assert_eq!(row.legacy_url(), Some("http://legacy.example.com/vat"));
        assert_eq!(row.title(), "VAT");
        assert_eq!(row.summary(), None);
        assert_eq!(row.body(), Some("See [Contact:1]"));
    }
}
