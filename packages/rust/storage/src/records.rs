//! Reference records: organisations, topics, mainstream categories,
//! document collections, contacts, documents and edition images.

use libsql::params;
use publisher_shared::{
    Contact, Document, DocumentCollection, EditionKind, Image, MainstreamCategory, Organisation,
    PublisherError, Result, Topic,
};

use crate::{Storage, get_i64, get_opt_string, get_string};

impl Storage {
    // -----------------------------------------------------------------------
    // Organisations
    // -----------------------------------------------------------------------

    /// Insert an organisation. Returns its id.
    pub async fn insert_organisation(
        &self,
        slug: &str,
        name: &str,
        default_news_image: Option<&Image>,
    ) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO organisations (slug, name, default_news_image_url, default_news_image_alt)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    slug,
                    name,
                    default_news_image.map(|i| i.url.as_str()),
                    default_news_image.map(|i| i.alt_text.as_str()),
                ],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub async fn find_organisation_by_slug(&self, slug: &str) -> Result<Option<Organisation>> {
        self.query_organisations(
            "SELECT id, slug, name, default_news_image_url, default_news_image_alt
             FROM organisations WHERE slug = ?1",
            params![slug],
        )
        .await
        .map(|mut orgs| orgs.pop())
    }

    /// Lead organisations of an edition, in their stored order.
    pub async fn lead_organisations_for_edition(&self, edition_id: i64) -> Result<Vec<Organisation>> {
        self.query_organisations(
            "SELECT o.id, o.slug, o.name, o.default_news_image_url, o.default_news_image_alt
             FROM edition_organisations eo
             JOIN organisations o ON o.id = eo.organisation_id
             WHERE eo.edition_id = ?1 AND eo.lead = 1
             ORDER BY eo.ordering",
            params![edition_id],
        )
        .await
    }

    async fn query_organisations(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Organisation>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let default_news_image = get_opt_string(&row, 3).map(|url| Image {
                url,
                alt_text: get_opt_string(&row, 4).unwrap_or_default(),
                caption: None,
            });
            results.push(Organisation {
                id: get_i64(&row, 0)?,
                slug: get_string(&row, 1)?,
                name: get_string(&row, 2)?,
                default_news_image,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Topics
    // -----------------------------------------------------------------------

    pub async fn insert_topic(&self, slug: &str, name: &str) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO topics (slug, name) VALUES (?1, ?2)",
                params![slug, name],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub async fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, slug, name FROM topics WHERE slug = ?1",
                params![slug],
            )
            .await
            .map_err(PublisherError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(Topic {
                id: get_i64(&row, 0)?,
                slug: get_string(&row, 1)?,
                name: get_string(&row, 2)?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(PublisherError::storage(e)),
        }
    }

    pub async fn topics_for_edition(&self, edition_id: i64) -> Result<Vec<Topic>> {
        let mut rows = self
            .conn
            .query(
                "SELECT t.id, t.slug, t.name
                 FROM edition_topics et JOIN topics t ON t.id = et.topic_id
                 WHERE et.edition_id = ?1 ORDER BY et.ordering",
                params![edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(Topic {
                id: get_i64(&row, 0)?,
                slug: get_string(&row, 1)?,
                name: get_string(&row, 2)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Mainstream categories
    // -----------------------------------------------------------------------

    pub async fn insert_mainstream_category(
        &self,
        slug: &str,
        title: &str,
        parent_tag: &str,
    ) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO mainstream_categories (slug, title, parent_tag) VALUES (?1, ?2, ?3)",
                params![slug, title, parent_tag],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub async fn find_mainstream_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<MainstreamCategory>> {
        self.query_categories(
            "SELECT id, slug, title, parent_tag FROM mainstream_categories WHERE slug = ?1",
            params![slug],
        )
        .await
        .map(|mut found| found.pop())
    }

    pub async fn find_mainstream_category(&self, id: i64) -> Result<Option<MainstreamCategory>> {
        self.query_categories(
            "SELECT id, slug, title, parent_tag FROM mainstream_categories WHERE id = ?1",
            params![id],
        )
        .await
        .map(|mut found| found.pop())
    }

    /// Categories other than the primary one.
    pub async fn other_mainstream_categories_for_edition(
        &self,
        edition_id: i64,
    ) -> Result<Vec<MainstreamCategory>> {
        self.query_categories(
            "SELECT c.id, c.slug, c.title, c.parent_tag
             FROM edition_mainstream_categories ec
             JOIN mainstream_categories c ON c.id = ec.category_id
             WHERE ec.edition_id = ?1 ORDER BY ec.ordering",
            params![edition_id],
        )
        .await
    }

    async fn query_categories(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<MainstreamCategory>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(MainstreamCategory {
                id: get_i64(&row, 0)?,
                slug: get_string(&row, 1)?,
                title: get_string(&row, 2)?,
                parent_tag: get_string(&row, 3)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Document collections
    // -----------------------------------------------------------------------

    pub async fn insert_document_collection(&self, slug: &str, title: &str) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO document_collections (slug, title) VALUES (?1, ?2)",
                params![slug, title],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub async fn find_document_collection_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<DocumentCollection>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, slug, title FROM document_collections WHERE slug = ?1",
                params![slug],
            )
            .await
            .map_err(PublisherError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(DocumentCollection {
                id: get_i64(&row, 0)?,
                slug: get_string(&row, 1)?,
                title: get_string(&row, 2)?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(PublisherError::storage(e)),
        }
    }

    /// Slugs of the collections a document belongs to.
    pub async fn collections_for_document(&self, document_id: i64) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.slug FROM document_collection_memberships m
                 JOIN document_collections c ON c.id = m.collection_id
                 WHERE m.document_id = ?1 ORDER BY c.slug",
                params![document_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(get_string(&row, 0)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Contacts
    // -----------------------------------------------------------------------

    pub async fn insert_contact(
        &self,
        title: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO contacts (title, email, phone) VALUES (?1, ?2, ?3)",
                params![title, email, phone],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub async fn find_contact(&self, id: i64) -> Result<Option<Contact>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, email, phone FROM contacts WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(PublisherError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_contact(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PublisherError::storage(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub async fn find_document(&self, id: i64) -> Result<Option<Document>> {
        self.query_document("SELECT id, slug, kind FROM documents WHERE id = ?1", params![id])
            .await
    }

    /// Look up a document by slug within one format.
    pub async fn find_document_by_slug(
        &self,
        kind: EditionKind,
        slug: &str,
    ) -> Result<Option<Document>> {
        self.query_document(
            "SELECT id, slug, kind FROM documents WHERE kind = ?1 AND slug = ?2",
            params![kind.as_str(), slug],
        )
        .await
    }

    pub async fn document_slug_exists(&self, kind: EditionKind, slug: &str) -> Result<bool> {
        Ok(self.find_document_by_slug(kind, slug).await?.is_some())
    }

    pub async fn related_documents_for_edition(&self, edition_id: i64) -> Result<Vec<Document>> {
        let mut rows = self
            .conn
            .query(
                "SELECT d.id, d.slug, d.kind
                 FROM edition_related_documents rd JOIN documents d ON d.id = rd.document_id
                 WHERE rd.edition_id = ?1 ORDER BY rd.ordering",
                params![edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_document(&row)?);
        }
        Ok(results)
    }

    async fn query_document(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<Document>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(PublisherError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PublisherError::storage(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------------

    pub async fn insert_image(&self, edition_id: i64, image: &Image) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO images (edition_id, url, alt_text, caption, ordering)
                 VALUES (?1, ?2, ?3, ?4,
                   (SELECT COUNT(*) FROM images WHERE edition_id = ?1))",
                params![
                    edition_id,
                    image.url.as_str(),
                    image.alt_text.as_str(),
                    image.caption.as_deref(),
                ],
            )
            .await
            .map_err(PublisherError::storage)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub async fn images_for_edition(&self, edition_id: i64) -> Result<Vec<Image>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, alt_text, caption FROM images WHERE edition_id = ?1 ORDER BY ordering",
                params![edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(Image {
                url: get_string(&row, 0)?,
                alt_text: get_string(&row, 1)?,
                caption: get_opt_string(&row, 2),
            });
        }
        Ok(results)
    }
}

pub(crate) fn row_to_contact(row: &libsql::Row) -> Result<Contact> {
    Ok(Contact {
        id: get_i64(row, 0)?,
        title: get_string(row, 1)?,
        email: get_opt_string(row, 2),
        phone: get_opt_string(row, 3),
    })
}

fn row_to_document(row: &libsql::Row) -> Result<Document> {
    Ok(Document {
        id: get_i64(row, 0)?,
        slug: get_string(row, 1)?,
        kind: get_string(row, 2)?.parse()?,
    })
}

#[cfg(test)]
mod tests {
    use crate::NewEdition;
    use crate::test_support::test_storage;
    use publisher_shared::{EditionKind, Image};

    #[tokio::test]
    async fn slug_lookups() {
        let storage = test_storage().await;
        let topic_id = storage.insert_topic("tax", "Tax").await.unwrap();
        let category_id = storage
            .insert_mainstream_category("vat", "VAT", "business/tax")
            .await
            .unwrap();
        storage
            .insert_document_collection("vat-notices", "VAT notices")
            .await
            .unwrap();

        assert_eq!(
            storage.find_topic_by_slug("tax").await.unwrap().unwrap().id,
            topic_id
        );
        let category = storage
            .find_mainstream_category_by_slug("vat")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(category.id, category_id);
        assert_eq!(category.parent_tag, "business/tax");
        assert!(
            storage
                .find_document_collection_by_slug("vat-notices")
                .await
                .unwrap()
                .is_some()
        );
        assert!(storage.find_topic_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn organisation_default_news_image() {
        let storage = test_storage().await;
        let image = Image {
            url: "/media/hmrc/logo.jpg".into(),
            alt_text: "HMRC".into(),
            caption: None,
        };
        storage
            .insert_organisation("hmrc", "HM Revenue & Customs", Some(&image))
            .await
            .unwrap();
        storage
            .insert_organisation("dwp", "Department for Work and Pensions", None)
            .await
            .unwrap();

        let hmrc = storage.find_organisation_by_slug("hmrc").await.unwrap().unwrap();
        assert_eq!(hmrc.default_news_image, Some(image));
        let dwp = storage.find_organisation_by_slug("dwp").await.unwrap().unwrap();
        assert!(dwp.default_news_image.is_none());
    }

    #[tokio::test]
    async fn contacts_by_id() {
        let storage = test_storage().await;
        let id = storage
            .insert_contact("Press office", Some("press@example.gov.uk"), None)
            .await
            .unwrap();

        let contact = storage.find_contact(id).await.unwrap().unwrap();
        assert_eq!(contact.title, "Press office");
        assert_eq!(contact.email.as_deref(), Some("press@example.gov.uk"));
        assert!(contact.phone.is_none());
        assert!(storage.find_contact(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn edition_images_and_related_records() {
        let storage = test_storage().await;
        let category_id = storage
            .insert_mainstream_category("vat", "VAT", "business/tax")
            .await
            .unwrap();
        let (related_doc, _) = storage
            .create_document_with_edition(
                "vat-rates",
                NewEdition::new(0, EditionKind::DetailedGuide, "VAT rates"),
            )
            .await
            .unwrap();

        let mut edition = NewEdition::new(0, EditionKind::DetailedGuide, "VAT returns");
        edition.primary_mainstream_category_id = Some(category_id);
        edition.related_document_ids = vec![related_doc];
        let (_, edition_id) = storage
            .create_document_with_edition("vat-returns", edition)
            .await
            .unwrap();

        let first = Image {
            url: "/uploads/image/1/form.jpg".into(),
            alt_text: "Return form".into(),
            caption: Some("The paper form".into()),
        };
        let second = Image {
            url: "/uploads/image/2/office.jpg".into(),
            alt_text: "Office".into(),
            caption: None,
        };
        storage.insert_image(edition_id, &first).await.unwrap();
        storage.insert_image(edition_id, &second).await.unwrap();

        assert_eq!(
            storage.images_for_edition(edition_id).await.unwrap(),
            vec![first, second]
        );
        let related = storage.related_documents_for_edition(edition_id).await.unwrap();
        assert_eq!(related.iter().map(|d| d.slug.as_str()).collect::<Vec<_>>(), vec!["vat-rates"]);

        let category = storage.find_mainstream_category(category_id).await.unwrap().unwrap();
        assert_eq!(category.slug, "vat");
        assert!(storage.find_mainstream_category(category_id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn documents_are_scoped_by_kind() {
        let storage = test_storage().await;
        let tx = storage.begin().await.unwrap();
        let id = tx
            .create_document("vat-rates", EditionKind::DetailedGuide)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let doc = storage
            .find_document_by_slug(EditionKind::DetailedGuide, "vat-rates")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.id, id);
        assert!(
            storage
                .find_document_by_slug(EditionKind::NewsArticle, "vat-rates")
                .await
                .unwrap()
                .is_none()
        );
    }
}
