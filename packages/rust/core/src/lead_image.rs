//! Lead image selection for edition summaries.

use serde::Serialize;

use publisher_shared::{Image, Organisation, Result};
use publisher_storage::Storage;

const PLACEHOLDER_PATH: &str = "placeholder.jpg";
const PLACEHOLDER_ALT_TEXT: &str = "placeholder";
const VARIANT_PREFIX: &str = "s300_";

/// The image shown alongside an edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadImage {
    pub path: String,
    pub alt_text: String,
    pub caption: Option<String>,
}

impl LeadImage {
    /// Pick the lead image from the edition's own images, falling back to
    /// the first lead organisation's default news image, then a placeholder.
    pub fn for_edition(images: &[Image], lead_organisations: &[Organisation]) -> Self {
        let first_image = images.first();

        let path = first_image
            .or_else(|| {
                lead_organisations
                    .first()
                    .and_then(|org| org.default_news_image.as_ref())
            })
            .map(|image| variant_url(&image.url))
            .unwrap_or_else(|| PLACEHOLDER_PATH.to_string());

        let alt_text = first_image
            .map(|image| image.alt_text.clone())
            .unwrap_or_else(|| PLACEHOLDER_ALT_TEXT.to_string());

        let caption = first_image
            .and_then(|image| image.caption.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Self {
            path,
            alt_text,
            caption,
        }
    }

    /// Lead image of a stored edition.
    pub async fn load(storage: &Storage, edition_id: i64) -> Result<Self> {
        let images = storage.images_for_edition(edition_id).await?;
        let organisations = storage.lead_organisations_for_edition(edition_id).await?;
        Ok(Self::for_edition(&images, &organisations))
    }
}

/// URL of the 300px variant: the file name gains an `s300_` prefix.
fn variant_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/{VARIANT_PREFIX}{file}"),
        None => format!("{VARIANT_PREFIX}{url}"),
    }
}

#[cfg(test)]
mod tests {
    use publisher_shared::EditionKind;
    use publisher_storage::NewEdition;

    use super::*;
    use crate::test_support::test_storage;

    fn image(url: &str, alt: &str, caption: Option<&str>) -> Image {
        Image {
            url: url.into(),
            alt_text: alt.into(),
            caption: caption.map(str::to_string),
        }
    }

    fn organisation(default_news_image: Option<Image>) -> Organisation {
        Organisation {
            id: 1,
            slug: "hm-treasury".into(),
            name: "HM Treasury".into(),
            default_news_image,
        }
    }

    #[test]
    fn uses_the_first_edition_image() {
        let images = vec![
            image("/uploads/image/1/budget.jpg", "Chancellor", Some("  Budget day  ")),
            image("/uploads/image/2/other.jpg", "Other", None),
        ];
        let lead = LeadImage::for_edition(&images, &[organisation(None)]);
        assert_eq!(lead.path, "/uploads/image/1/s300_budget.jpg");
        assert_eq!(lead.alt_text, "Chancellor");
        assert_eq!(lead.caption.as_deref(), Some("Budget day"));
    }

    #[test]
    fn falls_back_to_organisation_default_image() {
        let org = organisation(Some(image("/uploads/default/hmt.png", "HMT logo", None)));
        let lead = LeadImage::for_edition(&[], &[org]);
        assert_eq!(lead.path, "/uploads/default/s300_hmt.png");
        assert_eq!(lead.alt_text, "placeholder");
        assert_eq!(lead.caption, None);
    }

    #[test]
    fn falls_back_to_placeholder() {
        let lead = LeadImage::for_edition(&[], &[organisation(None)]);
        assert_eq!(lead.path, "placeholder.jpg");
        assert_eq!(lead.alt_text, "placeholder");

        let lead = LeadImage::for_edition(&[], &[]);
        assert_eq!(lead.path, "placeholder.jpg");
    }

    #[test]
    fn blank_caption_is_none() {
        let images = vec![image("plain.jpg", "Plain", Some("   "))];
        let lead = LeadImage::for_edition(&images, &[]);
        assert_eq!(lead.path, "s300_plain.jpg");
        assert_eq!(lead.caption, None);
    }

    #[tokio::test]
    async fn loads_stored_images_before_organisation_default() {
        let storage = test_storage().await;
        let logo = image("/uploads/default/hmt.png", "HMT logo", None);
        let org_id = storage
            .insert_organisation("hm-treasury", "HM Treasury", Some(&logo))
            .await
            .unwrap();
        let mut edition = NewEdition::new(0, EditionKind::NewsArticle, "Budget");
        edition.lead_organisation_ids = vec![org_id];
        let (_, edition_id) = storage
            .create_document_with_edition("budget", edition)
            .await
            .unwrap();

        let lead = LeadImage::load(&storage, edition_id).await.unwrap();
        assert_eq!(lead.path, "/uploads/default/s300_hmt.png");

        storage
            .insert_image(
                edition_id,
                &image("/uploads/image/9/chancellor.jpg", "Chancellor", Some("Budget day")),
            )
            .await
            .unwrap();
        let lead = LeadImage::load(&storage, edition_id).await.unwrap();
        assert_eq!(lead.path, "/uploads/image/9/s300_chancellor.jpg");
        assert_eq!(lead.alt_text, "Chancellor");
        assert_eq!(lead.caption.as_deref(), Some("Budget day"));
    }
}
