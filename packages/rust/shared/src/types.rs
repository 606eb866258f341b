//! Core domain types for published content and the records it references.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PublisherError;

// ---------------------------------------------------------------------------
// EditionKind
// ---------------------------------------------------------------------------

/// The format of a document and all of its editions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditionKind {
    DetailedGuide,
    NewsArticle,
    Speech,
    Publication,
    Consultation,
    CaseStudy,
}

impl EditionKind {
    pub const ALL: [EditionKind; 6] = [
        EditionKind::DetailedGuide,
        EditionKind::NewsArticle,
        EditionKind::Speech,
        EditionKind::Publication,
        EditionKind::Consultation,
        EditionKind::CaseStudy,
    ];

    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DetailedGuide => "detailed_guide",
            Self::NewsArticle => "news_article",
            Self::Speech => "speech",
            Self::Publication => "publication",
            Self::Consultation => "consultation",
            Self::CaseStudy => "case_study",
        }
    }

    /// Path segment used by admin URLs, e.g. `/government/admin/speeches/12`.
    pub fn admin_segment(self) -> &'static str {
        match self {
            Self::DetailedGuide => "detailed-guides",
            Self::NewsArticle => "news",
            Self::Speech => "speeches",
            Self::Publication => "publications",
            Self::Consultation => "consultations",
            Self::CaseStudy => "case-studies",
        }
    }

    /// Inverse of [`EditionKind::admin_segment`].
    pub fn from_admin_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.admin_segment() == segment)
    }
}

impl fmt::Display for EditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditionKind {
    type Err = PublisherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PublisherError::parse(format!("unknown edition kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// EditionState
// ---------------------------------------------------------------------------

/// Workflow state of a single edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditionState {
    Imported,
    Draft,
    Submitted,
    Published,
    Superseded,
    Withdrawn,
}

impl EditionState {
    const ALL: [EditionState; 6] = [
        EditionState::Imported,
        EditionState::Draft,
        EditionState::Submitted,
        EditionState::Published,
        EditionState::Superseded,
        EditionState::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Published => "published",
            Self::Superseded => "superseded",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for EditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditionState {
    type Err = PublisherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| PublisherError::parse(format!("unknown edition state '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A stable document; editions are its successive versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub slug: String,
    pub kind: EditionKind,
}

/// One version of a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edition {
    pub id: i64,
    pub document_id: i64,
    pub kind: EditionKind,
    pub state: EditionState,
    pub title: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_change_published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_mainstream_category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_mainstream_content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_mainstream_content_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_related_mainstream_content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_related_mainstream_content_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_format_provider_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An image, either attached to an edition or used as an organisation default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub alt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: i64,
    pub slug: String,
    pub name: String,
    /// Fallback lead image for news content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_news_image: Option<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainstreamCategory {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub parent_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCollection {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// Contact details that can be embedded in bodies with `[Contact:<id>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// The kind of record an edition can depend upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DependableType {
    Contact,
    Edition,
}

impl DependableType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "Contact",
            Self::Edition => "Edition",
        }
    }
}

impl FromStr for DependableType {
    type Err = PublisherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Contact" => Ok(Self::Contact),
            "Edition" => Ok(Self::Edition),
            other => Err(PublisherError::parse(format!(
                "unknown dependable type '{other}'"
            ))),
        }
    }
}

/// Target of a dependency edge, identity only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependable {
    pub kind: DependableType,
    pub id: i64,
}

impl Dependable {
    pub fn contact(id: i64) -> Self {
        Self {
            kind: DependableType::Contact,
            id,
        }
    }

    pub fn edition(id: i64) -> Self {
        Self {
            kind: DependableType::Edition,
            id,
        }
    }
}

impl fmt::Display for Dependable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edition_kind_roundtrip() {
        for kind in EditionKind::ALL {
            let parsed: EditionKind = kind.as_str().parse().expect("parse kind");
            assert_eq!(parsed, kind);
            assert_eq!(EditionKind::from_admin_segment(kind.admin_segment()), Some(kind));
        }
        assert!("press_release".parse::<EditionKind>().is_err());
    }

    #[test]
    fn edition_state_parse() {
        assert_eq!(
            "published".parse::<EditionState>().unwrap(),
            EditionState::Published
        );
        assert!("archived".parse::<EditionState>().is_err());
    }

    #[test]
    fn dependables_order_by_type_then_id() {
        let mut deps = vec![
            Dependable::edition(1),
            Dependable::contact(9),
            Dependable::contact(2),
        ];
        deps.sort();
        assert_eq!(
            deps,
            vec![
                Dependable::contact(2),
                Dependable::contact(9),
                Dependable::edition(1)
            ]
        );
        assert_eq!(Dependable::contact(2).to_string(), "Contact:2");
    }

    #[test]
    fn organisation_serialization_skips_missing_image() {
        let org = Organisation {
            id: 1,
            slug: "hm-treasury".into(),
            name: "HM Treasury".into(),
            default_news_image: None,
        };
        let json = serde_json::to_string(&org).expect("serialize");
        assert!(!json.contains("default_news_image"));
    }
}
