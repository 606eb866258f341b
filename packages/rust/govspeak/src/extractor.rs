//! Composition of a scanner with a record lookup.

use publisher_shared::Result;
use tracing::debug;

use crate::scanner::{ContactMarkerScanner, RawRef, Scanner};

/// Looks up the live record a raw reference names.
///
/// `Ok(None)` means the record does not exist (or is not the kind the
/// reference claims); the extractor drops those silently. An `Err` is a
/// lookup failure and is propagated.
#[allow(async_fn_in_trait)]
pub trait Resolver {
    type Entity;

    async fn resolve(&self, raw: &RawRef) -> Result<Option<Self::Entity>>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    type Entity = R::Entity;

    async fn resolve(&self, raw: &RawRef) -> Result<Option<Self::Entity>> {
        (**self).resolve(raw).await
    }
}

/// Scans text and resolves every reference found.
#[derive(Debug, Clone)]
pub struct ReferenceExtractor<S, R> {
    scanner: S,
    resolver: R,
}

/// Extractor for inline `[Contact:N]` markers.
pub type ContactsExtractor<R> = ReferenceExtractor<ContactMarkerScanner, R>;

impl<R: Resolver> ReferenceExtractor<ContactMarkerScanner, R> {
    pub fn contacts(resolver: R) -> Self {
        Self::new(ContactMarkerScanner, resolver)
    }
}

impl<S: Scanner, R: Resolver> ReferenceExtractor<S, R> {
    pub fn new(scanner: S, resolver: R) -> Self {
        Self { scanner, resolver }
    }

    /// Resolved references in `text`, in scan order.
    ///
    /// Absent or empty text yields nothing. A reference repeated in the text
    /// is resolved (and returned) once per occurrence.
    pub async fn references(&self, text: Option<&str>) -> Result<Vec<R::Entity>> {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            return Ok(Vec::new());
        };

        let raw = self.scanner.extract(text);
        let mut resolved = Vec::with_capacity(raw.len());
        let mut unresolved = 0usize;

        for reference in &raw {
            match self.resolver.resolve(reference).await? {
                Some(entity) => resolved.push(entity),
                None => unresolved += 1,
            }
        }

        if unresolved > 0 {
            debug!(scanned = raw.len(), unresolved, "dropped unresolved references");
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use publisher_shared::{EditionKind, PublisherError};

    use super::*;
    use crate::scanner::AdminEditionLinkScanner;

    /// In-memory lookup keyed by raw reference.
    struct MapResolver(HashMap<RawRef, &'static str>);

    impl Resolver for MapResolver {
        type Entity = &'static str;

        async fn resolve(&self, raw: &RawRef) -> Result<Option<&'static str>> {
            Ok(self.0.get(raw).copied())
        }
    }

    struct FailingResolver;

    impl Resolver for FailingResolver {
        type Entity = ();

        async fn resolve(&self, _raw: &RawRef) -> Result<Option<()>> {
            Err(PublisherError::Storage("connection lost".into()))
        }
    }

    fn contacts() -> MapResolver {
        MapResolver(HashMap::from([
            (RawRef::contact(1), "Press office"),
            (RawRef::contact(2), "Helpline"),
        ]))
    }

    #[tokio::test]
    async fn absent_or_empty_text_yields_nothing() {
        let extractor = ContactsExtractor::contacts(contacts());
        assert!(extractor.references(None).await.unwrap().is_empty());
        assert!(extractor.references(Some("")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolves_markers_in_order() {
        let extractor = ContactsExtractor::contacts(contacts());
        let found = extractor
            .references(Some("[Contact:2] is now [Contact:1]"))
            .await
            .unwrap();
        assert_eq!(found, vec!["Helpline", "Press office"]);
    }

    #[tokio::test]
    async fn unresolved_markers_are_dropped() {
        let extractor = ContactsExtractor::contacts(contacts());
        let found = extractor
            .references(Some("[Contact:1] [Contact:404] [Contact:2]"))
            .await
            .unwrap();
        assert_eq!(found, vec!["Press office", "Helpline"]);
    }

    #[tokio::test]
    async fn duplicates_are_kept_per_occurrence() {
        let extractor = ContactsExtractor::contacts(contacts());
        let found = extractor
            .references(Some("[Contact:1] and again [Contact:1]"))
            .await
            .unwrap();
        assert_eq!(found, vec!["Press office", "Press office"]);
    }

    #[tokio::test]
    async fn edition_links_resolve_through_the_same_resolver() {
        let resolver = MapResolver(HashMap::from([(
            RawRef::edition(EditionKind::Speech, 7),
            "Budget speech",
        )]));
        let extractor = ReferenceExtractor::new(AdminEditionLinkScanner, &resolver);
        let found = extractor
            .references(Some(
                "[speech](/government/admin/speeches/7) [news](/government/admin/news/7)",
            ))
            .await
            .unwrap();
        assert_eq!(found, vec!["Budget speech"]);
    }

    #[tokio::test]
    async fn lookup_failures_propagate() {
        let extractor = ContactsExtractor::contacts(FailingResolver);
        let result = extractor.references(Some("[Contact:1]")).await;
        assert!(matches!(result, Err(PublisherError::Storage(_))));

        // No markers means no lookups.
        assert!(extractor.references(Some("plain text")).await.unwrap().is_empty());
    }
}
