//! Reconciliation of an edition's dependency edges with its body.
//!
//! The desired edge set is whatever the body references right now. It is
//! diffed against the stored set, and the difference is written inside the
//! caller's transaction so readers never see a half-applied change.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use publisher_govspeak::{AdminEditionLinkScanner, ContactsExtractor, ReferenceExtractor};
use publisher_shared::{Dependable, Edition, EditionState, Result};
use publisher_storage::{Storage, StorageTransaction};

use crate::resolvers::{ContactResolver, EditionResolver};

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Edges to write to move the stored set to the desired set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DependencyDiff {
    /// In desired, not stored.
    pub to_insert: Vec<Dependable>,
    /// Stored, not desired.
    pub to_remove: Vec<Dependable>,
}

impl DependencyDiff {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_remove.is_empty()
    }
}

/// Set difference between two snapshots. Order follows the input; duplicates
/// in either input are collapsed.
pub fn diff_dependencies(desired: &[Dependable], stored: &[Dependable]) -> DependencyDiff {
    let desired_set: HashSet<&Dependable> = desired.iter().collect();
    let stored_set: HashSet<&Dependable> = stored.iter().collect();

    let mut diff = DependencyDiff::default();
    let mut seen = HashSet::new();
    for dependable in desired {
        if !stored_set.contains(dependable) && seen.insert(*dependable) {
            diff.to_insert.push(*dependable);
        }
    }
    for dependable in stored {
        if !desired_set.contains(dependable) && seen.insert(*dependable) {
            diff.to_remove.push(*dependable);
        }
    }
    diff
}

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub diff: DependencyDiff,
    /// Editions whose edges onto the reconciled edition were cleared.
    pub cleared_dependents: Vec<i64>,
}

// ---------------------------------------------------------------------------
// Populator
// ---------------------------------------------------------------------------

/// Keeps `edition_dependencies` consistent with edition bodies.
#[derive(Clone, Copy)]
pub struct EditionDependenciesPopulator<'a> {
    storage: &'a Storage,
}

impl<'a> EditionDependenciesPopulator<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Distinct records the edition's body references, contacts first, in
    /// order of first appearance. A withdrawn or superseded edition
    /// references nothing.
    pub async fn desired_dependencies(&self, edition: &Edition) -> Result<Vec<Dependable>> {
        if matches!(edition.state, EditionState::Withdrawn | EditionState::Superseded) {
            return Ok(Vec::new());
        }
        let body = edition.body.as_deref();

        let contacts = ContactsExtractor::contacts(ContactResolver::new(self.storage))
            .references(body)
            .await?;
        let editions = ReferenceExtractor::new(AdminEditionLinkScanner, EditionResolver::new(self.storage))
            .references(body)
            .await?;

        let mut seen = HashSet::new();
        let desired = contacts
            .iter()
            .map(|contact| Dependable::contact(contact.id))
            .chain(
                editions
                    .iter()
                    .filter(|linked| linked.id != edition.id)
                    .map(|linked| Dependable::edition(linked.id)),
            )
            .filter(|dependable| seen.insert(*dependable))
            .collect();
        Ok(desired)
    }

    /// Reconcile the edition's edges inside `tx`.
    ///
    /// Writes the outgoing diff, then clears every edge that points at the
    /// edition itself: dependents recorded against it are settled by this
    /// transition.
    #[instrument(skip_all, fields(edition_id = edition.id, state = %edition.state))]
    pub async fn apply(&self, tx: &StorageTransaction, edition: &Edition) -> Result<Reconciliation> {
        let desired = self.desired_dependencies(edition).await?;
        let stored = self.storage.stored_dependencies(edition.id).await?;
        let diff = diff_dependencies(&desired, &stored);

        for dependable in &diff.to_remove {
            tx.delete_dependency(edition.id, *dependable).await?;
        }
        for dependable in &diff.to_insert {
            tx.insert_dependency(edition.id, *dependable).await?;
        }

        let cleared_dependents = tx.delete_dependencies_on(Dependable::edition(edition.id)).await?;

        debug!(
            inserted = diff.to_insert.len(),
            removed = diff.to_remove.len(),
            cleared = cleared_dependents.len(),
            "dependencies reconciled"
        );
        Ok(Reconciliation {
            diff,
            cleared_dependents,
        })
    }

    /// Drop every outgoing edge of an edition that is no longer live.
    /// Incoming edges are left alone. Returns the removed edges.
    pub async fn retire(&self, tx: &StorageTransaction, edition_id: i64) -> Result<Vec<Dependable>> {
        let stored = self.storage.stored_dependencies(edition_id).await?;
        for dependable in &stored {
            tx.delete_dependency(edition_id, *dependable).await?;
        }
        debug!(edition_id, removed = stored.len(), "dependencies retired");
        Ok(stored)
    }

    /// Reconcile the edition's edges in a transaction of its own.
    pub async fn refresh(&self, edition_id: i64) -> Result<Reconciliation> {
        let edition = self.storage.require_edition(edition_id).await?;
        let tx = self.storage.begin().await?;
        let result = self.apply(&tx, &edition).await;
        let reconciliation = crate::settle(tx, result).await?;

        info!(
            edition_id,
            inserted = reconciliation.diff.to_insert.len(),
            removed = reconciliation.diff.to_remove.len(),
            "dependencies refreshed"
        );
        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use publisher_shared::EditionKind;
    use publisher_storage::NewEdition;

    use super::*;
    use crate::test_support::test_storage;

    #[test]
    fn diff_is_a_set_difference() {
        let desired = vec![
            Dependable::contact(1),
            Dependable::edition(5),
            Dependable::contact(1),
        ];
        let stored = vec![Dependable::edition(5), Dependable::contact(9)];

        let diff = diff_dependencies(&desired, &stored);
        assert_eq!(diff.to_insert, vec![Dependable::contact(1)]);
        assert_eq!(diff.to_remove, vec![Dependable::contact(9)]);
    }

    #[test]
    fn diff_of_equal_snapshots_is_empty() {
        let snapshot = vec![Dependable::contact(1), Dependable::edition(2)];
        let reversed: Vec<Dependable> = snapshot.iter().rev().copied().collect();
        assert!(diff_dependencies(&snapshot, &reversed).is_empty());
        assert!(diff_dependencies(&[], &[]).is_empty());
    }

    #[test]
    fn diff_from_empty_desired_removes_everything() {
        let stored = vec![Dependable::contact(3), Dependable::edition(4)];
        let diff = diff_dependencies(&[], &stored);
        assert!(diff.to_insert.is_empty());
        assert_eq!(diff.to_remove, stored);
    }

    #[tokio::test]
    async fn desired_set_is_deduplicated_and_skips_self_links() {
        let storage = test_storage().await;
        let contact = storage.insert_contact("Helpline", None, None).await.unwrap();
        let (_, speech) = storage
            .create_document_with_edition("budget", NewEdition::new(0, EditionKind::Speech, "Budget"))
            .await
            .unwrap();
        let (_, article) = storage
            .create_document_with_edition(
                "article",
                NewEdition::new(0, EditionKind::NewsArticle, "Article"),
            )
            .await
            .unwrap();
        storage
            .update_edition_body(
                article,
                Some(
                    format!(
                        "[Contact:{contact}] [Contact:{contact}] [Contact:404]
                         [speech](/government/admin/speeches/{speech})
                         [me](/government/admin/news/{article})"
                    )
                    .as_str(),
                ),
            )
            .await
            .unwrap();

        let edition = storage.require_edition(article).await.unwrap();
        let desired = EditionDependenciesPopulator::new(&storage)
            .desired_dependencies(&edition)
            .await
            .unwrap();
        assert_eq!(
            desired,
            vec![Dependable::contact(contact), Dependable::edition(speech)]
        );
    }

    #[tokio::test]
    async fn refresh_drops_removed_references() {
        let storage = test_storage().await;
        let populator = EditionDependenciesPopulator::new(&storage);
        let first = storage.insert_contact("Helpline", None, None).await.unwrap();
        let second = storage.insert_contact("Press office", None, None).await.unwrap();
        let (_, article) = storage
            .create_document_with_edition(
                "article",
                NewEdition::new(0, EditionKind::NewsArticle, "Article")
                    .with_body(format!("[Contact:{first}] and [Contact:{second}]")),
            )
            .await
            .unwrap();

        let outcome = populator.refresh(article).await.unwrap();
        assert_eq!(outcome.diff.to_insert.len(), 2);

        storage
            .update_edition_body(article, Some(format!("only [Contact:{second}]").as_str()))
            .await
            .unwrap();
        let outcome = populator.refresh(article).await.unwrap();
        assert_eq!(outcome.diff.to_remove, vec![Dependable::contact(first)]);

        assert_eq!(
            storage.stored_dependencies(article).await.unwrap(),
            vec![Dependable::contact(second)]
        );
        assert!(
            storage
                .dependent_editions(Dependable::contact(first))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let storage = test_storage().await;
        let populator = EditionDependenciesPopulator::new(&storage);
        let contact = storage.insert_contact("Helpline", None, None).await.unwrap();
        let (_, article) = storage
            .create_document_with_edition(
                "article",
                NewEdition::new(0, EditionKind::NewsArticle, "Article")
                    .with_body(format!("[Contact:{contact}]")),
            )
            .await
            .unwrap();

        populator.refresh(article).await.unwrap();
        let first = storage.stored_dependencies(article).await.unwrap();
        let second_pass = populator.refresh(article).await.unwrap();
        let second = storage.stored_dependencies(article).await.unwrap();

        assert!(second_pass.diff.is_empty());
        assert_eq!(first, second);
        assert_eq!(second, vec![Dependable::contact(contact)]);
    }

    #[tokio::test]
    async fn refresh_of_missing_edition_fails() {
        let storage = test_storage().await;
        let err = EditionDependenciesPopulator::new(&storage)
            .refresh(4242)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "edition 4242 not found");
    }
}
