//! Edition dependency graph.
//!
//! An edge `(edition_id, dependable)` records that the edition's content
//! references the dependable record. Edges carry no ordering or payload;
//! `UNIQUE(edition_id, dependable_type, dependable_id)` keeps them a set.

use libsql::{Connection, params};
use publisher_shared::{Contact, Dependable, Edition, PublisherError, Result};

use crate::editions::{EDITION_COLUMNS, row_to_edition};
use crate::records::row_to_contact;
use crate::{Storage, get_i64, get_string};

impl Storage {
    /// The dependables an edition currently has edges to, in insertion order.
    pub async fn stored_dependencies(&self, edition_id: i64) -> Result<Vec<Dependable>> {
        let mut rows = self
            .conn
            .query(
                "SELECT dependable_type, dependable_id FROM edition_dependencies
                 WHERE edition_id = ?1 ORDER BY id",
                params![edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(Dependable {
                kind: get_string(&row, 0)?.parse()?,
                id: get_i64(&row, 1)?,
            });
        }
        Ok(results)
    }

    /// Contacts the edition's content depends upon.
    pub async fn depended_upon_contacts(&self, edition_id: i64) -> Result<Vec<Contact>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.id, c.title, c.email, c.phone
                 FROM edition_dependencies d
                 JOIN contacts c ON c.id = d.dependable_id
                 WHERE d.edition_id = ?1 AND d.dependable_type = 'Contact'
                 ORDER BY d.id",
                params![edition_id],
            )
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_contact(&row)?);
        }
        Ok(results)
    }

    /// Editions the edition's content depends upon.
    pub async fn depended_upon_editions(&self, edition_id: i64) -> Result<Vec<Edition>> {
        self.query_editions(
            &format!(
                "SELECT {EDITION_COLUMNS}
                 FROM edition_dependencies d
                 JOIN editions e ON e.id = d.dependable_id
                 WHERE d.edition_id = ?1 AND d.dependable_type = 'Edition'
                 ORDER BY d.id"
            ),
            params![edition_id],
        )
        .await
    }

    /// Editions whose content depends upon `dependable`.
    pub async fn dependent_editions(&self, dependable: Dependable) -> Result<Vec<Edition>> {
        self.query_editions(
            &format!(
                "SELECT {EDITION_COLUMNS}
                 FROM edition_dependencies d
                 JOIN editions e ON e.id = d.edition_id
                 WHERE d.dependable_type = ?1 AND d.dependable_id = ?2
                 ORDER BY d.id"
            ),
            params![dependable.kind.as_str(), dependable.id],
        )
        .await
    }

    async fn query_editions(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Edition>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(PublisherError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_edition(&row)?);
        }
        Ok(results)
    }
}

pub(crate) async fn insert_dependency(
    conn: &Connection,
    edition_id: i64,
    dependable: Dependable,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO edition_dependencies (edition_id, dependable_type, dependable_id)
         VALUES (?1, ?2, ?3)",
        params![edition_id, dependable.kind.as_str(), dependable.id],
    )
    .await
    .map_err(PublisherError::storage)?;
    Ok(())
}

pub(crate) async fn delete_dependency(
    conn: &Connection,
    edition_id: i64,
    dependable: Dependable,
) -> Result<()> {
    conn.execute(
        "DELETE FROM edition_dependencies
         WHERE edition_id = ?1 AND dependable_type = ?2 AND dependable_id = ?3",
        params![edition_id, dependable.kind.as_str(), dependable.id],
    )
    .await
    .map_err(PublisherError::storage)?;
    Ok(())
}

/// Remove every edge pointing at `dependable`. Returns the ids of the
/// editions that lost an edge.
pub(crate) async fn delete_dependencies_on(
    conn: &Connection,
    dependable: Dependable,
) -> Result<Vec<i64>> {
    let mut rows = conn
        .query(
            "SELECT edition_id FROM edition_dependencies
             WHERE dependable_type = ?1 AND dependable_id = ?2 ORDER BY id",
            params![dependable.kind.as_str(), dependable.id],
        )
        .await
        .map_err(PublisherError::storage)?;

    let mut dependents = Vec::new();
    while let Ok(Some(row)) = rows.next().await {
        dependents.push(get_i64(&row, 0)?);
    }
    drop(rows);

    conn.execute(
        "DELETE FROM edition_dependencies WHERE dependable_type = ?1 AND dependable_id = ?2",
        params![dependable.kind.as_str(), dependable.id],
    )
    .await
    .map_err(PublisherError::storage)?;

    Ok(dependents)
}

#[cfg(test)]
mod tests {
    use crate::NewEdition;
    use crate::test_support::test_storage;
    use publisher_shared::{Dependable, EditionKind};

    #[tokio::test]
    async fn edges_are_a_set() {
        let storage = test_storage().await;
        let contact = storage.insert_contact("Helpline", None, None).await.unwrap();
        let (_, edition_id) = storage
            .create_document_with_edition(
                "article",
                NewEdition::new(0, EditionKind::NewsArticle, "Article"),
            )
            .await
            .unwrap();

        let tx = storage.begin().await.unwrap();
        tx.insert_dependency(edition_id, Dependable::contact(contact))
            .await
            .unwrap();
        tx.insert_dependency(edition_id, Dependable::contact(contact))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            storage.stored_dependencies(edition_id).await.unwrap(),
            vec![Dependable::contact(contact)]
        );
        let contacts = storage.depended_upon_contacts(edition_id).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].title, "Helpline");
    }

    #[tokio::test]
    async fn reverse_lookup_and_cleanup() {
        let storage = test_storage().await;
        let (_, speech) = storage
            .create_document_with_edition("speech", NewEdition::new(0, EditionKind::Speech, "Speech"))
            .await
            .unwrap();
        let (_, article) = storage
            .create_document_with_edition(
                "article",
                NewEdition::new(0, EditionKind::NewsArticle, "Article"),
            )
            .await
            .unwrap();

        let tx = storage.begin().await.unwrap();
        tx.insert_dependency(article, Dependable::edition(speech))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let upon = storage.depended_upon_editions(article).await.unwrap();
        assert_eq!(upon.len(), 1);
        assert_eq!(upon[0].id, speech);
        let dependents = storage
            .dependent_editions(Dependable::edition(speech))
            .await
            .unwrap();
        assert_eq!(dependents[0].id, article);

        let tx = storage.begin().await.unwrap();
        let cleared = tx
            .delete_dependencies_on(Dependable::edition(speech))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(cleared, vec![article]);
        assert!(
            storage
                .dependent_editions(Dependable::edition(speech))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
