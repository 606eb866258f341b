//! Storage-backed resolvers for references found in edition bodies.

use publisher_govspeak::{RawRef, RefKind, Resolver};
use publisher_shared::{Contact, Edition, Result};
use publisher_storage::Storage;

/// Resolves `[Contact:N]` markers to contacts.
#[derive(Clone, Copy)]
pub struct ContactResolver<'a> {
    storage: &'a Storage,
}

impl<'a> ContactResolver<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }
}

impl Resolver for ContactResolver<'_> {
    type Entity = Contact;

    async fn resolve(&self, raw: &RawRef) -> Result<Option<Contact>> {
        match raw.kind {
            RefKind::Contact => self.storage.find_contact(raw.id).await,
            RefKind::Edition(_) => Ok(None),
        }
    }
}

/// Resolves admin links to editions. A link only resolves when the edition
/// is of the format its URL names.
#[derive(Clone, Copy)]
pub struct EditionResolver<'a> {
    storage: &'a Storage,
}

impl<'a> EditionResolver<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }
}

impl Resolver for EditionResolver<'_> {
    type Entity = Edition;

    async fn resolve(&self, raw: &RawRef) -> Result<Option<Edition>> {
        let RefKind::Edition(kind) = raw.kind else {
            return Ok(None);
        };
        Ok(self
            .storage
            .get_edition(raw.id)
            .await?
            .filter(|edition| edition.kind == kind))
    }
}
