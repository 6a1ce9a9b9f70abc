//! Book reconciliation
//!
//! Books reach the app under two kinds of identifiers: internal IDs (UUIDs of rows in the `books`
//! table) and the catalog's own volume IDs, which search results carry. Every operation that
//! writes something about a book first maps the reference to an internal ID, importing the
//! volume from the catalog the first time it is seen.
use crate::catalog::Catalog;
use crate::catalog::errors::CatalogError;
use crate::catalog::request_builder::CatalogRequestBuilder;
use crate::database::Db;
use crate::database::types::{Book, InsertBookError, NewBook};
use log::{debug, info};
use regex::Regex;
use std::sync::LazyLock;

static INTERNAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("Regex must be valid")
});

/// Whether the reference has the shape of an internal book ID.
#[must_use]
#[inline]
pub fn is_internal_id(reference: &str) -> bool {
    INTERNAL_ID.is_match(reference)
}

/// A reference to a book, classified by its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BookRef<'a> {
    Internal(&'a str),
    External(&'a str),
}

impl<'a> BookRef<'a> {
    #[must_use]
    #[inline]
    pub fn classify(reference: &'a str) -> Self {
        if is_internal_id(reference) {
            Self::Internal(reference)
        } else {
            Self::External(reference)
        }
    }
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The catalog does not know the volume.
    #[error("no book found in the catalog for {0}")]
    NotInCatalog(String),
    /// An internal ID without a matching row.
    #[error("no book with id {0}")]
    UnknownBook(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl From<InsertBookError> for ReconcileError {
    #[inline]
    fn from(err: InsertBookError) -> Self {
        match err {
            InsertBookError::Db(db_err) => Self::Db(db_err),
            InsertBookError::BookAlreadyExists(id) => Self::UnknownBook(id),
        }
    }
}

pub struct Reconciler<'a, C> {
    db: &'a Db,
    catalog: &'a C,
}

impl<'a, C: Catalog> Reconciler<'a, C> {
    #[must_use]
    #[inline]
    pub const fn new(db: &'a Db, catalog: &'a C) -> Self {
        Self { db, catalog }
    }

    /// Maps any book reference to an internal ID, importing catalog volumes on first use.
    /// Internal IDs are only lowercased, without touching the database.
    /// # Errors
    /// Fails if the catalog cannot be reached, does not know the volume, or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn resolve_id(&self, reference: &str) -> Result<String, ReconcileError> {
        match BookRef::classify(reference) {
            BookRef::Internal(id) => Ok(id.to_ascii_lowercase()),
            BookRef::External(volume_id) => Ok(self.get_or_create(volume_id).await?.id),
        }
    }

    /// Like `resolve_id`, but never calls the catalog and never creates a book. Returns `None`
    /// for catalog IDs that were not imported yet.
    /// # Errors
    /// Fails if the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn lookup_id(&self, reference: &str) -> Result<Option<String>, ReconcileError> {
        match BookRef::classify(reference) {
            BookRef::Internal(id) => Ok(Some(id.to_ascii_lowercase())),
            BookRef::External(volume_id) => Ok(self
                .db
                .find_book_by_google_id(volume_id)
                .await?
                .map(|book| book.id)),
        }
    }

    /// Resolves a reference to the full stored book.
    /// # Errors
    /// Same as `resolve_id`, and `UnknownBook` for internal IDs without a row.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn resolve_book(&self, reference: &str) -> Result<Book, ReconcileError> {
        match BookRef::classify(reference) {
            BookRef::Internal(id) => self
                .db
                .get_book(&id.to_ascii_lowercase())
                .await?
                .ok_or_else(|| ReconcileError::UnknownBook(id.to_owned())),
            BookRef::External(volume_id) => self.get_or_create(volume_id).await,
        }
    }

    /// Returns the book imported from the given volume, importing it if needed.
    /// # Errors
    /// Fails if the catalog cannot be reached, does not know the volume, or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn get_or_create(&self, volume_id: &str) -> Result<Book, ReconcileError> {
        if let Some(book) = self.db.find_book_by_google_id(volume_id).await? {
            return Ok(book);
        }

        debug!("Importing volume {volume_id} from the catalog");
        let volume = CatalogRequestBuilder::default()
            .with_id(volume_id)
            .execute(self.catalog)
            .await?
            .ok_or_else(|| ReconcileError::NotInCatalog(volume_id.to_owned()))?;
        let new_book = NewBook {
            google_books_id: Some(volume_id.to_owned()),
            ..NewBook::from_volume(&volume)
        };

        match self.db.insert_book(&new_book).await {
            Ok(book) => {
                info!("Imported \"{}\" as book {}", book.title, book.id);
                Ok(book)
            }
            Err(InsertBookError::BookAlreadyExists(_)) => {
                debug!("Volume {volume_id} was imported concurrently, using the stored book");
                self.db
                    .find_book_by_google_id(volume_id)
                    .await?
                    .ok_or_else(|| ReconcileError::UnknownBook(volume_id.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test code")]
mod tests {
    use super::*;
    use crate::catalog::OrderBy;
    use crate::catalog::volume::{SearchResponse, Volume};
    use crate::test_support::{StubCatalog, seed_book, volume};
    use pretty_assertions::assert_eq;

    const INTERNAL: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn classification() {
        assert_eq!(BookRef::classify(INTERNAL), BookRef::Internal(INTERNAL));
        assert!(is_internal_id(&INTERNAL.to_uppercase()));
        assert_eq!(
            BookRef::classify("zG3-somecode"),
            BookRef::External("zG3-somecode")
        );
        assert!(!is_internal_id("550e8400-e29b-41d4-a716-44665544000"));
        assert!(!is_internal_id(&format!(" {INTERNAL}")));
        assert!(!is_internal_id(""));
    }

    #[tokio::test]
    async fn internal_ids_are_not_looked_up() {
        let db = Db::in_memory().await.unwrap();
        let catalog = StubCatalog::failing();
        let reconciler = Reconciler::new(&db, &catalog);

        assert_eq!(reconciler.resolve_id(INTERNAL).await.unwrap(), INTERNAL);
        assert_eq!(catalog.volume_lookups(), 0);
        assert_eq!(db.count_books().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn external_ids_are_imported_once() {
        let db = Db::in_memory().await.unwrap();
        let catalog =
            StubCatalog::default().with_volume(volume("zG3-somecode", "Kindred", 4.2, 30, true));
        let reconciler = Reconciler::new(&db, &catalog);

        let first = reconciler.resolve_id("zG3-somecode").await.unwrap();
        let second = reconciler.resolve_id("zG3-somecode").await.unwrap();

        assert_eq!(first, second);
        assert!(is_internal_id(&first));
        assert_eq!(catalog.volume_lookups(), 1);
        assert_eq!(db.count_books().await.unwrap(), 1);

        let book = db.get_book(&first).await.unwrap().unwrap();
        assert_eq!(book.google_books_id.as_deref(), Some("zG3-somecode"));
        assert_eq!(book.title, "Kindred");
        assert_eq!(
            book.cover_url.as_deref(),
            Some("https://books.google.com/zG3-somecode")
        );
    }

    #[tokio::test]
    async fn stored_volume_is_found_without_catalog() {
        let db = Db::in_memory().await.unwrap();
        let stored = seed_book(&db, "vol-1", "Beloved").await;
        let catalog = StubCatalog::failing();
        let reconciler = Reconciler::new(&db, &catalog);

        assert_eq!(reconciler.resolve_id("vol-1").await.unwrap(), stored.id);
        assert_eq!(catalog.volume_lookups(), 0);
    }

    #[tokio::test]
    async fn unknown_volume_fails_without_writing() {
        let db = Db::in_memory().await.unwrap();
        let catalog = StubCatalog::default();
        let reconciler = Reconciler::new(&db, &catalog);

        assert!(matches!(
            reconciler.resolve_id("nope").await,
            Err(ReconcileError::NotInCatalog(id)) if id == "nope"
        ));
        assert_eq!(db.count_books().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreachable_catalog_fails() {
        let db = Db::in_memory().await.unwrap();
        let catalog = StubCatalog::failing();
        let reconciler = Reconciler::new(&db, &catalog);

        assert!(matches!(
            reconciler.resolve_id("zG3-somecode").await,
            Err(ReconcileError::Catalog(_))
        ));
        assert_eq!(db.count_books().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lookup_never_imports() {
        let db = Db::in_memory().await.unwrap();
        let catalog =
            StubCatalog::default().with_volume(volume("zG3-somecode", "Kindred", 4.2, 30, true));
        let reconciler = Reconciler::new(&db, &catalog);

        assert_eq!(reconciler.lookup_id("zG3-somecode").await.unwrap(), None);
        assert_eq!(
            reconciler.lookup_id(INTERNAL).await.unwrap().as_deref(),
            Some(INTERNAL)
        );
        assert_eq!(catalog.volume_lookups(), 0);
    }

    #[tokio::test]
    async fn internal_ids_match_regardless_of_case() {
        let db = Db::in_memory().await.unwrap();
        let stored = seed_book(&db, "vol-1", "Beloved").await;
        let catalog = StubCatalog::failing();
        let reconciler = Reconciler::new(&db, &catalog);
        let shouted = stored.id.to_uppercase();

        assert_eq!(reconciler.resolve_book(&shouted).await.unwrap(), stored);
        assert_eq!(reconciler.resolve_id(&shouted).await.unwrap(), stored.id);
        assert_eq!(
            reconciler.lookup_id(&shouted).await.unwrap(),
            Some(stored.id.clone())
        );
        assert_eq!(catalog.volume_lookups(), 0);
    }

    #[tokio::test]
    async fn unknown_internal_id_is_not_a_book() {
        let db = Db::in_memory().await.unwrap();
        let catalog = StubCatalog::default();
        let reconciler = Reconciler::new(&db, &catalog);

        assert!(matches!(
            reconciler.resolve_book(INTERNAL).await,
            Err(ReconcileError::UnknownBook(_))
        ));
    }

    /// Imports the volume itself while being asked for it, like a concurrent request would.
    struct RacingCatalog {
        db: Db,
        volume: Volume,
    }

    impl Catalog for RacingCatalog {
        async fn search(
            &self,
            _query: &str,
            _max_results: u32,
            _order_by: OrderBy,
        ) -> Result<SearchResponse, CatalogError> {
            Ok(SearchResponse::default())
        }

        async fn volume(&self, _volume_id: &str) -> Result<Option<Volume>, CatalogError> {
            self.db
                .insert_book(&NewBook::from_volume(&self.volume))
                .await
                .unwrap();
            Ok(Some(self.volume.clone()))
        }
    }

    #[tokio::test]
    async fn concurrent_import_returns_the_stored_book() {
        let db = Db::in_memory().await.unwrap();
        let catalog = RacingCatalog {
            db: db.clone(),
            volume: volume("zG3-somecode", "Kindred", 4.2, 30, true),
        };
        let reconciler = Reconciler::new(&db, &catalog);

        let book = reconciler.get_or_create("zG3-somecode").await.unwrap();

        let stored = db.find_book_by_google_id("zG3-somecode").await.unwrap().unwrap();
        assert_eq!(book, stored);
        assert_eq!(db.count_books().await.unwrap(), 1);
    }
}
