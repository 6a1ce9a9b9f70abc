use crate::database::types::{Book, BookUpdate, InsertBookError, NewBook};
use crate::database::{BOOK_COLUMNS, is_unique_violation, new_id};
use chrono::Utc;
use core::str::FromStr as _;
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::path::Path;

#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at start of program"
    )]
    pub async fn init(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .foreign_keys(true)
            .create_if_missing(true)
            .filename(path);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!().run(&pool).await?;
        info!("Opened library database at {}", path.display());

        Ok(Self { pool })
    }

    /// Opens a private in-memory database, mostly useful for tests and throwaway sessions. The
    /// pool is limited to a single connection that never expires, since every new connection
    /// would see an empty database.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at end of program"
    )]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn get_book(&self, book_id: &str) -> Result<Option<Book>, sqlx::Error> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?");
        sqlx::query_as(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn find_book_by_google_id(
        &self,
        google_books_id: &str,
    ) -> Result<Option<Book>, sqlx::Error> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE google_books_id = ?");
        sqlx::query_as(&sql)
            .bind(google_books_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Inserts a new book and returns the stored row.
    /// # Errors
    /// Returns `InsertBookError::BookAlreadyExists` if a book with the same Google Books ID is
    /// already stored, or `InsertBookError::Db` for any other database failure.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn insert_book(&self, book: &NewBook) -> Result<Book, InsertBookError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO books (
                id,
                google_books_id,
                title,
                author,
                year,
                cover_url,
                synopsis,
                isbn,
                page_count,
                language,
                categories,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            RETURNING {BOOK_COLUMNS};"
        );

        let inserted: Result<Book, sqlx::Error> = sqlx::query_as(&sql)
            .bind(new_id())
            .bind(&book.google_books_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.year)
            .bind(&book.cover_url)
            .bind(&book.synopsis)
            .bind(&book.isbn)
            .bind(book.page_count)
            .bind(&book.language)
            .bind(Json(&book.categories))
            .bind(now)
            .fetch_one(&self.pool)
            .await;

        match inserted {
            Ok(stored) => {
                debug!("Inserted book {} ({})", stored.id, stored.title);
                Ok(stored)
            }
            Err(error) if is_unique_violation(&error) => Err(InsertBookError::BookAlreadyExists(
                book.google_books_id.clone().unwrap_or_default(),
            )),
            Err(error) => Err(InsertBookError::Db(error)),
        }
    }

    /// Applies a partial update to a book. Returns `None` if no book with this ID exists.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_book(
        &self,
        book_id: &str,
        update: &BookUpdate,
    ) -> Result<Option<Book>, sqlx::Error> {
        let sql = format!(
            "UPDATE books SET
                title = COALESCE(?1, title),
                author = COALESCE(?2, author),
                year = COALESCE(?3, year),
                cover_url = COALESCE(?4, cover_url),
                synopsis = COALESCE(?5, synopsis),
                isbn = COALESCE(?6, isbn),
                page_count = COALESCE(?7, page_count),
                language = COALESCE(?8, language),
                categories = COALESCE(?9, categories),
                updated_at = ?10
            WHERE id = ?11
            RETURNING {BOOK_COLUMNS};"
        );
        sqlx::query_as(&sql)
            .bind(&update.title)
            .bind(&update.author)
            .bind(&update.year)
            .bind(&update.cover_url)
            .bind(&update.synopsis)
            .bind(&update.isbn)
            .bind(update.page_count)
            .bind(&update.language)
            .bind(update.categories.as_ref().map(Json))
            .bind(Utc::now())
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
    }

    #[cfg(test)]
    pub(crate) async fn count_books(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests run against a fresh in-memory database"
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dune() -> NewBook {
        NewBook {
            google_books_id: Some("B1hSG45JCX4C".to_owned()),
            title: "Dune".to_owned(),
            author: Some("Frank Herbert".to_owned()),
            year: Some("1965".to_owned()),
            categories: vec!["Fiction".to_owned()],
            ..NewBook::default()
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_book() {
        let db = Db::in_memory().await.unwrap();
        let stored = db.insert_book(&dune()).await.unwrap();

        assert_eq!(stored.title, "Dune");
        assert_eq!(stored.categories, vec!["Fiction".to_owned()]);
        assert_eq!(db.get_book(&stored.id).await.unwrap(), Some(stored.clone()));
        assert_eq!(
            db.find_book_by_google_id("B1hSG45JCX4C").await.unwrap(),
            Some(stored)
        );
    }

    #[tokio::test]
    async fn duplicate_google_id_is_reported() {
        let db = Db::in_memory().await.unwrap();
        db.insert_book(&dune()).await.unwrap();

        let second = db.insert_book(&dune()).await;
        assert!(matches!(
            second,
            Err(InsertBookError::BookAlreadyExists(ref id)) if id == "B1hSG45JCX4C"
        ));
        assert_eq!(db.count_books().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn books_without_google_id_do_not_collide() {
        let db = Db::in_memory().await.unwrap();
        let manual = NewBook {
            title: "Notes".to_owned(),
            ..NewBook::default()
        };
        db.insert_book(&manual).await.unwrap();
        db.insert_book(&manual).await.unwrap();

        assert_eq!(db.count_books().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_book_only_touches_given_fields() {
        let db = Db::in_memory().await.unwrap();
        let stored = db.insert_book(&dune()).await.unwrap();

        let update = BookUpdate {
            page_count: Some(412),
            categories: Some(vec!["Science Fiction".to_owned()]),
            ..BookUpdate::default()
        };
        let updated = db.update_book(&stored.id, &update).await.unwrap().unwrap();

        assert_eq!(updated.title, "Dune");
        assert_eq!(updated.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(updated.page_count, Some(412));
        assert_eq!(updated.categories, vec!["Science Fiction".to_owned()]);
        assert!(updated.updated_at >= stored.updated_at);
    }

    #[tokio::test]
    async fn update_missing_book_returns_none() {
        let db = Db::in_memory().await.unwrap();
        let updated = db
            .update_book(
                "550e8400-e29b-41d4-a716-446655440000",
                &BookUpdate::default(),
            )
            .await
            .unwrap();
        assert_eq!(updated, None);
    }
}
