use crate::database::types::BookRating;
use crate::database::{Db, book_json, new_id};
use chrono::Utc;

const RATING_SELECT: &str = concat!(
    "SELECT
        r.id,
        r.user_id,
        r.book_id,
        r.rating,
        r.review,
        r.created_at,
        r.updated_at,
        ",
    book_json!(),
    " AS book
    FROM book_ratings AS r
    JOIN books AS b ON b.id = r.book_id"
);

impl Db {
    /// Fetches the rating a user gave a book, `None` if the user has not rated it.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn user_rating(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Option<BookRating>, sqlx::Error> {
        let sql = format!("{RATING_SELECT} WHERE r.user_id = ? AND r.book_id = ?");
        sqlx::query_as(&sql)
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(self.pool())
            .await
    }

    /// Creates or replaces the rating of a user for a book. An empty review is stored as no
    /// review.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn set_rating(
        &self,
        user_id: &str,
        book_id: &str,
        rating: i64,
        review: Option<&str>,
    ) -> Result<BookRating, sqlx::Error> {
        let review = review.map(str::trim).filter(|text| !text.is_empty());
        sqlx::query(
            r#"
            INSERT INTO book_ratings (id, user_id, book_id, rating, review, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(user_id, book_id) DO UPDATE SET
                rating = excluded.rating,
                review = excluded.review,
                updated_at = excluded.updated_at;
        "#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(book_id)
        .bind(rating)
        .bind(review)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        self.user_rating(user_id, book_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Returns whether a rating was removed.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn delete_rating(&self, user_id: &str, book_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM book_ratings WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All ratings of a user, most recently created first.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn user_ratings(&self, user_id: &str) -> Result<Vec<BookRating>, sqlx::Error> {
        let sql = format!(
            "{RATING_SELECT} WHERE r.user_id = ? ORDER BY r.created_at DESC, r.rowid DESC"
        );
        sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
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
    use crate::test_support::seed_book;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn rating_is_upserted_per_user_and_book() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Middlemarch").await;

        assert_eq!(db.user_rating("alice", &book.id).await.unwrap(), None);

        let first = db
            .set_rating("alice", &book.id, 3, Some("Slow start"))
            .await
            .unwrap();
        let second = db.set_rating("alice", &book.id, 5, Some("  ")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.rating, 5);
        assert_eq!(second.review, None);
        assert_eq!(second.book.title, "Middlemarch");
        assert_eq!(db.user_ratings("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_by_the_schema() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Middlemarch").await;

        assert!(db.set_rating("alice", &book.id, 6, None).await.is_err());
        assert_eq!(db.user_rating("alice", &book.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleting_a_rating() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Middlemarch").await;
        db.set_rating("alice", &book.id, 4, None).await.unwrap();

        assert!(db.delete_rating("alice", &book.id).await.unwrap());
        assert!(!db.delete_rating("alice", &book.id).await.unwrap());
        assert!(db.user_ratings("alice").await.unwrap().is_empty());
    }
}
