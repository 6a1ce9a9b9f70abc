use crate::database::types::{BookClubSuggestion, CurrentClubBook};
use crate::database::{Db, book_json, is_unique_violation, new_id};
use chrono::Utc;
use log::debug;

const CURRENT_BOOK_SELECT: &str = concat!(
    "SELECT
        c.book_id,
        c.set_by,
        c.set_at,
        c.notes,
        ",
    book_json!(),
    " AS book
    FROM current_book_club_book AS c
    JOIN books AS b ON b.id = c.book_id
    WHERE c.id = 1"
);

const SUGGESTIONS_SELECT: &str = concat!(
    "WITH votes AS (
        SELECT
            book_id,
            COUNT(*) AS vote_count,
            MAX(rowid) AS latest
        FROM book_club_suggestions
        GROUP BY book_id
    )
    SELECT
        s.id,
        s.book_id,
        s.suggested_by,
        s.created_at,
        v.vote_count,
        ",
    book_json!(),
    " AS book
    FROM votes AS v
    JOIN book_club_suggestions AS s ON s.rowid = v.latest
    JOIN books AS b ON b.id = s.book_id
    ORDER BY s.created_at DESC, s.rowid DESC"
);

impl Db {
    /// Records a user's suggestion of a book for the club. Returns `false` if this user had
    /// already suggested the book.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn suggest_book(&self, user_id: &str, book_id: &str) -> Result<bool, sqlx::Error> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO book_club_suggestions (id, book_id, suggested_by, created_at)
            VALUES (?, ?, ?, ?);
        "#,
        )
        .bind(new_id())
        .bind(book_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(error) if is_unique_violation(&error) => {
                debug!("{user_id} already suggested book {book_id}");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// One entry per suggested book, carrying its most recent suggestion and the number of users
    /// who suggested it. Most recently suggested books come first.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn club_suggestions(&self) -> Result<Vec<BookClubSuggestion>, sqlx::Error> {
        sqlx::query_as(SUGGESTIONS_SELECT)
            .fetch_all(self.pool())
            .await
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn current_club_book(&self) -> Result<Option<CurrentClubBook>, sqlx::Error> {
        sqlx::query_as(CURRENT_BOOK_SELECT)
            .fetch_optional(self.pool())
            .await
    }

    /// Replaces the club's current book in a single statement on the singleton row.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn set_current_club_book(
        &self,
        user_id: &str,
        book_id: &str,
        notes: Option<&str>,
    ) -> Result<CurrentClubBook, sqlx::Error> {
        let notes = notes.map(str::trim).filter(|text| !text.is_empty());
        sqlx::query(
            r#"
            INSERT INTO current_book_club_book (id, book_id, set_by, set_at, notes)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                book_id = excluded.book_id,
                set_by = excluded.set_by,
                set_at = excluded.set_at,
                notes = excluded.notes;
        "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(Utc::now())
        .bind(notes)
        .execute(self.pool())
        .await?;

        self.current_club_book()
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Returns whether a current book was set before.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn clear_current_club_book(&self) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM current_book_club_book")
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
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
    async fn suggestions_are_unique_per_user_and_counted_per_book() {
        let db = Db::in_memory().await.unwrap();
        let first = seed_book(&db, "vol-1", "Beloved").await;
        let second = seed_book(&db, "vol-2", "Sula").await;

        assert!(db.suggest_book("alice", &first.id).await.unwrap());
        assert!(!db.suggest_book("alice", &first.id).await.unwrap());
        assert!(db.suggest_book("bob", &first.id).await.unwrap());
        assert!(db.suggest_book("carol", &second.id).await.unwrap());

        let suggestions = db.club_suggestions().await.unwrap();
        let summary: Vec<(String, i64)> = suggestions
            .iter()
            .map(|suggestion| (suggestion.book.title.clone(), suggestion.vote_count))
            .collect();
        assert_eq!(
            summary,
            vec![("Sula".to_owned(), 1), ("Beloved".to_owned(), 2)]
        );
        assert_eq!(suggestions[1].suggested_by, "bob");
    }

    #[tokio::test]
    async fn current_book_is_replaced_not_duplicated() {
        let db = Db::in_memory().await.unwrap();
        let first = seed_book(&db, "vol-1", "Beloved").await;
        let second = seed_book(&db, "vol-2", "Sula").await;

        assert_eq!(db.current_club_book().await.unwrap(), None);

        db.set_current_club_book("alice", &first.id, Some("March pick"))
            .await
            .unwrap();
        let current = db
            .set_current_club_book("bob", &second.id, None)
            .await
            .unwrap();

        assert_eq!(current.book_id, second.id);
        assert_eq!(current.set_by, "bob");
        assert_eq!(current.notes, None);
        assert_eq!(current.book.title, "Sula");

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM current_book_club_book")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);

        assert!(db.clear_current_club_book().await.unwrap());
        assert!(!db.clear_current_club_book().await.unwrap());
        assert_eq!(db.current_club_book().await.unwrap(), None);
    }
}
