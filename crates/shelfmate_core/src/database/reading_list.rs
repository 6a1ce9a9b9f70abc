use crate::database::types::{ReadingStats, ReadingStatus, UserBook, UserBookUpdate};
use crate::database::{Db, book_json, is_unique_violation, new_id};
use chrono::{NaiveDate, Utc};
use log::debug;

const USER_BOOK_SELECT: &str = concat!(
    "SELECT
        ub.id,
        ub.user_id,
        ub.book_id,
        ub.status,
        ub.started_at,
        ub.finished_at,
        ub.current_page,
        ub.notes,
        ub.created_at,
        ub.updated_at,
        ",
    book_json!(),
    " AS book
    FROM user_books AS ub
    JOIN books AS b ON b.id = ub.book_id"
);

/// Finishing a book without an explicit date stamps it with today's date.
fn default_finished_at(status: ReadingStatus) -> Option<NaiveDate> {
    (status == ReadingStatus::Read).then(|| Utc::now().date_naive())
}

impl Db {
    async fn fetch_user_book(&self, entry_id: &str) -> Result<Option<UserBook>, sqlx::Error> {
        let sql = format!("{USER_BOOK_SELECT} WHERE ub.id = ?");
        sqlx::query_as(&sql)
            .bind(entry_id)
            .fetch_optional(self.pool())
            .await
    }

    /// Fetches a user's reading list, newest entries first, optionally filtered by status.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn reading_list(
        &self,
        user_id: &str,
        status: Option<ReadingStatus>,
    ) -> Result<Vec<UserBook>, sqlx::Error> {
        let sql = format!(
            "{USER_BOOK_SELECT}
            WHERE ub.user_id = ?1 AND (?2 IS NULL OR ub.status = ?2)
            ORDER BY ub.created_at DESC, ub.rowid DESC"
        );
        sqlx::query_as(&sql)
            .bind(user_id)
            .bind(status)
            .fetch_all(self.pool())
            .await
    }

    /// Puts a book on a user's reading list. If the book is already on the list, the existing
    /// entry is moved to the given status instead.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn add_to_reading_list(
        &self,
        user_id: &str,
        book_id: &str,
        status: ReadingStatus,
        started_at: Option<NaiveDate>,
    ) -> Result<UserBook, sqlx::Error> {
        let now = Utc::now();
        let entry_id = new_id();
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_books (
                id,
                user_id,
                book_id,
                status,
                started_at,
                finished_at,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);
        "#,
        )
        .bind(&entry_id)
        .bind(user_id)
        .bind(book_id)
        .bind(status)
        .bind(started_at)
        .bind(default_finished_at(status))
        .bind(now)
        .execute(self.pool())
        .await;

        match inserted {
            Ok(_) => self
                .fetch_user_book(&entry_id)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
            Err(error) if is_unique_violation(&error) => {
                debug!("Book {book_id} already on reading list of {user_id}, updating status");
                self.update_reading_status(user_id, book_id, status, started_at, None)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)
            }
            Err(error) => Err(error),
        }
    }

    /// Moves a reading list entry to a new status. Dates that are not given keep their stored
    /// value, except that a book marked as read gets today's date if it had no finish date yet.
    /// Returns `None` if the book is not on the user's list.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_reading_status(
        &self,
        user_id: &str,
        book_id: &str,
        status: ReadingStatus,
        started_at: Option<NaiveDate>,
        finished_at: Option<NaiveDate>,
    ) -> Result<Option<UserBook>, sqlx::Error> {
        let updated: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE user_books SET
                status = ?1,
                started_at = COALESCE(?2, started_at),
                finished_at = COALESCE(?3, finished_at, ?4),
                updated_at = ?5
            WHERE user_id = ?6 AND book_id = ?7
            RETURNING id;
        "#,
        )
        .bind(status)
        .bind(started_at)
        .bind(finished_at)
        .bind(default_finished_at(status))
        .bind(Utc::now())
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(self.pool())
        .await?;

        match updated {
            Some(entry_id) => self.fetch_user_book(&entry_id).await,
            None => Ok(None),
        }
    }

    /// General update of a reading list entry addressed by its own ID. Only entries owned by
    /// the given user are touched.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_reading_list_item(
        &self,
        user_id: &str,
        entry_id: &str,
        update: &UserBookUpdate,
    ) -> Result<Option<UserBook>, sqlx::Error> {
        let updated: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE user_books SET
                status = COALESCE(?1, status),
                started_at = COALESCE(?2, started_at),
                finished_at = COALESCE(?3, finished_at),
                current_page = COALESCE(?4, current_page),
                notes = COALESCE(?5, notes),
                updated_at = ?6
            WHERE id = ?7 AND user_id = ?8
            RETURNING id;
        "#,
        )
        .bind(update.status)
        .bind(update.started_at)
        .bind(update.finished_at)
        .bind(update.current_page)
        .bind(&update.notes)
        .bind(Utc::now())
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match updated {
            Some(entry_id) => self.fetch_user_book(&entry_id).await,
            None => Ok(None),
        }
    }

    /// Returns whether an entry was removed.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn remove_from_reading_list(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_books WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn reading_stats(&self, user_id: &str) -> Result<ReadingStats, sqlx::Error> {
        let counts: Vec<(ReadingStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM user_books WHERE user_id = ? GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let mut stats = ReadingStats::default();
        for (status, count) in counts {
            match status {
                ReadingStatus::Read => stats.read = count,
                ReadingStatus::Reading => stats.reading = count,
                ReadingStatus::WantToRead => stats.want_to_read = count,
                ReadingStatus::Abandoned => stats.abandoned = count,
            }
        }
        Ok(stats)
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

    const ALICE: &str = "alice";
    const BOB: &str = "bob";

    #[tokio::test]
    async fn adding_twice_updates_the_existing_entry() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Piranesi").await;

        let first = db
            .add_to_reading_list(ALICE, &book.id, ReadingStatus::WantToRead, None)
            .await
            .unwrap();
        let started = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let second = db
            .add_to_reading_list(ALICE, &book.id, ReadingStatus::Reading, Some(started))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, ReadingStatus::Reading);
        assert_eq!(second.started_at, Some(started));
        assert_eq!(second.book.title, "Piranesi");
        assert_eq!(db.reading_list(ALICE, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn marking_read_defaults_finish_date_but_keeps_existing_one() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Piranesi").await;
        db.add_to_reading_list(ALICE, &book.id, ReadingStatus::Reading, None)
            .await
            .unwrap();

        let read = db
            .update_reading_status(ALICE, &book.id, ReadingStatus::Read, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.finished_at, Some(Utc::now().date_naive()));

        let explicit = NaiveDate::from_ymd_opt(2024, 12, 24).unwrap();
        let read = db
            .update_reading_status(ALICE, &book.id, ReadingStatus::Read, None, Some(explicit))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.finished_at, Some(explicit));

        let reread = db
            .update_reading_status(ALICE, &book.id, ReadingStatus::Read, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reread.finished_at, Some(explicit));
    }

    #[tokio::test]
    async fn status_update_for_missing_entry_is_none() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Piranesi").await;

        let updated = db
            .update_reading_status(ALICE, &book.id, ReadingStatus::Read, None, None)
            .await
            .unwrap();
        assert_eq!(updated, None);
    }

    #[tokio::test]
    async fn reading_list_is_per_user_newest_first_and_filterable() {
        let db = Db::in_memory().await.unwrap();
        let first = seed_book(&db, "vol-1", "Piranesi").await;
        let second = seed_book(&db, "vol-2", "Jonathan Strange").await;

        db.add_to_reading_list(ALICE, &first.id, ReadingStatus::Read, None)
            .await
            .unwrap();
        db.add_to_reading_list(ALICE, &second.id, ReadingStatus::WantToRead, None)
            .await
            .unwrap();
        db.add_to_reading_list(BOB, &first.id, ReadingStatus::Reading, None)
            .await
            .unwrap();

        let titles: Vec<String> = db
            .reading_list(ALICE, None)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.book.title)
            .collect();
        assert_eq!(titles, vec!["Jonathan Strange".to_owned(), "Piranesi".to_owned()]);

        let read = db
            .reading_list(ALICE, Some(ReadingStatus::Read))
            .await
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].book_id, first.id);
    }

    #[tokio::test]
    async fn general_update_is_scoped_to_owner() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Piranesi").await;
        let entry = db
            .add_to_reading_list(ALICE, &book.id, ReadingStatus::Reading, None)
            .await
            .unwrap();

        let update = UserBookUpdate {
            current_page: Some(120),
            notes: Some("The house is beautiful".to_owned()),
            ..UserBookUpdate::default()
        };
        assert_eq!(
            db.update_reading_list_item(BOB, &entry.id, &update)
                .await
                .unwrap(),
            None
        );

        let updated = db
            .update_reading_list_item(ALICE, &entry.id, &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.current_page, Some(120));
        assert_eq!(updated.status, ReadingStatus::Reading);
    }

    #[tokio::test]
    async fn stats_and_removal() {
        let db = Db::in_memory().await.unwrap();
        let first = seed_book(&db, "vol-1", "Piranesi").await;
        let second = seed_book(&db, "vol-2", "Jonathan Strange").await;
        let third = seed_book(&db, "vol-3", "The Ladies of Grace Adieu").await;

        db.add_to_reading_list(ALICE, &first.id, ReadingStatus::Read, None)
            .await
            .unwrap();
        db.add_to_reading_list(ALICE, &second.id, ReadingStatus::Read, None)
            .await
            .unwrap();
        db.add_to_reading_list(ALICE, &third.id, ReadingStatus::Abandoned, None)
            .await
            .unwrap();

        assert_eq!(
            db.reading_stats(ALICE).await.unwrap(),
            ReadingStats::new(2, 0, 0, 1)
        );

        assert!(db.remove_from_reading_list(ALICE, &third.id).await.unwrap());
        assert!(!db.remove_from_reading_list(ALICE, &third.id).await.unwrap());
        assert_eq!(db.reading_stats(ALICE).await.unwrap().total(), 2);
        assert_eq!(db.reading_stats(BOB).await.unwrap(), ReadingStats::default());
    }
}
