use crate::database::types::{BookQuote, NewQuote, QuoteUpdate};
use crate::database::{Db, book_json, new_id};
use chrono::Utc;

const QUOTE_SELECT: &str = concat!(
    "SELECT
        q.id,
        q.user_id,
        q.book_id,
        q.quote_text,
        q.page_number,
        q.chapter,
        q.notes,
        q.created_at,
        q.updated_at,
        ",
    book_json!(),
    " AS book
    FROM book_quotes AS q
    JOIN books AS b ON b.id = q.book_id"
);

impl Db {
    async fn fetch_quote(&self, quote_id: &str) -> Result<Option<BookQuote>, sqlx::Error> {
        let sql = format!("{QUOTE_SELECT} WHERE q.id = ?");
        sqlx::query_as(&sql)
            .bind(quote_id)
            .fetch_optional(self.pool())
            .await
    }

    /// Quotes of a user for one book, in reading order: by page, quotes without a page last,
    /// newest first within the same page.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn book_quotes(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Vec<BookQuote>, sqlx::Error> {
        let sql = format!(
            "{QUOTE_SELECT}
            WHERE q.user_id = ? AND q.book_id = ?
            ORDER BY q.page_number IS NULL, q.page_number ASC, q.created_at DESC, q.rowid DESC"
        );
        sqlx::query_as(&sql)
            .bind(user_id)
            .bind(book_id)
            .fetch_all(self.pool())
            .await
    }

    /// All quotes of a user, newest first.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn user_quotes(&self, user_id: &str) -> Result<Vec<BookQuote>, sqlx::Error> {
        let sql = format!(
            "{QUOTE_SELECT} WHERE q.user_id = ? ORDER BY q.created_at DESC, q.rowid DESC"
        );
        sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn add_quote(
        &self,
        user_id: &str,
        book_id: &str,
        quote: &NewQuote,
    ) -> Result<BookQuote, sqlx::Error> {
        let quote_id = new_id();
        sqlx::query(
            r#"
            INSERT INTO book_quotes (
                id,
                user_id,
                book_id,
                quote_text,
                page_number,
                chapter,
                notes,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);
        "#,
        )
        .bind(&quote_id)
        .bind(user_id)
        .bind(book_id)
        .bind(&quote.quote_text)
        .bind(quote.page_number)
        .bind(&quote.chapter)
        .bind(&quote.notes)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        self.fetch_quote(&quote_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Applies a partial update to a quote owned by the user. Returns `None` if the user has no
    /// quote with this ID.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_quote(
        &self,
        user_id: &str,
        quote_id: &str,
        update: &QuoteUpdate,
    ) -> Result<Option<BookQuote>, sqlx::Error> {
        let updated: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE book_quotes SET
                quote_text = COALESCE(?1, quote_text),
                page_number = COALESCE(?2, page_number),
                chapter = COALESCE(?3, chapter),
                notes = COALESCE(?4, notes),
                updated_at = ?5
            WHERE id = ?6 AND user_id = ?7
            RETURNING id;
        "#,
        )
        .bind(&update.quote_text)
        .bind(update.page_number)
        .bind(&update.chapter)
        .bind(&update.notes)
        .bind(Utc::now())
        .bind(quote_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        match updated {
            Some(quote_id) => self.fetch_quote(&quote_id).await,
            None => Ok(None),
        }
    }

    /// Returns whether a quote was removed.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn delete_quote(&self, user_id: &str, quote_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM book_quotes WHERE id = ? AND user_id = ?")
            .bind(quote_id)
            .bind(user_id)
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

    fn quote(text: &str, page_number: Option<i64>) -> NewQuote {
        NewQuote {
            quote_text: text.to_owned(),
            page_number,
            ..NewQuote::default()
        }
    }

    #[tokio::test]
    async fn quotes_are_listed_by_page_with_unpaged_last() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Moby-Dick").await;

        db.add_quote("alice", &book.id, &quote("No page", None))
            .await
            .unwrap();
        db.add_quote("alice", &book.id, &quote("Page 40", Some(40)))
            .await
            .unwrap();
        db.add_quote("alice", &book.id, &quote("Call me Ishmael.", Some(1)))
            .await
            .unwrap();
        db.add_quote("bob", &book.id, &quote("Someone else's", Some(2)))
            .await
            .unwrap();

        let texts: Vec<String> = db
            .book_quotes("alice", &book.id)
            .await
            .unwrap()
            .into_iter()
            .map(|stored| stored.quote_text)
            .collect();
        assert_eq!(
            texts,
            vec![
                "Call me Ishmael.".to_owned(),
                "Page 40".to_owned(),
                "No page".to_owned()
            ]
        );
        assert_eq!(db.user_quotes("alice").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn quotes_can_only_be_changed_by_their_owner() {
        let db = Db::in_memory().await.unwrap();
        let book = seed_book(&db, "vol-1", "Moby-Dick").await;
        let stored = db
            .add_quote("alice", &book.id, &quote("Call me Ishmael.", Some(1)))
            .await
            .unwrap();

        let update = QuoteUpdate {
            chapter: Some("Loomings".to_owned()),
            ..QuoteUpdate::default()
        };
        assert_eq!(
            db.update_quote("bob", &stored.id, &update).await.unwrap(),
            None
        );
        assert!(!db.delete_quote("bob", &stored.id).await.unwrap());

        let updated = db
            .update_quote("alice", &stored.id, &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.chapter.as_deref(), Some("Loomings"));
        assert_eq!(updated.quote_text, "Call me Ishmael.");

        assert!(db.delete_quote("alice", &stored.id).await.unwrap());
        assert!(db.user_quotes("alice").await.unwrap().is_empty());
    }
}
