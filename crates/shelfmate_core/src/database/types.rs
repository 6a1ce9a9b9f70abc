use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A canonical catalog entry. One row exists per Google Books volume the users have interacted
/// with, plus any books created without an external identifier.
#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Book {
    pub id: String,
    pub google_books_id: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<String>,
    pub cover_url: Option<String>,
    pub synopsis: Option<String>,
    pub isbn: Option<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    #[sqlx(json)]
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a new book.
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct NewBook {
    pub google_books_id: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<String>,
    pub cover_url: Option<String>,
    pub synopsis: Option<String>,
    pub isbn: Option<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Partial update of a book, `None` fields are left untouched.
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub cover_url: Option<String>,
    pub synopsis: Option<String>,
    pub isbn: Option<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    pub categories: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReadingStatus {
    #[default]
    WantToRead,
    Reading,
    Read,
    Abandoned,
}

/// An entry of a user's reading list, joined with its book.
#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct UserBook {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub status: ReadingStatus,
    pub started_at: Option<NaiveDate>,
    pub finished_at: Option<NaiveDate>,
    pub current_page: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(json)]
    pub book: Book,
}

/// Partial update of a reading list entry, `None` fields are left untouched.
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct UserBookUpdate {
    pub status: Option<ReadingStatus>,
    pub started_at: Option<NaiveDate>,
    pub finished_at: Option<NaiveDate>,
    pub current_page: Option<i64>,
    pub notes: Option<String>,
}

#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadingStats {
    pub read: i64,
    pub reading: i64,
    pub want_to_read: i64,
    pub abandoned: i64,
}

impl ReadingStats {
    #[must_use]
    #[inline]
    pub const fn new(read: i64, reading: i64, want_to_read: i64, abandoned: i64) -> Self {
        Self {
            read,
            reading,
            want_to_read,
            abandoned,
        }
    }

    #[must_use]
    #[inline]
    pub const fn total(&self) -> i64 {
        self.read + self.reading + self.want_to_read + self.abandoned
    }
}

#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct BookRating {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub rating: i64,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(json)]
    pub book: Book,
}

#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct BookQuote {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub quote_text: String,
    pub page_number: Option<i64>,
    pub chapter: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(json)]
    pub book: Book,
}

#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct NewQuote {
    pub quote_text: String,
    pub page_number: Option<i64>,
    pub chapter: Option<String>,
    pub notes: Option<String>,
}

/// Partial update of a quote, `None` fields are left untouched.
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct QuoteUpdate {
    pub quote_text: Option<String>,
    pub page_number: Option<i64>,
    pub chapter: Option<String>,
    pub notes: Option<String>,
}

/// The most recent suggestion of a book, together with the number of users who suggested it.
#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct BookClubSuggestion {
    pub id: String,
    pub book_id: String,
    pub suggested_by: String,
    pub created_at: DateTime<Utc>,
    pub vote_count: i64,
    #[sqlx(json)]
    pub book: Book,
}

#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct CurrentClubBook {
    pub book_id: String,
    pub set_by: String,
    pub set_at: DateTime<Utc>,
    pub notes: Option<String>,
    #[sqlx(json)]
    pub book: Book,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum InsertBookError {
    #[error("book already exists (google_books_id={0})")]
    BookAlreadyExists(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}
