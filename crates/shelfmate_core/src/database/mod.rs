//! Database library
//!
//! The module exposes the `Db` struct and its methods to interact with the database
//! through pre-defined queries, grouped by the table they mainly work on.
pub mod club;
pub mod queries;
pub mod quotes;
pub mod ratings;
pub mod reading_list;
pub mod types;

pub use queries::Db;

/// Columns of the `books` table, in the order `Book` expects them.
pub(crate) const BOOK_COLUMNS: &str = "id, google_books_id, title, author, year, cover_url, \
    synopsis, isbn, page_count, language, categories, created_at, updated_at";

/// Builds a JSON object of the book aliased as `b`, decoded into `Book` through `#[sqlx(json)]`.
macro_rules! book_json {
    () => {
        "json_object(
            'id', b.id,
            'google_books_id', b.google_books_id,
            'title', b.title,
            'author', b.author,
            'year', b.year,
            'cover_url', b.cover_url,
            'synopsis', b.synopsis,
            'isbn', b.isbn,
            'page_count', b.page_count,
            'language', b.language,
            'categories', json(b.categories),
            'created_at', b.created_at,
            'updated_at', b.updated_at
        )"
    };
}
pub(crate) use book_json;

/// Returns true if the error was raised by a UNIQUE constraint.
#[allow(
    clippy::pattern_type_mismatch,
    reason = "False positive, this is the idiomatic pattern"
)]
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = error {
        db_err.is_unique_violation()
    } else {
        false
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
