//! The operations front ends offer on top of the database: everything a user does with books,
//! checked against the current session and with book references reconciled before any write.
use crate::catalog::Catalog;
use crate::catalog::errors::CatalogError;
use crate::database::Db;
use crate::database::types::{
    Book, BookClubSuggestion, BookQuote, BookRating, BookUpdate, CurrentClubBook, NewQuote,
    QuoteUpdate, ReadingStats, ReadingStatus, UserBook, UserBookUpdate,
};
use crate::reconcile::{ReconcileError, Reconciler};
use chrono::NaiveDate;
use core::ops::RangeInclusive;
use log::info;

pub const RATING_RANGE: RangeInclusive<i64> = 0..=5;

/// Who is using the app. Passed explicitly to every operation that reads or writes user data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    user_id: Option<String>,
}

impl Session {
    /// A session for the given user. A blank ID means nobody is signed in.
    #[must_use]
    #[inline]
    pub fn signed_in(user_id: &str) -> Self {
        let user_id = user_id.trim();
        Self {
            user_id: (!user_id.is_empty()).then(|| user_id.to_owned()),
        }
    }

    #[must_use]
    #[inline]
    pub const fn anonymous() -> Self {
        Self { user_id: None }
    }

    #[must_use]
    #[inline]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// # Errors
    /// Fails with `LibraryError::NotSignedIn` for anonymous sessions.
    #[inline]
    pub fn require_user(&self) -> Result<&str, LibraryError> {
        self.user_id().ok_or(LibraryError::NotSignedIn)
    }
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("you need to be signed in")]
    NotSignedIn,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Reconcile(ReconcileError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl From<ReconcileError> for LibraryError {
    #[inline]
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::UnknownBook(id) => Self::NotFound(format!("book {id}")),
            ReconcileError::NotInCatalog(id) => Self::NotFound(format!("catalog volume {id}")),
            ReconcileError::Db(db_err) => Self::Db(db_err),
            other => Self::Reconcile(other),
        }
    }
}

fn invalid(message: &str) -> LibraryError {
    LibraryError::InvalidInput(message.to_owned())
}

fn validate_rating(rating: i64) -> Result<(), LibraryError> {
    if RATING_RANGE.contains(&rating) {
        Ok(())
    } else {
        Err(invalid("rating must be between 0 and 5"))
    }
}

fn validate_page(page: Option<i64>) -> Result<(), LibraryError> {
    match page {
        Some(page) if page < 0 => Err(invalid("page number must not be negative")),
        _ => Ok(()),
    }
}

fn validate_not_blank(value: Option<&str>, field: &str) -> Result<(), LibraryError> {
    match value {
        Some(text) if text.trim().is_empty() => Err(LibraryError::InvalidInput(format!(
            "{field} must not be empty"
        ))),
        _ => Ok(()),
    }
}

pub struct Library<'a, C> {
    db: &'a Db,
    catalog: &'a C,
}

impl<'a, C: Catalog> Library<'a, C> {
    #[must_use]
    #[inline]
    pub const fn new(db: &'a Db, catalog: &'a C) -> Self {
        Self { db, catalog }
    }

    const fn reconciler(&self) -> Reconciler<'a, C> {
        Reconciler::new(self.db, self.catalog)
    }

    /// The ID of the stored book a write refers to. Internal IDs must have a row, catalog IDs are
    /// imported on first use.
    async fn stored_book_id(&self, reference: &str) -> Result<String, LibraryError> {
        Ok(self.reconciler().resolve_book(reference).await?.id)
    }

    /// The stored book for any reference, importing catalog volumes on first use.
    /// # Errors
    /// Fails with `NotFound` if neither the database nor the catalog knows the book.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn book(&self, reference: &str) -> Result<Book, LibraryError> {
        Ok(self.reconciler().resolve_book(reference).await?)
    }

    /// # Errors
    /// Fails with `NotFound` if the book does not exist.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_book(
        &self,
        session: &Session,
        book_id: &str,
        update: &BookUpdate,
    ) -> Result<Book, LibraryError> {
        session.require_user()?;
        validate_not_blank(update.title.as_deref(), "title")?;
        validate_page(update.page_count)?;
        self.db
            .update_book(book_id, update)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("book {book_id}")))
    }

    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn reading_list(
        &self,
        session: &Session,
        status: Option<ReadingStatus>,
    ) -> Result<Vec<UserBook>, LibraryError> {
        let user_id = session.require_user()?;
        Ok(self.db.reading_list(user_id, status).await?)
    }

    /// Puts a book on the reading list, or moves it to `status` if it already is on it.
    /// # Errors
    /// Fails if nobody is signed in, the book cannot be reconciled or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn add_to_reading_list(
        &self,
        session: &Session,
        reference: &str,
        status: ReadingStatus,
        started_at: Option<NaiveDate>,
    ) -> Result<UserBook, LibraryError> {
        let user_id = session.require_user()?;
        let book_id = self.stored_book_id(reference).await?;
        let entry = self
            .db
            .add_to_reading_list(user_id, &book_id, status, started_at)
            .await?;
        info!("Book {book_id} is now {:?} for {user_id}", entry.status);
        Ok(entry)
    }

    /// # Errors
    /// Fails with `NotFound` if the book is not on the user's reading list.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_reading_status(
        &self,
        session: &Session,
        reference: &str,
        status: ReadingStatus,
        started_at: Option<NaiveDate>,
        finished_at: Option<NaiveDate>,
    ) -> Result<UserBook, LibraryError> {
        let user_id = session.require_user()?;
        let not_listed = || LibraryError::NotFound(format!("reading list entry for {reference}"));
        let book_id = self
            .reconciler()
            .lookup_id(reference)
            .await?
            .ok_or_else(not_listed)?;
        self.db
            .update_reading_status(user_id, &book_id, status, started_at, finished_at)
            .await?
            .ok_or_else(not_listed)
    }

    /// # Errors
    /// Fails with `NotFound` if the entry does not exist or belongs to someone else.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_reading_list_item(
        &self,
        session: &Session,
        entry_id: &str,
        update: &UserBookUpdate,
    ) -> Result<UserBook, LibraryError> {
        let user_id = session.require_user()?;
        validate_page(update.current_page)?;
        self.db
            .update_reading_list_item(user_id, entry_id, update)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("reading list entry {entry_id}")))
    }

    /// Returns whether the book was on the reading list.
    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn remove_from_reading_list(
        &self,
        session: &Session,
        reference: &str,
    ) -> Result<bool, LibraryError> {
        let user_id = session.require_user()?;
        match self.reconciler().lookup_id(reference).await? {
            Some(book_id) => Ok(self.db.remove_from_reading_list(user_id, &book_id).await?),
            None => Ok(false),
        }
    }

    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn reading_stats(&self, session: &Session) -> Result<ReadingStats, LibraryError> {
        let user_id = session.require_user()?;
        Ok(self.db.reading_stats(user_id).await?)
    }

    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn user_rating(
        &self,
        session: &Session,
        reference: &str,
    ) -> Result<Option<BookRating>, LibraryError> {
        let user_id = session.require_user()?;
        match self.reconciler().lookup_id(reference).await? {
            Some(book_id) => Ok(self.db.user_rating(user_id, &book_id).await?),
            None => Ok(None),
        }
    }

    /// # Errors
    /// Fails if nobody is signed in, the rating is outside `RATING_RANGE`, the book cannot be
    /// reconciled or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn set_rating(
        &self,
        session: &Session,
        reference: &str,
        rating: i64,
        review: Option<&str>,
    ) -> Result<BookRating, LibraryError> {
        let user_id = session.require_user()?;
        validate_rating(rating)?;
        let book_id = self.stored_book_id(reference).await?;
        Ok(self.db.set_rating(user_id, &book_id, rating, review).await?)
    }

    /// Returns whether a rating was deleted.
    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn delete_rating(
        &self,
        session: &Session,
        reference: &str,
    ) -> Result<bool, LibraryError> {
        let user_id = session.require_user()?;
        match self.reconciler().lookup_id(reference).await? {
            Some(book_id) => Ok(self.db.delete_rating(user_id, &book_id).await?),
            None => Ok(false),
        }
    }

    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn user_ratings(&self, session: &Session) -> Result<Vec<BookRating>, LibraryError> {
        let user_id = session.require_user()?;
        Ok(self.db.user_ratings(user_id).await?)
    }

    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn book_quotes(
        &self,
        session: &Session,
        reference: &str,
    ) -> Result<Vec<BookQuote>, LibraryError> {
        let user_id = session.require_user()?;
        match self.reconciler().lookup_id(reference).await? {
            Some(book_id) => Ok(self.db.book_quotes(user_id, &book_id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn user_quotes(&self, session: &Session) -> Result<Vec<BookQuote>, LibraryError> {
        let user_id = session.require_user()?;
        Ok(self.db.user_quotes(user_id).await?)
    }

    /// # Errors
    /// Fails if nobody is signed in, the quote is empty or has a negative page, the book cannot
    /// be reconciled or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn add_quote(
        &self,
        session: &Session,
        reference: &str,
        quote: &NewQuote,
    ) -> Result<BookQuote, LibraryError> {
        let user_id = session.require_user()?;
        validate_not_blank(Some(&quote.quote_text), "quote text")?;
        validate_page(quote.page_number)?;
        let book_id = self.stored_book_id(reference).await?;
        Ok(self.db.add_quote(user_id, &book_id, quote).await?)
    }

    /// # Errors
    /// Fails with `NotFound` if the quote does not exist or belongs to someone else.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn update_quote(
        &self,
        session: &Session,
        quote_id: &str,
        update: &QuoteUpdate,
    ) -> Result<BookQuote, LibraryError> {
        let user_id = session.require_user()?;
        validate_not_blank(update.quote_text.as_deref(), "quote text")?;
        validate_page(update.page_number)?;
        self.db
            .update_quote(user_id, quote_id, update)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("quote {quote_id}")))
    }

    /// Returns whether a quote was deleted.
    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn delete_quote(&self, session: &Session, quote_id: &str) -> Result<bool, LibraryError> {
        let user_id = session.require_user()?;
        Ok(self.db.delete_quote(user_id, quote_id).await?)
    }

    /// Suggests a book for the club. Returns `false` if the user already suggested it.
    /// # Errors
    /// Fails if nobody is signed in, the book cannot be reconciled or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn suggest_book(&self, session: &Session, reference: &str) -> Result<bool, LibraryError> {
        let user_id = session.require_user()?;
        let book_id = self.stored_book_id(reference).await?;
        Ok(self.db.suggest_book(user_id, &book_id).await?)
    }

    /// # Errors
    /// Fails if the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn club_suggestions(&self) -> Result<Vec<BookClubSuggestion>, LibraryError> {
        Ok(self.db.club_suggestions().await?)
    }

    /// # Errors
    /// Fails if the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn current_club_book(&self) -> Result<Option<CurrentClubBook>, LibraryError> {
        Ok(self.db.current_club_book().await?)
    }

    /// Makes the book the club's current book, replacing the previous one.
    /// # Errors
    /// Fails if nobody is signed in, the book cannot be reconciled or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn set_current_club_book(
        &self,
        session: &Session,
        reference: &str,
        notes: Option<&str>,
    ) -> Result<CurrentClubBook, LibraryError> {
        let user_id = session.require_user()?;
        let book_id = self.stored_book_id(reference).await?;
        let current = self
            .db
            .set_current_club_book(user_id, &book_id, notes)
            .await?;
        info!("{user_id} made \"{}\" the club's current book", current.book.title);
        Ok(current)
    }

    /// Returns whether there was a current book.
    /// # Errors
    /// Fails if nobody is signed in or the database fails.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn clear_current_club_book(&self, session: &Session) -> Result<bool, LibraryError> {
        session.require_user()?;
        Ok(self.db.clear_current_club_book().await?)
    }
}
