//! HTTP routes of the reading tracker API.
//!
//! Book references in paths and bodies are either internal book IDs or catalog volume IDs, the
//! user is identified by the `x-user-id` header set by the identity gateway in front of the
//! server.
use crate::config::LIBRARY_DATABASE_NAME;
use crate::errors::Error;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use core::convert::Infallible;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shelfmate_core::catalog::format::SearchResult;
use shelfmate_core::catalog::search::curated_search;
use shelfmate_core::database::types::{
    Book, BookClubSuggestion, BookQuote, BookRating, BookUpdate, CurrentClubBook, NewQuote,
    QuoteUpdate, ReadingStats, ReadingStatus, UserBook, UserBookUpdate,
};
use shelfmate_core::library::{Library, LibraryError, Session};
use shelfmate_core::preferences::{Palette, Preferences, Theme};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

pub const USER_ID_HEADER: &str = "x-user-id";

type SharedState = Arc<AppState>;
type ApiResult<T> = Result<Json<T>, Error>;

/// The session of the user making the request, anonymous without an `x-user-id` header.
pub struct RequestSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for RequestSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map_or_else(Session::anonymous, Session::signed_in);
        Ok(Self(session))
    }
}

#[allow(clippy::missing_inline_in_public_items, reason = "Called once per run")]
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/library/status", get(library_status))
        .route("/library/create", post(create_library))
        .route("/library/open", post(open_library))
        .route("/search", get(search))
        .route("/books/{reference}", get(book).patch(update_book))
        .route(
            "/books/{reference}/rating",
            get(user_rating).put(set_rating).delete(delete_rating),
        )
        .route("/books/{reference}/quotes", get(book_quotes).post(add_quote))
        .route("/reading-list", get(reading_list).post(add_to_reading_list))
        .route("/reading-list/stats", get(reading_stats))
        .route(
            "/reading-list/entries/{entry_id}",
            patch(update_reading_list_item),
        )
        .route(
            "/reading-list/{reference}",
            patch(update_reading_status).delete(remove_from_reading_list),
        )
        .route("/ratings", get(user_ratings))
        .route("/quotes", get(user_quotes))
        .route("/quotes/{quote_id}", patch(update_quote).delete(delete_quote))
        .route(
            "/club/suggestions",
            get(club_suggestions).post(suggest_book),
        )
        .route(
            "/club/current",
            get(current_club_book)
                .put(set_current_club_book)
                .delete(clear_current_club_book),
        )
        .route("/preferences/theme", get(theme))
        .route("/preferences/theme/toggle", post(toggle_theme))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DbInitStatus {
    Loaded,
    NeedsSetup { reason: Option<String> },
}

async fn library_status(State(state): State<SharedState>) -> Json<DbInitStatus> {
    if state.db.read().await.is_some() {
        Json(DbInitStatus::Loaded)
    } else {
        Json(DbInitStatus::NeedsSetup {
            reason: state.last_error.read().await.clone(),
        })
    }
}

#[derive(Deserialize)]
struct CreateLibrary {
    folder: PathBuf,
}

#[instrument(name = "http.create_library", skip_all, fields(folder = ?request.folder))]
async fn create_library(
    State(state): State<SharedState>,
    Json(request): Json<CreateLibrary>,
) -> ApiResult<DbInitStatus> {
    tokio::fs::create_dir_all(&request.folder)
        .await
        .map_err(|err| Error::BadRequest(format!("cannot create library folder: {err}")))?;
    let db_file_path = request.folder.join(LIBRARY_DATABASE_NAME);

    state.connect_db_with_path(&db_file_path).await?;
    remember_library(&state, &db_file_path).await?;
    Ok(Json(DbInitStatus::Loaded))
}

#[derive(Deserialize)]
struct OpenLibrary {
    path: PathBuf,
}

#[instrument(name = "http.open_library", skip_all, fields(path = ?request.path))]
async fn open_library(
    State(state): State<SharedState>,
    Json(request): Json<OpenLibrary>,
) -> ApiResult<DbInitStatus> {
    let exists = tokio::fs::try_exists(&request.path).await.unwrap_or(false);
    if !exists {
        return Err(Error::BadRequest(format!(
            "no library at {}",
            request.path.display()
        )));
    }

    state.connect_db_with_path(&request.path).await?;
    remember_library(&state, &request.path).await?;
    Ok(Json(DbInitStatus::Loaded))
}

async fn remember_library(state: &AppState, path: &std::path::Path) -> Result<(), Error> {
    let mut store = state.store.lock().await;
    store.set_library_path(path);
    store.save().await?;
    tracing::info!("Updated library path in config to {}", path.display());
    Ok(())
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[instrument(name = "http.search", skip_all, fields(query = %params.q))]
async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<SearchResult>> {
    let results = curated_search(&state.catalog, &params.q)
        .await
        .map_err(LibraryError::from)?;
    tracing::info!(found = results.len(), "search done");
    Ok(Json(results))
}

#[instrument(name = "http.book", skip_all, fields(book = %reference))]
async fn book(
    State(state): State<SharedState>,
    Path(reference): Path<String>,
) -> ApiResult<Book> {
    let db = state.db().await?;
    Ok(Json(Library::new(&db, &state.catalog).book(&reference).await?))
}

async fn update_book(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(book_id): Path<String>,
    Json(update): Json<BookUpdate>,
) -> ApiResult<Book> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    Ok(Json(library.update_book(&session, &book_id, &update).await?))
}

#[derive(Deserialize)]
struct ReadingListParams {
    status: Option<ReadingStatus>,
}

async fn reading_list(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Query(params): Query<ReadingListParams>,
) -> ApiResult<Vec<UserBook>> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    Ok(Json(library.reading_list(&session, params.status).await?))
}

#[derive(Deserialize)]
struct AddToReadingList {
    book: String,
    #[serde(default)]
    status: ReadingStatus,
    started_at: Option<NaiveDate>,
}

#[instrument(name = "http.add_to_reading_list", skip_all, fields(book = %request.book))]
async fn add_to_reading_list(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Json(request): Json<AddToReadingList>,
) -> ApiResult<UserBook> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let entry = library
        .add_to_reading_list(&session, &request.book, request.status, request.started_at)
        .await?;
    Ok(Json(entry))
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: ReadingStatus,
    started_at: Option<NaiveDate>,
    finished_at: Option<NaiveDate>,
}

async fn update_reading_status(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(reference): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<UserBook> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let entry = library
        .update_reading_status(
            &session,
            &reference,
            update.status,
            update.started_at,
            update.finished_at,
        )
        .await?;
    Ok(Json(entry))
}

async fn update_reading_list_item(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(entry_id): Path<String>,
    Json(update): Json<UserBookUpdate>,
) -> ApiResult<UserBook> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    Ok(Json(
        library
            .update_reading_list_item(&session, &entry_id, &update)
            .await?,
    ))
}

async fn remove_from_reading_list(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(reference): Path<String>,
) -> ApiResult<Value> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let removed = library.remove_from_reading_list(&session, &reference).await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn reading_stats(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
) -> ApiResult<ReadingStats> {
    let db = state.db().await?;
    Ok(Json(
        Library::new(&db, &state.catalog)
            .reading_stats(&session)
            .await?,
    ))
}

async fn user_ratings(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
) -> ApiResult<Vec<BookRating>> {
    let db = state.db().await?;
    Ok(Json(
        Library::new(&db, &state.catalog)
            .user_ratings(&session)
            .await?,
    ))
}

async fn user_rating(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(reference): Path<String>,
) -> ApiResult<Option<BookRating>> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    Ok(Json(library.user_rating(&session, &reference).await?))
}

#[derive(Deserialize)]
struct RatingRequest {
    rating: i64,
    review: Option<String>,
}

#[instrument(name = "http.set_rating", skip_all, fields(book = %reference, rating = request.rating))]
async fn set_rating(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(reference): Path<String>,
    Json(request): Json<RatingRequest>,
) -> ApiResult<BookRating> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let rating = library
        .set_rating(
            &session,
            &reference,
            request.rating,
            request.review.as_deref(),
        )
        .await?;
    Ok(Json(rating))
}

async fn delete_rating(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(reference): Path<String>,
) -> ApiResult<Value> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let deleted = library.delete_rating(&session, &reference).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn book_quotes(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(reference): Path<String>,
) -> ApiResult<Vec<BookQuote>> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    Ok(Json(library.book_quotes(&session, &reference).await?))
}

async fn add_quote(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(reference): Path<String>,
    Json(quote): Json<NewQuote>,
) -> ApiResult<BookQuote> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    Ok(Json(library.add_quote(&session, &reference, &quote).await?))
}

async fn user_quotes(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
) -> ApiResult<Vec<BookQuote>> {
    let db = state.db().await?;
    Ok(Json(
        Library::new(&db, &state.catalog)
            .user_quotes(&session)
            .await?,
    ))
}

async fn update_quote(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(quote_id): Path<String>,
    Json(update): Json<QuoteUpdate>,
) -> ApiResult<BookQuote> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    Ok(Json(library.update_quote(&session, &quote_id, &update).await?))
}

async fn delete_quote(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Path(quote_id): Path<String>,
) -> ApiResult<Value> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let deleted = library.delete_quote(&session, &quote_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn club_suggestions(State(state): State<SharedState>) -> ApiResult<Vec<BookClubSuggestion>> {
    let db = state.db().await?;
    Ok(Json(
        Library::new(&db, &state.catalog)
            .club_suggestions()
            .await?,
    ))
}

#[derive(Deserialize)]
struct SuggestBook {
    book: String,
}

#[instrument(name = "http.suggest_book", skip_all, fields(book = %request.book))]
async fn suggest_book(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Json(request): Json<SuggestBook>,
) -> ApiResult<Value> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let suggested = library.suggest_book(&session, &request.book).await?;
    Ok(Json(json!({ "suggested": suggested })))
}

async fn current_club_book(
    State(state): State<SharedState>,
) -> ApiResult<Option<CurrentClubBook>> {
    let db = state.db().await?;
    Ok(Json(
        Library::new(&db, &state.catalog)
            .current_club_book()
            .await?,
    ))
}

#[derive(Deserialize)]
struct SetCurrentBook {
    book: String,
    notes: Option<String>,
}

#[instrument(name = "http.set_current_club_book", skip_all, fields(book = %request.book))]
async fn set_current_club_book(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
    Json(request): Json<SetCurrentBook>,
) -> ApiResult<CurrentClubBook> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let current = library
        .set_current_club_book(&session, &request.book, request.notes.as_deref())
        .await?;
    Ok(Json(current))
}

async fn clear_current_club_book(
    State(state): State<SharedState>,
    RequestSession(session): RequestSession,
) -> ApiResult<Value> {
    let db = state.db().await?;
    let library = Library::new(&db, &state.catalog);
    let cleared = library.clear_current_club_book(&session).await?;
    Ok(Json(json!({ "cleared": cleared })))
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThemeResponse {
    pub theme: Theme,
    pub is_dark: bool,
    pub palette: Palette,
}

impl From<Preferences> for ThemeResponse {
    fn from(preferences: Preferences) -> Self {
        Self {
            theme: preferences.theme,
            is_dark: preferences.is_dark(),
            palette: preferences.theme.palette(),
        }
    }
}

async fn theme(State(state): State<SharedState>) -> Json<ThemeResponse> {
    let theme = state.store.lock().await.theme();
    Json(Preferences::new(theme).into())
}

async fn toggle_theme(State(state): State<SharedState>) -> ApiResult<ThemeResponse> {
    let mut store = state.store.lock().await;
    let mut preferences = Preferences::new(store.theme());
    let theme = preferences.toggle_theme();
    store.set_theme(theme);
    store.save().await?;
    tracing::info!("Switched to the {} theme", theme.as_str());
    Ok(Json(preferences.into()))
}
