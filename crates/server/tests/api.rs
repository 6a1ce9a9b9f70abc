//! HTTP API integration tests.
//!
//! Starts the server against a fake book catalog and exercises it with reqwest.
#![allow(clippy::unwrap_used, reason = "Test code")]

use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use shelfmate_core::catalog::client::GoogleBooksClient;
use shelfmate_server::config::{APP_CONFIG_PATH, ConfigStore, LIBRARY_DATABASE_NAME};
use shelfmate_server::router;
use shelfmate_server::state::AppState;
use std::sync::Arc;
use tempfile::TempDir;

async fn catalog_volume(Path(volume_id): Path<String>) -> Response {
    match volume_id.as_str() {
        "zG3-somecode" => axum::Json(json!({
            "id": "zG3-somecode",
            "volumeInfo": {
                "title": "Kindred",
                "authors": ["Octavia E. Butler"],
                "publishedDate": "1979-06-01",
                "imageLinks": { "thumbnail": "http://books.google.com/kindred" },
                "industryIdentifiers": [
                    { "type": "ISBN_10", "identifier": "0807083054" },
                    { "type": "ISBN_13", "identifier": "9780807083055" }
                ]
            }
        }))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn catalog_search() -> axum::Json<Value> {
    axum::Json(json!({
        "totalItems": 3,
        "items": [
            { "id": "coverless", "volumeInfo": { "title": "Coverless", "averageRating": 5.0, "ratingsCount": 900 } },
            { "id": "niche", "volumeInfo": {
                "title": "Niche", "averageRating": 3.0, "ratingsCount": 4,
                "imageLinks": { "thumbnail": "http://books.google.com/niche" } } },
            { "id": "zG3-somecode", "volumeInfo": {
                "title": "Kindred", "averageRating": 4.5, "ratingsCount": 300,
                "imageLinks": { "thumbnail": "http://books.google.com/kindred" } } }
        ]
    }))
}

/// Bind to port 0 and return the actual address.
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let catalog_base = spawn(
            Router::new()
                .route("/volumes", get(catalog_search))
                .route("/volumes/{volume_id}", get(catalog_volume)),
        )
        .await;
        let catalog =
            GoogleBooksClient::with_base_url(&format!("{catalog_base}/volumes"), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load(&dir.path().join(APP_CONFIG_PATH))
            .await
            .unwrap();
        let state = Arc::new(AppState::new(catalog, store));

        Self {
            base: spawn(router(state)).await,
            client: reqwest::Client::new(),
            dir,
        }
    }

    /// Starts a server and creates a library in its temporary folder.
    async fn with_library() -> Self {
        let server = Self::start().await;
        let folder = server.dir.path().join("library");
        let response = server
            .post("/library/create", None, json!({ "folder": folder }))
            .await;
        assert_eq!(response.status(), 200);
        server
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        user: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match user {
            Some(user_id) => request.header("x-user-id", user_id),
            None => request,
        }
    }

    async fn get(&self, path: &str, user: Option<&str>) -> reqwest::Response {
        self.request(reqwest::Method::GET, path, user)
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, user: Option<&str>, body: Value) -> reqwest::Response {
        self.request(reqwest::Method::POST, path, user)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn put(&self, path: &str, user: Option<&str>, body: Value) -> reqwest::Response {
        self.request(reqwest::Method::PUT, path, user)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn patch(&self, path: &str, user: Option<&str>, body: Value) -> reqwest::Response {
        self.request(reqwest::Method::PATCH, path, user)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, path: &str, user: Option<&str>) -> reqwest::Response {
        self.request(reqwest::Method::DELETE, path, user)
            .send()
            .await
            .unwrap()
    }
}

const ALICE: Option<&str> = Some("alice");
const BOB: Option<&str> = Some("bob");

#[tokio::test]
async fn library_setup() {
    let server = TestServer::start().await;

    let health: Value = server.get("/health", None).await.json().await.unwrap();
    assert_eq!(health, json!({ "ok": true }));

    let status: Value = server.get("/library/status", None).await.json().await.unwrap();
    assert_eq!(status, json!({ "status": "needs_setup", "reason": null }));

    let response = server.get("/reading-list", ALICE).await;
    assert_eq!(response.status(), 503);

    let missing = server
        .post(
            "/library/open",
            None,
            json!({ "path": server.dir.path().join("missing.db") }),
        )
        .await;
    assert_eq!(missing.status(), 400);

    let folder = server.dir.path().join("library");
    let created = server
        .post("/library/create", None, json!({ "folder": folder }))
        .await;
    assert_eq!(created.status(), 200);
    assert!(folder.join(LIBRARY_DATABASE_NAME).exists());

    let status: Value = server.get("/library/status", None).await.json().await.unwrap();
    assert_eq!(status, json!({ "status": "loaded" }));

    let store = ConfigStore::load(&server.dir.path().join(APP_CONFIG_PATH))
        .await
        .unwrap();
    assert_eq!(
        store.library_path(),
        Some(folder.join(LIBRARY_DATABASE_NAME))
    );
}

#[tokio::test]
async fn search_is_curated() {
    let server = TestServer::start().await;

    let results: Vec<Value> = server
        .get("/search?q=butler", None)
        .await
        .json()
        .await
        .unwrap();

    let ids: Vec<&str> = results
        .iter()
        .map(|result| result["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["zG3-somecode", "niche"]);
    assert_eq!(results[0]["cover"], "https://books.google.com/kindred");
    assert_eq!(results[0]["rating"], "4.5");
}

#[tokio::test]
async fn reading_list_with_catalog_reference() {
    let server = TestServer::with_library().await;

    let anonymous = server
        .post("/reading-list", None, json!({ "book": "zG3-somecode" }))
        .await;
    assert_eq!(anonymous.status(), 401);

    let added: Value = server
        .post(
            "/reading-list",
            ALICE,
            json!({ "book": "zG3-somecode", "status": "reading" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(added["status"], "reading");
    assert_eq!(added["book"]["title"], "Kindred");
    assert_eq!(added["book"]["isbn"], "9780807083055");
    let book_id = added["book_id"].as_str().unwrap().to_owned();

    let finished: Value = server
        .patch(
            "/reading-list/zG3-somecode",
            ALICE,
            json!({ "status": "read" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(finished["book_id"], book_id.as_str());
    assert!(finished["finished_at"].is_string());

    let list: Vec<Value> = server
        .get("/reading-list?status=read", ALICE)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);

    let stats: Value = server
        .get("/reading-list/stats", ALICE)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stats["read"], 1);

    let entry_id = list[0]["id"].as_str().unwrap();
    let updated: Value = server
        .patch(
            &format!("/reading-list/entries/{entry_id}"),
            ALICE,
            json!({ "current_page": 120, "notes": "Rufus again" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(updated["current_page"], 120);

    let foreign = server
        .patch(
            &format!("/reading-list/entries/{entry_id}"),
            BOB,
            json!({ "current_page": 1 }),
        )
        .await;
    assert_eq!(foreign.status(), 404);

    let removed: Value = server
        .delete(&format!("/reading-list/{book_id}"), ALICE)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(removed, json!({ "removed": true }));
    let list: Vec<Value> = server.get("/reading-list", ALICE).await.json().await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn unknown_volume_is_not_found() {
    let server = TestServer::with_library().await;

    let response = server.get("/books/no-such-volume", ALICE).await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("no-such-volume"));
}

#[tokio::test]
async fn unknown_internal_id_is_not_found() {
    let server = TestServer::with_library().await;
    let unknown = "550e8400-e29b-41d4-a716-446655440000";

    let responses = [
        server
            .post("/reading-list", ALICE, json!({ "book": unknown, "status": "reading" }))
            .await,
        server
            .put(&format!("/books/{unknown}/rating"), ALICE, json!({ "rating": 4 }))
            .await,
        server
            .post(
                &format!("/books/{unknown}/quotes"),
                ALICE,
                json!({ "quote_text": "Call me Ishmael." }),
            )
            .await,
        server
            .post("/club/suggestions", ALICE, json!({ "book": unknown }))
            .await,
        server
            .put("/club/current", ALICE, json!({ "book": unknown }))
            .await,
    ];
    for response in responses {
        assert_eq!(response.status(), 404, "{}", response.url());
    }
}

#[tokio::test]
async fn ratings_and_quotes() {
    let server = TestServer::with_library().await;

    let too_high = server
        .put(
            "/books/zG3-somecode/rating",
            ALICE,
            json!({ "rating": 6 }),
        )
        .await;
    assert_eq!(too_high.status(), 400);

    let rating: Value = server
        .put(
            "/books/zG3-somecode/rating",
            ALICE,
            json!({ "rating": 4, "review": "Harrowing." }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(rating["rating"], 4);

    let stored: Value = server
        .get("/books/zG3-somecode/rating", ALICE)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stored["review"], "Harrowing.");
    let nothing: Value = server
        .get("/books/zG3-somecode/rating", BOB)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(nothing, Value::Null);

    let ratings: Vec<Value> = server.get("/ratings", ALICE).await.json().await.unwrap();
    assert_eq!(ratings.len(), 1);

    let quote: Value = server
        .post(
            "/books/zG3-somecode/quotes",
            ALICE,
            json!({ "quote_text": "I lost an arm on my last trip home.", "page_number": 9 }),
        )
        .await
        .json()
        .await
        .unwrap();
    let quote_id = quote["id"].as_str().unwrap();

    let edited: Value = server
        .patch(
            &format!("/quotes/{quote_id}"),
            ALICE,
            json!({ "chapter": "Prologue" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(edited["chapter"], "Prologue");
    assert_eq!(edited["page_number"], 9);

    let quotes: Vec<Value> = server
        .get("/books/zG3-somecode/quotes", ALICE)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(quotes.len(), 1);

    let deleted: Value = server
        .delete(&format!("/quotes/{quote_id}"), BOB)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(deleted, json!({ "deleted": false }));
    let deleted: Value = server
        .delete(&format!("/quotes/{quote_id}"), ALICE)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(deleted, json!({ "deleted": true }));
    let quotes: Vec<Value> = server.get("/quotes", ALICE).await.json().await.unwrap();
    assert!(quotes.is_empty());
}

#[tokio::test]
async fn book_club() {
    let server = TestServer::with_library().await;

    for (user, expected) in [(ALICE, true), (BOB, true), (ALICE, false)] {
        let suggested: Value = server
            .post("/club/suggestions", user, json!({ "book": "zG3-somecode" }))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(suggested, json!({ "suggested": expected }));
    }

    let suggestions: Vec<Value> = server
        .get("/club/suggestions", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["vote_count"], 2);

    let none: Value = server.get("/club/current", None).await.json().await.unwrap();
    assert_eq!(none, Value::Null);

    let current: Value = server
        .put(
            "/club/current",
            BOB,
            json!({ "book": "zG3-somecode", "notes": "Part one" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(current["set_by"], "bob");
    assert_eq!(current["book"]["title"], "Kindred");

    let anonymous = server.delete("/club/current", None).await;
    assert_eq!(anonymous.status(), 401);
    let cleared: Value = server
        .delete("/club/current", ALICE)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cleared, json!({ "cleared": true }));
}

#[tokio::test]
async fn theme_toggle_is_persisted() {
    let server = TestServer::start().await;

    let theme: Value = server
        .get("/preferences/theme", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(theme["theme"], "light");
    assert_eq!(theme["palette"]["background"], "#E8E2D8");

    let toggled: Value = server
        .post("/preferences/theme/toggle", None, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["theme"], "dark");
    assert_eq!(toggled["isDark"], true);
    assert_eq!(toggled["palette"]["cardBackground"], "#2D2721");

    let store = ConfigStore::load(&server.dir.path().join(APP_CONFIG_PATH))
        .await
        .unwrap();
    assert_eq!(
        store.theme(),
        shelfmate_core::preferences::Theme::Dark
    );
}
