use crate::catalog::errors::CatalogError;
use crate::catalog::volume::{SearchResponse, Volume};
use crate::catalog::{Catalog, OrderBy};
use core::time::Duration;
use log::{debug, warn};
use reqwest::{ClientBuilder, Response, StatusCode, header};
use urlencoding::encode;

pub const GOOGLE_BOOKS_BASE_URL: &str = "https://www.googleapis.com/books/v1/volumes";

/// Keys copied from an example configuration are not sent to the catalog.
const PLACEHOLDER_API_KEY: &str = "your_api_key_here";
const MIN_API_KEY_LENGTH: usize = 10;

/// Returns the key if it looks like a real API key.
#[must_use]
#[inline]
pub fn usable_api_key(api_key: Option<String>) -> Option<String> {
    api_key
        .map(|key| key.trim().to_owned())
        .filter(|key| key != PLACEHOLDER_API_KEY && key.len() > MIN_API_KEY_LENGTH)
}

/// Statuses with which the catalog rejects a bad or restricted API key.
const fn is_key_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    )
}

pub struct GoogleBooksClient {
    /// A HTTP client used to execute all GET requests against the catalog
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksClient {
    /// Create a new client for the public Google Books API.
    /// # Errors
    /// Fails if the underlying HTTP client cannot be built.
    #[inline]
    pub fn new(api_key: Option<String>) -> Result<Self, CatalogError> {
        Self::with_base_url(GOOGLE_BOOKS_BASE_URL, api_key)
    }

    /// Create a new client against any server speaking the volumes API.
    /// # Errors
    /// Fails if the underlying HTTP client cannot be built.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once per run")]
    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self, CatalogError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http_client = ClientBuilder::new()
            .user_agent(concat!("shelfmate/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(25))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: usable_api_key(api_key),
        })
    }

    #[must_use]
    #[inline]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn search_url(
        &self,
        query: &str,
        max_results: u32,
        order_by: OrderBy,
        api_key: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}?q={}&maxResults={max_results}&orderBy={order_by}",
            self.base_url,
            encode(query.trim())
        );
        if let Some(key) = api_key {
            url.push_str("&key=");
            url.push_str(&encode(key));
        }
        url
    }

    fn volume_url(&self, volume_id: &str, api_key: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.base_url, encode(volume_id));
        if let Some(key) = api_key {
            url.push_str("?key=");
            url.push_str(&encode(key));
        }
        url
    }

    /// Sends a GET request with the API key, if there is one. If the catalog rejects the key,
    /// the same request is sent again without it.
    async fn get_with_key_fallback<F>(&self, url_for: F) -> Result<Response, CatalogError>
    where
        F: Fn(Option<&str>) -> String,
    {
        let api_key = self.api_key.as_deref();
        let response = self.http_client.get(url_for(api_key)).send().await?;

        if api_key.is_some() && is_key_rejection(response.status()) {
            warn!(
                "Book catalog rejected the API key with status {}, retrying without it",
                response.status()
            );
            return Ok(self.http_client.get(url_for(None)).send().await?);
        }
        Ok(response)
    }
}

/// Fails with the status and body of an unsuccessful response.
async fn ensure_success(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CatalogError::Status {
        status: status.as_u16(),
        body,
    })
}

impl Catalog for GoogleBooksClient {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        order_by: OrderBy,
    ) -> Result<SearchResponse, CatalogError> {
        if query.trim().is_empty() {
            return Ok(SearchResponse::default());
        }

        debug!("Searching book catalog for {query:?}");
        let response = self
            .get_with_key_fallback(|key| self.search_url(query, max_results, order_by, key))
            .await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn volume(&self, volume_id: &str) -> Result<Option<Volume>, CatalogError> {
        debug!("Fetching volume {volume_id} from book catalog");
        let response = self
            .get_with_key_fallback(|key| self.volume_url(volume_id, key))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = ensure_success(response).await?.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests run against a local fake catalog"
)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::get;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    const VALID_KEY: &str = "a-long-enough-key";

    /// Records every query string the fake catalog receives.
    type Requests = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// A fake catalog that only answers requests without an API key.
    async fn start_catalog() -> (String, Requests) {
        let requests: Requests = Arc::default();

        async fn search(
            State(requests): State<Requests>,
            Query(params): Query<HashMap<String, String>>,
        ) -> AxumResponse {
            let keyed = params.contains_key("key");
            requests.lock().unwrap().push(params);
            if keyed {
                return (AxumStatus::BAD_REQUEST, "API key not valid").into_response();
            }
            axum::Json(json!({
                "totalItems": 1,
                "items": [{ "id": "zG3-somecode", "volumeInfo": { "title": "Kindred" } }]
            }))
            .into_response()
        }

        async fn volume(
            State(requests): State<Requests>,
            Path(volume_id): Path<String>,
            Query(params): Query<HashMap<String, String>>,
        ) -> AxumResponse {
            requests.lock().unwrap().push(params);
            if volume_id == "missing" {
                return (AxumStatus::NOT_FOUND, "not found").into_response();
            }
            if volume_id == "broken" {
                return (AxumStatus::SERVICE_UNAVAILABLE, "backend failed").into_response();
            }
            axum::Json(json!({ "id": volume_id, "volumeInfo": { "title": "Kindred" } }))
                .into_response()
        }

        let app = Router::new()
            .route("/volumes", get(search))
            .route("/volumes/{volume_id}", get(volume))
            .with_state(Arc::clone(&requests));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/volumes"), requests)
    }

    #[test]
    fn placeholder_and_short_keys_are_ignored() {
        assert_eq!(usable_api_key(None), None);
        assert_eq!(usable_api_key(Some("your_api_key_here".to_owned())), None);
        assert_eq!(usable_api_key(Some("short".to_owned())), None);
        assert_eq!(
            usable_api_key(Some(format!(" {VALID_KEY} "))),
            Some(VALID_KEY.to_owned())
        );
    }

    #[test]
    fn search_url_is_encoded() {
        let client = GoogleBooksClient::with_base_url("https://example.com/volumes/", None).unwrap();
        assert_eq!(
            client.search_url(" dune & co ", 40, OrderBy::Relevance, None),
            "https://example.com/volumes?q=dune%20%26%20co&maxResults=40&orderBy=relevance"
        );
        assert_eq!(
            client.volume_url("zG3-somecode", Some(VALID_KEY)),
            format!("https://example.com/volumes/zG3-somecode?key={VALID_KEY}")
        );
    }

    #[tokio::test]
    async fn search_retries_without_rejected_key() {
        let (base_url, requests) = start_catalog().await;
        let client =
            GoogleBooksClient::with_base_url(&base_url, Some(VALID_KEY.to_owned())).unwrap();

        let response = client
            .search("kindred", 20, OrderBy::Newest)
            .await
            .unwrap();

        assert_eq!(response.total_items, 1);
        assert_eq!(response.items[0].id, "zG3-somecode");
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].get("key").map(String::as_str), Some(VALID_KEY));
        assert_eq!(requests[1].get("key"), None);
        assert_eq!(requests[1].get("orderBy").map(String::as_str), Some("newest"));
        assert_eq!(requests[1].get("maxResults").map(String::as_str), Some("20"));
    }

    #[tokio::test]
    async fn empty_query_does_not_reach_the_catalog() {
        let (base_url, requests) = start_catalog().await;
        let client = GoogleBooksClient::with_base_url(&base_url, None).unwrap();

        let response = client.search("   ", 20, OrderBy::Relevance).await.unwrap();

        assert_eq!(response, SearchResponse::default());
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn volume_lookup() {
        let (base_url, _requests) = start_catalog().await;
        let client = GoogleBooksClient::with_base_url(&base_url, None).unwrap();

        let found = client.volume("zG3-somecode").await.unwrap().unwrap();
        assert_eq!(found.volume_info.title.as_deref(), Some("Kindred"));

        assert_eq!(client.volume("missing").await.unwrap(), None);
        assert!(matches!(
            client.volume("broken").await,
            Err(CatalogError::Status { status: 503, .. })
        ));
    }
}
