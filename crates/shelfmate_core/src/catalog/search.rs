//! Search as the user sees it: a fixed-size, cover-first, popularity-ranked result list, and a
//! debouncer that turns a stream of keystrokes into as few catalog requests as possible.
//!
//! `curated_search` serves one finished query, which is what the HTTP server's `/search` route
//! does. `DebouncedSearch` is meant for front ends that embed this crate and search as the user
//! types: feed it every edit of the search box and render what its `watch` channel publishes.
use crate::catalog::errors::CatalogError;
use crate::catalog::format::SearchResult;
use crate::catalog::ranking::rank_by_popularity;
use crate::catalog::request_builder::CatalogRequestBuilder;
use crate::catalog::{Catalog, OrderBy};
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Number of volumes requested from the catalog per search.
pub const SEARCH_FETCH_SIZE: u32 = 40;
/// Number of results shown after ranking.
pub const CURATED_RESULT_COUNT: usize = 20;
/// Quiet period after the last keystroke before a search is sent.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Searches the catalog and returns the most popular results, preferring results with a cover.
/// # Errors
/// Returns an error if the catalog request fails.
#[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
pub async fn curated_search<C: Catalog>(
    catalog: &C,
    query: &str,
) -> Result<Vec<SearchResult>, CatalogError> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let response = CatalogRequestBuilder::default()
        .with_query(query)
        .max_results(SEARCH_FETCH_SIZE)
        .order_by(OrderBy::Relevance)
        .execute(catalog)
        .await?;

    let mut results: Vec<SearchResult> = response
        .items
        .iter()
        .map(SearchResult::from_volume)
        .collect();
    if results.iter().any(SearchResult::has_cover) {
        results.retain(SearchResult::has_cover);
    }

    rank_by_popularity(&mut results);
    results.truncate(CURATED_RESULT_COUNT);
    Ok(results)
}

/// State of the most recently submitted search.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SearchOutcome {
    /// Nothing to search for.
    #[default]
    Idle,
    Pending {
        query: String,
    },
    Ready {
        query: String,
        results: Vec<SearchResult>,
    },
    Failed {
        query: String,
        message: String,
    },
}

/// Runs `curated_search` for the last query submitted, once no new query arrived for the debounce
/// delay. Submitting a query aborts the search for the previous one, even if its request is
/// already on the way. Outcomes are published on a watch channel.
pub struct DebouncedSearch<C> {
    catalog: Arc<C>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    outcome: Arc<watch::Sender<SearchOutcome>>,
    /// Incremented on every submission. A task only publishes while its generation is current.
    generation: Arc<AtomicU64>,
}

impl<C: Catalog + 'static> DebouncedSearch<C> {
    #[must_use]
    #[inline]
    pub fn new(catalog: Arc<C>) -> Self {
        Self::with_delay(catalog, SEARCH_DEBOUNCE)
    }

    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn with_delay(catalog: Arc<C>, delay: Duration) -> Self {
        let (outcome, _) = watch::channel(SearchOutcome::Idle);
        Self {
            catalog,
            delay,
            pending: None,
            outcome: Arc::new(outcome),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<SearchOutcome> {
        self.outcome.subscribe()
    }

    /// Replaces the current query. Must be called from within a Tokio runtime.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn submit(&mut self, query: &str) {
        self.abort_pending();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

        let query = query.trim().to_owned();
        if query.is_empty() {
            self.outcome.send_replace(SearchOutcome::Idle);
            return;
        }
        debug!("Debouncing search for {query:?}");
        self.outcome.send_replace(SearchOutcome::Pending {
            query: query.clone(),
        });

        let catalog = Arc::clone(&self.catalog);
        let outcome = Arc::clone(&self.outcome);
        let current_generation = Arc::clone(&self.generation);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let next = match curated_search(catalog.as_ref(), &query).await {
                Ok(results) => SearchOutcome::Ready { query, results },
                Err(err) => {
                    warn!("Search for {query:?} failed: {err}");
                    SearchOutcome::Failed {
                        query,
                        message: err.to_string(),
                    }
                }
            };
            outcome.send_if_modified(|current| {
                if current_generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *current = next;
                true
            });
        }));
    }

    /// Drops the current query, aborting its search.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.outcome.send_replace(SearchOutcome::Idle);
    }

    fn abort_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl<C> Drop for DebouncedSearch<C> {
    #[inline]
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test code")]
mod tests {
    use super::*;
    use crate::catalog::volume::{SearchResponse, Volume};
    use crate::test_support::{StubCatalog, volume};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|result| result.id.as_str()).collect()
    }

    #[tokio::test]
    async fn results_without_cover_are_dropped_and_the_rest_ranked() {
        let catalog = StubCatalog::default().with_search_results(vec![
            volume("plain", "Plain", 3.0, 10, true),
            volume("coverless", "Coverless", 5.0, 10_000, false),
            volume("popular", "Popular", 4.5, 2_000, true),
            volume("unrated", "Unrated", 0.0, 0, true),
        ]);

        let results = curated_search(&catalog, "rust").await.unwrap();

        assert_eq!(ids(&results), vec!["popular", "plain", "unrated"]);
        assert_eq!(
            catalog.searches(),
            vec![("rust".to_owned(), SEARCH_FETCH_SIZE, OrderBy::Relevance)]
        );
    }

    #[tokio::test]
    async fn coverless_results_are_kept_when_nothing_else_remains() {
        let catalog = StubCatalog::default().with_search_results(vec![
            volume("a", "A", 0.0, 0, false),
            volume("b", "B", 4.0, 12, false),
        ]);

        let results = curated_search(&catalog, "obscure").await.unwrap();

        assert_eq!(ids(&results), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn at_most_twenty_results_are_returned() {
        let items = (0..40_u64)
            .map(|index| volume(&format!("vol-{index}"), "Book", 4.0, index + 1, true))
            .collect();
        let catalog = StubCatalog::default().with_search_results(items);

        let results = curated_search(&catalog, "book").await.unwrap();

        assert_eq!(results.len(), CURATED_RESULT_COUNT);
        assert_eq!(results[0].id, "vol-39");
    }

    #[tokio::test]
    async fn blank_query_skips_the_catalog() {
        let catalog = StubCatalog::default();
        assert!(curated_search(&catalog, "  ").await.unwrap().is_empty());
        assert!(catalog.searches().is_empty());
    }

    /// A catalog that takes a while to answer and records which searches started and finished.
    #[derive(Default)]
    struct SlowCatalog {
        started: Mutex<Vec<String>>,
        completed: Mutex<Vec<String>>,
    }

    const LATENCY: Duration = Duration::from_secs(1);

    impl Catalog for SlowCatalog {
        async fn search(
            &self,
            query: &str,
            _max_results: u32,
            _order_by: OrderBy,
        ) -> Result<SearchResponse, CatalogError> {
            self.started.lock().unwrap().push(query.to_owned());
            tokio::time::sleep(LATENCY).await;
            self.completed.lock().unwrap().push(query.to_owned());
            Ok(SearchResponse {
                items: vec![volume(query, query, 4.0, 10, true)],
                total_items: 1,
            })
        }

        async fn volume(&self, _volume_id: &str) -> Result<Option<Volume>, CatalogError> {
            Ok(None)
        }
    }

    async fn wait_until_settled(rx: &mut watch::Receiver<SearchOutcome>) -> SearchOutcome {
        rx.wait_for(|outcome| {
            matches!(
                outcome,
                SearchOutcome::Ready { .. } | SearchOutcome::Failed { .. }
            )
        })
        .await
        .unwrap()
        .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn newer_query_supersedes_pending_one() {
        let catalog = Arc::new(SlowCatalog::default());
        let mut search = DebouncedSearch::new(Arc::clone(&catalog));
        let mut rx = search.subscribe();

        search.submit("du");
        assert_eq!(
            *rx.borrow_and_update(),
            SearchOutcome::Pending {
                query: "du".to_owned()
            }
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        search.submit("dune");

        let outcome = wait_until_settled(&mut rx).await;

        let SearchOutcome::Ready { query, results } = outcome else {
            panic!("expected results, got {outcome:?}");
        };
        assert_eq!(query, "dune");
        assert_eq!(ids(&results), vec!["dune"]);
        assert_eq!(*catalog.started.lock().unwrap(), vec!["dune".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_query_cancels_search_in_flight() {
        let catalog = Arc::new(SlowCatalog::default());
        let mut search = DebouncedSearch::new(Arc::clone(&catalog));
        let mut rx = search.subscribe();

        search.submit("dune");
        tokio::time::sleep(SEARCH_DEBOUNCE + Duration::from_millis(100)).await;
        assert_eq!(*catalog.started.lock().unwrap(), vec!["dune".to_owned()]);

        search.submit("dune messiah");
        let outcome = wait_until_settled(&mut rx).await;

        assert!(matches!(
            outcome,
            SearchOutcome::Ready { ref query, .. } if query == "dune messiah"
        ));
        assert_eq!(
            *catalog.completed.lock().unwrap(),
            vec!["dune messiah".to_owned()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_returns_to_idle() {
        let catalog = Arc::new(SlowCatalog::default());
        let mut search = DebouncedSearch::new(Arc::clone(&catalog));
        let rx = search.subscribe();

        search.submit("dune");
        search.cancel();
        tokio::time::sleep(SEARCH_DEBOUNCE * 4).await;

        assert_eq!(*rx.borrow(), SearchOutcome::Idle);
        assert!(catalog.started.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_query_publishes_idle_immediately() {
        let catalog = Arc::new(StubCatalog::default());
        let mut search = DebouncedSearch::new(Arc::clone(&catalog));
        let rx = search.subscribe();

        search.submit("dune");
        search.submit("   ");

        assert_eq!(*rx.borrow(), SearchOutcome::Idle);
        tokio::time::sleep(SEARCH_DEBOUNCE * 2).await;
        assert!(catalog.searches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_failure_is_published() {
        let catalog = Arc::new(StubCatalog::failing());
        let mut search = DebouncedSearch::new(catalog);
        let mut rx = search.subscribe();

        search.submit("dune");
        let outcome = wait_until_settled(&mut rx).await;

        assert!(matches!(
            outcome,
            SearchOutcome::Failed { ref query, ref message }
                if query == "dune" && message.contains("503")
        ));
    }
}
