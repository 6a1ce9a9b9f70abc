use crate::catalog::{
    Catalog, OrderBy,
    errors::CatalogError,
    volume::{SearchResponse, Volume},
};

/// The catalog's own page size limit.
pub const MAX_RESULTS_LIMIT: u32 = 40;
const DEFAULT_MAX_RESULTS: u32 = 20;

pub trait RequestState {}
#[allow(clippy::exhaustive_structs, reason = "Empty state will remain empty")]
pub struct EmptyState;
pub struct IdState(String);
pub struct QueryState {
    query: String,
    max_results: u32,
    order_by: OrderBy,
}

impl RequestState for EmptyState {}
impl RequestState for IdState {}
impl RequestState for QueryState {}

/// Builder for constructing a catalog request.
pub struct CatalogRequestBuilder<T: RequestState> {
    /// Represents what the request is built from: nothing yet, a volume ID or a search query
    state: T,
}

impl Default for CatalogRequestBuilder<EmptyState> {
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogRequestBuilder<EmptyState> {
    /// Constructor function for default empty state. Use this in combination with any of the other
    /// generic implementations to construct a new `CatalogRequestBuilder` and modify its state.
    const fn new() -> Self {
        Self { state: EmptyState }
    }

    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn with_id(self, id: &str) -> CatalogRequestBuilder<IdState> {
        CatalogRequestBuilder {
            state: IdState(id.trim().to_owned()),
        }
    }

    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn with_query(self, query: &str) -> CatalogRequestBuilder<QueryState> {
        CatalogRequestBuilder {
            state: QueryState {
                query: query.trim().to_owned(),
                max_results: DEFAULT_MAX_RESULTS,
                order_by: OrderBy::default(),
            },
        }
    }
}

impl CatalogRequestBuilder<IdState> {
    /// Look up a single volume by its catalog ID
    /// # Errors
    /// Returns an error if the HTTP request fails or the response cannot be decoded
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn execute<C: Catalog>(&self, catalog: &C) -> Result<Option<Volume>, CatalogError> {
        if self.state.0.is_empty() {
            return Ok(None);
        }
        catalog.volume(&self.state.0).await
    }
}

impl CatalogRequestBuilder<QueryState> {
    /// Clamped to `1..=MAX_RESULTS_LIMIT`.
    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn max_results(mut self, max_results: u32) -> Self {
        self.state.max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.state.order_by = order_by;
        self
    }

    /// Execute the search
    /// # Errors
    /// Returns an error if the HTTP request fails or the response cannot be decoded
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn execute<C: Catalog>(&self, catalog: &C) -> Result<SearchResponse, CatalogError> {
        let QueryState {
            query,
            max_results,
            order_by,
        } = &self.state;
        catalog.search(query, *max_results, *order_by).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test code")]
mod tests {
    use super::*;
    use crate::test_support::StubCatalog;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn search_parameters_reach_the_catalog() {
        let catalog = StubCatalog::default();
        CatalogRequestBuilder::default()
            .with_query("  dune ")
            .max_results(500)
            .order_by(OrderBy::Newest)
            .execute(&catalog)
            .await
            .unwrap();

        assert_eq!(
            catalog.searches(),
            vec![("dune".to_owned(), MAX_RESULTS_LIMIT, OrderBy::Newest)]
        );
    }

    #[tokio::test]
    async fn blank_id_is_not_looked_up() {
        let catalog = StubCatalog::default();
        let volume = CatalogRequestBuilder::default()
            .with_id("   ")
            .execute(&catalog)
            .await
            .unwrap();

        assert_eq!(volume, None);
        assert_eq!(catalog.volume_lookups(), 0);
    }
}
