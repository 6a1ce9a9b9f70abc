//! Book catalog
//!
//! Library that is used to search the Google Books catalog, fetch single volumes, turn them into
//! app and database records, and rank search results by popularity.
pub mod client;
pub mod errors;
pub mod format;
pub mod ranking;
pub mod request_builder;
pub mod search;
pub mod volume;

use crate::catalog::errors::CatalogError;
use crate::catalog::volume::{SearchResponse, Volume};
use core::fmt;
use core::future::Future;
use serde::{Deserialize, Serialize};

/// Sort order supported by the catalog's search endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Relevance,
    Newest,
}

impl OrderBy {
    #[must_use]
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Newest => "newest",
        }
    }
}

impl fmt::Display for OrderBy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source of book metadata. Implemented by the Google Books client, and by fakes in tests.
pub trait Catalog: Send + Sync {
    /// Free-text search, returning at most `max_results` volumes.
    fn search(
        &self,
        query: &str,
        max_results: u32,
        order_by: OrderBy,
    ) -> impl Future<Output = Result<SearchResponse, CatalogError>> + Send;

    /// Looks up a single volume. `Ok(None)` means the catalog does not know the ID.
    fn volume(
        &self,
        volume_id: &str,
    ) -> impl Future<Output = Result<Option<Volume>, CatalogError>> + Send;
}
