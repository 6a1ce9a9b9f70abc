#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test code")]

use crate::catalog::errors::CatalogError;
use crate::catalog::volume::{ImageLinks, SearchResponse, Volume, VolumeInfo};
use crate::catalog::{Catalog, OrderBy};
use crate::database::Db;
use crate::database::types::{Book, NewBook};
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) async fn seed_book(db: &Db, google_id: &str, title: &str) -> Book {
    db.insert_book(&NewBook {
        google_books_id: Some(google_id.to_owned()),
        title: title.to_owned(),
        ..NewBook::default()
    })
    .await
    .expect("Seeding a book must succeed")
}

/// A catalog volume with the given popularity. Volumes without a cover have no image links.
pub(crate) fn volume(id: &str, title: &str, average: f64, count: u64, cover: bool) -> Volume {
    Volume {
        id: id.to_owned(),
        volume_info: VolumeInfo {
            title: Some(title.to_owned()),
            authors: Some(vec!["Test Author".to_owned()]),
            average_rating: (count > 0).then_some(average),
            ratings_count: (count > 0).then_some(count),
            image_links: cover.then(|| ImageLinks {
                thumbnail: Some(format!("http://books.google.com/{id}")),
                ..ImageLinks::default()
            }),
            ..VolumeInfo::default()
        },
    }
}

/// In-memory catalog that records how it was called.
#[derive(Default)]
pub(crate) struct StubCatalog {
    volumes: Vec<Volume>,
    search_items: Vec<Volume>,
    failing: bool,
    searches: Mutex<Vec<(String, u32, OrderBy)>>,
    volume_lookups: AtomicUsize,
}

impl StubCatalog {
    pub(crate) fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    pub(crate) fn with_search_results(mut self, items: Vec<Volume>) -> Self {
        self.search_items = items;
        self
    }

    /// Every request fails as if the catalog were down.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn searches(&self) -> Vec<(String, u32, OrderBy)> {
        self.searches.lock().unwrap().clone()
    }

    pub(crate) fn volume_lookups(&self) -> usize {
        self.volume_lookups.load(Ordering::SeqCst)
    }

    fn unavailable() -> CatalogError {
        CatalogError::Status {
            status: 503,
            body: "catalog unavailable".to_owned(),
        }
    }
}

impl Catalog for StubCatalog {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        order_by: OrderBy,
    ) -> Result<SearchResponse, CatalogError> {
        self.searches
            .lock()
            .unwrap()
            .push((query.to_owned(), max_results, order_by));
        if self.failing {
            return Err(Self::unavailable());
        }
        let items: Vec<Volume> = self
            .search_items
            .iter()
            .take(usize::try_from(max_results).unwrap())
            .cloned()
            .collect();
        Ok(SearchResponse {
            total_items: u64::try_from(self.search_items.len()).unwrap(),
            items,
        })
    }

    async fn volume(&self, volume_id: &str) -> Result<Option<Volume>, CatalogError> {
        self.volume_lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Self::unavailable());
        }
        Ok(self
            .volumes
            .iter()
            .find(|volume| volume.id == volume_id)
            .cloned())
    }
}
