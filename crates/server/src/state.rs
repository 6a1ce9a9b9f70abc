use crate::config::ConfigStore;
use crate::errors::Error;
use shelfmate_core::catalog::client::GoogleBooksClient;
use shelfmate_core::database::Db;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};

pub struct AppState {
    /// The open library, if any. Replaced when a library is created or opened at runtime.
    pub db: RwLock<Option<Db>>,
    /// Why the last attempt to open a library failed
    pub last_error: RwLock<Option<String>>,
    pub catalog: GoogleBooksClient,
    pub store: Mutex<ConfigStore>,
}

impl AppState {
    #[must_use]
    #[inline]
    pub fn new(catalog: GoogleBooksClient, store: ConfigStore) -> Self {
        Self {
            db: RwLock::new(None),
            last_error: RwLock::new(None),
            catalog,
            store: Mutex::new(store),
        }
    }

    /// Opens the library database at `path`, closing the previously open one.
    /// # Errors
    /// Fails if the database cannot be opened or migrated. The failure is also kept as
    /// `last_error`.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn connect_db_with_path(&self, path: &Path) -> Result<(), Error> {
        tracing::info!("Opening library database at {}", path.display());
        let db = match Db::init(path).await {
            Ok(db) => db,
            Err(err) => {
                *self.last_error.write().await = Some(err.to_string());
                return Err(err.into());
            }
        };

        let mut guard = self.db.write().await;
        if let Some(old) = guard.replace(db) {
            tracing::info!("Closing previously opened library database");
            old.close().await;
        }
        *self.last_error.write().await = None;

        Ok(())
    }

    /// Opens the library remembered in the config store, if there is one.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once per run")]
    pub async fn connect_stored_library(&self) {
        let stored_path = self.store.lock().await.library_path();
        let Some(path) = stored_path else {
            tracing::info!("No library path in config, waiting for a library to be created or opened");
            return;
        };
        match self.connect_db_with_path(&path).await {
            Ok(()) => tracing::info!("Library database connected"),
            Err(err) => tracing::error!("Opening the stored library failed: {err}"),
        }
    }

    /// A handle to the open library.
    /// # Errors
    /// Fails with `DatabaseUnavailable` if no library is open.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called per request")]
    pub async fn db(&self) -> Result<Db, Error> {
        self.db
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(Error::DatabaseUnavailable)
    }

    /// Closes the open library, if any.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once per run")]
    pub async fn close(&self) {
        if let Some(db) = self.db.write().await.take() {
            db.close().await;
        }
    }
}
