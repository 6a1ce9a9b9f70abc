use crate::config::ConfigError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shelfmate_core::library::LibraryError;
use shelfmate_core::reconcile::ReconcileError;

/// The Shelfmate server error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No library has been created or opened yet
    #[error("library database is not available, create or open a library first")]
    DatabaseUnavailable,
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("invalid request: {0}")]
    BadRequest(String),
    /// Error variant arising from failing to access the key-value config
    #[error("failed to access key-value config: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl Error {
    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called per error response")]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::DatabaseUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Library(err) => match err {
                LibraryError::NotSignedIn => StatusCode::UNAUTHORIZED,
                LibraryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
                LibraryError::Catalog(_) | LibraryError::Reconcile(ReconcileError::Catalog(_)) => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Config(_) | Self::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl serde::Serialize for Error {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

impl IntoResponse for Error {
    #[inline]
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        } else {
            tracing::debug!("Request rejected: {self}");
        }
        (status, Json(json!({ "error": self }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelfmate_core::catalog::errors::CatalogError;

    #[test]
    fn status_follows_error_kind() {
        let catalog_down = || CatalogError::Status {
            status: 503,
            body: String::new(),
        };
        let cases = [
            (Error::DatabaseUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                Error::Library(LibraryError::NotSignedIn),
                StatusCode::UNAUTHORIZED,
            ),
            (
                Error::Library(LibraryError::InvalidInput("rating".to_owned())),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::Library(LibraryError::NotFound("book".to_owned())),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::Library(LibraryError::Catalog(catalog_down())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Library(ReconcileError::Catalog(catalog_down()).into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Db(sqlx::Error::PoolClosed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }

    #[test]
    fn serializes_as_message() {
        let body = json!({ "error": Error::BadRequest("missing folder".to_owned()) });
        assert_eq!(body, json!({ "error": "invalid request: missing folder" }));
    }
}
