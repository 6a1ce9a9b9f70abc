/// Custom error type for handling errors while talking to the book catalog.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Error that occurs during the HTTP request, originating from `reqwest`.
    #[error("failed to reach the book catalog: {0}")]
    Fetch(#[from] reqwest::Error),
    /// The catalog answered, but not with a success status.
    #[error("book catalog answered with status {status}: {body}")]
    Status { status: u16, body: String },
    /// Error encountered while decoding the JSON response, originating from `serde_json`.
    #[error("failed to decode book catalog response: {0}")]
    Decode(#[from] serde_json::Error),
}
