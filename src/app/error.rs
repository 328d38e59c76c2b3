use thiserror::Error;

#[derive(Error, Debug)]
pub enum SavedFeedError {
    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed item: {0}")]
    MalformedItem(String),

    #[error("Feed render error: {0}")]
    Render(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed cache has been stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SavedFeedError>;

const MAX_BODY_IN_ERROR: usize = 512;

/// Cuts an HTTP response body down to something fit for an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
