use thiserror::Error;

/// Typed error hierarchy for websearch.
///
/// Use at module boundaries (config validation, tool dispatch, server startup).
/// Internal/leaf functions can continue using `anyhow::Result`; the `Internal` variant
/// allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum WebsearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
