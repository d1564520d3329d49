//! Error types for request handling and serving

use std::time::Duration;

/// Result type alias for handlers and the server
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while handling a request or running the server
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Unexpected failure inside a handler
	#[error("Internal error: {0}")]
	Internal(String),

	/// The handler did not finish within the configured time
	#[error("Request timed out after {0:?}")]
	Timeout(Duration),

	/// Failure building an HTTP message
	#[error("HTTP error: {0}")]
	Http(#[from] hyper::http::Error),

	/// Socket or filesystem failure
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}
