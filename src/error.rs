//! Error types for the combo endpoint

use hyper::StatusCode;
use reinhardt_combo_server::Response;
use std::fmt;

/// Result type used throughout the combo endpoint
pub type Result<T> = std::result::Result<T, ComboError>;

/// Why a module could not be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
	/// The module's extension is not in the allow-list
	DisallowedExtension,
	/// No regular file exists at the resolved location
	Missing,
	/// The resolved location escapes the asset boundary
	OutsideBoundary,
}

impl fmt::Display for NotFoundReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::DisallowedExtension => write!(f, "extension not allowed"),
			Self::Missing => write!(f, "no such file"),
			Self::OutsideBoundary => write!(f, "outside asset boundary"),
		}
	}
}

/// Errors produced while serving a combo request
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ComboError {
	#[error("Bad request: {0}")]
	BadRequest(String),

	#[error("Module not found: {path} ({reason})")]
	ModuleNotFound { path: String, reason: NotFoundReason },

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Internal error: {0}")]
	Internal(String),
}

impl ComboError {
	/// Shorthand for a [`ComboError::ModuleNotFound`]
	pub fn not_found(path: impl Into<String>, reason: NotFoundReason) -> Self {
		Self::ModuleNotFound {
			path: path.into(),
			reason,
		}
	}

	/// HTTP status this error maps to
	pub fn status(&self) -> StatusCode {
		match self {
			Self::BadRequest(_) => StatusCode::BAD_REQUEST,
			Self::ModuleNotFound { .. } => StatusCode::NOT_FOUND,
			Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Converts the error into the response sent to the client
	///
	/// Internal failures are logged here and answered without detail.
	pub fn into_response(self) -> Response {
		match self {
			Self::BadRequest(message) => {
				tracing::debug!("Rejecting combo request: {}", message);
				Response::bad_request()
			}
			Self::ModuleNotFound { path, reason } => {
				tracing::warn!(module = %path, %reason, "Module could not be served");
				Response::not_found().with_no_cache()
			}
			err @ (Self::Io(_) | Self::Internal(_)) => {
				tracing::error!("Combo request failed: {}", err);
				Response::internal_server_error()
			}
		}
	}
}
