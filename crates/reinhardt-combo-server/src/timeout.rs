//! Per-request timeout

use crate::error::Result;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a handler and answers `504 Gateway Timeout` when it runs too long
///
/// The wrapped handler's future is dropped on expiry.
pub struct TimeoutHandler {
	inner: Arc<dyn Handler>,
	timeout: Duration,
}

impl TimeoutHandler {
	/// Create a timeout wrapper around `inner`
	pub fn new(inner: Arc<dyn Handler>, timeout: Duration) -> Self {
		Self { inner, timeout }
	}

	/// The configured timeout
	pub fn timeout(&self) -> Duration {
		self.timeout
	}
}

#[async_trait]
impl Handler for TimeoutHandler {
	async fn handle(&self, request: Request) -> Result<Response> {
		let path = request.path().to_string();
		match tokio::time::timeout(self.timeout, self.inner.handle(request)).await {
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(path = %path, timeout = ?self.timeout, "Request timed out");
				Ok(Response::gateway_timeout())
			}
		}
	}
}
