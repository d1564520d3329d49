use crate::error::Result;
use crate::handler::{Handler, Middleware};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Logging middleware
/// Logs method, path, status code and duration of every request
pub struct LoggingMiddleware;

impl LoggingMiddleware {
	/// Create a new logging middleware
	pub fn new() -> Self {
		Self
	}
}

impl Default for LoggingMiddleware {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Middleware for LoggingMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let start = Instant::now();
		let method = request.method.clone();
		let path = request.path().to_string();

		let result = next.handle(request).await;

		let elapsed_ms = start.elapsed().as_millis() as u64;

		match &result {
			Ok(response) => {
				tracing::info!(
					%method,
					%path,
					status = response.status.as_u16(),
					bytes = response.body.len(),
					elapsed_ms,
					"Request served"
				);
			}
			Err(err) => {
				tracing::error!(%method, %path, error = %err, elapsed_ms, "Request failed");
			}
		}

		result
	}
}
