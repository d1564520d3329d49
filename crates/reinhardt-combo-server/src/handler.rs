//! Handler and middleware abstractions
//!
//! ```rust
//! use reinhardt_combo_server::{Handler, Middleware, Request, Response, Result};
//! use std::sync::Arc;
//!
//! struct MyHandler;
//!
//! #[async_trait::async_trait]
//! impl Handler for MyHandler {
//!     async fn handle(&self, _request: Request) -> Result<Response> {
//!         Ok(Response::ok())
//!     }
//! }
//!
//! struct Passthrough;
//!
//! #[async_trait::async_trait]
//! impl Middleware for Passthrough {
//!     async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
//!         next.handle(request).await
//!     }
//! }
//! ```

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::sync::Arc;

/// Handler trait for processing requests.
///
/// Handlers receive a request and produce a response or an error.
#[async_trait]
pub trait Handler: Send + Sync {
	/// Handles an HTTP request and produces a response.
	///
	/// # Errors
	///
	/// Returns an error if the request cannot be processed.
	async fn handle(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
	async fn handle(&self, request: Request) -> Result<Response> {
		(**self).handle(request).await
	}
}

/// Middleware trait for request/response processing.
///
/// Middleware can inspect the request before passing it to `next`, or
/// inspect and replace the response afterwards.
#[async_trait]
pub trait Middleware: Send + Sync {
	/// Processes a request through this middleware.
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response>;
}

/// Middleware chain - composes multiple middleware into a single handler.
///
/// Middleware run in the order they were added; the first one added sees the
/// request first and the response last.
pub struct MiddlewareChain {
	middlewares: Vec<Arc<dyn Middleware>>,
	handler: Arc<dyn Handler>,
}

impl MiddlewareChain {
	/// Creates a new middleware chain with the given handler.
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			middlewares: Vec::new(),
			handler,
		}
	}

	/// Adds a middleware to the chain using builder pattern.
	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}

	/// Adds a middleware to the chain.
	pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
		self.middlewares.push(middleware);
	}

	/// Number of middleware in the chain
	pub fn len(&self) -> usize {
		self.middlewares.len()
	}

	/// Returns `true` if no middleware has been added
	pub fn is_empty(&self) -> bool {
		self.middlewares.is_empty()
	}
}

struct ComposedHandler {
	middleware: Arc<dyn Middleware>,
	next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for ComposedHandler {
	async fn handle(&self, request: Request) -> Result<Response> {
		self.middleware.process(request, self.next.clone()).await
	}
}

#[async_trait]
impl Handler for MiddlewareChain {
	async fn handle(&self, request: Request) -> Result<Response> {
		let mut current: Arc<dyn Handler> = self.handler.clone();

		for middleware in self.middlewares.iter().rev() {
			current = Arc::new(ComposedHandler {
				middleware: middleware.clone(),
				next: current,
			});
		}

		current.handle(request).await
	}
}
