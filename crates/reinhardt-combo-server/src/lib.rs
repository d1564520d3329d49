//! HTTP server implementation for the Reinhardt combo asset server.
//!
//! This crate provides the request/response types, the [`Handler`] and
//! [`Middleware`] abstractions, and an HTTP/1.1 server based on Hyper.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use reinhardt_combo_server::{Handler, HttpServer, Request, Response, Result};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! struct MyHandler;
//!
//! #[async_trait::async_trait]
//! impl Handler for MyHandler {
//!     async fn handle(&self, _request: Request) -> Result<Response> {
//!         Ok(Response::ok().with_body("Hello"))
//!     }
//! }
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let addr: SocketAddr = "127.0.0.1:8000".parse()?;
//! HttpServer::new(Arc::new(MyHandler)).listen(addr).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod request;
pub mod response;
pub mod shutdown;
pub mod timeout;

pub use error::{Error, Result};
pub use handler::{Handler, Middleware, MiddlewareChain};
pub use http::{HttpServer, serve, serve_with_shutdown};
pub use logging::LoggingMiddleware;
pub use request::Request;
pub use response::Response;
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
pub use timeout::TimeoutHandler;
