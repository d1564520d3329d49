use crate::error::Result;
use crate::handler::{Handler, Middleware, MiddlewareChain};
use crate::request::Request;
use crate::response::Response;
use crate::shutdown::ShutdownCoordinator;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// HTTP Server with middleware support
pub struct HttpServer {
	pub handler: Arc<dyn Handler>,
	pub(crate) middlewares: Vec<Arc<dyn Middleware>>,
}

impl HttpServer {
	/// Create a new server with the given handler
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			handler,
			middlewares: Vec::new(),
		}
	}

	/// Add a middleware to the server using builder pattern
	///
	/// Middlewares are executed in the order they are added.
	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}

	/// Build the final handler with middleware chain
	fn build_handler(&self) -> Arc<dyn Handler> {
		if self.middlewares.is_empty() {
			return self.handler.clone();
		}

		let mut chain = MiddlewareChain::new(self.handler.clone());
		for middleware in &self.middlewares {
			chain.add_middleware(middleware.clone());
		}

		Arc::new(chain)
	}

	/// Start the server and listen on the given address
	///
	/// Runs until accepting a connection fails.
	pub async fn listen(self, addr: SocketAddr) -> Result<()> {
		let listener = TcpListener::bind(addr).await?;
		tracing::info!("Server listening on http://{}", listener.local_addr()?);
		self.serve_listener(listener).await
	}

	/// Serve connections from an already bound listener
	pub async fn serve_listener(self, listener: TcpListener) -> Result<()> {
		let handler = self.build_handler();

		loop {
			let (stream, socket_addr) = listener.accept().await?;
			let handler = handler.clone();

			tokio::task::spawn(async move {
				if let Err(err) = Self::handle_connection(stream, socket_addr, handler).await {
					tracing::debug!(peer = %socket_addr, "Error handling connection: {}", err);
				}
			});
		}
	}

	/// Start the server with graceful shutdown support
	///
	/// When the coordinator broadcasts shutdown, the server stops accepting
	/// connections, asks open connections to finish their current request,
	/// and waits for them up to the coordinator's grace period.
	pub async fn listen_with_shutdown(
		self,
		addr: SocketAddr,
		coordinator: ShutdownCoordinator,
	) -> Result<()> {
		let listener = TcpListener::bind(addr).await?;
		tracing::info!("Server listening on http://{}", listener.local_addr()?);
		self.serve_listener_with_shutdown(listener, coordinator)
			.await
	}

	/// Serve connections from an already bound listener until shutdown
	pub async fn serve_listener_with_shutdown(
		self,
		listener: TcpListener,
		coordinator: ShutdownCoordinator,
	) -> Result<()> {
		let handler = self.build_handler();
		let mut shutdown_rx = coordinator.subscribe();

		loop {
			tokio::select! {
				result = listener.accept() => {
					let (stream, socket_addr) = result?;
					let handler = handler.clone();
					let guard = coordinator.track_connection();
					let mut conn_shutdown = coordinator.subscribe();

					tokio::task::spawn(async move {
						let _guard = guard;
						let io = TokioIo::new(stream);
						let service = RequestService {
							handler,
							remote_addr: socket_addr,
						};
						let conn = http1::Builder::new().serve_connection(io, service);
						tokio::pin!(conn);

						let result = tokio::select! {
							result = conn.as_mut() => result,
							_ = conn_shutdown.recv() => {
								conn.as_mut().graceful_shutdown();
								conn.await
							}
						};

						if let Err(err) = result {
							tracing::debug!(peer = %socket_addr, "Error handling connection: {}", err);
						}
					});
				}
				_ = shutdown_rx.recv() => {
					tracing::info!("Shutdown signal received, stopping server...");
					break;
				}
			}
		}

		drop(listener);

		if !coordinator.drain().await {
			tracing::warn!(
				remaining = coordinator.active_connections(),
				"Grace period elapsed with connections still open"
			);
		}

		coordinator.notify_shutdown_complete();

		Ok(())
	}

	/// Handle a single TCP connection by processing HTTP requests
	pub async fn handle_connection(
		stream: TcpStream,
		socket_addr: SocketAddr,
		handler: Arc<dyn Handler>,
	) -> std::result::Result<(), hyper::Error> {
		let io = TokioIo::new(stream);
		let service = RequestService {
			handler,
			remote_addr: socket_addr,
		};

		http1::Builder::new().serve_connection(io, service).await
	}
}

/// Service implementation for hyper
struct RequestService {
	handler: Arc<dyn Handler>,
	remote_addr: SocketAddr,
}

impl Service<hyper::Request<Incoming>> for RequestService {
	type Response = hyper::Response<Full<Bytes>>;
	type Error = Box<dyn std::error::Error + Send + Sync>;
	type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send + 'static>>;

	fn call(&self, req: hyper::Request<Incoming>) -> Self::Future {
		let handler = self.handler.clone();
		let remote_addr = self.remote_addr;

		Box::pin(async move {
			let (parts, body) = req.into_parts();
			let body_bytes = body.collect().await?.to_bytes();

			let mut request = Request::new(
				parts.method,
				parts.uri,
				parts.version,
				parts.headers,
				body_bytes,
			);
			request.remote_addr = Some(remote_addr);

			let response = handler.handle(request).await.unwrap_or_else(|err| {
				tracing::error!(peer = %remote_addr, "Unhandled error: {}", err);
				Response::internal_server_error()
			});

			let mut hyper_response = hyper::Response::builder().status(response.status);
			for (key, value) in response.headers.iter() {
				hyper_response = hyper_response.header(key, value);
			}

			Ok(hyper_response.body(Full::new(response.body))?)
		})
	}
}

/// Helper function to create and run a server
pub async fn serve(addr: SocketAddr, handler: Arc<dyn Handler>) -> Result<()> {
	HttpServer::new(handler).listen(addr).await
}

/// Helper function to create and run a server with graceful shutdown
pub async fn serve_with_shutdown(
	addr: SocketAddr,
	handler: Arc<dyn Handler>,
	coordinator: ShutdownCoordinator,
) -> Result<()> {
	HttpServer::new(handler)
		.listen_with_shutdown(addr, coordinator)
		.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use rstest::rstest;
	use std::time::Duration;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};

	struct EchoPathHandler;

	#[async_trait]
	impl Handler for EchoPathHandler {
		async fn handle(&self, request: Request) -> Result<Response> {
			Ok(Response::ok()
				.with_content_type("text/plain")
				.with_body(request.path().to_string()))
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_server_round_trip_and_shutdown() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));

		let server = HttpServer::new(Arc::new(EchoPathHandler));
		let server_task = tokio::spawn(
			server.serve_listener_with_shutdown(listener, coordinator.clone()),
		);

		let mut stream = TcpStream::connect(addr).await.unwrap();
		stream
			.write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
			.await
			.unwrap();
		let mut raw = Vec::new();
		stream.read_to_end(&mut raw).await.unwrap();
		let text = String::from_utf8_lossy(&raw);

		assert!(text.starts_with("HTTP/1.1 200 OK"));
		assert!(text.contains("content-type: text/plain"));
		assert!(text.ends_with("/hello"));

		coordinator.shutdown();
		tokio::time::timeout(Duration::from_secs(2), server_task)
			.await
			.expect("server should stop")
			.unwrap()
			.unwrap();
	}

	#[rstest]
	fn test_build_handler_without_middleware_reuses_handler() {
		let handler: Arc<dyn Handler> = Arc::new(EchoPathHandler);
		let server = HttpServer::new(handler.clone());
		assert!(Arc::ptr_eq(&server.build_handler(), &handler));
	}
}
