//! Graceful shutdown coordination
//!
//! The coordinator broadcasts a shutdown notice to the accept loop and to
//! every open connection, then lets the server wait for in-flight
//! connections to drain, bounded by a grace period.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

/// Coordinates graceful shutdown between the server and its connections
#[derive(Clone)]
pub struct ShutdownCoordinator {
	sender: broadcast::Sender<()>,
	active_connections: Arc<AtomicUsize>,
	drained: Arc<Notify>,
	completed: Arc<Notify>,
	timeout: Duration,
}

impl ShutdownCoordinator {
	/// Create a coordinator with the given grace period
	pub fn new(timeout: Duration) -> Self {
		let (sender, _) = broadcast::channel(1);
		Self {
			sender,
			active_connections: Arc::new(AtomicUsize::new(0)),
			drained: Arc::new(Notify::new()),
			completed: Arc::new(Notify::new()),
			timeout,
		}
	}

	/// Subscribe to the shutdown notice
	pub fn subscribe(&self) -> broadcast::Receiver<()> {
		self.sender.subscribe()
	}

	/// Broadcast the shutdown notice
	pub fn shutdown(&self) {
		// No receivers simply means nothing is listening yet.
		let _ = self.sender.send(());
	}

	/// Grace period for in-flight connections
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Number of connections currently being served
	pub fn active_connections(&self) -> usize {
		self.active_connections.load(Ordering::Acquire)
	}

	/// Registers a connection; the connection is released when the guard drops
	pub fn track_connection(&self) -> ConnectionGuard {
		self.active_connections.fetch_add(1, Ordering::AcqRel);
		ConnectionGuard {
			active_connections: self.active_connections.clone(),
			drained: self.drained.clone(),
		}
	}

	/// Waits until every tracked connection has finished or the grace period
	/// elapses
	///
	/// Returns `true` if all connections drained in time.
	pub async fn drain(&self) -> bool {
		let wait = async {
			loop {
				let notified = self.drained.notified();
				if self.active_connections() == 0 {
					break;
				}
				notified.await;
			}
		};

		tokio::time::timeout(self.timeout, wait).await.is_ok()
	}

	/// Signals that the server has stopped
	pub fn notify_shutdown_complete(&self) {
		self.completed.notify_waiters();
		self.completed.notify_one();
	}

	/// Waits for [`notify_shutdown_complete`](Self::notify_shutdown_complete)
	pub async fn wait_for_shutdown(&self) {
		self.completed.notified().await;
	}
}

/// Keeps a connection counted as active while alive
pub struct ConnectionGuard {
	active_connections: Arc<AtomicUsize>,
	drained: Arc<Notify>,
}

impl Drop for ConnectionGuard {
	fn drop(&mut self) {
		if self.active_connections.fetch_sub(1, Ordering::AcqRel) == 1 {
			self.drained.notify_waiters();
		}
	}
}

/// Resolves when the process receives Ctrl-C
pub async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to install Ctrl-C handler: {}", e);
		std::future::pending::<()>().await;
	}
	tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_drain_without_connections_returns_immediately() {
		let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
		assert!(coordinator.drain().await);
	}

	#[rstest]
	#[tokio::test]
	async fn test_drain_waits_for_guard() {
		let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
		let guard = coordinator.track_connection();
		assert_eq!(coordinator.active_connections(), 1);

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			drop(guard);
		});

		assert!(coordinator.drain().await);
		assert_eq!(coordinator.active_connections(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_drain_times_out() {
		let coordinator = ShutdownCoordinator::new(Duration::from_millis(20));
		let _guard = coordinator.track_connection();
		assert!(!coordinator.drain().await);
	}

	#[rstest]
	#[tokio::test]
	async fn test_subscribers_receive_shutdown() {
		let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
		let mut receiver = coordinator.subscribe();
		coordinator.shutdown();
		assert!(receiver.recv().await.is_ok());
	}
}
