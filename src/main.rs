use anyhow::Context;
use clap::Parser;
use reinhardt_combo::{ComboHandler, ComboSettings};
use reinhardt_combo_server::{
	Handler, HttpServer, LoggingMiddleware, ShutdownCoordinator, TimeoutHandler, shutdown_signal,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Combo asset server
#[derive(Debug, Parser)]
#[command(name = "combo-server", version, about)]
struct Cli {
	/// TOML settings file (defaults to ./combo.toml when present)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Listen address, overrides the settings file
	#[arg(short, long, value_name = "ADDR")]
	bind: Option<SocketAddr>,

	/// Servable root directory, overrides the settings file
	#[arg(short, long, value_name = "DIR")]
	root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(env_filter).init();

	let cli = Cli::parse();

	let mut settings = ComboSettings::load(cli.config.as_deref()).context("failed to load settings")?;
	if let Some(bind) = cli.bind {
		settings.bind = bind;
	}
	if let Some(root) = cli.root {
		settings.root = root;
	}
	settings.validate().context("invalid settings")?;

	let handler = ComboHandler::from_settings(&settings)
		.await
		.with_context(|| format!("cannot serve assets from {}", settings.assets_root().display()))?;
	let _cleanup = settings
		.check_timestamp
		.then(|| handler.resource_cache().start_auto_cleanup());

	let mut handler: Arc<dyn Handler> = Arc::new(handler);
	if let Some(timeout) = settings.request_timeout() {
		handler = Arc::new(TimeoutHandler::new(handler, timeout));
	}

	let coordinator = ShutdownCoordinator::new(settings.shutdown_timeout());
	let signal = coordinator.clone();
	tokio::spawn(async move {
		shutdown_signal().await;
		signal.shutdown();
	});

	tracing::info!(
		root = %settings.root.display(),
		assets_dir = %settings.assets_dir,
		combo_path = %settings.combo_path,
		check_timestamp = settings.check_timestamp,
		"Starting combo server"
	);

	HttpServer::new(handler)
		.with_middleware(Arc::new(LoggingMiddleware::new()))
		.listen_with_shutdown(settings.bind, coordinator)
		.await
		.context("server error")?;

	tracing::info!("Server stopped");
	Ok(())
}
