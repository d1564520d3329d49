//! The combo endpoint

use crate::cache::{CombinationCache, CombinedPayload, ResourceCache};
use crate::config::ComboSettings;
use crate::error::{ComboError, NotFoundReason, Result};
use crate::module::{MinifierKind, ModuleRequest};
use crate::resolver::{ResolvedResource, ResourceResolver};
use crate::transform::{ContentTransformer, TransformedContent};
use async_trait::async_trait;
use bytes::Bytes;
use hyper::Method;
use reinhardt_combo_server::{Handler, Request, Response};
use std::io::ErrorKind;
use std::sync::Arc;

const ALLOWED_METHODS: &str = "GET, HEAD, POST";

/// Serves concatenated, minified modules
///
/// ```text
/// validate -> combination cache? -> hit: serve
///                                -> miss: resolve each -> transform each
///                                         -> assemble (and cache) -> serve
/// ```
pub struct ComboHandler {
	combo_path: String,
	check_timestamp: bool,
	resolver: ResourceResolver,
	transformer: ContentTransformer,
	resources: Arc<ResourceCache>,
	combinations: Arc<CombinationCache>,
}

impl ComboHandler {
	/// Creates a handler answering on `/combo` without timestamp checks
	pub fn new(
		resolver: ResourceResolver,
		transformer: ContentTransformer,
		resources: Arc<ResourceCache>,
		combinations: Arc<CombinationCache>,
	) -> Self {
		Self {
			combo_path: "/combo".to_string(),
			check_timestamp: false,
			resolver,
			transformer,
			resources,
			combinations,
		}
	}

	/// Builds a handler and its caches from settings
	pub async fn from_settings(settings: &ComboSettings) -> Result<Self> {
		let resolver = ResourceResolver::from_settings(settings).await?;
		let resources = Arc::new(ResourceCache::new(settings.check_timestamp_interval()));

		Ok(Self::new(
			resolver,
			ContentTransformer::new(),
			resources,
			Arc::new(CombinationCache::new()),
		)
		.with_combo_path(settings.combo_path.clone())
		.with_check_timestamp(settings.check_timestamp))
	}

	/// Sets the route the handler answers on
	pub fn with_combo_path(mut self, path: impl Into<String>) -> Self {
		self.combo_path = path.into();
		self
	}

	/// Enables or disables source timestamp checks
	///
	/// With checks enabled every resource is revalidated at most once per
	/// check interval and combinations are not cached. With checks disabled
	/// each distinct combination is computed once.
	pub fn with_check_timestamp(mut self, enabled: bool) -> Self {
		self.check_timestamp = enabled;
		self
	}

	/// Per-resource cache consulted when timestamp checks are enabled
	pub fn resource_cache(&self) -> &Arc<ResourceCache> {
		&self.resources
	}

	/// Combination cache consulted when timestamp checks are disabled
	pub fn combination_cache(&self) -> &Arc<CombinationCache> {
		&self.combinations
	}

	async fn serve(&self, request: &Request) -> Result<Response> {
		let modules = ModuleRequest::from_request(request)?;
		let key = modules.combination_key();

		let payload = match self.cached_combination(&key).await {
			Some(payload) => payload,
			None => {
				let (payload, degraded) = self.combine(&modules).await?;
				if degraded {
					return Ok(build_response(&modules, &payload).with_no_cache());
				}
				if !self.check_timestamp {
					self.combinations.put(key, payload.clone()).await;
				}
				payload
			}
		};

		Ok(build_response(&modules, &payload))
	}

	async fn cached_combination(&self, key: &str) -> Option<CombinedPayload> {
		if self.check_timestamp {
			return None;
		}
		let payload = self.combinations.get(key).await?;
		tracing::debug!(key, "Serving cached combination");
		Some(payload)
	}

	/// Transforms every module in request order
	///
	/// Returns the payload and whether any module is degraded.
	async fn combine(&self, modules: &ModuleRequest) -> Result<(CombinedPayload, bool)> {
		let mut parts = Vec::with_capacity(modules.modules().len());
		let mut degraded = false;

		for module in modules.modules() {
			if module.is_empty() {
				parts.push(Bytes::new());
				continue;
			}

			let resource = self.resolver.resolve(modules.prefix(), module).await?;
			let content = self.module_content(&resource, modules.kind()).await?;
			degraded |= content.is_degraded();
			parts.push(content.content().clone());
		}

		Ok((CombinedPayload::new(parts), degraded))
	}

	async fn module_content(&self, resource: &ResolvedResource, kind: MinifierKind) -> Result<TransformedContent> {
		if !self.check_timestamp {
			return self.load(resource, kind).await;
		}

		let key = resource.cache_key(kind);

		if let Some(entry) = self.resources.get(&key).await {
			if entry.is_fresh(self.resources.interval()) {
				if entry.content().is_missing() {
					tracing::debug!(key = %key, "Resource recently missing");
					return Err(vanished(resource));
				}
				tracing::debug!(key = %key, "Serving cached resource");
				return Ok(entry.into_content());
			}

			if !entry.content().is_missing() {
				match self.resolver.last_modified(resource).await {
					Ok(modified) if modified == entry.content().last_modified() => {
						tracing::debug!(key = %key, "Resource unchanged, renewing cache entry");
						let content = entry.into_content();
						self.resources.put(key, content.clone()).await;
						return Ok(content);
					}
					Ok(_) => tracing::debug!(key = %key, "Resource changed"),
					Err(err) => tracing::debug!(key = %key, "Cannot stat resource: {}", err),
				}
			}

			self.resources.remove(&key).await;
		}

		match self.load(resource, kind).await {
			Ok(content) => {
				self.resources.put(key, content.clone()).await;
				Ok(content)
			}
			Err(err) if is_vanished(&err) => {
				self.resources.put(key, TransformedContent::missing()).await;
				Err(err)
			}
			Err(err) => Err(err),
		}
	}

	/// Reads and transforms a resource
	///
	/// A resource that vanished after resolution fails with
	/// [`NotFoundReason::Missing`].
	async fn load(&self, resource: &ResolvedResource, kind: MinifierKind) -> Result<TransformedContent> {
		let read = async {
			let modified = self.resolver.last_modified(resource).await?;
			let raw = self.resolver.read(resource).await?;
			Ok::<_, ComboError>((modified, raw))
		};

		let (modified, raw) = match read.await {
			Ok(loaded) => loaded,
			Err(ComboError::Io(err)) if err.kind() == ErrorKind::NotFound => {
				tracing::debug!(location = %resource.location().display(), "Resource vanished after resolution");
				return Err(vanished(resource));
			}
			Err(err) => return Err(err),
		};

		let outcome = self.transformer.transform(&raw, kind, resource.module_path());
		Ok(TransformedContent::from_outcome(outcome, modified))
	}
}

fn vanished(resource: &ResolvedResource) -> ComboError {
	ComboError::not_found(resource.module_path(), NotFoundReason::Missing)
}

fn is_vanished(err: &ComboError) -> bool {
	matches!(
		err,
		ComboError::ModuleNotFound {
			reason: NotFoundReason::Missing,
			..
		}
	)
}

fn build_response(modules: &ModuleRequest, payload: &CombinedPayload) -> Response {
	Response::ok()
		.with_content_type(modules.content_type())
		.with_body(payload.concat())
}

#[async_trait]
impl Handler for ComboHandler {
	async fn handle(&self, request: Request) -> reinhardt_combo_server::Result<Response> {
		if !matches!(request.method, Method::GET | Method::HEAD | Method::POST) {
			return Ok(Response::method_not_allowed(ALLOWED_METHODS));
		}
		if request.path() != self.combo_path {
			return Ok(Response::not_found());
		}

		Ok(match self.serve(&request).await {
			Ok(response) => response,
			Err(err) => err.into_response(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::resolver::AllowedExtensions;
	use hyper::StatusCode;
	use rstest::rstest;
	use std::fs;
	use tempfile::TempDir;

	async fn handler(dir: &TempDir) -> ComboHandler {
		fs::create_dir_all(dir.path().join("html/js")).unwrap();
		let resolver = ResourceResolver::new(dir.path(), "html/js", "", AllowedExtensions::parse("css,js"))
			.await
			.unwrap();
		ComboHandler::new(
			resolver,
			ContentTransformer::new(),
			Arc::new(ResourceCache::new(std::time::Duration::from_secs(60))),
			Arc::new(CombinationCache::new()),
		)
	}

	#[rstest]
	#[case(Method::PUT)]
	#[case(Method::DELETE)]
	#[tokio::test]
	async fn test_other_methods_are_rejected(#[case] method: Method) {
		let dir = TempDir::new().unwrap();
		let handler = handler(&dir).await;
		let request = Request::builder().method(method).uri("/combo?m=a.js").build().unwrap();

		let response = handler.handle(request).await.unwrap();

		assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(response.headers.get("allow").unwrap(), ALLOWED_METHODS);
	}

	#[rstest]
	#[tokio::test]
	async fn test_other_paths_are_not_found() {
		let dir = TempDir::new().unwrap();
		let handler = handler(&dir).await;

		let response = handler.handle(Request::get("/elsewhere?m=a.js")).await.unwrap();

		assert_eq!(response.status, StatusCode::NOT_FOUND);
		assert!(!response.is_no_cache());
	}

	#[rstest]
	#[tokio::test]
	async fn test_empty_module_is_empty_slot() {
		let dir = TempDir::new().unwrap();
		let handler = handler(&dir).await;
		fs::write(dir.path().join("html/js/a.js"), "a();\n").unwrap();

		let response = handler
			.handle(Request::get("/combo?p=/html/js/&m=a.js&m="))
			.await
			.unwrap();

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(response.body, Bytes::from("a();"));
	}

	async fn resolve_then_delete(handler: &ComboHandler, dir: &TempDir, module: &str) -> ResolvedResource {
		let path = dir.path().join("html/js").join(module);
		fs::write(&path, "gone();").unwrap();
		let resource = handler.resolver.resolve("/html/js/", module).await.unwrap();
		fs::remove_file(&path).unwrap();
		resource
	}

	#[rstest]
	#[tokio::test]
	async fn test_vanished_resource_stores_placeholder() {
		let dir = TempDir::new().unwrap();
		let handler = handler(&dir).await.with_check_timestamp(true);
		let resource = resolve_then_delete(&handler, &dir, "gone.js").await;

		let first = handler.module_content(&resource, MinifierKind::Script).await;
		let second = handler.module_content(&resource, MinifierKind::Script).await;

		assert!(matches!(
			first,
			Err(ComboError::ModuleNotFound { reason: NotFoundReason::Missing, .. })
		));
		assert!(matches!(
			second,
			Err(ComboError::ModuleNotFound { reason: NotFoundReason::Missing, .. })
		));
		let cached = handler.resources.get(&resource.cache_key(MinifierKind::Script)).await.unwrap();
		assert!(cached.content().is_missing());
	}

	#[rstest]
	#[case(false)]
	#[case(true)]
	#[tokio::test]
	async fn test_vanished_resource_fails_whole_combination(#[case] check_timestamp: bool) {
		let dir = TempDir::new().unwrap();
		let handler = handler(&dir).await.with_check_timestamp(check_timestamp);
		fs::write(dir.path().join("html/js/a.js"), "a();\n").unwrap();
		let resource = resolve_then_delete(&handler, &dir, "b.js").await;

		let loaded = handler.load(&resource, MinifierKind::Script).await;
		let response = handler
			.handle(Request::get("/combo?p=/html/js/&m=a.js&m=b.js"))
			.await
			.unwrap();

		assert!(matches!(
			loaded,
			Err(ComboError::ModuleNotFound { reason: NotFoundReason::Missing, .. })
		));
		assert_eq!(response.status, StatusCode::NOT_FOUND);
		assert!(response.is_no_cache());
		assert!(handler.combinations.is_empty().await);
	}

}
