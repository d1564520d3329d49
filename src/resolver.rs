//! Module path resolution
//!
//! Maps `prefix + module path` to a file under the servable root and
//! refuses anything that canonicalizes outside the asset boundary or
//! carries an extension that is not allow-listed.

use crate::config::ComboSettings;
use crate::error::{ComboError, NotFoundReason, Result};
use crate::module::MinifierKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Extension allow-list
///
/// # Examples
///
/// ```
/// use reinhardt_combo::AllowedExtensions;
///
/// let allowed = AllowedExtensions::parse("css, .js,");
/// assert!(allowed.is_allowed("theme/main.CSS"));
/// assert!(allowed.is_allowed("app.js"));
/// assert!(!allowed.is_allowed("secret.conf"));
/// assert!(AllowedExtensions::parse("*").is_allowed("secret.conf"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedExtensions {
	any: bool,
	suffixes: Vec<String>,
}

impl AllowedExtensions {
	/// Parses a comma-separated list; `*` permits every extension
	pub fn parse(list: &str) -> Self {
		let mut any = false;
		let mut suffixes = Vec::new();

		for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
			if entry == "*" {
				any = true;
				continue;
			}
			let ext = entry.trim_start_matches('.');
			if !ext.is_empty() {
				suffixes.push(format!(".{}", ext.to_ascii_lowercase()));
			}
		}

		Self { any, suffixes }
	}

	/// Allow-list permitting everything
	pub fn any() -> Self {
		Self {
			any: true,
			suffixes: Vec::new(),
		}
	}

	/// Returns `true` if `path` ends with an allowed extension
	pub fn is_allowed(&self, path: &str) -> bool {
		if self.any {
			return true;
		}
		let lower = path.to_ascii_lowercase();
		self.suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str()))
	}
}

/// A module path resolved to a file inside the asset boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
	module_path: String,
	location: PathBuf,
	within_boundary: bool,
}

impl ResolvedResource {
	/// Module path as requested
	pub fn module_path(&self) -> &str {
		&self.module_path
	}

	/// Canonical location of the file
	pub fn location(&self) -> &Path {
		&self.location
	}

	/// Result of the boundary check made when the module was resolved
	pub fn within_boundary(&self) -> bool {
		self.within_boundary
	}

	/// Key of this resource in the per-resource cache
	pub fn cache_key(&self, kind: MinifierKind) -> String {
		format!("{}?{}", self.location.display(), kind)
	}
}

/// Resolves module paths against the servable root
#[derive(Debug, Clone)]
pub struct ResourceResolver {
	root: PathBuf,
	boundary: PathBuf,
	context_path: String,
	allowed: AllowedExtensions,
}

impl ResourceResolver {
	/// Creates a resolver
	///
	/// # Errors
	///
	/// Fails when `root` or `root/assets_dir` cannot be canonicalized.
	pub async fn new(
		root: impl AsRef<Path>,
		assets_dir: &str,
		context_path: impl Into<String>,
		allowed: AllowedExtensions,
	) -> Result<Self> {
		let root = tokio::fs::canonicalize(root.as_ref()).await?;
		let boundary = tokio::fs::canonicalize(root.join(assets_dir.trim_start_matches('/'))).await?;

		Ok(Self {
			root,
			boundary,
			context_path: context_path.into(),
			allowed,
		})
	}

	/// Creates a resolver from loaded settings
	pub async fn from_settings(settings: &ComboSettings) -> Result<Self> {
		Self::new(
			&settings.root,
			&settings.assets_dir,
			settings.context_path.clone(),
			AllowedExtensions::parse(&settings.allowed_extensions),
		)
		.await
	}

	/// Canonical servable root
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Canonical asset boundary
	pub fn boundary(&self) -> &Path {
		&self.boundary
	}

	/// Checks the allow-list without touching the filesystem
	pub fn check_extension(&self, module_path: &str) -> Result<()> {
		if self.allowed.is_allowed(module_path) {
			Ok(())
		} else {
			Err(ComboError::not_found(module_path, NotFoundReason::DisallowedExtension))
		}
	}

	/// Resolves `prefix + module_path` to a file inside the boundary
	///
	/// # Errors
	///
	/// Returns [`ComboError::ModuleNotFound`] when the extension is not
	/// allowed, no regular file exists, or the file lies outside the
	/// boundary.
	pub async fn resolve(&self, prefix: &str, module_path: &str) -> Result<ResolvedResource> {
		self.check_extension(module_path)?;

		let mut joined = format!("{prefix}{module_path}");
		if !self.context_path.is_empty() {
			joined = joined.replacen(&self.context_path, "", 1);
		}

		let candidate = self.root.join(joined.trim_start_matches('/'));
		let location = match tokio::fs::canonicalize(&candidate).await {
			Ok(location) => location,
			Err(err) => {
				tracing::debug!(module = %module_path, candidate = %candidate.display(), "Cannot resolve module: {}", err);
				return Err(ComboError::not_found(module_path, NotFoundReason::Missing));
			}
		};

		let within_boundary = location.starts_with(&self.boundary);
		if !within_boundary {
			return Err(ComboError::not_found(module_path, NotFoundReason::OutsideBoundary));
		}

		let is_file = tokio::fs::metadata(&location)
			.await
			.map(|meta| meta.is_file())
			.unwrap_or(false);
		if !is_file {
			return Err(ComboError::not_found(module_path, NotFoundReason::Missing));
		}

		Ok(ResolvedResource {
			module_path: module_path.to_string(),
			location,
			within_boundary,
		})
	}

	/// Modification time in milliseconds since the Unix epoch
	pub async fn last_modified(&self, resource: &ResolvedResource) -> Result<u64> {
		let modified = tokio::fs::metadata(&resource.location).await?.modified()?;
		Ok(modified
			.duration_since(UNIX_EPOCH)
			.map(|elapsed| elapsed.as_millis() as u64)
			.unwrap_or(0))
	}

	/// Raw file content
	pub async fn read(&self, resource: &ResolvedResource) -> Result<Vec<u8>> {
		Ok(tokio::fs::read(&resource.location).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use std::fs;
	use tempfile::TempDir;

	#[fixture]
	fn tree() -> TempDir {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join("html/js/lib")).unwrap();
		fs::write(dir.path().join("html/js/app.js"), "var a = 1;").unwrap();
		fs::write(dir.path().join("html/js/lib/util.js"), "var u = 2;").unwrap();
		fs::write(dir.path().join("html/js/notes.txt"), "notes").unwrap();
		fs::write(dir.path().join("secret.js"), "top secret").unwrap();
		dir
	}

	async fn resolver(dir: &TempDir, context_path: &str) -> ResourceResolver {
		ResourceResolver::new(dir.path(), "html/js", context_path, AllowedExtensions::parse("css,js"))
			.await
			.unwrap()
	}

	#[rstest]
	#[case("", "/html/js/app.js")]
	#[case("/html/js/", "app.js")]
	#[case("/html/js", "/lib/util.js")]
	#[case("html/js/", "lib/../app.js")]
	#[tokio::test]
	async fn test_resolves_inside_boundary(tree: TempDir, #[case] prefix: &str, #[case] module: &str) {
		let resolver = resolver(&tree, "").await;

		let resource = resolver.resolve(prefix, module).await.unwrap();

		assert!(resource.location().starts_with(resolver.boundary()));
		assert!(resource.within_boundary());
		assert_eq!(resource.module_path(), module);
	}

	#[rstest]
	#[case("/html/js/", "../../secret.js")]
	#[case("", "/secret.js")]
	#[tokio::test]
	async fn test_existing_file_outside_boundary_fails_boundary_check(
		tree: TempDir,
		#[case] prefix: &str,
		#[case] module: &str,
	) {
		let resolver = resolver(&tree, "").await;

		let err = resolver.resolve(prefix, module).await.unwrap_err();

		assert!(matches!(
			err,
			ComboError::ModuleNotFound {
				reason: NotFoundReason::OutsideBoundary,
				..
			}
		));
	}

	#[rstest]
	#[case("/html/js/", "../../secret.js")]
	#[case("", "/secret.js")]
	#[case("/html/js/", "../../../../../../etc/passwd.js")]
	#[tokio::test]
	async fn test_rejects_traversal(tree: TempDir, #[case] prefix: &str, #[case] module: &str) {
		let resolver = resolver(&tree, "").await;

		let err = resolver.resolve(prefix, module).await.unwrap_err();

		assert!(matches!(err, ComboError::ModuleNotFound { .. }));
	}

	#[rstest]
	#[tokio::test]
	async fn test_outside_boundary_reason(tree: TempDir) {
		let resolver = resolver(&tree, "").await;

		let err = resolver.resolve("/html/js/", "../../secret.js").await.unwrap_err();

		assert!(matches!(
			err,
			ComboError::ModuleNotFound { reason: NotFoundReason::OutsideBoundary, .. }
		));
	}

	#[rstest]
	#[case("notes.txt")]
	#[case("../../secret.conf")]
	#[tokio::test]
	async fn test_disallowed_extension(tree: TempDir, #[case] module: &str) {
		let resolver = resolver(&tree, "").await;

		let err = resolver.resolve("/html/js/", module).await.unwrap_err();

		assert!(matches!(
			err,
			ComboError::ModuleNotFound { reason: NotFoundReason::DisallowedExtension, .. }
		));
	}

	#[rstest]
	#[case("missing.js")]
	#[case("lib.js")]
	#[tokio::test]
	async fn test_missing_file(tree: TempDir, #[case] module: &str) {
		fs::create_dir_all(tree.path().join("html/js/lib.js")).unwrap();
		let resolver = resolver(&tree, "").await;

		let err = resolver.resolve("/html/js/", module).await.unwrap_err();

		assert!(matches!(
			err,
			ComboError::ModuleNotFound { reason: NotFoundReason::Missing, .. }
		));
	}

	#[rstest]
	#[tokio::test]
	async fn test_context_path_is_stripped_once(tree: TempDir) {
		let resolver = resolver(&tree, "/portal").await;

		let resource = resolver.resolve("/portal/html/js/", "app.js").await.unwrap();

		assert!(resource.location().ends_with("html/js/app.js"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_read_and_last_modified(tree: TempDir) {
		let resolver = resolver(&tree, "").await;
		let resource = resolver.resolve("/html/js/", "app.js").await.unwrap();

		let content = resolver.read(&resource).await.unwrap();
		let modified = resolver.last_modified(&resource).await.unwrap();

		assert_eq!(content, b"var a = 1;");
		assert!(modified > 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_missing_boundary_fails_construction(tree: TempDir) {
		let result = ResourceResolver::new(tree.path(), "no/such/dir", "", AllowedExtensions::any()).await;
		assert!(matches!(result, Err(ComboError::Io(_))));
	}

	#[rstest]
	#[case("css,js", "a.CSS", true)]
	#[case(".css", "a.css", true)]
	#[case("css", "a.scss", false)]
	#[case("css", "acss", false)]
	#[case("", "a.js", false)]
	#[case(" , *", "anything", true)]
	fn test_allowed_extensions(#[case] list: &str, #[case] path: &str, #[case] expected: bool) {
		assert_eq!(AllowedExtensions::parse(list).is_allowed(path), expected);
	}

	#[test]
	fn test_cache_key_includes_kind() {
		let resource = ResolvedResource {
			module_path: "app.js".to_string(),
			location: PathBuf::from("/srv/html/js/app.js"),
			within_boundary: true,
		};
		assert_eq!(resource.cache_key(MinifierKind::Script), "/srv/html/js/app.js?js");
		assert_eq!(resource.cache_key(MinifierKind::Style), "/srv/html/js/app.js?css");
	}
}
