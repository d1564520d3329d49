//! Combo request parameters
//!
//! A combo request names the modules to concatenate (`m`, repeatable), an
//! optional path prefix (`p`) and an optional minifier selector
//! (`minifierType`).

use crate::error::{ComboError, Result};
use reinhardt_combo_server::Request;
use std::collections::HashSet;
use std::fmt;

/// Query/form parameter carrying module paths
pub const MODULE_PARAM: &str = "m";
/// Query/form parameter carrying the path prefix
pub const PREFIX_PARAM: &str = "p";
/// Query/form parameter selecting the minifier
pub const MINIFIER_TYPE_PARAM: &str = "minifierType";

/// How module content is minified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinifierKind {
	Script,
	Style,
}

impl MinifierKind {
	/// Parses a `minifierType` value
	///
	/// `css` selects [`MinifierKind::Style`]; every other value falls back to
	/// [`MinifierKind::Script`].
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo::MinifierKind;
	///
	/// assert_eq!(MinifierKind::parse("css"), MinifierKind::Style);
	/// assert_eq!(MinifierKind::parse("js"), MinifierKind::Script);
	/// assert_eq!(MinifierKind::parse("coffee"), MinifierKind::Script);
	/// ```
	pub fn parse(value: &str) -> Self {
		if value.trim().eq_ignore_ascii_case("css") {
			Self::Style
		} else {
			Self::Script
		}
	}

	/// Kind implied by a module path's extension
	pub fn from_path(path: &str) -> Self {
		if extension(path).eq_ignore_ascii_case("css") {
			Self::Style
		} else {
			Self::Script
		}
	}

	/// Short name used in cache keys
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Script => "js",
			Self::Style => "css",
		}
	}

	/// `Content-Type` for responses of this kind
	pub fn content_type(&self) -> &'static str {
		match self {
			Self::Script => "text/javascript",
			Self::Style => "text/css",
		}
	}
}

impl fmt::Display for MinifierKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Extension of the last path segment, without the dot
pub(crate) fn extension(path: &str) -> &str {
	let name = path.rsplit('/').next().unwrap_or(path);
	match name.rsplit_once('.') {
		Some((_, ext)) => ext,
		None => "",
	}
}

/// Removes duplicates, keeping the first occurrence of each path
///
/// # Examples
///
/// ```
/// use reinhardt_combo::module::dedupe;
///
/// let modules = dedupe(["a.js", "b.js", "a.js", "c.js"]);
/// assert_eq!(modules, vec!["a.js", "b.js", "c.js"]);
/// ```
pub fn dedupe<I, S>(paths: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut seen = HashSet::new();
	paths
		.into_iter()
		.map(Into::into)
		.filter(|path| seen.insert(path.clone()))
		.collect()
}

/// Validated, de-duplicated combo request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
	modules: Vec<String>,
	prefix: String,
	kind: MinifierKind,
}

impl ModuleRequest {
	/// Builds a request from raw parameter values
	///
	/// An absent or empty `minifier_type` is derived from the first module's
	/// extension.
	///
	/// # Errors
	///
	/// Returns [`ComboError::BadRequest`] when `modules` is empty.
	pub fn new<I, S>(modules: I, prefix: impl Into<String>, minifier_type: Option<&str>) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let modules = dedupe(modules);
		let Some(first) = modules.first() else {
			return Err(ComboError::BadRequest("no modules requested".to_string()));
		};

		let kind = match minifier_type.map(str::trim) {
			Some(value) if !value.is_empty() => MinifierKind::parse(value),
			_ => MinifierKind::from_path(first),
		};

		Ok(Self {
			modules,
			prefix: prefix.into(),
			kind,
		})
	}

	/// Reads `m`, `p` and `minifierType` from the query string and form body
	pub fn from_request(request: &Request) -> Result<Self> {
		let prefix = request.param(PREFIX_PARAM).unwrap_or_default();
		let minifier_type = request.param(MINIFIER_TYPE_PARAM);
		Self::new(
			request.param_values(MODULE_PARAM),
			prefix,
			minifier_type.as_deref(),
		)
	}

	/// Module paths in request order, without duplicates
	pub fn modules(&self) -> &[String] {
		&self.modules
	}

	/// Path prefix prepended to every module
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Minifier applied to every module
	pub fn kind(&self) -> MinifierKind {
		self.kind
	}

	/// `Content-Type` of the combined response, taken from the first module
	pub fn content_type(&self) -> &'static str {
		MinifierKind::from_path(&self.modules[0]).content_type()
	}

	/// Key identifying this request in the combination cache
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_combo::ModuleRequest;
	///
	/// let request = ModuleRequest::new(["a.js", "b.js"], "/html/js/", None).unwrap();
	/// assert_eq!(request.combination_key(), r#"[["a.js","b.js"],"/html/js/","js"]"#);
	/// ```
	pub fn combination_key(&self) -> String {
		serde_json::json!([self.modules, self.prefix, self.kind.as_str()]).to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::Bytes;
	use hyper::Method;
	use rstest::rstest;

	#[rstest]
	#[case(vec!["a", "b", "a", "c"], vec!["a", "b", "c"])]
	#[case(vec!["x.js", "x.js", "x.js"], vec!["x.js"])]
	#[case(vec!["b.css", "a.css"], vec!["b.css", "a.css"])]
	#[case(vec![], vec![])]
	fn test_dedupe_keeps_first_occurrence(#[case] input: Vec<&str>, #[case] expected: Vec<&str>) {
		assert_eq!(dedupe(input), expected);
	}

	#[rstest]
	#[case(Some("css"), MinifierKind::Style)]
	#[case(Some("CSS"), MinifierKind::Style)]
	#[case(Some("js"), MinifierKind::Script)]
	#[case(Some("less"), MinifierKind::Script)]
	#[case(Some(""), MinifierKind::Style)]
	#[case(None, MinifierKind::Style)]
	fn test_kind_selection(#[case] minifier_type: Option<&str>, #[case] expected: MinifierKind) {
		let request = ModuleRequest::new(["theme.css", "app.js"], "", minifier_type).unwrap();
		assert_eq!(request.kind(), expected);
	}

	#[rstest]
	#[case("foo.css", "text/css")]
	#[case("dir/Foo.CSS", "text/css")]
	#[case("foo.js", "text/javascript")]
	#[case("foo", "text/javascript")]
	#[case("dir.css/foo", "text/javascript")]
	fn test_content_type_from_first_module(#[case] first: &str, #[case] expected: &str) {
		let request = ModuleRequest::new([first, "other.css"], "", Some("js")).unwrap();
		assert_eq!(request.content_type(), expected);
	}

	#[rstest]
	#[case(Some("css"))]
	#[case(None)]
	fn test_no_modules_is_bad_request(#[case] minifier_type: Option<&str>) {
		let result = ModuleRequest::new(Vec::<String>::new(), "/prefix", minifier_type);
		assert!(matches!(result, Err(ComboError::BadRequest(_))));
	}

	#[test]
	fn test_combination_key_distinguishes_commas() {
		let joined = ModuleRequest::new(["a, b"], "", None).unwrap();
		let split = ModuleRequest::new(["a", "b"], "", None).unwrap();
		assert_ne!(joined.combination_key(), split.combination_key());
	}

	#[test]
	fn test_combination_key_includes_prefix_and_kind() {
		let plain = ModuleRequest::new(["a.js"], "", None).unwrap();
		let prefixed = ModuleRequest::new(["a.js"], "/html/js/", None).unwrap();
		let styled = ModuleRequest::new(["a.js"], "", Some("css")).unwrap();
		assert_ne!(plain.combination_key(), prefixed.combination_key());
		assert_ne!(plain.combination_key(), styled.combination_key());
	}

	#[test]
	fn test_from_request_reads_query() {
		let request = Request::get("/combo?m=a.js&p=/html/js/&m=b.js&m=a.js&minifierType=js");

		let modules = ModuleRequest::from_request(&request).unwrap();

		assert_eq!(modules.modules(), ["a.js", "b.js"]);
		assert_eq!(modules.prefix(), "/html/js/");
		assert_eq!(modules.kind(), MinifierKind::Script);
	}

	#[test]
	fn test_from_request_reads_form_body() {
		let request = Request::builder()
			.method(Method::POST)
			.uri("/combo?m=a.css")
			.header("content-type", "application/x-www-form-urlencoded")
			.body(Bytes::from_static(b"m=b.css&m=a.css"))
			.build()
			.unwrap();

		let modules = ModuleRequest::from_request(&request).unwrap();

		assert_eq!(modules.modules(), ["a.css", "b.css"]);
		assert_eq!(modules.kind(), MinifierKind::Style);
	}

	#[test]
	fn test_from_request_without_modules() {
		let request = Request::get("/combo?p=/html/js/&minifierType=css");
		assert!(matches!(
			ModuleRequest::from_request(&request),
			Err(ComboError::BadRequest(_))
		));
	}
}
