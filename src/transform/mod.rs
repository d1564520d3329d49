//! Content transformation: style preprocessing and minification
//!
//! Each module's raw bytes go through [`ContentTransformer::transform`],
//! which picks the pipeline for the requested [`MinifierKind`]:
//!
//! - style: [`StylePreprocessor`] (variable expansion by default), then
//!   [`CssMinifier`]
//! - script: [`JsMinifier`]
//!
//! Files named `*-min.css` or `*-min.js` are already minified and pass
//! through unchanged.

pub mod minify;
pub mod sass;

pub use minify::{CssMinifier, JsMinifier};
pub use sass::{PreprocessError, VariableExpander};

use crate::module::MinifierKind;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Suffixes of files that are served without transformation
pub const PREMINIFIED_SUFFIXES: [&str; 2] = ["-min.css", "-min.js"];

/// Returns `true` if `path` names an already minified file
pub fn is_preminified(path: &str) -> bool {
	PREMINIFIED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Text minifier
pub trait Minifier: Send + Sync {
	/// Returns the minified form of `input`
	fn minify(&self, input: &str) -> String;
}

/// Style sheet preprocessor run before CSS minification
pub trait StylePreprocessor: Send + Sync {
	/// Preprocesses the style sheet read from `source_path`
	fn process(&self, input: &str, source_path: &str) -> Result<String, PreprocessError>;
}

/// Non-fatal problem found while transforming a module
///
/// The module is still served, but the response must not be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformWarning {
	pub source_path: String,
	pub message: String,
}

impl fmt::Display for TransformWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.source_path, self.message)
	}
}

/// Result of transforming one module
#[derive(Debug, Clone)]
pub struct TransformOutcome {
	pub content: Bytes,
	pub warning: Option<TransformWarning>,
}

impl TransformOutcome {
	/// Returns `true` if preprocessing failed and the output is a fallback
	pub fn is_degraded(&self) -> bool {
		self.warning.is_some()
	}
}

/// Transformed module content together with the source timestamp it was
/// produced from
///
/// Values are never modified after creation; a changed source produces a
/// new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedContent {
	content: Bytes,
	last_modified: u64,
	degraded: bool,
}

impl TransformedContent {
	/// Creates content transformed from a source modified at
	/// `last_modified` (milliseconds since the Unix epoch)
	pub fn new(content: impl Into<Bytes>, last_modified: u64, degraded: bool) -> Self {
		Self {
			content: content.into(),
			last_modified,
			degraded,
		}
	}

	/// Builds content from a transform outcome
	pub fn from_outcome(outcome: TransformOutcome, last_modified: u64) -> Self {
		let degraded = outcome.is_degraded();
		Self::new(outcome.content, last_modified, degraded)
	}

	/// Placeholder for a source that vanished after resolution
	pub fn missing() -> Self {
		Self::new(Bytes::new(), 0, false)
	}

	/// Returns `true` for the [`missing`](Self::missing) placeholder
	pub fn is_missing(&self) -> bool {
		self.last_modified == 0 && self.content.is_empty()
	}

	pub fn content(&self) -> &Bytes {
		&self.content
	}

	pub fn last_modified(&self) -> u64 {
		self.last_modified
	}

	pub fn is_degraded(&self) -> bool {
		self.degraded
	}
}

/// Applies preprocessing and minification by kind
#[derive(Clone)]
pub struct ContentTransformer {
	preprocessor: Arc<dyn StylePreprocessor>,
	css: CssMinifier,
	js: JsMinifier,
}

impl ContentTransformer {
	/// Creates a transformer using [`VariableExpander`] for style sheets
	pub fn new() -> Self {
		Self::with_preprocessor(Arc::new(VariableExpander::new()))
	}

	/// Creates a transformer with a custom style preprocessor
	pub fn with_preprocessor(preprocessor: Arc<dyn StylePreprocessor>) -> Self {
		Self {
			preprocessor,
			css: CssMinifier::new(),
			js: JsMinifier::new(),
		}
	}

	/// Transforms the raw content of `source_path`
	///
	/// Preprocessing failures are logged and reported in
	/// [`TransformOutcome::warning`]; the unexpanded text is minified
	/// instead.
	pub fn transform(&self, raw: &[u8], kind: MinifierKind, source_path: &str) -> TransformOutcome {
		if is_preminified(source_path) {
			return TransformOutcome {
				content: Bytes::copy_from_slice(raw),
				warning: None,
			};
		}

		let text = String::from_utf8_lossy(raw);

		match kind {
			MinifierKind::Style => {
				let (expanded, warning) = match self.preprocessor.process(&text, source_path) {
					Ok(expanded) => (expanded, None),
					Err(err) => {
						tracing::error!(source = %source_path, "Unable to preprocess style sheet: {}", err);
						tracing::debug!(source = %source_path, content = %text, "Style sheet left unexpanded");
						let warning = TransformWarning {
							source_path: source_path.to_string(),
							message: err.to_string(),
						};
						(text.into_owned(), Some(warning))
					}
				};
				TransformOutcome {
					content: Bytes::from(self.css.minify(&expanded)),
					warning,
				}
			}
			MinifierKind::Script => TransformOutcome {
				content: Bytes::from(self.js.minify(&text)),
				warning: None,
			},
		}
	}
}

impl Default for ContentTransformer {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	struct FailingPreprocessor;

	impl StylePreprocessor for FailingPreprocessor {
		fn process(&self, _input: &str, _source_path: &str) -> Result<String, PreprocessError> {
			Err(PreprocessError::UndefinedVariable {
				name: "x".to_string(),
				line: 1,
			})
		}
	}

	#[rstest]
	#[case("lib/jquery-min.js", MinifierKind::Script)]
	#[case("theme/main-min.css", MinifierKind::Style)]
	#[case("theme/main-min.css", MinifierKind::Script)]
	fn test_preminified_passes_through(#[case] path: &str, #[case] kind: MinifierKind) {
		let raw = b"  keep   /* everything */  $undefined \n\n";

		let outcome = ContentTransformer::new().transform(raw, kind, path);

		assert_eq!(outcome.content.as_ref(), raw);
		assert!(!outcome.is_degraded());
	}

	#[test]
	fn test_style_is_expanded_and_minified() {
		let raw = b"$pad: 4px;\n.box {\n  padding: $pad;\n}\n";

		let outcome = ContentTransformer::new().transform(raw, MinifierKind::Style, "box.css");

		assert_eq!(outcome.content, Bytes::from_static(b".box{padding:4px}"));
		assert!(outcome.warning.is_none());
	}

	#[test]
	fn test_script_is_minified() {
		let raw = b"// header\nvar a = 1;\n\n\nvar b = 2;\n";

		let outcome = ContentTransformer::new().transform(raw, MinifierKind::Script, "app.js");

		let text = std::str::from_utf8(&outcome.content).unwrap();
		assert_eq!(text, JsMinifier::new().minify("// header\nvar a = 1;\n\n\nvar b = 2;\n"));
		assert!(!text.contains("header"));
		assert!(!text.contains('\n'));
		assert!(!outcome.is_degraded());
	}

	#[test]
	fn test_unparsable_script_is_served_verbatim() {
		let raw = b"var = ;";

		let outcome = ContentTransformer::new().transform(raw, MinifierKind::Script, "broken.js");

		assert_eq!(outcome.content.as_ref(), raw);
		assert!(!outcome.is_degraded());
	}

	#[test]
	fn test_preprocess_failure_degrades() {
		let transformer = ContentTransformer::with_preprocessor(Arc::new(FailingPreprocessor));

		let outcome = transformer.transform(b"a { color : red; }", MinifierKind::Style, "a.css");

		assert!(outcome.is_degraded());
		assert_eq!(outcome.content, Bytes::from_static(b"a{color:red}"));
		let warning = outcome.warning.unwrap();
		assert_eq!(warning.source_path, "a.css");
		assert!(warning.message.contains("undefined variable"));
	}

	#[test]
	fn test_invalid_utf8_is_decoded_lossily() {
		let outcome = ContentTransformer::new().transform(b"a { content: '\xff'; }", MinifierKind::Style, "s.css");
		assert_eq!(outcome.content, Bytes::from("a{content:'\u{fffd}'}"));
	}

	#[test]
	fn test_missing_sentinel() {
		let missing = TransformedContent::missing();
		assert!(missing.is_missing());
		assert_eq!(missing.last_modified(), 0);
		assert!(!TransformedContent::new("x", 0, false).is_missing());
	}
}
