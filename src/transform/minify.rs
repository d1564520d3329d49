//! CSS and JavaScript minifiers

use super::Minifier;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc_mangler::MangleOptions;
use oxc_minifier::{CompressOptions, Minifier as OxcMinifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Characters after which CSS whitespace is never significant
const CSS_TIGHT_AFTER: &[char] = &['{', '}', ';', ':', ',', '>'];
/// Characters before which CSS whitespace is never significant
///
/// `:` is handled separately since `a :hover` differs from `a:hover`.
const CSS_TIGHT_BEFORE: &[char] = &['{', '}', ';', ',', '>'];

/// Whitespace and comment stripping CSS minifier
///
/// License comments (`/*! ... */`) and quoted strings are kept verbatim.
///
/// # Examples
///
/// ```
/// use reinhardt_combo::transform::{CssMinifier, Minifier};
///
/// let css = "/* header */\nbody {\n  color: red;\n  margin: 0 auto;\n}\n";
/// assert_eq!(CssMinifier::new().minify(css), "body{color:red;margin:0 auto}");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CssMinifier;

impl CssMinifier {
	/// Create a new CSS minifier
	pub fn new() -> Self {
		Self
	}
}

impl Minifier for CssMinifier {
	fn minify(&self, input: &str) -> String {
		let chars: Vec<char> = input.chars().collect();
		let mut out = String::with_capacity(input.len());
		let mut pending_space = false;
		let mut i = 0;

		while i < chars.len() {
			let c = chars[i];

			if c == '/' && chars.get(i + 1) == Some(&'*') {
				let end = find_comment_end(&chars, i + 2);
				if chars.get(i + 2) == Some(&'!') {
					flush_css_space(&mut out, &mut pending_space, false);
					out.extend(&chars[i..end]);
				}
				i = end;
				continue;
			}

			if c.is_whitespace() {
				pending_space = true;
				i += 1;
				continue;
			}

			if c == '"' || c == '\'' {
				flush_css_space(&mut out, &mut pending_space, false);
				let end = find_string_end(&chars, i);
				out.extend(&chars[i..end]);
				i = end;
				continue;
			}

			if c == '}' && out.ends_with(';') {
				out.pop();
			}
			let tight = CSS_TIGHT_BEFORE.contains(&c) || (c == ':' && !opens_block(&chars, i));
			flush_css_space(&mut out, &mut pending_space, tight);
			out.push(c);
			i += 1;
		}

		out
	}
}

fn flush_css_space(out: &mut String, pending_space: &mut bool, tight_before: bool) {
	if std::mem::take(pending_space)
		&& !tight_before
		&& out.chars().last().is_some_and(|last| !CSS_TIGHT_AFTER.contains(&last))
	{
		out.push(' ');
	}
}

/// Whether the statement at `from` is a selector, i.e. ends with `{`
fn opens_block(chars: &[char], from: usize) -> bool {
	for &c in &chars[from..] {
		match c {
			'{' => return true,
			';' | '}' => return false,
			_ => {}
		}
	}
	false
}

/// Index just past the `*/` closing a comment body starting at `from`
fn find_comment_end(chars: &[char], from: usize) -> usize {
	let mut i = from;
	while i + 1 < chars.len() {
		if chars[i] == '*' && chars[i + 1] == '/' {
			return i + 2;
		}
		i += 1;
	}
	chars.len()
}

/// Index just past the quote closing the string opened at `start`
///
/// An unterminated string ends at the line break.
fn find_string_end(chars: &[char], start: usize) -> usize {
	let quote = chars[start];
	let mut i = start + 1;
	while i < chars.len() {
		match chars[i] {
			'\\' => i += 2,
			'\n' => return i,
			c if c == quote => return i + 1,
			_ => i += 1,
		}
	}
	chars.len()
}

/// JavaScript minifier backed by the OXC parser, minifier and code generator
///
/// Local names are mangled and the program is compressed; top level names
/// are left alone since combined modules share the global scope. Sources
/// that fail to parse are returned unchanged.
///
/// # Examples
///
/// ```
/// use reinhardt_combo::transform::{JsMinifier, Minifier};
///
/// let js = "// setup\nvar url = \"http://x\";\n";
/// let minified = JsMinifier::new().minify(js);
/// assert!(!minified.contains("setup"));
/// assert!(minified.ends_with(';'));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsMinifier;

impl JsMinifier {
	/// Create a new JavaScript minifier
	pub fn new() -> Self {
		Self
	}
}

impl Minifier for JsMinifier {
	fn minify(&self, input: &str) -> String {
		let allocator = Allocator::default();
		// Combined modules run as classic scripts
		let source_type = SourceType::default().with_script(true);
		let parse_result = Parser::new(&allocator, input, source_type).parse();

		if let Some(error) = parse_result.errors.first() {
			tracing::warn!("Unable to parse script, serving it unminified: {:?}", error);
			return input.to_string();
		}

		let mut program = parse_result.program;

		let mut compress = CompressOptions::smallest();
		compress.drop_console = false;
		compress.drop_debugger = true;

		let options = MinifierOptions {
			mangle: Some(MangleOptions::default()),
			compress: Some(compress),
		};
		let minified = OxcMinifier::new(options).minify(&allocator, &mut program);

		let codegen_options = CodegenOptions {
			minify: true,
			comments: CommentOptions::disabled(),
			..CodegenOptions::default()
		};
		let mut code = Codegen::new()
			.with_options(codegen_options)
			.with_scoping(minified.scoping)
			.build(&program)
			.code;

		// Keeps the next concatenated module a separate statement
		if !code.is_empty() && !code.ends_with(';') {
			code.push(';');
		}
		code
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("a { color : red ; }", "a{color:red}")]
	#[case("a, b > c { margin: 0 }", "a,b>c{margin:0}")]
	#[case("div :hover { x: y; }", "div :hover{x:y}")]
	#[case("/*! keep me */ a{b:c}", "/*! keep me */ a{b:c}")]
	#[case("a { color : red }", "a{color:red}")]
	#[case("a{content: \"  two   spaces ; } \"}", "a{content:\"  two   spaces ; } \"}")]
	#[case("a{b:c}/* trailing", "a{b:c}")]
	#[case("@media (max-width: 600px) {\n  a { b: c; }\n}", "@media (max-width:600px){a{b:c}}")]
	#[case("", "")]
	fn test_css_minify(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(CssMinifier::new().minify(input), expected);
	}

	#[test]
	fn test_css_minify_is_deterministic() {
		let input = "body {\n  font: 12px/1.5 'Helvetica Neue';\n}\n";
		let minifier = CssMinifier::new();
		assert_eq!(minifier.minify(input), minifier.minify(input));
	}

	#[rstest]
	#[case("var a = 1; // trailing\nvar b = 2;", "trailing")]
	#[case("/* block */\nvar a = 1;", "block")]
	#[case("var a = 1;\n/** doc */\nvar b = 2;", "doc")]
	fn test_js_minify_drops_comments(#[case] input: &str, #[case] comment: &str) {
		let output = JsMinifier::new().minify(input);

		assert!(!output.contains(comment), "{output}");
		assert!(output.contains("var a"), "{output}");
		assert!(output.len() < input.len());
	}

	#[rstest]
	#[case("var s = '// not a comment';", "// not a comment")]
	#[case("var s = \"/* nor this */\";", "/* nor this */")]
	#[case("var t = `two   spaces`;", "two   spaces")]
	fn test_js_minify_keeps_literals(#[case] input: &str, #[case] literal: &str) {
		let output = JsMinifier::new().minify(input);

		assert!(output.contains(literal), "{output}");
	}

	#[test]
	fn test_js_minify_mangles_local_names() {
		let input = "function area(width) {\n  var longLocalName = width * width;\n  return longLocalName;\n}\n";

		let output = JsMinifier::new().minify(input);

		assert!(output.contains("function area("), "{output}");
		assert!(!output.contains("longLocalName"), "{output}");
	}

	#[test]
	fn test_js_minify_keeps_top_level_names() {
		let output = JsMinifier::new().minify("var config = { debug: false };\n");

		assert!(output.contains("config"), "{output}");
	}

	#[rstest]
	#[case("a()")]
	#[case("var a = 1")]
	#[case("function f() {}")]
	fn test_js_minify_terminates_statements(#[case] input: &str) {
		assert!(JsMinifier::new().minify(input).ends_with(';'));
	}

	#[rstest]
	#[case("var = ;")]
	#[case("function (")]
	#[case("let s = 'unterminated")]
	fn test_js_minify_returns_unparsable_input_unchanged(#[case] input: &str) {
		assert_eq!(JsMinifier::new().minify(input), input);
	}

	#[rstest]
	#[case("")]
	#[case("  \n\t// only a comment\n")]
	fn test_js_minify_empty_program(#[case] input: &str) {
		assert_eq!(JsMinifier::new().minify(input), "");
	}

	#[test]
	fn test_js_minify_is_deterministic() {
		let input = "(function () { var counter = 0; window.tick = function () { return ++counter; }; })();";
		let minifier = JsMinifier::new();
		assert_eq!(minifier.minify(input), minifier.minify(input));
	}
}
