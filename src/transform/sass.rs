//! SCSS-style variable expansion
//!
//! Supports the subset of SCSS used by portal themes that only need
//! variables: `$name: value;` declarations (with `!default` and `!global`
//! flags), `$name` references, `#{$name}` interpolation and `//` line
//! comments. Nesting, mixins and functions pass through untouched.

use super::StylePreprocessor;
use std::collections::HashMap;

/// Failure to expand a style sheet
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreprocessError {
	#[error("undefined variable `${name}` on line {line}")]
	UndefinedVariable { name: String, line: usize },

	#[error("missing value for `${name}` on line {line}")]
	EmptyValue { name: String, line: usize },
}

/// Expands SCSS-style variables into plain CSS
///
/// # Examples
///
/// ```
/// use reinhardt_combo::transform::VariableExpander;
///
/// let scss = "$brand: #336699; // primary\n$link: $brand;\na { color: $link; }\n";
/// let css = VariableExpander::new().expand(scss).unwrap();
/// assert_eq!(css.trim(), "a { color: #336699; }");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableExpander;

impl VariableExpander {
	/// Create a new expander
	pub fn new() -> Self {
		Self
	}

	/// Expands every variable in `input`
	///
	/// # Errors
	///
	/// Returns [`PreprocessError`] when a variable is referenced before it is
	/// declared or declared without a value.
	pub fn expand(&self, input: &str) -> Result<String, PreprocessError> {
		Expansion::new(input).run()
	}
}

impl StylePreprocessor for VariableExpander {
	fn process(&self, input: &str, _source_path: &str) -> Result<String, PreprocessError> {
		self.expand(input)
	}
}

struct Expansion {
	chars: Vec<char>,
	pos: usize,
	line: usize,
	in_url: bool,
	vars: HashMap<String, String>,
	out: String,
}

impl Expansion {
	fn new(input: &str) -> Self {
		Self {
			chars: input.chars().collect(),
			pos: 0,
			line: 1,
			in_url: false,
			vars: HashMap::new(),
			out: String::with_capacity(input.len()),
		}
	}

	fn peek(&self, offset: usize) -> Option<char> {
		self.chars.get(self.pos + offset).copied()
	}

	fn run(mut self) -> Result<String, PreprocessError> {
		while let Some(c) = self.peek(0) {
			match c {
				'"' | '\'' => self.copy_string(),
				'/' if self.peek(1) == Some('*') => self.copy_block_comment(),
				'/' if self.peek(1) == Some('/') && !self.in_url => self.skip_line_comment(),
				'#' if self.peek(1) == Some('{') => self.interpolate()?,
				'$' => self.variable()?,
				_ => {
					if c == '\n' {
						self.line += 1;
					} else if c == '(' && self.out.to_ascii_lowercase().ends_with("url") {
						self.in_url = true;
					} else if c == ')' {
						self.in_url = false;
					}
					self.out.push(c);
					self.pos += 1;
				}
			}
		}
		Ok(self.out)
	}

	fn copy_string(&mut self) {
		let quote = self.chars[self.pos];
		self.out.push(quote);
		self.pos += 1;
		while let Some(c) = self.peek(0) {
			self.out.push(c);
			self.pos += 1;
			match c {
				'\\' => {
					if let Some(escaped) = self.peek(0) {
						if escaped == '\n' {
							self.line += 1;
						}
						self.out.push(escaped);
						self.pos += 1;
					}
				}
				'\n' => {
					self.line += 1;
					return;
				}
				c if c == quote => return,
				_ => {}
			}
		}
	}

	fn copy_block_comment(&mut self) {
		self.out.push_str("/*");
		self.pos += 2;
		while let Some(c) = self.peek(0) {
			if c == '*' && self.peek(1) == Some('/') {
				self.out.push_str("*/");
				self.pos += 2;
				return;
			}
			if c == '\n' {
				self.line += 1;
			}
			self.out.push(c);
			self.pos += 1;
		}
	}

	fn skip_line_comment(&mut self) {
		while let Some(c) = self.peek(0) {
			if c == '\n' {
				return;
			}
			self.pos += 1;
		}
	}

	/// `#{$name}` becomes the variable's value; other interpolations are kept
	fn interpolate(&mut self) -> Result<(), PreprocessError> {
		let start = self.pos + 2;
		let Some(close) = self.chars[start..].iter().position(|&c| c == '}') else {
			self.out.push('#');
			self.pos += 1;
			return Ok(());
		};
		let inner: String = self.chars[start..start + close].iter().collect();
		let inner = inner.trim();

		match inner.strip_prefix('$') {
			Some(name) if !name.is_empty() && name.chars().all(is_name_char) => {
				let value = self.lookup(name)?;
				self.out.push_str(&value);
				self.pos = start + close + 1;
			}
			_ => {
				self.out.push('#');
				self.pos += 1;
			}
		}
		Ok(())
	}

	fn variable(&mut self) -> Result<(), PreprocessError> {
		let name = self.read_name(self.pos + 1);
		if name.is_empty() {
			self.out.push('$');
			self.pos += 1;
			return Ok(());
		}

		let after_name = self.pos + 1 + name.chars().count();
		let mut cursor = after_name;
		while matches!(self.chars.get(cursor), Some(' ' | '\t')) {
			cursor += 1;
		}

		if self.chars.get(cursor) == Some(&':') {
			self.declaration(name, cursor + 1)
		} else {
			let value = self.lookup(&name)?;
			self.out.push_str(&value);
			self.pos = after_name;
			Ok(())
		}
	}

	fn declaration(&mut self, name: String, value_start: usize) -> Result<(), PreprocessError> {
		let line = self.line;
		let mut end = value_start;
		let mut quote = None;
		while let Some(&c) = self.chars.get(end) {
			match (quote, c) {
				(Some(q), c) if c == q => quote = None,
				(Some(_), '\\') => end += 1,
				(Some(_), _) => {}
				(None, '"' | '\'') => quote = Some(c),
				(None, ';' | '}') => break,
				(None, _) => {}
			}
			end += 1;
		}
		let end = end.min(self.chars.len());

		let raw: String = self.chars[value_start..end].iter().collect();
		self.line += raw.matches('\n').count();
		self.pos = if self.chars.get(end) == Some(&';') { end + 1 } else { end };

		let mut value = raw.trim();
		let mut default_only = false;
		loop {
			if let Some(rest) = value.strip_suffix("!default") {
				default_only = true;
				value = rest.trim_end();
			} else if let Some(rest) = value.strip_suffix("!global") {
				value = rest.trim_end();
			} else {
				break;
			}
		}

		if value.is_empty() {
			return Err(PreprocessError::EmptyValue { name, line });
		}
		if default_only && self.vars.contains_key(&name) {
			return Ok(());
		}

		let expanded = self.substitute(value, line)?;
		self.vars.insert(name, expanded);
		Ok(())
	}

	/// Replaces `$name` references inside a declared value
	fn substitute(&self, value: &str, line: usize) -> Result<String, PreprocessError> {
		let chars: Vec<char> = value.chars().collect();
		let mut out = String::with_capacity(value.len());
		let mut quote = None;
		let mut i = 0;

		while i < chars.len() {
			let c = chars[i];
			match quote {
				Some(q) => {
					if c == q {
						quote = None;
					}
					out.push(c);
					i += 1;
				}
				None if c == '"' || c == '\'' => {
					quote = Some(c);
					out.push(c);
					i += 1;
				}
				None if c == '$' => {
					let name: String = chars[i + 1..].iter().take_while(|c| is_name_char(**c)).collect();
					if name.is_empty() {
						out.push(c);
						i += 1;
						continue;
					}
					let resolved = self.vars.get(&name).ok_or_else(|| PreprocessError::UndefinedVariable {
						name: name.clone(),
						line,
					})?;
					out.push_str(resolved);
					i += 1 + name.chars().count();
				}
				None => {
					out.push(c);
					i += 1;
				}
			}
		}

		Ok(out)
	}

	fn read_name(&self, from: usize) -> String {
		self.chars
			.get(from..)
			.unwrap_or_default()
			.iter()
			.take_while(|c| is_name_char(**c))
			.collect()
	}

	fn lookup(&self, name: &str) -> Result<String, PreprocessError> {
		self.vars
			.get(name)
			.cloned()
			.ok_or_else(|| PreprocessError::UndefinedVariable {
				name: name.to_string(),
				line: self.line,
			})
	}
}

fn is_name_char(c: char) -> bool {
	c.is_alphanumeric() || c == '_' || c == '-'
}
