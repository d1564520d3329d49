//! Layered settings for the combo server
//!
//! Settings are merged from several sources in increasing priority:
//! built-in defaults, a TOML file and `COMBO_`-prefixed environment
//! variables. Command line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default TOML file consulted when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "combo.toml";

/// Prefix of environment variables that override settings
pub const ENV_PREFIX: &str = "COMBO_";

/// Errors raised while loading or validating settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("Invalid settings: {0}")]
	Deserialize(#[from] serde_json::Error),

	#[error("Invalid value for `{key}`: {message}")]
	Invalid { key: &'static str, message: String },
}

/// Runtime settings of the combo server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboSettings {
	/// Listen address
	pub bind: SocketAddr,
	/// Servable root directory
	pub root: PathBuf,
	/// Boundary directory under `root`; modules must resolve inside it
	pub assets_dir: String,
	/// Context path stripped from prefixed module paths
	pub context_path: String,
	/// Route the combo endpoint answers on
	pub combo_path: String,
	/// Enables source modification time checks
	pub check_timestamp: bool,
	/// Minimum time between modification time checks of one resource
	pub check_timestamp_interval_ms: u64,
	/// Comma-separated extension allow-list, `*` allows everything
	pub allowed_extensions: String,
	/// Per-request timeout in seconds, `0` disables it
	pub request_timeout_secs: u64,
	/// Grace period for in-flight connections on shutdown
	pub shutdown_timeout_secs: u64,
}

impl Default for ComboSettings {
	fn default() -> Self {
		Self {
			bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
			root: PathBuf::from("."),
			assets_dir: "html/js".to_string(),
			context_path: String::new(),
			combo_path: "/combo".to_string(),
			check_timestamp: false,
			check_timestamp_interval_ms: 60_000,
			allowed_extensions: "css,js".to_string(),
			request_timeout_secs: 0,
			shutdown_timeout_secs: 30,
		}
	}
}

impl ComboSettings {
	/// Loads settings from defaults, a TOML file and the environment
	///
	/// With `config_path` set the file must exist; otherwise
	/// [`DEFAULT_CONFIG_FILE`] is read when present.
	///
	/// # Errors
	///
	/// Returns an error when a source cannot be read or parsed, or when the
	/// merged settings are invalid.
	pub fn load(config_path: Option<&Path>) -> Result<Self, SettingsError> {
		let file_source = match config_path {
			Some(path) => TomlFileSource::new(path).required(),
			None => TomlFileSource::new(DEFAULT_CONFIG_FILE),
		};

		SettingsLoader::new()
			.add_source(file_source)
			.add_source(EnvSource::new(ENV_PREFIX))
			.load()
	}

	/// Interval between modification time checks
	pub fn check_timestamp_interval(&self) -> Duration {
		Duration::from_millis(self.check_timestamp_interval_ms)
	}

	/// Per-request timeout, if enabled
	pub fn request_timeout(&self) -> Option<Duration> {
		(self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
	}

	/// Grace period for shutdown
	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_secs(self.shutdown_timeout_secs)
	}

	/// Absolute boundary directory modules must resolve into
	pub fn assets_root(&self) -> PathBuf {
		self.root.join(&self.assets_dir)
	}

	/// Checks cross-field constraints
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.assets_dir.trim().is_empty() {
			return Err(SettingsError::Invalid {
				key: "assets_dir",
				message: "must not be empty".to_string(),
			});
		}
		if !self.combo_path.starts_with('/') {
			return Err(SettingsError::Invalid {
				key: "combo_path",
				message: format!("`{}` must start with `/`", self.combo_path),
			});
		}
		if self.check_timestamp && self.check_timestamp_interval_ms == 0 {
			return Err(SettingsError::Invalid {
				key: "check_timestamp_interval_ms",
				message: "must be greater than zero when check_timestamp is enabled".to_string(),
			});
		}
		Ok(())
	}
}

/// A source of setting values
pub trait SettingsSource {
	/// Loads raw values
	///
	/// `current` holds the values merged so far, so sources that only see
	/// strings can coerce them to the expected type.
	fn load(&self, current: &Map<String, Value>) -> Result<Map<String, Value>, SettingsError>;

	/// Human readable description, used in logs
	fn description(&self) -> String;
}

/// Settings read from a TOML file
pub struct TomlFileSource {
	path: PathBuf,
	required: bool,
}

impl TomlFileSource {
	/// Creates a source for `path`; a missing file contributes nothing
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: false,
		}
	}

	/// Makes a missing file an error
	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}
}

impl SettingsSource for TomlFileSource {
	fn load(&self, _current: &Map<String, Value>) -> Result<Map<String, Value>, SettingsError> {
		if !self.required && !self.path.exists() {
			return Ok(Map::new());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
			path: self.path.clone(),
			source,
		})?;
		let table: toml::Table = toml::from_str(&content)?;

		match serde_json::to_value(table)? {
			Value::Object(map) => Ok(map),
			_ => Ok(Map::new()),
		}
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Settings read from prefixed environment variables
///
/// `COMBO_CHECK_TIMESTAMP=true` sets `check_timestamp`. Variables that do not
/// name a known setting are ignored.
pub struct EnvSource {
	prefix: String,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Reads the process environment
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			vars: None,
		}
	}

	/// Reads the given variables instead of the process environment
	pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			prefix: prefix.into(),
			vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
		}
	}
}

impl SettingsSource for EnvSource {
	fn load(&self, current: &Map<String, Value>) -> Result<Map<String, Value>, SettingsError> {
		let vars = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};

		let mut values = Map::new();
		for (key, raw) in vars {
			let Some(name) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			let name = name.to_lowercase();
			let Some(existing) = current.get(&name) else {
				tracing::debug!(variable = %key, "Ignoring unknown setting");
				continue;
			};
			values.insert(name, coerce(&raw, existing));
		}

		Ok(values)
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

/// Interprets an environment string with the type of the value it replaces
fn coerce(raw: &str, existing: &Value) -> Value {
	let trimmed = raw.trim();
	match existing {
		Value::Bool(_) => match trimmed.to_lowercase().as_str() {
			"true" | "1" | "yes" | "on" => Value::Bool(true),
			"false" | "0" | "no" | "off" => Value::Bool(false),
			_ => Value::String(raw.to_string()),
		},
		Value::Number(_) => trimmed
			.parse::<u64>()
			.map(|n| Value::Number(n.into()))
			.unwrap_or_else(|_| Value::String(raw.to_string())),
		_ => Value::String(raw.to_string()),
	}
}

/// Merges settings sources over the defaults
pub struct SettingsLoader {
	sources: Vec<Box<dyn SettingsSource>>,
}

impl SettingsLoader {
	/// Creates a loader holding only the defaults
	pub fn new() -> Self {
		Self {
			sources: Vec::new(),
		}
	}

	/// Adds a source; later sources take priority
	pub fn add_source(mut self, source: impl SettingsSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Merges every source and validates the result
	pub fn load(&self) -> Result<ComboSettings, SettingsError> {
		let mut merged = match serde_json::to_value(ComboSettings::default())? {
			Value::Object(map) => map,
			_ => Map::new(),
		};

		for source in &self.sources {
			let values = source.load(&merged)?;
			tracing::debug!(source = %source.description(), keys = values.len(), "Loaded settings source");
			merged.extend(values);
		}

		let settings: ComboSettings = serde_json::from_value(Value::Object(merged))?;
		settings.validate()?;
		Ok(settings)
	}
}

impl Default for SettingsLoader {
	fn default() -> Self {
		Self::new()
	}
}
