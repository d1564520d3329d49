//! # Reinhardt Combo
//!
//! A combo asset server: one HTTP request names several JavaScript or CSS
//! modules, and the server answers with their minified contents
//! concatenated in request order.
//!
//! ```text
//! GET /combo?p=/html/js/&m=jquery-min.js&m=app.js&m=widgets.js
//! ```
//!
//! ## Components
//!
//! - [`resolver`]: maps module paths to files inside the asset boundary and
//!   enforces the extension allow-list
//! - [`transform`]: SCSS-style variable expansion plus CSS and JavaScript
//!   minification; `*-min.css`/`*-min.js` files pass through untouched
//! - [`cache`]: per-resource cache revalidated by modification time, and a
//!   per-combination cache used when timestamps are not checked
//! - [`handler`]: the [`ComboHandler`] endpoint
//! - [`config`]: layered [`ComboSettings`] (defaults, TOML, environment)
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use reinhardt_combo::{ComboHandler, ComboSettings};
//! use reinhardt_combo_server::serve;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ComboSettings::load(None)?;
//! let handler = ComboHandler::from_settings(&settings).await?;
//!
//! serve(settings.bind, Arc::new(handler)).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod module;
pub mod resolver;
pub mod transform;

pub use cache::{CombinationCache, CombinedPayload, ResourceCache, ResourceEntry};
pub use config::{ComboSettings, SettingsError, SettingsLoader};
pub use error::{ComboError, NotFoundReason, Result};
pub use handler::ComboHandler;
pub use module::{MinifierKind, ModuleRequest};
pub use resolver::{AllowedExtensions, ResolvedResource, ResourceResolver};
pub use transform::{
	ContentTransformer, StylePreprocessor, TransformOutcome, TransformWarning, TransformedContent,
};
