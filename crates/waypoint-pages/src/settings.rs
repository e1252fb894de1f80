//! Router settings.
//!
//! Every field has a default, so an empty TOML document is a valid configuration
//! for browser use. Headless use must set `url`.
//!
//! ```toml
//! url = "/en/docs"
//! default_base = "/en"
//! max_keep_alive = 4
//! default_prefetch = "hover"
//! optional_tail = true
//! max_redirects = 8
//! ```

use serde::Deserialize;

use crate::error::RouterResult;
use crate::prefetch::PrefetchMode;

/// Default cap on consecutive redirects in one scope.
pub const DEFAULT_MAX_REDIRECTS: usize = 8;

/// Configuration of a [`Router`](crate::Router).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterSettings {
	/// Initial URL; falls back to the browser location when unset.
	pub url: Option<String>,
	/// Base prefix the route tree is mounted under.
	pub default_base: String,
	/// Keep-alive capacity; unbounded when unset.
	pub max_keep_alive: Option<usize>,
	/// Prefetch trigger used by links that do not choose one.
	pub default_prefetch: PrefetchMode,
	/// Whether a pathname one segment short of a pattern ending in `:name?` matches.
	pub optional_tail: bool,
	/// Consecutive redirects a scope follows before giving up.
	pub max_redirects: usize,
}

impl Default for RouterSettings {
	fn default() -> Self {
		Self {
			url: None,
			default_base: String::new(),
			max_keep_alive: None,
			default_prefetch: PrefetchMode::Visible,
			optional_tail: true,
			max_redirects: DEFAULT_MAX_REDIRECTS,
		}
	}
}

impl RouterSettings {
	/// Creates default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses settings from a TOML document.
	pub fn from_toml_str(source: &str) -> RouterResult<Self> {
		Ok(toml::from_str(source)?)
	}

	/// Sets the initial URL.
	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	/// Sets the base prefix.
	pub fn with_base(mut self, base: impl Into<String>) -> Self {
		self.default_base = base.into();
		self
	}

	/// Sets the keep-alive capacity.
	pub fn with_max_keep_alive(mut self, max: usize) -> Self {
		self.max_keep_alive = Some(max);
		self
	}

	/// Sets the default link prefetch trigger.
	pub fn with_default_prefetch(mut self, mode: PrefetchMode) -> Self {
		self.default_prefetch = mode;
		self
	}

	/// Enables or disables optional-tail matching.
	pub fn with_optional_tail(mut self, enabled: bool) -> Self {
		self.optional_tail = enabled;
		self
	}

	/// Sets the redirect cap.
	pub fn with_max_redirects(mut self, max: usize) -> Self {
		self.max_redirects = max;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::RouterError;
	use rstest::rstest;

	#[rstest]
	fn test_empty_document_is_default() {
		assert_eq!(RouterSettings::from_toml_str("").unwrap(), RouterSettings::default());
	}

	#[rstest]
	fn test_parse_full_document() {
		let settings = RouterSettings::from_toml_str(
			r#"
			url = "/en/docs"
			default_base = "/en"
			max_keep_alive = 4
			default_prefetch = "hover"
			optional_tail = false
			max_redirects = 3
			"#,
		)
		.unwrap();

		assert_eq!(
			settings,
			RouterSettings::new()
				.with_url("/en/docs")
				.with_base("/en")
				.with_max_keep_alive(4)
				.with_default_prefetch(PrefetchMode::Hover)
				.with_optional_tail(false)
				.with_max_redirects(3)
		);
	}

	#[rstest]
	#[case("max_redirects = \"many\"")]
	#[case("unknown_key = 1")]
	fn test_invalid_documents_are_rejected(#[case] source: &str) {
		assert!(matches!(
			RouterSettings::from_toml_str(source),
			Err(RouterError::Settings(_))
		));
	}
}
