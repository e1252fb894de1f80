//! Router error types.

use thiserror::Error;

/// Errors raised while setting up or configuring a router.
///
/// Runtime failures of guards, leave callbacks and component loads never
/// surface here; the resolver turns them into state transitions.
#[derive(Debug, Error)]
pub enum RouterError {
	/// No browser location exists and no initial URL was configured.
	#[error("no initial URL: a `url` setting is required when running without a browser location")]
	MissingInitialUrl,

	/// A URL could not be parsed.
	#[error("invalid URL: {0}")]
	InvalidUrl(#[from] url::ParseError),

	/// Router settings could not be deserialized.
	#[error("invalid router settings: {0}")]
	Settings(#[from] toml::de::Error),
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
