//! Error types for route declaration and resolution hooks.

use thiserror::Error;

/// Error type for typed route parameter extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
	/// Failed to parse a parameter value.
	#[error("failed to parse parameter '{param}' value '{raw_value}' as {param_type}: {source_message}")]
	ParseError {
		/// Name of the parameter that failed to parse.
		param: String,
		/// Expected type name.
		param_type: &'static str,
		/// Raw string value that failed to parse.
		raw_value: String,
		/// Error message from parsing.
		source_message: String,
	},
	/// The parameter was not bound by the matched pattern.
	#[error("missing route parameter: {0}")]
	Missing(String),
}

/// Failure raised by a route guard or a leave callback.
///
/// Guards that fail are treated as rejections and leave callbacks that fail are
/// skipped; neither aborts the surrounding navigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
	/// A `can_enter` guard failed.
	#[error("route guard failed: {0}")]
	Guard(String),
	/// A leave callback failed.
	#[error("leave callback failed: {0}")]
	Leave(String),
}

/// Failure of a component's `preload`.
///
/// `Clone` so a single de-duplicated load can hand the same outcome to every
/// caller awaiting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load component '{component}': {message}")]
pub struct LoadError {
	/// Name of the component that failed to load.
	pub component: String,
	/// Loader error message.
	pub message: String,
}

impl LoadError {
	/// Creates a load error for `component`.
	pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			component: component.into(),
			message: message.into(),
		}
	}
}
