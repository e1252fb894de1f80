//! Route parameters bound by a successful path match.
//!
//! Values are stored as decoded strings; typed access goes through
//! [`RouteParams::parse`], similar to a `Path<T>` extractor.
//!
//! # Example
//!
//! ```ignore
//! use waypoint_urls::match_segment;
//!
//! let params = match_segment("/users/42", "/users/:id").unwrap();
//! let id: i64 = params.parse("id")?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::PathError;

/// Parameters extracted from a pathname by a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
	values: HashMap<String, String>,
}

impl RouteParams {
	/// Creates an empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.values.insert(name.into(), value.into());
	}

	/// Returns the raw value bound to `name`.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.values.get(name).map(String::as_str)
	}

	/// Returns whether `name` was bound.
	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	/// Parses the value bound to `name`.
	///
	/// # Errors
	///
	/// Returns [`PathError::Missing`] if the parameter was not bound and
	/// [`PathError::ParseError`] if it does not parse as `T`.
	pub fn parse<T>(&self, name: &str) -> Result<T, PathError>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		let raw = self
			.get(name)
			.ok_or_else(|| PathError::Missing(name.to_string()))?;
		raw.parse::<T>().map_err(|e| PathError::ParseError {
			param: name.to_string(),
			param_type: std::any::type_name::<T>(),
			raw_value: raw.to_string(),
			source_message: e.to_string(),
		})
	}

	/// Parses an optional parameter; an unbound parameter yields `Ok(None)`.
	pub fn parse_opt<T>(&self, name: &str) -> Result<Option<T>, PathError>
	where
		T: FromStr,
		T::Err: fmt::Display,
	{
		if self.contains(name) {
			self.parse(name).map(Some)
		} else {
			Ok(None)
		}
	}

	/// Number of bound parameters.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Returns whether no parameter was bound.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Iterates over `(name, value)` pairs in arbitrary order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Borrows the underlying map.
	pub fn as_map(&self) -> &HashMap<String, String> {
		&self.values
	}
}

impl From<HashMap<String, String>> for RouteParams {
	fn from(values: HashMap<String, String>) -> Self {
		Self { values }
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteParams {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			values: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn params() -> RouteParams {
		[("id", "42"), ("slug", "hello-world"), ("flag", "maybe")]
			.into_iter()
			.collect()
	}

	#[rstest]
	fn test_get_raw_value() {
		let params = params();
		assert_eq!(params.get("slug"), Some("hello-world"));
		assert_eq!(params.get("nope"), None);
		assert_eq!(params.len(), 3);
	}

	#[rstest]
	fn test_parse_typed_value() {
		let id: i64 = params().parse("id").unwrap();
		assert_eq!(id, 42);
	}

	#[rstest]
	fn test_parse_failure_reports_type() {
		let err = params().parse::<bool>("flag").unwrap_err();
		match err {
			PathError::ParseError {
				param,
				param_type,
				raw_value,
				..
			} => {
				assert_eq!(param, "flag");
				assert_eq!(param_type, "bool");
				assert_eq!(raw_value, "maybe");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[rstest]
	fn test_parse_missing_parameter() {
		assert_eq!(
			params().parse::<u32>("page"),
			Err(PathError::Missing("page".to_string()))
		);
	}

	#[rstest]
	fn test_parse_opt_unbound_is_none() {
		assert_eq!(params().parse_opt::<u32>("page"), Ok(None));
		assert_eq!(params().parse_opt::<u32>("id"), Ok(Some(42)));
	}
}
