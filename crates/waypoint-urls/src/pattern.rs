//! Path pattern matching and route tree flattening.
//!
//! Patterns are compared segment by segment against a pathname:
//!
//! - `users` matches the literal segment,
//! - `:id` binds one segment (possibly empty),
//! - `:tab?` binds one segment if present; only valid as the last segment,
//! - `*rest` binds every remaining segment joined by `/`; only valid as the last segment.
//!
//! Trailing slashes are ignored on both sides, so `/a/b/` and `/a/b` always
//! match the same patterns. Malformed patterns (`*rest` in the middle) are not
//! rejected; their matching behavior is unspecified.

use std::rc::Rc;

use super::params::RouteParams;
use super::route::{FlatRoute, RouteDefinition};

/// One segment of a compiled [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	/// Matches the segment text exactly.
	Literal(String),
	/// Binds a single segment.
	Param {
		/// Parameter name.
		name: String,
		/// Declared with a trailing `?`.
		optional: bool,
	},
	/// Binds the remainder of the path.
	Wildcard(String),
}

/// Options tuning edge cases of [`PathPattern::matches_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
	/// Whether a pathname exactly one segment shorter than a pattern ending in
	/// `:name?` matches. Enabled by default.
	pub optional_tail: bool,
}

impl Default for MatchOptions {
	fn default() -> Self {
		Self {
			optional_tail: true,
		}
	}
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
	pattern: String,
	segments: Vec<Segment>,
}

impl PathPattern {
	/// Compiles `pattern`.
	pub fn new(pattern: &str) -> Self {
		let segments = split_segments(pattern)
			.into_iter()
			.map(|raw| {
				if let Some(name) = raw.strip_prefix(':') {
					match name.strip_suffix('?') {
						Some(name) => Segment::Param {
							name: name.to_string(),
							optional: true,
						},
						None => Segment::Param {
							name: name.to_string(),
							optional: false,
						},
					}
				} else if let Some(name) = raw.strip_prefix('*') {
					Segment::Wildcard(name.to_string())
				} else {
					Segment::Literal(raw.to_string())
				}
			})
			.collect();

		Self {
			pattern: pattern.to_string(),
			segments,
		}
	}

	/// Returns the original pattern string.
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// Returns the compiled segments.
	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	/// Returns the parameter names in pattern order.
	pub fn param_names(&self) -> Vec<&str> {
		self.segments
			.iter()
			.filter_map(|segment| match segment {
				Segment::Param { name, .. } | Segment::Wildcard(name) => Some(name.as_str()),
				Segment::Literal(_) => None,
			})
			.collect()
	}

	/// Returns whether the pattern contains no parameters.
	pub fn is_exact(&self) -> bool {
		self.segments
			.iter()
			.all(|segment| matches!(segment, Segment::Literal(_)))
	}

	/// Matches `pathname` with default options.
	pub fn matches(&self, pathname: &str) -> Option<RouteParams> {
		self.matches_with(pathname, &MatchOptions::default())
	}

	/// Matches `pathname`, returning the bound parameters on success.
	///
	/// On failure nothing is returned; partially bound parameters are dropped.
	pub fn matches_with(&self, pathname: &str, options: &MatchOptions) -> Option<RouteParams> {
		let path = split_segments(pathname);
		let mut params = RouteParams::new();

		for (index, segment) in self.segments.iter().enumerate() {
			let Some(value) = path.get(index) else {
				return match segment {
					Segment::Wildcard(name) => {
						bind(&mut params, name, "");
						Some(params)
					}
					Segment::Param { optional: true, .. }
						if options.optional_tail
							&& index + 1 == self.segments.len()
							&& index == path.len() =>
					{
						Some(params)
					}
					_ => None,
				};
			};

			match segment {
				Segment::Literal(literal) => {
					if literal != value {
						return None;
					}
				}
				Segment::Param { name, optional } => {
					if !(*optional && value.is_empty()) {
						bind(&mut params, name, value);
					}
				}
				Segment::Wildcard(name) => {
					bind(&mut params, name, &path[index..].join("/"));
					return Some(params);
				}
			}
		}

		(path.len() == self.segments.len()).then_some(params)
	}
}

/// Splits a path into segments, ignoring the leading slash and any trailing slashes.
fn split_segments(path: &str) -> Vec<&str> {
	let trimmed = path.trim_end_matches('/');
	let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
	if trimmed.is_empty() {
		Vec::new()
	} else {
		trimmed.split('/').collect()
	}
}

fn bind(params: &mut RouteParams, name: &str, raw: &str) {
	if name.is_empty() {
		return;
	}
	let value = urlencoding::decode(raw)
		.map(|decoded| decoded.into_owned())
		.unwrap_or_else(|_| raw.to_string());
	params.insert(name, value);
}

/// Matches `pathname` against a single pattern string.
///
/// # Example
///
/// ```ignore
/// let params = match_segment("/a/b/c", "/a/*rest").unwrap();
/// assert_eq!(params.get("rest"), Some("b/c"));
/// ```
pub fn match_segment(pathname: &str, pattern: &str) -> Option<RouteParams> {
	PathPattern::new(pattern).matches(pathname)
}

/// [`match_segment`] with explicit [`MatchOptions`].
pub fn match_segment_with(
	pathname: &str,
	pattern: &str,
	options: &MatchOptions,
) -> Option<RouteParams> {
	PathPattern::new(pattern).matches_with(pathname, options)
}

/// Concatenates a parent path and an authored child path verbatim.
///
/// The root parent `/` is the only exception: `/` + `/b` is `/b`, not `//b`.
fn concat_path(parent: &str, child: &str) -> String {
	if parent == "/" && child.starts_with('/') {
		child.to_string()
	} else {
		format!("{parent}{child}")
	}
}

/// Flattens a route tree depth-first, each route emitted before its descendants.
///
/// Paths are concatenated as authored: a child `/b` under `/a` becomes `/a/b`,
/// a child `b` becomes `/ab`.
pub fn flatten(routes: &[Rc<RouteDefinition>], parent_path: &str) -> Vec<Rc<FlatRoute>> {
	let mut out = Vec::new();
	flatten_into(&mut out, routes, parent_path, None);
	out
}

/// Flattens `routes` below an already flattened `parent`.
///
/// Top-level results carry `parent` as their back-reference.
pub fn flatten_under(routes: &[Rc<RouteDefinition>], parent: &Rc<FlatRoute>) -> Vec<Rc<FlatRoute>> {
	let mut out = Vec::new();
	flatten_into(&mut out, routes, parent.path(), Some(Rc::clone(parent)));
	out
}

fn flatten_into(
	out: &mut Vec<Rc<FlatRoute>>,
	routes: &[Rc<RouteDefinition>],
	parent_path: &str,
	parent: Option<Rc<FlatRoute>>,
) {
	for definition in routes {
		let path = concat_path(parent_path, definition.path());
		let flat = Rc::new(FlatRoute::new(
			path,
			Rc::clone(definition),
			parent.clone(),
		));
		out.push(Rc::clone(&flat));
		flatten_into(out, definition.child_routes(), flat.path(), Some(Rc::clone(&flat)));
	}
}

/// A flattened route that matched a pathname.
#[derive(Debug, Clone)]
pub struct RouteMatch {
	/// The matched route (the deepest one, for nested paths).
	pub route: Rc<FlatRoute>,
	/// Parameters bound by the route's full path.
	pub params: RouteParams,
}

impl RouteMatch {
	/// Walks up from the matched route to the route declared directly under
	/// `scope_parent` (the tree root when `None`).
	///
	/// Returns the matched route itself when no ancestor sits at that level.
	pub fn scope_route(&self, scope_parent: Option<&Rc<FlatRoute>>) -> Rc<FlatRoute> {
		let mut current = Rc::clone(&self.route);
		loop {
			let at_scope = match (current.parent(), scope_parent) {
				(None, None) => true,
				(Some(parent), Some(scope)) => Rc::ptr_eq(parent, scope),
				_ => false,
			};
			if at_scope {
				return current;
			}
			match current.parent() {
				Some(parent) => current = Rc::clone(parent),
				None => return Rc::clone(&self.route),
			}
		}
	}
}

/// Flattens `routes` and returns every match in flatten order.
///
/// The first element is the authoritative match for single-match call sites.
pub fn match_all(pathname: &str, routes: &[Rc<RouteDefinition>]) -> Vec<RouteMatch> {
	match_flat(pathname, &flatten(routes, ""), &MatchOptions::default())
}

/// Returns every match among already flattened routes, preserving their order.
pub fn match_flat(
	pathname: &str,
	routes: &[Rc<FlatRoute>],
	options: &MatchOptions,
) -> Vec<RouteMatch> {
	routes
		.iter()
		.filter_map(|route| {
			route
				.pattern()
				.matches_with(pathname, options)
				.map(|params| RouteMatch {
					route: Rc::clone(route),
					params,
				})
		})
		.collect()
}

/// Returns the first match among already flattened routes.
pub fn first_match(
	pathname: &str,
	routes: &[Rc<FlatRoute>],
	options: &MatchOptions,
) -> Option<RouteMatch> {
	routes.iter().find_map(|route| {
		route
			.pattern()
			.matches_with(pathname, options)
			.map(|params| RouteMatch {
				route: Rc::clone(route),
				params,
			})
	})
}
