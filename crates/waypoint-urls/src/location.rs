//! Location snapshots and URL helpers.
//!
//! A router keeps the current URL *without* its base prefix; the base is only
//! applied when a URL is shown to the user (the address bar, a link `href`).
//! The helpers here convert between the two forms.

use serde_json::Value;
use url::Url;

/// Origin used to resolve path-only URLs when no browser location exists.
pub const FALLBACK_ORIGIN: &str = "http://localhost/";

/// Snapshot of the navigation state handed to guards and links.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
	url: Url,
	base: String,
	state: Option<Value>,
}

impl Location {
	/// Creates a snapshot; `url` must not contain `base`.
	pub fn new(url: Url, base: impl Into<String>, state: Option<Value>) -> Self {
		Self {
			url,
			base: base.into(),
			state,
		}
	}

	/// The URL without base prefix.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// The pathname without base prefix.
	pub fn pathname(&self) -> &str {
		self.url.path()
	}

	/// The base prefix.
	pub fn base(&self) -> &str {
		&self.base
	}

	/// Opaque application state attached by the navigation that produced this location.
	pub fn state(&self) -> Option<&Value> {
		self.state.as_ref()
	}

	/// The URL as displayed to the user (base re-applied).
	pub fn full_url(&self) -> Url {
		join_base(&self.base, &self.url)
	}

	/// Decoded query parameters in order of appearance.
	pub fn query_params(&self) -> Vec<(String, String)> {
		self.url.query_pairs().into_owned().collect()
	}

	/// First value of query parameter `key`.
	pub fn query(&self, key: &str) -> Option<String> {
		self.url
			.query_pairs()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.into_owned())
	}
}

/// Parses `input` as an absolute URL, resolving path-only input against
/// [`FALLBACK_ORIGIN`].
pub fn parse_url(input: &str) -> Result<Url, url::ParseError> {
	match Url::parse(input) {
		Ok(url) => Ok(url),
		Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(FALLBACK_ORIGIN)?.join(input),
		Err(err) => Err(err),
	}
}

/// Returns `url` with `base` prepended to its pathname.
///
/// The root path under a base is shown as the bare base (`/en`, not `/en/`).
pub fn join_base(base: &str, url: &Url) -> Url {
	let mut joined = url.clone();
	let path = url.path();
	if base.is_empty() {
		return joined;
	}
	if path == "/" {
		joined.set_path(base);
	} else {
		joined.set_path(&format!("{base}{path}"));
	}
	joined
}

/// Strips `base` from `path` when `path` is `base` itself or lies below it.
///
/// Prefix-based: `/en/x` under `/en` becomes `/x`, `/en` becomes `/`, and
/// `/english` is left alone (`None`).
pub fn strip_base(base: &str, path: &str) -> Option<String> {
	if base.is_empty() {
		return None;
	}
	let rest = path.strip_prefix(base)?;
	if rest.is_empty() {
		Some("/".to_string())
	} else if rest.starts_with('/') {
		Some(rest.to_string())
	} else {
		None
	}
}

/// Removes trailing slashes from `path`, keeping the root `/`.
pub fn trim_trailing_slash(path: &str) -> &str {
	let trimmed = path.trim_end_matches('/');
	if trimmed.is_empty() { "/" } else { trimmed }
}

/// Sets query parameter `key`, replacing the first existing occurrence in place
/// and dropping any later duplicates.
pub fn set_query_param(url: &mut Url, key: &str, value: &str) {
	let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
	match pairs.iter().position(|(k, _)| k == key) {
		Some(pos) => {
			pairs[pos].1 = value.to_string();
			let mut index = 0;
			pairs.retain(|(k, _)| {
				let keep = index <= pos || k != key;
				index += 1;
				keep
			});
		}
		None => pairs.push((key.to_string(), value.to_string())),
	}
	url.query_pairs_mut().clear().extend_pairs(&pairs);
}

/// Path, query and fragment of `url`, without scheme and origin.
pub fn relative_href(url: &Url) -> String {
	let mut href = url.path().to_string();
	if let Some(query) = url.query() {
		href.push('?');
		href.push_str(query);
	}
	if let Some(fragment) = url.fragment() {
		href.push('#');
		href.push_str(fragment);
	}
	href
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn url(s: &str) -> Url {
		parse_url(s).unwrap()
	}

	#[rstest]
	fn test_parse_url_accepts_path_only_input() {
		let parsed = parse_url("/docs?page=2").unwrap();
		assert_eq!(parsed.path(), "/docs");
		assert_eq!(parsed.query(), Some("page=2"));
	}

	#[rstest]
	#[case("", "/x", "/x")]
	#[case("/en", "/x", "/en/x")]
	#[case("/en", "/", "/en")]
	fn test_join_base(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
		assert_eq!(join_base(base, &url(path)).path(), expected);
	}

	#[rstest]
	#[case("/en", "/en/x", Some("/x"))]
	#[case("/en", "/en", Some("/"))]
	#[case("/en", "/en/", Some("/"))]
	#[case("/en", "/english", None)]
	#[case("/en", "/fr/x", None)]
	#[case("", "/x", None)]
	fn test_strip_base(#[case] base: &str, #[case] path: &str, #[case] expected: Option<&str>) {
		assert_eq!(strip_base(base, path).as_deref(), expected);
	}

	#[rstest]
	#[case("/", "/")]
	#[case("/a/", "/a")]
	#[case("/a//", "/a")]
	#[case("/a", "/a")]
	fn test_trim_trailing_slash(#[case] path: &str, #[case] expected: &str) {
		assert_eq!(trim_trailing_slash(path), expected);
	}

	#[rstest]
	fn test_set_query_param_overwrites_in_place() {
		let mut target = url("/list?a=1&b=2&a=3");
		set_query_param(&mut target, "a", "9");
		assert_eq!(target.query(), Some("a=9&b=2"));

		set_query_param(&mut target, "c", "x y");
		assert_eq!(target.query(), Some("a=9&b=2&c=x+y"));
	}

	#[rstest]
	fn test_relative_href_strips_origin() {
		assert_eq!(relative_href(&url("https://example.com/a/b?q=1#top")), "/a/b?q=1#top");
	}

	#[rstest]
	fn test_location_accessors() {
		let location = Location::new(url("/x?y=1"), "/en", Some(serde_json::json!({"k": 1})));
		assert_eq!(location.pathname(), "/x");
		assert_eq!(location.full_url().path(), "/en/x");
		assert_eq!(location.query("y").as_deref(), Some("1"));
		assert_eq!(location.query_params(), vec![("y".to_string(), "1".to_string())]);
		assert_eq!(location.state(), Some(&serde_json::json!({"k": 1})));
	}
}
