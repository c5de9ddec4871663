//! URL handling module for Marksync
//!
//! Bookmarks are identified by their URL. Internally a URL is held as the
//! five parts (scheme, netloc, path, query, fragment) plus a stable UUID
//! derived from the canonical string, so that the same URL always maps to
//! the same row in storage.

mod normalize;

use crate::UrlResult;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use normalize::unsplit_url;

/// A URL in canonical form
///
/// Only `http` and `https` URLs are accepted, and only when the string
/// round-trips through split/unsplit unchanged (see [`CanonicalUrl::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl {
    pub url_uuid: Uuid,
    pub scheme: String,
    pub netloc: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl CanonicalUrl {
    /// Parses a URL string that must already be canonical
    ///
    /// # Errors
    ///
    /// * `UrlError::Parse` - the string is not a URL at all
    /// * `UrlError::DisallowedScheme` - the scheme is not http/https
    /// * `UrlError::BadCanonicalisation` - the string would change when
    ///   re-serialised (e.g. empty path, trailing `?` or `#`)
    ///
    /// # Examples
    ///
    /// ```
    /// use marksync::url::CanonicalUrl;
    ///
    /// let url = CanonicalUrl::parse("http://example.com/a?b=1#top").unwrap();
    /// assert_eq!(url.netloc, "example.com");
    /// assert_eq!(url.query, "b=1");
    ///
    /// assert!(CanonicalUrl::parse("http://example.com").is_err());
    /// ```
    pub fn parse(url_str: &str) -> UrlResult<Self> {
        normalize::parse_canonical(url_str, false)
    }

    /// Parses a URL string, forcing it into canonical shape instead of
    /// rejecting it
    ///
    /// The UUID is computed over the coerced string.
    pub fn parse_coerced(url_str: &str) -> UrlResult<Self> {
        normalize::parse_canonical(url_str, true)
    }

    /// Builds a URL from already-split parts (e.g. a storage row)
    pub fn from_parts(
        url_uuid: Uuid,
        scheme: impl Into<String>,
        netloc: impl Into<String>,
        path: impl Into<String>,
        query: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            url_uuid,
            scheme: scheme.into(),
            netloc: netloc.into(),
            path: path.into(),
            query: query.into(),
            fragment: fragment.into(),
        }
    }

    /// Resolves a (possibly relative) link against this URL
    pub fn follow(&self, href: &str) -> UrlResult<Self> {
        let base = url::Url::parse(&self.to_string())
            .map_err(|e| crate::UrlError::Parse(e.to_string()))?;
        let joined = base
            .join(href)
            .map_err(|e| crate::UrlError::Parse(e.to_string()))?;
        Self::parse_coerced(joined.as_str())
    }

    /// The UUID a canonical string maps to
    pub fn uuid_for(canonical: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, canonical.as_bytes())
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&unsplit_url(
            &self.scheme,
            &self.netloc,
            &self.path,
            &self.query,
            &self.fragment,
        ))
    }
}

impl FromStr for CanonicalUrl {
    type Err = crate::UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CanonicalUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CanonicalUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
