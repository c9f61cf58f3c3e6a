//! Canonical site identity.
//!
//! Every registry record is keyed by the site's origin: lowercased
//! `scheme://host[:port]` with default ports, path, query and fragment
//! removed. Pages deep inside a site all map to the same key.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::FetchError;

/// Canonical form of a site URL, used as the registry's unique key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Parse and canonicalize a raw URL string.
    ///
    /// Bare hosts (`example.com`) are accepted and assumed to be https.
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let trimmed = raw.trim();
        let url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{trimmed}"))
                .map_err(|_| FetchError::InvalidUrl {
                    url: raw.to_string(),
                })?,
            Err(_) => {
                return Err(FetchError::InvalidUrl {
                    url: raw.to_string(),
                })
            }
        };
        Self::from_url(&url)
    }

    /// Canonicalize an already-parsed URL.
    pub fn from_url(url: &Url) -> Result<Self, FetchError> {
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }
        Ok(Self(url.origin().ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse back into a `Url` (always succeeds for values built by this type).
    pub fn to_url(&self) -> Result<Url, FetchError> {
        Url::parse(&self.0).map_err(|_| FetchError::InvalidUrl {
            url: self.0.clone(),
        })
    }

    /// Host portion of the canonical URL.
    pub fn host(&self) -> &str {
        let without_scheme = self
            .0
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.0);
        without_scheme
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map(|(host, _)| host)
            .unwrap_or(without_scheme)
    }

    /// Human-readable site name derived from the domain.
    ///
    /// `https://www.stream-east.app` becomes `Stream-East`.
    pub fn display_name(&self) -> String {
        let host = self.host();
        let host = ["www.", "m.", "mobile."]
            .iter()
            .find_map(|prefix| host.strip_prefix(prefix))
            .unwrap_or(host);
        let label = host.split('.').next().unwrap_or(host);
        title_case(label)
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Registrable-ish domain of a URL used for per-domain quotas and politeness.
pub fn domain_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
