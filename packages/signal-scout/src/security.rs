//! API keys for the search and enrichment backends.
//!
//! A key remembers which service it belongs to so it can be named in logs,
//! while its value only ever leaves the wrapper as a request header.

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// A bearer token for one external service.
pub struct ApiKey {
    service: &'static str,
    secret: SecretBox<str>,
}

impl ApiKey {
    pub fn new(service: &'static str, value: impl Into<String>) -> Self {
        Self {
            service,
            secret: SecretBox::new(value.into().into_boxed_str()),
        }
    }

    /// Read the key from `var`. Unset or blank means no key.
    pub fn from_env(service: &'static str, var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(service, v.trim()))
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Attach the key as a bearer token.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.secret.expose_secret())
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.service, self.secret.expose_secret())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("service", &self.service)
            .field("secret", &REDACTED)
            .finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{REDACTED}", self.service)
    }
}
