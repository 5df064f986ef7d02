//! Site identity normalization
//!
//! Users write instances as `lemmy.world`, `https://lemmy.world/` or even a
//! community link like `http://lemmy.world/c/rust`. All of them collapse to
//! the same `https://lemmy.world` base so endpoint URLs can be joined without
//! caring about the input shape.

use std::fmt;

use url::Url;

use crate::constants::API_BASE;
use crate::error::{Error, Result};

/// Normalized base URL of an instance: always `https`, never a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteIdentity(String);

impl SiteIdentity {
    /// Normalize a bare host or full URL into a site identity.
    ///
    /// Idempotent: normalizing an already-normalized identity returns it
    /// unchanged.
    pub fn normalize(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidSite("empty site".into()));
        }

        let authority = match trimmed.split_once("://") {
            Some((_, rest)) => rest,
            None => trimmed,
        };
        let authority = authority
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();

        let parsed = Url::parse(&format!("https://{authority}"))
            .map_err(|e| Error::InvalidSite(format!("{input}: {e}")))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidSite(format!("{input}: no host")))?;

        let base = match parsed.port() {
            Some(port) => format!("https://{host}:{port}"),
            None => format!("https://{host}"),
        };
        Ok(Self(base))
    }

    /// Plain-HTTP identity for in-process mock servers.
    #[cfg(any(test, feature = "test-util"))]
    pub fn plain_http(base: &str) -> Self {
        Self(base.trim_end_matches('/').to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full URL of an API endpoint, e.g. `endpoint("user/login")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{API_BASE}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for SiteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
