//! Authenticated GET against the HubSpot API.
//!
//! The crawler only sees the [`Transport`] trait: a signed GET that yields a
//! status code and the raw body. [`http::HttpTransport`] is the reqwest-backed
//! implementation used by the binary.

pub mod http;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// How the API key reaches HubSpot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Legacy API key, appended to the query string as `hapikey`
    ApiKey,
    /// Private app access token, sent as a bearer `Authorization` header
    AppToken,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub mode: AuthMode,
}

impl Credentials {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into().trim().to_string(),
            mode: AuthMode::ApiKey,
        }
    }

    pub fn app_token(token: impl Into<String>) -> Self {
        Self {
            key: token.into().trim().to_string(),
            mode: AuthMode::AppToken,
        }
    }

    /// Pick credentials in precedence order: API key first, then access token.
    /// Blank values are ignored.
    pub fn resolve(api_key: Option<String>, access_token: Option<String>) -> Option<Self> {
        let present = |v: &String| !v.trim().is_empty();

        api_key
            .filter(present)
            .map(Self::api_key)
            .or_else(|| access_token.filter(present).map(Self::app_token))
    }

    /// Append the query-string credential when running in legacy mode
    pub fn sign_url(&self, url: String) -> String {
        match self.mode {
            AuthMode::ApiKey => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{}{}hapikey={}", url, separator, self.key)
            }
            AuthMode::AppToken => url,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"<redacted>")
            .field("mode", &self.mode)
            .finish()
    }
}

/// Raw result of one page request
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: Bytes,
}

impl PageResponse {
    /// Anything at or above 300 ends the branch
    pub fn is_success(&self) -> bool {
        self.status < 300
    }

    /// Canonical reason phrase for the status, empty if unknown
    pub fn reason(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Credentials in effect, so URL builders know whether to append `hapikey`
    fn credentials(&self) -> &Credentials;

    /// Execute a signed GET. `url` is already signed for legacy mode.
    async fn get(&self, url: &str) -> Result<PageResponse>;
}
