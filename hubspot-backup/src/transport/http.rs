//! reqwest-backed [`Transport`].

use super::{AuthMode, Credentials, PageResponse, Transport};
use crate::config::ApiConfig;
use crate::{BackupError, Result};
use async_trait::async_trait;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(credentials: Credentials, api: &ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("hubspot-backup/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = api.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            credentials,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn get(&self, url: &str) -> Result<PageResponse> {
        let mut request = self.client.get(url.trim());

        if self.credentials.mode == AuthMode::AppToken {
            request = request.bearer_auth(&self.credentials.key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackupError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackupError::Transport(e.to_string()))?;

        debug!(status, bytes = body.len(), "GET completed");

        Ok(PageResponse { status, body })
    }
}
