//! Account lookup used to check credentials before a run.

use crate::envelope::ErrorEnvelope;
use crate::transport::Transport;
use crate::{BackupError, Result};
use serde::Deserialize;
use tracing::{info, warn};

const ACCOUNT_PATH: &str = "/integrations/v1/me";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub portal_id: u64,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub utc_offset_milliseconds: i64,
    #[serde(default)]
    pub utc_offset: String,
}

/// Fetch the portal behind the configured credentials.
/// Any non-2xx answer is reported as an authentication problem.
pub async fn fetch_account<T: Transport + ?Sized>(transport: &T, base_url: &str) -> Result<AccountInfo> {
    let url = transport.credentials().sign_url(format!(
        "{}{}",
        base_url.trim_end_matches('/'),
        ACCOUNT_PATH
    ));

    let response = transport.get(&url).await?;
    if !response.is_success() {
        let body = ErrorEnvelope::parse(&response.body);
        return Err(BackupError::Authentication(format!(
            "{} {}: {}",
            response.status,
            response.reason(),
            body.message
        )));
    }

    Ok(serde_json::from_slice(&response.body)?)
}

/// Log which portal the credentials reach. A failed lookup is only a warning:
/// each endpoint reports its own errors once the crawl starts.
pub async fn verify_account<T: Transport + ?Sized>(transport: &T, base_url: &str) -> Option<AccountInfo> {
    match fetch_account(transport, base_url).await {
        Ok(account) => {
            info!(
                "Connected to HubSpot account {} ({}, {})",
                account.portal_id, account.time_zone, account.currency
            );
            Some(account)
        }
        Err(e) => {
            warn!("Could not verify HubSpot account, continuing with backup: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::transport::http::HttpTransport;
    use crate::transport::Credentials;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/integrations/v1/me"))
            .and(query_param("hapikey", "demo"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"portalId":62515,"timeZone":"US/Eastern","currency":"USD","utcOffsetMilliseconds":-18000000,"utcOffset":"-05:00"}"#,
            ))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Credentials::api_key("demo"), &ApiConfig::default()).unwrap();
        let account = fetch_account(&transport, &server.uri()).await.unwrap();

        assert_eq!(account.portal_id, 62515);
        assert_eq!(account.currency, "USD");
        assert_eq!(account.utc_offset_milliseconds, -18_000_000);
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"status":"error","message":"Authentication credentials not found."}"#),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Credentials::app_token("bad"), &ApiConfig::default()).unwrap();
        match fetch_account(&transport, &server.uri()).await {
            Err(BackupError::Authentication(message)) => {
                assert!(message.starts_with("401 Unauthorized"));
                assert!(message.contains("credentials not found"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_account_does_not_abort() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Credentials::app_token("t"), &ApiConfig::default()).unwrap();
        assert!(verify_account(&transport, &server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_verify_account_returns_portal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/integrations/v1/me"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"portalId":7}"#))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Credentials::app_token("t"), &ApiConfig::default()).unwrap();
        let account = verify_account(&transport, &server.uri()).await.unwrap();
        assert_eq!(account.portal_id, 7);
        assert!(account.time_zone.is_empty());
    }
}
