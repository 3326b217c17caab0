//! Analytics export client
//!
//! Fetches a view export as XML. The access token is obtained with the
//! client-credentials grant on first use and reused for the rest of the run.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::xml::parse_export_xml;
use super::SourceFeed;
use crate::config::{SourceConfig, ZohoParams};
use crate::sync::error::FeedError;
use crate::sync::types::RawRow;

/// Query string appended to every export request
const EXPORT_QUERY: &str =
    "ZOHO_ACTION=EXPORT&ZOHO_OUTPUT_FORMAT=XML&ZOHO_ERROR_FORMAT=XML&ZOHO_API_VERSION=1.0";

pub struct ZohoFeed {
    http: reqwest::Client,
    token_url: String,
    workspace_url: String,
    params: ZohoParams,
    token: OnceCell<String>,
}

impl ZohoFeed {
    pub fn new(config: &SourceConfig, params: ZohoParams) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| FeedError::Request {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            workspace_url: config.workspace_url.trim_end_matches('/').to_string(),
            params,
            token: OnceCell::new(),
        })
    }

    /// Export URL for a view
    pub fn export_url(&self, view: &str) -> String {
        format!(
            "{}/{}?{}",
            self.workspace_url,
            urlencoding::encode(view),
            EXPORT_QUERY
        )
    }

    async fn access_token(&self) -> Result<&str, FeedError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                log::debug!("Requesting analytics access token");
                let response = self
                    .http
                    .post(&self.token_url)
                    .query(&[
                        ("client_id", self.params.client_id.as_str()),
                        ("client_secret", self.params.client_secret.as_str()),
                        ("grant_type", "client_credentials"),
                        ("scope", self.params.scope.as_str()),
                        ("soid", self.params.soid.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| FeedError::Auth {
                        message: e.to_string(),
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(FeedError::Auth {
                        message: format!("token endpoint returned {}", status),
                    });
                }

                let body: serde_json::Value = response.json().await.map_err(|e| FeedError::Auth {
                    message: format!("invalid token response: {}", e),
                })?;
                body["access_token"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| FeedError::Auth {
                        message: "token response missing access_token".to_string(),
                    })
            })
            .await?;
        Ok(token.as_str())
    }
}

#[async_trait]
impl SourceFeed for ZohoFeed {
    async fn fetch(&self, view: &str) -> Result<Vec<RawRow>, FeedError> {
        if self.workspace_url.is_empty() {
            return Err(FeedError::Request {
                message: "source.workspace_url is not configured".to_string(),
            });
        }

        let token = self.access_token().await?;
        let url = self.export_url(view);
        log::info!("Fetching export for view '{}'", view);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .send()
            .await
            .map_err(|e| FeedError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FeedError::Request {
            message: format!("failed to read export body: {}", e),
        })?;
        if !status.is_success() {
            return Err(FeedError::Request {
                message: format!("export returned {}: {}", status, body.chars().take(200).collect::<String>()),
            });
        }

        parse_export_xml(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_url_encodes_view() {
        let config = SourceConfig {
            workspace_url: "https://analyticsapi.zoho.com/api/ops@example.com/Zoho%20CRM%20Analytics/".to_string(),
            ..SourceConfig::default()
        };
        let feed = ZohoFeed::new(&config, ZohoParams::default()).unwrap();
        assert_eq!(
            feed.export_url("Logistic 2"),
            "https://analyticsapi.zoho.com/api/ops@example.com/Zoho%20CRM%20Analytics/Logistic%202?ZOHO_ACTION=EXPORT&ZOHO_OUTPUT_FORMAT=XML&ZOHO_ERROR_FORMAT=XML&ZOHO_API_VERSION=1.0"
        );
    }

    #[tokio::test]
    async fn test_missing_workspace_is_request_error() {
        let feed = ZohoFeed::new(&SourceConfig::default(), ZohoParams::default()).unwrap();
        assert!(matches!(
            feed.fetch("Logistic 2").await,
            Err(FeedError::Request { .. })
        ));
    }
}
