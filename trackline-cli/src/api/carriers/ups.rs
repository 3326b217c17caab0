//! UPS track API adapter

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::{status_error, TrackingClient};
use crate::config::UpsParams;
use crate::sync::enrich::parse_loose_date;
use crate::sync::error::LookupError;
use crate::sync::types::EstimateResult;

/// Package date fields, in order of preference
const DATE_FIELDS: [&str; 3] = ["deliveryDate", "rescheduledDeliveryDate", "estimatedDeliveryDate"];

pub struct UpsClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    params: UpsParams,
    token: OnceCell<String>,
}

impl UpsClient {
    pub fn new(http: reqwest::Client, base_url: &str, token_url: &str, params: UpsParams) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            params,
            token: OnceCell::new(),
        }
    }

    async fn access_token(&self) -> Result<&str, LookupError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                log::debug!("Requesting UPS access token");
                let response = self
                    .http
                    .post(&self.token_url)
                    .basic_auth(&self.params.client_key, Some(&self.params.client_secret))
                    .form(&[("grant_type", "client_credentials")])
                    .send()
                    .await
                    .map_err(|e| LookupError::Auth {
                        message: e.to_string(),
                    })?;

                if !response.status().is_success() {
                    return Err(LookupError::Auth {
                        message: format!("UPS token endpoint returned {}", response.status()),
                    });
                }

                let body: Value = response.json().await.map_err(|e| LookupError::Auth {
                    message: e.to_string(),
                })?;
                body["access_token"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| LookupError::Auth {
                        message: "UPS token response missing access_token".to_string(),
                    })
            })
            .await?;
        Ok(token.as_str())
    }
}

#[async_trait]
impl TrackingClient for UpsClient {
    async fn track(&self, code: &str) -> Result<EstimateResult, LookupError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/api/track/v1/details/{}",
            self.base_url,
            urlencoding::encode(code)
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("transId", format!("trackline-{}", code))
            .header("transactionSrc", "trackline")
            .query(&[
                ("locale", "en_US"),
                ("returnSignature", "false"),
                ("returnMilestones", "false"),
                ("returnPOD", "false"),
            ])
            .send()
            .await
            .map_err(|e| LookupError::Request {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(status_error("UPS", response).await);
        }

        let payload: Value = response.json().await.map_err(|e| LookupError::Request {
            message: format!("invalid UPS response: {}", e),
        })?;
        parse_track_response(&payload)
    }
}

/// Extract the delivery estimate from a UPS track response
///
/// The first parseable of `deliveryDate`, `rescheduledDeliveryDate` and
/// `estimatedDeliveryDate` wins. Each may be a string, an object with a
/// `date` key, or a list of either.
pub fn parse_track_response(payload: &Value) -> Result<EstimateResult, LookupError> {
    let package = &payload["trackResponse"]["shipment"][0]["package"][0];
    if package.is_null() {
        return Ok(EstimateResult::NoData);
    }

    let mut unparsed: Option<&str> = None;
    for field in DATE_FIELDS {
        let Some(raw) = date_text(&package[field]) else {
            continue;
        };
        match parse_ups_date(raw) {
            Some(date) => return Ok(EstimateResult::Date(date)),
            None => {
                unparsed.get_or_insert(raw);
            }
        }
    }

    match unparsed {
        Some(value) => Err(LookupError::UnparseableDate {
            value: value.to_string(),
        }),
        None => Ok(EstimateResult::NoData),
    }
}

fn date_text(value: &Value) -> Option<&str> {
    let value = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let value = match value {
        Value::Object(map) => map.get("date")?,
        other => other,
    };
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// `YYYYMMDD` or `YYYY-MM-DD`
fn parse_ups_date(value: &str) -> Option<NaiveDate> {
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        return parse_loose_date(value);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
