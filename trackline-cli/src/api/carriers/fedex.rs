//! FedEx track API adapter

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::{status_error, TrackingClient};
use crate::config::FedexParams;
use crate::sync::enrich::parse_estimate_date;
use crate::sync::error::LookupError;
use crate::sync::types::EstimateResult;

pub struct FedexClient {
    http: reqwest::Client,
    base_url: String,
    params: FedexParams,
    token: OnceCell<String>,
}

impl FedexClient {
    pub fn new(http: reqwest::Client, base_url: &str, params: FedexParams) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            params,
            token: OnceCell::new(),
        }
    }

    async fn access_token(&self) -> Result<&str, LookupError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                log::debug!("Requesting FedEx access token");
                let response = self
                    .http
                    .post(format!("{}/oauth/token", self.base_url))
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", self.params.client_id.as_str()),
                        ("client_secret", self.params.client_secret.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| LookupError::Auth {
                        message: e.to_string(),
                    })?;

                if !response.status().is_success() {
                    return Err(LookupError::Auth {
                        message: format!("FedEx token endpoint returned {}", response.status()),
                    });
                }

                let body: Value = response.json().await.map_err(|e| LookupError::Auth {
                    message: e.to_string(),
                })?;
                body["access_token"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| LookupError::Auth {
                        message: "FedEx token response missing access_token".to_string(),
                    })
            })
            .await?;
        Ok(token.as_str())
    }
}

#[async_trait]
impl TrackingClient for FedexClient {
    async fn track(&self, code: &str) -> Result<EstimateResult, LookupError> {
        let token = self.access_token().await?;
        let body = json!({
            "includeDetailedScans": false,
            "trackingInfo": [
                { "trackingNumberInfo": { "trackingNumber": code } }
            ]
        });

        let response = self
            .http
            .post(format!("{}/track/v1/trackingnumbers", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LookupError::Request {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(status_error("FedEx", response).await);
        }

        let payload: Value = response.json().await.map_err(|e| LookupError::Request {
            message: format!("invalid FedEx response: {}", e),
        })?;
        parse_track_response(&payload)
    }
}

/// Extract the delivery estimate from a FedEx track response
///
/// Tries the estimated delivery window end, then the `ESTIMATED_DELIVERY`
/// entry of `dateAndTimes`, then the standard transit window end. A package
/// count, when reported, is attached to the date.
pub fn parse_track_response(payload: &Value) -> Result<EstimateResult, LookupError> {
    let result = &payload["output"]["completeTrackResults"][0]["trackResults"][0];
    if result.is_null() {
        return Ok(EstimateResult::NoData);
    }
    if let Some(message) = result["error"]["message"].as_str() {
        log::debug!("FedEx reported no track result: {}", message);
        return Ok(EstimateResult::NoData);
    }

    let estimated = result["dateAndTimes"].as_array().and_then(|entries| {
        entries
            .iter()
            .find(|entry| entry["type"].as_str() == Some("ESTIMATED_DELIVERY"))
            .and_then(|entry| entry["dateTime"].as_str())
    });

    let raw = non_blank(&result["estimatedDeliveryTimeWindow"]["window"]["ends"])
        .or(estimated.filter(|s| !s.trim().is_empty()))
        .or_else(|| non_blank(&result["standardTransitTimeWindow"]["window"]["ends"]));

    let Some(raw) = raw else {
        return Ok(EstimateResult::NoData);
    };

    let date = parse_estimate_date(raw).ok_or_else(|| LookupError::UnparseableDate {
        value: raw.to_string(),
    })?;

    let count = match &result["packageDetails"]["count"] {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    Ok(match count {
        Some(count) => EstimateResult::DateWithCount(date, count),
        None => EstimateResult::Date(date),
    })
}

fn non_blank(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}
