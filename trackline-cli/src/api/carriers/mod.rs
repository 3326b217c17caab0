//! Carrier lookup adapters
//!
//! Each carrier speaks its own wire format behind [`TrackingClient`]; the
//! [`CarrierRegistry`] picks the adapter by carrier and is what the enricher
//! sees as its [`CarrierLookup`].

mod fedex;
mod ups;

pub use fedex::FedexClient;
pub use ups::UpsClient;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CarriersConfig, Credentials};
use crate::sync::enrich::CarrierLookup;
use crate::sync::error::LookupError;
use crate::sync::types::{Carrier, EstimateResult};

/// One carrier's tracking endpoint
#[async_trait]
pub trait TrackingClient: Send + Sync {
    async fn track(&self, code: &str) -> Result<EstimateResult, LookupError>;
}

/// Turn a non-success response into a lookup error, keeping a short body excerpt
pub(crate) async fn status_error(carrier: &str, response: reqwest::Response) -> LookupError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(120).collect();
    LookupError::Request {
        message: format!("{} returned {} {}", carrier, status.as_u16(), excerpt.trim())
            .trim_end()
            .to_string(),
    }
}

/// Dispatches lookups to the configured carrier adapters
#[derive(Default)]
pub struct CarrierRegistry {
    fedex: Option<Box<dyn TrackingClient>>,
    ups: Option<Box<dyn TrackingClient>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every carrier that has credentials
    pub fn from_config(config: &CarriersConfig, credentials: &Credentials) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LookupError::Request {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        let mut registry = Self::new();
        if let Some(params) = &credentials.fedex_params {
            registry = registry.with_client(
                Carrier::FedEx,
                Box::new(FedexClient::new(http.clone(), &config.fedex_base_url, params.clone())),
            );
        }
        if let Some(params) = &credentials.ups_params {
            registry = registry.with_client(
                Carrier::Ups,
                Box::new(UpsClient::new(
                    http.clone(),
                    &config.ups_base_url,
                    &config.ups_token_url,
                    params.clone(),
                )),
            );
        }

        log::debug!("Carrier adapters configured: {:?}", registry.configured());
        Ok(registry)
    }

    pub fn with_client(mut self, carrier: Carrier, client: Box<dyn TrackingClient>) -> Self {
        match carrier {
            Carrier::FedEx => self.fedex = Some(client),
            Carrier::Ups => self.ups = Some(client),
        }
        self
    }

    /// Carriers that have an adapter
    pub fn configured(&self) -> Vec<Carrier> {
        [
            (Carrier::FedEx, self.fedex.is_some()),
            (Carrier::Ups, self.ups.is_some()),
        ]
        .into_iter()
        .filter_map(|(carrier, present)| present.then_some(carrier))
        .collect()
    }
}

#[async_trait]
impl CarrierLookup for CarrierRegistry {
    async fn lookup(&self, carrier: Carrier, code: &str) -> Result<EstimateResult, LookupError> {
        let client = match carrier {
            Carrier::FedEx => self.fedex.as_ref(),
            Carrier::Ups => self.ups.as_ref(),
        };
        match client {
            Some(client) => client.track(code).await,
            None => Err(LookupError::Unconfigured {
                carrier: carrier.label().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FedexParams;
    use chrono::NaiveDate;

    struct Fixed(EstimateResult);

    #[async_trait]
    impl TrackingClient for Fixed {
        async fn track(&self, _code: &str) -> Result<EstimateResult, LookupError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_carrier() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let registry = CarrierRegistry::new()
            .with_client(Carrier::Ups, Box::new(Fixed(EstimateResult::Date(date))));

        assert_eq!(
            registry.lookup(Carrier::Ups, "1Z").await.unwrap(),
            EstimateResult::Date(date)
        );
        assert_eq!(
            registry.lookup(Carrier::FedEx, "7946").await.unwrap_err(),
            LookupError::Unconfigured {
                carrier: "FEDEX".to_string()
            }
        );
    }

    #[test]
    fn test_from_config_only_credentialed_carriers() {
        let credentials = Credentials {
            fedex_params: Some(FedexParams {
                client_id: "id".into(),
                client_secret: "secret".into(),
            }),
            ..Credentials::default()
        };
        let registry = CarrierRegistry::from_config(&CarriersConfig::default(), &credentials).unwrap();
        assert_eq!(registry.configured(), vec![Carrier::FedEx]);
    }
}
