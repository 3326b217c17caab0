//! Command handlers and the setup they share

pub mod convert_dates;
pub mod diff;
pub mod profiles;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::resilience::ConcurrencyLimiter;
use crate::api::zoho::{FileFeed, SourceFeed, ZohoFeed};
use crate::api::CarrierRegistry;
use crate::config::{Config, Credentials, RunConfig};
use crate::sync::enrich::Enricher;
use crate::sync::normalize::SourceProfile;
use crate::sync::CycleTables;

/// One sheet to sync: its run settings and resolved profile
pub struct SyncTarget {
    pub run: RunConfig,
    pub profile: SourceProfile,
}

impl SyncTarget {
    fn resolve(run: RunConfig) -> Result<Self> {
        let Some(profile) = SourceProfile::builtin(&run.profile) else {
            anyhow::bail!(
                "Unknown profile '{}'. Run 'trackline profiles' to list them",
                run.profile
            );
        };
        Ok(Self { run, profile })
    }

    pub fn label(&self) -> String {
        format!("{} v{}", self.profile.name, self.profile.version)
    }

    pub fn tables(&self) -> CycleTables {
        CycleTables {
            view: self.run.view.clone(),
            active: self.run.active_table.clone(),
            archive: self.run.archive_table.clone(),
        }
    }

    /// Archive markers from the config, falling back to the profile's
    pub fn archive_markers(&self) -> &[String] {
        self.run
            .archive_markers
            .as_deref()
            .unwrap_or(&self.profile.archive_markers)
    }
}

/// Configuration and credentials shared by every command
pub struct Session {
    pub config: Config,
    pub credentials: Credentials,
}

impl Session {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;
        let credentials = Credentials::load(config.credentials_path.as_deref())
            .context("Failed to load credentials")?;
        Ok(Self {
            config,
            credentials,
        })
    }

    /// The `[source]`/`[store]` run, optionally with another profile
    pub fn target(&self, profile: Option<&str>) -> Result<SyncTarget> {
        SyncTarget::resolve(self.config.primary_run(profile))
    }

    /// Every `[[runs]]` entry, in config order
    pub fn all_targets(&self) -> Result<Vec<SyncTarget>> {
        if self.config.runs.is_empty() {
            anyhow::bail!("No [[runs]] entries in the configuration");
        }
        self.config
            .runs
            .iter()
            .cloned()
            .map(SyncTarget::resolve)
            .collect()
    }

    /// Saved export file when configured, else the live analytics export
    pub fn feed(&self, target: &SyncTarget) -> Result<Box<dyn SourceFeed>> {
        if let Some(path) = &target.run.file {
            return Ok(Box::new(FileFeed::new(path)));
        }

        let params = self
            .credentials
            .zoho()
            .context("The analytics export needs zoho_params credentials")?;
        let feed = ZohoFeed::new(&self.config.source, params.clone())
            .context("Failed to set up the analytics export client")?;
        Ok(Box::new(feed))
    }

    pub fn enricher(&self) -> Result<Enricher> {
        let registry = CarrierRegistry::from_config(&self.config.carriers, &self.credentials)
            .context("Failed to set up carrier clients")?;
        if registry.configured().is_empty() {
            log::warn!("No carrier credentials configured; every lookup will report an error");
        }

        let limiter = ConcurrencyLimiter::new(self.config.concurrency.clone());
        Ok(Enricher::new(Arc::new(registry), limiter))
    }
}
