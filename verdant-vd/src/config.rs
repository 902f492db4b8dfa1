//! Service configuration for verdant-vd
//!
//! Loaded from `verdant-vd.toml` in the root folder with environment
//! variable overrides; every field has a compiled default so the service
//! starts on an empty root folder.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Runtime configuration for the venue discovery service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,
    /// Days without a scraper re-confirmation before a discovered venue
    /// is eligible for the staleness sweep
    pub stale_after_days: i64,
    /// Minutes between automatic staleness sweeps
    pub sweep_interval_minutes: u64,
    /// Promote immediately after a successful Verify
    pub auto_promote: bool,
    /// SKU assigned when a generic brand keyword matches but no specific
    /// product keyword does
    pub fallback_sku: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 5741,
            stale_after_days: 30,
            sweep_interval_minutes: 60,
            auto_promote: false,
            fallback_sku: "planted.chicken".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration: TOML file (if present) then environment overrides.
    pub fn load(root_folder: &Path) -> Self {
        let mut config = Self::from_toml(root_folder).unwrap_or_default();
        config.apply_env_overrides();
        config
    }

    fn from_toml(root_folder: &Path) -> Option<Self> {
        let path = root_folder.join("verdant-vd.toml");
        let content = std::fs::read_to_string(&path).ok()?;
        match toml::from_str::<ServiceConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Ignoring invalid config file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("VERDANT_VD_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!("Ignoring invalid VERDANT_VD_PORT: {}", port),
            }
        }
        if let Ok(days) = std::env::var("VERDANT_VD_STALE_AFTER_DAYS") {
            match days.parse() {
                Ok(days) => self.stale_after_days = days,
                Err(_) => warn!("Ignoring invalid VERDANT_VD_STALE_AFTER_DAYS: {}", days),
            }
        }
        if let Ok(auto) = std::env::var("VERDANT_VD_AUTO_PROMOTE") {
            self.auto_promote = matches!(auto.as_str(), "1" | "true" | "yes");
        }
        if let Ok(sku) = std::env::var("VERDANT_VD_FALLBACK_SKU") {
            if !sku.trim().is_empty() {
                self.fallback_sku = sku;
            }
        }
    }
}
