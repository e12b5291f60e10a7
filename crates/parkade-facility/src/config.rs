use anyhow::{anyhow, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration. Defaults are overridden by `parkade.toml` and then
/// by `PARKADE_`-prefixed environment variables (`PARKADE_PAYMENT__MAX_RETRY`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FacilityConfig {
    /// Directory holding the flat-file JSON store.
    pub data_dir: PathBuf,
    pub payment: PaymentSettings,
    pub membership: MembershipSettings,
    pub scanner: ScannerSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentSettings {
    pub max_retry: u32,
    pub attempt_timeout_secs: u64,
    pub retry_backoff_ms: u64,
}

impl PaymentSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            max_retry: 3,
            attempt_timeout_secs: 5,
            retry_backoff_ms: 300,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MembershipSettings {
    /// Extensions are allowed at most this many days before expiry.
    pub renewal_window_days: i64,
    pub attempt_timeout_secs: u64,
}

impl MembershipSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            renewal_window_days: 7,
            attempt_timeout_secs: 5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScannerSettings {
    pub interval_secs: u64,
}

impl ScannerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            payment: PaymentSettings::default(),
            membership: MembershipSettings::default(),
            scanner: ScannerSettings::default(),
        }
    }
}

impl FacilityConfig {
    pub fn load(path_override: Option<PathBuf>) -> Result<Self> {
        let default_config = FacilityConfig::default();
        let mut figment = Figment::from(Serialized::defaults(default_config));

        if let Some(path) = path_override {
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
            }
        } else {
            let default_path = PathBuf::from("parkade.toml");
            if default_path.exists() {
                figment = figment.merge(Toml::file(default_path));
            }
        }

        figment = figment.merge(Env::prefixed("PARKADE_").split("__"));

        figment
            .extract()
            .map_err(|e| anyhow!("Configuration error: {}", e))
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = FacilityConfig::default();
        assert_eq!(config.payment.max_retry, 3);
        assert_eq!(config.payment.attempt_timeout(), Duration::from_secs(5));
        assert_eq!(config.payment.retry_backoff(), Duration::from_millis(300));
        assert_eq!(config.membership.renewal_window_days, 7);
    }

    #[test]
    fn toml_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "parkade.toml",
                r#"
                data_dir = "/var/lib/parkade"

                [payment]
                max_retry = 5
                attempt_timeout_secs = 2
                retry_backoff_ms = 100
                "#,
            )?;
            let config = FacilityConfig::load(Some(PathBuf::from("parkade.toml"))).unwrap();
            assert_eq!(config.payment.max_retry, 5);
            assert_eq!(config.data_dir, PathBuf::from("/var/lib/parkade"));
            // Untouched sections keep their defaults.
            assert_eq!(config.membership.renewal_window_days, 7);
            Ok(())
        });
    }
}
