//! Configuration types for the license state subsystem
//!
//! Every field has a serde default so a partial configuration (or none at all)
//! deserializes into a working setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main LCM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding configuration records and lock files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Product name stamped on self-issued licenses
    #[serde(default = "default_product")]
    pub product: String,

    /// Retry policy for transient file errors
    #[serde(default)]
    pub retry: RetryPolicy,

    /// License tier time windows
    #[serde(default)]
    pub licensing: LicensingConfig,
}

impl CoreConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            data_dir: default_data_dir(),
            product: default_product(),
            retry: RetryPolicy::default(),
            licensing: LicensingConfig::default(),
        }
    }

    /// Create a configuration rooted at the given data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::new()
        }
    }

    /// Directory holding the named lock files
    pub fn lock_dir(&self) -> PathBuf {
        self.data_dir.join("locks")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(crate::Error::config("Data directory cannot be empty"));
        }

        if self.product.trim().is_empty() {
            return Err(crate::Error::config("Product name cannot be empty"));
        }

        self.retry.validate()?;
        self.licensing.validate()?;

        Ok(())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry policy shared by configuration reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Number of retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay between attempts (in milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 0,
        }
    }

    /// Delay between two attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validate the retry policy
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_retries must be at most 10, got {}",
                self.max_retries
            )));
        }
        if self.retry_delay_ms > 5_000 {
            return Err(crate::Error::config(format!(
                "retry_delay_ms must be at most 5000, got {}",
                self.retry_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Time windows of the self-issued license tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensingConfig {
    /// Length of an evaluation license on release builds (in days)
    #[serde(default = "default_evaluation_period_days")]
    pub evaluation_period_days: u32,

    /// Length of an evaluation license on prerelease builds (in days)
    #[serde(default = "default_prerelease_evaluation_period_days")]
    pub prerelease_evaluation_period_days: u32,

    /// Minimum time between the end of one evaluation and the start of the next (in days)
    #[serde(default = "default_no_evaluation_period_days")]
    pub no_evaluation_period_days: u32,

    /// Whether the running build is a prerelease
    #[serde(default)]
    pub prerelease: bool,
}

impl LicensingConfig {
    /// Evaluation length for the current build flavor
    pub fn evaluation_period(&self) -> chrono::Duration {
        let days = if self.prerelease {
            self.prerelease_evaluation_period_days
        } else {
            self.evaluation_period_days
        };
        chrono::Duration::days(i64::from(days))
    }

    /// Cooldown between evaluations
    pub fn no_evaluation_period(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.no_evaluation_period_days))
    }

    /// Validate the licensing windows
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.evaluation_period_days == 0 || self.prerelease_evaluation_period_days == 0 {
            return Err(crate::Error::config("Evaluation period must be > 0 days"));
        }
        Ok(())
    }
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            evaluation_period_days: default_evaluation_period_days(),
            prerelease_evaluation_period_days: default_prerelease_evaluation_period_days(),
            no_evaluation_period_days: default_no_evaluation_period_days(),
            prerelease: false,
        }
    }
}

/// Per-user application data directory, falling back to the working directory
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lcm")
}

fn default_product() -> String {
    "LCM".to_string()
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_evaluation_period_days() -> u32 {
    45
}

fn default_prerelease_evaluation_period_days() -> u32 {
    30
}

fn default_no_evaluation_period_days() -> u32 {
    120
}
