//! License registration engine
//!
//! The engine owns the eligibility rules of the self-issued tiers. It holds no
//! state of its own: every operation reads the licensing record, decides,
//! and writes back through the [`ConfigurationStore`].
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │  LicenseRegistrationEngine   │
//!            └──────────────────────────────┘
//!                           │
//!     ┌───────────────┬─────┴─────────┬──────────────────┐
//!     │               │               │                  │
//!     ▼               ▼               ▼                  ▼
//! ┌──────────┐ ┌──────────────┐ ┌──────────┐ ┌──────────────────┐
//! │  Clock   │ │ ProcessLocks │ │  Store   │ │ LicenseKeyParser │
//! │  (now)   │ │ (Evaluation) │ │ (r/m/w)  │ │  (raw key → data)│
//! └──────────┘ └──────────────┘ └──────────┘ └──────────────────┘
//! ```
//!
//! ## Evaluation Flow
//!
//! 1. Acquire the `Evaluation` lock
//! 2. Load the licensing record
//! 3. Evaluation already started today → success, no write
//! 4. Unexpired license in effect → reject
//! 5. Within cooldown of the last evaluation → reject
//! 6. Store a new evaluation, remember its start date
//! 7. Release the lock
//!
//! Free, Essentials and signed-key registration do not take the lock. Two
//! processes registering at the same moment can lose one of the writes.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::CoreConfig;
use crate::error::Result;
use crate::licensing::data::{
    LicenseRegistrationData, LicenseStatus, LicenseType, LicensingConfiguration, Registration,
    Rejection,
};
use crate::licensing::key::{UnsignedKeyParser, to_unsigned_key};
use crate::lock::{EVALUATION_LOCK, ProcessLocks};
use crate::store::ConfigurationStore;
use crate::traits::{Clock, LicenseKeyParser, SystemClock};

/// License registration engine
///
/// ## Threading
///
/// The engine is `Send + Sync` and can be shared behind an `Arc`. Concurrent
/// evaluation attempts, in this process or in others, are serialized by the
/// `Evaluation` named lock.
pub struct LicenseRegistrationEngine {
    /// Record persistence
    store: Arc<ConfigurationStore>,

    /// Machine-wide named locks
    locks: Arc<ProcessLocks>,

    /// Source of the current instant
    clock: Arc<dyn Clock>,

    /// Raw key → registration data
    parser: Arc<dyn LicenseKeyParser>,

    /// Product stamped on self-issued licenses
    product: String,

    /// Length of an evaluation license
    evaluation_period: Duration,

    /// Minimum gap between the end of an evaluation and the next start
    no_evaluation_period: Duration,
}

impl LicenseRegistrationEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `store`: Configuration store holding the licensing record
    /// - `locks`: Named lock factory
    /// - `clock`: Clock implementation
    /// - `parser`: License key parser
    /// - `config`: Core configuration (product name and time windows)
    pub fn new(
        store: Arc<ConfigurationStore>,
        locks: Arc<ProcessLocks>,
        clock: Arc<dyn Clock>,
        parser: Arc<dyn LicenseKeyParser>,
        config: &CoreConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store,
            locks,
            clock,
            parser,
            product: config.product.clone(),
            evaluation_period: config.licensing.evaluation_period(),
            no_evaluation_period: config.licensing.no_evaluation_period(),
        })
    }

    /// Create an engine on the real file system, system clock and unsigned key parser
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        Self::new(
            Arc::new(ConfigurationStore::from_config(config)),
            Arc::new(ProcessLocks::new(config.lock_dir())),
            Arc::new(SystemClock),
            Arc::new(UnsignedKeyParser),
            config,
        )
    }

    /// Configuration store used by the engine
    pub fn store(&self) -> &Arc<ConfigurationStore> {
        &self.store
    }

    /// Named lock factory used by the engine
    pub fn locks(&self) -> &Arc<ProcessLocks> {
        &self.locks
    }

    /// Clock used by the engine
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Start an evaluation license
    ///
    /// # Returns
    ///
    /// - `Ok(Registration::Registered)`: A new evaluation was stored
    /// - `Ok(Registration::AlreadyRegistered)`: An evaluation started today already
    /// - `Ok(Registration::Rejected)`: Conflicting license, cooldown, or the write failed
    /// - `Err(Error)`: The lock or the data directory could not be created
    pub async fn try_activate_license(&self) -> Result<Registration> {
        let _guard = self.locks.acquire(EVALUATION_LOCK).await?;

        let now = self.clock.now();
        let configuration = self.store.get::<LicensingConfiguration>().await;

        if let Some(current) = &configuration.current {
            if current.license_type == LicenseType::Evaluation
                && current.valid_from.date_naive() == now.date_naive()
            {
                debug!("Evaluation already started today, nothing to do");
                return Ok(Registration::AlreadyRegistered(current.clone()));
            }

            if !current.is_expired(now) {
                info!(
                    "Cannot start an evaluation: a {} license is in effect",
                    current.license_type
                );
                return Ok(Registration::Rejected(Rejection::ConflictingLicense {
                    license_type: current.license_type,
                }));
            }
        }

        if let Some(eligible_after) = self.evaluation_eligible_after(&configuration)
            && now <= eligible_after
        {
            info!(
                "Cannot start an evaluation before {} (last evaluation started {:?})",
                eligible_after, configuration.last_evaluation_start_date
            );
            return Ok(Registration::Rejected(Rejection::CoolingDown {
                eligible_after,
            }));
        }

        let data = LicenseRegistrationData::self_issued(
            LicenseType::Evaluation,
            &self.product,
            now,
            Some(now + self.evaluation_period),
        );
        let key = to_unsigned_key(&data)?;

        let written = self
            .store
            .update::<LicensingConfiguration, _>(|current| {
                let mut updated = current.clone();
                updated.licenses = self.keys_without_tier(&current.licenses, LicenseType::Evaluation);
                updated.licenses.push(key);
                updated.current = Some(data.clone());
                updated.last_evaluation_start_date = Some(now);
                Some(updated)
            })
            .await?;

        if !written {
            return Ok(Registration::Rejected(Rejection::Failed(
                "the licensing file could not be written".to_string(),
            )));
        }

        info!(
            "Evaluation license started, valid until {}",
            now + self.evaluation_period
        );
        Ok(Registration::Registered(data))
    }

    /// Register a Free or Essentials license
    ///
    /// Idempotent: if a license of `license_type` is already stored, nothing
    /// is written. Errors never escape; they are logged and reported as
    /// [`Rejection::Failed`].
    pub async fn try_register_license(&self, license_type: LicenseType) -> Registration {
        if !matches!(license_type, LicenseType::Free | LicenseType::Essentials) {
            warn!("{} licenses cannot be self-registered", license_type);
            return Registration::Rejected(Rejection::UnsupportedTier(license_type));
        }

        match self.register_tier(license_type).await {
            Ok(registration) => registration,
            Err(e) => {
                error!("Failed to register {} license: {}", license_type, e);
                Registration::Rejected(Rejection::Failed(e.to_string()))
            }
        }
    }

    /// Register a license from a raw key
    ///
    /// The key replaces any stored key with the same identifier and becomes
    /// the license in effect. Errors never escape, as for
    /// [`Self::try_register_license`].
    pub async fn register_license_key(&self, key: &str) -> Registration {
        let data = match self.parser.parse(key) {
            Ok(data) => data,
            Err(e) => {
                warn!("Rejected license key: {}", e);
                return Registration::Rejected(Rejection::InvalidLicenseKey(e.to_string()));
            }
        };

        match self.register_key(key.trim(), data).await {
            Ok(registration) => registration,
            Err(e) => {
                error!("Failed to register license key: {}", e);
                Registration::Rejected(Rejection::Failed(e.to_string()))
            }
        }
    }

    /// Remove the license in effect
    ///
    /// The evaluation start date is kept, so the cooldown still applies to
    /// the next evaluation.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A license was removed
    /// - `Ok(false)`: No license was in effect, or the write was abandoned
    pub async fn remove_license(&self) -> Result<bool> {
        let removed = self
            .store
            .update::<LicensingConfiguration, _>(|current| {
                let existing = current.current.as_ref()?;
                let mut updated = current.clone();
                updated
                    .licenses
                    .retain(|key| !self.key_matches(key, |data| data.unique_id == existing.unique_id));
                updated.current = None;
                Some(updated)
            })
            .await?;

        if removed {
            info!("License removed");
        } else {
            debug!("No license to remove");
        }
        Ok(removed)
    }

    /// Current licensing state, including the evaluation cooldown
    pub async fn license_status(&self) -> LicenseStatus {
        let now = self.clock.now();
        let configuration = self.store.get::<LicensingConfiguration>().await;

        LicenseStatus {
            is_expired: configuration
                .current
                .as_ref()
                .is_some_and(|current| current.is_expired(now)),
            evaluation_eligible_after: self
                .evaluation_eligible_after(&configuration)
                .filter(|eligible_after| now <= *eligible_after),
            current: configuration.current,
        }
    }

    async fn register_tier(&self, license_type: LicenseType) -> Result<Registration> {
        let now = self.clock.now();
        let configuration = self.store.get::<LicensingConfiguration>().await;

        if let Some(existing) = self.find_license(&configuration, license_type) {
            debug!("{} license already registered", license_type);
            return Ok(Registration::AlreadyRegistered(existing));
        }

        let data = LicenseRegistrationData::self_issued(license_type, &self.product, now, None);
        let key = to_unsigned_key(&data)?;

        let written = self
            .store
            .update::<LicensingConfiguration, _>(|current| {
                let mut updated = current.clone();
                updated.licenses = self.keys_without_tier(&current.licenses, license_type);
                updated.licenses.push(key);
                updated.current = Some(data.clone());
                Some(updated)
            })
            .await?;

        if !written {
            return Ok(Registration::Rejected(Rejection::Failed(
                "the licensing file could not be written".to_string(),
            )));
        }

        info!("{} license registered", license_type);
        Ok(Registration::Registered(data))
    }

    async fn register_key(&self, key: &str, data: LicenseRegistrationData) -> Result<Registration> {
        let configuration = self.store.get::<LicensingConfiguration>().await;

        if configuration.licenses.iter().any(|stored| stored.trim() == key)
            && configuration.current.as_ref() == Some(&data)
        {
            debug!("License key already registered");
            return Ok(Registration::AlreadyRegistered(data));
        }

        let written = self
            .store
            .update::<LicensingConfiguration, _>(|current| {
                let mut updated = current.clone();
                updated
                    .licenses
                    .retain(|stored| !self.key_matches(stored, |d| d.unique_id == data.unique_id));
                updated.licenses.push(key.to_string());
                updated.current = Some(data.clone());
                Some(updated)
            })
            .await?;

        if !written {
            return Ok(Registration::Rejected(Rejection::Failed(
                "the licensing file could not be written".to_string(),
            )));
        }

        info!("{} license key registered", data.license_type);
        Ok(Registration::Registered(data))
    }

    /// End of the cooldown after the last evaluation, if one was ever started
    fn evaluation_eligible_after(
        &self,
        configuration: &LicensingConfiguration,
    ) -> Option<DateTime<Utc>> {
        configuration
            .last_evaluation_start_date
            .map(|start| start + self.no_evaluation_period + self.evaluation_period)
    }

    /// First stored license of the given tier
    fn find_license(
        &self,
        configuration: &LicensingConfiguration,
        license_type: LicenseType,
    ) -> Option<LicenseRegistrationData> {
        configuration
            .licenses
            .iter()
            .filter_map(|key| self.parser.parse(key).ok())
            .find(|data| data.license_type == license_type)
    }

    /// Stored keys minus those of the given tier
    ///
    /// Keys that cannot be parsed are kept; they may belong to a newer build.
    fn keys_without_tier(&self, keys: &[String], license_type: LicenseType) -> Vec<String> {
        keys.iter()
            .filter(|key| !self.key_matches(key, |data| data.license_type == license_type))
            .cloned()
            .collect()
    }

    fn key_matches(&self, key: &str, predicate: impl Fn(&LicenseRegistrationData) -> bool) -> bool {
        self.parser.parse(key).is_ok_and(|data| predicate(&data))
    }
}
