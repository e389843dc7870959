//! First-start setup
//!
//! The first process that runs for a user starts an evaluation (when no
//! license is stored yet) and records that setup happened. The `Welcome`
//! lock makes sure exactly one process does it, even when several tools
//! start at the same time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::licensing::LicensingConfiguration;
use crate::licensing::engine::LicenseRegistrationEngine;
use crate::lock::WELCOME_LOCK;
use crate::traits::ConfigurationFile;

/// Persisted first-start state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeConfiguration {
    /// Whether first-start setup still has to run
    #[serde(default = "default_is_first_start")]
    pub is_first_start: bool,

    /// When first-start setup ran
    #[serde(default)]
    pub first_start_time: Option<DateTime<Utc>>,

    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl Default for WelcomeConfiguration {
    fn default() -> Self {
        Self {
            is_first_start: default_is_first_start(),
            first_start_time: None,
            file_path: None,
        }
    }
}

impl ConfigurationFile for WelcomeConfiguration {
    const FILE_NAME: &'static str = "welcome.json";

    fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn set_file_path(&mut self, path: PathBuf) {
        self.file_path = Some(path);
    }
}

fn default_is_first_start() -> bool {
    true
}

/// Runs first-start setup once per user
pub struct WelcomeService {
    engine: Arc<LicenseRegistrationEngine>,
}

impl WelcomeService {
    /// Create a welcome service on top of a registration engine
    pub fn new(engine: Arc<LicenseRegistrationEngine>) -> Self {
        Self { engine }
    }

    /// Run first-start setup if no process has done it yet
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: This call performed the setup
    /// - `Ok(false)`: Setup had already been done
    /// - `Err(Error)`: A lock or the data directory could not be created
    pub async fn execute_first_start_setup(&self) -> Result<bool> {
        let _guard = self.engine.locks().acquire(WELCOME_LOCK).await?;
        let store = self.engine.store();

        let welcome = store.get::<WelcomeConfiguration>().await;
        if !welcome.is_first_start {
            debug!("First-start setup already done");
            return Ok(false);
        }

        let licensing = store.get::<LicensingConfiguration>().await;
        if licensing.current.is_none() {
            let registration = self.engine.try_activate_license().await?;
            if registration.is_success() {
                info!("Evaluation license started on first start");
            } else {
                info!("No evaluation started on first start: {:?}", registration);
            }
        }

        let now = self.engine.clock().now();
        store
            .update::<WelcomeConfiguration, _>(|current| {
                if !current.is_first_start {
                    return None;
                }
                let mut updated = current.clone();
                updated.is_first_start = false;
                updated.first_start_time = Some(now);
                Some(updated)
            })
            .await?;

        info!("First-start setup completed");
        Ok(true)
    }
}
