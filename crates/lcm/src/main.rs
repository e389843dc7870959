// # lcm - License state command
//
// Thin front end over lcm-core. It reads configuration from the environment,
// runs exactly one license operation and reports the outcome through its
// exit code. All licensing rules live in lcm-core.
//
// ## Commands
//
// - `status`: Print the license in effect and the evaluation cooldown
// - `try-evaluation`: Start an evaluation license
// - `register-free`: Register a Free license
// - `register-essentials`: Register an Essentials license
// - `register <key>`: Register a license key
// - `unregister`: Remove the license in effect
// - `welcome`: Run first-start setup (once per user)
// - `config-path`: Print the licensing file location
//
// ## Configuration
//
// - `LCM_DATA_DIR`: Data directory (default: per-user data dir + `/lcm`)
// - `LCM_PRODUCT`: Product name stamped on self-issued licenses
// - `LCM_PRERELEASE`: `true` on prerelease builds (shorter evaluation)
// - `LCM_MAX_RETRIES`: Retries of transient file errors (0-10)
// - `LCM_RETRY_DELAY_MS`: Delay between retries (1-5000 ms)
// - `LCM_LOG_LEVEL`: trace, debug, info, warn, error (default: warn)
//
// Logs go to stderr; command output goes to stdout.

use anyhow::Result;
use lcm_core::licensing::LicensingConfiguration;
use lcm_core::{
    ConfigurationStore, CoreConfig, LicenseRegistrationEngine, LicenseStatus, LicenseType,
    Registration, TaskTracker, WelcomeService,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Temp files older than this are leftovers of crashed writers
const STALE_TEMP_FILE_AGE: Duration = Duration::from_secs(60 * 60);

/// Exit codes for the possible outcomes of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LcmExitCode {
    /// The operation succeeded
    Success = 0,
    /// Configuration error or unknown command
    ConfigError = 1,
    /// Unexpected failure (lock, data directory)
    RuntimeError = 2,
    /// The licensing rules refused the operation
    Rejected = 3,
}

impl From<LcmExitCode> for ExitCode {
    fn from(code: LcmExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// A single license operation
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    TryEvaluation,
    Register(LicenseType),
    RegisterKey(String),
    Unregister,
    Welcome,
    ConfigPath,
}

impl Command {
    /// Parse the command words following the program name
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let Some(word) = args.next() else {
            anyhow::bail!("No command given. {}", USAGE);
        };

        let command = match word.as_str() {
            "status" => Self::Status,
            "try-evaluation" => Self::TryEvaluation,
            "register-free" => Self::Register(LicenseType::Free),
            "register-essentials" => Self::Register(LicenseType::Essentials),
            "register" => match args.next() {
                Some(key) if !key.trim().is_empty() => Self::RegisterKey(key),
                _ => anyhow::bail!("`register` needs a license key. {}", USAGE),
            },
            "unregister" => Self::Unregister,
            "welcome" => Self::Welcome,
            "config-path" => Self::ConfigPath,
            other => anyhow::bail!("Unknown command '{}'. {}", other, USAGE),
        };

        if let Some(extra) = args.next() {
            anyhow::bail!("Unexpected argument '{}'. {}", extra, USAGE);
        }
        Ok(command)
    }
}

const USAGE: &str = "Usage: lcm <status|try-evaluation|register-free|register-essentials|register <key>|unregister|welcome|config-path>";

/// Application configuration
struct Config {
    data_dir: Option<String>,
    product: Option<String>,
    prerelease: Option<String>,
    max_retries: Option<String>,
    retry_delay_ms: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self {
            data_dir: env::var("LCM_DATA_DIR").ok(),
            product: env::var("LCM_PRODUCT").ok(),
            prerelease: env::var("LCM_PRERELEASE").ok(),
            max_retries: env::var("LCM_MAX_RETRIES").ok(),
            retry_delay_ms: env::var("LCM_RETRY_DELAY_MS").ok(),
            log_level: env::var("LCM_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        }
    }

    /// Validate the environment and turn it into a core configuration
    fn into_core(self) -> Result<CoreConfig> {
        let mut core = CoreConfig::new();

        if let Some(data_dir) = self.data_dir {
            if data_dir.trim().is_empty() {
                anyhow::bail!("LCM_DATA_DIR cannot be empty when set");
            }
            core.data_dir = PathBuf::from(data_dir);
        }

        if let Some(product) = self.product {
            core.product = product;
        }

        if let Some(prerelease) = self.prerelease {
            core.licensing.prerelease = match prerelease.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => anyhow::bail!("LCM_PRERELEASE must be true or false. Got: {}", other),
            };
        }

        if let Some(max_retries) = self.max_retries {
            let max_retries: usize = max_retries.parse().map_err(|_| {
                anyhow::anyhow!("LCM_MAX_RETRIES must be a number. Got: {}", max_retries)
            })?;
            if max_retries > 10 {
                anyhow::bail!(
                    "LCM_MAX_RETRIES must be between 0 and 10. Got: {}",
                    max_retries
                );
            }
            core.retry.max_retries = max_retries;
        }

        if let Some(retry_delay_ms) = self.retry_delay_ms {
            let retry_delay_ms: u64 = retry_delay_ms.parse().map_err(|_| {
                anyhow::anyhow!(
                    "LCM_RETRY_DELAY_MS must be a number. Got: {}",
                    retry_delay_ms
                )
            })?;
            if !(1..=5000).contains(&retry_delay_ms) {
                anyhow::bail!(
                    "LCM_RETRY_DELAY_MS must be between 1 and 5000. Got: {}",
                    retry_delay_ms
                );
            }
            core.retry.retry_delay_ms = retry_delay_ms;
        }

        core.validate()?;
        Ok(core)
    }

    fn log_level(&self) -> Result<Level> {
        Ok(match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            other => anyhow::bail!(
                "LCM_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        })
    }
}

fn main() -> ExitCode {
    let command = match Command::parse(env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            return LcmExitCode::ConfigError.into();
        }
    };

    let config = Config::from_env();
    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return LcmExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LcmExitCode::ConfigError.into();
    }

    let core = match config.into_core() {
        Ok(core) => core,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return LcmExitCode::ConfigError.into();
        }
    };

    debug!("Data directory: {}", core.data_dir.display());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LcmExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run(command, &core).await {
            Ok(code) => code,
            Err(e) => {
                error!("Command failed: {}", e);
                eprintln!("Error: {}", e);
                LcmExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run one command, with the temp-file sweep in the background
async fn run(command: Command, core: &CoreConfig) -> Result<LcmExitCode> {
    let engine = Arc::new(LicenseRegistrationEngine::from_config(core)?);
    let tracker = TaskTracker::current()?;

    let store = Arc::clone(engine.store());
    tracker.enqueue(async move {
        store
            .remove_stale_temp_files(STALE_TEMP_FILE_AGE)
            .await
            .map(|_| ())
    });

    let code = execute(command, &engine).await;

    tracker.when_no_pending_task().await;
    code
}

async fn execute(command: Command, engine: &Arc<LicenseRegistrationEngine>) -> Result<LcmExitCode> {
    let code = match command {
        Command::Status => {
            print_status(&engine.license_status().await);
            LcmExitCode::Success
        }
        Command::TryEvaluation => report(engine.try_activate_license().await?),
        Command::Register(license_type) => report(engine.try_register_license(license_type).await),
        Command::RegisterKey(key) => report(engine.register_license_key(&key).await),
        Command::Unregister => {
            if engine.remove_license().await? {
                println!("License removed");
            } else {
                println!("No license to remove");
            }
            LcmExitCode::Success
        }
        Command::Welcome => {
            let performed = WelcomeService::new(Arc::clone(engine))
                .execute_first_start_setup()
                .await?;
            if performed {
                println!("First-start setup completed");
            } else {
                println!("First-start setup already done");
            }
            LcmExitCode::Success
        }
        Command::ConfigPath => {
            println!(
                "{}",
                engine.store().file_path::<LicensingConfiguration>().display()
            );
            LcmExitCode::Success
        }
    };
    Ok(code)
}

/// Print the outcome of a registration and map it to an exit code
fn report(registration: Registration) -> LcmExitCode {
    match registration {
        Registration::Registered(data) => {
            info!("Registered {} license {}", data.license_type, data.unique_id);
            println!("{} license registered", data.license_type);
            LcmExitCode::Success
        }
        Registration::AlreadyRegistered(data) => {
            println!("{} license already registered", data.license_type);
            LcmExitCode::Success
        }
        Registration::Rejected(rejection) => {
            eprintln!("Rejected: {}", rejection);
            LcmExitCode::Rejected
        }
    }
}

fn print_status(status: &LicenseStatus) {
    match &status.current {
        Some(current) => {
            println!("License:  {}", current.license_type);
            println!("Product:  {}", current.product);
            println!("Valid:    from {}", current.valid_from);
            match current.valid_to {
                Some(valid_to) if status.is_expired => println!("Expired:  {}", valid_to),
                Some(valid_to) => println!("Expires:  {}", valid_to),
                None => println!("Expires:  never"),
            }
        }
        None => println!("License:  none"),
    }

    if let Some(eligible_after) = status.evaluation_eligible_after {
        println!("Next evaluation possible after {}", eligible_after);
    }
}
