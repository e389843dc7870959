// # lcm-core
//
// Local, crash-safe license state shared by every process of a user.
//
// ## Architecture Overview
//
// - **ConfigurationStore**: Typed JSON records under the data directory
// - **ProcessLocks**: Machine-wide named locks between independent processes
// - **LicenseRegistrationEngine**: Eligibility rules of the license tiers
// - **WelcomeService**: One-time first-start setup
// - **TaskTracker**: Fire-and-forget background work with a drain barrier
//
// ## Design Principles
//
// 1. **File is the truth**: In-memory records are snapshots of the file on disk
// 2. **Degrade, don't crash**: Missing or corrupt configuration reads as defaults
// 3. **Opt-in atomicity**: `update` is optimistic; callers that need
//    cross-process atomicity hold a named lock
// 4. **Rules from the clock**: Time windows depend only on the injected `Clock`

pub mod config;
pub mod error;
pub mod licensing;
pub mod lock;
pub mod store;
pub mod tasks;
pub mod traits;

// Re-export core types for convenience
pub use config::{CoreConfig, LicensingConfig, RetryPolicy};
pub use error::{Error, Result};
pub use licensing::{
    LicenseRegistrationData, LicenseRegistrationEngine, LicenseStatus, LicenseType,
    LicensingConfiguration, Registration, Rejection, WelcomeService,
};
pub use lock::{NamedLockGuard, ProcessLocks};
pub use store::{ConfigurationStore, OsFileSystem};
pub use tasks::TaskTracker;
pub use traits::{Clock, ConfigurationFile, FileSystem, LicenseKeyParser, SystemClock};
