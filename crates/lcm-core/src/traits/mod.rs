//! Collaborator traits for the license state subsystem
//!
//! The core only talks to its environment through these interfaces.
//!
//! - [`Clock`]: Current instant for time-window rules
//! - [`FileSystem`]: File access used by the configuration store
//! - [`LicenseKeyParser`]: Turns a raw license key into registration data
//! - [`ConfigurationFile`]: A record type persisted by the configuration store

pub mod clock;
pub mod configuration_file;
pub mod file_system;
pub mod license_parser;

pub use clock::{Clock, SystemClock};
pub use configuration_file::ConfigurationFile;
pub use file_system::{FileEntry, FileSystem};
pub use license_parser::LicenseKeyParser;
