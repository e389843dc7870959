// # Configuration File Trait
//
// A record type that the `ConfigurationStore` persists as one JSON document.
//
// ## Requirements
//
// - `Default`: a missing or corrupt file yields the default value
// - `Serialize + DeserializeOwned`: implementations should not use
//   `deny_unknown_fields`, so files written by newer builds still load
// - `FILE_NAME`: deterministic file name under the data directory

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// A typed record stored in its own JSON file
pub trait ConfigurationFile:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// File name of the record under the data directory
    const FILE_NAME: &'static str;

    /// Path the value was loaded from, if it came from disk
    fn file_path(&self) -> Option<&Path>;

    /// Remember the path the value was loaded from
    ///
    /// The path is never serialized.
    fn set_file_path(&mut self, path: PathBuf);
}
