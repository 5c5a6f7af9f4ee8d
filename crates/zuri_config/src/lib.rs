//! Parsing and validation of `zuri.toml` workspace configuration.
//!
//! [`load_config`] reads the file into a [`WorkspaceConfig`];
//! [`resolve_settings`] turns it into [`Settings`] with absolute paths and
//! parsed durations, ready to hand to the compiler and cache.

#![warn(missing_docs)]

pub mod duration;
pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use duration::{parse_duration, HumanDuration};
pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve_settings, CacheSettings, RetrySettings, Settings};
pub use types::*;
