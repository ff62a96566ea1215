use std::path::PathBuf;

use crate::error::ConfigError;

/// Configuration for one traced run.
///
/// Mirrors the external option surface: an output path for the artifact
/// (mandatory), an optional module name substring, and optional
/// module-relative trigger offsets. The offsets are resolved to absolute
/// addresses only once the module base is known.
#[derive(Debug, Clone)]
pub struct Config {
    /// Destination for the raw hit-count artifact.
    pub output: PathBuf,
    /// Case-sensitive substring matched against loaded image names. `None`
    /// targets the process's main executable.
    pub module: Option<String>,
    /// Module-relative offset at which logging begins. Unset means logging
    /// starts immediately.
    pub start_offset: Option<u64>,
    /// Module-relative offset at which logging ends. Unset means logging
    /// never auto-stops.
    pub stop_offset: Option<u64>,
}

impl Config {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            module: None,
            start_offset: None,
            stop_offset: None,
        }
    }
}

/// Parses a module-relative trigger offset.
///
/// Offsets are hexadecimal, with or without a leading `0x`.
pub fn parse_offset(text: &str) -> Result<u64, ConfigError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|_| ConfigError::BadOffset(text.to_string()))
}
