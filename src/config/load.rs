//! Loading run configs from YAML

use super::schema::OpSpec;
use super::validate::validate_spec;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Load and validate a run config from a YAML file
pub fn load_spec<P: AsRef<Path>>(config_path: P) -> Result<OpSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    parse_spec(&yaml_content)
}

/// Parse and validate a run config from YAML text
pub fn parse_spec(yaml: &str) -> Result<OpSpec> {
    let spec = parse_spec_unchecked(yaml)?;
    validate_spec(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;
    Ok(spec)
}

pub(crate) fn parse_spec_unchecked(yaml: &str) -> Result<OpSpec> {
    serde_yaml::from_str(yaml).map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))
}
