//! CLI argument parsing and validation
//!
//! # Usage
//!
//! ```bash
//! teselar run tile.yaml
//! teselar run tile.yaml --format json --eps 1e-2
//! teselar validate tile.yaml
//! teselar info split.yaml --format yaml
//! ```

use super::schema::OpSpec;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Teselar: differentiable tile and split-axis operators
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "teselar")]
#[command(version)]
#[command(about = "Run and gradient-check tile / split_axis from YAML specs")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run forward, backward and a gradient check
    Run(RunArgs),

    /// Validate a spec file without running it
    Validate(ValidateArgs),

    /// Show input and output shapes of a spec
    Info(InfoArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Path to YAML spec file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Override finite-difference step
    #[arg(long)]
    pub eps: Option<f64>,

    /// Override absolute tolerance
    #[arg(long)]
    pub atol: Option<f64>,

    /// Override relative tolerance
    #[arg(long)]
    pub rtol: Option<f64>,

    /// Skip the gradient check
    #[arg(long)]
    pub skip_gradcheck: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML spec file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML spec file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

impl OutputFormat {
    /// Serialized report for json / yaml; `None` for text, which the CLI
    /// prints line by line
    pub fn serialize<T: serde::Serialize>(self, value: &T) -> crate::Result<Option<String>> {
        let serialized = match self {
            OutputFormat::Text => return Ok(None),
            OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        };
        serialized
            .map(Some)
            .map_err(crate::Error::Serialization)
    }
}

/// Parse command-line arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to an OpSpec
pub fn apply_overrides(spec: &mut OpSpec, args: &RunArgs) {
    if let Some(eps) = args.eps {
        spec.gradcheck.eps = eps;
    }
    if let Some(atol) = args.atol {
        spec.gradcheck.atol = atol;
    }
    if let Some(rtol) = args.rtol {
        spec.gradcheck.rtol = rtol;
    }
}
