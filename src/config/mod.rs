//! Declarative YAML run configs
//!
//! # Example
//!
//! ```yaml
//! input:
//!   shape: [2, 3]
//!   dtype: f32
//!   init:
//!     kind: uniform
//!     low: -1.0
//!     high: 1.0
//!     seed: 42
//!
//! op:
//!   tile:
//!     reps: [2, 2]
//!
//! gradcheck:
//!   eps: 0.01
//!   atol: 1e-4
//! ```

mod cli;
mod load;
mod run;
mod schema;
mod validate;


pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat, RunArgs, ValidateArgs,
};
pub(crate) use load::parse_spec_unchecked;
pub use load::{load_spec, parse_spec};
pub use run::{describe_spec, run_from_yaml, run_spec, RunReport, SpecInfo};
pub use schema::{InitSpec, InputSpec, OpKind, OpSpec};
pub use validate::{validate_spec, ValidationError};
