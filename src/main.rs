//! Teselar CLI
//!
//! Runs tile / split_axis from a YAML spec, checks gradients, and reports.
//!
//! # Usage
//!
//! ```bash
//! # Run forward, backward and a gradient check
//! teselar run tile.yaml
//!
//! # Loosen the check from the command line
//! teselar run tile.yaml --eps 1e-2 --atol 1e-3 --format json
//!
//! # Validate a spec
//! teselar validate split.yaml
//!
//! # Show input and output shapes
//! teselar info split.yaml --format yaml
//! ```

use clap::Parser;
use std::process::ExitCode;
use teselar::config::{
    apply_overrides, describe_spec, load_spec, run_spec, validate_spec, Cli, Command, InfoArgs,
    RunArgs, ValidateArgs,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure output based on verbose/quiet flags
    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };
    init_tracing(log_level);

    let result = match cli.command {
        Command::Run(args) => run_op(args, log_level),
        Command::Validate(args) => run_validate(args, log_level),
        Command::Info(args) => run_info(args, log_level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

/// `RUST_LOG` wins over the flags when set
fn init_tracing(level: LogLevel) {
    let default_directive = match level {
        LogLevel::Quiet => "error",
        LogLevel::Normal => "warn",
        LogLevel::Verbose => "teselar=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to initialise tracing subscriber: {err}");
    }
}

fn run_op(args: RunArgs, level: LogLevel) -> Result<(), String> {
    let mut spec = load_spec(&args.config).map_err(|e| format!("Config error: {e}"))?;

    // Apply command-line overrides
    apply_overrides(&mut spec, &args);

    let report = run_spec(&spec, !args.skip_gradcheck).map_err(|e| format!("Run error: {e}"))?;

    let serialized = args
        .format
        .serialize(&report)
        .map_err(|e| format!("Output error: {e}"))?;
    if let Some(out) = serialized {
        println!("{out}");
    } else {
        log(
            level,
            LogLevel::Normal,
            &format!("Teselar: {} ({}) from {}", report.op, report.dtype, args.config.display()),
        );
        log(level, LogLevel::Normal, &format!("  Input shape: {:?}", report.input_shape));
        for (i, shape) in report.output_shapes.iter().enumerate() {
            log(level, LogLevel::Normal, &format!("  Output {i} shape: {shape:?}"));
        }
        log(level, LogLevel::Verbose, &format!("  Input gradient: {:?}", report.grad));

        if let Some(check) = &report.gradcheck {
            let status = if check.passed { "passed" } else { "FAILED" };
            log(
                level,
                LogLevel::Normal,
                &format!(
                    "  Gradient check {status}: {} elements, {} mismatches, max error {:.3e}",
                    check.num_params, check.num_errors, check.max_abs_error
                ),
            );
            for m in &check.mismatches {
                log(
                    level,
                    LogLevel::Verbose,
                    &format!(
                        "    input {} [{}]: analytical={} numerical={}",
                        m.input, m.index, m.analytical, m.numerical
                    ),
                );
            }
        }
    }

    match &report.gradcheck {
        Some(check) if !check.passed => Err(format!(
            "gradient check failed with {} mismatches",
            check.num_errors
        )),
        _ => Ok(()),
    }
}

fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let spec = load_spec(&args.config).map_err(|e| format!("Config error: {e}"))?;

    validate_spec(&spec).map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");
    log(
        level,
        LogLevel::Verbose,
        &format!("  Op: {}, input shape {:?}, dtype {}", spec.op.name(), spec.input.shape, spec.input.dtype),
    );
    Ok(())
}

fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let spec = load_spec(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let info = describe_spec(&spec).map_err(|e| format!("Config error: {e}"))?;

    let serialized = args
        .format
        .serialize(&info)
        .map_err(|e| format!("Output error: {e}"))?;
    match serialized {
        Some(out) => println!("{out}"),
        None => {
            log(level, LogLevel::Normal, "Configuration Info:");
            println!();
            println!("  Op: {}", info.op);
            println!("  Dtype: {}", info.dtype);
            println!("  Input shape: {:?}", info.input_shape);
            for (i, shape) in info.output_shapes.iter().enumerate() {
                println!("  Output {i} shape: {shape:?}");
            }
            println!();
            println!("  Gradient check:");
            println!("    eps: {}", spec.gradcheck.eps);
            println!("    atol: {}", spec.gradcheck.atol);
            println!("    rtol: {}", spec.gradcheck.rtol);
        }
    }
    Ok(())
}
