//! Single-command operator runs from YAML configuration

use super::load::load_spec;
use super::schema::{OpKind, OpSpec};
use super::validate::validate_spec;
use crate::autograd::{apply, backward, DType, Function, TensorData, Variable};
use crate::error::{Error, Result};
use crate::functions::{SplitAxis, Tile};
use crate::gradient_check::{check_backward, GradCheckConfig, GradCheckReport};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one forward/backward run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub op: String,
    pub dtype: DType,
    pub input_shape: Vec<usize>,
    pub output_shapes: Vec<Vec<usize>>,
    /// Input gradient for an all-ones output gradient, row-major
    pub grad: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradcheck: Option<GradCheckReport>,
}

/// Static description of a run, computed without executing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecInfo {
    pub op: String,
    pub dtype: DType,
    pub input_shape: Vec<usize>,
    pub output_shapes: Vec<Vec<usize>>,
}

/// Load a YAML spec and run it
///
/// # Example
///
/// ```no_run
/// use teselar::config::run_from_yaml;
///
/// let report = run_from_yaml("tile.yaml", true)?;
/// assert!(report.gradcheck.map_or(true, |g| g.passed));
/// # Ok::<(), teselar::Error>(())
/// ```
pub fn run_from_yaml<P: AsRef<Path>>(config_path: P, check_gradients: bool) -> Result<RunReport> {
    let spec = load_spec(config_path)?;
    run_spec(&spec, check_gradients)
}

/// Run forward, backward with an all-ones gradient, and optionally a
/// gradient check, in the dtype the spec asks for
pub fn run_spec(spec: &OpSpec, check_gradients: bool) -> Result<RunReport> {
    validate_spec(spec).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;
    match spec.input.dtype {
        DType::F32 => run_typed::<ArrayD<f32>>(spec, check_gradients),
        DType::F64 => run_typed::<ArrayD<f64>>(spec, check_gradients),
    }
}

/// Describe the input and output shapes of a spec
pub fn describe_spec(spec: &OpSpec) -> Result<SpecInfo> {
    let shape = &spec.input.shape;
    let output_shapes = match &spec.op {
        OpKind::Tile { reps } => vec![Tile::new(reps)?.output_shape(shape)?],
        OpKind::SplitAxis {
            indices_or_sections,
            axis,
        } => {
            let len = *shape.get(*axis).ok_or_else(|| {
                Error::ConfigError(format!("axis {} out of range for shape {:?}", axis, shape))
            })?;
            let boundaries = indices_or_sections.boundaries(len)?;
            let mut start = 0;
            boundaries
                .iter()
                .copied()
                .chain(std::iter::once(len))
                .map(|end| {
                    let lo = start.min(len);
                    let hi = end.min(len).max(lo);
                    start = end;
                    let mut piece = shape.clone();
                    piece[*axis] = hi - lo;
                    piece
                })
                .collect()
        }
    };
    Ok(SpecInfo {
        op: spec.op.name().to_string(),
        dtype: spec.input.dtype,
        input_shape: shape.clone(),
        output_shapes,
    })
}

fn run_typed<T: TensorData>(spec: &OpSpec, check_gradients: bool) -> Result<RunReport> {
    let values = spec.input.init.values(spec.input.len());
    let x = Variable::<T>::from_f64_vec(&spec.input.shape, values, true)?;
    let config = check_gradients.then_some(&spec.gradcheck);

    match &spec.op {
        OpKind::Tile { reps } => run_function(spec.op.name(), Tile::new(reps)?, &x, config),
        OpKind::SplitAxis {
            indices_or_sections,
            axis,
        } => run_function(
            spec.op.name(),
            SplitAxis::new(indices_or_sections.clone(), *axis),
            &x,
            config,
        ),
    }
}

fn run_function<T, F>(
    op: &str,
    function: F,
    x: &Variable<T>,
    gradcheck: Option<&GradCheckConfig>,
) -> Result<RunReport>
where
    T: TensorData,
    F: Function<T> + Clone,
{
    let outputs = apply(function.clone(), &[x])?;
    let grad_outputs: Vec<T> = outputs.iter().map(|y| y.data().ones_like()).collect();
    for (y, gy) in outputs.iter().zip(&grad_outputs) {
        y.set_grad(gy.clone())?;
    }
    if let Some(first) = outputs.first() {
        backward(first, None)?;
    }
    let grad = x.grad().unwrap_or_else(|| x.data().zeros_like());

    let gradcheck = match gradcheck {
        Some(config) => Some(check_backward(function, &[x.data().clone()], &grad_outputs, config)?),
        None => None,
    };

    tracing::info!(
        op,
        dtype = %x.dtype(),
        input_shape = ?x.shape(),
        outputs = outputs.len(),
        gradcheck_passed = gradcheck.as_ref().map(|g| g.passed),
        "run complete"
    );

    Ok(RunReport {
        op: op.to_string(),
        dtype: x.dtype(),
        input_shape: x.shape().to_vec(),
        output_shapes: outputs.iter().map(|y| y.shape().to_vec()).collect(),
        grad: grad.to_f64_vec(),
        gradcheck,
    })
}
