//! Finite-difference gradient checking
//!
//! Compares the analytic gradients a [`Function`] produces through the graph
//! with central differences of `L(x) = Σ_k <f(x)_k, gy_k>`:
//!
//! ∂L/∂x_j ≈ (L(x + ε·e_j) - L(x - ε·e_j)) / 2ε
//!
//! # Example
//!
//! ```
//! use ndarray::{ArrayD, IxDyn};
//! use teselar::gradient_check::{check_backward, GradCheckConfig};
//! use teselar::{Tile, TensorData};
//!
//! let x = ArrayD::<f64>::from_f64_vec(&[2, 3], (0..6).map(f64::from).collect())?;
//! let gy = ArrayD::<f64>::ones(IxDyn(&[4, 6]));
//! let report = check_backward(Tile::new([2usize, 2])?, &[x], &[gy], &GradCheckConfig::default())?;
//! assert!(report.passed);
//! # Ok::<(), teselar::Error>(())
//! ```

use crate::autograd::{apply, backward, Function, TensorData, Variable};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for gradient checking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradCheckConfig {
    /// Step for central differences
    pub eps: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Relative tolerance, scaled by the numerical gradient
    pub rtol: f64,
    /// Maximum number of mismatches kept in the report
    pub max_errors_to_report: usize,
    /// Log every mismatch
    pub verbose: bool,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            eps: 1e-3,
            atol: 1e-4,
            rtol: 1e-3,
            max_errors_to_report: 10,
            verbose: false,
        }
    }
}

impl GradCheckConfig {
    /// Tighter tolerances, for f64 inputs
    pub fn strict() -> Self {
        Self {
            eps: 1e-5,
            atol: 1e-6,
            rtol: 1e-5,
            max_errors_to_report: 10,
            verbose: true,
        }
    }

    /// Looser tolerances, for noisy or low-precision functions
    pub fn relaxed() -> Self {
        Self {
            eps: 1e-2,
            atol: 1e-3,
            rtol: 1e-2,
            max_errors_to_report: 10,
            verbose: false,
        }
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }

    pub fn with_rtol(mut self, rtol: f64) -> Self {
        self.rtol = rtol;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// One gradient element outside tolerance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientMismatch {
    /// Which input
    pub input: usize,
    /// Row-major element index within that input
    pub index: usize,
    pub analytical: f64,
    pub numerical: f64,
    pub abs_error: f64,
}

/// Result of gradient checking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradCheckReport {
    /// Number of input elements checked
    pub num_params: usize,
    /// Number of elements outside tolerance
    pub num_errors: usize,
    /// Largest absolute difference seen
    pub max_abs_error: f64,
    /// Whether every element was within tolerance
    pub passed: bool,
    /// First mismatches, up to `max_errors_to_report`
    pub mismatches: Vec<GradientMismatch>,
}

/// `Σ_k <ys_k, gys_k>` accumulated in f64
fn weighted_sum<T: TensorData>(ys: &[T], grad_outputs: &[T]) -> Result<f64> {
    if ys.len() != grad_outputs.len() {
        return Err(Error::InvalidGradient(format!(
            "{} outputs but {} output gradients",
            ys.len(),
            grad_outputs.len()
        )));
    }
    let mut total = 0.0;
    for (y, gy) in ys.iter().zip(grad_outputs) {
        if y.shape() != gy.shape() {
            return Err(Error::ShapeMismatch {
                expected: y.shape().to_vec(),
                got: gy.shape().to_vec(),
            });
        }
        total += y
            .to_f64_vec()
            .iter()
            .zip(gy.to_f64_vec())
            .map(|(a, b)| a * b)
            .sum::<f64>();
    }
    Ok(total)
}

/// Central-difference gradient of `f` with respect to every input element
///
/// Perturbed inputs are rebuilt in the input's own dtype, and the step is
/// measured after that rounding, so low-precision inputs do not bias the
/// quotient. Fails if `eps` vanishes at some element's precision.
pub fn numerical_grad<T, F>(f: F, inputs: &[T], grad_outputs: &[T], eps: f64) -> Result<Vec<Vec<f64>>>
where
    T: TensorData,
    F: Fn(&[T]) -> Result<Vec<T>>,
{
    let mut grads = Vec::with_capacity(inputs.len());
    for i in 0..inputs.len() {
        let base = inputs[i].to_f64_vec();
        let shape = inputs[i].shape().to_vec();
        let mut grad = vec![0.0; base.len()];
        let mut perturbed = inputs.to_vec();

        for j in 0..base.len() {
            let mut values = base.clone();
            values[j] = base[j] + eps;
            perturbed[i] = T::from_f64_vec(&shape, values.clone())?;
            let x_plus = perturbed[i].to_f64_vec()[j];
            let f_plus = weighted_sum(&f(&perturbed)?, grad_outputs)?;

            values[j] = base[j] - eps;
            perturbed[i] = T::from_f64_vec(&shape, values)?;
            let x_minus = perturbed[i].to_f64_vec()[j];
            let f_minus = weighted_sum(&f(&perturbed)?, grad_outputs)?;

            let step = x_plus - x_minus;
            if step <= 0.0 {
                return Err(Error::ValueError(format!(
                    "eps {} is below the precision of {} at value {}",
                    eps,
                    inputs[i].dtype(),
                    base[j]
                )));
            }
            grad[j] = (f_plus - f_minus) / step;
        }
        grads.push(grad);
    }
    Ok(grads)
}

/// Check `function`'s backward against numerical gradients
///
/// Every input is wrapped in a variable that requires grad, the function is
/// applied through the graph, each output receives the matching entry of
/// `grad_outputs`, and backward runs once.
pub fn check_backward<T, F>(
    function: F,
    inputs: &[T],
    grad_outputs: &[T],
    config: &GradCheckConfig,
) -> Result<GradCheckReport>
where
    T: TensorData,
    F: Function<T> + Clone,
{
    let variables: Vec<Variable<T>> = inputs.iter().map(|x| Variable::new(x.clone(), true)).collect();
    let refs: Vec<&Variable<T>> = variables.iter().collect();
    let outputs = apply(function.clone(), &refs)?;
    if outputs.len() != grad_outputs.len() {
        return Err(Error::InvalidGradient(format!(
            "{} produced {} outputs but {} output gradients were given",
            function.name(),
            outputs.len(),
            grad_outputs.len()
        )));
    }
    for (y, gy) in outputs.iter().zip(grad_outputs) {
        y.set_grad(gy.clone())?;
    }
    if let Some(first) = outputs.first() {
        backward(first, None)?;
    }

    let numerical = numerical_grad(|xs| function.forward(xs), inputs, grad_outputs, config.eps)?;

    let mut report = GradCheckReport {
        num_params: 0,
        num_errors: 0,
        max_abs_error: 0.0,
        passed: true,
        mismatches: Vec::new(),
    };
    for (input, (variable, numerical)) in variables.iter().zip(numerical).enumerate() {
        let analytical = variable
            .grad()
            .map(|g| g.to_f64_vec())
            .unwrap_or_else(|| vec![0.0; variable.len()]);

        for (index, (&a, &n)) in analytical.iter().zip(&numerical).enumerate() {
            let abs_error = (a - n).abs();
            report.num_params += 1;
            report.max_abs_error = report.max_abs_error.max(abs_error);
            if abs_error > config.atol + config.rtol * n.abs() {
                report.num_errors += 1;
                if config.verbose {
                    tracing::warn!(
                        function = function.name(),
                        input,
                        index,
                        analytical = a,
                        numerical = n,
                        "gradient mismatch"
                    );
                }
                if report.mismatches.len() < config.max_errors_to_report {
                    report.mismatches.push(GradientMismatch {
                        input,
                        index,
                        analytical: a,
                        numerical: n,
                        abs_error,
                    });
                }
            }
        }
    }
    report.passed = report.num_errors == 0;
    tracing::debug!(
        function = function.name(),
        num_params = report.num_params,
        num_errors = report.num_errors,
        max_abs_error = report.max_abs_error,
        "gradient check"
    );
    Ok(report)
}

/// Largest absolute elementwise difference, `None` if shapes differ
pub fn max_abs_diff<T: TensorData>(a: &T, b: &T) -> Option<f64> {
    if a.shape() != b.shape() {
        return None;
    }
    Some(
        a.to_f64_vec()
            .iter()
            .zip(b.to_f64_vec())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max),
    )
}

/// Elementwise `|a - b| <= atol + rtol * |b|`, with equal shapes and dtypes
pub fn allclose<T: TensorData>(a: &T, b: &T, atol: f64, rtol: f64) -> bool {
    a.shape() == b.shape()
        && a.dtype() == b.dtype()
        && a.to_f64_vec()
            .iter()
            .zip(b.to_f64_vec())
            .all(|(x, y)| (x - y).abs() <= atol + rtol * y.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{SplitAxis, Tile};
    use approx::assert_abs_diff_eq;
    use ndarray::{ArrayD, IxDyn};

    fn arange(shape: &[usize]) -> ArrayD<f64> {
        let n = shape.iter().product::<usize>();
        ArrayD::from_f64_vec(shape, (0..n).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn test_numerical_grad_of_linear_map_is_grad_output() {
        let x = arange(&[3]);
        let gy = ArrayD::<f64>::from_f64_vec(&[3], vec![0.5, -1.0, 2.0]).unwrap();
        let grads = numerical_grad(|xs: &[ArrayD<f64>]| Ok(xs.to_vec()), &[x], &[gy], 1e-3).unwrap();

        assert_eq!(grads.len(), 1);
        assert_abs_diff_eq!(grads[0][0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(grads[0][1], -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(grads[0][2], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_check_backward_tile_passes() {
        let x = arange(&[2, 3]);
        let gy = arange(&[2, 6]);
        let report = check_backward(Tile::new(2usize).unwrap(), &[x], &[gy], &GradCheckConfig::default()).unwrap();

        assert!(report.passed, "{:?}", report);
        assert_eq!(report.num_params, 6);
        assert_eq!(report.num_errors, 0);
    }

    #[test]
    fn test_check_backward_split_passes() {
        let x = arange(&[7, 3]);
        let gys = vec![arange(&[2, 3]), arange(&[3, 3]), arange(&[2, 3])];
        let report = check_backward(SplitAxis::new([2usize, 5], 0), &[x], &gys, &GradCheckConfig::default()).unwrap();

        assert!(report.passed, "{:?}", report);
        assert_eq!(report.num_params, 21);
    }

    #[test]
    fn test_check_backward_rejects_wrong_grad_count() {
        let x = arange(&[2]);
        let result = check_backward(Tile::new(2usize).unwrap(), &[x.clone()], &[x.clone(), x], &GradCheckConfig::default());
        assert!(matches!(result, Err(Error::InvalidGradient(_))));
    }

    #[test]
    fn test_allclose_and_max_abs_diff() {
        let a = arange(&[2, 2]);
        let mut b = a.clone();
        b[IxDyn(&[1, 1])] += 1e-6;

        assert!(allclose(&a, &b, 1e-5, 0.0));
        assert!(!allclose(&a, &b, 1e-7, 0.0));
        assert_abs_diff_eq!(max_abs_diff(&a, &b).unwrap(), 1e-6, epsilon = 1e-12);
        assert!(max_abs_diff(&a, &arange(&[4])).is_none());
        assert!(!allclose(&a, &arange(&[4]), 1.0, 1.0));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: GradCheckConfig = serde_yaml::from_str("eps: 0.01").unwrap();
        assert_eq!(config.eps, 0.01);
        assert_eq!(config.atol, GradCheckConfig::default().atol);
        assert_eq!(config.max_errors_to_report, 10);
    }
}
