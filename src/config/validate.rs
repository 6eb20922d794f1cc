//! Configuration validation

use super::schema::{InitSpec, OpKind, OpSpec};
use crate::autograd::tiled_shape;
use crate::functions::{IndicesOrSections, Reps};

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid reps: {0}")]
    InvalidReps(String),

    #[error("Tiled output too large: {0}")]
    OutputTooLarge(String),

    #[error("Input shape {0:?} has too many elements")]
    InputTooLarge(Vec<usize>),

    #[error("Axis {axis} out of range for input of rank {ndim}")]
    AxisOutOfRange { axis: usize, ndim: usize },

    #[error("Invalid number of sections: 0 (must be > 0)")]
    ZeroSections,

    #[error("Axis length {len} does not divide into {sections} equal sections")]
    UnevenSections { len: usize, sections: usize },

    #[error("Invalid gradient-check epsilon: {0} (must be > 0.0)")]
    InvalidEpsilon(f64),

    #[error("Invalid tolerance: {0} (must be >= 0.0)")]
    InvalidTolerance(f64),

    #[error("Invalid uniform range: [{low}, {high}) must be finite and non-empty")]
    InvalidUniformRange { low: f64, high: f64 },
}

/// Validate a run config
///
/// Checks:
/// - the input element count fits in memory addressing
/// - reps are an int or list of non-negative ints, and the tiled shape
///   does not overflow
/// - the split axis exists and sections divide it evenly
/// - gradient-check step and tolerances are in range
pub fn validate_spec(spec: &OpSpec) -> Result<(), ValidationError> {
    let shape = &spec.input.shape;
    let ndim = shape.len();

    let size = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
    if !matches!(size, Some(n) if n <= isize::MAX as usize) {
        return Err(ValidationError::InputTooLarge(shape.clone()));
    }

    match &spec.op {
        OpKind::Tile { reps } => {
            let reps = Reps::try_from(reps).map_err(|e| ValidationError::InvalidReps(e.to_string()))?;
            tiled_shape(shape, reps.as_slice()).map_err(|e| ValidationError::OutputTooLarge(e.to_string()))?;
        }
        OpKind::SplitAxis {
            indices_or_sections,
            axis,
        } => {
            if *axis >= ndim {
                return Err(ValidationError::AxisOutOfRange { axis: *axis, ndim });
            }
            if let IndicesOrSections::Sections(sections) = *indices_or_sections {
                let len = spec.input.shape[*axis];
                if sections == 0 {
                    return Err(ValidationError::ZeroSections);
                }
                if len % sections != 0 {
                    return Err(ValidationError::UnevenSections { len, sections });
                }
            }
        }
    }

    if let InitSpec::Uniform { low, high, .. } = spec.input.init {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(ValidationError::InvalidUniformRange { low, high });
        }
    }

    let gradcheck = &spec.gradcheck;
    if !(gradcheck.eps > 0.0) {
        return Err(ValidationError::InvalidEpsilon(gradcheck.eps));
    }
    for tolerance in [gradcheck.atol, gradcheck.rtol] {
        if !(tolerance >= 0.0) {
            return Err(ValidationError::InvalidTolerance(tolerance));
        }
    }

    Ok(())
}
