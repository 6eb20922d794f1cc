//! Input validation run before a function's forward pass
//!
//! Each [`Function`](super::Function) inspects the [`TypeInfo`] of its inputs
//! in `check_type_forward`. A failed expectation yields [`InvalidType`], which
//! is distinct from errors raised inside the computation itself.

use super::{DType, TensorData};
use std::fmt;

/// Shape and dtype of one forward input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl TypeInfo {
    /// Describe an array
    pub fn of<T: TensorData>(data: &T) -> Self {
        Self {
            shape: data.shape().to_vec(),
            dtype: data.dtype(),
        }
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// A type-check expectation that did not hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidType {
    /// Condition that was required
    pub expect: String,
    /// What the inputs actually had
    pub actual: String,
}

impl InvalidType {
    pub fn new(expect: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expect: expect.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for InvalidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expect: {}\nActual: {}", self.expect, self.actual)
    }
}

impl std::error::Error for InvalidType {}

/// Require exactly `n` inputs
pub fn expect_size(in_types: &[TypeInfo], n: usize) -> Result<(), InvalidType> {
    if in_types.len() == n {
        Ok(())
    } else {
        Err(InvalidType::new(
            format!("in_types.size == {}", n),
            format!("in_types.size = {}", in_types.len()),
        ))
    }
}

/// Require at least `n` inputs
pub fn expect_size_at_least(in_types: &[TypeInfo], n: usize) -> Result<(), InvalidType> {
    if in_types.len() >= n {
        Ok(())
    } else {
        Err(InvalidType::new(
            format!("in_types.size >= {}", n),
            format!("in_types.size = {}", in_types.len()),
        ))
    }
}

/// Require input `index` to have more than `axis` dimensions
pub fn expect_ndim_gt(in_types: &[TypeInfo], index: usize, axis: usize) -> Result<(), InvalidType> {
    let ndim = in_types[index].ndim();
    if ndim > axis {
        Ok(())
    } else {
        Err(InvalidType::new(
            format!("in_types[{}].ndim > {}", index, axis),
            format!("in_types[{}].ndim = {}", index, ndim),
        ))
    }
}

/// Require input `index` to match `reference` in dtype and rank, and in
/// extent on every axis other than `axis`
pub fn expect_compatible_except_axis(
    reference: &TypeInfo,
    in_types: &[TypeInfo],
    index: usize,
    axis: usize,
) -> Result<(), InvalidType> {
    let other = &in_types[index];
    if other.dtype != reference.dtype {
        return Err(InvalidType::new(
            format!("in_types[{}].dtype == {}", index, reference.dtype),
            format!("in_types[{}].dtype = {}", index, other.dtype),
        ));
    }
    if other.ndim() != reference.ndim() {
        return Err(InvalidType::new(
            format!("in_types[{}].ndim == {}", index, reference.ndim()),
            format!("in_types[{}].ndim = {}", index, other.ndim()),
        ));
    }
    for (d, (&a, &b)) in reference.shape.iter().zip(&other.shape).enumerate() {
        if d != axis && a != b {
            return Err(InvalidType::new(
                format!("in_types[{}].shape[{}] == {}", index, d, a),
                format!("in_types[{}].shape[{}] = {}", index, d, b),
            ));
        }
    }
    Ok(())
}
