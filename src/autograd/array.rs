//! Backend-polymorphic tensor storage
//!
//! Operators never touch a concrete array type. They only see [`TensorData`],
//! so the backend is picked once, where a [`Variable`](super::Variable) is
//! built, and the same operator code runs unchanged on every implementor.

use crate::error::{Error, Result};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, NdFloat, Slice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Element dtype of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[default]
    F32,
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "float32"),
            DType::F64 => write!(f, "float64"),
        }
    }
}

impl std::str::FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f32" | "float32" => Ok(DType::F32),
            "f64" | "float64" => Ok(DType::F64),
            _ => Err(format!("Unknown dtype: {}. Valid dtypes: f32, f64", s)),
        }
    }
}

/// Scalar element stored by the ndarray backend
pub trait Element: NdFloat {
    /// Dtype tag for this element type
    const DTYPE: DType;

    /// Convert from f64, rounding if the element is narrower
    fn from_f64(value: f64) -> Self;

    /// Widen to f64
    fn as_f64(self) -> f64;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn as_f64(self) -> f64 {
        self
    }
}

/// Array operations the differentiable functions are written against
pub trait TensorData: Clone + fmt::Debug + 'static {
    /// Shape of the array
    fn shape(&self) -> &[usize];

    /// Element dtype
    fn dtype(&self) -> DType;

    /// Array of zeros with the given shape
    fn zeros(shape: &[usize]) -> Self;

    /// Array of ones with the given shape
    fn ones(shape: &[usize]) -> Self;

    /// Same data viewed under a new shape with the same element count
    fn reshape(&self, shape: &[usize]) -> Result<Self>;

    /// Replicate along each axis, with `numpy.tile` rank alignment
    fn tile(&self, reps: &[usize]) -> Result<Self>;

    /// Copy of the box selected by one half-open range per axis
    fn slice(&self, ranges: &[Range<usize>]) -> Result<Self>;

    /// Elementwise `self += other`; shapes must match exactly
    fn add_assign(&mut self, other: &Self) -> Result<()>;

    /// Split along `axis` at `boundaries`, yielding `boundaries.len() + 1` pieces
    fn split(&self, axis: usize, boundaries: &[usize]) -> Result<Vec<Self>>;

    /// Join `parts` along `axis`
    fn concatenate(axis: usize, parts: &[Self]) -> Result<Self>;

    /// Elements in row-major order, widened to f64
    fn to_f64_vec(&self) -> Vec<f64>;

    /// Build an array of this backend's dtype from row-major f64 values
    fn from_f64_vec(shape: &[usize], values: Vec<f64>) -> Result<Self>;

    /// Number of axes
    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements
    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    /// Check if the array holds no elements
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zeros with the shape and dtype of `self`
    fn zeros_like(&self) -> Self {
        Self::zeros(self.shape())
    }

    /// Ones with the shape and dtype of `self`
    fn ones_like(&self) -> Self {
        Self::ones(self.shape())
    }
}

/// Pad the shorter of `shape` and `reps` with leading 1s
///
/// Returns `(aligned_shape, aligned_reps)` of equal length.
pub fn align_ranks(shape: &[usize], reps: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let ndim = shape.len().max(reps.len());
    let pad = |values: &[usize]| {
        let mut out = vec![1; ndim - values.len()];
        out.extend_from_slice(values);
        out
    };
    (pad(shape), pad(reps))
}

/// Output shape of tiling `shape` by `reps`, after rank alignment
///
/// Fails with [`Error::ValueError`] when an extent, or the product of the
/// non-zero extents, exceeds `isize::MAX`.
pub fn tiled_shape(shape: &[usize], reps: &[usize]) -> Result<Vec<usize>> {
    let (shape, reps) = align_ranks(shape, reps);
    let overflow = || {
        Error::ValueError(format!(
            "tiling shape {:?} by reps {:?} overflows the array size",
            shape, reps
        ))
    };
    let out: Vec<usize> = shape
        .iter()
        .zip(&reps)
        .map(|(&d, &r)| d.checked_mul(r).ok_or_else(overflow))
        .collect::<Result<_>>()?;
    // ndarray bounds the product of the non-zero extents, even when the
    // array itself is empty
    let size = out
        .iter()
        .filter(|&&d| d != 0)
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(overflow)?;
    if size > isize::MAX as usize {
        return Err(overflow());
    }
    Ok(out)
}

fn check_ranges(shape: &[usize], ranges: &[Range<usize>]) -> Result<()> {
    if ranges.len() != shape.len() {
        return Err(Error::ValueError(format!(
            "slice needs one range per axis: {} ranges for shape {:?}",
            ranges.len(),
            shape
        )));
    }
    for (axis, (range, &dim)) in ranges.iter().zip(shape).enumerate() {
        if range.start > range.end || range.end > dim {
            return Err(Error::ValueError(format!(
                "range {:?} out of bounds for axis {} of length {}",
                range, axis, dim
            )));
        }
    }
    Ok(())
}

impl<A: Element> TensorData for ArrayD<A> {
    fn shape(&self) -> &[usize] {
        ndarray::ArrayBase::shape(self)
    }

    fn dtype(&self) -> DType {
        A::DTYPE
    }

    fn zeros(shape: &[usize]) -> Self {
        ArrayD::zeros(IxDyn(shape))
    }

    fn ones(shape: &[usize]) -> Self {
        ArrayD::from_elem(IxDyn(shape), A::from_f64(1.0))
    }

    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let size: usize = shape.iter().product();
        if size != TensorData::len(self) {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: TensorData::shape(self).to_vec(),
            });
        }
        self.to_shape(IxDyn(shape))
            .map(|view| view.into_owned())
            .map_err(|_| Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: TensorData::shape(self).to_vec(),
            })
    }

    fn tile(&self, reps: &[usize]) -> Result<Self> {
        let out_shape = tiled_shape(TensorData::shape(self), reps)?;
        let (shape, _) = align_ranks(TensorData::shape(self), reps);
        let base = TensorData::reshape(self, &shape)?;

        // Output coordinates wrap back onto the base block; the closure never
        // runs when the output is empty, so `% 0` cannot happen.
        let mut src = vec![0; shape.len()];
        Ok(ArrayD::from_shape_fn(IxDyn(&out_shape), |idx| {
            for (axis, slot) in src.iter_mut().enumerate() {
                *slot = idx[axis] % shape[axis];
            }
            base[&src[..]]
        }))
    }

    fn slice(&self, ranges: &[Range<usize>]) -> Result<Self> {
        check_ranges(TensorData::shape(self), ranges)?;
        Ok(self
            .slice_each_axis(|ax| Slice::from(ranges[ax.axis.index()].clone()))
            .to_owned())
    }

    fn add_assign(&mut self, other: &Self) -> Result<()> {
        if TensorData::shape(self) != TensorData::shape(other) {
            return Err(Error::ShapeMismatch {
                expected: TensorData::shape(self).to_vec(),
                got: TensorData::shape(other).to_vec(),
            });
        }
        *self += other;
        Ok(())
    }

    fn split(&self, axis: usize, boundaries: &[usize]) -> Result<Vec<Self>> {
        if axis >= TensorData::ndim(self) {
            return Err(Error::ValueError(format!(
                "axis {} out of range for {}-d array",
                axis,
                TensorData::ndim(self)
            )));
        }
        let len = TensorData::shape(self)[axis];
        let mut pieces = Vec::with_capacity(boundaries.len() + 1);
        let mut start = 0;
        for end in boundaries.iter().copied().chain(std::iter::once(len)) {
            // Python slice semantics: clamp to the axis, empty when reversed.
            let lo = start.min(len);
            let hi = end.min(len).max(lo);
            pieces.push(self.slice_axis(Axis(axis), Slice::from(lo..hi)).to_owned());
            start = end;
        }
        Ok(pieces)
    }

    fn concatenate(axis: usize, parts: &[Self]) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| Error::ValueError("need at least one array to concatenate".into()))?;
        if axis >= TensorData::ndim(first) {
            return Err(Error::ValueError(format!(
                "axis {} out of range for {}-d array",
                axis,
                TensorData::ndim(first)
            )));
        }
        let views: Vec<ArrayViewD<'_, A>> = parts.iter().map(|p| p.view()).collect();
        ndarray::concatenate(Axis(axis), &views).map_err(|_| {
            let got = parts
                .iter()
                .find(|p| TensorData::ndim(*p) != TensorData::ndim(first))
                .unwrap_or(first);
            Error::ShapeMismatch {
                expected: TensorData::shape(first).to_vec(),
                got: TensorData::shape(got).to_vec(),
            }
        })
    }

    fn to_f64_vec(&self) -> Vec<f64> {
        self.iter().map(|&v| v.as_f64()).collect()
    }

    fn from_f64_vec(shape: &[usize], values: Vec<f64>) -> Result<Self> {
        let got = vec![values.len()];
        ArrayD::from_shape_vec(
            IxDyn(shape),
            values.into_iter().map(A::from_f64).collect(),
        )
        .map_err(|_| Error::ShapeMismatch {
            expected: shape.to_vec(),
            got,
        })
    }
}
