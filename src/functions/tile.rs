//! Tiling of an array
//!
//! Forward replicates the input along every axis; backward folds the output
//! gradient back onto the input by summing over all replicas.
//!
//! Counts follow `numpy.tile`: when there are fewer counts than axes they
//! apply to the trailing axes, and when there are more the input gains
//! leading length-1 axes.

use super::single_input;
use crate::autograd::{align_ranks, apply_single, tiled_shape, type_check, Function, TensorData, TypeInfo, Variable};
use crate::error::{Error, Result};
use std::ops::Range;

/// Per-axis repetition counts, all non-negative
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reps(Vec<usize>);

impl Reps {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_signed(values: &[i64]) -> Result<Self> {
        values
            .iter()
            .map(|&r| {
                usize::try_from(r).map_err(|_| {
                    Error::ValueError(format!(
                        "all elements in reps must be zero or larger, got {:?}",
                        values
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Reps)
    }
}

impl From<usize> for Reps {
    fn from(rep: usize) -> Self {
        Reps(vec![rep])
    }
}

impl From<Vec<usize>> for Reps {
    fn from(reps: Vec<usize>) -> Self {
        Reps(reps)
    }
}

impl From<&[usize]> for Reps {
    fn from(reps: &[usize]) -> Self {
        Reps(reps.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Reps {
    fn from(reps: [usize; N]) -> Self {
        Reps(reps.to_vec())
    }
}

impl TryFrom<i64> for Reps {
    type Error = Error;

    fn try_from(rep: i64) -> Result<Self> {
        Reps::from_signed(&[rep])
    }
}

impl TryFrom<&[i64]> for Reps {
    type Error = Error;

    fn try_from(reps: &[i64]) -> Result<Self> {
        Reps::from_signed(reps)
    }
}

impl TryFrom<Vec<i64>> for Reps {
    type Error = Error;

    fn try_from(reps: Vec<i64>) -> Result<Self> {
        Reps::from_signed(&reps)
    }
}

impl<const N: usize> TryFrom<[i64; N]> for Reps {
    type Error = Error;

    fn try_from(reps: [i64; N]) -> Result<Self> {
        Reps::from_signed(&reps)
    }
}

/// Integer value of a config scalar; booleans count as 1 and 0
fn int_value(value: &serde_yaml::Value) -> Option<i64> {
    match value {
        serde_yaml::Value::Bool(b) => Some(i64::from(*b)),
        other => other.as_i64(),
    }
}

/// Reps as written in a config file: an integer or a sequence of integers
impl TryFrom<&serde_yaml::Value> for Reps {
    type Error = Error;

    fn try_from(value: &serde_yaml::Value) -> Result<Self> {
        let type_error = || Error::TypeError(format!("reps must be int or tuple of ints, got {:?}", value));
        match value {
            serde_yaml::Value::Number(_) | serde_yaml::Value::Bool(_) => {
                let rep = int_value(value).ok_or_else(type_error)?;
                Reps::try_from(rep)
            }
            serde_yaml::Value::Sequence(items) => {
                let reps = items
                    .iter()
                    .map(|item| int_value(item).ok_or_else(type_error))
                    .collect::<Result<Vec<_>>>()?;
                Reps::try_from(reps)
            }
            _ => Err(type_error()),
        }
    }
}

/// Ranges selecting every replica of a block of `shape` tiled by `reps`
///
/// Replicas are enumerated as a Cartesian product with the last axis varying
/// fastest. `reps` and `shape` must already be rank-aligned.
fn tile_indices(reps: &[usize], shape: &[usize]) -> Result<Vec<Vec<Range<usize>>>> {
    let count = reps
        .iter()
        .try_fold(1usize, |acc, &r| acc.checked_mul(r))
        .ok_or_else(|| Error::ValueError(format!("replica count of reps {:?} overflows", reps)))?;
    let mut indices = Vec::with_capacity(count);
    let mut replica = vec![0; reps.len()];
    for _ in 0..count {
        indices.push(
            replica
                .iter()
                .zip(shape)
                .map(|(&i, &d)| i * d..(i + 1) * d)
                .collect(),
        );
        for axis in (0..reps.len()).rev() {
            replica[axis] += 1;
            if replica[axis] < reps[axis] {
                break;
            }
            replica[axis] = 0;
        }
    }
    Ok(indices)
}

/// Tiling of an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    reps: Reps,
}

impl Tile {
    /// Create a tile function
    ///
    /// Fails with [`Error::ValueError`] for negative counts and with
    /// [`Error::TypeError`] when a config value is not an int or int sequence.
    pub fn new<R>(reps: R) -> Result<Self>
    where
        R: TryInto<Reps>,
        Error: From<R::Error>,
    {
        Ok(Self {
            reps: reps.try_into()?,
        })
    }

    pub fn reps(&self) -> &Reps {
        &self.reps
    }

    /// Shape of the output for an input of `shape`
    ///
    /// Fails with [`Error::ValueError`] when the tiled size overflows.
    pub fn output_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        tiled_shape(shape, self.reps.as_slice())
    }
}

impl<T: TensorData> Function<T> for Tile {
    fn name(&self) -> &str {
        "Tile"
    }

    fn check_type_forward(&self, in_types: &[TypeInfo]) -> std::result::Result<(), type_check::InvalidType> {
        type_check::expect_size(in_types, 1)
    }

    fn forward(&self, inputs: &[T]) -> Result<Vec<T>> {
        let x = single_input(inputs, "Tile")?;
        Ok(vec![x.tile(self.reps.as_slice())?])
    }

    fn backward(&self, inputs: &[T], grad_outputs: &[T]) -> Result<Vec<T>> {
        let x = single_input(inputs, "Tile")?;
        let gy = single_input(grad_outputs, "Tile")?;

        let (shape, reps) = align_ranks(x.shape(), self.reps.as_slice());
        let expected = self.output_shape(x.shape())?;
        if gy.shape() != expected.as_slice() {
            return Err(Error::ShapeMismatch {
                expected,
                got: gy.shape().to_vec(),
            });
        }

        // An empty input has nothing to accumulate, however many replicas
        if x.is_empty() {
            return Ok(vec![x.zeros_like()]);
        }

        let mut gx = T::zeros(&shape);
        for index in tile_indices(&reps, &shape)? {
            gx.add_assign(&gy.slice(&index)?)?;
        }

        if x.ndim() < reps.len() {
            gx = gx.reshape(x.shape())?;
        }
        Ok(vec![gx])
    }
}

/// Construct an array by tiling `x`
///
/// # Example
///
/// ```
/// use ndarray::ArrayD;
/// use teselar::{functions::tile, Variable};
///
/// let x: Variable<ArrayD<f32>> = Variable::from_f64_vec(&[2, 3], vec![0.0; 6], true)?;
/// let y = tile(&x, [2usize, 2])?;
/// assert_eq!(y.shape(), &[4, 6]);
/// # Ok::<(), teselar::Error>(())
/// ```
pub fn tile<T, R>(x: &Variable<T>, reps: R) -> Result<Variable<T>>
where
    T: TensorData,
    R: TryInto<Reps>,
    Error: From<R::Error>,
{
    apply_single(Tile::new(reps)?, x)
}
