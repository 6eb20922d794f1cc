//! Splitting an array along one axis

use super::single_input;
use crate::autograd::{apply, type_check, Function, TensorData, TypeInfo, Variable};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Where to cut: explicit offsets, or a number of equal sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicesOrSections {
    Indices(Vec<usize>),
    Sections(usize),
}

impl IndicesOrSections {
    /// Split offsets for an axis of length `len`
    pub fn boundaries(&self, len: usize) -> Result<Vec<usize>> {
        match self {
            IndicesOrSections::Indices(indices) => Ok(indices.clone()),
            IndicesOrSections::Sections(0) => {
                Err(Error::ValueError("number of sections must be larger than 0".into()))
            }
            IndicesOrSections::Sections(n) if len % n != 0 => Err(Error::ValueError(format!(
                "array split does not result in an equal division: {} into {}",
                len, n
            ))),
            IndicesOrSections::Sections(n) => Ok((1..*n).map(|i| i * (len / n)).collect()),
        }
    }
}

impl From<usize> for IndicesOrSections {
    fn from(sections: usize) -> Self {
        IndicesOrSections::Sections(sections)
    }
}

impl From<Vec<usize>> for IndicesOrSections {
    fn from(indices: Vec<usize>) -> Self {
        IndicesOrSections::Indices(indices)
    }
}

impl<const N: usize> From<[usize; N]> for IndicesOrSections {
    fn from(indices: [usize; N]) -> Self {
        IndicesOrSections::Indices(indices.to_vec())
    }
}

/// Split an array along an axis into multiple arrays
///
/// Backward concatenates the piece gradients, so it is the exact inverse of
/// forward: no arithmetic happens in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAxis {
    indices_or_sections: IndicesOrSections,
    axis: usize,
}

impl SplitAxis {
    pub fn new(indices_or_sections: impl Into<IndicesOrSections>, axis: usize) -> Self {
        Self {
            indices_or_sections: indices_or_sections.into(),
            axis,
        }
    }

    pub fn indices_or_sections(&self) -> &IndicesOrSections {
        &self.indices_or_sections
    }

    pub fn axis(&self) -> usize {
        self.axis
    }
}

impl<T: TensorData> Function<T> for SplitAxis {
    fn name(&self) -> &str {
        "SplitAxis"
    }

    fn check_type_forward(&self, in_types: &[TypeInfo]) -> std::result::Result<(), type_check::InvalidType> {
        type_check::expect_size(in_types, 1)?;
        type_check::expect_ndim_gt(in_types, 0, self.axis)?;

        if let IndicesOrSections::Sections(n) = self.indices_or_sections {
            let len = in_types[0].shape[self.axis];
            if n == 0 || len % n != 0 {
                return Err(type_check::InvalidType::new(
                    format!("in_types[0].shape[{}] % {} == 0", self.axis, n),
                    format!("in_types[0].shape[{}] = {}", self.axis, len),
                ));
            }
        }
        Ok(())
    }

    fn forward(&self, inputs: &[T]) -> Result<Vec<T>> {
        let x = single_input(inputs, "SplitAxis")?;
        if self.axis >= x.ndim() {
            return Err(Error::ValueError(format!(
                "axis {} out of range for {}-d array",
                self.axis,
                x.ndim()
            )));
        }
        let boundaries = self.indices_or_sections.boundaries(x.shape()[self.axis])?;
        x.split(self.axis, &boundaries)
    }

    fn backward(&self, _inputs: &[T], grad_outputs: &[T]) -> Result<Vec<T>> {
        Ok(vec![T::concatenate(self.axis, grad_outputs)?])
    }
}

/// Split `x` along `axis` into a sequence of variables
pub fn split_axis<T: TensorData>(
    x: &Variable<T>,
    indices_or_sections: impl Into<IndicesOrSections>,
    axis: usize,
) -> Result<Vec<Variable<T>>> {
    apply(SplitAxis::new(indices_or_sections, axis), &[x])
}
