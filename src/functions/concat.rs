//! Concatenation along one axis, the inverse of [`SplitAxis`](super::SplitAxis)

use crate::autograd::{apply, type_check, Function, TensorData, TypeInfo, Variable};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concat {
    axis: usize,
}

impl Concat {
    pub fn new(axis: usize) -> Self {
        Self { axis }
    }

    pub fn axis(&self) -> usize {
        self.axis
    }
}

impl<T: TensorData> Function<T> for Concat {
    fn name(&self) -> &str {
        "Concat"
    }

    fn check_type_forward(&self, in_types: &[TypeInfo]) -> std::result::Result<(), type_check::InvalidType> {
        type_check::expect_size_at_least(in_types, 1)?;
        type_check::expect_ndim_gt(in_types, 0, self.axis)?;
        for index in 1..in_types.len() {
            type_check::expect_compatible_except_axis(&in_types[0], in_types, index, self.axis)?;
        }
        Ok(())
    }

    fn forward(&self, inputs: &[T]) -> Result<Vec<T>> {
        Ok(vec![T::concatenate(self.axis, inputs)?])
    }

    fn backward(&self, inputs: &[T], grad_outputs: &[T]) -> Result<Vec<T>> {
        let gy = grad_outputs
            .first()
            .ok_or_else(|| Error::InvalidGradient("Concat expects one output gradient".into()))?;
        let mut boundaries = Vec::with_capacity(inputs.len().saturating_sub(1));
        let mut offset = 0;
        for x in &inputs[..inputs.len().saturating_sub(1)] {
            offset += x.shape()[self.axis];
            boundaries.push(offset);
        }
        gy.split(self.axis, &boundaries)
    }
}

/// Concatenate `xs` along `axis`
pub fn concat<T: TensorData>(xs: &[&Variable<T>], axis: usize) -> Result<Variable<T>> {
    apply(Concat::new(axis), xs)?
        .pop()
        .ok_or_else(|| Error::BackwardFailed("Concat produced no output".into()))
}
