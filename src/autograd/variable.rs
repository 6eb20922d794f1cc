//! Variable type with gradient tracking

use super::{BackwardOp, DType, TensorData};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared slot holding a gradient
pub type GradCell<T> = Rc<RefCell<Option<T>>>;

/// Array with automatic differentiation support
///
/// Clones share the gradient cell, so a clone captured by a graph node
/// accumulates into the same gradient the caller reads.
#[derive(Clone)]
pub struct Variable<T: TensorData> {
    data: T,
    grad: GradCell<T>,
    creator: Option<Rc<dyn BackwardOp<T>>>,
    requires_grad: bool,
}

impl<T: TensorData> Variable<T> {
    /// Create a new variable with data
    pub fn new(data: T, requires_grad: bool) -> Self {
        Self {
            data,
            grad: Rc::new(RefCell::new(None)),
            creator: None,
            requires_grad,
        }
    }

    /// Create a variable from row-major values
    pub fn from_f64_vec(shape: &[usize], values: Vec<f64>, requires_grad: bool) -> Result<Self> {
        Ok(Self::new(T::from_f64_vec(shape, values)?, requires_grad))
    }

    /// Create a variable filled with zeros
    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        Self::new(T::zeros(shape), requires_grad)
    }

    /// Create a variable filled with ones
    pub fn ones(shape: &[usize], requires_grad: bool) -> Self {
        Self::new(T::ones(shape), requires_grad)
    }

    /// Get reference to data
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consume the variable, keeping only its data
    pub fn into_data(self) -> T {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get gradient (if computed)
    pub fn grad(&self) -> Option<T> {
        self.grad.borrow().clone()
    }

    /// Set gradient, replacing any previous one
    pub fn set_grad(&self, grad: T) -> Result<()> {
        self.check_grad_shape(&grad)?;
        *self.grad.borrow_mut() = Some(grad);
        Ok(())
    }

    /// Accumulate gradient (for when the variable is used multiple times)
    pub fn accumulate_grad(&self, grad: T) -> Result<()> {
        self.check_grad_shape(&grad)?;
        let mut grad_ref = self.grad.borrow_mut();
        match grad_ref.as_mut() {
            Some(existing) => existing.add_assign(&grad)?,
            None => *grad_ref = Some(grad),
        }
        Ok(())
    }

    /// Zero out gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Check if requires gradient
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Get reference to gradient cell (for graph nodes)
    pub fn grad_cell(&self) -> GradCell<T> {
        self.grad.clone()
    }

    /// Set the node that produced this variable
    pub(crate) fn set_creator(&mut self, creator: Rc<dyn BackwardOp<T>>) {
        self.creator = Some(creator);
    }

    /// Node that produced this variable, if it was recorded
    pub fn creator(&self) -> Option<Rc<dyn BackwardOp<T>>> {
        self.creator.clone()
    }

    /// Generation of the creator node, 0 for leaves
    pub fn generation(&self) -> usize {
        self.creator.as_ref().map_or(0, |c| c.generation())
    }

    fn check_grad_shape(&self, grad: &T) -> Result<()> {
        if grad.shape() != self.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: grad.shape().to_vec(),
            });
        }
        if grad.dtype() != self.dtype() {
            return Err(Error::InvalidGradient(format!(
                "gradient dtype {} does not match variable dtype {}",
                grad.dtype(),
                self.dtype()
            )));
        }
        Ok(())
    }
}

impl<T: TensorData> std::fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("data", &self.data)
            .field("grad", &self.grad.borrow())
            .field("creator", &self.creator.as_ref().map(|c| c.name().to_string()))
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}
