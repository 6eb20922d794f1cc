//! Differentiable functions and the graph nodes that record them

use super::type_check::{InvalidType, TypeInfo};
use super::{BackwardOp, Context, GradCell, TensorData, Variable};
use crate::error::{Error, Result};
use std::rc::Rc;

/// A differentiable operation on arrays
///
/// Implementors see raw arrays only; graph bookkeeping is done by [`apply`].
pub trait Function<T: TensorData>: 'static {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Validate inputs before forward runs
    fn check_type_forward(&self, _in_types: &[TypeInfo]) -> std::result::Result<(), InvalidType> {
        Ok(())
    }

    /// Compute outputs from inputs
    fn forward(&self, inputs: &[T]) -> Result<Vec<T>>;

    /// Compute one gradient per input from one gradient per output
    ///
    /// `grad_outputs` is complete: outputs that never received a gradient
    /// are passed as zeros of their shape.
    fn backward(&self, inputs: &[T], grad_outputs: &[T]) -> Result<Vec<T>>;
}

/// Apply `function` with the default [`Context`]
pub fn apply<T, F>(function: F, inputs: &[&Variable<T>]) -> Result<Vec<Variable<T>>>
where
    T: TensorData,
    F: Function<T>,
{
    apply_in(&Context::default(), function, inputs)
}

/// Apply `function`, recording a graph node when any input requires grad
pub fn apply_in<T, F>(ctx: &Context, function: F, inputs: &[&Variable<T>]) -> Result<Vec<Variable<T>>>
where
    T: TensorData,
    F: Function<T>,
{
    if ctx.is_type_check_enabled() {
        let in_types: Vec<TypeInfo> = inputs.iter().map(|v| TypeInfo::of(v.data())).collect();
        function.check_type_forward(&in_types)?;
    }

    let in_data: Vec<T> = inputs.iter().map(|v| v.data().clone()).collect();
    let out_data = function.forward(&in_data)?;
    tracing::debug!(
        function = function.name(),
        inputs = ?in_data.iter().map(|d| d.shape().to_vec()).collect::<Vec<_>>(),
        outputs = ?out_data.iter().map(|d| d.shape().to_vec()).collect::<Vec<_>>(),
        "forward"
    );

    let requires_grad = ctx.is_backprop_enabled() && inputs.iter().any(|v| v.requires_grad());
    let mut outputs: Vec<Variable<T>> = out_data
        .into_iter()
        .map(|d| Variable::new(d, requires_grad))
        .collect();

    if requires_grad {
        let generation = inputs.iter().map(|v| v.generation()).max().unwrap_or(0) + 1;
        let node: Rc<dyn BackwardOp<T>> = Rc::new(FunctionNode {
            function,
            inputs: inputs.iter().map(|v| (*v).clone()).collect(),
            output_grads: outputs.iter().map(|o| o.grad_cell()).collect(),
            output_shapes: outputs.iter().map(|o| o.shape().to_vec()).collect(),
            generation,
        });
        for output in &mut outputs {
            output.set_creator(node.clone());
        }
    }

    Ok(outputs)
}

/// Apply a function that has exactly one output
pub(crate) fn apply_single<T, F>(function: F, input: &Variable<T>) -> Result<Variable<T>>
where
    T: TensorData,
    F: Function<T>,
{
    let name = function.name().to_string();
    apply(function, &[input])?
        .pop()
        .ok_or_else(|| Error::BackwardFailed(format!("{} produced no output", name)))
}

struct FunctionNode<T: TensorData, F> {
    function: F,
    inputs: Vec<Variable<T>>,
    output_grads: Vec<GradCell<T>>,
    output_shapes: Vec<Vec<usize>>,
    generation: usize,
}

impl<T, F> BackwardOp<T> for FunctionNode<T, F>
where
    T: TensorData,
    F: Function<T>,
{
    fn name(&self) -> &str {
        self.function.name()
    }

    fn generation(&self) -> usize {
        self.generation
    }

    fn backward(&self) -> Result<()> {
        let grad_outputs: Vec<T> = self
            .output_grads
            .iter()
            .zip(&self.output_shapes)
            .map(|(cell, shape)| cell.borrow().clone().unwrap_or_else(|| T::zeros(shape)))
            .collect();
        let in_data: Vec<T> = self.inputs.iter().map(|v| v.data().clone()).collect();

        let grad_inputs = self.function.backward(&in_data, &grad_outputs)?;
        if grad_inputs.len() != self.inputs.len() {
            return Err(Error::BackwardFailed(format!(
                "{} returned {} gradients for {} inputs",
                self.function.name(),
                grad_inputs.len(),
                self.inputs.len()
            )));
        }
        tracing::debug!(
            function = self.function.name(),
            generation = self.generation,
            "backward"
        );

        for (input, grad) in self.inputs.iter().zip(grad_inputs) {
            if input.requires_grad() {
                input.accumulate_grad(grad)?;
            }
        }
        Ok(())
    }

    fn input_creators(&self) -> Vec<Rc<dyn BackwardOp<T>>> {
        self.inputs.iter().filter_map(|v| v.creator()).collect()
    }
}
