//! Tape-based autograd layer
//!
//! Hosts the differentiable functions: variables with shared gradient cells,
//! type-checked function application, and a generation-ordered backward pass.

mod array;
mod backward;
mod context;
mod function;
pub mod type_check;
mod variable;


pub use array::{align_ranks, tiled_shape, DType, Element, TensorData};
pub use backward::BackwardOp;
pub use context::Context;
pub use function::{apply, apply_in, Function};
pub(crate) use function::apply_single;
pub use type_check::{InvalidType, TypeInfo};
pub use variable::{GradCell, Variable};

use crate::error::Result;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;

/// Perform backward pass starting at `variable`
///
/// The seed gradient is `grad_output` if given, otherwise the gradient
/// already stored on `variable`, otherwise ones. Every node reachable from
/// `variable` runs once, highest generation first, so a node sees the full
/// gradient of all its outputs before it propagates.
pub fn backward<T: TensorData>(variable: &Variable<T>, grad_output: Option<T>) -> Result<()> {
    match grad_output {
        Some(grad) => variable.set_grad(grad)?,
        None if variable.grad().is_none() => variable.set_grad(variable.data().ones_like())?,
        None => {}
    }

    let Some(root) = variable.creator() else {
        return Ok(());
    };

    let mut queue = BinaryHeap::new();
    let mut seen = HashSet::new();
    seen.insert(node_id(&root));
    queue.push(Pending(root));

    while let Some(Pending(node)) = queue.pop() {
        node.backward()?;
        for creator in node.input_creators() {
            if seen.insert(node_id(&creator)) {
                queue.push(Pending(creator));
            }
        }
    }
    Ok(())
}

fn node_id<T>(node: &Rc<dyn BackwardOp<T>>) -> *const () {
    Rc::as_ptr(node) as *const ()
}

/// Heap entry ordered by generation
struct Pending<T>(Rc<dyn BackwardOp<T>>);

impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.generation() == other.0.generation()
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Pending<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.generation().cmp(&other.0.generation())
    }
}
