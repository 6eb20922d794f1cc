//! Backward operation trait

use crate::error::Result;
use std::rc::Rc;

/// A recorded graph node that can push gradients to its inputs
pub trait BackwardOp<T> {
    /// Name of the function that created this node
    fn name(&self) -> &str;

    /// Topological depth; a node always outranks the creators of its inputs
    fn generation(&self) -> usize;

    /// Read the output gradients and accumulate input gradients
    fn backward(&self) -> Result<()>;

    /// Nodes that created this node's inputs
    fn input_creators(&self) -> Vec<Rc<dyn BackwardOp<T>>>;
}
