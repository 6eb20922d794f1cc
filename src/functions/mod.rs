//! Differentiable array functions
//!
//! - **tile**: replicate an array along each axis
//! - **split_axis**: cut an array into pieces along one axis
//! - **concat**: join arrays along one axis

mod concat;
mod split_axis;
mod tile;

#[cfg(test)]
mod tests;

pub use concat::{concat, Concat};
pub use split_axis::{split_axis, IndicesOrSections, SplitAxis};
pub use tile::{tile, Reps, Tile};

use crate::error::{Error, Result};

fn single_input<'a, T>(inputs: &'a [T], name: &str) -> Result<&'a T> {
    match inputs {
        [x] => Ok(x),
        _ => Err(Error::ValueError(format!(
            "{} expects exactly one input, got {}",
            name,
            inputs.len()
        ))),
    }
}
