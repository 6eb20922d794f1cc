//! # Teselar: differentiable tiling and splitting
//!
//! Teselar provides `tile` and `split_axis` as nodes in a tape-based
//! reverse-mode autograd graph, with finite-difference gradient checking and
//! declarative YAML runs.
//!
//! ## Architecture
//!
//! - **autograd**: Variables, type-checked function application, backward pass
//! - **functions**: Tile, SplitAxis, Concat
//! - **gradient_check**: Numerical gradients and tolerance comparison
//! - **config**: YAML run specs, validation, CLI arguments
//!
//! ## Example
//!
//! ```
//! use ndarray::{ArrayD, IxDyn};
//! use teselar::{backward, tile, Variable};
//!
//! let x: Variable<ArrayD<f32>> = Variable::from_f64_vec(&[2, 3], (0..6).map(f64::from).collect(), true)?;
//! let y = tile(&x, [2usize, 2])?;
//! assert_eq!(y.shape(), &[4, 6]);
//!
//! backward(&y, Some(ArrayD::ones(IxDyn(&[4, 6]))))?;
//! assert!(x.grad().unwrap().iter().all(|&g| g == 4.0));
//! # Ok::<(), teselar::Error>(())
//! ```

pub mod autograd;
pub mod config;
pub mod functions;
pub mod gradient_check;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Context, DType, Function, TensorData, Variable};
pub use error::{Error, Result};
pub use functions::{concat, split_axis, tile, Concat, IndicesOrSections, Reps, SplitAxis, Tile};
