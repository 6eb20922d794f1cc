//! YAML schema for a declarative operator run

use crate::autograd::DType;
use crate::functions::IndicesOrSections;
use crate::gradient_check::GradCheckConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Complete run config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpSpec {
    /// Input array
    pub input: InputSpec,

    /// Function to apply, written as a single-key map (`tile: {reps: 2}`)
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub op: OpKind,

    /// Gradient check tolerances
    #[serde(default)]
    pub gradcheck: GradCheckConfig,
}

/// Input array description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Shape; `[]` is a scalar
    pub shape: Vec<usize>,

    /// Element dtype
    #[serde(default)]
    pub dtype: DType,

    /// How to fill the array
    #[serde(default)]
    pub init: InitSpec,
}

impl InputSpec {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Input fill
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitSpec {
    /// 0, 1, 2, ... in row-major order
    #[default]
    Arange,
    Zeros,
    Ones,
    /// Seeded uniform samples in `[low, high)`
    Uniform {
        #[serde(default = "default_low")]
        low: f64,
        #[serde(default = "default_high")]
        high: f64,
        #[serde(default)]
        seed: u64,
    },
}

impl InitSpec {
    /// Row-major values for `n` elements
    pub fn values(&self, n: usize) -> Vec<f64> {
        match self {
            InitSpec::Arange => (0..n).map(|i| i as f64).collect(),
            InitSpec::Zeros => vec![0.0; n],
            InitSpec::Ones => vec![1.0; n],
            InitSpec::Uniform { low, high, seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                (0..n).map(|_| rng.random_range(*low..*high)).collect()
            }
        }
    }
}

/// Function selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// `tile(x, reps)`; reps is an int or a list of ints
    Tile { reps: serde_yaml::Value },

    /// `split_axis(x, indices_or_sections, axis)`
    SplitAxis {
        indices_or_sections: IndicesOrSections,
        axis: usize,
    },
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Tile { .. } => "tile",
            OpKind::SplitAxis { .. } => "split_axis",
        }
    }
}

fn default_low() -> f64 {
    -1.0
}

fn default_high() -> f64 {
    1.0
}
