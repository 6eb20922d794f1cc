#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ndarray::ArrayD;
use teselar::{backward, tile, TensorData, Tile, Variable};

/// Fuzz target for tile construction, forward and backward
///
/// Arbitrary signed reps and small shapes must either be rejected with an
/// error or produce an output of the aligned product shape whose gradient
/// has the input's shape.

#[derive(Arbitrary, Debug)]
struct TileFuzzInput {
    shape: Vec<u8>, // Input dims, each limited to 0..4
    reps: Vec<i8>,  // Signed reps, negatives must be rejected
}

fuzz_target!(|input: TileFuzzInput| {
    let shape: Vec<usize> = input.shape.iter().take(3).map(|&d| (d % 4) as usize).collect();
    let reps: Vec<i64> = input.reps.iter().take(4).map(|&r| i64::from(r % 4)).collect();

    // Invariant 1: negative reps are a construction error, never a panic
    let function = match Tile::new(reps.clone()) {
        Ok(function) => function,
        Err(_) => {
            assert!(reps.iter().any(|&r| r < 0));
            return;
        }
    };

    let n: usize = shape.iter().product();
    let x: Variable<ArrayD<f32>> = match Variable::from_f64_vec(&shape, vec![1.0; n], true) {
        Ok(x) => x,
        Err(_) => return,
    };

    // Invariant 2: output shape matches the rank-aligned product
    let y = tile(&x, function.reps().clone()).expect("valid reps must tile");
    let expected = function.output_shape(&shape).expect("small reps cannot overflow");
    assert_eq!(y.shape(), expected.as_slice());

    // Invariant 3: gradient has the input's shape and counts replicas
    backward(&y, None).expect("backward of tile must succeed");
    let gx = x.grad().expect("input requires grad");
    assert_eq!(TensorData::shape(&gx), shape.as_slice());
    let copies: f64 = function.reps().as_slice().iter().map(|&r| r as f64).product();
    assert!(gx.to_f64_vec().iter().all(|&g| g == copies));
});
