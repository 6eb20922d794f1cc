//! Tests for tile, split_axis and concat

use super::*;
use crate::autograd::{apply, apply_in, backward, Context, DType, Function, TensorData, Variable};
use crate::error::Error;
use crate::gradient_check::{allclose, check_backward, GradCheckConfig};
use ndarray::{ArrayD, Axis, IxDyn};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn arange<T: TensorData>(shape: &[usize]) -> T {
    let n = shape.iter().product::<usize>();
    T::from_f64_vec(shape, (0..n).map(|v| v as f64).collect()).unwrap()
}

fn uniform<T: TensorData>(shape: &[usize], rng: &mut StdRng) -> T {
    let n = shape.iter().product::<usize>();
    T::from_f64_vec(shape, (0..n).map(|_| rng.random_range(-1.0..1.0)).collect()).unwrap()
}

/// Tiling built from repeated concatenation, independent of the backend's
/// own `tile`
fn reference_tile(x: &ArrayD<f64>, reps: &[usize]) -> ArrayD<f64> {
    let (shape, reps) = crate::autograd::align_ranks(x.shape(), reps);
    let mut out = x.to_shape(IxDyn(&shape)).unwrap().into_owned();
    for (axis, &r) in reps.iter().enumerate() {
        if r == 0 {
            let mut empty = out.shape().to_vec();
            empty[axis] = 0;
            out = ArrayD::zeros(IxDyn(&empty));
        } else {
            let tiled = {
                let copies = vec![out.view(); r];
                ndarray::concatenate(Axis(axis), &copies).unwrap()
            };
            out = tiled;
        }
    }
    out
}

fn tile_shapes() -> Vec<Vec<usize>> {
    vec![vec![], vec![2], vec![2, 3]]
}

fn tile_reps() -> Vec<Reps> {
    vec![
        Reps::from(Vec::<usize>::new()),
        Reps::from(0usize),
        Reps::from(2usize),
        Reps::from([0usize, 0]),
        Reps::from([2usize, 2]),
    ]
}

#[cfg(test)]
mod tile_tests {
    use super::*;

    #[test]
    fn test_tile_forward_matches_reference() {
        let mut rng = StdRng::seed_from_u64(0);
        for shape in tile_shapes() {
            for reps in tile_reps() {
                let x: ArrayD<f64> = uniform(&shape, &mut rng);
                let v = Variable::new(x.clone(), false);
                let y = tile(&v, reps.clone()).unwrap();

                let expected = reference_tile(&x, reps.as_slice());
                assert_eq!(y.data(), &expected, "shape {:?} reps {:?}", shape, reps);
                assert_eq!(y.dtype(), DType::F64);
            }
        }
    }

    #[test]
    fn test_tile_forward_preserves_f32() {
        let mut rng = StdRng::seed_from_u64(1);
        for shape in tile_shapes() {
            for reps in tile_reps() {
                let x: ArrayD<f32> = uniform(&shape, &mut rng);
                let y = tile(&Variable::new(x.clone(), false), reps.clone()).unwrap();

                let expected = reference_tile(&x.mapv(f64::from), reps.as_slice());
                assert_eq!(y.dtype(), DType::F32);
                assert_eq!(y.shape(), expected.shape());
                assert_eq!(y.data().to_f64_vec(), expected.to_f64_vec());
            }
        }
    }

    #[test]
    fn test_tile_backward_gradient_check_f32() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = GradCheckConfig::default().with_eps(1e-2);
        for shape in tile_shapes() {
            for reps in tile_reps() {
                let function = Tile::new(reps.clone()).unwrap();
                let x: ArrayD<f32> = uniform(&shape, &mut rng);
                let gy: ArrayD<f32> = uniform(&function.output_shape(&shape).unwrap(), &mut rng);

                let report = check_backward(function, &[x], &[gy], &config).unwrap();
                assert!(report.passed, "shape {:?} reps {:?}: {:?}", shape, reps, report);
            }
        }
    }

    #[test]
    fn test_tile_backward_gradient_check_f64() {
        let mut rng = StdRng::seed_from_u64(3);
        for shape in tile_shapes() {
            for reps in tile_reps() {
                let function = Tile::new(reps.clone()).unwrap();
                let x: ArrayD<f64> = uniform(&shape, &mut rng);
                let gy: ArrayD<f64> = uniform(&function.output_shape(&shape).unwrap(), &mut rng);

                let report = check_backward(function, &[x], &[gy], &GradCheckConfig::strict()).unwrap();
                assert!(report.passed, "shape {:?} reps {:?}: {:?}", shape, reps, report);
                assert_eq!(report.num_params, shape.iter().product::<usize>());
            }
        }
    }

    #[test]
    fn test_tile_two_by_two() {
        let x: Variable<ArrayD<f32>> = Variable::new(arange(&[2, 3]), true);
        let y = tile(&x, [2usize, 2]).unwrap();

        assert_eq!(y.shape(), &[4, 6]);
        assert_eq!(
            y.data().to_f64_vec(),
            vec![
                0., 1., 2., 0., 1., 2., //
                3., 4., 5., 3., 4., 5., //
                0., 1., 2., 0., 1., 2., //
                3., 4., 5., 3., 4., 5.,
            ]
        );

        backward(&y, Some(ArrayD::ones(IxDyn(&[4, 6])))).unwrap();
        let gx = x.grad().unwrap();
        assert_eq!(gx.shape(), &[2, 3]);
        assert!(gx.iter().all(|&g| g == 4.0));
    }

    #[test]
    fn test_tile_zero_reps() {
        let x: Variable<ArrayD<f32>> = Variable::new(arange(&[2, 3]), true);
        let y = tile(&x, 0usize).unwrap();
        assert_eq!(y.shape(), &[2, 0]);
        assert!(y.is_empty());

        backward(&y, Some(ArrayD::zeros(IxDyn(&[2, 0])))).unwrap();
        let gx = x.grad().unwrap();
        assert_eq!(gx.shape(), &[2, 3]);
        assert!(gx.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_tile_all_ones_is_identity() {
        let x: Variable<ArrayD<f64>> = Variable::new(arange(&[2, 3]), true);
        let y = tile(&x, [1usize, 1]).unwrap();
        assert_eq!(y.data(), x.data());

        let gy: ArrayD<f64> = arange(&[2, 3]);
        backward(&y, Some(gy.clone())).unwrap();
        assert_eq!(x.grad().unwrap(), gy);
    }

    #[test]
    fn test_tile_long_reps_drops_leading_axes_in_grad() {
        let x: Variable<ArrayD<f64>> = Variable::new(arange(&[3]), true);
        let y = tile(&x, [2usize, 1, 2]).unwrap();
        assert_eq!(y.shape(), &[2, 1, 6]);

        backward(&y, None).unwrap();
        assert_eq!(x.grad().unwrap().to_f64_vec(), vec![4.0; 3]);
    }

    #[test]
    fn test_tile_backward_sums_replicas() {
        let x: ArrayD<f64> = arange(&[2]);
        let gy: ArrayD<f64> = arange(&[2, 4]);
        let gx = <Tile as Function<ArrayD<f64>>>::backward(&Tile::new([2usize, 2]).unwrap(), &[x], &[gy]).unwrap();
        // replicas: [0,1] [2,3] [4,5] [6,7]
        assert_eq!(gx[0].to_f64_vec(), vec![12.0, 16.0]);
    }

    #[test]
    fn test_tile_backward_rejects_wrong_grad_shape() {
        let x: ArrayD<f64> = arange(&[2]);
        let gy: ArrayD<f64> = arange(&[3]);
        let err = <Tile as Function<ArrayD<f64>>>::backward(&Tile::new(2usize).unwrap(), &[x], &[gy]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_tile_negative_reps_value_error() {
        let x: Variable<ArrayD<f32>> = Variable::new(arange(&[2]), false);
        assert!(matches!(tile(&x, -1i64), Err(Error::ValueError(_))));
        assert!(matches!(tile(&x, [-1i64, -1]), Err(Error::ValueError(_))));
        assert!(matches!(Tile::new(vec![2i64, -3]), Err(Error::ValueError(_))));
    }

    #[test]
    fn test_tile_non_integer_reps_type_error() {
        let x: Variable<ArrayD<f32>> = Variable::new(arange(&[2]), false);
        for text in ["a", "1.5", "[1, b]", "{n: 2}"] {
            let reps: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
            assert!(matches!(tile(&x, &reps), Err(Error::TypeError(_))), "reps {}", text);
        }
    }

    #[test]
    fn test_tile_reps_from_config_value() {
        let reps: serde_yaml::Value = serde_yaml::from_str("[2, 2]").unwrap();
        assert_eq!(Tile::new(&reps).unwrap().reps().as_slice(), &[2, 2]);

        let reps: serde_yaml::Value = serde_yaml::from_str("3").unwrap();
        assert_eq!(Tile::new(&reps).unwrap().reps().as_slice(), &[3]);

        let reps: serde_yaml::Value = serde_yaml::from_str("[-1]").unwrap();
        assert!(matches!(Tile::new(&reps), Err(Error::ValueError(_))));
    }

    #[test]
    fn test_tile_two_inputs_invalid_type() {
        let x: Variable<ArrayD<f32>> = Variable::new(arange(&[2]), false);
        let err = apply(Tile::new(2usize).unwrap(), &[&x, &x]).unwrap_err();
        assert!(matches!(err, Error::InvalidType(_)));
    }

    #[test]
    fn test_tile_output_shape() {
        let tile = Tile::new([2usize, 2]).unwrap();
        assert_eq!(tile.output_shape(&[2, 3]).unwrap(), vec![4, 6]);
        assert_eq!(tile.output_shape(&[]).unwrap(), vec![2, 2]);
        assert_eq!(Tile::new(0usize).unwrap().output_shape(&[2, 3]).unwrap(), vec![2, 0]);
        assert_eq!(Tile::new(Reps::default()).unwrap().output_shape(&[]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_tile_overflowing_reps_value_error() {
        let x: Variable<ArrayD<f32>> = Variable::new(arange(&[4]), true);

        let huge = Tile::new(usize::MAX / 2).unwrap();
        assert!(matches!(huge.output_shape(&[4]), Err(Error::ValueError(_))));
        assert!(matches!(tile(&x, usize::MAX / 2), Err(Error::ValueError(_))));
        assert!(matches!(tile(&x, 1i64 << 62), Err(Error::ValueError(_))));

        // every extent fits on its own, the element count does not
        assert!(matches!(tile(&x, [1usize << 32, 1 << 32]), Err(Error::ValueError(_))));
        assert!(x.grad().is_none());
    }

    #[test]
    fn test_tile_extreme_reps_on_empty_input() {
        // zero elements: the output stays empty and backward does not walk
        // every replica
        let x: Variable<ArrayD<f64>> = Variable::new(arange(&[0]), true);
        let y = tile(&x, [1usize << 40, 1]).unwrap();
        assert_eq!(y.shape(), &[1usize << 40, 0]);

        backward(&y, None).unwrap();
        assert_eq!(x.grad().unwrap().shape(), &[0]);
    }

    #[test]
    fn test_tile_backend_rejects_overflow() {
        let x: ArrayD<f64> = arange(&[3]);
        let err = TensorData::tile(&x, &[usize::MAX]).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_tile_bool_reps_from_config_value() {
        let reps: serde_yaml::Value = serde_yaml::from_str("true").unwrap();
        assert_eq!(Tile::new(&reps).unwrap().reps().as_slice(), &[1]);

        let reps: serde_yaml::Value = serde_yaml::from_str("[2, false]").unwrap();
        assert_eq!(Tile::new(&reps).unwrap().reps().as_slice(), &[2, 0]);
    }
}

#[cfg(test)]
mod split_axis_tests {
    use super::*;

    type Array32 = ArrayD<f32>;

    /// (shape, indices_or_sections, axis, expected ranges along axis)
    fn cases() -> Vec<(Vec<usize>, IndicesOrSections, usize, Vec<std::ops::Range<usize>>)> {
        vec![
            (vec![2, 7, 3], IndicesOrSections::from([2usize, 5]), 1, vec![0..2, 2..5, 5..7]),
            (vec![7, 3], IndicesOrSections::from([2usize, 5]), 0, vec![0..2, 2..5, 5..7]),
            (vec![2, 9, 3], IndicesOrSections::from(3usize), 1, vec![0..3, 3..6, 6..9]),
        ]
    }

    fn reference_piece(x: &Array32, axis: usize, range: std::ops::Range<usize>) -> Array32 {
        let ranges: Vec<_> = x
            .shape()
            .iter()
            .enumerate()
            .map(|(d, &n)| if d == axis { range.clone() } else { 0..n })
            .collect();
        TensorData::slice(x, &ranges).unwrap()
    }

    #[test]
    fn test_split_axis_forward_exact() {
        for (shape, ios, axis, ranges) in cases() {
            let x: Array32 = arange(&shape);
            let ys = split_axis(&Variable::new(x.clone(), false), ios, axis).unwrap();

            assert_eq!(ys.len(), ranges.len());
            for (y, range) in ys.iter().zip(ranges) {
                assert!(allclose(y.data(), &reference_piece(&x, axis, range), 0.0, 0.0));
            }
        }
    }

    #[test]
    fn test_split_axis_backward_exact() {
        for (shape, ios, axis, _) in cases() {
            let x = Variable::new(arange::<Array32>(&shape), true);
            let ys = split_axis(&x, ios, axis).unwrap();
            for y in &ys {
                y.set_grad(y.data().clone()).unwrap();
            }
            backward(&ys[0], None).unwrap();

            assert!(allclose(x.data(), &x.grad().unwrap(), 0.0, 0.0));
        }
    }

    #[test]
    fn test_split_axis_gradient_check() {
        let mut rng = StdRng::seed_from_u64(4);
        for (shape, ios, axis, ranges) in cases() {
            let x: Array32 = uniform(&shape, &mut rng);
            let gys: Vec<Array32> = ranges
                .iter()
                .map(|r| {
                    let mut piece = shape.clone();
                    piece[axis] = r.len();
                    uniform(&piece, &mut rng)
                })
                .collect();

            let config = GradCheckConfig::default().with_eps(1e-2);
            let report = check_backward(SplitAxis::new(ios, axis), &[x], &gys, &config).unwrap();
            assert!(report.passed, "{:?}", report);
        }
    }

    #[test]
    fn test_split_axis_uneven_sections_invalid_type() {
        let x = Variable::new(arange::<Array32>(&[2, 7, 3]), false);
        let err = split_axis(&x, 3usize, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidType(_)));

        assert!(matches!(split_axis(&x, 0usize, 1), Err(Error::InvalidType(_))));
        assert!(matches!(split_axis(&x, [1usize], 3), Err(Error::InvalidType(_))));
    }

    #[test]
    fn test_split_axis_unchecked_forward_still_validates() {
        let x = Variable::new(arange::<Array32>(&[2, 7, 3]), false);
        let mut ctx = Context::new();
        ctx.set_type_check(false);

        let err = apply_in(&ctx, SplitAxis::new(3usize, 1), &[&x]).unwrap_err();
        assert!(matches!(err, Error::ValueError(_)));
        let err = apply_in(&ctx, SplitAxis::new([1usize], 5), &[&x]).unwrap_err();
        assert!(matches!(err, Error::ValueError(_)));
    }

    #[test]
    fn test_split_axis_offsets_past_end() {
        let x = Variable::new(arange::<Array32>(&[7, 3]), true);
        let ys = split_axis(&x, vec![2usize, 10], 0).unwrap();
        let lens: Vec<usize> = ys.iter().map(|y| y.shape()[0]).collect();
        assert_eq!(lens, vec![2, 5, 0]);

        backward(&ys[1], None).unwrap();
        let gx = x.grad().unwrap();
        assert_eq!(gx.shape(), &[7, 3]);
        assert_eq!(gx.to_f64_vec().iter().sum::<f64>(), 15.0);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(IndicesOrSections::Sections(3).boundaries(9).unwrap(), vec![3, 6]);
        assert_eq!(IndicesOrSections::Sections(1).boundaries(4).unwrap(), Vec::<usize>::new());
        assert!(IndicesOrSections::Sections(0).boundaries(4).is_err());
        assert!(IndicesOrSections::Sections(2).boundaries(5).is_err());
        assert_eq!(IndicesOrSections::Indices(vec![1, 4]).boundaries(2).unwrap(), vec![1, 4]);
    }

    #[test]
    fn test_indices_or_sections_from_yaml() {
        let ios: IndicesOrSections = serde_yaml::from_str("3").unwrap();
        assert_eq!(ios, IndicesOrSections::Sections(3));
        let ios: IndicesOrSections = serde_yaml::from_str("[2, 5]").unwrap();
        assert_eq!(ios, IndicesOrSections::Indices(vec![2, 5]));
    }
}

#[cfg(test)]
mod concat_tests {
    use super::*;

    #[test]
    fn test_concat_forward_and_backward() {
        let a: Variable<ArrayD<f64>> = Variable::new(arange(&[2, 1]), true);
        let b: Variable<ArrayD<f64>> = Variable::new(arange(&[2, 2]), true);
        let y = concat(&[&a, &b], 1).unwrap();
        assert_eq!(y.shape(), &[2, 3]);
        assert_eq!(y.data().to_f64_vec(), vec![0., 0., 1., 1., 2., 3.]);

        let gy: ArrayD<f64> = arange(&[2, 3]);
        backward(&y, Some(gy)).unwrap();
        assert_eq!(a.grad().unwrap().to_f64_vec(), vec![0., 3.]);
        assert_eq!(b.grad().unwrap().to_f64_vec(), vec![1., 2., 4., 5.]);
    }

    #[test]
    fn test_concat_of_split_is_identity() {
        let x = Variable::new(arange::<ArrayD<f64>>(&[2, 9, 3]), true);
        let ys = split_axis(&x, [1usize, 4], 1).unwrap();
        let refs: Vec<&Variable<ArrayD<f64>>> = ys.iter().collect();
        let z = concat(&refs, 1).unwrap();
        assert_eq!(z.data(), x.data());

        backward(&z, None).unwrap();
        assert!(x.grad().unwrap().iter().all(|&g| g == 1.0));
    }

    #[test]
    fn test_concat_type_errors() {
        let a = Variable::new(arange::<ArrayD<f64>>(&[2, 3]), false);
        let b = Variable::new(arange::<ArrayD<f64>>(&[3, 3]), false);
        assert!(matches!(concat(&[&a, &b], 1), Err(Error::InvalidType(_))));
        assert!(matches!(concat(&[&a], 2), Err(Error::InvalidType(_))));
        assert!(matches!(concat::<ArrayD<f64>>(&[], 0), Err(Error::InvalidType(_))));
        assert!(concat(&[&a, &b], 0).is_ok());
    }

    #[test]
    fn test_concat_gradient_check() {
        let mut rng = StdRng::seed_from_u64(5);
        let a: ArrayD<f64> = uniform(&[3, 2], &mut rng);
        let b: ArrayD<f64> = uniform(&[1, 2], &mut rng);
        let gy: ArrayD<f64> = uniform(&[4, 2], &mut rng);

        let report = check_backward(Concat::new(0), &[a, b], &[gy], &GradCheckConfig::strict()).unwrap();
        assert!(report.passed, "{:?}", report);
        assert_eq!(report.num_params, 8);
    }
}

#[test]
fn test_gradient_check_rejects_vanishing_step() {
    let x: ArrayD<f32> = ArrayD::from_elem(IxDyn(&[2]), 1000.0);
    let gy: ArrayD<f32> = ArrayD::ones(IxDyn(&[4]));
    let config = GradCheckConfig::default().with_eps(1e-9);
    let err = check_backward(Tile::new(2usize).unwrap(), &[x], &[gy], &config).unwrap_err();
    assert!(matches!(err, Error::ValueError(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_tile_gradient_check(
        shape in prop::collection::vec(1usize..4, 0..3),
        reps in prop::collection::vec(0usize..3, 0..4),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let function = Tile::new(reps).unwrap();
        let x: ArrayD<f64> = uniform(&shape, &mut rng);
        let gy: ArrayD<f64> = uniform(&function.output_shape(&shape).unwrap(), &mut rng);

        let report = check_backward(function, &[x], &[gy], &GradCheckConfig::strict()).unwrap();
        prop_assert!(report.passed);
    }

    #[test]
    fn prop_split_axis_backward_is_exact(
        rows in 1usize..6,
        sections in 1usize..4,
        cols in 1usize..4,
    ) {
        let x = Variable::new(arange::<ArrayD<f32>>(&[rows * sections, cols]), true);
        let ys = split_axis(&x, sections, 0).unwrap();
        prop_assert_eq!(ys.len(), sections);
        for y in &ys {
            prop_assert_eq!(y.shape(), &[rows, cols]);
            y.set_grad(y.data().clone()).unwrap();
        }
        backward(&ys[0], None).unwrap();
        prop_assert_eq!(x.grad().unwrap(), x.data().clone());
    }
}
