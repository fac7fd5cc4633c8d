use std::collections::BTreeMap;
use itertools::Itertools;
use ndarray::{ self as nd, array, ArrayD, LinalgScalar };
use num_complex::Complex64 as C64;
use rand::{ SeedableRng, rngs::StdRng };
use tensor_ncon::{
    ncon,
    random::{ random_array, random_complex },
    relative_diff,
    Label,
    LabelError,
    Network,
    NetworkError,
    Order,
    PlanError,
};

// sum over every assignment of the positive labels, element by element
fn brute_force<A>(tensors: &[ArrayD<A>], labels: &[Vec<i32>]) -> ArrayD<A>
where A: LinalgScalar
{
    let mut dims: BTreeMap<i32, usize> = BTreeMap::new();
    for (t, labs) in tensors.iter().zip(labels) {
        for (ax, l) in labs.iter().enumerate() { dims.insert(*l, t.shape()[ax]); }
    }
    let outputs: Vec<i32>
        = (1..).map(|k: i32| -k).take_while(|l| dims.contains_key(l)).collect();
    let bonds: Vec<i32> = dims.keys().copied().filter(|l| *l > 0).collect();
    let out_shape: Vec<usize> = outputs.iter().map(|l| dims[l]).collect();
    let assignments: Vec<Vec<usize>>
        = if bonds.is_empty() {
            vec![Vec::new()]
        } else {
            bonds.iter().map(|l| 0..dims[l]).multi_cartesian_product().collect()
        };
    ArrayD::from_shape_fn(out_shape, |ix| {
        let mut vals: BTreeMap<i32, usize>
            = outputs.iter().enumerate().map(|(k, l)| (*l, ix[k])).collect();
        let mut acc = A::zero();
        for assign in assignments.iter() {
            vals.extend(bonds.iter().copied().zip(assign.iter().copied()));
            let term
                = tensors.iter().zip(labels)
                .fold(A::one(), |prod, (t, labs)| {
                    let idx: Vec<usize> = labs.iter().map(|l| vals[l]).collect();
                    prod * t[idx.as_slice()]
                });
            acc = acc + term;
        }
        acc
    })
}

fn views<A>(tensors: &[ArrayD<A>]) -> Vec<nd::ArrayViewD<'_, A>> {
    tensors.iter().map(|t| t.view()).collect()
}

fn four_tensor_network(rng: &mut StdRng) -> (Vec<ArrayD<f64>>, Vec<Vec<i32>>) {
    let tensors = vec![
        random_array(&[2, 3, 4], rng),
        random_array(&[3, 5, 2], rng),
        random_array(&[4, 6, 5], rng),
        random_array(&[6, 3], rng),
    ];
    let labels = vec![
        vec![-1, 1, 2],
        vec![1, 3, -2],
        vec![2, 4, 3],
        vec![4, -3],
    ];
    (tensors, labels)
}

#[test]
fn every_order_agrees() {
    let mut rng = StdRng::seed_from_u64(10546);
    let (tensors, labels) = four_tensor_network(&mut rng);
    let reference = brute_force(&tensors, &labels);
    assert_eq!(reference.shape(), &[2, 2, 3]);

    for order in (1..=4).permutations(4) {
        let res = ncon(views(&tensors), &labels, Some(order.as_slice())).unwrap();
        assert_eq!(res.shape(), &[2, 2, 3]);
        assert!(relative_diff(&res, &reference).unwrap() < 1e-12, "order {order:?}");
    }

    let greedy: ArrayD<f64>
        = Network::from_nodes(
            tensors.iter().zip(&labels).map(|(t, l)| (t.view(), l.iter().copied())))
        .order(Order::Greedy)
        .contract()
        .unwrap();
    assert!(relative_diff(&greedy, &reference).unwrap() < 1e-12);
}

#[test]
fn tensor_list_order_is_irrelevant() {
    let mut rng = StdRng::seed_from_u64(10546);
    let (tensors, labels) = four_tensor_network(&mut rng);
    let res = ncon(views(&tensors), &labels, None).unwrap();
    for perm in (0..4).permutations(4) {
        let t: Vec<ArrayD<f64>> = perm.iter().map(|k| tensors[*k].clone()).collect();
        let l: Vec<Vec<i32>> = perm.iter().map(|k| labels[*k].clone()).collect();
        let res_perm = ncon(views(&t), &l, None).unwrap();
        assert!(relative_diff(&res_perm, &res).unwrap() < 1e-12, "perm {perm:?}");
    }
}

#[test]
fn single_tensor_identity_and_transpose() {
    let mut rng = StdRng::seed_from_u64(10546);
    let a: ArrayD<f64> = random_array(&[2, 3, 4], &mut rng);
    let same = ncon([&a], [[-1, -2, -3]], None).unwrap();
    assert_eq!(same, a);
    let perm = ncon([&a], [[-3, -1, -2]], None).unwrap();
    assert_eq!(perm.shape(), &[3, 4, 2]);
    assert_eq!(perm, a.view().permuted_axes(vec![1, 2, 0]));
    assert!(perm.is_standard_layout());
}

#[test]
fn matrix_product() {
    let a: ArrayD<f64> = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
    let b: ArrayD<f64> = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]].into_dyn();
    let c = ncon([&a, &b], [[-1, 1], [1, -2]], None).unwrap();
    assert_eq!(c, array![[4.0, 5.0], [10.0, 11.0]].into_dyn());
    // swapping output labels transposes the result
    let ct = ncon([&a, &b], [[-2, 1], [1, -1]], None).unwrap();
    assert_eq!(ct, array![[4.0, 10.0], [5.0, 11.0]].into_dyn());
}

#[test]
fn traces() {
    let a: ArrayD<f64>
        = ArrayD::from_shape_fn(vec![3, 3], |ix| (ix[0] * 3 + ix[1]) as f64);
    let tr = ncon([&a], [[1, 1]], None).unwrap();
    assert_eq!(tr.ndim(), 0);
    assert_eq!(tr.sum(), 12.0);

    // partial trace inside a network: Σ_{i,j} A_{i,j,i} B_{j,k}
    let mut rng = StdRng::seed_from_u64(10546);
    let tensors: Vec<ArrayD<f64>>
        = vec![random_array(&[3, 4, 3], &mut rng), random_array(&[4, 5], &mut rng)];
    let labels = vec![vec![1, 2, 1], vec![2, -1]];
    let res = ncon(views(&tensors), &labels, None).unwrap();
    let reference = brute_force(&tensors, &labels);
    assert_eq!(res.shape(), &[5]);
    assert!(relative_diff(&res, &reference).unwrap() < 1e-12);
}

#[test]
fn outer_product() {
    let a: ArrayD<f64> = array![1.0, 2.0].into_dyn();
    let b: ArrayD<f64> = array![1.0, 10.0, 100.0].into_dyn();
    let c = ncon([&a, &b], [[-2], [-1]], None).unwrap();
    assert_eq!(c, array![[1.0, 2.0], [10.0, 20.0], [100.0, 200.0]].into_dyn());
}

#[test]
fn scalar_network() {
    let mut rng = StdRng::seed_from_u64(10546);
    let tensors: Vec<ArrayD<f64>> = vec![
        random_array(&[2, 3], &mut rng),
        random_array(&[3, 4], &mut rng),
        random_array(&[4, 2], &mut rng),
    ];
    let labels = vec![vec![1, 2], vec![2, 3], vec![3, 1]];
    let res = ncon(views(&tensors), &labels, None).unwrap();
    let reference = brute_force(&tensors, &labels);
    assert_eq!(res.ndim(), 0);
    assert!(relative_diff(&res, &reference).unwrap() < 1e-12);
}

#[test]
fn mixed_network() {
    let mut rng = StdRng::seed_from_u64(10546);
    let tensors: Vec<ArrayD<f64>> = vec![
        random_array(&[3, 4, 3], &mut rng),
        random_array(&[4, 3, 3, 3], &mut rng),
        random_array(&[3, 3, 3], &mut rng),
        random_array(&[3, 3], &mut rng),
    ];
    let labels = vec![
        vec![1, -2, 2],
        vec![-1, 1, 3, 4],
        vec![5, 3, 2],
        vec![4, 5],
    ];
    let res = ncon(views(&tensors), &labels, None).unwrap();
    assert_eq!(res.shape(), &[4, 4]);

    // manual chain: (A B) over 1, then C over {2, 3}, then D over {4, 5}
    let ab = ncon(
        [&tensors[0], &tensors[1]], [vec![1, -1, -2], vec![-3, 1, -4, -5]], None,
    ).unwrap(); // (-2 of A, 2, -1 of B, 3, 4)
    let abc = ncon(
        [ab.view(), tensors[2].view()], [vec![-1, 2, -2, 3, -3], vec![-4, 3, 2]], None,
    ).unwrap(); // (-2 of A, -1 of B, 4, 5)
    let manual = ncon(
        [abc.view(), tensors[3].view()], [vec![-2, -1, 4, 5], vec![4, 5]], None,
    ).unwrap();
    assert!(relative_diff(&res, &manual).unwrap() < 1e-10);

    let reference = brute_force(&tensors, &labels);
    assert!(relative_diff(&res, &reference).unwrap() < 1e-10);
}

#[test]
fn complex_elements() {
    let mut rng = StdRng::seed_from_u64(10546);
    let tensors: Vec<ArrayD<C64>> = vec![
        random_complex(&[2, 3], &mut rng),
        random_complex(&[3, 4, 4, 5], &mut rng),
        random_complex(&[5, 2], &mut rng),
    ];
    let labels = vec![vec![-1, 1], vec![1, 2, 2, 3], vec![3, -2]];
    let res = ncon(views(&tensors), &labels, None).unwrap();
    let reference = brute_force(&tensors, &labels);
    assert_eq!(res.shape(), &[2, 2]);
    assert!(relative_diff(&res, &reference).unwrap() < 1e-12);
}

#[test]
fn inputs_are_not_modified() {
    let mut rng = StdRng::seed_from_u64(10546);
    let (tensors, labels) = four_tensor_network(&mut rng);
    let before = tensors.clone();
    ncon(views(&tensors), &labels, Some(&[4, 2, 3, 1][..])).unwrap();
    assert_eq!(tensors, before);
}

#[test]
fn validation_errors() {
    let a = ArrayD::<f64>::ones(vec![2, 3]);
    let b = ArrayD::<f64>::ones(vec![3, 2]);
    let c = ArrayD::<f64>::ones(vec![4, 2]);

    let err = ncon([&a, &b], [[-1, 1], [2, -2]], None).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::LabelError(LabelError::LabelArity { label: Label(1), count: 1 }),
    ));

    let err = ncon([&a, &c], [[-1, 1], [1, -2]], None).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::LabelError(LabelError::ShapeMismatch { label: Label(1), lhs: 3, rhs: 4 }),
    ));

    let err = ncon([&a, &b], [[-1, 1]], None).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::LabelError(LabelError::CountMismatch { tensors: 2, labels: 1 }),
    ));

    let err = ncon([&a, &b], [[-1, 1], [1, -3]], None).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::LabelError(LabelError::OutputGap { label: Label(-2) }),
    ));

    let err = ncon([&a, &b], [[1, 2], [2, 1]], Some(&[1, 1][..])).unwrap_err();
    assert!(matches!(err, NetworkError::PlanError(PlanError::RepeatedLabel(Label(1)))));

    let err = ncon([&a, &b], [[1, 2], [2, 1]], Some(&[2][..])).unwrap_err();
    assert!(matches!(err, NetworkError::PlanError(PlanError::MissingLabel(Label(1)))));

    let none: [&ArrayD<f64>; 0] = [];
    let no_labels: [[i32; 0]; 0] = [];
    let err = ncon(none, no_labels, None).unwrap_err();
    assert!(matches!(err, NetworkError::LabelError(LabelError::EmptyNetwork)));
}
