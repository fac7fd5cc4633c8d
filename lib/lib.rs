//! Contraction of networks of dense tensors described by integer index labels.
//!
//! A network is given as a list of arrays, each paired with one label per
//! axis. Positive labels name bonds: each one must appear on exactly two axes
//! (of two different tensors, or twice on the same tensor for a partial
//! trace), and is summed over. Negative labels name the open legs of the
//! network: each appears exactly once, and the final result carries them in
//! the order -1, -2, -3, ...
//!
//! <blockquote>
//!   <p style="font-size:20px">
//!     <i>R</i><sub><i>i</i>,<i>j</i></sub>
//!       = Σ<sub><i>a</i>,<i>b</i></sub>
//!         <i>A</i><sub><i>i</i>,<i>a</i></sub>
//!         <i>B</i><sub><i>a</i>,<i>b</i></sub>
//!         <i>C</i><sub><i>b</i>,<i>j</i></sub>
//!     &nbsp;&nbsp;⟷&nbsp;&nbsp;
//!     <code>[[-1, 1], [1, 2], [2, -2]]</code>
//!   </p>
//! </blockquote>
//!
//! The network is validated, a sequence of elementary steps (traces, pairwise
//! contractions over *all* labels shared by a pair, and trailing outer
//! products) is [planned][plan::Plan], and each pairwise step is carried out
//! as a permute-reshape-matmul-reshape on top of [`ndarray`].
//!
//! ```
//! use ndarray::{ array, ArrayD };
//! use tensor_ncon::ncon;
//!
//! let a: ArrayD<f64> = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
//! let b: ArrayD<f64> = array![[0.0, 1.0], [1.0, 0.0]].into_dyn();
//!
//! // R_{i,j} = Σ_k A_{i,k} B_{k,j}
//! let r = ncon([&a, &b], [vec![-1, 1], vec![1, -2]], None).unwrap();
//! assert_eq!(r, array![[2.0, 1.0], [4.0, 3.0]].into_dyn());
//!
//! // Tr(A B)
//! let t = ncon([&a, &b], [vec![1, 2], vec![2, 1]], None).unwrap();
//! assert_eq!(t.ndim(), 0);
//! assert_eq!(t.sum(), 5.0);
//! ```

use ndarray::{ self as nd, LinalgScalar };

macro_rules! isomorphism {
    (
        $docstring:literal,
        $name:ident ($iso_to:ident),
        derive: { $($derive:ident),* $(,)? },
        from: { $($from:ident),* $(,)? } $(,)?
    ) => {
        #[doc = $docstring]
        #[derive($($derive),*)]
        pub struct $name(pub $iso_to);

        impl From<$iso_to> for $name {
            fn from(x: $iso_to) -> Self { Self(x) }
        }

        impl From<$name> for $iso_to {
            fn from(x: $name) -> Self { x.0 }
        }

        impl AsRef<$iso_to> for $name {
            fn as_ref(&self) -> &$iso_to { &self.0 }
        }

        impl std::ops::Deref for $name {
            type Target = $iso_to;

            fn deref(&self) -> &Self::Target { &self.0 }
        }

        $(
            impl From<$from> for $name {
                fn from(x: $from) -> Self { Self(x.into()) }
            }
        )*
    }
}

macro_rules! copy_isomorphism {
    (
        $name:ident ($iso_to:ident),
        from: { $($from:ident),* $(,)? } $(,)?
    ) => {
        impl From<&$iso_to> for $name {
            fn from(x: &$iso_to) -> Self { Self(*x) }
        }

        impl From<&$name> for $name {
            fn from(x: &$name) -> Self { *x }
        }

        impl From<&$name> for $iso_to {
            fn from(x: &$name) -> Self { x.0 }
        }

        $(
            impl From<&$from> for $name {
                fn from(x: &$from) -> Self { Self((*x).into()) }
            }
        )*
    }
}

pub mod label;
pub mod tensor;
pub mod plan;
pub mod network;
pub mod random;

#[cfg(feature = "linalg")]
pub mod decomp;

pub use label::{ Label, LabelError, Signature };
pub use tensor::{ Tensor, TensorError, frobenius_norm, relative_diff };
pub use plan::{ Id, Order, Plan, PlanError, Step };
pub use network::{ Network, NetworkError, NetworkResult };

/// Contract a network given as parallel lists of arrays and label vectors.
///
/// `labels[i]` assigns one label per axis of `tensors[i]`. If `order` is
/// given, it must be a permutation of all the positive labels in the network;
/// otherwise positive labels are summed in ascending order. See
/// [`Network`] for the builder form, which also exposes the
/// [greedy][Order::Greedy] ordering.
///
/// The returned array is always freshly allocated in standard layout, even for
/// a single tensor with nothing to contract.
///
/// Fails if the lists have different lengths or the labels are inconsistent
/// with each other or with the shapes of the arrays (see [`LabelError`]), or if
/// `order` is not a permutation of the positive labels (see [`PlanError`]).
pub fn ncon<'a, A, T, V, L, I>(
    tensors: T,
    labels: L,
    order: Option<&[i32]>,
) -> NetworkResult<nd::ArrayD<A>>
where
    A: LinalgScalar,
    T: IntoIterator<Item = V>,
    V: Into<nd::ArrayViewD<'a, A>>,
    L: IntoIterator<Item = I>,
    I: AsRef<[i32]>,
{
    let tensors: Vec<nd::ArrayViewD<'a, A>>
        = tensors.into_iter().map(Into::into).collect();
    let labels: Vec<I> = labels.into_iter().collect();
    if tensors.len() != labels.len() {
        return Err(LabelError::CountMismatch {
            tensors: tensors.len(),
            labels: labels.len(),
        }.into());
    }
    let mut network: Network<'a, A> = Network::new();
    for (tensor, labs) in tensors.into_iter().zip(labels.iter()) {
        network.push(tensor, labs.as_ref().iter().copied());
    }
    if let Some(order) = order {
        network.set_order(Order::from(order));
    }
    network.contract()
}
