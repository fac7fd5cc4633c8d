//! A dense N-dimensional array whose axes carry [`Label`]s, along with the
//! array-level kernels used to contract networks of them.
//!
//! The pairwise contraction of two tensors over a set of shared labels is
//! reduced to a single matrix product:
//!
//! <blockquote>
//!   <p style="font-size:20px">
//!     <i>C</i><sub>
//!       <i>a</i><sub>1</sub>,...,<i>a</i><sub><i>N</i></sub>,
//!       <i>b</i><sub>1</sub>,...,<i>b</i><sub><i>M</i></sub>
//!     </sub>
//!       = Σ<sub><i>α</i><sub>1</sub>,...,<i>α</i><sub><i>D</i></sub></sub>
//!         <i>A</i><sub>
//!           <i>a</i><sub>1</sub>,...,<i>a</i><sub><i>N</i></sub>,
//!           <i>α</i><sub>1</sub>,...,<i>α</i><sub><i>D</i></sub>
//!         </sub>
//!         × <i>B</i><sub>
//!           <i>α</i><sub>1</sub>,...,<i>α</i><sub><i>D</i></sub>,
//!           <i>b</i><sub>1</sub>,...,<i>b</i><sub><i>M</i></sub>
//!         </sub>
//!   </p>
//! </blockquote>
//!
//! The shared axes of *A* are permuted to the back and those of *B* to the
//! front, both are flattened to matrices, multiplied, and the product is
//! unflattened back to the free axes of *A* followed by those of *B*. With no
//! shared labels this degrades to the tensor (outer) product.

use std::fmt;
use itertools::Itertools;
use ndarray::{ self as nd, LinalgScalar };
use num_complex::{ Complex, ComplexFloat };
use num_traits::{ Float, Zero };
use thiserror::Error;
use crate::label::Label;

#[derive(Debug, Error)]
pub enum TensorError {
    /// Returned when creating a tensor with a number of labels different from
    /// the rank of its array.
    #[error("error in tensor creation: {labels} labels for an array of rank {rank}")]
    RankMismatch { rank: usize, labels: usize },

    /// Returned when two axes to be summed together have different sizes.
    #[error("error in tensor contraction: label {label} joins axes of size {lhs} and {rhs}")]
    ShapeMismatch { label: Label, lhs: usize, rhs: usize },

    /// Returned when an operation names a label the tensor doesn't carry.
    #[error("error in tensor operation: missing label {0}")]
    MissingLabel(Label),

    /// Returned when a trace is attempted over a label that doesn't occur
    /// exactly twice on the tensor.
    #[error("error in tensor trace: label {0} does not occur exactly twice")]
    NotSelfLabel(Label),

    /// Returned when comparing arrays of different shapes.
    #[error("error in tensor comparison: shapes {0:?} and {1:?} differ")]
    IncompatibleShapes(Vec<usize>, Vec<usize>),

    /// Returned by the underlying array library when a reshape fails.
    #[error("array shape error: {0}")]
    Shape(#[from] nd::ShapeError),
}
use TensorError::*;
pub type TensorResult<T> = Result<T, TensorError>;

fn position(labels: &[Label], target: Label) -> Option<usize> {
    labels.iter().position(|label| *label == target)
}

// move a possibly permuted array into standard (row-major) layout without
// copying when it's already there
fn standardize<A>(data: nd::ArrayD<A>) -> nd::ArrayD<A>
where A: Clone
{
    if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    }
}

/// Contract `a` with `b` over the labels in `shared`, which must all occur
/// exactly once on each.
///
/// Shared axes are summed in the order they're listed in `shared`. The result
/// carries the remaining axes of `a` followed by those of `b`, each group in
/// its original relative order. An empty `shared` gives the outer product.
pub(crate) fn pairwise<A>(
    a: nd::ArrayViewD<'_, A>,
    labels_a: &[Label],
    b: nd::ArrayViewD<'_, A>,
    labels_b: &[Label],
    shared: &[Label],
) -> TensorResult<(nd::ArrayD<A>, Vec<Label>)>
where A: LinalgScalar
{
    let shape_a: Vec<usize> = a.shape().to_vec();
    let shape_b: Vec<usize> = b.shape().to_vec();
    let mut sum_a: Vec<usize> = Vec::with_capacity(shared.len());
    let mut sum_b: Vec<usize> = Vec::with_capacity(shared.len());
    for label in shared.iter().copied() {
        let k_a = position(labels_a, label).ok_or(MissingLabel(label))?;
        let k_b = position(labels_b, label).ok_or(MissingLabel(label))?;
        let (lhs, rhs) = (shape_a[k_a], shape_b[k_b]);
        if lhs != rhs { return Err(ShapeMismatch { label, lhs, rhs }); }
        sum_a.push(k_a);
        sum_b.push(k_b);
    }
    let free_a: Vec<usize>
        = (0..shape_a.len()).filter(|k| !sum_a.contains(k)).collect();
    let free_b: Vec<usize>
        = (0..shape_b.len()).filter(|k| !sum_b.contains(k)).collect();

    let m: usize = free_a.iter().map(|k| shape_a[*k]).product();
    let s: usize = sum_a.iter().map(|k| shape_a[*k]).product();
    let n: usize = free_b.iter().map(|k| shape_b[*k]).product();

    // A -> (free, summed), B -> (summed, free)
    let perm_a: Vec<usize> = free_a.iter().chain(&sum_a).copied().collect();
    let perm_b: Vec<usize> = sum_b.iter().chain(&free_b).copied().collect();
    let a_perm = a.permuted_axes(perm_a);
    let b_perm = b.permuted_axes(perm_b);
    let mat_a = a_perm.as_standard_layout().into_shape((m, s))?;
    let mat_b = b_perm.as_standard_layout().into_shape((s, n))?;

    let shape_c: Vec<usize>
        = free_a.iter().map(|k| shape_a[*k])
        .chain(free_b.iter().map(|k| shape_b[*k]))
        .collect();
    let c: nd::ArrayD<A>
        = standardize(mat_a.dot(&mat_b).into_dyn()).into_shape(shape_c)?;
    let labels_c: Vec<Label>
        = free_a.iter().map(|k| labels_a[*k])
        .chain(free_b.iter().map(|k| labels_b[*k]))
        .collect();
    Ok((c, labels_c))
}

/// Sum over the diagonal of the two axes of `a` carrying `label`.
///
/// The remaining axes keep their relative order.
pub(crate) fn trace<A>(
    a: nd::ArrayViewD<'_, A>,
    labels: &[Label],
    label: Label,
) -> TensorResult<(nd::ArrayD<A>, Vec<Label>)>
where A: LinalgScalar
{
    let pos: Vec<usize> = labels.iter().positions(|l| *l == label).collect();
    let (p, q) = match pos.as_slice() {
        &[p, q] => (p, q),
        [] => { return Err(MissingLabel(label)); },
        _ => { return Err(NotSelfLabel(label)); },
    };
    let (lhs, rhs) = (a.len_of(nd::Axis(p)), a.len_of(nd::Axis(q)));
    if lhs != rhs { return Err(ShapeMismatch { label, lhs, rhs }); }

    let mut shape: Vec<usize> = a.shape().to_vec();
    shape.remove(q);
    shape.remove(p);
    let mut acc: nd::ArrayD<A> = nd::ArrayD::zeros(shape);
    for k in 0..lhs {
        // p < q, so removing q first leaves axis p in place
        let diag = a.view()
            .index_axis_move(nd::Axis(q), k)
            .index_axis_move(nd::Axis(p), k);
        acc.zip_mut_with(&diag, |acc_k, d_k| { *acc_k = *acc_k + *d_k; });
    }
    let labels_rem: Vec<Label>
        = labels.iter().enumerate()
        .filter_map(|(k, l)| (k != p && k != q).then_some(*l))
        .collect();
    Ok((acc, labels_rem))
}

/// Permute the axes of `data` so that the one labeled -1 comes first, -2
/// second, and so on.
///
/// Every label must be negative and `labels` must hold each of -1, ..., -*n*
/// exactly once, where *n* is the rank of `data`. The result is in standard
/// layout; no data is moved if the axes are already in order.
pub(crate) fn permute_output<A>(data: nd::ArrayD<A>, labels: &[Label])
    -> TensorResult<nd::ArrayD<A>>
where A: Clone
{
    let perm: Vec<usize>
        = (0..labels.len())
        .map(|k| {
            let target = Label::output(k);
            position(labels, target).ok_or(MissingLabel(target))
        })
        .collect::<TensorResult<_>>()?;
    if perm.iter().enumerate().all(|(k, p)| k == *p) {
        Ok(standardize(data))
    } else {
        Ok(standardize(data.permuted_axes(perm)))
    }
}

/// Compute the Frobenius norm of an array, i.e. the square root of the sum of
/// squared magnitudes of its elements.
pub fn frobenius_norm<A, S, D>(a: &nd::ArrayBase<S, D>) -> A::Real
where
    A: ComplexFloat,
    S: nd::Data<Elem = A>,
    D: nd::Dimension,
{
    let sum2: A::Real
        = a.iter()
        .map(|ak| { let r = ak.abs(); r * r })
        .fold(A::Real::zero(), |acc, r2| acc + r2);
    Float::sqrt(sum2)
}

/// Compute ‖`a` − `b`‖ / ‖`b`‖ in the Frobenius norm, falling back to the
/// absolute difference if `b` is identically zero.
///
/// Fails if `a` and `b` have different shapes.
pub fn relative_diff<A, S, T, D>(
    a: &nd::ArrayBase<S, D>,
    b: &nd::ArrayBase<T, D>,
) -> TensorResult<A::Real>
where
    A: ComplexFloat,
    S: nd::Data<Elem = A>,
    T: nd::Data<Elem = A>,
    D: nd::Dimension,
{
    if a.shape() != b.shape() {
        return Err(IncompatibleShapes(a.shape().to_vec(), b.shape().to_vec()));
    }
    let diff2: A::Real
        = nd::Zip::from(a).and(b)
        .fold(A::Real::zero(), |acc, ak, bk| {
            let r = (*ak - *bk).abs();
            acc + r * r
        });
    let diff: A::Real = Float::sqrt(diff2);
    let norm: A::Real = frobenius_norm(b);
    if norm.is_zero() { Ok(diff) } else { Ok(diff / norm) }
}

/// A dense array of elements of type `A` with one [`Label`] per axis.
///
/// Tensors are combined by matching labels: [`contract`][Self::contract] sums
/// over every label two tensors have in common, [`trace`][Self::trace] sums
/// over a label occurring twice on a single tensor, and
/// [`into_output`][Self::into_output] orders the axes of a tensor carrying
/// only negative labels. Rank-0 tensors hold a single number and carry no
/// labels.
#[derive(Clone, PartialEq)]
pub struct Tensor<A> {
    labels: Vec<Label>,
    data: nd::ArrayD<A>,
}

impl<A> fmt::Debug for Tensor<A>
where A: fmt::Debug
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(")?;
        if self.is_scalar() {
            fmt::Debug::fmt(&self.data, f)?;
            write!(f, ", rank=0, labels=[]")?;
        } else {
            writeln!(f)?;
            fmt::Debug::fmt(&self.data, f)?;
            write!(f, ",\nrank={}, labels={:?}", self.rank(), self.labels)?;
            writeln!(f)?;
        }
        write!(f, ")")
    }
}

impl<A> fmt::Display for Tensor<A>
where A: fmt::Display
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.data, f)?;
        write!(f, " {{ {} }}", self.labels.iter().join(", "))
    }
}

impl<A> Tensor<A> {
    /// Attach labels to an array.
    ///
    /// Fails if the number of labels is not equal to the rank of the array.
    pub fn new<I, L>(labels: I, data: nd::ArrayD<A>) -> TensorResult<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let labels: Vec<Label> = labels.into_iter().map(Into::into).collect();
        if labels.len() != data.ndim() {
            return Err(RankMismatch { rank: data.ndim(), labels: labels.len() });
        }
        Ok(Self { labels, data })
    }

    /// Create a new tensor from `(label, dimension)` pairs using a function
    /// over index values.
    pub fn from_fn<I, L, F>(axes: I, elems: F) -> Self
    where
        I: IntoIterator<Item = (L, usize)>,
        L: Into<Label>,
        F: FnMut(nd::IxDyn) -> A,
    {
        let (labels, shape): (Vec<Label>, Vec<usize>)
            = axes.into_iter()
            .map(|(label, dim)| (label.into(), dim))
            .unzip();
        let data: nd::ArrayD<A> = nd::ArrayD::from_shape_fn(shape, elems);
        Self { labels, data }
    }

    /// Create a new rank-0 (scalar) tensor.
    pub fn new_scalar(val: A) -> Self {
        Self { labels: Vec::new(), data: nd::arr0(val).into_dyn() }
    }

    /// Return `true` if `self` has rank 0.
    pub fn is_scalar(&self) -> bool { self.labels.is_empty() }

    /// Return `true` if `self` has an axis labeled `label`.
    pub fn has_label(&self, label: Label) -> bool {
        self.labels.contains(&label)
    }

    /// Return the rank of `self`.
    pub fn rank(&self) -> usize { self.labels.len() }

    /// Return the shape of `self`.
    ///
    /// If `self` is a scalar, the returned slice is empty.
    pub fn shape(&self) -> &[usize] { self.data.shape() }

    /// Return the labels of `self` in axis order.
    pub fn labels(&self) -> &[Label] { &self.labels }

    /// Return a reference to the underlying array.
    pub fn data(&self) -> &nd::ArrayD<A> { &self.data }

    /// Return the underlying array, discarding labels.
    pub fn into_array(self) -> nd::ArrayD<A> { self.data }

    /// Return the labels and the underlying array.
    pub fn into_parts(self) -> (Vec<Label>, nd::ArrayD<A>) {
        (self.labels, self.data)
    }

    /// Swap two axes, identified by their labels.
    ///
    /// If either label does not exist within `self`, no swap is performed.
    pub fn swap_labels(&mut self, a: Label, b: Label) {
        if let Some((k_a, k_b)) = position(&self.labels, a)
            .zip(position(&self.labels, b))
        {
            self.labels.swap(k_a, k_b);
            self.data.swap_axes(k_a, k_b);
        }
    }
}

impl<A> Tensor<A>
where A: LinalgScalar
{
    /// Contract `self` with `other` over all common labels, consuming both.
    ///
    /// Common labels are summed in ascending order. The result carries the
    /// remaining axes of `self` followed by those of `other`, each group in its
    /// original relative order. Tensors with no common labels are combined by
    /// outer product.
    pub fn contract(self, other: Self) -> TensorResult<Self> {
        let shared: Vec<Label>
            = self.labels.iter().copied()
            .filter(|label| other.has_label(*label))
            .unique()
            .sorted()
            .collect();
        let (data, labels)
            = pairwise(
                self.data.view(), &self.labels,
                other.data.view(), &other.labels,
                &shared,
            )?;
        Ok(Self { labels, data })
    }

    /// Return the tensor (outer) product of `self` and `other`, consuming
    /// both.
    pub fn tensor_prod(self, other: Self) -> TensorResult<Self> {
        let (data, labels)
            = pairwise(
                self.data.view(), &self.labels,
                other.data.view(), &other.labels,
                &[],
            )?;
        Ok(Self { labels, data })
    }

    /// Sum over the diagonal of the pair of axes labeled `label`.
    ///
    /// Fails if `label` doesn't occur exactly twice or the two axes have
    /// different sizes.
    pub fn trace(self, label: Label) -> TensorResult<Self> {
        let (data, labels) = trace(self.data.view(), &self.labels, label)?;
        Ok(Self { labels, data })
    }
}

impl<A> Tensor<A>
where A: Clone
{
    /// Put the axes of a tensor carrying only negative labels in output order
    /// (-1 first, then -2, ...).
    ///
    /// Fails if the labels are not exactly -1, ..., -*n* for a rank-*n*
    /// tensor.
    pub fn permute_output(self) -> TensorResult<Self> {
        let data = permute_output(self.data, &self.labels)?;
        let labels: Vec<Label> = (0..self.labels.len()).map(Label::output).collect();
        Ok(Self { labels, data })
    }

    /// Like [`Self::permute_output`], but returning only the array.
    pub fn into_output(self) -> TensorResult<nd::ArrayD<A>> {
        self.permute_output().map(Self::into_array)
    }
}

impl<A> Tensor<A>
where A: ComplexFloat
{
    /// Return the Frobenius norm of `self`.
    pub fn norm(&self) -> A::Real { frobenius_norm(&self.data) }
}

impl<T> Tensor<Complex<T>>
where T: Float
{
    /// Return a new tensor containing the element-wise conjugation of `self`.
    pub fn conj(&self) -> Self {
        Self {
            labels: self.labels.clone(),
            data: self.data.mapv(|z| z.conj()),
        }
    }
}
