//! Matrix factorizations of tensors, splitting the axes of a single tensor
//! into a left and right group joined by a new bond.
//!
//! Each function flattens the first `n_left` axes of a tensor into the row
//! index of a matrix and the rest into the column index, factorizes the
//! matrix with LAPACK through [`ndarray_linalg`], and unflattens the factors
//! so that they can be fed straight back into a [`Network`][crate::Network].
//! The new bond is always the last axis of the left factor and the first axis
//! of the right factor.
//!
//! Requires the `linalg` feature.

use ndarray as nd;
use ndarray_linalg::{
    Eigh,
    QR,
    SVDInto,
    UPLO,
    error::LinalgError,
    types::{ Lapack, Scalar },
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecompError {
    /// Returned when the split point lies beyond the rank of the tensor.
    #[error("error in tensor decomposition: cannot split {rank} axes after axis {split}")]
    BadSplit { split: usize, rank: usize },

    /// Returned when the flattened matrix has no elements.
    #[error("error in tensor decomposition: empty {rows}x{cols} matrix")]
    EmptyMatrix { rows: usize, cols: usize },

    /// Returned when a factorization requiring a square matrix gets a
    /// non-square one.
    #[error("error in tensor decomposition: expected a square matrix, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// Returned when LAPACK does not return a requested factor.
    #[error("error in tensor decomposition: missing factor")]
    MissingFactor,

    #[error("shape error: {0}")]
    Shape(#[from] nd::ShapeError),

    #[error("linalg error: {0}")]
    Linalg(#[from] LinalgError),
}
use DecompError::*;
pub type DecompResult<T> = Result<T, DecompError>;

/// Output of [`svd_split`].
#[derive(Clone, Debug)]
pub struct SvdSplit<A>
where A: Scalar
{
    /// Left singular vectors, shaped as the left axes plus the new bond.
    pub u: nd::ArrayD<A>,
    /// Singular values in descending order.
    pub s: nd::Array1<A::Real>,
    /// Right singular vectors (conjugate-transposed), shaped as the new bond
    /// plus the right axes.
    pub vh: nd::ArrayD<A>,
}

impl<A> SvdSplit<A>
where A: Scalar
{
    /// Return the size of the new bond.
    pub fn rank(&self) -> usize { self.s.len() }
}

/// Output of [`qr_split`].
#[derive(Clone, Debug)]
pub struct QrSplit<A> {
    /// Isometry, shaped as the left axes plus the new bond.
    pub q: nd::ArrayD<A>,
    /// Upper-triangular factor, shaped as the new bond plus the right axes.
    pub r: nd::ArrayD<A>,
}

// flatten `a` to a (left, right) matrix in row-major order
fn to_matrix<A, S>(a: &nd::ArrayBase<S, nd::IxDyn>, n_left: usize)
    -> DecompResult<(nd::Array2<A>, Vec<usize>, Vec<usize>)>
where
    A: Clone,
    S: nd::Data<Elem = A>,
{
    if n_left > a.ndim() {
        return Err(BadSplit { split: n_left, rank: a.ndim() });
    }
    let left: Vec<usize> = a.shape()[..n_left].to_vec();
    let right: Vec<usize> = a.shape()[n_left..].to_vec();
    let rows: usize = left.iter().product();
    let cols: usize = right.iter().product();
    if rows == 0 || cols == 0 { return Err(EmptyMatrix { rows, cols }); }
    let mat: nd::Array2<A>
        = a.as_standard_layout().into_shape((rows, cols))?.into_owned();
    Ok((mat, left, right))
}

// copy a (possibly column-major) view into a row-major array of `shape`
fn to_tensor<A>(mat: nd::ArrayView2<'_, A>, shape: Vec<usize>)
    -> DecompResult<nd::ArrayD<A>>
where A: Clone
{
    Ok(mat.as_standard_layout().into_owned().into_shape(shape)?)
}

/// Compute the singular value decomposition of a tensor, grouping the first
/// `n_left` axes against the rest.
///
/// The new bond keeps at most `max_rank` singular values, and drops those at or
/// below `eps`; at least one is always kept.
pub fn svd_split<A, S>(
    a: &nd::ArrayBase<S, nd::IxDyn>,
    n_left: usize,
    max_rank: Option<usize>,
    eps: Option<A::Real>,
) -> DecompResult<SvdSplit<A>>
where
    A: Scalar + Lapack,
    S: nd::Data<Elem = A>,
{
    let (mat, left, right) = to_matrix(a, n_left)?;
    let k = mat.nrows().min(mat.ncols());
    let (Some(u), s, Some(vt)) = mat.svd_into(true, true)?
        else { return Err(MissingFactor); };
    let mut rank
        = eps.map(|eps| s.iter().take_while(|sj| **sj > eps).count())
        .unwrap_or(k)
        .min(k);
    if let Some(max) = max_rank { rank = rank.min(max); }
    let rank = rank.max(1);

    let u_shape: Vec<usize> = left.into_iter().chain([rank]).collect();
    let vh_shape: Vec<usize> = [rank].into_iter().chain(right).collect();
    let u = to_tensor(u.slice(nd::s![.., ..rank]), u_shape)?;
    let vh = to_tensor(vt.slice(nd::s![..rank, ..]), vh_shape)?;
    let s = s.slice(nd::s![..rank]).to_owned();
    Ok(SvdSplit { u, s, vh })
}

/// Compute the reduced QR decomposition of a tensor, grouping the first
/// `n_left` axes against the rest.
pub fn qr_split<A, S>(a: &nd::ArrayBase<S, nd::IxDyn>, n_left: usize)
    -> DecompResult<QrSplit<A>>
where
    A: Scalar + Lapack,
    S: nd::Data<Elem = A>,
{
    let (mat, left, right) = to_matrix(a, n_left)?;
    let (q, r) = mat.qr()?;
    let k = q.ncols();
    let q_shape: Vec<usize> = left.into_iter().chain([k]).collect();
    let r_shape: Vec<usize> = [k].into_iter().chain(right).collect();
    let q = to_tensor(q.view(), q_shape)?;
    let r = to_tensor(r.view(), r_shape)?;
    Ok(QrSplit { q, r })
}

/// Diagonalize a Hermitian operator given as a tensor whose first `n_left`
/// axes are its outputs and the rest its inputs.
///
/// Returns the eigenvalues in ascending order and the eigenvectors, shaped as
/// the left axes plus one axis indexing the eigenvalues. Only the upper
/// triangle of the flattened matrix is read.
pub fn eigh_split<A, S>(a: &nd::ArrayBase<S, nd::IxDyn>, n_left: usize)
    -> DecompResult<(nd::Array1<A::Real>, nd::ArrayD<A>)>
where
    A: Scalar + Lapack,
    S: nd::Data<Elem = A>,
{
    let (mat, left, _) = to_matrix(a, n_left)?;
    let (rows, cols) = mat.dim();
    if rows != cols { return Err(NotSquare { rows, cols }); }
    let (vals, vecs) = mat.eigh(UPLO::Upper)?;
    let shape: Vec<usize> = left.into_iter().chain([rows]).collect();
    let vecs = to_tensor(vecs.view(), shape)?;
    Ok((vals, vecs))
}
