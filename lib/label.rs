//! Integer axis labels and validation of a network's label vectors.
//!
//! Every axis of every tensor in a network carries a [`Label`]. Positive labels
//! are bonds to be summed over and must occur on exactly two axes of equal
//! size; negative labels are open legs that must each occur exactly once and
//! together form the contiguous run -1, -2, ..., -*n*, where -*k* becomes the
//! *k*-th axis of the result.

use std::fmt;
use itertools::Itertools;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    /// Returned when a network has no tensors.
    #[error("error in network validation: no tensors given")]
    EmptyNetwork,

    /// Returned when the number of label vectors differs from the number of
    /// tensors.
    #[error("error in network validation: {tensors} tensors but {labels} label vectors")]
    CountMismatch { tensors: usize, labels: usize },

    /// Returned when a label vector's length differs from its tensor's rank.
    #[error("error in network validation: tensor {tensor} has rank {rank} but {labels} labels")]
    RankMismatch { tensor: usize, rank: usize, labels: usize },

    /// Returned when an axis is labeled with zero, which is neither a bond nor
    /// an open leg.
    #[error("error in network validation: zero label on axis {axis} of tensor {tensor}")]
    ZeroLabel { tensor: usize, axis: usize },

    /// Returned when a positive label does not occur exactly twice or a
    /// negative label occurs more than once.
    #[error("error in network validation: label {label} occurs {count} time(s)")]
    LabelArity { label: Label, count: usize },

    /// Returned when the negative labels skip a value, i.e. do not run
    /// contiguously from -1.
    #[error("error in network validation: output labels are not contiguous from -1; missing {label}")]
    OutputGap { label: Label },

    /// Returned when the two axes joined by a positive label have different
    /// sizes.
    #[error("error in network validation: label {label} joins axes of size {lhs} and {rhs}")]
    ShapeMismatch { label: Label, lhs: usize, rhs: usize },
}
use LabelError::*;
pub type LabelResult<T> = Result<T, LabelError>;

isomorphism!(
    "Sugared `i32` tagging a single tensor axis.",
    Label (i32),
    derive: { Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash },
    from: { i8, i16 },
);
copy_isomorphism!(
    Label (i32),
    from: { i8, i16 },
);

impl Label {
    /// Return `true` if `self` marks an open leg of the network.
    pub fn is_output(self) -> bool { self.0 < 0 }

    /// Return `true` if `self` marks a bond to be summed over.
    pub fn is_contracted(self) -> bool { self.0 > 0 }

    /// Return the position of the axis in the final result, if `self` is an
    /// output label.
    ///
    /// -1 maps to 0, -2 to 1, and so on.
    pub fn output_axis(self) -> Option<usize> {
        self.is_output().then(|| self.0.unsigned_abs() as usize - 1)
    }

    /// Return the output label for the `k`-th axis of the result.
    pub fn output(k: usize) -> Self { Self(-(k as i32) - 1) }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a single labeled axis in a network.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Site {
    /// Index of the tensor in the network.
    pub tensor: usize,
    /// Axis of that tensor.
    pub axis: usize,
}

/// Summary of a validated network: the size attached to every label, the
/// labels to be summed over, and the shape of the final result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    dims: HashMap<Label, usize>,
    sites: HashMap<Label, Vec<Site>>,
    contracted: Vec<Label>, // ascending
    output_shape: Vec<usize>,
}

impl Signature {
    /// Return the size of the axes carrying `label`, if it exists in the
    /// network.
    pub fn dim(&self, label: Label) -> Option<usize> {
        self.dims.get(&label).copied()
    }

    /// Return the axes carrying `label`, if it exists in the network.
    pub fn sites(&self, label: Label) -> Option<&[Site]> {
        self.sites.get(&label).map(|sites| sites.as_slice())
    }

    /// Return all positive labels in ascending order.
    pub fn contracted(&self) -> &[Label] { &self.contracted }

    /// Return `true` if `label` is a positive label of the network.
    pub fn is_contracted(&self, label: Label) -> bool {
        label.is_contracted() && self.dims.contains_key(&label)
    }

    /// Return the shape of the final result.
    pub fn output_shape(&self) -> &[usize] { &self.output_shape }

    /// Return the rank of the final result.
    pub fn output_rank(&self) -> usize { self.output_shape.len() }

    /// Return `true` if the whole network contracts to a single number.
    pub fn is_scalar(&self) -> bool { self.output_shape.is_empty() }
}

/// Validate a network described by the shapes of its tensors and their label
/// vectors, given index-for-index.
///
/// Errors are reported for the offending label with the smallest value, so
/// that a given network always yields the same error.
pub fn validate<S, L>(shapes: &[S], labels: &[L]) -> LabelResult<Signature>
where
    S: AsRef<[usize]>,
    L: AsRef<[Label]>,
{
    if shapes.len() != labels.len() {
        return Err(CountMismatch { tensors: shapes.len(), labels: labels.len() });
    }
    if shapes.is_empty() { return Err(EmptyNetwork); }

    let mut sites: HashMap<Label, Vec<Site>> = HashMap::default();
    for (tensor, (shape, labs)) in shapes.iter().zip(labels).enumerate() {
        let (shape, labs) = (shape.as_ref(), labs.as_ref());
        if shape.len() != labs.len() {
            return Err(RankMismatch {
                tensor,
                rank: shape.len(),
                labels: labs.len(),
            });
        }
        for (axis, label) in labs.iter().enumerate() {
            if label.0 == 0 { return Err(ZeroLabel { tensor, axis }); }
            sites.entry(*label).or_default().push(Site { tensor, axis });
        }
    }

    let dim_at = |site: &Site| shapes[site.tensor].as_ref()[site.axis];
    let mut dims: HashMap<Label, usize> = HashMap::default();
    for label in sites.keys().copied().sorted() {
        let at = &sites[&label];
        match at.as_slice() {
            [s0, s1] if label.is_contracted() => {
                let (lhs, rhs) = (dim_at(s0), dim_at(s1));
                if lhs != rhs { return Err(ShapeMismatch { label, lhs, rhs }); }
                dims.insert(label, lhs);
            },
            [s0] if label.is_output() => {
                dims.insert(label, dim_at(s0));
            },
            _ => {
                return Err(LabelArity { label, count: at.len() });
            },
        }
    }

    let n_out = dims.keys().filter(|label| label.is_output()).count();
    let output_shape: Vec<usize>
        = (0..n_out)
        .map(|k| {
            let label = Label::output(k);
            dims.get(&label).copied().ok_or(OutputGap { label })
        })
        .collect::<LabelResult<_>>()?;
    let contracted: Vec<Label>
        = dims.keys().copied()
        .filter(|label| label.is_contracted())
        .sorted()
        .collect();
    Ok(Signature { dims, sites, contracted, output_shape })
}
