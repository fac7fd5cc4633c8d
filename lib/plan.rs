//! Sequencing of the elementary operations that reduce a network to a single
//! tensor.
//!
//! Planning works on label vectors alone. Tensors live in a pool of numbered
//! slots: the inputs take slots 0, ..., *n* - 1 and every pairwise or outer
//! product result is appended to the next free slot, while a trace replaces its
//! operand in place. Positive labels are visited one at a time according to an
//! [`Order`]; visiting a label either
//! - [traces][Step::Trace] it out of the single tensor that carries it twice,
//! - [contracts][Step::Contract] the two tensors that carry it, summing over
//!   *every* label the pair has in common, or
//! - does nothing, if an earlier contraction already summed it.
//!
//! Since each pairwise step takes all common labels at once, the two axes of a
//! label are always either on one tensor or on two distinct tensors of the
//! pool, so every ordering of the positive labels can be carried out. Whatever
//! is left afterwards shares no labels and is combined by
//! [outer products][Step::Outer] in slot order.

use std::fmt;
use itertools::Itertools;
use rustc_hash::FxHashSet as HashSet;
use thiserror::Error;
use crate::label::{ Label, Signature };

#[derive(Debug, Error)]
pub enum PlanError {
    /// Returned when planning for a network with no tensors.
    #[error("error in contraction planning: empty network")]
    EmptyNetwork,

    /// Returned when an explicit contraction order names a label that isn't a
    /// positive label of the network.
    #[error("error in contraction order: {0} is not a contracted label of the network")]
    UnknownLabel(Label),

    /// Returned when an explicit contraction order names a label more than
    /// once.
    #[error("error in contraction order: label {0} is repeated")]
    RepeatedLabel(Label),

    /// Returned when an explicit contraction order leaves out a positive label
    /// of the network.
    #[error("error in contraction order: label {0} is missing")]
    MissingLabel(Label),
}
use PlanError::*;
pub type PlanResult<T> = Result<T, PlanError>;

isomorphism!(
    "Sugared `usize` identifying a slot in the tensor pool of a [`Plan`].",
    Id (usize),
    derive: { Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash },
    from: { u8, u16 },
);
copy_isomorphism!(
    Id (usize),
    from: { u8, u16 },
);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Strategy for sequencing the positive labels of a network.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// Visit labels in ascending numerical order.
    #[default]
    Ascending,
    /// Visit labels in the given order, which must be a permutation of all
    /// positive labels in the network.
    Explicit(Vec<Label>),
    /// At each step, visit the label whose step produces the smallest
    /// intermediate tensor, breaking ties by taking the smaller label.
    Greedy,
}

impl From<Vec<Label>> for Order {
    fn from(labels: Vec<Label>) -> Self { Self::Explicit(labels) }
}

impl From<&[i32]> for Order {
    fn from(labels: &[i32]) -> Self {
        Self::Explicit(labels.iter().map(Label::from).collect())
    }
}

impl From<Vec<i32>> for Order {
    fn from(labels: Vec<i32>) -> Self {
        Self::Explicit(labels.into_iter().map(Label::from).collect())
    }
}

/// A single elementary operation on the tensor pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Sum over the two axes of `node` labeled `label`; the result takes the
    /// place of `node`.
    Trace { node: Id, label: Label },
    /// Contract `lhs` with `rhs` over `labels` (all the labels they have in
    /// common, ascending); the result is placed in `out`.
    Contract { lhs: Id, rhs: Id, labels: Vec<Label>, out: Id },
    /// Take the outer product of `lhs` and `rhs`; the result is placed in
    /// `out`.
    Outer { lhs: Id, rhs: Id, out: Id },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace { node, label }
                => write!(f, "trace {node} over {label}"),
            Self::Contract { lhs, rhs, labels, out }
                => write!(
                    f, "contract {lhs} * {rhs} over [{}] -> {out}",
                    labels.iter().join(", "),
                ),
            Self::Outer { lhs, rhs, out }
                => write!(f, "outer {lhs} x {rhs} -> {out}"),
        }
    }
}

/// A complete sequence of [`Step`]s reducing a network to one tensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<Step>,
    order: Vec<Label>,
    output: Id,
    output_labels: Vec<Label>,
    flops: usize,
}

impl Plan {
    /// Plan the contraction of a network whose tensors carry `labels`, given
    /// its validated [`Signature`].
    ///
    /// Fails if `order` is explicit and not a permutation of the positive
    /// labels in `sig`.
    pub fn new<L>(sig: &Signature, labels: &[L], order: &Order)
        -> PlanResult<Self>
    where L: AsRef<[Label]>
    {
        if labels.is_empty() { return Err(EmptyNetwork); }
        let mut planner = Planner::new(sig, labels);
        match order {
            Order::Ascending => {
                sig.contracted().iter()
                    .for_each(|label| { planner.visit(*label); });
            },
            Order::Explicit(explicit) => {
                check_order(sig, explicit)?;
                explicit.iter()
                    .for_each(|label| { planner.visit(*label); });
            },
            Order::Greedy => {
                let mut remaining: Vec<Label> = sig.contracted().to_vec();
                loop {
                    let next: Option<(usize, Label)>
                        = remaining.iter()
                        .filter_map(|label| {
                            planner.result_size(*label).map(|size| (size, *label))
                        })
                        .min();
                    let Some((_, label)) = next else { break; };
                    planner.visit(label);
                    remaining.retain(|l| !planner.consumed.contains(l));
                }
            },
        }
        let plan = planner.finish();
        log::debug!(
            "planned {} step(s) over order [{}], ~{} multiply-adds",
            plan.steps.len(),
            plan.order.iter().join(", "),
            plan.flops,
        );
        Ok(plan)
    }

    /// Return the steps in execution order.
    pub fn steps(&self) -> &[Step] { &self.steps }

    /// Return the positive labels in the order they are summed.
    ///
    /// Labels summed together by a single contraction appear consecutively,
    /// starting with the label that triggered it. Passing this back as an
    /// [explicit order][Order::Explicit] reproduces the same plan.
    pub fn order(&self) -> &[Label] { &self.order }

    /// Return the pool slot holding the final tensor.
    pub fn output(&self) -> Id { self.output }

    /// Return the labels of the final tensor, before output ordering.
    pub fn output_labels(&self) -> &[Label] { &self.output_labels }

    /// Return the estimated number of scalar multiply-adds performed by all
    /// steps.
    ///
    /// A contraction of *A* with *B* costs the product of the sizes of all
    /// distinct labels on either, i.e. |*A*| |*B*| / |summed|; a trace costs
    /// the size of its operand divided by the traced dimension.
    pub fn flops(&self) -> usize { self.flops }
}

fn check_order(sig: &Signature, order: &[Label]) -> PlanResult<()> {
    let mut seen: HashSet<Label> = HashSet::default();
    for label in order.iter().copied() {
        if !sig.is_contracted(label) { return Err(UnknownLabel(label)); }
        if !seen.insert(label) { return Err(RepeatedLabel(label)); }
    }
    sig.contracted().iter()
        .find(|label| !seen.contains(*label))
        .map_or(Ok(()), |label| Err(MissingLabel(*label)))
}

// simulates the tensor pool on labels only
struct Planner<'s> {
    sig: &'s Signature,
    pool: Vec<Option<Vec<Label>>>,
    steps: Vec<Step>,
    consumed: Vec<Label>,
    flops: usize,
}

impl<'s> Planner<'s> {
    fn new<L>(sig: &'s Signature, labels: &[L]) -> Self
    where L: AsRef<[Label]>
    {
        let pool: Vec<Option<Vec<Label>>>
            = labels.iter()
            .map(|labs| Some(labs.as_ref().to_vec()))
            .collect();
        Self { sig, pool, steps: Vec::new(), consumed: Vec::new(), flops: 0 }
    }

    // saturates on overflow
    fn size(&self, labels: &[Label]) -> usize {
        labels.iter()
            .map(|label| self.sig.dim(*label).unwrap_or(1))
            .fold(1, usize::saturating_mul)
    }

    // all live slots carrying `label`
    fn holders(&self, label: Label) -> Vec<Id> {
        self.pool.iter().enumerate()
            .filter_map(|(k, slot)| {
                slot.as_ref()
                    .is_some_and(|labs| labs.contains(&label))
                    .then_some(Id(k))
            })
            .collect()
    }

    fn labels_of(&self, id: Id) -> &[Label] {
        self.pool[id.0].as_deref().unwrap_or(&[])
    }

    fn push(&mut self, labels: Vec<Label>) -> Id {
        self.pool.push(Some(labels));
        Id(self.pool.len() - 1)
    }

    // size of the tensor produced by visiting `label`, if it hasn't been
    // summed yet
    fn result_size(&self, label: Label) -> Option<usize> {
        match self.holders(label).as_slice() {
            [] => None,
            [node] => {
                let d = self.sig.dim(label).unwrap_or(1).max(1);
                Some(self.size(self.labels_of(*node)) / d.saturating_mul(d))
            },
            [lhs, rhs, ..] => {
                let labs_a = self.labels_of(*lhs);
                let labs_b = self.labels_of(*rhs);
                let free: Vec<Label>
                    = labs_a.iter().filter(|l| !labs_b.contains(l))
                    .chain(labs_b.iter().filter(|l| !labs_a.contains(l)))
                    .copied()
                    .collect();
                Some(self.size(&free))
            },
        }
    }

    fn visit(&mut self, label: Label) {
        match *self.holders(label).as_slice() {
            [] => { },
            [node] => {
                let labs = self.pool[node.0].take().unwrap_or_default();
                let d = self.sig.dim(label).unwrap_or(1).max(1);
                self.flops = self.flops.saturating_add(self.size(&labs) / d);
                let rem: Vec<Label>
                    = labs.into_iter().filter(|l| *l != label).collect();
                self.pool[node.0] = Some(rem);
                self.steps.push(Step::Trace { node, label });
                self.consumed.push(label);
            },
            [lhs, rhs, ..] => {
                let labs_a = self.pool[lhs.0].take().unwrap_or_default();
                let labs_b = self.pool[rhs.0].take().unwrap_or_default();
                let shared: Vec<Label>
                    = labs_a.iter().copied()
                    .filter(|l| labs_b.contains(l))
                    .unique()
                    .sorted()
                    .collect();
                let free: Vec<Label>
                    = labs_a.iter().chain(labs_b.iter()).copied()
                    .filter(|l| !shared.contains(l))
                    .collect();
                self.flops
                    = self.flops
                    .saturating_add(self.size(&free).saturating_mul(self.size(&shared)));
                let out = self.push(free);
                self.consumed.push(label);
                self.consumed.extend(shared.iter().filter(|l| **l != label));
                self.steps.push(Step::Contract { lhs, rhs, labels: shared, out });
            },
        }
    }

    fn finish(mut self) -> Plan {
        let live: Vec<Id>
            = self.pool.iter().enumerate()
            .filter_map(|(k, slot)| slot.is_some().then_some(Id(k)))
            .collect();
        let mut output = live[0];
        for rhs in live.into_iter().skip(1) {
            let labs_a = self.pool[output.0].take().unwrap_or_default();
            let labs_b = self.pool[rhs.0].take().unwrap_or_default();
            let labs: Vec<Label> = labs_a.into_iter().chain(labs_b).collect();
            self.flops = self.flops.saturating_add(self.size(&labs));
            let out = self.push(labs);
            self.steps.push(Step::Outer { lhs: output, rhs, out });
            output = out;
        }
        let output_labels = self.labels_of(output).to_vec();
        Plan {
            steps: self.steps,
            order: self.consumed,
            output,
            output_labels,
            flops: self.flops,
        }
    }
}
