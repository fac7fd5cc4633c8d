//! A collection of labeled arrays to be contracted down to a single array.
//!
//! A [`Network`] holds its arrays as copy-on-write data: arrays pushed as views
//! are only read, never copied or modified, and intermediate results are
//! allocated fresh as the [plan][crate::plan::Plan] is carried out. Every
//! intermediate is dropped as soon as the step consuming it is done.

use ndarray::{ self as nd, LinalgScalar };
use thiserror::Error;
use crate::{
    label::{ self, Label, Signature },
    plan::{ self, Id, Order, Plan, Step },
    tensor::{ self, Tensor },
};

#[derive(Debug, Error)]
pub enum NetworkError {
    /// Returned when a step refers to a pool slot that holds no tensor.
    #[error("error in Network::contract: missing ID {0}")]
    MissingId(usize),

    /// Returned by validation of the network's labels.
    #[error("label error: {0}")]
    LabelError(#[from] label::LabelError),

    /// Returned by planning, e.g. for a bad explicit contraction order.
    #[error("contraction order error: {0}")]
    PlanError(#[from] plan::PlanError),

    /// Returned by anything involving an operation on the level of individual
    /// tensors.
    #[error("tensor error: {0}")]
    TensorError(#[from] tensor::TensorError),
}
use NetworkError::*;
pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Clone, Debug)]
struct Node<'a, A> {
    data: nd::CowArray<'a, A, nd::IxDyn>,
    labels: Vec<Label>,
}

fn take<'a, A>(pool: &mut [Option<Node<'a, A>>], id: Id)
    -> NetworkResult<Node<'a, A>>
{
    pool.get_mut(id.0)
        .and_then(Option::take)
        .ok_or(MissingId(id.0))
}

fn put<'a, A>(pool: &mut Vec<Option<Node<'a, A>>>, id: Id, node: Node<'a, A>) {
    if pool.len() <= id.0 { pool.resize_with(id.0 + 1, || None); }
    pool[id.0] = Some(node);
}

/// A list of arrays, each with one [`Label`] per axis, plus the [`Order`] in
/// which to sum over bonds.
///
/// Labels are only checked when the network is [planned][Self::plan] or
/// [contracted][Self::contract]; see [`label`][crate::label] for the rules.
///
/// ```
/// use ndarray::{ array, ArrayD };
/// use tensor_ncon::{ Network, Order };
///
/// let a: ArrayD<f64> = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
/// let v: ArrayD<f64> = array![1.0, -1.0].into_dyn();
///
/// // w_i = Σ_j A_{i,j} v_j
/// let w: ArrayD<f64> = Network::new()
///     .with(a.view(), [-1, 1])
///     .with(v.view(), [1])
///     .order(Order::Greedy)
///     .contract()
///     .unwrap();
/// assert_eq!(w, array![-1.0, -1.0].into_dyn());
/// ```
#[derive(Clone, Debug)]
pub struct Network<'a, A> {
    nodes: Vec<Node<'a, A>>,
    order: Order,
}

impl<'a, A> Default for Network<'a, A> {
    fn default() -> Self { Self::new() }
}

impl<'a, A> Network<'a, A> {
    /// Create a new, empty network summing labels in ascending order.
    pub fn new() -> Self {
        Self { nodes: Vec::new(), order: Order::default() }
    }

    /// Create a new network from an iterator by repeatedly
    /// [pushing][Self::push] `(array, labels)` pairs onto an initially empty
    /// network.
    ///
    /// [IDs][Id] count from zero in iteration order.
    pub fn from_nodes<I, V, L, T>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<nd::CowArray<'a, A, nd::IxDyn>>,
        L: IntoIterator<Item = T>,
        T: Into<Label>,
    {
        let mut new = Self::new();
        for (tensor, labels) in nodes.into_iter() {
            new.push(tensor, labels);
        }
        new
    }

    /// Add an array with labels for each of its axes to the network and return
    /// its ID.
    ///
    /// Both owned arrays and views are accepted; views are never copied unless
    /// the network reduces to that single array.
    pub fn push<V, L, T>(&mut self, tensor: V, labels: L) -> Id
    where
        V: Into<nd::CowArray<'a, A, nd::IxDyn>>,
        L: IntoIterator<Item = T>,
        T: Into<Label>,
    {
        let labels: Vec<Label> = labels.into_iter().map(Into::into).collect();
        self.nodes.push(Node { data: tensor.into(), labels });
        Id(self.nodes.len() - 1)
    }

    /// Like [`Self::push`], but consuming and returning `self`.
    pub fn with<V, L, T>(mut self, tensor: V, labels: L) -> Self
    where
        V: Into<nd::CowArray<'a, A, nd::IxDyn>>,
        L: IntoIterator<Item = T>,
        T: Into<Label>,
    {
        self.push(tensor, labels);
        self
    }

    /// Set the order in which bonds are summed.
    pub fn set_order<O>(&mut self, order: O) -> &mut Self
    where O: Into<Order>
    {
        self.order = order.into();
        self
    }

    /// Like [`Self::set_order`], but consuming and returning `self`.
    pub fn order<O>(mut self, order: O) -> Self
    where O: Into<Order>
    {
        self.set_order(order);
        self
    }

    /// Return the number of arrays in the network.
    pub fn count_nodes(&self) -> usize { self.nodes.len() }

    /// Return the labels of a specific array, if it exists.
    pub fn labels_of<I>(&self, id: I) -> Option<&[Label]>
    where I: Into<Id>
    {
        self.nodes.get(id.into().0).map(|node| node.labels.as_slice())
    }

    /// Return the shape of a specific array, if it exists.
    pub fn shape_of<I>(&self, id: I) -> Option<&[usize]>
    where I: Into<Id>
    {
        self.nodes.get(id.into().0).map(|node| node.data.shape())
    }

    /// Validate all labels against each other and against the shapes of their
    /// arrays.
    pub fn signature(&self) -> NetworkResult<Signature> {
        let shapes: Vec<&[usize]>
            = self.nodes.iter().map(|node| node.data.shape()).collect();
        let labels: Vec<&[Label]>
            = self.nodes.iter().map(|node| node.labels.as_slice()).collect();
        Ok(label::validate(&shapes, &labels)?)
    }

    /// Validate the network and compute its sequence of contraction steps.
    pub fn plan(&self) -> NetworkResult<Plan> {
        let sig = self.signature()?;
        let labels: Vec<&[Label]>
            = self.nodes.iter().map(|node| node.labels.as_slice()).collect();
        Ok(Plan::new(&sig, &labels, &self.order)?)
    }
}

impl<'a, A> Network<'a, A>
where A: LinalgScalar
{
    /// Contract the entire network into a single tensor, labeled -1, -2, ...
    /// in axis order.
    ///
    /// Fails if the network is empty, its labels are inconsistent, or an
    /// explicit contraction order is not a permutation of its positive labels.
    pub fn contract_tensor(self) -> NetworkResult<Tensor<A>> {
        let plan = self.plan()?;
        log::debug!(
            "contracting {} tensor(s) in {} step(s)",
            self.nodes.len(),
            plan.steps().len(),
        );
        let mut pool: Vec<Option<Node<'a, A>>>
            = self.nodes.into_iter().map(Some).collect();
        for (k, step) in plan.steps().iter().enumerate() {
            log::trace!("step {k}: {step}");
            match step {
                Step::Trace { node, label } => {
                    let operand = take(&mut pool, *node)?;
                    let (data, labels)
                        = tensor::trace(
                            operand.data.view(), &operand.labels, *label)?;
                    put(&mut pool, *node, Node { data: data.into(), labels });
                },
                Step::Contract { lhs, rhs, labels: shared, out } => {
                    let a = take(&mut pool, *lhs)?;
                    let b = take(&mut pool, *rhs)?;
                    let (data, labels)
                        = tensor::pairwise(
                            a.data.view(), &a.labels,
                            b.data.view(), &b.labels,
                            shared,
                        )?;
                    put(&mut pool, *out, Node { data: data.into(), labels });
                },
                Step::Outer { lhs, rhs, out } => {
                    let a = take(&mut pool, *lhs)?;
                    let b = take(&mut pool, *rhs)?;
                    let (data, labels)
                        = tensor::pairwise(
                            a.data.view(), &a.labels,
                            b.data.view(), &b.labels,
                            &[],
                        )?;
                    put(&mut pool, *out, Node { data: data.into(), labels });
                },
            }
        }
        let Node { data, labels } = take(&mut pool, plan.output())?;
        Ok(Tensor::new(labels, data.into_owned())?.permute_output()?)
    }

    /// Contract the entire network into a single array whose axes follow the
    /// output labels -1, -2, ...
    ///
    /// The array is always newly allocated in standard layout. A network that
    /// sums to a number gives a rank-0 array.
    pub fn contract(self) -> NetworkResult<nd::ArrayD<A>> {
        self.contract_tensor().map(Tensor::into_array)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ array, ArrayD };
    use crate::{ label::LabelError, plan::PlanError };
    use super::*;

    #[test]
    fn borrowed_inputs_are_untouched() {
        let a: ArrayD<f64> = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let b: ArrayD<f64> = array![[5.0, 6.0], [7.0, 8.0]].into_dyn();
        let a0 = a.clone();
        let b0 = b.clone();
        let c: ArrayD<f64> = Network::new()
            .with(a.view(), [-1, 1])
            .with(b.view(), [1, -2])
            .contract()
            .unwrap();
        assert_eq!(c, array![[19.0, 22.0], [43.0, 50.0]].into_dyn());
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn owned_and_borrowed_mix() {
        let a: ArrayD<f64> = array![1.0, 2.0, 3.0].into_dyn();
        let mut net: Network<f64> = Network::new();
        let id_a = net.push(a.view(), [1]);
        let id_b = net.push(array![1.0, 1.0, 1.0].into_dyn(), [1]);
        assert_eq!(net.count_nodes(), 2);
        assert_eq!(net.labels_of(id_a), Some([Label(1)].as_slice()));
        assert_eq!(net.shape_of(id_b), Some([3].as_slice()));
        assert_eq!(net.labels_of(5_usize), None);
        let s = net.contract().unwrap();
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.sum(), 6.0);
    }

    #[test]
    fn single_tensor_is_copied_in_order() {
        let a = ArrayD::from_shape_fn(vec![2, 3], |ix| (ix[0] * 3 + ix[1]) as f64);
        let out: ArrayD<f64>
            = Network::from_nodes([(a.view(), [-1, -2])]).contract().unwrap();
        assert_eq!(out, a);
        let out_t: ArrayD<f64>
            = Network::from_nodes([(a.view(), [-2, -1])]).contract().unwrap();
        assert_eq!(out_t, a.t().to_owned());
        assert!(out_t.is_standard_layout());
    }

    #[test]
    fn result_tensor_is_labeled_in_output_order() {
        let a = ArrayD::<f64>::ones(vec![2, 3]);
        let b = ArrayD::<f64>::ones(vec![4, 3]);
        let t: Tensor<f64> = Network::new()
            .with(a.view(), [-2, 1])
            .with(b.view(), [-1, 1])
            .contract_tensor()
            .unwrap();
        assert_eq!(t.labels(), &[Label(-1), Label(-2)]);
        assert_eq!(t.shape(), &[4, 2]);
        assert!(t.data().iter().all(|x| *x == 3.0));
    }

    #[test]
    fn errors_are_tagged_by_stage() {
        let a = ArrayD::<f64>::ones(vec![2, 3]);
        let b = ArrayD::<f64>::ones(vec![3, 2]);

        let net: Network<f64>
            = Network::new().with(a.view(), [-1, 1]).with(b.view(), [2, -2]);
        assert!(matches!(
            net.contract(),
            Err(NetworkError::LabelError(LabelError::LabelArity { .. })),
        ));

        let net: Network<f64> = Network::new()
            .with(a.view(), [-1, 1])
            .with(b.view(), [1, -2])
            .order(vec![2]);
        assert!(matches!(
            net.contract(),
            Err(NetworkError::PlanError(PlanError::UnknownLabel(Label(2)))),
        ));

        let empty: Network<f64> = Network::new();
        assert!(matches!(
            empty.contract(),
            Err(NetworkError::LabelError(LabelError::EmptyNetwork)),
        ));
    }
}
