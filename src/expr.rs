//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use thin_vec::ThinVec;

use crate::Result;
use crate::buffer::Buffer;
use crate::device::Queue;
use crate::dtype::{DType, Element};
use crate::error::{ExprError, NodeError};
use crate::util::LossyInto;
use crate::vector::Vector;

pub mod functor;
pub mod handler;
pub mod ops;

use functor::{BinaryFn, ReduceOp, UnaryFn};
use handler::Handler;

//--------------------------------------------------------------------------------------------------

/// A lazy description of a vector-valued computation.
///
/// Building an expression does no device work. Work happens in `eval()`,
/// `eval_to()`, `compute()` and in `Vector::assign()`.
///
/// Cloning an `Expr` is cheap and shares the node.
pub struct Expr<T: Element> {
	pub node: Rc<ExprNode<T>>,
}

impl<T: Element> Clone for Expr<T> {
	fn clone(&self) -> Self {
		Self { node: self.node.clone() }
	}
}

pub struct ExprNode<T: Element> {
	pub kind: ExprKind<T>,
	pub extent: usize,
	pub queue: Option<Queue>,

	/// True if this node or any node below it has local errors.
	pub have_errors: bool,
	pub local_errors: ThinVec<NodeError>,
}

pub enum ExprKind<T: Element> {
	Leaf(ExprLeaf<T>),
	Unary(ExprUnary<T>),
	Binary(ExprBinary<T>),
	Shift(ExprShift<T>),
	Materialize(ExprMaterialize<T>),
	Reduce(ExprReduce<T>),
}

pub struct ExprLeaf<T: Element> {
	pub buffer: Option<Rc<Buffer<T>>>,
}

pub struct ExprUnary<T: Element> {
	pub f: UnaryFn<T>,
	pub expr: Rc<ExprNode<T>>,
}

pub struct ExprBinary<T: Element> {
	pub f: BinaryFn<T>,
	pub lhs: Rc<ExprNode<T>>,
	pub rhs: Rc<ExprNode<T>>,

	/// The operand has extent 1 and is read at index 0 for every output element.
	pub lhs_broadcasted: bool,
	pub rhs_broadcasted: bool,
}

pub struct ExprShift<T: Element> {
	pub offset: isize,
	pub expr: Rc<ExprNode<T>>,
}

pub struct ExprMaterialize<T: Element> {
	pub expr: Rc<ExprNode<T>>,

	/// Holds the last result. The allocation is reused by later evaluations.
	pub cache: RefCell<Option<Vector<T>>>,

	/// True while a prepared handler holds a result computed for the current assignment.
	pub computed: Cell<bool>,
}

pub struct ExprReduce<T: Element> {
	pub op: ReduceOp<T>,
	pub expr: Rc<ExprNode<T>>,
}

//--------------------------------------------------------------------------------------------------

/// Anything that can be an operand of an expression.
pub trait ToExpr<T: Element> {
	fn to_expr(self) -> Expr<T>;
}

impl<T: Element> ToExpr<T> for Expr<T> {
	fn to_expr(self) -> Expr<T> {
		self
	}
}

impl<T: Element> ToExpr<T> for &Expr<T> {
	fn to_expr(self) -> Expr<T> {
		self.clone()
	}
}

impl<T: Element> ToExpr<T> for &Vector<T> {
	fn to_expr(self) -> Expr<T> {
		Expr::leaf(self)
	}
}

//--------------------------------------------------------------------------------------------------

/// Extent of a binary node and which of the operands is broadcasted.
pub fn broadcast_extents(lhs: usize, rhs: usize) -> Result<(usize, bool, bool)> {
	if lhs == rhs {
		Ok((lhs, false, false))
	} else if lhs == 1 {
		Ok((rhs, true, false))
	} else if rhs == 1 {
		Ok((lhs, false, true))
	} else {
		Err(ExprError::shape_mismatch(lhs, rhs))
	}
}

/// The queue shared by two operands. An operand without a queue adopts the other one's.
pub fn common_queue(lhs: Option<&Queue>, rhs: Option<&Queue>) -> Result<Option<Queue>> {
	match (lhs, rhs) {
		(Some(l), Some(r)) => {
			if !l.same_as(r) {
				return Err(ExprError::context_mismatch());
			}
			Ok(Some(l.clone()))
		},
		(Some(q), None) | (None, Some(q)) => Ok(Some(q.clone())),
		(None, None) => Ok(None),
	}
}

//--------------------------------------------------------------------------------------------------

impl<T: Element> ExprNode<T> {
	fn new(kind: ExprKind<T>, extent: usize, queue: Option<Queue>, child_errors: bool) -> Self {
		Self {
			kind,
			extent,
			queue,
			have_errors: child_errors,
			local_errors: ThinVec::new(),
		}
	}

	#[cold]
	#[inline(never)]
	fn push_error(&mut self, err: &crate::ErrPack<ExprError>) {
		log::debug!("expression node error: {err}");
		self.local_errors.push(NodeError::from_err(err));
		self.have_errors = true;
	}

	/// Reports the first error recorded anywhere in the tree.
	/// Errors of operands are reported before errors of the node itself.
	pub fn check(&self) -> Result<()> {
		if !self.have_errors {
			return Ok(());
		}
		match &self.kind {
			ExprKind::Leaf(_) => {},
			ExprKind::Unary(ExprUnary { expr, .. })
			| ExprKind::Shift(ExprShift { expr, .. })
			| ExprKind::Materialize(ExprMaterialize { expr, .. })
			| ExprKind::Reduce(ExprReduce { expr, .. }) => expr.check()?,
			ExprKind::Binary(binary) => {
				binary.lhs.check()?;
				binary.rhs.check()?;
			},
		}
		if let Some(err) = self.local_errors.first() {
			return Err(err.into());
		}
		Ok(())
	}

	/// True if evaluating this node streams from `buffer` while the kernel runs.
	///
	/// Materialize and Reduce nodes are fully computed before the kernel
	/// that consumes them starts, so their operands are not considered.
	pub fn streams_buffer(&self, buffer: &Rc<Buffer<T>>) -> bool {
		match &self.kind {
			ExprKind::Leaf(leaf) => leaf.buffer.as_ref().is_some_and(|b| Rc::ptr_eq(b, buffer)),
			ExprKind::Unary(ExprUnary { expr, .. }) | ExprKind::Shift(ExprShift { expr, .. }) => {
				expr.streams_buffer(buffer)
			},
			ExprKind::Binary(binary) => {
				binary.lhs.streams_buffer(buffer) || binary.rhs.streams_buffer(buffer)
			},
			ExprKind::Materialize(_) | ExprKind::Reduce(_) => false,
		}
	}
}

//--------------------------------------------------------------------------------------------------

impl<T: Element> Expr<T> {
	fn from_node(node: ExprNode<T>) -> Self {
		Self { node: Rc::new(node) }
	}

	pub fn leaf(vector: &Vector<T>) -> Self {
		let queue = vector.queue_opt().cloned();
		let buffer = vector.buffer_opt().cloned();
		let mut node = ExprNode::new(
			ExprKind::Leaf(ExprLeaf { buffer: buffer.clone() }),
			vector.len(),
			queue.clone(),
			false,
		);
		if queue.is_none() {
			node.push_error(&ExprError::uninitialized("vector has no queue"));
		} else if buffer.is_none() {
			node.push_error(&ExprError::uninitialized("vector has no buffer"));
		}
		Self::from_node(node)
	}

	pub fn extent(&self) -> usize {
		self.node.extent
	}

	pub fn queue(&self) -> Option<&Queue> {
		self.node.queue.as_ref()
	}

	pub fn element_type(&self) -> DType {
		T::dtype
	}

	pub fn have_errors(&self) -> bool {
		self.node.have_errors
	}

	pub fn check(&self) -> Result<()> {
		self.node.check()
	}

	/// A handler that can produce the elements of the expression.
	///
	/// `prepare()` has to be called on the handler before `value_at()`.
	pub fn handler(&self) -> Result<Handler<'_, T>> {
		self.check()?;
		Handler::new(&self.node)
	}

	//----------------------------------------------------------------------------------------------

	pub fn apply(self, f: UnaryFn<T>) -> Self {
		let extent = self.node.extent;
		let queue = self.node.queue.clone();
		let have_errors = self.node.have_errors;
		Self::from_node(ExprNode::new(
			ExprKind::Unary(ExprUnary { f, expr: self.node }),
			extent,
			queue,
			have_errors,
		))
	}

	pub fn unary(inner: impl ToExpr<T>, f: UnaryFn<T>) -> Self {
		inner.to_expr().apply(f)
	}

	pub fn apply_fn(self, f: fn(T) -> T) -> Self {
		self.apply(UnaryFn::Custom(f))
	}

	pub fn abs(self) -> Self {
		self.apply(UnaryFn::Abs)
	}

	pub fn sin(self) -> Self {
		self.apply(UnaryFn::Sin)
	}

	pub fn cos(self) -> Self {
		self.apply(UnaryFn::Cos)
	}

	/// Combines two expressions elementwise.
	///
	/// Fails if the extents are not compatible or the operands are bound to
	/// different queues.
	pub fn try_binary(lhs: impl ToExpr<T>, rhs: impl ToExpr<T>, f: BinaryFn<T>) -> Result<Self> {
		let (lhs, rhs) = (lhs.to_expr(), rhs.to_expr());
		let (extent, lhs_broadcasted, rhs_broadcasted) =
			broadcast_extents(lhs.node.extent, rhs.node.extent)?;
		let queue = common_queue(lhs.queue(), rhs.queue())?;
		let have_errors = lhs.node.have_errors || rhs.node.have_errors;
		Ok(Self::from_node(ExprNode::new(
			ExprKind::Binary(ExprBinary {
				f,
				lhs: lhs.node,
				rhs: rhs.node,
				lhs_broadcasted,
				rhs_broadcasted,
			}),
			extent,
			queue,
			have_errors,
		)))
	}

	/// Like `try_binary()`, but a failure is recorded in the returned node
	/// and reported when the expression is evaluated.
	pub fn binary(lhs: impl ToExpr<T>, rhs: impl ToExpr<T>, f: BinaryFn<T>) -> Self {
		let (lhs, rhs) = (lhs.to_expr(), rhs.to_expr());
		match Self::try_binary(&lhs, &rhs, f) {
			Ok(expr) => expr,
			Err(err) => {
				let extent = lhs.node.extent.max(rhs.node.extent);
				let queue = lhs.node.queue.clone().or_else(|| rhs.node.queue.clone());
				let have_errors = lhs.node.have_errors || rhs.node.have_errors;
				let mut node = ExprNode::new(
					ExprKind::Binary(ExprBinary {
						f,
						lhs: lhs.node,
						rhs: rhs.node,
						lhs_broadcasted: false,
						rhs_broadcasted: false,
					}),
					extent,
					queue,
					have_errors,
				);
				node.push_error(&err);
				Self::from_node(node)
			},
		}
	}

	pub fn elem_max(self, rhs: impl ToExpr<T>) -> Self {
		Self::binary(self, rhs, BinaryFn::Max)
	}

	pub fn elem_min(self, rhs: impl ToExpr<T>) -> Self {
		Self::binary(self, rhs, BinaryFn::Min)
	}

	/// Element `i` of the result is element `clamp(i + offset, 0, extent - 1)` of `self`.
	pub fn shift(self, offset: isize) -> Self {
		if offset == 0 {
			return self;
		}
		let extent = self.node.extent;
		let queue = self.node.queue.clone();
		let have_errors = self.node.have_errors;
		Self::from_node(ExprNode::new(
			ExprKind::Shift(ExprShift { offset, expr: self.node }),
			extent,
			queue,
			have_errors,
		))
	}

	/// Evaluates the operand into a temporary before the kernel is launched,
	/// and reads the temporary instead of recomputing the operand per element.
	///
	/// The operand is computed again on every evaluation, so changes to the
	/// vectors it reads are seen. The temporary lives as long as the node and its
	/// allocation is reused. Within one assignment, all occurrences of the node
	/// share a single computation.
	pub fn materialize(self) -> Self {
		let extent = self.node.extent;
		let queue = self.node.queue.clone();
		let have_errors = self.node.have_errors;
		Self::from_node(ExprNode::new(
			ExprKind::Materialize(ExprMaterialize {
				expr: self.node,
				cache: RefCell::new(None),
				computed: Cell::new(false),
			}),
			extent,
			queue,
			have_errors,
		))
	}

	/// Reduces the expression to a single value. The result has extent 1.
	pub fn reduce(self, op: ReduceOp<T>) -> Self {
		let queue = self.node.queue.clone();
		let have_errors = self.node.have_errors;
		Self::from_node(ExprNode::new(
			ExprKind::Reduce(ExprReduce { op, expr: self.node }),
			1,
			queue,
			have_errors,
		))
	}

	pub fn sum(self) -> Self {
		self.reduce(ReduceOp::Sum)
	}

	pub fn max(self) -> Self {
		self.reduce(ReduceOp::Max)
	}

	pub fn min(self) -> Self {
		self.reduce(ReduceOp::Min)
	}

	/// `sum() / extent`. Integer types use integer division.
	pub fn mean(self) -> Self {
		let extent: f64 = self.node.extent.lossy_into();
		let extent = T::from_f64(extent);
		self.sum().apply(UnaryFn::DivBy(extent))
	}

	//----------------------------------------------------------------------------------------------

	/// Evaluates the expression into `dest`.
	pub fn eval_to(&self, dest: &mut Vector<T>) -> Result<()> {
		crate::eval::assign(dest, self)
	}

	/// Evaluates the expression into a new vector on the expression's queue.
	pub fn eval(&self) -> Result<Vector<T>> {
		self.check()?;
		let Some(queue) = self.queue() else {
			return Err(ExprError::uninitialized("expression is not bound to a queue"));
		};
		let mut result = Vector::on(queue);
		crate::eval::assign(&mut result, self)?;
		Ok(result)
	}

	/// Evaluates an expression of extent 1 and returns its only element.
	pub fn compute(&self) -> Result<T> {
		self.check()?;
		if let ExprKind::Reduce(reduce) = &self.node.kind {
			return crate::reduce::reduce_node(&reduce.expr, reduce.op);
		}
		if self.node.extent != 1 {
			return Err(crate::ErrPack::with_message(
				ExprError::ShapeMismatch,
				format!("compute() needs an expression of extent 1, got {}", self.node.extent),
			));
		}
		let data = self.eval()?.to_vec()?;
		data.first()
			.copied()
			.ok_or_else(|| ExprError::shape_mismatch(1, data.len()))
	}
}

impl<T: Element> std::fmt::Debug for Expr<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let kind = match &self.node.kind {
			ExprKind::Leaf(_) => "Leaf",
			ExprKind::Unary(_) => "Unary",
			ExprKind::Binary(_) => "Binary",
			ExprKind::Shift(_) => "Shift",
			ExprKind::Materialize(_) => "Materialize",
			ExprKind::Reduce(_) => "Reduce",
		};
		f.debug_struct("Expr")
			.field("kind", &kind)
			.field("dtype", &T::dtype)
			.field("extent", &self.node.extent)
			.field("have_errors", &self.node.have_errors)
			.finish()
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::cpu::CPUDevice;

	#[test]
	fn test_broadcast_extents() {
		assert_eq!(broadcast_extents(5, 5).unwrap(), (5, false, false));
		assert_eq!(broadcast_extents(1, 5).unwrap(), (5, true, false));
		assert_eq!(broadcast_extents(5, 1).unwrap(), (5, false, true));
		assert_eq!(broadcast_extents(1, 0).unwrap(), (0, true, false));
		assert_eq!(broadcast_extents(4, 5).unwrap_err().code, ExprError::ShapeMismatch);
	}

	#[test]
	fn test_building_does_no_work() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[1.0, 2.0, 3.0]).unwrap();
		let b = Vector::from_slice(&queue, &[4.0, 5.0, 6.0]).unwrap();
		let e = (&a + &b).abs().shift(1).materialize().sum();
		assert_eq!(e.extent(), 1);
		assert_eq!(e.element_type(), DType::F64);
		assert!(!e.have_errors());
		assert_eq!(queue.launches(), 0);
	}

	#[test]
	fn test_shape_mismatch_is_recorded() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[1, 2, 3]).unwrap();
		let b = Vector::from_slice(&queue, &[1, 2]).unwrap();
		assert!(Expr::try_binary(&a, &b, BinaryFn::Add).is_err());

		let e = (&a + &b) * 2;
		assert!(e.have_errors());
		assert_eq!(e.check().unwrap_err().code, ExprError::ShapeMismatch);
		assert_eq!(e.eval().unwrap_err().code, ExprError::ShapeMismatch);
		assert_eq!(queue.launches(), 0);
	}

	#[test]
	fn test_context_mismatch() {
		let q1 = Queue::new(CPUDevice::new());
		let q2 = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&q1, &[1.0_f32]).unwrap();
		let b = Vector::from_slice(&q2, &[1.0_f32]).unwrap();
		let err = Expr::try_binary(&a, &b, BinaryFn::Mul).unwrap_err();
		assert_eq!(err.code, ExprError::ContextMismatch);
	}

	#[test]
	fn test_uninitialized_leaf() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[1.0, 2.0]).unwrap();
		let missing = Vector::<f64>::on(&queue);
		let e = &a + &missing;
		assert_eq!(e.check().unwrap_err().code, ExprError::UninitializedOperand);
		assert_eq!(
			Vector::<f64>::default().expr().sum().compute().unwrap_err().code,
			ExprError::UninitializedOperand
		);
	}

	#[test]
	fn test_inner_error_reported_first() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[1, 2, 3]).unwrap();
		let b = Vector::from_slice(&queue, &[1, 2]).unwrap();
		let missing = Vector::<i32>::default();
		// the uninitialized leaf sits below the mismatched node
		let e = (&a + &missing) + &b;
		assert_eq!(e.check().unwrap_err().code, ExprError::UninitializedOperand);
	}

	#[test]
	fn test_compute_needs_extent_one() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[1, 2]).unwrap();
		assert_eq!(a.expr().compute().unwrap_err().code, ExprError::ShapeMismatch);
		let one = Vector::from_slice(&queue, &[7]).unwrap();
		assert_eq!((one.expr() * 3).compute().unwrap(), 21);
	}
}

//--------------------------------------------------------------------------------------------------
