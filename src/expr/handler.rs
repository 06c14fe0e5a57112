//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::Cell;

use crate::Result;
use crate::buffer::Buffer;
use crate::device::Queue;
use crate::dtype::Element;
use crate::error::ExprError;
use crate::eval;
use crate::expr::functor::{BinaryFn, UnaryFn};
use crate::expr::{Expr, ExprKind, ExprMaterialize, ExprNode, ExprReduce};
use crate::vector::Vector;

//--------------------------------------------------------------------------------------------------

/// Device-side evaluator of one expression node.
///
/// The handler tree mirrors the expression tree. `prepare()` runs on the host
/// before the kernel is launched: it resolves buffer pointers and computes
/// Materialize and Reduce nodes. `value_at()` runs inside the kernel and
/// must not fail.
pub enum Handler<'e, T: Element> {
	Leaf {
		buffer: &'e Buffer<T>,
		ptr: *const T,
	},
	Unary {
		f: UnaryFn<T>,
		inner: Box<Self>,
	},
	Binary {
		f: BinaryFn<T>,
		lhs: Box<Self>,
		rhs: Box<Self>,
		lhs_broadcasted: bool,
		rhs_broadcasted: bool,
	},
	Shift {
		inner: Box<Self>,
		offset: isize,
		extent: usize,
	},
	Materialize {
		node: &'e ExprMaterialize<T>,
		queue: &'e Queue,
		ptr: *const T,
		computed_here: Option<ComputedMark<'e>>,
	},
	Reduce {
		node: &'e ExprReduce<T>,
		value: T,
	},
}

/// Marks a Materialize result as current while the handler that computed it is alive.
/// Other occurrences of the same node in that handler tree read the result instead of
/// computing it again. Dropping the handler makes the next evaluation recompute.
pub struct ComputedMark<'e>(&'e Cell<bool>);

impl Drop for ComputedMark<'_> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}

/// Index of the element read by a shift of `offset`, clamped to `[0, extent - 1]`.
#[inline]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_sign_loss)]
pub fn shifted_index(index: usize, offset: isize, extent: usize) -> usize {
	let last = extent.saturating_sub(1);
	let real = (index as isize).saturating_add(offset);
	if real < 0 {
		0
	} else if real as usize > last {
		last
	} else {
		real as usize
	}
}

impl<'e, T: Element> Handler<'e, T> {
	pub(crate) fn new(node: &'e ExprNode<T>) -> Result<Self> {
		Ok(match &node.kind {
			ExprKind::Leaf(leaf) => {
				let Some(buffer) = leaf.buffer.as_deref() else {
					return Err(ExprError::uninitialized("vector has no buffer"));
				};
				Self::Leaf { buffer, ptr: std::ptr::null() }
			},
			ExprKind::Unary(unary) => Self::Unary {
				f: unary.f,
				inner: Box::new(Self::new(&unary.expr)?),
			},
			ExprKind::Binary(binary) => Self::Binary {
				f: binary.f,
				lhs: Box::new(Self::new(&binary.lhs)?),
				rhs: Box::new(Self::new(&binary.rhs)?),
				lhs_broadcasted: binary.lhs_broadcasted,
				rhs_broadcasted: binary.rhs_broadcasted,
			},
			ExprKind::Shift(shift) => Self::Shift {
				inner: Box::new(Self::new(&shift.expr)?),
				offset: shift.offset,
				extent: shift.expr.extent,
			},
			ExprKind::Materialize(materialize) => {
				let Some(queue) = node.queue.as_ref() else {
					return Err(ExprError::uninitialized("expression is not bound to a queue"));
				};
				Self::Materialize {
					node: materialize,
					queue,
					ptr: std::ptr::null(),
					computed_here: None,
				}
			},
			ExprKind::Reduce(reduce) => Self::Reduce { node: reduce, value: T::default() },
		})
	}

	/// Host-side preparation. Has to be called once before `value_at()`.
	pub fn prepare(&mut self) -> Result<()> {
		match self {
			Self::Leaf { buffer, ptr } => {
				*ptr = unsafe { buffer.kernel_ptr() };
			},
			Self::Unary { inner, .. } | Self::Shift { inner, .. } => inner.prepare()?,
			Self::Binary { lhs, rhs, .. } => {
				lhs.prepare()?;
				rhs.prepare()?;
			},
			Self::Materialize { node, queue, ptr, computed_here } => {
				let node: &'e ExprMaterialize<T> = *node;
				let mut cache = node.cache.borrow_mut();
				let temp = cache.get_or_insert_with(|| Vector::on(*queue));
				if !node.computed.get() {
					log::trace!("materializing {} elements", node.expr.extent);
					eval::assign(temp, &Expr { node: node.expr.clone() })?;
					node.computed.set(true);
					*computed_here = Some(ComputedMark(&node.computed));
				}
				*ptr = unsafe { temp.buffer()?.kernel_ptr() };
			},
			Self::Reduce { node, value } => {
				*value = crate::reduce::reduce_node(&node.expr, node.op)?;
			},
		}
		Ok(())
	}

	/// Element `index` of the expression.
	///
	/// `index` has to be less than the extent of the node, except below a Shift,
	/// which clamps it.
	#[inline]
	pub fn value_at(&self, index: usize) -> T {
		match self {
			Self::Leaf { buffer, ptr } => {
				debug_assert!(!ptr.is_null(), "value_at() called before prepare()");
				debug_assert!(index < buffer.len());
				unsafe { *ptr.add(index) }
			},
			Self::Unary { f, inner } => f.apply(inner.value_at(index)),
			Self::Binary { f, lhs, rhs, lhs_broadcasted, rhs_broadcasted } => {
				let a = lhs.value_at(if *lhs_broadcasted { 0 } else { index });
				let b = rhs.value_at(if *rhs_broadcasted { 0 } else { index });
				f.apply(a, b)
			},
			Self::Shift { inner, offset, extent } => {
				inner.value_at(shifted_index(index, *offset, *extent))
			},
			Self::Materialize { ptr, .. } => {
				debug_assert!(!ptr.is_null(), "value_at() called before prepare()");
				unsafe { *ptr.add(index) }
			},
			Self::Reduce { value, .. } => *value,
		}
	}
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::cpu::CPUDevice;

	#[test]
	fn test_shifted_index_clamps() {
		assert_eq!(shifted_index(0, 1, 4), 1);
		assert_eq!(shifted_index(3, 1, 4), 3);
		assert_eq!(shifted_index(0, -1, 4), 0);
		assert_eq!(shifted_index(2, -1, 4), 1);
		assert_eq!(shifted_index(10, -100, 4), 0);
		assert_eq!(shifted_index(10, 0, 4), 3);
	}

	#[test]
	fn test_handler_on_host() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[1, 2, 3, 4]).unwrap();
		let one = Vector::from_slice(&queue, &[10]).unwrap();
		let e = a.expr().shift(-1) * &one;
		let mut handler = e.handler().unwrap();
		handler.prepare().unwrap();
		let values: Vec<i32> = (0..4).map(|i| handler.value_at(i)).collect();
		assert_eq!(values, vec![10, 10, 20, 30]);
	}

	#[test]
	fn test_reduce_handler_is_constant() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[1.0, 2.0, 3.0]).unwrap();
		let e = a.expr().sum();
		let mut handler = e.handler().unwrap();
		handler.prepare().unwrap();
		assert_eq!(handler.value_at(0), 6.0);
	}
}

//--------------------------------------------------------------------------------------------------
