//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

//! Operations used by ODE steppers on device-resident state vectors.

use std::rc::Rc;

use crate::Result;
use crate::device::work_div;
use crate::device::{Kernel, Lane};
use crate::dtype::Element;
use crate::error::ExprError;
use crate::eval::ELEMS_PER_THREAD;
use crate::vector::Vector;

//--------------------------------------------------------------------------------------------------

/// `tmp = x1; x1 = a1 * x2 + a2 * x3; x2 = tmp`, in one pass over the data.
#[derive(Debug, Copy, Clone)]
pub struct ScaleSumSwap2<T: Element> {
	pub a1: T,
	pub a2: T,
}

struct ScaleSumSwap2Kernel<T: Element> {
	x1: *mut T,
	x2: *mut T,
	x3: *const T,
	a1: T,
	a2: T,
	n: usize,
}

impl<T: Element> Kernel for ScaleSumSwap2Kernel<T> {
	type Shared = ();

	fn run(&self, lane: Lane, _phase: usize, _shared: &mut [()]) {
		let begin = lane.global() * lane.div.elems_per_thread;
		let end = (begin + lane.div.elems_per_thread).min(self.n);
		for i in begin..end {
			unsafe {
				let tmp = *self.x1.add(i);
				*self.x1.add(i) = self.a1 * *self.x2.add(i) + self.a2 * *self.x3.add(i);
				*self.x2.add(i) = tmp;
			}
		}
	}
}

impl<T: Element> ScaleSumSwap2<T> {
	pub fn new(a1: T, a2: T) -> Self {
		Self { a1, a2 }
	}

	/// `x3` may be the same vector as `x1` or `x2`. `x1` and `x2` must be distinct.
	pub fn apply(&self, x1: &mut Vector<T>, x2: &mut Vector<T>, x3: &Vector<T>) -> Result<()> {
		let queue = x1.queue()?.clone();
		let (b1, b2, b3) = (x1.buffer()?, x2.buffer()?, x3.buffer()?);
		if !x2.queue()?.same_as(&queue) || !x3.queue()?.same_as(&queue) {
			return Err(ExprError::context_mismatch());
		}
		let n = b1.len();
		if b2.len() != n {
			return Err(ExprError::shape_mismatch(n, b2.len()));
		}
		if b3.len() != n {
			return Err(ExprError::shape_mismatch(n, b3.len()));
		}
		if Rc::ptr_eq(b1, b2) {
			return Err(ExprError::aliased());
		}
		if n == 0 {
			return Ok(());
		}

		let div = work_div::divide(queue.props(), n, ELEMS_PER_THREAD);
		log::debug!("scale_sum_swap2: {n} x {}, {div:?}", T::dtype);
		let kernel = unsafe {
			ScaleSumSwap2Kernel {
				x1: b1.kernel_ptr(),
				x2: b2.kernel_ptr(),
				x3: b3.kernel_ptr().cast_const(),
				a1: self.a1,
				a2: self.a2,
				n,
			}
		};
		queue.enqueue(div, &kernel);
		if queue.is_blocking() {
			queue.wait()?;
		}
		Ok(())
	}
}

//--------------------------------------------------------------------------------------------------

/// Elementwise relative error used by adaptive step size control:
///
/// `y = |y| / (eps_abs + eps_rel * (a_x * |x1| + a_dxdt * |x2|))`
#[derive(Debug, Copy, Clone)]
pub struct RelError<T: Element> {
	pub eps_abs: T,
	pub eps_rel: T,
	pub a_x: T,
	pub a_dxdt: T,
}

struct RelErrorKernel<T: Element> {
	y: *mut T,
	x1: *const T,
	x2: *const T,
	op: RelError<T>,
	n: usize,
}

impl<T: Element> Kernel for RelErrorKernel<T> {
	type Shared = ();

	fn run(&self, lane: Lane, _phase: usize, _shared: &mut [()]) {
		let RelError { eps_abs, eps_rel, a_x, a_dxdt } = self.op;
		let begin = lane.global() * lane.div.elems_per_thread;
		let end = (begin + lane.div.elems_per_thread).min(self.n);
		for i in begin..end {
			unsafe {
				let x1 = (*self.x1.add(i)).abs();
				let x2 = (*self.x2.add(i)).abs();
				let y = self.y.add(i);
				*y = (*y).abs() / (eps_abs + eps_rel * (a_x * x1 + a_dxdt * x2));
			}
		}
	}
}

impl<T: Element> RelError<T> {
	pub fn new(eps_abs: T, eps_rel: T, a_x: T, a_dxdt: T) -> Self {
		Self { eps_abs, eps_rel, a_x, a_dxdt }
	}

	/// Overwrites `y` in place. Its buffer is kept, so expressions built on `y` see the result.
	pub fn apply(&self, y: &mut Vector<T>, x1: &Vector<T>, x2: &Vector<T>) -> Result<()> {
		let queue = y.queue()?.clone();
		let (by, b1, b2) = (y.buffer()?, x1.buffer()?, x2.buffer()?);
		if !x1.queue()?.same_as(&queue) || !x2.queue()?.same_as(&queue) {
			return Err(ExprError::context_mismatch());
		}
		let n = by.len();
		if b1.len() != n {
			return Err(ExprError::shape_mismatch(n, b1.len()));
		}
		if b2.len() != n {
			return Err(ExprError::shape_mismatch(n, b2.len()));
		}
		if n == 0 {
			return Ok(());
		}

		let div = work_div::divide(queue.props(), n, ELEMS_PER_THREAD);
		log::debug!("rel_error: {n} x {}, {div:?}", T::dtype);
		let kernel = unsafe {
			RelErrorKernel {
				y: by.kernel_ptr(),
				x1: b1.kernel_ptr().cast_const(),
				x2: b2.kernel_ptr().cast_const(),
				op: *self,
				n,
			}
		};
		queue.enqueue(div, &kernel);
		if queue.is_blocking() {
			queue.wait()?;
		}
		Ok(())
	}
}

//--------------------------------------------------------------------------------------------------

/// `max_i |x[i]|`
pub fn norm_inf<T: Element>(x: &Vector<T>) -> Result<T> {
	x.expr().abs().max().compute()
}

/// Gives `left` the length of `right`. An uninitialized `left` is bound to the queue of `right`.
pub fn resize_like<T: Element>(left: &mut Vector<T>, right: &Vector<T>) -> Result<()> {
	if left.is_initialized() {
		left.resize(right.len())
	} else {
		left.resize_on(right.len(), right.queue()?)
	}
}

pub fn same_size<T: Element>(left: &Vector<T>, right: &Vector<T>) -> bool {
	left.same_size(right)
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
