//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use crate::Result;
use crate::device::work_div;
use crate::device::{Kernel, Lane};
use crate::dtype::Element;
use crate::error::ExprError;
use crate::expr::Expr;
use crate::expr::handler::Handler;
use crate::vector::Vector;

//--------------------------------------------------------------------------------------------------

/// Number of consecutive output elements computed by one lane of an assignment.
pub const ELEMS_PER_THREAD: usize = 8;

struct AssignKernel<'h, 'e, T: Element> {
	dst: *mut T,
	src: &'h Handler<'e, T>,
	extent: usize,
}

impl<T: Element> Kernel for AssignKernel<'_, '_, T> {
	type Shared = ();

	fn run(&self, lane: Lane, _phase: usize, _shared: &mut [()]) {
		let begin = lane.global() * lane.div.elems_per_thread;
		let end = (begin + lane.div.elems_per_thread).min(self.extent);
		for i in begin..end {
			unsafe {
				*self.dst.add(i) = self.src.value_at(i);
			}
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// `dest = src`
///
/// Everything that can fail is checked before `dest` is touched. On success,
/// `dest` has the extent of `src` and is bound to its queue.
pub fn assign<T: Element>(dest: &mut Vector<T>, src: &Expr<T>) -> Result<()> {
	src.check()?;
	let Some(queue) = src.queue().cloned() else {
		return Err(ExprError::uninitialized("expression is not bound to a queue"));
	};
	if dest.buffer_opt().is_some_and(|buffer| src.node.streams_buffer(buffer)) {
		return Err(ExprError::aliased());
	}

	let extent = src.extent();
	let mut handler = src.handler()?;
	handler.prepare()?;

	dest.resize_on(extent, &queue)?;
	if extent > 0 {
		let div = work_div::divide(queue.props(), extent, ELEMS_PER_THREAD);
		log::debug!("assign: {extent} x {}, {div:?}", T::dtype);
		let kernel = AssignKernel {
			dst: unsafe { dest.buffer()?.kernel_ptr() },
			src: &handler,
			extent,
		};
		queue.enqueue(div, &kernel);
	}
	if queue.is_blocking() {
		queue.wait()?;
	}
	Ok(())
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
