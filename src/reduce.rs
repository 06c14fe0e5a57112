//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ptr::NonNull;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::Result;
use crate::buffer::Buffer;
use crate::device::{DeviceProps, Kernel, Lane, Queue, WorkDiv};
use crate::dtype::Element;
use crate::error::ExprError;
use crate::expr::functor::{BinaryFn, ReduceOp};
use crate::expr::handler::Handler;
use crate::expr::{Expr, ExprNode};
use crate::util::halving_steps;

//--------------------------------------------------------------------------------------------------

/// Upper limit on the number of lanes in one block of a reduction.
pub const MAX_REDUCE_BLOCK_SIZE: usize = 256;

/// Blocks launched per compute unit in the first reduction kernel.
pub const BLOCKS_PER_UNIT: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReduceGeometry {
	pub block_size: usize,
	pub block_count: usize,
}

impl ReduceGeometry {
	/// Every lane of the first kernel reads at least two elements, except when
	/// there are fewer than two elements per lane to begin with.
	pub fn new(props: &DeviceProps, n: usize) -> Self {
		let block_size = props.max_threads_per_block.clamp(1, MAX_REDUCE_BLOCK_SIZE);
		let max_block_count = n.div_ceil(2).div_ceil(block_size);
		let block_count = (props.multiprocessor_count * BLOCKS_PER_UNIT)
			.min(max_block_count)
			.min(props.max_blocks)
			.max(1);
		Self { block_size, block_count }
	}
}

//--------------------------------------------------------------------------------------------------

/// Indexed read access for the first phase of a reduction kernel.
pub trait ValueSource<T: Element> {
	fn value_at(&self, index: usize) -> T;
}

impl<T: Element> ValueSource<T> for Handler<'_, T> {
	#[inline]
	fn value_at(&self, index: usize) -> T {
		Handler::value_at(self, index)
	}
}

/// The partial results written by the first kernel.
struct Partials<T: Element> {
	ptr: *const T,
}

impl<T: Element> ValueSource<T> for Partials<T> {
	#[inline]
	fn value_at(&self, index: usize) -> T {
		unsafe { *self.ptr.add(index) }
	}
}

//--------------------------------------------------------------------------------------------------

/// Reduces `n` values of `src` to one value per block, written to `dst[block]`.
///
/// Phase 0: every lane folds a grid-stride sequence of elements, four at a time
/// while a whole group of four fits, and stores the result in its shared slot.
/// Phases `1..=levels`: tree reduction of the shared slots.
/// Last phase: lane 0 writes the block result.
struct ReduceKernel<'s, T: Element, S: ValueSource<T>> {
	src: &'s S,
	dst: *mut T,
	n: usize,
	f: BinaryFn<T>,
	steps: SmallVec<[(usize, usize); 16]>,
}

impl<T: Element, S: ValueSource<T>> ReduceKernel<'_, T, S> {
	fn fold_grid_stride(&self, lane: Lane) -> Option<T> {
		let n = self.n;
		let t = lane.global();
		if t >= n {
			return None;
		}
		let grid = lane.grid_threads();
		let f = &self.f;
		let src = self.src;

		let mut result = src.value_at(t);
		let mut i = t + grid;
		while i + 3 * grid < n {
			let pair = f.apply(src.value_at(i), src.value_at(i + grid));
			result = f.apply(f.apply(f.apply(result, pair), src.value_at(i + 2 * grid)), src.value_at(i + 3 * grid));
			i += 4 * grid;
		}
		while i < n {
			result = f.apply(result, src.value_at(i));
			i += grid;
		}
		Some(result)
	}
}

impl<T: Element, S: ValueSource<T>> Kernel for ReduceKernel<'_, T, S> {
	type Shared = T;

	fn phases(&self) -> usize {
		self.steps.len() + 2
	}

	fn run(&self, lane: Lane, phase: usize, shared: &mut [T]) {
		let t = lane.thread;
		// lanes at or above `valid` have no data: their global index is past `n`
		let block_start = lane.block * lane.div.threads_per_block;
		let valid = self.n.saturating_sub(block_start);

		if phase == 0 {
			if let Some(value) = self.fold_grid_stride(lane) {
				shared[t] = value;
			}
		} else if phase <= self.steps.len() {
			let (size, up) = self.steps[phase - 1];
			if t < up && t + up < size && t + up < valid {
				shared[t] = self.f.apply(shared[t], shared[t + up]);
			}
		} else if t == 0 && valid > 0 {
			unsafe {
				*self.dst.add(lane.block) = shared[0];
			}
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// Reduces `n` values of `src` with `f` using two kernel launches.
///
/// The first kernel produces one partial result per block, the second kernel
/// reduces the partial results with a single block. The result is downloaded
/// and the queue is waited for.
pub fn reduce_source<T: Element, S: ValueSource<T>>(
	queue: &Queue,
	src: &S,
	n: usize,
	f: BinaryFn<T>,
) -> Result<T> {
	if n == 0 {
		return Err(ExprError::empty_reduction());
	}
	let geometry = ReduceGeometry::new(queue.props(), n);
	let steps = halving_steps(geometry.block_size);
	log::debug!(
		"reduce: {n} x {}, {} blocks of {} lanes, {} phases",
		T::dtype,
		geometry.block_count,
		geometry.block_size,
		steps.len() + 2,
	);

	let partials = Buffer::<T>::new(queue.device().clone(), geometry.block_count)?;
	let dst = unsafe { partials.kernel_ptr() };

	let div = WorkDiv {
		blocks: geometry.block_count,
		threads_per_block: geometry.block_size,
		elems_per_thread: 1,
	};
	queue.enqueue(div, &ReduceKernel { src, dst, n, f, steps: steps.clone() });

	let div = WorkDiv { blocks: 1, ..div };
	let partial_src = Partials { ptr: dst.cast_const() };
	queue.enqueue(div, &ReduceKernel {
		src: &partial_src,
		dst,
		n: geometry.block_count,
		f,
		steps,
	});

	let mut result = [T::default()];
	unsafe {
		queue.enqueue_download(
			partials.device_ptr(),
			NonNull::from(&mut result).cast::<u8>(),
			T::dtype.bytes(),
		);
	}
	queue.wait()?;
	Ok(result[0])
}

/// Reduces the expression rooted at `node` to a single value.
pub fn reduce_node<T: Element>(node: &Rc<ExprNode<T>>, op: ReduceOp<T>) -> Result<T> {
	node.check()?;
	let n = node.extent;
	if n == 0 {
		return Err(ExprError::empty_reduction());
	}
	let Some(queue) = node.queue.as_ref() else {
		return Err(ExprError::uninitialized("expression is not bound to a queue"));
	};
	let expr = Expr { node: node.clone() };
	let mut handler = expr.handler()?;
	handler.prepare()?;
	reduce_source(queue, &handler, n, op.as_binary())
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
