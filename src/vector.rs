//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ptr::NonNull;
use std::rc::Rc;

use ndarray::{Array1, ArrayView1};

use crate::Result;
use crate::buffer::Buffer;
use crate::device::Queue;
use crate::dtype::Element;
use crate::error::ExprError;
use crate::expr::{Expr, ToExpr};

//--------------------------------------------------------------------------------------------------

/// A device-resident vector bound to a queue.
///
/// A vector can exist without a queue or without a buffer. Such a vector is
/// uninitialized and using it as an operand fails with `UninitializedOperand`.
#[derive(Default)]
pub struct Vector<T: Element> {
	queue: Option<Queue>,
	buffer: Option<Rc<Buffer<T>>>,
}

impl<T: Element> Vector<T> {
	/// Allocates a vector of `len` elements with undefined contents.
	pub fn new(queue: &Queue, len: usize) -> Result<Self> {
		let buffer = Buffer::new(queue.device().clone(), len)?;
		Ok(Self {
			queue: Some(queue.clone()),
			buffer: Some(Rc::new(buffer)),
		})
	}

	/// A vector bound to `queue` that does not own any storage yet.
	pub fn on(queue: &Queue) -> Self {
		Self { queue: Some(queue.clone()), buffer: None }
	}

	pub fn from_slice(queue: &Queue, data: &[T]) -> Result<Self> {
		let mut result = Self::new(queue, data.len())?;
		result.upload(data)?;
		Ok(result)
	}

	pub fn from_array(queue: &Queue, data: ArrayView1<T>) -> Result<Self> {
		if let Some(slice) = data.as_slice() {
			Self::from_slice(queue, slice)
		} else {
			Self::from_slice(queue, &data.to_vec())
		}
	}

	pub fn has_queue(&self) -> bool {
		self.queue.is_some()
	}

	pub fn has_buffer(&self) -> bool {
		self.buffer.is_some()
	}

	pub fn is_initialized(&self) -> bool {
		self.has_queue() && self.has_buffer()
	}

	/// Number of elements. An uninitialized vector has length 0.
	pub fn len(&self) -> usize {
		self.buffer.as_ref().map_or(0, |b| b.len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn queue(&self) -> Result<&Queue> {
		self.queue.as_ref().ok_or_else(|| ExprError::uninitialized("vector has no queue"))
	}

	pub fn buffer(&self) -> Result<&Rc<Buffer<T>>> {
		self.buffer.as_ref().ok_or_else(|| ExprError::uninitialized("vector has no buffer"))
	}

	pub(crate) fn queue_opt(&self) -> Option<&Queue> {
		self.queue.as_ref()
	}

	pub(crate) fn buffer_opt(&self) -> Option<&Rc<Buffer<T>>> {
		self.buffer.as_ref()
	}

	/// Both vectors are initialized and have the same length.
	pub fn same_size(&self, other: &Self) -> bool {
		self.is_initialized() && other.is_initialized() && self.len() == other.len()
	}

	/// Changes the length to `len`.
	///
	/// Nothing happens if the vector already has a buffer of this length.
	/// Otherwise a new buffer is allocated and the old contents are discarded.
	pub fn resize(&mut self, len: usize) -> Result<()> {
		let queue = self.queue()?.clone();
		self.resize_on(len, &queue)
	}

	/// Binds the vector to `queue` and changes the length to `len`.
	///
	/// The existing buffer is kept if it has the right length and lives on the
	/// device of `queue`.
	pub fn resize_on(&mut self, len: usize, queue: &Queue) -> Result<()> {
		let keep = self
			.buffer
			.as_ref()
			.is_some_and(|b| b.len() == len && b.is_on_device(queue.device()));
		if !keep {
			log::trace!("allocating {len} x {} on device '{}'", T::dtype, queue.device().name());
			self.buffer = Some(Rc::new(Buffer::new(queue.device().clone(), len)?));
		}
		self.queue = Some(queue.clone());
		Ok(())
	}

	/// Replaces the contents with `data`, resizing if needed.
	pub fn upload(&mut self, data: &[T]) -> Result<()> {
		self.resize(data.len())?;
		let queue = self.queue()?;
		let buffer = self.buffer()?;
		unsafe {
			queue.enqueue_upload(Buffer::host_ptr_of(data), buffer.device_ptr(), buffer.bytes());
		}
		queue.wait()
	}

	/// Copies the contents to the host. Waits for the queue.
	pub fn to_vec(&self) -> Result<Vec<T>> {
		let queue = self.queue()?;
		let buffer = self.buffer()?;
		let mut data = vec![T::default(); buffer.len()];
		unsafe {
			queue.enqueue_download(
				buffer.device_ptr(),
				NonNull::from(&mut data[..]).cast::<u8>(),
				buffer.bytes(),
			);
		}
		queue.wait()?;
		Ok(data)
	}

	pub fn to_array(&self) -> Result<Array1<T>> {
		Ok(Array1::from_vec(self.to_vec()?))
	}

	/// Makes `self` an element-by-element copy of `other`, on the queue of `other`.
	pub fn copy_from(&mut self, other: &Self) -> Result<()> {
		let queue = other.queue()?;
		let src = other.buffer()?;
		if self.buffer.as_ref().is_some_and(|b| Rc::ptr_eq(b, src)) {
			return Ok(());
		}
		self.resize_on(src.len(), queue)?;
		let dst = self.buffer()?;
		unsafe {
			queue.enqueue_copy(src.device_ptr(), dst.device_ptr(), src.bytes());
		}
		if queue.is_blocking() {
			queue.wait()?;
		}
		Ok(())
	}

	/// Deep copy. The copy of an uninitialized vector is uninitialized.
	pub fn try_clone(&self) -> Result<Self> {
		if !self.is_initialized() {
			return Ok(Self { queue: self.queue.clone(), buffer: None });
		}
		let mut result = Self::default();
		result.copy_from(self)?;
		Ok(result)
	}

	/// A leaf expression reading this vector.
	pub fn expr(&self) -> Expr<T> {
		Expr::leaf(self)
	}

	/// Evaluates `src` into this vector.
	///
	/// The vector is resized to the extent of `src` and bound to its queue.
	/// On error, nothing is written.
	pub fn assign(&mut self, src: impl ToExpr<T>) -> Result<()> {
		crate::eval::assign(self, &src.to_expr())
	}
}

impl<T: Element> std::fmt::Debug for Vector<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Vector")
			.field("queue", &self.queue)
			.field("buffer", &self.buffer)
			.finish()
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
