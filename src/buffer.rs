//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::device::{Device, DeviceAllocError, DevicePtr};
use crate::dtype::{DType, Element};

//--------------------------------------------------------------------------------------------------

/// Contiguous device storage for `elems` values of type `T`.
///
/// The memory is returned to the device when the buffer is dropped.
/// Contents are undefined until written.
pub struct Buffer<T: Element> {
	device_ptr: DevicePtr,
	elems: usize,
	device: Rc<dyn Device>,
	phantom: PhantomData<T>,
}

impl<T: Element> Buffer<T> {
	pub fn new(device: Rc<dyn Device>, elems: usize) -> Result<Self, DeviceAllocError> {
		let Some(bytes) = T::dtype.array_bytes(elems) else {
			return Err(DeviceAllocError);
		};
		let device_ptr = device.new_buffer(bytes)?;
		Ok(Self { device_ptr, elems, device, phantom: PhantomData })
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.elems
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.elems == 0
	}

	#[inline]
	pub fn bytes(&self) -> usize {
		self.elems * T::dtype.bytes()
	}

	#[inline]
	pub fn dtype(&self) -> DType {
		T::dtype
	}

	#[inline]
	pub fn device_ptr(&self) -> DevicePtr {
		self.device_ptr
	}

	#[inline]
	pub fn device(&self) -> &Rc<dyn Device> {
		&self.device
	}

	#[inline]
	pub fn is_on_device(&self, device: &Rc<dyn Device>) -> bool {
		Rc::ptr_eq(&self.device, device)
	}

	/// Pointer to be used inside kernels.
	///
	/// # Safety
	/// Only valid while the buffer is alive, and only inside code that runs on the device.
	#[inline]
	pub unsafe fn kernel_ptr(&self) -> *mut T {
		unsafe { self.device_ptr.as_ptr::<T>() }
	}

	pub(crate) fn host_ptr_of(data: &[T]) -> NonNull<u8> {
		NonNull::from(data).cast::<u8>()
	}
}

impl<T: Element> Drop for Buffer<T> {
	fn drop(&mut self) {
		let bytes = self.bytes();
		unsafe {
			self.device.drop_buffer(self.device_ptr, bytes);
		}
	}
}

impl<T: Element> std::fmt::Debug for Buffer<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Buffer")
			.field("dtype", &T::dtype)
			.field("elems", &self.elems)
			.field("device", &self.device.name())
			.finish()
	}
}

//--------------------------------------------------------------------------------------------------
