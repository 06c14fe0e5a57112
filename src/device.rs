//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::error::ExprError;
use crate::{ErrPack, Result};

pub mod cpu;
pub mod work_div;

pub use work_div::WorkDiv;

//--------------------------------------------------------------------------------------------------

#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DevicePtr {
	ptr: *mut (),
}

impl DevicePtr {
	#[inline]
	pub fn new(ptr: *mut ()) -> Self {
		Self { ptr }
	}

	/// # Safety
	/// The pointer should only be used by device-specific code that knows what the pointer is.
	///
	/// For a CPU device, it is just a pointer to the memory.
	/// For other devices, it could be the device pointer casted to host pointer,
	/// or even some handle that can be used to get the real device pointer.
	#[inline]
	pub unsafe fn as_ptr<T>(&self) -> *mut T {
		self.ptr.cast::<T>()
	}
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DeviceAllocError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProps {
	/// Number of independent compute units (multiprocessors).
	pub multiprocessor_count: usize,
	pub max_threads_per_block: usize,
	pub max_blocks: usize,
}

//--------------------------------------------------------------------------------------------------

/// One lane of a kernel launch.
#[derive(Debug, Copy, Clone)]
pub struct Lane {
	pub block: usize,
	pub thread: usize,
	pub div: WorkDiv,
}

impl Lane {
	/// Linear index of the lane in the whole grid.
	#[inline]
	pub fn global(&self) -> usize {
		self.block * self.div.threads_per_block + self.thread
	}

	/// Total number of lanes in the grid.
	#[inline]
	pub fn grid_threads(&self) -> usize {
		self.div.blocks * self.div.threads_per_block
	}
}

/// A kernel body.
///
/// The body runs once per lane and phase. Phases are separated by a block-wide
/// barrier: every lane of a block finishes phase `p` before any lane starts `p + 1`.
/// `shared` is the block's scratch memory, one slot per thread, reset at the start
/// of each block.
pub trait Kernel {
	type Shared: Copy + Default;

	fn phases(&self) -> usize {
		1
	}

	fn run(&self, lane: Lane, phase: usize, shared: &mut [Self::Shared]);
}

//--------------------------------------------------------------------------------------------------

pub trait Device {
	fn name(&self) -> &str;

	fn props(&self) -> &DeviceProps;

	fn new_buffer(&self, bytes: usize) -> std::result::Result<DevicePtr, DeviceAllocError>;

	/// # Safety
	/// `device_ptr` must come from `new_buffer()` of this device with the same `bytes`,
	/// and must not be used afterwards.
	unsafe fn drop_buffer(&self, device_ptr: DevicePtr, bytes: usize);

	/// # Safety
	/// `src` must be valid for reading `bytes` bytes, `dst` must be a buffer
	/// of this device with at least `bytes` bytes.
	unsafe fn upload_data(&self, src: NonNull<u8>, dst: DevicePtr, bytes: usize) -> Result<()>;

	/// # Safety
	/// `src` must be a buffer of this device with at least `bytes` bytes,
	/// `dst` must be valid for writing `bytes` bytes.
	unsafe fn download_data(&self, src: DevicePtr, dst: NonNull<u8>, bytes: usize) -> Result<()>;

	/// # Safety
	/// Both buffers must belong to this device, have at least `bytes` bytes and not overlap.
	unsafe fn copy_data(&self, src: DevicePtr, dst: DevicePtr, bytes: usize) -> Result<()>;

	/// Executes `block` once for every block of `div`.
	///
	/// Fails without running anything if `div` exceeds the limits of the device.
	fn run_blocks(&self, div: WorkDiv, block: &mut dyn FnMut(usize)) -> Result<()>;
}

//--------------------------------------------------------------------------------------------------

struct QueueInner {
	device: Rc<dyn Device>,
	blocking: Cell<bool>,
	failure: Cell<Option<ExprError>>,
	launches: Cell<usize>,
}

/// An in-order queue of device work.
///
/// Everything enqueued runs in enqueue order. A failure reported by the device
/// marks the queue as failed: later work is skipped and every `wait()` reports
/// the failure.
#[derive(Clone)]
pub struct Queue {
	inner: Rc<QueueInner>,
}

impl Queue {
	pub fn new(device: Rc<dyn Device>) -> Self {
		Self {
			inner: Rc::new(QueueInner {
				device,
				blocking: Cell::new(true),
				failure: Cell::new(None),
				launches: Cell::new(0),
			}),
		}
	}

	pub fn device(&self) -> &Rc<dyn Device> {
		&self.inner.device
	}

	pub fn props(&self) -> &DeviceProps {
		self.inner.device.props()
	}

	pub fn same_as(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Whether assignments wait for the queue before returning. Defaults to `true`.
	pub fn is_blocking(&self) -> bool {
		self.inner.blocking.get()
	}

	pub fn set_blocking(&self, blocking: bool) {
		self.inner.blocking.set(blocking);
	}

	pub fn is_failed(&self) -> bool {
		self.inner.failure.get().is_some()
	}

	/// Number of kernels launched on this queue so far.
	pub fn launches(&self) -> usize {
		self.inner.launches.get()
	}

	fn fail(&self, err: &ErrPack<ExprError>) {
		log::error!("queue on device '{}' failed: {err}", self.inner.device.name());
		if self.inner.failure.get().is_none() {
			self.inner.failure.set(Some(err.code));
		}
	}

	fn skip_if_failed(&self, what: &str) -> bool {
		if self.is_failed() {
			log::warn!("skipping {what}: queue has already failed");
			return true;
		}
		false
	}

	pub fn enqueue<K: Kernel>(&self, div: WorkDiv, kernel: &K) {
		if self.skip_if_failed("kernel launch") || div.is_empty() {
			return;
		}
		self.inner.launches.set(self.inner.launches.get() + 1);

		let threads = div.threads_per_block;
		let phases = kernel.phases();
		let mut shared = vec![K::Shared::default(); threads];
		let result = self.inner.device.run_blocks(div, &mut |block| {
			shared.fill(K::Shared::default());
			for phase in 0..phases {
				for thread in 0..threads {
					kernel.run(Lane { block, thread, div }, phase, &mut shared);
				}
			}
		});
		if let Err(err) = result {
			self.fail(&err);
		}
	}

	/// # Safety
	/// See `Device::upload_data()`.
	pub unsafe fn enqueue_upload(&self, src: NonNull<u8>, dst: DevicePtr, bytes: usize) {
		if self.skip_if_failed("upload") {
			return;
		}
		if let Err(err) = unsafe { self.inner.device.upload_data(src, dst, bytes) } {
			self.fail(&err);
		}
	}

	/// # Safety
	/// See `Device::download_data()`.
	pub unsafe fn enqueue_download(&self, src: DevicePtr, dst: NonNull<u8>, bytes: usize) {
		if self.skip_if_failed("download") {
			return;
		}
		if let Err(err) = unsafe { self.inner.device.download_data(src, dst, bytes) } {
			self.fail(&err);
		}
	}

	/// # Safety
	/// See `Device::copy_data()`.
	pub unsafe fn enqueue_copy(&self, src: DevicePtr, dst: DevicePtr, bytes: usize) {
		if self.skip_if_failed("copy") {
			return;
		}
		if let Err(err) = unsafe { self.inner.device.copy_data(src, dst, bytes) } {
			self.fail(&err);
		}
	}

	/// Blocks until all enqueued work is complete.
	pub fn wait(&self) -> Result<()> {
		match self.inner.failure.get() {
			None => Ok(()),
			Some(code) => Err(ErrPack::with_message(
				code,
				format!("queue on device '{}' has failed", self.inner.device.name()),
			)),
		}
	}
}

impl std::fmt::Debug for Queue {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Queue")
			.field("device", &self.inner.device.name())
			.field("blocking", &self.inner.blocking.get())
			.field("failure", &self.inner.failure.get())
			.finish()
	}
}

//--------------------------------------------------------------------------------------------------
