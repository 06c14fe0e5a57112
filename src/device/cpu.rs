//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ptr::NonNull;
use std::rc::Rc;

use super::{Device, DeviceAllocError, DeviceProps, DevicePtr, WorkDiv};

use crate::Result;
use crate::dtype::MAX_DTYPE_ALIGN;
use crate::error::ExprError;

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CPUDeviceConfig {
	pub name: String,
	pub multiprocessor_count: usize,
	pub max_threads_per_block: usize,
	pub max_blocks: usize,
}

impl Default for CPUDeviceConfig {
	fn default() -> Self {
		Self {
			name: "CPU".to_string(),
			multiprocessor_count: std::thread::available_parallelism().map_or(1, |n| n.get()),
			max_threads_per_block: 256,
			max_blocks: 65535,
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// Runs kernels on the host, one block after another.
pub struct CPUDevice {
	name: String,
	props: DeviceProps,
}

impl CPUDevice {
	pub fn new() -> Rc<Self> {
		Self::with_config(CPUDeviceConfig::default())
	}

	pub fn new_named(name: String) -> Rc<Self> {
		Self::with_config(CPUDeviceConfig { name, ..CPUDeviceConfig::default() })
	}

	pub fn with_config(config: CPUDeviceConfig) -> Rc<Self> {
		Rc::new(Self {
			name: config.name,
			props: DeviceProps {
				multiprocessor_count: config.multiprocessor_count.max(1),
				max_threads_per_block: config.max_threads_per_block.max(1),
				max_blocks: config.max_blocks.max(1),
			},
		})
	}

	fn layout(bytes: usize) -> Option<std::alloc::Layout> {
		std::alloc::Layout::from_size_align(bytes, MAX_DTYPE_ALIGN).ok()
	}
}

impl Device for CPUDevice {
	fn name(&self) -> &str {
		&self.name
	}

	fn props(&self) -> &DeviceProps {
		&self.props
	}

	fn new_buffer(&self, bytes: usize) -> std::result::Result<DevicePtr, DeviceAllocError> {
		if bytes == 0 {
			return Ok(DevicePtr::new(NonNull::<u64>::dangling().as_ptr().cast()));
		}
		let Some(layout) = Self::layout(bytes) else {
			return Err(DeviceAllocError);
		};
		let Some(memory) = NonNull::new(unsafe { std::alloc::alloc(layout) }) else {
			return Err(DeviceAllocError);
		};
		Ok(DevicePtr::new(memory.as_ptr().cast()))
	}

	unsafe fn drop_buffer(&self, device_ptr: DevicePtr, bytes: usize) {
		if bytes == 0 {
			return;
		}
		unsafe {
			let layout = std::alloc::Layout::from_size_align_unchecked(bytes, MAX_DTYPE_ALIGN);
			std::alloc::dealloc(device_ptr.as_ptr::<u8>(), layout);
		}
	}

	unsafe fn upload_data(&self, src: NonNull<u8>, dst: DevicePtr, bytes: usize) -> Result<()> {
		unsafe {
			std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr::<u8>(), bytes);
		}
		Ok(())
	}

	unsafe fn download_data(&self, src: DevicePtr, dst: NonNull<u8>, bytes: usize) -> Result<()> {
		unsafe {
			std::ptr::copy_nonoverlapping(src.as_ptr::<u8>(), dst.as_ptr(), bytes);
		}
		Ok(())
	}

	unsafe fn copy_data(&self, src: DevicePtr, dst: DevicePtr, bytes: usize) -> Result<()> {
		unsafe {
			std::ptr::copy_nonoverlapping(src.as_ptr::<u8>(), dst.as_ptr::<u8>(), bytes);
		}
		Ok(())
	}

	fn run_blocks(&self, div: WorkDiv, block: &mut dyn FnMut(usize)) -> Result<()> {
		if div.threads_per_block == 0
			|| div.threads_per_block > self.props.max_threads_per_block
			|| div.blocks > self.props.max_blocks
		{
			return Err(ExprError::device_failure(format!(
				"invalid work division {div:?} for device '{}' (max {} threads per block, max {} blocks)",
				self.name, self.props.max_threads_per_block, self.props.max_blocks,
			)));
		}
		for b in 0..div.blocks {
			block(b);
		}
		Ok(())
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
