//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use super::DeviceProps;

//--------------------------------------------------------------------------------------------------

/// Launch geometry: `blocks` blocks of `threads_per_block` lanes,
/// each lane covering `elems_per_thread` consecutive elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkDiv {
	pub blocks: usize,
	pub threads_per_block: usize,
	pub elems_per_thread: usize,
}

impl WorkDiv {
	pub const EMPTY: Self = Self { blocks: 0, threads_per_block: 0, elems_per_thread: 0 };

	pub fn is_empty(&self) -> bool {
		self.blocks == 0 || self.threads_per_block == 0
	}

	/// Number of elements the geometry can address.
	pub fn capacity(&self) -> usize {
		self.blocks * self.threads_per_block * self.elems_per_thread
	}
}

/// Finds a launch geometry covering `extent` elements with `elems_per_thread`
/// elements per lane, within the limits of the device.
///
/// The geometry may address more elements than `extent`. Kernels must guard
/// every index against the extent.
pub fn divide(props: &DeviceProps, extent: usize, elems_per_thread: usize) -> WorkDiv {
	if extent == 0 {
		return WorkDiv::EMPTY;
	}
	let mut elems_per_thread = elems_per_thread.max(1);
	let max_threads = props.max_threads_per_block.max(1);
	let max_blocks = props.max_blocks.max(1);
	loop {
		let threads = extent.div_ceil(elems_per_thread);
		let threads_per_block = threads.min(max_threads);
		let blocks = threads.div_ceil(threads_per_block);
		if blocks <= max_blocks {
			return WorkDiv { blocks, threads_per_block, elems_per_thread };
		}
		// too many blocks for the device, give each lane more work
		elems_per_thread = extent.div_ceil(max_blocks * max_threads);
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
