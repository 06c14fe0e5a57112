//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

pub trait LossyInto<T> {
	fn lossy_into(self) -> T;
}

#[allow(clippy::cast_precision_loss)]
impl LossyInto<f64> for usize {
	fn lossy_into(self) -> f64 {
		self as f64
	}
}

//--------------------------------------------------------------------------------------------------

/// Sizes of the successive levels of a shared-memory tree reduction over `width` lanes.
///
/// Each entry is the distance between the lane that keeps a value and the lane
/// that is folded into it. The active width shrinks to `ceil(width / 2)` per level,
/// so odd widths never drop a lane.
pub fn halving_steps(width: usize) -> smallvec::SmallVec<[(usize, usize); 16]> {
	let mut steps = smallvec::SmallVec::new();
	let mut size = width;
	while size > 1 {
		let up = size.div_ceil(2);
		steps.push((size, up));
		size = up;
	}
	steps
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
