//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

//--------------------------------------------------------------------------------------------------

pub const MAX_DTYPE_ALIGN: usize = 8; // 64-bit

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DType {
	I32,
	I64,
	F32,
	F64,
}

impl DType {
	pub fn bits(self) -> usize {
		match self {
			Self::I32 | Self::F32 => 32,
			Self::I64 | Self::F64 => 64,
		}
	}

	pub fn bytes(self) -> usize {
		self.bits() / 8
	}

	/// Size in bytes of an array of `elems` elements, `None` on overflow.
	pub fn array_bytes(self, elems: usize) -> Option<usize> {
		elems.checked_mul(self.bytes())
	}
}

impl fmt::Display for DType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let s = match self {
			Self::I32 => "i32",
			Self::I64 => "i64",
			Self::F32 => "f32",
			Self::F64 => "f64",
		};
		write!(f, "{s}")
	}
}

//--------------------------------------------------------------------------------------------------

pub trait HasDType {
	const dtype: DType;
}

impl HasDType for i32 {
	const dtype: DType = DType::I32;
}

impl HasDType for i64 {
	const dtype: DType = DType::I64;
}

impl HasDType for f32 {
	const dtype: DType = DType::F32;
}

impl HasDType for f64 {
	const dtype: DType = DType::F64;
}

//--------------------------------------------------------------------------------------------------

pub trait FromToF64 {
	fn from_f64(val: f64) -> Self;
	fn to_f64(&self) -> f64;
}

#[allow(clippy::use_self)]
impl FromToF64 for f32 {
	fn from_f64(val: f64) -> Self {
		#[allow(clippy::cast_possible_truncation)]
		(val as f32)
	}

	fn to_f64(&self) -> f64 {
		f64::from(*self)
	}
}

#[allow(clippy::use_self)]
impl FromToF64 for f64 {
	fn from_f64(val: f64) -> Self {
		val
	}

	fn to_f64(&self) -> f64 {
		*self
	}
}

#[allow(clippy::use_self)]
impl FromToF64 for i32 {
	fn from_f64(val: f64) -> Self {
		#[allow(clippy::cast_possible_truncation)]
		(val as i32)
	}

	fn to_f64(&self) -> f64 {
		f64::from(*self)
	}
}

#[allow(clippy::use_self)]
impl FromToF64 for i64 {
	fn from_f64(val: f64) -> Self {
		#[allow(clippy::cast_possible_truncation)]
		(val as i64)
	}

	fn to_f64(&self) -> f64 {
		#[allow(clippy::cast_precision_loss)]
		(*self as f64)
	}
}

//--------------------------------------------------------------------------------------------------

/// A value that can live in a device buffer and flow through expressions.
///
/// For integer types, `sin` and `cos` are evaluated in `f64` and truncated.
/// Integer division by zero panics the same way it does on the host.
pub trait Element:
	'static
	+ Copy
	+ Default
	+ PartialOrd
	+ fmt::Debug
	+ HasDType
	+ FromToF64
	+ Add<Output = Self>
	+ Sub<Output = Self>
	+ Mul<Output = Self>
	+ Div<Output = Self>
	+ Neg<Output = Self>
{
	fn sin(self) -> Self;
	fn cos(self) -> Self;
	fn abs(self) -> Self;

	#[inline]
	fn max(self, other: Self) -> Self {
		if other > self { other } else { self }
	}

	#[inline]
	fn min(self, other: Self) -> Self {
		if other < self { other } else { self }
	}
}

macro_rules! impl_float_element {
	($t:ty) => {
		impl Element for $t {
			#[inline]
			fn sin(self) -> Self {
				<$t>::sin(self)
			}

			#[inline]
			fn cos(self) -> Self {
				<$t>::cos(self)
			}

			#[inline]
			fn abs(self) -> Self {
				<$t>::abs(self)
			}
		}
	};
}

macro_rules! impl_int_element {
	($t:ty) => {
		impl Element for $t {
			#[inline]
			fn sin(self) -> Self {
				Self::from_f64(self.to_f64().sin())
			}

			#[inline]
			fn cos(self) -> Self {
				Self::from_f64(self.to_f64().cos())
			}

			#[inline]
			fn abs(self) -> Self {
				self.wrapping_abs()
			}
		}
	};
}

impl_float_element!(f32);
impl_float_element!(f64);
impl_int_element!(i32);
impl_int_element!(i64);

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_dtype_props() {
		assert_eq!(f32::dtype, DType::F32);
		assert_eq!(i64::dtype.bytes(), 8);
		assert_eq!(DType::F32.array_bytes(3), Some(12));
		assert_eq!(DType::F64.array_bytes(usize::MAX), None);
		assert_eq!(i32::dtype.to_string(), "i32");
	}

	#[test]
	fn test_max_does_not_need_identity() {
		assert_eq!(Element::max(-3_i32, -7), -3);
		assert_eq!(Element::min(2.5_f64, -1.0), -1.0);
		assert_eq!(Element::abs(-4_i64), 4);
	}
}

//--------------------------------------------------------------------------------------------------
