//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use crate::dtype::Element;

//--------------------------------------------------------------------------------------------------

/// Elementwise functions of one argument.
///
/// All variants are plain data and are copied into the kernel by value.
#[derive(Clone, Copy, Debug)]
pub enum UnaryFn<T: Element> {
	/// `s * x`
	Scale(T),
	/// `s + x`
	AddScalar(T),
	/// `s - x`
	SubFromScalar(T),
	/// `x / s`
	DivBy(T),
	Neg,
	Sin,
	Cos,
	Abs,
	Custom(fn(T) -> T),
}

impl<T: Element> UnaryFn<T> {
	#[inline]
	pub fn apply(&self, x: T) -> T {
		match *self {
			Self::Scale(s) => s * x,
			Self::AddScalar(s) => s + x,
			Self::SubFromScalar(s) => s - x,
			Self::DivBy(s) => x / s,
			Self::Neg => -x,
			Self::Sin => x.sin(),
			Self::Cos => x.cos(),
			Self::Abs => x.abs(),
			Self::Custom(f) => f(x),
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// Elementwise functions of two arguments.
#[derive(Clone, Copy, Debug)]
pub enum BinaryFn<T: Element> {
	Add,
	Sub,
	Mul,
	Div,
	Max,
	Min,
	Custom(fn(T, T) -> T),
}

impl<T: Element> BinaryFn<T> {
	#[inline]
	pub fn apply(&self, a: T, b: T) -> T {
		match *self {
			Self::Add => a + b,
			Self::Sub => a - b,
			Self::Mul => a * b,
			Self::Div => a / b,
			Self::Max => a.max(b),
			Self::Min => a.min(b),
			Self::Custom(f) => f(a, b),
		}
	}
}

//--------------------------------------------------------------------------------------------------

/// Reduction operators.
///
/// The operator has to be associative and commutative. No identity element is
/// needed: every lane is seeded with the first element it reads.
#[derive(Clone, Copy, Debug)]
pub enum ReduceOp<T: Element> {
	Sum,
	Max,
	Min,
	Custom(fn(T, T) -> T),
}

impl<T: Element> ReduceOp<T> {
	pub fn as_binary(self) -> BinaryFn<T> {
		match self {
			Self::Sum => BinaryFn::Add,
			Self::Max => BinaryFn::Max,
			Self::Min => BinaryFn::Min,
			Self::Custom(f) => BinaryFn::Custom(f),
		}
	}
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------
