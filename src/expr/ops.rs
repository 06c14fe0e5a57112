//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::dtype::Element;
use crate::expr::functor::{BinaryFn, UnaryFn};
use crate::expr::{Expr, ToExpr};
use crate::vector::Vector;

//--------------------------------------------------------------------------------------------------
// Operators never fail. A problem found while combining the operands is recorded
// in the resulting node and reported when the expression is evaluated.

pub fn sin<T: Element>(x: impl ToExpr<T>) -> Expr<T> {
	x.to_expr().apply(UnaryFn::Sin)
}

pub fn cos<T: Element>(x: impl ToExpr<T>) -> Expr<T> {
	x.to_expr().apply(UnaryFn::Cos)
}

pub fn abs<T: Element>(x: impl ToExpr<T>) -> Expr<T> {
	x.to_expr().apply(UnaryFn::Abs)
}

//--------------------------------------------------------------------------------------------------

macro_rules! impl_binary_op {
	($Trait:ident, $method:ident, $f:ident) => {
		impl<T: Element> $Trait<Expr<T>> for Expr<T> {
			type Output = Expr<T>;
			fn $method(self, rhs: Expr<T>) -> Expr<T> {
				Expr::binary(self, rhs, BinaryFn::$f)
			}
		}

		impl<'a, T: Element> $Trait<&'a Vector<T>> for Expr<T> {
			type Output = Expr<T>;
			fn $method(self, rhs: &'a Vector<T>) -> Expr<T> {
				Expr::binary(self, rhs, BinaryFn::$f)
			}
		}

		impl<'a, T: Element> $Trait<Expr<T>> for &'a Vector<T> {
			type Output = Expr<T>;
			fn $method(self, rhs: Expr<T>) -> Expr<T> {
				Expr::binary(self, rhs, BinaryFn::$f)
			}
		}

		impl<'a, 'b, T: Element> $Trait<&'b Vector<T>> for &'a Vector<T> {
			type Output = Expr<T>;
			fn $method(self, rhs: &'b Vector<T>) -> Expr<T> {
				Expr::binary(self, rhs, BinaryFn::$f)
			}
		}
	};
}

impl_binary_op!(Add, add, Add);
impl_binary_op!(Sub, sub, Sub);
impl_binary_op!(Mul, mul, Mul);
impl_binary_op!(Div, div, Div);

//--------------------------------------------------------------------------------------------------
// expr (op) scalar

impl<T: Element> Mul<T> for Expr<T> {
	type Output = Self;
	fn mul(self, rhs: T) -> Self {
		self.apply(UnaryFn::Scale(rhs))
	}
}

impl<T: Element> Add<T> for Expr<T> {
	type Output = Self;
	fn add(self, rhs: T) -> Self {
		self.apply(UnaryFn::AddScalar(rhs))
	}
}

impl<T: Element> Sub<T> for Expr<T> {
	type Output = Self;
	fn sub(self, rhs: T) -> Self {
		self.apply(UnaryFn::AddScalar(-rhs))
	}
}

impl<'a, T: Element> Mul<T> for &'a Vector<T> {
	type Output = Expr<T>;
	fn mul(self, rhs: T) -> Expr<T> {
		self.expr() * rhs
	}
}

impl<'a, T: Element> Add<T> for &'a Vector<T> {
	type Output = Expr<T>;
	fn add(self, rhs: T) -> Expr<T> {
		self.expr() + rhs
	}
}

impl<'a, T: Element> Sub<T> for &'a Vector<T> {
	type Output = Expr<T>;
	fn sub(self, rhs: T) -> Expr<T> {
		self.expr() - rhs
	}
}

impl<T: Element> Neg for Expr<T> {
	type Output = Self;
	fn neg(self) -> Self {
		self.apply(UnaryFn::Neg)
	}
}

impl<'a, T: Element> Neg for &'a Vector<T> {
	type Output = Expr<T>;
	fn neg(self) -> Expr<T> {
		self.expr().apply(UnaryFn::Neg)
	}
}

//--------------------------------------------------------------------------------------------------
// scalar (op) expr

macro_rules! impl_scalar_lhs_ops {
	($t:ty) => {
		impl Mul<Expr<$t>> for $t {
			type Output = Expr<$t>;
			fn mul(self, rhs: Expr<$t>) -> Expr<$t> {
				rhs.apply(UnaryFn::Scale(self))
			}
		}

		impl Add<Expr<$t>> for $t {
			type Output = Expr<$t>;
			fn add(self, rhs: Expr<$t>) -> Expr<$t> {
				rhs.apply(UnaryFn::AddScalar(self))
			}
		}

		impl Sub<Expr<$t>> for $t {
			type Output = Expr<$t>;
			fn sub(self, rhs: Expr<$t>) -> Expr<$t> {
				rhs.apply(UnaryFn::SubFromScalar(self))
			}
		}

		impl<'a> Mul<&'a Vector<$t>> for $t {
			type Output = Expr<$t>;
			fn mul(self, rhs: &'a Vector<$t>) -> Expr<$t> {
				rhs.expr().apply(UnaryFn::Scale(self))
			}
		}

		impl<'a> Add<&'a Vector<$t>> for $t {
			type Output = Expr<$t>;
			fn add(self, rhs: &'a Vector<$t>) -> Expr<$t> {
				rhs.expr().apply(UnaryFn::AddScalar(self))
			}
		}

		impl<'a> Sub<&'a Vector<$t>> for $t {
			type Output = Expr<$t>;
			fn sub(self, rhs: &'a Vector<$t>) -> Expr<$t> {
				rhs.expr().apply(UnaryFn::SubFromScalar(self))
			}
		}
	};
}

impl_scalar_lhs_ops!(f32);
impl_scalar_lhs_ops!(f64);
impl_scalar_lhs_ops!(i32);
impl_scalar_lhs_ops!(i64);

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::Queue;
	use crate::device::cpu::CPUDevice;

	#[test]
	fn test_scalar_ops() {
		let queue = Queue::new(CPUDevice::new());
		let x = Vector::from_slice(&queue, &[1_i32, 2, 3]).unwrap();
		assert_eq!((&x * 2).eval().unwrap().to_vec().unwrap(), vec![2, 4, 6]);
		assert_eq!((2 * &x).eval().unwrap().to_vec().unwrap(), vec![2, 4, 6]);
		assert_eq!((&x + 1).eval().unwrap().to_vec().unwrap(), vec![2, 3, 4]);
		assert_eq!((&x - 1).eval().unwrap().to_vec().unwrap(), vec![0, 1, 2]);
		assert_eq!((10 - &x).eval().unwrap().to_vec().unwrap(), vec![9, 8, 7]);
		assert_eq!((-&x).eval().unwrap().to_vec().unwrap(), vec![-1, -2, -3]);
	}

	#[test]
	fn test_elementwise_functions() {
		let queue = Queue::new(CPUDevice::new());
		let x = Vector::from_slice(&queue, &[0.0, -1.5]).unwrap();
		let s = sin(&x).eval().unwrap().to_vec().unwrap();
		let c = cos(&x).eval().unwrap().to_vec().unwrap();
		let a = abs(&x).eval().unwrap().to_vec().unwrap();
		assert_approx_eq::assert_approx_eq!(s[1], (-1.5_f64).sin());
		assert_approx_eq::assert_approx_eq!(c[0], 1.0);
		assert_eq!(a, vec![0.0, 1.5]);
	}

	#[test]
	fn test_binary_ops() {
		let queue = Queue::new(CPUDevice::new());
		let a = Vector::from_slice(&queue, &[8.0, 6.0]).unwrap();
		let b = Vector::from_slice(&queue, &[2.0, 3.0]).unwrap();
		assert_eq!((&a / &b).eval().unwrap().to_vec().unwrap(), vec![4.0, 2.0]);
		assert_eq!((a.expr() - &b).eval().unwrap().to_vec().unwrap(), vec![6.0, 3.0]);
		assert_eq!((&a * b.expr()).eval().unwrap().to_vec().unwrap(), vec![16.0, 18.0]);
		assert_eq!(a.expr().elem_min(&b).eval().unwrap().to_vec().unwrap(), vec![2.0, 3.0]);
	}
}

//--------------------------------------------------------------------------------------------------
