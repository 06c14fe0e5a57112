//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::borrow::Cow;

use crate::ErrPack;
use crate::device::DeviceAllocError;

//--------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExprError {
	/// Extents of the operands are neither equal nor broadcastable.
	ShapeMismatch,
	/// A vector without a queue or without a buffer was used as an operand.
	UninitializedOperand,
	/// Operands are bound to different queues.
	ContextMismatch,
	/// The destination of an assignment is read by its source.
	AliasedOperand,
	/// Reduction over zero elements.
	EmptyReduction,
	DevBufAllocFailed,
	/// The execution substrate reported a failure. The queue is unusable afterwards.
	DeviceFailure,
}

impl ExprError {
	#[cold]
	#[inline(never)]
	pub fn shape_mismatch(lhs: usize, rhs: usize) -> ErrPack<Self> {
		ErrPack::with_message(
			Self::ShapeMismatch,
			format!("extents {lhs} and {rhs} are neither equal nor broadcastable"),
		)
	}

	#[cold]
	#[inline(never)]
	pub fn uninitialized(what: &'static str) -> ErrPack<Self> {
		ErrPack::with_message(Self::UninitializedOperand, what)
	}

	#[cold]
	#[inline(never)]
	pub fn context_mismatch() -> ErrPack<Self> {
		ErrPack::with_message(Self::ContextMismatch, "operands are bound to different queues")
	}

	#[cold]
	#[inline(never)]
	pub fn aliased() -> ErrPack<Self> {
		ErrPack::with_message(Self::AliasedOperand, "destination buffer is also read by the source")
	}

	#[cold]
	#[inline(never)]
	pub fn empty_reduction() -> ErrPack<Self> {
		ErrPack::with_message(Self::EmptyReduction, "cannot reduce an empty sequence")
	}

	#[cold]
	#[inline(never)]
	pub fn device_failure(message: impl Into<Cow<'static, str>>) -> ErrPack<Self> {
		ErrPack::with_message(Self::DeviceFailure, message)
	}
}

//--------------------------------------------------------------------------------------------------

/// A problem found while building an expression node.
///
/// Operators cannot return `Result`, so the node keeps the problem and it is
/// reported by the first operation that would do device work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
	pub code: ExprError,
	pub message: Cow<'static, str>,
}

impl NodeError {
	pub fn from_err(err: &ErrPack<ExprError>) -> Self {
		Self {
			code: err.code,
			message: Cow::Owned(err.message().to_string()),
		}
	}
}

impl From<&NodeError> for ErrPack<ExprError> {
	#[cold]
	#[inline(never)]
	fn from(err: &NodeError) -> Self {
		Self::with_message(err.code, err.message.clone())
	}
}

//--------------------------------------------------------------------------------------------------

impl From<DeviceAllocError> for ExprError {
	fn from(_: DeviceAllocError) -> Self {
		Self::DevBufAllocFailed
	}
}

impl From<DeviceAllocError> for ErrPack<ExprError> {
	#[cold]
	#[inline(never)]
	fn from(_: DeviceAllocError) -> Self {
		Self {
			code: ExprError::DevBufAllocFailed,
			extra: None,
		}
	}
}

//--------------------------------------------------------------------------------------------------
