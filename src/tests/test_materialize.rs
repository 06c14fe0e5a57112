//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use std::rc::Rc;

use crate::device::cpu::CPUDevice;
use crate::expr::ExprKind;
use crate::{ExprError, Queue, Result, Vector};

//--------------------------------------------------------------------------------------------------

#[test]
fn test_materialize_computes_once_per_assignment() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let a = Vector::from_slice(&queue, &[1.0, 2.0, 3.0])?;
	let b = Vector::from_slice(&queue, &[1.0, 1.0, 1.0])?;
	let m = (&a * &b + 1.0).materialize();

	let before = queue.launches();
	let first = (m.clone() * 2.0).eval()?;
	// one launch for the operand, one for the assignment
	assert_eq!(queue.launches() - before, 2);
	assert_eq!(first.to_vec()?, vec![4.0, 6.0, 8.0]);

	// both occurrences read the same temporary
	let before = queue.launches();
	let second = (m.clone() + m.clone()).eval()?;
	assert_eq!(queue.launches() - before, 2);
	assert_eq!(second.to_vec()?, vec![4.0, 6.0, 8.0]);
	Ok(())
}

#[test]
fn test_materialize_sees_updated_operands() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let mut x = Vector::from_slice(&queue, &[1.0, 2.0, 3.0])?;
	let diff = x.expr() - x.expr().materialize();
	assert_eq!(diff.eval()?.to_vec()?, vec![0.0, 0.0, 0.0]);

	// same length, so `x` keeps its buffer and `diff` reads the new values
	let src = Vector::from_slice(&queue, &[10.0, 20.0, 30.0])?;
	x.assign(&src * 1.0)?;
	assert_eq!(diff.eval()?.to_vec()?, vec![0.0, 0.0, 0.0]);

	x.upload(&[5.0, 6.0, 7.0])?;
	assert_eq!(diff.eval()?.to_vec()?, vec![0.0, 0.0, 0.0]);
	Ok(())
}

#[test]
fn test_materialize_reuses_temporary() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let mut a = Vector::from_slice(&queue, &[1_i32, 2])?;
	let m = (a.expr() * 3).materialize();
	let temporary = || match &m.node.kind {
		ExprKind::Materialize(node) => {
			node.cache.borrow().as_ref().and_then(|v| v.buffer_opt().cloned())
		},
		_ => None,
	};
	assert!(temporary().is_none());

	assert_eq!(m.eval()?.to_vec()?, vec![3, 6]);
	let Some(first) = temporary() else {
		panic!("no temporary after evaluation");
	};
	a.upload(&[5, 6])?;
	assert_eq!(m.eval()?.to_vec()?, vec![15, 18]);
	assert!(temporary().is_some_and(|second| Rc::ptr_eq(&first, &second)));
	Ok(())
}

#[test]
fn test_materialize_nested_in_materialize() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let mut a = Vector::from_slice(&queue, &[1_i32, 2, 3])?;
	let m = a.expr().materialize();
	let e = m.clone() + (m.clone() * 10).materialize();
	assert_eq!(e.eval()?.to_vec()?, vec![11, 22, 33]);
	a.upload(&[4, 5, 6])?;
	assert_eq!(e.eval()?.to_vec()?, vec![44, 55, 66]);
	Ok(())
}

#[test]
fn test_materialize_under_shift() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let a = Vector::from_slice(&queue, &[1, 2, 3])?;
	let e = (a.expr() * 10).materialize().shift(-1) + &a;
	assert_eq!(e.eval()?.to_vec()?, vec![11, 12, 23]);
	Ok(())
}

#[test]
fn test_materialize_reports_operand_errors() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let a = Vector::from_slice(&queue, &[1, 2, 3])?;
	let b = Vector::from_slice(&queue, &[1, 2])?;
	let m = (&a + &b).materialize();
	assert_eq!(m.eval().unwrap_err().code, ExprError::ShapeMismatch);
	assert_eq!(queue.launches(), 0);
	Ok(())
}

//--------------------------------------------------------------------------------------------------
