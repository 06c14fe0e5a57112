//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use assert_approx_eq::assert_approx_eq;

use crate::device::cpu::{CPUDevice, CPUDeviceConfig};
use crate::{BinaryFn, Expr, ExprError, Queue, Result, UnaryFn, Vector, sin};

//--------------------------------------------------------------------------------------------------

#[test]
fn test_add() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let a = Vector::from_slice(&queue, &[1.0_f32, 2.0, 3.0])?;
	let b = Vector::from_slice(&queue, &[10.0_f32, 20.0, 30.0])?;
	let mut c = Vector::default();
	c.assign(&a + &b)?;
	assert_eq!(c.to_vec()?, vec![11.0, 22.0, 33.0]);
	Ok(())
}

#[test]
fn test_broadcast_extent_one() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let a = Vector::from_slice(&queue, &[1, 2, 3, 4])?;
	let s = Vector::from_slice(&queue, &[100])?;
	assert_eq!((&a + &s).eval()?.to_vec()?, vec![101, 102, 103, 104]);
	assert_eq!((&s - &a).eval()?.to_vec()?, vec![99, 98, 97, 96]);
	Ok(())
}

#[test]
fn test_shift_clamps_at_the_ends() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let x = Vector::from_slice(&queue, &[1, 2, 3, 4, 5])?;
	assert_eq!(x.expr().shift(1).eval()?.to_vec()?, vec![2, 3, 4, 5, 5]);
	assert_eq!(x.expr().shift(-2).eval()?.to_vec()?, vec![1, 1, 1, 2, 3]);
	assert_eq!(x.expr().shift(100).eval()?.to_vec()?, vec![5, 5, 5, 5, 5]);

	// central difference with one-sided ends
	let d = (x.expr().shift(1) - x.expr().shift(-1)).eval()?;
	assert_eq!(d.to_vec()?, vec![1, 2, 2, 2, 1]);
	Ok(())
}

#[test]
fn test_nested_expression() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let x = Vector::from_slice(&queue, &[0.0, 0.5, 1.0])?;
	let y = Vector::from_slice(&queue, &[2.0, 2.0, 2.0])?;
	let e = (sin(&x) * 2.0 + &y).apply(UnaryFn::Custom(|v: f64| v * v)) / &y;
	let r = e.eval()?.to_vec()?;
	for (i, xi) in [0.0_f64, 0.5, 1.0].iter().enumerate() {
		let expected = (xi.sin() * 2.0 + 2.0).powi(2) / 2.0;
		assert_approx_eq!(r[i], expected);
	}
	Ok(())
}

#[test]
fn test_custom_binary_fn() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let a = Vector::from_slice(&queue, &[3_i64, 4])?;
	let b = Vector::from_slice(&queue, &[4_i64, 3])?;
	let e = Expr::try_binary(&a, &b, BinaryFn::Custom(|p: i64, q: i64| p * p + q * q))?;
	assert_eq!(e.eval()?.to_vec()?, vec![25, 25]);
	Ok(())
}

#[test]
fn test_extent_mismatch_launches_nothing() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let a = Vector::from_slice(&queue, &[1.0, 2.0, 3.0])?;
	let b = Vector::from_slice(&queue, &[1.0, 2.0])?;
	let mut c = Vector::default();
	let err = c.assign(&a + &b).unwrap_err();
	assert_eq!(err.code, ExprError::ShapeMismatch);
	assert!(!c.is_initialized());
	assert_eq!(queue.launches(), 0);
	Ok(())
}

#[test]
fn test_same_result_on_any_geometry() -> Result<()> {
	let data: Vec<f64> = (0..5000).map(|i| f64::from(i) * 0.25).collect();
	let mut results = Vec::new();
	for max_threads_per_block in [1, 3, 32, 256] {
		let queue = Queue::new(CPUDevice::with_config(CPUDeviceConfig {
			max_threads_per_block,
			max_blocks: 64,
			..CPUDeviceConfig::default()
		}));
		let x = Vector::from_slice(&queue, &data)?;
		results.push((x.expr() * 4.0 - x.expr().shift(-1)).eval()?.to_vec()?);
	}
	for r in &results[1..] {
		assert_eq!(r, &results[0]);
	}
	assert_eq!(results[0][0], 0.0);
	assert_eq!(results[0][4999], 4999.0 - 4998.0 * 0.25);
	Ok(())
}

//--------------------------------------------------------------------------------------------------
