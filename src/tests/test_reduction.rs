//------------------------------------------------------------------------------
//
// Copyright 2025 Jiri Bobek. All rights reserved.
// License: GPL 3.0 or later. See LICENSE.txt for details.
//
//------------------------------------------------------------------------------

use assert_approx_eq::assert_approx_eq;

use crate::device::cpu::{CPUDevice, CPUDeviceConfig};
use crate::{ExprError, Queue, ReduceOp, Result, Vector};

//--------------------------------------------------------------------------------------------------

fn queues() -> Vec<Queue> {
	let configs = [(1, 256), (4, 256), (3, 64), (2, 7), (16, 1024), (1, 1)];
	configs
		.iter()
		.map(|&(multiprocessor_count, max_threads_per_block)| {
			Queue::new(CPUDevice::with_config(CPUDeviceConfig {
				multiprocessor_count,
				max_threads_per_block,
				..CPUDeviceConfig::default()
			}))
		})
		.collect()
}

//--------------------------------------------------------------------------------------------------

#[test]
fn test_sum_max_min_on_all_geometries() -> Result<()> {
	for queue in queues() {
		for n in [1_i64, 2, 5, 256, 257, 100_000] {
			// a permutation of 1..=n, so max and min do not sit at the ends
			let data: Vec<i64> = (0..n).map(|i| (i * 7919) % n + 1).collect();
			let x = Vector::from_slice(&queue, &data)?;
			let props = queue.props();
			let at = format!("n = {n}, props = {props:?}");
			assert_eq!(x.expr().sum().compute()?, n * (n + 1) / 2, "{at}");
			assert_eq!(x.expr().max().compute()?, n, "{at}");
			assert_eq!(x.expr().min().compute()?, 1, "{at}");
		}
	}
	Ok(())
}

#[test]
fn test_float_sum_max_on_all_geometries() -> Result<()> {
	for queue in queues() {
		for n in [1_u32, 2, 5, 256, 257, 100_000] {
			let data: Vec<f64> =
				(0..n).map(|i| f64::from((i * 7919) % n) * 0.37 - 11.5).collect();
			let x = Vector::from_slice(&queue, &data)?;
			let props = queue.props();
			let at = format!("n = {n}, props = {props:?}");
			let sequential = data.iter().fold(0.0, |acc, &v| acc + v);
			let largest = data.iter().copied().fold(f64::MIN, f64::max);
			let sum = x.expr().sum().compute()?;
			assert!((sum - sequential).abs() <= 1e-9 * (1.0 + sequential.abs()), "{at}");
			assert_eq!(x.expr().max().compute()?, largest, "{at}");
		}
	}
	Ok(())
}

#[test]
fn test_sum_of_composed_expression() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let e = Vector::from_slice(&queue, &[1, 2, 3, 4, 5])?;
	assert_eq!((&e + &e).sum().compute()?, 30);
	assert_eq!((&e * &e).sum().compute()?, 55);
	Ok(())
}

#[test]
fn test_float_sum() -> Result<()> {
	for queue in queues() {
		let data: Vec<f64> = (0..10_000).map(|i| f64::from(i % 100) * 0.01).collect();
		let x = Vector::from_slice(&queue, &data)?;
		assert_approx_eq!(x.expr().sum().compute()?, 4950.0, 1e-6);
		assert_approx_eq!(x.expr().mean().compute()?, 0.495, 1e-9);
	}
	Ok(())
}

#[test]
fn test_integer_mean() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let x = Vector::from_slice(&queue, &[2_i32, 4, 6])?;
	assert_eq!(x.expr().mean().compute()?, 4);
	// 15 / 4
	let y = Vector::from_slice(&queue, &[1_i64, 2, 5, 7])?;
	assert_eq!(y.expr().mean().compute()?, 3);
	Ok(())
}

#[test]
fn test_custom_reduce_op() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let x = Vector::from_slice(&queue, &[12_i32, 18, 30, 42])?;
	let gcd = |mut a: i32, mut b: i32| {
		while b != 0 {
			(a, b) = (b, a % b);
		}
		a
	};
	assert_eq!(x.expr().reduce(ReduceOp::Custom(gcd)).compute()?, 6);
	Ok(())
}

#[test]
fn test_reduce_inside_expression() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let x = Vector::from_slice(&queue, &[1.0, 2.0, 3.0, 6.0])?;
	// center around the mean
	let centered = (x.expr() - x.expr().mean()).eval()?;
	assert_eq!(centered.to_vec()?, vec![-2.0, -1.0, 0.0, 3.0]);
	assert_eq!((x.expr() / x.expr().max()).max().compute()?, 1.0);
	Ok(())
}

#[test]
fn test_reduce_of_broadcast_and_shift() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let x = Vector::from_slice(&queue, &[5, 1, 4])?;
	let one = Vector::from_slice(&queue, &[10])?;
	assert_eq!((&x + &one).sum().compute()?, 40);
	// [1, 4, 4]
	assert_eq!(x.expr().shift(1).sum().compute()?, 9);
	Ok(())
}

#[test]
fn test_empty_reduction_fails() -> Result<()> {
	let queue = Queue::new(CPUDevice::new());
	let x = Vector::<f64>::new(&queue, 0)?;
	for err in [
		x.expr().sum().compute().unwrap_err(),
		x.expr().max().compute().unwrap_err(),
		(x.expr() * 2.0).sum().eval().unwrap_err(),
	] {
		assert_eq!(err.code, ExprError::EmptyReduction);
	}
	assert_eq!(queue.launches(), 0);
	Ok(())
}

//--------------------------------------------------------------------------------------------------
