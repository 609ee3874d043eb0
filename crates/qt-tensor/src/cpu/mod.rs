pub mod matmul;

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance. Intended as a reference
/// implementation and fallback.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        if a.len() != m * k {
            return Err(TensorError::Other(format!(
                "matmul: a.len()={} but expected m*k={}",
                a.len(),
                m * k
            )));
        }
        if b.len() != k * n {
            return Err(TensorError::Other(format!(
                "matmul: b.len()={} but expected k*n={}",
                b.len(),
                k * n
            )));
        }

        let mut c = vec![0.0f32; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0f32;
                for p in 0..k {
                    sum += a[i * k + p] * b[p * n + j];
                }
                c[i * n + j] = sum;
            }
        }
        Ok(c)
    }

    fn batched_matmul(
        &self,
        a: &[f32],
        b: &[f32],
        batch: usize,
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<Vec<f32>> {
        if a.len() != batch * m * k {
            return Err(TensorError::Other(format!(
                "batched_matmul: a.len()={} but expected batch*m*k={}",
                a.len(),
                batch * m * k
            )));
        }
        if b.len() != batch * k * n {
            return Err(TensorError::Other(format!(
                "batched_matmul: b.len()={} but expected batch*k*n={}",
                b.len(),
                batch * k * n
            )));
        }

        let mut c = vec![0.0f32; batch * m * n];
        for bi in 0..batch {
            let a_off = bi * m * k;
            let b_off = bi * k * n;
            let c_off = bi * m * n;
            for i in 0..m {
                for j in 0..n {
                    let mut sum = 0.0f32;
                    for p in 0..k {
                        sum += a[a_off + i * k + p] * b[b_off + p * n + j];
                    }
                    c[c_off + i * n + j] = sum;
                }
            }
        }
        Ok(c)
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x + y).collect())
    }

    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).collect())
    }

    fn scale(&self, a: &[f32], s: f32) -> Result<Vec<f32>> {
        Ok(a.iter().map(|x| x * s).collect())
    }

    fn sum(&self, a: &[f32]) -> Result<f32> {
        Ok(a.iter().sum())
    }
}
