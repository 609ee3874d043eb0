use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends (CPU, SIMD, GPU, etc.).
///
/// All operations work on f32 slices. Data is passed in as slices and
/// returned as owned vectors. The backend is responsible for performing
/// the computation and returning the result.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Batched matrix multiplication over `batch` independent pairs.
    ///
    /// - `a`: row-major data of shape [batch, m, k]
    /// - `b`: row-major data of shape [batch, k, n]
    /// - Returns: row-major data of shape [batch, m, n]
    fn batched_matmul(
        &self,
        a: &[f32],
        b: &[f32],
        batch: usize,
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<Vec<f32>>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Element-wise multiplication: result[i] = a[i] * b[i].
    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Scalar multiplication: result[i] = a[i] * s.
    fn scale(&self, a: &[f32], s: f32) -> Result<Vec<f32>>;

    /// Sum of all elements.
    fn sum(&self, a: &[f32]) -> Result<f32>;
}
