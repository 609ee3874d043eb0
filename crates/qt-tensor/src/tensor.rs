use crate::backend::ComputeBackend;
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A tensor backed by CPU storage.
///
/// Holds contiguous, row-major data with an associated shape and dtype.
/// Tensors are immutable: every operation returns a new tensor.
/// Operations that require computation are dispatched to a
/// `ComputeBackend`; data-movement operations (reshape, permute,
/// reductions, broadcasting) are implemented directly.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
    dtype: DType,
}

impl Tensor {
    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f32_vec(data),
            shape,
            dtype: DType::F32,
        }
    }

    /// Create a zero-filled tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            storage: CpuStorage::from_f32_vec(vec![0.0; n]),
            shape,
            dtype: DType::F32,
        }
    }

    /// Create a tensor filled with ones with the given shape.
    pub fn ones(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            storage: CpuStorage::from_f32_vec(vec![1.0; n]),
            shape,
            dtype: DType::F32,
        }
    }

    /// Create a rank-0 tensor holding a single value.
    pub fn from_scalar(value: f32) -> Self {
        Tensor::new(vec![value], Shape::scalar())
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the underlying data as an f32 slice.
    ///
    /// # Panics
    /// Panics if the storage is not F32. Use `to_f32_vec` for a widening
    /// read that accepts any dtype.
    pub fn data_f32(&self) -> &[f32] {
        self.storage
            .as_f32_slice()
            .expect("tensor storage is not F32")
    }

    /// Returns an owned f32 vector of the data, widening f16 storage.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.storage.to_f32_vec()
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// Convert the tensor to the given dtype.
    ///
    /// Narrowing to f16 rounds every element to the nearest representable
    /// half-precision value; widening back recovers an f32 tensor that has
    /// been through that rounding.
    pub fn to_dtype(&self, dtype: DType) -> Tensor {
        Tensor {
            storage: self.storage.to_dtype(dtype),
            shape: self.shape.clone(),
            dtype,
        }
    }

    /// Reshape the tensor, returning a new tensor with the same data but
    /// a different shape.
    ///
    /// The total number of elements must remain the same.
    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if self.shape.numel() != new_shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: new_shape.dims().to_vec(),
            });
        }
        Ok(Tensor {
            storage: self.storage.clone(),
            shape: new_shape,
            dtype: self.dtype,
        })
    }

    /// Transpose the tensor axes, returning a contiguous tensor whose
    /// axis `i` is the source axis `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> Result<Tensor> {
        let out_shape = self.shape.permute(perm)?;
        let src = self.storage.as_f32_slice()?;

        if self.shape.ndim() <= 1 {
            return Ok(Tensor::new(src.to_vec(), out_shape));
        }

        let src_strides = self.shape.strides();
        let out_strides = out_shape.strides();
        let out_dims = out_shape.dims().to_vec();
        let n = out_shape.numel();

        let mut out = vec![0.0f32; n];
        for (idx, slot) in out.iter_mut().enumerate() {
            let mut src_off = 0;
            for (pos, &stride) in out_strides.iter().enumerate() {
                let coord = (idx / stride) % out_dims[pos];
                src_off += coord * src_strides[perm[pos]];
            }
            *slot = src[src_off];
        }
        Ok(Tensor::new(out, out_shape))
    }

    /// Sum the tensor over the given axes, removing them from the shape.
    ///
    /// Axes must be in range and distinct. Summing over no axes returns a
    /// copy.
    pub fn sum_axes(&self, axes: &[usize]) -> Result<Tensor> {
        let ndim = self.shape.ndim();
        let mut summed = vec![false; ndim];
        for &axis in axes {
            if axis >= ndim {
                return Err(TensorError::InvalidAxis { axis, ndim });
            }
            if summed[axis] {
                return Err(TensorError::InvalidAxis { axis, ndim });
            }
            summed[axis] = true;
        }
        if axes.is_empty() {
            return Ok(self.clone());
        }

        let src = self.storage.as_f32_slice()?;
        let dims = self.shape.dims();
        let src_strides = self.shape.strides();

        let kept: Vec<usize> = (0..ndim).filter(|&d| !summed[d]).collect();
        let out_dims: Vec<usize> = kept.iter().map(|&d| dims[d]).collect();
        let out_shape = Shape::new(out_dims);
        let out_strides = out_shape.strides();

        let mut out = vec![0.0f32; out_shape.numel()];
        for (idx, &v) in src.iter().enumerate() {
            let mut out_off = 0;
            for (pos, &d) in kept.iter().enumerate() {
                let coord = (idx / src_strides[d]) % dims[d];
                out_off += coord * out_strides[pos];
            }
            out[out_off] += v;
        }
        Ok(Tensor::new(out, out_shape))
    }

    /// Broadcast the tensor to `target`, which must have the same rank;
    /// each source dimension must equal the target dimension or be 1.
    pub fn broadcast_to(&self, target: &Shape) -> Result<Tensor> {
        let dims = self.shape.dims();
        if dims.len() != target.ndim()
            || dims
                .iter()
                .zip(target.dims())
                .any(|(&s, &t)| s != t && s != 1)
        {
            return Err(TensorError::BroadcastError {
                from: dims.to_vec(),
                to: target.dims().to_vec(),
            });
        }

        let src = self.storage.as_f32_slice()?;
        let src_strides = self.shape.strides();
        let out_strides = target.strides();
        let out_dims = target.dims().to_vec();

        let mut out = vec![0.0f32; target.numel()];
        for (idx, slot) in out.iter_mut().enumerate() {
            let mut src_off = 0;
            for (pos, &stride) in out_strides.iter().enumerate() {
                if dims[pos] != 1 {
                    let coord = (idx / stride) % out_dims[pos];
                    src_off += coord * src_strides[pos];
                }
            }
            *slot = src[src_off];
        }
        Ok(Tensor::new(out, target.clone()))
    }

    /// Element-wise addition using the given backend. Shapes must match.
    pub fn add(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        self.check_same_shape(other)?;
        let data = backend.add(self.storage.as_f32_slice()?, other.storage.as_f32_slice()?)?;
        Ok(Tensor::new(data, self.shape.clone()))
    }

    /// Element-wise multiplication using the given backend. Shapes must match.
    pub fn mul(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        self.check_same_shape(other)?;
        let data = backend.mul(self.storage.as_f32_slice()?, other.storage.as_f32_slice()?)?;
        Ok(Tensor::new(data, self.shape.clone()))
    }

    /// Scalar multiplication using the given backend.
    pub fn scale(&self, s: f32, backend: &dyn ComputeBackend) -> Result<Tensor> {
        let data = backend.scale(self.storage.as_f32_slice()?, s)?;
        Ok(Tensor::new(data, self.shape.clone()))
    }

    /// Sum of all elements using the given backend.
    pub fn sum(&self, backend: &dyn ComputeBackend) -> Result<f32> {
        backend.sum(self.storage.as_f32_slice()?)
    }

    /// Matrix multiplication of two 2D tensors using the given backend.
    ///
    /// self is [m, k], other is [k, n], result is [m, n].
    pub fn matmul(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        if self.shape.ndim() != 2 || other.shape.ndim() != 2 {
            return Err(TensorError::Other(
                "matmul requires 2D tensors".to_string(),
            ));
        }

        let m = self.shape.dim(0);
        let k = self.shape.dim(1);
        let k2 = other.shape.dim(0);
        let n = other.shape.dim(1);

        if k != k2 {
            return Err(TensorError::MatmulMismatch { m, k, k2, n });
        }

        let result_data = backend.matmul(
            self.storage.as_f32_slice()?,
            other.storage.as_f32_slice()?,
            m,
            k,
            n,
        )?;
        Ok(Tensor::new(result_data, Shape::new(vec![m, n])))
    }

    fn check_same_shape(&self, other: &Tensor) -> Result<()> {
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: other.shape.dims().to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;

    #[test]
    fn test_new_tensor() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        assert_eq!(t.shape().ndim(), 2);
        assert_eq!(t.shape().dim(0), 2);
        assert_eq!(t.shape().dim(1), 3);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.data_f32(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zeros_ones_scalar() {
        let z = Tensor::zeros(Shape::new(vec![2, 3]));
        assert_eq!(z.data_f32(), &[0.0; 6]);

        let o = Tensor::ones(Shape::new(vec![3]));
        assert_eq!(o.data_f32(), &[1.0, 1.0, 1.0]);

        let s = Tensor::from_scalar(2.5);
        assert_eq!(s.shape().ndim(), 0);
        assert_eq!(s.data_f32(), &[2.5]);
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let r = t.reshape(Shape::new(vec![3, 2])).unwrap();
        assert_eq!(r.shape().dims(), &[3, 2]);
        assert_eq!(r.data_f32(), t.data_f32());
    }

    #[test]
    fn test_reshape_mismatch() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        assert!(t.reshape(Shape::new(vec![2, 2])).is_err());
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![3]));
    }

    #[test]
    fn test_permute_2d() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let p = t.permute(&[1, 0]).unwrap();
        assert_eq!(p.shape().dims(), &[3, 2]);
        assert_eq!(p.data_f32(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_permute_3d() {
        // [2, 1, 3] -> [3, 2, 1] moving axis 2 to the front.
        let t = Tensor::new(
            vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
            Shape::new(vec![2, 1, 3]),
        );
        let p = t.permute(&[2, 0, 1]).unwrap();
        assert_eq!(p.shape().dims(), &[3, 2, 1]);
        assert_eq!(p.data_f32(), &[0.0, 10.0, 1.0, 11.0, 2.0, 12.0]);
    }

    #[test]
    fn test_permute_identity() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        let p = t.permute(&[0, 1]).unwrap();
        assert_eq!(p.data_f32(), t.data_f32());
    }

    #[test]
    fn test_permute_invalid() {
        let t = Tensor::zeros(Shape::new(vec![2, 2]));
        assert!(t.permute(&[0]).is_err());
        assert!(t.permute(&[1, 1]).is_err());
    }

    #[test]
    fn test_sum_axes() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let rows = t.sum_axes(&[1]).unwrap();
        assert_eq!(rows.shape().dims(), &[2]);
        assert_eq!(rows.data_f32(), &[6.0, 15.0]);

        let cols = t.sum_axes(&[0]).unwrap();
        assert_eq!(cols.shape().dims(), &[3]);
        assert_eq!(cols.data_f32(), &[5.0, 7.0, 9.0]);

        let all = t.sum_axes(&[0, 1]).unwrap();
        assert_eq!(all.shape().ndim(), 0);
        assert_eq!(all.data_f32(), &[21.0]);
    }

    #[test]
    fn test_sum_axes_invalid() {
        let t = Tensor::zeros(Shape::new(vec![2, 3]));
        assert!(t.sum_axes(&[2]).is_err());
        assert!(t.sum_axes(&[0, 0]).is_err());
    }

    #[test]
    fn test_broadcast_to() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let b = t.broadcast_to(&Shape::new(vec![2, 3])).unwrap();
        assert_eq!(b.shape().dims(), &[2, 3]);
        assert_eq!(b.data_f32(), &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_broadcast_to_error() {
        let t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![2]));
        // Rank must match; only size-1 dims expand.
        assert!(t.broadcast_to(&Shape::new(vec![2, 2])).is_err());
        assert!(t.broadcast_to(&Shape::new(vec![3])).is_err());
    }

    #[test]
    fn test_elementwise_ops() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0], Shape::new(vec![2]));
        let b = Tensor::new(vec![3.0, 4.0], Shape::new(vec![2]));
        assert_eq!(a.add(&b, &backend).unwrap().data_f32(), &[4.0, 6.0]);
        assert_eq!(a.mul(&b, &backend).unwrap().data_f32(), &[3.0, 8.0]);
        assert_eq!(a.scale(2.0, &backend).unwrap().data_f32(), &[2.0, 4.0]);
        assert_eq!(a.sum(&backend).unwrap(), 3.0);
    }

    #[test]
    fn test_elementwise_shape_mismatch() {
        let backend = CpuBackend::new();
        let a = Tensor::zeros(Shape::new(vec![2]));
        let b = Tensor::zeros(Shape::new(vec![3]));
        assert!(a.add(&b, &backend).is_err());
    }

    #[test]
    fn test_matmul() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        let b = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], Shape::new(vec![2, 2]));
        let c = a.matmul(&b, &backend).unwrap();
        assert_eq!(c.shape().dims(), &[2, 2]);
        assert_eq!(c.data_f32(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let b = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        assert!(a.matmul(&b, &backend).is_err());
    }

    #[test]
    fn test_to_dtype_round_trip() {
        use approx::assert_abs_diff_eq;

        let t = Tensor::new(vec![0.1, 1.0, -2.7], Shape::new(vec![3]));
        let h = t.to_dtype(DType::F16);
        assert_eq!(h.dtype(), DType::F16);
        let back = h.to_dtype(DType::F32);
        let out = back.data_f32();
        assert_ne!(out[0], 0.1f32);
        assert_abs_diff_eq!(out[0], 0.1, epsilon = 1e-3);
        assert_eq!(out[1], 1.0);
        assert_abs_diff_eq!(out[2], -2.7, epsilon = 2e-3);
    }

    #[test]
    fn test_ops_reject_f16_storage() {
        let t = Tensor::ones(Shape::new(vec![2, 2])).to_dtype(DType::F16);
        assert!(t.permute(&[1, 0]).is_err());
        assert!(t.sum_axes(&[0]).is_err());
    }
}
