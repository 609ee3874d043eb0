use qt_tensor::{ComputeBackend, Shape, Tensor};

use crate::equation::parse;
use crate::error::Result;
use crate::plan::{plan, ResolvedEquation};

/// Evaluate a two-operand einsum over the given backend.
///
/// The equation uses explicit-output notation, e.g. `"ij,jk->ik"` or
/// `"...x,xy->y"`. Fails fast on malformed equations, rank mismatches,
/// and inconsistent index sizes.
pub fn einsum(
    backend: &dyn ComputeBackend,
    eqn: &str,
    lhs: &Tensor,
    rhs: &Tensor,
) -> Result<Tensor> {
    let equation = parse(eqn)?;
    let resolved = crate::plan::resolve(&equation, lhs.shape(), rhs.shape())?;
    contract(backend, &resolved, lhs, rhs)
}

/// Execute a resolved equation: pre-sum operand-private axes, lower the
/// rest onto a (batched) matmul, and permute into the output order.
pub(crate) fn contract(
    backend: &dyn ComputeBackend,
    res: &ResolvedEquation,
    lhs: &Tensor,
    rhs: &Tensor,
) -> Result<Tensor> {
    let p = plan(res);

    let lhs_reduced = if p.lhs_sum_axes.is_empty() {
        lhs.clone()
    } else {
        lhs.sum_axes(&p.lhs_sum_axes)?
    };
    let rhs_reduced = if p.rhs_sum_axes.is_empty() {
        rhs.clone()
    } else {
        rhs.sum_axes(&p.rhs_sum_axes)?
    };

    let lhs_mat = lhs_reduced.permute(&p.lhs_perm)?;
    let rhs_mat = rhs_reduced.permute(&p.rhs_perm)?;

    let a = lhs_mat.storage().as_f32_slice()?;
    let b = rhs_mat.storage().as_f32_slice()?;

    // Single-batch plans (plain matmul, dot products, outer products) take
    // the 2D kernel directly.
    let data = if p.batch == 1 {
        backend.matmul(a, b, p.m, p.k, p.n)?
    } else {
        backend.batched_matmul(a, b, p.batch, p.m, p.k, p.n)?
    };

    let mid = Tensor::new(data, Shape::new(p.mid_dims.clone()));
    Ok(mid.permute(&p.out_perm)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qt_tensor::CpuBackend;

    fn tensor(dims: &[usize], f: impl Fn(usize) -> f32) -> Tensor {
        let n: usize = dims.iter().product();
        Tensor::new((0..n).map(f).collect(), Shape::from_slice(dims))
    }

    /// Brute-force reference: enumerate the full cartesian product of all
    /// axis ids and accumulate, independent of the matmul lowering.
    fn naive_einsum(eqn: &str, lhs: &Tensor, rhs: &Tensor) -> Tensor {
        let resolved = crate::plan::resolve(
            &parse(eqn).unwrap(),
            lhs.shape(),
            rhs.shape(),
        )
        .unwrap();

        let sizes = resolved.sizes.clone();
        let out_shape = Shape::new(resolved.out_dims());
        let mut out = vec![0.0f32; out_shape.numel()];

        let offset = |axes: &[usize], coords: &[usize]| {
            axes.iter()
                .fold(0usize, |acc, &id| acc * sizes[id] + coords[id])
        };

        let total: usize = sizes.iter().product();
        let mut coords = vec![0usize; sizes.len()];
        for flat in 0..total {
            let mut rem = flat;
            for (i, &s) in sizes.iter().enumerate().rev() {
                coords[i] = rem % s;
                rem /= s;
            }
            let lv = lhs.data_f32()[offset(&resolved.lhs, &coords)];
            let rv = rhs.data_f32()[offset(&resolved.rhs, &coords)];
            out[offset(&resolved.out, &coords)] += lv * rv;
        }
        Tensor::new(out, out_shape)
    }

    fn assert_matches_naive(eqn: &str, lhs: &Tensor, rhs: &Tensor) {
        let backend = CpuBackend::new();
        let fast = einsum(&backend, eqn, lhs, rhs).unwrap();
        let slow = naive_einsum(eqn, lhs, rhs);
        assert_eq!(fast.shape(), slow.shape(), "shape for {eqn}");
        for (a, b) in fast.data_f32().iter().zip(slow.data_f32()) {
            assert_relative_eq!(a, b, max_relative = 1e-4, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_einsum_matmul() {
        let backend = CpuBackend::new();
        let a = tensor(&[2, 3], |i| i as f32 + 1.0);
        let b = tensor(&[3, 4], |i| (i as f32) * 0.5 - 1.0);
        let c = einsum(&backend, "ij,jk->ik", &a, &b).unwrap();
        let reference = a.matmul(&b, &backend).unwrap();
        assert_eq!(c.shape().dims(), &[2, 4]);
        assert_eq!(c.data_f32(), reference.data_f32());
    }

    #[test]
    fn test_einsum_transposed_output() {
        let a = tensor(&[2, 3], |i| i as f32);
        let b = tensor(&[3, 4], |i| (i as f32).sin());
        assert_matches_naive("ij,jk->ki", &a, &b);
    }

    #[test]
    fn test_einsum_batched() {
        let a = tensor(&[5, 2, 3], |i| (i as f32) * 0.1);
        let b = tensor(&[5, 3, 4], |i| (i as f32) * 0.01 - 0.3);
        assert_matches_naive("bij,bjk->bik", &a, &b);
    }

    #[test]
    fn test_einsum_dot_product() {
        let backend = CpuBackend::new();
        let a = tensor(&[4], |i| i as f32);
        let b = tensor(&[4], |i| 2.0 * i as f32);
        let c = einsum(&backend, "i,i->", &a, &b).unwrap();
        assert_eq!(c.shape().ndim(), 0);
        // 0 + 2 + 8 + 18
        assert_eq!(c.data_f32(), &[28.0]);
    }

    #[test]
    fn test_einsum_outer_product() {
        let a = tensor(&[2], |i| i as f32 + 1.0);
        let b = tensor(&[3], |i| i as f32 + 1.0);
        assert_matches_naive("i,j->ij", &a, &b);
    }

    #[test]
    fn test_einsum_summed_ellipsis() {
        // Unnamed lhs axes absent from the output are summed out.
        let a = tensor(&[3, 2, 4], |i| (i as f32) * 0.25 - 1.0);
        let b = tensor(&[4, 5], |i| (i as f32) * 0.5);
        assert_matches_naive("...x,xy->y", &a, &b);
    }

    #[test]
    fn test_einsum_kept_ellipsis() {
        let a = tensor(&[3, 2, 4], |i| (i as f32) * 0.25);
        let b = tensor(&[4, 5], |i| 1.0 - (i as f32) * 0.5);
        assert_matches_naive("...x,xy->...y", &a, &b);
    }

    #[test]
    fn test_einsum_rhs_private_axis_summed() {
        let a = tensor(&[3], |i| i as f32);
        let b = tensor(&[3, 4], |i| i as f32 * 0.5);
        // 'q' appears only in the rhs and not in the output.
        assert_matches_naive("x,xq->x", &a, &b);
    }

    #[test]
    fn test_einsum_batch_and_contraction_mix() {
        let a = tensor(&[2, 3, 4], |i| (i as f32).cos());
        let b = tensor(&[2, 4, 5], |i| (i as f32).sin());
        assert_matches_naive("bxk,bky->byx", &a, &b);
    }

    #[test]
    fn test_einsum_invalid_equation_fails_fast() {
        let backend = CpuBackend::new();
        let a = tensor(&[2, 3], |i| i as f32);
        let b = tensor(&[3, 4], |i| i as f32);
        assert!(einsum(&backend, "ij,jk", &a, &b).is_err());
        assert!(einsum(&backend, "ij,jk->iz", &a, &b).is_err());
        assert!(einsum(&backend, "ijq,jk->ik", &a, &b).is_err());
    }
}
