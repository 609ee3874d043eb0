use qt_tensor::{ComputeBackend, Shape, Tensor};

use crate::contract::contract;
use crate::equation::parse;
use crate::error::{EinsumError, Result};
use crate::plan::{resolve, AxisId, ResolvedEquation};

/// Reverse-mode vector-Jacobian product of a two-operand einsum.
///
/// Given the cotangent of the output (same shape as the einsum result),
/// returns the cotangents of both operands. Each one is itself an einsum:
/// the output cotangent contracted with the other operand, expanded over
/// any axes the operand does not share with either.
pub fn einsum_vjp(
    backend: &dyn ComputeBackend,
    eqn: &str,
    lhs: &Tensor,
    rhs: &Tensor,
    cotangent: &Tensor,
) -> Result<(Tensor, Tensor)> {
    let equation = parse(eqn)?;
    let res = resolve(&equation, lhs.shape(), rhs.shape())?;

    let out_dims = res.out_dims();
    if cotangent.shape().dims() != out_dims.as_slice() {
        return Err(EinsumError::CotangentShape {
            expected: out_dims,
            got: cotangent.shape().dims().to_vec(),
        });
    }

    let grad_lhs = operand_grad(backend, &res, cotangent, rhs, Wrt::Lhs, lhs.shape())?;
    let grad_rhs = operand_grad(backend, &res, cotangent, lhs, Wrt::Rhs, rhs.shape())?;
    Ok((grad_lhs, grad_rhs))
}

#[derive(Clone, Copy)]
enum Wrt {
    Lhs,
    Rhs,
}

fn operand_grad(
    backend: &dyn ComputeBackend,
    res: &ResolvedEquation,
    cotangent: &Tensor,
    other: &Tensor,
    wrt: Wrt,
    target_shape: &Shape,
) -> Result<Tensor> {
    let (wrt_axes, other_axes) = match wrt {
        Wrt::Lhs => (&res.lhs, &res.rhs),
        Wrt::Rhs => (&res.rhs, &res.lhs),
    };

    // An axis of the operand is determined by the cotangent or the other
    // operand; anything else was summed in the forward pass, so its
    // gradient is constant along that axis and comes from broadcasting.
    let determined: Vec<AxisId> = wrt_axes
        .iter()
        .copied()
        .filter(|id| res.out.contains(id) || other_axes.contains(id))
        .collect();

    let grad_eqn = ResolvedEquation {
        lhs: res.out.clone(),
        rhs: other_axes.clone(),
        out: determined.clone(),
        sizes: res.sizes.clone(),
    };
    let partial = contract(backend, &grad_eqn, cotangent, other)?;

    // Size-1 slots where the operand's private axes sit, then broadcast.
    let expanded_dims: Vec<usize> = wrt_axes
        .iter()
        .map(|id| {
            if determined.contains(id) {
                res.sizes[*id]
            } else {
                1
            }
        })
        .collect();
    let partial = partial.reshape(Shape::new(expanded_dims))?;
    Ok(partial.broadcast_to(target_shape)?)
}
