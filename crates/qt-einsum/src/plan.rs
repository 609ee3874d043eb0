use qt_tensor::Shape;

use crate::equation::{Equation, OperandSpec};
use crate::error::{EinsumError, Result};

/// Internal identifier for one contraction axis. Named labels and expanded
/// ellipsis axes both get ids, so planning never looks at label characters.
pub(crate) type AxisId = usize;

/// An equation resolved against concrete operand shapes: every axis has an
/// id and a size, and ellipses have been expanded.
#[derive(Debug, Clone)]
pub struct ResolvedEquation {
    pub(crate) lhs: Vec<AxisId>,
    pub(crate) rhs: Vec<AxisId>,
    pub(crate) out: Vec<AxisId>,
    pub(crate) sizes: Vec<usize>,
}

impl ResolvedEquation {
    /// Dimension sizes of the einsum output.
    pub fn out_dims(&self) -> Vec<usize> {
        self.out.iter().map(|&id| self.sizes[id]).collect()
    }
}

/// Resolve a parsed equation against the operand shapes.
///
/// Expands each ellipsis into one axis per uncovered dimension, checks
/// ranks, and unifies the size of every index that appears in both
/// operands. Ellipsis axes carried by both operands must agree exactly.
pub fn resolve(eqn: &Equation, lhs_shape: &Shape, rhs_shape: &Shape) -> Result<ResolvedEquation> {
    let lhs_ell = ellipsis_ndim(&eqn.lhs, lhs_shape)?;
    let rhs_ell = ellipsis_ndim(&eqn.rhs, rhs_shape)?;

    if eqn.lhs.has_ellipsis() && eqn.rhs.has_ellipsis() {
        let lhs_dims = ellipsis_dims(&eqn.lhs, lhs_shape, lhs_ell);
        let rhs_dims = ellipsis_dims(&eqn.rhs, rhs_shape, rhs_ell);
        if lhs_dims != rhs_dims {
            return Err(EinsumError::EllipsisMismatch {
                lhs: lhs_dims,
                rhs: rhs_dims,
            });
        }
    }

    let mut table = AxisTable::default();

    // Ellipsis axes are shared between operands when both carry one.
    let ell_ids: Vec<AxisId> = {
        let ell_count = lhs_ell.max(rhs_ell);
        (0..ell_count).map(|_| table.fresh()).collect()
    };
    // Both expansions right-align onto the shared ids; with an exact-match
    // requirement the counts are equal whenever both are nonzero.
    let lhs_ell_ids = &ell_ids[ell_ids.len() - lhs_ell..];
    let rhs_ell_ids = &ell_ids[ell_ids.len() - rhs_ell..];

    let lhs_axes = operand_axes(&eqn.lhs, lhs_ell_ids, &mut table);
    let rhs_axes = operand_axes(&eqn.rhs, rhs_ell_ids, &mut table);

    table.bind_sizes(&lhs_axes, lhs_shape)?;
    table.bind_sizes(&rhs_axes, rhs_shape)?;

    let out_ell_ids = if eqn.out.has_ellipsis() { &ell_ids[..] } else { &[] };
    let out_axes = operand_axes(&eqn.out, out_ell_ids, &mut table);

    Ok(ResolvedEquation {
        lhs: lhs_axes,
        rhs: rhs_axes,
        out: out_axes,
        sizes: table.sizes,
    })
}

fn ellipsis_ndim(spec: &OperandSpec, shape: &Shape) -> Result<usize> {
    if spec.has_ellipsis() {
        if shape.ndim() < spec.named() {
            return Err(EinsumError::RankTooSmall {
                spec: spec.to_string(),
                named: spec.named(),
                got: shape.ndim(),
            });
        }
        Ok(shape.ndim() - spec.named())
    } else {
        if shape.ndim() != spec.named() {
            return Err(EinsumError::RankMismatch {
                spec: spec.to_string(),
                expected: spec.named(),
                got: shape.ndim(),
            });
        }
        Ok(0)
    }
}

fn ellipsis_dims(spec: &OperandSpec, shape: &Shape, ell: usize) -> Vec<usize> {
    let start = spec.ellipsis.unwrap_or(0);
    shape.dims()[start..start + ell].to_vec()
}

/// Axis ids for one operand, splicing the ellipsis ids into the named ones.
fn operand_axes(spec: &OperandSpec, ell_ids: &[AxisId], table: &mut AxisTable) -> Vec<AxisId> {
    let mut axes = Vec::with_capacity(spec.named() + ell_ids.len());
    for (i, &label) in spec.labels.iter().enumerate() {
        if spec.ellipsis == Some(i) {
            axes.extend_from_slice(ell_ids);
        }
        axes.push(table.intern(label));
    }
    if spec.ellipsis == Some(spec.labels.len()) {
        axes.extend_from_slice(ell_ids);
    }
    axes
}

#[derive(Default)]
struct AxisTable {
    sizes: Vec<usize>,
    labels: Vec<Option<char>>,
    by_label: Vec<(char, AxisId)>,
}

impl AxisTable {
    fn fresh(&mut self) -> AxisId {
        self.sizes.push(0);
        self.labels.push(None);
        self.sizes.len() - 1
    }

    fn intern(&mut self, label: char) -> AxisId {
        if let Some(&(_, id)) = self.by_label.iter().find(|(l, _)| *l == label) {
            return id;
        }
        let id = self.fresh();
        self.labels[id] = Some(label);
        self.by_label.push((label, id));
        id
    }

    /// Record the concrete size of every axis of one operand, checking
    /// against sizes already bound by the other operand.
    fn bind_sizes(&mut self, axes: &[AxisId], shape: &Shape) -> Result<()> {
        for (dim, &id) in axes.iter().enumerate() {
            let size = shape.dim(dim);
            if self.sizes[id] == 0 {
                self.sizes[id] = size;
            } else if self.sizes[id] != size {
                return Err(EinsumError::SizeMismatch {
                    // Shared unnamed axes were matched up front, so a clash
                    // here always has a label.
                    label: self.labels[id].unwrap_or('?'),
                    lhs: self.sizes[id],
                    rhs: size,
                });
            }
        }
        Ok(())
    }
}

/// The lowering of a resolved equation onto a batched matmul:
/// pre-sum axes private to one operand, permute both operands into
/// `[batch, free, contracted]` order, multiply, and permute the result
/// into the requested output order.
#[derive(Debug, Clone)]
pub(crate) struct ContractionPlan {
    pub(crate) lhs_sum_axes: Vec<usize>,
    pub(crate) rhs_sum_axes: Vec<usize>,
    pub(crate) lhs_perm: Vec<usize>,
    pub(crate) rhs_perm: Vec<usize>,
    pub(crate) batch: usize,
    pub(crate) m: usize,
    pub(crate) k: usize,
    pub(crate) n: usize,
    pub(crate) mid_dims: Vec<usize>,
    pub(crate) out_perm: Vec<usize>,
}

pub(crate) fn plan(res: &ResolvedEquation) -> ContractionPlan {
    let in_lhs = |id: AxisId| res.lhs.contains(&id);
    let in_rhs = |id: AxisId| res.rhs.contains(&id);
    let in_out = |id: AxisId| res.out.contains(&id);

    // Batch axes keep the output's order; free and contracted axes keep
    // the order of the operand that owns them.
    let batch_ids: Vec<AxisId> = res
        .out
        .iter()
        .copied()
        .filter(|&id| in_lhs(id) && in_rhs(id))
        .collect();
    let lhs_free: Vec<AxisId> = res
        .lhs
        .iter()
        .copied()
        .filter(|&id| in_out(id) && !in_rhs(id))
        .collect();
    let rhs_free: Vec<AxisId> = res
        .rhs
        .iter()
        .copied()
        .filter(|&id| in_out(id) && !in_lhs(id))
        .collect();
    let contracted: Vec<AxisId> = res
        .lhs
        .iter()
        .copied()
        .filter(|&id| in_rhs(id) && !in_out(id))
        .collect();

    let lhs_sum_axes: Vec<usize> = res
        .lhs
        .iter()
        .enumerate()
        .filter(|(_, &id)| !in_rhs(id) && !in_out(id))
        .map(|(pos, _)| pos)
        .collect();
    let rhs_sum_axes: Vec<usize> = res
        .rhs
        .iter()
        .enumerate()
        .filter(|(_, &id)| !in_lhs(id) && !in_out(id))
        .map(|(pos, _)| pos)
        .collect();

    let lhs_kept: Vec<AxisId> = res
        .lhs
        .iter()
        .copied()
        .filter(|&id| in_rhs(id) || in_out(id))
        .collect();
    let rhs_kept: Vec<AxisId> = res
        .rhs
        .iter()
        .copied()
        .filter(|&id| in_lhs(id) || in_out(id))
        .collect();

    let position = |ids: &[AxisId], id: AxisId| {
        ids.iter().position(|&x| x == id).expect("axis id present")
    };

    let lhs_order: Vec<AxisId> = batch_ids
        .iter()
        .chain(lhs_free.iter())
        .chain(contracted.iter())
        .copied()
        .collect();
    let rhs_order: Vec<AxisId> = batch_ids
        .iter()
        .chain(contracted.iter())
        .chain(rhs_free.iter())
        .copied()
        .collect();

    let lhs_perm: Vec<usize> = lhs_order.iter().map(|&id| position(&lhs_kept, id)).collect();
    let rhs_perm: Vec<usize> = rhs_order.iter().map(|&id| position(&rhs_kept, id)).collect();

    let size_of = |ids: &[AxisId]| ids.iter().map(|&id| res.sizes[id]).product::<usize>();
    let batch = size_of(&batch_ids);
    let m = size_of(&lhs_free);
    let k = size_of(&contracted);
    let n = size_of(&rhs_free);

    let mid_ids: Vec<AxisId> = batch_ids
        .iter()
        .chain(lhs_free.iter())
        .chain(rhs_free.iter())
        .copied()
        .collect();
    let mid_dims: Vec<usize> = mid_ids.iter().map(|&id| res.sizes[id]).collect();
    let out_perm: Vec<usize> = res.out.iter().map(|&id| position(&mid_ids, id)).collect();

    ContractionPlan {
        lhs_sum_axes,
        rhs_sum_axes,
        lhs_perm,
        rhs_perm,
        batch,
        m,
        k,
        n,
        mid_dims,
        out_perm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::parse;

    fn resolved(eqn: &str, lhs: &[usize], rhs: &[usize]) -> Result<ResolvedEquation> {
        resolve(
            &parse(eqn).unwrap(),
            &Shape::from_slice(lhs),
            &Shape::from_slice(rhs),
        )
    }

    #[test]
    fn test_resolve_matmul() {
        let res = resolved("ij,jk->ik", &[2, 3], &[3, 4]).unwrap();
        assert_eq!(res.out_dims(), vec![2, 4]);
        assert_eq!(res.lhs.len(), 2);
        assert_eq!(res.rhs.len(), 2);
        // j is shared between the operands.
        assert_eq!(res.lhs[1], res.rhs[0]);
    }

    #[test]
    fn test_resolve_ellipsis_expansion() {
        let res = resolved("...x,xy->y", &[10, 10, 10], &[10, 10]).unwrap();
        assert_eq!(res.lhs.len(), 3);
        assert_eq!(res.out_dims(), vec![10]);
    }

    #[test]
    fn test_resolve_shared_ellipsis() {
        let res = resolved("...i,...j->...ij", &[2, 3, 4], &[2, 3, 5]).unwrap();
        assert_eq!(res.out_dims(), vec![2, 3, 4, 5]);
        // The unnamed axes are the same ids on both sides.
        assert_eq!(res.lhs[0], res.rhs[0]);
        assert_eq!(res.lhs[1], res.rhs[1]);
    }

    #[test]
    fn test_resolve_rank_mismatch() {
        assert!(matches!(
            resolved("ij,jk->ik", &[2, 3, 4], &[3, 4]),
            Err(EinsumError::RankMismatch { .. })
        ));
        assert!(matches!(
            resolved("...ij,jk->ik", &[2], &[3, 4]),
            Err(EinsumError::RankTooSmall { .. })
        ));
    }

    #[test]
    fn test_resolve_size_mismatch() {
        assert!(matches!(
            resolved("ij,jk->ik", &[2, 3], &[4, 5]),
            Err(EinsumError::SizeMismatch {
                label: 'j',
                lhs: 3,
                rhs: 4
            })
        ));
    }

    #[test]
    fn test_resolve_ellipsis_mismatch() {
        assert!(matches!(
            resolved("...i,...i->", &[2, 3], &[4, 3]),
            Err(EinsumError::EllipsisMismatch { .. })
        ));
    }

    #[test]
    fn test_plan_matmul_shapes() {
        let res = resolved("ij,jk->ik", &[2, 3], &[3, 4]).unwrap();
        let p = plan(&res);
        assert_eq!((p.batch, p.m, p.k, p.n), (1, 2, 3, 4));
        assert!(p.lhs_sum_axes.is_empty());
        assert!(p.rhs_sum_axes.is_empty());
        assert_eq!(p.mid_dims, vec![2, 4]);
        assert_eq!(p.out_perm, vec![0, 1]);
    }

    #[test]
    fn test_plan_batched() {
        let res = resolved("bij,bjk->bik", &[5, 2, 3], &[5, 3, 4]).unwrap();
        let p = plan(&res);
        assert_eq!((p.batch, p.m, p.k, p.n), (5, 2, 3, 4));
        assert_eq!(p.mid_dims, vec![5, 2, 4]);
    }

    #[test]
    fn test_plan_summed_leading_axes() {
        let res = resolved("...x,xy->y", &[10, 10, 10], &[10, 10]).unwrap();
        let p = plan(&res);
        // The unnamed lhs axes are neither shared nor in the output, so
        // they are pre-summed.
        assert_eq!(p.lhs_sum_axes, vec![0, 1]);
        assert_eq!((p.batch, p.m, p.k, p.n), (1, 1, 10, 10));
    }

    #[test]
    fn test_plan_transposed_output() {
        let res = resolved("ij,jk->ki", &[2, 3], &[3, 4]).unwrap();
        let p = plan(&res);
        assert_eq!(p.mid_dims, vec![2, 4]);
        assert_eq!(p.out_perm, vec![1, 0]);
    }
}
