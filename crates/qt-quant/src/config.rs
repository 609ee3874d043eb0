use crate::error::Result;
use crate::numerics::Numerics;

/// Per-operand quantization configuration for a two-operand contraction.
///
/// `None` for an operand means it stays at full precision. Validation
/// happens at construction, so a config that exists is always usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EinsumQuantConfig {
    pub lhs: Option<Numerics>,
    pub rhs: Option<Numerics>,
}

impl EinsumQuantConfig {
    /// Both operands at full precision.
    pub fn none() -> Self {
        EinsumQuantConfig {
            lhs: None,
            rhs: None,
        }
    }

    /// Symmetric integer quantization with nearest rounding, one optional
    /// bit width per operand.
    ///
    /// # Errors
    /// Rejects bit widths outside 2..=8 (including 0).
    pub fn int_symmetric(lhs_bits: Option<u32>, rhs_bits: Option<u32>) -> Result<Self> {
        Ok(EinsumQuantConfig {
            lhs: lhs_bits.map(Numerics::int).transpose()?,
            rhs: rhs_bits.map(Numerics::int).transpose()?,
        })
    }

    /// Explicit numerics per operand.
    pub fn with_numerics(lhs: Option<Numerics>, rhs: Option<Numerics>) -> Self {
        EinsumQuantConfig { lhs, rhs }
    }

    /// True if neither operand is quantized.
    pub fn is_noop(&self) -> bool {
        self.lhs.is_none() && self.rhs.is_none()
    }
}
