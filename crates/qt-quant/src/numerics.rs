use qt_tensor::{DType, Tensor};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{QuantError, Result};

/// Rounding scheme applied when snapping values onto the integer grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round to nearest, ties away from zero.
    Nearest,
    /// Unbiased stochastic rounding: floor after adding a uniform deviate
    /// from the caller's random stream.
    Stochastic,
}

/// Numeric format an operand is simulated in.
///
/// Quantization here is simulated: values are snapped onto the grid of the
/// reduced format but the result stays in f32, so contraction and gradient
/// arithmetic keep full precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numerics {
    /// Symmetric integer grid with the given bit width.
    Int { bits: u32, rounding: Rounding },
    /// Round-trip through IEEE half precision.
    Float16,
}

impl Numerics {
    /// Symmetric integer numerics with nearest rounding.
    ///
    /// Valid bit widths are 2..=8; anything else is rejected here so a bad
    /// width can never reach apply time.
    pub fn int(bits: u32) -> Result<Self> {
        Self::int_with_rounding(bits, Rounding::Nearest)
    }

    /// Symmetric integer numerics with an explicit rounding scheme.
    pub fn int_with_rounding(bits: u32, rounding: Rounding) -> Result<Self> {
        if !(2..=8).contains(&bits) {
            return Err(QuantError::UnsupportedBits { bits });
        }
        Ok(Numerics::Int { bits, rounding })
    }

    /// The integer bit width, if this is an integer format.
    pub fn bits(&self) -> Option<u32> {
        match self {
            Numerics::Int { bits, .. } => Some(*bits),
            Numerics::Float16 => None,
        }
    }

    /// Simulate this format on a tensor.
    ///
    /// Returns the snapped tensor (still f32) and the scale that maps grid
    /// steps back to real values, so callers can record calibration state.
    /// Stochastic rounding draws from `rng`; passing `None` there is an
    /// error for that scheme and ignored otherwise.
    pub fn fake_quant(&self, x: &Tensor, rng: Option<&mut StdRng>) -> Result<FakeQuant> {
        match self {
            Numerics::Int { bits, rounding } => int_fake_quant(x, *bits, *rounding, rng),
            Numerics::Float16 => Ok(FakeQuant {
                tensor: x.to_dtype(DType::F16).to_dtype(DType::F32),
                scale: 1.0,
            }),
        }
    }
}

/// Result of simulating a reduced format on a tensor.
#[derive(Debug, Clone)]
pub struct FakeQuant {
    /// The snapped tensor, widened back to f32.
    pub tensor: Tensor,
    /// Real-value size of one grid step (0 for an all-zero input, 1 for
    /// formats without an explicit grid).
    pub scale: f32,
}

/// Per-tensor symmetric absmax quantization.
///
/// The grid is `scale * i` for integers `i` in `[-q_max, q_max]` with
/// `q_max = 2^(bits-1) - 1` and `scale = absmax(x) / q_max`, the same
/// symmetric scheme 8-bit block formats use for inference weights.
fn int_fake_quant(
    x: &Tensor,
    bits: u32,
    rounding: Rounding,
    mut rng: Option<&mut StdRng>,
) -> Result<FakeQuant> {
    if rounding == Rounding::Stochastic && rng.is_none() {
        return Err(QuantError::MissingRng);
    }

    let data = x.storage().as_f32_slice()?;
    let absmax = data.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    if absmax == 0.0 {
        return Ok(FakeQuant {
            tensor: Tensor::zeros(x.shape().clone()),
            scale: 0.0,
        });
    }

    let q_max = ((1u32 << (bits - 1)) - 1) as f32;
    let scale = absmax / q_max;

    let mut out = Vec::with_capacity(data.len());
    for &v in data {
        let t = v / scale;
        let q = match rounding {
            Rounding::Nearest => t.round(),
            Rounding::Stochastic => {
                let u: f32 = rng.as_mut().expect("checked above").gen();
                (t + u).floor()
            }
        };
        out.push(q.clamp(-q_max, q_max) * scale);
    }

    Ok(FakeQuant {
        tensor: Tensor::new(out, x.shape().clone()),
        scale,
    })
}
