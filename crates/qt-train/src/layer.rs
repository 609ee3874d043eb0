use qt_einsum::{einsum, einsum_vjp, parse, resolve};
use qt_quant::{EinsumQuantConfig, Numerics, Rounding};
use qt_tensor::{ComputeBackend, Tensor};

use crate::error::Result;
use crate::rng::{RngStreams, PARAMS_STREAM, RANDOM_STREAM};
use crate::state::{LayerState, StateValue, LHS_SCALE_KEY, RHS_SCALE_KEY, TRAIN_STEP_KEY};

/// An einsum layer with simulated quantization of its operands.
///
/// The layer itself carries no tensors: operands come from the caller,
/// configuration says how each one is quantized, and all mutable
/// bookkeeping lives in an explicit `LayerState` value threaded through
/// the calls.
#[derive(Debug, Clone)]
pub struct QuantEinsum {
    config: EinsumQuantConfig,
    track_train_step: bool,
}

/// Result of one training step: the summed output, the operand gradients,
/// and the advanced state.
#[derive(Debug, Clone)]
pub struct TrainStep {
    pub loss: f32,
    pub grad_lhs: Tensor,
    pub grad_rhs: Tensor,
    pub state: LayerState,
}

impl QuantEinsum {
    pub fn new(config: EinsumQuantConfig, track_train_step: bool) -> Self {
        QuantEinsum {
            config,
            track_train_step,
        }
    }

    pub fn config(&self) -> &EinsumQuantConfig {
        &self.config
    }

    /// Build the initial state from example operands.
    ///
    /// Resolving the equation here makes a malformed equation or
    /// mismatched operand shapes fail at initialization rather than on
    /// the first forward pass. The `"params"` stream must be present; it
    /// seeds parameter initialization for layers that carry parameters.
    pub fn init(
        &self,
        rngs: &RngStreams,
        eqn: &str,
        lhs: &Tensor,
        rhs: &Tensor,
    ) -> Result<LayerState> {
        rngs.rng(PARAMS_STREAM)?;
        resolve(&parse(eqn)?, lhs.shape(), rhs.shape())?;

        let mut state = LayerState::new();
        if self.track_train_step {
            state = state.with_non_trainable(TRAIN_STEP_KEY, StateValue::Step(0));
        }
        Ok(state)
    }

    /// Forward pass: fake-quantize each operand per its configured
    /// numerics, contract, and return the output with the updated state.
    ///
    /// With `mutable` unset the input state is returned unchanged;
    /// otherwise the step counter (when tracked) advances by exactly one
    /// and the calibration scales are recorded.
    pub fn apply(
        &self,
        backend: &dyn ComputeBackend,
        state: &LayerState,
        eqn: &str,
        lhs: &Tensor,
        rhs: &Tensor,
        mutable: bool,
        rngs: &RngStreams,
    ) -> Result<(Tensor, LayerState)> {
        let (lhs_q, lhs_scale) = quantize_operand(self.config.lhs, lhs, rngs)?;
        let (rhs_q, rhs_scale) = quantize_operand(self.config.rhs, rhs, rngs)?;
        let out = einsum(backend, eqn, &lhs_q, &rhs_q)?;

        let new_state = if mutable {
            self.advance(state, lhs_scale, rhs_scale)
        } else {
            state.clone()
        };
        Ok((out, new_state))
    }

    /// One training step over the summed output.
    ///
    /// Gradients come from the einsum vector-Jacobian product evaluated
    /// at the fake-quantized operands; the grid snap itself is treated as
    /// identity for gradients (straight-through estimator), which keeps
    /// the whole step expressible as a pure differentiable function.
    pub fn value_and_grad(
        &self,
        backend: &dyn ComputeBackend,
        state: &LayerState,
        eqn: &str,
        lhs: &Tensor,
        rhs: &Tensor,
        rngs: &RngStreams,
    ) -> Result<TrainStep> {
        let (lhs_q, lhs_scale) = quantize_operand(self.config.lhs, lhs, rngs)?;
        let (rhs_q, rhs_scale) = quantize_operand(self.config.rhs, rhs, rngs)?;

        let out = einsum(backend, eqn, &lhs_q, &rhs_q)?;
        let loss = out.sum(backend)?;

        let cotangent = Tensor::ones(out.shape().clone());
        let (grad_lhs, grad_rhs) = einsum_vjp(backend, eqn, &lhs_q, &rhs_q, &cotangent)?;

        Ok(TrainStep {
            loss,
            grad_lhs,
            grad_rhs,
            state: self.advance(state, lhs_scale, rhs_scale),
        })
    }

    fn advance(
        &self,
        state: &LayerState,
        lhs_scale: Option<f32>,
        rhs_scale: Option<f32>,
    ) -> LayerState {
        let mut next = state.clone();
        if self.track_train_step {
            let step = state.train_step().unwrap_or(0) + 1;
            next = next.with_non_trainable(TRAIN_STEP_KEY, StateValue::Step(step));
        }
        if let Some(scale) = lhs_scale {
            next = next.with_non_trainable(LHS_SCALE_KEY, StateValue::Scalar(scale));
        }
        if let Some(scale) = rhs_scale {
            next = next.with_non_trainable(RHS_SCALE_KEY, StateValue::Scalar(scale));
        }
        next
    }
}

/// Fake-quantize one operand, wiring the `"random"` stream through when
/// the numerics call for stochastic rounding.
fn quantize_operand(
    numerics: Option<Numerics>,
    x: &Tensor,
    rngs: &RngStreams,
) -> Result<(Tensor, Option<f32>)> {
    let Some(numerics) = numerics else {
        return Ok((x.clone(), None));
    };

    let stochastic = matches!(
        numerics,
        Numerics::Int {
            rounding: Rounding::Stochastic,
            ..
        }
    );
    let fq = if stochastic {
        let mut rng = rngs.rng(RANDOM_STREAM)?;
        numerics.fake_quant(x, Some(&mut rng))?
    } else {
        numerics.fake_quant(x, None)?
    };
    Ok((fq.tensor, Some(fq.scale)))
}
