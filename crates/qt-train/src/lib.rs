//! `qt-train` - Quantized-einsum training layer for quant-train.
//!
//! This crate provides:
//! - `QuantEinsum`: an einsum layer whose operands are fake-quantized per
//!   an `EinsumQuantConfig`, with `init` / `apply` / `value_and_grad`
//! - `LayerState`: explicit, immutable layer state (trainable parameters
//!   plus non-trainable bookkeeping such as the train-step counter)
//! - `RngStreams`: named, explicitly-passed randomness sources
//! - `init::normal`: standard-normal tensor initialization

pub mod error;
pub mod init;
pub mod layer;
pub mod rng;
pub mod state;

pub use error::{Result, TrainError};
pub use layer::{QuantEinsum, TrainStep};
pub use rng::{RngStreams, PARAMS_STREAM, RANDOM_STREAM};
pub use state::{LayerState, StateValue, LHS_SCALE_KEY, RHS_SCALE_KEY, TRAIN_STEP_KEY};
