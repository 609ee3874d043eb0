//! `qt-quant` - Simulated low-bit quantization numerics for quant-train.
//!
//! This crate provides:
//! - `Numerics`: symmetric integer grids (2..=8 bits, nearest or
//!   stochastic rounding) and half-precision round-trips
//! - `fake_quant`: snap a tensor onto a reduced format while keeping f32
//!   storage, so downstream contraction stays differentiable
//! - `EinsumQuantConfig`: per-operand configuration for a two-operand
//!   contraction, validated at construction

pub mod config;
pub mod error;
pub mod numerics;

pub use config::EinsumQuantConfig;
pub use error::{QuantError, Result};
pub use numerics::{FakeQuant, Numerics, Rounding};
