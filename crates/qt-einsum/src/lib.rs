//! `qt-einsum` - Einsum notation and contraction engine for quant-train.
//!
//! This crate provides:
//! - Parsing of two-operand einsum equations with ellipsis support
//! - Resolution of equations against concrete shapes and a contraction
//!   plan that lowers onto a (batched) matmul `ComputeBackend` kernel
//! - Reverse-mode vector-Jacobian products for both operands

pub mod contract;
pub mod equation;
pub mod error;
pub mod plan;
pub mod vjp;

pub use contract::einsum;
pub use equation::{parse, Equation, OperandSpec};
pub use error::{EinsumError, Result};
pub use plan::{resolve, ResolvedEquation};
pub use vjp::einsum_vjp;
