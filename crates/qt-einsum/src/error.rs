use qt_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EinsumError {
    #[error("einsum equation '{0}' is missing '->'")]
    MissingArrow(String),
    #[error("einsum equation must have exactly two comma-separated operands, got {got}")]
    OperandCount { got: usize },
    #[error("invalid character '{ch}' in einsum spec '{spec}'")]
    InvalidLabel { ch: char, spec: String },
    #[error("index '{label}' appears more than once in spec '{spec}' (diagonals are not supported)")]
    RepeatedLabel { label: char, spec: String },
    #[error("output index '{label}' does not appear in any operand")]
    UnknownOutputLabel { label: char },
    #[error("spec '{spec}' has more than one ellipsis")]
    MultipleEllipses { spec: String },
    #[error("output has an ellipsis but no operand does")]
    UnexpectedOutputEllipsis,
    #[error("operand spec '{spec}' expects {expected} dimensions, tensor has {got}")]
    RankMismatch {
        spec: String,
        expected: usize,
        got: usize,
    },
    #[error("operand spec '{spec}' expects at least {named} dimensions, tensor has {got}")]
    RankTooSmall {
        spec: String,
        named: usize,
        got: usize,
    },
    #[error("size mismatch for index '{label}': {lhs} vs {rhs}")]
    SizeMismatch { label: char, lhs: usize, rhs: usize },
    #[error("ellipsis dimensions must match between operands: {lhs:?} vs {rhs:?}")]
    EllipsisMismatch { lhs: Vec<usize>, rhs: Vec<usize> },
    #[error("cotangent shape {got:?} does not match einsum output shape {expected:?}")]
    CotangentShape { expected: Vec<usize>, got: Vec<usize> },
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, EinsumError>;
