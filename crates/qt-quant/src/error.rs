use qt_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuantError {
    #[error("unsupported bit width {bits}: symmetric integer quantization supports 2..=8 bits")]
    UnsupportedBits { bits: u32 },
    #[error("stochastic rounding requires a random stream")]
    MissingRng,
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, QuantError>;
