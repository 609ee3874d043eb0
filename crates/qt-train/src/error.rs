use qt_einsum::EinsumError;
use qt_quant::QuantError;
use qt_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("missing rng stream '{0}'")]
    MissingRngStream(String),
    #[error("einsum error: {0}")]
    Einsum(#[from] EinsumError),
    #[error("quantization error: {0}")]
    Quant(#[from] QuantError),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, TrainError>;
