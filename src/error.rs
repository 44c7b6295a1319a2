use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input for layer {layer}: {reason}")]
    InvalidInput { layer: String, reason: String },

    #[error("The {method} method must be implemented by layer {layer}")]
    NotImplemented { layer: String, method: &'static str },

    #[error("The Layer API does not allow to use the method: `{0}`")]
    ForbiddenOperation(&'static str),

    #[error("Argument given to {layer} should be formatted as a mapping, got {found}")]
    ArgumentShape { layer: String, found: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Layer {0} has no outputs")]
    MissingOutputs(String),

    #[error("Unsupported activation: {0}")]
    UnsupportedActivation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
