use thiserror::Error;

pub type Result<T> = std::result::Result<T, PortfolioError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Raised when an episode is constructed, never mid-episode.
    #[error("insufficient data: need at least {required} timesteps, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid market data: {message}")]
    InvalidData { message: String },

    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("action has {actual} entries, expected {expected}")]
    ActionLength { expected: usize, actual: usize },

    #[error("action entry {index} is not finite ({value})")]
    NonFiniteAction { index: usize, value: f64 },

    #[error("environment must be reset before stepping")]
    NotReset,

    #[error("episode terminated at step {step}, reset to start a new one")]
    EpisodeTerminated { step: usize },
}

impl PortfolioError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }
}
