use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {distribution} distribution: {reason}")]
    InvalidDistribution {
        distribution: &'static str,
        reason: String,
    },

    #[error("Invalid confounding prior Beta({alpha}, {beta}): both parameters must be > 0")]
    InvalidPrior { alpha: f64, beta: f64 },

    #[error("Confounding prior override must be a beta distribution, got '{kind}'")]
    PriorNotBeta { kind: &'static str },

    #[error("Invalid table '{table}': {reason}")]
    InvalidTable { table: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Capability unavailable: {capability}")]
    CapabilityUnavailable { capability: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
