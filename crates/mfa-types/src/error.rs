// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Error Types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::ArrayD;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MfaError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Duplicate dimension letter '{0}'")]
    DuplicateDimension(char),

    #[error("Shape mismatch on dimension '{letter}': {message}")]
    ShapeMismatch { letter: char, message: String },

    #[error("Unknown item '{item}' in dimension '{letter}'")]
    UnknownItem { letter: char, item: String },

    #[error("Failed to load parameter '{name}': {message}")]
    ParameterLoadError { name: String, message: String },

    #[error("Fit failed at {location}: {message}")]
    FitFailed { location: String, message: String },

    /// `residuals` has shape `(process, rest...)`, rows ordered like `processes`.
    #[error("Mass balance violated at process '{process}': |residual| = {max_residual:.4e} > {tolerance:.4e}")]
    MassBalanceError {
        process: String,
        max_residual: f64,
        tolerance: f64,
        processes: Vec<String>,
        residuals: ArrayD<f64>,
    },

    #[error("Negative values in flow '{flow}': {count} entries, minimum {min_value:.4e}")]
    NegativeFlow {
        flow: String,
        count: usize,
        min_value: f64,
    },

    #[error("Trade dimension mismatch: {0}")]
    TradeDimensionMismatch(String),

    #[error("Trade array has no region dimension 'r': {0}")]
    MissingRegionDim(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid system state: {0}")]
    InvalidState(String),

    #[error("Linear algebra error: {0}")]
    LinAlg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("NPZ export error: {0}")]
    Npz(String),
}

impl MfaError {
    /// Process exit code for the command-line runner.
    pub fn exit_code(&self) -> i32 {
        match self {
            MfaError::MassBalanceError { .. } => 2,
            MfaError::ParameterLoadError { .. } => 3,
            _ => 1,
        }
    }
}

pub type MfaResult<T> = Result<T, MfaError>;
