//! Domain error types.

/// Top-level error type for barlab.
#[derive(Debug, thiserror::Error)]
pub enum BarlabError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy kind: {name}")]
    UnknownStrategy { name: String },

    #[error("unknown parameter '{key}' for strategy {strategy}")]
    UnknownParameter { strategy: String, key: String },

    #[error("invalid parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("expected {assets} weights, got {weights}")]
    WeightCountMismatch { assets: usize, weights: usize },

    #[error("weight {index} must be a finite non-negative percentage, got {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("weights must sum to 100, got {sum}")]
    WeightSum { sum: f64 },

    #[error("unsupported rebalance frequency: {value}")]
    UnsupportedFrequency { value: String },

    #[error("asset {index} has no price bars")]
    EmptyAsset { index: usize },

    #[error("asset {index} has {bars} bars, need at least {minimum}")]
    AssetLengthMismatch {
        index: usize,
        bars: usize,
        minimum: usize,
    },

    #[error("walk-forward needs at least 2 segments, got {segments}")]
    InvalidSegments { segments: usize },

    #[error("{bars} bars cannot be cut into {} walk-forward segments", .segments + 1)]
    SegmentsTooShort { bars: usize, segments: usize },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BarlabError> for std::process::ExitCode {
    fn from(err: &BarlabError) -> Self {
        let code: u8 = match err {
            BarlabError::Io(_) => 1,
            BarlabError::ConfigParse { .. }
            | BarlabError::ConfigMissing { .. }
            | BarlabError::ConfigInvalid { .. }
            | BarlabError::InvalidSegments { .. }
            | BarlabError::SegmentsTooShort { .. } => 2,
            BarlabError::Data { .. } => 3,
            BarlabError::UnknownStrategy { .. }
            | BarlabError::UnknownParameter { .. }
            | BarlabError::InvalidParameter { .. } => 4,
            BarlabError::WeightCountMismatch { .. }
            | BarlabError::InvalidWeight { .. }
            | BarlabError::WeightSum { .. }
            | BarlabError::UnsupportedFrequency { .. }
            | BarlabError::EmptyAsset { .. }
            | BarlabError::AssetLengthMismatch { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
