use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("unknown aggregation `{0}`")]
    UnknownAggregation(String),

    #[error("metric `{metric}` does not support aggregation `{aggregation}`")]
    Unsupported { metric: String, aggregation: String },

    #[error("condition `{0}` has no comparison operator")]
    MissingOperator(String),

    #[error("invalid threshold value `{0}`")]
    InvalidValue(String),

    #[error("percentile must be within 0..=100, got `{0}`")]
    InvalidPercentile(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("scenario has no stages")]
    NoStages,

    #[error("no stage targets more than zero virtual users")]
    NoVirtualUsers,

    #[error(transparent)]
    Threshold(#[from] ThresholdError),
}
