use thiserror::Error;

use crate::measurement::SensorType;

/// Failure conditions of a single filter cycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UkfError {
    #[error("augmented covariance is not positive definite")]
    NonPositiveDefiniteCovariance,

    #[error("innovation covariance is singular")]
    SingularInnovationCovariance,

    #[error("non-monotonic timestamp: {current} does not follow {previous}")]
    NonMonotonicTimestamp { previous: i64, current: i64 },

    #[error("time step must be finite and not negative, got {0}")]
    InvalidTimeStep(f64),

    #[error("invalid {sensor:?} measurement: {reason}")]
    InvalidMeasurement { sensor: SensorType, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, UkfError>;
