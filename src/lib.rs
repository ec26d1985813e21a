//! Unscented Kalman filter with a constant turn rate and velocity (CTRV)
//! motion model, fusing laser (position) and radar (range, bearing, range
//! rate) records into one estimate of [px, py, v, yaw, yaw_rate].

extern crate nalgebra as na;

pub mod angle;
pub mod config;
pub mod ctrv;
pub mod error;
pub mod estimator;
pub mod measurement;
pub mod nis;
pub mod ukf;
pub mod update;

pub use config::UkfConfig;
pub use error::{Result, UkfError};
pub use estimator::{Estimate, Estimator, Prediction};
pub use measurement::{MeasurementModel, MeasurementPackage, SensorType};
pub use nis::{NisAudit, NisSample};
