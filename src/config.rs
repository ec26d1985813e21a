use serde::{Deserialize, Serialize};

use crate::error::{Result, UkfError};
use crate::ukf::N_AUG;

/// Tuning of the filter.
///
/// Every field has a default, so a JSON file only needs to list what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UkfConfig {
    /// Process noise std of longitudinal acceleration [m/s^2]
    pub std_a: f64,
    /// Process noise std of yaw acceleration [rad/s^2]
    pub std_yawdd: f64,
    /// Laser noise std of px [m]
    pub std_laspx: f64,
    /// Laser noise std of py [m]
    pub std_laspy: f64,
    /// Radar noise std of range [m]
    pub std_radr: f64,
    /// Radar noise std of bearing [rad]
    pub std_radphi: f64,
    /// Radar noise std of range rate [m/s]
    pub std_radrd: f64,
    /// If false, laser records only advance time (they still initialize)
    pub use_laser: bool,
    /// If false, radar records only advance time (they still initialize)
    pub use_radar: bool,
    /// Sigma point spreading parameter
    pub lambda: f64,
    /// Added to the diagonal of P when the augmented covariance fails Cholesky
    pub regularization_epsilon: f64,
    /// Smallest range used as a divisor in the radar projection [m]
    pub min_range: f64,
}

impl Default for UkfConfig {
    fn default() -> Self {
        Self {
            std_a: 0.5,
            std_yawdd: 1.0,
            std_laspx: 0.15,
            std_laspy: 0.15,
            std_radr: 0.3,
            std_radphi: 0.03,
            std_radrd: 0.3,
            use_laser: true,
            use_radar: true,
            lambda: 3.0 - N_AUG as f64,
            regularization_epsilon: 1e-6,
            min_range: 1e-4,
        }
    }
}

impl UkfConfig {
    pub fn validate(&self) -> Result<()> {
        let stds = [
            ("std_a", self.std_a),
            ("std_yawdd", self.std_yawdd),
            ("std_laspx", self.std_laspx),
            ("std_laspy", self.std_laspy),
            ("std_radr", self.std_radr),
            ("std_radphi", self.std_radphi),
            ("std_radrd", self.std_radrd),
        ];
        for (name, value) in stds {
            if !(value.is_finite() && value > 0.0) {
                return Err(UkfError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.lambda + N_AUG as f64 > 0.0) {
            return Err(UkfError::InvalidConfig(format!(
                "lambda + n_aug must be positive, got lambda = {}",
                self.lambda
            )));
        }
        if !(self.regularization_epsilon >= 0.0) {
            return Err(UkfError::InvalidConfig(
                "regularization_epsilon must not be negative".to_string(),
            ));
        }
        if !(self.min_range > 0.0) {
            return Err(UkfError::InvalidConfig(
                "min_range must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
