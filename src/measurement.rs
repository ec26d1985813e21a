use serde::{Deserialize, Serialize};

use crate::angle::normalize_angle;
use crate::config::UkfConfig;
use crate::error::{Result, UkfError};
use crate::ukf::{Cov, State};

/// Which sensor produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    /// Linear sensor measuring (px, py)
    Laser,
    /// Nonlinear sensor measuring (range, bearing, range rate)
    Radar,
}

impl SensorType {
    /// Number of raw values in a record of this sensor
    pub const fn dimension(self) -> usize {
        match self {
            SensorType::Laser => 2,
            SensorType::Radar => 3,
        }
    }
}

/// One sensor record as delivered by the measurement source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPackage {
    pub sensor_type: SensorType,
    /// Microseconds since an arbitrary epoch
    pub timestamp: i64,
    pub raw_measurements: Vec<f64>,
}

impl MeasurementPackage {
    pub fn laser(timestamp: i64, px: f64, py: f64) -> Self {
        Self {
            sensor_type: SensorType::Laser,
            timestamp,
            raw_measurements: vec![px, py],
        }
    }

    pub fn radar(timestamp: i64, rho: f64, phi: f64, rho_dot: f64) -> Self {
        Self {
            sensor_type: SensorType::Radar,
            timestamp,
            raw_measurements: vec![rho, phi, rho_dot],
        }
    }

    /// Checks the number of raw values and that all of them are finite.
    pub fn validate(&self) -> Result<()> {
        let expected = self.sensor_type.dimension();
        if self.raw_measurements.len() != expected {
            return Err(UkfError::InvalidMeasurement {
                sensor: self.sensor_type,
                reason: format!(
                    "expected {} values, got {}",
                    expected,
                    self.raw_measurements.len()
                ),
            });
        }
        if self.raw_measurements.iter().any(|v| !v.is_finite()) {
            return Err(UkfError::InvalidMeasurement {
                sensor: self.sensor_type,
                reason: "non-finite value".to_string(),
            });
        }
        Ok(())
    }

    /// Raw values as a fixed-size vector.
    pub fn z<const Z: usize>(&self) -> Result<na::SVector<f64, Z>> {
        self.validate()?;
        if self.sensor_type.dimension() != Z {
            return Err(UkfError::InvalidMeasurement {
                sensor: self.sensor_type,
                reason: format!("requested as a {Z}-vector"),
            });
        }
        Ok(na::SVector::<f64, Z>::from_column_slice(&self.raw_measurements))
    }
}

/// Observation model of one sensor with `Z` measured quantities.
pub trait MeasurementModel<const Z: usize> {
    /// Maps a predicted state into measurement space
    fn project(&self, x: &State) -> na::SVector<f64, Z>;

    /// Additive measurement noise
    fn noise_covariance(&self) -> Cov<Z>;

    /// `a - b`, wrapping any angular component
    fn residual(&self, a: &na::SVector<f64, Z>, b: &na::SVector<f64, Z>) -> na::SVector<f64, Z>;
}

/// Laser: measures position directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserModel {
    pub std_px: f64,
    pub std_py: f64,
}

impl LaserModel {
    pub fn from_config(config: &UkfConfig) -> Self {
        Self {
            std_px: config.std_laspx,
            std_py: config.std_laspy,
        }
    }
}

impl MeasurementModel<2> for LaserModel {
    fn project(&self, x: &State) -> na::Vector2<f64> {
        na::Vector2::new(x[0], x[1])
    }

    fn noise_covariance(&self) -> Cov<2> {
        Cov::<2>::from_diagonal(&na::Vector2::new(
            self.std_px * self.std_px,
            self.std_py * self.std_py,
        ))
    }

    fn residual(&self, a: &na::Vector2<f64>, b: &na::Vector2<f64>) -> na::Vector2<f64> {
        a - b
    }
}

/// Radar: measures range, bearing and range rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarModel {
    pub std_r: f64,
    pub std_phi: f64,
    pub std_rd: f64,
    /// Range rate is divided by max(r, min_range)
    pub min_range: f64,
}

impl RadarModel {
    pub fn from_config(config: &UkfConfig) -> Self {
        Self {
            std_r: config.std_radr,
            std_phi: config.std_radphi,
            std_rd: config.std_radrd,
            min_range: config.min_range,
        }
    }
}

impl MeasurementModel<3> for RadarModel {
    fn project(&self, x: &State) -> na::Vector3<f64> {
        let p_x = x[0];
        let p_y = x[1];
        let v = x[2];
        let yaw = x[3];
        let v1 = yaw.cos() * v;
        let v2 = yaw.sin() * v;

        let r = p_x.hypot(p_y);
        if r < self.min_range {
            log::trace!("radar projection near origin, range {r} clamped to {}", self.min_range);
        }
        // atan2(0, 0) = 0 なので bearing は有限のまま
        na::Vector3::new(r, p_y.atan2(p_x), (p_x * v1 + p_y * v2) / r.max(self.min_range))
    }

    fn noise_covariance(&self) -> Cov<3> {
        Cov::<3>::from_diagonal(&na::Vector3::new(
            self.std_r * self.std_r,
            self.std_phi * self.std_phi,
            self.std_rd * self.std_rd,
        ))
    }

    fn residual(&self, a: &na::Vector3<f64>, b: &na::Vector3<f64>) -> na::Vector3<f64> {
        let mut d = a - b;
        d[1] = normalize_angle(d[1]);
        d
    }
}
