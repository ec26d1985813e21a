//! Normalized innovation squared (NIS) bookkeeping.
//!
//! For a consistent filter the NIS of an n-dimensional measurement follows a
//! χ² distribution with n degrees of freedom, so roughly 5 % of the samples
//! should lie above the 95 % quantile.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::measurement::SensorType;

/// 95 % quantile of the χ² distribution for 1..=3 degrees of freedom.
pub fn chi2_95(dof: usize) -> Option<f64> {
    match dof {
        1 => Some(3.841),
        2 => Some(5.991),
        3 => Some(7.815),
        _ => None,
    }
}

/// NIS of one update, tagged with the sensor that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NisSample {
    pub sensor: SensorType,
    pub value: f64,
}

impl NisSample {
    pub fn exceeds_95(&self) -> bool {
        chi2_95(self.sensor.dimension()).is_some_and(|t| self.value > t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NisSummary {
    pub sensor: SensorType,
    pub count: usize,
    pub mean: f64,
    pub fraction_above_95: f64,
}

impl fmt::Display for NisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: n = {:5}, mean NIS = {:7.3}, above 95% = {:5.1}%",
            self.sensor,
            self.count,
            self.mean,
            100.0 * self.fraction_above_95
        )
    }
}

/// Collects NIS samples per sensor for offline consistency checks.
#[derive(Debug, Clone, Default)]
pub struct NisAudit {
    laser: Vec<f64>,
    radar: Vec<f64>,
}

impl NisAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: NisSample) {
        match sample.sensor {
            SensorType::Laser => self.laser.push(sample.value),
            SensorType::Radar => self.radar.push(sample.value),
        }
    }

    pub fn samples(&self, sensor: SensorType) -> &[f64] {
        match sensor {
            SensorType::Laser => &self.laser,
            SensorType::Radar => &self.radar,
        }
    }

    /// `None` until the sensor has produced at least one update.
    pub fn summary(&self, sensor: SensorType) -> Option<NisSummary> {
        let samples = self.samples(sensor);
        if samples.is_empty() {
            return None;
        }
        let threshold = chi2_95(sensor.dimension())?;
        let count = samples.len();
        let above = samples.iter().filter(|&&v| v > threshold).count();
        Some(NisSummary {
            sensor,
            count,
            mean: samples.iter().sum::<f64>() / count as f64,
            fraction_above_95: above as f64 / count as f64,
        })
    }
}
