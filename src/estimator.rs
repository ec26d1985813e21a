use serde::Serialize;

use crate::config::UkfConfig;
use crate::ctrv::predict_sigma_points;
use crate::error::{Result, UkfError};
use crate::measurement::{LaserModel, MeasurementPackage, RadarModel, SensorType};
use crate::nis::NisSample;
use crate::ukf::{
    augmented_sigma_points, predict_mean_and_covariance, sigma_weight, Cov, ProcessNoise, Sigma,
    State, Weights, N_X,
};
use crate::update::update;

/// Output of a prediction step.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted sigma points
    pub sigma: Sigma<N_X>,
    pub x: State,
    pub p: Cov<N_X>,
}

/// What the filter believes after a processed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub timestamp: i64,
    pub x: State,
    pub p: Cov<N_X>,
    /// Only set when the record went through an update
    pub nis: Option<NisSample>,
}

/// CTRV unscented Kalman filter fusing laser and radar records.
///
/// The first record initializes the state. Every later record runs a
/// prediction over the elapsed time followed by an update with the sensor's
/// model. A cycle either completes or leaves the filter untouched.
#[derive(Debug, Clone)]
pub struct Estimator {
    config: UkfConfig,
    laser: LaserModel,
    radar: RadarModel,
    w: Weights,
    x: State,
    p: Cov<N_X>,
    sigma_pred: Sigma<N_X>,
    // None の間は未初期化
    last_timestamp: Option<i64>,
}

impl Default for Estimator {
    fn default() -> Self {
        Self::build(UkfConfig::default())
    }
}

impl Estimator {
    pub fn new(config: UkfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: UkfConfig) -> Self {
        Self {
            laser: LaserModel::from_config(&config),
            radar: RadarModel::from_config(&config),
            w: sigma_weight(config.lambda),
            x: State::zeros(),
            p: Cov::<N_X>::identity(),
            sigma_pred: Sigma::<N_X>::zeros(),
            last_timestamp: None,
            config,
        }
    }

    /// Back to the uninitialized state with P = I.
    pub fn reset(&mut self) {
        *self = Self::build(self.config.clone());
    }

    pub fn is_initialized(&self) -> bool {
        self.last_timestamp.is_some()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    // 推定した状態を返す
    pub fn state(&self) -> State {
        self.x
    }

    pub fn covariance(&self) -> Cov<N_X> {
        self.p
    }

    /// Sigma points of the most recent prediction.
    pub fn sigma_points(&self) -> &Sigma<N_X> {
        &self.sigma_pred
    }

    pub fn weights(&self) -> &Weights {
        &self.w
    }

    pub fn config(&self) -> &UkfConfig {
        &self.config
    }

    /// Feeds one record. Records must arrive in strictly increasing time order.
    pub fn process_measurement(&mut self, meas: &MeasurementPackage) -> Result<Estimate> {
        meas.validate()?;

        let Some(previous) = self.last_timestamp else {
            self.initialize(meas);
            return Ok(self.estimate(None));
        };

        if meas.timestamp <= previous {
            log::warn!(
                "rejecting {:?} record: timestamp {} does not follow {}",
                meas.sensor_type,
                meas.timestamp,
                previous
            );
            return Err(UkfError::NonMonotonicTimestamp {
                previous,
                current: meas.timestamp,
            });
        }
        let dt = (meas.timestamp - previous) as f64 / 1_000_000.0;

        let prediction = self.predict(dt)?;
        let (x, p, nis) = match meas.sensor_type {
            SensorType::Laser if self.config.use_laser => {
                let out = update(
                    &self.laser,
                    &prediction.sigma,
                    &prediction.x,
                    &prediction.p,
                    &self.w,
                    &meas.z::<2>()?,
                )?;
                (out.x, out.p, Some(out.nis))
            }
            SensorType::Radar if self.config.use_radar => {
                let out = update(
                    &self.radar,
                    &prediction.sigma,
                    &prediction.x,
                    &prediction.p,
                    &self.w,
                    &meas.z::<3>()?,
                )?;
                (out.x, out.p, Some(out.nis))
            }
            sensor => {
                log::trace!("{sensor:?} disabled, prediction only");
                (prediction.x, prediction.p, None)
            }
        };

        self.x = x;
        self.p = p;
        self.sigma_pred = prediction.sigma;
        self.last_timestamp = Some(meas.timestamp);

        let nis = nis.map(|value| NisSample {
            sensor: meas.sensor_type,
            value,
        });
        if let Some(sample) = nis {
            log::debug!("t = {}: NIS {:?} = {:.3}", meas.timestamp, sample.sensor, sample.value);
        }
        Ok(self.estimate(nis))
    }

    /// Predicts the state `dt` seconds ahead without touching the filter.
    ///
    /// If the augmented covariance fails the Cholesky factorization, P is
    /// regularized once by `regularization_epsilon` on the diagonal.
    pub fn predict(&self, dt: f64) -> Result<Prediction> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(UkfError::InvalidTimeStep(dt));
        }
        let noise = ProcessNoise {
            std_a: self.config.std_a,
            std_yawdd: self.config.std_yawdd,
        };
        let sigma_aug = match augmented_sigma_points(&self.x, &self.p, noise, self.config.lambda) {
            Err(UkfError::NonPositiveDefiniteCovariance) => {
                let eps = self.config.regularization_epsilon;
                log::warn!("covariance not positive definite, retrying with {eps:e} on the diagonal");
                let p_reg = self.p + Cov::<N_X>::identity() * eps;
                augmented_sigma_points(&self.x, &p_reg, noise, self.config.lambda)?
            }
            result => result?,
        };

        let sigma = predict_sigma_points(&sigma_aug, dt);
        let (x, p) = predict_mean_and_covariance(&sigma, &self.w);
        Ok(Prediction { sigma, x, p })
    }

    fn initialize(&mut self, meas: &MeasurementPackage) {
        let z = &meas.raw_measurements;
        self.x = match meas.sensor_type {
            SensorType::Radar => {
                let (rho, phi, rho_dot) = (z[0], z[1], z[2]);
                let vx = rho_dot * phi.cos();
                let vy = rho_dot * phi.sin();
                // 向きは未知なので速さだけ使う
                State::new(rho * phi.cos(), rho * phi.sin(), vx.hypot(vy), 0.0, 0.0)
            }
            SensorType::Laser => State::new(z[0], z[1], 0.0, 0.0, 0.0),
        };
        self.last_timestamp = Some(meas.timestamp);
        log::debug!(
            "initialized from {:?} at t = {}: x = {:?}",
            meas.sensor_type,
            meas.timestamp,
            self.x.as_slice()
        );
    }

    fn estimate(&self, nis: Option<NisSample>) -> Estimate {
        Estimate {
            timestamp: self.last_timestamp.unwrap_or_default(),
            x: self.x,
            p: self.p,
            nis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initialize_from_laser() {
        let mut ukf = Estimator::default();
        assert!(!ukf.is_initialized());
        let est = ukf
            .process_measurement(&MeasurementPackage::laser(42, 1.5, -0.5))
            .unwrap();
        assert!(ukf.is_initialized());
        assert_eq!(est.timestamp, 42);
        assert_eq!(est.x, State::new(1.5, -0.5, 0.0, 0.0, 0.0));
        assert_eq!(est.p, Cov::<N_X>::identity());
        assert!(est.nis.is_none());
    }

    #[test]
    fn test_initialize_from_radar_with_speed_seed() {
        let mut ukf = Estimator::default();
        let phi = 0.6_f64;
        let est = ukf
            .process_measurement(&MeasurementPackage::radar(0, 2.0, phi, -1.5))
            .unwrap();
        assert_relative_eq!(est.x[0], 2.0 * phi.cos(), epsilon = 1e-12);
        assert_relative_eq!(est.x[1], 2.0 * phi.sin(), epsilon = 1e-12);
        assert_relative_eq!(est.x[2], 1.5, epsilon = 1e-12);
        assert_eq!(est.x[3], 0.0);
        assert_eq!(est.x[4], 0.0);
    }

    #[test]
    fn test_rejects_stale_timestamp() {
        let mut ukf = Estimator::default();
        ukf.process_measurement(&MeasurementPackage::laser(1_000, 1.0, 1.0))
            .unwrap();
        let before = (ukf.state(), ukf.covariance());
        for t in [1_000, 999] {
            let err = ukf
                .process_measurement(&MeasurementPackage::laser(t, 2.0, 2.0))
                .unwrap_err();
            assert_eq!(
                err,
                UkfError::NonMonotonicTimestamp {
                    previous: 1_000,
                    current: t
                }
            );
        }
        assert_eq!((ukf.state(), ukf.covariance()), before);
        assert_eq!(ukf.last_timestamp(), Some(1_000));
    }

    #[test]
    fn test_rejects_malformed_record_before_init() {
        let mut ukf = Estimator::default();
        let bad = MeasurementPackage {
            sensor_type: SensorType::Radar,
            timestamp: 0,
            raw_measurements: vec![1.0, 0.0],
        };
        assert!(matches!(
            ukf.process_measurement(&bad),
            Err(UkfError::InvalidMeasurement { .. })
        ));
        assert!(!ukf.is_initialized());
    }

    #[test]
    fn test_predict_rejects_negative_dt() {
        let ukf = Estimator::default();
        assert_eq!(ukf.predict(-0.1), Err(UkfError::InvalidTimeStep(-0.1)));
        assert!(ukf.predict(f64::NAN).is_err());
    }

    #[test]
    fn test_regularizes_semidefinite_covariance() {
        let mut ukf = Estimator::default();
        ukf.process_measurement(&MeasurementPackage::laser(0, 1.0, 1.0))
            .unwrap();
        // 特異な P (v と yaw_rate の分散が 0)
        ukf.p = Cov::<N_X>::from_diagonal(&State::new(1.0, 1.0, 0.0, 1.0, 0.0));
        let prediction = ukf.predict(0.1).unwrap();
        assert!(prediction.x.iter().all(|v| v.is_finite()));
        assert!(prediction.p.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_unrecoverable_covariance_holds_state() {
        let mut ukf = Estimator::default();
        ukf.process_measurement(&MeasurementPackage::laser(0, 1.0, 1.0))
            .unwrap();
        ukf.p[(2, 2)] = -10.0;
        let x = ukf.state();
        let err = ukf
            .process_measurement(&MeasurementPackage::laser(100_000, 1.1, 1.0))
            .unwrap_err();
        assert_eq!(err, UkfError::NonPositiveDefiniteCovariance);
        assert_eq!(ukf.state(), x);
        assert_eq!(ukf.last_timestamp(), Some(0));
    }

    #[test]
    fn test_reset() {
        let mut ukf = Estimator::default();
        ukf.process_measurement(&MeasurementPackage::laser(0, 1.0, 1.0))
            .unwrap();
        ukf.process_measurement(&MeasurementPackage::laser(50_000, 1.1, 1.0))
            .unwrap();
        ukf.reset();
        assert!(!ukf.is_initialized());
        assert_eq!(ukf.state(), State::zeros());
        assert_eq!(ukf.covariance(), Cov::<N_X>::identity());
    }

    #[test]
    fn test_invalid_config() {
        let config = UkfConfig {
            std_a: -1.0,
            ..Default::default()
        };
        assert!(Estimator::new(config).is_err());
    }
}
