use anyhow::Result;
use ctrv_ukf::ctrv::predict_sigma_point;
use ctrv_ukf::ukf::{AugState, State, N_X};
use ctrv_ukf::{Estimator, MeasurementPackage, NisAudit, NisSample, SensorType, UkfConfig};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

// 1 目標あたりの周期数と周期 [us]
const STEPS: i64 = 500;
const DT_US: i64 = 50_000;
// 独立に追跡する目標の数
const TARGETS: u64 = 8;

struct Sensor {
    laser: Normal<f64>,
    r: Normal<f64>,
    phi: Normal<f64>,
    rd: Normal<f64>,
}

impl Sensor {
    fn new(config: &UkfConfig) -> Self {
        Self {
            laser: Normal::new(0.0, config.std_laspx).unwrap(),
            r: Normal::new(0.0, config.std_radr).unwrap(),
            phi: Normal::new(0.0, config.std_radphi).unwrap(),
            rd: Normal::new(0.0, config.std_radrd).unwrap(),
        }
    }

    // センサ出力をシミュレーション
    fn measure(
        &self,
        x: &State,
        t: i64,
        sensor: SensorType,
        rng: &mut Xoshiro256PlusPlus,
    ) -> MeasurementPackage {
        match sensor {
            SensorType::Laser => MeasurementPackage::laser(
                t,
                x[0] + self.laser.sample(rng),
                x[1] + self.laser.sample(rng),
            ),
            SensorType::Radar => {
                let rho = x[0].hypot(x[1]);
                let phi = x[1].atan2(x[0]);
                let rho_dot = (x[0] * x[2] * x[3].cos() + x[1] * x[2] * x[3].sin()) / rho;
                MeasurementPackage::radar(
                    t,
                    rho + self.r.sample(rng),
                    phi + self.phi.sample(rng),
                    rho_dot + self.rd.sample(rng),
                )
            }
        }
    }
}

// 真値: 加速度と角加速度をランダムに加えた CTRV
fn step_truth(x: &State, dt: f64, rng: &mut Xoshiro256PlusPlus) -> State {
    let mut aug = AugState::zeros();
    aug.fixed_rows_mut::<N_X>(0).copy_from(x);
    aug[5] = rng.gen_range(-0.3..0.3);
    aug[6] = rng.gen_range(-0.2..0.2);
    predict_sigma_point(&aug, dt)
}

struct Run {
    seed: u64,
    rmse: State,
    nis: Vec<NisSample>,
    rejected: usize,
}

fn track(seed: u64, config: &UkfConfig) -> Result<Run> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let sensor = Sensor::new(config);
    let mut ukf = Estimator::new(config.clone())?;

    let mut truth = State::new(
        rng.gen_range(5.0..20.0),
        rng.gen_range(5.0..20.0),
        rng.gen_range(1.0..6.0),
        rng.gen_range(-3.0..3.0),
        rng.gen_range(-0.3..0.3),
    );
    let mut sq = State::zeros();
    let mut nis = Vec::new();
    let mut rejected = 0;

    for i in 0..STEPS {
        if i > 0 {
            truth = step_truth(&truth, DT_US as f64 * 1e-6, &mut rng);
        }
        let kind = if i % 2 == 0 {
            SensorType::Laser
        } else {
            SensorType::Radar
        };
        let meas = sensor.measure(&truth, i * DT_US, kind, &mut rng);
        match ukf.process_measurement(&meas) {
            Ok(est) => {
                nis.extend(est.nis);
                let mut err = est.x - truth;
                err[3] = ctrv_ukf::angle::normalize_angle(err[3]);
                sq += err.component_mul(&err);
            }
            Err(e) => {
                log::warn!("target {seed}: {e}");
                rejected += 1;
            }
        }
    }

    Ok(Run {
        seed,
        rmse: (sq / STEPS as f64).map(f64::sqrt),
        nis,
        rejected,
    })
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Warn)?;
    let config = UkfConfig::default();

    // 目標ごとに独立した Estimator を並列に回す
    let runs = (0..TARGETS)
        .into_par_iter()
        .map(|seed| track(seed, &config))
        .collect::<Result<Vec<_>>>()?;

    let mut audit = NisAudit::new();
    for run in &runs {
        let r = run.rmse;
        println!(
            "target {:2}: rmse px {:6.3} py {:6.3} v {:6.3} yaw {:6.3} yawd {:6.3} (rejected {})",
            run.seed, r[0], r[1], r[2], r[3], r[4], run.rejected
        );
        for sample in &run.nis {
            audit.record(*sample);
        }
    }
    for sensor in [SensorType::Laser, SensorType::Radar] {
        if let Some(summary) = audit.summary(sensor) {
            println!("{summary}");
        }
    }
    Ok(())
}
