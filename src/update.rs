use crate::angle::normalize_angle;
use crate::error::{Result, UkfError};
use crate::measurement::MeasurementModel;
use crate::ukf::{state_diff, Cov, Sigma, State, Weights, N_SIGMA, N_X, YAW};

/// Corrected state of one update cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub x: State,
    pub p: Cov<N_X>,
    /// Normalized innovation squared
    pub nis: f64,
}

/// Corrects a prediction with the observation `z` seen through `model`.
pub fn update<M, const Z: usize>(
    model: &M,
    sigma_pred: &Sigma<N_X>,
    x_pred: &State,
    p_pred: &Cov<N_X>,
    w: &Weights,
    z: &na::SVector<f64, Z>,
) -> Result<UpdateOutcome>
where
    M: MeasurementModel<Z>,
{
    // 観測空間へ
    let mut sigma_z = na::SMatrix::<f64, Z, N_SIGMA>::zeros();
    for i in 0..N_SIGMA {
        sigma_z.set_column(i, &model.project(&sigma_pred.column(i).into_owned()));
    }
    let z_pred = sigma_z * w;

    let mut s = model.noise_covariance();
    let mut tc = na::SMatrix::<f64, N_X, Z>::zeros();
    for i in 0..N_SIGMA {
        let z_diff = model.residual(&sigma_z.column(i).into_owned(), &z_pred);
        let x_diff = state_diff(&sigma_pred.column(i).into_owned(), x_pred);
        s += w[i] * z_diff * z_diff.transpose();
        tc += w[i] * x_diff * z_diff.transpose();
    }

    let s_inv = s
        .try_inverse()
        .filter(|m| m.iter().all(|v| v.is_finite()))
        .ok_or(UkfError::SingularInnovationCovariance)?;
    let k = tc * s_inv;

    let z_diff = model.residual(z, &z_pred);
    let mut x = x_pred + k * z_diff;
    x[YAW] = normalize_angle(x[YAW]);

    let p = p_pred - k * s * k.transpose();
    // 対称性の維持
    let p = (p + p.transpose()) / 2.0;

    let nis = (z_diff.transpose() * s_inv * z_diff)[(0, 0)];

    Ok(UpdateOutcome { x, p, nis })
}
