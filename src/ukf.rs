use crate::angle::normalize_angle;
use crate::error::{Result, UkfError};

/// State dimension: [px, py, v, yaw, yaw_rate]
pub const N_X: usize = 5;
/// Augmented dimension: state + longitudinal / yaw acceleration noise
pub const N_AUG: usize = 7;
/// Number of sigma points
pub const N_SIGMA: usize = 2 * N_AUG + 1;
/// Index of yaw in the state vector
pub const YAW: usize = 3;

/// Type for state vectors
pub type State = na::SVector<f64, N_X>;
/// Type for augmented state vectors
pub type AugState = na::SVector<f64, N_AUG>;
/// Type for covariance matrices of dimension NxN
pub type Cov<const N: usize> = na::SMatrix<f64, N, N>;
/// Type for sigma point matrices with S rows
pub type Sigma<const S: usize> = na::SMatrix<f64, S, N_SIGMA>;
/// Type for sigma point weights
pub type Weights = na::SVector<f64, N_SIGMA>;

/// Standard deviations of the process noise terms appended to the state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessNoise {
    pub std_a: f64,
    pub std_yawdd: f64,
}

/// Weights for 2·n_aug+1 sigma points with spreading parameter `lambda`.
pub fn sigma_weight(lambda: f64) -> Weights {
    let c = lambda + N_AUG as f64;
    let mut w = Weights::from_element(0.5 / c);
    w[0] = lambda / c;
    w
}

/// Augmented sigma points: column 0 is the mean, columns 1..=7 and 8..=14 are
/// mean ± sqrt(lambda + n_aug) times the columns of the Cholesky factor.
pub fn augmented_sigma_points(
    x: &State,
    p: &Cov<N_X>,
    noise: ProcessNoise,
    lambda: f64,
) -> Result<Sigma<N_AUG>> {
    let mut x_aug = AugState::zeros();
    x_aug.fixed_rows_mut::<N_X>(0).copy_from(x);

    let mut p_aug = Cov::<N_AUG>::zeros();
    p_aug.fixed_view_mut::<N_X, N_X>(0, 0).copy_from(p);
    p_aug[(5, 5)] = noise.std_a * noise.std_a;
    p_aug[(6, 6)] = noise.std_yawdd * noise.std_yawdd;

    let l = p_aug
        .cholesky()
        .ok_or(UkfError::NonPositiveDefiniteCovariance)?
        .l();
    let scale = (lambda + N_AUG as f64).sqrt();

    let mut sigma = Sigma::<N_AUG>::zeros();
    sigma.set_column(0, &x_aug);
    for i in 0..N_AUG {
        sigma.set_column(1 + i, &(x_aug + scale * l.column(i)));
        sigma.set_column(1 + N_AUG + i, &(x_aug - scale * l.column(i)));
    }
    // NaN を含む P は cholesky を通り抜けることがある
    if sigma.iter().any(|v| !v.is_finite()) {
        return Err(UkfError::NonPositiveDefiniteCovariance);
    }
    Ok(sigma)
}

/// Collapses predicted sigma points into a mean and covariance.
///
/// Yaw differences are taken on the circle, and the resulting mean yaw is
/// wrapped into (-π, π].
pub fn predict_mean_and_covariance(sigma: &Sigma<N_X>, w: &Weights) -> (State, Cov<N_X>) {
    let mut x = sigma * w;

    let mut p = Cov::<N_X>::zeros();
    for i in 0..N_SIGMA {
        let d = state_diff(&sigma.column(i).into_owned(), &x);
        p += w[i] * d * d.transpose();
    }
    x[YAW] = normalize_angle(x[YAW]);
    // 対称性の維持
    let p = (p + p.transpose()) / 2.0;
    (x, p)
}

/// `a - b` with the yaw component wrapped.
pub fn state_diff(a: &State, b: &State) -> State {
    let mut d = a - b;
    d[YAW] = normalize_angle(d[YAW]);
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    const NOISE: ProcessNoise = ProcessNoise {
        std_a: 0.5,
        std_yawdd: 1.0,
    };

    #[test]
    fn test_weights_sum_to_one() {
        for lambda in [-4.0, -2.5, 0.0, 1.0, 3.0, 10.0] {
            let w = sigma_weight(lambda);
            assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(w[0], lambda / (lambda + 7.0), epsilon = 1e-15);
            for i in 1..N_SIGMA {
                assert_relative_eq!(w[i], 0.5 / (lambda + 7.0), epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_sigma_points_layout() {
        let x = State::new(5.7441, 1.38, 2.2049, 0.5015, 0.3528);
        let p = na::matrix![
            0.0043, -0.0013, 0.0030, -0.0022, -0.0020;
            -0.0013, 0.0077, 0.0011, 0.0071, 0.0060;
            0.0030, 0.0011, 0.0054, 0.0007, 0.0008;
            -0.0022, 0.0071, 0.0007, 0.0098, 0.0100;
            -0.0020, 0.0060, 0.0008, 0.0100, 0.0123;
        ];
        let sigma = augmented_sigma_points(&x, &p, NOISE, -4.0).unwrap();

        for r in 0..N_X {
            assert_relative_eq!(sigma[(r, 0)], x[r]);
        }
        assert_eq!(sigma[(5, 0)], 0.0);
        assert_eq!(sigma[(6, 0)], 0.0);

        // mean ± symmetric
        for i in 1..=N_AUG {
            let plus = sigma.column(i) - sigma.column(0);
            let minus = sigma.column(i + N_AUG) - sigma.column(0);
            assert_relative_eq!(plus, -minus, epsilon = 1e-12);
        }

        // 既知の値 (px の +方向の最初の列)
        assert_relative_eq!(
            sigma[(0, 1)],
            5.7441 + (3.0 * 0.0043_f64).sqrt(),
            epsilon = 1e-9
        );
        // ノイズ列は独立
        assert_relative_eq!(sigma[(5, 6)], 3.0_f64.sqrt() * 0.5, epsilon = 1e-12);
        assert_relative_eq!(sigma[(6, 14)], -(3.0_f64.sqrt()), epsilon = 1e-12);
    }

    #[test]
    fn test_recombined_mean_is_augmented_mean() {
        let x = State::new(1.0, -2.0, 3.0, 0.4, -0.1);
        let p = Cov::<N_X>::from_diagonal(&State::new(0.3, 0.2, 1.5, 0.1, 0.05));
        for lambda in [-4.0, 0.0, 2.0] {
            let sigma = augmented_sigma_points(&x, &p, NOISE, lambda).unwrap();
            let mean = sigma * sigma_weight(lambda);
            for r in 0..N_X {
                assert_relative_eq!(mean[r], x[r], epsilon = 1e-12);
            }
            assert_relative_eq!(mean[5], 0.0, epsilon = 1e-12);
            assert_relative_eq!(mean[6], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_not_positive_definite() {
        let x = State::zeros();
        let mut p = Cov::<N_X>::identity();
        p[(2, 2)] = -1.0;
        assert_eq!(
            augmented_sigma_points(&x, &p, NOISE, -4.0),
            Err(UkfError::NonPositiveDefiniteCovariance)
        );

        let mut p = Cov::<N_X>::identity();
        p[(0, 0)] = f64::NAN;
        assert!(augmented_sigma_points(&x, &p, NOISE, -4.0).is_err());
    }

    #[test]
    fn test_predicted_mean_yaw_is_wrapped() {
        // π を越えて連続に伸びた yaw
        let mut sigma = Sigma::<N_X>::zeros();
        for i in 0..N_SIGMA {
            let offset = if i == 0 {
                0.0
            } else if i <= N_AUG {
                0.01
            } else {
                -0.01
            };
            sigma[(YAW, i)] = PI + 0.3 + offset;
        }
        let w = sigma_weight(-4.0);
        let (x, p) = predict_mean_and_covariance(&sigma, &w);
        assert_relative_eq!(x[YAW], -PI + 0.3, epsilon = 1e-9);
        assert_relative_eq!(p[(YAW, YAW)], 14.0 / 6.0 * 1e-4, epsilon = 1e-10);
        assert_relative_eq!(p, p.transpose(), epsilon = 1e-15);
    }
}
