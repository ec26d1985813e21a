//! Constant turn rate and velocity (CTRV) motion model.

use crate::ukf::{AugState, Sigma, State, N_AUG, N_SIGMA, N_X};

/// Below this yaw rate the straight-line equations are used.
pub const MIN_YAW_RATE: f64 = 1e-3;

/// Propagates one augmented sigma point by `dt` seconds.
pub fn predict_sigma_point(x_aug: &AugState, dt: f64) -> State {
    let p_x = x_aug[0];
    let p_y = x_aug[1];
    let v = x_aug[2];
    let yaw = x_aug[3];
    let yawd = x_aug[4];
    let nu_a = x_aug[5];
    let nu_yawdd = x_aug[6];

    // ゼロ割を避ける
    let (mut px_p, mut py_p) = if yawd.abs() > MIN_YAW_RATE {
        (
            p_x + v / yawd * ((yaw + yawd * dt).sin() - yaw.sin()),
            p_y + v / yawd * (yaw.cos() - (yaw + yawd * dt).cos()),
        )
    } else {
        (p_x + v * dt * yaw.cos(), p_y + v * dt * yaw.sin())
    };
    let mut v_p = v;
    let mut yaw_p = yaw + yawd * dt;
    let mut yawd_p = yawd;

    // プロセスノイズ
    let dt2 = dt * dt;
    px_p += 0.5 * nu_a * dt2 * yaw.cos();
    py_p += 0.5 * nu_a * dt2 * yaw.sin();
    v_p += nu_a * dt;
    yaw_p += 0.5 * nu_yawdd * dt2;
    yawd_p += nu_yawdd * dt;

    State::new(px_p, py_p, v_p, yaw_p, yawd_p)
}

/// Propagates every column of an augmented sigma point matrix.
pub fn predict_sigma_points(sigma_aug: &Sigma<N_AUG>, dt: f64) -> Sigma<N_X> {
    let mut sigma_pred = Sigma::<N_X>::zeros();
    for i in 0..N_SIGMA {
        sigma_pred.set_column(i, &predict_sigma_point(&sigma_aug.column(i).into_owned(), dt));
    }
    sigma_pred
}
