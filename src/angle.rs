use std::f64::consts::{PI, TAU};

/// Wraps an angle into (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid は [-π, π) を返すので -π だけ π に寄せる
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}
