//! Critically damped smoothing

use crate::geometry::Point2;

/// Time constants below this snap straight to the target
const MIN_SMOOTH_TIME: f32 = 1e-4;

/// Move `current` toward `target` like a critically damped spring.
///
/// `velocity` carries the spring state between calls; `smooth_time` is
/// roughly the time to reach the target. Never overshoots.
pub fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    if smooth_time < MIN_SMOOTH_TIME || dt <= 0.0 {
        *velocity = if dt > 0.0 { (target - current) / dt } else { 0.0 };
        return target;
    }

    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = target + (change + temp) * exp;

    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// [`smooth_damp`] per component
pub fn smooth_damp_point(
    current: Point2,
    target: Point2,
    velocity: &mut Point2,
    smooth_time: f32,
    dt: f32,
) -> Point2 {
    Point2::new(
        smooth_damp(current.x, target.x, &mut velocity.x, smooth_time, dt),
        smooth_damp(current.y, target.y, &mut velocity.y, smooth_time, dt),
    )
}
