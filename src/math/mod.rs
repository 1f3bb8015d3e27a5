//! Math primitives for the physics core.
//!
//! Thin layer over `nalgebra`:
//! - `Vec3` / `Mat3` / `Quat` type aliases used by every module above this one
//! - helpers for the handful of operations the engine needs beyond plain
//!   operator arithmetic (safe normalization, principal-axis rotations,
//!   quaternion <-> rotation-matrix conversion, the orientation kick)
//!
//! Everything here returns owned values. The engine is single-threaded and
//! strictly sequential, but no function hands out references into shared
//! scratch storage; callers may hold results across any number of calls.

use nalgebra::{Matrix3, Quaternion, Vector3};

pub type Vec3 = Vector3<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Quat = Quaternion<f64>;

/// Lengths below this are treated as degenerate by [`normalize_or_axis`].
pub const NORMALIZE_EPSILON: f64 = 1e-7;

/// Scale `v` to magnitude `length`.
///
/// A near-zero input has no usable direction, so the result falls back to
/// `[length, 0, 0]` instead of dividing by ~0. No input makes this return
/// a non-finite vector (for finite `length`).
pub fn normalize_or_axis(v: Vec3, length: f64) -> Vec3 {
    let norm = v.norm();
    if norm < NORMALIZE_EPSILON {
        // Degenerate direction, fall back to the x axis
        return Vec3::new(length, 0.0, 0.0);
    }
    v * (length / norm)
}

/// Rotate `v` about the x axis by `theta` radians (clockwise looking down +x).
pub fn rotate_x(v: Vec3, theta: f64) -> Vec3 {
    let (sin, cos) = theta.sin_cos();
    Vec3::new(
        v.x,
        v.y * cos - v.z * sin,
        v.y * sin + v.z * cos,
    )
}

/// Rotate `v` about the y axis by `theta` radians.
pub fn rotate_y(v: Vec3, theta: f64) -> Vec3 {
    let (sin, cos) = theta.sin_cos();
    Vec3::new(
        v.x * cos + v.z * sin,
        v.y,
        -v.x * sin + v.z * cos,
    )
}

/// Rotate `v` about the z axis by `theta` radians.
pub fn rotate_z(v: Vec3, theta: f64) -> Vec3 {
    let (sin, cos) = theta.sin_cos();
    Vec3::new(
        v.x * cos - v.y * sin,
        v.x * sin + v.y * cos,
        v.z,
    )
}

/// Project `v` onto `onto`. Returns the zero vector when `onto` is degenerate.
pub fn project(v: Vec3, onto: Vec3) -> Vec3 {
    let d2 = onto.dot(&onto);
    if d2 < NORMALIZE_EPSILON * NORMALIZE_EPSILON {
        return Vec3::zeros();
    }
    onto * (v.dot(&onto) / d2)
}

/// Build a unit quaternion from a rotation of `angle` radians about `axis`.
///
/// `axis` need not be normalized; a degenerate axis falls back to x per
/// [`normalize_or_axis`], so the result is always a valid unit quaternion.
pub fn quat_from_angle_axis(angle: f64, axis: Vec3) -> Quat {
    let n = normalize_or_axis(axis, 1.0);
    let half = 0.5 * angle;
    let (sin, cos) = half.sin_cos();
    Quat::new(cos, n.x * sin, n.y * sin, n.z * sin)
}

/// Convert a unit quaternion to a 3x3 rotation matrix.
///
/// Standard `1-2y²-2z², 2xy-2zw, ...` layout, row-major storage in the sense
/// that `quat_to_matrix(q) * v` rotates `v` by `q`. The off-diagonal signs
/// here fix the handedness for the whole crate; `quat_to_transform` and the
/// integrator both derive from this one function.
pub fn quat_to_matrix(q: Quat) -> Mat3 {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);

    Mat3::new(
        1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz),       2.0 * (xz + wy),
        2.0 * (xy + wz),       1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx),
        2.0 * (xz - wy),       2.0 * (yz + wx),       1.0 - 2.0 * (xx + yy),
    )
}

/// Build a 16-element column-major affine transform from an orientation and
/// a translation. This is the exact shape an external render step consumes:
/// columns are the rotated basis vectors, the fourth column the translation.
pub fn quat_to_transform(q: Quat, translation: Vec3) -> [f64; 16] {
    let r = quat_to_matrix(q);
    [
        r[(0, 0)], r[(1, 0)], r[(2, 0)], 0.0,
        r[(0, 1)], r[(1, 1)], r[(2, 1)], 0.0,
        r[(0, 2)], r[(1, 2)], r[(2, 2)], 0.0,
        translation.x, translation.y, translation.z, 1.0,
    ]
}

/// One orientation kick of the symplectic step: `q + (dt/2) * q ⊗ ω`,
/// treating the angular velocity as the pure quaternion `(0, ω)`.
///
/// No re-normalization is performed here; over long runs `|q|` drifts from 1.
/// Consumers that need an exact rotation should renormalize on read.
pub fn quat_integrate(q: Quat, omega: Vec3, dt: f64) -> Quat {
    let omega_q = Quat::new(0.0, omega.x, omega.y, omega.z);
    let dq = q * omega_q;
    Quat::new(
        q.w + 0.5 * dt * dq.w,
        q.i + 0.5 * dt * dq.i,
        q.j + 0.5 * dt * dq.j,
        q.k + 0.5 * dt * dq.k,
    )
}

/// Central-difference gradient of a scalar field at `p` with step `epsilon`.
/// Used by the implicit surface/curve constraints as a numeric Jacobian.
pub fn gradient(f: &dyn Fn(Vec3) -> f64, p: Vec3, epsilon: f64) -> Vec3 {
    let inv = 0.5 / epsilon;
    Vec3::new(
        (f(p + Vec3::new(epsilon, 0.0, 0.0)) - f(p - Vec3::new(epsilon, 0.0, 0.0))) * inv,
        (f(p + Vec3::new(0.0, epsilon, 0.0)) - f(p - Vec3::new(0.0, epsilon, 0.0))) * inv,
        (f(p + Vec3::new(0.0, 0.0, epsilon)) - f(p - Vec3::new(0.0, 0.0, epsilon))) * inv,
    )
}

/// Clamp `v` to magnitude at most `cap`. Direction is preserved.
pub fn clamp_magnitude(v: Vec3, cap: f64) -> Vec3 {
    let norm = v.norm();
    if norm > cap && norm > 0.0 {
        v * (cap / norm)
    } else {
        v
    }
}
