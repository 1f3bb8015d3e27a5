//! Fixed-step symplectic (semi-implicit) Euler integrator.
//!
//! Semi-implicit, not explicit: velocity is advanced from the accumulated
//! force *before* position is advanced from the updated velocity. For the
//! oscillatory systems this engine exists for (springs, snap transitions)
//! that ordering is unconditionally more stable than explicit Euler.
//!
//! Per step, split across four passes driven by the engine:
//!
//! ```text
//! v ← v + dt·f/m ;  f ← 0        (integrate_velocity)
//! L ← L + dt·τ ;  τ ← 0          (integrate_angular_momentum)
//!     ω ← R I⁻¹ Rᵀ · L
//! q ← q + (dt/2)·q⊗ω             (integrate_orientation)
//! p ← p + dt·v                   (integrate_position)
//! ```
//!
//! Optional magnitude caps clamp `v` and `ω` right after their updates,
//! before positions consume them. The orientation quaternion is *not*
//! re-normalized after its update; `|q|` drifts slowly over long runs.

use crate::bodies::Dynamics;
use crate::math::{self, Vec3};

/// Symplectic Euler stepper with optional velocity caps.
#[derive(Debug, Clone, Default)]
pub struct SymplecticEuler {
    pub max_velocity: Option<f64>, // clamp |v| after the velocity kick
    pub max_angular_velocity: Option<f64>, // clamp |ω| after the momentum kick
}

impl SymplecticEuler {
    /// Kick: `v ← v + dt·f/m`, then clear the force accumulator.
    /// The cap (if any) applies here, before any position update sees `v`.
    pub fn integrate_velocity(&self, body: &mut Dynamics, dt: f64) {
        let w = body.inverse_mass();
        let p = body.linear_mut();
        p.velocity += p.force * (dt * w);
        p.clear_force();
        if let Some(cap) = self.max_velocity {
            p.velocity = math::clamp_magnitude(p.velocity, cap);
        }
    }

    /// Drift: `p ← p + dt·v`.
    pub fn integrate_position(&self, body: &mut Dynamics, dt: f64) {
        let p = body.linear_mut();
        p.position += p.velocity * dt;
    }

    /// Angular kick: `L ← L + dt·τ`, clear the torque accumulator, then
    /// derive `ω = (R I⁻¹ Rᵀ) L` in world space. No-op for point particles.
    pub fn integrate_angular_momentum(&self, body: &mut Dynamics, dt: f64) {
        let cap = self.max_angular_velocity;
        if let Some(a) = body.angular_mut() {
            a.angular_momentum += a.torque * dt;
            a.torque = Vec3::zeros();
            a.angular_velocity = a.inverse_inertia_world() * a.angular_momentum;
            if let Some(cap) = cap {
                a.angular_velocity = math::clamp_magnitude(a.angular_velocity, cap);
            }
        }
    }

    /// Orientation drift: `q ← q + (dt/2)·q⊗ω`. No-op for point particles.
    pub fn integrate_orientation(&self, body: &mut Dynamics, dt: f64) {
        if let Some(a) = body.angular_mut() {
            a.orientation = math::quat_integrate(a.orientation, a.angular_velocity, dt);
        }
    }
}
