//! Error types for configuration-time validation.
//!
//! The engine itself never returns errors from the hot path: unknown ids are
//! no-op detaches, empty target sets are no-op applies, and numeric blowups
//! are quarantined by putting the offending body to sleep. Everything that
//! *can* be rejected is rejected here, at construction or attach time.

use thiserror::Error;

/// Errors raised while constructing bodies, agents, or scenarios.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// Mass must be positive and finite; anything else would produce a
    /// non-finite inverse mass that poisons every downstream computation.
    #[error("mass must be positive and finite, got {0}")]
    InvalidMass(f64),

    /// Oscillation period must be finite and non-negative (zero means a
    /// rigid, undamped correction for constraints).
    #[error("period must be finite and non-negative, got {0}")]
    InvalidPeriod(f64),

    /// Damping ratio must be finite and non-negative. Overdamped (> 1) is
    /// accepted.
    #[error("damping ratio must be finite and non-negative, got {0}")]
    InvalidDampingRatio(f64),

    /// Geometry dimensions (radius, width, height) must be positive and
    /// finite so the inertia tensor is invertible.
    #[error("geometry dimensions must be positive and finite")]
    InvalidGeometry,

    /// Restitution outside `[0, 1]` either injects or destroys more energy
    /// than a contact can.
    #[error("restitution must be in [0, 1], got {0}")]
    InvalidRestitution(f64),

    /// A scenario file referenced a body slot that was never defined.
    #[error("scenario references body index {index} but only {count} bodies are defined")]
    BodyIndexOutOfRange { index: usize, count: usize },
}
