//! Simulated masses: point particles and rigid bodies.

pub mod body;
pub mod particle;

pub use body::{Dynamics, Geometry, RotationalState};
pub use particle::Particle;
