//! Linear (translational) state of a simulated mass.
//!
//! `Particle` is the smallest thing the engine can simulate: a point mass
//! with position, velocity, and a force accumulator that is consumed and
//! cleared once per step by the integrator. Rigid bodies embed a `Particle`
//! for their translational half (see `bodies::body`).

use crate::error::PhysicsError;
use crate::math::Vec3;

#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec3, // current position
    pub velocity: Vec3, // current velocity
    pub(crate) force: Vec3, // force accumulator, cleared each step
    mass: f64, // scalar mass, > 0 and finite
    inverse_mass: f64, // cached 1/mass
    asleep: bool, // sleeping particles are skipped by the whole step
}

impl Particle {
    /// Create a particle at rest at `position`.
    ///
    /// Rejects non-positive or non-finite mass; a bad mass here would turn
    /// into a non-finite inverse mass and silently corrupt every force and
    /// impulse downstream.
    pub fn new(position: Vec3, mass: f64) -> Result<Self, PhysicsError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(PhysicsError::InvalidMass(mass));
        }
        Ok(Self {
            position,
            velocity: Vec3::zeros(),
            force: Vec3::zeros(),
            mass,
            inverse_mass: 1.0 / mass,
            asleep: false,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    /// Change the mass, keeping the cached inverse in lockstep.
    pub fn set_mass(&mut self, mass: f64) -> Result<(), PhysicsError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(PhysicsError::InvalidMass(mass));
        }
        self.mass = mass;
        self.inverse_mass = 1.0 / mass;
        Ok(())
    }

    /// Add `f` to the force accumulator and wake the particle.
    /// The accumulated total is consumed (and zeroed) by the next
    /// velocity-integration pass.
    pub fn apply_force(&mut self, f: Vec3) {
        self.force += f;
        self.asleep = false;
    }

    /// Apply an impulse: `j * (1/m)` goes straight into velocity, bypassing
    /// the accumulator. This is the constraint solver's entry point.
    pub fn apply_impulse(&mut self, j: Vec3) {
        self.velocity += j * self.inverse_mass;
        self.asleep = false;
    }

    /// Kinetic energy `(1/2) m |v|^2`.
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    pub fn is_sleeping(&self) -> bool {
        self.asleep
    }

    pub fn sleep(&mut self) {
        self.asleep = true;
    }

    pub fn wake(&mut self) {
        self.asleep = false;
    }

    /// Pending accumulated force (mostly useful for diagnostics and tests).
    pub fn accumulated_force(&self) -> Vec3 {
        self.force
    }

    pub(crate) fn clear_force(&mut self) {
        self.force = Vec3::zeros();
    }
}
