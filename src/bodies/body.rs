//! Rigid-body state: orientation, angular dynamics, and shape-derived
//! inertia.
//!
//! The source system modelled this as an inheritance chain (`Body` extends
//! `Particle`, `Circle`/`Rectangle` extend `Body`). Here that collapses into
//! a closed tagged enum, [`Dynamics`]: either a bare point mass or a point
//! mass plus a [`RotationalState`]. Forces and constraints only ever see
//! `Dynamics`, so a point mass and a rigid body flow through the same
//! pipeline; the angular half is simply absent for particles.

use crate::error::PhysicsError;
use crate::math::{self, Mat3, Quat, Vec3};
use crate::bodies::particle::Particle;

/// Shape of a rigid body, used only to derive the inertia tensor (and the
/// bounding radius the sphere-sphere collision constraint reads).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Dimensionless point. Identity inertia; rotation is well-defined but
    /// shape-free.
    Point,
    /// Disk of the given radius. Isotropic inertia `(1/4) m r^2` on every
    /// axis.
    Circle { radius: f64 },
    /// Axis-aligned rectangle. Thin-plate inertia: `(1/12) m h^2`,
    /// `(1/12) m w^2`, `(1/12) m (w^2 + h^2)`.
    Rectangle { width: f64, height: f64 },
}

impl Geometry {
    /// Validate the shape dimensions.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        let ok = match *self {
            Geometry::Point => true,
            Geometry::Circle { radius } => radius.is_finite() && radius > 0.0,
            Geometry::Rectangle { width, height } => {
                width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0
            }
        };
        if ok { Ok(()) } else { Err(PhysicsError::InvalidGeometry) }
    }

    /// Inertia tensor for this shape at the given mass.
    pub fn inertia(&self, mass: f64) -> Mat3 {
        match *self {
            Geometry::Point => Mat3::identity(),
            Geometry::Circle { radius } => {
                let i = 0.25 * mass * radius * radius;
                Mat3::from_diagonal(&Vec3::new(i, i, i))
            }
            Geometry::Rectangle { width, height } => {
                let (w2, h2) = (width * width, height * height);
                Mat3::from_diagonal(&Vec3::new(
                    mass * h2 / 12.0,
                    mass * w2 / 12.0,
                    mass * (w2 + h2) / 12.0,
                ))
            }
        }
    }

    /// Bounding radius used by sphere-sphere collision.
    pub fn bounding_radius(&self) -> f64 {
        match *self {
            Geometry::Point => 0.0,
            Geometry::Circle { radius } => radius,
            Geometry::Rectangle { width, height } => 0.5 * (width * width + height * height).sqrt(),
        }
    }
}

/// Angular half of a rigid body.
///
/// Angular *momentum* is the integrated quantity (the integrator advances
/// `L` from torque, then derives `ω = I⁻¹ L` in world space), which keeps
/// momentum exactly conserved under zero torque even while the orientation
/// tumbles.
#[derive(Debug, Clone)]
pub struct RotationalState {
    pub orientation: Quat, // unit quaternion, drifts slowly (no renorm in the step)
    pub angular_velocity: Vec3, // derived from momentum each step
    pub angular_momentum: Vec3, // integrated from torque
    pub(crate) torque: Vec3, // torque accumulator, cleared each step
    inertia: Mat3, // body-frame inertia tensor from geometry
    inverse_inertia: Mat3, // cached inverse
    geometry: Geometry,
}

impl RotationalState {
    pub fn new(geometry: Geometry, mass: f64) -> Result<Self, PhysicsError> {
        geometry.validate()?;
        let inertia = geometry.inertia(mass);
        let inverse_inertia = inertia
            .try_inverse()
            .ok_or(PhysicsError::InvalidGeometry)?;
        Ok(Self {
            orientation: Quat::new(1.0, 0.0, 0.0, 0.0),
            angular_velocity: Vec3::zeros(),
            angular_momentum: Vec3::zeros(),
            torque: Vec3::zeros(),
            inertia,
            inverse_inertia,
            geometry,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn inertia(&self) -> Mat3 {
        self.inertia
    }

    pub fn inverse_inertia(&self) -> Mat3 {
        self.inverse_inertia
    }

    /// Swap in a new shape and immediately recompute the inertia tensor.
    /// Shape changes without recomputation would desynchronize `ω = I⁻¹ L`.
    pub fn set_geometry(&mut self, geometry: Geometry, mass: f64) -> Result<(), PhysicsError> {
        geometry.validate()?;
        let inertia = geometry.inertia(mass);
        self.inverse_inertia = inertia.try_inverse().ok_or(PhysicsError::InvalidGeometry)?;
        self.inertia = inertia;
        self.geometry = geometry;
        Ok(())
    }

    /// Body-frame inverse inertia rotated into world space: `R I⁻¹ Rᵀ`.
    pub fn inverse_inertia_world(&self) -> Mat3 {
        let r = math::quat_to_matrix(self.orientation);
        r * self.inverse_inertia * r.transpose()
    }

    /// Rotational kinetic energy `(1/2) (I ω) · ω`.
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * (self.inertia * self.angular_velocity).dot(&self.angular_velocity)
    }
}

/// A simulated mass: either a point particle or a full rigid body.
///
/// This is the closed set of dynamic variants the engine owns; every force
/// and constraint operates on `Dynamics` values through the accessors below.
#[derive(Debug, Clone)]
pub enum Dynamics {
    Particle(Particle),
    Body {
        linear: Particle,
        angular: RotationalState,
    },
}

impl Dynamics {
    /// A point mass at `position`.
    pub fn particle(position: Vec3, mass: f64) -> Result<Self, PhysicsError> {
        Ok(Dynamics::Particle(Particle::new(position, mass)?))
    }

    /// A rigid body at `position` whose inertia tensor comes from `geometry`.
    pub fn body(position: Vec3, mass: f64, geometry: Geometry) -> Result<Self, PhysicsError> {
        let linear = Particle::new(position, mass)?;
        let angular = RotationalState::new(geometry, mass)?;
        Ok(Dynamics::Body { linear, angular })
    }

    pub fn linear(&self) -> &Particle {
        match self {
            Dynamics::Particle(p) => p,
            Dynamics::Body { linear, .. } => linear,
        }
    }

    pub fn linear_mut(&mut self) -> &mut Particle {
        match self {
            Dynamics::Particle(p) => p,
            Dynamics::Body { linear, .. } => linear,
        }
    }

    /// Angular half, present only for rigid bodies.
    pub fn angular(&self) -> Option<&RotationalState> {
        match self {
            Dynamics::Particle(_) => None,
            Dynamics::Body { angular, .. } => Some(angular),
        }
    }

    pub fn angular_mut(&mut self) -> Option<&mut RotationalState> {
        match self {
            Dynamics::Particle(_) => None,
            Dynamics::Body { angular, .. } => Some(angular),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.linear().position
    }

    pub fn set_position(&mut self, p: Vec3) {
        self.linear_mut().position = p;
    }

    pub fn velocity(&self) -> Vec3 {
        self.linear().velocity
    }

    pub fn set_velocity(&mut self, v: Vec3) {
        self.linear_mut().velocity = v;
    }

    pub fn mass(&self) -> f64 {
        self.linear().mass()
    }

    pub fn inverse_mass(&self) -> f64 {
        self.linear().inverse_mass()
    }

    pub fn apply_force(&mut self, f: Vec3) {
        self.linear_mut().apply_force(f);
    }

    pub fn apply_impulse(&mut self, j: Vec3) {
        self.linear_mut().apply_impulse(j);
    }

    /// Add to the torque accumulator. A no-op for point particles, which
    /// carry no angular state.
    pub fn apply_torque(&mut self, t: Vec3) {
        if let Dynamics::Body { linear, angular } = self {
            angular.torque += t;
            linear.wake();
        }
    }

    /// Change the shape and recompute inertia in the same call.
    /// Returns `InvalidGeometry` when applied to a point particle.
    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<(), PhysicsError> {
        match self {
            Dynamics::Particle(_) => Err(PhysicsError::InvalidGeometry),
            Dynamics::Body { linear, angular } => angular.set_geometry(geometry, linear.mass()),
        }
    }

    /// Convenience shape setter for circle bodies.
    pub fn set_radius(&mut self, radius: f64) -> Result<(), PhysicsError> {
        match self.angular().map(|a| a.geometry()) {
            Some(Geometry::Circle { .. }) => self.set_geometry(Geometry::Circle { radius }),
            _ => Err(PhysicsError::InvalidGeometry),
        }
    }

    /// Convenience shape setter for rectangle bodies.
    pub fn set_size(&mut self, width: f64, height: f64) -> Result<(), PhysicsError> {
        match self.angular().map(|a| a.geometry()) {
            Some(Geometry::Rectangle { .. }) => {
                self.set_geometry(Geometry::Rectangle { width, height })
            }
            _ => Err(PhysicsError::InvalidGeometry),
        }
    }

    /// Radius used by sphere-sphere collision; zero for point particles,
    /// which therefore never collide.
    pub fn bounding_radius(&self) -> f64 {
        self.angular()
            .map(|a| a.geometry().bounding_radius())
            .unwrap_or(0.0)
    }

    /// Total kinetic energy: `(1/2) m |v|^2`, plus `(1/2) (I ω) · ω` for
    /// rigid bodies.
    pub fn energy(&self) -> f64 {
        let linear = self.linear().kinetic_energy();
        match self.angular() {
            Some(a) => linear + a.kinetic_energy(),
            None => linear,
        }
    }

    /// 16-element column-major affine transform (rotation + translation) for
    /// an external render step. Identity rotation for point particles. Pure
    /// read: advancing the simulation is exclusively `PhysicsEngine::step`.
    pub fn transform(&self) -> [f64; 16] {
        let orientation = self
            .angular()
            .map(|a| a.orientation)
            .unwrap_or_else(|| Quat::new(1.0, 0.0, 0.0, 0.0));
        math::quat_to_transform(orientation, self.position())
    }

    pub fn is_sleeping(&self) -> bool {
        self.linear().is_sleeping()
    }

    pub fn sleep(&mut self) {
        self.linear_mut().sleep();
    }

    pub fn wake(&mut self) {
        self.linear_mut().wake();
    }
}
