//! Force contributors: unilateral influences on the force/torque
//! accumulators.
//!
//! Each force implements [`Force`] and, per target, computes a force vector
//! and hands it to `Dynamics::apply_force` (or `apply_torque` for the
//! rotational analogues). Forces never touch position or velocity directly;
//! the accumulated totals are consumed once per step by the integrator.
//! Corrections that must act on velocity immediately are constraints, not
//! forces (see `simulation::constraints`).
//!
//! A force is bound to a *set* of target ids and an optional source body by
//! the engine's agent registry; the same force value can serve any number of
//! targets.

use serde::Deserialize;

use crate::error::PhysicsError;
use crate::math::{self, Quat, Vec3};
use crate::simulation::states::{BodyId, BodySet};

/// Two pi, the conversion between an oscillation period and its angular
/// frequency. Springs parameterize stiffness as `(2π/period)²·m`.
const TAU: f64 = 2.0 * std::f64::consts::PI;

/// A force bound to targets (and an optional source) by the engine.
///
/// `apply` runs once per step before velocity integration. `potential_energy`
/// feeds the engine-level energy diagnostic; forces with no meaningful
/// potential keep the zero default.
pub trait Force: Send + Sync {
    fn apply(&self, bodies: &mut BodySet, targets: &[BodyId], source: Option<BodyId>);

    fn potential_energy(
        &self,
        _bodies: &BodySet,
        _targets: &[BodyId],
        _source: Option<BodyId>,
    ) -> f64 {
        0.0
    }
}

/// Validate a `(period, damping_ratio)` pair shared by the oscillatory
/// agents. Zero period is allowed only where the caller says so (rigid
/// constraints); springs require a strictly positive period.
pub(crate) fn validate_oscillation(
    period: f64,
    damping_ratio: f64,
    allow_zero_period: bool,
) -> Result<(), PhysicsError> {
    let period_ok = period.is_finite() && (period > 0.0 || (allow_zero_period && period == 0.0));
    if !period_ok {
        return Err(PhysicsError::InvalidPeriod(period));
    }
    if !(damping_ratio.is_finite() && damping_ratio >= 0.0) {
        return Err(PhysicsError::InvalidDampingRatio(damping_ratio));
    }
    Ok(())
}

// =========================================================================================
// Spring
// =========================================================================================

/// Displacement law applied to a spring's stretch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpringLaw {
    /// Hookean: force proportional to stretch.
    #[default]
    Hooke,
    /// FENE (finitely extensible nonlinear elastic): Hookean near rest,
    /// diverging as the stretch approaches `max_length`. Bounds the
    /// extension instead of the force.
    Fene,
}

/// Options for [`Spring`]. Unspecified keys keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpringOptions {
    pub period: f64, // oscillation period, seconds
    pub damping_ratio: f64, // 0 = undamped, 1 = critical
    pub rest_length: f64, // displacement producing zero force
    pub max_length: f64, // FENE extension bound
    pub anchor: Option<[f64; 3]>, // fixed anchor; ignored when a source body is bound
    pub law: SpringLaw,
}

impl Default for SpringOptions {
    fn default() -> Self {
        Self {
            period: 0.3,
            damping_ratio: 0.1,
            rest_length: 0.0,
            max_length: f64::INFINITY,
            anchor: None,
            law: SpringLaw::Hooke,
        }
    }
}

/// Damped spring toward a fixed anchor or a source body.
///
/// Stiffness and damping are derived *per target* from the period and
/// damping ratio: `k = (2π/period)²·m`, `c = (4π·ζ/period)·m`. The mass
/// factor means heavier targets get proportionally stronger springs, so
/// every target oscillates with the configured period regardless of its
/// mass. This matches the source system's behavior and is deliberate; see
/// DESIGN.md.
///
/// When a source body is bound, the spring anchors to the source's position
/// and the reciprocal force is applied to the source.
pub struct Spring {
    period: f64,
    damping_ratio: f64,
    rest_length: f64,
    max_length: f64,
    anchor: Vec3,
    law: SpringLaw,
}

impl Spring {
    pub fn new(options: SpringOptions) -> Result<Self, PhysicsError> {
        validate_oscillation(options.period, options.damping_ratio, false)?;
        if !(options.max_length > 0.0) {
            return Err(PhysicsError::InvalidGeometry);
        }
        Ok(Self {
            period: options.period,
            damping_ratio: options.damping_ratio,
            rest_length: options.rest_length,
            max_length: options.max_length,
            anchor: options.anchor.map(Vec3::from).unwrap_or_else(Vec3::zeros),
            law: options.law,
        })
    }

    /// Displacement law: Hookean stretch, or FENE-bounded stretch.
    fn displacement(&self, stretch: f64) -> f64 {
        match self.law {
            SpringLaw::Hooke => stretch,
            SpringLaw::Fene => {
                // Keep strictly inside the pole at |stretch| == max_length
                let limit = 0.99 * self.max_length;
                let s = stretch.clamp(-limit, limit);
                s / (1.0 - (s / self.max_length).powi(2))
            }
        }
    }
}

impl Force for Spring {
    fn apply(&self, bodies: &mut BodySet, targets: &[BodyId], source: Option<BodyId>) {
        for &id in targets {
            let Some((target, src)) = bodies.target_and_source(id, source) else {
                continue;
            };

            let anchor = src.as_ref().map(|s| s.position()).unwrap_or(self.anchor);
            let source_velocity = src.as_ref().map(|s| s.velocity()).unwrap_or_else(Vec3::zeros);

            // Per-target coefficients (mass-scaled, see the type docs)
            let m = target.mass();
            let stiffness = (TAU / self.period).powi(2) * m;
            let damping = 2.0 * TAU * self.damping_ratio / self.period * m;

            let displacement = target.position() - anchor;
            let stretch = displacement.norm() - self.rest_length;
            let direction = math::normalize_or_axis(displacement, 1.0);
            let relative_velocity = target.velocity() - source_velocity;

            let force =
                direction * (-stiffness * self.displacement(stretch)) - relative_velocity * damping;

            target.apply_force(force);
            if let Some(src) = src {
                // Equal and opposite on the anchor body
                src.apply_force(-force);
            }
        }
    }

    fn potential_energy(
        &self,
        bodies: &BodySet,
        targets: &[BodyId],
        source: Option<BodyId>,
    ) -> f64 {
        let anchor = source
            .and_then(|s| bodies.get(s))
            .map(|s| s.position())
            .unwrap_or(self.anchor);
        targets
            .iter()
            .filter_map(|&id| bodies.get(id))
            .map(|t| {
                let stiffness = (TAU / self.period).powi(2) * t.mass();
                let stretch = (t.position() - anchor).norm() - self.rest_length;
                0.5 * stiffness * stretch * stretch
            })
            .sum()
    }
}

// =========================================================================================
// Drag
// =========================================================================================

/// Velocity dependence of a drag force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DragLaw {
    /// `F = -k·v`
    #[default]
    Linear,
    /// `F = -k·|v|·v`
    Quadratic,
}

/// Options for [`Drag`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DragOptions {
    pub strength: f64,
    pub law: DragLaw,
}

impl Default for DragOptions {
    fn default() -> Self {
        Self {
            strength: 0.01,
            law: DragLaw::Linear,
        }
    }
}

/// Opposes each target's velocity.
pub struct Drag {
    strength: f64,
    law: DragLaw,
}

impl Drag {
    pub fn new(options: DragOptions) -> Self {
        Self {
            strength: options.strength,
            law: options.law,
        }
    }
}

impl Force for Drag {
    fn apply(&self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>) {
        for &id in targets {
            let Some(target) = bodies.get_mut(id) else {
                continue;
            };
            let v = target.velocity();
            let force = match self.law {
                DragLaw::Linear => -v * self.strength,
                DragLaw::Quadratic => -v * (self.strength * v.norm()),
            };
            target.apply_force(force);
        }
    }
}

// =========================================================================================
// Repulsion
// =========================================================================================

/// Radial decay law for [`Repulsion`]. `d` is the (range-clamped) distance
/// from the anchor, `r` the configured decay radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecayLaw {
    /// `1 - d/r`, floored at zero: finite range, linear falloff.
    #[default]
    Linear,
    /// Morse-potential force profile: strong short-range repulsion, shallow
    /// attraction near `r`, vanishing beyond.
    Morse,
    /// `r/d`: inverse-distance falloff.
    Inverse,
    /// `(r/d)²`: inverse-square (gravity-shaped) falloff.
    Gravity,
}

impl DecayLaw {
    fn evaluate(self, d: f64, r: f64) -> f64 {
        // Distance floor keeps the unbounded laws finite at the anchor
        let d = d.max(1e-6);
        match self {
            DecayLaw::Linear => (1.0 - d / r).max(0.0),
            DecayLaw::Morse => {
                let e = (r - d).exp();
                e * e - 2.0 * e
            }
            DecayLaw::Inverse => r / d,
            DecayLaw::Gravity => (r / d).powi(2),
        }
    }
}

/// Options for [`Repulsion`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepulsionOptions {
    pub strength: f64, // positive repels, negative attracts
    pub radius: f64, // decay length scale
    pub anchor: Option<[f64; 3]>, // fixed anchor; ignored when a source body is bound
    pub decay: DecayLaw,
    pub range_min: f64, // distances are clamped into [range_min, range_max]
    pub range_max: f64,
    pub cap: f64, // maximum force magnitude
}

impl Default for RepulsionOptions {
    fn default() -> Self {
        Self {
            strength: 1.0,
            radius: 1.0,
            anchor: None,
            decay: DecayLaw::Linear,
            range_min: 0.0,
            range_max: f64::INFINITY,
            cap: f64::INFINITY,
        }
    }
}

/// Radial force from an anchor point or source body, with a pluggable decay
/// law. Positive strength pushes targets away from the anchor; negative
/// strength attracts.
pub struct Repulsion {
    strength: f64,
    radius: f64,
    anchor: Vec3,
    decay: DecayLaw,
    range_min: f64,
    range_max: f64,
    cap: f64,
}

impl Repulsion {
    pub fn new(options: RepulsionOptions) -> Result<Self, PhysicsError> {
        if !(options.radius.is_finite() && options.radius > 0.0) {
            return Err(PhysicsError::InvalidGeometry);
        }
        Ok(Self {
            strength: options.strength,
            radius: options.radius,
            anchor: options.anchor.map(Vec3::from).unwrap_or_else(Vec3::zeros),
            decay: options.decay,
            range_min: options.range_min,
            range_max: options.range_max,
            cap: options.cap,
        })
    }
}

impl Force for Repulsion {
    fn apply(&self, bodies: &mut BodySet, targets: &[BodyId], source: Option<BodyId>) {
        let anchor = source
            .and_then(|s| bodies.get(s))
            .map(|s| s.position())
            .unwrap_or(self.anchor);

        for &id in targets {
            if Some(id) == source {
                continue;
            }
            let Some(target) = bodies.get_mut(id) else {
                continue;
            };

            let displacement = target.position() - anchor;
            let distance = displacement.norm().clamp(self.range_min, self.range_max);
            let magnitude = self.strength * self.decay.evaluate(distance, self.radius);
            let direction = math::normalize_or_axis(displacement, 1.0);

            target.apply_force(math::clamp_magnitude(direction * magnitude, self.cap));
        }
    }
}

// =========================================================================================
// Vector field
// =========================================================================================

/// Field functions evaluated at a body's position by [`VectorField`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFunction {
    /// Uniform field along `direction` (e.g. gravity when pointed down).
    Constant { direction: [f64; 3] },
    /// Field equal to the position itself: pushes outward, growing with
    /// distance from the origin.
    Linear,
    /// Field toward the origin, growing with distance.
    Radial,
    /// Pulls toward the surface of a sphere of the given radius around the
    /// origin: outward when inside, inward when outside.
    SphereAttractor { radius: f64 },
    /// Pulls toward a fixed point, proportionally to the offset.
    PointAttractor { anchor: [f64; 3] },
}

impl FieldFunction {
    fn evaluate(&self, p: Vec3) -> Vec3 {
        match self {
            FieldFunction::Constant { direction } => Vec3::from(*direction),
            FieldFunction::Linear => p,
            FieldFunction::Radial => -p,
            FieldFunction::SphereAttractor { radius } => {
                math::normalize_or_axis(p, 1.0) * (radius - p.norm())
            }
            FieldFunction::PointAttractor { anchor } => Vec3::from(*anchor) - p,
        }
    }
}

/// Options for [`VectorField`].
#[derive(Debug, Clone, Deserialize)]
pub struct VectorFieldOptions {
    #[serde(default = "default_field_strength")]
    pub strength: f64,
    pub field: FieldFunction,
}

fn default_field_strength() -> f64 {
    1.0
}

/// Evaluates a field function at each target's position; the resulting
/// force is `strength · mass · field(p)`, so the induced *acceleration* is
/// mass-independent.
pub struct VectorField {
    strength: f64,
    field: FieldFunction,
}

impl VectorField {
    pub fn new(options: VectorFieldOptions) -> Self {
        Self {
            strength: options.strength,
            field: options.field,
        }
    }
}

impl Force for VectorField {
    fn apply(&self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>) {
        for &id in targets {
            let Some(target) = bodies.get_mut(id) else {
                continue;
            };
            let field = self.field.evaluate(target.position());
            let force = field * (self.strength * target.mass());
            target.apply_force(force);
        }
    }
}

// =========================================================================================
// Rotational analogues
// =========================================================================================

/// Options for [`RotationalDrag`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationalDragOptions {
    pub strength: f64,
    pub law: DragLaw,
}

impl Default for RotationalDragOptions {
    fn default() -> Self {
        Self {
            strength: 0.01,
            law: DragLaw::Linear,
        }
    }
}

/// Drag on angular velocity: `τ = -k·ω` (or quadratic). Point particles are
/// skipped.
pub struct RotationalDrag {
    strength: f64,
    law: DragLaw,
}

impl RotationalDrag {
    pub fn new(options: RotationalDragOptions) -> Self {
        Self {
            strength: options.strength,
            law: options.law,
        }
    }
}

impl Force for RotationalDrag {
    fn apply(&self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>) {
        for &id in targets {
            let Some(target) = bodies.get_mut(id) else {
                continue;
            };
            let Some(omega) = target.angular().map(|a| a.angular_velocity) else {
                continue;
            };
            let torque = match self.law {
                DragLaw::Linear => -omega * self.strength,
                DragLaw::Quadratic => -omega * (self.strength * omega.norm()),
            };
            target.apply_torque(torque);
        }
    }
}

/// Options for [`RotationalSpring`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotationalSpringOptions {
    pub period: f64,
    pub damping_ratio: f64,
    /// Target orientation as `[w, x, y, z]`; identity when omitted.
    pub anchor: Option<[f64; 4]>,
}

impl Default for RotationalSpringOptions {
    fn default() -> Self {
        Self {
            period: 0.3,
            damping_ratio: 0.1,
            anchor: None,
        }
    }
}

/// Torsion spring pulling each target's orientation toward an anchor
/// orientation. Same period/damping-ratio parameterization as [`Spring`],
/// with the same per-target mass scaling, applied to the axis-angle error
/// between the two orientations.
pub struct RotationalSpring {
    period: f64,
    damping_ratio: f64,
    anchor: Quat,
}

impl RotationalSpring {
    pub fn new(options: RotationalSpringOptions) -> Result<Self, PhysicsError> {
        validate_oscillation(options.period, options.damping_ratio, false)?;
        let anchor = options
            .anchor
            .map(|[w, x, y, z]| Quat::new(w, x, y, z))
            .unwrap_or_else(|| Quat::new(1.0, 0.0, 0.0, 0.0));
        Ok(Self {
            period: options.period,
            damping_ratio: options.damping_ratio,
            anchor,
        })
    }

    /// Axis-angle rotation carrying `from` onto the anchor.
    fn orientation_error(&self, from: Quat) -> Vec3 {
        // delta ⊗ from = anchor, so delta is the remaining rotation
        let delta = self.anchor * from.conjugate();
        let vec = Vec3::new(delta.i, delta.j, delta.k);
        let sin_half = vec.norm();
        if sin_half < math::NORMALIZE_EPSILON {
            return Vec3::zeros();
        }
        let angle = 2.0 * sin_half.atan2(delta.w);
        vec * (angle / sin_half)
    }
}

impl Force for RotationalSpring {
    fn apply(&self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>) {
        for &id in targets {
            let Some(target) = bodies.get_mut(id) else {
                continue;
            };
            let Some(angular) = target.angular() else {
                continue;
            };

            let m = target.mass();
            let stiffness = (TAU / self.period).powi(2) * m;
            let damping = 2.0 * TAU * self.damping_ratio / self.period * m;

            let error = self.orientation_error(angular.orientation);
            let omega = angular.angular_velocity;

            target.apply_torque(error * stiffness - omega * damping);
        }
    }
}
