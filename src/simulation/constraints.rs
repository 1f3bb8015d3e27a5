//! Constraint contributors: bilateral corrections applied via impulses.
//!
//! Constraints run after forces and velocity integration, for a configurable
//! number of solver iterations per step (sequential impulses: each constraint
//! is resolved against the current velocities, so later constraints see the
//! corrections of earlier ones, and repeating the sweep converges the set).
//!
//! Soft constraints share one Baumgarte-stabilized formulation:
//!
//! ```text
//! eff_mass  = 1/(w1 + w2)                    (w = inverse mass)
//! k         = 4·eff_mass·π²/period²
//! c         = 4·eff_mass·π·ζ/period
//! gamma     = 1/(c + dt·k)
//! beta      = dt·k/(c + dt·k)
//! anti_drift = (beta/dt)·position_error
//! lambda    = -(n·v_rel + anti_drift) / (gamma + dt/eff_mass)
//! impulse   = n · dt·lambda
//! ```
//!
//! `period == 0` degenerates to `gamma = 0, beta = 1`: a rigid, undamped
//! correction that removes the full position error over the next step.

use std::f64::consts::PI;

use serde::Deserialize;

use crate::bodies::Dynamics;
use crate::error::PhysicsError;
use crate::math::{self, Vec3};
use crate::simulation::forces::validate_oscillation;
use crate::simulation::states::{BodyId, BodySet};

/// A constraint bound to targets (and an optional source) by the engine.
///
/// `apply` runs once per solver iteration, after forces and velocity
/// integration and before position integration. Impulses only: constraints
/// change velocities immediately and never write positions.
pub trait Constraint: Send + Sync {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], source: Option<BodyId>, dt: f64);

    fn potential_energy(
        &self,
        _bodies: &BodySet,
        _targets: &[BodyId],
        _source: Option<BodyId>,
    ) -> f64 {
        0.0
    }
}

/// Baumgarte softness coefficients for a `(period, ζ)` pair at the given
/// effective mass and step. `period == 0` is the rigid limit.
fn soft_coefficients(period: f64, damping_ratio: f64, eff_mass: f64, dt: f64) -> (f64, f64) {
    if period <= 0.0 {
        return (0.0, 1.0);
    }
    let k = 4.0 * eff_mass * PI * PI / (period * period);
    let c = 4.0 * eff_mass * PI * damping_ratio / period;
    let gamma = 1.0 / (c + dt * k);
    let beta = dt * k / (c + dt * k);
    (gamma, beta)
}

/// Scalar impulse (already multiplied by `dt`) along the constraint normal.
/// `normal_velocity` is the relative velocity projected on the normal,
/// `position_error` the signed constraint violation along it. Returns zero
/// when both endpoints are immovable.
fn solve_impulse(
    period: f64,
    damping_ratio: f64,
    w_total: f64,
    dt: f64,
    position_error: f64,
    normal_velocity: f64,
) -> f64 {
    if w_total <= 0.0 {
        return 0.0;
    }
    let eff_mass = 1.0 / w_total;
    let (gamma, beta) = soft_coefficients(period, damping_ratio, eff_mass, dt);
    let anti_drift = beta / dt * position_error;
    let lambda = -(normal_velocity + anti_drift) / (gamma + dt / eff_mass);
    dt * lambda
}

// =========================================================================================
// Distance
// =========================================================================================

/// Options for [`Distance`]. Unspecified keys keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistanceOptions {
    pub length: f64, // distance the constraint maintains
    pub min_length: f64, // below this separation the tether goes slack
    pub period: f64, // 0 = rigid
    pub damping_ratio: f64,
    pub anchor: Option<[f64; 3]>, // fixed anchor; ignored when a source body is bound
}

impl Default for DistanceOptions {
    fn default() -> Self {
        Self {
            length: 0.0,
            min_length: 0.0,
            period: 0.0,
            damping_ratio: 0.5,
            anchor: None,
        }
    }
}

/// Tether holding each target at `length` from an anchor point or source
/// body. A positive `min_length` makes it a rope: no impulse while the
/// separation is under the threshold, taut behavior beyond it.
pub struct Distance {
    length: f64,
    min_length: f64,
    period: f64,
    damping_ratio: f64,
    anchor: Vec3,
}

impl Distance {
    pub fn new(options: DistanceOptions) -> Result<Self, PhysicsError> {
        validate_oscillation(options.period, options.damping_ratio, true)?;
        Ok(Self {
            length: options.length,
            min_length: options.min_length,
            period: options.period,
            damping_ratio: options.damping_ratio,
            anchor: options.anchor.map(Vec3::from).unwrap_or_else(Vec3::zeros),
        })
    }
}

impl Constraint for Distance {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], source: Option<BodyId>, dt: f64) {
        for &id in targets {
            let Some((target, src)) = bodies.target_and_source(id, source) else {
                continue;
            };

            let anchor = src.as_ref().map(|s| s.position()).unwrap_or(self.anchor);
            let source_velocity = src.as_ref().map(|s| s.velocity()).unwrap_or_else(Vec3::zeros);
            let source_w = src.as_ref().map(|s| s.inverse_mass()).unwrap_or(0.0);

            let displacement = target.position() - anchor;
            let distance = displacement.norm();
            if distance < self.min_length {
                // Slack rope
                continue;
            }

            let normal = math::normalize_or_axis(displacement, 1.0);
            let position_error = distance - self.length;
            let normal_velocity = normal.dot(&(target.velocity() - source_velocity));

            let j = solve_impulse(
                self.period,
                self.damping_ratio,
                target.inverse_mass() + source_w,
                dt,
                position_error,
                normal_velocity,
            );

            target.apply_impulse(normal * j);
            if let Some(src) = src {
                src.apply_impulse(normal * -j);
            }
        }
    }
}

// =========================================================================================
// Snap
// =========================================================================================

/// Options for [`Snap`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapOptions {
    pub length: f64,
    pub period: f64,
    pub damping_ratio: f64, // floored at 1 internally
    pub anchor: Option<[f64; 3]>,
}

impl Default for SnapOptions {
    fn default() -> Self {
        Self {
            length: 0.0,
            period: 0.1,
            damping_ratio: 1.0,
            anchor: None,
        }
    }
}

/// Critically-stable settle constraint: the Distance formulation tuned so a
/// target converges onto the anchor without material overshoot for *any*
/// period, however short. Two ingredients: the damping ratio is floored at 1
/// (never underdamped), and the impulse is clamped so the post-impulse
/// normal velocity cannot carry the target past the anchor within one step.
///
/// This is the mechanism the animation layer uses for fast, non-oscillatory
/// "settle" transitions.
pub struct Snap {
    length: f64,
    period: f64,
    damping_ratio: f64,
    anchor: Vec3,
}

impl Snap {
    pub fn new(options: SnapOptions) -> Result<Self, PhysicsError> {
        validate_oscillation(options.period, options.damping_ratio, true)?;
        Ok(Self {
            length: options.length,
            period: options.period,
            damping_ratio: options.damping_ratio.max(1.0),
            anchor: options.anchor.map(Vec3::from).unwrap_or_else(Vec3::zeros),
        })
    }
}

impl Constraint for Snap {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], source: Option<BodyId>, dt: f64) {
        for &id in targets {
            let Some((target, src)) = bodies.target_and_source(id, source) else {
                continue;
            };

            let anchor = src.as_ref().map(|s| s.position()).unwrap_or(self.anchor);
            let source_velocity = src.as_ref().map(|s| s.velocity()).unwrap_or_else(Vec3::zeros);
            let source_w = src.as_ref().map(|s| s.inverse_mass()).unwrap_or(0.0);

            let displacement = target.position() - anchor;
            let normal = math::normalize_or_axis(displacement, 1.0);
            let position_error = displacement.norm() - self.length;
            let normal_velocity = normal.dot(&(target.velocity() - source_velocity));
            let w_total = target.inverse_mass() + source_w;

            let mut j = solve_impulse(
                self.period,
                self.damping_ratio,
                w_total,
                dt,
                position_error,
                normal_velocity,
            );

            // Overshoot clamp: the post-impulse normal velocity may close at
            // most the remaining error over the next position step.
            if w_total > 0.0 && dt > 0.0 {
                let limit = -position_error / dt;
                let after = normal_velocity + j * w_total;
                if position_error > 0.0 && after < limit {
                    j = (limit - normal_velocity) / w_total;
                } else if position_error < 0.0 && after > limit {
                    j = (limit - normal_velocity) / w_total;
                }
            }

            target.apply_impulse(normal * j);
            if let Some(src) = src {
                src.apply_impulse(normal * -j);
            }
        }
    }
}

// =========================================================================================
// Wall / Walls
// =========================================================================================

/// Options for [`Wall`] and each side of [`Walls`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WallOptions {
    pub restitution: f64, // bounce coefficient in [0, 1]
    pub slop: f64, // penetration tolerated before drift correction engages
    pub drift: f64, // fraction of residual penetration corrected per step
}

impl Default for WallOptions {
    fn default() -> Self {
        Self {
            restitution: 0.4,
            slop: 0.01,
            drift: 0.2,
        }
    }
}

/// Half-space constraint `p·n + d ≥ 0` (the normal points into the allowed
/// region). On penetration, incoming normal velocity is reflected by the
/// restitution coefficient, and penetration beyond `slop` is bled off at the
/// `drift` rate via a bias velocity.
pub struct Wall {
    normal: Vec3,
    distance: f64,
    restitution: f64,
    slop: f64,
    drift: f64,
}

impl Wall {
    pub fn new(normal: Vec3, distance: f64, options: WallOptions) -> Result<Self, PhysicsError> {
        if !(0.0..=1.0).contains(&options.restitution) {
            return Err(PhysicsError::InvalidRestitution(options.restitution));
        }
        Ok(Self {
            normal: math::normalize_or_axis(normal, 1.0),
            distance,
            restitution: options.restitution,
            slop: options.slop,
            drift: options.drift,
        })
    }

    /// A wall through `point` with inward normal `normal`.
    pub fn through_point(
        normal: Vec3,
        point: Vec3,
        options: WallOptions,
    ) -> Result<Self, PhysicsError> {
        let n = math::normalize_or_axis(normal, 1.0);
        Self::new(n, -n.dot(&point), options)
    }

    fn resolve(&self, target: &mut Dynamics, dt: f64) {
        let w = target.inverse_mass();
        if w <= 0.0 {
            return;
        }

        let overlap = self.normal.dot(&target.position()) + self.distance;
        if overlap >= 0.0 {
            return;
        }

        let normal_velocity = self.normal.dot(&target.velocity());

        // Reflect incoming velocity, then make sure the outgoing normal
        // velocity is at least the drift-correction rate. Formulated as a
        // floor so repeated solver iterations over the same state are no-ops
        // instead of stacking the bias.
        let mut delta_v = if normal_velocity < 0.0 {
            -(1.0 + self.restitution) * normal_velocity
        } else {
            0.0
        };
        let correction = self.drift * (-overlap - self.slop).max(0.0) / dt;
        let outgoing = normal_velocity + delta_v;
        if outgoing < correction {
            delta_v += correction - outgoing;
        }

        if delta_v > 0.0 {
            target.apply_impulse(self.normal * (delta_v / w));
        }
    }
}

impl Constraint for Wall {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>, dt: f64) {
        for &id in targets {
            if let Some(target) = bodies.get_mut(id) {
                self.resolve(target, dt);
            }
        }
    }
}

/// Options for [`Walls`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WallsOptions {
    pub origin: [f64; 3], // box center
    pub size: [f64; 3], // box extents; a zero z extent builds a 2-D box
    #[serde(flatten)]
    pub wall: WallOptions,
}

impl Default for WallsOptions {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            size: [1.0, 1.0, 0.0],
            wall: WallOptions::default(),
        }
    }
}

/// Axis-aligned bounding box composed of individual [`Wall`]s sharing one
/// size and origin: left/right/top/bottom, plus front/back when the z extent
/// is non-zero.
pub struct Walls {
    sides: Vec<Wall>,
}

impl Walls {
    pub fn new(options: WallsOptions) -> Result<Self, PhysicsError> {
        let origin = Vec3::from(options.origin);
        let half = Vec3::from(options.size) * 0.5;

        let mut faces = vec![
            (Vec3::x(), origin - Vec3::new(half.x, 0.0, 0.0)), // left
            (-Vec3::x(), origin + Vec3::new(half.x, 0.0, 0.0)), // right
            (Vec3::y(), origin - Vec3::new(0.0, half.y, 0.0)), // top
            (-Vec3::y(), origin + Vec3::new(0.0, half.y, 0.0)), // bottom
        ];
        if half.z > 0.0 {
            faces.push((Vec3::z(), origin - Vec3::new(0.0, 0.0, half.z))); // front
            faces.push((-Vec3::z(), origin + Vec3::new(0.0, 0.0, half.z))); // back
        }

        let sides = faces
            .into_iter()
            .map(|(normal, point)| Wall::through_point(normal, point, options.wall.clone()))
            .collect::<Result<_, _>>()?;
        Ok(Self { sides })
    }
}

impl Constraint for Walls {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], source: Option<BodyId>, dt: f64) {
        for side in &mut self.sides {
            side.apply(bodies, targets, source, dt);
        }
    }
}

// =========================================================================================
// Collision
// =========================================================================================

/// Options for [`Collision`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollisionOptions {
    pub restitution: f64,
    pub slop: f64,
    pub drift: f64,
}

impl Default for CollisionOptions {
    fn default() -> Self {
        Self {
            restitution: 0.5,
            slop: 0.01,
            drift: 0.2,
        }
    }
}

/// Sphere-sphere collision between every unordered pair of targets, using
/// each body's geometry-derived bounding radius. Penetration depth and
/// relative normal velocity are resolved symmetrically between the two
/// bodies, weighted by inverse mass (no anchor; both endpoints are dynamic).
///
/// No broad phase and no continuous detection: every pair is tested every
/// iteration, and a fast body can tunnel through a small one within a step.
pub struct Collision {
    restitution: f64,
    slop: f64,
    drift: f64,
}

impl Collision {
    pub fn new(options: CollisionOptions) -> Result<Self, PhysicsError> {
        if !(0.0..=1.0).contains(&options.restitution) {
            return Err(PhysicsError::InvalidRestitution(options.restitution));
        }
        Ok(Self {
            restitution: options.restitution,
            slop: options.slop,
            drift: options.drift,
        })
    }
}

impl Constraint for Collision {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>, dt: f64) {
        for i in 0..targets.len() {
            for k in (i + 1)..targets.len() {
                let Some((a, b)) = bodies.pair_mut(targets[i], targets[k]) else {
                    continue;
                };

                let combined = a.bounding_radius() + b.bounding_radius();
                if combined <= 0.0 {
                    continue;
                }

                let displacement = b.position() - a.position();
                let distance = displacement.norm();
                let overlap = distance - combined;
                if overlap >= 0.0 {
                    continue;
                }

                let w_total = a.inverse_mass() + b.inverse_mass();
                if w_total <= 0.0 {
                    continue;
                }

                let normal = math::normalize_or_axis(displacement, 1.0);
                let normal_velocity = normal.dot(&(b.velocity() - a.velocity()));

                // Approaching pairs get the restitution impulse; the
                // positional bias is a separation-rate floor, so repeated
                // solver iterations over the same state do not stack it.
                let mut delta_v = if normal_velocity < 0.0 {
                    -(1.0 + self.restitution) * normal_velocity
                } else {
                    0.0
                };
                let correction = self.drift * (-overlap - self.slop).max(0.0) / dt;
                let separating = normal_velocity + delta_v;
                if separating < correction {
                    delta_v += correction - separating;
                }

                if delta_v > 0.0 {
                    let j = delta_v / w_total;
                    a.apply_impulse(normal * -j);
                    b.apply_impulse(normal * j);
                }
            }
        }
    }
}

// =========================================================================================
// Surface / Curve
// =========================================================================================

/// Scalar field defining an implicit surface `f(p) = 0`.
pub type ImplicitSurface = Box<dyn Fn(Vec3) -> f64 + Send + Sync>;

/// Options shared by [`Surface`] and [`Curve`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurfaceOptions {
    pub period: f64,
    pub damping_ratio: f64,
    pub epsilon: f64, // central-difference step for the numeric gradient
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            period: 0.0,
            damping_ratio: 0.5,
            epsilon: 1e-4,
        }
    }
}

/// One soft-constraint solve against a single implicit zero-set: the numeric
/// gradient is the constraint normal, `f(p)/|∇f|` the signed distance
/// estimate fed to the shared impulse formula.
fn resolve_implicit(
    f: &ImplicitSurface,
    target: &mut Dynamics,
    period: f64,
    damping_ratio: f64,
    epsilon: f64,
    dt: f64,
) {
    let p = target.position();
    let value = f(p);
    let grad = math::gradient(&|q| f(q), p, epsilon);
    let grad_norm = grad.norm();
    if grad_norm < math::NORMALIZE_EPSILON {
        // Critical point of the field; no usable normal this step
        return;
    }

    let normal = grad / grad_norm;
    let position_error = value / grad_norm;
    let normal_velocity = normal.dot(&target.velocity());

    let j = solve_impulse(
        period,
        damping_ratio,
        target.inverse_mass(),
        dt,
        position_error,
        normal_velocity,
    );
    target.apply_impulse(normal * j);
}

/// Constrains each target onto the implicit surface `f(p) = 0`.
pub struct Surface {
    f: ImplicitSurface,
    period: f64,
    damping_ratio: f64,
    epsilon: f64,
}

impl Surface {
    pub fn new(f: ImplicitSurface, options: SurfaceOptions) -> Result<Self, PhysicsError> {
        validate_oscillation(options.period, options.damping_ratio, true)?;
        Ok(Self {
            f,
            period: options.period,
            damping_ratio: options.damping_ratio,
            epsilon: options.epsilon,
        })
    }
}

impl Constraint for Surface {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>, dt: f64) {
        for &id in targets {
            if let Some(target) = bodies.get_mut(id) {
                resolve_implicit(
                    &self.f,
                    target,
                    self.period,
                    self.damping_ratio,
                    self.epsilon,
                    dt,
                );
            }
        }
    }
}

/// Constrains each target onto the intersection of two implicit surfaces
/// `f(p) = 0` and `g(p) = 0` (a curve). The two zero-sets are resolved
/// sequentially each iteration, in sequential-impulse fashion; the outer
/// solver iterations converge the pair.
pub struct Curve {
    f: ImplicitSurface,
    g: ImplicitSurface,
    period: f64,
    damping_ratio: f64,
    epsilon: f64,
}

impl Curve {
    pub fn new(
        f: ImplicitSurface,
        g: ImplicitSurface,
        options: SurfaceOptions,
    ) -> Result<Self, PhysicsError> {
        validate_oscillation(options.period, options.damping_ratio, true)?;
        Ok(Self {
            f,
            g,
            period: options.period,
            damping_ratio: options.damping_ratio,
            epsilon: options.epsilon,
        })
    }
}

impl Constraint for Curve {
    fn apply(&mut self, bodies: &mut BodySet, targets: &[BodyId], _source: Option<BodyId>, dt: f64) {
        for &id in targets {
            if let Some(target) = bodies.get_mut(id) {
                resolve_implicit(
                    &self.f,
                    target,
                    self.period,
                    self.damping_ratio,
                    self.epsilon,
                    dt,
                );
                resolve_implicit(
                    &self.g,
                    target,
                    self.period,
                    self.damping_ratio,
                    self.epsilon,
                    dt,
                );
            }
        }
    }
}
