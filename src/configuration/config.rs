//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`EngineOptions`]  – step clamps, solver iterations, velocity caps
//! - [`BodyConfig`]     – initial state for each body (particles and rigid bodies)
//! - [`AgentEntry`]     – forces/constraints with their target/source bindings
//! - [`ScenarioConfig`] – top-level wrapper used to load a scenario from YAML
//!
//! All per-agent option maps are flat key→value dictionaries; unspecified
//! keys keep their defaults, and no keys are required beyond the agent kind.
//!
//! # YAML format
//! An example scenario matching these types:
//!
//! ```yaml
//! engine:
//!   iterations: 10
//!   min_step: 0.008
//!   max_step: 0.066
//!
//! bodies:
//!   - position: [0.0, 0.0, 0.0]       # a point particle
//!     mass: 1.0
//!   - position: [3.0, 0.0, 0.0]       # a rigid body
//!     velocity: [0.0, 1.0, 0.0]
//!     mass: 2.0
//!     geometry:
//!       circle: { radius: 0.5 }
//!
//! agents:
//!   - kind: spring                    # binds body 0 to the anchor
//!     targets: [0]
//!     period: 0.3
//!     damping_ratio: 1.0
//!     anchor: [10.0, 0.0, 0.0]
//!   - kind: drag                      # no targets key: applies to all bodies
//!     strength: 0.02
//!   - kind: walls
//!     origin: [0.0, 0.0, 0.0]
//!     size: [20.0, 20.0, 0.0]
//!     restitution: 0.8
//! ```
//!
//! Surface and curve constraints take arbitrary closures and are therefore
//! constructed in code, not from YAML.

use serde::Deserialize;

use crate::bodies::{Dynamics, Geometry};
use crate::error::PhysicsError;
use crate::math::Vec3;
use crate::simulation::constraints::{
    Collision, CollisionOptions, Distance, DistanceOptions, Snap, SnapOptions, Wall, WallOptions,
    Walls, WallsOptions,
};
use crate::simulation::engine::{Agent, EngineOptions, PhysicsEngine};
use crate::simulation::forces::{
    Drag, DragOptions, Repulsion, RepulsionOptions, RotationalDrag, RotationalDragOptions,
    RotationalSpring, RotationalSpringOptions, Spring, SpringOptions, VectorField,
    VectorFieldOptions,
};
use crate::simulation::states::BodyId;

/// Shape of a rigid body in a scenario file. A body without a `geometry` key
/// is a point particle.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum GeometryConfig {
    Circle { radius: f64 },
    Rectangle { width: f64, height: f64 },
}

impl From<GeometryConfig> for Geometry {
    fn from(cfg: GeometryConfig) -> Self {
        match cfg {
            GeometryConfig::Circle { radius } => Geometry::Circle { radius },
            GeometryConfig::Rectangle { width, height } => Geometry::Rectangle { width, height },
        }
    }
}

/// Initial state for a single body.
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub position: [f64; 3], // initial position
    #[serde(default)]
    pub velocity: [f64; 3], // initial velocity, zero when omitted
    #[serde(default = "default_mass")]
    pub mass: f64, // mass, 1.0 when omitted
    #[serde(default)]
    pub geometry: Option<GeometryConfig>, // present = rigid body, absent = particle
}

fn default_mass() -> f64 {
    1.0
}

/// One agent kind with its flat option map. The `kind` key selects the
/// variant; the remaining keys are that agent's options.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentKind {
    Spring(SpringOptions),
    Drag(DragOptions),
    Repulsion(RepulsionOptions),
    VectorField(VectorFieldOptions),
    RotationalSpring(RotationalSpringOptions),
    RotationalDrag(RotationalDragOptions),
    Distance(DistanceOptions),
    Snap(SnapOptions),
    Wall(WallConfig),
    Walls(WallsOptions),
    Collision(CollisionOptions),
}

/// A single wall needs its plane in addition to the shared wall options.
#[derive(Deserialize, Debug, Clone)]
pub struct WallConfig {
    pub normal: [f64; 3],
    #[serde(default)]
    pub distance: f64,
    #[serde(flatten)]
    pub options: WallOptions,
}

/// An agent binding in a scenario file: the agent plus the body indices it
/// targets (all bodies when omitted) and an optional source body index.
#[derive(Deserialize, Debug, Clone)]
pub struct AgentEntry {
    #[serde(default)]
    pub targets: Option<Vec<usize>>,
    #[serde(default)]
    pub source: Option<usize>,
    #[serde(flatten)]
    pub agent: AgentKind,
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub engine: EngineOptions,
    pub bodies: Vec<BodyConfig>,
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

impl ScenarioConfig {
    /// Build a running engine from this configuration.
    ///
    /// Returns the engine together with the body ids in file order, so the
    /// caller can keep addressing bodies by their scenario index.
    pub fn build(self) -> Result<(PhysicsEngine, Vec<BodyId>), PhysicsError> {
        let mut engine = PhysicsEngine::new(self.engine);

        // Bodies: map BodyConfig -> runtime Dynamics, keeping file order
        let mut ids = Vec::with_capacity(self.bodies.len());
        for bc in &self.bodies {
            let position = Vec3::from(bc.position);
            let body = match bc.geometry.clone() {
                Some(geometry) => Dynamics::body(position, bc.mass, geometry.into())?,
                None => Dynamics::particle(position, bc.mass)?,
            };
            let id = engine.add_body(body);
            engine
                .body_mut(id)
                .expect("freshly added body")
                .set_velocity(Vec3::from(bc.velocity));
            ids.push(id);
        }

        // Agents: validate index references, then construct and attach
        let count = ids.len();
        for entry in self.agents {
            let targets = entry
                .targets
                .map(|indices| {
                    indices
                        .into_iter()
                        .map(|index| {
                            ids.get(index)
                                .copied()
                                .ok_or(PhysicsError::BodyIndexOutOfRange { index, count })
                        })
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
            let source = entry
                .source
                .map(|index| {
                    ids.get(index)
                        .copied()
                        .ok_or(PhysicsError::BodyIndexOutOfRange { index, count })
                })
                .transpose()?;

            let agent = match entry.agent {
                AgentKind::Spring(options) => Agent::force(Spring::new(options)?),
                AgentKind::Drag(options) => Agent::force(Drag::new(options)),
                AgentKind::Repulsion(options) => Agent::force(Repulsion::new(options)?),
                AgentKind::VectorField(options) => Agent::force(VectorField::new(options)),
                AgentKind::RotationalSpring(options) => {
                    Agent::force(RotationalSpring::new(options)?)
                }
                AgentKind::RotationalDrag(options) => Agent::force(RotationalDrag::new(options)),
                AgentKind::Distance(options) => Agent::constraint(Distance::new(options)?),
                AgentKind::Snap(options) => Agent::constraint(Snap::new(options)?),
                AgentKind::Wall(config) => Agent::constraint(Wall::new(
                    Vec3::from(config.normal),
                    config.distance,
                    config.options,
                )?),
                AgentKind::Walls(options) => Agent::constraint(Walls::new(options)?),
                AgentKind::Collision(options) => Agent::constraint(Collision::new(options)?),
            };
            engine.attach(agent, targets, source);
        }

        Ok((engine, ids))
    }
}
