pub mod bodies;
pub mod benchmark;
pub mod configuration;
pub mod error;
pub mod math;
pub mod simulation;

pub use bodies::{Dynamics, Geometry, Particle, RotationalState};
pub use error::PhysicsError;
pub use math::{Mat3, Quat, Vec3};

pub use simulation::constraints::{
    Collision, Constraint, Curve, Distance, Snap, Surface, Wall, Walls,
};
pub use simulation::engine::{Agent, AgentId, EngineEvent, EngineOptions, PhysicsEngine};
pub use simulation::forces::{
    Drag, Force, Repulsion, RotationalDrag, RotationalSpring, Spring, VectorField,
};
pub use simulation::integrator::SymplecticEuler;
pub use simulation::states::{BodyId, BodySet};

pub use configuration::config::{AgentEntry, AgentKind, BodyConfig, ScenarioConfig};

pub use benchmark::benchmark::{bench_collision_step, bench_spring_step};
