//! The physics engine: body ownership, the agent registry, and the
//! fixed-step loop.
//!
//! One engine exclusively owns all of its simulation state. It performs no
//! scheduling of its own: an external caller drives it by invoking
//! [`PhysicsEngine::step`] once per animation frame (typically ~16 ms), and
//! reads body state back afterwards. Nothing here blocks or suspends.
//!
//! Agents (forces and constraints) are never owned by bodies. Each is
//! registered once and bound to a set of target bodies plus an optional
//! source body; the binding lives in a generational arena, so detaching with
//! a stale id is a harmless no-op rather than a hit on an unrelated agent.
//!
//! Control flow per step:
//!
//! ```text
//! apply all forces
//! integrate velocities (+ angular momenta)
//! apply all constraints, N solver iterations
//! integrate orientations
//! integrate positions
//! post-step finiteness check (offending bodies quarantined)
//! emit one update notification per body
//! ```

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::bodies::Dynamics;
use crate::simulation::constraints::Constraint;
use crate::simulation::forces::Force;
use crate::simulation::integrator::SymplecticEuler;
use crate::simulation::states::{BodyId, BodySet};

/// A force or constraint, as stored in the agent registry.
pub enum Agent {
    Force(Box<dyn Force>),
    Constraint(Box<dyn Constraint>),
}

impl Agent {
    pub fn force(f: impl Force + 'static) -> Self {
        Agent::Force(Box::new(f))
    }

    pub fn constraint(c: impl Constraint + 'static) -> Self {
        Agent::Constraint(Box::new(c))
    }
}

/// Opaque handle to a registered agent binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId {
    index: u32,
    generation: u32,
}

/// An agent together with its target set and optional source body.
/// `targets: None` means "every registered body", resolved at apply time so
/// bodies added later are covered automatically.
struct Binding {
    agent: Agent,
    targets: Option<Vec<BodyId>>,
    source: Option<BodyId>,
}

struct AgentSlot {
    generation: u32,
    binding: Option<Binding>,
}

/// Notifications emitted by the engine to registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine woke up and will simulate on subsequent steps.
    Start,
    /// The engine went to sleep; steps are no-ops until woken.
    End,
    /// A body's state was advanced by one step.
    Update(BodyId),
}

/// Engine-level options. Unspecified keys keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Wall-clock frames shorter than this are rejected outright.
    pub min_step: f64,
    /// Wall-clock frames longer than this are clamped (a background tab
    /// returning after seconds must not explode into one giant step).
    pub max_step: f64,
    /// Constraint solver iterations per step.
    pub iterations: usize,
    /// Optional |v| clamp applied by the integrator.
    pub max_velocity: Option<f64>,
    /// Optional |ω| clamp applied by the integrator.
    pub max_angular_velocity: Option<f64>,
    /// Energy threshold stored for callers implementing their own sleep
    /// policy. The engine itself never auto-sleeps a body on energy; sleep
    /// and wake stay manual (see DESIGN.md).
    pub sleep_tolerance: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            min_step: 1.0 / 120.0,
            max_step: 1.0 / 15.0,
            iterations: 10,
            max_velocity: None,
            max_angular_velocity: None,
            sleep_tolerance: 1e-7,
        }
    }
}

/// Constraint-based rigid-body simulation core.
pub struct PhysicsEngine {
    bodies: BodySet,
    agents: Vec<AgentSlot>,
    free_agents: Vec<u32>,
    options: EngineOptions,
    integrator: SymplecticEuler,
    asleep: bool,
    last_step: Option<Instant>,
    handlers: Vec<Box<dyn FnMut(&EngineEvent)>>,
}

impl PhysicsEngine {
    pub fn new(options: EngineOptions) -> Self {
        let integrator = SymplecticEuler {
            max_velocity: options.max_velocity,
            max_angular_velocity: options.max_angular_velocity,
        };
        Self {
            bodies: BodySet::new(),
            agents: Vec::new(),
            free_agents: Vec::new(),
            options,
            integrator,
            asleep: false,
            last_step: None,
            handlers: Vec::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // Bodies
    // ------------------------------------------------------------------

    /// Register a body and wake the engine.
    pub fn add_body(&mut self, body: Dynamics) -> BodyId {
        self.wake();
        self.bodies.insert(body)
    }

    /// Unregister a body. Every binding loses it from its target set; a
    /// binding whose sole source it was is removed entirely. Stale ids are
    /// a no-op returning `None`.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Dynamics> {
        let removed = self.bodies.remove(id)?;
        for (index, slot) in self.agents.iter_mut().enumerate() {
            let Some(binding) = slot.binding.as_mut() else {
                continue;
            };
            if binding.source == Some(id) {
                slot.binding = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_agents.push(index as u32);
                continue;
            }
            if let Some(targets) = binding.targets.as_mut() {
                targets.retain(|&t| t != id);
            }
        }
        Some(removed)
    }

    pub fn body(&self, id: BodyId) -> Option<&Dynamics> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Dynamics> {
        self.bodies.get_mut(id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body_ids(&self) -> Vec<BodyId> {
        self.bodies.ids()
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Register an agent. `targets: None` binds it to every registered body,
    /// including ones added after this call; `source` optionally anchors the
    /// agent to one body (springs, tethers).
    pub fn attach(
        &mut self,
        agent: Agent,
        targets: Option<Vec<BodyId>>,
        source: Option<BodyId>,
    ) -> AgentId {
        let binding = Binding {
            agent,
            targets,
            source,
        };
        if let Some(index) = self.free_agents.pop() {
            let slot = &mut self.agents[index as usize];
            slot.binding = Some(binding);
            return AgentId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.agents.len() as u32;
        self.agents.push(AgentSlot {
            generation: 0,
            binding: Some(binding),
        });
        AgentId {
            index,
            generation: 0,
        }
    }

    /// Add one body to an agent's target set. A no-op for stale agent ids,
    /// for duplicate targets, and for all-bodies bindings (which already
    /// cover every body).
    pub fn attach_to(&mut self, id: AgentId, target: BodyId) {
        if let Some(binding) = self.binding_mut(id) {
            if let Some(targets) = binding.targets.as_mut() {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }

    /// Remove an agent binding. Stale ids are a no-op.
    pub fn detach(&mut self, id: AgentId) {
        let Some(slot) = self.agents.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation || slot.binding.is_none() {
            return;
        }
        slot.binding = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_agents.push(id.index);
    }

    /// Remove one body from an agent's target set. No-op for stale ids and
    /// for all-bodies bindings.
    pub fn detach_from(&mut self, id: AgentId, target: BodyId) {
        if let Some(binding) = self.binding_mut(id) {
            if let Some(targets) = binding.targets.as_mut() {
                targets.retain(|&t| t != target);
            }
        }
    }

    /// Clear every agent binding. Bodies are untouched.
    pub fn detach_all(&mut self) {
        for (index, slot) in self.agents.iter_mut().enumerate() {
            if slot.binding.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_agents.push(index as u32);
            }
        }
    }

    pub fn agent_count(&self) -> usize {
        self.agents.iter().filter(|s| s.binding.is_some()).count()
    }

    fn binding_mut(&mut self, id: AgentId) -> Option<&mut Binding> {
        let slot = self.agents.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.binding.as_mut()
    }

    // ------------------------------------------------------------------
    // Sleep / wake and events
    // ------------------------------------------------------------------

    pub fn is_sleeping(&self) -> bool {
        self.asleep
    }

    /// Put the whole engine to sleep; `step` becomes a no-op until `wake`.
    /// Emits `End` on the awake→asleep transition.
    pub fn sleep(&mut self) {
        if !self.asleep {
            self.asleep = true;
            debug!("engine sleeping");
            self.emit(EngineEvent::End);
        }
    }

    /// Wake the engine. Emits `Start` on the asleep→awake transition and
    /// resets the wall-clock baseline so the dormant interval is not
    /// integrated as one huge step.
    pub fn wake(&mut self) {
        if self.asleep {
            self.asleep = false;
            self.last_step = None;
            debug!("engine waking");
            self.emit(EngineEvent::Start);
        }
    }

    /// Register a notification handler for `Start`/`End`/`Update` events.
    pub fn on(&mut self, handler: impl FnMut(&EngineEvent) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    fn emit(&mut self, event: EngineEvent) {
        for handler in &mut self.handlers {
            handler(&event);
        }
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Advance by the wall-clock time since the previous call, clamped to
    /// `[min_step, max_step]`. Sub-threshold frames are rejected (no state
    /// change, the elapsed time keeps accumulating); runaway frames are
    /// clamped. The first call after construction or `wake` integrates one
    /// `min_step`.
    pub fn step(&mut self) {
        if self.asleep {
            return;
        }
        let now = Instant::now();
        let elapsed = match self.last_step {
            Some(previous) => now.duration_since(previous).as_secs_f64(),
            None => self.options.min_step,
        };
        if elapsed < self.options.min_step {
            return;
        }
        self.last_step = Some(now);
        self.step_by(elapsed.min(self.options.max_step));
    }

    /// Advance by an explicit `dt`. This is the deterministic form `step`
    /// delegates to, and the one tests drive directly.
    pub fn step_by(&mut self, dt: f64) {
        if self.asleep || !(dt > 0.0) {
            return;
        }

        let awake: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(_, b)| !b.is_sleeping())
            .map(|(id, _)| id)
            .collect();
        if awake.is_empty() {
            return;
        }

        // Forces fill the accumulators
        for i in 0..self.agents.len() {
            let Some(binding) = self.agents[i].binding.as_ref() else {
                continue;
            };
            if let Agent::Force(_) = binding.agent {
                let targets = resolve_targets(&self.bodies, binding.targets.as_deref(), &awake);
                let source = binding.source;
                // Reborrow mutably now that the target list is resolved
                let Some(binding) = self.agents[i].binding.as_mut() else {
                    continue;
                };
                if let Agent::Force(force) = &binding.agent {
                    force.apply(&mut self.bodies, &targets, source);
                }
            }
        }

        // Velocity kick (linear + angular momentum)
        for &id in &awake {
            if let Some(body) = self.bodies.get_mut(id) {
                self.integrator.integrate_velocity(body, dt);
                self.integrator.integrate_angular_momentum(body, dt);
            }
        }

        // Sequential impulses, N sweeps
        for _ in 0..self.options.iterations {
            for i in 0..self.agents.len() {
                let Some(binding) = self.agents[i].binding.as_ref() else {
                    continue;
                };
                if let Agent::Constraint(_) = binding.agent {
                    let targets = resolve_targets(&self.bodies, binding.targets.as_deref(), &awake);
                    let source = binding.source;
                    let Some(binding) = self.agents[i].binding.as_mut() else {
                        continue;
                    };
                    if let Agent::Constraint(constraint) = &mut binding.agent {
                        constraint.apply(&mut self.bodies, &targets, source, dt);
                    }
                }
            }
        }

        // Orientation and position drifts
        for &id in &awake {
            if let Some(body) = self.bodies.get_mut(id) {
                self.integrator.integrate_orientation(body, dt);
                self.integrator.integrate_position(body, dt);
            }
        }

        // Finiteness quarantine: a NaN/∞ body is slept instead of poisoning
        // subsequent steps through shared agents.
        for &id in &awake {
            if let Some(body) = self.bodies.get_mut(id) {
                let p = body.position();
                let v = body.velocity();
                if !(p.iter().all(|c| c.is_finite()) && v.iter().all(|c| c.is_finite())) {
                    warn!(?id, "non-finite body state after step, putting body to sleep");
                    body.sleep();
                }
            }
        }

        for &id in &awake {
            self.emit(EngineEvent::Update(id));
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Total energy: kinetic over all bodies plus potential over all agents.
    /// Non-negative for physically valid masses and stiffnesses.
    pub fn energy(&self) -> f64 {
        let kinetic: f64 = self.bodies.iter().map(|(_, b)| b.energy()).sum();
        let all = self.bodies.ids();
        let potential: f64 = self
            .agents
            .iter()
            .filter_map(|slot| slot.binding.as_ref())
            .map(|binding| {
                let targets = binding.targets.as_deref().unwrap_or(&all);
                match &binding.agent {
                    Agent::Force(f) => f.potential_energy(&self.bodies, targets, binding.source),
                    Agent::Constraint(c) => {
                        c.potential_energy(&self.bodies, targets, binding.source)
                    }
                }
            })
            .sum();
        kinetic + potential
    }
}

/// Resolve a binding's target list against the awake set: explicit targets
/// are filtered to live, awake bodies; an omitted list means every awake
/// body. An agent that resolves to no targets is a no-op this step.
fn resolve_targets(
    bodies: &BodySet,
    targets: Option<&[BodyId]>,
    awake: &[BodyId],
) -> Vec<BodyId> {
    match targets {
        Some(explicit) => explicit
            .iter()
            .copied()
            .filter(|&id| bodies.get(id).map(|b| !b.is_sleeping()).unwrap_or(false))
            .collect(),
        None => awake.to_vec(),
    }
}
