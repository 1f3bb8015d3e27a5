//! Hand-rolled micro benchmarks for the step loop.
//!
//! Timed with `std::time::Instant` over a range of body counts; run via the
//! demo binary rather than the test harness so results are easy to eyeball.

use std::time::Instant;

use crate::bodies::{Dynamics, Geometry};
use crate::math::Vec3;
use crate::simulation::constraints::{Collision, CollisionOptions};
use crate::simulation::engine::{Agent, EngineOptions, PhysicsEngine};
use crate::simulation::forces::{Drag, DragOptions, Spring, SpringOptions};

/// Deterministic scattered position for body `i`, no rand needed.
fn scatter(i: usize) -> Vec3 {
    let i_f = i as f64;
    Vec3::new(
        (i_f * 0.37).sin() * 5.0,
        (i_f * 0.13).cos() * 5.0,
        (i_f * 0.07).sin() * 5.0,
    )
}

/// Time one step of an all-bodies spring + drag system at increasing sizes.
pub fn bench_spring_step() {
    let ns = [100, 200, 400, 800, 1600, 3200];

    for n in ns {
        let mut engine = PhysicsEngine::new(EngineOptions::default());
        for i in 0..n {
            let particle = Dynamics::particle(scatter(i), 1.0).expect("valid mass");
            engine.add_body(particle);
        }
        engine.attach(
            Agent::force(Spring::new(SpringOptions::default()).expect("valid options")),
            None,
            None,
        );
        engine.attach(Agent::force(Drag::new(DragOptions::default())), None, None);

        // Warm up
        engine.step_by(1.0 / 60.0);

        let t0 = Instant::now();
        engine.step_by(1.0 / 60.0);
        let elapsed = t0.elapsed().as_secs_f64();

        println!("N = {n:5}, spring+drag step = {elapsed:9.6} s");
    }
}

/// Time the all-pairs collision sweep, the quadratic part of the step.
pub fn bench_collision_step() {
    let ns = [50, 100, 200, 400, 800];

    for n in ns {
        let mut engine = PhysicsEngine::new(EngineOptions {
            iterations: 4,
            ..EngineOptions::default()
        });
        for i in 0..n {
            let body = Dynamics::body(scatter(i), 1.0, Geometry::Circle { radius: 0.3 })
                .expect("valid geometry");
            engine.add_body(body);
        }
        engine.attach(
            Agent::constraint(Collision::new(CollisionOptions::default()).expect("valid options")),
            None,
            None,
        );

        engine.step_by(1.0 / 60.0);

        let t0 = Instant::now();
        engine.step_by(1.0 / 60.0);
        let elapsed = t0.elapsed().as_secs_f64();

        println!("N = {n:5}, collision step = {elapsed:9.6} s");
    }
}
