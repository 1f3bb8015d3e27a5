use kinetica::simulation::engine::{Agent, EngineEvent, EngineOptions, PhysicsEngine};
use kinetica::simulation::forces::{
    Drag, DragOptions, FieldFunction, Repulsion, RepulsionOptions, RotationalSpring,
    RotationalSpringOptions, Spring, SpringOptions, VectorField, VectorFieldOptions,
};
use kinetica::{Dynamics, Geometry, PhysicsError, Vec3};

use kinetica::math;

use std::cell::RefCell;
use std::rc::Rc;

/// Engine with no step clamping surprises and the default solver.
pub fn test_engine() -> PhysicsEngine {
    PhysicsEngine::new(EngineOptions::default())
}

/// A unit-mass particle at `position`.
pub fn particle_at(position: Vec3) -> Dynamics {
    Dynamics::particle(position, 1.0).expect("valid mass")
}

/// A circle body of the given mass and radius at `position`.
pub fn circle_at(position: Vec3, mass: f64, radius: f64) -> Dynamics {
    Dynamics::body(position, mass, Geometry::Circle { radius }).expect("valid body")
}

// ==================================================================================
// Math tests
// ==================================================================================

#[test]
fn normalize_degenerate_falls_back_to_x_axis() {
    let v = math::normalize_or_axis(Vec3::new(1e-12, 0.0, 0.0), 3.0);
    assert_eq!(v, Vec3::new(3.0, 0.0, 0.0));

    let u = math::normalize_or_axis(Vec3::new(0.0, 4.0, 0.0), 2.0);
    assert!((u - Vec3::new(0.0, 2.0, 0.0)).norm() < 1e-12);
}

#[test]
fn quaternion_matrix_matches_axis_rotation() {
    // Round-trip: rotating by the matrix of an axis-aligned quaternion must
    // equal rotating directly about that axis.
    let theta = 0.73;
    let v = Vec3::new(1.0, 2.0, 3.0);

    let qz = math::quat_from_angle_axis(theta, Vec3::z());
    let via_matrix = math::quat_to_matrix(qz) * v;
    let direct = math::rotate_z(v, theta);
    assert!(
        (via_matrix - direct).norm() < 1e-12,
        "z mismatch: {via_matrix:?} vs {direct:?}"
    );

    let qx = math::quat_from_angle_axis(theta, Vec3::x());
    let via_matrix = math::quat_to_matrix(qx) * v;
    let direct = math::rotate_x(v, theta);
    assert!(
        (via_matrix - direct).norm() < 1e-12,
        "x mismatch: {via_matrix:?} vs {direct:?}"
    );
}

#[test]
fn transform_is_column_major_affine() {
    let q = math::quat_from_angle_axis(0.0, Vec3::z());
    let t = math::quat_to_transform(q, Vec3::new(7.0, 8.0, 9.0));
    // Identity rotation basis down the columns, translation in the fourth
    assert_eq!(t[0], 1.0);
    assert_eq!(t[5], 1.0);
    assert_eq!(t[10], 1.0);
    assert_eq!(&t[12..15], &[7.0, 8.0, 9.0]);
    assert_eq!(t[15], 1.0);
}

#[test]
fn gradient_of_sphere_field_points_outward() {
    let f = |p: Vec3| p.norm_squared() - 4.0;
    let g = math::gradient(&f, Vec3::new(2.0, 0.0, 0.0), 1e-5);
    // ∇(|p|² - 4) = 2p
    assert!((g - Vec3::new(4.0, 0.0, 0.0)).norm() < 1e-5, "got {g:?}");
}

// ==================================================================================
// Body tests
// ==================================================================================

#[test]
fn invalid_mass_is_rejected_at_construction() {
    assert_eq!(
        Dynamics::particle(Vec3::zeros(), 0.0).unwrap_err(),
        PhysicsError::InvalidMass(0.0)
    );
    assert!(Dynamics::particle(Vec3::zeros(), -1.0).is_err());
    assert!(Dynamics::particle(Vec3::zeros(), f64::INFINITY).is_err());
    assert!(Dynamics::particle(Vec3::zeros(), f64::NAN).is_err());
}

#[test]
fn impulse_bypasses_accumulator() {
    let mut p = particle_at(Vec3::zeros());
    p.apply_impulse(Vec3::new(2.0, 0.0, 0.0));
    // Velocity changes immediately, nothing pending in the accumulator
    assert_eq!(p.velocity(), Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(p.linear().accumulated_force(), Vec3::zeros());
}

#[test]
fn set_radius_recomputes_inertia() {
    let mut b = circle_at(Vec3::zeros(), 2.0, 1.0);
    let before = b.angular().unwrap().inertia()[(0, 0)];
    b.set_radius(2.0).unwrap();
    let after = b.angular().unwrap().inertia()[(0, 0)];
    // Disk inertia scales with r², so doubling the radius quadruples it
    assert!((after / before - 4.0).abs() < 1e-12);

    // Shape setters are checked against the actual geometry
    assert!(b.set_size(1.0, 1.0).is_err());
    assert!(particle_at(Vec3::zeros()).angular().is_none());
}

#[test]
fn body_energy_includes_rotation() {
    let mut b = circle_at(Vec3::zeros(), 1.0, 2.0);
    b.set_velocity(Vec3::new(3.0, 0.0, 0.0));
    let linear_only = b.energy();
    assert!((linear_only - 4.5).abs() < 1e-12);

    let a = b.angular_mut().unwrap();
    a.angular_velocity = Vec3::new(0.0, 0.0, 1.0);
    // Disk: I = m r²/4 = 1, so rotation adds 0.5
    assert!((b.energy() - 5.0).abs() < 1e-12);
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn free_body_many_small_steps_equal_one_large_step() {
    // Zero applied force: n steps of dt must equal one step of n·dt
    let dt = 0.017;
    let n = 40;

    let mut many = test_engine();
    let mut body = particle_at(Vec3::zeros());
    body.set_velocity(Vec3::new(1.0, -2.0, 0.5));
    let id_many = many.add_body(body.clone());
    for _ in 0..n {
        many.step_by(dt);
    }

    let mut once = test_engine();
    let id_once = once.add_body(body);
    once.step_by(dt * n as f64);

    let p_many = many.body(id_many).unwrap().position();
    let p_once = once.body(id_once).unwrap().position();
    assert!(
        (p_many - p_once).norm() < 1e-9,
        "drift between step schedules: {p_many:?} vs {p_once:?}"
    );
}

#[test]
fn angular_momentum_is_conserved_without_torque() {
    let mut engine = test_engine();
    let mut body = circle_at(Vec3::zeros(), 1.0, 1.0);
    body.angular_mut().unwrap().angular_momentum = Vec3::new(0.0, 0.0, 0.4);
    let id = engine.add_body(body);

    for _ in 0..200 {
        engine.step_by(0.016);
    }

    let a = engine.body(id).unwrap().angular().unwrap();
    assert!((a.angular_momentum - Vec3::new(0.0, 0.0, 0.4)).norm() < 1e-12);
    // The orientation actually advanced
    assert!((a.orientation.w - 1.0).abs() > 1e-3);
}

#[test]
fn velocity_cap_clamps_before_position_update() {
    let mut engine = PhysicsEngine::new(EngineOptions {
        max_velocity: Some(1.0),
        ..EngineOptions::default()
    });
    let id = engine.add_body(particle_at(Vec3::zeros()));
    engine
        .body_mut(id)
        .unwrap()
        .apply_force(Vec3::new(1e6, 0.0, 0.0));
    engine.step_by(0.016);

    let body = engine.body(id).unwrap();
    assert!(body.velocity().norm() <= 1.0 + 1e-12);
    // Position moved by at most the capped velocity times dt
    assert!(body.position().x <= 0.016 + 1e-12);
}

// ==================================================================================
// Force tests
// ==================================================================================

#[test]
fn critically_damped_spring_settles_without_overshoot() {
    // The concrete scenario: unit mass at the origin, spring of period
    // 300 ms at critical damping anchored at [100, 0, 0]; two seconds of
    // 17 ms frames must converge within ±1 with no material overshoot.
    let mut engine = test_engine();
    let id = engine.add_body(particle_at(Vec3::zeros()));
    let spring = Spring::new(SpringOptions {
        period: 0.3,
        damping_ratio: 1.0,
        anchor: Some([100.0, 0.0, 0.0]),
        ..SpringOptions::default()
    })
    .unwrap();
    engine.attach(Agent::force(spring), Some(vec![id]), None);

    let steps = (2.0_f64 / 0.017).ceil() as usize;
    for _ in 0..steps {
        engine.step_by(0.017);
        let x = engine.body(id).unwrap().position().x;
        assert!(x <= 102.0, "overshoot past the anchor: x = {x}");
    }

    let p = engine.body(id).unwrap().position();
    assert!(
        (p - Vec3::new(100.0, 0.0, 0.0)).norm() < 1.0,
        "did not settle: {p:?}"
    );
}

#[test]
fn spring_applies_reciprocal_force_to_source() {
    let mut engine = test_engine();
    let a = engine.add_body(particle_at(Vec3::zeros()));
    let b = engine.add_body(particle_at(Vec3::new(4.0, 0.0, 0.0)));
    let spring = Spring::new(SpringOptions {
        period: 0.5,
        damping_ratio: 0.0,
        ..SpringOptions::default()
    })
    .unwrap();
    engine.attach(Agent::force(spring), Some(vec![a]), Some(b));

    engine.step_by(0.016);

    let va = engine.body(a).unwrap().velocity();
    let vb = engine.body(b).unwrap().velocity();
    // Equal masses: momentum stays zero, the pair pulls together
    assert!((va + vb).norm() < 1e-9, "momentum not conserved");
    assert!(va.x > 0.0 && vb.x < 0.0);
}

#[test]
fn drag_opposes_velocity() {
    let mut engine = test_engine();
    let mut body = particle_at(Vec3::zeros());
    body.set_velocity(Vec3::new(5.0, 0.0, 0.0));
    let id = engine.add_body(body);
    engine.attach(
        Agent::force(Drag::new(DragOptions {
            strength: 0.5,
            ..DragOptions::default()
        })),
        None,
        None,
    );

    let mut previous = 5.0;
    for _ in 0..50 {
        engine.step_by(0.016);
        let speed = engine.body(id).unwrap().velocity().norm();
        assert!(speed <= previous + 1e-12, "drag increased speed");
        previous = speed;
    }
    assert!(previous < 5.0);
}

#[test]
fn repulsion_pushes_away_from_anchor() {
    let mut engine = test_engine();
    let id = engine.add_body(particle_at(Vec3::new(0.5, 0.0, 0.0)));
    engine.attach(
        Agent::force(
            Repulsion::new(RepulsionOptions {
                strength: 10.0,
                radius: 2.0,
                ..RepulsionOptions::default()
            })
            .unwrap(),
        ),
        None,
        None,
    );

    engine.step_by(0.016);
    assert!(engine.body(id).unwrap().velocity().x > 0.0);
}

#[test]
fn constant_field_acceleration_is_mass_independent() {
    let mut engine = test_engine();
    let light = engine.add_body(particle_at(Vec3::zeros()));
    let heavy = engine.add_body(Dynamics::particle(Vec3::new(5.0, 0.0, 0.0), 10.0).unwrap());
    engine.attach(
        Agent::force(VectorField::new(VectorFieldOptions {
            strength: 2.0,
            field: FieldFunction::Constant {
                direction: [0.0, -1.0, 0.0],
            },
        })),
        None,
        None,
    );

    engine.step_by(0.016);

    let vl = engine.body(light).unwrap().velocity();
    let vh = engine.body(heavy).unwrap().velocity();
    // Force scales with mass, so the induced acceleration does not
    assert!((vl - vh).norm() < 1e-12);
    assert!((vl.y - (-2.0 * 0.016)).abs() < 1e-12);
}

#[test]
fn rotational_spring_turns_body_toward_anchor_orientation() {
    let target_angle = 0.5;
    let anchor = math::quat_from_angle_axis(target_angle, Vec3::z());

    let mut engine = test_engine();
    let id = engine.add_body(circle_at(Vec3::zeros(), 1.0, 1.0));
    engine.attach(
        Agent::force(
            RotationalSpring::new(RotationalSpringOptions {
                period: 1.0,
                damping_ratio: 1.0,
                anchor: Some([anchor.w, anchor.i, anchor.j, anchor.k]),
            })
            .unwrap(),
        ),
        None,
        None,
    );

    for _ in 0..300 {
        engine.step_by(0.016);
    }

    let q = engine.body(id).unwrap().angular().unwrap().orientation;
    // Normalize on read: the integrator lets |q| drift
    let norm = (q.w * q.w + q.i * q.i + q.j * q.j + q.k * q.k).sqrt();
    let angle = 2.0 * (q.k / norm).atan2(q.w / norm);
    assert!(
        (angle - target_angle).abs() < 0.05,
        "settled at {angle}, wanted {target_angle}"
    );
}

// ==================================================================================
// Engine tests
// ==================================================================================

#[test]
fn energy_is_non_negative_and_tracks_spring_potential() {
    let mut engine = test_engine();
    let id = engine.add_body(particle_at(Vec3::new(3.0, 0.0, 0.0)));
    engine.attach(
        Agent::force(
            Spring::new(SpringOptions {
                period: 0.5,
                damping_ratio: 0.2,
                ..SpringOptions::default()
            })
            .unwrap(),
        ),
        Some(vec![id]),
        None,
    );

    let initial = engine.energy();
    assert!(initial > 0.0, "stretched spring holds potential energy");

    for _ in 0..100 {
        engine.step_by(0.016);
        assert!(engine.energy() >= 0.0);
    }
    // Damping dissipates; total energy must not grow
    assert!(engine.energy() < initial * 1.05);
}

#[test]
fn default_targets_cover_bodies_added_later() {
    let mut engine = test_engine();
    engine.attach(
        Agent::force(VectorField::new(VectorFieldOptions {
            strength: 1.0,
            field: FieldFunction::Constant {
                direction: [1.0, 0.0, 0.0],
            },
        })),
        None,
        None,
    );

    // Attached before the body existed; an all-bodies binding resolves at
    // apply time and still covers it
    let id = engine.add_body(particle_at(Vec3::zeros()));
    engine.step_by(0.016);
    assert!(engine.body(id).unwrap().velocity().x > 0.0);
}

#[test]
fn removing_a_source_body_removes_the_binding() {
    let mut engine = test_engine();
    let target = engine.add_body(particle_at(Vec3::zeros()));
    let source = engine.add_body(particle_at(Vec3::new(5.0, 0.0, 0.0)));
    engine.attach(
        Agent::force(Spring::new(SpringOptions::default()).unwrap()),
        Some(vec![target]),
        Some(source),
    );
    assert_eq!(engine.agent_count(), 1);

    engine.remove_body(source);
    assert_eq!(engine.agent_count(), 0, "source removal drops the binding");

    // Stale body id: local no-op
    assert!(engine.remove_body(source).is_none());
}

#[test]
fn detach_with_stale_id_is_a_no_op() {
    let mut engine = test_engine();
    let id = engine.attach(
        Agent::force(Drag::new(DragOptions::default())),
        None,
        None,
    );
    engine.detach(id);
    assert_eq!(engine.agent_count(), 0);

    // Second detach of the same id and a detach after slot reuse both no-op
    engine.detach(id);
    let replacement = engine.attach(
        Agent::force(Drag::new(DragOptions::default())),
        None,
        None,
    );
    engine.detach(id);
    assert_eq!(engine.agent_count(), 1, "stale id must not hit the new agent");
    engine.detach(replacement);
    assert_eq!(engine.agent_count(), 0);
}

#[test]
fn sleep_and_wake_emit_start_and_end() {
    let events: Rc<RefCell<Vec<EngineEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);

    let mut engine = test_engine();
    engine.on(move |e| sink.borrow_mut().push(*e));

    engine.sleep();
    engine.sleep(); // no duplicate notification
    engine.wake();

    assert_eq!(&*events.borrow(), &[EngineEvent::End, EngineEvent::Start]);
}

#[test]
fn sleeping_engine_and_sleeping_bodies_do_not_advance() {
    let mut engine = test_engine();
    let mut body = particle_at(Vec3::zeros());
    body.set_velocity(Vec3::new(1.0, 0.0, 0.0));
    let id = engine.add_body(body);

    engine.sleep();
    engine.step_by(0.016);
    assert_eq!(engine.body(id).unwrap().position(), Vec3::zeros());

    engine.wake();
    engine.body_mut(id).unwrap().sleep();
    engine.step_by(0.016);
    assert_eq!(engine.body(id).unwrap().position(), Vec3::zeros());

    engine.body_mut(id).unwrap().wake();
    engine.step_by(0.016);
    assert!(engine.body(id).unwrap().position().x > 0.0);
}

#[test]
fn non_finite_body_is_quarantined() {
    let mut engine = test_engine();
    let id = engine.add_body(particle_at(Vec3::zeros()));
    engine
        .body_mut(id)
        .unwrap()
        .set_velocity(Vec3::new(f64::NAN, 0.0, 0.0));

    engine.step_by(0.016);
    assert!(
        engine.body(id).unwrap().is_sleeping(),
        "NaN body must be put to sleep instead of corrupting the simulation"
    );
}

#[test]
fn update_event_fires_per_body_per_step() {
    let count = Rc::new(RefCell::new(0usize));
    let sink = Rc::clone(&count);

    let mut engine = test_engine();
    engine.add_body(particle_at(Vec3::zeros()));
    engine.add_body(particle_at(Vec3::new(1.0, 0.0, 0.0)));
    engine.on(move |e| {
        if matches!(e, EngineEvent::Update(_)) {
            *sink.borrow_mut() += 1;
        }
    });

    engine.step_by(0.016);
    assert_eq!(*count.borrow(), 2);
}
