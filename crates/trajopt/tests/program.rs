use std::f64::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use dirtran_core::{NonlinearProgram, linalg};
use dirtran_plants::{FourBar, Pendulum};
use dirtran_trajopt::{DirectTranscription, Error, JointLimitForce, Phase};
use nalgebra::DVector;

#[test]
fn constructor_preconditions() {
    let plant = Pendulum::default();

    assert!(matches!(
        DirectTranscription::new(&plant, 1, 0.1, 0.2),
        Err(Error::InvalidSampleCount(1))
    ));
    assert!(matches!(
        DirectTranscription::new(&plant, 3, 0.0, 0.2),
        Err(Error::InvalidTimeStepBounds { .. })
    ));
    assert!(matches!(
        DirectTranscription::new(&plant, 3, 0.3, 0.2),
        Err(Error::InvalidTimeStepBounds { .. })
    ));
    assert!(matches!(
        DirectTranscription::new(&plant, 3, 0.1, f64::INFINITY),
        Err(Error::InvalidTimeStepBounds { .. })
    ));
}

#[test]
fn variable_layout_and_default_guess() {
    let plant = FourBar::default();
    let program = DirectTranscription::new(&plant, 5, 0.01, 0.1).expect("valid");

    // h: 4, q: 3×5, v: 3×5, u: 1×5, λ: 2×5.
    assert_eq!(program.num_variables(), 4 + 15 + 15 + 5 + 10);
    assert_eq!(program.time_steps().len(), 4);
    assert_eq!(program.generalized_positions().shape(), (3, 5));
    assert_eq!(program.generalized_velocities().shape(), (3, 5));
    assert_eq!(program.inputs().shape(), (1, 5));
    assert_eq!(program.position_constraint_forces().shape(), (2, 5));
    assert_eq!(program.time_steps()[0].index(), 0);
    assert_eq!(program.generalized_positions()[(0, 0)].index(), 4);
    assert_eq!(program.generalized_positions()[(0, 1)].index(), 7);

    let guess = program.initial_guess();
    let bounds = program.variable_bounds();
    for h in program.time_steps() {
        assert_relative_eq!(guess[h.index()], 0.055);
        assert_eq!(bounds.lower[h.index()], 0.01);
        assert_eq!(bounds.upper[h.index()], 0.1);
    }
    assert_eq!(guess[program.generalized_positions()[(1, 2)].index()], 0.0);
    assert!(matches!(
        program.input(5),
        Err(Error::IndexOutOfRange { index: 5, len: 5, .. })
    ));
}

#[test]
fn phases_gate_structure_and_solutions() {
    let plant = Pendulum::default();
    let mut program = DirectTranscription::new(&plant, 3, 0.05, 0.1).expect("valid");
    let q = program.generalized_positions().clone();

    assert_eq!(program.phase(), Phase::Building);
    assert!(matches!(program.solve(), Err(Error::NotCompiled)));
    assert!(matches!(program.get_solution(&q), Err(Error::NotSolved)));
    assert!(matches!(program.sample_times(), Err(Error::NotSolved)));

    program.compile().expect("compiles");
    assert_eq!(program.phase(), Phase::Compiled);
    assert_eq!(program.num_constraints(), 2 * 2);
    assert!(matches!(program.compile(), Err(Error::AlreadyCompiled)));
    assert!(matches!(
        program.add_bounding_box_constraint(0.0, 1.0, q.iter()),
        Err(Error::AlreadyCompiled)
    ));
    assert!(matches!(
        program.add_running_cost(|sample| linalg::squared_norm(&sample.u)),
        Err(Error::AlreadyCompiled)
    ));

    // Warm starts stay available after compiling.
    program
        .set_initial_guess(q.iter(), &[0.1, 0.2, 0.3])
        .expect("sized");
    assert_eq!(program.initial_guess()[q[(0, 2)].index()], 0.3);
    assert_eq!(program.status(), None);
}

#[test]
fn solutions_only_read_own_variables() {
    let plant = Pendulum::default();
    let mut program = DirectTranscription::new(&plant, 2, 0.05, 0.1).expect("valid");
    program
        .add_running_cost(|sample| linalg::squared_norm(&sample.u))
        .expect("building");
    program.compile().expect("compiles");
    program.solve().expect("solver runs");

    let larger = DirectTranscription::new(&plant, 5, 0.05, 0.1).expect("valid");
    let foreign = larger.generalized_positions()[(0, 4)];

    assert!(program.get_solution(program.generalized_positions()).is_ok());
    assert!(matches!(
        program.get_solution(&foreign),
        Err(Error::IndexOutOfRange { what: "variable", .. })
    ));
    assert!(matches!(
        program.get_solution(&(foreign + 1.0)),
        Err(Error::IndexOutOfRange { what: "variable", .. })
    ));
}

#[test]
fn bounding_boxes_intersect() {
    let plant = Pendulum::default();
    let mut program = DirectTranscription::new(&plant, 3, 0.05, 0.1).expect("valid");
    let q = program.generalized_positions()[(0, 1)];

    program
        .add_bounding_box_constraint(-1.0, 2.0, [q].iter())
        .expect("valid");
    program
        .add_bounding_box_constraint(0.5, 3.0, [q].iter())
        .expect("valid");

    let bounds = program.variable_bounds();
    assert_eq!(bounds.lower[q.index()], 0.5);
    assert_eq!(bounds.upper[q.index()], 2.0);

    assert!(matches!(
        program.add_bounding_box_constraint(2.5, 4.0, [q].iter()),
        Err(Error::InvalidBounds { .. })
    ));
    assert!(matches!(
        program.add_bounding_box_constraint(1.0, 0.0, [q].iter()),
        Err(Error::InvalidBounds { .. })
    ));

    // A failed call leaves the bounds untouched.
    let bounds = program.variable_bounds();
    assert_eq!(bounds.lower[q.index()], 0.5);
    assert_eq!(bounds.upper[q.index()], 2.0);
}

#[test]
fn joint_limits_add_multipliers_bounds_and_complementarity() {
    let plant = FourBar::default();
    let mut program = DirectTranscription::new(&plant, 5, 0.01, 0.1).expect("valid");
    let before = program.num_variables();

    let lambda = program
        .add_joint_limit_implicit_constraint(2, 1, 1, -FRAC_PI_2, FRAC_PI_2)
        .expect("valid");

    assert_eq!(program.num_variables(), before + 2);
    assert_eq!(lambda[0].index(), before);
    assert_eq!(program.num_constraints(), 2);

    let bounds = program.variable_bounds();
    let q = program.generalized_positions()[(1, 3)];
    assert_eq!(bounds.lower[q.index()], -FRAC_PI_2);
    assert_eq!(bounds.upper[q.index()], FRAC_PI_2);
    for multiplier in lambda {
        assert_eq!(bounds.lower[multiplier.index()], 0.0);
        assert_eq!(bounds.upper[multiplier.index()], f64::INFINITY);
    }

    let constraint_bounds = program.constraint_bounds();
    assert_eq!(constraint_bounds.upper, DVector::zeros(2));
    assert!(constraint_bounds.lower.iter().all(|lo| *lo == f64::NEG_INFINITY));

    // Dynamics rows: 4 intervals × (nq + nv).
    program.compile().expect("compiles");
    assert_eq!(program.num_constraints(), 2 + 4 * 6);
}

#[test]
fn out_of_range_indices_fail_immediately() {
    let plant = FourBar::default();
    let mut program = DirectTranscription::new(&plant, 5, 0.01, 0.1).expect("valid");

    assert!(matches!(
        program.add_joint_limit_implicit_constraint(4, 1, 1, -1.0, 1.0),
        Err(Error::IntervalOutOfRange {
            interval: 4,
            num_intervals: 4
        })
    ));
    assert!(matches!(
        program.add_joint_limit_implicit_constraint(0, 3, 1, -1.0, 1.0),
        Err(Error::IndexOutOfRange { what: "joint", .. })
    ));
    assert!(matches!(
        program.add_joint_limit_implicit_constraint(0, 1, 1, 1.0, -1.0),
        Err(Error::InvalidBounds { .. })
    ));
    assert!(matches!(
        program.add_position_constraint(5),
        Err(Error::IndexOutOfRange { what: "sample", .. })
    ));
    assert!(matches!(
        program.add_generalized_constraint_force(0, Box::new(JointLimitForce::new(3, -1.0, 1.0))),
        Err(Error::IndexOutOfRange {
            what: "joint limit dof",
            index: 3,
            len: 3
        })
    ));
    assert!(matches!(
        program.set_initial_guess(program.time_steps().clone().iter(), &[0.1]),
        Err(Error::DimensionMismatch {
            expected: 4,
            actual: 1,
            ..
        })
    ));
}

#[test]
fn time_step_constraints() {
    let plant = Pendulum::default();
    let mut program = DirectTranscription::new(&plant, 4, 0.05, 0.1).expect("valid");

    program.add_equal_time_intervals_constraints().expect("building");
    program.add_duration_bounds(0.2, 0.25).expect("valid");

    // Two equalities between three steps, then one duration row.
    let bounds = program.constraint_bounds();
    assert_eq!(bounds.lower, DVector::from_vec(vec![0.0, 0.0, 0.2]));
    assert_eq!(bounds.upper, DVector::from_vec(vec![0.0, 0.0, 0.25]));

    let mut x = program.initial_guess();
    let h = program.time_steps().clone();
    x[h[0].index()] = 0.06;
    x[h[1].index()] = 0.07;
    x[h[2].index()] = 0.08;
    let constraints = program.constraints(&x).expect("evaluates");
    assert_relative_eq!(
        constraints.values,
        DVector::from_vec(vec![-0.01, -0.01, 0.21]),
        epsilon = 1e-12
    );
}
