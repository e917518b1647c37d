//! # Follower Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use follower_lib::{
    control_loop::ControlLoop,
    path::{CircularArc, HeadingInterp, Path, PathChain},
    sim::{SimParams, SimRobot},
    traj_ctrl::{Follower, Params},
};
use nalgebra::Vector2;
use std::f64::consts::FRAC_PI_2;
use util::logger::{logger_init_stdout, LevelFilter, LogLevels};

fn follower_benchmark(c: &mut Criterion) {
    // Warnings only, the per cycle output would swamp the timings
    logger_init_stdout(&LogLevels {
        min_level: LevelFilter::Warn,
        cycle_targets: &[],
        cycle_level: LevelFilter::Warn,
    })
    .unwrap();

    // ---- Build the follower and a simulated robot ----

    let params = Params::default();

    // Quarter circle to the left, facing along the path
    let arc = Path::new(
        CircularArc::from_start(Vector2::zeros(), 0.0, 24.0, FRAC_PI_2),
        HeadingInterp::Tangential,
    )
    .unwrap();

    let mut follower = Follower::new(&params).unwrap();

    // Hold the end so the follower never goes idle however long the bench runs
    follower.follow(PathChain::from(arc.clone()), true).unwrap();

    let robot = SimRobot::new(&SimParams::default(), &params.drive_signature);
    let mut control_loop = ControlLoop::new(follower, robot);

    // Bench one full cycle, including the simulation step
    c.bench_function("ControlLoop::run_cycle", |b| {
        b.iter(|| {
            control_loop.run_cycle();
            control_loop.robot_mut().step();
        })
    });

    // Bench the closest point search on its own
    let point = Vector2::new(20.0, 10.0);
    c.bench_function("Path::closest_t::arc", |b| {
        b.iter(|| arc.closest_t(&point, 0.5))
    });
}

criterion_group!(benches, follower_benchmark);
criterion_main!(benches);
