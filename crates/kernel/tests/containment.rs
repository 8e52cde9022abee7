//! Dam-break containment test.
//!
//! A block of fluid released on one side of the container collapses under
//! gravity. After every step all particles must stay inside the container
//! (shrunk by the particle radius) and outside the obstacle, with finite
//! state throughout.

use fluid_kernel::boundary::is_contained;
use fluid_kernel::{FluidSimulation, ParticleSpawner, SimParams};
use glam::Vec2;

const DT: f32 = 1.0 / 180.0;

fn dam_break(params: SimParams) -> FluidSimulation {
    let spawn = ParticleSpawner {
        count: 400,
        centre: Vec2::new(-3.0, 0.0),
        size: Vec2::new(2.2, 2.2),
        initial_velocity: Vec2::ZERO,
        jitter_strength: 0.03,
        seed: 42,
    }
    .spawn();
    FluidSimulation::from_spawn(params, &spawn).unwrap()
}

#[test]
fn dam_break_stays_inside_container() {
    let params = SimParams::default().with_particle_radius(0.05);
    let mut sim = dam_break(params);

    for step in 0..150 {
        sim.step(DT);
        for (i, p) in sim.positions().iter().enumerate() {
            assert!(p.is_finite(), "step {step}: particle {i} position {p:?}");
            assert!(
                is_contained(*p, &params, 1.0e-5),
                "step {step}: particle {i} escaped to {p:?}"
            );
        }
        assert!(sim.velocities().iter().all(|v| v.is_finite()), "step {step}: non-finite velocity");
    }

    // The block has fallen towards the floor.
    let lowest = sim.positions().iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    assert!(lowest < -params.half_bounds.y + 1.0, "lowest particle at {lowest}");
}

#[test]
fn dam_break_flows_around_obstacle() {
    let params = SimParams::default()
        .with_particle_radius(0.05)
        .with_obstacle(Vec2::new(-3.0, -3.0), Vec2::new(1.0, 1.0));
    let mut sim = dam_break(params);

    for step in 0..150 {
        sim.step(DT);
        for (i, p) in sim.positions().iter().enumerate() {
            let local = (*p - params.obstacle_centre).abs();
            let inside = local.x < params.obstacle_half_size.x - 1.0e-4
                && local.y < params.obstacle_half_size.y - 1.0e-4;
            assert!(!inside, "step {step}: particle {i} inside obstacle at {p:?}");
            assert!(is_contained(*p, &params, 1.0e-5));
        }
    }
}

#[test]
fn stats_track_the_collapse() {
    let mut sim = dam_break(SimParams::default());
    sim.step(DT);
    let early = sim.stats();
    for _ in 0..60 {
        sim.step(DT);
    }
    let later = sim.stats();

    assert!(early.min_density > 0.0 && later.min_density > 0.0);
    assert!(
        later.kinetic_energy > early.kinetic_energy,
        "falling fluid should gain energy: {early:?} -> {later:?}"
    );
    assert!(later.occupied_cells > 0);
}
