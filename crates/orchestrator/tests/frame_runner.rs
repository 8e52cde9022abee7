//! Scene loading and frame-driving tests.
//!
//! Loads the shipped scene files, drives them frame by frame through the
//! runner with host input, and checks pause, reset and containment behaviour
//! end to end.

use fluid_kernel::boundary::is_contained;
use fluid_kernel::InteractionInput;
use fluid_orchestrator::{create_simulation, FrameRunner, HostInput, RunnerState, SimulationConfig};
use glam::Vec2;

const FRAME: f32 = 1.0 / 60.0;

/// Resolve a path relative to the workspace root.
fn project_path(relative: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let project_root = std::path::Path::new(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .expect("Could not find project root");
    project_root.join(relative).to_string_lossy().to_string()
}

fn small_scene(config_file: &str, particle_count: usize) -> FrameRunner {
    let mut config = SimulationConfig::load(&project_path(config_file)).unwrap();
    config.particle_count = particle_count;
    config.cell_table_size = Some(2 * particle_count);
    FrameRunner::from_config(&config).unwrap()
}

#[test]
fn shipped_scenes_load_and_validate() {
    for file in ["configs/dam-break-2d.json", "configs/obstacle-2d.json"] {
        let config = SimulationConfig::load(&project_path(file))
            .unwrap_or_else(|e| panic!("{file} failed to load: {e}"));
        assert!(config.particle_count > 0);
        assert!(config.to_params().validate().is_ok());
    }

    let config = SimulationConfig::load(&project_path("configs/obstacle-2d.json")).unwrap();
    assert!(config.to_params().has_obstacle());
}

#[test]
fn create_simulation_builds_runner() {
    let runner = create_simulation(&project_path("configs/dam-break-2d.json")).unwrap();
    assert_eq!(runner.simulation().particle_count(), 4096);
    assert_eq!(runner.state(), RunnerState::Running);
}

#[test]
fn missing_config_reports_path() {
    let err = SimulationConfig::load("does/not/exist.json").unwrap_err();
    assert!(err.contains("does/not/exist.json"), "{err}");
}

#[test]
fn invalid_json_is_rejected() {
    let err = SimulationConfig::from_json_str("{ \"particle_count\": ").unwrap_err();
    assert!(err.contains("parse"), "{err}");

    let err = SimulationConfig::from_json_str(r#"{ "fluid": { "smoothing_radius": 0.0 } }"#)
        .unwrap_err();
    assert!(err.contains("smoothing radius"), "{err}");
}

#[test]
fn frames_keep_fluid_contained() {
    let mut runner = small_scene("configs/obstacle-2d.json", 256);
    let params = *runner.simulation().params();

    for frame in 0..60 {
        let report = runner.advance(FRAME, &HostInput::default());
        assert_eq!(report.steps, 3);
        for (i, p) in runner.simulation().positions().iter().enumerate() {
            assert!(
                is_contained(*p, &params, 1.0e-5),
                "frame {frame}: particle {i} escaped to {p:?}"
            );
        }
    }
    assert!((runner.sim_time() - 1.0).abs() < 1.0e-3, "sim_time {}", runner.sim_time());
}

#[test]
fn pause_and_single_step_via_host_input() {
    let mut runner = small_scene("configs/dam-break-2d.json", 128);

    let pause = HostInput { toggle_pause: true, ..Default::default() };
    assert_eq!(runner.advance(FRAME, &pause).steps, 0);
    let frozen = runner.simulation().positions().to_vec();

    for _ in 0..5 {
        runner.advance(FRAME, &HostInput::default());
    }
    assert_eq!(runner.simulation().positions(), frozen.as_slice());

    let step = HostInput { step_once: true, ..Default::default() };
    let report = runner.advance(FRAME, &step);
    assert_eq!(report.steps, 3);
    assert_eq!(report.state, RunnerState::Paused);
    assert_ne!(runner.simulation().positions(), frozen.as_slice());
}

#[test]
fn reset_restores_spawn() {
    let mut runner = small_scene("configs/dam-break-2d.json", 128);
    let initial = runner.simulation().positions().to_vec();

    for _ in 0..10 {
        runner.advance(FRAME, &HostInput::default());
    }
    assert_ne!(runner.simulation().positions(), initial.as_slice());

    // Reset is applied before the frame runs; pause as well to inspect it.
    let input = HostInput { reset: true, toggle_pause: true, ..Default::default() };
    runner.advance(FRAME, &input);
    assert_eq!(runner.simulation().positions(), initial.as_slice());
    assert_eq!(runner.sim_time(), 0.0);
}

#[test]
fn pointer_pull_gathers_fluid() {
    let mut runner = small_scene("configs/dam-break-2d.json", 256);
    let target = Vec2::new(-3.0, 0.0);

    let mean_distance = |runner: &FrameRunner| {
        let positions = runner.simulation().positions();
        positions.iter().map(|p| p.distance(target)).sum::<f32>() / positions.len() as f32
    };

    let free_fall = {
        let mut free = small_scene("configs/dam-break-2d.json", 256);
        for _ in 0..20 {
            free.advance(FRAME, &HostInput::default());
        }
        mean_distance(&free)
    };

    let pull = HostInput {
        interaction: InteractionInput { point: target, pull: true, push: false },
        ..Default::default()
    };
    for _ in 0..20 {
        runner.advance(FRAME, &pull);
    }
    let pulled = mean_distance(&runner);
    assert!(
        pulled < free_fall,
        "pulled fluid should stay closer to the pointer: {pulled} vs {free_fall}"
    );
}
