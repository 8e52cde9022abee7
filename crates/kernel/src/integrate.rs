//! External forces, prediction and time integration.
//!
//! A step brackets the SPH stages with two passes over the particles:
//!
//! 1. [`apply_external_forces`] adds gravity (and the pull/push interaction)
//!    to the velocity and writes the look-ahead position every later stage
//!    hashes and samples.
//! 2. [`integrate`] folds in the pressure and viscosity accelerations,
//!    advances the authoritative position and resolves collisions.

use glam::Vec2;
use rayon::prelude::*;

use crate::boundary::resolve_collisions;
use crate::params::SimParams;

/// Acceleration from gravity and the host interaction at `position`.
///
/// Inside the interaction disc the fluid is pulled towards (or pushed away
/// from) the interaction point with a strength that falls off linearly to the
/// rim, while the particle's own velocity is damped by the same weight. A pull
/// also fades gravity out towards the centre so captured fluid can be lifted.
pub fn external_acceleration(position: Vec2, velocity: Vec2, params: &SimParams) -> Vec2 {
    let gravity = params.gravity;
    if !params.interaction_active() {
        return gravity;
    }

    let offset = params.interaction_point - position;
    let sqr_dst = offset.length_squared();
    let radius = params.interaction_radius;
    if sqr_dst >= radius * radius {
        return gravity;
    }

    let dst = sqr_dst.sqrt();
    let centre_t = 1.0 - dst / radius;
    let dir = if dst > 0.0 { offset / dst } else { Vec2::ZERO };

    let gravity_weight = params.interaction_gravity_weight(centre_t);
    gravity * gravity_weight + dir * centre_t * params.interaction_strength - velocity * centre_t
}

/// External-forces stage: `v += a_ext * dt`, then `predicted = x + v * dt`.
pub fn apply_external_forces(
    params: &SimParams,
    positions: &[Vec2],
    velocities: &mut [Vec2],
    predicted: &mut [Vec2],
) {
    let dt = params.delta_time;
    velocities
        .par_iter_mut()
        .zip(predicted.par_iter_mut())
        .zip(positions.par_iter())
        .for_each(|((v, predicted), &p)| {
            *v += external_acceleration(p, *v, params) * dt;
            *predicted = p + *v * dt;
        });
}

/// Integrate stage: fold in pressure and viscosity, advance, collide.
pub fn integrate(
    params: &SimParams,
    pressure_accel: &[Vec2],
    viscosity_accel: &[Vec2],
    positions: &mut [Vec2],
    velocities: &mut [Vec2],
) {
    let dt = params.delta_time;
    positions
        .par_iter_mut()
        .zip(velocities.par_iter_mut())
        .zip(pressure_accel.par_iter().zip(viscosity_accel.par_iter()))
        .for_each(|((p, v), (&pa, &va))| {
            *v += (pa + va) * dt;
            *p += *v * dt;
            resolve_collisions(p, v, params);
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_gravity() -> SimParams {
        SimParams::default().with_gravity(Vec2::ZERO)
    }

    #[test]
    fn gravity_only_without_interaction() {
        let params = SimParams::default();
        let a = external_acceleration(Vec2::new(1.0, 1.0), Vec2::new(5.0, 5.0), &params);
        assert_eq!(a, params.gravity);
    }

    #[test]
    fn interaction_ignored_outside_radius() {
        let params = SimParams::default()
            .with_interaction(Vec2::ZERO, 30.0)
            .with_interaction_radius(1.0);
        let a = external_acceleration(Vec2::new(2.0, 0.0), Vec2::ZERO, &params);
        assert_eq!(a, params.gravity);
    }

    #[test]
    fn pull_points_towards_interaction_point() {
        let params = no_gravity().with_interaction(Vec2::ZERO, 30.0).with_interaction_radius(2.0);
        let a = external_acceleration(Vec2::new(1.0, 0.0), Vec2::ZERO, &params);
        // centre_t = 0.5, dir = -x
        assert!((a - Vec2::new(-15.0, 0.0)).length() < 1e-5, "a={a}");
    }

    #[test]
    fn push_points_away_and_damps_velocity() {
        let params = no_gravity().with_interaction(Vec2::ZERO, -30.0).with_interaction_radius(2.0);
        let a = external_acceleration(Vec2::new(0.0, 1.0), Vec2::new(0.0, 4.0), &params);
        // push: +15 along +y, damping: -0.5 * 4
        assert!((a - Vec2::new(0.0, 13.0)).length() < 1e-5, "a={a}");
    }

    #[test]
    fn pull_at_centre_cancels_gravity() {
        let params = SimParams::default()
            .with_interaction(Vec2::new(0.5, 0.5), 20.0)
            .with_interaction_radius(1.0);
        let a = external_acceleration(Vec2::new(0.5, 0.5), Vec2::ZERO, &params);
        assert_eq!(a, Vec2::ZERO);
    }

    #[test]
    fn external_forces_predict_one_step_ahead() {
        let params = SimParams::default();
        let dt = params.delta_time;
        let positions = vec![Vec2::new(0.0, 1.0)];
        let mut velocities = vec![Vec2::new(1.0, 0.0)];
        let mut predicted = vec![Vec2::ZERO];
        apply_external_forces(&params, &positions, &mut velocities, &mut predicted);

        let v = Vec2::new(1.0, 0.0) + params.gravity * dt;
        assert_eq!(velocities[0], v);
        assert_eq!(predicted[0], positions[0] + v * dt);
    }

    #[test]
    fn integrate_folds_accelerations_and_advances() {
        let params = no_gravity();
        let dt = params.delta_time;
        let mut positions = vec![Vec2::ZERO];
        let mut velocities = vec![Vec2::new(1.0, 0.0)];
        integrate(
            &params,
            &[Vec2::new(2.0, 0.0)],
            &[Vec2::new(0.0, -1.0)],
            &mut positions,
            &mut velocities,
        );
        let v = Vec2::new(1.0 + 2.0 * dt, -dt);
        assert_eq!(velocities[0], v);
        assert_eq!(positions[0], v * dt);
    }

    #[test]
    fn integrate_resolves_collisions() {
        let params = no_gravity().with_bounds_size(Vec2::new(2.0, 2.0)).with_collision_damping(0.5);
        let mut positions = vec![Vec2::new(0.999, 0.0)];
        let mut velocities = vec![Vec2::new(10.0, 0.0)];
        integrate(&params, &[Vec2::ZERO], &[Vec2::ZERO], &mut positions, &mut velocities);
        assert_eq!(positions[0], Vec2::new(1.0, 0.0));
        assert_eq!(velocities[0], Vec2::new(-5.0, 0.0));
    }
}
