//! Collision handling against the container walls and the obstacle box.
//!
//! The container is an axis-aligned box centred at the origin with
//! half-extent [`SimParams::half_bounds`]. A particle is a disc of
//! [`SimParams::particle_radius`], so its centre is confined to
//! `half_bounds - particle_radius` on each axis.
//!
//! On a hit the position is projected back onto the wall and the normal
//! velocity component is reversed and scaled by
//! [`SimParams::collision_damping`].

use glam::Vec2;
use rayon::prelude::*;

use crate::params::SimParams;

/// Resolve collisions for a single particle in place.
///
/// Walls are handled per axis, then the obstacle (if any). The obstacle is
/// inflated by the particle radius like the walls are shrunk by it; a
/// particle that ends up inside is pushed out through the nearest face and
/// then kept within the walls.
#[inline]
pub fn resolve_collisions(position: &mut Vec2, velocity: &mut Vec2, params: &SimParams) {
    let damping = params.collision_damping;
    let limit = params.half_bounds - Vec2::splat(params.particle_radius);

    if position.x.abs() > limit.x {
        position.x = limit.x * position.x.signum();
        velocity.x *= -damping;
    }
    if position.y.abs() > limit.y {
        position.y = limit.y * position.y.signum();
        velocity.y *= -damping;
    }

    if !params.has_obstacle() {
        return;
    }

    let half_size = params.obstacle_half_size + Vec2::splat(params.particle_radius);
    let local = *position - params.obstacle_centre;
    let edge = half_size - local.abs();
    if edge.x >= 0.0 && edge.y >= 0.0 {
        if edge.x < edge.y {
            position.x = params.obstacle_centre.x + half_size.x * local.x.signum();
            velocity.x *= -damping;
        } else {
            position.y = params.obstacle_centre.y + half_size.y * local.y.signum();
            velocity.y *= -damping;
        }
        // A gap between obstacle and wall narrower than a particle.
        *position = position.clamp(-limit, limit);
    }
}

/// Resolve collisions for every particle.
pub fn resolve_all_collisions(positions: &mut [Vec2], velocities: &mut [Vec2], params: &SimParams) {
    positions
        .par_iter_mut()
        .zip(velocities.par_iter_mut())
        .for_each(|(p, v)| resolve_collisions(p, v, params));
}

/// Whether `position` lies inside the container, within `tolerance`.
pub fn is_contained(position: Vec2, params: &SimParams, tolerance: f32) -> bool {
    let limit = params.half_bounds - Vec2::splat(params.particle_radius) + Vec2::splat(tolerance);
    position.x.abs() <= limit.x && position.y.abs() <= limit.y
}
