//! 2D SPH smoothing kernels and the density, pressure and viscosity stages.
//!
//! All kernels have compact support `h` (the smoothing radius). Their
//! normalization constants depend only on `h` and are computed once per
//! radius in [`KernelConstants::new`]:
//!
//! ```text
//! poly6(r)      = 4 / (pi h^8)  * (h^2 - r^2)^3
//! spiky2(r)     = 6 / (pi h^4)  * (h - r)^2
//! spiky3(r)     = 10 / (pi h^5) * (h - r)^3
//! d spiky2 / dr = -12 / (pi h^4) * (h - r)
//! d spiky3 / dr = -30 / (pi h^5) * (h - r)^2
//! ```
//!
//! Each stage reads the arrays written by earlier stages for every particle
//! and writes only its own output slot per particle.

use std::f32::consts::PI;

use glam::Vec2;
use rayon::prelude::*;

use crate::neighbor::SpatialIndex;
use crate::params::SimParams;

/// Lower bound on every stored density and every density divisor.
///
/// Keeps isolated or nearly isolated particles from producing NaN/Inf.
pub const MIN_DENSITY: f32 = 1.0e-5;

/// Normalization constants of every kernel for one smoothing radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelConstants {
    /// Smoothing radius the constants were derived for.
    pub h: f32,
    poly6: f32,
    spiky_pow2: f32,
    spiky_pow3: f32,
    spiky_pow2_derivative: f32,
    spiky_pow3_derivative: f32,
}

impl KernelConstants {
    /// Derive all constants for radius `h`.
    pub fn new(h: f32) -> Self {
        Self {
            h,
            poly6: 4.0 / (PI * h.powi(8)),
            spiky_pow2: 6.0 / (PI * h.powi(4)),
            spiky_pow3: 10.0 / (PI * h.powi(5)),
            spiky_pow2_derivative: 12.0 / (PI * h.powi(4)),
            spiky_pow3_derivative: 30.0 / (PI * h.powi(5)),
        }
    }

    /// Poly6 kernel; used for density and viscosity.
    #[inline]
    pub fn poly6(&self, dst: f32) -> f32 {
        if dst >= self.h {
            return 0.0;
        }
        let v = self.h * self.h - dst * dst;
        v * v * v * self.poly6
    }

    /// Spiky kernel squared falloff; used for near density.
    #[inline]
    pub fn spiky_pow2(&self, dst: f32) -> f32 {
        if dst >= self.h {
            return 0.0;
        }
        let v = self.h - dst;
        v * v * self.spiky_pow2
    }

    /// Spiky kernel cubed falloff.
    #[inline]
    pub fn spiky_pow3(&self, dst: f32) -> f32 {
        if dst >= self.h {
            return 0.0;
        }
        let v = self.h - dst;
        v * v * v * self.spiky_pow3
    }

    /// Radial derivative of [`spiky_pow2`](Self::spiky_pow2); never positive.
    #[inline]
    pub fn derivative_spiky_pow2(&self, dst: f32) -> f32 {
        if dst >= self.h {
            return 0.0;
        }
        -(self.h - dst) * self.spiky_pow2_derivative
    }

    /// Radial derivative of [`spiky_pow3`](Self::spiky_pow3); never positive.
    #[inline]
    pub fn derivative_spiky_pow3(&self, dst: f32) -> f32 {
        if dst >= self.h {
            return 0.0;
        }
        let v = self.h - dst;
        -v * v * self.spiky_pow3_derivative
    }
}

/// Pressure from density: `(density - target) * pressure_multiplier`.
#[inline]
pub fn pressure_from_density(density: f32, params: &SimParams) -> f32 {
    (density - params.target_density) * params.pressure_multiplier
}

/// Near pressure from near density: `near_density * near_pressure_multiplier`.
#[inline]
pub fn near_pressure_from_density(near_density: f32, params: &SimParams) -> f32 {
    near_density * params.near_pressure_multiplier
}

/// Density stage: fill `densities[i]` with `(density, near_density)`.
///
/// Sums over every particle within `h` of `predicted[i]`, the particle itself
/// included. Both components are clamped to at least [`MIN_DENSITY`].
pub fn compute_densities(
    params: &SimParams,
    kernels: &KernelConstants,
    index: &SpatialIndex,
    predicted: &[Vec2],
    densities: &mut [Vec2],
) {
    let mass = params.particle_mass;
    densities
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, out)| {
            let mut density = 0.0;
            let mut near_density = 0.0;
            index.for_each_neighbor(predicted[i], predicted, |_, _, sqr_dst| {
                let dst = sqr_dst.sqrt();
                density += kernels.poly6(dst);
                near_density += kernels.spiky_pow2(dst);
            });
            *out = (Vec2::new(density, near_density) * mass).max(Vec2::splat(MIN_DENSITY));
        });
}

/// Pressure stage: fill `accelerations[i]` with the pressure acceleration.
///
/// Uses the symmetrized pressure `(p_i + p_j) / 2` divided by the neighbor's
/// density, so for an isolated pair the two forces cancel exactly.
/// Coincident particles exert no force on each other.
pub fn compute_pressure_accelerations(
    params: &SimParams,
    kernels: &KernelConstants,
    index: &SpatialIndex,
    predicted: &[Vec2],
    densities: &[Vec2],
    accelerations: &mut [Vec2],
) {
    accelerations
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, out)| {
            let density = densities[i].x;
            let near_density = densities[i].y;
            let pressure = pressure_from_density(density, params);
            let near_pressure = near_pressure_from_density(near_density, params);

            let mut force = Vec2::ZERO;
            index.for_each_neighbor(predicted[i], predicted, |j, to_neighbor, sqr_dst| {
                if j == i || sqr_dst <= 0.0 {
                    return;
                }
                let dst = sqr_dst.sqrt();
                let dir = to_neighbor / dst;

                let neighbor = densities[j];
                let shared_pressure = 0.5 * (pressure + pressure_from_density(neighbor.x, params));
                let shared_near_pressure =
                    0.5 * (near_pressure + near_pressure_from_density(neighbor.y, params));

                force += dir * kernels.derivative_spiky_pow2(dst) * shared_pressure
                    / neighbor.x.max(MIN_DENSITY);
                force += dir * kernels.derivative_spiky_pow3(dst) * shared_near_pressure
                    / neighbor.y.max(MIN_DENSITY);
            });

            *out = force / density.max(MIN_DENSITY);
        });
}

/// Viscosity stage: fill `accelerations[i]` with the velocity-diffusion term
/// `viscosity_strength * sum_j (v_j - v_i) * poly6(r_ij)`.
pub fn compute_viscosity_accelerations(
    params: &SimParams,
    kernels: &KernelConstants,
    index: &SpatialIndex,
    predicted: &[Vec2],
    velocities: &[Vec2],
    accelerations: &mut [Vec2],
) {
    let strength = params.viscosity_strength;
    if strength == 0.0 {
        accelerations.par_iter_mut().for_each(|a| *a = Vec2::ZERO);
        return;
    }
    accelerations
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, out)| {
            let velocity = velocities[i];
            let mut force = Vec2::ZERO;
            index.for_each_neighbor(predicted[i], predicted, |j, _, sqr_dst| {
                if j == i {
                    return;
                }
                force += (velocities[j] - velocity) * kernels.poly6(sqr_dst.sqrt());
            });
            *out = force * strength;
        });
}
