//! Initial particle layout.
//!
//! Particles are laid out on a regular grid filling a rectangle, with column
//! and row counts chosen so the spacing is as close to square as possible,
//! then jittered by a seeded RNG so runs are reproducible.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Initial positions and velocities for a population.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnData {
    /// Initial positions.
    pub positions: Vec<Vec2>,
    /// Initial velocities.
    pub velocities: Vec<Vec2>,
}

impl SpawnData {
    /// Number of particles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no particles were spawned.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Rectangular block spawner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSpawner {
    /// Number of particles to place.
    pub count: usize,
    /// Centre of the spawn rectangle.
    pub centre: Vec2,
    /// Full size of the spawn rectangle.
    pub size: Vec2,
    /// Velocity given to every particle.
    pub initial_velocity: Vec2,
    /// Maximum jitter displacement along a random direction.
    pub jitter_strength: f32,
    /// RNG seed for the jitter.
    pub seed: u64,
}

impl Default for ParticleSpawner {
    fn default() -> Self {
        Self {
            count: 4096,
            centre: Vec2::new(-3.0, 0.0),
            size: Vec2::new(7.0, 7.0),
            initial_velocity: Vec2::ZERO,
            jitter_strength: 0.03,
            seed: 42,
        }
    }
}

impl ParticleSpawner {
    /// Grid dimensions `(columns, rows)` used for `count` particles.
    pub fn grid_dimensions(&self) -> (usize, usize) {
        if self.count == 0 {
            return (0, 0);
        }
        let n = self.count as f32;
        let s = self.size;
        let columns = if s.y > 0.0 {
            let skew = (s.x - s.y) / (2.0 * s.y);
            ((s.x / s.y * n + skew * skew).sqrt() - skew).ceil()
        } else {
            n
        };
        let columns = (columns.max(1.0) as usize).min(self.count);
        let rows = self.count.div_ceil(columns);
        (columns, rows)
    }

    /// Lay out the particles.
    pub fn spawn(&self) -> SpawnData {
        let (columns, rows) = self.grid_dimensions();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut positions = Vec::with_capacity(self.count);

        'rows: for y in 0..rows {
            for x in 0..columns {
                if positions.len() >= self.count {
                    break 'rows;
                }
                let tx = if columns <= 1 { 0.5 } else { x as f32 / (columns - 1) as f32 };
                let ty = if rows <= 1 { 0.5 } else { y as f32 / (rows - 1) as f32 };

                let angle = rng.gen::<f32>() * std::f32::consts::TAU;
                let dir = Vec2::from_angle(angle);
                let jitter = dir * self.jitter_strength * (rng.gen::<f32>() - 0.5);

                let grid = (Vec2::new(tx, ty) - Vec2::splat(0.5)) * self.size;
                positions.push(grid + jitter + self.centre);
            }
        }

        SpawnData {
            velocities: vec![self.initial_velocity; positions.len()],
            positions,
        }
    }
}
