//! Configuration errors raised when a simulation is created or reconfigured.
//!
//! Every variant is fatal for the configuration that produced it: the
//! simulation either starts from a consistent setup or not at all. Numerical
//! degeneracies inside a step (e.g. an isolated particle) are recovered
//! locally and never surface here.

use thiserror::Error;

/// Errors produced while validating simulation setup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// Smoothing radius was zero, negative, or not finite.
    #[error("smoothing radius must be positive and finite, got {0}")]
    InvalidSmoothingRadius(f32),

    /// The simulation was created without any particles.
    #[error("particle count must be at least 1")]
    EmptyPopulation,

    /// The padded sort size (`next_power_of_two(count)`) does not fit the
    /// 32-bit lookup table indices.
    #[error("particle count {count} cannot be padded to a power of two within the sort table")]
    SortCapacityOverflow {
        /// Requested particle count.
        count: usize,
    },

    /// The cell table must hold at least one slot per particle.
    #[error("cell table size {table_size} is smaller than particle count {count}")]
    CellTableTooSmall {
        /// Requested table size.
        table_size: usize,
        /// Particle count.
        count: usize,
    },

    /// Bounds must have a positive extent on both axes.
    #[error("bounds half-extent must be positive on both axes, got ({x}, {y})")]
    InvalidBounds {
        /// Half-extent along x.
        x: f32,
        /// Half-extent along y.
        y: f32,
    },

    /// The obstacle box reaches past the container walls.
    #[error("obstacle box at ({x}, {y}) extends outside the container")]
    ObstacleOutsideBounds {
        /// Obstacle centre along x.
        x: f32,
        /// Obstacle centre along y.
        y: f32,
    },

    /// Two per-particle input arrays disagree in length.
    #[error("{name} has {actual} entries, expected {expected}")]
    ArrayLengthMismatch {
        /// Name of the offending array.
        name: &'static str,
        /// Expected length (the particle count).
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A scalar parameter is outside its valid range.
    #[error("parameter `{name}` is out of range: {value}")]
    InvalidParameter {
        /// Parameter name as it appears in [`SimParams`](crate::SimParams).
        name: &'static str,
        /// Offending value.
        value: f32,
    },
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = KernelError::InvalidSmoothingRadius(-0.5);
        assert_eq!(
            err.to_string(),
            "smoothing radius must be positive and finite, got -0.5"
        );

        let err = KernelError::CellTableTooSmall { table_size: 8, count: 16 };
        assert!(err.to_string().contains("8"));
        assert!(err.to_string().contains("16"));
    }
}
