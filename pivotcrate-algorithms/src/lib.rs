//! # pivotcrate Algorithms
//!
//! Spatial search structures used by the reconstruction crates.
//!
//! Both implementations answer the [`pivotcrate_core::NeighborIndex`] queries:
//! an R*-tree for real clouds and a brute force scan that serves as a
//! reference for small inputs and tests.

pub mod nearest_neighbor;

// Re-export commonly used items
pub use nearest_neighbor::*;
