//! # pivotcrate Reconstruction
//!
//! Ball pivoting surface reconstruction for oriented 3D point clouds.
//!
//! The crate is split the way the algorithm is: a stateless [`geometry`]
//! kernel, the [`front`] of open mesh edges, the pivoting engine in
//! [`ball_pivoting`] and a [`radius`] estimator for clouds without a known
//! sampling density.

pub mod geometry;
pub mod front;
pub mod radius;
pub mod ball_pivoting;

// Re-export commonly used items
pub use geometry::Side;
pub use front::{Edge, EdgeInsertion, EdgeState, Front};
pub use radius::*;
pub use ball_pivoting::*;
