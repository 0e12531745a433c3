//! Core traits for pivotcrate

use crate::{mesh::TriangleMesh, point::*, point_cloud::PointCloud, Result};

/// Trait for radius and nearest neighbor queries over an indexed point set
///
/// Implementations must return radius query results in ascending index order
/// so that reconstructions built on top of them are reproducible.
pub trait NeighborIndex {
    /// Number of indexed points
    fn len(&self) -> usize;

    /// Whether the index holds no point
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of all points within `radius` of `query` (inclusive), ascending
    fn query_radius(&self, query: &Point3f, radius: f32) -> Vec<usize>;

    /// Same as [`NeighborIndex::query_radius`] but without the point `exclude`,
    /// for queries centred on an indexed point
    fn query_radius_excluding(&self, query: &Point3f, radius: f32, exclude: usize) -> Vec<usize> {
        let mut neighbors = self.query_radius(query, radius);
        neighbors.retain(|&i| i != exclude);
        neighbors
    }

    /// The `k` closest points to `query` with their distances, closest first
    fn k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)>;
}

impl<T: NeighborIndex + ?Sized> NeighborIndex for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn query_radius(&self, query: &Point3f, radius: f32) -> Vec<usize> {
        (**self).query_radius(query, radius)
    }

    fn query_radius_excluding(&self, query: &Point3f, radius: f32, exclude: usize) -> Vec<usize> {
        (**self).query_radius_excluding(query, radius, exclude)
    }

    fn k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        (**self).k_nearest(query, k)
    }
}

/// Surface reconstruction from an oriented point cloud
pub trait SurfaceReconstruction {
    /// Reconstruct a triangle mesh from the given cloud
    fn reconstruct(&self, cloud: &PointCloud<NormalPoint3f>) -> Result<TriangleMesh>;
}
