//! Nearest neighbor search implementations

use pivotcrate_core::{NeighborIndex, NormalPoint3f, Point3f, PointCloud};
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// A position tagged with its index in the source cloud
type IndexedPosition = GeomWithData<[f32; 3], usize>;

fn to_array(point: &Point3f) -> [f32; 3] {
    [point.x, point.y, point.z]
}

/// R*-tree backed neighbor index
pub struct RTreeIndex {
    tree: RTree<IndexedPosition>,
}

impl RTreeIndex {
    /// Bulk load an index over the given positions; point `i` keeps index `i`
    pub fn new(points: &[Point3f]) -> Self {
        let items: Vec<IndexedPosition> = points
            .iter()
            .enumerate()
            .map(|(index, point)| GeomWithData::new(to_array(point), index))
            .collect();

        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Build an index over the positions of an oriented cloud
    pub fn from_cloud(cloud: &PointCloud<NormalPoint3f>) -> Self {
        Self::new(&cloud.positions())
    }
}

impl NeighborIndex for RTreeIndex {
    fn len(&self) -> usize {
        self.tree.size()
    }

    fn query_radius(&self, query: &Point3f, radius: f32) -> Vec<usize> {
        if radius < 0.0 {
            return Vec::new();
        }
        let mut indices: Vec<usize> = self
            .tree
            .locate_within_distance(to_array(query), radius * radius)
            .map(|item| item.data)
            .collect();
        indices.sort_unstable();
        indices
    }

    fn k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&to_array(query))
            .take(k)
            .map(|(item, distance_squared)| (item.data, distance_squared.sqrt()))
            .collect()
    }
}

/// Simple brute force nearest neighbor search for small datasets
pub struct BruteForceSearch {
    points: Vec<Point3f>,
}

impl BruteForceSearch {
    pub fn new(points: &[Point3f]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    pub fn from_cloud(cloud: &PointCloud<NormalPoint3f>) -> Self {
        Self {
            points: cloud.positions(),
        }
    }
}

impl NeighborIndex for BruteForceSearch {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn query_radius(&self, query: &Point3f, radius: f32) -> Vec<usize> {
        if radius < 0.0 {
            return Vec::new();
        }
        let radius_squared = radius * radius;
        self.points
            .iter()
            .enumerate()
            .filter(|(_, point)| (*point - query).norm_squared() <= radius_squared)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        let mut distances: Vec<(usize, f32)> = self
            .points
            .iter()
            .enumerate()
            .map(|(idx, point)| (idx, (point - query).norm()))
            .collect();

        // Sort by distance and take k nearest
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.truncate(k);
        distances
    }
}
