//! Ball Pivoting Algorithm
//!
//! A ball of fixed radius is placed on three points of an oriented cloud so
//! that no other point lies inside it (a seed triangle). The ball then rolls
//! around each open edge of the growing mesh until it touches a new point,
//! emitting one triangle per resting position. When the front of open edges
//! is exhausted another seed is searched, until no unused point can start
//! one.
//!
//! Bernardini F., Mittleman J., Rushmeier H., Silva C., Taubin G.,
//! "The ball-pivoting algorithm for surface reconstruction", TVCG 1999.

use crate::front::{Edge, EdgeInsertion, Front};
use crate::geometry::{self, Side, ANGLE_TOLERANCE};
use crate::radius::{estimate_radius, RadiusEstimation};
use pivotcrate_algorithms::RTreeIndex;
use pivotcrate_core::{
    Error, NeighborIndex, NormalPoint3f, Point3f, PointCloud, Result, SurfaceReconstruction,
    TriangleMesh, Vector3f,
};
use tracing::{debug, info, instrument, trace, warn};

/// Configuration for Ball Pivoting Algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct BPAConfig {
    /// Ball radius; `None` estimates one from the data
    pub radius: Option<f32>,
    /// Allow balls resting on the side opposite to the point normals
    pub allow_back_ball: bool,
    /// Allow a pivot to move the ball to the other side of the surface
    pub allow_flip: bool,
    /// Triangles with an angle whose |cos| exceeds this are rejected
    pub collinear_cos_threshold: f32,
    /// Points closer than this are treated as duplicates
    pub near_distance_threshold: f32,
    /// Used when `radius` is `None`
    pub radius_estimation: RadiusEstimation,
    /// Stop after this many triangles
    pub max_triangles: Option<usize>,
}

impl Default for BPAConfig {
    fn default() -> Self {
        Self {
            radius: None,
            allow_back_ball: false,
            allow_flip: false,
            collinear_cos_threshold: 10.0f32.to_radians().cos(),
            near_distance_threshold: 1e-6,
            radius_estimation: RadiusEstimation::default(),
            max_triangles: None,
        }
    }
}

impl BPAConfig {
    /// Default configuration with the given radius; a non-positive radius
    /// selects estimation
    pub fn with_radius(radius: f32) -> Self {
        Self {
            radius: if radius > 0.0 || radius.is_nan() {
                Some(radius)
            } else {
                None
            },
            ..Default::default()
        }
    }

    /// Check every parameter before any reconstruction work starts
    pub fn validate(&self) -> Result<()> {
        match self.radius {
            Some(radius) if !(radius.is_finite() && radius > 0.0) => {
                return Err(Error::InvalidConfig(format!(
                    "ball radius must be positive and finite, got {}",
                    radius
                )));
            }
            Some(_) => {}
            None => self.radius_estimation.validate()?,
        }
        if !(self.collinear_cos_threshold > 0.0 && self.collinear_cos_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "collinearity cosine threshold must be in (0, 1], got {}",
                self.collinear_cos_threshold
            )));
        }
        if !(self.near_distance_threshold.is_finite() && self.near_distance_threshold >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "near distance threshold must be non-negative, got {}",
                self.near_distance_threshold
            )));
        }
        Ok(())
    }
}

/// An emitted triangle and the ball that validated it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [usize; 3],
    pub center: Point3f,
    pub side: Side,
}

impl Triangle {
    fn new(vertices: [usize; 3], center: Point3f, side: Side) -> Self {
        Triangle {
            vertices,
            center,
            side,
        }
    }

    /// Directed edges in winding order, each with its opposite vertex
    fn edges(&self) -> [Edge; 3] {
        let [a, b, c] = self.vertices;
        [
            Edge::new(a, b, c, self.center, self.side),
            Edge::new(b, c, a, self.center, self.side),
            Edge::new(c, a, b, self.center, self.side),
        ]
    }
}

/// A seed triangle found by [`PivotEngine::find_seed`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    /// Vertices wound so that the face normal agrees with the point normals
    pub triangle: [usize; 3],
    pub center: Point3f,
    pub side: Side,
}

/// The point a pivot landed on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotHit {
    pub point: usize,
    pub center: Point3f,
    pub side: Side,
    /// Rotation around the edge, in radians
    pub angle: f32,
}

/// Counters collected during a reconstruction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReconstructionStats {
    pub radius: f32,
    pub seeds: usize,
    pub triangles: usize,
    pub pivots: usize,
    pub boundary_edges: usize,
    pub merged_edges: usize,
    /// Points dropped as duplicates of a lower-indexed point
    pub duplicates: usize,
    /// Whether `max_triangles` stopped the run early
    pub truncated: bool,
}

/// Mutable state of one ball pivoting run
///
/// The engine borrows the points and holds the neighbor index (owned, or
/// borrowed through `&I`) for its whole lifetime. All state changes happen on
/// a single thread: each pivot depends on the current front and usage flags.
pub struct PivotEngine<'a, I: NeighborIndex> {
    points: &'a [NormalPoint3f],
    index: I,
    radius: f32,
    config: &'a BPAConfig,
    is_used: Vec<bool>,
    /// Points within the near distance of a lower-indexed point; never
    /// seeded or pivoted onto
    is_duplicate: Vec<bool>,
    front: Front,
    triangles: Vec<Triangle>,
    /// Points below the cursor can no longer start a seed
    seed_cursor: usize,
    stats: ReconstructionStats,
}

impl<'a, I: NeighborIndex> PivotEngine<'a, I> {
    /// Set up a run over `points`
    ///
    /// Fails when `index` does not hold exactly the given points.
    pub fn new(
        points: &'a [NormalPoint3f],
        index: I,
        radius: f32,
        config: &'a BPAConfig,
    ) -> Result<Self> {
        check_index_len(points.len(), &index)?;

        let is_duplicate = find_duplicates(points, &index, config.near_distance_threshold);
        let duplicates = is_duplicate.iter().filter(|&&d| d).count();
        if duplicates > 0 {
            debug!(duplicates, "ignoring duplicate points");
        }

        Ok(Self {
            points,
            index,
            radius,
            config,
            is_used: vec![false; points.len()],
            is_duplicate,
            front: Front::new(),
            triangles: Vec::new(),
            seed_cursor: 0,
            stats: ReconstructionStats {
                radius,
                duplicates,
                ..Default::default()
            },
        })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Usage flag of every point
    pub fn is_used(&self) -> &[bool] {
        &self.is_used
    }

    pub fn front(&self) -> &Front {
        &self.front
    }

    /// Triangles emitted so far, in emission order
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn stats(&self) -> &ReconstructionStats {
        &self.stats
    }

    fn position(&self, i: usize) -> &Point3f {
        &self.points[i].position
    }

    fn normal(&self, i: usize) -> &Vector3f {
        &self.points[i].normal
    }

    fn budget_exhausted(&self) -> bool {
        self.config
            .max_triangles
            .is_some_and(|max| self.triangles.len() >= max)
    }

    /// Sides to try for a seed ball
    fn seed_sides(&self) -> &'static [Side] {
        if self.config.allow_back_ball {
            &[Side::Front, Side::Back]
        } else {
            &[Side::Front]
        }
    }

    /// Sides to try when pivoting an edge whose ball rests on `side`
    fn pivot_sides(&self, side: Side) -> Vec<Side> {
        let mut sides = vec![side];
        let other = side.flipped();
        if self.config.allow_flip && (other == Side::Front || self.config.allow_back_ball) {
            sides.push(other);
        }
        sides
    }

    fn is_too_near(&self, i: usize, j: usize) -> bool {
        geometry::is_too_near(
            self.position(i),
            self.position(j),
            self.config.near_distance_threshold,
        )
    }

    fn is_collinear(&self, apex: usize, i: usize, j: usize) -> bool {
        geometry::is_collinear(
            self.position(apex),
            self.position(i),
            self.position(j),
            self.config.collinear_cos_threshold,
        )
    }

    /// Sum of the vertex normals of a triangle
    fn normal_hint(&self, triangle: [usize; 3]) -> Vector3f {
        triangle.iter().map(|&i| self.normal(i)).sum()
    }

    /// Whether every vertex normal points to the same side as `face_normal`
    fn normals_agree(&self, triangle: [usize; 3], face_normal: &Vector3f) -> bool {
        triangle.iter().all(|&i| self.normal(i).dot(face_normal) > 0.0)
    }

    /// Center of the ball of the configured radius resting on `triangle`,
    /// if that ball holds no other point
    fn empty_ball(&self, triangle: [usize; 3], hint: &Vector3f, side: Side) -> Option<Point3f> {
        let [a, b, c] = triangle;
        let center = geometry::sphere_center_through_triangle(
            self.position(a),
            self.position(b),
            self.position(c),
            hint,
            self.radius,
            side,
        )?;

        let others = self
            .index
            .query_radius(&center, self.radius)
            .into_iter()
            .filter(|i| !triangle.contains(i))
            .map(|i| *self.position(i));

        geometry::is_empty_sphere(&center, self.radius, others).then_some(center)
    }

    /// Find a triangle of unused points that an empty ball can rest on
    ///
    /// Does not change any state except the seed cursor; once it returns
    /// `None` it keeps returning `None`.
    pub fn find_seed(&mut self) -> Option<Seed> {
        while self.seed_cursor < self.points.len() {
            let i = self.seed_cursor;
            if !self.is_used[i] && !self.is_duplicate[i] {
                if let Some(seed) = self.seed_around(i) {
                    return Some(seed);
                }
            }
            // usage only grows, so a point that fails now fails forever
            self.seed_cursor += 1;
        }
        None
    }

    fn seed_around(&self, i: usize) -> Option<Seed> {
        let neighbors: Vec<usize> = self
            .index
            .query_radius_excluding(self.position(i), 2.0 * self.radius, i)
            .into_iter()
            .filter(|&j| !self.is_used[j] && !self.is_duplicate[j])
            .collect();

        for (x, &j) in neighbors.iter().enumerate() {
            if self.is_too_near(i, j) {
                continue;
            }
            for &k in &neighbors[x + 1..] {
                if self.is_too_near(i, k) || self.is_too_near(j, k) {
                    continue;
                }
                if self.is_collinear(i, j, k) {
                    continue;
                }

                let hint = self.normal_hint([i, j, k]);
                let Some(normal) =
                    geometry::triangle_normal(self.position(i), self.position(j), self.position(k))
                else {
                    continue;
                };
                let (triangle, normal) = if normal.dot(&hint) >= 0.0 {
                    ([i, j, k], normal)
                } else {
                    ([i, k, j], -normal)
                };
                if !self.normals_agree(triangle, &normal) {
                    continue;
                }

                for &side in self.seed_sides() {
                    if let Some(center) = self.empty_ball(triangle, &hint, side) {
                        return Some(Seed {
                            triangle,
                            center,
                            side,
                        });
                    }
                }
            }
        }
        None
    }

    /// Emit a seed triangle and open its three edges
    pub fn start_seed(&mut self, seed: Seed) {
        let triangle = Triangle::new(seed.triangle, seed.center, seed.side);
        for &v in &seed.triangle {
            debug_assert!(!self.is_used[v], "seed vertex {} already used", v);
            self.is_used[v] = true;
        }
        for edge in triangle.edges() {
            let insertion = self.front.add_edge(edge);
            debug_assert_eq!(insertion, EdgeInsertion::Added);
        }
        self.triangles.push(triangle);
        self.stats.seeds += 1;
        self.stats.triangles += 1;
        debug!(
            triangle = ?seed.triangle,
            side = ?seed.side,
            seeds = self.stats.seeds,
            "seed triangle"
        );
    }

    /// Roll the ball around `edge` and return the first point it touches
    ///
    /// The new triangle is `(target, source, point)`, which keeps the
    /// orientation of the triangle that owns `edge`. Among candidates with an
    /// empty ball the smallest rotation angle wins; equal angles go to the
    /// lowest point index.
    pub fn pivot(&self, edge: &Edge) -> Option<PivotHit> {
        let (a, b) = (edge.source, edge.target);
        let pa = self.position(a);
        let pb = self.position(b);
        let mid = Point3f::from((pa.coords + pb.coords) * 0.5);

        let plane = geometry::plane_between(pa, pb)?;
        // the ball rolls away from the opposite vertex
        let axis = plane.normal * edge.side.sign();
        let from = plane.project(&edge.center) - mid;

        let mut best: Option<PivotHit> = None;
        for m in self.index.query_radius(&mid, 2.0 * self.radius) {
            if m == a || m == b || m == edge.opposite || self.is_duplicate[m] {
                continue;
            }
            if self.is_too_near(m, a) || self.is_too_near(m, b) {
                continue;
            }
            if self.is_collinear(a, b, m) || self.is_collinear(b, a, m) {
                continue;
            }

            let triangle = [b, a, m];
            let hint = self.normal_hint(triangle);
            let Some(normal) = geometry::triangle_normal(pb, pa, self.position(m)) else {
                continue;
            };
            // would fold over the surface
            if !self.normals_agree(triangle, &normal) {
                continue;
            }
            if !self.front.is_compatible(a, m) || !self.front.is_compatible(m, b) {
                continue;
            }

            for side in self.pivot_sides(edge.side) {
                let Some(center) = self.empty_ball(triangle, &hint, side) else {
                    continue;
                };
                let to = plane.project(&center) - mid;
                let angle = geometry::rotation_angle(&axis, &from, &to);
                let hit = PivotHit {
                    point: m,
                    center,
                    side,
                    angle,
                };
                best = match best {
                    Some(current) if !is_better_hit(&hit, &current) => Some(current),
                    _ => Some(hit),
                };
                break;
            }
        }
        best
    }

    /// Pivot active edges until the front is exhausted
    ///
    /// Returns `false` when the triangle budget stopped the traversal.
    pub fn proceed_front(&mut self) -> bool {
        while let Some(edge) = self.front.pop_active() {
            if self.budget_exhausted() {
                return false;
            }
            self.stats.pivots += 1;

            match self.pivot(&edge) {
                Some(hit) => {
                    trace!(
                        edge = ?edge.key(),
                        point = hit.point,
                        angle = hit.angle,
                        "pivot"
                    );
                    self.front.mark_consumed(&edge);
                    self.is_used[hit.point] = true;

                    let triangle = Triangle::new(
                        [edge.target, edge.source, hit.point],
                        hit.center,
                        hit.side,
                    );
                    let new_edges = [
                        Edge::new(edge.source, hit.point, edge.target, hit.center, hit.side),
                        Edge::new(hit.point, edge.target, edge.source, hit.center, hit.side),
                    ];
                    for new_edge in new_edges {
                        match self.front.add_edge(new_edge) {
                            EdgeInsertion::Merged => self.stats.merged_edges += 1,
                            EdgeInsertion::Added => {}
                            EdgeInsertion::Duplicate => debug_assert!(
                                false,
                                "pivot produced duplicate edge {:?}",
                                new_edge.key()
                            ),
                        }
                    }
                    self.triangles.push(triangle);
                    self.stats.triangles += 1;
                }
                None => {
                    trace!(edge = ?edge.key(), "boundary edge");
                    self.front.mark_boundary(&edge);
                    self.stats.boundary_edges += 1;
                }
            }
        }
        true
    }

    /// Alternate seed search and front traversal until no seed is left
    pub fn run(&mut self) {
        loop {
            if self.budget_exhausted() {
                self.stats.truncated = true;
                break;
            }
            let Some(seed) = self.find_seed() else {
                break;
            };
            self.start_seed(seed);
            if !self.proceed_front() {
                self.stats.truncated = true;
                break;
            }
        }

        if self.stats.truncated {
            warn!(
                triangles = self.triangles.len(),
                "triangle budget reached, reconstruction stopped early"
            );
        }
    }

    /// Finish the run and hand out its results
    pub fn into_output(self) -> BallPivotingOutput {
        BallPivotingOutput {
            radius: self.radius,
            boundary_edges: self.front.boundary_edges(),
            triangles: self.triangles,
            is_used: self.is_used,
            stats: self.stats,
        }
    }
}

fn check_index_len<I: NeighborIndex>(points: usize, index: &I) -> Result<()> {
    if index.len() != points {
        return Err(Error::InvalidData(format!(
            "neighbor index holds {} points, cloud has {}",
            index.len(),
            points
        )));
    }
    Ok(())
}

/// Flag every point that lies within `threshold` of a lower-indexed point
fn find_duplicates<I: NeighborIndex>(
    points: &[NormalPoint3f],
    index: &I,
    threshold: f32,
) -> Vec<bool> {
    points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            index
                .query_radius(&point.position, threshold)
                .into_iter()
                .take_while(|&j| j < i)
                .any(|j| geometry::is_too_near(&point.position, &points[j].position, threshold))
        })
        .collect()
}

fn is_better_hit(candidate: &PivotHit, current: &PivotHit) -> bool {
    if candidate.angle < current.angle - ANGLE_TOLERANCE {
        return true;
    }
    (candidate.angle - current.angle).abs() <= ANGLE_TOLERANCE && candidate.point < current.point
}

/// Result of a ball pivoting run, indexed like the input cloud
#[derive(Debug, Clone)]
pub struct BallPivotingOutput {
    pub radius: f32,
    pub triangles: Vec<Triangle>,
    pub is_used: Vec<bool>,
    /// Directed edges where pivoting failed
    pub boundary_edges: Vec<(usize, usize)>,
    pub stats: ReconstructionStats,
}

impl BallPivotingOutput {
    /// Faces over the original point indices
    pub fn faces(&self) -> Vec<[usize; 3]> {
        self.triangles.iter().map(|t| t.vertices).collect()
    }

    /// Build a mesh that keeps only the used points, in ascending original
    /// index, with their normals
    pub fn to_mesh(&self, cloud: &PointCloud<NormalPoint3f>) -> TriangleMesh {
        let mut remap = vec![usize::MAX; self.is_used.len()];
        let mut vertices = Vec::new();
        let mut normals = Vec::new();
        for (i, point) in cloud.iter().enumerate() {
            if self.is_used.get(i).copied().unwrap_or(false) {
                remap[i] = vertices.len();
                vertices.push(point.position);
                normals.push(point.normal);
            }
        }

        let faces = self
            .triangles
            .iter()
            .map(|t| t.vertices.map(|v| remap[v]))
            .collect();

        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        mesh.set_normals(normals);
        mesh
    }
}

/// Ball pivoting surface reconstruction
#[derive(Debug, Clone, Default)]
pub struct BallPivoting {
    config: BPAConfig,
}

impl BallPivoting {
    pub fn new(config: BPAConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BPAConfig {
        &self.config
    }

    /// Reconstruct using a caller supplied neighbor index over `cloud`
    #[instrument(skip_all, fields(points = cloud.len()))]
    pub fn reconstruct_with_index<I>(
        &self,
        cloud: &PointCloud<NormalPoint3f>,
        index: I,
    ) -> Result<BallPivotingOutput>
    where
        I: NeighborIndex + Sync,
    {
        validate_cloud(cloud)?;
        self.config.validate()?;
        check_index_len(cloud.len(), &index)?;

        let radius = match self.config.radius {
            Some(radius) => radius,
            None => estimate_radius(cloud.as_slice(), &index, &self.config.radius_estimation)?,
        };

        let mut engine = PivotEngine::new(cloud.as_slice(), index, radius, &self.config)?;
        engine.run();
        let output = engine.into_output();

        if output.triangles.is_empty() {
            warn!(radius, "ball pivoting produced no triangles");
        }
        info!(
            radius,
            triangles = output.stats.triangles,
            seeds = output.stats.seeds,
            boundary_edges = output.stats.boundary_edges,
            merged_edges = output.stats.merged_edges,
            duplicates = output.stats.duplicates,
            "ball pivoting finished"
        );
        Ok(output)
    }
}

impl SurfaceReconstruction for BallPivoting {
    fn reconstruct(&self, cloud: &PointCloud<NormalPoint3f>) -> Result<TriangleMesh> {
        validate_cloud(cloud)?;
        let index = RTreeIndex::from_cloud(cloud);
        let output = self.reconstruct_with_index(cloud, &index)?;
        Ok(output.to_mesh(cloud))
    }
}

fn validate_cloud(cloud: &PointCloud<NormalPoint3f>) -> Result<()> {
    if cloud.is_empty() {
        return Err(Error::InvalidData("Point cloud is empty".to_string()));
    }
    if let Some(i) = cloud.iter().position(|p| !p.is_finite()) {
        return Err(Error::InvalidData(format!(
            "point {} has a non-finite position or normal",
            i
        )));
    }
    Ok(())
}

/// Ball Pivoting Algorithm for surface reconstruction
///
/// This function reconstructs a triangle mesh from an oriented point cloud
/// using the Ball Pivoting Algorithm.
///
/// # Arguments
/// * `cloud` - Point cloud with normal information
/// * `ball_radius` - Radius of the ball used for reconstruction; non-positive
///   values estimate one from the data
///
/// # Returns
/// * `Result<TriangleMesh>` - Reconstructed triangle mesh holding only the
///   points that ended up in a triangle
pub fn ball_pivoting_algorithm(
    cloud: &PointCloud<NormalPoint3f>,
    ball_radius: f32,
) -> Result<TriangleMesh> {
    BallPivoting::new(BPAConfig::with_radius(ball_radius)).reconstruct(cloud)
}

/// Ball Pivoting Algorithm with configuration
///
/// # Arguments
/// * `cloud` - Point cloud with normal information
/// * `config` - Configuration parameters
///
/// # Returns
/// * `Result<TriangleMesh>` - Reconstructed triangle mesh
pub fn ball_pivoting_algorithm_with_config(
    cloud: &PointCloud<NormalPoint3f>,
    config: &BPAConfig,
) -> Result<TriangleMesh> {
    BallPivoting::new(config.clone()).reconstruct(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::EdgeState;
    use pivotcrate_algorithms::BruteForceSearch;

    fn up(x: f32, y: f32) -> NormalPoint3f {
        NormalPoint3f::new(Point3f::new(x, y, 0.0), Vector3f::z())
    }

    fn unit_square() -> Vec<NormalPoint3f> {
        vec![up(0.0, 0.0), up(1.0, 0.0), up(1.0, 1.0), up(0.0, 1.0)]
    }

    fn engine<'a>(
        points: &'a [NormalPoint3f],
        radius: f32,
        config: &'a BPAConfig,
    ) -> PivotEngine<'a, BruteForceSearch> {
        let positions: Vec<Point3f> = points.iter().map(|p| p.position).collect();
        PivotEngine::new(points, BruteForceSearch::new(&positions), radius, config).unwrap()
    }

    #[test]
    fn test_bpa_config_default() {
        let config = BPAConfig::default();
        assert!(config.radius.is_none());
        assert!(!config.allow_back_ball);
        assert!(!config.allow_flip);
        assert!(config.collinear_cos_threshold > 0.98 && config.collinear_cos_threshold < 0.99);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_radius_non_positive_means_auto() {
        assert_eq!(BPAConfig::with_radius(0.5).radius, Some(0.5));
        assert_eq!(BPAConfig::with_radius(0.0).radius, None);
        assert_eq!(BPAConfig::with_radius(-1.0).radius, None);
        assert!(BPAConfig::with_radius(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let bad_collinear = BPAConfig {
            collinear_cos_threshold: 1.5,
            ..BPAConfig::with_radius(1.0)
        };
        assert!(matches!(bad_collinear.validate(), Err(Error::InvalidConfig(_))));

        let bad_near = BPAConfig {
            near_distance_threshold: -1.0,
            ..BPAConfig::with_radius(1.0)
        };
        assert!(bad_near.validate().is_err());

        let bad_estimation = BPAConfig {
            radius_estimation: RadiusEstimation {
                sample_count: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(bad_estimation.validate().is_err());
    }

    #[test]
    fn test_triangle_edges() {
        let triangle = Triangle::new([0, 1, 2], Point3f::origin(), Side::Front);
        let keys: Vec<_> = triangle.edges().iter().map(|e| (e.key(), e.opposite)).collect();
        assert_eq!(keys, vec![((0, 1), 2), ((1, 2), 0), ((2, 0), 1)]);
    }

    #[test]
    fn test_square_two_triangles_shared_diagonal() {
        let points = unit_square();
        let config = BPAConfig::with_radius(1.0);
        let mut engine = engine(&points, 1.0, &config);
        engine.run();

        let faces: Vec<_> = engine.triangles().iter().map(|t| t.vertices).collect();
        assert_eq!(faces, vec![[0, 1, 2], [0, 2, 3]]);

        let front = engine.front();
        assert_eq!(front.state(2, 0), Some(EdgeState::Consumed));
        assert_eq!(front.consumed_edges(), vec![(2, 0)]);
        assert_eq!(front.boundary_edges(), vec![(0, 1), (1, 2), (2, 3), (3, 0)]);
        assert_eq!(front.active_count(), 0);
        assert!(engine.is_used().iter().all(|&u| u));
    }

    #[test]
    fn test_sliver_is_not_a_seed() {
        let points = vec![up(0.0, 0.0), up(1.0, 0.0), up(2.0, 0.01)];
        let config = BPAConfig::with_radius(2.0);
        let mut engine = engine(&points, 2.0, &config);

        assert!(engine.find_seed().is_none());
        // idempotent once exhausted
        assert!(engine.find_seed().is_none());
        assert!(engine.is_used().iter().all(|&u| !u));
    }

    #[test]
    fn test_sliver_skipped_for_valid_triple() {
        // 0, 1, 2 are nearly collinear; 0, 1, 3 is a proper triangle
        let points = vec![up(0.0, 0.0), up(1.0, 0.0), up(2.0, 0.01), up(0.5, 0.8)];
        let config = BPAConfig::with_radius(2.0);
        let mut engine = engine(&points, 2.0, &config);

        let seed = engine.find_seed().unwrap();
        let mut vertices = seed.triangle;
        vertices.sort_unstable();
        assert_ne!(vertices, [0, 1, 2]);
        assert_eq!(seed.side, Side::Front);
    }

    #[test]
    fn test_find_seed_does_not_consume() {
        let points = unit_square();
        let config = BPAConfig::with_radius(1.0);
        let mut engine = engine(&points, 1.0, &config);

        let first = engine.find_seed().unwrap();
        let second = engine.find_seed().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.triangle, [0, 1, 2]);
        assert!(first.center.z > 0.0);

        engine.start_seed(first);
        assert!(engine.is_used()[..3].iter().all(|&u| u));
        assert_eq!(engine.front().active_count(), 3);
    }

    #[test]
    fn test_seed_winding_follows_normals() {
        // same square, normals pointing down
        let points: Vec<_> = unit_square()
            .into_iter()
            .map(|p| NormalPoint3f::new(p.position, -Vector3f::z()))
            .collect();
        let config = BPAConfig::with_radius(1.0);
        let mut engine = engine(&points, 1.0, &config);

        let seed = engine.find_seed().unwrap();
        assert_eq!(seed.triangle, [0, 2, 1]);
        assert!(seed.center.z < 0.0);
    }

    #[test]
    fn test_ball_too_small_finds_nothing() {
        let points = unit_square();
        let config = BPAConfig::with_radius(0.5);
        let mut engine = engine(&points, 0.5, &config);
        engine.run();
        assert!(engine.triangles().is_empty());
    }

    #[test]
    fn test_pivot_tie_goes_to_lowest_index() {
        // 0 -> 1 is the edge, 2 the opposite vertex; 3 and 4 sit on the same
        // circle across the edge, so both are reached at the same angle
        let points = vec![up(0.0, 0.0), up(1.0, 0.0), up(0.5, 0.8), up(1.0, -1.0), up(0.0, -1.0)];
        let config = BPAConfig::with_radius(1.0);
        let engine = engine(&points, 1.0, &config);

        let center = geometry::sphere_center_through_triangle(
            &points[0].position,
            &points[1].position,
            &points[2].position,
            &Vector3f::z(),
            1.0,
            Side::Front,
        )
        .unwrap();
        let edge = Edge::new(0, 1, 2, center, Side::Front);

        let hit = engine.pivot(&edge).unwrap();
        assert_eq!(hit.point, 3);
        assert!(hit.angle > 0.0);
    }

    #[test]
    fn test_back_ball_only_when_allowed() {
        // the point above the triangle sits inside the front ball; its normal
        // points down so it never forms a triangle itself
        let points = vec![
            up(0.0, 0.0),
            up(1.0, 0.0),
            up(0.0, 1.0),
            NormalPoint3f::new(Point3f::new(0.4, 0.4, 0.3), -Vector3f::z()),
        ];
        let config = BPAConfig::with_radius(1.0);
        let mut front_only = engine(&points, 1.0, &config);
        assert!(front_only.find_seed().is_none());

        let config = BPAConfig {
            allow_back_ball: true,
            ..BPAConfig::with_radius(1.0)
        };
        let mut with_back = engine(&points, 1.0, &config);
        let seed = with_back.find_seed().unwrap();
        assert_eq!(seed.side, Side::Back);
        assert!(seed.center.z < 0.0);
    }

    /// Edge 0 -> 1 of triangle (0, 1, 2) with its ball on `side`, a candidate
    /// 3 across the edge and a point 4 that sits inside the ball of
    /// (1, 0, 3) on `blocked`. Point 4 faces away from the others so it is
    /// never a vertex itself.
    fn flip_setup(side: Side, blocked: Side) -> (Vec<NormalPoint3f>, Edge) {
        let blocker_z = match blocked {
            Side::Front => 0.3,
            Side::Back => -0.3,
        };
        let points = vec![
            up(0.0, 0.0),
            up(1.0, 0.0),
            up(0.5, 0.8),
            up(0.5, -0.8),
            NormalPoint3f::new(Point3f::new(0.5, -0.4, blocker_z), -Vector3f::z()),
        ];
        let center = geometry::sphere_center_through_triangle(
            &points[0].position,
            &points[1].position,
            &points[2].position,
            &Vector3f::z(),
            1.0,
            side,
        )
        .unwrap();
        let edge = Edge::new(0, 1, 2, center, side);
        (points, edge)
    }

    #[test]
    fn test_flip_from_back_to_front() {
        let (points, edge) = flip_setup(Side::Back, Side::Back);

        let config = BPAConfig {
            allow_flip: true,
            ..BPAConfig::with_radius(1.0)
        };
        let hit = engine(&points, 1.0, &config).pivot(&edge).unwrap();
        assert_eq!(hit.point, 3);
        assert_eq!(hit.side, Side::Front);
        assert!(hit.center.z > 0.0);
    }

    #[test]
    fn test_no_flip_keeps_side() {
        let (points, edge) = flip_setup(Side::Back, Side::Back);

        let config = BPAConfig::with_radius(1.0);
        assert!(engine(&points, 1.0, &config).pivot(&edge).is_none());

        // nothing blocks the back ball here, so the side is kept
        let (points, edge) = flip_setup(Side::Back, Side::Front);
        let hit = engine(&points, 1.0, &config).pivot(&edge).unwrap();
        assert_eq!(hit.point, 3);
        assert_eq!(hit.side, Side::Back);
    }

    #[test]
    fn test_flip_to_back_needs_back_ball() {
        let (points, edge) = flip_setup(Side::Front, Side::Front);

        let flip_only = BPAConfig {
            allow_flip: true,
            ..BPAConfig::with_radius(1.0)
        };
        assert!(engine(&points, 1.0, &flip_only).pivot(&edge).is_none());

        let with_back = BPAConfig {
            allow_flip: true,
            allow_back_ball: true,
            ..BPAConfig::with_radius(1.0)
        };
        let hit = engine(&points, 1.0, &with_back).pivot(&edge).unwrap();
        assert_eq!(hit.point, 3);
        assert_eq!(hit.side, Side::Back);
        assert!(hit.center.z < 0.0);
    }

    #[test]
    fn test_duplicates_are_never_used() {
        let mut points = unit_square();
        points.extend(unit_square());
        let config = BPAConfig::with_radius(1.0);
        let mut engine = engine(&points, 1.0, &config);
        assert_eq!(engine.stats().duplicates, 4);

        engine.run();
        let faces: Vec<_> = engine.triangles().iter().map(|t| t.vertices).collect();
        assert_eq!(faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(engine.is_used()[4..].iter().all(|&u| !u));
        assert_eq!(engine.stats().seeds, 1);
    }

    #[test]
    fn test_triangle_budget_stops_early() {
        let points = unit_square();
        let config = BPAConfig {
            max_triangles: Some(1),
            ..BPAConfig::with_radius(1.0)
        };
        let mut engine = engine(&points, 1.0, &config);
        engine.run();

        assert_eq!(engine.triangles().len(), 1);
        assert!(engine.stats().truncated);
    }

    #[test]
    fn test_to_mesh_drops_unused_points() {
        let mut points = unit_square();
        points.insert(1, up(50.0, 50.0));
        let cloud = PointCloud::from_points(points);
        let output = BallPivoting::new(BPAConfig::with_radius(1.0))
            .reconstruct_with_index(&cloud, BruteForceSearch::from_cloud(&cloud))
            .unwrap();

        assert!(!output.is_used[1]);
        let mesh = output.to_mesh(&cloud);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert!(mesh.faces.iter().flatten().all(|&v| v < 4));
        assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn test_ball_pivoting_empty_cloud() {
        let cloud = PointCloud::<NormalPoint3f>::new();
        let result = ball_pivoting_algorithm(&cloud, 0.1);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_ball_pivoting_invalid_radius() {
        let mut cloud = PointCloud::new();
        cloud.push(up(0.0, 0.0));

        let result = ball_pivoting_algorithm(&cloud, f32::INFINITY);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_index_size_mismatch() {
        let cloud = PointCloud::from_points(unit_square());
        let index = BruteForceSearch::new(&[Point3f::origin()]);
        let result =
            BallPivoting::new(BPAConfig::with_radius(1.0)).reconstruct_with_index(&cloud, index);
        assert!(matches!(result, Err(Error::InvalidData(_))));

        // a larger index would hand out indices past the end of the points
        let points = unit_square();
        let mut positions: Vec<Point3f> = points.iter().map(|p| p.position).collect();
        positions.push(Point3f::new(0.5, 0.5, 0.0));
        let config = BPAConfig::with_radius(1.0);
        let engine = PivotEngine::new(&points, BruteForceSearch::new(&positions), 1.0, &config);
        assert!(matches!(engine, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_ball_pivoting_simple() {
        let cloud = PointCloud::from_points(vec![up(0.0, 0.0), up(1.0, 0.0), up(0.5, 1.0)]);
        let mesh = ball_pivoting_algorithm(&cloud, 1.0).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }
}
