//! Geometry kernel for ball pivoting
//!
//! Stateless routines over point coordinates: bisector planes, circumcircles,
//! fixed-radius spheres through three points and the empty-sphere test that
//! validates every emitted triangle. Degenerate inputs yield `None` rather
//! than NaNs so callers can simply skip the candidate.

use pivotcrate_core::{Point3f, Vector3f};
use std::f32::consts::TAU;

/// Relative slack used when deciding whether a point is strictly inside a ball.
///
/// Points of a regular sampling are often co-spherical with a candidate
/// triangle; they sit on the ball surface and must not invalidate it.
pub const EMPTY_SPHERE_TOLERANCE: f32 = 1e-4;

/// Rotation angles closer than this are considered equal.
pub const ANGLE_TOLERANCE: f32 = 1e-4;

/// Which side of an oriented triangle a ball rests on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Along the triangle normal, i.e. the side the point normals face
    Front,
    /// Against the triangle normal
    Back,
}

impl Side {
    /// The other side
    pub fn flipped(self) -> Self {
        match self {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
        }
    }

    /// +1 for the front side, -1 for the back side
    pub fn sign(self) -> f32 {
        match self {
            Side::Front => 1.0,
            Side::Back => -1.0,
        }
    }
}

/// A plane `normal · x + offset = 0` with unit normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3f,
    pub offset: f32,
}

impl Plane {
    /// Signed distance of `point` to the plane, positive on the normal side
    pub fn signed_distance(&self, point: &Point3f) -> f32 {
        self.normal.dot(&point.coords) + self.offset
    }

    /// Orthogonal projection of `point` onto the plane
    pub fn project(&self, point: &Point3f) -> Point3f {
        point - self.normal * self.signed_distance(point)
    }
}

/// The plane equidistant from two points, with normal pointing from `p0` to `p1`
///
/// Returns `None` when the points coincide.
pub fn plane_between(p0: &Point3f, p1: &Point3f) -> Option<Plane> {
    let normal = (p1 - p0).try_normalize(f32::EPSILON)?;
    // the midpoint lies on the plane
    let offset = -(p0.coords + p1.coords).dot(&normal) * 0.5;
    Some(Plane { normal, offset })
}

/// Unit normal of the triangle `(p0, p1, p2)` following its winding
pub fn triangle_normal(p0: &Point3f, p1: &Point3f, p2: &Point3f) -> Option<Vector3f> {
    (p1 - p0).cross(&(p2 - p0)).try_normalize(f32::EPSILON)
}

/// Center of the circle through three points
///
/// Uses barycentric weights built from the squared edge lengths divided by
/// twice the squared (doubled) triangle area. Returns `None` for collinear
/// input.
pub fn circumscribed_center(p0: &Point3f, p1: &Point3f, p2: &Point3f) -> Option<Point3f> {
    let vec2 = p0 - p1;
    let vec0 = p1 - p2;
    let vec1 = p2 - p0;

    let area = vec0.cross(&vec1).norm();
    if area <= f32::EPSILON * vec0.norm() * vec1.norm() {
        return None;
    }
    let determinator = 2.0 * area * area;

    let alpha = vec0.norm_squared() * vec2.dot(&-vec1) / determinator;
    let beta = vec1.norm_squared() * -vec2.dot(&vec0) / determinator;
    let gamma = vec2.norm_squared() * vec1.dot(&-vec0) / determinator;

    Some(Point3f::from(
        p0.coords * alpha + p1.coords * beta + p2.coords * gamma,
    ))
}

/// Center of the sphere of `radius` touching all three points, on `side`
///
/// The triangle normal is flipped when needed so that it agrees with
/// `normal_hint`; the front center lies along that normal. Returns `None`
/// when the triangle is degenerate or the ball is too small to touch all
/// three points.
pub fn sphere_center_through_triangle(
    p0: &Point3f,
    p1: &Point3f,
    p2: &Point3f,
    normal_hint: &Vector3f,
    radius: f32,
    side: Side,
) -> Option<Point3f> {
    let circle_center = circumscribed_center(p0, p1, p2)?;
    let circle_radius_squared = (circle_center - p0).norm_squared();
    let radius_squared = radius * radius;
    if circle_radius_squared > radius_squared {
        return None;
    }

    let mut normal = triangle_normal(p0, p1, p2)?;
    if normal.dot(normal_hint) < 0.0 {
        normal = -normal;
    }

    let height = (radius_squared - circle_radius_squared).sqrt();
    Some(circle_center + normal * (height * side.sign()))
}

/// Whether no candidate lies strictly inside the ball
pub fn is_empty_sphere<I>(center: &Point3f, radius: f32, candidates: I) -> bool
where
    I: IntoIterator<Item = Point3f>,
{
    let limit = radius * (1.0 - EMPTY_SPHERE_TOLERANCE);
    let limit_squared = limit * limit;
    candidates
        .into_iter()
        .all(|p| (p - center).norm_squared() >= limit_squared)
}

/// Whether the angle at `p0` between `p1` and `p2` is too close to 0° or 180°
///
/// Coincident points count as collinear.
pub fn is_collinear(p0: &Point3f, p1: &Point3f, p2: &Point3f, cos_threshold: f32) -> bool {
    let d1 = p1 - p0;
    let d2 = p2 - p0;
    let norms = d1.norm() * d2.norm();
    if norms <= f32::EPSILON {
        return true;
    }
    (d1.dot(&d2) / norms).abs() > cos_threshold
}

/// Whether two points are closer than `threshold`
pub fn is_too_near(p0: &Point3f, p1: &Point3f, threshold: f32) -> bool {
    (p1 - p0).norm() < threshold
}

/// Angle in `[0, 2π)` that rotates `from` onto `to` counter-clockwise around `axis`
///
/// Both vectors are expected to be perpendicular to the unit `axis`. Angles
/// within [`ANGLE_TOLERANCE`] below a full turn are reported as zero.
pub fn rotation_angle(axis: &Vector3f, from: &Vector3f, to: &Vector3f) -> f32 {
    let sin = axis.dot(&from.cross(to));
    let cos = from.dot(to);
    let mut angle = sin.atan2(cos);
    if angle < 0.0 {
        angle += TAU;
    }
    if angle >= TAU - ANGLE_TOLERANCE {
        angle = 0.0;
    }
    angle
}
