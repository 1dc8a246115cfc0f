use std::ops::Deref;
use std::sync::Arc;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Coordinates of a polygon corner as produced by a script.
///
/// Geometry built in script code is not validated, so a vertex may carry
/// fewer than three components. Consumers decide how to treat those.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vertex(pub Vec<f64>);

impl Vertex {
    pub fn new(position: DVec3) -> Self {
        Self(position.to_array().to_vec())
    }

    /// Returns the position when at least three coordinates are present.
    pub fn position(&self) -> Option<DVec3> {
        match self.0.as_slice() {
            [x, y, z, ..] => Some(DVec3::new(*x, *y, *z)),
            _ => None,
        }
    }
}

impl From<DVec3> for Vertex {
    fn from(position: DVec3) -> Self {
        Self::new(position)
    }
}

/// Boundary of one face of a solid. Not necessarily a triangle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Vertex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane_normal: Option<DVec3>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vertex>, plane_normal: Option<DVec3>) -> Self {
        Self {
            vertices,
            plane_normal,
        }
    }

    /// Builds a polygon from well-formed points and derives its plane normal.
    pub fn from_points(points: &[DVec3]) -> Self {
        Self {
            vertices: points.iter().copied().map(Vertex::new).collect(),
            plane_normal: newell_normal(points),
        }
    }

    /// Positions of all well-formed vertices, in boundary order.
    pub fn positions(&self) -> Vec<DVec3> {
        self.vertices.iter().filter_map(Vertex::position).collect()
    }

    /// Applies `transform` to every well-formed vertex and recomputes the normal.
    pub fn map_points(&self, transform: impl Fn(DVec3) -> DVec3) -> Self {
        let points: Vec<DVec3> = self.positions().into_iter().map(transform).collect();
        Self::from_points(&points)
    }
}

/// Best-effort plane normal using Newell's method. `None` for degenerate input.
fn newell_normal(points: &[DVec3]) -> Option<DVec3> {
    if points.len() < 3 {
        return None;
    }
    let mut normal = DVec3::ZERO;
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal.try_normalize()
}

/// Polygon soup describing a single shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Solid {
    pub polygons: Vec<Polygon>,
}

impl Solid {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn map_points(&self, transform: impl Fn(DVec3) -> DVec3 + Copy) -> Self {
        Self {
            polygons: self
                .polygons
                .iter()
                .map(|polygon| polygon.map_points(transform))
                .collect(),
        }
    }
}

/// Output of one script run.
///
/// The collection is immutable once built; replacing it means swapping the
/// whole value, so readers never observe a partially built list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Solid>", into = "Vec<Solid>")]
pub struct SolidCollection(Arc<[Solid]>);

impl SolidCollection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn solids(&self) -> &[Solid] {
        &self.0
    }

    /// True when both handles point at the same underlying collection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for SolidCollection {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl Deref for SolidCollection {
    type Target = [Solid];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Solid>> for SolidCollection {
    fn from(solids: Vec<Solid>) -> Self {
        Self(solids.into())
    }
}

impl From<SolidCollection> for Vec<Solid> {
    fn from(collection: SolidCollection) -> Self {
        collection.0.to_vec()
    }
}

impl FromIterator<Solid> for SolidCollection {
    fn from_iter<I: IntoIterator<Item = Solid>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
