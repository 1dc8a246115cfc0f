use std::fmt::{self, Write};

use glam::DVec3;

use crate::geometry::{Polygon, Solid};

/// Solid name written when the caller does not supply one.
pub const DEFAULT_SOLID_NAME: &str = "model";

/// Serializes solids as an ASCII STL document named [`DEFAULT_SOLID_NAME`].
pub fn serialize(solids: &[Solid]) -> String {
    serialize_named(solids, DEFAULT_SOLID_NAME)
}

/// Serializes solids as an ASCII STL document.
///
/// Polygons are fan-triangulated from their first vertex, which is only
/// correct for convex planar faces. Polygons with fewer than three vertices
/// and triangles touching a malformed vertex are left out. Facet normals come
/// from the stored plane normal, or the zero vector when there is none.
pub fn serialize_named(solids: &[Solid], name: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "solid {name}");
    for_each_facet(solids, |normal, triangle| {
        let _ = write_facet(&mut out, normal, triangle);
    });
    let _ = writeln!(out, "endsolid {name}");
    out
}

/// Number of facets [`serialize`] would emit for `solids`.
pub fn facet_count(solids: &[Solid]) -> usize {
    let mut count = 0;
    for_each_facet(solids, |_, _| count += 1);
    count
}

fn for_each_facet(solids: &[Solid], mut emit: impl FnMut(DVec3, [DVec3; 3])) {
    for polygon in solids.iter().flat_map(|solid| &solid.polygons) {
        if polygon.vertices.len() < 3 {
            continue;
        }
        let normal = facet_normal(polygon);
        for triangle in fan_triangles(polygon) {
            emit(normal, triangle);
        }
    }
}

fn fan_triangles(polygon: &Polygon) -> impl Iterator<Item = [DVec3; 3]> + '_ {
    let vertices = &polygon.vertices;
    (1..vertices.len() - 1).filter_map(move |i| {
        Some([
            vertices[0].position()?,
            vertices[i].position()?,
            vertices[i + 1].position()?,
        ])
    })
}

fn facet_normal(polygon: &Polygon) -> DVec3 {
    let normal = polygon.plane_normal.unwrap_or(DVec3::ZERO);
    DVec3::new(
        normal_component(normal.x),
        normal_component(normal.y),
        normal_component(normal.z),
    )
}

fn normal_component(value: f64) -> f64 {
    // Also folds -0.0 into 0.0.
    if value.is_nan() || value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Coordinate as written to the file: `-0` prints as `0` and infinities as
/// `Infinity`/`-Infinity`.
struct Coord(f64);

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            v if v == 0.0 => f.write_str("0"),
            v if v == f64::INFINITY => f.write_str("Infinity"),
            v if v == f64::NEG_INFINITY => f.write_str("-Infinity"),
            v if v.is_nan() => f.write_str("NaN"),
            v => write!(f, "{v}"),
        }
    }
}

fn write_point(out: &mut String, label: &str, point: DVec3) -> fmt::Result {
    writeln!(
        out,
        "{label} {} {} {}",
        Coord(point.x),
        Coord(point.y),
        Coord(point.z)
    )
}

fn write_facet(out: &mut String, normal: DVec3, triangle: [DVec3; 3]) -> fmt::Result {
    write_point(out, " facet normal", normal)?;
    writeln!(out, "  outer loop")?;
    for vertex in triangle {
        write_point(out, "   vertex", vertex)?;
    }
    writeln!(out, "  endloop")?;
    writeln!(out, " endfacet")
}
