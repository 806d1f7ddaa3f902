// Ring-to-shape tessellation: the step between projected GeoJSON rings and
// the extrusion builder. First ring of a polygon is the outer boundary, every
// further ring becomes a hole subtracted from it.

/// A closed planar shape in projected world units. Transient: built per
/// feature, consumed by the extruder, then discarded.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    pub outer: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
}

impl Shape {
    /// A ring needs at least three points to enclose any area; shorter rings
    /// pass through silently and the extruder emits nothing for them.
    pub fn is_degenerate(&self) -> bool {
        self.outer.len() < 3
    }
}

/// Build the single shape of a Polygon coordinate array: ring 0 is the outer
/// boundary, rings 1.. are holes. No epsilon handling is applied; duplicate
/// or self-intersecting points pass through to the mesh builder as-is.
pub fn shapes_from_polygon(rings: &[Vec<Vec<f64>>]) -> Vec<Shape> {
    let Some(outer) = rings.first() else {
        return Vec::new();
    };

    let mut shape = Shape {
        outer: ring_points(outer),
        holes: Vec::new(),
    };
    for hole in &rings[1..] {
        shape.holes.push(ring_points(hole));
    }

    vec![shape]
}

/// Build one shape per member polygon of a MultiPolygon, from the outer ring
/// only. Holes of member polygons are intentionally not carried over; see
/// DESIGN.md before changing this.
pub fn shapes_from_multi_polygon(polygons: &[Vec<Vec<Vec<f64>>>]) -> Vec<Shape> {
    polygons
        .iter()
        .filter_map(|rings| rings.first())
        .map(|outer| Shape {
            outer: ring_points(outer),
            holes: Vec::new(),
        })
        .collect()
}

fn ring_points(ring: &[Vec<f64>]) -> Vec<[f64; 2]> {
    ring.iter()
        .filter(|position| position.len() >= 2)
        .map(|position| [position[0], position[1]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(offset: f64) -> Vec<Vec<f64>> {
        vec![
            vec![offset, offset],
            vec![offset + 1.0, offset],
            vec![offset + 1.0, offset + 1.0],
            vec![offset, offset + 1.0],
            vec![offset, offset],
        ]
    }

    #[test]
    fn polygon_with_n_rings_yields_one_shape_with_n_minus_one_holes() {
        let rings = vec![square(0.0), square(0.25), square(0.5)];
        let shapes = shapes_from_polygon(&rings);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].holes.len(), 2);
        assert_eq!(shapes[0].outer.len(), 5);
    }

    #[test]
    fn multi_polygon_yields_one_shape_per_member() {
        let polygons = vec![
            vec![square(0.0), square(0.25)],
            vec![square(10.0)],
            vec![square(20.0)],
        ];
        let shapes = shapes_from_multi_polygon(&polygons);
        assert_eq!(shapes.len(), 3);
        // Outer-ring-only behavior: the first member's hole is dropped.
        assert!(shapes.iter().all(|s| s.holes.is_empty()));
    }

    #[test]
    fn degenerate_ring_produces_no_edges_without_error() {
        let rings = vec![vec![vec![1.0, 1.0]]];
        let shapes = shapes_from_polygon(&rings);
        assert_eq!(shapes.len(), 1);
        assert!(shapes[0].is_degenerate());
    }

    #[test]
    fn empty_coordinate_array_yields_nothing() {
        assert!(shapes_from_polygon(&[]).is_empty());
        assert!(shapes_from_multi_polygon(&[]).is_empty());
    }
}
