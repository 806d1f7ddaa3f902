// Terrain surface from scattered elevation samples. Points carry their
// elevation in the third coordinate; the planar positions are Delaunay
// triangulated and the samples become a TIN mesh.

use delaunator::{triangulate, Point};

use crate::error::TwinError;
use crate::geometry::{compute_vertex_normals, BufferGeometry};

/// Vertical exaggeration applied to sampled elevations.
pub const ELEVATION_SCALE: f64 = 2.0;

/// Build a TIN from projected samples `[x, y, elevation]`. Fewer than three
/// non-collinear points cannot form a surface and fail the call.
pub fn triangulate_terrain(samples: &[[f64; 3]]) -> Result<BufferGeometry, TwinError> {
    if samples.len() < 3 {
        return Err(TwinError::InvalidInput(format!(
            "terrain needs at least 3 samples, got {}",
            samples.len()
        )));
    }

    let points: Vec<Point> = samples
        .iter()
        .map(|sample| Point {
            x: sample[0],
            y: sample[1],
        })
        .collect();

    let triangulation = triangulate(&points);
    if triangulation.triangles.is_empty() {
        return Err(TwinError::Triangulation(
            "degenerate sample set, all points collinear".to_string(),
        ));
    }

    let mut positions = Vec::with_capacity(samples.len() * 3);
    let mut uvs = Vec::with_capacity(samples.len() * 2);

    let (min_x, min_y, max_x, max_y) = bounds(samples);
    let span_x = (max_x - min_x).max(f64::EPSILON);
    let span_y = (max_y - min_y).max(f64::EPSILON);

    for sample in samples {
        positions.push(sample[0] as f32);
        positions.push(sample[1] as f32);
        positions.push((sample[2] * ELEVATION_SCALE) as f32);
        uvs.push(((sample[0] - min_x) / span_x) as f32);
        uvs.push(((sample[1] - min_y) / span_y) as f32);
    }

    let indices: Vec<u32> = triangulation
        .triangles
        .iter()
        .map(|&index| index as u32)
        .collect();

    let normals = compute_vertex_normals(&positions, &indices);

    Ok(BufferGeometry {
        has_data: true,
        positions,
        normals: Some(normals),
        uvs: Some(uvs),
        indices: Some(indices),
    })
}

fn bounds(samples: &[[f64; 3]]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for sample in samples {
        min_x = min_x.min(sample[0]);
        min_y = min_y.min(sample[1]);
        max_x = max_x.max(sample[0]);
        max_y = max_y.max(sample[1]);
    }
    (min_x, min_y, max_x, max_y)
}
