// Prism extrusion of planar shapes along +z. Caps are triangulated with
// earcut; walls are quads split into triangles. Output is a flat-shaded
// vertex soup with per-face normals, which is what the host renderer expects
// for hard-edged building geometry.

use earcutr::earcut;

use crate::error::TwinError;
use crate::geometry::BufferGeometry;
use crate::shape::Shape;

const EPSILON: f64 = 1e-10;

/// Signed-area winding test; `true` for clockwise rings.
fn is_clockwise(points: &[[f64; 2]]) -> bool {
    let mut area = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        area += points[i][0] * points[j][1];
        area -= points[j][0] * points[i][1];
    }
    area <= 0.0
}

/// Drop consecutive points closer than a scale-relative epsilon. Earcut
/// tolerates them but the wall quads they produce are degenerate.
fn merge_overlapping_points(points: &mut Vec<[f64; 2]>) {
    if points.is_empty() {
        return;
    }

    let threshold_sq = EPSILON * EPSILON;
    let mut prev = points[0];
    let mut i = 1;

    while i <= points.len() {
        let current_index = i % points.len();
        if current_index == 0 {
            break;
        }

        let current = points[current_index];
        let dx = current[0] - prev[0];
        let dy = current[1] - prev[1];
        let dist_sq = dx * dx + dy * dy;

        let scale = f64::max(
            f64::max(current[0].abs(), current[1].abs()),
            f64::max(prev[0].abs(), prev[1].abs()),
        );

        if dist_sq <= threshold_sq * scale * scale {
            points.remove(current_index);
            continue;
        }

        prev = current;
        i += 1;
    }
}

struct MeshBuilder {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn new() -> Self {
        MeshBuilder {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Emit one flat-shaded triangle from the staged vertex table.
    fn add_triangle(&mut self, staged: &[[f64; 3]], a: usize, b: usize, c: usize) {
        let base = (self.positions.len() / 3) as u32;
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);

        let pa = staged[a];
        let pb = staged[b];
        let pc = staged[c];

        let v1 = [pb[0] - pa[0], pb[1] - pa[1], pb[2] - pa[2]];
        let v2 = [pc[0] - pa[0], pc[1] - pa[1], pc[2] - pa[2]];
        let mut normal = [
            v1[1] * v2[2] - v1[2] * v2[1],
            v1[2] * v2[0] - v1[0] * v2[2],
            v1[0] * v2[1] - v1[1] * v2[0],
        ];

        let length = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        if length > EPSILON {
            normal = [normal[0] / length, normal[1] / length, normal[2] / length];
        } else {
            normal = [0.0, 0.0, 1.0];
        }

        for point in [pa, pb, pc] {
            self.positions.push(point[0] as f32);
            self.positions.push(point[1] as f32);
            self.positions.push(point[2] as f32);
            self.normals.push(normal[0] as f32);
            self.normals.push(normal[1] as f32);
            self.normals.push(normal[2] as f32);
            // Planar UVs in world units; the host rescales per material.
            self.uvs.push(point[0] as f32);
            self.uvs.push(point[1] as f32);
        }
    }

    fn add_quad(&mut self, staged: &[[f64; 3]], a: usize, b: usize, c: usize, d: usize) {
        self.add_triangle(staged, a, b, d);
        self.add_triangle(staged, b, c, d);
    }

    fn finish(self) -> BufferGeometry {
        BufferGeometry {
            has_data: !self.positions.is_empty(),
            positions: self.positions,
            normals: Some(self.normals),
            uvs: Some(self.uvs),
            indices: Some(self.indices),
        }
    }
}

/// Extrude shapes into a single mesh: bottom caps at z=0, top caps at
/// z=depth, walls around the outer boundary and every hole. Degenerate
/// shapes contribute nothing; a failed triangulation fails the call.
pub fn extrude_shapes(shapes: &[Shape], depth: f64) -> Result<BufferGeometry, TwinError> {
    let mut builder = MeshBuilder::new();

    for shape in shapes {
        if shape.is_degenerate() {
            continue;
        }

        let mut contour = shape.outer.clone();
        let mut holes: Vec<Vec<[f64; 2]>> = shape.holes.clone();

        // Normalize winding so caps face outward regardless of input order.
        if !is_clockwise(&contour) {
            contour.reverse();
            for hole in &mut holes {
                if is_clockwise(hole) {
                    hole.reverse();
                }
            }
        }

        merge_overlapping_points(&mut contour);
        for hole in &mut holes {
            merge_overlapping_points(hole);
        }
        holes.retain(|hole| hole.len() >= 3);
        if contour.len() < 3 {
            continue;
        }

        let point_total = contour.len() + holes.iter().map(Vec::len).sum::<usize>();
        let mut flat: Vec<f64> = Vec::with_capacity(point_total * 2);
        for point in &contour {
            flat.push(point[0]);
            flat.push(point[1]);
        }
        let mut hole_indices = Vec::with_capacity(holes.len());
        let mut offset = contour.len();
        for hole in &holes {
            hole_indices.push(offset);
            for point in hole {
                flat.push(point[0]);
                flat.push(point[1]);
            }
            offset += hole.len();
        }

        let cap_indices = earcut(&flat, &hole_indices, 2)
            .map_err(|e| TwinError::Triangulation(format!("{e:?}")))?;

        // Staged vertex table: bottom ring points then top ring points.
        let mut rim: Vec<[f64; 2]> = contour.clone();
        for hole in &holes {
            rim.extend_from_slice(hole);
        }
        let rim_len = rim.len();

        let mut staged: Vec<[f64; 3]> = Vec::with_capacity(rim_len * 2);
        for point in &rim {
            staged.push([point[0], point[1], 0.0]);
        }
        for point in &rim {
            staged.push([point[0], point[1], depth]);
        }

        // Bottom caps wind reversed so they face downward.
        for face in cap_indices.chunks_exact(3) {
            builder.add_triangle(&staged, face[2], face[1], face[0]);
        }
        for face in cap_indices.chunks_exact(3) {
            builder.add_triangle(
                &staged,
                face[0] + rim_len,
                face[1] + rim_len,
                face[2] + rim_len,
            );
        }

        // Walls around the contour, then around each hole.
        let mut ring_offset = 0;
        for ring_len in std::iter::once(contour.len()).chain(holes.iter().map(Vec::len)) {
            for i in (0..ring_len).rev() {
                let j = i;
                let k = if i == 0 { ring_len - 1 } else { i - 1 };

                let a = ring_offset + j;
                let b = ring_offset + k;
                let c = ring_offset + k + rim_len;
                let d = ring_offset + j + rim_len;

                builder.add_quad(&staged, a, b, c, d);
            }
            ring_offset += ring_len;
        }
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Shape {
        Shape {
            outer: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            holes: Vec::new(),
        }
    }

    #[test]
    fn unit_square_extrudes_to_a_closed_prism() {
        let mesh = extrude_shapes(&[unit_square()], 5.0).unwrap();
        assert!(mesh.has_data);

        // 2 cap triangles top and bottom plus 2 per wall quad on 4 walls.
        let triangle_count = mesh.indices.as_ref().unwrap().len() / 3;
        assert_eq!(triangle_count, 12);

        let max_z = mesh
            .positions
            .chunks_exact(3)
            .map(|v| v[2])
            .fold(f32::MIN, f32::max);
        let min_z = mesh
            .positions
            .chunks_exact(3)
            .map(|v| v[2])
            .fold(f32::MAX, f32::min);
        assert_eq!(min_z, 0.0);
        assert_eq!(max_z, 5.0);
    }

    #[test]
    fn hole_adds_wall_geometry() {
        let with_hole = Shape {
            outer: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
            holes: vec![vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]]],
        };
        let solid = Shape {
            outer: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
            holes: Vec::new(),
        };

        let holed_mesh = extrude_shapes(&[with_hole], 1.0).unwrap();
        let solid_mesh = extrude_shapes(&[solid], 1.0).unwrap();
        assert!(holed_mesh.positions.len() > solid_mesh.positions.len());
    }

    #[test]
    fn degenerate_shape_yields_empty_mesh() {
        let degenerate = Shape {
            outer: vec![[0.0, 0.0], [1.0, 1.0]],
            holes: Vec::new(),
        };
        let mesh = extrude_shapes(&[degenerate], 2.0).unwrap();
        assert!(!mesh.has_data);
    }

    #[test]
    fn winding_direction_does_not_change_output_shape() {
        let ccw = unit_square();
        let mut cw = unit_square();
        cw.outer.reverse();

        let mesh_a = extrude_shapes(&[ccw], 2.0).unwrap();
        let mesh_b = extrude_shapes(&[cw], 2.0).unwrap();
        assert_eq!(mesh_a.positions.len(), mesh_b.positions.len());
        assert_eq!(mesh_a.indices.unwrap().len(), mesh_b.indices.unwrap().len());
    }
}
