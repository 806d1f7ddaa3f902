// Mesh buffer container handed across the wasm boundary. The host renderer
// uploads these attributes directly into its buffer geometry objects.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BufferGeometry {
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    pub uvs: Option<Vec<f32>>,
    pub indices: Option<Vec<u32>>,
    pub has_data: bool,
}

impl BufferGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Translate all positions in place. Used to recenter extruded output on
    /// the scene origin and to lift it by the layer altitude.
    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) {
        for vertex in self.positions.chunks_exact_mut(3) {
            vertex[0] += dx as f32;
            vertex[1] += dy as f32;
            vertex[2] += dz as f32;
        }
    }
}

/// Accumulate area-weighted face normals per vertex, then normalize. Indexed
/// geometry only; callers without indices get smooth-shaded defaults.
pub fn compute_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut normals = vec![0.0f32; positions.len()];

    for face in indices.chunks_exact(3) {
        let a = face[0] as usize;
        let b = face[1] as usize;
        let c = face[2] as usize;

        let ax = positions[a * 3];
        let ay = positions[a * 3 + 1];
        let az = positions[a * 3 + 2];

        let v1x = positions[b * 3] - ax;
        let v1y = positions[b * 3 + 1] - ay;
        let v1z = positions[b * 3 + 2] - az;

        let v2x = positions[c * 3] - ax;
        let v2y = positions[c * 3 + 1] - ay;
        let v2z = positions[c * 3 + 2] - az;

        let nx = v1y * v2z - v1z * v2y;
        let ny = v1z * v2x - v1x * v2z;
        let nz = v1x * v2y - v1y * v2x;

        for &vertex in &[a, b, c] {
            normals[vertex * 3] += nx;
            normals[vertex * 3 + 1] += ny;
            normals[vertex * 3 + 2] += nz;
        }
    }

    for normal in normals.chunks_exact_mut(3) {
        let length = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        if length > 0.0 {
            normal[0] /= length;
            normal[1] /= length;
            normal[2] /= length;
        } else {
            normal[0] = 0.0;
            normal[1] = 0.0;
            normal[2] = 1.0;
        }
    }

    normals
}
