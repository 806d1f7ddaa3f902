// Instanced placement: many copies of one asset positioned by per-instance
// transforms. The core resolves anchor coordinates into column-major 4x4
// matrices the host feeds straight into an instanced mesh.

use nalgebra::{Matrix4, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::TwinError;
use crate::projection::project_lng_lat;

/// Hard cap on instances per call. The host preallocates instance buffers of
/// this size.
pub const MAX_INSTANCES: usize = 3000;

/// Heading applied when an anchor does not specify one.
pub const DEFAULT_ROTATION_Y: f64 = std::f64::consts::PI / 4.5;

/// One requested instance: geographic anchor plus optional overrides.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InstanceAnchor {
    pub lng: f64,
    pub lat: f64,
    #[serde(default)]
    pub altitude: f64,
    pub rotation_y: Option<f64>,
    pub scale: Option<f64>,
}

/// Instance buffer handed to the host: one column-major 4x4 matrix per
/// anchor, in host scene space relative to the given origin.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSet {
    pub count: usize,
    pub transforms: Vec<[f64; 16]>,
}

/// Resolve anchors into instance transforms. More than [`MAX_INSTANCES`]
/// anchors is an error rather than a silent truncation, so the caller learns
/// the set must be split.
pub fn build_instances(
    anchors: &[InstanceAnchor],
    origin: [f64; 2],
) -> Result<InstanceSet, TwinError> {
    if anchors.len() > MAX_INSTANCES {
        return Err(TwinError::InstanceCapacity {
            requested: anchors.len(),
            capacity: MAX_INSTANCES,
        });
    }

    let mut transforms = Vec::with_capacity(anchors.len());

    for anchor in anchors {
        let [x, y] = project_lng_lat(anchor.lng, anchor.lat);

        // Host scene space: x east, y up, z south.
        let position = Vector3::new(x - origin[0], anchor.altitude, -(y - origin[1]));
        let rotation = UnitQuaternion::from_axis_angle(
            &Vector3::y_axis(),
            anchor.rotation_y.unwrap_or(DEFAULT_ROTATION_Y),
        );
        let scale = anchor.scale.unwrap_or(1.0);

        let matrix: Matrix4<f64> = Translation3::from(position).to_homogeneous()
            * rotation.to_homogeneous()
            * Matrix4::new_scaling(scale);

        let mut column_major = [0.0f64; 16];
        column_major.copy_from_slice(matrix.as_slice());
        transforms.push(column_major);
    }

    Ok(InstanceSet {
        count: transforms.len(),
        transforms,
    })
}
