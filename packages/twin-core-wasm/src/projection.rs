// Fixed EPSG:4326 -> EPSG:3857 projection used for the whole scene.
//
// The viewer works in planar web-mercator meters; a configured reference
// coordinate is projected once and becomes the scene origin that every other
// projected coordinate is expressed against.

use crate::geojson::{GeoJson, Geometry};

/// Earth radius of the spherical mercator definition, in meters.
const EARTH_RADIUS: f64 = 6378137.0;

/// Project a (longitude, latitude) pair in degrees to web-mercator meters.
///
/// Pure and deterministic; invalid numeric input (NaN, out-of-range latitude)
/// propagates into the result rather than being validated here.
pub fn project_lng_lat(lng: f64, lat: f64) -> [f64; 2] {
    let x = EARTH_RADIUS * lng.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    [x, y]
}

/// Inverse of [`project_lng_lat`]: web-mercator meters back to degrees.
pub fn unproject(x: f64, y: f64) -> [f64; 2] {
    let lng = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    [lng, lat]
}

/// Reproject every coordinate of a geometry in place, longitude/latitude to
/// world meters. Extra position dimensions (elevation) are left untouched.
pub fn reproject_geometry(geometry: &mut Geometry) {
    match geometry {
        Geometry::Point { coordinates } => reproject_position(coordinates),
        Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
            for position in coordinates {
                reproject_position(position);
            }
        }
        Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
            for ring in coordinates {
                for position in ring {
                    reproject_position(position);
                }
            }
        }
        Geometry::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                for ring in polygon {
                    for position in ring {
                        reproject_position(position);
                    }
                }
            }
        }
        Geometry::GeometryCollection { geometries } => {
            for member in geometries {
                reproject_geometry(member);
            }
        }
    }
}

/// Reproject a whole parsed document in one pass, preserving the
/// feature/property structure unchanged.
pub fn reproject_document(document: &mut GeoJson) {
    match document {
        GeoJson::Feature(feature) => {
            if let Some(geometry) = feature.geometry.as_mut() {
                reproject_geometry(geometry);
            }
        }
        GeoJson::FeatureCollection { features } => {
            for feature in features {
                if let Some(geometry) = feature.geometry.as_mut() {
                    reproject_geometry(geometry);
                }
            }
        }
        GeoJson::Geometry(geometry) => reproject_geometry(geometry),
    }
}

fn reproject_position(position: &mut Vec<f64>) {
    if position.len() >= 2 {
        let projected = project_lng_lat(position[0], position[1]);
        position[0] = projected[0];
        position[1] = projected[1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_island_projects_to_origin() {
        let p = project_lng_lat(0.0, 0.0);
        assert!(p[0].abs() < 1e-9);
        assert!(p[1].abs() < 1e-9);
    }

    #[test]
    fn known_point_matches_epsg_3857() {
        // 180 degrees east maps to the mercator half-circumference.
        let p = project_lng_lat(180.0, 0.0);
        assert!((p[0] - 20037508.342789244).abs() < 1e-6);

        // 45N reference value for the spherical mercator.
        let p = project_lng_lat(0.0, 45.0);
        assert!((p[1] - 5621521.486192767).abs() < 1e-3);
    }

    #[test]
    fn projection_is_deterministic() {
        let a = project_lng_lat(-8.7016652234108349, 41.185523935676713);
        let b = project_lng_lat(-8.7016652234108349, 41.185523935676713);
        assert_eq!(a, b);
    }

    #[test]
    fn round_trips_through_unproject() {
        let [x, y] = project_lng_lat(-8.70166, 41.18552);
        let [lng, lat] = unproject(x, y);
        assert!((lng - -8.70166).abs() < 1e-9);
        assert!((lat - 41.18552).abs() < 1e-9);
    }

    #[test]
    fn nan_input_propagates() {
        let p = project_lng_lat(f64::NAN, 10.0);
        assert!(p[0].is_nan());
    }

    #[test]
    fn reprojection_keeps_elevation() {
        let mut geometry = Geometry::Point {
            coordinates: vec![0.0, 0.0, 123.5],
        };
        reproject_geometry(&mut geometry);
        match geometry {
            Geometry::Point { coordinates } => assert_eq!(coordinates[2], 123.5),
            _ => unreachable!(),
        }
    }
}
