//! Geospatial layers: spatial unit polygons and the transit line overlay.
use crate::access::{AccessTable, ScoreKind, SpatialUnitID};
use crate::error::{DataQualityError, JoinMismatchError};
use crate::input::input_err_msg;
use anyhow::{Context, Result, bail};
use geo::{Geometry, GeometryCollection, LineString, MultiPolygon};
use geojson::{Feature, GeoJson};
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// A spatial unit's boundary
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    /// The spatial unit
    pub unit: SpatialUnitID,
    /// Its boundary, in longitude/latitude
    pub polygon: MultiPolygon<f64>,
}

/// A spatial unit's boundary with the value to be classified
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    /// The spatial unit
    pub unit: SpatialUnitID,
    /// Its boundary, in longitude/latitude
    pub polygon: MultiPolygon<f64>,
    /// The mapped accessibility measure
    pub value: f64,
}

fn read_geojson(file_path: &Path) -> Result<GeoJson> {
    let contents = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    contents
        .parse::<GeoJson>()
        .with_context(|| input_err_msg(file_path))
}

/// The spatial unit ID stored in a feature's properties.
///
/// Numeric IDs are accepted, though any leading zeros will already have been lost.
fn feature_unit(feature: &Feature, id_property: &str) -> Result<SpatialUnitID> {
    match feature.property(id_property) {
        Some(serde_json::Value::String(id)) => Ok(SpatialUnitID::new(id)),
        Some(serde_json::Value::Number(id)) => Ok(id.to_string().into()),
        Some(_) => bail!("Property {id_property} is not a string or number"),
        None => bail!("Feature is missing the {id_property} property"),
    }
}

/// Read a layer of spatial unit polygons from a GeoJSON `FeatureCollection`.
///
/// Features without polygon geometry are skipped with a warning.
///
/// # Arguments
///
/// * `file_path` - Path to the GeoJSON file
/// * `id_property` - The feature property holding spatial unit IDs
pub fn read_polygon_layer(file_path: &Path, id_property: &str) -> Result<Vec<PolygonFeature>> {
    let GeoJson::FeatureCollection(collection) = read_geojson(file_path)? else {
        bail!("{} is not a GeoJSON FeatureCollection", file_path.display());
    };

    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;
    for feature in collection.features {
        let unit = feature_unit(&feature, id_property).with_context(|| input_err_msg(file_path))?;
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };

        let geometry: Geometry<f64> = geometry
            .try_into()
            .with_context(|| format!("Invalid geometry for spatial unit {unit}"))?;
        let polygon = match geometry {
            Geometry::Polygon(polygon) => MultiPolygon(vec![polygon]),
            Geometry::MultiPolygon(polygon) => polygon,
            _ => {
                skipped += 1;
                continue;
            }
        };
        features.push(PolygonFeature { unit, polygon });
    }

    if skipped > 0 {
        warn!(
            "Skipped {skipped} feature(s) without polygon geometry in {}",
            file_path.display()
        );
    }

    Ok(features)
}

/// Read every line and polygon outline in a GeoJSON file as a set of line strings.
///
/// Points are ignored.
pub fn read_line_layer(file_path: &Path) -> Result<Vec<LineString<f64>>> {
    let geojson = read_geojson(file_path)?;
    let collection = GeometryCollection::<f64>::try_from(&geojson)
        .with_context(|| input_err_msg(file_path))?;

    let mut lines = Vec::new();
    for geometry in collection {
        collect_lines(geometry, &mut lines);
    }

    Ok(lines)
}

fn collect_lines(geometry: Geometry<f64>, lines: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::Line(line) => lines.push(LineString::from(vec![line.start, line.end])),
        Geometry::LineString(line) => lines.push(line),
        Geometry::MultiLineString(multi) => lines.extend(multi),
        Geometry::Polygon(polygon) => {
            let (exterior, interiors) = polygon.into_inner();
            lines.push(exterior);
            lines.extend(interiors);
        }
        Geometry::MultiPolygon(multi) => {
            for polygon in multi {
                collect_lines(Geometry::Polygon(polygon), lines);
            }
        }
        Geometry::Rect(rect) => collect_lines(Geometry::Polygon(rect.to_polygon()), lines),
        Geometry::Triangle(triangle) => {
            collect_lines(Geometry::Polygon(triangle.to_polygon()), lines);
        }
        Geometry::GeometryCollection(collection) => {
            for geometry in collection {
                collect_lines(geometry, lines);
            }
        }
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
    }
}

/// Inner join of polygons with accessibility records on spatial unit ID.
///
/// Polygons without a record are dropped rather than given a default value. No common IDs at all
/// is an error, as is a ratio which is undefined for a joined unit.
pub fn join_scores(
    polygons: &[PolygonFeature],
    table: &AccessTable,
    kind: ScoreKind,
) -> Result<Vec<MapFeature>> {
    let mut features = Vec::new();
    let mut undefined = Vec::new();
    for polygon in polygons {
        let Some(record) = table.get(&polygon.unit) else {
            continue;
        };

        match kind.score(record) {
            Some(value) => features.push(MapFeature {
                unit: polygon.unit.clone(),
                polygon: polygon.polygon.clone(),
                value,
            }),
            None => undefined.push(&polygon.unit),
        }
    }

    if let Some(first) = undefined.first() {
        bail!(DataQualityError::ZeroAutoAccess {
            count: undefined.len(),
            first: first.to_string(),
        });
    }
    if features.is_empty() {
        bail!(JoinMismatchError {
            polygons: polygons.len(),
            records: table.len(),
        });
    }

    debug!(
        "Joined {} of {} polygons with accessibility records",
        features.len(),
        polygons.len()
    );

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessRecord;
    use crate::fixture::assert_error;
    use geo::polygon;
    use indexmap::indexmap;
    use tempfile::tempdir;

    fn square(unit: &str, x: f64) -> PolygonFeature {
        PolygonFeature {
            unit: unit.into(),
            polygon: MultiPolygon(vec![polygon![
                (x: x, y: 0.0),
                (x: x + 1.0, y: 0.0),
                (x: x + 1.0, y: 1.0),
                (x: x, y: 1.0),
            ]]),
        }
    }

    fn record(transit: f64, auto: f64) -> AccessRecord {
        AccessRecord { transit, auto }
    }

    #[test]
    fn test_join_scores_drops_unmatched() {
        let polygons = [square("A", 0.0), square("B", 1.0), square("C", 2.0)];
        let table = indexmap! {
            "B".into() => record(10.0, 20.0),
            "C".into() => record(30.0, 40.0),
            "D".into() => record(50.0, 60.0),
        };

        let features = join_scores(&polygons, &table, ScoreKind::Absolute).unwrap();
        let units: Vec<_> = features.iter().map(|f| f.unit.to_string()).collect();
        assert_eq!(units, ["B", "C"]);
        assert_eq!(features[0].value, 10.0);

        let features = join_scores(&polygons, &table, ScoreKind::Ratio).unwrap();
        assert_eq!(features[0].value, 0.5);
    }

    #[test]
    fn test_join_scores_no_common_ids() {
        let polygons = [square("A", 0.0)];
        let table = indexmap! {"0A".into() => record(10.0, 20.0)};
        let err = join_scores(&polygons, &table, ScoreKind::Absolute).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JoinMismatchError>(),
            Some(&JoinMismatchError {
                polygons: 1,
                records: 1
            })
        );
    }

    #[test]
    fn test_join_scores_zero_auto() {
        let polygons = [square("A", 0.0), square("B", 1.0)];
        let table = indexmap! {
            "A".into() => record(10.0, 20.0),
            "B".into() => record(0.0, 0.0),
        };
        assert!(join_scores(&polygons, &table, ScoreKind::Absolute).is_ok());
        assert_error!(
            join_scores(&polygons, &table, ScoreKind::Ratio),
            "auto access is zero for 1 spatial unit(s) (first: B), ratio undefined"
        );
    }

    const POLYGONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"BG20": "0101"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"BG20": 102},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[1, 0], [2, 0], [2, 1], [1, 1], [1, 0]]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"BG20": "0103"},
                "geometry": {"type": "Point", "coordinates": [0.5, 0.5]}
            }
        ]
    }"#;

    #[test]
    fn test_read_polygon_layer() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("layer.geojson");
        fs::write(&file_path, POLYGONS).unwrap();

        let features = read_polygon_layer(&file_path, "BG20").unwrap();
        let units: Vec<_> = features.iter().map(|f| f.unit.to_string()).collect();
        assert_eq!(units, ["0101", "102"]);

        assert!(read_polygon_layer(&file_path, "GEOID").is_err());
    }

    #[test]
    fn test_read_line_layer() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("transit.geojson");
        fs::write(&file_path, POLYGONS).unwrap();
        assert_eq!(read_line_layer(&file_path).unwrap().len(), 2);

        fs::write(
            &file_path,
            r#"{"type": "LineString", "coordinates": [[0, 0], [1, 1], [2, 1]]}"#,
        )
        .unwrap();
        let lines = read_line_layer(&file_path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0.len(), 3);
    }

    #[test]
    fn test_read_line_layer_features() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("transit.geojson");
        fs::write(
            &file_path,
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {"route": "Red"}, "geometry": null},
                    {
                        "type": "Feature",
                        "properties": {"route": "Blue"},
                        "geometry": {
                            "type": "MultiLineString",
                            "coordinates": [[[0, 0], [1, 0]], [[1, 0], [1, 1], [2, 2]]]
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        // Features without geometry are skipped
        let lines = read_line_layer(&file_path).unwrap();
        assert_eq!(lines.iter().map(|line| line.0.len()).collect::<Vec<_>>(), [2, 3]);

        fs::write(&file_path, r#"{"type": "FeatureCollection"}"#).unwrap();
        assert!(read_line_layer(&file_path).is_err());
    }
}
