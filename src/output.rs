//! GeoJSON files of zones, modal streets, isochrones and trajectories

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use geo::{Geometry as GeoGeometry, LineString, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry};
use serde_json::{Map, Value as JsonValue, json};
use streetpy_core::prelude::*;
use tracing::info;

use crate::error::CliError;

const ACCESS_LEVEL: &str = "access_level";
const ID: &str = "id";

fn feature(geometry: Geometry, properties: Map<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn properties(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn write_features(path: &Path, features: Vec<Feature>) -> Result<(), CliError> {
    let count = features.len();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    fs::write(path, serde_json::to_string(&collection)?)?;
    info!("Wrote {count} features to {}", path.display());
    Ok(())
}

fn read_features(path: &Path) -> Result<Vec<Feature>, CliError> {
    let text = fs::read_to_string(path)?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| CliError::GeoJson(e.to_string()))?;
    let collection =
        FeatureCollection::try_from(geojson).map_err(|e| CliError::GeoJson(e.to_string()))?;
    Ok(collection.features)
}

fn geometry(feature: Feature) -> Result<(GeoGeometry<f64>, Map<String, JsonValue>), CliError> {
    let properties = feature.properties.unwrap_or_default();
    let geometry = feature
        .geometry
        .ok_or_else(|| CliError::GeoJson("feature without geometry".to_string()))?;
    let geometry =
        GeoGeometry::<f64>::try_from(geometry).map_err(|e| CliError::GeoJson(e.to_string()))?;
    Ok((geometry, properties))
}

fn text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn zone_features(zones: &[Zone]) -> Vec<Feature> {
    zones
        .iter()
        .map(|zone| {
            let mut props: Map<String, JsonValue> = zone
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect();
            props.insert(
                ACCESS_LEVEL.to_string(),
                JsonValue::String(zone.access_level.clone()),
            );
            feature(Geometry::new((&zone.geometry).into()), props)
        })
        .collect()
}

/// Zones written by [`zone_features`], polygons or multipolygons with an
/// `access_level` property
pub fn read_zones(path: &Path) -> Result<Vec<Zone>, CliError> {
    read_features(path)?
        .into_iter()
        .map(|f| {
            let (geometry, props) = geometry(f)?;
            let geometry = match geometry {
                GeoGeometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
                GeoGeometry::MultiPolygon(polygons) => polygons,
                _ => {
                    return Err(CliError::GeoJson(
                        "zone geometries must be polygons".to_string(),
                    ));
                }
            };
            let mut tags: BTreeMap<String, String> = props
                .iter()
                .filter_map(|(k, v)| text(v).map(|v| (k.clone(), v)))
                .collect();
            let access_level = tags.remove(ACCESS_LEVEL).ok_or_else(|| {
                CliError::GeoJson(format!("zone without {ACCESS_LEVEL} property"))
            })?;
            Ok(Zone {
                access_level,
                geometry,
                tags,
            })
        })
        .collect()
}

pub fn modal_features(streets: &ModalStreets) -> Vec<Feature> {
    streets
        .iter()
        .map(|edge| {
            let props = properties(json!({
                "source": edge.source,
                "target": edge.target,
                "refid": edge.refid,
                "hierarchy": edge.hierarchy,
                "access": edge.access,
                "length": edge.length,
                "time": edge.time,
            }));
            feature(Geometry::new((&edge.geometry).into()), props)
        })
        .collect()
}

pub fn isochrone_feature(origins: &[NodeId], budget: f64, isochrone: &Isochrone) -> Feature {
    let props = properties(json!({
        "origins": origins,
        "budget": budget,
        "nodes": isochrone.nodes.len(),
        "edges": isochrone.edges.len(),
    }));
    feature(Geometry::new((&isochrone.area).into()), props)
}

pub fn matched_features(matched: &[MatchedTrajectory]) -> Vec<Feature> {
    matched
        .iter()
        .flat_map(|trajectory| {
            trajectory.edges.iter().map(|edge| {
                let props = properties(json!({
                    "id": trajectory.id,
                    "stop": edge.stop,
                    "source": edge.source,
                    "target": edge.target,
                }));
                feature(Geometry::new((&edge.geometry).into()), props)
            })
        })
        .collect()
}

/// Trajectories from linestring features, identified by their `id`
/// property or their position in the file
pub fn read_trajectories(path: &Path) -> Result<Vec<Trajectory>, CliError> {
    read_features(path)?
        .into_iter()
        .enumerate()
        .map(|(i, f)| {
            let (geometry, props) = geometry(f)?;
            let line: LineString<f64> = match geometry {
                GeoGeometry::LineString(line) => line,
                GeoGeometry::MultiPoint(points) => points.0.into_iter().map(|p| p.0).collect(),
                _ => {
                    return Err(CliError::GeoJson(
                        "trajectories must be linestrings or multipoints".to_string(),
                    ));
                }
            };
            Ok(Trajectory {
                id: props.get(ID).and_then(text).unwrap_or_else(|| i.to_string()),
                points: line.0,
            })
        })
        .collect()
}
