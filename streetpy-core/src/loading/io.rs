//! Street tables from and to GeoJSON or CSV files with WKT geometries

use std::fs;
use std::path::Path;

use geo::LineString;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value as GeoJsonValue};
use log::info;
use serde_json::{Value, json};
use wkt::{ToWkt, TryFromWkt};

use crate::config::constants::{EDGE, GEOMETRY, OSMID, RAILWAY, SOURCE, SPEED, TARGET, URBAN};
use crate::model::streets::components::parse_node_id;
use crate::model::streets::street_columns;
use crate::{Error, Mode, StreetEdge, StreetTable};

enum Format {
    GeoJson,
    Csv,
}

fn format(path: &Path) -> Result<Format, Error> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("geojson" | "json") => Ok(Format::GeoJson),
        Some("csv") => Ok(Format::Csv),
        _ => Err(Error::InvalidData(format!(
            "unsupported street file {}, expected .geojson, .json or .csv",
            path.display()
        ))),
    }
}

/// Build an edge from `(column, value)` pairs, `None` values are missing
struct EdgeReader<'a> {
    source: &'a str,
    target: &'a str,
    modes: Vec<Mode>,
}

impl EdgeReader<'_> {
    fn edge<'v>(
        &mut self,
        geometry: LineString<f64>,
        values: impl Iterator<Item = (&'v str, Option<String>)>,
    ) -> Result<StreetEdge, Error> {
        let mut edge = StreetEdge::new(0, 0, geometry);
        let (mut source, mut target) = (None, None);

        for (column, value) in values {
            match column {
                c if c == self.source => source = value,
                c if c == self.target => target = value,
                EDGE | GEOMETRY => {}
                SOURCE | TARGET => {
                    if let Some(value) = value {
                        edge.attributes.insert(column.to_string(), value);
                    }
                }
                _ => {
                    if let Some((mode, _)) = Mode::from_column(column)
                        && !self.modes.contains(&mode)
                    {
                        self.modes.push(mode);
                    }
                    edge.set(column, value.as_deref())?;
                }
            }
        }

        let node = |column: &str, value: Option<String>| -> Result<i64, Error> {
            let value = value.ok_or_else(|| Error::MissingColumn(column.to_string()))?;
            parse_node_id(&value)
                .ok_or_else(|| Error::InvalidData(format!("{column} must be an integer, got {value}")))
        };
        edge.source = node(self.source, source)?;
        edge.target = node(self.target, target)?;
        Ok(edge)
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn read_geojson(path: &Path, reader: &mut EdgeReader<'_>) -> Result<Vec<StreetEdge>, Error> {
    let text = fs::read_to_string(path)?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| Error::GeoJsonError(e.to_string()))?;
    let collection =
        FeatureCollection::try_from(geojson).map_err(|e| Error::GeoJsonError(e.to_string()))?;

    collection
        .features
        .into_iter()
        .map(|feature| {
            let geometry = feature
                .geometry
                .ok_or_else(|| Error::GeoJsonError("feature without geometry".to_string()))?;
            let line = match geo::Geometry::<f64>::try_from(geometry)
                .map_err(|e| Error::GeoJsonError(e.to_string()))?
            {
                geo::Geometry::LineString(line) => line,
                geo::Geometry::MultiLineString(lines) if lines.0.len() == 1 => {
                    lines.0.into_iter().next().unwrap_or_else(|| LineString::new(Vec::new()))
                }
                _ => {
                    return Err(Error::GeoJsonError(
                        "street geometries must be linestrings".to_string(),
                    ));
                }
            };
            let properties = feature.properties.unwrap_or_default();
            reader.edge(
                line,
                properties
                    .iter()
                    .map(|(key, value)| (key.as_str(), json_text(value))),
            )
        })
        .collect()
}

fn read_csv(path: &Path, reader: &mut EdgeReader<'_>) -> Result<Vec<StreetEdge>, Error> {
    let mut csv_reader = csv::Reader::from_path(path)?;
    let headers = csv_reader.headers()?.clone();
    let geometry_index = headers
        .iter()
        .position(|h| h == GEOMETRY)
        .ok_or_else(|| Error::MissingColumn(GEOMETRY.to_string()))?;
    for column in [reader.source, reader.target] {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::MissingColumn(column.to_string()));
        }
    }

    let mut edges = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let wkt = record.get(geometry_index).unwrap_or_default();
        let line = LineString::<f64>::try_from_wkt_str(wkt)
            .map_err(|e| Error::WktError(format!("{e} in {wkt}")))?;
        let values = headers.iter().zip(record.iter()).map(|(column, value)| {
            (column, Some(value.to_string()).filter(|v| !v.is_empty()))
        });
        edges.push(reader.edge(line, values)?);
    }
    Ok(edges)
}

/// Read a street table from a GeoJSON (`.geojson`, `.json`) or CSV file
///
/// CSV files hold WKT linestrings in a `geometry` column. Node ids are read
/// from the `source` and `target` columns, float looking ids are truncated.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a node column is missing or
/// a value is invalid
pub fn read_streets<P: AsRef<Path>>(
    path: P,
    source: &str,
    target: &str,
    directed: bool,
) -> Result<StreetTable, Error> {
    let path = path.as_ref();
    let mut reader = EdgeReader {
        source,
        target,
        modes: Vec::new(),
    };
    let edges = match format(path)? {
        Format::GeoJson => read_geojson(path, &mut reader)?,
        Format::Csv => read_csv(path, &mut reader)?,
    };
    info!("Read {} edges from {}", edges.len(), path.display());
    Ok(StreetTable::new(edges, reader.modes, directed))
}

/// Columns written for a table, geometry excluded
fn output_columns(table: &StreetTable) -> Vec<String> {
    let mut columns: Vec<String> = vec![SOURCE.to_string(), TARGET.to_string()];
    if table.edges.iter().any(|e| e.osmid.is_some()) {
        columns.push(OSMID.to_string());
    }
    columns.extend(
        street_columns(table)
            .into_iter()
            .filter(|c| *c != GEOMETRY && *c != EDGE)
            .map(str::to_string),
    );
    if table.edges.iter().any(|e| e.railway.is_some()) {
        columns.push(RAILWAY.to_string());
    }
    columns.extend(table.attribute_columns());
    columns
}

fn json_value(edge: &StreetEdge, column: &str) -> Value {
    match column {
        SOURCE => json!(edge.source),
        TARGET => json!(edge.target),
        OSMID => json!(edge.osmid),
        SPEED => json!(edge.maxspeed),
        URBAN => json!(edge.urban),
        _ => json!(edge.get(column)),
    }
}

/// Save a street table as GeoJSON or CSV, see [`read_streets`]
///
/// Node ids are written in the `source` and `target` columns, missing
/// values as JSON null or empty CSV fields.
///
/// # Errors
///
/// Returns an error if the file cannot be written
pub fn save_streets<P: AsRef<Path>>(
    table: &StreetTable,
    path: P,
    source: &str,
    target: &str,
) -> Result<(), Error> {
    let path = path.as_ref();
    let columns = output_columns(table);
    let rename = |column: &str| -> String {
        match column {
            SOURCE => source.to_string(),
            TARGET => target.to_string(),
            other => other.to_string(),
        }
    };

    match format(path)? {
        Format::GeoJson => {
            let features = table
                .edges
                .iter()
                .map(|edge| {
                    let properties: serde_json::Map<String, Value> = columns
                        .iter()
                        .map(|column| (rename(column), json_value(edge, column)))
                        .collect();
                    Feature::from_json_value(json!({
                        "type": "Feature",
                        "geometry": Geometry::new(GeoJsonValue::from(&edge.geometry)),
                        "properties": properties,
                    }))
                    .map_err(|e| Error::GeoJsonError(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let collection = FeatureCollection {
                features,
                bbox: None,
                foreign_members: None,
            };
            fs::write(path, serde_json::to_string(&collection)?)?;
        }
        Format::Csv => {
            let mut writer = csv::Writer::from_path(path)?;
            let mut header: Vec<String> = columns.iter().map(|c| rename(c)).collect();
            header.push(GEOMETRY.to_string());
            writer.write_record(&header)?;
            for edge in &table.edges {
                let mut row: Vec<String> = columns
                    .iter()
                    .map(|column| match column.as_str() {
                        SOURCE => edge.source.to_string(),
                        TARGET => edge.target.to_string(),
                        other => edge.get(other).unwrap_or_default(),
                    })
                    .collect();
                row.push(edge.geometry.to_wkt().to_string());
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
    }
    info!("Saved {} edges to {}", table.len(), path.display());
    Ok(())
}
