use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No nearby points found for snapping")]
    NoPointsFound,
    #[error("Unknown node: {0}")]
    UnknownNode(i64),
    #[error("{0} must be a column")]
    MissingColumn(String),
    #[error("{0} is not a valid mode")]
    InvalidMode(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Isochrone error: {0}")]
    IsochroneError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("WKT error: {0}")]
    WktError(String),
    #[error("OSM error: {0}")]
    OsmError(#[from] osmpbf::Error),
    #[error("H3 error: {0}")]
    H3Error(#[from] h3o::error::InvalidGeometry),
    #[error("H3 coordinate error: {0}")]
    H3LatLngError(#[from] h3o::error::InvalidLatLng),
}
