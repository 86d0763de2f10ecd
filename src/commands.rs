//! Subcommands of the `streetpy` binary

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use clap::Args;
use geo::Coord;
use serde::Serialize;
use streetpy_core::algo::attributes::congested_travel_time;
use streetpy_core::config::constants::{SOURCE, TARGET};
use streetpy_core::prelude::*;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::CliError;
use crate::output::{
    isochrone_feature, matched_features, modal_features, read_trajectories, read_zones,
    write_features, zone_features,
};

/// Node id columns of street files
#[derive(Args, Debug, Clone)]
pub struct Columns {
    /// Source node column
    #[arg(long, default_value = SOURCE)]
    pub source: String,
    /// Target node column
    #[arg(long, default_value = TARGET)]
    pub target: String,
}

impl Columns {
    fn read(&self, path: &Path) -> Result<StreetTable, CliError> {
        Ok(read_streets(path, &self.source, &self.target, false)?)
    }

    fn save(&self, table: &StreetTable, path: &Path) -> Result<(), CliError> {
        Ok(save_streets(table, path, &self.source, &self.target)?)
    }
}

/// Streets of a single mode, as a graph
#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    /// Street file (GeoJSON or CSV)
    pub streets: PathBuf,
    #[arg(long, default_value_t = Mode::Walk)]
    pub mode: Mode,
    /// Only merge edges sharing this column value
    #[arg(long)]
    pub refid: Option<String>,
    #[command(flatten)]
    pub columns: Columns,
}

impl GraphArgs {
    fn graph(&self, config: &Config) -> Result<ModeGraph, CliError> {
        let table = self.columns.read(&self.streets)?;
        let modal = to_single_mode(&table, self.refid.as_deref(), self.mode, &config.speeds)?;
        Ok(ModeGraph::new(&modal))
    }
}

/// Node id, or `lon,lat` snapped to the nearest node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    Node(NodeId),
    Point(Coord<f64>),
}

impl Location {
    fn node(self, graph: &ModeGraph) -> Result<NodeId, CliError> {
        match self {
            Location::Node(id) => Ok(id),
            Location::Point(coord) => Ok(graph.nearest_node(coord)?),
        }
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((x, y)) = s.split_once(',') {
            let parse = |v: &str| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|e| format!("invalid coordinate {v}: {e}"))
            };
            return Ok(Location::Point(Coord {
                x: parse(x)?,
                y: parse(y)?,
            }));
        }
        s.trim()
            .parse::<NodeId>()
            .map(Location::Node)
            .map_err(|e| format!("expected a node id or lon,lat, got {s}: {e}"))
    }
}

fn parse_deadend(s: &str) -> Result<Deadend, String> {
    match s {
        "keep" => Ok(Deadend::Keep),
        "all" => Ok(Deadend::All),
        length => length
            .parse::<f64>()
            .map(Deadend::MaxLength)
            .map_err(|_| format!("expected keep, all or a length in meters, got {length}")),
    }
}

fn parse_time(s: &str) -> Result<(u32, u32), String> {
    let time = NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("{s}: {e}"))?;
    Ok((time.hour(), time.minute()))
}

#[derive(Args, Debug)]
pub struct OsmArgs {
    /// OSM PBF file
    pub input: PathBuf,
    /// Street file (GeoJSON or CSV)
    pub output: PathBuf,
    /// Extracted modes, comma separated
    #[arg(long, value_delimiter = ',')]
    pub modes: Option<Vec<Mode>>,
    #[arg(long)]
    pub access_level: Option<AccessLevel>,
    /// Country code of max speed defaults
    #[arg(long)]
    pub country: Option<String>,
    /// Merge edges between crossings
    #[arg(long)]
    pub simplify: bool,
    #[command(flatten)]
    pub columns: Columns,
}

pub fn osm(args: &OsmArgs, config: &Config) -> Result<(), CliError> {
    let mut options = config.osm.clone();
    if let Some(modes) = &args.modes {
        options.modes.clone_from(modes);
    }
    if let Some(level) = args.access_level {
        options.access_level = level;
    }
    if args.country.is_some() {
        options.country.clone_from(&args.country);
    }

    let mut table = streets_from_osm(&args.input, &options, &config.tags, &config.speeds)?;
    if args.simplify {
        table = simplify(&table, None, Deadend::Keep, None)?;
    }
    args.columns.save(&table, &args.output)
}

#[derive(Args, Debug)]
pub struct ZonesArgs {
    /// OSM PBF file
    pub input: PathBuf,
    /// Zone file (GeoJSON)
    pub output: PathBuf,
    #[arg(long)]
    pub access_level: Option<AccessLevel>,
    /// Minimum zone area in square meters
    #[arg(long)]
    pub min_area: Option<f64>,
}

pub fn zones(args: &ZonesArgs, config: &Config) -> Result<(), CliError> {
    let level = args.access_level.unwrap_or(config.osm.access_level);
    let zones = osm_excluding_zones(&args.input, level, &config.tags.zones, args.min_area)?;
    let zones = zones.unwrap_or_else(|| {
        warn!("No excluding zone for access level {level}");
        Vec::new()
    });
    write_features(&args.output, zone_features(&zones))
}

#[derive(Args, Debug)]
pub struct SimplifyArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Only merge edges sharing this column value
    #[arg(long)]
    pub refid: Option<String>,
    /// Dead ends to remove: keep, all or a max length in meters
    #[arg(long, value_parser = parse_deadend, default_value = "keep")]
    pub deadend: Deadend,
    /// Keep components with at least this many edges instead of the largest
    #[arg(long)]
    pub min_size: Option<usize>,
    #[command(flatten)]
    pub columns: Columns,
}

pub fn simplify_streets(args: &SimplifyArgs) -> Result<(), CliError> {
    let table = args.columns.read(&args.input)?;
    let res = simplify(&table, args.refid.as_deref(), args.deadend, args.min_size)?;
    info!("Simplified {} edges into {}", table.len(), res.len());
    args.columns.save(&res, &args.output)
}

#[derive(Args, Debug)]
pub struct FilterZonesArgs {
    pub streets: PathBuf,
    /// Zone file written by `zones`
    pub zones: PathBuf,
    pub output: PathBuf,
    /// Keep streets designated to bikes
    #[arg(long)]
    pub keep_bike: bool,
    /// Keep streets designated to transit
    #[arg(long)]
    pub keep_transit: bool,
    /// Keep railways
    #[arg(long)]
    pub keep_rail: bool,
    #[command(flatten)]
    pub columns: Columns,
}

pub fn filter_zones_streets(args: &FilterZonesArgs, config: &Config) -> Result<(), CliError> {
    let table = args.columns.read(&args.streets)?;
    let zones = read_zones(&args.zones)?;
    let res = filter_zones(
        &table,
        &zones,
        &config.tags.zones,
        args.keep_bike,
        args.keep_transit,
        args.keep_rail,
    )?;
    info!(
        "Removed {} edges inside {} zones",
        table.len() - res.len(),
        zones.len()
    );
    args.columns.save(&res, &args.output)
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub graph: GraphArgs,
    /// Modal street file (GeoJSON)
    pub output: PathBuf,
    /// Congested travel times at this time of day, HH:MM
    #[arg(long, value_parser = parse_time)]
    pub time: Option<(u32, u32)>,
}

pub fn extract(args: &ExtractArgs, config: &Config) -> Result<(), CliError> {
    let g = &args.graph;
    let table = g.columns.read(&g.streets)?;
    let mut modal = to_single_mode(&table, g.refid.as_deref(), g.mode, &config.speeds)?;
    if let Some(time) = args.time {
        let profile = &config.profile;
        let times = congested_travel_time(&modal, &profile.hierarchy_ratios, time, profile)?;
        modal = modal.with_times(&times)?;
    }
    write_features(&args.output, modal_features(&modal))
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    #[command(flatten)]
    pub graph: GraphArgs,
    /// Origins, node ids or lon,lat
    #[arg(long, required = true)]
    pub from: Vec<Location>,
    /// Destinations, one per origin
    #[arg(long, required = true)]
    pub to: Vec<Location>,
    #[arg(long, default_value_t = Weight::Time)]
    pub weight: Weight,
}

#[derive(Serialize)]
struct RouteResult {
    source: NodeId,
    target: NodeId,
    path: Option<NodePath>,
}

pub fn route(args: &RouteArgs, config: &Config) -> Result<(), CliError> {
    if args.from.len() != args.to.len() {
        return Err(CliError::Argument(format!(
            "got {} origins and {} destinations",
            args.from.len(),
            args.to.len()
        )));
    }
    let graph = args.graph.graph(config)?;
    let pairs = args
        .from
        .iter()
        .zip(&args.to)
        .map(|(a, b)| Ok((a.node(&graph)?, b.node(&graph)?)))
        .collect::<Result<Vec<_>, CliError>>()?;

    let paths = shortest_paths(&graph, &pairs, args.weight, true)?;
    let results: Vec<RouteResult> = pairs
        .iter()
        .zip(paths)
        .map(|((source, target), path)| RouteResult {
            source: *source,
            target: *target,
            path,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[derive(Args, Debug)]
pub struct IsochroneArgs {
    #[command(flatten)]
    pub graph: GraphArgs,
    /// Isochrone file (GeoJSON)
    pub output: PathBuf,
    /// Origins, node ids or lon,lat
    #[arg(long, required = true)]
    pub origin: Vec<Location>,
    /// Seconds, or meters with a length weight
    #[arg(long)]
    pub budget: f64,
    #[arg(long)]
    pub weight: Option<Weight>,
    /// One isochrone per origin
    #[arg(long)]
    pub separate: bool,
}

pub fn isochrone(args: &IsochroneArgs, config: &Config) -> Result<(), CliError> {
    let graph = args.graph.graph(config)?;
    let mut options = config.isochrone;
    if let Some(weight) = args.weight {
        options.weight = weight;
    }
    let origins = args
        .origin
        .iter()
        .map(|o| o.node(&graph))
        .collect::<Result<Vec<_>, _>>()?;

    let features = if args.separate {
        bulk_isochrones(&graph, &origins, args.budget, &options)?
            .iter()
            .zip(&origins)
            .map(|(iso, origin)| isochrone_feature(&[*origin], args.budget, iso))
            .collect()
    } else {
        let iso = calculate_isochrone(&graph, &origins, args.budget, &options)?;
        vec![isochrone_feature(&origins, args.budget, &iso)]
    };
    write_features(&args.output, features)
}

#[derive(Args, Debug)]
pub struct ConflateArgs {
    pub primary: PathBuf,
    pub secondary: PathBuf,
    pub output: PathBuf,
    /// Copied columns, comma separated
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,
    /// Replace values already set in the primary streets
    #[arg(long)]
    pub overwrite: bool,
    /// Match report (JSON)
    #[arg(long)]
    pub report: Option<PathBuf>,
    #[command(flatten)]
    pub node_columns: Columns,
}

pub fn conflate_streets(args: &ConflateArgs, config: &Config) -> Result<(), CliError> {
    let mut conf = config.conflation.clone();
    if let Some(columns) = &args.columns {
        conf.columns.clone_from(columns);
    }
    conf.overwrite |= args.overwrite;

    let primary = args.node_columns.read(&args.primary)?;
    let secondary = args.node_columns.read(&args.secondary)?;
    let (res, report) = conflate(&primary, &secondary, &conf)?;
    if let Some(path) = &args.report {
        fs::write(path, serde_json::to_string(&report)?)?;
    }
    args.node_columns.save(&res, &args.output)
}

#[derive(Args, Debug)]
pub struct MatchArgs {
    #[command(flatten)]
    pub graph: GraphArgs,
    /// GPS trajectories, linestrings or multipoints (GeoJSON)
    pub trajectories: PathBuf,
    /// Matched edges (GeoJSON)
    pub output: PathBuf,
    /// Max distance in meters between a point and its candidate edges
    #[arg(long, default_value_t = 50.0)]
    pub distance: f64,
    /// Candidate edges kept per point
    #[arg(long)]
    pub k_nearest: Option<usize>,
    #[arg(long, default_value_t = Weight::Time)]
    pub weight: Weight,
}

pub fn match_gps(args: &MatchArgs, config: &Config) -> Result<(), CliError> {
    let graph = args.graph.graph(config)?;
    let trajectories = read_trajectories(&args.trajectories)?;
    let matched =
        match_trajectories(&graph, &trajectories, args.distance, args.weight, args.k_nearest)?;
    write_features(&args.output, matched_features(&matched))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations() {
        assert_eq!("42".parse::<Location>(), Ok(Location::Node(42)));
        assert_eq!(
            "2.35, 48.85".parse::<Location>(),
            Ok(Location::Point(Coord { x: 2.35, y: 48.85 }))
        );
        assert!("north".parse::<Location>().is_err());
    }

    #[test]
    fn deadends_and_times() {
        assert_eq!(parse_deadend("all"), Ok(Deadend::All));
        assert_eq!(parse_deadend("25"), Ok(Deadend::MaxLength(25.0)));
        assert!(parse_deadend("some").is_err());
        assert_eq!(parse_time("07:45"), Ok((7, 45)));
        assert!(parse_time("25:00").is_err());
    }
}
