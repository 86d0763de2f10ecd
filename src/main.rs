use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;

use commands::{
    ConflateArgs, ExtractArgs, FilterZonesArgs, IsochroneArgs, MatchArgs, OsmArgs, RouteArgs,
    SimplifyArgs, ZonesArgs,
};
use config::Config;
use error::CliError;

#[derive(Parser)]
#[command(name = "streetpy", version)]
#[command(about = "Multimodal street networks from OpenStreetMap", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract multimodal streets from an OSM PBF file
    Osm(OsmArgs),
    /// Extract zones excluding private or permissive streets
    Zones(ZonesArgs),
    /// Merge street edges between crossings
    Simplify(SimplifyArgs),
    /// Remove streets inside excluding zones
    FilterZones(FilterZonesArgs),
    /// Write the directed streets of a single mode
    Extract(ExtractArgs),
    /// Shortest paths between nodes
    Route(RouteArgs),
    /// Areas reachable within a budget
    Isochrone(IsochroneArgs),
    /// Copy attributes of a secondary street source
    Conflate(ConflateArgs),
    /// Match GPS trajectories on streets
    Match(MatchArgs),
}

fn init_logger(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(rust_log) if !verbose => EnvFilter::try_new(&rust_log).unwrap_or_else(|err| {
            eprintln!(
                "invalid {}, falling back to level '{default_level}' - {err}",
                EnvFilter::DEFAULT_ENV
            );
            EnvFilter::new(default_level.to_string())
        }),
        _ => EnvFilter::new(default_level.to_string()),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Osm(args) => commands::osm(args, &config),
        Command::Zones(args) => commands::zones(args, &config),
        Command::Simplify(args) => commands::simplify_streets(args),
        Command::FilterZones(args) => commands::filter_zones_streets(args, &config),
        Command::Extract(args) => commands::extract(args, &config),
        Command::Route(args) => commands::route(args, &config),
        Command::Isochrone(args) => commands::isochrone(args, &config),
        Command::Conflate(args) => commands::conflate_streets(args, &config),
        Command::Match(args) => commands::match_gps(args, &config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "streetpy", "route", "streets.geojson", "--from", "1", "--to", "2.3,48.8", "-v",
            "--mode", "drive",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Route(args) = cli.command else {
            panic!("expected a route command");
        };
        assert_eq!(args.graph.mode, streetpy_core::Mode::Drive);
        assert_eq!(args.graph.columns.source, "source");
    }
}
