#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the stop-and-search toolchain.
//!
//! Query subcommands print the JSON response of the matching query to
//! stdout. `build-index` and `normalize` are the offline jobs that refresh
//! the precomputed indexes and the normalized corpus.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stop_search_aggregate_models::{CategoryDimension, StatsKind};
use stop_search_store::paths::DataPaths;

#[derive(Parser)]
#[command(name = "stop_search", about = "Stop-and-search aggregation toolchain")]
struct Cli {
    /// Data root (defaults to `$STOP_SEARCH_ROOT`, then the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Serve queries from the normalized corpus instead of the monthly shards
    #[arg(long, global = true)]
    normalized: bool,

    /// Always scan records, even when a precomputed index could answer
    #[arg(long, global = true)]
    no_index: bool,

    /// Borough boundary `GeoJSON` (defaults to `boundaries/london_boroughs.geojson`)
    #[arg(long, global = true)]
    boundaries: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Date bounds and categorical filters shared by the query subcommands.
#[derive(Args)]
struct QueryArgs {
    /// Range start (ISO 8601 date or date-time)
    #[arg(long)]
    start: Option<String>,

    /// Range end (ISO 8601 date or date-time; a bare date covers the whole day)
    #[arg(long)]
    end: Option<String>,

    /// Allowed values for a field, as `field=a,b` (repeatable)
    #[arg(long = "filter", value_name = "FIELD=VALUES")]
    filters: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Time-series counts bucketed by total/day/month/year
    Aggregate(QueryArgs),
    /// Plain record count with an optional loose single-field match
    Total {
        #[command(flatten)]
        query: QueryArgs,

        /// Field for the single-field match
        #[arg(long)]
        field: Option<String>,

        /// Value for the single-field match
        #[arg(long)]
        value: Option<String>,
    },
    /// Counts per officer-defined ethnicity
    EthnicityTotals(QueryArgs),
    /// Counts per borough
    BoroughTotals(QueryArgs),
    /// Counts per age range
    AgeRanges(QueryArgs),
    /// Whole-corpus record counts
    Stats {
        /// `total`, `by-month` or `all`
        #[arg(long, default_value = "all")]
        kind: StatsKind,
    },
    /// List shards and count records
    Inventory,
    /// Rebuild the precomputed daily indexes
    BuildIndex,
    /// Write the normalized corpus
    Normalize {
        /// Output file (defaults to `public/data-normalized.json`)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = stop_search_cli_utils::init_logger();
    let cli = Cli::parse();

    let paths = DataPaths::resolve(cli.root);
    log::debug!("Data root: {}", paths.root().display());

    let boundaries = cli
        .boundaries
        .unwrap_or_else(|| paths.boundaries_path());
    let (normalized, use_index) = (cli.normalized, !cli.no_index);
    let service = || commands::service(&paths, normalized, use_index, &boundaries);

    match cli.command {
        Commands::Aggregate(args) => commands::print(&service()?.aggregated(&args.aggregated()?)?),
        Commands::Total {
            query,
            field,
            value,
        } => commands::print(&service()?.total(&query.total(field, value)?)?),
        Commands::EthnicityTotals(args) => commands::print(
            &service()?.category_totals(CategoryDimension::Ethnicity, &args.category()?)?,
        ),
        Commands::BoroughTotals(args) => commands::print(
            &service()?.category_totals(CategoryDimension::Borough, &args.category()?)?,
        ),
        Commands::AgeRanges(args) => commands::print(&service()?.age_ranges(&args.category()?)?),
        Commands::Stats { kind } => commands::print(&service()?.stats(kind)?),
        Commands::Inventory => commands::print(&service()?.inventory()?),
        Commands::BuildIndex => commands::build_index(&paths, &boundaries, &multi),
        Commands::Normalize { output } => commands::normalize(&paths, output),
    }
}
