//! Batch command line for route analysis.
//!
//! Run with: cargo run --release --bin lmr -- --help

use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use last_mile_analyzer::amazon;
use last_mile_analyzer::analysis::Analysis;
use last_mile_analyzer::config::AnalyzerConfig;
use last_mile_analyzer::console::{self, StageTimer};
use last_mile_analyzer::distance::DistanceMode;
use last_mile_analyzer::distance_matrix::DistanceMatrix;
use last_mile_analyzer::domain::{Location, SequenceKind};
use last_mile_analyzer::error::AnalyzerError;
use last_mile_analyzer::geocode::reverse_geocode;
use last_mile_analyzer::geometry::BoundingBox;
use last_mile_analyzer::metrics::DrivingSource;
use last_mile_analyzer::orientation::street_orientation;
use last_mile_analyzer::routing::Extent;

/// last-mile route analysis tools
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

/// Amazon Last Mile Routing dataset files.
#[derive(Args)]
struct DatasetFiles {
    /// route_data.json
    route_data: PathBuf,
    /// package_data.json
    package_data: PathBuf,
    /// actual_sequences.json
    #[arg(long)]
    actual_sequences: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// evaluates every route of a dataset and writes one summary row per route
    Summarize {
        #[command(flatten)]
        files: DatasetFiles,
        /// summary CSV to write
        #[arg(short, long)]
        output: PathBuf,
        /// read driving distances from a filled distance matrix instead of a service
        #[arg(long)]
        matrix: Option<PathBuf>,
        /// overrides the configured distance mode
        #[arg(long)]
        mode: Option<DistanceMode>,
        #[arg(long, default_value = "actual")]
        sequence: SequenceKind,
    },
    /// writes a distance matrix with every leg marked '-'
    InitMatrix {
        #[command(flatten)]
        files: DatasetFiles,
        /// distance matrix CSV to write
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "actual")]
        sequence: SequenceKind,
    },
    /// fills the '-' legs of a distance matrix in place. Progress is saved
    /// even when a request fails, so the command can be re-run.
    FillMatrix {
        /// distance matrix CSV
        matrix: PathBuf,
        /// overrides the configured distance mode
        #[arg(long)]
        mode: Option<DistanceMode>,
        /// print a progress line every N legs
        #[arg(long, default_value_t = 100)]
        progress_every: usize,
    },
    /// street orientation statistics of a bounding box
    Orientation {
        /// name of the area
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        lat1: f64,
        #[arg(long, allow_negative_numbers = true)]
        lat2: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon1: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon2: f64,
        /// print JSON instead of the summary box
        #[arg(long)]
        json: bool,
    },
    /// city and state of a coordinate
    Geocode {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },
}

impl Command {
    async fn run(self, config: AnalyzerConfig) -> Result<(), AnalyzerError> {
        match self {
            Command::Summarize {
                files,
                output,
                matrix,
                mode,
                sequence,
            } => {
                let mode = mode.unwrap_or(config.distance_mode);
                summarize(&config, &files, &output, matrix.as_deref(), mode, sequence).await
            }
            Command::InitMatrix {
                files,
                output,
                sequence,
            } => {
                let routes = load_routes(&files)?;
                let matrix = DistanceMatrix::from_routes(&routes, sequence);
                matrix.write_csv(&output)?;
                info!(rows = matrix.len(), path = %output.display(), "Distance matrix written");
                console::print_matrix_statistics(matrix.statistics().as_ref(), matrix.missing());
                Ok(())
            }
            Command::FillMatrix {
                matrix,
                mode,
                progress_every,
            } => {
                let mode = mode.unwrap_or(config.distance_mode);
                fill_matrix(&config, &matrix, mode, progress_every.max(1)).await
            }
            Command::Orientation {
                name,
                lat1,
                lat2,
                lon1,
                lon2,
                json,
            } => {
                let bbox = BoundingBox::new(name, lat1, lat2, lon1, lon2);
                let provider = config.road_graph(config.http_client()?);
                let extent = Extent::new(bbox.lat_min, bbox.lon_min, bbox.lat_max, bbox.lon_max);
                let network = provider.network(&extent).await?;
                info!(
                    area = %bbox.name,
                    area_km2 = bbox.area_km2(),
                    nodes = network.node_count(),
                    edges = network.edge_count(),
                    "Street graph loaded"
                );

                match street_orientation(&network.edge_bearings()) {
                    Some(orientation) if json => {
                        println!("{}", serde_json::to_string_pretty(&orientation)?)
                    }
                    Some(orientation) => console::print_orientation(&bbox.name, &orientation),
                    None => console::print_warning("No street edges inside the bounding box"),
                }
                Ok(())
            }
            Command::Geocode { lat, lon } => {
                let client = config.http_client()?;
                let place = reverse_geocode(&client, &config.nominatim_url, Location::new(lat, lon)).await?;
                println!("{}, {}", place.city, place.state);
                Ok(())
            }
        }
    }
}

fn load_routes(files: &DatasetFiles) -> Result<Vec<last_mile_analyzer::domain::Route>, AnalyzerError> {
    amazon::load(
        &files.route_data,
        &files.package_data,
        files.actual_sequences.as_deref(),
    )
}

/// Legs of a sequence across the analysis, one per stop.
fn leg_count(analysis: &Analysis, kind: SequenceKind) -> usize {
    analysis.routes().iter().map(|r| r.number_of_stops(kind)).sum()
}

async fn summarize(
    config: &AnalyzerConfig,
    files: &DatasetFiles,
    output: &Path,
    matrix: Option<&Path>,
    mode: DistanceMode,
    sequence: SequenceKind,
) -> Result<(), AnalyzerError> {
    let start = Instant::now();
    let name = files
        .route_data
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("routes")
        .to_string();
    let mut analysis = Analysis::new(name, load_routes(files)?)?;

    let stops: usize = analysis.routes().iter().map(|r| r.stops().len()).sum();
    let packages: usize = analysis
        .routes()
        .iter()
        .flat_map(|r| r.stops())
        .map(|s| s.number_of_packages())
        .sum();
    console::print_dataset(&analysis.name, analysis.len(), stops, packages);
    let legs = leg_count(&analysis, sequence);

    let mut timer = StageTimer::start("Euclidean", sequence);
    analysis.evaluate_euclidean_distances(sequence);
    timer.record_legs(legs);
    timer.finish();

    let mut timer = StageTimer::start("Driving", sequence);
    match matrix {
        Some(path) => {
            let matrix = DistanceMatrix::read_csv(path)?;
            analysis
                .evaluate_driving_distances(sequence, DrivingSource::Matrix(&matrix))
                .await?;
        }
        None => {
            let service = config.distance_service(config.http_client()?);
            analysis
                .evaluate_driving_distances(
                    sequence,
                    DrivingSource::Service {
                        service: &service,
                        mode,
                    },
                )
                .await?;
        }
    }
    timer.record_legs(legs);
    timer.finish();

    let mut timer = StageTimer::start("Circuity", sequence);
    analysis.evaluate_circuity_factor(sequence)?;
    timer.record_legs(legs);
    timer.finish();

    analysis.export_summary_csv(output, sequence)?;
    info!(path = %output.display(), "Summary written");

    console::print_analysis_ended(
        start.elapsed(),
        &analysis.status_summary(),
        analysis.circuity_summary(sequence).as_ref(),
    );
    Ok(())
}

async fn fill_matrix(
    config: &AnalyzerConfig,
    path: &Path,
    mode: DistanceMode,
    progress_every: usize,
) -> Result<(), AnalyzerError> {
    let mut matrix = DistanceMatrix::read_csv(path)?;
    let service = config.distance_service(config.http_client()?);
    let start = Instant::now();

    let result = matrix
        .fill_missing(&service, mode, |done, total| {
            if done % progress_every == 0 || done == total {
                console::print_progress(done, total, start.elapsed(), mode);
            }
        })
        .await;

    // Whatever was filled is kept, including on failure
    matrix.write_csv(path)?;
    if result.is_err() {
        console::print_warning(&format!(
            "Stopped on an error; filled legs were saved to {}",
            path.display()
        ));
    }
    console::print_matrix_statistics(matrix.statistics().as_ref(), matrix.missing());

    let filled = result?;
    info!(filled, path = %path.display(), "Distance matrix updated");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("last_mile_analyzer=info,lmr=info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match AnalyzerConfig::load(cli.config.as_deref()) {
        Ok(config) => {
            console::print_banner();
            cli.command.run(config).await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
