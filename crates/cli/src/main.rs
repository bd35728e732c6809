//! CoverGis CLI - land-cover change analysis

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use covergis_algorithms::backend::{LocalBackend, RasterBackend};
use covergis_algorithms::config::AnalysisConfig;
use covergis_algorithms::export::OutputDir;
use covergis_algorithms::landcover::{
    band_name, ingest_band_name, AnnualStack, TransitionCode, TransitionType,
};
use covergis_algorithms::pipeline::ChangeAnalysis;
use covergis_core::io::{
    read_band_stack, read_feature_collection, write_csv_table, write_geotiff, GeoTiffOptions,
};
use covergis_core::raster::Raster;
use covergis_core::vector::Aoi;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "covergis")]
#[command(author, version, about = "Forest / agropastoral land-cover change analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every analysis subcommand
#[derive(Args)]
struct Inputs {
    /// Annual classification stack (multi-page GeoTIFF, one page per year)
    #[arg(short, long)]
    stack: PathBuf,
    /// Region polygons (GeoJSON FeatureCollection)
    #[arg(short, long)]
    aoi: PathBuf,
    /// Analysis configuration (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Year of the first page of the stack [default: first analysis year]
    #[arg(long)]
    first_year: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a classification stack
    Info {
        /// Input GeoTIFF
        input: PathBuf,
        /// Year of the first page
        #[arg(long, default_value_t = 1985)]
        first_year: u16,
    },
    /// Per-year area of each functional group inside the AOI
    Area {
        #[command(flatten)]
        inputs: Inputs,
        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Coded forest / agropastoral transition raster and its area table
    Transitions {
        #[command(flatten)]
        inputs: Inputs,
        /// Output CSV with one row per period and transition type
        #[arg(short, long)]
        table: PathBuf,
        /// Output GeoTIFF of transition codes
        #[arg(short, long)]
        raster: Option<PathBuf>,
    },
    /// Full analysis: area table, transition table and raster, AOI
    Run {
        #[command(flatten)]
        inputs: Inputs,
        /// Output directory
        #[arg(short, long)]
        out_dir: PathBuf,
        /// Also write the classification stack clipped to the AOI
        #[arg(long)]
        clipped_stack: bool,
    },
    /// Write the classification stack clipped to the AOI
    Clip {
        #[command(flatten)]
        inputs: Inputs,
        /// Output directory
        #[arg(short, long)]
        out_dir: PathBuf,
    },
    /// Pack a period and transition type into a code
    Encode {
        start_year: u16,
        end_year: u16,
        /// 1 / forest_to_agropastoral / loss, or 2 / agropastoral_to_forest / gain
        #[arg(value_parser = parse_transition_type)]
        kind: TransitionType,
    },
    /// Unpack a transition code
    Decode {
        #[arg(allow_negative_numbers = true)]
        code: i32,
    },
    /// Print the default configuration as TOML
    DefaultConfig {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn parse_transition_type(s: &str) -> std::result::Result<TransitionType, String> {
    match s.to_lowercase().as_str() {
        "1" | "loss" | "forest_to_agropastoral" => Ok(TransitionType::ForestToAgropastoral),
        "2" | "gain" | "agropastoral_to_forest" => Ok(TransitionType::AgropastoralToForest),
        other => Err(format!("unknown transition type '{}'", other)),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn read_stack(path: &Path, first_year: u16) -> Result<AnnualStack> {
    let pb = spinner("Reading classification stack...");
    let bands = read_band_stack(path)
        .with_context(|| format!("Failed to read stack {}", path.display()))?;
    pb.finish_and_clear();
    let stack = AnnualStack::new(first_year, bands).context("Invalid classification stack")?;
    info!(
        "Stack: {} x {}, years {}-{}",
        stack.grid().cols(),
        stack.grid().rows(),
        stack.first_year(),
        stack.last_year()
    );
    Ok(stack)
}

fn read_aoi(path: &Path, config: &AnalysisConfig) -> Result<Aoi> {
    let regions = read_feature_collection(path)
        .with_context(|| format!("Failed to read regions {}", path.display()))?;
    let aoi = regions
        .select_one(&config.aoi.field, &config.aoi.name)
        .context("Failed to select AOI")?;
    info!("AOI: {} = '{}'", config.aoi.field, aoi.name);
    Ok(aoi)
}

/// Configuration, AOI and a ready backend
struct Session {
    config: AnalysisConfig,
    aoi: Aoi,
    backend: LocalBackend,
}

fn open_session(inputs: &Inputs) -> Result<Session> {
    let config = load_config(inputs.config.as_deref())?;
    let first_year = inputs.first_year.unwrap_or(config.years.first);
    let stack = read_stack(&inputs.stack, first_year)?;
    let aoi = read_aoi(&inputs.aoi, &config)?;

    let pb = spinner("Rasterising AOI...");
    let backend = LocalBackend::from_inputs(stack, &aoi, &config)
        .context("Failed to prepare analysis inputs")?;
    pb.finish_and_clear();
    info!("AOI covers {} pixels", backend.aoi_mask().pixel_count());

    Ok(Session {
        config,
        aoi,
        backend,
    })
}

fn clipped_bands(backend: &LocalBackend) -> Result<Vec<Raster<i32>>> {
    backend
        .stack()
        .years()
        .map(|year| {
            backend
                .select_band(year)
                .map(|band| band.raster)
                .with_context(|| format!("Failed to clip year {}", year))
        })
        .collect()
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input, first_year } => {
            let bands = read_band_stack(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let stack = AnnualStack::new(first_year, bands).context("Invalid classification stack")?;
            let first = stack.band(first_year)?;
            let (rows, cols) = first.shape();
            let bounds = first.bounds();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, first.len());
            println!(
                "Bands: {} ({} .. {}, selected as {} .. {})",
                stack.len(),
                ingest_band_name(stack.first_year()),
                ingest_band_name(stack.last_year()),
                band_name(stack.first_year()),
                band_name(stack.last_year()),
            );
            println!("Cell size: {}", first.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = first.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = first.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nClasses (band 1):");
            for (class, count) in first.class_counts() {
                println!(
                    "  {:>4}: {} ({:.1}%)",
                    class,
                    count,
                    100.0 * count as f64 / first.len() as f64
                );
            }
        }

        // ── Area by group ────────────────────────────────────────────
        Commands::Area { inputs, output } => {
            let session = open_session(&inputs)?;
            let analysis = ChangeAnalysis::new(&session.backend, &session.config)?;

            let start = Instant::now();
            let pb = spinner("Aggregating area by group...");
            let records = analysis.area_by_group().context("Area aggregation failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_csv_table(&records, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            done("Area table", &output, elapsed);
        }

        // ── Transitions ──────────────────────────────────────────────
        Commands::Transitions {
            inputs,
            table,
            raster,
        } => {
            let session = open_session(&inputs)?;
            let analysis = ChangeAnalysis::new(&session.backend, &session.config)?;

            let start = Instant::now();
            let pb = spinner("Building transition raster...");
            let coded = analysis
                .transition_raster()
                .context("Transition analysis failed")?;
            let records = analysis
                .transition_table(&coded)
                .context("Transition area aggregation failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_csv_table(&records, &table)
                .with_context(|| format!("Failed to write {}", table.display()))?;
            if let Some(path) = raster {
                let options = GeoTiffOptions {
                    overview_levels: session.config.overview_levels,
                };
                write_geotiff(&coded, &path, &options)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Transition raster saved to: {}", path.display());
            }
            for r in &records {
                println!(
                    "  {} {:<24} {:>12.2} ha",
                    r.period,
                    r.transition_type.label(),
                    r.area_ha
                );
            }
            done("Transition table", &table, elapsed);
        }

        // ── Full run ─────────────────────────────────────────────────
        Commands::Run {
            inputs,
            out_dir,
            clipped_stack,
        } => {
            let session = open_session(&inputs)?;
            let analysis = ChangeAnalysis::new(&session.backend, &session.config)?;

            let start = Instant::now();
            let pb = spinner("Running change analysis...");
            let products = analysis.run().context("Change analysis failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let out = OutputDir::create(&out_dir, &session.config)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            let mut written = out
                .write_all(&products, &session.aoi)
                .context("Failed to write products")?;
            if clipped_stack {
                let bands = clipped_bands(&session.backend)?;
                written.push(out.write_clipped_stack(&bands).context("Failed to write clipped stack")?);
            }

            for path in &written {
                println!("  {}", path.display());
            }
            done("Products", &out_dir, elapsed);
        }

        // ── Clip ─────────────────────────────────────────────────────
        Commands::Clip { inputs, out_dir } => {
            let session = open_session(&inputs)?;
            let start = Instant::now();
            let bands = clipped_bands(&session.backend)?;
            let out = OutputDir::create(&out_dir, &session.config)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            let path = out
                .write_clipped_stack(&bands)
                .context("Failed to write clipped stack")?;
            done("Clipped stack", &path, start.elapsed());
        }

        // ── Codes ────────────────────────────────────────────────────
        Commands::Encode {
            start_year,
            end_year,
            kind,
        } => {
            let code = TransitionCode::encode(start_year, end_year, kind)?;
            println!("{}", code);
        }

        Commands::Decode { code } => {
            let (start, end, kind) = TransitionCode::decode(code)?;
            println!("{}-{} {}", start, end, kind);
        }

        Commands::DefaultConfig { output } => {
            let text = AnalysisConfig::default().to_toml_string()?;
            match output {
                Some(path) => {
                    if path.exists() {
                        bail!("{} already exists", path.display());
                    }
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Configuration saved to: {}", path.display());
                }
                None => print!("{}", text),
            }
        }
    }

    Ok(())
}
