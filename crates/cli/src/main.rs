//! calura CLI - Surface Urban Heat Island analysis from Landsat scenes

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use calura_core::io::read_geotiff;
use calura_core::Raster;
use calura_pipeline::quality::{filter_scene, SceneOutcome};
use calura_pipeline::run::{self, RunParams, Season};
use calura_pipeline::scene::{DateRange, SceneCatalog};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "calura")]
#[command(author, version, about = "Surface Urban Heat Island analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// List the scenes in a directory and their quality-filter outcome
    Scenes {
        /// Directory holding scene band files
        dir: PathBuf,
        /// Start of the date range (yyyy-mm-dd)
        #[arg(long)]
        start: String,
        /// End of the date range (yyyy-mm-dd)
        #[arg(long)]
        end: String,
    },
    /// Run the full SUHI pipeline for one season
    Run {
        /// Directory holding scene band files
        #[arg(long)]
        scenes: PathBuf,
        /// Land-cover GeoJSON with classification attributes
        #[arg(long)]
        landcover: PathBuf,
        /// Digital elevation model raster
        #[arg(long)]
        dem: PathBuf,
        /// Study-area boundary GeoJSON
        #[arg(long)]
        boundary: PathBuf,
        /// Season: winter, spring, summer, autumn
        #[arg(long)]
        season: Season,
        /// Year of the season
        #[arg(long)]
        year: i32,
        /// Output directory
        #[arg(short, long, default_value = "output")]
        out: PathBuf,
        /// Attribute key carrying the land-use tag
        #[arg(long, default_value = "landuse")]
        category_key: String,
        /// Urban categories, comma separated
        #[arg(long, default_value = "residential,industrial,commercial,retail")]
        urban: String,
        /// Rural-reference categories, comma separated
        #[arg(long, default_value = "farmland,meadow,grass,orchard,vineyard")]
        rural: String,
        /// Buffer between urban and rural cells, map units
        #[arg(long, default_value_t = run::default_buffer_distance())]
        buffer: f64,
        /// Override the season's start date (yyyy-mm-dd)
        #[arg(long)]
        start: Option<String>,
        /// Override the season's end date (yyyy-mm-dd)
        #[arg(long)]
        end: Option<String>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date (expected yyyy-mm-dd): {}", s))
}

fn parse_categories(s: &str) -> Vec<String> {
    s.split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let raster: Raster<f64> = read_geotiff(&input).context("Failed to read raster")?;
            pb.finish_and_clear();

            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * raster.valid_fraction()
            );
        }

        // ── Scenes ───────────────────────────────────────────────────
        Commands::Scenes { dir, start, end } => {
            let range = DateRange::new(parse_date(&start)?, parse_date(&end)?);

            let catalog =
                SceneCatalog::scan_dir(&dir).context("Failed to scan scene directory")?;
            println!("{} scene(s) found in {}\n", catalog.len(), dir.display());

            let mut accepted = 0usize;
            for source in &catalog.scenes {
                if !range.contains(source.acquired) {
                    println!(
                        "SKIP  {} ({}, {}): outside {}",
                        source.scene_id, source.family, source.acquired, range
                    );
                    continue;
                }

                let pb = spinner(&format!("Filtering {}...", source.scene_id));
                let scene = source.load().context("Failed to load scene")?;
                let outcome = filter_scene(&scene, &range).context("Quality filter failed")?;
                pb.finish_and_clear();

                match outcome {
                    SceneOutcome::Accepted(lst) => {
                        accepted += 1;
                        let stats = lst.statistics();
                        println!(
                            "OK    {} ({}, {}): {:.1}% valid, mean {:.2} degC",
                            source.scene_id,
                            source.family,
                            source.acquired,
                            100.0 * lst.valid_fraction(),
                            stats.mean.unwrap_or(f64::NAN)
                        );
                    }
                    SceneOutcome::Skipped(reason) => {
                        println!(
                            "SKIP  {} ({}, {}): {}",
                            source.scene_id, source.family, source.acquired, reason
                        );
                    }
                }
            }

            println!("\n{} of {} scene(s) usable", accepted, catalog.len());
        }

        // ── Run ──────────────────────────────────────────────────────
        Commands::Run {
            scenes,
            landcover,
            dem,
            boundary,
            season,
            year,
            out,
            category_key,
            urban,
            rural,
            buffer,
            start,
            end,
        } => {
            run::check_input_exists(&scenes, "scene directory")?;
            run::check_input_exists(&landcover, "land-cover file")?;
            run::check_input_exists(&dem, "elevation model")?;
            run::check_input_exists(&boundary, "boundary file")?;

            let date_range = match (start, end) {
                (Some(s), Some(e)) => Some(DateRange::new(parse_date(&s)?, parse_date(&e)?)),
                (None, None) => None,
                _ => anyhow::bail!("--start and --end must be given together"),
            };

            let params = RunParams {
                scene_dir: scenes,
                landcover_path: landcover,
                category_key,
                urban_categories: parse_categories(&urban),
                rural_categories: parse_categories(&rural),
                dem_path: dem,
                boundary_path: boundary,
                season,
                year,
                date_range,
                output_dir: out,
                buffer_distance: buffer,
            };

            let started = Instant::now();
            let summary = run::execute(&params).context("Pipeline run failed")?;
            let elapsed = started.elapsed();

            println!(
                "\n{} scene(s) composited, {} skipped, {} elevation band(s)",
                summary.accepted_scenes,
                summary.skipped_scenes.len(),
                summary.band_count
            );
            for (scene_id, reason) in &summary.skipped_scenes {
                println!("  skipped {}: {}", scene_id, reason);
            }
            println!("\nOutputs:");
            for path in &summary.outputs {
                println!("  {}", path.display());
            }
            println!("\nProcessing time: {:.2?}", elapsed);
            info!("done");
        }
    }

    Ok(())
}
