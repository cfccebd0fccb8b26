use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use strum::Display;

use lasso_core::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "lasso",
    author,
    version,
    about = "Build project cards, apply scenarios and export model networks",
    long_about = "Turns edits to a base roadway or transit network into project cards, \
                  applies project cards onto base networks to build scenarios, and writes \
                  standard roadway networks out in travel-model formats."
)]
struct Args {
    /// Parameter file (YAML or JSON); defaults are used when absent
    #[arg(short, long, global = true)]
    parameters: Option<PathBuf>,

    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a project card from base and build networks
    Project {
        /// Base transit line file, or a directory of .lin files
        #[arg(long, requires = "build_transit")]
        base_transit: Option<String>,

        /// Build transit line file, or a directory of .lin files
        #[arg(long, requires = "base_transit")]
        build_transit: Option<String>,

        /// Base roadway network directory (link.json, node.geojson)
        #[arg(long)]
        base_roadway: Option<PathBuf>,

        /// Cube network edit log; may be repeated
        #[arg(long = "roadway-log", conflicts_with_all = ["roadway_csv", "roadway_geojson"])]
        roadway_logs: Vec<PathBuf>,

        /// Roadway changes as a CSV table
        #[arg(long, conflicts_with = "roadway_geojson")]
        roadway_csv: Option<PathBuf>,

        /// Roadway changes as GeoJSON features
        #[arg(long)]
        roadway_geojson: Option<PathBuf>,

        /// Project name; taken from the first log file when absent
        #[arg(long)]
        project_name: Option<String>,

        /// Only keep attributes of added links that the base network has
        #[arg(long)]
        limit_to_existing: bool,

        /// Output card file; defaults to the project name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a standard roadway network in a model format
    Export {
        /// Roadway network directory
        #[arg(short, long)]
        roadway: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::FixedWidth)]
        format: ExportFormat,

        /// Only write drive links and nodes (fixed-width only)
        #[arg(long)]
        drive_only: bool,
    },

    /// Apply project cards onto base networks
    Scenario {
        /// Base roadway network directory
        #[arg(short, long)]
        roadway: PathBuf,

        /// Base transit line file, or a directory of .lin files
        #[arg(short, long)]
        transit: Option<String>,

        /// Directory of project cards (*.yml, *.yaml)
        #[arg(short, long)]
        cards: PathBuf,

        /// Output directory for the scenario networks
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert a standard transit feed directory to a Cube line file
    Convert {
        /// Feed directory, or line file with --reverse
        #[arg(short, long)]
        input: PathBuf,

        /// Line file, or feed directory with --reverse
        #[arg(short, long)]
        output: PathBuf,

        /// Convert a line file back to a feed directory
        #[arg(long)]
        reverse: bool,
    },
}

#[derive(ValueEnum, Display, Clone, Copy, Debug)]
enum ExportFormat {
    #[strum(serialize = "fixed width")]
    FixedWidth,
    #[strum(serialize = "CSV")]
    Csv,
    #[strum(serialize = "GeoJSON")]
    Geojson,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    let params = match &args.parameters {
        Some(path) => {
            log::info!("Parameters: {}", path.display());
            Parameters::from_path(path).context("Failed to read parameters")?
        }
        None => Parameters::default(),
    };

    match args.command {
        Command::Project {
            base_transit,
            build_transit,
            base_roadway,
            roadway_logs,
            roadway_csv,
            roadway_geojson,
            project_name,
            limit_to_existing,
            output,
        } => {
            let mut builder = ProjectBuilder::new()
                .parameters(params)
                .limit_variables_to_existing_network(limit_to_existing);
            if let (Some(base), Some(build)) = (base_transit, build_transit) {
                builder = builder.base_transit_source(base).build_transit_source(build);
            }
            if let Some(dir) = base_roadway {
                builder = builder.base_roadway_dir(dir);
            }
            if !roadway_logs.is_empty() {
                builder = builder.roadway_log_files(roadway_logs);
            }
            if let Some(path) = roadway_csv {
                builder = builder.roadway_csv_file(path);
            }
            if let Some(path) = roadway_geojson {
                builder = builder.roadway_geojson_file(path);
            }
            if let Some(name) = project_name {
                builder = builder.project_name(name);
            }
            run_project(builder, output.as_deref())
        }
        Command::Export {
            roadway,
            output,
            format,
            drive_only,
        } => run_export(&roadway, &output, format, drive_only, params),
        Command::Scenario {
            roadway,
            transit,
            cards,
            output,
        } => run_scenario(&roadway, transit.as_deref(), &cards, &output, params),
        Command::Convert {
            input,
            output,
            reverse,
        } => run_convert(&input, &output, reverse, &params),
    }
}

fn run_project(builder: ProjectBuilder, output: Option<&Path>) -> Result<()> {
    log::info!("=== Project Card ===");

    log::info!("");
    log::info!("Phase 1: Loading networks and evaluating changes...");
    let project = builder.build().context("Failed to build project")?;

    log::info!("");
    log::info!("Phase 2: Writing project card...");
    let card = project.card();
    for (category, count) in card.count_by_category() {
        log::info!("  {category}: {count}");
    }
    if card.changes.is_empty() {
        log::warn!("  No changes found; the card is empty");
    }
    let path = project
        .write_project_card(output)
        .context("Failed to write project card")?;

    log::info!("");
    log::info!("=== Complete ===");
    log::info!("Card '{}' written to {}", project.project_name, path.display());
    Ok(())
}

fn run_export(roadway: &Path, output: &Path, format: ExportFormat, drive_only: bool, params: Parameters) -> Result<()> {
    log::info!("=== Model Network Export ===");
    log::info!("Input: {}", roadway.display());
    log::info!("Output: {}", output.display());

    if !roadway.is_dir() {
        bail!("Roadway directory does not exist: {}", roadway.display());
    }
    if drive_only && !matches!(format, ExportFormat::FixedWidth) {
        log::warn!("--drive-only only applies to fixed-width output");
    }

    log::info!("");
    log::info!("Phase 1: Reading roadway network...");
    let mut model = ModelRoadwayNetwork::read_dir(roadway, params).context("Failed to read roadway network")?;

    log::info!("");
    log::info!("Phase 2: Converting to model network...");
    model
        .roadway_standard_to_model()
        .context("Failed to convert to model network")?;

    log::info!("");
    log::info!("Phase 3: Writing {format}...");
    match format {
        ExportFormat::FixedWidth => model.write_roadway_as_fixedwidth(output, drive_only),
        ExportFormat::Csv => model.write_roadway_as_csv(output),
        ExportFormat::Geojson => model.write_roadway_as_geojson(output),
    }
    .context("Failed to write model network")?;

    log::info!("");
    log::info!("=== Complete ===");
    Ok(())
}

fn run_scenario(roadway: &Path, transit: Option<&str>, cards: &Path, output: &Path, params: Parameters) -> Result<()> {
    log::info!("=== Scenario ===");

    log::info!("");
    log::info!("Phase 1: Reading base networks...");
    let base_roadway = RoadwayNetwork::read_dir(roadway).context("Failed to read base roadway network")?;
    let base_transit = transit
        .map(CubeTransit::from_source)
        .transpose()
        .context("Failed to read base transit network")?;
    if let Some(transit) = &base_transit {
        for diagnostic in transit.diagnostics() {
            log::warn!("  {diagnostic}");
        }
    }

    let mut scenario = Scenario::new(
        BaseNetworks {
            roadway: base_roadway,
            transit: base_transit,
        },
        params,
    );

    log::info!("");
    log::info!("Phase 2: Applying project cards...");
    scenario
        .add_project_cards_from_dir(cards)
        .context("Failed to read project cards")?;
    scenario.apply_all_projects().context("Failed to apply project cards")?;

    log::info!("");
    log::info!("Phase 3: Writing scenario networks...");
    scenario
        .roadway
        .write(output, "")
        .context("Failed to write scenario roadway network")?;
    if let Some(transit) = &scenario.transit {
        transit
            .write_as_cube_lin(&output.join("transit.lin"))
            .context("Failed to write scenario transit network")?;
    }

    log::info!("");
    log::info!("=== Complete ===");
    print!("{}", scenario.summary());
    Ok(())
}

fn run_convert(input: &Path, output: &Path, reverse: bool, params: &Parameters) -> Result<()> {
    log::info!("=== Transit Conversion ===");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", output.display());

    if !input.exists() {
        bail!("Input does not exist: {}", input.display());
    }

    if reverse {
        let mut transit = CubeTransit::new();
        transit.add_file(input).context("Failed to read line file")?;
        let feed = StandardTransit::from_cube_transit(&transit, &params.transit)
            .context("Failed to convert lines to a feed")?;
        feed.write(output).context("Failed to write feed")?;
    } else {
        let feed = StandardTransit::read(input).context("Failed to read feed")?;
        feed.write_as_cube_lin(output, &params.transit)
            .context("Failed to write line file")?;
    }

    log::info!("");
    log::info!("=== Complete ===");
    Ok(())
}
