//! # Butterfly-tiles CLI
//!
//! Builds routing graph tiles from a JSON dump of parsed OSM data and
//! inspects the resulting `.gph` files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;
use std::path::{Path, PathBuf};

use butterfly_tiles::{BuildConfig, DirectoryTileWriter, GraphBuilder, OsmData, TileFile, TileLevel};

mod cli;

/// Command-line interface for butterfly-tiles
#[derive(Parser)]
#[command(name = "butterfly-tiles")]
#[command(about = "Tiled routing graph builder for OpenStreetMap data")]
#[command(long_about = "Builds a tiled routing graph from parsed OSM ways, nodes and restrictions:
  butterfly-tiles build --input belgium.json --tile-dir tiles/
  butterfly-tiles build --input belgium.json --config build.toml --threads 8
  butterfly-tiles inspect tiles/2/000/756/425.gph")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build graph tiles
    Build {
        /// JSON document with ways, nodes, restrictions and node annotations
        #[arg(short, long)]
        input: PathBuf,

        /// TOML build configuration; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for .gph tiles
        #[arg(long)]
        tile_dir: Option<PathBuf>,

        /// Scratch directory for the edge and shape sequences
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Hierarchy level (0 highway, 1 arterial, 2 local)
        #[arg(long)]
        level: Option<u8>,

        /// Tile writer threads
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Maximum hops followed along a chain of link edges
        #[arg(long)]
        max_link_hops: Option<u32>,
    },

    /// Print a summary of a tile file
    Inspect {
        /// Path to a .gph tile
        tile: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Command::Build {
            input,
            config,
            tile_dir,
            work_dir,
            level,
            threads,
            max_link_hops,
        } => {
            let mut build_config = match config {
                Some(path) => BuildConfig::from_toml_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => BuildConfig::default(),
            };
            if let Some(tile_dir) = tile_dir {
                build_config.tile_dir = tile_dir;
            }
            if let Some(work_dir) = work_dir {
                build_config.work_dir = work_dir;
            }
            if let Some(level) = level {
                build_config.level = level;
            }
            if let Some(threads) = threads {
                build_config.threads = threads;
            }
            if let Some(max_link_hops) = max_link_hops {
                build_config.max_link_hops = max_link_hops;
            }
            build_config.validate()?;

            build(&input, &build_config)
        }
        Command::Inspect { tile } => inspect(&tile),
    }
}

fn build(input: &Path, config: &BuildConfig) -> Result<()> {
    eprintln!("🦋 Butterfly-tiles v{} starting...", env!("CARGO_PKG_VERSION"));
    eprintln!("📥 Loading {}", input.display());
    let data = OsmData::from_json_file(input).context("loading input")?;
    eprintln!(
        "   {} ways, {} nodes, {} restrictions",
        data.ways.len(),
        data.nodes.len(),
        data.restrictions.len()
    );

    let builder = GraphBuilder::new(config.build_options())?;
    let writer = DirectoryTileWriter::new(&config.tile_dir);
    let progress = cli::ProgressManager::new(&format!("📦 Writing tiles to {}", config.tile_dir.display()));

    let report = builder
        .build(&data, &writer, Some(progress.callback()))
        .context("building tiles")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let contents = TileFile::read(path).with_context(|| format!("reading {}", path.display()))?;
    let tile = contents.tile;

    println!("tile:          {tile}");
    if let Some(bounds) = TileLevel::from_level(tile.level()).and_then(|l| l.tiles.tile_bounds(tile.tile_index())) {
        println!(
            "bounds:        [{:.4}, {:.4}] - [{:.4}, {:.4}]",
            bounds.min_lat, bounds.min_lon, bounds.max_lat, bounds.max_lon
        );
    }
    println!("nodes:         {}", contents.nodes.len());
    println!("edges:         {}", contents.edges.len());
    println!("link edges:    {}", contents.edge_attributes().filter(|a| a.link()).count());
    println!("shape points:  {}", contents.shapes.len());
    println!("sign records:  {}", contents.signs.len());
    println!("restrictions:  {}", contents.restrictions.len());
    println!("crc64:         0x{:016X}", contents.checksum);
    Ok(())
}
