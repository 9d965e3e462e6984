// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! NoiseGrid CLI - receiver grids for traffic-noise calculations.
//!
//! Stages GeoJSON layers into an in-memory spatial database, runs one grid
//! generator and writes the receivers (and triangles) back out as GeoJSON.
//!
//! # Commands
//!
//! - `noisegrid generate` - build a receiver grid from buildings and roads
//! - `noisegrid pivot` - join per-level results of a 3D facade grid by
//!   stack id

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use noisegrid_core::{
    GridSettings, InputTables, MemoryDatabase, SpatialDatabase, Srid, TableName,
};
use noisegrid_receivers::{join_feature_collection, ReceiverGridService, SpadeTriangulator};
use serde_json::Value;
use tracing::info;

mod config;
mod geojson;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "noisegrid", version, about = "Receiver grid generation for noise maps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a receiver grid.
    Generate(GenerateArgs),
    /// Pivot stacked facade results into one feature per receiver column.
    Pivot {
        /// FeatureCollection of 3D points with STACK_ID and LAEQ properties.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Grid settings as JSON. Every field has a default.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Building footprints with a `height` or `building_height` property.
    #[arg(long)]
    buildings: PathBuf,

    /// Road lines.
    #[arg(long)]
    roads: Option<PathBuf>,

    /// Fence polygons. Overrides `fence_wkt` in the settings. A layer
    /// declaring another CRS is reprojected.
    #[arg(long)]
    fence: Option<PathBuf>,

    /// SRID of the inputs when the buildings layer declares no CRS.
    #[arg(long)]
    srid: Option<i32>,

    /// Receivers output.
    #[arg(long, default_value = "receivers.geojson")]
    output: PathBuf,

    /// Triangles output, for grids that produce triangles.
    #[arg(long)]
    triangles: Option<PathBuf>,
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    fs::write(path, bytes).with_context(|| format!("cannot write {}", path.display()))
}

fn generate(args: GenerateArgs) -> Result<()> {
    let mut settings = match &args.settings {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            GridSettings::from_json(&text)
                .with_context(|| format!("invalid grid settings in {}", path.display()))?
        }
        None => GridSettings::default(),
    };

    let buildings_layer = read_json(&args.buildings)?;
    let srid = match (args.srid, geojson::collection_srid(&buildings_layer)) {
        (Some(srid), _) => Srid(srid),
        (None, Some(srid)) => srid,
        (None, None) => bail!("the buildings layer declares no CRS; pass --srid"),
    };

    let mut db = MemoryDatabase::new();
    let mut tables = InputTables::default();
    let buildings = geojson::read_buildings(&buildings_layer)?;
    info!(buildings = buildings.len(), %srid, "staging buildings");
    db.create_buildings_table(&tables.buildings, srid, buildings)?;

    if let Some(path) = &args.roads {
        let roads = geojson::read_sources(&read_json(path)?)?;
        let table = TableName::parse("ROADS")?;
        info!(roads = roads.len(), "staging roads");
        db.create_sources_table(&table, srid, roads)?;
        tables = tables.with_sources(table);
    }
    if let Some(path) = &args.fence {
        let layer = read_json(path)?;
        // A fence in another CRS is reprojected by the generators
        let fence_srid = geojson::collection_srid(&layer).unwrap_or(srid);
        settings.fence_wkt = Some(geojson::fence_wkt(&layer, fence_srid)?);
    }

    let config = settings.into_config(&tables)?;
    let mut engine = SpadeTriangulator::new();
    let progress = |percent: u32, message: &str| info!(percent, "{message}");
    let output = ReceiverGridService::new(&mut db, &mut engine)
        .generate(&config, &progress)
        .context("receiver grid generation failed")?;

    let receivers = db.receivers(&output.receivers)?;
    write_json(&args.output, &geojson::receivers_collection(&receivers, output.srid))?;
    info!(path = %args.output.display(), receivers = receivers.len(), "receivers written");

    if let (Some(path), Some(table)) = (&args.triangles, &output.triangles) {
        let triangles = db.triangles(table)?;
        write_json(path, &geojson::triangles_collection(&triangles, output.srid))?;
        info!(path = %path.display(), triangles = triangles.len(), "triangles written");
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn pivot(input: &Path, output: &Path) -> Result<()> {
    let joined = join_feature_collection(&read_json(input)?)
        .with_context(|| format!("cannot pivot {}", input.display()))?;
    let columns = joined["features"].as_array().map_or(0, Vec::len);
    write_json(output, &joined)?;
    info!(path = %output.display(), columns, "stacked results pivoted");
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::from_env();
    config.init_tracing();

    match Cli::parse().command {
        Command::Generate(args) => generate(args),
        Command::Pivot { input, output } => pivot(&input, &output),
    }
}
