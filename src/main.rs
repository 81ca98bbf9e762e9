use adresse_service::config::{init_logging, Config};
use adresse_service::{AddressService, EntityType, QueryParams, SeedDocument, SqliteStore};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Address registry lookups: import seed data and run queries
#[derive(Parser, Debug)]
#[command(name = "adresse-service", version, about)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a JSON seed document into the database
    Import { seed: PathBuf },

    /// Run one query and print the JSON result
    #[command(subcommand)]
    Query(Shape),
}

#[derive(Subcommand, Debug)]
enum Shape {
    /// Localities of a municipality
    Lokalitet(Filters),
    /// Roads of a locality
    Vej(Filters),
    /// Buildings on a road, one per house number
    Hus(Filters),
    /// Addresses on a road
    Adresse(Filters),
    /// Full detail for one address
    Adresseoplysninger(Filters),
}

#[derive(ClapArgs, Debug, Default)]
struct Filters {
    #[arg(long)]
    kommune: Option<String>,
    #[arg(long)]
    lokalitet: Option<String>,
    #[arg(long)]
    vej: Option<String>,
    #[arg(long)]
    husnr: Option<String>,
    #[arg(long)]
    bnr: Option<String>,
    #[arg(long)]
    adresse: Option<String>,
}

impl From<Filters> for QueryParams {
    fn from(f: Filters) -> Self {
        QueryParams {
            kommune: f.kommune,
            lokalitet: f.lokalitet,
            vej: f.vej,
            husnr: f.husnr,
            bnr: f.bnr,
            adresse: f.adresse,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.logging);

    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());
    let store = SqliteStore::open(&db_path, config.busy_timeout())?;

    match cli.command {
        Command::Import { seed } => run_import(&store, &seed, &db_path),
        Command::Query(shape) => run_query(store, shape),
    }
}

fn run_import(store: &SqliteStore, seed: &Path, db_path: &Path) -> Result<()> {
    let document = SeedDocument::read(seed)?;
    let counts = document.counts();
    for kind in EntityType::ALL {
        let count = counts.get(&kind).copied().unwrap_or(0);
        info!(kind = %kind, count, "seed entities");
    }

    let inserted = store.insert_all(&document.entities)?;
    info!(inserted, db = %db_path.display(), "import complete");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_query(store: SqliteStore, shape: Shape) -> Result<()> {
    let now = Utc::now();
    let service = AddressService::initialize(store, now).context("Failed to load municipalities")?;

    match shape {
        Shape::Lokalitet(f) => print_json(&service.localities(&f.into(), now)?),
        Shape::Vej(f) => print_json(&service.roads(&f.into(), now)?),
        Shape::Hus(f) => print_json(&service.buildings(&f.into(), now)?),
        Shape::Adresse(f) => print_json(&service.addresses(&f.into(), now)?),
        Shape::Adresseoplysninger(f) => print_json(&service.address_detail(&f.into(), now)?),
    }
}
