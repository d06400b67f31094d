// Showcache CLI binary

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use anyhow::Result;

use showcache::db::query::Filter;
use showcache::db::schema::{Episode, Series, UnresolvedItem};
use showcache::{reconcile_root, JsonCatalog, ReconcileOptions, ResolvedItems, SeriesPolicy, SourceSession};

#[derive(Parser)]
#[command(name = "showcache")]
#[command(about = "Showcache - match episode files against show metadata and cache the result", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cache for a media root
    Init {
        /// Media root path
        root: PathBuf,
    },

    /// Scan a media root and reconcile it against a metadata catalog
    Scan {
        /// Media root path
        root: PathBuf,
        /// JSON catalog to resolve episodes against
        #[arg(short, long)]
        catalog: PathBuf,
        /// Overwrite cached series fields with the catalog's
        #[arg(long)]
        refresh_series: bool,
        /// Create the cache first if it does not exist
        #[arg(long)]
        init: bool,
    },

    /// List unresolved files and directories
    Unresolved {
        /// Media root path
        root: PathBuf,
        /// Relative directory to list under (defaults to the top level)
        #[arg(long)]
        under: Option<String>,
    },

    /// List cached series
    Series {
        /// Media root path
        root: PathBuf,
        /// Show a single series
        #[arg(long)]
        id: Option<i64>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List cached episodes
    Episodes {
        /// Media root path
        root: PathBuf,
        /// Only episodes from this season number
        #[arg(long)]
        season: Option<i64>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete the cache for a media root
    Destroy {
        /// Media root path
        root: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let mut clog = colog::default_builder();
    clog.filter(None, level);
    clog.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { root } => cmd_init(root),
        Commands::Scan { root, catalog, refresh_series, init } => cmd_scan(root, catalog, refresh_series, init),
        Commands::Unresolved { root, under } => cmd_unresolved(root, under),
        Commands::Series { root, id, json } => cmd_series(root, id, json),
        Commands::Episodes { root, season, json } => cmd_episodes(root, season, json),
        Commands::Destroy { root } => cmd_destroy(root),
    }
}

fn open_session(root: PathBuf) -> Result<SourceSession> {
    let root = root.canonicalize()
        .map_err(|_| anyhow::anyhow!("Media root does not exist: {}", root.display()))?;
    Ok(SourceSession::new(root))
}

fn cmd_init(root: PathBuf) -> Result<()> {
    let session = open_session(root)?;

    if session.store().is_initialized() {
        println!("Cache already exists at {}", session.store().db_path().display());
        return Ok(());
    }

    session.initialize_database()?;
    println!("Initialized cache at {}", session.store().db_path().display());
    Ok(())
}

fn cmd_scan(root: PathBuf, catalog: PathBuf, refresh_series: bool, init: bool) -> Result<()> {
    let session = open_session(root)?;

    if !session.store().is_initialized() {
        if !init {
            anyhow::bail!(
                "No cache at {}. Run `showcache init` first or pass --init.",
                session.root().display()
            );
        }
        session.initialize_database()?;
        println!("Initialized cache at {}", session.store().db_path().display());
    }

    let lookup = JsonCatalog::load(&catalog)?;
    let options = ReconcileOptions {
        series_policy: if refresh_series { SeriesPolicy::Refresh } else { SeriesPolicy::Skip },
        ..ReconcileOptions::default()
    };

    println!("Scanning {}...", session.root().display());
    let mut resolved = ResolvedItems::new();
    let summary = reconcile_root(&session, &mut resolved, &lookup, &options)?;

    println!();
    println!("Scan complete:");
    println!("  Files:          {}", summary.total);
    println!("  Written:        {}", summary.persisted);
    println!("  Already cached: {}", summary.duplicates);
    println!("  No match:       {}", summary.no_match);
    println!("  Skipped:        {}", summary.skipped);
    println!("  Write failures: {}", summary.write_failed);
    println!("  Unresolved:     {}", summary.unresolved.len());

    if !summary.unresolved.is_empty() {
        println!();
        println!("{}", summary.failure_report());
    }

    Ok(())
}

fn cmd_unresolved(root: PathBuf, under: Option<String>) -> Result<()> {
    let session = open_session(root)?;
    let under = under.map(|u| u.trim_matches('/').to_string()).filter(|u| !u.is_empty());
    let items: Vec<UnresolvedItem> = session.unresolved_under(under.as_deref())?;

    if items.is_empty() {
        match under {
            Some(dir) => println!("Nothing unresolved under {}.", dir),
            None => println!("Nothing unresolved."),
        }
        return Ok(());
    }

    println!("{:>5}  {}", "ID", "Path");
    println!("{}", "-".repeat(60));
    for item in items {
        println!("{:>5}  {}", item.id, item.child_path);
    }

    Ok(())
}

fn cmd_series(root: PathBuf, id: Option<i64>, json: bool) -> Result<()> {
    let session = open_session(root)?;

    let series: Vec<Series> = match id {
        Some(id) => {
            let one = session.series(id)?
                .ok_or_else(|| anyhow::anyhow!("Series {} not found", id))?;
            vec![one]
        }
        None => session.series_where(&Filter::new())?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
        return Ok(());
    }

    if series.is_empty() {
        println!("No series cached.");
        return Ok(());
    }

    println!("{:>8}  {:>12}  {:>8}  {}", "ID", "Started", "Runtime", "Title");
    println!("{}", "-".repeat(60));
    for s in series {
        let started = s.start_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let runtime = s.runtime_minutes
            .map(|m| format!("{}m", m))
            .unwrap_or_else(|| "-".to_string());

        println!("{:>8}  {:>12}  {:>8}  {}", s.id, started, runtime, s.title);
    }

    Ok(())
}

fn cmd_episodes(root: PathBuf, season: Option<i64>, json: bool) -> Result<()> {
    let session = open_session(root)?;
    let filter = match season {
        Some(n) => Filter::new().eq("season_number", n),
        None => Filter::new(),
    };
    let episodes: Vec<Episode> = session.episodes_where(&filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&episodes)?);
        return Ok(());
    }

    if episodes.is_empty() {
        println!("No episodes cached.");
        return Ok(());
    }

    println!("{:>8}  {:>7}  {:>12}  {}", "ID", "Episode", "Aired", "File");
    println!("{}", "-".repeat(70));
    for ep in episodes {
        let code = format!(
            "S{:02}E{:02}",
            ep.season_number.unwrap_or(0),
            ep.episode_number
        );
        let aired = ep.air_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!("{:>8}  {:>7}  {:>12}  {}", ep.id, code, aired, ep.file_path);
    }

    Ok(())
}

fn cmd_destroy(root: PathBuf) -> Result<()> {
    let session = open_session(root)?;

    if !session.store().is_initialized() {
        println!("No cache at {}", session.root().display());
        return Ok(());
    }

    session.destroy_database()?;
    println!("Removed cache for {}", session.root().display());
    Ok(())
}
