mod catalog;
mod clerk;
mod config;
mod document;
mod error;
mod model;
mod pdf;
mod sanitize;
mod session;
mod totals;
mod words;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Select, Text};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::clerk::{Clerk, catalog_table, open_and_reveal};
use crate::config::{AppSettings, CatalogSettings};
use crate::model::PriceTier;

// ==========================================
// Structs & Enums
// ==========================================

#[derive(Parser)]
#[command(name = "proforma-maker", version, about = "Catalog lookup and proforma invoices")]
struct Cli {
    /// Override the data directory from the settings file
    #[arg(long, env = "PROFORMA_DATA_ROOT", global = true)]
    data_root: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a clerk session: search, add items, generate invoices
    New,
    /// Look up catalog items by name
    Search {
        term: String,
        /// Only list items priced in this tier
        #[arg(long, value_enum)]
        tier: Option<TierArg>,
        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure data directory and catalog source
    Config,
    /// Open output folder
    Open,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    SuperGros,
    Gros,
    Detail,
}

impl From<TierArg> for PriceTier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::SuperGros => PriceTier::SuperGros,
            TierArg::Gros => PriceTier::Gros,
            TierArg::Detail => PriceTier::Detail,
        }
    }
}

// ==========================================
// Main Function
// ==========================================

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Config => {
            setup_config_wizard()?;
        }
        Commands::New => {
            let (settings, root) = prepare(cli.data_root.as_deref())?;
            let Some(catalog) = load_catalog(&settings.catalog, &root) else {
                return Ok(());
            };
            let issuer = config::load_issuer(&root)?;
            let logo = config::load_logo(&root, &issuer);
            Clerk::new(&catalog, &issuer, &root, logo).run()?;
        }
        Commands::Search { term, tier, json } => {
            let (settings, root) = prepare(cli.data_root.as_deref())?;
            let Some(catalog) = load_catalog(&settings.catalog, &root) else {
                return Ok(());
            };
            search(&catalog, &term, tier.map(PriceTier::from), json)?;
        }
        Commands::Open => {
            let (_, root) = prepare(cli.data_root.as_deref())?;
            open_folder_wizard(&root);
        }
    }

    Ok(())
}

/// Settings (running the wizard on first use) and the resolved data root.
fn prepare(data_root_override: Option<&str>) -> anyhow::Result<(AppSettings, PathBuf)> {
    let settings = match config::load_settings()? {
        Some(settings) => settings,
        None => setup_config_wizard()?,
    };
    let data_root = data_root_override.unwrap_or(&settings.data_root);
    let root = PathBuf::from(config::expand_home_dir(data_root));
    fs::create_dir_all(&root).with_context(|| format!("creating data directory {}", root.display()))?;
    Ok((settings, root))
}

/// Loads the catalog, reporting failure to the clerk instead of bailing out.
fn load_catalog(settings: &CatalogSettings, root: &Path) -> Option<Catalog> {
    let source = match settings.source(root) {
        Ok(source) => source,
        Err(e) => {
            println!("❌ {}", e);
            return None;
        }
    };
    println!("📥 Loading catalog from {}...", source.describe());
    match source.load_catalog() {
        Ok(catalog) => {
            info!(source = %source.describe(), rows = catalog.len(), "catalog ready");
            if catalog.is_empty() {
                println!("⚠️  The catalog has no items.");
            }
            Some(catalog)
        }
        Err(e) => {
            warn!(source = %source.describe(), error = %e, "catalog load failed");
            println!("❌ Failed to load catalog: {}", e);
            None
        }
    }
}

// ==========================================
// 1. One-shot Search
// ==========================================

fn search(catalog: &Catalog, term: &str, tier: Option<PriceTier>, json: bool) -> anyhow::Result<()> {
    // Nothing to show for an empty term.
    if term.trim().is_empty() {
        return Ok(());
    }

    let matches: Vec<_> = catalog
        .search(term.trim())
        .into_iter()
        .filter(|row| tier.is_none_or(|t| row.prices[t.index()].is_some()))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("(None found)");
    } else {
        println!("{}", catalog_table(catalog, &matches));
    }
    Ok(())
}

// ==========================================
// 2. Open Folder Logic
// ==========================================

fn open_folder_wizard(root: &Path) {
    let output_root = root.join("output");
    let root_opt = "📂 Open Root Output Directory".to_string();

    let mut client_paths = Vec::new();
    if let Ok(years) = fs::read_dir(&output_root) {
        for year_entry in years.flatten().filter(|e| e.path().is_dir()) {
            let year_name = year_entry.file_name().to_string_lossy().to_string();
            if let Ok(clients) = fs::read_dir(year_entry.path()) {
                for client_entry in clients.flatten().filter(|e| e.path().is_dir()) {
                    let client_name = client_entry.file_name().to_string_lossy().to_string();
                    client_paths.push(format!("{} / {}", year_name, client_name));
                }
            }
        }
    }
    client_paths.sort();
    client_paths.reverse();

    let mut options = vec![root_opt.clone()];
    options.extend(client_paths);

    match Select::new("Select Folder to Open:", options).prompt() {
        Ok(choice) => {
            let target_path = match choice.split_once(" / ") {
                Some((year, client)) if choice != root_opt => output_root.join(year).join(client),
                _ => output_root,
            };
            if let Err(e) = fs::create_dir_all(&target_path) {
                println!("❌ {}", e);
                return;
            }
            println!("🚀 Opening: {:?}", target_path);
            open_and_reveal(&target_path);
        }
        Err(_) => println!("Operation cancelled."),
    }
}

// ==========================================
// 3. Config Wizard
// ==========================================

fn setup_config_wizard() -> anyhow::Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = config::load_settings()?.unwrap_or_default();

    let data_root = Text::new("Root Data Directory:")
        .with_default(&current.data_root)
        .prompt()?;

    let location = Text::new("Catalog CSV (file path or http(s) URL, empty for <data root>/catalog.csv):")
        .with_initial_value(&current.catalog.location)
        .prompt()?;

    let delimiters = vec![", (comma)", "; (semicolon)", "tab"];
    let start = match current.catalog.delimiter {
        ';' => 1,
        '\t' => 2,
        _ => 0,
    };
    let delimiter = match Select::new("Column separator:", delimiters)
        .with_starting_cursor(start)
        .prompt()?
    {
        "; (semicolon)" => ';',
        "tab" => '\t',
        _ => ',',
    };

    let settings = AppSettings {
        data_root: data_root.trim().to_string(),
        catalog: CatalogSettings {
            location: location.trim().to_string(),
            delimiter,
            ..current.catalog
        },
    };

    let path = config::config_path();
    config::save_settings_to(&settings, &path)?;
    println!("✅ Settings saved to {}", path.display());
    Ok(settings)
}
