//! Showstats CLI - yearly listener statistics per program
//!
//! # Main Commands
//!
//! ```bash
//! showstats serve                      # Start HTTP server (port 3000)
//! showstats find "Giant Steps"         # Rows for a program, all years
//! showstats find "Giant Steps" --year 2023 --summary
//! ```
//!
//! # Data Commands
//!
//! ```bash
//! showstats years                      # Configured reporting years
//! showstats load 2023 -o 2023.csv      # One year, canonical schema
//! showstats stack -o all.csv           # All years stacked
//! showstats normalize export.csv --hint "Program Name"
//! ```

use clap::{Parser, Subcommand};
use showstats::{
    find_rows, normalize_schema_report, parse_file_auto, summarize, write_csv, DataScope,
    MatchDiagnostic, MatchResult, Settings,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "showstats")]
#[command(about = "Listener statistics per radio program, across reporting years", long_about = None)]
struct Cli {
    /// Source registry JSON file (default: built-in years)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Read <dir>/<year>.csv instead of fetching exports
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured reporting years
    Years,

    /// Load one year in the canonical schema and output CSV
    Load {
        /// Year key, e.g. 2023
        year: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stack every year into one table and output CSV
    Stack {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Find a program's rows
    Find {
        /// Program name, matched case- and spacing-insensitively
        program: String,

        /// Restrict to one year (default: all years)
        #[arg(short, long)]
        year: Option<String>,

        /// Print KPI summary as JSON instead of rows
        #[arg(short, long)]
        summary: bool,
    },

    /// Normalize a local CSV export into the canonical schema
    Normalize {
        /// Input CSV file
        input: PathBuf,

        /// Header that holds the program name
        #[arg(long, default_value = "Program Name")]
        hint: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: SHOWSTATS_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(mut settings) => {
            if cli.registry.is_some() {
                settings.registry_path = cli.registry.clone();
            }
            if cli.data_dir.is_some() {
                settings.data_dir = cli.data_dir.clone();
            }
            settings
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Years => cmd_years(&settings),
        Commands::Load { year, output } => cmd_load(&settings, &year, output.as_deref()).await,
        Commands::Stack { output } => cmd_stack(&settings, output.as_deref()).await,
        Commands::Find {
            program,
            year,
            summary,
        } => cmd_find(&settings, &program, year.as_deref(), summary).await,
        Commands::Normalize {
            input,
            hint,
            output,
        } => cmd_normalize(&input, &hint, output.as_deref()),
        Commands::Serve { port } => cmd_serve(&settings, port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_years(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let registry = settings.registry()?;
    if registry.is_empty() {
        eprintln!("📋 No years configured.");
        return Ok(());
    }

    eprintln!("📋 Configured years ({}):\n", registry.len());
    for config in registry.iter() {
        println!("  📅 {}", config.year_key);
        println!("     Source: {} ({})", config.source_id, config.sub_selector);
        println!("     Program column: {}", config.program_column_hint);
    }
    Ok(())
}

async fn cmd_load(
    settings: &Settings,
    year: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = settings.loader()?;
    let table = loader.load_year(year).await?;

    eprintln!("✅ {} rows, {} columns", table.row_count(), table.headers().len());
    write_output(&write_csv(&table)?, output)
}

async fn cmd_stack(settings: &Settings, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let loader = settings.loader()?;
    let table = loader.load_all_years().await?;

    eprintln!(
        "✅ Stacked {} rows from {} years",
        table.row_count(),
        loader.registry().len()
    );
    write_output(&write_csv(&table)?, output)
}

async fn cmd_find(
    settings: &Settings,
    program: &str,
    year: Option<&str>,
    summary: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = settings.loader()?;
    let scope = DataScope::from(year.unwrap_or_default());
    let table = loader.load_scope(&scope).await?;

    match find_rows(&table, program) {
        MatchResult::Matched { matched_by, rows } => {
            eprintln!(
                "✅ {} rows for '{}' ({}, matched by {:?})",
                rows.row_count(),
                program,
                scope,
                matched_by
            );
            if summary {
                let kpis = summarize(program, &rows);
                println!("{}", serde_json::to_string_pretty(&kpis)?);
            } else {
                print!("{}", write_csv(&rows)?);
            }
            Ok(())
        }
        MatchResult::NotFound(diagnostic) => {
            print_diagnostic(program, &diagnostic);
            Err(format!("No rows found for program: {}", program).into())
        }
    }
}

fn print_diagnostic(program: &str, diagnostic: &MatchDiagnostic) {
    eprintln!("⚠️  No exact match for '{}' (normalized: '{}')", program, diagnostic.query);

    if diagnostic.has_candidates() {
        eprintln!("\n   Did you mean:");
        for candidate in diagnostic
            .program_candidates
            .iter()
            .chain(&diagnostic.pn_candidates)
        {
            eprintln!("     - {}", candidate);
        }
    }

    if !diagnostic.program_values.is_empty() {
        eprintln!("\n   Known programs ({}):", diagnostic.program_values.len());
        for value in diagnostic.program_values.iter().take(20) {
            eprintln!("     {} ← {}", value.normalized, value.examples.join(" | "));
        }
    }
}

fn cmd_normalize(input: &Path, hint: &str, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Normalizing: {}", input.display());

    let parsed = parse_file_auto(input)?;
    eprintln!("   Encoding: {}", parsed.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(parsed.delimiter));
    eprintln!("   Columns: {}", parsed.table.headers().join(", "));

    let report = normalize_schema_report(parsed.table, hint);
    match report.program_source {
        Some(ref src) => eprintln!("   program ← {}", src),
        None => eprintln!("   ⚠️  No program column found (hint '{}')", hint),
    }
    if let Some(ref src) = report.on_demand_source {
        eprintln!("   on_demand_items_selected ← {}", src);
    }

    eprintln!("✅ {} rows", report.table.row_count());
    write_output(&write_csv(&report.table)?, output)
}

async fn cmd_serve(settings: &Settings, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let loader = settings.loader()?;
    showstats::server::start_server(loader, port.unwrap_or(settings.port)).await
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
