use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use plan_catalog::config::{self, AppConfig, ExtractConfig};
use plan_catalog::report::{plan_line, section_rows, CatalogSummary};
use plan_catalog::{
    fingerprint, import_roster, load_plans, load_rows, open_database, parse_roster, read_script,
    render_script, template, CategoryTable, Extraction, Extractor, PriceMode, Preset,
    ScriptOptions, SourceInfo, WriteFailure,
};

#[derive(Parser)]
#[command(
    name = "plan-catalog",
    version = plan_catalog::VERSION,
    about = "Extract and classify plan catalogs from spreadsheet exports"
)]
struct Cli {
    /// Config file (defaults to ./plan-catalog.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract plans and print them with a summary
    Extract {
        input: PathBuf,
        #[command(flatten)]
        extract: ExtractArgs,
        /// Also write the plans as a JSON array to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Extract plans and write an SQL script
    Sql {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        extract: ExtractArgs,
        /// Do not emit DELETE FROM plans
        #[arg(long)]
        no_replace: bool,
    },
    /// Extract plans and inject them into an HTML template
    Html {
        input: PathBuf,
        #[arg(short, long)]
        template: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        placeholder: Option<String>,
        #[command(flatten)]
        extract: ExtractArgs,
    },
    /// Extract plans and load them into the database
    LoadPlans {
        input: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[command(flatten)]
        extract: ExtractArgs,
        /// Keep existing plans
        #[arg(long)]
        no_replace: bool,
    },
    /// Upsert clients, BANs and subscribers from a roster sheet
    ImportRoster {
        input: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        sheet: Option<String>,
    },
    /// List the section and marker rows of a catalog sheet
    Inspect {
        input: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Parse a generated SQL script back, optionally comparing it with a fresh extraction
    VerifySql {
        script: PathBuf,
        /// Catalog the script should have been generated from
        #[arg(long)]
        against: Option<PathBuf>,
        #[command(flatten)]
        extract: ExtractArgs,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// legacy-a or legacy-b
    #[arg(long)]
    preset: Option<Preset>,
    /// legacy or lenient
    #[arg(long)]
    price_mode: Option<PriceMode>,
    /// JSON category table, replaces the preset
    #[arg(long)]
    rules: Option<PathBuf>,
    #[arg(long)]
    sheet: Option<String>,
}

impl ExtractArgs {
    /// CLI flags win over the config file
    fn merge(self, base: &ExtractConfig) -> ExtractConfig {
        ExtractConfig {
            preset: self.preset.unwrap_or(base.preset),
            price_mode: self.price_mode.unwrap_or(base.price_mode),
            rules_file: self.rules.or_else(|| base.rules_file.clone()),
            sheet: self.sheet.or_else(|| base.sheet.clone()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { input, extract, json } => run_extract(&cfg, &input, extract, json),
        Commands::Sql { input, output, extract, no_replace } => {
            run_sql(&cfg, &input, &output, extract, no_replace)
        }
        Commands::Html { input, template, output, placeholder, extract } => {
            run_html(&cfg, &input, &template, &output, placeholder, extract)
        }
        Commands::LoadPlans { input, db, extract, no_replace } => {
            run_load_plans(&cfg, &input, db, extract, no_replace)
        }
        Commands::ImportRoster { input, db, sheet } => run_import_roster(&cfg, &input, db, sheet),
        Commands::Inspect { input, sheet } => run_inspect(&cfg, &input, sheet),
        Commands::VerifySql { script, against, extract } => {
            run_verify_sql(&cfg, &script, against.as_deref(), extract)
        }
    }
}

// ============================================================================
// SHARED STEPS
// ============================================================================

fn build_extractor(settings: &ExtractConfig) -> Result<Extractor> {
    let table = match &settings.rules_file {
        Some(path) => CategoryTable::from_file(path)?,
        None => CategoryTable::preset(settings.preset),
    };
    let extractor = Extractor::new(table).with_price_mode(settings.price_mode);

    println!(
        "🏷️  Rules: {} ({} rules, default {}), price mode {}",
        extractor.table().name,
        extractor.table().rule_count(),
        extractor.table().default_category,
        extractor.price_mode().as_str()
    );
    Ok(extractor)
}

fn extract_plans(cfg: &AppConfig, input: &Path, args: ExtractArgs) -> Result<Extraction> {
    let settings = args.merge(&cfg.extract);

    println!("📂 Reading {}...", input.display());
    let rows = load_rows(input, settings.sheet.as_deref())?;
    println!("✓ Loaded {} rows", rows.len());

    let extractor = build_extractor(&settings)?;
    let extraction = extractor.extract(&rows);
    println!(
        "✓ Extracted {} plans ({} rows skipped)",
        extraction.records.len(),
        extraction.skipped.len()
    );

    Ok(extraction)
}

fn source_info(input: &Path) -> Result<SourceInfo> {
    Ok(SourceInfo {
        file: input.display().to_string(),
        sha256: fingerprint(input)?,
    })
}

fn print_failures(failures: &[WriteFailure], limit: usize) {
    if failures.is_empty() {
        return;
    }
    println!("\n⚠️  {} records rejected:", failures.len());
    for failure in failures.iter().take(limit) {
        println!("  - {}: {}", failure.record, failure.message);
    }
    if failures.len() > limit {
        println!("  ... and {} more", failures.len() - limit);
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_extract(
    cfg: &AppConfig,
    input: &Path,
    args: ExtractArgs,
    json: Option<PathBuf>,
) -> Result<()> {
    let extraction = extract_plans(cfg, input, args)?;

    println!("\n📋 Plans");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for plan in &extraction.records {
        println!("{}", plan_line(plan));
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print!("{}", CatalogSummary::from_extraction(&extraction).render());

    if let Some(path) = json {
        fs::write(&path, template::plans_json(&extraction.records)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\n💾 JSON written to {}", path.display());
    }

    Ok(())
}

fn run_sql(
    cfg: &AppConfig,
    input: &Path,
    output: &Path,
    args: ExtractArgs,
    no_replace: bool,
) -> Result<()> {
    let extraction = extract_plans(cfg, input, args)?;

    let options = ScriptOptions {
        replace: cfg.output.replace && !no_replace,
    };
    let script = render_script(&extraction.records, options);
    fs::write(output, script)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("\n💾 SQL written to {}", output.display());
    print!("{}", CatalogSummary::from_extraction(&extraction).render());
    Ok(())
}

fn run_html(
    cfg: &AppConfig,
    input: &Path,
    template_path: &Path,
    output: &Path,
    placeholder: Option<String>,
    args: ExtractArgs,
) -> Result<()> {
    let extraction = extract_plans(cfg, input, args)?;
    let placeholder = placeholder.unwrap_or_else(|| cfg.output.placeholder.clone());

    template::render_file(template_path, output, &placeholder, &extraction.records)?;

    println!("\n✅ {} plans injected into {}", extraction.records.len(), output.display());
    print!("{}", CatalogSummary::from_extraction(&extraction).render());
    Ok(())
}

fn run_load_plans(
    cfg: &AppConfig,
    input: &Path,
    db: Option<PathBuf>,
    args: ExtractArgs,
    no_replace: bool,
) -> Result<()> {
    let extraction = extract_plans(cfg, input, args)?;
    let db_path = db.unwrap_or_else(|| cfg.database.path.clone());

    println!("\n🔧 Opening database {}...", db_path.display());
    let mut conn = open_database(&db_path)?;
    println!("✓ Database initialized with WAL mode");

    println!("\n💾 Loading plans...");
    let replace = cfg.output.replace && !no_replace;
    let summary = load_plans(&mut conn, &extraction.records, replace, &source_info(input)?)?;

    println!("✓ Inserted {} plans", summary.inserted);
    print_failures(&summary.failures, cfg.roster.error_preview);
    print!("\n{}", CatalogSummary::from_extraction(&extraction).render());
    Ok(())
}

fn run_import_roster(
    cfg: &AppConfig,
    input: &Path,
    db: Option<PathBuf>,
    sheet: Option<String>,
) -> Result<()> {
    let sheet = sheet.or_else(|| cfg.roster.sheet.clone());
    let db_path = db.unwrap_or_else(|| cfg.database.path.clone());

    println!("📂 Reading roster {}...", input.display());
    let rows = load_rows(input, sheet.as_deref())?;
    let roster = parse_roster(&rows, &cfg.roster.active_statuses)?;
    println!(
        "✓ {} subscribers to import ({} without BAN/SUB, {} filtered by status)",
        roster.rows.len(),
        roster.missing_ids,
        roster.filtered_status
    );

    println!("\n🔧 Opening database {}...", db_path.display());
    let mut conn = open_database(&db_path)?;

    println!("\n💾 Importing...");
    let summary = import_roster(&mut conn, &roster.rows, &source_info(input)?)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Clients created: {}", summary.created);
    println!("✓ Clients updated: {}", summary.updated);
    println!("✓ Subscribers added: {}", summary.subscribers_added);
    print_failures(&summary.failures, cfg.roster.error_preview);
    Ok(())
}

fn run_inspect(cfg: &AppConfig, input: &Path, sheet: Option<String>) -> Result<()> {
    let sheet = sheet.or_else(|| cfg.extract.sheet.clone());

    println!("🔍 Inspecting {}...", input.display());
    let rows = load_rows(input, sheet.as_deref())?;
    println!("✓ {} rows\n", rows.len());

    let sections = section_rows(&rows);
    for section in &sections {
        println!("  Row {:>4}: {}", section.row, section.text);
    }
    println!("\n📊 {} section rows", sections.len());
    Ok(())
}

fn run_verify_sql(
    cfg: &AppConfig,
    script_path: &Path,
    against: Option<&Path>,
    args: ExtractArgs,
) -> Result<()> {
    let script = fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read {}", script_path.display()))?;
    let parsed = read_script(&script)?;
    println!("✓ {} parsed {} plans", script_path.display(), parsed.len());

    let Some(input) = against else {
        print!("{}", CatalogSummary::from_plans(&parsed).render());
        return Ok(());
    };

    let extraction = extract_plans(cfg, input, args)?;
    let mismatches: Vec<String> = extraction
        .records
        .iter()
        .zip(&parsed)
        .filter(|(expected, actual)| expected != actual)
        .map(|(expected, _)| expected.code.clone())
        .collect();

    if extraction.records.len() != parsed.len() || !mismatches.is_empty() {
        for code in mismatches.iter().take(cfg.roster.error_preview) {
            eprintln!("❌ Plan {} differs", code);
        }
        bail!(
            "Script does not match the catalog: {} plans in script, {} extracted, {} differ",
            parsed.len(),
            extraction.records.len(),
            mismatches.len()
        );
    }

    println!("🎉 Script matches the catalog ({} plans)", parsed.len());
    Ok(())
}
