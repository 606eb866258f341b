//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use publisher_core::{
    EditionDependenciesPopulator, EditionServices, ImportResult, LeadImage, ProgressReporter,
    Reconciliation, Transition, import_detailed_guides, validate_headings,
};
use publisher_shared::{
    AppConfig, AttachmentCacheConfig, Dependable, Image, ImportConfig, init_config, load_config,
};
use publisher_storage::Storage;
use publisher_uploader::AttachmentCache;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Publisher: edition workflow and detailed guide imports.
#[derive(Parser)]
#[command(
    name = "publisher",
    version,
    about = "Publish editions, track their dependencies, and import detailed guides from CSV.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (defaults to the configured database_path).
    #[arg(long, global = true, env = "PUBLISHER_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Check the heading row of a detailed guide CSV file.
    Validate {
        /// CSV file to check.
        csv: PathBuf,
    },

    /// Import detailed guides from a CSV file.
    Import {
        /// CSV file to import.
        csv: PathBuf,

        /// Fallback organisation slug (defaults to config).
        #[arg(long)]
        organisation: Option<String>,

        /// Attachment cache directory (defaults to config).
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Stop at the first row that fails.
        #[arg(long)]
        stop_on_error: bool,
    },

    /// Publish a submitted edition.
    Publish {
        edition_id: i64,

        /// Publish from imported, draft or submitted without review.
        #[arg(long)]
        force: bool,
    },

    /// Withdraw a published edition.
    Withdraw { edition_id: i64 },

    /// Show what an edition depends on and what depends on it.
    Deps {
        edition_id: i64,

        /// Recompute the edges from the edition body first.
        #[arg(long)]
        refresh: bool,
    },

    /// Show an edition summary with its lead image and dependencies.
    Show { edition_id: i64 },

    /// Attach an image to an edition. The first image is the lead image.
    Image {
        edition_id: i64,

        /// Image URL.
        url: String,

        /// Alternative text.
        #[arg(long)]
        alt_text: String,

        #[arg(long)]
        caption: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "publisher=info",
        1 => "publisher=debug",
        _ => "publisher=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let database = cli.database;
    match cli.command {
        Command::Validate { csv } => cmd_validate(&csv),
        Command::Import {
            csv,
            organisation,
            cache_dir,
            stop_on_error,
        } => cmd_import(database, csv, organisation, cache_dir, stop_on_error).await,
        Command::Publish { edition_id, force } => {
            let transition = if force {
                Transition::ForcePublish
            } else {
                Transition::Publish
            };
            cmd_transition(database, edition_id, transition).await
        }
        Command::Withdraw { edition_id } => {
            cmd_transition(database, edition_id, Transition::Withdraw).await
        }
        Command::Deps {
            edition_id,
            refresh,
        } => cmd_deps(database, edition_id, refresh).await,
        Command::Show { edition_id } => cmd_show(database, edition_id).await,
        Command::Image {
            edition_id,
            url,
            alt_text,
            caption,
        } => {
            let image = Image {
                url,
                alt_text,
                caption,
            };
            cmd_add_image(database, edition_id, &image).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn database_path(config: &AppConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.defaults.database_path))
}

async fn open_storage(config: &AppConfig, flag: Option<PathBuf>) -> Result<Storage> {
    let path = database_path(config, flag);
    info!(path = %path.display(), "opening database");
    Ok(Storage::open(&path).await?)
}

async fn open_storage_readonly(config: &AppConfig, flag: Option<PathBuf>) -> Result<Storage> {
    let path = database_path(config, flag);
    if !path.exists() {
        return Err(eyre!("no database found at '{}'", path.display()));
    }
    Ok(Storage::open_readonly(&path).await?)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

fn cmd_validate(csv: &Path) -> Result<()> {
    let problems = validate_headings(csv)?;
    if problems.is_empty() {
        println!("{}: headings OK", csv.display());
        return Ok(());
    }
    for problem in &problems {
        println!("  {problem}");
    }
    Err(eyre!("{} has invalid headings", csv.display()))
}

async fn cmd_import(
    database: Option<PathBuf>,
    csv: PathBuf,
    organisation: Option<String>,
    cache_dir: Option<PathBuf>,
    stop_on_error: bool,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, database).await?;

    let mut cache_config = AttachmentCacheConfig::from(&config);
    if let Some(dir) = cache_dir {
        cache_config.cache_dir = dir;
    }
    let cache = AttachmentCache::new(cache_config)?;

    let mut import_config = ImportConfig::new(csv, &config);
    if let Some(slug) = organisation {
        import_config.default_organisation = slug;
    }
    import_config.stop_on_row_error |= stop_on_error;

    info!(
        csv = %import_config.csv_path.display(),
        organisation = %import_config.default_organisation,
        cache_dir = %cache.cache_dir().display(),
        "importing detailed guides"
    );

    let reporter = CliProgress::new();
    let result = import_detailed_guides(&import_config, &storage, &cache, &reporter).await?;

    println!();
    println!("  Import finished");
    println!("  ID:       {}", result.import_id);
    println!("  Imported: {}", result.imported);
    println!("  Failed:   {}", result.failed);
    println!("  Warnings: {}", result.warnings.len());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    for error in &result.errors {
        println!("  line {}: {}", error.line_number, error.message);
    }
    for warning in &result.warnings {
        println!("  line {} (warning): {}", warning.line_number, warning.message);
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn row_imported(&self, line_number: usize, title: &str) {
        self.spinner
            .set_message(format!("Imported line {line_number}: {title}"));
    }

    fn row_failed(&self, line_number: usize, message: &str) {
        self.spinner
            .suspend(|| eprintln!("  line {line_number} failed: {message}"));
    }

    fn done(&self, _result: &ImportResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Editions
// ---------------------------------------------------------------------------

async fn cmd_transition(database: Option<PathBuf>, edition_id: i64, transition: Transition) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, database).await?;
    let edition = storage.require_edition(edition_id).await?;

    let mut service = EditionServices::new(&storage).service(edition, transition);
    if !service.perform().await {
        let reason = service.failure_reason().unwrap_or("unknown failure");
        return Err(eyre!("edition {edition_id}: {reason}"));
    }

    let edition = service.edition();
    println!("Edition {} is now {}", edition.id, edition.state);
    if let Some(reconciliation) = service.reconciliation() {
        print_reconciliation(reconciliation);
    }
    Ok(())
}

async fn cmd_deps(database: Option<PathBuf>, edition_id: i64, refresh: bool) -> Result<()> {
    let config = load_config()?;
    let storage = if refresh {
        let storage = open_storage(&config, database).await?;
        let reconciliation = EditionDependenciesPopulator::new(&storage)
            .refresh(edition_id)
            .await?;
        print_reconciliation(&reconciliation);
        storage
    } else {
        open_storage_readonly(&config, database).await?
    };

    let edition = storage.require_edition(edition_id).await?;
    println!("{} ({} {})", edition.title, edition.kind, edition.id);
    print_dependencies(&storage, edition_id).await
}

async fn cmd_add_image(database: Option<PathBuf>, edition_id: i64, image: &Image) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, database).await?;
    let edition = storage.require_edition(edition_id).await?;
    storage.insert_image(edition.id, image).await?;

    let lead_image = LeadImage::load(&storage, edition.id).await?;
    println!("Image added to edition {}", edition.id);
    println!("  Lead image: {} ({})", lead_image.path, lead_image.alt_text);
    Ok(())
}

async fn cmd_show(database: Option<PathBuf>, edition_id: i64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config, database).await?;
    let edition = storage.require_edition(edition_id).await?;

    let organisations = storage.lead_organisations_for_edition(edition_id).await?;
    let lead_image = LeadImage::load(&storage, edition_id).await?;
    let related = storage.related_documents_for_edition(edition_id).await?;
    let primary_category = match edition.primary_mainstream_category_id {
        Some(id) => storage.find_mainstream_category(id).await?,
        None => None,
    };

    println!();
    println!("  {}", edition.title);
    println!("  ID:        {}", edition.id);
    println!("  Kind:      {}", edition.kind);
    println!("  State:     {}", edition.state);
    if let Some(summary) = &edition.summary {
        println!("  Summary:   {summary}");
    }
    if let Some(at) = edition.first_published_at {
        println!("  First published: {}", at.to_rfc3339());
    }
    if let Some(at) = edition.published_at {
        println!("  Published: {}", at.to_rfc3339());
    }
    let names: Vec<&str> = organisations.iter().map(|o| o.name.as_str()).collect();
    if !names.is_empty() {
        println!("  Organisations: {}", names.join(", "));
    }
    if let Some(category) = &primary_category {
        println!("  Category:  {} ({})", category.title, category.parent_tag);
    }
    if !related.is_empty() {
        let slugs: Vec<&str> = related.iter().map(|d| d.slug.as_str()).collect();
        println!("  Related:   {}", slugs.join(", "));
    }
    println!("  Lead image: {} ({})", lead_image.path, lead_image.alt_text);
    if let Some(caption) = &lead_image.caption {
        println!("  Caption:   {caption}");
    }
    println!();
    print_dependencies(&storage, edition_id).await
}

async fn print_dependencies(storage: &Storage, edition_id: i64) -> Result<()> {
    let contacts = storage.depended_upon_contacts(edition_id).await?;
    let editions = storage.depended_upon_editions(edition_id).await?;
    let dependents = storage
        .dependent_editions(Dependable::edition(edition_id))
        .await?;

    println!("  Depends on:");
    if contacts.is_empty() && editions.is_empty() {
        println!("    (nothing)");
    }
    for contact in &contacts {
        println!("    contact {}: {}", contact.id, contact.title);
    }
    for edition in &editions {
        println!("    {} {}: {} [{}]", edition.kind, edition.id, edition.title, edition.state);
    }

    println!("  Depended on by:");
    if dependents.is_empty() {
        println!("    (nothing)");
    }
    for edition in &dependents {
        println!("    {} {}: {} [{}]", edition.kind, edition.id, edition.title, edition.state);
    }
    Ok(())
}

fn print_reconciliation(reconciliation: &Reconciliation) {
    let list = |items: &[Dependable]| {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    if reconciliation.diff.is_empty() {
        println!("  Dependencies unchanged");
    } else {
        if !reconciliation.diff.to_insert.is_empty() {
            println!("  Added:   {}", list(&reconciliation.diff.to_insert));
        }
        if !reconciliation.diff.to_remove.is_empty() {
            println!("  Removed: {}", list(&reconciliation.diff.to_remove));
        }
    }
    if !reconciliation.cleared_dependents.is_empty() {
        println!(
            "  Cleared dependents: {:?}",
            reconciliation.cleared_dependents
        );
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_force_publish() {
        let cli = Cli::try_parse_from(["publisher", "--database", "tmp.db", "publish", "42", "--force"])
            .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("tmp.db")));
        assert!(matches!(
            cli.command,
            Command::Publish {
                edition_id: 42,
                force: true
            }
        ));
    }

    #[test]
    fn parses_image_with_caption() {
        let cli = Cli::try_parse_from([
            "publisher",
            "image",
            "7",
            "/uploads/image/1/budget.jpg",
            "--alt-text",
            "Chancellor",
            "--caption",
            "Budget day",
        ])
        .unwrap();
        match cli.command {
            Command::Image {
                edition_id,
                url,
                alt_text,
                caption,
            } => {
                assert_eq!(edition_id, 7);
                assert_eq!(url, "/uploads/image/1/budget.jpg");
                assert_eq!(alt_text, "Chancellor");
                assert_eq!(caption.as_deref(), Some("Budget day"));
            }
            _ => panic!("expected the image command"),
        }
    }

    #[test]
    fn database_flag_overrides_config() {
        let config = AppConfig::default();
        assert_eq!(database_path(&config, None), PathBuf::from("var/publisher.db"));
        assert_eq!(
            database_path(&config, Some(PathBuf::from("other.db"))),
            PathBuf::from("other.db")
        );
    }
}
