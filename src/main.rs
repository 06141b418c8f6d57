//! GPU Scout main entry point
//!
//! This is the command-line interface for the GPU Scout forum marketplace watcher.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gpu_scout::config::{load_config_with_hash, Config};
use gpu_scout::driver::HttpPageDriver;
use gpu_scout::model::{AlertType, Currency};
use gpu_scout::output::{
    format_listing_table, generate_markdown_summary, generate_summary, load_statistics,
    print_statistics,
};
use gpu_scout::pipeline::{DedupStore, Pipeline};
use gpu_scout::scrape::{
    PaginationController, ProgressReporter, ScrapeOptions, ScrapeResult, SiteProfile, StopSignal,
};
use gpu_scout::storage::{
    AlertSource, ListingFilter, ListingSort, ListingStore, RunStatus, RunSummary, SqliteStorage,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// GPU Scout: a forum marketplace watcher
///
/// GPU Scout walks the "for sale" section of a classifieds forum, extracts
/// GPU models and prices from each post, stores them without duplicates and
/// reports listings that match standing price alerts.
#[derive(Parser, Debug)]
#[command(name = "gpu-scout")]
#[command(version)]
#[command(about = "A forum marketplace watcher for GPU listings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape the forum and store new listings
    Scrape {
        /// Override the configured number of listing pages
        #[arg(long)]
        max_pages: Option<u32>,

        /// Print the scrape result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show per-model price statistics
    Stats,

    /// Query stored listings
    Listings {
        /// Model fragment, e.g. "3070" or "rx 6800"
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        /// €, AH or OK
        #[arg(long, value_parser = parse_currency)]
        currency: Option<Currency>,

        /// newest, oldest, price-asc, price-desc or model
        #[arg(long, value_parser = parse_sort, default_value = "newest")]
        sort: ListingSort,

        #[arg(long)]
        limit: Option<usize>,

        /// Print listings as JSON
        #[arg(long)]
        json: bool,
    },

    /// List urls stored more than once
    Duplicates,

    /// Delete duplicate listings, keeping the earliest of each url
    RemoveDuplicates,

    /// Delete every stored listing
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Manage standing price alerts
    Alerts {
        #[command(subcommand)]
        action: AlertAction,
    },

    /// Generate the markdown report from stored data
    ExportSummary,

    /// Validate the config and show what a scrape would visit
    DryRun,
}

#[derive(Subcommand, Debug)]
enum AlertAction {
    /// Show standing alerts
    List,

    /// Add an alert
    Add {
        #[arg(long)]
        user: String,

        /// GPU model to watch, e.g. "RTX 3070"
        #[arg(long)]
        model: String,

        /// below, above or exact
        #[arg(long = "type", value_parser = parse_alert_type)]
        alert_type: AlertType,

        #[arg(long)]
        target: f64,

        #[arg(long, value_parser = parse_currency, default_value = "€")]
        currency: Currency,
    },

    /// Remove an alert by id
    Remove { id: i64 },
}

fn parse_currency(s: &str) -> Result<Currency, String> {
    Currency::parse(s).ok_or_else(|| format!("unknown currency '{}' (expected €, AH or OK)", s))
}

fn parse_sort(s: &str) -> Result<ListingSort, String> {
    ListingSort::parse(s).ok_or_else(|| {
        format!(
            "unknown sort '{}' (expected newest, oldest, price-asc, price-desc or model)",
            s
        )
    })
}

fn parse_alert_type(s: &str) -> Result<AlertType, String> {
    AlertType::from_db_string(s)
        .ok_or_else(|| format!("unknown alert type '{}' (expected below, above or exact)", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Command::Scrape { max_pages, json } => {
            handle_scrape(config, &config_hash, max_pages, json).await
        }
        Command::Stats => handle_stats(&config),
        Command::Listings {
            model,
            min_price,
            max_price,
            currency,
            sort,
            limit,
            json,
        } => {
            let filter = ListingFilter {
                model,
                min_price,
                max_price,
                currency,
            };
            handle_listings(&config, &filter, sort, limit, json)
        }
        Command::Duplicates => handle_duplicates(&config),
        Command::RemoveDuplicates => handle_remove_duplicates(&config),
        Command::Clear { yes } => handle_clear(&config, yes),
        Command::Alerts { action } => handle_alerts(&config, action),
        Command::ExportSummary => handle_export_summary(&config),
        Command::DryRun => handle_dry_run(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so that `--json` output on stdout stays parseable.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gpu_scout=info,warn"),
            1 => EnvFilter::new("gpu_scout=debug,info"),
            2 => EnvFilter::new("gpu_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.output.database_path);
    SqliteStorage::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the scrape command: runs the state machine and persists each page
async fn handle_scrape(
    config: Config,
    config_hash: &str,
    max_pages: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let mut options = ScrapeOptions::from_config(&config.scraper);
    if let Some(max_pages) = max_pages {
        options.max_pages = max_pages;
    }
    options.validate()?;

    let profile = SiteProfile::from_config(&config)?;
    let mut driver = HttpPageDriver::from_config(&config)?;

    let mut storage = open_database(&config)?;
    let run_id = storage.create_run(config_hash)?;
    tracing::info!(
        "Starting run {} over at most {} pages of {}",
        run_id,
        options.max_pages,
        profile.listing_url
    );

    // Ctrl-C asks the run to stop at its next checkpoint
    let stop = StopSignal::new();
    let interrupt = {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current thread");
                stop.stop();
            }
        })
    };

    let (reporter, mut stream) = ProgressReporter::channel();
    let printer = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            if !json {
                println!("» {}", message);
            }
        }
    });

    let mut pipeline = Pipeline::new(storage);
    let result = {
        let controller = PaginationController::new(&profile, options)
            .with_progress(reporter)
            .with_stop_signal(stop);
        controller.run(&mut driver, &mut pipeline).await
    };

    interrupt.abort();
    if let Err(e) = printer.await {
        tracing::debug!("Progress printer ended abnormally: {}", e);
    }

    let (mut storage, report) = pipeline.into_parts();
    let summary = RunSummary {
        pages: result.processed_pages,
        threads: result.processed_threads,
        listings: result.total_listings as u32,
        saved: report.saved as u32,
        error: result.error.clone(),
    };
    storage.finish_run(run_id, run_status(&result), &summary)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!("=== Scrape Result ===\n");
        println!("  Pages processed:   {}", result.processed_pages);
        println!("  Threads processed: {}", result.processed_threads);
        println!("  Listings found:    {}", result.total_listings);
        println!("  Saved:             {}", report.saved);
        println!("  Duplicates:        {}", report.duplicates);
        if !report.errors.is_empty() {
            println!("  Save errors:       {}", report.errors.len());
            for failure in &report.errors {
                println!("    - {}: {}", failure.url, failure.message);
            }
        }

        if !report.triggered.is_empty() {
            println!("\nTriggered alerts:");
            for hit in &report.triggered {
                println!(
                    "  #{} ({}) {} {} {:.2}: {} at {:.2}{} {}",
                    hit.alert.id,
                    hit.alert.user_id,
                    hit.alert.gpu_model,
                    hit.alert.alert_type,
                    hit.alert.target_price,
                    hit.listing.model,
                    hit.listing.price,
                    hit.listing.currency,
                    hit.listing.url
                );
            }
        }
    }

    if let Some(error) = &result.error {
        bail!("Scrape failed: {}", error);
    }
    Ok(())
}

fn run_status(result: &ScrapeResult) -> RunStatus {
    match (result.success, result.partial_results) {
        (false, _) => RunStatus::Failed,
        (true, Some(true)) => RunStatus::Interrupted,
        (true, _) => RunStatus::Completed,
    }
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    if let Some(run) = storage.get_latest_run()? {
        println!(
            "\nLast run #{} ({}): started {}, {} listings found, {} saved",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.listings,
            run.saved
        );
    }

    Ok(())
}

fn handle_listings(
    config: &Config,
    filter: &ListingFilter,
    sort: ListingSort,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let listings = storage.query_listings(filter, sort, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
    } else if listings.is_empty() {
        println!("No listings match.");
    } else {
        print!("{}", format_listing_table(&listings));
        println!("\n{} listing(s)", listings.len());
    }

    Ok(())
}

fn handle_duplicates(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let groups = DedupStore::new(&mut storage).find_duplicate_groups()?;

    if groups.is_empty() {
        println!("✓ No duplicate listings");
        return Ok(());
    }

    println!("{} url(s) stored more than once:\n", groups.len());
    for group in &groups {
        println!("{} ({} copies)", group.url, group.records.len());
        for record in &group.records {
            println!(
                "  id {} scraped {} {} {:.2}{}",
                record.id,
                record.scraped_at.format("%Y-%m-%d %H:%M"),
                record.model,
                record.price,
                record.currency
            );
        }
    }

    Ok(())
}

fn handle_remove_duplicates(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let report = DedupStore::new(&mut storage).remove_duplicates()?;

    println!(
        "✓ Removed {} duplicate listing(s) across {} url(s)",
        report.removed, report.groups
    );
    if !report.unique_index {
        println!("! The unique url index could not be restored");
    }

    Ok(())
}

fn handle_clear(config: &Config, yes: bool) -> anyhow::Result<()> {
    if !yes {
        bail!("Refusing to delete all listings without --yes");
    }

    let mut storage = open_database(config)?;
    let removed = DedupStore::new(&mut storage).clear_all()?;
    println!("✓ Deleted {} listing(s)", removed);

    Ok(())
}

fn handle_alerts(config: &Config, action: AlertAction) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;

    match action {
        AlertAction::List => {
            let alerts = storage.list_standing_alerts()?;
            if alerts.is_empty() {
                println!("No standing alerts.");
            }
            for alert in &alerts {
                println!(
                    "#{:<4} {:<12} {:<16} {:<6} {:>9.2}{}",
                    alert.id,
                    alert.user_id,
                    alert.gpu_model,
                    alert.alert_type,
                    alert.target_price,
                    alert.currency
                );
            }
        }
        AlertAction::Add {
            user,
            model,
            alert_type,
            target,
            currency,
        } => {
            if !(target > 0.0) {
                bail!("Target price must be positive, got {}", target);
            }
            let id = storage.insert_alert(&user, &model, currency, alert_type, target)?;
            println!("✓ Added alert #{}", id);
        }
        AlertAction::Remove { id } => {
            if !storage.delete_alert(id)? {
                bail!("No alert with id {}", id);
            }
            println!("✓ Removed alert #{}", id);
        }
    }

    Ok(())
}

/// Handles the export-summary command: generates the markdown report
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Market Report ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_database(config)?;

    tracing::info!("Loading listings from database...");
    let summary = generate_summary(&storage)?;

    tracing::info!("Generating markdown report...");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    println!("✓ Report exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the dry-run command: validates config and shows what would be visited
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let options = ScrapeOptions::from_config(&config.scraper);
    options.validate()?;
    let profile = SiteProfile::from_config(config)?;

    println!("=== GPU Scout Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Max pages: {}", options.max_pages);
    println!("  Max threads per page: {}", options.max_threads_per_page);
    println!("  Page size: {}", config.scraper.page_size);
    println!(
        "  Timeouts: navigation {}s, selector {}s",
        config.scraper.navigation_timeout_secs, config.scraper.selector_timeout_secs
    );

    println!("\nForum:");
    println!("  Category: {}", config.forum.category);
    println!("  Row selector: {}", config.forum.row_selector);
    println!("  Post selectors: {}", config.forum.post_selectors.join(", "));
    match &config.login {
        Some(login) => println!(
            "  Login: {} as {} (password from ${})",
            login.url, login.username, login.password_env
        ),
        None => println!("  Login: none"),
    }

    println!("\nUser Agent:");
    println!(
        "  {}/{} (+{})",
        config.user_agent.name, config.user_agent.version, config.user_agent.contact_url
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nListing pages:");
    for page in 1..=options.max_pages {
        println!("  {:>2}. {}", page, profile.listing_page_url(page));
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}
