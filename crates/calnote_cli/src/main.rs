//! CLI entry point for local calendar stores.
//!
//! # Responsibility
//! - Verify `calnote_core` wiring against a real database file.
//! - Offer small maintenance commands (inspect a month, edit an entry,
//!   set a month comment, copy the previous month's patterns).
//! - Keep output deterministic `key=value` lines.

use calnote_core::{
    core_version, default_log_level, init_logging, load_config, parse_entry_date, CoreConfig,
    EntryPatch, HolidayProvider, Lifecycle, LocaleSubsystem, SettingsHooks, SqliteGateway,
    StateStore, YearMonth,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "calnote", version, about = "Local calendar note store utilities")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, value_name = "PATH", default_value = "calnote.toml")]
    config: PathBuf,
    /// Database file, overrides the config
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print store lifecycle and collection sizes
    Status,
    /// Print entries and metadata of one month
    Show(MonthArgs),
    /// Merge fields into one day entry
    SetEntry(SetEntryArgs),
    /// Set (or clear, with blank text) a month comment
    Comment(CommentArgs),
    /// Project the previous month's weekday patterns onto a month
    CopyPrev(MonthArgs),
}

#[derive(Args)]
struct MonthArgs {
    /// Month as YYYY-MM
    #[arg(long)]
    month: String,
}

#[derive(Args)]
struct SetEntryArgs {
    /// Date as YYYY-MM-DD
    #[arg(long)]
    date: String,
    #[arg(long)]
    text: Option<String>,
    #[arg(long, conflicts_with = "clear_symbol")]
    symbol: Option<String>,
    #[arg(long)]
    clear_symbol: bool,
    #[arg(long, conflicts_with = "clear_stamp")]
    stamp: Option<String>,
    #[arg(long)]
    clear_stamp: bool,
    /// Start time as HH:MM (empty string clears)
    #[arg(long)]
    from: Option<String>,
    /// End time as HH:MM (empty string clears)
    #[arg(long)]
    to: Option<String>,
}

#[derive(Args)]
struct CommentArgs {
    /// Month as YYYY-MM
    #[arg(long)]
    month: String,
    text: String,
}

/// Subsystems of a headless process: record the calls in the log only.
struct HeadlessSubsystems;

impl LocaleSubsystem for HeadlessSubsystems {
    fn set_language(&self, code: &str) {
        info!("event=locale_set module=cli status=ok language={code}");
    }
}

impl HolidayProvider for HeadlessSubsystems {
    fn init_region(&self, code: &str) {
        info!("event=holidays_init module=cli status=ok country={code}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error={message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let mut config = load_config(Some(&cli.config)).map_err(|err| err.to_string())?;
    if let Some(db) = cli.db {
        config.storage.db_path = Some(db);
    }
    start_logging(&config)?;

    let subsystems = Arc::new(HeadlessSubsystems);
    let store = StateStore::new(
        Arc::new(SqliteGateway::open_file(config.db_path())),
        SettingsHooks::with_subsystems(subsystems.clone(), subsystems),
        config.store_options(),
    );

    println!("calnote_core version={}", core_version());
    if store.initialize().await == Lifecycle::Degraded {
        let message = store
            .init_error()
            .map(|err| err.to_string())
            .unwrap_or_else(|| "initialization failed".to_string());
        return Err(message);
    }

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            let settings = store.settings();
            println!("lifecycle={:?}", store.lifecycle());
            println!("db_path={}", config.db_path().display());
            println!("entries={}", store.entry_count());
            println!("language={} country={}", settings.language, settings.country);
            println!("view={}", store.view());
        }
        Commands::Show(args) => {
            let month = parse_month(&args.month)?;
            print_month(&store, month);
        }
        Commands::SetEntry(args) => {
            let date = parse_entry_date(&args.date).map_err(|err| err.to_string())?;
            let patch = EntryPatch {
                text: args.text,
                symbol: tag_patch(args.symbol, args.clear_symbol),
                stamp: tag_patch(args.stamp, args.clear_stamp),
                time_from: args.from,
                time_to: args.to,
            };
            let entry = store
                .update_entry(date, patch)
                .await
                .map_err(|err| err.to_string())?;
            println!("saved={}", entry.date_key());
        }
        Commands::Comment(args) => {
            let month = parse_month(&args.month)?;
            store
                .update_month_comment(month.year(), month.month0(), &args.text)
                .await
                .map_err(|err| err.to_string())?;
            println!("comment_saved={month}");
        }
        Commands::CopyPrev(args) => {
            let month = parse_month(&args.month)?;
            store.set_view(month);
            let outcome = store
                .copy_from_previous_month()
                .await
                .map_err(|err| err.to_string())?;
            println!(
                "target={} days_written={}",
                outcome.target, outcome.days_written
            );
        }
    }
    Ok(())
}

fn start_logging(config: &CoreConfig) -> Result<(), String> {
    let Some(dir) = config.logging.dir.as_deref() else {
        return Ok(());
    };
    let level = config.logging.level.as_deref().unwrap_or(default_log_level());
    init_logging(level, dir).map_err(|err| err.to_string())
}

fn parse_month(value: &str) -> Result<YearMonth, String> {
    YearMonth::parse_key(value).ok_or_else(|| format!("invalid month `{value}`, expected YYYY-MM"))
}

fn tag_patch(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn print_month(store: &StateStore, month: YearMonth) {
    println!("month={month}");
    println!("theme={}", store.month_theme(month.year(), month.month0()));
    println!("grid_style={}", store.month_grid_style(month.year(), month.month0()));
    println!("comment={}", store.month_comment(month.year(), month.month0()));
    for entry in store.entries_in_month(month) {
        if !entry.has_content() {
            continue;
        }
        println!(
            "{} text={} symbol={} stamp={} from={} to={}",
            entry.date_key(),
            entry.text,
            entry.symbol.as_deref().unwrap_or("-"),
            entry.stamp.as_deref().unwrap_or("-"),
            entry.time_from,
            entry.time_to
        );
    }
}
