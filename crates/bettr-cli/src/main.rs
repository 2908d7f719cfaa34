use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bettr_core::activity::{replay, RecordedSegment};
use bettr_core::config::Settings;
use bettr_core::day::week_days;
use bettr_core::store::FileStore;
use bettr_core::{
    format_clock, format_hours, load_dashboard, rank_usage, run_report, AggregationStore,
    ColorBand, DailyRecord, GoalConfig, UsageMap,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

#[derive(Parser)]
#[command(name = "bettr")]
#[command(author, version, about = "Screen time history and goal inspection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Directory holding store namespaces")]
    store: Option<PathBuf>,

    #[arg(long, global = true, help = "App-group namespace name")]
    suite: Option<String>,

    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Aggregate a recorded activity dump into the shared history")]
    Report {
        #[arg(long, help = "JSON file with recorded activity segments")]
        segments: PathBuf,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    #[command(about = "Show the merged daily history")]
    History {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    #[command(about = "Show the latest stored snapshot")]
    Latest {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    #[command(about = "Show legacy per-run snapshots (read-only unless --rescan)")]
    Legacy {
        #[arg(long, help = "Output as JSON")]
        json: bool,
        #[arg(long, help = "Rescan the namespace and rebuild the legacy manifest")]
        rescan: bool,
    },
    #[command(about = "Show or set the daily goal")]
    Goal {
        #[arg(long, help = "New goal in hours")]
        set: Option<f64>,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    #[command(about = "Show progress against the goal and the weekly average")]
    Progress {
        #[arg(long, help = "Day to evaluate (YYYY-MM-DD), defaults to today")]
        date: Option<String>,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let store = open_store(cli.store, cli.suite)?;

    match cli.command {
        Commands::Report { segments, json } => run_report_command(&store, segments, json),
        Commands::History { json } => run_history_command(&store, json),
        Commands::Latest { json } => run_latest_command(&store, json),
        Commands::Legacy { json, rescan } => run_legacy_command(&store, json, rescan),
        Commands::Goal { set, json } => run_goal_command(&store, set, json),
        Commands::Progress { date, json } => run_progress_command(&store, date, json),
    }
}

fn init_logging(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        Some(EnvFilter::new("debug"))
    } else {
        std::env::var("RUST_LOG").ok().map(EnvFilter::new)
    };

    if let Some(filter) = filter {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn open_store(
    store_dir: Option<PathBuf>,
    suite: Option<String>,
) -> Result<AggregationStore<FileStore>> {
    let settings = Settings::load();
    let base = store_dir.unwrap_or_else(|| settings.store_base_dir());
    let suite = suite.unwrap_or(settings.suite_name);
    let kv = FileStore::open_suite(&base, &suite)
        .with_context(|| format!("Could not open store {}", base.join(&suite).display()))?;
    Ok(AggregationStore::new(kv))
}

fn run_report_command(
    store: &AggregationStore<FileStore>,
    segments_path: PathBuf,
    json: bool,
) -> Result<()> {
    use tokio::runtime::Runtime;

    let content = fs::read_to_string(&segments_path)
        .with_context(|| format!("Could not read {}", segments_path.display()))?;
    let segments: Vec<RecordedSegment> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid activity dump {}", segments_path.display()))?;

    let rt = Runtime::new()?;
    let outcome = rt.block_on(run_report(store, replay(segments), Local::now()));

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);
        return Ok(());
    }

    let today = outcome.today();
    println!(
        "{} {} ({})",
        today.day,
        format_hours(today.total_hours),
        format_clock(outcome.snapshot.total_seconds)
    );
    print_usage_table("App", &today.app_usage);
    print_usage_table("Category", &outcome.snapshot.category_usage);
    println!("\nHistory: {} days", outcome.snapshot.history.len());

    if !outcome.history_written || !outcome.snapshot_written {
        eprintln!("{}", "  Warning: report was not fully persisted".yellow());
    }
    println!(
        "{}",
        format!("  Processing time: {}ms", outcome.processing_time_ms).bright_black()
    );
    Ok(())
}

fn run_history_command(store: &AggregationStore<FileStore>, json: bool) -> Result<()> {
    let history = store.read_history();

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No daily history stored");
        return Ok(());
    }
    print_history_table(&history);
    Ok(())
}

fn run_latest_command(store: &AggregationStore<FileStore>, json: bool) -> Result<()> {
    let Some(snapshot) = store.read_snapshot() else {
        if json {
            println!("null");
        } else {
            println!("No snapshot stored");
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "{}: {} ({})",
        snapshot.day,
        format_hours(snapshot.total_hours),
        format_clock(snapshot.total_seconds)
    );
    print_usage_table("App", &snapshot.app_usage);
    print_usage_table("Category", &snapshot.category_usage);
    if !snapshot.history.is_empty() {
        println!();
        print_history_table(&snapshot.history);
    }
    Ok(())
}

fn run_legacy_command(store: &AggregationStore<FileStore>, json: bool, rescan: bool) -> Result<()> {
    let snapshots = if rescan {
        store.rebuild_legacy_manifest();
        store.read_legacy_snapshots()
    } else {
        store.peek_legacy_snapshots()
    };

    if json {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct LegacyJson {
            key: String,
            date: Option<NaiveDate>,
            total_hours: f64,
            total_seconds: f64,
            app_usage: UsageMap,
            category_usage: UsageMap,
        }

        let output: Vec<LegacyJson> = snapshots
            .into_iter()
            .map(|s| LegacyJson {
                key: s.key,
                date: s.day,
                total_hours: s.total_hours,
                total_seconds: s.total_seconds,
                app_usage: s.app_usage,
                category_usage: s.category_usage,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No legacy snapshots found");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Key", "Date", "Total", "Apps"]);
    for snapshot in &snapshots {
        table.add_row(vec![
            snapshot.key.clone(),
            snapshot
                .day
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            format_hours(snapshot.total_hours),
            snapshot.app_usage.len().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn run_goal_command(store: &AggregationStore<FileStore>, set: Option<f64>, json: bool) -> Result<()> {
    if let Some(hours) = set {
        store
            .write_goal(&GoalConfig::new(hours))
            .context("Could not save goal")?;
    }
    let goal = store.read_goal();

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        println!("Daily goal: {}", format_hours(goal.threshold_hours));
    }
    Ok(())
}

fn run_progress_command(
    store: &AggregationStore<FileStore>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let today = match date {
        Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{text}', expected YYYY-MM-DD"))?,
        None => Local::now().date_naive(),
    };
    week_days(today)
        .with_context(|| format!("Date {today} is outside the supported calendar range"))?;
    let dashboard = load_dashboard(store, today);

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    let progress = &dashboard.progress;
    let percent = format!("{:.0}%", progress.progress_ratio * 100.0);
    println!(
        "{}: {} of {} goal ({}, {})",
        today,
        format_hours(progress.total_hours),
        format_hours(progress.threshold_hours),
        paint_band(&percent, progress.color_band),
        paint_band(progress.color_band.as_str(), progress.color_band),
    );
    if progress.exceeded_goal {
        println!("{}", "  Goal exceeded".red());
    } else if progress.approaching_goal {
        println!("{}", "  Approaching goal".yellow());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Day", "Date", "Usage"]);
    for point in &dashboard.week.points {
        table.add_row(vec![
            point.day.format("%a").to_string(),
            point.day.to_string(),
            format_hours(point.total_hours),
        ]);
    }
    println!("{table}");

    let average = format!("Week average: {}", format_hours(dashboard.week.average_hours));
    if dashboard.week.within_goal {
        println!("{}", average.green());
    } else {
        println!("{}", average.red());
    }
    Ok(())
}

fn paint_band(text: &str, band: ColorBand) -> colored::ColoredString {
    match band {
        ColorBand::Green => text.green(),
        ColorBand::Yellow => text.yellow(),
        ColorBand::Red => text.red(),
    }
}

fn print_usage_table(label: &str, usage: &UsageMap) {
    if usage.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![label, "Usage", "Hours"]);
    for bar in rank_usage(usage) {
        table.add_row(vec![
            bar.label,
            format_hours(bar.hours),
            format!("{:.2}", bar.hours),
        ]);
    }
    println!("{table}");
}

fn print_history_table(history: &[DailyRecord]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Date", "Total", "Top app"]);
    for record in history {
        let top = rank_usage(&record.app_usage)
            .into_iter()
            .next()
            .map(|bar| format!("{} ({})", bar.label, format_hours(bar.hours)))
            .unwrap_or_default();
        table.add_row(vec![
            record.day.to_string(),
            format_hours(record.total_hours),
            top,
        ]);
    }
    println!("{table}");
}
