//! Historian demo driver
//!
//! Runs the full query repertoire against a seeded in-memory historian:
//! interpolated reads (fixed step and explicit times), raw reads (range
//! and by count), a wildcard tag search feeding a multi-tag interpolated
//! query with a server-side filter, an hourly average summary, and the
//! unit-of-measure listing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use historian_client::{
    display_units, CompareOp, Config, Connection, FilterExpr, MemoryHistorian, QueryEngine,
    Sample, SummarySpec, TagResolver, TimeRange, UnitOfMeasure, Value, ValueFormatter,
};
use historian_client::{ClientResult, Direction};

#[derive(Parser, Debug)]
#[command(name = "historian-demo", about = "Historian query client demo")]
struct Args {
    /// Path to a TOML config file (default locations are tried otherwise)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tag to query
    #[arg(long, default_value = "BC.HCLCONV.FIC1420.MODE")]
    tag: String,

    /// Wildcard filter for the tag search
    #[arg(long, default_value = "*.MODE")]
    filter: String,

    /// Seconds between interpolated samples
    #[arg(long, default_value_t = 600)]
    interval_secs: i64,

    /// Query window, hours back from now
    #[arg(long, default_value_t = 24)]
    window_hours: i64,

    /// Print a default config file and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", historian_client::config::generate_default_config());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| format!("historian_client={}", config.logging.level)),
    );
    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Historian client demo v{}", env!("CARGO_PKG_VERSION"));

    let backend = seeded_backend(&config, &args.tag);
    let mut conn = Connection::new(config.clone(), backend);
    let fmt = ValueFormatter::new(&config.display);

    let range = TimeRange::last_hours(args.window_hours);
    let interval = Duration::seconds(args.interval_secs);

    let tag = TagResolver::new(&mut conn).resolve(&args.tag)?;
    tracing::info!(path = %tag.path(), "resolved tag");

    // Interpolated query with a fixed step
    let result = QueryEngine::new(&mut conn).interpolated(&tag, range, interval);
    print_samples(&fmt, "interpolated (fixed step)", result);

    // Interpolated query at explicit times, newest first
    let now = Utc::now();
    let times = vec![
        now,
        now - Duration::hours(1),
        now - Duration::hours(12),
        now - Duration::days(1),
    ];
    let result = QueryEngine::new(&mut conn).interpolated_at_times(&tag, &times);
    print_samples(&fmt, "interpolated (explicit times)", result);

    // Raw values inside the window
    let result = QueryEngine::new(&mut conn).raw_range(&tag, range);
    print_samples(&fmt, "raw (range)", result);

    // A bounded number of raw values walking forward from the window start
    let result = QueryEngine::new(&mut conn).raw_by_count(&tag, range.start, 30, Direction::Forward);
    print_samples(&fmt, "raw (by count)", result);

    // Wildcard tag search feeding a multi-tag interpolated query; negative
    // values are filtered out server-side before interpolation
    let tags = TagResolver::new(&mut conn).find_by_filter(&args.filter, "")?;
    tracing::info!(filter = %args.filter, matches = tags.len(), "tag search");

    let exclude_negative = FilterExpr::exclude(CompareOp::Lt, 0.0);
    let per_tag = QueryEngine::new(&mut conn)
        .interpolated_multi(&tags, range, interval, Some(&exclude_negative));
    print_multi(&fmt, per_tag);

    // Hourly average, time-weighted, stamped at the bucket start
    let result = QueryEngine::new(&mut conn).summary(&tag, range, &SummarySpec::hourly_average());
    print_samples(&fmt, "hourly average", result);

    // Units of measure live on the system, not the database
    let units = conn.units_of_measure()?;
    for unit in display_units(&units) {
        println!(
            "Unit of measurement: {}, Abbreviation: {}, Class: {}, Description: {}",
            unit.name, unit.abbreviation, unit.class, unit.description
        );
    }

    conn.disconnect();
    Ok(())
}

/// In-memory historian seeded with a day of demo data
fn seeded_backend(config: &Config, mode_tag: &str) -> MemoryHistorian {
    let mut backend = MemoryHistorian::new(
        &config.historian.server_name,
        &config.historian.database_name,
    );

    let now = Utc::now();
    let modes = [(0, "AUTO"), (1, "MANUAL"), (2, "CASCADE")];

    backend.add_tag(mode_tag, "scan1");
    backend.add_tag("BC.CHLOR.MC2_LOAD.PV", "scan1");
    backend.add_tag("BC.VCM.CAL24DIFF2CPV3.PV", "calc");

    // One recorded sample every 10 minutes for the past day
    for i in 0..144 {
        let ts = now - Duration::minutes(10 * (144 - i));

        let (code, label) = modes[(i / 48) as usize % modes.len()];
        backend.record(
            mode_tag,
            ts,
            Value::Categorical {
                code,
                label: label.to_string(),
            },
        );

        let phase = i as f64 * std::f64::consts::PI / 72.0;
        backend.record("BC.CHLOR.MC2_LOAD.PV", ts, Value::Float(50.0 + 20.0 * phase.sin()));
        // A differential that dips negative, for the filter demo
        backend.record(
            "BC.VCM.CAL24DIFF2CPV3.PV",
            ts,
            Value::Float(5.0 * (phase * 3.0).cos()),
        );
    }

    backend.add_unit(UnitOfMeasure::new("degree Celsius", "°C", "Temperature"));
    backend.add_unit(UnitOfMeasure::new("bar", "bar", "Pressure").description("absolute pressure"));
    backend.add_unit(UnitOfMeasure::new("furlong", "fur", "Length").deleted());

    backend
}

/// Print a query result, keeping the failed and empty cases distinct
fn print_samples(fmt: &ValueFormatter, label: &str, result: ClientResult<Vec<Sample>>) {
    println!("--- {} ---", label);
    match result {
        Err(err) => {
            tracing::warn!(error = %err, "query failed");
            println!("Query failed: {}. Check tag name and query parameters!", err);
        }
        Ok(samples) if samples.is_empty() => {
            println!("Query succeeded but returned no data in range.");
        }
        Ok(samples) => {
            for sample in &samples {
                println!("{}", fmt.format_sample(sample));
            }
        }
    }
}

fn print_multi(fmt: &ValueFormatter, result: ClientResult<BTreeMap<String, Vec<Sample>>>) {
    match result {
        Err(err) => {
            tracing::warn!(error = %err, "multi-tag query failed");
            println!("Query failed: {}. Check tag names and query parameters!", err);
        }
        Ok(per_tag) => {
            for (tag, samples) in per_tag {
                print_samples(fmt, &format!("interpolated multi: {}", tag), Ok(samples));
            }
        }
    }
}
