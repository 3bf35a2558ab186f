use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Parser};
use serde::Serialize;
use serde_json::Value;
use ticket_forecast::{
    config::{validate_degree, MAX_DEGREE},
    ml::forecasting::{
        compute_bounded_forecast_report, DayBucket, ForecastReport, DEFAULT_DEGREE,
        DEFAULT_MAX_SPAN_DAYS,
    },
    models::decode_ticket_batch,
};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "ticket-forecast-cli",
    about = "Forecast daily ticket volume from a JSON batch of ticket records",
    version
)]
struct Cli {
    /// JSON file with the ticket batch, or `-` for stdin
    #[arg(long, short)]
    input: String,

    /// Polynomial degree of the trend fit
    #[arg(long, short, default_value_t = DEFAULT_DEGREE)]
    degree: usize,

    /// Ignore records older than this many days before the reference date
    #[arg(long, default_value_t = DEFAULT_MAX_SPAN_DAYS)]
    max_span_days: u64,

    /// Reference date (YYYY-MM-DD); defaults to the current UTC date
    #[arg(long)]
    today: Option<NaiveDate>,

    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Render the full report as pretty JSON"
    )]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    ticket_forecast::config::init_tracing("warn", false);

    validate_degree(cli.degree)
        .map_err(|_| anyhow!("degree must be between 0 and {}", MAX_DEGREE))?;

    let raw = read_input(&cli.input)?;
    let batch: Value = serde_json::from_str(&raw).context("input is not valid JSON")?;
    let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());
    debug!(%today, degree = cli.degree, "computing forecast");

    let records = decode_ticket_batch(batch)?;
    let report = compute_bounded_forecast_report(&records, cli.degree, today, cli.max_span_days);

    if cli.json {
        print_json(&report)?;
    } else {
        render_report(&report);
    }

    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read ticket batch from stdin")?;
        Ok(buf)
    } else {
        let path = PathBuf::from(input);
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read ticket batch from {}", path.display()))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_report(report: &ForecastReport) {
    println!(
        "Forecast as of {} • {} of {} records used ({} invalid, {} future-dated, {} too old)",
        report.today,
        report.accepted_records,
        report.total_records,
        report.invalid_records,
        report.future_dated_records,
        report.out_of_span_records
    );

    match &report.fit {
        Some(fit) => println!(
            "Fit: degree {} via {:?} • coefficients {:?}",
            fit.degree, fit.method, fit.coefficients
        ),
        None => println!("Fit: not enough observed days to forecast"),
    }

    if report.series.is_empty() {
        println!("No tickets on or before {}", report.today);
        return;
    }

    println!();
    println!("{:<12} {:>8} {:>10}", "date", "actual", "predicted");
    for bucket in &report.series {
        println!("{}", render_bucket(bucket));
    }
}

fn render_bucket(bucket: &DayBucket) -> String {
    let show = |count: Option<u64>| count.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
    format!(
        "{:<12} {:>8} {:>10}",
        bucket.date.to_string(),
        show(bucket.actual_count),
        show(bucket.predicted_count)
    )
}
