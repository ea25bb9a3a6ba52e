//! Command-line front-end: log in, fetch a consumption snapshot and the
//! alert settings, print a short summary.

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use veolia_client::VeoliaClient;

#[derive(Debug, Parser)]
#[command(name = "veolia", about = "Fetch water consumption and alert settings")]
struct Cli {
    /// Account email address.
    #[arg(long, env = "VEOLIA_USERNAME")]
    username: String,

    /// Account password.
    #[arg(long, env = "VEOLIA_PASSWORD", hide_env_values = true)]
    password: String,

    /// Year to fetch; defaults to the current year.
    #[arg(long)]
    year: Option<i32>,

    /// Month to fetch daily readings for; defaults to the current month.
    #[arg(long)]
    month: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let now = chrono::Utc::now();
    let year = cli.year.unwrap_or_else(|| now.year());
    let month = cli.month.unwrap_or_else(|| now.month());

    let mut client =
        VeoliaClient::new(cli.username, cli.password).context("building the API client")?;

    info!(year, month, "fetching account data");
    client
        .fetch_all_data(year, month)
        .await
        .context("fetching account data")?;

    let account = &client.account_data;
    let daily_points = account
        .daily_consumption
        .as_ref()
        .and_then(|v| v.as_array().map(Vec::len))
        .unwrap_or(0);
    let monthly_points = account
        .monthly_consumption
        .as_ref()
        .and_then(|v| v.as_array().map(Vec::len))
        .unwrap_or(0);

    println!("meter {}", account.meter_number.as_deref().unwrap_or("-"));
    println!("daily readings:   {daily_points}");
    println!("monthly readings: {monthly_points}");
    if let Some(alerts) = &account.alert_settings {
        println!(
            "daily alert:   {}",
            if alerts.daily_enabled {
                format!("enabled ({} L)", alerts.daily_threshold.unwrap_or(0))
            } else {
                "disabled".to_string()
            }
        );
        println!(
            "monthly alert: {}",
            if alerts.monthly_enabled {
                format!("enabled ({} m3)", alerts.monthly_threshold.unwrap_or(0))
            } else {
                "disabled".to_string()
            }
        );
    }

    Ok(())
}
