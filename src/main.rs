use anyhow::{Context, Result};
use pharmscraper::{
    config::{self, ColumnLayout, Settings},
    enrich::{self, EnrichOptions, HttpGeocoder},
    extract, fetch, output, PharmacyRecord,
};
use reqwest::Client;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");
    let start = Instant::now();

    // ─── 2) load configuration ───────────────────────────────────────
    let settings = Settings::from_env()?;
    let sources = config::load_sources(&settings.sources_path)?;
    let rewards = config::load_rewards(&settings.rewards_path)?;
    info!(
        sources = sources.len(),
        reward_tables = rewards.len(),
        "loaded configuration"
    );

    // ─── 3) fetch + extract every listing ────────────────────────────
    let client = Client::new();
    let layout = ColumnLayout::default();
    let mut pharmacies: Vec<PharmacyRecord> = Vec::new();

    for source in &sources {
        for locator in &source.excel_urls {
            info!(department = %source.department, url = %locator, "fetching listing");
            let sheets = fetch::fetch_spreadsheets(&client, locator).await?;
            for sheet in sheets {
                let found = extract::extract_pharmacies(&sheet.name, &sheet.bytes, &layout, source)
                    .with_context(|| format!("failed to extract pharmacies from {}", sheet.name))?;
                pharmacies.extend(found);
            }
        }
    }
    info!("{} pharmacies extracted in total", pharmacies.len());

    // ─── 4) geocode + score ──────────────────────────────────────────
    let geocoder = HttpGeocoder::new(client.clone(), settings.geocode_url.clone());
    let opts = EnrichOptions {
        concurrency: settings.geocode_concurrency,
        ..Default::default()
    };
    enrich::enrich_all(&mut pharmacies, &geocoder, &rewards, &opts).await?;

    // ─── 5) write output ─────────────────────────────────────────────
    output::write_json(&settings.output_path, &pharmacies)?;

    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}
