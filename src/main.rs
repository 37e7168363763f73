use anyhow::{bail, Result};
use nibrs_ratios::{config::Config, fetch, pipeline, reference::ReferenceTableCache, report};
use reqwest::Client;
use std::{env, path::PathBuf, sync::Arc};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage: nibrs-ratios <incident-level-file.tsv>";

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) the incident file is the only argument ───────────────────
    let args: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    let incident_path = match args.as_slice() {
        [path] => path.clone(),
        _ => bail!(USAGE),
    };
    if !incident_path.is_file() {
        bail!("incident file {} does not exist", incident_path.display());
    }

    // ─── 3) make sure the reference tables are cached locally ────────
    let config = Config::from_env()?;
    info!(data_dir = %config.data_dir.display(), "startup");
    let client = Client::new();
    let paths = fetch::ensure_reference_files(&client, &config).await?;
    let cache = Arc::new(ReferenceTableCache::new(paths));

    // ─── 4) stream the incident file on the blocking pool ────────────
    let start = Instant::now();
    let output = tokio::task::spawn_blocking({
        let cache = Arc::clone(&cache);
        let incident_path = incident_path.clone();
        move || pipeline::run(&incident_path, &cache)
    })
    .await??;
    info!(
        elapsed = ?start.elapsed(),
        counties = output.table.rows.len(),
        plottable = output.table.plottable().count(),
        "pipeline finished"
    );

    // ─── 5) report ───────────────────────────────────────────────────
    println!("{}", report::format_batch(&report::county_batch(&output.table)?)?);
    println!("{}", report::format_batch(&report::state_batch(&output.states)?)?);
    println!("{}", report::national_line(&output.table.national));
    println!("{}", report::fit_line(output.fit.as_ref()));

    Ok(())
}
