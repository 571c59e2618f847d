use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fb_post_spend::report::{DebugArtifact, ReportMeta};
use fb_post_spend::{
    DEFAULT_GRAPH_VERSION, DEFAULT_PAGE_ID, GraphClient, RunStats, SpendCache, attribution,
    fetch_ads, fetch_posts, normalize_ad_account_id, parse_date_to_unix, report,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEBUG_ARTIFACT_PATH: &str = "spend_debug.json";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = DEFAULT_PAGE_ID)]
    page_id: String,

    /// Ad account id ('123' or 'act_123'); falls back to the AD_ACCOUNT_ID
    /// environment variable. Without one, every post reports 0.00 spend.
    #[arg(long)]
    ad_account_id: Option<String>,

    #[arg(long, default_value = "2026-01-01")]
    since: String,

    #[arg(long, default_value = "2026-01-31")]
    until: String,

    #[arg(long, default_value = DEFAULT_GRAPH_VERSION)]
    graph_version: String,

    #[arg(short, long, default_value = "fb_post_spend_report.csv")]
    output: PathBuf,

    /// Verbose logging plus a debug JSON artifact next to the report.
    #[arg(long)]
    debug: bool,
}

struct RunConfig {
    page_id: String,
    ad_account_id: Option<String>,
    since: String,
    until: String,
    since_unix: i64,
    until_unix: i64,
    graph_version: String,
    output: PathBuf,
    debug: bool,
    access_token: String,
}

impl RunConfig {
    fn from_cli(cli: Cli) -> Result<Self> {
        let access_token = std::env::var("FB_PAGE_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .context("FB_PAGE_ACCESS_TOKEN environment variable is required")?;

        let since_unix = parse_date_to_unix(&cli.since)?;
        let until_unix = parse_date_to_unix(&cli.until)?;

        let raw_account_id = cli
            .ad_account_id
            .or_else(|| std::env::var("AD_ACCOUNT_ID").ok());
        let ad_account_id = normalize_ad_account_id(raw_account_id.as_deref())?;

        Ok(Self {
            page_id: cli.page_id,
            ad_account_id,
            since: cli.since,
            until: cli.until,
            since_unix,
            until_unix,
            graph_version: cli.graph_version,
            output: cli.output,
            debug: cli.debug,
            access_token,
        })
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(2);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(config: RunConfig) -> Result<()> {
    let client = GraphClient::new(&config.access_token)?;

    let posts = fetch_posts(
        &client,
        &config.graph_version,
        &config.page_id,
        config.since_unix,
        config.until_unix,
    )
    .await
    .context("fetching page posts")?;

    let mut stats = RunStats {
        posts_fetched: posts.len(),
        ..Default::default()
    };
    info!("fetched {} posts for page {}", posts.len(), config.page_id);

    let mut cache = SpendCache::new();
    let mut mapping = BTreeMap::new();

    match &config.ad_account_id {
        None => warn!("ad account id missing or placeholder; every post will report 0.00 spend"),
        Some(account_id) => {
            let ads = fetch_ads(&client, &config.graph_version, account_id)
                .await
                .context("fetching account ads")?;

            mapping = attribution::map_ads_to_posts(&posts, &ads, &mut stats);
            info!(
                "scanned {} ads, matched {} posts",
                stats.ads_scanned, stats.posts_matched_to_ads
            );

            let ad_ids = attribution::unique_ad_ids(&mapping);
            let pb = ProgressBar::new(ad_ids.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")?
                    .progress_chars("##-"),
            );

            for ad_id in &ad_ids {
                pb.set_message(format!("ad {ad_id}"));
                cache
                    .get(
                        &client,
                        &config.graph_version,
                        ad_id,
                        &config.since,
                        &config.until,
                    )
                    .await
                    .with_context(|| format!("fetching insights for ad {ad_id}"))?;
                pb.inc(1);
            }
            pb.finish_with_message("spend fetch complete");
        }
    }

    let totals = attribution::spend_by_post(&posts, &mapping, &cache);
    let rows = report::build_rows(&posts, &mapping, &totals);
    let meta = ReportMeta {
        since: &config.since,
        until: &config.until,
        graph_version: &config.graph_version,
    };
    report::write_csv(&config.output, &rows, &meta)
        .with_context(|| format!("writing report to {}", config.output.display()))?;
    info!(
        "wrote CSV report: {} ({} rows)",
        config.output.display(),
        rows.len()
    );

    if config.debug {
        let artifact = DebugArtifact {
            graph_version: &config.graph_version,
            page_id: &config.page_id,
            ad_account_id: config.ad_account_id.as_deref(),
            counts: &stats,
            sample_mappings: DebugArtifact::sample_mappings(&mapping),
            sample_spend_responses: cache.samples(),
        };
        report::write_debug_artifact(DEBUG_ARTIFACT_PATH.as_ref(), &artifact)
            .context("writing debug artifact")?;
        info!("wrote debug artifact: {DEBUG_ARTIFACT_PATH}");
    }

    Ok(())
}
