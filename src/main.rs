use anyhow::Context;
use background_service::{
    AutonomousEngine, ContentPlanner, ContentStudio, EngineDeps, StartOutcome,
};
use database::Database;
use llm_interface::{GenerationChain, InferenceApiProvider, OpenAiProvider};
use platform_client::{HttpPlatformClient, StaticCredentialResolver};
use signalpost_core::{
    AppConfig, Cache, CoreError, FastRandom, RandomSource, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH,
    SWEEP_INTERVAL,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use trend_aggregator::{CoinGeckoSource, TrendAggregator};

const DEFAULT_LOG_FILTER: &str = "signalpost=info,signalpost_core=info,background_service=info,\
     llm_interface=info,trend_aggregator=info,platform_client=info,database=info";
const CONTENT_RUN_INTERVAL: Duration = Duration::from_secs(24 * 3600);

fn build_chain(
    config: &AppConfig,
    random: Arc<dyn RandomSource>,
    cache: Cache,
) -> Result<GenerationChain, CoreError> {
    let mut chain = GenerationChain::new(random).with_cache(cache);
    if let Some(primary) = &config.generation.primary {
        chain = chain.with_primary(Arc::new(InferenceApiProvider::new(
            primary.base_url.clone(),
            primary.model.clone(),
            primary.api_key.clone(),
        )?));
    }
    if let Some(secondary) = &config.generation.secondary {
        chain = chain.with_secondary(Arc::new(OpenAiProvider::new(
            secondary.base_url.clone(),
            secondary.model.clone(),
            secondary.api_key.clone(),
        )?));
    }
    if !chain.has_providers() {
        warn!("No generation provider configured, posts will carry placeholder text");
    }
    Ok(chain)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    info!("Starting Signalpost for account {}", config.account.id);

    let random: Arc<dyn RandomSource> = Arc::new(FastRandom::new());
    let cache = Cache::in_memory();
    let sweeper = cache.spawn_sweeper(SWEEP_INTERVAL);

    let chain = Arc::new(build_chain(&config, random.clone(), cache.clone())?);
    let platform = Arc::new(HttpPlatformClient::new(
        &config.platform.api_base,
        &config.platform.user_agent,
    )?);
    let credentials = Arc::new(StaticCredentialResolver::from_config(&config.account));

    let mut database = Database::new(config.storage.database_url.clone());
    database
        .connect()
        .await
        .context("connecting to the draft store")?;
    database.run_migrations().await?;
    let store = Arc::new(database);

    let engine = AutonomousEngine::new(
        config.account.id.clone(),
        EngineDeps::new(credentials, platform.clone(), chain.clone(), random.clone())
            .with_store(store.clone()),
        config.content.proactive_topics.clone(),
    );
    match engine.start(config.engagement.clone()).await {
        StartOutcome::Started => {}
        outcome => warn!("Engagement engine not started: {:?}", outcome),
    }

    let aggregator = Arc::new(
        TrendAggregator::new(
            Arc::new(CoinGeckoSource::new(&config.market.base_url)?),
            platform.clone(),
        )
        .with_cache(cache.clone()),
    );
    let studio = ContentStudio::new(aggregator, chain, ContentPlanner::new(random), store);
    let account_credentials = config.account.credentials();
    let content_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CONTENT_RUN_INTERVAL);
        loop {
            ticker.tick().await;
            let report = studio.run(account_credentials.as_ref()).await;
            info!(
                "Planned content: {} scheduled, {} held back",
                report.scheduled.len(),
                report.unscheduled.len()
            );
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    let status = engine.status().await;
    info!(
        "Final status: running={}, budget used={}",
        status.running, status.current_budget_used
    );
    engine.shutdown().await;
    content_task.abort();
    sweeper.abort();

    let api = platform.get_metrics().await;
    info!(
        "Platform API: {} requests, {} failed, {} rate limited",
        api.total_requests, api.failed_requests, api.rate_limited_requests
    );
    for (endpoint, metrics) in &api.requests_by_endpoint {
        info!(
            "  {}: {} requests, {:.0}% ok, avg {:?}",
            endpoint,
            metrics.request_count,
            metrics.success_rate() * 100.0,
            metrics.average_response_time()
        );
    }
    match platform.export_metrics().await {
        Ok(exported) => debug!("Platform API metrics: {}", exported),
        Err(e) => warn!("Could not export platform API metrics: {}", e),
    }
    Ok(())
}
