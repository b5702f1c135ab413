use std::sync::Arc;

use sitewatch_core::{
    classify::{ChangeClassifier, ExactClassifier, SemanticClassifier},
    config::{ChangeStrategy, Config},
    fetch::HttpFetcher,
    scheduler::MonitorScheduler,
    store::JsonFileStore,
};
use sitewatch_discord::DiscordNotifier;
use sitewatch_openai::OpenAiJudge;

#[tokio::main]
async fn main() -> Result<(), sitewatch_core::Error> {
    sitewatch_core::logging::init("sitewatch")?;

    let cfg = Config::load()?;

    let fetcher = Arc::new(HttpFetcher::new(&cfg.fetch_user_agent, cfg.fetch_timeout)?);
    let classifier: Arc<dyn ChangeClassifier> = match cfg.strategy {
        ChangeStrategy::Exact => Arc::new(ExactClassifier),
        ChangeStrategy::Semantic => {
            let api_key = cfg.openai_api_key.clone().ok_or_else(|| {
                sitewatch_core::Error::Config(
                    "semantic strategy requires OPENAI_API_KEY".to_string(),
                )
            })?;
            let judge = Arc::new(OpenAiJudge::new(
                api_key,
                cfg.judge_model.clone(),
                cfg.judge_timeout,
            ));
            Arc::new(SemanticClassifier::new(judge, cfg.semantic_prefix_limit))
        }
    };
    let sink = Arc::new(DiscordNotifier::new(cfg.discord_bot_token.clone()));
    let store = Arc::new(JsonFileStore::new(cfg.state_file.clone()));

    let scheduler = MonitorScheduler::new(fetcher, classifier, sink, store);
    let resumed = scheduler.bootstrap().await?;
    tracing::info!(resumed, "sitewatch running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await;

    Ok(())
}
