use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Duration;

mod ai;
mod config;
mod db;
mod http;
mod models;
mod pipeline;
mod reply_log;
mod resolver;
mod responder;
mod scheduler;
mod social;

#[cfg(test)]
mod testing;

use ai::OpenAIClient;
use config::{Config, StoreConfig};
use db::{AirtableStore, Database, ReplyStore};
use pipeline::{PipelineConfig, TriagePipeline};
use reply_log::ResponseLog;
use responder::ResponseGenerator;
use scheduler::{Scheduler, SchedulerConfig};
use social::{SocialClient, TwitterClient};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env().map_err(|e| format!("Invalid configuration: {}", e))?;
    if let Some(warning) = config.lookback_gap_warning() {
        log::warn!("{}", warning);
    }
    if config.twitter_bearer_token.is_none() {
        log::debug!("No Twitter bearer token configured (not required)");
    }

    let store: Arc<dyn ReplyStore> = match &config.store {
        StoreConfig::Airtable {
            api_key,
            base_key,
            table_name,
            view,
        } => {
            log::info!("Reply log: Airtable table '{}' (view '{}')", table_name, view);
            Arc::new(AirtableStore::new(api_key, base_key, table_name, view))
        }
        StoreConfig::Sqlite { database_url } => {
            log::info!("Reply log: SQLite database at {}", database_url);
            let db = Database::new(database_url)
                .map_err(|e| format!("Failed to open database {}: {}", database_url, e))?;
            Arc::new(db)
        }
    };
    // The reply log has no cross-process coordination
    log::info!(
        "Run exactly one instance against this {} reply log; concurrent instances can reply twice",
        config.store.kind()
    );

    let social: Arc<dyn SocialClient> = Arc::new(TwitterClient::new(config.twitter.clone()));

    let llm = OpenAIClient::new(
        &config.llm.api_key,
        &config.llm.endpoint,
        &config.llm.model,
        config.llm.temperature,
        config.llm.max_tokens,
    )?;
    log::info!("Using model {} at {}", llm.model(), llm.endpoint());

    let bot_user_id = social
        .get_self_id()
        .await
        .map_err(|e| format!("Failed to resolve bot account id: {}", e))?;
    log::info!("Triaging mentions of user {}", bot_user_id);

    let mut pipeline_config = PipelineConfig::new(bot_user_id);
    pipeline_config.lookback = chrono::Duration::minutes(config.mention_lookback_minutes);
    pipeline_config.tweet_response_limit = config.tweet_response_limit;

    let pipeline = Arc::new(TriagePipeline::new(
        social,
        ResponseLog::new(store),
        ResponseGenerator::new(Arc::new(llm)),
        pipeline_config,
    ));

    let scheduler = Arc::new(Scheduler::new(
        pipeline,
        SchedulerConfig {
            run_interval: Duration::from_secs(config.run_interval_secs),
            run_on_startup: config.run_on_startup,
            ..SchedulerConfig::default()
        },
    ));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let scheduler_handle = tokio::spawn(scheduler.start(shutdown_rx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C, running until killed: {}", e);
        // shutdown_tx stays alive while the scheduler runs
        return scheduler_handle
            .await
            .map_err(|e| format!("Scheduler task failed: {}", e));
    }
    log::info!("Received Ctrl-C, shutting down");
    let _ = shutdown_tx.send(());

    // An in-flight run finishes before the loop sees the signal
    scheduler_handle
        .await
        .map_err(|e| format!("Scheduler task failed: {}", e))?;

    Ok(())
}
