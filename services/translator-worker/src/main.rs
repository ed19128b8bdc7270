use std::sync::Arc;
use std::time::Duration;

use tracing::{info, Level};

mod config;
mod policy_sync;
mod worker;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    dotenv::dotenv().ok();
    let config = Config::from_env().expect("failed to load configuration");

    info!(workers = config.worker_count, "starting translator-worker");

    let db_pool = activity_database::create_pool(&config.database_url).await?;
    let cache = Arc::new(activity_policy_cache::PolicyCache::new());

    policy_sync::sync_once_blocking(&db_pool, &cache).await;
    tokio::spawn(policy_sync::run(
        db_pool,
        cache.clone(),
        Duration::from_secs(config.policy_sync_interval_secs),
    ));

    let translator = Arc::new(activity_translator::Translator::new(
        cache,
        activity_translator::ActorClassifierConfig::default(),
    ));

    let publisher: Arc<dyn activity_publisher::Publisher> =
        Arc::new(activity_publisher::NatsPublisher::connect(
            &config.nats_url,
            Duration::from_millis(config.reconnect_cap_ms),
        )
        .await?);

    let subscribe_client = async_nats::connect(&config.nats_url).await?;

    let mut handles = Vec::new();
    for _ in 0..config.worker_count.max(1) {
        handles.push(tokio::spawn(worker::consume_audit(
            subscribe_client.clone(),
            config.audit_subject.clone(),
            "translator-worker-audit".to_string(),
            translator.clone(),
            publisher.clone(),
        )));
        handles.push(tokio::spawn(worker::consume_events(
            subscribe_client.clone(),
            format!("{}.*", config.event_prefix),
            "translator-worker-events".to_string(),
            translator.clone(),
            publisher.clone(),
        )));
    }

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
