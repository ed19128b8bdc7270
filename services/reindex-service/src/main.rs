use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use tracing::{info, Level};

mod config;
mod dto;
mod handlers;
mod policy_sync;
mod runs;
mod scope;
mod state;

use config::Config;
use runs::RunRegistry;
use state::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    dotenv::dotenv().ok();
    let config = Config::from_env().expect("failed to load configuration");

    info!("starting reindex-service on {}:{}", config.host, config.port);

    let db_pool = activity_database::create_pool(&config.database_url).await?;
    let store = Arc::new(activity_database::PgColumnStore::new(db_pool.clone()));
    let engine = Arc::new(activity_query::QueryEngine::new(
        store,
        activity_query::QueryConfig::default(),
    ));

    let cache = Arc::new(activity_policy_cache::PolicyCache::new());
    policy_sync::sync_once_blocking(&db_pool, &cache).await;
    tokio::spawn(policy_sync::run(db_pool, cache.clone(), Duration::from_secs(10)));

    let publisher: Arc<dyn activity_publisher::Publisher> =
        Arc::new(activity_publisher::NatsPublisher::connect(
            &config.nats_url,
            Duration::from_millis(config.reconnect_cap_ms),
        )
        .await?);

    let reindexer = Arc::new(state::build_reindexer(engine, cache, publisher));
    let registry = Arc::new(RunRegistry::new());

    let app_state = web::Data::new(AppState {
        reindexer,
        registry,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
