use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::{info, warn, Level};

mod config;
mod handlers;
mod store;

use config::Config;
use handlers::AppState;
use store::PolicyStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    dotenv::dotenv().ok();
    let config = Config::from_env().expect("failed to load configuration");

    info!("starting policy-service on {}:{}", config.host, config.port);

    let db_pool = activity_database::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let store = PolicyStore::new(db_pool);
    let cache = Arc::new(activity_policy_cache::PolicyCache::new());

    // Replay every durably admitted policy into the cache on startup.
    // A policy that failed to compile at admission time will fail again
    // here and simply stay `NotReady` -- never a panic, per §7.
    match store.list().await {
        Ok(policies) => {
            for policy in &policies {
                cache.upsert(policy);
            }
            info!(count = policies.len(), "loaded policies from store");
        }
        Err(error) => warn!(%error, "failed to load policies on startup, starting with an empty cache"),
    }

    let state = web::Data::new(AppState { cache, store });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
