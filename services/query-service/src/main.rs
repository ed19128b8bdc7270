use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::{info, Level};

mod config;
mod dto;
mod handlers;
mod ops;
mod scope;
mod state;

use config::Config;
use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    dotenv::dotenv().ok();
    let config = Config::from_env().expect("failed to load configuration");

    info!("starting query-service on {}:{}", config.host, config.port);

    let db_pool = activity_database::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");
    let store = Arc::new(activity_database::PgColumnStore::new(db_pool));
    let engine = Arc::new(activity_query::QueryEngine::new(store, config.query_config()));

    let state = web::Data::new(AppState { engine });

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
