use sqlx::postgres::{PgPoolOptions, PgPool};

/// Create the shared `PgPool` every service binary wires into its
/// `ColumnStore` implementation. One pool per process; `PgPool` is
/// cheaply cloneable and safe to share across tasks.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}
