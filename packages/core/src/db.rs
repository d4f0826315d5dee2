//! SQLite connection pool and schema migrations.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Open the database at `database_url` and apply all pending migrations.
///
/// The pool holds a single connection: SQLite admits one writer at a time,
/// and every custody operation is a read-modify-write transaction, so
/// serialising at the pool keeps transactions from failing with `SQLITE_BUSY`.
/// It also keeps `sqlite::memory:` databases alive for the pool's lifetime.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!("Database ready at {}", database_url);
    Ok(pool)
}
