// Shared SQLite pool setup. All stores run against one pool; each store
// owns its migrations and runs them on construction.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Open (and create, for file URLs) the SQLite database.
pub async fn connect(database_url: &str) -> anyhow::Result<Pool<Sqlite>> {
    let path_str = database_url.trim_start_matches("sqlite://");
    if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
        if let Some(parent) = Path::new(path_str).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(path_str)?;
    }

    let conn_str = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}", database_url)
    };

    let pool = SqlitePoolOptions::new().connect(&conn_str).await?;
    Ok(pool)
}

#[cfg(test)]
pub async fn memory_pool() -> Pool<Sqlite> {
    connect("sqlite::memory:").await.expect("in-memory pool")
}
