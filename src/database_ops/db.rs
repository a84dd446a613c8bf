use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Row,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;
        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await
            .context("connecting to postgres")?;
        info!(max_connections, "connected to db");

        if auto_migrate {
            info!("running migrations (AUTO_MIGRATE=on)");
            run_migrations(&pool, Path::new("./migrations")).await?;
        } else {
            info!("AUTO_MIGRATE disabled; skipping migrations");
        }
        Ok(Self { pool })
    }
}

/// Split `0001_holidays.sql` into `(1, "holidays")`; anything else is ignored.
fn parse_migration_name(fname: &str) -> Option<(i64, String)> {
    let stem = fname.strip_suffix(".sql")?;
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let desc = stem[digits.len()..].strip_prefix('_')?;
    Some((digits.parse().ok()?, desc.to_string()))
}

/// Lightweight numbered-migration runner: applies every `NNNN_name.sql` in
/// `dir` not yet recorded in `_hk_migrations`, in version order.
async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS _hk_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT,
            installed_at TIMESTAMPTZ DEFAULT now()
         )",
    )
    .execute(pool)
    .await?;

    let mut applied: HashSet<i64> = HashSet::new();
    for r in sqlx::query("SELECT version FROM _hk_migrations")
        .fetch_all(pool)
        .await?
    {
        applied.insert(r.try_get::<i64, _>(0)?);
    }

    let mut candidates: Vec<(i64, String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some((version, desc)) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(parse_migration_name)
        {
            candidates.push((version, desc, path));
        }
    }
    candidates.sort_by_key(|(v, _, _)| *v);

    for (version, desc, path) in candidates {
        if !applied.insert(version) {
            continue;
        }
        let sql = std::fs::read_to_string(&path)?;
        info!(version, file = ?path, "applying migration");
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(&sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO _hk_migrations(version, description) VALUES ($1, $2)")
            .bind(version)
            .bind(&desc)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }
    info!("migrations up-to-date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_names() {
        assert_eq!(
            parse_migration_name("0001_holidays.sql"),
            Some((1, "holidays".to_string()))
        );
        assert_eq!(parse_migration_name("README.md"), None);
        assert_eq!(parse_migration_name("settings.sql"), None);
        assert_eq!(parse_migration_name("0002.sql"), None);
    }
}
