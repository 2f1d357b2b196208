//! Bundled SQL migrations, applied once each and tracked by file name.
//!
//! Files run in lexicographic order of their names, so names are
//! zero-padded. Each file runs inside its own transaction together with the
//! bookkeeping insert; a failing file leaves neither its DDL nor its record.

use anyhow::{bail, Context, Result};
use sqlx::{Executor, SqlitePool};
use tracing::{debug, info, instrument};

const BUNDLED: &[(&str, &str)] = &[
    (
        "00001_create_posts.sql",
        include_str!("../../migrations/00001_create_posts.sql"),
    ),
    (
        "00002_create_page.sql",
        include_str!("../../migrations/00002_create_page.sql"),
    ),
    (
        "00003_create_now.sql",
        include_str!("../../migrations/00003_create_now.sql"),
    ),
    (
        "00004_create_user.sql",
        include_str!("../../migrations/00004_create_user.sql"),
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Migrations compiled into the binary.
pub fn bundled() -> Vec<Migration> {
    BUNDLED
        .iter()
        .map(|(name, sql)| Migration::new(*name, *sql))
        .collect()
}

/// Applies the bundled migrations. Returns how many were applied.
pub async fn run(pool: &SqlitePool) -> Result<usize> {
    run_with(pool, bundled()).await
}

#[instrument(skip_all, fields(count = migrations.len()))]
pub async fn run_with(pool: &SqlitePool, mut migrations: Vec<Migration>) -> Result<usize> {
    sqlx::query("CREATE TABLE IF NOT EXISTS migrations (name TEXT PRIMARY KEY);")
        .execute(pool)
        .await
        .context("failed to create migrations table")?;

    if migrations.is_empty() {
        bail!("failed to find at least one migration file");
    }
    migrations.sort_by(|a, b| a.name.cmp(&b.name));

    let mut applied = 0;
    for migration in &migrations {
        if apply(pool, migration)
            .await
            .with_context(|| format!("failed to execute migration {:?}", migration.name))?
        {
            applied += 1;
        }
    }
    Ok(applied)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let seen: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations WHERE name = ?")
        .bind(&migration.name)
        .fetch_one(&mut *tx)
        .await?;
    if seen != 0 {
        debug!(name = %migration.name, "migration already applied");
        return Ok(false);
    }

    (&mut *tx).execute(migration.sql.as_str()).await?;
    sqlx::query("INSERT INTO migrations (name) VALUES (?)")
        .bind(&migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(name = %migration.name, "applied migration");
    Ok(true)
}
