//! SQLite storage: connection handle, transactions and entity repositories.
//!
//! - `Db` owns the pool and runs migrations on open.
//! - `Tx` pairs a live transaction with one frozen timestamp.
//! - `post`, `page`, `now`, `user` implement the service traits in
//!   `crate::service` on top of the shared helpers in `query`.

pub mod migrate;
pub mod now;
pub mod page;
pub mod post;
pub mod query;
pub mod tx;
pub mod user;

pub use now::NowRepo;
pub use page::PageRepo;
pub use post::PostRepo;
pub use tx::Tx;
pub use user::UserRepo;

use crate::error::Error;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};
use tx::Mode;

/// How long a writer waits for the write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the single relational store. Clones share the same pool.
#[derive(Debug, Clone)]
pub struct Db {
    dsn: String,
    pool: Option<SqlitePool>,
}

impl Db {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            pool: None,
        }
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Connects, switches the store to WAL and applies pending migrations.
    /// Opening an already open handle does nothing.
    #[instrument(skip(self), fields(dsn = %self.dsn))]
    pub async fn open(&mut self) -> Result<()> {
        if self.dsn.trim().is_empty() {
            return Err(Error::bad_input("database location required").into());
        }
        if self.pool.as_ref().is_some_and(|pool| !pool.is_closed()) {
            warn!("database already open");
            return Ok(());
        }

        let url = sqlite_url(&self.dsn)?;
        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database location {url}"))?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("could not open database {url}"))?;

        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&pool)
            .await
            .context("could not enable WAL")?;

        migrate::run(&pool).await?;

        self.pool = Some(pool);
        info!("database opened");
        Ok(())
    }

    /// Starts a write transaction stamped with the current second. The write
    /// lock is held from the start, so concurrent writers run one at a time.
    pub async fn begin(&self) -> Result<Tx> {
        Tx::begin(self.open_pool()?, Mode::Immediate).await
    }

    /// Starts a deferred transaction for lookups. Under WAL it never blocks writers.
    pub async fn begin_read(&self) -> Result<Tx> {
        Tx::begin(self.open_pool()?, Mode::Deferred).await
    }

    /// Closes the pool. Does nothing when the handle was never opened.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    pub fn pool(&self) -> Option<&SqlitePool> {
        self.pool.as_ref()
    }

    fn open_pool(&self) -> Result<&SqlitePool> {
        match &self.pool {
            Some(pool) if !pool.is_closed() => Ok(pool),
            _ => Err(Error::internal("database is not open").into()),
        }
    }
}

/// Normalizes a location into a `sqlite://` URL and makes sure the directory
/// of a file store exists. `~/` is expanded; in-memory URLs are left alone.
fn sqlite_url(location: &str) -> Result<String> {
    if location.starts_with("sqlite::memory") {
        return Ok(location.to_string());
    }

    let rest = location
        .strip_prefix("sqlite://")
        .or_else(|| location.strip_prefix("sqlite:"))
        .unwrap_or(location);
    let (file, params) = match rest.split_once('?') {
        Some((file, params)) => (file, Some(params)),
        None => (rest, None),
    };
    if file.is_empty() {
        return Ok(location.to_string());
    }

    let path = expand_home(file);
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create directory {}", dir.display()))?;
    }

    Ok(match params {
        Some(params) => format!("sqlite://{}?{params}", path.display()),
        None => format!("sqlite://{}", path.display()),
    })
}

fn expand_home(file: &str) -> PathBuf {
    match (file.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(file),
    }
}
