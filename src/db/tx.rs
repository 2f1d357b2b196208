use crate::error::Error;
use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

/// How a transaction takes its locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain `BEGIN`: no lock until the first statement. Used for lookups.
    Deferred,
    /// `BEGIN IMMEDIATE`: the write lock is taken up front, so competing
    /// writers queue on the busy timeout instead of failing on upgrade.
    Immediate,
}

impl Mode {
    fn begin_sql(&self) -> &'static str {
        match self {
            Mode::Deferred => "BEGIN",
            Mode::Immediate => "BEGIN IMMEDIATE",
        }
    }
}

/// A live transaction plus the single timestamp every write in it uses.
///
/// Dropping a `Tx` without calling [`Tx::commit`] rolls it back before the
/// connection returns to the pool, so early returns through `?` never leave
/// partial writes behind.
pub struct Tx {
    conn: Option<PoolConnection<Sqlite>>,
    now: DateTime<Utc>,
}

impl Tx {
    pub(crate) async fn begin(pool: &SqlitePool, mode: Mode) -> Result<Self> {
        let conn = pool
            .acquire()
            .await
            .context("could not acquire connection")?;
        // Guard first: a future dropped while BEGIN is in flight still rolls back.
        let mut tx = Self {
            conn: Some(conn),
            now: Utc::now().trunc_subsecs(0),
        };
        sqlx::query(mode.begin_sql())
            .execute(tx.conn()?)
            .await
            .context("could not begin transaction")?;
        Ok(tx)
    }

    /// Frozen UTC time, truncated to whole seconds.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(Error::internal("transaction already finished").into()),
        }
    }

    pub async fn commit(mut self) -> Result<()> {
        sqlx::query("COMMIT")
            .execute(self.conn()?)
            .await
            .context("could not commit transaction")?;
        self.conn = None;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        sqlx::query("ROLLBACK")
            .execute(self.conn()?)
            .await
            .context("could not roll back transaction")?;
        self.conn = None;
        Ok(())
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        // Closing the raw connection discards whatever is left open.
                        debug!(error = %err, "rollback on drop failed, discarding connection");
                        drop(conn.detach());
                    }
                });
            }
            Err(_) => drop(conn.detach()),
        }
    }
}
