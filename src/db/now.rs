use super::query::{self, Conditions, Order, Table};
use super::{Db, Tx};
use crate::model::{Now, NowFilter};
use crate::service::NowService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;

const NOWS: Table = Table {
    name: "now",
    columns: &["id", "content", "location", "created_at", "updated_at"],
    order: Order::Desc,
};

#[derive(Debug, Clone)]
pub struct NowRepo {
    db: Db,
}

impl NowRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NowService for NowRepo {
    #[instrument(skip_all)]
    async fn create_now(&self, now: &mut Now) -> Result<()> {
        let mut tx = self.db.begin().await?;
        now.created_at = tx.now();
        now.updated_at = tx.now();

        let row = sqlx::query(
            "INSERT INTO now (content, location, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&now.content)
        .bind(&now.location)
        .bind(now.created_at)
        .bind(now.updated_at)
        .fetch_one(tx.conn()?)
        .await
        .context("could not insert now")?;
        now.id = row.try_get("id").context("could not read now id")?;

        tx.commit().await
    }

    #[instrument(skip_all)]
    async fn find_latest_now(&self) -> Result<Now> {
        let mut tx = self.db.begin_read().await?;
        let filter = NowFilter {
            limit: 1,
            ..Default::default()
        };
        let (nows, total) = find_nows(&mut tx, &filter).await?;
        let now = query::first(nows, total, "now not found")?;
        tx.commit().await?;
        Ok(now)
    }
}

async fn find_nows(tx: &mut Tx, filter: &NowFilter) -> Result<(Vec<Now>, i64)> {
    let mut conds = Conditions::new();
    conds.eq_opt("id", filter.id);
    query::find(tx, &NOWS, &conds, filter.limit, filter.offset).await
}
