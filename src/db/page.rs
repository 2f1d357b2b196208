use super::query::{self, Conditions, Order, Table};
use super::{Db, Tx};
use crate::model::{Page, PageFilter, PageUpdate};
use crate::service::PageService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use tracing::{debug, instrument};

const PAGES: Table = Table {
    name: "page",
    columns: &["id", "name", "content", "created_at", "updated_at"],
    order: Order::Desc,
};

#[derive(Debug, Clone)]
pub struct PageRepo {
    db: Db,
}

impl PageRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PageService for PageRepo {
    #[instrument(skip_all, fields(name = %page.name))]
    async fn create_page(&self, page: &mut Page) -> Result<()> {
        let mut tx = self.db.begin().await?;
        page.created_at = tx.now();
        page.updated_at = tx.now();

        let row = sqlx::query(
            "INSERT INTO page (name, content, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&page.name)
        .bind(&page.content)
        .bind(page.created_at)
        .bind(page.updated_at)
        .fetch_one(tx.conn()?)
        .await
        .context("could not insert page")?;
        page.id = row.try_get("id").context("could not read page id")?;
        debug!(id = page.id, "page inserted");

        tx.commit().await
    }

    #[instrument(skip(self))]
    async fn find_page_by_name(&self, name: &str) -> Result<Page> {
        let mut tx = self.db.begin_read().await?;
        let page = find_page_by_name(&mut tx, name).await?;
        tx.commit().await?;
        Ok(page)
    }

    #[instrument(skip(self, update))]
    async fn update_page(&self, name: &str, update: &PageUpdate) -> Result<Page> {
        let mut tx = self.db.begin().await?;
        let mut page = find_page_by_name(&mut tx, name).await?;

        if let Some(v) = &update.content {
            page.content = v.clone();
        }
        page.updated_at = tx.now();

        sqlx::query("UPDATE page SET content = ?, updated_at = ? WHERE id = ?")
            .bind(&page.content)
            .bind(page.updated_at)
            .bind(page.id)
            .execute(tx.conn()?)
            .await
            .context("could not update page")?;

        tx.commit().await?;
        Ok(page)
    }
}

async fn find_page_by_name(tx: &mut Tx, name: &str) -> Result<Page> {
    let filter = PageFilter {
        name: Some(name.to_string()),
        ..Default::default()
    };
    let (pages, total) = find_pages(tx, &filter).await?;
    query::first(pages, total, "page not found")
}

async fn find_pages(tx: &mut Tx, filter: &PageFilter) -> Result<(Vec<Page>, i64)> {
    let mut conds = Conditions::new();
    conds.eq_opt("name", filter.name.as_deref());
    query::find(tx, &PAGES, &conds, filter.limit, filter.offset).await
}
