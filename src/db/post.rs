use super::query::{self, Conditions, Order, Table};
use super::{Db, Tx};
use crate::error::Error;
use crate::model::{Post, PostFilter, PostUpdate};
use crate::service::PostService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;

const POSTS: Table = Table {
    name: "posts",
    columns: &["id", "permalink", "title", "content", "created_at", "updated_at"],
    order: Order::Desc,
};

#[derive(Debug, Clone)]
pub struct PostRepo {
    db: Db,
}

impl PostRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostService for PostRepo {
    #[instrument(skip_all, fields(permalink = %post.permalink))]
    async fn create_post(&self, post: &mut Post) -> Result<()> {
        let mut tx = self.db.begin().await?;
        post.created_at = tx.now();
        post.updated_at = tx.now();

        let row = sqlx::query(
            "INSERT INTO posts (permalink, title, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&post.permalink)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(tx.conn()?)
        .await
        .context("could not insert post")?;
        post.id = row.try_get("id").context("could not read post id")?;

        tx.commit().await
    }

    #[instrument(skip(self))]
    async fn find_post_by_id(&self, id: i64) -> Result<Post> {
        let mut tx = self.db.begin_read().await?;
        let filter = PostFilter {
            id: Some(id),
            ..Default::default()
        };
        let post = find_post(&mut tx, &filter).await?;
        tx.commit().await?;
        Ok(post)
    }

    #[instrument(skip(self))]
    async fn find_post_by_permalink(&self, permalink: &str) -> Result<Post> {
        let mut tx = self.db.begin_read().await?;
        let post = find_post_by_permalink(&mut tx, permalink).await?;
        tx.commit().await?;
        Ok(post)
    }

    #[instrument(skip_all)]
    async fn find_posts(&self) -> Result<Vec<Post>> {
        let mut tx = self.db.begin_read().await?;
        let (posts, total) = find_posts(&mut tx, &PostFilter::default()).await?;
        if total == 0 {
            return Err(Error::not_found("no posts available").into());
        }
        tx.commit().await?;
        Ok(posts)
    }

    #[instrument(skip(self, update))]
    async fn update_post(&self, permalink: &str, update: &PostUpdate) -> Result<Post> {
        let mut tx = self.db.begin().await?;
        let mut post = find_post_by_permalink(&mut tx, permalink).await?;

        if let Some(v) = &update.title {
            post.title = v.clone();
        }
        if let Some(v) = &update.content {
            post.content = v.clone();
        }
        post.updated_at = tx.now();

        sqlx::query("UPDATE posts SET title = ?, content = ?, updated_at = ? WHERE id = ?")
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.updated_at)
            .bind(post.id)
            .execute(tx.conn()?)
            .await
            .context("could not update post")?;

        tx.commit().await?;
        Ok(post)
    }
}

async fn find_post_by_permalink(tx: &mut Tx, permalink: &str) -> Result<Post> {
    let filter = PostFilter {
        permalink: Some(permalink.to_string()),
        ..Default::default()
    };
    find_post(tx, &filter).await
}

async fn find_post(tx: &mut Tx, filter: &PostFilter) -> Result<Post> {
    let (posts, total) = find_posts(tx, filter).await?;
    query::first(posts, total, "post not found")
}

async fn find_posts(tx: &mut Tx, filter: &PostFilter) -> Result<(Vec<Post>, i64)> {
    let mut conds = Conditions::new();
    conds
        .eq_opt("id", filter.id)
        .eq_opt("permalink", filter.permalink.as_deref());
    query::find(tx, &POSTS, &conds, filter.limit, filter.offset).await
}
