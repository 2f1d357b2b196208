//! Service contracts consumed by the boundary layer.
//!
//! Each operation runs in its own transaction. Missing rows come back as a
//! `not_found` [`crate::Error`]; store failures as plain wrapped errors.

use crate::model::{Now, Page, PageUpdate, Post, PostUpdate, User, UserUpdate};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PostService: Send + Sync {
    /// Inserts `post`, filling in its id and timestamps.
    async fn create_post(&self, post: &mut Post) -> Result<()>;
    async fn find_post_by_id(&self, id: i64) -> Result<Post>;
    async fn find_post_by_permalink(&self, permalink: &str) -> Result<Post>;
    /// All posts, newest first. An empty table is `not_found`.
    async fn find_posts(&self) -> Result<Vec<Post>>;
    async fn update_post(&self, permalink: &str, update: &PostUpdate) -> Result<Post>;
}

#[async_trait]
pub trait PageService: Send + Sync {
    async fn create_page(&self, page: &mut Page) -> Result<()>;
    async fn find_page_by_name(&self, name: &str) -> Result<Page>;
    async fn update_page(&self, name: &str, update: &PageUpdate) -> Result<Page>;
}

#[async_trait]
pub trait NowService: Send + Sync {
    async fn create_now(&self, now: &mut Now) -> Result<()>;
    async fn find_latest_now(&self) -> Result<Now>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn create_user(&self, user: &mut User) -> Result<()>;
    async fn find_users(&self) -> Result<Vec<User>>;
    async fn find_user_by_id(&self, id: i64) -> Result<User>;
    /// Newest user with this email; uniqueness is not enforced by the store.
    async fn find_user_by_email(&self, email: &str) -> Result<User>;
    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User>;
    /// Deletes by id. Does not check that the caller owns the account.
    async fn delete_user(&self, id: i64) -> Result<()>;
}
