use super::query::{self, Conditions, Order, Table};
use super::{Db, Tx};
use crate::error::Error;
use crate::model::{User, UserFilter, UserUpdate};
use crate::service::UserService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use tracing::{info, instrument};

const USERS: Table = Table {
    name: "user",
    columns: &[
        "id",
        "api_key",
        "name",
        "email",
        "password",
        "created_at",
        "updated_at",
    ],
    order: Order::Desc,
};

#[derive(Debug, Clone)]
pub struct UserRepo {
    db: Db,
}

impl UserRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserService for UserRepo {
    #[instrument(skip_all)]
    async fn create_user(&self, user: &mut User) -> Result<()> {
        let mut tx = self.db.begin().await?;
        user.created_at = tx.now();
        user.updated_at = tx.now();

        let row = sqlx::query(
            "INSERT INTO user (api_key, name, email, password, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&user.api_key)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(tx.conn()?)
        .await
        .context("could not create user")?;
        user.id = row.try_get("id").context("could not read user id")?;

        tx.commit().await
    }

    #[instrument(skip_all)]
    async fn find_users(&self) -> Result<Vec<User>> {
        let mut tx = self.db.begin_read().await?;
        let (users, total) = find_users(&mut tx, &UserFilter::default()).await?;
        if total == 0 {
            return Err(Error::not_found("no users available").into());
        }
        tx.commit().await?;
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, id: i64) -> Result<User> {
        let mut tx = self.db.begin_read().await?;
        let user = find_user_by_id(&mut tx, id).await?;
        tx.commit().await?;
        Ok(user)
    }

    #[instrument(skip_all)]
    async fn find_user_by_email(&self, email: &str) -> Result<User> {
        let mut tx = self.db.begin_read().await?;
        let filter = UserFilter {
            email: Some(email.to_string()),
            ..Default::default()
        };
        let (users, total) = find_users(&mut tx, &filter).await?;
        let user = query::first(users, total, "user not found")?;
        tx.commit().await?;
        Ok(user)
    }

    #[instrument(skip(self, update))]
    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        let mut tx = self.db.begin().await?;
        let mut user = find_user_by_id(&mut tx, id).await?;

        if let Some(v) = &update.name {
            user.name = v.clone();
        }
        if let Some(v) = &update.email {
            user.email = v.clone();
        }
        if let Some(v) = &update.password {
            user.password = v.clone();
        }
        user.updated_at = tx.now();

        sqlx::query(
            "UPDATE user SET name = ?, email = ?, password = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(tx.conn()?)
        .await
        .context("could not update user")?;

        tx.commit().await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let user = find_user_by_id(&mut tx, id).await?;

        // TODO: reject unless the session's uid matches `user.id` once the
        // auth context is threaded through the service calls.
        sqlx::query("DELETE FROM user WHERE id = ?")
            .bind(user.id)
            .execute(tx.conn()?)
            .await
            .context("could not delete user")?;

        tx.commit().await?;
        info!(id, "user deleted");
        Ok(())
    }
}

async fn find_user_by_id(tx: &mut Tx, id: i64) -> Result<User> {
    let filter = UserFilter {
        id: Some(id),
        ..Default::default()
    };
    let (users, total) = find_users(tx, &filter).await?;
    query::first(users, total, "user not found")
}

async fn find_users(tx: &mut Tx, filter: &UserFilter) -> Result<(Vec<User>, i64)> {
    let mut conds = Conditions::new();
    conds
        .eq_opt("id", filter.id)
        .eq_opt("email", filter.email.as_deref());
    query::find(tx, &USERS, &conds, filter.limit, filter.offset).await
}
