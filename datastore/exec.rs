//! Boundary between migrations and the database.
//!
//! Migrations never open connections themselves: they render a script and hand it to an
//! [`Executor`], which owns the connection and the transaction.

use anyhow::Context as _;
use async_trait::async_trait;
use sqlx::Executor as _;
use sqlx::any::{Any, AnyConnectOptions, AnyPool, AnyPoolOptions};
use crate::error::{Result, ResultExt};
use crate::schema::Dialect;

#[async_trait]
pub trait Executor: Send {
    /// Dialect that scripts for this executor must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Runs a script of `;`-terminated statements.
    async fn execute_script(&mut self, sql: &str) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Row id generated by the last executed statement, or 0 if there is none.
    fn last_insert_id(&self) -> i64;
}

/// Executor backed by an sqlx connection pool.
///
/// The first script opens a transaction that stays open until [`Executor::commit`] or
/// [`Executor::rollback`]. DDL is only transactional where the database itself supports it
/// (SQLite does, MySQL commits implicitly after each DDL statement).
///
/// SQLite connections are opened with foreign key enforcement off: the table rebuild drops the
/// old table while other tables still reference it.
pub struct SqlxExecutor {
    pool: AnyPool,
    txn: Option<sqlx::Transaction<'static, Any>>,
    last_insert_id: i64,
}

impl SqlxExecutor {
    pub async fn connect(uri: &str, max_connections: u32) -> Result<Self> {
        let mut options = uri.parse::<AnyConnectOptions>()
            .with_context(|| format!("invalid database URI {}", uri))
            .err_execution()?;
        if let Some(sqlite) = options.as_sqlite_mut() {
            *sqlite = sqlite.clone().foreign_keys(false);
        }
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to {}", uri))
            .err_execution()?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool, txn: None, last_insert_id: 0 }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for SqlxExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::from_any_kind(self.pool.any_kind())
    }

    async fn execute_script(&mut self, sql: &str) -> Result<()> {
        if self.txn.is_none() {
            let txn = self.pool.begin().await
                .context("could not begin transaction")
                .err_execution()?;
            self.txn = Some(txn);
        }
        let txn = match self.txn.as_mut() {
            Some(txn) => txn,
            None => internal!("transaction is not open"),
        };
        let result = txn.execute(sql).await
            .context("could not execute migration script")
            .err_execution()?;
        self.last_insert_id = result.last_insert_id().unwrap_or(0);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit().await
                .context("could not commit transaction")
                .err_execution()?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.rollback().await
                .context("could not roll back transaction")
                .err_execution()?;
        }
        Ok(())
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }
}
