//! The connection seam
//!
//! Every table operation ends in a call on a [`Connection`]: either
//! [`fetch_all`](Connection::fetch_all) for statements that return rows or
//! [`execute`](Connection::execute) for statements that return a row count.
//! Pooling, locking and transactions belong to the implementor.
//!
//! # Example
//!
//! ```rust,ignore
//! use dborm::{set_db, Repo, Where};
//! use sqlx::mysql::MySqlPoolOptions;
//!
//! let pool = MySqlPoolOptions::new().connect("mysql://localhost/app").await?;
//! set_db(pool)?;
//!
//! // Bound to the default connection
//! let users = Repo::new("users")?;
//! let active: Vec<User> = users.find(&[Where::eq("status", 1)], "id").await?;
//! ```

use std::future::Future;

use crate::error::Result;
use crate::query::Statement;

#[cfg(feature = "mysql")]
mod mysql;

#[cfg(feature = "mysql")]
pub use mysql::{db, set_db, TxConnection};

/// One result row, keyed by column name
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A handle that can run rendered statements
///
/// Implemented for `sqlx::MySqlPool`, for a mutex-wrapped
/// `sqlx::Transaction` ([`TxConnection`]) and for shared references to any
/// implementor.
pub trait Connection: Send + Sync {
    /// Run a statement and return every row it produces
    fn fetch_all(&self, stmt: &Statement) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Run a statement and return the number of rows it affected
    fn execute(&self, stmt: &Statement) -> impl Future<Output = Result<u64>> + Send;
}

impl<C: Connection> Connection for &C {
    fn fetch_all(&self, stmt: &Statement) -> impl Future<Output = Result<Vec<Record>>> + Send {
        (**self).fetch_all(stmt)
    }

    fn execute(&self, stmt: &Statement) -> impl Future<Output = Result<u64>> + Send {
        (**self).execute(stmt)
    }
}
