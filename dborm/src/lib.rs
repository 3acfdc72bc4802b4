//! # dborm
//!
//! Generic table access helpers over sqlx, driven by a small condition language.
//!
//! ## Features
//!
//! - **Conditions**: `Where { field, op, value }` descriptors rendered to parameterised SQL
//!   (comparisons, IN / NOT IN, LIKE / NOT LIKE, BETWEEN, FIND_IN_SET, raw fragments)
//! - **Table operations**: first, find, count, insert, save, update, delete, soft delete
//!   and paged listing with a total count
//! - **Default connection**: install a pool once with [`set_db`], override per call with
//!   any [`Connection`] such as a [`TxConnection`]
//! - **Ambient stack**: figment configuration, tracing output, structured errors
//!
//! ## Example
//!
//! ```rust,no_run
//! use dborm::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config.logging)?;
//!     dborm::database::init(&config).await?;
//!
//!     let users = Repo::new("users")?;
//!     let wheres = [
//!         Where::in_list("status", vec![1_i64, 2]),
//!         Where::like("name", "ann"),
//!     ];
//!
//!     let mut page: Vec<User> = Vec::new();
//!     let total = users
//!         .list_page_with_count(&wheres, Pagination::page(1, 20), "id DESC", &mut page)
//!         .await?;
//!     println!("{total} users, showing {}", page.len());
//!
//!     Ok(())
//! }
//! ```

pub mod condition;
pub mod config;
pub mod connection;
#[cfg(feature = "mysql")]
pub mod database;
pub mod error;
pub mod observability;
pub mod pagination;
pub mod query;
pub mod repo;
pub mod value;

pub use condition::{Clause, Operator, Where};
pub use config::{Config, DatabaseConfig, LoggingConfig};
pub use connection::{Connection, Record};
#[cfg(feature = "mysql")]
pub use connection::{db, set_db, TxConnection};
pub use error::{DatabaseError, DatabaseErrorKind, DatabaseOperation, Error, Result};
pub use observability::init_tracing;
pub use pagination::Pagination;
pub use query::{Query, Statement};
pub use repo::{Repo, Table, DELETED_AT};
pub use value::Value;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::condition::{Operator, Where};
    pub use crate::config::Config;
    pub use crate::connection::Connection;
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::pagination::Pagination;
    pub use crate::repo::{Repo, Table};
    pub use crate::value::Value;

    #[cfg(feature = "mysql")]
    pub use crate::connection::{db, set_db, TxConnection};
}
