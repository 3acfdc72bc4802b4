//! Generic per-table record access
//!
//! [`Repo`] binds a table name to a connection and exposes the usual CRUD
//! operations. Every operation renders one statement (two for paged
//! listing) and hands it to the connection; failures pass straight through.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::collections::BTreeMap;
//! use dborm::{Pagination, Repo, Table, Value, Where};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     updated_at: i64,
//! }
//!
//! impl Table for User {
//!     fn table_name(&self) -> &str {
//!         "users"
//!     }
//!
//!     fn updated_at_column(&self) -> Option<&str> {
//!         Some("updated_at")
//!     }
//! }
//!
//! let users = Repo::new(User::default())?;
//!
//! let bob: User = users.first(&[Where::eq("name", "bob")], "").await?;
//!
//! let mut page = Vec::new();
//! let total = users
//!     .list_page_with_count::<User>(&[Where::like("name", "bo")], Pagination::page(1, 20), "id DESC", &mut page)
//!     .await?;
//!
//! let mut data = BTreeMap::new();
//! data.insert("name".to_string(), Value::from("robert"));
//! users.update(&[Where::eq("id", bob.id)], data).await?;
//! ```

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};

use crate::condition::Where;
use crate::connection::{Connection, Record};
use crate::error::{DatabaseError, DatabaseOperation, Error, Result};
use crate::pagination::Pagination;
use crate::query::{insert_sql, upsert_sql, Query, Statement};
use crate::value::Value;

/// Column written by [`Repo::soft_delete`]
pub const DELETED_AT: &str = "deleted_at";

/// A type that names a database table
///
/// Only [`table_name`](Table::table_name) is required.
pub trait Table {
    /// Name of the backing table
    fn table_name(&self) -> &str;

    /// Primary key column, used for default ordering and upserts
    fn primary_key(&self) -> &str {
        "id"
    }

    /// Column stamped with the current Unix time on every update, if any
    fn updated_at_column(&self) -> Option<&str> {
        None
    }

    /// Columns holding raw bytes (BLOB, VARBINARY)
    ///
    /// serde writes `Vec<u8>` fields as number arrays; listed columns are
    /// bound as bytes instead of JSON on insert and save.
    fn binary_columns(&self) -> &[&str] {
        &[]
    }
}

impl Table for str {
    fn table_name(&self) -> &str {
        self
    }
}

impl Table for String {
    fn table_name(&self) -> &str {
        self
    }
}

impl<T: Table + ?Sized> Table for &T {
    fn table_name(&self) -> &str {
        (**self).table_name()
    }

    fn primary_key(&self) -> &str {
        (**self).primary_key()
    }

    fn updated_at_column(&self) -> Option<&str> {
        (**self).updated_at_column()
    }

    fn binary_columns(&self) -> &[&str] {
        (**self).binary_columns()
    }
}

/// Table handle bound to a connection
#[derive(Debug, Clone)]
pub struct Repo<T, C> {
    table: T,
    conn: C,
}

#[cfg(feature = "mysql")]
impl<T: Table> Repo<T, sqlx::MySqlPool> {
    /// Bind `table` to the process-wide default connection
    ///
    /// Fails with [`Error::NotInitialized`] until [`set_db`](crate::set_db)
    /// has been called.
    pub fn new(table: T) -> Result<Self> {
        let conn = crate::connection::db()?.clone();
        Ok(Self { table, conn })
    }
}

impl<T: Table, C: Connection> Repo<T, C> {
    /// Bind `table` to an explicit connection, such as a transaction
    pub fn with_conn(table: T, conn: C) -> Self {
        Self { table, conn }
    }

    /// The table this handle is bound to
    pub fn table(&self) -> &T {
        &self.table
    }

    /// The connection this handle runs on
    pub fn conn(&self) -> &C {
        &self.conn
    }

    fn query(&self, wheres: &[Where]) -> Result<Query> {
        Query::table(self.table.table_name()).apply(wheres)
    }

    /// First row matching `wheres`
    ///
    /// The primary key is appended to `order` as a tiebreaker unless
    /// `order` already sorts on it, and decides alone when `order` is empty.
    /// A missing row is reported as a
    /// [`DatabaseErrorKind::NotFound`](crate::DatabaseErrorKind::NotFound)
    /// database error.
    pub async fn first<R: DeserializeOwned>(&self, wheres: &[Where], order: &str) -> Result<R> {
        let order = with_key_tiebreaker(order, self.table.primary_key());
        let stmt = self.query(wheres)?.order(order).limit(1).select_sql();

        let record = self
            .fetch(&stmt)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::Database(
                    DatabaseError::not_found(DatabaseOperation::Query, "Row not found")
                        .add_context(self.table.table_name().to_string()),
                )
            })?;

        decode(record)
    }

    /// Every row matching `wheres`, ordered by `order`
    pub async fn find<R: DeserializeOwned>(&self, wheres: &[Where], order: &str) -> Result<Vec<R>> {
        let stmt = self.query(wheres)?.order(order).select_sql();
        self.fetch(&stmt).await?.into_iter().map(decode::<R>).collect()
    }

    /// Number of rows matching `wheres`
    pub async fn count(&self, wheres: &[Where]) -> Result<u64> {
        let stmt = self.query(wheres)?.count_sql();
        self.fetch_count(&stmt).await
    }

    /// Insert `record` into its own table
    ///
    /// A null or zero primary key is left out so the database can assign it.
    pub async fn insert<R: Table + Serialize>(&self, record: &R) -> Result<()> {
        let mut row = encode(record)?;
        let key = record.primary_key();
        if row.get(key).is_some_and(Value::is_zero) {
            row.remove(key);
        }

        let stmt = insert_sql(record.table_name(), &row);
        self.exec(&stmt, DatabaseOperation::Insert).await?;
        Ok(())
    }

    /// Insert `record`, or overwrite the existing row with the same primary key
    ///
    /// A record whose key is unset (missing, null or zero) is inserted.
    pub async fn save<R: Table + Serialize>(&self, record: &R) -> Result<()> {
        let key = record.primary_key();
        let row = encode(record)?;

        if row.get(key).map_or(true, Value::is_zero) {
            return self.insert(record).await;
        }

        let stmt = upsert_sql(record.table_name(), &row, key);
        self.exec(&stmt, DatabaseOperation::Insert).await?;
        Ok(())
    }

    /// Set the columns in `data` on every row matching `wheres`
    ///
    /// If the table declares an updated-at column that `data` does not
    /// supply, the current Unix timestamp is written to it. Returns the
    /// number of affected rows.
    pub async fn update(
        &self,
        wheres: &[Where],
        mut data: BTreeMap<String, Value>,
    ) -> Result<u64> {
        if let Some(column) = self.table.updated_at_column() {
            if data.get(column).map_or(true, Value::is_null) {
                data.insert(column.to_string(), Value::Int(now_unix()));
            }
        }

        if data.is_empty() {
            return Err(Error::InvalidInput("no columns to update".to_string()));
        }

        let query = self.query(wheres)?;
        if !query.has_conditions() {
            return Err(Error::MissingWhereClause);
        }

        self.exec(&query.update_sql(&data), DatabaseOperation::Update)
            .await
    }

    /// Remove every row matching `wheres`
    pub async fn delete(&self, wheres: &[Where]) -> Result<u64> {
        let query = self.query(wheres)?;
        if !query.has_conditions() {
            return Err(Error::MissingWhereClause);
        }

        self.exec(&query.delete_sql(), DatabaseOperation::Delete)
            .await
    }

    /// Mark every row matching `wheres` as deleted
    ///
    /// Writes the current Unix timestamp to `deleted_at` through
    /// [`update`](Self::update).
    pub async fn soft_delete(&self, wheres: &[Where]) -> Result<u64> {
        let mut data = BTreeMap::new();
        data.insert(DELETED_AT.to_string(), Value::Int(now_unix()));
        self.update(wheres, data).await
    }

    /// Total count of rows matching `wheres` plus one page of them
    ///
    /// The page is only fetched when the count is non-zero; otherwise
    /// `target` is left untouched. On success `target` holds the page.
    pub async fn list_page_with_count<R: DeserializeOwned>(
        &self,
        wheres: &[Where],
        page: Pagination,
        order: &str,
        target: &mut Vec<R>,
    ) -> Result<u64> {
        let query = self.query(wheres)?;

        let count = self.fetch_count(&query.count_sql()).await?;
        if count == 0 {
            return Ok(0);
        }

        let stmt = query
            .offset(page.offset)
            .limit(page.limit)
            .order(order)
            .select_sql();
        *target = self
            .fetch(&stmt)
            .await?
            .into_iter()
            .map(decode::<R>)
            .collect::<Result<Vec<R>>>()?;

        Ok(count)
    }

    async fn fetch(&self, stmt: &Statement) -> Result<Vec<Record>> {
        tracing::debug!(
            table = self.table.table_name(),
            sql = %stmt.sql,
            binds = stmt.binds.len(),
            "fetching rows"
        );
        self.conn.fetch_all(stmt).await
    }

    async fn fetch_count(&self, stmt: &Statement) -> Result<u64> {
        let records = self.fetch(stmt).await?;
        let count = records
            .first()
            .and_then(|r| r.get("count"))
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                Error::Database(DatabaseError::type_conversion(
                    "COUNT(*) did not return an unsigned integer",
                ))
            })?;
        Ok(count)
    }

    async fn exec(&self, stmt: &Statement, operation: DatabaseOperation) -> Result<u64> {
        tracing::debug!(
            table = self.table.table_name(),
            sql = %stmt.sql,
            binds = stmt.binds.len(),
            "executing {}",
            operation
        );
        self.conn.execute(stmt).await.map_err(|e| match e {
            Error::Database(db) => Error::Database(db.with_operation(operation)),
            other => other,
        })
    }
}

fn decode<R: DeserializeOwned>(record: Record) -> Result<R> {
    Ok(serde_json::from_value(serde_json::Value::Object(record))?)
}

fn encode<R: Table + Serialize>(record: &R) -> Result<BTreeMap<String, Value>> {
    let fields = match serde_json::to_value(record)? {
        serde_json::Value::Object(fields) => fields,
        other => {
            return Err(Error::InvalidInput(format!(
                "record must serialize to an object, got {}",
                other
            )))
        }
    };

    let binary = record.binary_columns();
    fields
        .into_iter()
        .map(|(column, value)| {
            let value = if binary.iter().any(|c| *c == column.as_str()) {
                bytes_of(&column, value)?
            } else {
                Value::from(value)
            };
            Ok((column, value))
        })
        .collect()
}

fn bytes_of(column: &str, value: serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(Value::Bytes)
            .ok_or_else(|| {
                Error::InvalidInput(format!("binary column '{}' holds a non-byte element", column))
            }),
        serde_json::Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
        other => Err(Error::InvalidInput(format!(
            "binary column '{}' must serialize to bytes, got {}",
            column, other
        ))),
    }
}

fn with_key_tiebreaker(order: &str, key: &str) -> String {
    let order = order.trim();
    if order.is_empty() {
        return key.to_string();
    }

    let sorts_on_key = order.split(',').any(|term| {
        term.split_whitespace()
            .next()
            .is_some_and(|column| column.trim_matches('`').eq_ignore_ascii_case(key))
    });
    if sorts_on_key {
        order.to_string()
    } else {
        format!("{}, {}", order, key)
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseErrorKind;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every statement and replays canned responses in order
    #[derive(Default)]
    struct MockConnection {
        statements: Mutex<Vec<Statement>>,
        rows: Mutex<VecDeque<Vec<Record>>>,
        affected: u64,
    }

    impl MockConnection {
        fn with_rows(batches: Vec<Vec<Record>>) -> Self {
            Self {
                rows: Mutex::new(batches.into()),
                ..Self::default()
            }
        }

        fn with_affected(affected: u64) -> Self {
            Self {
                affected,
                ..Self::default()
            }
        }

        fn statements(&self) -> Vec<Statement> {
            self.statements.lock().unwrap().clone()
        }
    }

    impl Connection for MockConnection {
        async fn fetch_all(&self, stmt: &Statement) -> Result<Vec<Record>> {
            self.statements.lock().unwrap().push(stmt.clone());
            Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn execute(&self, stmt: &Statement) -> Result<u64> {
            self.statements.lock().unwrap().push(stmt.clone());
            Ok(self.affected)
        }
    }

    struct FailingConnection;

    impl Connection for FailingConnection {
        async fn fetch_all(&self, _stmt: &Statement) -> Result<Vec<Record>> {
            Err(DatabaseError::query_failed("server has gone away").into())
        }

        async fn execute(&self, _stmt: &Statement) -> Result<u64> {
            Err(DatabaseError::query_failed("server has gone away").into())
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct User {
        id: Option<u64>,
        name: String,
    }

    impl Table for User {
        fn table_name(&self) -> &str {
            "users"
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Post {
        id: u64,
        title: String,
        updated_at: i64,
    }

    impl Table for Post {
        fn table_name(&self) -> &str {
            "posts"
        }

        fn updated_at_column(&self) -> Option<&str> {
            Some("updated_at")
        }
    }

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    fn count_row(n: u64) -> Vec<Record> {
        vec![record(serde_json::json!({ "count": n }))]
    }

    fn data(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_first_orders_by_primary_key_and_limits() {
        let conn = MockConnection::with_rows(vec![vec![record(
            serde_json::json!({ "id": 1, "name": "bob" }),
        )]]);
        let repo = Repo::with_conn(User::default(), &conn);

        let user: User = repo.first(&[Where::eq("name", "bob")], "").await.unwrap();
        assert_eq!(
            user,
            User {
                id: Some(1),
                name: "bob".to_string()
            }
        );

        let stmts = conn.statements();
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            stmts[0].sql,
            "SELECT * FROM `users` WHERE name = ? ORDER BY id LIMIT ?"
        );
        assert_eq!(stmts[0].binds, vec![Value::from("bob"), Value::UInt(1)]);
    }

    #[tokio::test]
    async fn test_first_missing_row_is_database_not_found() {
        let conn = MockConnection::default();
        let repo = Repo::with_conn("users", &conn);

        let err = repo
            .first::<User>(&[Where::eq("id", 99_i64)], "id DESC")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        match err {
            Error::Database(db) => assert_eq!(db.kind, DatabaseErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_find_decodes_all_rows() {
        let conn = MockConnection::with_rows(vec![vec![
            record(serde_json::json!({ "id": 1, "name": "a" })),
            record(serde_json::json!({ "id": 2, "name": "b" })),
        ]]);
        let repo = Repo::with_conn("users", &conn);

        let users: Vec<User> = repo
            .find(&[Where::in_list("id", vec![1_i64, 2])], "id ASC")
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(
            conn.statements()[0].sql,
            "SELECT * FROM `users` WHERE id IN (?, ?) ORDER BY id ASC"
        );
    }

    #[tokio::test]
    async fn test_invalid_condition_never_reaches_connection() {
        let conn = MockConnection::default();
        let repo = Repo::with_conn("users", &conn);

        let result = repo
            .find::<User>(&[Where::new("created_at", "BETWEEN", 1_i64)], "")
            .await;
        assert!(matches!(result, Err(Error::InvalidCondition { .. })));
        assert!(conn.statements().is_empty());
    }

    #[tokio::test]
    async fn test_insert_skips_null_primary_key() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn("users", &conn);

        repo.insert(&User {
            id: None,
            name: "bob".to_string(),
        })
        .await
        .unwrap();

        let stmts = conn.statements();
        assert_eq!(stmts[0].sql, "INSERT INTO `users` (`name`) VALUES (?)");
        assert_eq!(stmts[0].binds, vec![Value::from("bob")]);
    }

    #[tokio::test]
    async fn test_save_without_key_inserts() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn("users", &conn);

        repo.save(&User {
            id: None,
            name: "bob".to_string(),
        })
        .await
        .unwrap();

        assert!(conn.statements()[0].sql.starts_with("INSERT INTO `users`"));
        assert!(!conn.statements()[0].sql.contains("ON DUPLICATE KEY"));
    }

    #[tokio::test]
    async fn test_save_with_key_upserts() {
        let conn = MockConnection::with_affected(2);
        let repo = Repo::with_conn("users", &conn);

        repo.save(&User {
            id: Some(5),
            name: "bob".to_string(),
        })
        .await
        .unwrap();

        let stmts = conn.statements();
        assert_eq!(
            stmts[0].sql,
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
        );
        assert_eq!(stmts[0].binds, vec![Value::Int(5), Value::from("bob")]);
    }

    #[tokio::test]
    async fn test_update_injects_updated_at_when_declared() {
        let conn = MockConnection::with_affected(3);
        let repo = Repo::with_conn(Post::default(), &conn);

        let before = now_unix();
        let affected = repo
            .update(&[Where::eq("id", 1_i64)], data(&[("title", Value::from("t"))]))
            .await
            .unwrap();
        assert_eq!(affected, 3);

        let stmt = &conn.statements()[0];
        assert_eq!(
            stmt.sql,
            "UPDATE `posts` SET `title` = ?, `updated_at` = ? WHERE id = ?"
        );
        match &stmt.binds[1] {
            Value::Int(ts) => assert!(*ts >= before),
            other => panic!("unexpected updated_at bind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_keeps_explicit_updated_at() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn(Post::default(), &conn);

        repo.update(
            &[Where::eq("id", 1_i64)],
            data(&[("updated_at", Value::Int(42))]),
        )
        .await
        .unwrap();

        assert_eq!(
            conn.statements()[0].binds,
            vec![Value::Int(42), Value::Int(1)]
        );
    }

    #[tokio::test]
    async fn test_update_without_updated_at_column() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn("users", &conn);

        repo.update(&[Where::eq("id", 1_i64)], data(&[("name", Value::from("x"))]))
            .await
            .unwrap();

        assert_eq!(
            conn.statements()[0].sql,
            "UPDATE `users` SET `name` = ? WHERE id = ?"
        );
    }

    #[tokio::test]
    async fn test_update_requires_conditions_and_columns() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn("users", &conn);

        let err = repo
            .update(&[], data(&[("name", Value::from("x"))]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingWhereClause));

        let err = repo
            .update(&[Where::eq("id", 1_i64)], BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert!(conn.statements().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let conn = MockConnection::with_affected(4);
        let repo = Repo::with_conn("users", &conn);

        let affected = repo
            .delete(&[Where::lt("created_at", 1000_i64)])
            .await
            .unwrap();
        assert_eq!(affected, 4);
        assert_eq!(
            conn.statements()[0].sql,
            "DELETE FROM `users` WHERE created_at < ?"
        );

        let err = repo.delete(&[]).await.unwrap_err();
        assert!(matches!(err, Error::MissingWhereClause));
    }

    #[tokio::test]
    async fn test_soft_delete_goes_through_update() {
        let wheres = [Where::eq("id", 8_i64)];

        let soft_conn = MockConnection::with_affected(1);
        let soft = Repo::with_conn("users", &soft_conn)
            .soft_delete(&wheres)
            .await
            .unwrap();

        let update_conn = MockConnection::with_affected(1);
        let direct = Repo::with_conn("users", &update_conn)
            .update(&wheres, data(&[(DELETED_AT, Value::Int(now_unix()))]))
            .await
            .unwrap();

        assert_eq!(soft, direct);
        let stmt = &soft_conn.statements()[0];
        assert_eq!(stmt.sql, "UPDATE `users` SET `deleted_at` = ? WHERE id = ?");
        assert!(matches!(stmt.binds[0], Value::Int(ts) if ts > 0));
    }

    #[tokio::test]
    async fn test_soft_delete_also_stamps_updated_at() {
        let conn = MockConnection::with_affected(1);
        Repo::with_conn(Post::default(), &conn)
            .soft_delete(&[Where::eq("id", 1_i64)])
            .await
            .unwrap();

        assert_eq!(
            conn.statements()[0].sql,
            "UPDATE `posts` SET `deleted_at` = ?, `updated_at` = ? WHERE id = ?"
        );
    }

    #[tokio::test]
    async fn test_page_with_zero_count_skips_fetch() {
        let conn = MockConnection::with_rows(vec![count_row(0)]);
        let repo = Repo::with_conn("users", &conn);

        let mut target = vec![User {
            id: Some(1),
            name: "untouched".to_string(),
        }];
        let count = repo
            .list_page_with_count(
                &[Where::eq("status", 1_i64)],
                Pagination::first_page(10),
                "id",
                &mut target,
            )
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].name, "untouched");

        let stmts = conn.statements();
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].sql.starts_with("SELECT COUNT(*)"));
    }

    #[tokio::test]
    async fn test_page_with_rows_issues_count_then_bounded_fetch() {
        let conn = MockConnection::with_rows(vec![
            count_row(42),
            vec![
                record(serde_json::json!({ "id": 21, "name": "u21" })),
                record(serde_json::json!({ "id": 22, "name": "u22" })),
            ],
        ]);
        let repo = Repo::with_conn("users", &conn);

        let mut target: Vec<User> = Vec::new();
        let count = repo
            .list_page_with_count(
                &[Where::eq("status", 1_i64)],
                Pagination::page(2, 20),
                "id DESC",
                &mut target,
            )
            .await
            .unwrap();

        assert_eq!(count, 42);
        assert_eq!(target.len(), 2);

        let stmts = conn.statements();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].sql,
            "SELECT COUNT(*) AS count FROM `users` WHERE status = ?"
        );
        assert_eq!(
            stmts[1].sql,
            "SELECT * FROM `users` WHERE status = ? ORDER BY id DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            stmts[1].binds,
            vec![Value::Int(1), Value::UInt(20), Value::UInt(20)]
        );
    }

    #[tokio::test]
    async fn test_count() {
        let conn = MockConnection::with_rows(vec![count_row(7)]);
        let repo = Repo::with_conn("users", &conn);
        assert_eq!(repo.count(&[]).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let repo = Repo::with_conn("users", FailingConnection);

        let err = repo.find::<User>(&[], "").await.unwrap_err();
        assert!(matches!(err, Error::Database(ref db) if db.kind == DatabaseErrorKind::QueryFailed));

        let err = repo.delete(&[Where::eq("id", 1_i64)]).await.unwrap_err();
        match err {
            Error::Database(db) => {
                assert_eq!(db.kind, DatabaseErrorKind::QueryFailed);
                assert_eq!(db.operation, DatabaseOperation::Delete);
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut target: Vec<User> = Vec::new();
        let err = repo
            .list_page_with_count(&[], Pagination::default(), "", &mut target)
            .await;
        assert!(err.is_err());
        assert!(target.is_empty());
    }

    #[derive(Debug, Default, Serialize)]
    struct Blob {
        id: Option<u64>,
        data: Vec<u8>,
        tags: Vec<u8>,
    }

    impl Table for Blob {
        fn table_name(&self) -> &str {
            "blobs"
        }

        fn binary_columns(&self) -> &[&str] {
            &["data"]
        }
    }

    #[tokio::test]
    async fn test_insert_binds_binary_columns_as_bytes() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn("blobs", &conn);

        repo.insert(&Blob {
            id: None,
            data: vec![1, 2, 3],
            tags: vec![4],
        })
        .await
        .unwrap();

        let stmt = &conn.statements()[0];
        assert_eq!(stmt.sql, "INSERT INTO `blobs` (`data`, `tags`) VALUES (?, ?)");
        assert_eq!(stmt.binds[0], Value::Bytes(vec![1, 2, 3]));
        assert_eq!(stmt.binds[1], Value::Json(serde_json::json!([4])));
    }

    #[tokio::test]
    async fn test_save_binds_binary_columns_as_bytes() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn("blobs", &conn);

        repo.save(&Blob {
            id: Some(3),
            data: Vec::new(),
            tags: Vec::new(),
        })
        .await
        .unwrap();

        let stmt = &conn.statements()[0];
        assert!(stmt.sql.contains("ON DUPLICATE KEY UPDATE"));
        assert_eq!(stmt.binds[0], Value::Bytes(Vec::new()));
        assert_eq!(stmt.binds[1], Value::Int(3));
    }

    #[test]
    fn test_binary_column_rejects_non_byte_values() {
        let err = bytes_of("data", serde_json::json!([1, 256])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(
            bytes_of("data", serde_json::Value::Null).unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn test_save_with_zero_key_inserts_without_key() {
        let conn = MockConnection::with_affected(1);
        let repo = Repo::with_conn("posts", &conn);

        repo.save(&Post {
            id: 0,
            title: "draft".to_string(),
            updated_at: 7,
        })
        .await
        .unwrap();

        let stmt = &conn.statements()[0];
        assert_eq!(
            stmt.sql,
            "INSERT INTO `posts` (`title`, `updated_at`) VALUES (?, ?)"
        );
        assert_eq!(stmt.binds, vec![Value::from("draft"), Value::Int(7)]);
    }

    #[tokio::test]
    async fn test_first_appends_primary_key_to_explicit_order() {
        let conn = MockConnection::with_rows(vec![vec![record(
            serde_json::json!({ "id": 3, "name": "c" }),
        )]]);
        let repo = Repo::with_conn(User::default(), &conn);

        let _: User = repo.first(&[], "created_at DESC").await.unwrap();
        assert_eq!(
            conn.statements()[0].sql,
            "SELECT * FROM `users` ORDER BY created_at DESC, id LIMIT ?"
        );
    }

    #[test]
    fn test_key_tiebreaker() {
        assert_eq!(with_key_tiebreaker("", "id"), "id");
        assert_eq!(with_key_tiebreaker("  ", "id"), "id");
        assert_eq!(with_key_tiebreaker("name", "id"), "name, id");
        assert_eq!(with_key_tiebreaker("id DESC", "id"), "id DESC");
        assert_eq!(with_key_tiebreaker("name, `ID` ASC", "id"), "name, `ID` ASC");
        assert_eq!(with_key_tiebreaker("ident", "id"), "ident, id");
    }
}
