//! Statement rendering
//!
//! [`Query`] collects the pieces of a single-table statement (conditions,
//! ordering, paging) and renders them into a [`Statement`] with `?`
//! placeholders. It does no I/O; a [`Connection`](crate::Connection)
//! executes the result.

use std::collections::BTreeMap;

use crate::condition::{Clause, Where};
use crate::error::Result;
use crate::value::Value;

/// SQL text plus its bound values, ready for execution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    /// SQL with `?` placeholders
    pub sql: String,
    /// One value per placeholder, in order
    pub binds: Vec<Value>,
}

impl Statement {
    /// Create a statement
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }
}

/// Quote a table or column identifier with backticks
///
/// Embedded backticks are doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Builder for single-table statements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    table: String,
    clauses: Vec<Clause>,
    order: Option<String>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl Query {
    /// Start a query on `table`
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Add a translated clause, conjoined with `AND`
    #[must_use]
    pub fn filter(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Translate and add each descriptor, in order
    pub fn apply(mut self, wheres: &[Where]) -> Result<Self> {
        for w in wheres {
            self.clauses.push(w.to_clause()?);
        }
        Ok(self)
    }

    /// Set the ordering expression; an empty expression clears it
    #[must_use]
    pub fn order(mut self, order: impl Into<String>) -> Self {
        let order = order.into();
        self.order = if order.trim().is_empty() {
            None
        } else {
            Some(order)
        };
        self
    }

    /// Skip the first `offset` rows
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Return at most `limit` rows
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether any condition has been added
    pub fn has_conditions(&self) -> bool {
        !self.clauses.is_empty()
    }

    /// Name of the table this query targets
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// `SELECT * FROM ... [WHERE] [ORDER BY] [LIMIT] [OFFSET]`
    pub fn select_sql(&self) -> Statement {
        let mut stmt = Statement::new(
            format!("SELECT * FROM {}", quote_identifier(&self.table)),
            Vec::new(),
        );
        self.push_where(&mut stmt);

        if let Some(order) = &self.order {
            stmt.sql.push_str(" ORDER BY ");
            stmt.sql.push_str(order);
        }

        // MySQL needs a LIMIT before OFFSET
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                stmt.sql.push_str(" LIMIT ?");
                stmt.binds.push(Value::UInt(limit));
                if let Some(offset) = offset {
                    stmt.sql.push_str(" OFFSET ?");
                    stmt.binds.push(Value::UInt(offset));
                }
            }
            (None, Some(offset)) => {
                stmt.sql.push_str(" LIMIT 18446744073709551615 OFFSET ?");
                stmt.binds.push(Value::UInt(offset));
            }
            (None, None) => {}
        }

        stmt
    }

    /// `SELECT COUNT(*) AS count FROM ... [WHERE]`
    ///
    /// Ordering and paging do not apply to a count.
    pub fn count_sql(&self) -> Statement {
        let mut stmt = Statement::new(
            format!("SELECT COUNT(*) AS count FROM {}", quote_identifier(&self.table)),
            Vec::new(),
        );
        self.push_where(&mut stmt);
        stmt
    }

    /// `UPDATE ... SET col = ?, ... [WHERE]`
    pub fn update_sql(&self, data: &BTreeMap<String, Value>) -> Statement {
        let assignments = data
            .keys()
            .map(|column| format!("{} = ?", quote_identifier(column)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = Statement::new(
            format!("UPDATE {} SET {}", quote_identifier(&self.table), assignments),
            data.values().cloned().collect(),
        );
        self.push_where(&mut stmt);
        stmt
    }

    /// `DELETE FROM ... [WHERE]`
    pub fn delete_sql(&self) -> Statement {
        let mut stmt = Statement::new(
            format!("DELETE FROM {}", quote_identifier(&self.table)),
            Vec::new(),
        );
        self.push_where(&mut stmt);
        stmt
    }

    fn push_where(&self, stmt: &mut Statement) {
        if self.clauses.is_empty() {
            return;
        }

        stmt.sql.push_str(" WHERE ");
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                stmt.sql.push_str(" AND ");
            }
            stmt.sql.push_str(&clause.sql);
            stmt.binds.extend(clause.binds.iter().cloned());
        }
    }
}

/// `INSERT INTO table (cols...) VALUES (?, ...)`
pub fn insert_sql(table: &str, row: &BTreeMap<String, Value>) -> Statement {
    let (columns, placeholders) = column_lists(row);
    Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns,
            placeholders
        ),
        row.values().cloned().collect(),
    )
}

/// Insert, or overwrite every non-key column when `key` already exists
pub fn upsert_sql(table: &str, row: &BTreeMap<String, Value>, key: &str) -> Statement {
    let mut stmt = insert_sql(table, row);

    let updates = row
        .keys()
        .filter(|column| column.as_str() != key)
        .map(|column| {
            let quoted = quote_identifier(column);
            format!("{} = VALUES({})", quoted, quoted)
        })
        .collect::<Vec<_>>();

    // A row with only the key still needs an assignment to be valid SQL
    let updates = if updates.is_empty() {
        let quoted = quote_identifier(key);
        format!("{} = {}", quoted, quoted)
    } else {
        updates.join(", ")
    };

    stmt.sql.push_str(" ON DUPLICATE KEY UPDATE ");
    stmt.sql.push_str(&updates);
    stmt
}

fn column_lists(row: &BTreeMap<String, Value>) -> (String, String) {
    let columns = row
        .keys()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; row.len()].join(", ");
    (columns, placeholders)
}
