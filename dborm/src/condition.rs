//! Condition descriptors and their translation into SQL fragments
//!
//! A [`Where`] is a `(field, op, value)` triple. The operator tag is a
//! free-form string matched case-insensitively against a small vocabulary
//! (see [`Operator`]); anything outside it is emitted verbatim as a binary
//! comparison. Each descriptor translates independently into a [`Clause`],
//! and a sequence of descriptors is conjoined in order.
//!
//! # Example
//!
//! ```rust
//! use dborm::{Value, Where};
//!
//! let clause = Where::like("name", "smith").to_clause().unwrap();
//! assert_eq!(clause.sql, "name LIKE ?");
//! assert_eq!(clause.binds, vec![Value::from("%smith%")]);
//!
//! let clause = Where::between("age", 18, 65).to_clause().unwrap();
//! assert_eq!(clause.sql, "age BETWEEN ? AND ?");
//! assert_eq!(clause.binds, vec![Value::Int(18), Value::Int(65)]);
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// Operator vocabulary recognised by the translator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `field IN (...)`
    In,
    /// `field NOT IN (...)`
    NotIn,
    /// `field LIKE ?`, wildcards added unless present
    Like,
    /// `field NOT LIKE ?`, wildcards added unless present
    NotLike,
    /// `field BETWEEN ? AND ?`
    Between,
    /// `FIND_IN_SET(?, field)`
    FindInSet,
    /// Raw predicate held in the field slot
    Raw,
    /// Any other tag, emitted as `field <tag> ?`
    Compare(String),
}

impl Operator {
    /// Parse an operator tag
    ///
    /// Matching ignores case and surrounding or repeated whitespace, so
    /// `"not  in"` is [`Operator::NotIn`]. Unknown tags become
    /// [`Operator::Compare`] holding the trimmed tag as written.
    pub fn parse(tag: &str) -> Self {
        let trimmed = tag.trim();
        let normalized = trimmed
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        match normalized.as_str() {
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "BETWEEN" => Self::Between,
            "FIND_IN_SET" => Self::FindInSet,
            "RAW" => Self::Raw,
            _ => Self::Compare(trimmed.to_string()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::NotIn => write!(f, "NOT IN"),
            Self::Like => write!(f, "LIKE"),
            Self::NotLike => write!(f, "NOT LIKE"),
            Self::Between => write!(f, "BETWEEN"),
            Self::FindInSet => write!(f, "FIND_IN_SET"),
            Self::Raw => write!(f, "RAW"),
            Self::Compare(tag) => write!(f, "{}", tag),
        }
    }
}

/// A single condition descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    /// Column name, or the raw predicate for `RAW`
    pub field: String,
    /// Operator tag, matched case-insensitively
    pub op: String,
    /// Operand; its expected shape depends on the operator
    pub value: Value,
}

impl Where {
    /// Create a descriptor from its parts
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "=", value)
    }

    /// `field <> value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "<>", value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ">", value)
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, ">=", value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "<", value)
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "<=", value)
    }

    /// `field IN (values...)`
    pub fn in_list(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::new(field, "IN", values)
    }

    /// `field NOT IN (values...)`
    pub fn not_in(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::new(field, "NOT IN", values)
    }

    /// `field LIKE pattern`
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, "LIKE", Value::String(pattern.into()))
    }

    /// `field NOT LIKE pattern`
    pub fn not_like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, "NOT LIKE", Value::String(pattern.into()))
    }

    /// `field BETWEEN low AND high`
    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::new(field, "BETWEEN", Value::List(vec![low.into(), high.into()]))
    }

    /// `FIND_IN_SET(value, field)`
    pub fn find_in_set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "FIND_IN_SET", value)
    }

    /// Raw predicate with positional `?` substitutions
    ///
    /// The expression is emitted unchanged; callers are responsible for
    /// what it contains.
    pub fn raw(expr: impl Into<String>, args: Vec<Value>) -> Self {
        Self::new(expr, "RAW", Value::List(args))
    }

    /// The parsed operator of this descriptor
    pub fn operator(&self) -> Operator {
        Operator::parse(&self.op)
    }

    /// Translate the descriptor into a SQL fragment and its binds
    pub fn to_clause(&self) -> Result<Clause> {
        let op = self.operator();
        let field = self.field.as_str();

        match op {
            Operator::In | Operator::NotIn => {
                let operand = self.value.clone().widen_bytes();
                Clause::expand(format!("{} {} (?)", field, op), vec![operand])
                    .map_err(|reason| self.invalid(reason))
            }
            Operator::Like | Operator::NotLike => {
                let pattern = self
                    .value
                    .as_str()
                    .ok_or_else(|| self.invalid("expected a string pattern"))?;
                let pattern = if pattern.starts_with('%') || pattern.ends_with('%') {
                    pattern.to_string()
                } else {
                    format!("%{}%", pattern)
                };
                Ok(Clause::new(
                    format!("{} {} ?", field, op),
                    vec![Value::String(pattern)],
                ))
            }
            Operator::Between => match &self.value {
                Value::List(pair) if pair.len() == 2 => {
                    Clause::expand(format!("{} BETWEEN ? AND ?", field), pair.clone())
                        .map_err(|reason| self.invalid(reason))
                }
                _ => Err(self.invalid("expected a two-element list")),
            },
            Operator::FindInSet => {
                Clause::expand(format!("FIND_IN_SET(?, {})", field), vec![self.value.clone()])
                    .map_err(|reason| self.invalid(reason))
            }
            Operator::Raw => {
                let args = match &self.value {
                    Value::List(args) => args.clone(),
                    Value::Null => Vec::new(),
                    _ => return Err(self.invalid("expected a list of substitution values")),
                };
                Clause::expand(field.to_string(), args)
                    .map(Clause::grouped)
                    .map_err(|reason| self.invalid(reason))
            }
            Operator::Compare(tag) => {
                Clause::expand(format!("{} {} ?", field, tag), vec![self.value.clone()])
                    .map_err(|reason| self.invalid(reason))
            }
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidCondition {
            field: self.field.clone(),
            op: self.op.clone(),
            reason: reason.into(),
        }
    }
}

/// A translated condition: SQL text with `?` placeholders and flat binds
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// SQL text of the predicate
    pub sql: String,
    /// Values for the placeholders, in order
    pub binds: Vec<Value>,
}

impl Clause {
    /// Create a clause whose binds are already flat
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }

    /// Substitute `args` into the `?` placeholders of `template`
    ///
    /// A list argument expands to one placeholder per element. Directly
    /// after an opening parenthesis the elements are written bare
    /// (`IN (?)` becomes `IN (?, ?)`), elsewhere they are wrapped in their
    /// own parentheses. An empty list becomes `NULL` in the same positions.
    /// Placeholders inside single- or double-quoted literals are left alone;
    /// a backslash inside a literal escapes the next character.
    fn expand(template: String, args: Vec<Value>) -> std::result::Result<Self, String> {
        let expected = args.len();
        let mut args = args.into_iter();
        let mut sql = String::with_capacity(template.len());
        let mut binds = Vec::new();
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut prev: Option<char> = None;
        let mut used = 0;

        for c in template.chars() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                sql.push(c);
                prev = Some(c);
                continue;
            }

            match c {
                '\'' | '"' => {
                    quote = Some(c);
                    sql.push(c);
                }
                '?' => {
                    let arg = args.next().ok_or_else(|| {
                        format!("expected {} substitution value(s), found more placeholders", expected)
                    })?;
                    used += 1;
                    let after_paren = prev == Some('(');
                    match arg {
                        Value::List(items) => {
                            let body = if items.is_empty() {
                                "NULL".to_string()
                            } else {
                                vec!["?"; items.len()].join(", ")
                            };
                            if after_paren {
                                sql.push_str(&body);
                            } else {
                                sql.push('(');
                                sql.push_str(&body);
                                sql.push(')');
                            }
                            binds.extend(items);
                        }
                        other => {
                            sql.push('?');
                            binds.push(other);
                        }
                    }
                }
                _ => sql.push(c),
            }
            prev = Some(c);
        }

        if used < expected {
            return Err(format!(
                "{} substitution value(s) supplied for {} placeholder(s)",
                expected, used
            ));
        }

        Ok(Self { sql, binds })
    }

    /// Wrap the predicate in parentheses
    fn grouped(self) -> Self {
        Self {
            sql: format!("({})", self.sql),
            binds: self.binds,
        }
    }
}
