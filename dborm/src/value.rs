//! Values bound into SQL statements
//!
//! [`Value`] is both the operand type of a [`Where`](crate::Where) condition
//! and the bind type of a rendered [`Statement`](crate::Statement).
//!
//! # Example
//!
//! ```rust
//! use dborm::Value;
//!
//! let name: Value = "alice".into();
//! let age: Value = 42_i64.into();
//! let ids: Value = vec![1_i64, 2, 3].into();
//!
//! assert_eq!(name, Value::String("alice".to_string()));
//! assert_eq!(age, Value::Int(42));
//! assert!(ids.is_list());
//! ```

use chrono::NaiveDateTime;
use std::fmt;

/// A value that can be bound as a statement parameter
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed 64-bit integer
    Int(i64),
    /// Unsigned 64-bit integer
    UInt(u64),
    /// 64-bit floating point value
    Float(f64),
    /// String value
    String(String),
    /// Raw bytes, a sequence of small unsigned values
    Bytes(Vec<u8>),
    /// Sequence of values (IN lists, BETWEEN pairs, RAW substitutions)
    List(Vec<Value>),
    /// JSON document
    Json(serde_json::Value),
    /// Date and time without time zone
    DateTime(NaiveDateTime),
}

impl Value {
    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value is a list
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Borrow the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is the zero value of its type
    ///
    /// Used to decide whether a primary key has been assigned yet.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(n) => *n == 0,
            Self::UInt(n) => *n == 0,
            Self::Float(n) => *n == 0.0,
            Self::String(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Json(v) => v.is_null(),
            Self::DateTime(_) => false,
        }
    }

    /// Render the value as a JSON document
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(n) => Json::from(*n),
            Self::UInt(n) => Json::from(*n),
            Self::Float(n) => Json::from(*n),
            Self::String(s) => Json::String(s.clone()),
            Self::Bytes(b) => Json::Array(b.iter().map(|x| Json::from(*x)).collect()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(v) => v.clone(),
            Self::DateTime(dt) => Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        }
    }

    /// Convert a byte sequence into a list of signed integers
    ///
    /// Any other value is returned unchanged.
    pub(crate) fn widen_bytes(self) -> Self {
        match self {
            Self::Bytes(bytes) => {
                Self::List(bytes.into_iter().map(|b| Self::Int(i64::from(b))).collect())
            }
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::UInt(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "'{}'", s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Self::Json(v) => write!(f, "{}", v),
            Self::DateTime(dt) => write!(f, "'{}'", dt),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::UInt(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::UInt(u64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<Value>> for Value {
    fn from(list: Vec<Value>) -> Self {
        Self::List(list)
    }
}

impl From<Vec<i64>> for Value {
    fn from(list: Vec<i64>) -> Self {
        Self::List(list.into_iter().map(Self::Int).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(list: Vec<String>) -> Self {
        Self::List(list.into_iter().map(Self::String).collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(list: Vec<&str>) -> Self {
        Self::List(list.into_iter().map(Self::from).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Self::List(vec![a.into(), b.into()])
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// Scalars map directly; arrays and objects are kept as JSON documents.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}
