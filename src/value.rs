//! Runtime values of primitive fields (used by `update`, dependency gates and repeat counts).

use std::cmp::Ordering;
use std::fmt;

/// Current value of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Signed integer (signed bit fields).
    Int(i64),
    /// Unsigned integer (unsigned bit fields, sizes).
    UInt(u64),
    /// Raw bytes (static, delimiter, string, group, random).
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(x) => Some(*x as i128),
            Value::UInt(x) => Some(*x as i128),
            Value::Bytes(_) => None,
        }
    }

    /// Integers compare numerically across signedness, bytes lexicographically.
    /// Mixed kinds are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Bytes(_), _) | (_, Value::Bytes(_)) => None,
            (a, b) => Some(a.as_i128()?.cmp(&b.as_i128()?)),
        }
    }

    /// Equality used by dependency gates: `Int(5)` matches `UInt(5)`.
    pub fn matches(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(x) => write!(f, "{}", x),
            Value::UInt(x) => write!(f, "{}", x),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Bytes(v.into_bytes())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
