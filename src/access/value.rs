use crate::storage::{StorageError, StorageResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Maximum number of bytes stored for a `Varchar` value.
pub const STRING_LEN: usize = 128;

/// Data types supported by the database. Every type has a fixed on-disk width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Varchar,
}

impl DataType {
    /// Number of bytes a value of this type occupies inside a tuple slot.
    pub fn fixed_len(&self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::Int32 => 4,
            DataType::Varchar => 4 + STRING_LEN,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Int32 => write!(f, "INT"),
            DataType::Varchar => write!(f, "VARCHAR"),
        }
    }
}

/// Comparison operators usable in predicates and selectivity estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring match on strings, equality otherwise.
    Like,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::Like => "LIKE",
        };
        write!(f, "{}", s)
    }
}

/// Values that can be stored in the database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    String(String),
}

impl Value {
    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Int32(_) => DataType::Int32,
            Value::String(_) => DataType::Varchar,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Orders two values of the same type. Values of different types are
    /// incomparable.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Evaluates `self <op> other`. Comparisons across types are false.
    pub fn compare(&self, op: CompareOp, other: &Value) -> bool {
        if op == CompareOp::Like {
            return match (self, other) {
                (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
                _ => self == other,
            };
        }

        let Some(ordering) = self.partial_compare(other) else {
            return false;
        };
        match op {
            CompareOp::Equals => ordering == Ordering::Equal,
            CompareOp::NotEquals => ordering != Ordering::Equal,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::GreaterThanOrEq => ordering != Ordering::Less,
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEq => ordering != Ordering::Greater,
            CompareOp::Like => unreachable!("handled above"),
        }
    }

    /// Appends the fixed-width encoding of this value.
    pub fn encode(&self, out: &mut Vec<u8>) -> StorageResult<()> {
        match self {
            Value::Boolean(b) => out.push(u8::from(*b)),
            Value::Int32(v) => out.write_i32::<LittleEndian>(*v)?,
            Value::String(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > STRING_LEN {
                    return Err(StorageError::InvalidTupleData(format!(
                        "string of {} bytes exceeds the {} byte limit",
                        bytes.len(),
                        STRING_LEN
                    )));
                }
                out.write_u32::<LittleEndian>(bytes.len() as u32)?;
                out.extend_from_slice(bytes);
                out.resize(out.len() + STRING_LEN - bytes.len(), 0);
            }
        }
        Ok(())
    }

    /// Decodes one value of `data_type` from the front of `buf`, advancing it.
    pub fn decode(data_type: DataType, buf: &mut &[u8]) -> StorageResult<Value> {
        if buf.len() < data_type.fixed_len() {
            return Err(StorageError::InvalidTupleData(format!(
                "need {} bytes for {}, have {}",
                data_type.fixed_len(),
                data_type,
                buf.len()
            )));
        }

        match data_type {
            DataType::Boolean => match buf.read_u8()? {
                0 => Ok(Value::Boolean(false)),
                1 => Ok(Value::Boolean(true)),
                other => Err(StorageError::InvalidTupleData(format!(
                    "invalid boolean byte {}",
                    other
                ))),
            },
            DataType::Int32 => Ok(Value::Int32(buf.read_i32::<LittleEndian>()?)),
            DataType::Varchar => {
                let len = buf.read_u32::<LittleEndian>()? as usize;
                if len > STRING_LEN {
                    return Err(StorageError::InvalidTupleData(format!(
                        "string length {} exceeds {}",
                        len, STRING_LEN
                    )));
                }
                let (payload, rest) = buf.split_at(STRING_LEN);
                let s = std::str::from_utf8(&payload[..len])
                    .map_err(|e| StorageError::InvalidTupleData(e.to_string()))?;
                *buf = rest;
                Ok(Value::String(s.to_string()))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}
