//! Journal entry types
//!
//! A `JournalEntry` is one recorded invocation of a mutating management
//! method: the method name, its ordered and typed arguments, and the
//! `Context` it ran in. Entries are immutable once built.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::context::Context;
use crate::ids::EntryId;
use crate::time::{format_date, truncate_to_millis};

/// Typed value of a method argument
///
/// `Stream` is the object-reference case: opaque content such as an object
/// serialization or datastream bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ArgumentValue {
    Null,
    String(String),
    StringArray(Vec<String>),
    Boolean(bool),
    Integer(i64),
    Date(DateTime<Utc>),
    Stream(Vec<u8>),
}

impl ArgumentValue {
    /// Date argument, truncated to journal precision.
    pub fn date(instant: DateTime<Utc>) -> Self {
        ArgumentValue::Date(truncate_to_millis(instant))
    }

    /// Serialized type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgumentValue::Null => "null",
            ArgumentValue::String(_) => "string",
            ArgumentValue::StringArray(_) => "string-array",
            ArgumentValue::Boolean(_) => "boolean",
            ArgumentValue::Integer(_) => "integer",
            ArgumentValue::Date(_) => "date",
            ArgumentValue::Stream(_) => "stream",
        }
    }
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Null => f.write_str("null"),
            ArgumentValue::String(s) => write!(f, "{:?}", s),
            ArgumentValue::StringArray(items) => write!(f, "{:?}", items),
            ArgumentValue::Boolean(b) => write!(f, "{}", b),
            ArgumentValue::Integer(i) => write!(f, "{}", i),
            ArgumentValue::Date(d) => f.write_str(&format_date(d)),
            ArgumentValue::Stream(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// A named method argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub name: String,
    pub value: ArgumentValue,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: ArgumentValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One recorded management-method invocation
///
/// The identifier is derived from the context's `now`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    id: EntryId,
    method: String,
    arguments: Vec<Argument>,
    context: Context,
}

impl JournalEntry {
    pub fn new(method: impl Into<String>, context: Context, arguments: Vec<Argument>) -> Self {
        Self {
            id: EntryId::from(context.now()),
            method: method.into(),
            arguments,
            context,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.context.now()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentValue> {
        self.arguments
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}
