//! Request construction and reply header parsing.
//!
//! Every request is a single top-level map keyed by `endpoint`; every
//! reply starts with a header map carrying `status` and, for query
//! replies, the column schema and row count.

use rmpv::Value;

/// Server reply status codes.
///
/// Codes beyond these are server-defined and surfaced verbatim.
pub mod status {
    pub const OK: i64 = 0;
    pub const UNKNOWN_ERROR: i64 = 1;
    pub const INVALID_REQUEST: i64 = 2;
    pub const DESERIALIZATION_ERROR: i64 = 3;
    pub const DATABASE_OPENING_ERROR: i64 = 4;
    pub const DATABASE_NOT_FOUND: i64 = 5;
    pub const INVALID_QUERY: i64 = 6;
}

/// Query opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Run a statement and discard any extra results.
    Execute = 1,
    /// Retrieve the results of a statement.
    Fetch = 2,
}

impl Operation {
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// A request message, serialized to a top-level wire map.
#[derive(Debug, Clone)]
pub enum Request {
    Connect {
        database: String,
        /// Free-form option keys merged verbatim into the request map.
        options: Vec<(String, Value)>,
    },
    Drop {
        database: String,
    },
    Query {
        database: String,
        operation: Operation,
        query: String,
        parameters: Vec<Value>,
    },
}

impl Request {
    pub fn to_value(&self) -> Value {
        match self {
            Request::Connect { database, options } => {
                let mut fields = vec![
                    (Value::from("endpoint"), Value::from("connect")),
                    (Value::from("database"), Value::from(database.as_str())),
                ];
                fields.extend(
                    options
                        .iter()
                        .map(|(key, value)| (Value::from(key.as_str()), value.clone())),
                );
                Value::Map(fields)
            }
            Request::Drop { database } => Value::Map(vec![
                (Value::from("endpoint"), Value::from("drop")),
                (Value::from("database"), Value::from(database.as_str())),
            ]),
            Request::Query {
                database,
                operation,
                query,
                parameters,
            } => Value::Map(vec![
                (Value::from("endpoint"), Value::from("query")),
                (Value::from("operation"), Value::from(operation.code())),
                (Value::from("database"), Value::from(database.as_str())),
                (Value::from("query"), Value::from(query.as_str())),
                (Value::from("parameters"), Value::Array(parameters.clone())),
            ]),
        }
    }
}

/// One column of a query reply schema: name plus wire type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

/// The first value of every reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyHeader {
    pub status: i64,
    pub message: Option<String>,
    pub details: Option<String>,
    /// Present on query replies only.
    pub columns: Option<Vec<Column>>,
    /// -1 when the server does not know the count.
    pub rowcount: i64,
}

impl ReplyHeader {
    /// Parses a reply header, returning `None` when the value is not
    /// header-shaped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_map()?;
        let columns = match lookup(map, "columns") {
            Some(raw) => Some(parse_columns(raw)?),
            None => None,
        };
        Some(Self {
            status: lookup(map, "status")
                .and_then(Value::as_i64)
                .unwrap_or(status::UNKNOWN_ERROR),
            message: lookup(map, "message")
                .and_then(Value::as_str)
                .map(str::to_owned),
            details: lookup(map, "details")
                .and_then(Value::as_str)
                .map(str::to_owned),
            columns,
            rowcount: lookup(map, "rowcount").and_then(Value::as_i64).unwrap_or(-1),
        })
    }
}

fn lookup<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn parse_columns(value: &Value) -> Option<Vec<Column>> {
    value
        .as_array()?
        .iter()
        .map(|pair| {
            let pair = pair.as_array()?;
            Some(Column {
                name: pair.first()?.as_str()?.to_owned(),
                type_name: pair.get(1)?.as_str()?.to_owned(),
            })
        })
        .collect()
}
