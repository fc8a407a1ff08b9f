//! Cursor: per-query state machine over a connection.
//!
//! A cursor issues one request at a time, interprets the first reply
//! value as the header (status, column schema, row count) and every
//! subsequent value as a data row, converting cells through the type
//! registry. Header state is overwritten by each new query, never
//! merged.

use crate::connection::{Connection, Replies};
use crate::error::ClientError;
use crate::registry::{Param, TypeRegistry};
use qlizator_protocol::{status, Column, Operation, ReplyHeader, Request, Value};
use std::sync::Arc;

/// One result row: column name to converted value, in column order.
///
/// Duplicate column names keep their first position and their last
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    fn insert(&mut self, name: String, value: Value) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A cursor bound to one connection.
///
/// `rowcount` starts at -1 and `description` starts absent; both are
/// set from the header of each query and overwritten by the next one.
pub struct Cursor<'conn> {
    conn: &'conn mut Connection,
    rowcount: i64,
    columns: Option<Vec<Column>>,
}

impl<'conn> Cursor<'conn> {
    pub(crate) fn new(conn: &'conn mut Connection) -> Self {
        Self {
            conn,
            rowcount: -1,
            columns: None,
        }
    }

    /// Row count reported by the last query's header, -1 if unknown.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    /// Column schema of the last query, absent before the first one.
    pub fn description(&self) -> Option<&[Column]> {
        self.columns.as_deref()
    }

    /// Runs a statement with the EXECUTE opcode and drains the full
    /// reply.
    pub fn execute(&mut self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ClientError> {
        self.run(Operation::Execute, sql, params)?.collect()
    }

    /// Runs one `execute` per parameter set, sequentially.
    ///
    /// Not atomic: a failure part-way through aborts the remaining
    /// sets, and the effects of completed statements stand.
    pub fn execute_many(
        &mut self,
        sql: &str,
        param_sets: &[Vec<Param>],
    ) -> Result<Vec<Vec<Row>>, ClientError> {
        param_sets
            .iter()
            .map(|params| self.execute(sql, params))
            .collect()
    }

    /// Identical to [`execute`](Cursor::execute) with no parameters.
    pub fn execute_script(&mut self, sql: &str) -> Result<Vec<Row>, ClientError> {
        self.execute(sql, &[])
    }

    /// Runs a statement with the FETCH opcode and drains the full
    /// reply.
    pub fn fetch_all(&mut self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ClientError> {
        self.run(Operation::Fetch, sql, params)?.collect()
    }

    /// Runs a statement with the FETCH opcode and returns the rows as
    /// a lazy, single-pass iterator. Dropping the iterator drains the
    /// rest of the reply so the connection stays usable.
    pub fn fetch_iter(&mut self, sql: &str, params: &[Param]) -> Result<Rows<'_>, ClientError> {
        self.run(Operation::Fetch, sql, params)
    }

    /// Returns the first result row, discarding the rest of the reply.
    pub fn fetch_one(&mut self, sql: &str, params: &[Param]) -> Result<Option<Row>, ClientError> {
        let mut rows = self.run(Operation::Fetch, sql, params)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    /// Transmits a query request and processes its header, leaving the
    /// reply positioned at the first row.
    fn run(
        &mut self,
        operation: Operation,
        sql: &str,
        params: &[Param],
    ) -> Result<Rows<'_>, ClientError> {
        let registry = Arc::clone(self.conn.registry());
        let parameters = params
            .iter()
            .map(|param| registry.encode_param(param))
            .collect::<Result<Vec<_>, _>>()?;

        let request = Request::Query {
            database: self.conn.database().to_string(),
            operation,
            query: sql.to_string(),
            parameters,
        }
        .to_value();

        self.rowcount = -1;
        self.columns = None;

        let mut replies = self.conn.transmit(&request)?;
        let first = match replies.next() {
            Some(Ok(value)) => value,
            Some(Err(err)) => return Err(err),
            None => return Err(ClientError::UnrecognizedReply),
        };

        let header = ReplyHeader::from_value(&first).ok_or(ClientError::UnrecognizedReply)?;
        if header.status != status::OK {
            return Err(ClientError::server(&header));
        }
        // query replies always carry a schema
        let columns = header.columns.ok_or(ClientError::UnrecognizedReply)?;

        self.rowcount = header.rowcount;
        self.columns = Some(columns.clone());

        Ok(Rows {
            replies,
            columns,
            registry,
            finished: false,
        })
    }
}

/// Lazy, single-pass sequence of result rows.
///
/// On drop, any unconsumed remainder of the reply is drained so the
/// underlying connection is left positioned at end-of-reply.
pub struct Rows<'a> {
    replies: Replies<'a>,
    columns: Vec<Column>,
    registry: Arc<TypeRegistry>,
    finished: bool,
}

impl Rows<'_> {
    /// Positionally zips raw cells against the column schema, applying
    /// registered decoders per cell. Cells beyond the schema are
    /// ignored, as are columns beyond the row.
    fn convert(&self, value: Value) -> Result<Row, ClientError> {
        let cells = match value {
            Value::Array(cells) => cells,
            _ => return Err(ClientError::UnrecognizedReply),
        };
        let mut row = Row::default();
        for (column, raw) in self.columns.iter().zip(cells) {
            row.insert(
                column.name.clone(),
                self.registry.decode_value(raw, &column.type_name),
            );
        }
        Ok(row)
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Row, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.replies.next() {
            None => {
                self.finished = true;
                None
            }
            Some(Err(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            Some(Ok(value)) => match self.convert(value) {
                Ok(row) => Some(Ok(row)),
                Err(err) => {
                    self.finished = true;
                    Some(Err(err))
                }
            },
        }
    }
}

impl Drop for Rows<'_> {
    fn drop(&mut self) {
        for _ in self.replies.by_ref() {}
    }
}
