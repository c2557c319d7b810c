//! Forward-only result cursor.
//!
//! Wraps a transfer read session in a row iterator bound to the artifact's
//! column schema. Rows are pulled in batches of the configured fetch size
//! and delivery stops at the max-row bound when one is set.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::{DriverError, Result};
use crate::service::{ColumnInfo, ReadSession, Row};

/// A forward-only iterator over the rows of a materialized artifact.
pub struct ResultCursor {
    schema: Vec<ColumnInfo>,
    session: Box<dyn ReadSession>,
    buffer: VecDeque<Row>,
    fetch_size: usize,
    /// Upper bound on delivered rows; 0 means unlimited.
    max_rows: usize,
    delivered: usize,
    exhausted: bool,
    closed: bool,
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("schema", &self.schema)
            .field("session_id", &self.session.id())
            .field("fetch_size", &self.fetch_size)
            .field("max_rows", &self.max_rows)
            .field("delivered", &self.delivered)
            .field("exhausted", &self.exhausted)
            .field("closed", &self.closed)
            .finish()
    }
}

impl ResultCursor {
    /// Creates a cursor over the given session.
    pub fn new(
        schema: Vec<ColumnInfo>,
        session: Box<dyn ReadSession>,
        fetch_size: usize,
        max_rows: usize,
    ) -> Self {
        Self {
            schema,
            session,
            buffer: VecDeque::new(),
            fetch_size: fetch_size.max(1),
            max_rows,
            delivered: 0,
            exhausted: false,
            closed: false,
        }
    }

    /// The ordered column schema of the result.
    pub fn schema(&self) -> &[ColumnInfo] {
        &self.schema
    }

    /// The transfer session id backing this cursor.
    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    /// Number of rows delivered so far.
    pub fn rows_delivered(&self) -> usize {
        self.delivered
    }

    /// Returns the next row, or `None` once the stream (or the max-row
    /// bound) is exhausted.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Err(DriverError::invalid_state("the cursor has been closed"));
        }

        if self.max_rows > 0 && self.delivered >= self.max_rows {
            return Ok(None);
        }

        if self.buffer.is_empty() && !self.exhausted {
            let batch = self.session.next_batch(self.fetch_size).await?;
            if batch.is_empty() {
                self.exhausted = true;
            } else {
                self.buffer.extend(batch);
            }
        }

        match self.buffer.pop_front() {
            Some(row) => {
                self.delivered += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Drains the remaining rows into a vector.
    pub async fn collect_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Closes the cursor. Idempotent; further `next` calls fail.
    pub fn close(&mut self) {
        if !self.closed {
            debug!("closing cursor over session id={}", self.session.id());
            self.buffer.clear();
            self.closed = true;
        }
    }

    /// Returns true once the cursor has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
