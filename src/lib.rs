//! jobsql is a client-side execution driver for SQL statements run on a
//! remote, asynchronous, job-based query service.
//!
//! Statements are submitted as named jobs and polled to completion.
//! Data-producing queries are materialized into transient artifacts and
//! streamed back through a forward-only cursor; mutating statements
//! resolve to a row-affected count. The [`Statement`] controller owns the
//! cross-call state: the in-flight job, the live cursor and its backing
//! artifact, the one-shot update count and the trace-link warning.
//!
//! ```no_run
//! use jobsql::{connect, DriverConfig};
//!
//! # async fn run() -> jobsql::Result<()> {
//! let config = DriverConfig::from_endpoint("https://jobs.example.com")?;
//! let connection = connect(config)?;
//!
//! let mut statement = connection.create_statement();
//! let cursor = statement.execute_query("SELECT id, name FROM users").await?;
//! while let Some(row) = cursor.next().await? {
//!     println!("{row:?}");
//! }
//! statement.close().await;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod materialize;
pub mod poll;
pub mod service;
pub mod session;
pub mod statement;
pub mod submit;

pub use classify::{classify, StatementKind};
pub use config::DriverConfig;
pub use connection::{connect, Connection};
pub use cursor::ResultCursor;
pub use error::{DriverError, Result};
pub use service::{ColumnInfo, Row, Services, TaskStatus, Value};
pub use session::SessionProperties;
pub use statement::{CancelHandle, FetchDirection, Statement};
pub use submit::Warning;
