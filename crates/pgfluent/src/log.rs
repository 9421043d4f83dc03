//! Per-statement structured logging.
//!
//! Every statement that reaches the database goes through
//! [`StatementLogger::run`], which times it and emits `tracing` events under
//! the `pgfluent::sql` target:
//!
//! - `DEBUG` on success (SQL, elapsed time, row count, and the arguments only
//!   when parameter logging is enabled),
//! - `WARN` when the statement took longer than the slow-query threshold,
//! - `ERROR` on failure.
//!
//! Arguments can carry credentials or personal data, so they are never logged
//! or attached to errors unless `log_params` is set.

use crate::error::{SqlError, SqlResult};
use crate::value::Value;
use deadpool_postgres::PoolError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub(crate) const TARGET: &str = "pgfluent::sql";

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Logging settings shared by a connection and its transactions.
#[derive(Debug, Clone, Default)]
pub struct StatementLogger {
    /// Include bound arguments in log events.
    pub log_params: bool,
    /// Emit a warning for statements slower than this.
    pub slow_query_threshold: Option<Duration>,
    /// Truncate long SQL in log events (bytes). `None` logs it whole.
    pub max_sql_length: Option<usize>,
    // Shared by clones, so a connection and its transactions count together.
    pub(crate) slow: Arc<AtomicU64>,
}

impl StatementLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_params(mut self, enabled: bool) -> Self {
        self.log_params = enabled;
        self
    }

    pub fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub(crate) fn display_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    /// Statements that exceeded the slow-query threshold so far.
    pub fn slow_queries(&self) -> u64 {
        self.slow.load(Ordering::Relaxed)
    }

    pub(crate) fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_query_threshold.is_some_and(|t| elapsed > t)
    }

    /// Time `fut`, log the outcome, and wrap failures with statement context.
    ///
    /// The slow-query warning fires on elapsed time alone, whether the
    /// statement succeeded or not.
    pub(crate) async fn run<T, F>(
        &self,
        sql: &str,
        args: &[Value],
        rows: impl FnOnce(&T) -> u64,
        fut: F,
    ) -> SqlResult<T>
    where
        F: Future<Output = Result<T, Failure>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let shown = self.display_sql(sql);

        if self.is_slow(elapsed) {
            self.slow.fetch_add(1, Ordering::Relaxed);
            let threshold_ms = self
                .slow_query_threshold
                .map_or(0.0, |t| t.as_secs_f64() * 1000.0);
            tracing::warn!(target: TARGET, sql = %shown, elapsed_ms, threshold_ms, failed = result.is_err(), "slow query");
        }

        match result {
            Ok(value) => {
                let rows = rows(&value);
                if self.log_params {
                    tracing::debug!(target: TARGET, sql = %shown, args = ?args, elapsed_ms, rows, "statement executed");
                } else {
                    tracing::debug!(target: TARGET, sql = %shown, elapsed_ms, rows, "statement executed");
                }
                Ok(value)
            }
            Err(Failure::Exec(source)) => {
                tracing::error!(target: TARGET, sql = %shown, elapsed_ms, error = %source, "statement failed");
                Err(SqlError::Exec {
                    sql: sql.to_string(),
                    elapsed,
                    source,
                })
            }
            Err(Failure::Acquire(PoolError::Closed)) => Err(SqlError::ClosedConnection),
            Err(Failure::Acquire(err)) => {
                tracing::error!(target: TARGET, sql = %shown, elapsed_ms, error = %err, "connection acquire failed");
                Err(SqlError::Acquire {
                    sql: sql.to_string(),
                    elapsed,
                    message: err.to_string(),
                })
            }
        }
    }
}

/// Why a timed statement did not produce a result.
#[derive(Debug)]
pub(crate) enum Failure {
    /// No session could be checked out of the pool.
    Acquire(PoolError),
    /// The driver or server rejected the statement.
    Exec(tokio_postgres::Error),
}

impl From<PoolError> for Failure {
    fn from(err: PoolError) -> Self {
        Failure::Acquire(err)
    }
}

impl From<tokio_postgres::Error> for Failure {
    fn from(err: tokio_postgres::Error) -> Self {
        Failure::Exec(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadpool_postgres::TimeoutType;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT * FROM users", 8), "SELECT *");
        // 'é' is two bytes; cutting inside it backs off to the boundary.
        assert_eq!(truncate_sql_bytes("é", 1), "");
    }

    #[test]
    fn display_sql_truncates() {
        let logger = StatementLogger::new().max_sql_length(10);
        assert_eq!(logger.display_sql("SELECT * FROM users"), "SELECT * F...");
        assert_eq!(logger.display_sql("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn slow_threshold() {
        let logger = StatementLogger::new().slow_query_threshold(Duration::from_millis(50));
        assert!(logger.is_slow(Duration::from_millis(51)));
        assert!(!logger.is_slow(Duration::from_millis(50)));
        assert!(!StatementLogger::new().is_slow(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn run_passes_values_through() {
        let logger = StatementLogger::new().log_params(true);
        let out = logger
            .run("SELECT 1", &[Value::Int(1)], |n: &u64| *n, async {
                Ok::<u64, Failure>(3)
            })
            .await
            .unwrap();
        assert_eq!(out, 3);
    }

    #[tokio::test]
    async fn acquire_failure_keeps_statement_context() {
        let logger = StatementLogger::new().slow_query_threshold(Duration::ZERO);
        let err = logger
            .run("SELECT * FROM users WHERE id = $1", &[Value::Int(1)], |n: &u64| *n, async {
                tokio::time::sleep(Duration::from_millis(2)).await;
                Err::<u64, Failure>(Failure::Acquire(PoolError::Timeout(TimeoutType::Wait)))
            })
            .await
            .unwrap_err();
        match err {
            SqlError::Acquire { sql, elapsed, .. } => {
                assert_eq!(sql, "SELECT * FROM users WHERE id = $1");
                assert!(elapsed >= Duration::from_millis(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_pool_maps_to_closed_connection() {
        let err = StatementLogger::new()
            .run("SELECT 1", &[], |n: &u64| *n, async {
                Err::<u64, Failure>(Failure::Acquire(PoolError::Closed))
            })
            .await
            .unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn slow_failures_are_counted() {
        let logger = StatementLogger::new().slow_query_threshold(Duration::from_millis(1));
        let shared = logger.clone();
        let _ = logger
            .run("SELECT pg_sleep(1)", &[], |n: &u64| *n, async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err::<u64, Failure>(Failure::Acquire(PoolError::Timeout(TimeoutType::Wait)))
            })
            .await;
        let _ = logger
            .run("SELECT 1", &[], |n: &u64| *n, async { Ok::<u64, Failure>(1) })
            .await;
        assert_eq!(shared.slow_queries(), 1);
    }
}
