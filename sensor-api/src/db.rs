use crate::errors::{Error, Result};
use crate::metrics::DB_FAILURES_TOTAL;
use crate::model::{NewReading, Reading, TimeRange};
use crate::store::ReadingStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

const READING_COLUMNS: &str = "id, sensor_id, sensor_value, timestamp, created_at, updated_at";

pub async fn make_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// PostgreSQL-backed reading store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, reading: &NewReading) -> Result<Reading> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO readings (sensor_id, sensor_value, timestamp, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {}",
            READING_COLUMNS
        );

        let saved = sqlx::query_as::<_, Reading>(&query)
            .bind(&reading.sensor_id)
            .bind(reading.value)
            .bind(reading.timestamp.unwrap_or(now))
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(saved)
    }

    /// Single-statement insert of the whole batch, so it lands entirely or not at all.
    async fn insert_batch(&self, readings: &[NewReading]) -> Result<usize> {
        let now = Utc::now();
        let sensor_ids: Vec<&str> = readings.iter().map(|r| r.sensor_id.as_str()).collect();
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        let timestamps: Vec<DateTime<Utc>> = readings
            .iter()
            .map(|r| r.timestamp.unwrap_or(now))
            .collect();

        let result = sqlx::query(
            "INSERT INTO readings (sensor_id, sensor_value, timestamp, created_at, updated_at)
             SELECT sensor_id, sensor_value, ts, $4, $4
             FROM UNNEST($1::text[], $2::float8[], $3::timestamptz[])
                  AS batch(sensor_id, sensor_value, ts)",
        )
        .bind(&sensor_ids)
        .bind(&values)
        .bind(&timestamps)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }
}

/// Runs `op`, retrying transient connection failures with exponential backoff.
async fn with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    let max_attempts = 5;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(Error::Database(db_err))
                if attempts < max_attempts && is_transient_error(&db_err) =>
            {
                let wait_ms = 100 * 2_u64.pow(attempts - 1).min(32);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {}ms: {}",
                    what, attempts, max_attempts, wait_ms, db_err
                );
                DB_FAILURES_TOTAL.inc();
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
            Err(e) => {
                error!(
                    "{} failed permanently after {} attempts: {}",
                    what, attempts, e
                );
                DB_FAILURES_TOTAL.inc();
                return Err(e);
            }
        }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn save(&self, reading: NewReading) -> Result<Reading> {
        with_retry("Reading insert", || self.insert(&reading)).await
    }

    async fn save_all(&self, readings: Vec<NewReading>) -> Result<usize> {
        if readings.is_empty() {
            return Ok(0);
        }
        with_retry("Batch insert", || self.insert_batch(&readings)).await
    }

    async fn find_all(&self) -> Result<Vec<Reading>> {
        let query = format!("SELECT {} FROM readings ORDER BY id", READING_COLUMNS);
        let readings = sqlx::query_as::<_, Reading>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(readings)
    }

    async fn find_by_sensor_id(&self, sensor_id: &str, range: TimeRange) -> Result<Vec<Reading>> {
        let mut conditions = vec!["sensor_id = $1".to_string()];
        let mut next_param = 2;

        if range.start.is_some() {
            conditions.push(format!("timestamp >= ${}", next_param));
            next_param += 1;
        }
        if range.end.is_some() {
            conditions.push(format!("timestamp <= ${}", next_param));
        }

        let query = format!(
            "SELECT {}
             FROM readings
             WHERE {}
             ORDER BY timestamp DESC, id DESC",
            READING_COLUMNS,
            conditions.join(" AND ")
        );

        let mut query_builder = sqlx::query_as::<_, Reading>(&query).bind(sensor_id);
        if let Some(start) = range.start {
            query_builder = query_builder.bind(start);
        }
        if let Some(end) = range.end {
            query_builder = query_builder.bind(end);
        }

        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Reading>> {
        let query = format!("SELECT {} FROM readings WHERE id = $1", READING_COLUMNS);
        let reading = sqlx::query_as::<_, Reading>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn exists_by_id(&self, id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM readings WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM readings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => {
            // Check if it's a connection-related error
            db_err.code().is_some_and(|code| {
                code == "08000" || // connection_exception
                code == "08003" || // connection_does_not_exist
                code == "08006" || // connection_failure
                code == "57P03" || // cannot_connect_now
                code == "53300" // too_many_connections
            })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_gives_up_on_permanent_errors() {
        tokio_test::block_on(async {
            let mut calls = 0;
            let result: Result<()> = with_retry("Insert", || {
                calls += 1;
                async { Err(Error::Database(sqlx::Error::RowNotFound)) }
            })
            .await;

            assert!(matches!(result, Err(Error::Database(_))));
            assert_eq!(calls, 1);
        });
    }

    #[test]
    fn test_retry_recovers_from_transient_errors() {
        tokio_test::block_on(async {
            let mut calls = 0;
            let result = with_retry("Insert", || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err(Error::Database(sqlx::Error::PoolTimedOut))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

            assert_eq!(result.unwrap(), 3);
        });
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient_error(&sqlx::Error::PoolTimedOut));
        assert!(is_transient_error(&sqlx::Error::PoolClosed));
        assert!(!is_transient_error(&sqlx::Error::RowNotFound));
        assert!(!is_transient_error(&sqlx::Error::ColumnNotFound(
            "sensor_value".to_string()
        )));
    }
}
