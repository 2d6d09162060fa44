//! Narrow typed interface over the columnar analytics database.

use crate::error::DbError;
use crate::retry::{backoff_for_attempt, DEFAULT_MAX_ATTEMPTS};
use clickhouse::{Client, Row};
use serde::Serialize;
use tracing::warn;

/// Batches larger than this are split into multiple `INSERT` transactions.
pub const BATCH_CHUNK_DEFAULT: usize = 10_000;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_attempts: u32,
    pub chunk_size: usize,
}

pub struct Database {
    client: Client,
    config: DbConfig,
}

impl Database {
    pub fn connect(config: DbConfig) -> Self {
        let url = format!("http://{}:{}", config.host, config.port);
        let client = Client::default()
            .with_url(url)
            .with_user(&config.user)
            .with_password(&config.password)
            .with_database(&config.database);
        Self { client, config }
    }

    /// Inserts `rows` into `table`, chunking to [`DbConfig::chunk_size`] and
    /// retrying each chunk on transient failure with exponential backoff.
    /// Returns the first permanent error encountered, or the last transient
    /// error if retries are exhausted.
    pub async fn insert_batch<T>(&self, table: &str, rows: &[T]) -> Result<(), DbError>
    where
        T: Row + Serialize,
    {
        for chunk in rows.chunks(self.config.chunk_size.max(1)) {
            self.insert_chunk_with_retry(table, chunk).await?;
        }
        Ok(())
    }

    async fn insert_chunk_with_retry<T>(&self, table: &str, chunk: &[T]) -> Result<(), DbError>
    where
        T: Row + Serialize,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.insert_chunk_once(table, chunk).await {
                Ok(()) => return Ok(()),
                Err(DbError::Permanent(msg)) => return Err(DbError::Permanent(msg)),
                Err(DbError::Transient(msg)) => {
                    if attempt >= self.config.max_attempts.max(1) {
                        return Err(DbError::Transient(msg));
                    }
                    let wait = backoff_for_attempt(attempt);
                    warn!(
                        table,
                        attempt,
                        wait_secs = wait.as_secs(),
                        error = %msg,
                        "transient insert failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn insert_chunk_once<T>(&self, table: &str, chunk: &[T]) -> Result<(), DbError>
    where
        T: Row + Serialize,
    {
        let mut insert = self
            .client
            .insert(table)
            .map_err(DbError::classify)?;
        for row in chunk {
            insert.write(row).await.map_err(DbError::classify)?;
        }
        insert.end().await.map_err(DbError::classify)
    }

    /// Executes a DDL statement. Used by `ensure_schema`/`ensure_read_only_user`.
    pub async fn exec(&self, ddl: &str) -> Result<(), DbError> {
        self.client
            .query(ddl)
            .execute()
            .await
            .map_err(DbError::classify)
    }

    /// Issues a query and deserializes each row as `T`.
    pub async fn query<T>(&self, sql: &str) -> Result<Vec<T>, DbError>
    where
        T: Row + for<'b> serde::Deserialize<'b>,
    {
        self.client
            .query(sql)
            .fetch_all::<T>()
            .await
            .map_err(DbError::classify)
    }

    /// Idempotently creates every table/view the services use.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        for ddl in schema::DDL_STATEMENTS {
            self.exec(ddl).await?;
        }
        Ok(())
    }

    /// Idempotently provisions a read-only database account restricted to
    /// `SELECT` on the service's databases.
    pub async fn ensure_read_only_user(&self, name: &str, password: &str) -> Result<(), DbError> {
        let create = format!(
            "CREATE USER IF NOT EXISTS {name} IDENTIFIED WITH sha256_password BY '{password}'"
        );
        self.exec(&create).await?;
        let grant = format!("GRANT SELECT ON {}.* TO {name}", self.config.database);
        self.exec(&grant).await
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            user: "default".to_string(),
            password: String::new(),
            database: "wspr".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            chunk_size: BATCH_CHUNK_DEFAULT,
        }
    }
}

mod schema {
    pub const DDL_STATEMENTS: &[&str] = &[
        r#"CREATE TABLE IF NOT EXISTS spots (
            id UInt64, time DateTime, band Int16, rx_sign String,
            rx_lat Float64, rx_lon Float64, rx_loc String, tx_sign String,
            tx_lat Float64, tx_lon Float64, tx_loc String, distance UInt16,
            azimuth UInt16, rx_azimuth UInt16, frequency UInt64, power Int8,
            snr Int8, drift Int8, version String, code Int8
        ) ENGINE = ReplacingMergeTree
        PARTITION BY toYYYYMM(time)
        ORDER BY (rx_sign, band, time, id)"#,
        r#"CREATE TABLE IF NOT EXISTS spots_frequency_overflow AS spots"#,
        r#"CREATE MATERIALIZED VIEW IF NOT EXISTS spots_recent
        ENGINE = ReplacingMergeTree
        PARTITION BY toYYYYMM(time)
        ORDER BY (rx_sign, band, time, id)
        POPULATE AS SELECT * FROM spots WHERE time > now() - INTERVAL 7 DAY"#,
        r#"CREATE TABLE IF NOT EXISTS spots_extended (
            time DateTime, rx_sign String, rx_lat Float64, rx_lon Float64,
            rx_loc String, tx_sign String, tx_lat Float64, tx_lon Float64,
            tx_loc String, distance UInt16, azimuth UInt16, rx_azimuth UInt16,
            frequency UInt64, power Int8, snr Int8, drift Int8, version String,
            code Int8, fft_noise Float32, rms_noise Float32, sync_quality Float32,
            decode_cycles UInt16, jitter Float32, blocksize UInt16,
            decoder_metric Float32, decode_type UInt8, pass UInt8,
            packet_mode UInt8, rx_overload_count UInt16, source_archive String,
            source_member String, uploaded UInt8
        ) ENGINE = ReplacingMergeTree
        PARTITION BY toYYYYMM(time)
        ORDER BY (rx_sign, time, tx_sign, frequency)"#,
        r#"CREATE TABLE IF NOT EXISTS noise (
            time DateTime, site String, receiver String, rx_loc String,
            band Int16, rms_level Float32, c2_level Float32,
            overload_count UInt16, tar_file String, source_file String
        ) ENGINE = ReplacingMergeTree
        PARTITION BY toYYYYMM(time)
        ORDER BY (receiver, band, time)"#,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_defaults() {
        let cfg = DbConfig::default();
        assert_eq!(cfg.chunk_size, 10_000);
        assert_eq!(cfg.max_attempts, 5);
    }

    #[test]
    fn schema_ddl_is_idempotent_by_construction() {
        for ddl in schema::DDL_STATEMENTS {
            assert!(ddl.contains("IF NOT EXISTS") || ddl.contains("POPULATE"));
        }
    }
}
