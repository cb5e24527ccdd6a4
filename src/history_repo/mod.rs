// SQLite history: per-window bandwidth and ping aggregates plus interface
// metadata. Timestamps are stored as epoch milliseconds.

mod rows;

pub use rows::{BandwidthRecord, InterfaceInfoRecord, PingRecord};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

use crate::error::PersistenceError;
use crate::models::{AggregateRecord, BandwidthAggregate, InterfaceMetadata, PingAggregate};
use crate::sink::AggregateSink;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

pub struct HistoryRepo {
    pool: SqlitePool,
    retention_ms: i64,
}

impl HistoryRepo {
    pub async fn connect(path: &str, retention_days: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let retention_ms = i64::from(retention_days) * MS_PER_DAY;
        Ok(Self { pool, retention_ms })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bandwidths (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT NOT NULL,
                interface TEXT NOT NULL,
                in_mbps REAL NOT NULL,
                out_mbps REAL NOT NULL,
                window_start INTEGER NOT NULL,
                window_end INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bandwidths_window_end ON bandwidths(window_end)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT NOT NULL,
                status TEXT NOT NULL,
                latency_ms REAL,
                window_start INTEGER NOT NULL,
                window_end INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pings_window_end ON pings(window_end)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS interface_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                interface_name TEXT NOT NULL,
                interface_index INTEGER NOT NULL,
                interface_ip TEXT,
                interface_mac TEXT,
                interface_speed INTEGER,
                interface_status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, agg), fields(repo = "history", operation = "save_bandwidth", interface = %agg.target))]
    async fn save_bandwidth(&self, agg: &BandwidthAggregate) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO bandwidths (host, interface, in_mbps, out_mbps, window_start, window_end) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&agg.host)
        .bind(agg.target.as_str())
        .bind(agg.avg_in_mbps)
        .bind(agg.avg_out_mbps)
        .bind(agg.window_start.timestamp_millis())
        .bind(agg.window_end.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, agg), fields(repo = "history", operation = "save_ping", host = %agg.host))]
    async fn save_ping(&self, agg: &PingAggregate) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO pings (host, status, latency_ms, window_start, window_end) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(agg.host.as_str())
        .bind(agg.status.as_str())
        .bind(agg.avg_latency_ms)
        .bind(agg.window_start.timestamp_millis())
        .bind(agg.window_end.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest bandwidth rows first.
    #[instrument(skip(self), fields(repo = "history", operation = "recent_bandwidths"))]
    pub async fn recent_bandwidths(&self, limit: u32) -> anyhow::Result<Vec<BandwidthRecord>> {
        let rows = sqlx::query(
            "SELECT id, host, interface, in_mbps, out_mbps, window_start, window_end
             FROM bandwidths ORDER BY id DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rows::parse_bandwidth_row).collect()
    }

    /// Newest ping rows first.
    #[instrument(skip(self), fields(repo = "history", operation = "recent_pings"))]
    pub async fn recent_pings(&self, limit: u32) -> anyhow::Result<Vec<PingRecord>> {
        let rows = sqlx::query(
            "SELECT id, host, status, latency_ms, window_start, window_end
             FROM pings ORDER BY id DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rows::parse_ping_row).collect()
    }

    /// Most recent metadata row per interface index, ordered by index.
    #[instrument(skip(self), fields(repo = "history", operation = "latest_interface_info"))]
    pub async fn latest_interface_info(&self) -> anyhow::Result<Vec<InterfaceInfoRecord>> {
        let rows = sqlx::query(
            "SELECT id, interface_name, interface_index, interface_ip, interface_mac,
                    interface_speed, interface_status, created_at
             FROM interface_info
             WHERE id IN (SELECT MAX(id) FROM interface_info GROUP BY interface_index)
             ORDER BY interface_index ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rows::parse_interface_info_row).collect()
    }

    /// Deletes bandwidth and ping rows whose window ended before the retention
    /// cutoff. Interface metadata is kept. Returns rows deleted.
    #[instrument(skip(self), fields(repo = "history", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> anyhow::Result<u64> {
        let cutoff = chrono::Utc::now().timestamp_millis() - self.retention_ms;
        let mut tx = self.pool.begin().await?;
        let bandwidths = sqlx::query("DELETE FROM bandwidths WHERE window_end < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let pings = sqlx::query("DELETE FROM pings WHERE window_end < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(bandwidths + pings)
    }

    /// Reclaim space after deletes (run periodically after pruning).
    #[instrument(skip(self), fields(repo = "history", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AggregateSink for HistoryRepo {
    async fn insert_aggregate(&self, record: &AggregateRecord) -> Result<(), PersistenceError> {
        match record {
            AggregateRecord::Bandwidth(agg) => self.save_bandwidth(agg).await?,
            AggregateRecord::Ping(agg) => self.save_ping(agg).await?,
        }
        Ok(())
    }

    #[instrument(skip(self, info), fields(repo = "history", operation = "insert_metadata", index = info.index.0))]
    async fn insert_metadata(&self, info: &InterfaceMetadata) -> Result<(), PersistenceError> {
        let speed = info
            .speed_bps
            .map(i64::try_from)
            .transpose()
            .map_err(|e| PersistenceError(anyhow::anyhow!("interface speed out of range: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO interface_info
            (interface_name, interface_index, interface_ip, interface_mac,
             interface_speed, interface_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&info.name)
        .bind(i64::from(info.index.0))
        .bind(info.ip_address.as_deref())
        .bind(info.mac_address.as_deref())
        .bind(speed)
        .bind(info.oper_status.as_str())
        .bind(info.fetched_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
