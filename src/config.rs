use std::time::Duration;

use serde::Deserialize;

use crate::models::TargetId;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Absent: no bandwidth sampling.
    pub snmp: Option<SnmpConfig>,
    /// Absent: no ping probing.
    pub ping: Option<PingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Cron expression (local time) for VACUUM; falls back to `vacuum_interval_secs`.
    pub vacuum_schedule: Option<String>,
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    30
}

fn default_prune_interval_secs() -> u64 {
    3600
}

fn default_vacuum_interval_secs() -> u64 {
    86_400
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_aggregation_interval_secs")]
    pub aggregation_interval_secs: u64,
    /// Max live events buffered per WebSocket subscriber (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// How long shutdown waits for in-flight ticks.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            aggregation_interval_secs: default_aggregation_interval_secs(),
            broadcast_capacity: default_broadcast_capacity(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_aggregation_interval_secs() -> u64 {
    60
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnmpConfig {
    pub host: String,
    #[serde(default = "default_snmp_port")]
    pub port: u16,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_snmp_timeout_ms")]
    pub timeout_ms: u64,
    /// Interface names, numeric ifIndex values, or "auto".
    #[serde(default = "default_interfaces")]
    pub interfaces: Vec<String>,
}

fn default_snmp_port() -> u16 {
    161
}

fn default_community() -> String {
    "public".into()
}

fn default_snmp_timeout_ms() -> u64 {
    2000
}

fn default_interfaces() -> Vec<String> {
    vec![crate::models::AUTO_TARGET.into()]
}

impl SnmpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validated interface targets.
    pub fn targets(&self) -> anyhow::Result<Vec<TargetId>> {
        self.interfaces
            .iter()
            .map(|raw| {
                TargetId::new(raw).map_err(|e| anyhow::anyhow!("snmp.interfaces: {}", e))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PingConfig {
    /// Comma-separated host list, e.g. "1.1.1.1, 8.8.8.8".
    pub hosts: String,
    #[serde(default = "default_ping_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_ping_timeout_ms() -> u64 {
    1000
}

impl PingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Splits `hosts` on commas; empty pieces are skipped.
    pub fn targets(&self) -> anyhow::Result<Vec<TargetId>> {
        self.hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| TargetId::new(h).map_err(|e| anyhow::anyhow!("ping.hosts: {}", e)))
            .collect()
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.retention_days > 0,
            "database.retention_days must be > 0, got {}",
            self.database.retention_days
        );
        anyhow::ensure!(
            self.database.prune_interval_secs > 0,
            "database.prune_interval_secs must be > 0, got {}",
            self.database.prune_interval_secs
        );
        anyhow::ensure!(
            self.database.vacuum_interval_secs > 0,
            "database.vacuum_interval_secs must be > 0, got {}",
            self.database.vacuum_interval_secs
        );
        if let Some(expr) = &self.database.vacuum_schedule {
            use std::str::FromStr;
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("database.vacuum_schedule is not a valid cron expression: {}", e)
            })?;
        }
        anyhow::ensure!(
            self.monitoring.aggregation_interval_secs > 0,
            "monitoring.aggregation_interval_secs must be > 0, got {}",
            self.monitoring.aggregation_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.broadcast_capacity > 0,
            "monitoring.broadcast_capacity must be > 0, got {}",
            self.monitoring.broadcast_capacity
        );
        if let Some(snmp) = &self.snmp {
            anyhow::ensure!(!snmp.host.trim().is_empty(), "snmp.host must be non-empty");
            anyhow::ensure!(
                snmp.port > 0,
                "snmp.port must be between 1 and 65535, got {}",
                snmp.port
            );
            anyhow::ensure!(
                snmp.timeout_ms > 0,
                "snmp.timeout_ms must be > 0, got {}",
                snmp.timeout_ms
            );
            anyhow::ensure!(
                !snmp.interfaces.is_empty(),
                "snmp.interfaces must list at least one interface"
            );
            snmp.targets()?;
        }
        if let Some(ping) = &self.ping {
            anyhow::ensure!(
                ping.timeout_ms > 0,
                "ping.timeout_ms must be > 0, got {}",
                ping.timeout_ms
            );
            anyhow::ensure!(
                !ping.targets()?.is_empty(),
                "ping.hosts must name at least one host"
            );
        }
        Ok(())
    }
}
