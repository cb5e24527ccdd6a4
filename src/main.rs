use anyhow::Result;
use netwatch::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!("Starting {}", version::banner());

    let history_repo = Arc::new(
        history_repo::HistoryRepo::connect(
            &app_config.database.path,
            app_config.database.retention_days,
        )
        .await?,
    );
    history_repo.init().await?;

    let counters = match &app_config.snmp {
        Some(snmp) => {
            let snmp = transport::SnmpTransport::connect(
                &snmp.host,
                snmp.port,
                &snmp.community,
                snmp.timeout(),
            )?;
            Some(Arc::new(snmp) as Arc<dyn transport::CounterTransport>)
        }
        None => {
            tracing::info!("No [snmp] section; bandwidth sampling disabled");
            None
        }
    };

    let clock: Arc<dyn scheduler::WallClock> = Arc::new(scheduler::SystemClock);
    let events = events::EventBus::new(app_config.monitoring.broadcast_capacity);
    let ctx = context::MonitorContext::new(
        clock.clone(),
        counters,
        Arc::new(transport::SystemPing::default()),
        history_repo.clone(),
        events.clone(),
    );

    let bandwidth_targets = match &app_config.snmp {
        Some(snmp) => snmp.targets()?,
        None => Vec::new(),
    };
    let (ping_hosts, ping_timeout) = match &app_config.ping {
        Some(ping) => (ping.targets()?, ping.timeout()),
        None => {
            tracing::info!("No [ping] section; ping probing disabled");
            (Vec::new(), Duration::ZERO)
        }
    };
    let monitors = context::Monitors {
        bandwidth: ctx.bandwidth_sampler(bandwidth_targets).map(Arc::new),
        ping: ctx.ping_prober(ping_hosts, ping_timeout).map(Arc::new),
    };

    let scheduler = scheduler::Scheduler::new(clock);
    let mut handles = context::start(
        &scheduler,
        &monitors,
        app_config.monitoring.aggregation_interval_secs,
    );
    handles.extend(maintenance_worker::spawn(
        &scheduler,
        history_repo.clone(),
        maintenance_worker::MaintenanceConfig {
            prune_interval_secs: app_config.database.prune_interval_secs,
            vacuum_schedule: app_config.database.vacuum_schedule.clone(),
            vacuum_interval_secs: app_config.database.vacuum_interval_secs,
        },
    ));

    let app = routes::app(routes::AppState::new(events, history_repo, monitors));
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    scheduler.shutdown();
    let grace = Duration::from_secs(app_config.monitoring.shutdown_grace_secs);
    if tokio::time::timeout(grace, futures_util::future::join_all(handles))
        .await
        .is_err()
    {
        tracing::warn!(grace_secs = grace.as_secs(), "In-flight ticks still running at shutdown");
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
