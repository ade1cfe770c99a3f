use anyhow::Result;
use metricscope::*;
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
    let app_config = config::AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(app_config.log.level.clone()));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let snapshots = Arc::new(snapshot_repo::SnapshotRepo::connect(&app_config.storage.path).await?);
    snapshots.migrate().await?;
    let analyses = Arc::new(analysis_repo::AnalysisRepo::new(snapshots.pool_clone()));

    let prom = Arc::new(prom_client::PromClient::new(prom_client::PromClientConfig {
        url: app_config.prometheus.url.clone(),
        username: app_config.prometheus.username.clone(),
        password: app_config.prometheus.password.clone(),
        timeout: Duration::from_secs(app_config.prometheus.timeout_secs),
    })?);

    match prom.health_check().await {
        Ok(()) => {
            let scrape_interval = prom.get_scrape_interval().await;
            tracing::info!(
                url = %app_config.prometheus.url,
                scrape_interval_secs = scrape_interval.as_secs(),
                "prometheus reachable"
            );
        }
        Err(e) => tracing::warn!(error = %e, "prometheus health check failed at startup"),
    }

    let coll = Arc::new(collector::Collector::new(
        prom.clone(),
        snapshots.clone(),
        collector::CollectorConfig {
            service_label: app_config.discovery.service_label.clone(),
            sample_values_limit: app_config.scan.sample_values_limit,
            concurrency: app_config.scan.concurrency,
            label_fetch_threshold: app_config.scan.label_fetch_threshold,
        },
    ));

    let sched = Arc::new(scheduler::Scheduler::new(
        coll,
        snapshots.clone(),
        scheduler::SchedulerConfig {
            interval: Duration::from_secs(app_config.scan.interval_secs),
            retention_days: app_config.storage.retention_days,
        },
    ));
    sched.start();

    let analyzer = match &app_config.gemini {
        Some(gemini_config) => {
            let gemini = analyzer::GeminiClient::new(gemini_config)?;
            Some(Arc::new(analyzer::Analyzer::new(
                gemini,
                snapshots.clone(),
                analyses,
            )))
        }
        None => {
            tracing::info!("no [gemini] config, analyzer disabled");
            None
        }
    };

    let app = routes::app(snapshots, sched.clone(), analyzer.clone(), prom);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            sched.stop().await;
            if let Some(analyzer) = &analyzer {
                analyzer.shutdown().await;
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
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
