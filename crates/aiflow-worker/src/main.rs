//! Job worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aiflow_dispatch::{DispatchConfig, FallbackChains, FallbackDispatcher, StatsTracker};
use aiflow_queue::{JobStore, MemoryJobStore, RedisJobStore};
use aiflow_worker::logging::level_directive;
use aiflow_worker::{
    create_router, metrics, providers, server, AnalysisHandler, AppState, GenerationHandler,
    HandlerRegistry, JobStoreKind, WorkerConfig, WorkerPool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let level = level_directive(&std::env::var("LOG_LEVEL").unwrap_or_default());

    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("aiflow={}", level).parse()?)
        .add_directive(format!("aiflow_dispatch={}", level).parse()?)
        .add_directive(format!("aiflow_queue={}", level).parse()?)
        .add_directive(format!("aiflow_worker={}", level).parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting aiflow-worker");

    let config = WorkerConfig::from_env();
    let dispatch_config = DispatchConfig::from_env();
    info!("Worker config: {:?}", config);
    info!("Dispatch config: {:?}", dispatch_config);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    // Providers, models and stats are built once and shared.
    let stats = Arc::new(StatsTracker::new());
    let registry = providers::build_registry()?;
    let catalog = Arc::new(providers::build_catalog(&registry, &stats));
    let monitor = Arc::new(providers::build_monitor(&registry, &catalog, &stats));
    let chains = FallbackChains::from_env(&registry.ids());
    let dispatcher = Arc::new(FallbackDispatcher::new(
        Arc::new(registry),
        chains,
        Arc::clone(&stats),
        dispatch_config,
    ));

    let store: Arc<dyn JobStore> = match config.job_store {
        JobStoreKind::Redis => Arc::new(
            RedisJobStore::new(&config.redis_url).context("Failed to create Redis job store")?,
        ),
        JobStoreKind::Memory => {
            warn!("Using in-memory job store; jobs are lost on restart");
            Arc::new(MemoryJobStore::new())
        }
    };

    let handlers = HandlerRegistry::new()
        .with(Arc::new(AnalysisHandler::new(catalog)))
        .with(Arc::new(GenerationHandler::new(dispatcher)));
    let pool = Arc::new(WorkerPool::new(store, &handlers, &config)?);

    let addr: SocketAddr = format!("{}:{}", config.health_host, config.health_port)
        .parse()
        .context("Invalid health bind address")?;
    let router = create_router(
        AppState {
            pool: Arc::clone(&pool),
            monitor,
        },
        metrics_handle,
    );

    let (server_stop, server_stopped) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        let shutdown = async {
            server_stopped.await.ok();
        };
        if let Err(e) = server::serve(router, addr, shutdown).await {
            error!("Health server error: {}", e);
        }
    });

    let pool_runner = Arc::clone(&pool);
    let mut pool_handle = tokio::spawn(async move { pool_runner.run().await });

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal");
            pool.shutdown();
            (&mut pool_handle).await
        }
        finished = &mut pool_handle => finished,
    };

    match finished {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Worker pool error: {}", e),
        Err(e) => error!("Worker pool task failed: {}", e),
    }

    server_stop.send(()).ok();
    server_handle.await.ok();

    info!("Worker shutdown complete");
    Ok(())
}
