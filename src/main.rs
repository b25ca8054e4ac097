//! payhook server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payhook::adapters::http::{build_router, AdminAppState, HttpServices, WebhookAppState};
use payhook::adapters::notify::{HttpUpgradeNotifier, LogUpgradeNotifier};
use payhook::adapters::postgres::{
    PostgresJobQueue, PostgresPlanEntitlements, PostgresTransactionRepository,
    PostgresUserDirectory, PostgresWebhookEventRepository,
};
use payhook::adapters::queue::RedisJobQueue;
use payhook::adapters::rate_limiter::{InMemoryRateLimiter, RedisRateLimiter};
use payhook::adapters::worker::WorkerPool;
use payhook::application::handlers::{
    ExportEventsHandler, ManageJobsHandler, PipelinePorts, ProcessWebhookJobHandler,
    ReceiveWebhookHandler,
};
use payhook::config::{AppConfig, ServerConfig};
use payhook::domain::webhook::Platform;
use payhook::ports::{JobQueue, RateLimiter, UpgradeNotifier, WebhookEventRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    // Storage
    let pool = config.database.connect().await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }
    let redis = config.redis.connect().await?;

    let queue: Arc<dyn JobQueue> = match &redis {
        Some(conn) => {
            let queue = RedisJobQueue::new(conn.clone());
            Arc::new(match config.redis.completed_ttl() {
                Some(ttl) => queue.with_completed_ttl(ttl),
                None => queue,
            })
        }
        None => Arc::new(PostgresJobQueue::new(pool.clone())),
    };
    tracing::info!(backend = queue.backend(), "Job queue ready");

    let rate_limiter: Arc<dyn RateLimiter> = match (&redis, config.rate_limit.shared) {
        (Some(conn), true) => Arc::new(RedisRateLimiter::new(conn.clone(), config.rate_limit.rules())),
        (None, true) => {
            tracing::warn!("Shared rate limiting requested without Redis; using per-instance counters");
            Arc::new(InMemoryRateLimiter::new(config.rate_limit.rules()))
        }
        _ => Arc::new(InMemoryRateLimiter::new(config.rate_limit.rules())),
    };

    let notifier: Arc<dyn UpgradeNotifier> = match config.notifications.http() {
        Some(http) => Arc::new(HttpUpgradeNotifier::new(http)?),
        None => Arc::new(LogUpgradeNotifier),
    };

    let events: Arc<dyn WebhookEventRepository> =
        Arc::new(PostgresWebhookEventRepository::new(pool.clone()));

    // Application
    let secrets = config.webhooks.provider_secrets();
    let configured = secrets.configured();
    tracing::info!(platforms = ?configured, "Webhook secrets loaded");
    for platform in Platform::ALL.into_iter().filter(|p| !configured.contains(p)) {
        tracing::warn!(platform = %platform, "No webhook secret; deliveries will be rejected");
    }

    let receive = ReceiveWebhookHandler::new(
        config.webhooks.verifiers(),
        secrets,
        events.clone(),
        queue.clone(),
    )
    .with_enqueue_options(config.queue.enqueue_options());

    let process = ProcessWebhookJobHandler::new(
        PipelinePorts {
            events: events.clone(),
            transactions: Arc::new(PostgresTransactionRepository::new(pool.clone())),
            users: Arc::new(PostgresUserDirectory::new(pool.clone())),
            entitlements: Arc::new(PostgresPlanEntitlements::new(pool.clone())),
            notifier,
            queue: queue.clone(),
        },
        config.webhooks.catalog()?,
        config.queue.backoff()?,
    );

    // Workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = WorkerPool::new(queue.clone(), Arc::new(process), config.queue.worker_pool());
    let worker_handle = tokio::spawn(async move { workers.run(shutdown_rx).await });

    // HTTP
    let router = build_router(HttpServices {
        webhooks: WebhookAppState::new(receive),
        admin: AdminAppState::new(
            ExportEventsHandler::new(events),
            ManageJobsHandler::new(queue),
        ),
        rate_limiter,
        admin_token: config.admin.token(),
        request_timeout: config.server.request_timeout(),
    });

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "payhook listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Worker pool task failed");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.json_logs() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received terminate signal, starting graceful shutdown"),
    }
}
