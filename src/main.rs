use std::sync::Arc;

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sms_responder::actions::ActionRegistry;
use sms_responder::config::ResponderConfig;
use sms_responder::pipeline::{InteractionLogger, PipelineCatalog, SmsPipelineDispatcher};
use sms_responder::store::seed::SeedData;
use sms_responder::store::{Database, LibSqlBackend};
use sms_responder::webhook::{WebhookState, sms_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ResponderConfig::from_env().context("Invalid configuration")?;

    // Keep the guard alive for the lifetime of the process so file logs flush.
    let _log_guard = init_tracing(&config);

    eprintln!("📨 SMS Responder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/sms/inbound", config.port);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    if let Some(seed_file) = &config.seed_file {
        let seed = SeedData::from_file(seed_file)
            .await
            .with_context(|| format!("Failed to read seed file {}", seed_file.display()))?;
        seed.apply(db.as_ref()).await.context("Failed to apply seed data")?;
        eprintln!("   Seed: {}", seed_file.display());
    }

    db.ensure_interaction_channel(&config.interaction_channel)
        .await
        .context("Failed to create interaction channel")?;

    // ── Pipeline ─────────────────────────────────────────────────────────
    let catalog = Arc::new(
        PipelineCatalog::load(db.as_ref())
            .await
            .context("Failed to load SMS pipelines")?,
    );
    eprintln!("   Pipelines: {}", catalog.len().await);

    let registry = Arc::new(ActionRegistry::with_builtins(Arc::clone(&db)));
    eprintln!("   Actions: {}", registry.list().join(", "));
    let (interactions, _writer) =
        InteractionLogger::spawn(Arc::clone(&db), config.interaction_channel.clone());

    let dispatcher = Arc::new(SmsPipelineDispatcher::new(
        Arc::clone(&db),
        catalog,
        registry,
        interactions,
        config.organization.clone(),
    ));

    // ── HTTP ─────────────────────────────────────────────────────────────
    let state = WebhookState::new(dispatcher, Arc::clone(&db), config.webhook_token.clone());
    let app = sms_routes(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "SMS webhook listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("SMS responder stopped");
    Ok(())
}

/// Console logging, plus a daily rolling file when `SMS_LOG_DIR` is set.
fn init_tracing(config: &ResponderConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sms-responder.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
