//! Voice assistant runtime — composition root entry point.

use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use va_config::{load_settings, ConfigStore, Settings};
use va_server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("VOICE_ASSISTANT_ENV").ok();

    // A single round-trip-preserving config file, if one exists, backs the
    // administrative `put`/backup surface (§6, §8); otherwise fall back to
    // the teacher's layered `config/{default,env}.{toml,yaml}` + env-var
    // loader, in-memory only (no `put` backups without a source file).
    let config_path = std::env::var("VOICE_ASSISTANT_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        ConfigStore::load(&config_path)?
    } else {
        let settings = match load_settings(env.as_deref()) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("failed to load configuration: {e}. using defaults.");
                Settings::default()
            }
        };
        ConfigStore::from_settings(settings)
    };

    init_tracing(&config.current().settings);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting voice assistant runtime");

    let state = AppState::assemble(config).await?;
    tracing::info!(profile = %state.manager.deployment_profile(), "component manager initialised");

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    let manager = state.manager.clone();
    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(feature = "telemetry")]
fn init_tracing(settings: &Settings) {
    use opentelemetry_otlp::WithExportConfig;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("va_server={0},va_pipeline={0},va_runtime={0}", settings.observability.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    if let Some(endpoint) = settings.observability.otlp_endpoint.as_deref().filter(|_| settings.observability.tracing_enabled) {
        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(opentelemetry_sdk::Resource::new(vec![
                opentelemetry::KeyValue::new("service.name", "voice-assistant"),
                opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => {
                let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                subscriber.with(fmt_layer).with(otel_layer).init();
                tracing::info!(%endpoint, "opentelemetry tracing enabled");
                return;
            }
            Err(e) => eprintln!("failed to initialise opentelemetry: {e}. falling back to console."),
        }
    }
    subscriber.with(fmt_layer).init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("va_server={0},va_pipeline={0},va_runtime={0}", settings.observability.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
