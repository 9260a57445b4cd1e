use anyhow::Context;
use clap::Parser;
use edurisk_core::{
    config::{Config, DEFAULT_BUNDLE_PATH},
    pipeline::AppCore,
};
use edurisk_server_tokio::{router, AppState, ServerConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Student success predictor")]
struct Args {
    #[arg(long, env = "EDURISK_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Model bundle artifact (.json or .json.gz)
    #[arg(long, env = "EDURISK_BUNDLE", default_value = DEFAULT_BUNDLE_PATH)]
    bundle: PathBuf,

    /// Class reported as `dropout_risk_score`
    #[arg(long, env = "EDURISK_RISK_CLASS", default_value = "Dropout")]
    risk_class: String,

    /// Ground-truth column excluded from model input in CSV uploads
    #[arg(long, default_value = "target")]
    target_column: String,

    #[arg(long, default_value = "static")]
    static_dir: PathBuf,

    #[arg(long, default_value = "frontend.html")]
    frontend: PathBuf,

    #[arg(long, default_value_t = 10)]
    max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // metrics
    let prom = PrometheusBuilder::new()
        .install_recorder()
        .context("install prometheus recorder")?;

    // model bundle: a load failure keeps serving, but every prediction gets 503
    let cfg = Config {
        bundle_path: args.bundle,
        risk_class: args.risk_class,
        target_column: args.target_column,
    };
    let core = Arc::new(AppCore::load(cfg));

    let state = AppState {
        core,
        prom,
        server: Arc::new(ServerConfig {
            static_dir: args.static_dir,
            frontend: args.frontend,
            max_upload_bytes: args.max_upload_mb * 1024 * 1024,
        }),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    tracing::info!("edurisk-server-tokio listening on http://{}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
