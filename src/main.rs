use tracing::info;

use maestro_gateway::{router, ChatService, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maestro_gateway=debug,tower_http=debug".into()),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = GatewayConfig::from_env();
    info!(
        ollama = %config.ollama_base_url,
        model = %config.default_model,
        timeout_secs = config.upstream_timeout.as_secs(),
        policy = ?config.prompt_policy,
        "gateway configured"
    );

    // ── Router ────────────────────────────────────────────────────────────────
    let app = router(ChatService::from_config(&config));

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
