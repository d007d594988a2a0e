use anyhow::Context;

use crm_web::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    crm_observability::tracing::init(config.log_format);

    let app = crm_web::app::build_app(&config).context("wiring services")?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, backend = ?config.backend, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
