use anyhow::Context;
use live_overlay_service::{
    config::Config, logging, metrics, services::supervise, state::OverlayState, surface,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cfg = Config::from_env().context("invalid overlay configuration")?;
    let policy = cfg.connect_policy();
    tracing::info!(
        server = %cfg.server_url,
        room = %cfg.room_id,
        max_retries = policy.retry.max_retries,
        "starting live overlay"
    );

    let overlay = OverlayState::new();
    let surface_task = tokio::spawn(surface::run_console(overlay.subscribe()));

    let result = tokio::select! {
        result = supervise(&cfg, &policy, &overlay) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    surface_task.abort();
    tracing::debug!(metrics = %metrics::render(), "final counters");
    result.context("event source unavailable")
}
