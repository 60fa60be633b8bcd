use axum::routing::get;
use tokio::signal;
use token_provider::{app, initialize_state, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::setup_logging();

    let state = match initialize_state().await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "cannot initialize token provider");
            std::process::exit(1);
        },
    };
    let address = state.config.server.address.clone();

    let mut router = app(state);
    match telemetry::setup_metrics_recorder() {
        Ok(handle) => {
            router = router.route("/metrics", get(move || std::future::ready(handle.render())));
        },
        Err(err) => tracing::warn!(error = %err, "prometheus recorder not installed"),
    }

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!(error = %err, "cannot listen for shutdown signal");
            }
        })
        .await?;

    Ok(())
}
