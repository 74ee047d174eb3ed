use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatbus::{relay, AppState, RelayConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbus=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env();
    info!(
        bind_addr = %config.bind_addr,
        authenticated = config.secret.is_some(),
        "Starting chatbus relay"
    );

    let bind_addr = config.bind_addr;
    let app = relay::router(AppState::in_memory(config)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Relay listening on ws://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
