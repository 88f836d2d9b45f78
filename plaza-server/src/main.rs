//! plaza-server: local-services commerce backend
//!
//! Long-running service that:
//! - Serves shop reads through the two-tier cache engine
//! - Admits flash-sale reservations atomically against Redis
//! - Materializes reservations into order rows via the Kafka pipeline
//! - Escalates exhausted reservations to a dead-letter topic with alerting

use tokio_util::sync::CancellationToken;

use plaza_server::{api, seckill, AppState, Config};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plaza_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();

    tracing::info!("Starting plaza-server");

    // Initialize application state (fatal on unreachable store or cache)
    let state = AppState::new(&config).await?;

    // Warm the Bloom filter before traffic arrives; a cold filter would
    // report false negatives for existing shops
    state.shop_cache.bloom().warm(&state.pool).await?;

    // Pipeline consumers run until shutdown and drain in-flight messages
    let shutdown = CancellationToken::new();
    let consumer_handles = seckill::spawn_consumers(
        &config,
        state.pool.clone(),
        state.redis.clone(),
        state.publisher.clone(),
        shutdown.clone(),
    )?;

    let app = api::create_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("plaza-server HTTP listening on {addr}");

    // Ctrl-C cancels the token; the server and every consumer observe it
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let serve_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_token.cancelled().await })
        .await?;

    shutdown.cancel();
    for handle in consumer_handles {
        let _ = handle.await;
    }

    tracing::info!("plaza-server stopped");
    Ok(())
}
