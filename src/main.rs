mod auth;
mod config;
mod error;
mod mood;
mod resolve;
mod routes;
mod spotify;
mod store;
#[cfg(test)]
mod test_support;
mod types;

use config::Config;
use routes::{router, AppContext};
use std::time::Duration;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moodmix=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let ctx = AppContext::new(&config);

    // Drop login states that were never completed
    let states = ctx.auth.states().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = states.sweep();
            if removed > 0 {
                debug!("Evicted {} abandoned login state(s)", removed);
            }
        }
    });

    let app = router(ctx);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", addr);
    info!("Visit http://127.0.0.1:{}/login to authorize", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
