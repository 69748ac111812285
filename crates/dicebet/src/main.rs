use dicebet::{DicebetError, Server, resolve_bind_addr};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), DicebetError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = resolve_bind_addr(
        std::env::var("DICEBET_ADDR").ok(),
        std::env::var("PORT").ok(),
    );
    let server = Server::builder().bind(&addr).build().await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
