//! HTTP server over the timetable store.
//!
//! Configured through `TIMETABLE_*` variables (see `timetable_tool::config`);
//! callers identify themselves with the `x-user-id` header.

#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use timetable_tool::{SqliteTimetableStore, TimetableConfig, http_api};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    let config = TimetableConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .with_target(true)
        .init();

    let addr: SocketAddr = config.http_addr.parse()?;
    let store = SqliteTimetableStore::new(&config.database_path)?;
    info!(db = %config.database_path.display(), "store opened");

    info!("timetable HTTP API listening on http://{addr}");
    http_api::serve(addr, store, config).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
