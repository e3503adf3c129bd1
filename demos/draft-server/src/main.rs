//! Local draft server: one 1v1 session called "demo", numeric tokens as
//! user ids, results kept in memory. A retired "demo" session is replaced
//! with a fresh one within a few seconds.
//!
//! ```text
//! cargo run -p draft-server -- [config.json]
//! ```

use std::sync::Arc;
use std::time::Duration;

use pickban::prelude::*;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn load_config(path: Option<&str>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let raw = std::fs::read_to_string(path)?;
    let config: ServerConfig = serde_json::from_str(&raw)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Demo session
// ---------------------------------------------------------------------------

const DEMO_SESSION: &str = "demo";

/// Creates the demo session unless a live one exists. Returns whether a
/// new session was spawned.
fn ensure_demo_session(
    registry: &mut Registry,
    config: &SessionConfig,
) -> Result<bool, DraftError> {
    let id = SessionId::new(DEMO_SESSION);
    if registry.get(&id).is_ok() {
        return Ok(false);
    }
    registry.create(id, config.clone())?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref())?;
    let session_config = config.session.clone();
    let server = PickbanServerBuilder::new()
        .config(config)
        .repository(Arc::new(MemoryRepository::new()))
        .build(DevAuthenticator)
        .await?;
    let registry = server.registry();
    ensure_demo_session(&mut *registry.lock().await, &session_config)?;

    // Idle timeout or a finished draft retires the session; bring it back.
    let demo_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            match ensure_demo_session(&mut *demo_registry.lock().await, &session_config) {
                Ok(true) => tracing::info!("demo session re-created"),
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "failed to re-create demo session"),
            }
        }
    });

    // Log live sessions now and then so an operator can see progress.
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let handles = registry.lock().await.handles();
            for handle in handles {
                let Ok(info) = handle.info().await else {
                    continue;
                };
                tracing::info!(
                    session_id = %info.session_id,
                    status = %info.status,
                    phase = info.current_phase,
                    connections = info.connections,
                    "session status"
                );
            }
        }
    });

    tracing::info!(addr = %server.local_addr()?, "draft server ready, session \"demo\" open");
    server.run().await?;
    Ok(())
}
