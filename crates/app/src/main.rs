use std::{sync::Arc, time::Duration};

use engine::Reconciler;
use server::{MemoryStore, ServerState, VisionClient, VisionConfig};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tally={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let mut vision = VisionConfig::new(settings.provider.base_url, settings.provider.api_key);
    if let Some(model) = settings.provider.model {
        vision.model = model;
    }
    if let Some(model) = settings.provider.correction_model {
        vision.correction_model = model;
    }

    let mut reconciler = Reconciler::new(VisionClient::new(vision));
    if let Some(secs) = settings.provider.timeout_secs {
        reconciler = reconciler.with_call_timeout(Duration::from_secs(secs));
    }

    let state = ServerState {
        reconciler: Arc::new(reconciler),
        store: Arc::new(MemoryStore::new()),
    };

    let bind = settings
        .server
        .bind
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("tally listening on {addr}");

    server::run_with_listener(state, listener).await?;
    Ok(())
}
