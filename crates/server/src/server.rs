use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use engine::{ExtractionProvider, Reconciler};

use crate::{scan, store::TransactionStore, transactions};

/// Shared state for the HTTP surface.
///
/// Generic over the extraction provider so tests can plug in a scripted
/// provider; the document store stays behind its trait object.
pub struct ServerState<P> {
    pub reconciler: Arc<Reconciler<P>>,
    pub store: Arc<dyn TransactionStore>,
}

impl<P> Clone for ServerState<P> {
    fn clone(&self) -> Self {
        Self {
            reconciler: Arc::clone(&self.reconciler),
            store: Arc::clone(&self.store),
        }
    }
}

/// Builds the application router.
pub fn router<P>(state: ServerState<P>) -> Router
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    Router::new()
        .route("/api/transactions", post(transactions::create::<P>))
        .route(
            "/api/transactions/userRange/{user_id}",
            get(transactions::user_range::<P>),
        )
        .route(
            "/api/transactions/monthly/{user_id}",
            get(transactions::monthly::<P>),
        )
        .route(
            "/api/transactions/count/{user_id}",
            get(transactions::count::<P>),
        )
        .route("/api/scan-receipt", post(scan::scan::<P>))
        // Room for the image plus multipart framing.
        .layer(DefaultBodyLimit::max(scan::MAX_IMAGE_BYTES + 64 * 1024))
        .with_state(state)
}

pub async fn run<P>(state: ServerState<P>)
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(state, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener<P>(
    state: ServerState<P>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error>
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener<P>(
    state: ServerState<P>,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error>
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
