use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;

pub use provider::{VisionClient, VisionConfig};
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};
pub use store::{MemoryStore, StoredTransaction, TransactionStore};

mod provider;
mod scan;
mod server;
mod store;
mod transactions;

pub mod types {
    pub mod receipt {
        pub use engine::{LineItem, OtherFee, Receipt};
    }

    pub mod transaction {
        pub use api_types::transaction::{
            MonthlyQuery, MonthlyTransactionView, RangeQuery, StoredTransactionView,
            TransactionCount, TransactionCreated, TransactionNew, UserEntryWire,
        };
        pub use engine::{TransactionRecord, UserEntry};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::ExtractionFailed(_) | EngineError::Provider(_) => StatusCode::BAD_GATEWAY,
        EngineError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        EngineError::InvalidParticipants(_) | EngineError::InvalidAmount(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match &err {
        EngineError::Provider(detail) => {
            tracing::error!("provider error: {detail}");
            "Failed to process receipt".to_string()
        }
        _ => err.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
