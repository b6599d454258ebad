//! The module contains the errors the engine can surface.
//!
//! Validation never fails: missing or malformed extractor fields degrade to
//! safe defaults. The variants here cover the cases that are actually
//! terminal for a caller:
//!
//! - [`ExtractionFailed`] when no attempt ever produced a parseable payload.
//! - [`Provider`] for transport/API failures of the extraction service.
//! - [`Cancelled`] when the user aborts a scan between attempts.
//! - [`InvalidParticipants`] for allocation precondition violations.
//!
//!  [`ExtractionFailed`]: EngineError::ExtractionFailed
//!  [`Provider`]: EngineError::Provider
//!  [`Cancelled`]: EngineError::Cancelled
//!  [`InvalidParticipants`]: EngineError::InvalidParticipants
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("failed to parse receipt after {0} attempts")]
    ExtractionFailed(usize),
    #[error("extraction provider error: {0}")]
    Provider(String),
    #[error("receipt scan cancelled")]
    Cancelled,
    #[error("invalid participants: {0}")]
    InvalidParticipants(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}
