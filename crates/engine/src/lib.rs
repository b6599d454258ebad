//! Bill-splitting core.
//!
//! The engine turns a noisy, AI-extracted receipt payload into a canonical
//! [`Receipt`], computes what each participant of a split owes, and shapes
//! the result into the persisted transaction record:
//!
//! - [`validate`] normalizes a raw extractor payload and flags arithmetic
//!   discrepancies against a shared 2-cent tolerance.
//! - [`Reconciler`] drives the bounded extract/validate/correct loop over an
//!   [`ExtractionProvider`], keeping the best candidate across attempts.
//! - [`allocate`] splits item prices and tax across participants with exact
//!   cent conservation.
//! - [`build_record`] derives the append-only [`TransactionRecord`] from an
//!   allocation.
//!
//! All money is integer cents ([`MoneyCents`]); decimal conversion happens
//! only at JSON boundaries.

pub use allocate::{AllocationResult, ItemAssignments, Participant, allocate};
pub use error::EngineError;
pub use money::MoneyCents;
pub use receipt::{LineItem, OtherFee, Receipt, TOLERANCE};
pub use reconcile::{
    CancelToken, ExtractionProvider, NON_CONVERGENT_WARNING, Reconciler,
};
pub use transaction::{TransactionRecord, UserEntry, build_record};
pub use validate::{Validated, validate};

mod allocate;
mod error;
mod money;
mod receipt;
mod reconcile;
mod transaction;
mod validate;

type ResultEngine<T> = Result<T, EngineError>;
