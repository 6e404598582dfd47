//! Escrow domain module
//!
//! Request/response models and the service that serializes access to the
//! marketplace ledger.

mod model;
mod service;

pub use model::*;
pub use service::EscrowService;
