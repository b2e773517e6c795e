//! Error codes carried on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error codes returned by node RPC endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No trader for the targeted GUID lives on this node.
    #[error("unknown trader")]
    UnknownTrader,
    /// The referenced offer is not (or no longer) held.
    #[error("stale offer")]
    StaleOffer,
    /// The request payload failed validation.
    #[error("invalid request")]
    InvalidRequest,
    /// Resource reservation was refused by the supplier.
    #[error("resources unavailable")]
    ResourcesUnavailable,
    /// Container engine failure on the supplier.
    #[error("runtime failure")]
    RuntimeFailure,
    /// Anything else.
    #[error("internal error")]
    Internal,
}

/// Body returned with non-2xx RPC responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable detail, safe to show to operators.
    pub message: String,
}

impl ErrorResponse {
    /// Creates an error response.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
