//! # Error Types
//!
//! Domain-specific error types for fleet-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fleet-core errors (this file)                                         │
//! │  └── CoreError        - Payload and domain failures                    │
//! │                                                                         │
//! │  fleet-sync errors (separate crate)                                    │
//! │  └── SyncError        - Transport / protocol / config failures         │
//! │                                                                         │
//! │  Flow: CoreError → SyncError → `error` string in SyncState             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these are fatal. A record that fails normalization is dropped by
//! the caller, a payload that fails extraction is logged and ignored.

use thiserror::Error;

/// Core data errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Raw vehicle record carries neither `vehicleNumber` nor `id`.
    ///
    /// ## When This Occurs
    /// - Backend sent a partial record
    /// - Push message contained a placeholder entry
    ///
    /// The record is unusable and must be dropped, not crash the pipeline.
    #[error("Vehicle record has no id")]
    MissingVehicleId,

    /// A status token could not be mapped to a filterable status.
    #[error("Unknown vehicle status: {0}")]
    UnknownStatus(String),

    /// Payload had an unexpected JSON shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(CoreError::MissingVehicleId.to_string(), "Vehicle record has no id");
        assert!(CoreError::UnknownStatus("parked".into())
            .to_string()
            .contains("parked"));
    }
}
