//! Unified error codes for the plaza backend
//!
//! This module defines all error codes used across the server and clients.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Voucher / order errors
//! - 6xxx: Shop errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,

    // ==================== 4xxx: Voucher / order ====================
    /// Voucher not found
    VoucherNotFound = 4001,
    /// Voucher is not active (taken down or expired)
    VoucherInactive = 4002,
    /// Flash sale has not started yet
    SeckillNotStarted = 4003,
    /// Flash sale has already ended
    SeckillEnded = 4004,
    /// Voucher stock is empty
    StockEmpty = 4005,
    /// User has already ordered this voucher
    AlreadyOrdered = 4006,
    /// Flash sale admission failed
    SeckillFailed = 4007,
    /// Order not found
    OrderNotFound = 4008,

    // ==================== 6xxx: Shop ====================
    /// Shop not found
    ShopNotFound = 6001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Cache store error
    CacheError = 9003,
    /// Message broker error
    BrokerError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// Network error
    NetworkError = 9006,
    /// Operation timeout
    TimeoutError = 9007,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",

            // Voucher / order
            ErrorCode::VoucherNotFound => "Voucher not found",
            ErrorCode::VoucherInactive => "Voucher is not active",
            ErrorCode::SeckillNotStarted => "Flash sale has not started yet",
            ErrorCode::SeckillEnded => "Flash sale has already ended",
            ErrorCode::StockEmpty => "Voucher stock is empty",
            ErrorCode::AlreadyOrdered => "Each user may only order once",
            ErrorCode::SeckillFailed => "Flash sale admission failed",
            ErrorCode::OrderNotFound => "Order not found",

            // Shop
            ErrorCode::ShopNotFound => "Shop not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::CacheError => "Cache store error",
            ErrorCode::BrokerError => "Message broker error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),

            // Voucher / order
            4001 => Ok(ErrorCode::VoucherNotFound),
            4002 => Ok(ErrorCode::VoucherInactive),
            4003 => Ok(ErrorCode::SeckillNotStarted),
            4004 => Ok(ErrorCode::SeckillEnded),
            4005 => Ok(ErrorCode::StockEmpty),
            4006 => Ok(ErrorCode::AlreadyOrdered),
            4007 => Ok(ErrorCode::SeckillFailed),
            4008 => Ok(ErrorCode::OrderNotFound),

            // Shop
            6001 => Ok(ErrorCode::ShopNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::CacheError),
            9004 => Ok(ErrorCode::BrokerError),
            9005 => Ok(ErrorCode::ConfigError),
            9006 => Ok(ErrorCode::NetworkError),
            9007 => Ok(ErrorCode::TimeoutError),

            other => Err(InvalidErrorCode(other)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::StockEmpty.code(), 4005);
        assert_eq!(ErrorCode::AlreadyOrdered.code(), 4006);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_valid() {
        assert_eq!(ErrorCode::try_from(0).unwrap(), ErrorCode::Success);
        assert_eq!(ErrorCode::try_from(4001).unwrap(), ErrorCode::VoucherNotFound);
        assert_eq!(ErrorCode::try_from(9004).unwrap(), ErrorCode::BrokerError);
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(12345), Err(InvalidErrorCode(12345)));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_invalid_error_code_display() {
        let err = InvalidErrorCode(999);
        assert_eq!(format!("{}", err), "invalid error code: 999");
    }

    #[test]
    fn test_roundtrip() {
        // Test that serialization -> deserialization roundtrip works
        let codes = [
            ErrorCode::Success,
            ErrorCode::NotAuthenticated,
            ErrorCode::StockEmpty,
            ErrorCode::AlreadyOrdered,
            ErrorCode::InternalError,
        ];

        for code in codes {
            let json = serde_json::to_string(&code).unwrap();
            let parsed: ErrorCode = serde_json::from_str(&json).unwrap();
            assert_eq!(code, parsed);
        }
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::StockEmpty.is_success());
    }
}
