//! Stable error codes.

use std::fmt;

/// Error codes for categorizing errors across crates.
///
/// The high byte is the category; codes are stable across versions and
/// may be used for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Operation was cancelled.
    Cancelled = 0x0002,

    // Build errors (0x0100 - 0x01FF)
    /// An expression is malformed.
    MalformedExpression = 0x0100,
    /// An operand does not suit its operator.
    InvalidOperand = 0x0101,
    /// A numeric parameter is out of range.
    InvalidParameter = 0x0102,
    /// A required alias is missing.
    MissingAlias = 0x0103,
    /// A statement has no fields or columns.
    EmptyFieldList = 0x0104,
    /// A join is not allowed between the given fields.
    IncompatibleJoin = 0x0105,
    /// A statement violates a structural rule.
    InvalidStatement = 0x0106,

    // Schema errors (0x0200 - 0x02FF)
    /// A field is missing from one of the compared sets.
    FieldNotFound = 0x0200,
    /// A field has different kinds in the compared sets.
    KindMismatch = 0x0201,
    /// More than one field is marked primary.
    AmbiguousPrimaryKey = 0x0202,
    /// A remote kind name is not recognised.
    UnknownKind = 0x0203,
    /// A relation is not registered.
    RelationNotFound = 0x0204,
    /// A schema description could not be parsed.
    MalformedSchema = 0x0205,

    // Transport errors (0x0300 - 0x03FF)
    /// Connecting to the engine failed or timed out.
    CannotDial = 0x0300,
    /// Writing a request failed.
    CannotWrite = 0x0301,
    /// Reading a response failed.
    CannotRead = 0x0302,
    /// The engine answered with a non-success status.
    BadStatus = 0x0303,
    /// The in-flight budget is exhausted for long-lived consumption.
    TooManyRequests = 0x0304,
    /// A streaming read yielded its budget slot.
    Rebalance = 0x0305,
    /// A streaming read was rebalanced too many times.
    RebalanceExhausted = 0x0306,
    /// The response violates the wire protocol.
    Protocol = 0x0307,

    // Decode errors (0x0400 - 0x04FF)
    /// A row value cannot be converted to its native field.
    DecodeFailed = 0x0400,

    // Config errors (0x0500 - 0x05FF)
    /// Configuration file could not be read.
    ConfigUnreadable = 0x0500,
    /// Configuration text is malformed.
    ConfigMalformed = 0x0501,
    /// Configuration values are invalid.
    ConfigInvalid = 0x0502,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Build",
            0x02 => "Schema",
            0x03 => "Transport",
            0x04 => "Decode",
            0x05 => "Config",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::Cancelled.category(), "General");
        assert_eq!(ErrorCode::IncompatibleJoin.category(), "Build");
        assert_eq!(ErrorCode::KindMismatch.category(), "Schema");
        assert_eq!(ErrorCode::Rebalance.category(), "Transport");
        assert_eq!(ErrorCode::DecodeFailed.category(), "Decode");
        assert_eq!(ErrorCode::ConfigInvalid.category(), "Config");
    }

    #[test]
    fn test_numeric_code() {
        assert_eq!(ErrorCode::CannotDial.as_u16(), 0x0300);
        assert_eq!(ErrorCode::CannotDial.to_string(), "CannotDial");
    }
}
