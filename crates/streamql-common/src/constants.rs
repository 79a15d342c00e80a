//! Protocol constants shared by the builder and the client.

// =============================================================================
// Endpoints
// =============================================================================

/// Default port of the remote engine's REST listener.
pub const DEFAULT_PORT: u16 = 8088;

/// Endpoint for statements (DDL, DML, DESCRIBE, LIST).
pub const STATEMENT_ENDPOINT: &str = "/ksql";

/// Endpoint for pull and push queries.
pub const QUERY_ENDPOINT: &str = "/query";

/// Media type sent in `Content-Type` and `Accept`.
pub const MEDIA_TYPE: &str = "application/vnd.ksql.v1+json";

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("streamql/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Streaming payload markers
// =============================================================================

/// Substring of the payload line that ends a streaming query.
pub const FINAL_MESSAGE_MARKER: &str = "finalMessage";

/// Message reported when a push query reaches its `LIMIT`.
pub const LIMIT_REACHED: &str = "Limit Reached";

/// Message reported when a query completes.
pub const QUERY_COMPLETED: &str = "Query Completed";

// =============================================================================
// Budget defaults
// =============================================================================

/// Default ceiling of concurrent requests per engine.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Default number of rebalance retries before a streaming read gives up.
pub const DEFAULT_MAX_REBALANCE_RETRIES: u32 = 5;

// =============================================================================
// Response limits
// =============================================================================

/// Largest single-consumption response body accepted, in bytes.
pub const MAX_RESPONSE_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Longest payload line accepted from a streaming response, in bytes.
pub const MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_has_version() {
        assert!(USER_AGENT.starts_with("streamql/"));
        assert!(USER_AGENT.len() > "streamql/".len());
    }

    #[test]
    fn test_endpoints_are_absolute() {
        assert!(STATEMENT_ENDPOINT.starts_with('/'));
        assert!(QUERY_ENDPOINT.starts_with('/'));
    }
}
