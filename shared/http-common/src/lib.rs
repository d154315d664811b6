//! Shared HTTP utilities for the community events workspace.
//!
//! Provides framework-agnostic error bodies and time formatting used by the
//! api-server.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "missing_required" => "Missing required input",
        "invalid_input" => "Input entered is invalid",
        "already_submitted" => "The event was already submitted",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Calendar date (`YYYY-MM-DD`, UTC) of a timestamp.
pub fn system_time_to_date(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_json_err() {
        let err = json_err("invalid_input");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "invalid_input", "message": "Input entered is invalid"}})
        );

        // Unknown code falls back to code as message
        let err = json_err("custom_error");
        assert_eq!(err, serde_json::json!({"error": {"code": "custom_error", "message": "custom_error"}}));
    }

    #[test]
    fn test_json_error_with_message() {
        let err = json_error_with_message("bad_request", "Invalid input");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "bad_request", "message": "Invalid input"}})
        );
    }

    #[test]
    fn test_time_formatting() {
        let t = UNIX_EPOCH + Duration::from_secs(1_781_913_600); // 2026-06-20T00:00:00Z
        assert_eq!(system_time_to_rfc3339(t), "2026-06-20T00:00:00Z");
        assert_eq!(system_time_to_date(t), "2026-06-20");
    }
}
