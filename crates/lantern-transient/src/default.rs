//! Framework-level transient detection by fault kind, type name, and message.

use crate::detector::TransientExceptionDetector;
use crate::fault::{FaultKind, FaultNode};

/// Type names (matched case-insensitively as substrings) of errors that are
/// usually transient. Used for [`FaultKind::Other`] faults coming from clients
/// this crate has no typed knowledge of. The database client names here are
/// the untyped form of [`FaultKind::Database`].
const TRANSIENT_TYPE_NAMES: &[&str] = &[
    "timeout",
    "timedout",
    "cancelled",
    "canceled",
    "ioexception",
    "io_error",
    "socketexception",
    "endofstream",
    "httprequestexception",
    "webexception",
    "dbexception",
    "npgsqlexception",
    "mysqlexception",
    "sqlexception",
    "sqliteexception",
];

/// Message fragments (case-insensitive) that indicate a transient failure.
const TRANSIENT_MESSAGE_PHRASES: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "broken pipe",
    "network",
    "end of stream",
    "attempted to read past the end",
];

/// Detector that needs no knowledge of any particular database client.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDetector;

impl DefaultDetector {
    fn kind_is_transient(kind: &FaultKind) -> bool {
        match kind {
            FaultKind::Timeout
            | FaultKind::Cancelled
            | FaultKind::Io
            | FaultKind::Socket
            | FaultKind::EndOfStream
            | FaultKind::Http
            | FaultKind::DatabaseConnection
            | FaultKind::Database => true,
            FaultKind::Other(name) => {
                let name = name.to_lowercase();
                TRANSIENT_TYPE_NAMES.iter().any(|t| name.contains(t))
            }
            FaultKind::InvalidOperation
            | FaultKind::Argument
            | FaultKind::NotFound => false,
        }
    }

    fn message_is_transient(message: &str) -> bool {
        let message = message.to_lowercase();
        TRANSIENT_MESSAGE_PHRASES
            .iter()
            .any(|phrase| message.contains(phrase))
    }
}

impl TransientExceptionDetector for DefaultDetector {
    fn name(&self) -> &'static str {
        "default"
    }

    fn is_transient(&self, node: &FaultNode) -> bool {
        Self::kind_is_transient(&node.kind) || Self::message_is_transient(&node.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::Fault;
    use test_case::test_case;

    fn node(fault: Fault) -> FaultNode {
        match fault {
            Fault::Error(node) => node,
            Fault::Aggregate { .. } => unreachable!("test faults are single errors"),
        }
    }

    #[test_case(FaultKind::Timeout, true; "timeout")]
    #[test_case(FaultKind::Cancelled, true; "cancelled")]
    #[test_case(FaultKind::Io, true; "io")]
    #[test_case(FaultKind::Socket, true; "socket")]
    #[test_case(FaultKind::EndOfStream, true; "end of stream")]
    #[test_case(FaultKind::Http, true; "http")]
    #[test_case(FaultKind::DatabaseConnection, true; "database connection")]
    #[test_case(FaultKind::Database, true; "database without code")]
    #[test_case(FaultKind::InvalidOperation, false; "invalid operation")]
    #[test_case(FaultKind::Argument, false; "argument")]
    #[test_case(FaultKind::NotFound, false; "not found")]
    fn classifies_by_kind(kind: FaultKind, expected: bool) {
        let n = node(Fault::new(kind, "something happened"));
        assert_eq!(DefaultDetector.is_transient(&n), expected);
    }

    #[test_case("TimeoutException", true)]
    #[test_case("TaskCanceledException", true)]
    #[test_case("System.IO.IOException", true)]
    #[test_case("SocketException", true)]
    #[test_case("EndOfStreamException", true)]
    #[test_case("HttpRequestException", true)]
    #[test_case("NpgsqlException", true)]
    #[test_case("MySqlException", true)]
    #[test_case("SqlException", true)]
    #[test_case("SqliteException", true)]
    #[test_case("ArgumentNullException", false)]
    #[test_case("KeyNotFoundException", false)]
    #[test_case("JsonException", false)]
    fn classifies_by_type_name(name: &str, expected: bool) {
        let n = node(Fault::other(name, "failed"));
        assert_eq!(DefaultDetector.is_transient(&n), expected);
    }

    #[test]
    fn typed_and_named_database_errors_agree() {
        let typed = node(Fault::mysql(1062, "Duplicate entry"));
        let named = node(Fault::other("MySqlException", "Duplicate entry"));
        assert!(DefaultDetector.is_transient(&typed));
        assert_eq!(DefaultDetector.is_transient(&typed), DefaultDetector.is_transient(&named));
    }

    #[test_case("The operation has TIMED OUT", true)]
    #[test_case("request timeout after 30s", true)]
    #[test_case("Connection reset by peer", true)]
    #[test_case("connection refused (os error 111)", true)]
    #[test_case("Broken pipe", true)]
    #[test_case("A network-related error occurred", true)]
    #[test_case("Unexpected end of stream", true)]
    #[test_case("Attempted to read past the end of the stream", true)]
    #[test_case("Object reference not set", false)]
    #[test_case("Bookmark not found", false)]
    fn classifies_by_message(message: &str, expected: bool) {
        let n = node(Fault::other("InvalidOperationException", message));
        assert_eq!(DefaultDetector.is_transient(&n), expected);
    }
}
