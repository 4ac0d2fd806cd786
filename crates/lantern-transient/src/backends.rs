//! Backend-specific detectors keyed on native error codes.
//!
//! Each detector only understands faults whose [`Origin`] is its own backend
//! and answers `false` for everything else.

use crate::detector::TransientExceptionDetector;
use crate::fault::{FaultNode, Origin};

/// MySQL / MariaDB error numbers for lost connections, lock waits, and
/// resource exhaustion.
const MYSQL_TRANSIENT_ERRORS: &[u32] = &[
    1040, // ER_CON_COUNT_ERROR: too many connections
    1042, // ER_BAD_HOST_ERROR
    1043, // ER_HANDSHAKE_ERROR
    1047, // ER_UNKNOWN_COM_ERROR (server starting up)
    1053, // ER_SERVER_SHUTDOWN
    1205, // ER_LOCK_WAIT_TIMEOUT
    1213, // ER_LOCK_DEADLOCK
    1226, // ER_USER_LIMIT_REACHED
    2002, // CR_CONNECTION_ERROR
    2003, // CR_CONN_HOST_ERROR
    2006, // CR_SERVER_GONE_ERROR
    2013, // CR_SERVER_LOST
    2055, // CR_SERVER_LOST_EXTENDED
];

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDetector;

impl TransientExceptionDetector for MySqlDetector {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn is_transient(&self, node: &FaultNode) -> bool {
        match &node.origin {
            Origin::MySql { number } => MYSQL_TRANSIENT_ERRORS.contains(number),
            _ => false,
        }
    }
}

/// SQLSTATE classes where every code is transient.
const POSTGRES_TRANSIENT_CLASSES: &[&str] = &[
    "08", // connection exception
    "53", // insufficient resources
    "58", // system error (I/O)
];

/// Individual SQLSTATEs outside the classes above.
const POSTGRES_TRANSIENT_STATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
    "57P01", // admin_shutdown
    "57P02", // crash_shutdown
    "57P03", // cannot_connect_now
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDetector;

impl TransientExceptionDetector for PostgresDetector {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn is_transient(&self, node: &FaultNode) -> bool {
        let Origin::Postgres { sql_state } = &node.origin else {
            return false;
        };
        if sql_state.len() != 5 {
            return false;
        }
        let state = sql_state.to_ascii_uppercase();
        POSTGRES_TRANSIENT_STATES.contains(&state.as_str())
            || POSTGRES_TRANSIENT_CLASSES
                .iter()
                .any(|class| state.starts_with(class))
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_IOERR: i32 = 10;
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_FULL: i32 = 13;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDetector;

impl TransientExceptionDetector for SqliteDetector {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn is_transient(&self, node: &FaultNode) -> bool {
        match &node.origin {
            // Extended result codes carry the primary code in the low byte.
            Origin::Sqlite { code } => matches!(
                code & 0xff,
                SQLITE_BUSY | SQLITE_LOCKED | SQLITE_IOERR | SQLITE_CORRUPT | SQLITE_FULL
            ),
            _ => false,
        }
    }
}

/// SQL Server and Azure SQL error numbers for connectivity loss, throttling,
/// failover, and deadlocks.
const SQL_SERVER_TRANSIENT_ERRORS: &[i32] = &[
    -2,    // client timeout
    -1,    // connection broken
    2,     // server not found / not accessible
    20,    // instance does not support encryption
    53,    // network path not found
    64,    // connection dropped on the server
    121,   // semaphore timeout
    233,   // no process on the other end of the pipe
    1205,  // deadlock victim
    4060,  // cannot open database
    4221,  // login to read-secondary failed
    10053, // transport-level error
    10054, // connection forcibly closed
    10060, // connection attempt failed
    10928, // resource limit reached
    10929, // resource limit reached
    40143, // connection could not be initialized
    40197, // service error processing request
    40501, // service busy
    40540, // service encountered an error
    40613, // database not currently available
    49918, // not enough resources
    49919, // too many create/update operations
    49920, // too many operations in progress
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDetector;

impl TransientExceptionDetector for SqlServerDetector {
    fn name(&self) -> &'static str {
        "sql_server"
    }

    fn is_transient(&self, node: &FaultNode) -> bool {
        match &node.origin {
            Origin::SqlServer { number } => SQL_SERVER_TRANSIENT_ERRORS.contains(number),
            _ => false,
        }
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

    #[test_case(1040, true)]
    #[test_case(1053, true)]
    #[test_case(1205, true)]
    #[test_case(1213, true)]
    #[test_case(2002, true)]
    #[test_case(2003, true)]
    #[test_case(2006, true)]
    #[test_case(2013, true)]
    #[test_case(1062, false; "duplicate entry")]
    #[test_case(1146, false; "table missing")]
    fn mysql_codes(number: u32, expected: bool) {
        assert_eq!(MySqlDetector.is_transient(&node(Fault::mysql(number, "x"))), expected);
    }

    #[test_case("08000", true)]
    #[test_case("08006", true)]
    #[test_case("08P01", true)]
    #[test_case("40001", true)]
    #[test_case("40p01", true; "lowercase deadlock")]
    #[test_case("53300", true)]
    #[test_case("57P03", true)]
    #[test_case("58030", true)]
    #[test_case("23505", false; "unique violation")]
    #[test_case("42P01", false; "undefined table")]
    #[test_case("08", false; "truncated state")]
    fn postgres_states(state: &str, expected: bool) {
        assert_eq!(PostgresDetector.is_transient(&node(Fault::postgres(state, "x"))), expected);
    }

    #[test_case(5, true; "busy")]
    #[test_case(6, true; "locked")]
    #[test_case(10, true; "ioerr")]
    #[test_case(11, true; "corrupt")]
    #[test_case(13, true; "full")]
    #[test_case(261, true; "busy recovery extended")]
    #[test_case(3338, true; "ioerr short read extended")]
    #[test_case(19, false; "constraint")]
    #[test_case(1, false; "generic error")]
    fn sqlite_codes(code: i32, expected: bool) {
        assert_eq!(SqliteDetector.is_transient(&node(Fault::sqlite(code, "x"))), expected);
    }

    #[test_case(-2, true; "client timeout")]
    #[test_case(1205, true)]
    #[test_case(40197, true)]
    #[test_case(40501, true)]
    #[test_case(40613, true)]
    #[test_case(10054, true)]
    #[test_case(2627, false; "primary key violation")]
    #[test_case(208, false; "invalid object")]
    fn sql_server_numbers(number: i32, expected: bool) {
        assert_eq!(SqlServerDetector.is_transient(&node(Fault::sql_server(number, "x"))), expected);
    }

    #[test]
    fn detectors_ignore_other_backends() {
        let mysql_deadlock = node(Fault::mysql(1205, "lock wait"));
        assert!(!SqlServerDetector.is_transient(&mysql_deadlock));
        assert!(!PostgresDetector.is_transient(&mysql_deadlock));
        assert!(!SqliteDetector.is_transient(&mysql_deadlock));

        let untyped = node(Fault::timeout("slow"));
        assert!(!MySqlDetector.is_transient(&untyped));
        assert!(!PostgresDetector.is_transient(&untyped));
        assert!(!SqliteDetector.is_transient(&untyped));
        assert!(!SqlServerDetector.is_transient(&untyped));
    }
}
