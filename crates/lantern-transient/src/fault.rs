//! Fault descriptions used for retry classification.
//!
//! A [`Fault`] is a plain data description of a failure: what kind of error it
//! was, its message, which storage backend raised it (if any), and the chain of
//! faults that caused it. Classification never needs the original error value,
//! so faults can be cloned, logged, and moved across tasks freely.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

/// Broad category of a fault, standing in for the error's declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum FaultKind {
    Timeout,
    Cancelled,
    Io,
    Socket,
    EndOfStream,
    Http,
    /// A database client failed to open or keep a connection.
    DatabaseConnection,
    /// Any other database client error. The default detector treats it as
    /// transient; backend detectors used on their own look at its code.
    Database,
    InvalidOperation,
    Argument,
    NotFound,
    /// Free-form type name for errors that fit none of the above.
    Other(String),
}

impl FaultKind {
    /// Type name used when rendering the fault.
    pub fn type_name(&self) -> &str {
        match self {
            FaultKind::Timeout => "timeout",
            FaultKind::Cancelled => "cancelled",
            FaultKind::Io => "io",
            FaultKind::Socket => "socket",
            FaultKind::EndOfStream => "end_of_stream",
            FaultKind::Http => "http",
            FaultKind::DatabaseConnection => "database_connection",
            FaultKind::Database => "database",
            FaultKind::InvalidOperation => "invalid_operation",
            FaultKind::Argument => "argument",
            FaultKind::NotFound => "not_found",
            FaultKind::Other(name) => name,
        }
    }
}

/// Storage backend that raised a fault, together with its native error code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Unknown,
    /// MySQL / MariaDB server or client error number.
    MySql { number: u32 },
    /// Five character SQLSTATE.
    Postgres { sql_state: String },
    /// SQLite result code, possibly extended.
    Sqlite { code: i32 },
    /// SQL Server / Azure SQL error number.
    SqlServer { number: i32 },
}

/// A single fault together with the fault that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultNode {
    pub kind: FaultKind,
    pub message: String,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<Fault>>,
}

/// A failure as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fault {
    /// One error and its causes.
    Error(FaultNode),
    /// Several independent failures reported together.
    Aggregate { message: String, members: Vec<Fault> },
}

impl Fault {
    /// Create a fault with no backend origin and no cause.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault::Error(FaultNode {
            kind,
            message: message.into(),
            origin: Origin::Unknown,
            inner: None,
        })
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Timeout, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FaultKind::Cancelled, "the operation was cancelled")
    }

    pub fn other(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Other(type_name.into()), message)
    }

    pub fn mysql(number: u32, message: impl Into<String>) -> Self {
        Self::database(Origin::MySql { number }, message)
    }

    pub fn postgres(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self::database(
            Origin::Postgres {
                sql_state: sql_state.into(),
            },
            message,
        )
    }

    pub fn sqlite(code: i32, message: impl Into<String>) -> Self {
        Self::database(Origin::Sqlite { code }, message)
    }

    pub fn sql_server(number: i32, message: impl Into<String>) -> Self {
        Self::database(Origin::SqlServer { number }, message)
    }

    fn database(origin: Origin, message: impl Into<String>) -> Self {
        Fault::Error(FaultNode {
            kind: FaultKind::Database,
            message: message.into(),
            origin,
            inner: None,
        })
    }

    pub fn aggregate(message: impl Into<String>, members: Vec<Fault>) -> Self {
        Fault::Aggregate {
            message: message.into(),
            members,
        }
    }

    /// Attach `inner` at the end of this fault's cause chain.
    ///
    /// Existing causes are kept. When the chain ends in an aggregate, `inner`
    /// is appended to it as another member.
    pub fn caused_by(self, inner: Fault) -> Self {
        match self {
            Fault::Error(mut node) => {
                let tail = match node.inner.take() {
                    Some(existing) => existing.caused_by(inner),
                    None => inner,
                };
                node.inner = Some(Box::new(tail));
                Fault::Error(node)
            }
            Fault::Aggregate { message, mut members } => {
                members.push(inner);
                Fault::Aggregate { message, members }
            }
        }
    }

    /// Describe an arbitrary error, following its `source()` chain.
    ///
    /// `io::Error`s anywhere in the chain keep their kind; everything else is
    /// recorded under its message with [`FaultKind::Other`].
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut fault = match error.downcast_ref::<io::Error>() {
            Some(io_error) => Fault::new(io_kind(io_error.kind()), io_error.to_string()),
            None => Fault::new(FaultKind::Other("error".to_string()), error.to_string()),
        };
        if let Some(source) = error.source() {
            fault = fault.caused_by(Fault::from_error(source));
        }
        fault
    }

    pub fn message(&self) -> &str {
        match self {
            Fault::Error(node) => &node.message,
            Fault::Aggregate { message, .. } => message,
        }
    }

    pub fn kind(&self) -> Option<&FaultKind> {
        match self {
            Fault::Error(node) => Some(&node.kind),
            Fault::Aggregate { .. } => None,
        }
    }

    /// Iterate this fault and its inner causes, outermost first.
    ///
    /// Iteration stops at the first aggregate, which is yielded itself.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// Every non-aggregate node in the tree, depth first.
    pub fn leaves(&self) -> Vec<&FaultNode> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(fault: &'a Fault, out: &mut Vec<&'a FaultNode>) {
    match fault {
        Fault::Error(node) => {
            out.push(node);
            if let Some(inner) = &node.inner {
                collect_leaves(inner, out);
            }
        }
        Fault::Aggregate { members, .. } => {
            for member in members {
                collect_leaves(member, out);
            }
        }
    }
}

/// Iterator returned by [`Fault::chain`].
pub struct Chain<'a> {
    next: Option<&'a Fault>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Fault;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if let Fault::Error(node) = current {
            self.next = node.inner.as_deref();
        }
        Some(current)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Error(node) => {
                write!(f, "{}: {}", node.kind.type_name(), node.message)?;
                if let Some(inner) = &node.inner {
                    write!(f, " ---> {inner}")?;
                }
                Ok(())
            }
            Fault::Aggregate { message, members } => {
                write!(f, "{message} ({} errors)", members.len())?;
                for (i, member) in members.iter().enumerate() {
                    write!(f, " [{i}] {member}")?;
                }
                Ok(())
            }
        }
    }
}

fn io_kind(kind: io::ErrorKind) -> FaultKind {
    match kind {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FaultKind::Timeout,
        io::ErrorKind::UnexpectedEof => FaultKind::EndOfStream,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrNotAvailable => FaultKind::Socket,
        io::ErrorKind::NotFound => FaultKind::NotFound,
        io::ErrorKind::InvalidInput => FaultKind::Argument,
        _ => FaultKind::Io,
    }
}

impl From<io::Error> for Fault {
    fn from(error: io::Error) -> Self {
        Fault::from_error(&error)
    }
}

impl From<tokio::time::error::Elapsed> for Fault {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Fault::timeout(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, thiserror::Error)]
    #[error("could not load workflow")]
    struct LoadFailed(#[source] io::Error);

    #[test]
    fn io_errors_keep_their_kind() {
        let fault = Fault::from(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        assert_eq!(fault.kind(), Some(&FaultKind::Timeout));

        let fault = Fault::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(fault.kind(), Some(&FaultKind::Socket));

        let fault = Fault::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(fault.kind(), Some(&FaultKind::EndOfStream));
    }

    #[test]
    fn from_error_follows_source_chain() {
        let error = LoadFailed(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        let fault = Fault::from_error(&error);

        let kinds: Vec<_> = fault.chain().filter_map(Fault::kind).cloned().collect();
        assert_eq!(
            kinds,
            vec![FaultKind::Other("error".to_string()), FaultKind::Socket]
        );
        assert_eq!(fault.message(), "could not load workflow");
    }

    #[test]
    fn caused_by_keeps_existing_causes() {
        let fault = Fault::other("Outer", "outer")
            .caused_by(Fault::other("Mid", "mid"))
            .caused_by(Fault::timeout("root"));

        let messages: Vec<_> = fault.chain().map(Fault::message).collect();
        assert_eq!(messages, vec!["outer", "mid", "root"]);
    }

    #[test]
    fn caused_by_on_aggregate_appends_member() {
        let fault = Fault::aggregate("many", vec![Fault::timeout("a")])
            .caused_by(Fault::other("Boom", "b"));

        match fault {
            Fault::Aggregate { members, .. } => assert_eq!(members.len(), 2),
            Fault::Error(_) => panic!("expected aggregate"),
        }
    }

    #[test]
    fn leaves_visits_whole_tree() {
        let fault = Fault::other("Outer", "outer").caused_by(Fault::aggregate(
            "batch",
            vec![
                Fault::timeout("t"),
                Fault::other("Mid", "m").caused_by(Fault::mysql(1213, "deadlock")),
            ],
        ));

        let messages: Vec<_> = fault.leaves().iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["outer", "t", "m", "deadlock"]);
    }

    #[test]
    fn display_renders_inner_chain() {
        let fault = Fault::other("JobFailed", "resume failed").caused_by(Fault::timeout("slow"));
        assert_eq!(
            fault.to_string(),
            "JobFailed: resume failed ---> timeout: slow"
        );
    }
}
