//! Transient failure classification for Lantern.
//!
//! This crate decides whether a failed operation should be retried later:
//! - Failures are described as [`Fault`] values (a single error with its
//!   causes, or an aggregate of several)
//! - [`TransientExceptionDetector`]s each recognise one family of failures
//! - [`exception_is_transient`] walks the whole fault tree against a chain of
//!   detectors
//!
//! Classification is pure: no I/O and no retries of the classifier itself.

mod backends;
mod default;
mod detector;
mod fault;

pub use backends::{MySqlDetector, PostgresDetector, SqlServerDetector, SqliteDetector};
pub use default::DefaultDetector;
pub use detector::{DetectorChain, TransientExceptionDetector, exception_is_transient};
pub use fault::{Chain, Fault, FaultKind, FaultNode, Origin};
