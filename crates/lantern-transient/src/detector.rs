//! Detector trait and chain walking.

use std::fmt;
use std::sync::Arc;

use crate::backends::{MySqlDetector, PostgresDetector, SqlServerDetector, SqliteDetector};
use crate::default::DefaultDetector;
use crate::fault::{Fault, FaultNode};

/// Decides whether a single fault is likely to succeed if retried later.
///
/// Implementations look only at the node they are given. Walking inner causes
/// and aggregate members is the job of [`exception_is_transient`].
pub trait TransientExceptionDetector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn is_transient(&self, node: &FaultNode) -> bool;
}

/// Returns true if any detector matches any node in the fault tree.
///
/// Inner causes are visited outermost first and aggregate members depth first;
/// the walk stops at the first match.
pub fn exception_is_transient(fault: &Fault, detectors: &[Arc<dyn TransientExceptionDetector>]) -> bool {
    if detectors.is_empty() {
        return false;
    }

    fault.chain().any(|current| match current {
        Fault::Error(node) => detectors.iter().any(|d| d.is_transient(node)),
        Fault::Aggregate { members, .. } => members
            .iter()
            .any(|member| exception_is_transient(member, detectors)),
    })
}

/// Ordered set of detectors consulted for every failure.
#[derive(Clone, Default)]
pub struct DetectorChain {
    detectors: Vec<Arc<dyn TransientExceptionDetector>>,
}

impl DetectorChain {
    /// A chain with no detectors; it classifies everything as permanent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default detector followed by every backend-specific detector.
    pub fn default_chain() -> Self {
        Self::empty()
            .with(DefaultDetector)
            .with(MySqlDetector)
            .with(PostgresDetector)
            .with(SqliteDetector)
            .with(SqlServerDetector)
    }

    /// Append a detector. Existing detectors are unaffected.
    pub fn with<D: TransientExceptionDetector + 'static>(mut self, detector: D) -> Self {
        self.push(Arc::new(detector));
        self
    }

    /// Append a detector that is already shared elsewhere.
    pub fn push(&mut self, detector: Arc<dyn TransientExceptionDetector>) {
        self.detectors.push(detector);
    }

    pub fn is_transient(&self, fault: &Fault) -> bool {
        exception_is_transient(fault, &self.detectors)
    }

    /// Name of the first detector that matches, for diagnostics.
    pub fn matched_by(&self, fault: &Fault) -> Option<&'static str> {
        fault.leaves().into_iter().find_map(|node| {
            self.detectors
                .iter()
                .find(|d| d.is_transient(node))
                .map(|d| d.name())
        })
    }
}

impl fmt::Debug for DetectorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.detectors.iter().map(|d| d.name()))
            .finish()
    }
}
