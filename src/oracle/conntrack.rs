//! Connection-state oracle seam.

use std::sync::Arc;

use super::{FlowTuple, OracleError};

/// State of a tracked flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnState {
    /// The flow completed a handshake and is past cookie validation.
    pub confirmed: bool,
}

/// External record of already-established flows, consulted to bypass
/// cookie logic for known-good traffic.
pub trait ConnTracker {
    fn lookup(&self, tuple: &FlowTuple) -> Result<Option<ConnState>, OracleError>;
}

impl<T: ConnTracker> ConnTracker for Arc<T> {
    fn lookup(&self, tuple: &FlowTuple) -> Result<Option<ConnState>, OracleError> {
        (**self).lookup(tuple)
    }
}

/// Tracker that knows no flows: every segment takes the cookie path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConnTracker;

impl ConnTracker for NullConnTracker {
    fn lookup(&self, _tuple: &FlowTuple) -> Result<Option<ConnState>, OracleError> {
        Ok(None)
    }
}
