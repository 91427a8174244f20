//! External collaborator seams.
//!
//! The cookie cryptography and the connection-state table are injected
//! capabilities: the engine orchestrates them but never re-derives them.

mod conntrack;
mod cookie;

use std::sync::Arc;

use thiserror::Error;

pub use conntrack::{ConnState, ConnTracker, NullConnTracker};
pub use cookie::HashCookieOracle;

/// Failure reported by an external oracle. A clean "not found" lookup is
/// not an error; anything else surfaces through this type and is treated
/// as an internal fault by the caller.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("cookie oracle failure: {0}")]
    Cookie(&'static str),
    #[error("connection-state lookup failure: {0}")]
    Conntrack(&'static str),
}

/// One TCP connection attempt, as seen by the oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowTuple {
    V4 {
        saddr: u32,
        daddr: u32,
        sport: u16,
        dport: u16,
    },
    V6 {
        saddr: [u8; 16],
        daddr: [u8; 16],
        sport: u16,
        dport: u16,
    },
}

/// Opaque SYN-cookie primitive.
///
/// `generate` derives the 32-bit cookie a SYN-ACK will carry as its
/// initial sequence number; `verify` checks the cookie a returning ACK
/// echoes in its acknowledgment number. Implementations must be safe for
/// unsynchronized concurrent calls.
pub trait CookieOracle {
    fn generate(
        &self,
        tuple: &FlowTuple,
        ip_header: &[u8],
        tcp_segment: &[u8],
    ) -> Result<u32, OracleError>;

    fn verify(
        &self,
        tuple: &FlowTuple,
        ip_header: &[u8],
        tcp_segment: &[u8],
    ) -> Result<bool, OracleError>;
}

impl<C: CookieOracle> CookieOracle for Arc<C> {
    fn generate(
        &self,
        tuple: &FlowTuple,
        ip_header: &[u8],
        tcp_segment: &[u8],
    ) -> Result<u32, OracleError> {
        (**self).generate(tuple, ip_header, tcp_segment)
    }

    fn verify(
        &self,
        tuple: &FlowTuple,
        ip_header: &[u8],
        tcp_segment: &[u8],
    ) -> Result<bool, OracleError> {
        (**self).verify(tuple, ip_header, tcp_segment)
    }
}
