//! Keyed-hash SYN-cookie reference implementation.
//!
//! Swappable stand-in for a hardware or kernel cookie primitive: two
//! secrets feed a multiplicative mixing hash over the flow tuple and the
//! client's initial sequence number, bound to a rotating 60-second time
//! window so a captured cookie goes stale quickly.

use crate::clock::Clock;

use super::{CookieOracle, FlowTuple, OracleError};

const GOLDEN: u32 = 0x9e37_79b9;
const MIX1: u32 = 0x85eb_ca6b;
const MIX2: u32 = 0xc2b2_ae35;

const WINDOW_NS: u64 = 60_000_000_000;
/// Low 5 cookie bits carry the issuing window.
const TIME_BITS: u32 = 0x1f;
const HASH_MASK: u32 = !TIME_BITS;
/// A cookie stays valid for the current and the two previous windows.
const MAX_WINDOW_AGE: u32 = 2;

const OFF_SEQ: usize = 4;
const OFF_ACK_SEQ: usize = 8;

/// SYN-cookie oracle backed by keyed multiplicative mixing.
pub struct HashCookieOracle<K: Clock> {
    secret1: u32,
    secret2: u32,
    clock: K,
}

impl<K: Clock> HashCookieOracle<K> {
    pub fn new(secret1: u32, secret2: u32, clock: K) -> Self {
        Self {
            secret1,
            secret2,
            clock,
        }
    }

    fn window(&self) -> u32 {
        (self.clock.now_ns() / WINDOW_NS) as u32
    }

    fn mix(&self, tuple: &FlowTuple, isn: u32, window: u32) -> u32 {
        let (saddr, daddr, sport, dport) = match tuple {
            FlowTuple::V4 {
                saddr,
                daddr,
                sport,
                dport,
            } => (*saddr, *daddr, *sport, *dport),
            FlowTuple::V6 {
                saddr,
                daddr,
                sport,
                dport,
            } => (fold_addr(saddr), fold_addr(daddr), *sport, *dport),
        };

        let mut h = self.secret1;
        h = h.wrapping_mul(GOLDEN).wrapping_add(saddr);
        h ^= h >> 16;
        h = h.wrapping_mul(MIX1).wrapping_add(u32::from(sport));
        h ^= h >> 13;
        h = h.wrapping_mul(MIX2).wrapping_add(daddr);
        h ^= h >> 16;
        h = h.wrapping_mul(GOLDEN).wrapping_add(u32::from(dport));

        let mut h2 = self.secret2;
        h2 = h2.wrapping_mul(MIX1).wrapping_add(window);
        h2 ^= h2 >> 13;
        h2 = h2.wrapping_mul(MIX2).wrapping_add(h.wrapping_add(isn));

        h ^ h2
    }
}

fn fold_addr(addr: &[u8; 16]) -> u32 {
    addr.chunks_exact(4).fold(0u32, |acc, w| {
        acc ^ u32::from_be_bytes([w[0], w[1], w[2], w[3]])
    })
}

fn segment_u32(tcp_segment: &[u8], off: usize) -> Result<u32, OracleError> {
    tcp_segment
        .get(off..off + 4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .map(u32::from_be_bytes)
        .ok_or(OracleError::Cookie("tcp segment shorter than fixed header"))
}

impl<K: Clock> CookieOracle for HashCookieOracle<K> {
    fn generate(
        &self,
        tuple: &FlowTuple,
        _ip_header: &[u8],
        tcp_segment: &[u8],
    ) -> Result<u32, OracleError> {
        let isn = segment_u32(tcp_segment, OFF_SEQ)?;
        let window = self.window();
        Ok((self.mix(tuple, isn, window) & HASH_MASK) | (window & TIME_BITS))
    }

    fn verify(
        &self,
        tuple: &FlowTuple,
        _ip_header: &[u8],
        tcp_segment: &[u8],
    ) -> Result<bool, OracleError> {
        // The ACK's sequence is ISN+1 and its acknowledgment echoes
        // cookie+1.
        let isn = segment_u32(tcp_segment, OFF_SEQ)?.wrapping_sub(1);
        let cookie = segment_u32(tcp_segment, OFF_ACK_SEQ)?.wrapping_sub(1);

        let now = self.window();
        let age = (now & TIME_BITS).wrapping_sub(cookie & TIME_BITS) & TIME_BITS;
        if age > MAX_WINDOW_AGE {
            return Ok(false);
        }
        let issued = now.wrapping_sub(age);
        Ok((self.mix(tuple, isn, issued) & HASH_MASK) == (cookie & HASH_MASK))
    }
}
