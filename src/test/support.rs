//! Frame builders and scripted collaborators shared by the test modules.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::buf::FrameBuf;
use crate::cfg::{PortAllowList, SynAckCounter, TuningStore};
use crate::clock::Clock;
use crate::engine::SynProxy;
use crate::oracle::{ConnState, ConnTracker, CookieOracle, FlowTuple, OracleError};

pub const CLIENT_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
pub const SERVER_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

pub const CLIENT_IP: u32 = 0xc0a8_0105; // 192.168.1.5
pub const SERVER_IP: u32 = 0xc0a8_0101; // 192.168.1.1

pub const CLIENT_IP6: [u8; 16] = [
    0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x05,
];
pub const SERVER_IP6: [u8; 16] = [
    0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
];

pub const CLIENT_PORT: u16 = 40000;

/// Default headroom used by tests: enough for the engine to grow any
/// frame's TCP header to the 60-byte maximum.
pub const HEADROOM: usize = 64;

/// IP_DF in the fragment field; the engine requires exactly this.
pub const DF: u16 = 0x4000;

// ---------------------------------------------------------------------------
// Frame builders (checksums computed by an implementation independent of
// the crate's checksum engine, so the two cross-check each other).
// ---------------------------------------------------------------------------

pub struct Tcp4Frame {
    pub sport: u16,
    pub dport: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u16,
    pub frag_off: u16,
    pub ip_options: Vec<u8>,
    pub tcp_options: Vec<u8>,
}

impl Default for Tcp4Frame {
    fn default() -> Self {
        Self {
            sport: CLIENT_PORT,
            dport: 443,
            seq: 0x1000_0000,
            ack: 0,
            flags: crate::hdr::tcp::SYN,
            frag_off: DF,
            ip_options: Vec::new(),
            tcp_options: Vec::new(),
        }
    }
}

impl Tcp4Frame {
    pub fn build(&self) -> Vec<u8> {
        assert!(self.ip_options.len() % 4 == 0, "ip options must be 32-bit aligned");
        assert!(self.tcp_options.len() % 4 == 0, "tcp options must be 32-bit aligned");

        let ihl = 20 + self.ip_options.len();
        let tcp_len = 20 + self.tcp_options.len();
        let tot_len = ihl + tcp_len;

        let mut f = Vec::with_capacity(14 + tot_len);
        f.extend_from_slice(&SERVER_MAC);
        f.extend_from_slice(&CLIENT_MAC);
        f.extend_from_slice(&0x0800u16.to_be_bytes());

        let ip_start = f.len();
        f.push(0x40 | (ihl / 4) as u8);
        f.push(0); // tos
        f.extend_from_slice(&(tot_len as u16).to_be_bytes());
        f.extend_from_slice(&0x3344u16.to_be_bytes()); // id
        f.extend_from_slice(&self.frag_off.to_be_bytes());
        f.push(64); // ttl
        f.push(6); // protocol
        f.extend_from_slice(&[0, 0]); // checksum, filled below
        f.extend_from_slice(&CLIENT_IP.to_be_bytes());
        f.extend_from_slice(&SERVER_IP.to_be_bytes());
        f.extend_from_slice(&self.ip_options);

        let tcp_start = f.len();
        push_tcp(&mut f, self, tcp_len);

        let ip_check = ones_complement(&f[ip_start..ip_start + ihl], 0);
        f[ip_start + 10..ip_start + 12].copy_from_slice(&ip_check.to_be_bytes());

        let pseudo = pseudo_v4(CLIENT_IP, SERVER_IP, tcp_len as u32);
        let tcp_check = ones_complement(&f[tcp_start..tcp_start + tcp_len], pseudo);
        f[tcp_start + 16..tcp_start + 18].copy_from_slice(&tcp_check.to_be_bytes());

        f
    }

    pub fn to_buf(&self) -> FrameBuf {
        FrameBuf::with_headroom(&self.build(), HEADROOM)
    }
}

pub struct Tcp6Frame {
    pub sport: u16,
    pub dport: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u16,
    pub tcp_options: Vec<u8>,
}

impl Default for Tcp6Frame {
    fn default() -> Self {
        Self {
            sport: CLIENT_PORT,
            dport: 443,
            seq: 0x1000_0000,
            ack: 0,
            flags: crate::hdr::tcp::SYN,
            tcp_options: Vec::new(),
        }
    }
}

impl Tcp6Frame {
    pub fn build(&self) -> Vec<u8> {
        assert!(self.tcp_options.len() % 4 == 0, "tcp options must be 32-bit aligned");
        let tcp_len = 20 + self.tcp_options.len();

        let mut f = Vec::with_capacity(14 + 40 + tcp_len);
        f.extend_from_slice(&SERVER_MAC);
        f.extend_from_slice(&CLIENT_MAC);
        f.extend_from_slice(&0x86ddu16.to_be_bytes());

        f.extend_from_slice(&0x6000_0000u32.to_be_bytes());
        f.extend_from_slice(&(tcp_len as u16).to_be_bytes());
        f.push(6); // next header
        f.push(64); // hop limit
        f.extend_from_slice(&CLIENT_IP6);
        f.extend_from_slice(&SERVER_IP6);

        let tcp_start = f.len();
        push_tcp(&mut f, &tcp4_shape(self), tcp_len);

        let mut pseudo = 0u32;
        for w in CLIENT_IP6.chunks_exact(2).chain(SERVER_IP6.chunks_exact(2)) {
            pseudo += u32::from(u16::from_be_bytes([w[0], w[1]]));
        }
        pseudo += tcp_len as u32;
        pseudo += 6;
        let tcp_check = ones_complement(&f[tcp_start..tcp_start + tcp_len], pseudo);
        f[tcp_start + 16..tcp_start + 18].copy_from_slice(&tcp_check.to_be_bytes());

        f
    }

    pub fn to_buf(&self) -> FrameBuf {
        FrameBuf::with_headroom(&self.build(), HEADROOM)
    }
}

fn tcp4_shape(v6: &Tcp6Frame) -> Tcp4Frame {
    Tcp4Frame {
        sport: v6.sport,
        dport: v6.dport,
        seq: v6.seq,
        ack: v6.ack,
        flags: v6.flags,
        tcp_options: v6.tcp_options.clone(),
        ..Tcp4Frame::default()
    }
}

fn push_tcp(f: &mut Vec<u8>, t: &Tcp4Frame, tcp_len: usize) {
    f.extend_from_slice(&t.sport.to_be_bytes());
    f.extend_from_slice(&t.dport.to_be_bytes());
    f.extend_from_slice(&t.seq.to_be_bytes());
    f.extend_from_slice(&t.ack.to_be_bytes());
    let doff_flags = (((tcp_len / 4) as u16) << 12) | (t.flags & 0x01ff);
    f.extend_from_slice(&doff_flags.to_be_bytes());
    f.extend_from_slice(&0xfde8u16.to_be_bytes()); // window
    f.extend_from_slice(&[0, 0]); // checksum, filled by caller
    f.extend_from_slice(&[0, 0]); // urgent pointer
    f.extend_from_slice(&t.tcp_options);
}

/// Straight-line ones-complement checksum, independent of `crate::csum`.
pub fn ones_complement(bytes: &[u8], mut sum: u32) -> u16 {
    let mut words = bytes.chunks_exact(2);
    for w in &mut words {
        sum += u32::from(u16::from_be_bytes([w[0], w[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

pub fn pseudo_v4(saddr: u32, daddr: u32, tcp_len: u32) -> u32 {
    (saddr >> 16) + (saddr & 0xffff) + (daddr >> 16) + (daddr & 0xffff) + 6 + tcp_len
}

/// Client option block used by the handshake scenarios:
/// MSS 1380, SACK-permitted, Timestamp(tsval, tsecr), NOP, Window-Scale.
pub fn client_options(tsval: u32, wscale: u8) -> Vec<u8> {
    let mut o = vec![2, 4, 0x05, 0x64]; // MSS 1380
    o.extend_from_slice(&[4, 2]); // SACK permitted
    o.push(8);
    o.push(10);
    o.extend_from_slice(&tsval.to_be_bytes());
    o.extend_from_slice(&0u32.to_be_bytes());
    o.push(1); // NOP
    o.extend_from_slice(&[3, 3, wscale]);
    o
}

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Cookie oracle with a scripted outcome and call accounting.
pub struct ScriptedCookies {
    pub cookie: u32,
    pub accept: bool,
    pub fail: bool,
    pub generated: AtomicUsize,
    pub verified: AtomicUsize,
}

impl ScriptedCookies {
    pub fn issuing(cookie: u32) -> Self {
        Self {
            cookie,
            accept: true,
            fail: false,
            generated: AtomicUsize::new(0),
            verified: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            ..Self::issuing(0)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::issuing(0)
        }
    }
}

impl CookieOracle for ScriptedCookies {
    fn generate(&self, _t: &FlowTuple, _ip: &[u8], _tcp: &[u8]) -> Result<u32, OracleError> {
        self.generated.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(OracleError::Cookie("scripted failure"));
        }
        Ok(self.cookie)
    }

    fn verify(&self, _t: &FlowTuple, _ip: &[u8], _tcp: &[u8]) -> Result<bool, OracleError> {
        self.verified.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(OracleError::Cookie("scripted failure"));
        }
        Ok(self.accept)
    }
}

/// Tracker with a scripted lookup result.
pub struct ScriptedTracker {
    pub state: Option<ConnState>,
    pub fail: bool,
}

impl ScriptedTracker {
    pub fn empty() -> Self {
        Self {
            state: None,
            fail: false,
        }
    }

    pub fn confirmed() -> Self {
        Self {
            state: Some(ConnState { confirmed: true }),
            fail: false,
        }
    }

    pub fn unconfirmed() -> Self {
        Self {
            state: Some(ConnState { confirmed: false }),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            state: None,
            fail: true,
        }
    }
}

impl ConnTracker for ScriptedTracker {
    fn lookup(&self, _t: &FlowTuple) -> Result<Option<ConnState>, OracleError> {
        if self.fail {
            return Err(OracleError::Conntrack("scripted failure"));
        }
        Ok(self.state)
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ns(&self) -> u64 {
        self.0
    }
}

pub struct Harness {
    pub cookies: Arc<ScriptedCookies>,
    pub tuning: Arc<TuningStore>,
    pub ports: Arc<PortAllowList>,
    pub synacks: Arc<SynAckCounter>,
    pub proxy: SynProxy<Arc<ScriptedCookies>, ScriptedTracker, FixedClock>,
}

/// Engine wired with scripted collaborators, default tuning, and the
/// given allow-list. The fixed clock reads 2000 s.
pub fn harness(cookies: ScriptedCookies, tracker: ScriptedTracker, allowed: &[u16]) -> Harness {
    let cookies = Arc::new(cookies);
    let tuning = Arc::new(TuningStore::new());
    let ports = Arc::new(PortAllowList::new());
    ports.install(allowed);
    let synacks = Arc::new(SynAckCounter::new());
    let proxy = SynProxy::new(
        cookies.clone(),
        tracker,
        FixedClock(2_000_000_000_000),
        tuning.clone(),
        ports.clone(),
        synacks.clone(),
    );
    Harness {
        cookies,
        tuning,
        ports,
        synacks,
        proxy,
    }
}
