//! 校验和引擎
//!
//! 两族校验和：IPv4 首部用 16 位反码折叠；TCP 用伪首部增强变体
//! （折入源/目的地址、协议号与段长）。改写后的校验和一律从最终
//! 字节整段重算，不做增量修补。

use crate::buf::{BufError, FrameBuf};
use crate::hdr::{Ipv4View, NetHdr, TcpView, ipv4};

/// 把 32 位累加和折叠为 16 位反码校验和
pub fn fold(mut sum: u32) -> u16 {
    sum = (sum & 0xffff) + (sum >> 16);
    sum = (sum & 0xffff) + (sum >> 16);
    !(sum as u16)
}

fn fold64(mut sum: u64) -> u16 {
    while sum > 0xffff_ffff {
        sum = (sum & 0xffff_ffff) + (sum >> 32);
    }
    fold(sum as u32)
}

/// 对帧内 `[off, off+len)` 按 16 位网络序字累加；奇数尾字节按高位对齐
pub fn sum_range(buf: &FrameBuf, off: usize, len: usize) -> Result<u32, BufError> {
    let bytes = buf.slice(off, len)?;
    let mut sum: u32 = 0;
    let mut words = bytes.chunks_exact(2);
    for w in &mut words {
        sum += u32::from(u16::from_be_bytes([w[0], w[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    Ok(sum)
}

/// TCP over IPv4 伪首部校验：地址 + 协议 + 段长折入后整体折叠
pub fn tcpudp_v4(saddr: u32, daddr: u32, len: u16, sum: u32) -> u16 {
    let mut s = u64::from(sum);
    s += u64::from(saddr >> 16) + u64::from(saddr & 0xffff);
    s += u64::from(daddr >> 16) + u64::from(daddr & 0xffff);
    s += u64::from(ipv4::IPPROTO_TCP);
    s += u64::from(len);
    fold64(s)
}

/// TCP over IPv6 伪首部校验
pub fn tcpudp_v6(saddr: &[u8; 16], daddr: &[u8; 16], len: u32, sum: u32) -> u16 {
    let mut s = u64::from(sum);
    for w in saddr.chunks_exact(2) {
        s += u64::from(u16::from_be_bytes([w[0], w[1]]));
    }
    for w in daddr.chunks_exact(2) {
        s += u64::from(u16::from_be_bytes([w[0], w[1]]));
    }
    s += u64::from(len >> 16) + u64::from(len & 0xffff);
    s += u64::from(ipv4::IPPROTO_TCP);
    fold64(s)
}

/// 入站 IPv4 首部校验：按 IHL 覆盖整个首部，折叠为零才可信
pub fn verify_ipv4_header(buf: &FrameBuf, ip: &Ipv4View) -> Result<bool, BufError> {
    let ihl = ip.ihl_bytes(buf)?;
    Ok(fold(sum_range(buf, ip.off(), ihl)?) == 0)
}

/// 入站 TCP 校验：头区间累加后折入伪首部，折叠为零才可信
pub fn verify_tcp(buf: &FrameBuf, net: &NetHdr, tcp: &TcpView, tcp_len: usize) -> Result<bool, BufError> {
    let sum = sum_range(buf, tcp.off(), tcp_len)?;
    let folded = match net {
        NetHdr::V4(ip) => tcpudp_v4(ip.saddr(buf)?, ip.daddr(buf)?, tcp_len as u16, sum),
        NetHdr::V6(ip) => tcpudp_v6(&ip.saddr(buf)?, &ip.daddr(buf)?, tcp_len as u32, sum),
    };
    Ok(folded == 0)
}

/// 改写后重算 TCP 校验和：先清零校验字段再整段累加（校验和不含自身）
pub fn finalize_tcp(buf: &mut FrameBuf, net: &NetHdr, tcp: &TcpView, tcp_len: usize) -> Result<(), BufError> {
    tcp.set_checksum(buf, 0)?;
    let sum = sum_range(buf, tcp.off(), tcp_len)?;
    let check = match net {
        NetHdr::V4(ip) => tcpudp_v4(ip.saddr(buf)?, ip.daddr(buf)?, tcp_len as u16, sum),
        NetHdr::V6(ip) => tcpudp_v6(&ip.saddr(buf)?, &ip.daddr(buf)?, tcp_len as u32, sum),
    };
    tcp.set_checksum(buf, check)
}

/// 改写后重算 IPv4 首部校验和（改写后首部固定为无选项的 20 字节）
pub fn finalize_ipv4_header(buf: &mut FrameBuf, ip: &Ipv4View) -> Result<(), BufError> {
    ip.set_checksum(buf, 0)?;
    let sum = sum_range(buf, ip.off(), ipv4::MIN_HDR_LEN)?;
    ip.set_checksum(buf, fold(sum))
}
