//! 帧解析器
//!
//! 单遍解析 Ethernet → (IPv4 | IPv6) → TCP，每个头在任何字段被读取前
//! 先确认整个头落在帧内。无法继续解析时直接给出早期判决。

use crate::buf::FrameBuf;
use crate::engine::{Fault, Verdict};

use super::eth::{self, EthView};
use super::ipv4::{self, Ipv4View};
use super::ipv6::{self, Ipv6View};
use super::tcp::{self, TcpView};

/// 网络层头：两族互斥
#[derive(Debug, Clone, Copy)]
pub enum NetHdr {
    V4(Ipv4View),
    V6(Ipv6View),
}

/// 一次调用内有效的头视图集合。
///
/// 不变式：`tcp_len` 为 4 的倍数，介于 20 与 60 字节之间；
/// 调用结束即丢弃，绝不跨包保存。
#[derive(Debug, Clone, Copy)]
pub struct Headers {
    pub eth: EthView,
    pub net: NetHdr,
    pub tcp: TcpView,
    pub tcp_len: usize,
}

/// 解析结果：要么得到头视图继续处理，要么解析阶段已有定论。
#[derive(Debug)]
pub enum Dissection {
    Headers(Headers),
    Done(Verdict),
}

/// 解析一帧。
///
/// 策略：未知 EtherType 放行（不保护）；IPv4 头长/版本不一致丢弃；
/// 非 TCP 放行；IPv6 next-header 非 TCP 放行（扩展头不支持，已知风险）；
/// TCP 固定头不完整或 data offset 低于下限丢弃。
pub fn dissect(buf: &FrameBuf) -> Result<Dissection, Fault> {
    if buf.len() < eth::HDR_LEN {
        return Ok(Dissection::Done(Verdict::Drop));
    }
    let eth_view = EthView;

    let net = match eth_view.ethertype(buf)? {
        eth::ETH_P_IP => {
            if buf.len() < eth::HDR_LEN + ipv4::MIN_HDR_LEN {
                return Ok(Dissection::Done(Verdict::Drop));
            }
            let ip = Ipv4View::new(eth::HDR_LEN);
            if ip.ihl_bytes(buf)? < ipv4::MIN_HDR_LEN {
                return Ok(Dissection::Done(Verdict::Drop));
            }
            if ip.version(buf)? != 4 {
                return Ok(Dissection::Done(Verdict::Drop));
            }
            if ip.protocol(buf)? != ipv4::IPPROTO_TCP {
                return Ok(Dissection::Done(Verdict::Pass));
            }
            NetHdr::V4(ip)
        }
        eth::ETH_P_IPV6 => {
            if buf.len() < eth::HDR_LEN + ipv6::HDR_LEN {
                return Ok(Dissection::Done(Verdict::Drop));
            }
            let ip = Ipv6View::new(eth::HDR_LEN);
            if ip.version(buf)? != 6 {
                return Ok(Dissection::Done(Verdict::Drop));
            }
            // 扩展头不支持，携带扩展头的流量得不到保护
            if ip.nexthdr(buf)? != ipv4::IPPROTO_TCP {
                return Ok(Dissection::Done(Verdict::Pass));
            }
            NetHdr::V6(ip)
        }
        // VLAN 等链路层封装会绕过保护
        _ => return Ok(Dissection::Done(Verdict::Pass)),
    };

    let tcp_off = match net {
        NetHdr::V4(ip) => ip.off() + ip.ihl_bytes(buf)?,
        NetHdr::V6(ip) => ip.off() + ipv6::HDR_LEN,
    };
    if buf.len() < tcp_off + tcp::MIN_HDR_LEN {
        return Ok(Dissection::Done(Verdict::Drop));
    }
    let tcp_view = TcpView::new(tcp_off);
    let tcp_len = tcp_view.doff_bytes(buf)?;
    if tcp_len < tcp::MIN_HDR_LEN {
        return Ok(Dissection::Done(Verdict::Drop));
    }

    Ok(Dissection::Headers(Headers {
        eth: eth_view,
        net,
        tcp: tcp_view,
        tcp_len,
    }))
}
