//! 判决调度器
//!
//! 每包一次完整同步处理：解析 → 分片策略 → 连接状态旁路 →
//! SYN/ACK 分流 → 合成或 cookie 校验，返回固定判决集合之一。
//! 引擎对流无可变状态，可跨工作线程并发调用。

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use serde::Serialize;

use crate::buf::{BufError, FrameBuf};
use crate::cfg::{Family, PortAllowList, SynAckCounter, TuningStore};
use crate::clock::{Clock, MonotonicClock, tcp_timestamp};
use crate::csum;
use crate::hdr::{Dissection, Headers, NetHdr, TcpView, dissect, ipv4, ipv6, tcp};
use crate::opts;
use crate::oracle::{ConnTracker, CookieOracle, FlowTuple};
use crate::synack;

/// 每包判决
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// 原样放行，交给正常协议栈
    Pass,
    /// 静默丢弃
    Drop,
    /// 把（可能已改写的）缓冲从入口接口发回
    Transmit,
    /// 内部故障：按丢弃处理，但单独上报以供告警
    Abort,
}

/// 内部故障：正确部署中不应出现的情况。
#[derive(Debug, Error)]
pub enum Fault {
    #[error("frame buffer fault: {0}")]
    Buffer(#[from] BufError),
    #[error("oracle failure: {0}")]
    Oracle(#[from] crate::oracle::OracleError),
    #[error("tcp header length {len} below minimum after tail growth")]
    HeaderAfterGrowth { len: usize },
    #[error("frame of {have} bytes cannot hold a rewritten syn-ack")]
    SynAckSpace { have: usize },
    #[error("no ipv6 cookie verification path")]
    Ipv6AckVerify,
}

/// SYN 代理引擎。
///
/// cookie 与连接状态均为注入的外部协作者；共享句柄只读或原子自增，
/// 处理路径上不分配、不阻塞、不重试。
pub struct SynProxy<C, T, K = MonotonicClock> {
    cookies: C,
    conntrack: T,
    clock: K,
    tuning: Arc<TuningStore>,
    ports: Arc<PortAllowList>,
    synacks: Arc<SynAckCounter>,
}

impl<C, T, K> SynProxy<C, T, K>
where
    C: CookieOracle,
    T: ConnTracker,
    K: Clock,
{
    pub fn new(
        cookies: C,
        conntrack: T,
        clock: K,
        tuning: Arc<TuningStore>,
        ports: Arc<PortAllowList>,
        synacks: Arc<SynAckCounter>,
    ) -> Self {
        Self {
            cookies,
            conntrack,
            clock,
            tuning,
            ports,
            synacks,
        }
    }

    /// 已签发的 SYN-ACK 总数
    pub fn synacks_issued(&self) -> u64 {
        self.synacks.count()
    }

    /// 处理一个数据包。
    ///
    /// 任何内部故障都记录日志并转换为 [`Verdict::Abort`]；
    /// 本函数不 panic、不返回错误，每个判决对该包都是最终的。
    pub fn process(&self, buf: &mut FrameBuf) -> Verdict {
        match self.run(buf) {
            Ok(v) => v,
            Err(fault) => {
                warn!(%fault, "内部故障，按 ABORT 丢弃");
                Verdict::Abort
            }
        }
    }

    fn run(&self, buf: &mut FrameBuf) -> Result<Verdict, Fault> {
        let mut hdr = match dissect(buf)? {
            Dissection::Done(v) => return Ok(v),
            Dissection::Headers(h) => h,
        };

        if let NetHdr::V4(ip) = hdr.net {
            // TCP 正常不分片，本路径也无法重组；只放行恰好置 DF 的段。
            let frag = ip.frag_off(buf)?;
            if frag & (ipv4::IP_DF | ipv4::IP_MF | ipv4::IP_OFFSET) != ipv4::IP_DF {
                debug!(frag, "分片或未置 DF 的 TCP 段，丢弃");
                return Ok(Verdict::Drop);
            }
        }

        let tuple = flow_tuple(buf, &hdr)?;

        // 已确认的流无条件放行，完全绕开 cookie 逻辑
        if let Some(state) = self.conntrack.lookup(&tuple)? {
            if state.confirmed {
                return Ok(Verdict::Pass);
            }
        }

        let flags = hdr.tcp.flags(buf)?;
        let syn = flags & tcp::SYN != 0;
        let ack = flags & tcp::ACK != 0;
        // 既非签发 cookie 的 SYN，也非回赎 cookie 的纯 ACK
        if syn == ack {
            return Ok(Verdict::Drop);
        }

        // 把尾部增长到最大 TCP 头长度，使后续选项长度处理一律安全，
        // 然后针对新边界重解析并从（未修改的）data offset 重算头长。
        buf.grow(tcp::MAX_HDR_LEN - hdr.tcp_len)?;
        reresolve(buf, &mut hdr)?;

        if syn {
            self.handle_syn(buf, &mut hdr, &tuple)
        } else {
            self.handle_ack(buf, &hdr, &tuple)
        }
    }

    fn handle_syn(
        &self,
        buf: &mut FrameBuf,
        hdr: &mut Headers,
        tuple: &FlowTuple,
    ) -> Result<Verdict, Fault> {
        // 签发 SYN-ACK 之前先独立验证两层入站校验和
        if let NetHdr::V4(ip) = hdr.net {
            if !csum::verify_ipv4_header(buf, &ip)? {
                debug!("IPv4 首部校验和错误，丢弃 SYN");
                return Ok(Verdict::Drop);
            }
        }
        if !csum::verify_tcp(buf, &hdr.net, &hdr.tcp, hdr.tcp_len)? {
            debug!("TCP 校验和错误，丢弃 SYN");
            return Ok(Verdict::Drop);
        }

        // 仅对放行端口签发 cookie，其余端口上的 SYN 一律丢弃
        let dport = hdr.tcp.dport(buf)?;
        if !self.ports.allows(dport) {
            debug!(dport, "端口未放行，丢弃 SYN");
            return Ok(Verdict::Drop);
        }

        let (ip_off, ip_len) = match hdr.net {
            NetHdr::V4(ip) => (ip.off(), ipv4::MIN_HDR_LEN),
            NetHdr::V6(ip) => (ip.off(), ipv6::HDR_LEN),
        };
        let cookie = {
            let ip_bytes = buf.slice(ip_off, ip_len)?;
            let tcp_bytes = buf.slice(hdr.tcp.off(), hdr.tcp_len)?;
            self.cookies.generate(tuple, ip_bytes, tcp_bytes)?
        };

        let ts_now = tcp_timestamp(self.clock.now_ns());
        let ts = opts::scan_syn_options(buf, &hdr.tcp, hdr.tcp_len, ts_now)?;

        let family = match hdr.net {
            NetHdr::V4(_) => Family::V4,
            NetHdr::V6(_) => Family::V6,
        };
        let tuning = self.tuning.get(family);

        synack::synthesize(buf, hdr, cookie, ts.as_ref(), tuning, &self.synacks)?;
        debug!(dport, cookie, "已签发 SYN-ACK");
        Ok(Verdict::Transmit)
    }

    fn handle_ack(
        &self,
        buf: &FrameBuf,
        hdr: &Headers,
        tuple: &FlowTuple,
    ) -> Result<Verdict, Fault> {
        // 目前仅定义了 IPv4 的校验路径
        let NetHdr::V4(ip) = hdr.net else {
            return Err(Fault::Ipv6AckVerify);
        };
        let ip_bytes = buf.slice(ip.off(), ipv4::MIN_HDR_LEN)?;
        let tcp_bytes = buf.slice(hdr.tcp.off(), hdr.tcp_len)?;
        if self.cookies.verify(tuple, ip_bytes, tcp_bytes)? {
            Ok(Verdict::Pass)
        } else {
            debug!("cookie 校验失败，丢弃 ACK");
            Ok(Verdict::Drop)
        }
    }
}

/// 增长后针对新边界重解析头视图。
///
/// IPv4 额外要求最大 IPv4 头整段可访问（后续校验和阶段需要），
/// 最大 TCP 头同样整段可访问；重算出的头长低于下限视为故障，
/// 先前的解析已排除这种情况。
fn reresolve(buf: &FrameBuf, hdr: &mut Headers) -> Result<(), Fault> {
    let tcp_off = match hdr.net {
        NetHdr::V4(ip) => {
            buf.slice(ip.off(), ipv4::MAX_HDR_LEN)?;
            ip.off() + ip.ihl_bytes(buf)?
        }
        NetHdr::V6(ip) => ip.off() + ipv6::HDR_LEN,
    };
    buf.slice(tcp_off, tcp::MAX_HDR_LEN)?;
    hdr.tcp = TcpView::new(tcp_off);
    hdr.tcp_len = hdr.tcp.doff_bytes(buf)?;
    if hdr.tcp_len < tcp::MIN_HDR_LEN {
        return Err(Fault::HeaderAfterGrowth { len: hdr.tcp_len });
    }
    Ok(())
}

/// 由当前头视图构造流四元组
fn flow_tuple(buf: &FrameBuf, hdr: &Headers) -> Result<FlowTuple, Fault> {
    let sport = hdr.tcp.sport(buf)?;
    let dport = hdr.tcp.dport(buf)?;
    Ok(match hdr.net {
        NetHdr::V4(ip) => FlowTuple::V4 {
            saddr: ip.saddr(buf)?,
            daddr: ip.daddr(buf)?,
            sport,
            dport,
        },
        NetHdr::V6(ip) => FlowTuple::V6 {
            saddr: ip.saddr(buf)?,
            daddr: ip.daddr(buf)?,
            sport,
            dport,
        },
    })
}
