//! SYN-ACK 合成器
//!
//! 把一个验证过的 SYN 在原帧缓冲上就地改写为 SYN-ACK：地址交换、
//! 标志与序号改写、选项重建、长度与校验和修正、缓冲区尺寸调整。

use tracing::trace;

use crate::buf::FrameBuf;
use crate::cfg::{SynAckCounter, Tuning};
use crate::csum;
use crate::engine::Fault;
use crate::hdr::{Headers, NetHdr, TcpView, eth, ipv4, ipv6, tcp};
use crate::opts::{self, TsOpt};

/// 就地合成 SYN-ACK 并把帧长调整为新总长。
///
/// 进入前提：入站校验和已验证、端口已放行、cookie 已签发、
/// 缓冲区尾部已增长到最大 TCP 头长度。剩余容量不足属于内部故障。
pub fn synthesize(
    buf: &mut FrameBuf,
    hdr: &mut Headers,
    cookie: u32,
    ts: Option<&TsOpt>,
    tuning: Tuning,
    counter: &SynAckCounter,
) -> Result<(), Fault> {
    let ip_len = match hdr.net {
        NetHdr::V4(_) => ipv4::MIN_HDR_LEN,
        NetHdr::V6(_) => ipv6::HDR_LEN,
    };

    if eth::HDR_LEN + ip_len + tcp::MAX_HDR_LEN > buf.len() {
        return Err(Fault::SynAckSpace { have: buf.len() });
    }

    // IPv4 携带 IP 选项时：把 20 字节 TCP 固定头下拉到 20 字节 IP 头
    // 之后再改写，回复不携带 IP 选项。
    if let NetHdr::V4(ip) = hdr.net {
        if ip.ihl_bytes(buf)? > ipv4::MIN_HDR_LEN {
            let new_off = eth::HDR_LEN + ipv4::MIN_HDR_LEN;
            buf.copy_within(hdr.tcp.off(), new_off, tcp::MIN_HDR_LEN)?;
            hdr.tcp = TcpView::new(new_off);
            ip.set_ihl_words(buf, (ipv4::MIN_HDR_LEN / 4) as u8)?;
        }
    }

    hdr.eth.swap_addrs(buf)?;

    match hdr.net {
        NetHdr::V4(ip) => {
            ip.swap_addrs(buf)?;
            ip.set_checksum(buf, 0)?;
            ip.set_tos(buf, 0)?;
            ip.set_id(buf, 0)?;
            ip.set_ttl(buf, tuning.ttl)?;
        }
        NetHdr::V6(ip) => {
            ip.swap_addrs(buf)?;
            ip.set_version_word(buf, ipv6::VERSION_WORD)?;
            ip.set_hop_limit(buf, tuning.ttl)?;
        }
    }

    rewrite_tcp(buf, hdr, cookie, ts, tuning)?;

    match hdr.net {
        NetHdr::V4(ip) => ip.set_total_len(buf, (ipv4::MIN_HDR_LEN + hdr.tcp_len) as u16)?,
        NetHdr::V6(ip) => ip.set_payload_len(buf, hdr.tcp_len as u16)?,
    }

    // 从最终字节整段重算两族校验和
    csum::finalize_tcp(buf, &hdr.net, &hdr.tcp, hdr.tcp_len)?;
    if let NetHdr::V4(ip) = hdr.net {
        csum::finalize_ipv4_header(buf, &ip)?;
    }

    let new_len = eth::HDR_LEN + ip_len + hdr.tcp_len;
    resize_to(buf, new_len)?;

    counter.increment();
    trace!(tcp_len = hdr.tcp_len, frame_len = new_len, "SYN-ACK 合成完成");
    Ok(())
}

/// 重建 TCP 头：标志、确认号、cookie 序号、零窗口、选项与 data offset。
fn rewrite_tcp(
    buf: &mut FrameBuf,
    hdr: &mut Headers,
    cookie: u32,
    ts: Option<&TsOpt>,
    tuning: Tuning,
) -> Result<(), Fault> {
    let t = hdr.tcp;
    let isn = t.seq(buf)?;

    t.swap_ports(buf)?;
    t.set_ack_seq(buf, isn.wrapping_add(1))?;
    t.set_seq(buf, cookie)?;
    t.set_window(buf, 0)?;
    t.set_urgent(buf, 0)?;
    t.set_checksum(buf, 0)?;

    let mut flags = tcp::SYN | tcp::ACK;
    if let Some(ts) = ts {
        if ts.tsval & opts::TS_OPT_ECN != 0 {
            flags |= tcp::ECE;
        }
    }

    let opt_words = opts::write_synack_options(buf, t.options_off(), ts, tuning.mss, tuning.wscale)?;
    let doff_words = (tcp::MIN_HDR_LEN / 4) as u8 + opt_words;
    t.set_doff_flags(buf, doff_words, flags)?;
    hdr.tcp_len = usize::from(doff_words) * 4;
    Ok(())
}

fn resize_to(buf: &mut FrameBuf, new_len: usize) -> Result<(), Fault> {
    let old = buf.len();
    if new_len > old {
        buf.grow(new_len - old)?;
    } else {
        buf.shrink(old - new_len)?;
    }
    Ok(())
}
