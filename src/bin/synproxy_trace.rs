//! SYN 代理引擎单握手演示
//!
//! 构造一个携带常见选项的 SYN 帧送入引擎，展示签发的 SYN-ACK；
//! 随后构造对应的握手 ACK，演示 cookie 回赎路径。

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use synproxy_rs::buf::FrameBuf;
use synproxy_rs::cfg::{PortAllowList, ProxySpec, SynAckCounter, TuningStore};
use synproxy_rs::clock::MonotonicClock;
use synproxy_rs::csum;
use synproxy_rs::engine::{SynProxy, Verdict};
use synproxy_rs::hdr::{Dissection, NetHdr, dissect};
use synproxy_rs::oracle::{HashCookieOracle, NullConnTracker};

#[derive(Debug, Parser)]
#[command(name = "synproxy-trace", about = "SYN 代理演示：单个握手的 cookie 签发与回赎")]
struct Args {
    /// 目的端口；未提供配置文件时自动加入放行表
    #[arg(long, default_value_t = 443)]
    port: u16,

    /// 构造 IPv6 SYN（默认 IPv4）
    #[arg(long, default_value_t = false)]
    ipv6: bool,

    /// 控制面配置文件（JSON，字段见 ProxySpec）
    #[arg(long)]
    spec: Option<PathBuf>,

    /// 以 JSON 输出结果
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SynAckReport {
    frame_len: usize,
    tcp_header_len: usize,
    cookie: u32,
    ack: u32,
    options_hex: String,
}

#[derive(Debug, Serialize)]
struct Report {
    syn_verdict: Verdict,
    synack: Option<SynAckReport>,
    ack_verdict: Option<Verdict>,
    synacks_issued: u64,
}

const CLIENT_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
const SERVER_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
const CLIENT_IP: u32 = 0xc0a8_0105;
const SERVER_IP: u32 = 0xc0a8_0101;
const CLIENT_IP6: [u8; 16] = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x05];
const SERVER_IP6: [u8; 16] = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01];
const CLIENT_PORT: u16 = 40000;
const CLIENT_ISN: u32 = 0x1000_0000;
const HEADROOM: usize = 64;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let tuning = Arc::new(TuningStore::new());
    let ports = Arc::new(PortAllowList::new());
    match &args.spec {
        Some(path) => {
            let text = fs::read_to_string(path).expect("read spec file");
            let spec: ProxySpec = serde_json::from_str(&text).expect("parse spec json");
            spec.apply(&tuning, &ports);
        }
        None => ports.install(&[args.port]),
    }

    let synacks = Arc::new(SynAckCounter::new());
    let cookies = HashCookieOracle::new(0x7478_6c61, 0x6b9e_5c03, MonotonicClock::new());
    let proxy = SynProxy::new(
        cookies,
        NullConnTracker,
        MonotonicClock::new(),
        tuning.clone(),
        ports.clone(),
        synacks.clone(),
    );

    let mut buf = if args.ipv6 {
        syn_frame_v6(args.port)
    } else {
        syn_frame_v4(args.port)
    };

    let syn_verdict = proxy.process(&mut buf);
    info!(?syn_verdict, frame_len = buf.len(), "SYN 处理完成");

    let mut synack = None;
    let mut ack_verdict = None;
    if syn_verdict == Verdict::Transmit {
        let report = describe_synack(&buf);
        // IPv6 的 ACK 校验路径未实现，仅演示 IPv4 的回赎
        if !args.ipv6 {
            let mut ack = ack_frame_v4(args.port, report.cookie);
            let v = proxy.process(&mut ack);
            info!(?v, "握手 ACK 处理完成");
            ack_verdict = Some(v);
        }
        synack = Some(report);
    }

    let report = Report {
        syn_verdict,
        synack,
        ack_verdict,
        synacks_issued: proxy.synacks_issued(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).expect("serialize report"));
    } else {
        println!("SYN 判决          : {:?}", report.syn_verdict);
        if let Some(sa) = &report.synack {
            println!("SYN-ACK 帧长      : {}", sa.frame_len);
            println!("SYN-ACK TCP 头长  : {}", sa.tcp_header_len);
            println!("cookie (seq)      : {:#010x}", sa.cookie);
            println!("ack               : {:#010x}", sa.ack);
            println!("选项字节          : {}", sa.options_hex);
        }
        if let Some(v) = report.ack_verdict {
            println!("握手 ACK 判决     : {v:?}");
        }
        println!("已签发 SYN-ACK 数 : {}", report.synacks_issued);
    }
}

/// 从签发的 SYN-ACK 中提取演示用的关键字段
fn describe_synack(buf: &FrameBuf) -> SynAckReport {
    let Dissection::Headers(h) = dissect(buf).expect("dissect synack") else {
        panic!("synack frame must dissect");
    };
    let options = &buf.as_bytes()[h.tcp.options_off()..h.tcp.off() + h.tcp_len];
    SynAckReport {
        frame_len: buf.len(),
        tcp_header_len: h.tcp_len,
        cookie: h.tcp.seq(buf).expect("seq"),
        ack: h.tcp.ack_seq(buf).expect("ack"),
        options_hex: options
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// 常见客户端选项：MSS 1380、SACK 许可、时间戳、NOP、窗口缩放 7
fn client_options() -> Vec<u8> {
    let mut o = vec![2, 4, 0x05, 0x64, 4, 2, 8, 10];
    o.extend_from_slice(&1000u32.to_be_bytes());
    o.extend_from_slice(&0u32.to_be_bytes());
    o.extend_from_slice(&[1, 3, 3, 7]);
    o
}

fn syn_frame_v4(port: u16) -> FrameBuf {
    build_v4(port, CLIENT_ISN, 0, 0x0002, &client_options())
}

fn ack_frame_v4(port: u16, cookie: u32) -> FrameBuf {
    build_v4(port, CLIENT_ISN.wrapping_add(1), cookie.wrapping_add(1), 0x0010, &[])
}

fn build_v4(port: u16, seq: u32, ack: u32, flags: u16, options: &[u8]) -> FrameBuf {
    let tcp_len = 20 + options.len();
    let mut f = Vec::new();
    f.extend_from_slice(&SERVER_MAC);
    f.extend_from_slice(&CLIENT_MAC);
    f.extend_from_slice(&0x0800u16.to_be_bytes());

    f.push(0x45);
    f.push(0);
    f.extend_from_slice(&((20 + tcp_len) as u16).to_be_bytes());
    f.extend_from_slice(&[0, 0]); // id
    f.extend_from_slice(&0x4000u16.to_be_bytes()); // DF
    f.push(64);
    f.push(6);
    f.extend_from_slice(&[0, 0]); // checksum，由下方统一重算
    f.extend_from_slice(&CLIENT_IP.to_be_bytes());
    f.extend_from_slice(&SERVER_IP.to_be_bytes());

    push_tcp(&mut f, port, seq, ack, flags, options);
    finish(FrameBuf::with_headroom(&f, HEADROOM))
}

fn syn_frame_v6(port: u16) -> FrameBuf {
    let options = client_options();
    let tcp_len = 20 + options.len();
    let mut f = Vec::new();
    f.extend_from_slice(&SERVER_MAC);
    f.extend_from_slice(&CLIENT_MAC);
    f.extend_from_slice(&0x86ddu16.to_be_bytes());

    f.extend_from_slice(&0x6000_0000u32.to_be_bytes());
    f.extend_from_slice(&(tcp_len as u16).to_be_bytes());
    f.push(6);
    f.push(64);
    f.extend_from_slice(&CLIENT_IP6);
    f.extend_from_slice(&SERVER_IP6);

    push_tcp(&mut f, port, CLIENT_ISN, 0, 0x0002, &options);
    finish(FrameBuf::with_headroom(&f, HEADROOM))
}

fn push_tcp(f: &mut Vec<u8>, port: u16, seq: u32, ack: u32, flags: u16, options: &[u8]) {
    let tcp_len = 20 + options.len();
    f.extend_from_slice(&CLIENT_PORT.to_be_bytes());
    f.extend_from_slice(&port.to_be_bytes());
    f.extend_from_slice(&seq.to_be_bytes());
    f.extend_from_slice(&ack.to_be_bytes());
    let doff_flags = (((tcp_len / 4) as u16) << 12) | flags;
    f.extend_from_slice(&doff_flags.to_be_bytes());
    f.extend_from_slice(&0xfde8u16.to_be_bytes());
    f.extend_from_slice(&[0, 0, 0, 0]); // checksum + urgent
    f.extend_from_slice(options);
}

/// 用引擎自己的校验和例程补全构造帧的校验和
fn finish(mut buf: FrameBuf) -> FrameBuf {
    let Dissection::Headers(h) = dissect(&buf).expect("dissect crafted frame") else {
        panic!("crafted frame must dissect");
    };
    csum::finalize_tcp(&mut buf, &h.net, &h.tcp, h.tcp_len).expect("tcp checksum");
    if let NetHdr::V4(ip) = h.net {
        csum::finalize_ipv4_header(&mut buf, &ip).expect("ip checksum");
    }
    buf
}
