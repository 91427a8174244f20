//! TCP 选项处理
//!
//! SYN 选项区的有界扫描（提取窗口缩放、SACK 许可、对端时间戳），
//! 以及 SYN-ACK 固定顺序选项的构造。扫描结果压缩进一个 32 位复合字，
//! 随后作为回复的时间戳值嵌入。

use crate::buf::{BufError, FrameBuf};
use crate::hdr::{TcpView, tcp};

/// 选项类别：列表结束
pub const TCPOPT_EOL: u8 = 0;
/// 选项类别：无操作填充
pub const TCPOPT_NOP: u8 = 1;
/// 选项类别：最大段长
pub const TCPOPT_MSS: u8 = 2;
/// 选项类别：窗口缩放
pub const TCPOPT_WINDOW: u8 = 3;
/// 选项类别：SACK 许可
pub const TCPOPT_SACK_PERM: u8 = 4;
/// 选项类别：时间戳
pub const TCPOPT_TIMESTAMP: u8 = 8;

pub const TCPOLEN_MSS: u8 = 4;
pub const TCPOLEN_WINDOW: u8 = 3;
pub const TCPOLEN_SACK_PERM: u8 = 2;
pub const TCPOLEN_TIMESTAMP: u8 = 10;

/// 窗口缩放的协议上限
pub const TCP_MAX_WSCALE: u8 = 14;

/// 复合字低 4 位：窗口缩放（全 1 表示对端未给出）
pub const TS_OPT_WSCALE_MASK: u32 = 0x0f;
/// 复合字位 4：对端允许 SACK
pub const TS_OPT_SACK: u32 = 1 << 4;
/// 复合字位 5：对端协商 ECN（SYN 同时携带 ECE 与 CWR）
pub const TS_OPT_ECN: u32 = 1 << 5;
/// 时间戳计数保留给标志位的低位位数
pub const TS_BITS: u32 = 6;
pub const TS_MASK: u32 = (1 << TS_BITS) - 1;

/// 单次扫描最多处理的选项条目数，限定每包最坏情况开销
pub const MAX_OPTION_ENTRIES: usize = 10;

/// 时间戳替换对：`tsval` 为复合字，`tsecr` 回显对端的时间戳值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsOpt {
    pub tsval: u32,
    pub tsecr: u32,
}

/// 有界扫描 SYN 的选项区。
///
/// 任何越过缓冲区末尾的读取都视为不可继续，整次扫描作废（返回
/// `None`，已收集的状态一并丢弃）；仅越过声明选项长度的读取只会
/// 提前结束扫描，已收集的状态保留。对端未携带时间戳选项时同样
/// 返回 `None`，调用方必须据此在回复中不携带任何时间戳选项。
pub fn scan_syn_options(
    buf: &FrameBuf,
    tcp_view: &TcpView,
    tcp_len: usize,
    ts_now: u32,
) -> Result<Option<TsOpt>, BufError> {
    let frame = buf.as_bytes();
    let mut p = tcp_view.options_off();
    let end = tcp_view.off() + tcp_len;

    let mut wscale = TS_OPT_WSCALE_MASK as u8;
    let mut sack = false;
    let mut ts_present = false;
    let mut tsecr = 0u32;

    for _ in 0..MAX_OPTION_ENTRIES {
        if p >= end {
            break;
        }
        if p + 1 > frame.len() {
            return Ok(None);
        }
        let opcode = frame[p];

        if opcode == TCPOPT_EOL {
            break;
        }
        if opcode == TCPOPT_NOP {
            p += 1;
            continue;
        }

        if p + 1 >= end {
            break;
        }
        if p + 2 > frame.len() {
            return Ok(None);
        }
        let opsize = usize::from(frame[p + 1]);
        if opsize < 2 {
            break;
        }
        if p + opsize > end {
            break;
        }

        match opcode {
            TCPOPT_WINDOW if opsize == usize::from(TCPOLEN_WINDOW) => {
                if p + opsize > frame.len() {
                    return Ok(None);
                }
                wscale = frame[p + 2].min(TCP_MAX_WSCALE);
            }
            TCPOPT_TIMESTAMP if opsize == usize::from(TCPOLEN_TIMESTAMP) => {
                if p + opsize > frame.len() {
                    return Ok(None);
                }
                // 对端的 tsval 将成为我方回复的 tsecr
                tsecr = u32::from_be_bytes([frame[p + 2], frame[p + 3], frame[p + 4], frame[p + 5]]);
                ts_present = true;
            }
            TCPOPT_SACK_PERM if opsize == usize::from(TCPOLEN_SACK_PERM) => {
                sack = true;
            }
            _ => {}
        }

        p += opsize;
    }

    if !ts_present {
        return Ok(None);
    }

    let flags = tcp_view.flags(buf)?;
    let mut tsval = ts_now & !TS_MASK;
    tsval |= u32::from(wscale) & TS_OPT_WSCALE_MASK;
    if sack {
        tsval |= TS_OPT_SACK;
    }
    if flags & tcp::ECE != 0 && flags & tcp::CWR != 0 {
        tsval |= TS_OPT_ECN;
    }

    Ok(Some(TsOpt { tsval, tsecr }))
}

/// 在 `opt_off` 处按固定顺序写入 SYN-ACK 选项，返回写入的 32 位字数。
///
/// MSS 永远在最前；其后仅当扫描产生了时间戳替换对时才追加
/// {SACK 许可, 时间戳} 或对齐用的 {NOP, NOP, 时间戳}，再接两个
/// 32 位时间戳字；复合字低 4 位非全 1（捕获到真实窗口缩放）时
/// 以 {NOP, 窗口缩放} 收尾。
pub fn write_synack_options(
    buf: &mut FrameBuf,
    opt_off: usize,
    ts: Option<&TsOpt>,
    mss: u16,
    wscale: u8,
) -> Result<u8, BufError> {
    let mut off = opt_off;
    let mut words: u8 = 0;

    buf.write_u32(
        off,
        (u32::from(TCPOPT_MSS) << 24) | (u32::from(TCPOLEN_MSS) << 16) | u32::from(mss),
    )?;
    off += 4;
    words += 1;

    let Some(ts) = ts else {
        return Ok(words);
    };

    let lead = if ts.tsval & TS_OPT_SACK != 0 {
        (u32::from(TCPOPT_SACK_PERM) << 24)
            | (u32::from(TCPOLEN_SACK_PERM) << 16)
            | (u32::from(TCPOPT_TIMESTAMP) << 8)
            | u32::from(TCPOLEN_TIMESTAMP)
    } else {
        (u32::from(TCPOPT_NOP) << 24)
            | (u32::from(TCPOPT_NOP) << 16)
            | (u32::from(TCPOPT_TIMESTAMP) << 8)
            | u32::from(TCPOLEN_TIMESTAMP)
    };
    buf.write_u32(off, lead)?;
    off += 4;
    words += 1;

    buf.write_u32(off, ts.tsval)?;
    off += 4;
    words += 1;
    buf.write_u32(off, ts.tsecr)?;
    off += 4;
    words += 1;

    if ts.tsval & TS_OPT_WSCALE_MASK != TS_OPT_WSCALE_MASK {
        buf.write_u32(
            off,
            (u32::from(TCPOPT_NOP) << 24)
                | (u32::from(TCPOPT_WINDOW) << 16)
                | (u32::from(TCPOLEN_WINDOW) << 8)
                | u32::from(wscale),
        )?;
        words += 1;
    }

    Ok(words)
}
