//! 地址族调优参数（MSS / 窗口缩放 / TTL）

use std::sync::atomic::{AtomicU64, Ordering};

/// IPv4 默认 MSS
pub const DEFAULT_MSS4: u16 = 1460;
/// IPv6 默认 MSS
pub const DEFAULT_MSS6: u16 = 1440;
/// 默认窗口缩放
pub const DEFAULT_WSCALE: u8 = 7;
/// 默认 TTL / hop limit
pub const DEFAULT_TTL: u8 = 64;

/// 地址族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

/// 解析后的调优参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub mss: u16,
    pub wscale: u8,
    pub ttl: u8,
}

/// 调优参数存储：单个打包字，控制面整字替换，读端无锁。
///
/// 位布局：bits 0..16 为 IPv4 MSS，16..20 为窗口缩放，24..32 为 TTL，
/// 32..48 为 IPv6 MSS。字为 0 视为未配置。
#[derive(Debug, Default)]
pub struct TuningStore {
    word: AtomicU64,
}

impl TuningStore {
    pub fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    /// 读取某地址族的调优参数；未配置时返回编译期默认值。
    pub fn get(&self, family: Family) -> Tuning {
        let v = self.word.load(Ordering::Relaxed);
        if v == 0 {
            return Tuning {
                mss: match family {
                    Family::V4 => DEFAULT_MSS4,
                    Family::V6 => DEFAULT_MSS6,
                },
                wscale: DEFAULT_WSCALE,
                ttl: DEFAULT_TTL,
            };
        }
        let mss = match family {
            Family::V4 => (v & 0xffff) as u16,
            Family::V6 => ((v >> 32) & 0xffff) as u16,
        };
        Tuning {
            mss,
            wscale: ((v >> 16) & 0x0f) as u8,
            ttl: ((v >> 24) & 0xff) as u8,
        }
    }

    /// 控制面写入：组包后整字替换。
    pub fn set(&self, mss4: u16, mss6: u16, wscale: u8, ttl: u8) {
        let word = u64::from(mss4)
            | (u64::from(wscale & 0x0f) << 16)
            | (u64::from(ttl) << 24)
            | (u64::from(mss6) << 32);
        self.word.store(word, Ordering::Relaxed);
    }

    /// 清除配置，回到默认值。
    pub fn clear(&self) {
        self.word.store(0, Ordering::Relaxed);
    }
}
