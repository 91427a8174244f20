//! SYN-ACK 计数器

use std::sync::atomic::{AtomicU64, Ordering};

/// 进程级单调计数器：每成功签发一个 SYN-ACK 恰好加一。
///
/// 并发自增不丢失；不要求与读取全序一致。
#[derive(Debug, Default)]
pub struct SynAckCounter(AtomicU64);

impl SynAckCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
