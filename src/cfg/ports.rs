//! 端口放行表

use std::sync::atomic::{AtomicU16, Ordering};

/// 放行表容量（条目数），同时是成员查询的扫描上界
pub const MAX_ALLOWED_PORTS: usize = 65535;

/// 有序、以 0 哨兵终止的端口放行表。
///
/// 读端无锁（relaxed 加载），控制面按槽整值替换；最终一致即可。
pub struct PortAllowList {
    slots: Box<[AtomicU16]>,
}

impl Default for PortAllowList {
    fn default() -> Self {
        Self::new()
    }
}

impl PortAllowList {
    pub fn new() -> Self {
        let slots: Vec<AtomicU16> = (0..MAX_ALLOWED_PORTS).map(|_| AtomicU16::new(0)).collect();
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    /// 目的端口是否放行。
    ///
    /// 从槽 0 起顺序扫描，遇到第一个 0 哨兵即返回“未放行”。
    /// 0 永远不可能是合法放行端口，先查哨兵避免把被禁端口 0 误判为命中。
    pub fn allows(&self, port: u16) -> bool {
        for slot in self.slots.iter() {
            let v = slot.load(Ordering::Relaxed);
            if v == 0 {
                return false;
            }
            if v == port {
                return true;
            }
        }
        false
    }

    /// 控制面安装端口集合；超出容量的尾部被截断。
    pub fn install(&self, ports: &[u16]) {
        let n = ports.len().min(MAX_ALLOWED_PORTS);
        for (slot, &p) in self.slots.iter().zip(&ports[..n]) {
            slot.store(p, Ordering::Relaxed);
        }
        if n < MAX_ALLOWED_PORTS {
            self.slots[n].store(0, Ordering::Relaxed);
        }
    }

    /// 清空放行表。
    pub fn clear(&self) {
        self.slots[0].store(0, Ordering::Relaxed);
    }
}
