//! 控制面配置描述（JSON）

use serde::{Deserialize, Serialize};

use super::{DEFAULT_MSS4, DEFAULT_MSS6, DEFAULT_TTL, DEFAULT_WSCALE, PortAllowList, TuningStore};

/// 控制面下发的一份配置；未给出的字段保持编译期默认。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySpec {
    #[serde(default)]
    pub mss_v4: Option<u16>,
    #[serde(default)]
    pub mss_v6: Option<u16>,
    #[serde(default)]
    pub window_scale: Option<u8>,
    #[serde(default)]
    pub ttl: Option<u8>,
    #[serde(default)]
    pub allowed_ports: Vec<u16>,
}

impl ProxySpec {
    /// 应用到运行时存储。
    ///
    /// 任一调优字段给出时组包整字写入（缺省字段取默认值补齐）；
    /// 全部缺省则不写，读端继续落在编译期默认值上。
    pub fn apply(&self, tuning: &TuningStore, ports: &PortAllowList) {
        if self.mss_v4.is_some()
            || self.mss_v6.is_some()
            || self.window_scale.is_some()
            || self.ttl.is_some()
        {
            tuning.set(
                self.mss_v4.unwrap_or(DEFAULT_MSS4),
                self.mss_v6.unwrap_or(DEFAULT_MSS6),
                self.window_scale.unwrap_or(DEFAULT_WSCALE),
                self.ttl.unwrap_or(DEFAULT_TTL),
            );
        }
        ports.install(&self.allowed_ports);
    }
}
