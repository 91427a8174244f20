//! 运行时配置模块
//!
//! 控制面拥有并写入、引擎只读消费的共享配置：地址族调优参数、
//! 端口放行表、SYN-ACK 计数器，以及控制面下发用的 JSON 描述。

mod counter;
mod ports;
mod spec;
mod tuning;

pub use counter::SynAckCounter;
pub use ports::{MAX_ALLOWED_PORTS, PortAllowList};
pub use spec::ProxySpec;
pub use tuning::{DEFAULT_MSS4, DEFAULT_MSS6, DEFAULT_TTL, DEFAULT_WSCALE, Family, Tuning, TuningStore};
