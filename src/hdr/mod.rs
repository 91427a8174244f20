//! 协议头模块
//!
//! 以太网 / IPv4 / IPv6 / TCP 头的偏移视图与单遍解析器。
//! 视图只持有帧内偏移，字段访问全部经过 `FrameBuf` 的边界检查。

mod dissect;
pub mod eth;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;

pub use dissect::{Dissection, Headers, NetHdr, dissect};
pub use eth::EthView;
pub use ipv4::Ipv4View;
pub use ipv6::Ipv6View;
pub use tcp::TcpView;
