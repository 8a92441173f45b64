//! # `soba-market` - 实时行情聚合
//!
//! 为每个被追踪的标的维护一个内存聚合根：最新报价快照、
//! 滚动收盘价窗口与实时广播。聚合根按需创建，在零引用时
//! 通过清理通道从注册表中回收。

pub mod buffer;
pub mod hub;
pub mod instrument;
