//! # `soba-analysis` - 技术指标计算
//!
//! 对收盘价窗口计算教科书式技术指标 (SMA / EMA / RSI / 布林带 /
//! 斐波那契回撤)，汇总为 TechnicalReport 快照并通过存储端口落库。
//! 指标函数均为无状态纯函数，便于独立验证数值性质。

pub mod indicators;
pub mod report;
