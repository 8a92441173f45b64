//! # `soba-notify` - 成交通知
//!
//! Notifier 端口的两个出站实现：Telegram Bot 与 SMTP 邮件。
//! 交易引擎在成交后逐个调用已配置的通道，失败按 best-effort 处理。

pub mod email;
pub mod telegram;
