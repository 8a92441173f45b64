use crate::notify::error::NotifyError;
use async_trait::async_trait;

/// # Summary
/// 发送通知到外部系统的接口定义。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以支持并发调用。
/// - 通知失败不应影响主流程，调用方按 best-effort 处理。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Summary
    /// 发送带有主题和内容的通知。
    ///
    /// # Arguments
    /// * `subject` - 通知标题或主题。
    /// * `content` - 通知的具体内容。
    async fn notify(&self, subject: &str, content: &str) -> Result<(), NotifyError>;
}
