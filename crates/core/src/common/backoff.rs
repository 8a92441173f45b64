use std::time::Duration;

/// # Summary
/// 固定档位的指数退避策略，描述一次可重试操作的全部等待间隔。
///
/// # Invariants
/// - 策略本身只产出 `Duration` 序列，不持有任何异步运行时句柄，
///   由调用方负责实际的 sleep 与重试循环。
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    // 首次重试前的等待时间
    base: Duration,
    // 最大重试次数（不含首次尝试）
    max_retries: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    /// # Summary
    /// 系统默认的数据库重试档位：3 次重试，间隔 1s / 2s / 4s。
    pub fn standard() -> Self {
        Self::new(Duration::from_secs(1), 3)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// # Summary
    /// 计算第 `attempt` 次重试前的等待间隔 (attempt 从 0 开始)。
    ///
    /// # Logic
    /// 1. 间隔按 2 的幂次增长: base * 2^attempt。
    /// 2. 超出最大重试次数时返回 None，表示不应再重试。
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(self.base * 2u32.pow(attempt))
    }

    /// 产出完整的等待间隔序列，便于循环消费。
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).filter_map(|i| self.delay(i))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schedule() {
        let policy = BackoffPolicy::standard();
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(policy.delay(3), None);
    }
}
