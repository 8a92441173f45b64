use crate::indicators;
use chrono::Utc;
use soba_core::analysis::entity::{Signal, TechnicalReport};
use soba_core::store::error::StoreError;
use soba_core::store::port::JournalStore;
use std::sync::Arc;
use tracing::debug;

/// SMA / EMA / 布林带默认周期
const TREND_PERIOD: usize = 20;
/// RSI 默认周期
const RSI_PERIOD: usize = 14;
/// 布林带标准差倍数
const BOLL_K: f64 = 2.0;
/// RSI 超卖阈值
const RSI_OVERSOLD: f64 = 30.0;
/// RSI 超买阈值
const RSI_OVERBOUGHT: f64 = 70.0;

/// # Summary
/// 指标报告构建器：对收盘价窗口计算全套指标并持久化快照。
///
/// # Invariants
/// - 计算本身无状态，同样的输入必然产出同样的报告（时间戳除外）。
pub struct ReportBuilder {
    journal: Arc<dyn JournalStore>,
}

impl ReportBuilder {
    pub fn new(journal: Arc<dyn JournalStore>) -> Self {
        Self { journal }
    }

    /// # Summary
    /// 对收盘价窗口计算一份指标报告。
    ///
    /// # Logic
    /// 1. 分别计算 SMA / EMA / RSI / 布林带。
    /// 2. 斐波那契回撤以窗口极值为端点。
    /// 3. 由 RSI 与布林带位置推导建议信号。
    ///
    /// # Arguments
    /// * `symbol`: 交易标的。
    /// * `closes`: 按时间升序的收盘价。
    pub fn compute(&self, symbol: &str, closes: &[f64]) -> TechnicalReport {
        let sma = indicators::sma(closes, TREND_PERIOD);
        let ema = indicators::ema(closes, TREND_PERIOD);
        let rsi = indicators::rsi(closes, RSI_PERIOD);
        let bands = indicators::bollinger(closes, TREND_PERIOD, BOLL_K);

        let fib_levels = match (
            closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            closes.iter().cloned().fold(f64::INFINITY, f64::min),
        ) {
            (high, low) if high.is_finite() && low.is_finite() => {
                indicators::fibonacci_levels(high, low)
            }
            _ => Vec::new(),
        };

        let signal = derive_signal(closes.last().copied(), rsi, bands.as_ref());

        TechnicalReport {
            symbol: symbol.to_string(),
            sma,
            ema,
            rsi,
            boll_upper: bands.map(|b| b.upper),
            boll_middle: bands.map(|b| b.middle),
            boll_lower: bands.map(|b| b.lower),
            fib_levels,
            signal,
            sample_size: u32::try_from(closes.len()).unwrap_or(u32::MAX),
            computed_at: Utc::now(),
        }
    }

    /// 计算并通过 JournalStore 覆盖落库最新快照。
    pub async fn compute_and_store(
        &self,
        symbol: &str,
        closes: &[f64],
    ) -> Result<TechnicalReport, StoreError> {
        let report = self.compute(symbol, closes);
        self.journal.save_report(&report).await?;
        debug!(
            "Technical report stored: {} (samples={}, signal={})",
            symbol, report.sample_size, report.signal
        );
        Ok(report)
    }
}

/// # Summary
/// 由指标推导建议信号。
///
/// # Logic
/// 1. RSI 超卖 (<30) 给出买入，超买 (>70) 给出卖出。
/// 2. RSI 中性时看布林带：收盘跌破下轨买入，突破上轨卖出。
/// 3. 其余情况观望。
fn derive_signal(
    last_close: Option<f64>,
    rsi: f64,
    bands: Option<&indicators::Bands>,
) -> Signal {
    if rsi < RSI_OVERSOLD {
        return Signal::Buy;
    }
    if rsi > RSI_OVERBOUGHT {
        return Signal::Sell;
    }

    if let (Some(close), Some(b)) = (last_close, bands) {
        if close < b.lower {
            return Signal::Buy;
        }
        if close > b.upper {
            return Signal::Sell;
        }
    }

    Signal::Hold
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use soba_core::trade::entity::TransactionRecord;
    use std::sync::Mutex;

    struct MockJournal {
        saved: Mutex<Vec<TechnicalReport>>,
    }

    #[async_trait]
    impl JournalStore for MockJournal {
        async fn append_transaction(&self, _: &TransactionRecord) -> Result<(), StoreError> {
            Ok(())
        }
        async fn list_transactions(&self, _: usize) -> Result<Vec<TransactionRecord>, StoreError> {
            Ok(vec![])
        }
        async fn count_auto_trades_since(
            &self,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<u32, StoreError> {
            Ok(0)
        }
        async fn save_report(&self, report: &TechnicalReport) -> Result<(), StoreError> {
            self.saved
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(report.clone());
            Ok(())
        }
        async fn latest_report(&self, _: &str) -> Result<Option<TechnicalReport>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_report_with_sparse_history() {
        let journal = Arc::new(MockJournal {
            saved: Mutex::new(vec![]),
        });
        let builder = ReportBuilder::new(journal.clone());

        // 三个样本：趋势类指标为 None，RSI 退回中性值
        let report = builder
            .compute_and_store("AAPL", &[100.0, 101.0, 102.0])
            .await
            .unwrap();
        assert!(report.sma.is_none());
        assert!(report.boll_middle.is_none());
        assert_eq!(report.rsi, indicators::RSI_NEUTRAL);
        assert_eq!(report.signal, Signal::Hold);
        assert_eq!(report.sample_size, 3);
        assert_eq!(journal.saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_report_full_window() {
        let journal = Arc::new(MockJournal {
            saved: Mutex::new(vec![]),
        });
        let builder = ReportBuilder::new(journal);

        let closes: Vec<f64> = (1..=30).map(f64::from).collect();
        let report = builder.compute("TEST", &closes);

        // 中轨与同期 SMA 一致
        assert_eq!(report.boll_middle, report.sma);
        // 单边上涨 RSI 必然超买
        assert!(report.rsi > 70.0);
        assert_eq!(report.signal, Signal::Sell);
        // 回撤位覆盖窗口极值
        assert_eq!(report.fib_levels.first().copied(), Some(1.0));
        assert_eq!(report.fib_levels.last().copied(), Some(30.0));
    }

    #[test]
    fn test_signal_oversold() {
        // 单边下跌触发超卖买入信号
        let closes: Vec<f64> = (1..=30).map(|i| 100.0 - f64::from(i)).collect();
        let journal = Arc::new(MockJournal {
            saved: Mutex::new(vec![]),
        });
        let report = ReportBuilder::new(journal).compute("TEST", &closes);
        assert!(report.rsi < 30.0);
        assert_eq!(report.signal, Signal::Buy);
    }
}
