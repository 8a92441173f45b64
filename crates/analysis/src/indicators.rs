//! 指标纯函数。入参统一为按时间升序排列的收盘价切片。

/// RSI 数据不足时返回的中性值
pub const RSI_NEUTRAL: f64 = 50.0;

/// 斐波那契回撤比例，自 0% 到 100%
const FIB_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// # Summary
/// 简单移动平均：最近 `period` 个收盘价的算术平均。
///
/// # Returns
/// 样本不足 `period` 个或 `period` 为 0 时返回 None。
pub fn sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let window = &prices[prices.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// # Summary
/// 指数移动平均。
///
/// # Logic
/// 1. 前 `period` 个样本的 SMA 作为种子。
/// 2. 之后按乘数 2/(period+1) 逐点递推。
///
/// # Returns
/// 样本不足时返回 None。
pub fn ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = prices[..period].iter().sum::<f64>() / period as f64;

    let mut current = seed;
    for &price in &prices[period..] {
        current = (price - current) * multiplier + current;
    }
    Some(current)
}

/// # Summary
/// 相对强弱指数 (Wilder 平滑)。
///
/// # Logic
/// 1. 需要 `period + 1` 个样本才能得到 `period` 个涨跌差。
/// 2. 初始平均涨跌取前 `period` 个差值的算术平均。
/// 3. 其后按 (prev * (n-1) + current) / n 递推。
/// 4. 平均跌幅为零时 RSI 为 100。
///
/// # Returns
/// 数据不足时返回中性值 50。
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return RSI_NEUTRAL;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let p = period as f64;
    for i in (period + 1)..prices.len() {
        let change = prices[i] - prices[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// 布林带三轨。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// # Summary
/// 布林带：中轨为同期 SMA，上下轨为中轨 ± k 倍标准差。
///
/// # Logic
/// 1. 中轨 = sma(prices, period)。
/// 2. 标准差取窗口内总体标准差。
///
/// # Returns
/// 样本不足时返回 None。
pub fn bollinger(prices: &[f64], period: usize, k: f64) -> Option<Bands> {
    let middle = sma(prices, period)?;
    let window = &prices[prices.len() - period..];
    let variance =
        window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(Bands {
        upper: middle + k * std_dev,
        middle,
        lower: middle - k * std_dev,
    })
}

/// # Summary
/// 斐波那契回撤位。
///
/// # Logic
/// 1. 以窗口内最低价与最高价为端点。
/// 2. 在两端点之间按标准比例插值，输出自低到高单调排列。
///
/// # Returns
/// `high < low` 时视为入参错误，返回空列表。
pub fn fibonacci_levels(high: f64, low: f64) -> Vec<f64> {
    if high < low {
        return Vec::new();
    }
    let span = high - low;
    FIB_RATIOS.iter().map(|r| low + span * r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_equals_mean_of_full_window() {
        // 20 期 SMA 对 20 个样本就是算术平均
        let prices: Vec<f64> = (1..=20).map(f64::from).collect();
        let mean = prices.iter().sum::<f64>() / 20.0;
        assert_eq!(sma(&prices, 20), Some(mean));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = [1.0, 2.0, 3.0];
        assert_eq!(sma(&prices, 4), None);
        assert_eq!(sma(&prices, 0), None);
    }

    #[test]
    fn test_sma_uses_latest_window() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        // 最近 3 个: (3+4+5)/3
        assert_eq!(sma(&prices, 3), Some(4.0));
    }

    #[test]
    fn test_ema_seed_and_step() {
        // 种子 SMA(2,4,6)=4.0；乘数 2/(3+1)=0.5；EMA = (8-4)*0.5+4 = 6.0
        let prices = [2.0, 4.0, 6.0, 8.0];
        let v = ema(&prices, 3).unwrap();
        assert!((v - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_rsi_neutral_when_insufficient() {
        // 数据不足时返回中性值 50
        assert_eq!(rsi(&[], 14), RSI_NEUTRAL);
        let prices = [44.0, 44.25, 44.5];
        assert_eq!(rsi(&prices, 14), RSI_NEUTRAL);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let prices = [1.0, 2.0, 3.0, 4.0];
        assert!((rsi(&prices, 3) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_rsi_in_open_interval() {
        let prices = [44.0, 44.25, 44.5, 43.75, 44.5, 44.25];
        let v = rsi(&prices, 5);
        assert!(v > 0.0 && v < 100.0);
    }

    #[test]
    fn test_bollinger_middle_is_sma() {
        let prices = [10.0, 11.0, 12.0, 13.0, 14.0];
        let bands = bollinger(&prices, 5, 2.0).unwrap();
        assert_eq!(Some(bands.middle), sma(&prices, 5));
        assert!(bands.upper > bands.middle);
        assert!(bands.lower < bands.middle);
        // 上下轨关于中轨对称
        assert!(((bands.upper - bands.middle) - (bands.middle - bands.lower)).abs() < 1e-10);
    }

    #[test]
    fn test_bollinger_flat_prices_collapse() {
        let prices = [5.0; 10];
        let bands = bollinger(&prices, 10, 2.0).unwrap();
        assert_eq!(bands.upper, 5.0);
        assert_eq!(bands.middle, 5.0);
        assert_eq!(bands.lower, 5.0);
    }

    #[test]
    fn test_fibonacci_monotonic_between_bounds() {
        let levels = fibonacci_levels(200.0, 100.0);
        assert_eq!(levels.len(), 7);
        assert_eq!(levels[0], 100.0);
        assert_eq!(levels[6], 200.0);
        for pair in levels.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_fibonacci_rejects_inverted_bounds() {
        assert!(fibonacci_levels(100.0, 200.0).is_empty());
    }
}
