use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod backoff;

/// # Summary
/// 资产类别枚举，区分股票与加密货币两类行情通道。
///
/// # Invariants
/// - 每个类别对应一个独立的行情提供者实现。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    // 股票 (Finnhub 通道)
    Stock,
    // 加密货币 (Kraken 通道)
    Crypto,
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stock" => Ok(AssetKind::Stock),
            "crypto" => Ok(AssetKind::Crypto),
            _ => Err(format!("Unknown AssetKind: {}", s)),
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Stock => write!(f, "stock"),
            AssetKind::Crypto => write!(f, "crypto"),
        }
    }
}

/// # Summary
/// 资产标的实体，代表系统关注的特定股票或加密货币。
///
/// # Invariants
/// - `symbol` 必须是上游数据源可识别的交易代码
///   (股票如 AAPL，加密货币如 BTC/USD)。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Asset {
    // 交易代码
    pub symbol: String,
    // 资产类别
    pub kind: AssetKind,
}

impl Asset {
    pub fn stock(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: AssetKind::Stock,
        }
    }

    pub fn crypto(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: AssetKind::Crypto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_roundtrip() {
        assert_eq!("stock".parse::<AssetKind>(), Ok(AssetKind::Stock));
        assert_eq!("CRYPTO".parse::<AssetKind>(), Ok(AssetKind::Crypto));
        assert!("forex".parse::<AssetKind>().is_err());
        assert_eq!(AssetKind::Stock.to_string(), "stock");
    }
}
