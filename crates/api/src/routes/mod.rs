pub mod admin;
pub mod analysis;
pub mod auth;
pub mod holdings;
pub mod market;
pub mod orders;
pub mod settings;

use crate::error::ApiError;
use rust_decimal::Decimal;
use soba_core::common::AssetKind;
use std::str::FromStr;

/// 解析资产类别参数，非法值映射为 400
pub(crate) fn parse_kind(s: &str) -> Result<AssetKind, ApiError> {
    AssetKind::from_str(s).map_err(ApiError::BadRequest)
}

/// 解析十进制数字段，非法值映射为 400
pub(crate) fn parse_decimal(field: &str, s: &str) -> Result<Decimal, ApiError> {
    Decimal::from_str(s).map_err(|_| ApiError::BadRequest(format!("Invalid {}: {}", field, s)))
}
