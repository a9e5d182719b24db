use serde::Serialize;

use crate::error::ShoplistError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, ShoplistError> {
    Ok(serde_json::to_string_pretty(value)?)
}
