use ethers_core::types::U256;
use ethers_core::utils::format_units;

/// 按精度格式化金额，失败时退回原始整数
pub fn format_amount(value: U256, decimals: u8) -> String {
    format_units(value, decimals as u32).unwrap_or_else(|_| value.to_string())
}

/// wei -> gwei，用于日志展示
pub fn format_gwei(value: U256) -> String {
    format_units(value, "gwei").unwrap_or_else(|_| value.to_string())
}
