use ethers_core::types::U256;

/// 按百分比放大：value * (100 + percent) / 100，向上取整
pub fn bump_by_percent(value: U256, percent: u64) -> U256 {
    let scaled = value.saturating_mul(U256::from(100 + percent));
    let (quotient, remainder) = scaled.div_mod(U256::from(100u64));
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::one()
    }
}
