use super::erc20::encode_call;
use crate::models::domain::{SwapIntent, Token};
use ethers::abi::Token as AbiToken;
use ethers_core::types::{Address, Bytes};

const TRADE_SIGNATURE: &str = "trade(address,uint256,address,address,uint256,uint256,address)";

/// 兑换合约约定的原生币占位地址 0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE
pub fn native_placeholder() -> Address {
    Address::repeat_byte(0xee)
}

fn asset_address(token: &Token) -> Address {
    token.contract.unwrap_or_else(native_placeholder)
}

/// 编码兑换合约的 trade 调用；`owner` 在未指定接收地址时作为接收方
pub fn encode_trade(swap: &SwapIntent, owner: Address) -> Bytes {
    encode_call(
        TRADE_SIGNATURE,
        &[
            AbiToken::Address(asset_address(&swap.source)),
            AbiToken::Uint(swap.source_amount),
            AbiToken::Address(asset_address(&swap.dest)),
            AbiToken::Address(swap.recipient.unwrap_or(owner)),
            AbiToken::Uint(swap.max_dest_amount),
            AbiToken::Uint(swap.min_conversion_rate),
            AbiToken::Address(swap.referrer),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::abi::erc20::selector;
    use ethers_core::types::U256;

    #[test]
    fn native_source_uses_placeholder() {
        let owner = Address::repeat_byte(0x01);
        let swap = SwapIntent {
            exchange: Address::repeat_byte(0x11),
            source: Token::native("ETH"),
            dest: Token::erc20("DAI", 18, Address::repeat_byte(0xda)),
            source_amount: U256::exp10(18),
            max_dest_amount: U256::MAX,
            min_conversion_rate: U256::from(1u64),
            recipient: None,
            referrer: Address::zero(),
        };
        let data = encode_trade(&swap, owner);
        assert_eq!(&data[..4], &selector(TRADE_SIGNATURE));
        assert_eq!(data.len(), 4 + 7 * 32);
        assert_eq!(&data[16..36], native_placeholder().as_bytes());
        // 第 4 个参数（接收方）回落到发起账户
        assert_eq!(&data[4 + 3 * 32 + 12..4 + 4 * 32], owner.as_bytes());
    }
}
