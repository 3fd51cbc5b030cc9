use ethers::abi::{ParamType, Token, decode, encode};
use ethers_core::types::{Address, Bytes, U256};
use ethers_core::utils::keccak256;

/// 函数选择器：keccak256(signature) 的前 4 字节
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub(crate) fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let encoded = encode(args);
    let mut data = Vec::with_capacity(4 + encoded.len());
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&encoded);
    data.into()
}

/// transfer(address,uint256)，选择器 0xa9059cbb
pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    encode_call(
        "transfer(address,uint256)",
        &[Token::Address(to), Token::Uint(amount)],
    )
}

/// approve(address,uint256)，选择器 0x095ea7b3
pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    encode_call(
        "approve(address,uint256)",
        &[Token::Address(spender), Token::Uint(amount)],
    )
}

/// allowance(address,address)，选择器 0xdd62ed3e
pub fn encode_allowance(owner: Address, spender: Address) -> Bytes {
    encode_call(
        "allowance(address,address)",
        &[Token::Address(owner), Token::Address(spender)],
    )
}

/// 解码 eth_call 返回的单个 uint256
pub fn decode_uint(output: &[u8]) -> Option<U256> {
    decode(&[ParamType::Uint(256)], output)
        .ok()?
        .into_iter()
        .next()?
        .into_uint()
}
