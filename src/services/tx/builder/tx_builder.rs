// services/tx/builder/tx_builder.rs

use crate::errors::error::BuildError;
use crate::infrastructure::abi::erc20::{encode_approve, encode_transfer};
use crate::infrastructure::abi::exchange::encode_trade;
use crate::infrastructure::provider::ProviderTrait;
use crate::log_debug;
use crate::models::domain::{TxIntent, TxRequest, UnsignedTransaction};
use crate::services::tx::gas::{GasKind, GasService};
use crate::services::tx::nonce::NonceLease;
use crate::utils::format::format_gwei;
use ethers_core::types::{Address, Bytes, TransactionRequest, U256};
use ethers_core::types::transaction::eip2718::TypedTransaction;

/// 意图 -> 交易调用三元组 (to, value, data)
struct CallParts {
    to: Address,
    value: U256,
    data: Bytes,
    gas_kind: GasKind,
}

pub struct TransactionBuilder {
    chain_id: u64,
    gas: GasService,
}

impl TransactionBuilder {
    pub fn new(chain_id: u64, gas: GasService) -> Self {
        Self { chain_id, gas }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn gas(&self) -> &GasService {
        &self.gas
    }

    fn call_parts(intent: &TxIntent, from: Address) -> Result<CallParts, BuildError> {
        match intent {
            TxIntent::Transfer(transfer) => {
                if transfer.amount.is_zero() {
                    return Err(BuildError::InvalidIntent("transfer amount must be > 0".into()));
                }
                match transfer.token.contract {
                    None => Ok(CallParts {
                        to: transfer.to,
                        value: transfer.amount,
                        data: Bytes::default(),
                        gas_kind: GasKind::NativeTransfer,
                    }),
                    Some(contract) => Ok(CallParts {
                        to: contract,
                        value: U256::zero(),
                        data: encode_transfer(transfer.to, transfer.amount),
                        gas_kind: GasKind::TokenTransfer,
                    }),
                }
            }
            TxIntent::Approve(approve) => {
                let contract = approve.token.contract.ok_or_else(|| {
                    BuildError::InvalidIntent(format!(
                        "{} is the native currency and cannot be approved",
                        approve.token.symbol
                    ))
                })?;
                Ok(CallParts {
                    to: contract,
                    value: U256::zero(),
                    data: encode_approve(approve.spender, approve.amount),
                    gas_kind: GasKind::Approve,
                })
            }
            TxIntent::Swap(swap) => {
                if swap.source == swap.dest {
                    return Err(BuildError::InvalidIntent("swap source and dest are the same asset".into()));
                }
                if swap.source_amount.is_zero() {
                    return Err(BuildError::InvalidIntent("swap amount must be > 0".into()));
                }
                let value = if swap.source.is_native() {
                    swap.source_amount
                } else {
                    U256::zero()
                };
                Ok(CallParts {
                    to: swap.exchange,
                    value,
                    data: encode_trade(swap, from),
                    gas_kind: GasKind::Swap,
                })
            }
        }
    }

    /// 构建未签名交易；nonce 取自调用方持有的租约
    pub async fn build(
        &self,
        request: &TxRequest,
        from: Address,
        lease: &NonceLease,
        provider: &dyn ProviderTrait,
    ) -> Result<UnsignedTransaction, BuildError> {
        let parts = Self::call_parts(&request.intent, from)?;

        let gas_price = match request.gas_price {
            Some(price) => price,
            None => self.gas.resolve_gas_price(provider, request.priority).await?,
        };

        let draft: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(parts.to)
            .value(parts.value)
            .data(parts.data.clone())
            .gas_price(gas_price)
            .nonce(lease.nonce())
            .chain_id(self.chain_id)
            .into();
        let gas_limit = self
            .gas
            .resolve_gas_limit(provider, &draft, parts.gas_kind, request.gas_limit)
            .await?;

        log_debug!(
            "构建交易: kind={:?} nonce={} gas_limit={} gas_price={} gwei",
            parts.gas_kind,
            lease.nonce(),
            gas_limit,
            format_gwei(gas_price)
        );

        UnsignedTransaction::new(
            from,
            Some(parts.to),
            parts.value,
            parts.data,
            lease.nonce(),
            gas_price,
            gas_limit,
            self.chain_id,
        )
    }
}
