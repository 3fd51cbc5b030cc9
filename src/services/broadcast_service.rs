// services/broadcast_service.rs
use crate::config::TxConfig;
use crate::errors::error::{AppError, SubmitError};
use crate::infrastructure::abi::erc20::{decode_uint, encode_allowance};
use crate::infrastructure::provider::{ChainGateway, ProviderTrait};
use crate::models::domain::{
    AllowanceRequirement, ApproveIntent, NATIVE_DECIMALS, OperationKind, TransactionRecord,
    TransactionState, TxEvent, TxIntent, TxRequest, UnsignedTransaction,
};
use crate::repositories::TransactionStore;
use crate::services::event_bus::EventBus;
use crate::services::tx::builder::TransactionBuilder;
use crate::services::tx::gas::GasKind;
use crate::services::tx::gas::gas_strategy::INTRINSIC_GAS;
use crate::services::tx::nonce::NonceService;
use crate::services::tx::signer::TxSigner;
use crate::utils::convert::bump_by_percent;
use crate::utils::format::format_gwei;
use crate::{log_info, log_warn};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, H256, TransactionRequest, U256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replacement {
    SpeedUp,
    Cancel,
}

/// 同一意图的并发提交去重；guard 释放时移出集合
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<TxIntent>>,
    intent: TxIntent,
}

impl<'a> InFlightGuard<'a> {
    fn enter(set: &'a Mutex<HashSet<TxIntent>>, intent: &TxIntent) -> Result<Self, SubmitError> {
        let mut guard = set.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.insert(intent.clone()) {
            return Err(SubmitError::AlreadyInFlight);
        }
        Ok(Self {
            set,
            intent: intent.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.intent);
    }
}

/// 签名 -> 广播 -> 写入 Pending 记录的协调者
pub struct BroadcastService {
    signer: Arc<dyn TxSigner>,
    nonce: Arc<NonceService>,
    builder: TransactionBuilder,
    gateway: Arc<ChainGateway>,
    store: Arc<dyn TransactionStore>,
    events: EventBus,
    config: TxConfig,
    reconciled: OnceCell<()>,
    in_flight: Mutex<HashSet<TxIntent>>,
}

impl BroadcastService {
    pub fn new(
        signer: Arc<dyn TxSigner>,
        nonce: Arc<NonceService>,
        builder: TransactionBuilder,
        gateway: Arc<ChainGateway>,
        store: Arc<dyn TransactionStore>,
        events: EventBus,
        config: TxConfig,
    ) -> Self {
        Self {
            signer,
            nonce,
            builder,
            gateway,
            store,
            events,
            config,
            reconciled: OnceCell::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn current_nonce(&self) -> u64 {
        self.nonce.current()
    }

    /// 本会话首次提交前与链上 nonce 对齐；失败不缓存，下次提交重试
    pub async fn ensure_reconciled(&self) -> Result<(), SubmitError> {
        self.reconciled
            .get_or_try_init(|| async {
                self.nonce.reconcile(&*self.gateway).await.map(|_| ())
            })
            .await
            .map(|_| ())
            .map_err(SubmitError::NonceSync)
    }

    /// 提交一笔用户意图。token swap 在 allowance 不足时会先插入 approve 交易。
    pub async fn submit(&self, request: TxRequest) -> Result<TransactionRecord, SubmitError> {
        let _in_flight = InFlightGuard::enter(&self.in_flight, &request.intent)?;
        self.ensure_reconciled().await?;

        let mut request = request;
        if let Some(requirement) = request.intent.allowance_requirement() {
            let approved = self.ensure_allowance(&requirement, &request).await?;
            // approve 尚未上链，此时估算 swap 必然 revert，改用该类交易的 gas 上限
            if approved && request.gas_limit.is_none() {
                request.gas_limit = Some(GasKind::Swap.ceiling());
            }
        }
        self.submit_once(&request).await
    }

    /// 单笔提交：持有 nonce 租约完成构建、签名、广播；只有广播成功才提交 nonce
    async fn submit_once(&self, request: &TxRequest) -> Result<TransactionRecord, SubmitError> {
        let from = self.signer.address();
        let lease = self.nonce.allocate().await;

        let unsigned = self
            .builder
            .build(request, from, &lease, &*self.gateway)
            .await?;
        let signed = self.signer.sign(&unsigned).await?;
        let hash = self.gateway.broadcast(&signed).await?;
        lease.commit();

        log_info!(
            "交易已广播 → hash: {:#x} | kind: {:?} | nonce: {} | gas_price: {} gwei",
            hash,
            request.intent.kind(),
            unsigned.nonce(),
            format_gwei(unsigned.gas_price())
        );

        let record = TransactionRecord::pending(hash, &unsigned, &request.intent);
        self.store
            .add(record.clone())
            .await
            .map_err(|source| SubmitError::Unrecorded { id: hash, source })?;
        self.events.emit(TxEvent::Submitted { id: hash });
        Ok(record)
    }

    /// 查询 owner 对 spender 的 ERC20 allowance
    pub async fn allowance(&self, token: Address, spender: Address) -> Result<U256, AppError> {
        let call: TypedTransaction = TransactionRequest::new()
            .to(token)
            .data(encode_allowance(self.signer.address(), spender))
            .into();
        let output = self.gateway.call(&call).await?;
        decode_uint(&output).ok_or_else(|| {
            AppError::Provider(format!("malformed allowance response from {:#x}", token))
        })
    }

    /// allowance 不足时提交 approve（必要时先归零）；返回是否提交了 approve
    async fn ensure_allowance(
        &self,
        requirement: &AllowanceRequirement,
        request: &TxRequest,
    ) -> Result<bool, SubmitError> {
        let Some(token) = requirement.token.contract else {
            return Ok(false);
        };
        let current = self
            .allowance(token, requirement.spender)
            .await
            .map_err(SubmitError::Allowance)?;
        if current >= requirement.amount {
            return Ok(false);
        }
        // 上一次提交已广播的 approve 还没上链，eth_call 看不到，不再重复授权
        if let Some(approve) = self.pending_approve(token, requirement).await? {
            log_info!(
                "{} 已有待确认授权 → hash: {:#x} nonce: {}",
                requirement.token.symbol,
                approve.id,
                approve.nonce
            );
            return Ok(true);
        }

        let approve = |amount: U256| {
            let mut approve = TxRequest::new(TxIntent::Approve(ApproveIntent {
                token: requirement.token.clone(),
                spender: requirement.spender,
                amount,
            }))
            .with_priority(request.priority);
            approve.gas_price = request.gas_price;
            approve
        };

        let mut reset_submitted = false;
        if !current.is_zero() && self.config.reset_stale_allowance {
            log_info!(
                "{} allowance {} 不足，先归零再授权",
                requirement.token.symbol,
                current
            );
            self.submit_once(&approve(U256::zero())).await?;
            reset_submitted = true;
        }

        let mut grant = approve(U256::MAX);
        // 归零交易未上链时估算会 revert
        if reset_submitted {
            grant.gas_limit = Some(GasKind::Approve.ceiling());
        }
        let record = self.submit_once(&grant).await?;
        log_info!(
            "已提交 {} 授权 → hash: {:#x} nonce: {}",
            requirement.token.symbol,
            record.id,
            record.nonce
        );
        Ok(true)
    }

    /// 本账户对同一 token / spender 且额度足够的 Pending approve
    async fn pending_approve(
        &self,
        token: Address,
        requirement: &AllowanceRequirement,
    ) -> Result<Option<TransactionRecord>, SubmitError> {
        let from = self.signer.address();
        let pending = self.store.all_pending().await.map_err(SubmitError::Store)?;
        Ok(pending.into_iter().find(|r| {
            r.from == from
                && r.kind == OperationKind::Approve
                && r.to == Some(token)
                && r.counterparty == Some(requirement.spender)
                && r.amount >= requirement.amount
        }))
    }

    /// 以同一 nonce、更高 gas price 重新广播原交易
    pub async fn speed_up(
        &self,
        id: H256,
        gas_price: Option<U256>,
    ) -> Result<TransactionRecord, SubmitError> {
        self.replace(id, Replacement::SpeedUp, gas_price).await
    }

    /// 以同一 nonce 向自己发送 0 值交易，顶替原交易
    pub async fn cancel(
        &self,
        id: H256,
        gas_price: Option<U256>,
    ) -> Result<TransactionRecord, SubmitError> {
        self.replace(id, Replacement::Cancel, gas_price).await
    }

    /// 替换交易的最低 gas price
    pub fn minimum_replacement_price(&self, original: U256) -> U256 {
        bump_by_percent(original, self.config.speedup_min_bump_percent)
    }

    async fn replace(
        &self,
        id: H256,
        mode: Replacement,
        gas_price: Option<U256>,
    ) -> Result<TransactionRecord, SubmitError> {
        // 与其他 nonce 敏感操作串行；租约不提交，计数器不变
        let _lease = self.nonce.allocate().await;

        let original = self
            .store
            .get(id)
            .await
            .map_err(SubmitError::Store)?
            .filter(|r| r.state == TransactionState::Pending)
            .ok_or(SubmitError::NotPending(id))?;

        let minimum = self.minimum_replacement_price(original.gas_price);
        let gas_price = match gas_price {
            Some(offered) if offered < minimum => {
                return Err(SubmitError::Underpriced { offered, minimum });
            }
            Some(offered) => offered,
            None => self
                .builder
                .gas()
                .resolve_gas_price(&*self.gateway, self.config.default_priority)
                .await?
                .max(minimum),
        };

        let chain_id = self.builder.chain_id();
        let unsigned = match mode {
            Replacement::SpeedUp => UnsignedTransaction::new(
                original.from,
                original.to,
                original.value,
                original.input.clone(),
                original.nonce,
                gas_price,
                original.gas_limit,
                chain_id,
            )?,
            Replacement::Cancel => UnsignedTransaction::new(
                original.from,
                Some(original.from),
                U256::zero(),
                Bytes::default(),
                original.nonce,
                gas_price,
                U256::from(INTRINSIC_GAS),
                chain_id,
            )?,
        };
        let signed = self.signer.sign(&unsigned).await?;
        let hash = self.gateway.broadcast(&signed).await?;

        let mut replacement = original.replacement(hash, &unsigned);
        let superseded = match mode {
            Replacement::SpeedUp => TransactionState::SpeedingUp,
            Replacement::Cancel => {
                replacement.kind = OperationKind::Transfer;
                replacement.amount = U256::zero();
                replacement.counterparty = Some(original.from);
                replacement.token_symbol = self.config.native_symbol.clone();
                replacement.token_decimals = NATIVE_DECIMALS;
                TransactionState::Cancelled
            }
        };
        self.store
            .replace(original.id, superseded, replacement.clone())
            .await
            .map_err(|source| SubmitError::Unrecorded { id: hash, source })?;

        log_info!(
            "{:?} 已广播 → {:#x} 替换 {:#x} | nonce: {} | gas_price: {} gwei",
            mode,
            hash,
            original.id,
            original.nonce,
            format_gwei(gas_price)
        );

        // 替换期间原交易可能已被 tracker 判定终态，只有真正被顶替时才发状态事件
        match self.store.get(original.id).await {
            Ok(Some(r)) if r.state == superseded => self.events.emit(TxEvent::StateChanged {
                id: original.id,
                old: TransactionState::Pending,
                new: superseded,
            }),
            Ok(_) => log_warn!("{:#x} 在替换前已离开 Pending", original.id),
            Err(e) => log_warn!("读取 {:#x} 失败: {}", original.id, e),
        }
        self.events.emit(TxEvent::Superseded {
            old_id: original.id,
            new_id: hash,
        });
        self.events.emit(TxEvent::Submitted { id: hash });
        Ok(replacement)
    }
}
