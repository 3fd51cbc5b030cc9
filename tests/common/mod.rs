#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use eth_tx_lifecycle::config::{EndpointRole, TrackerConfig, TxConfig};
use eth_tx_lifecycle::errors::{AppError, SignError};
use eth_tx_lifecycle::infrastructure::provider::{Backend, BlockTag, ChainGateway, ProviderTrait};
use eth_tx_lifecycle::models::domain::{
    SignedTransaction, SwapIntent, Token, TransactionRecord, TransactionState, TransferIntent,
    TxEvent, TxIntent, TxRequest, UnsignedTransaction,
};
use eth_tx_lifecycle::repositories::InMemoryTransactionRepository;
use eth_tx_lifecycle::services::tx::builder::TransactionBuilder;
use eth_tx_lifecycle::services::tx::gas::GasService;
use eth_tx_lifecycle::services::tx::nonce::NonceService;
use eth_tx_lifecycle::services::tx::signer::TxSigner;
use eth_tx_lifecycle::services::{BroadcastService, EventBus, Notifier, TrackerService};
use ethers_core::abi::{Token as AbiToken, encode};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, H256, Transaction, TransactionReceipt, U64, U256};
use ethers_core::utils::keccak256;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

pub const CHAIN_ID: u64 = 1;
pub const GWEI: u64 = 1_000_000_000;

pub fn account() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn hash(hex: &str) -> H256 {
    let padded = format!("{:0<64}", hex.trim_start_matches("0x"));
    padded.parse().unwrap()
}

#[derive(Clone, Debug)]
pub enum BroadcastReply {
    /// 返回签名字节的 keccak 哈希（与真实节点一致）
    Derived,
    Fixed(H256),
    Fail(String),
}

/// 可编程的 RPC 节点
pub struct MockBackend {
    pub name: String,
    pub pending_nonce: Mutex<u64>,
    pub gas_price: Mutex<U256>,
    pub estimate: Mutex<Option<U256>>,
    pub allowance: Mutex<U256>,
    pub broadcast_delay: Mutex<Duration>,
    pub reply: Mutex<BroadcastReply>,
    /// 广播成功后交易是否出现在 mempool（eth_getTransactionByHash 可见）
    pub mempool: AtomicBool,
    pub fail_queries: AtomicBool,
    pub receipts: Mutex<HashMap<H256, TransactionReceipt>>,
    pub known: Mutex<HashSet<H256>>,
    pub broadcasts: Mutex<Vec<Bytes>>,
}

impl MockBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pending_nonce: Mutex::new(0),
            gas_price: Mutex::new(U256::from(20 * GWEI)),
            estimate: Mutex::new(Some(U256::from(21_000u64))),
            allowance: Mutex::new(U256::zero()),
            broadcast_delay: Mutex::new(Duration::ZERO),
            reply: Mutex::new(BroadcastReply::Derived),
            mempool: AtomicBool::new(true),
            fail_queries: AtomicBool::new(false),
            receipts: Mutex::new(HashMap::new()),
            known: Mutex::new(HashSet::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_nonce(self, nonce: u64) -> Self {
        *self.pending_nonce.lock().unwrap() = nonce;
        self
    }

    pub fn with_reply(self, reply: BroadcastReply) -> Self {
        *self.reply.lock().unwrap() = reply;
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.broadcast_delay.lock().unwrap() = delay;
        self
    }

    pub fn set_receipt(&self, id: H256, status: Option<u64>) {
        let mut receipt = TransactionReceipt::default();
        receipt.transaction_hash = id;
        receipt.status = status.map(U64::from);
        receipt.gas_used = Some(U256::from(21_000u64));
        self.receipts.lock().unwrap().insert(id, receipt);
    }

    pub fn forget(&self, id: H256) {
        self.known.lock().unwrap().remove(&id);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }

    fn check_queries(&self) -> Result<(), AppError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(AppError::Provider(format!("{} unavailable", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderTrait for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_balance(&self, _: Address, _: BlockTag) -> Result<U256, AppError> {
        self.check_queries()?;
        Ok(U256::exp10(18))
    }

    async fn get_transaction_count(&self, _: Address, _: BlockTag) -> Result<U256, AppError> {
        self.check_queries()?;
        Ok(U256::from(*self.pending_nonce.lock().unwrap()))
    }

    async fn get_gas_price(&self) -> Result<U256, AppError> {
        self.check_queries()?;
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn call(&self, _: &TypedTransaction) -> Result<Bytes, AppError> {
        self.check_queries()?;
        let allowance = *self.allowance.lock().unwrap();
        Ok(Bytes::from(encode(&[AbiToken::Uint(allowance)])))
    }

    async fn estimate_gas(&self, _: &TypedTransaction) -> Result<U256, AppError> {
        self.check_queries()?;
        let estimate = *self.estimate.lock().unwrap();
        estimate.ok_or_else(|| AppError::Provider("execution reverted".into()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, AppError> {
        let delay = *self.broadcast_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let reply = self.reply.lock().unwrap().clone();
        let id = match reply {
            BroadcastReply::Derived => H256::from(keccak256(&raw)),
            BroadcastReply::Fixed(id) => id,
            BroadcastReply::Fail(message) => return Err(AppError::Provider(message)),
        };
        self.broadcasts.lock().unwrap().push(raw);
        if self.mempool.load(Ordering::SeqCst) {
            self.known.lock().unwrap().insert(id);
        }
        Ok(id)
    }

    async fn get_transaction(&self, id: H256) -> Result<Option<Transaction>, AppError> {
        self.check_queries()?;
        Ok(self.known.lock().unwrap().contains(&id).then(|| Transaction {
            hash: id,
            ..Default::default()
        }))
    }

    async fn get_transaction_receipt(
        &self,
        id: H256,
    ) -> Result<Option<TransactionReceipt>, AppError> {
        self.check_queries()?;
        Ok(self.receipts.lock().unwrap().get(&id).cloned())
    }
}

/// 不做真实签名：把未签名 RLP 当作"签名字节"，哈希仍随 nonce / gas 变化
pub struct MockSigner {
    pub address: Address,
    pub fail: AtomicBool,
    /// 已签名笔数达到该值后拒签（模拟用户在第二步取消）
    pub fail_after: Mutex<Option<usize>>,
    pub signed: Mutex<Vec<UnsignedTransaction>>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            address: account(),
            fail: AtomicBool::new(false),
            fail_after: Mutex::new(None),
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_nonces(&self) -> Vec<u64> {
        self.signed.lock().unwrap().iter().map(|t| t.nonce()).collect()
    }
}

#[async_trait]
impl TxSigner for MockSigner {
    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SignError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SignError::Cancelled);
        }
        let mut signed = self.signed.lock().unwrap();
        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if signed.len() >= limit {
                return Err(SignError::Cancelled);
            }
        }
        signed.push(tx.clone());
        Ok(SignedTransaction::new(tx.to_typed().rlp()))
    }

    fn address(&self) -> Address {
        self.address
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<(H256, TransactionState)>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, record: &TransactionRecord, state: TransactionState) {
        self.seen.lock().unwrap().push((record.id, state));
    }
}

/// 单账户的完整组件组合，直接暴露各组件供断言
pub struct Harness {
    pub backends: Vec<Arc<MockBackend>>,
    pub signer: Arc<MockSigner>,
    pub gateway: Arc<ChainGateway>,
    pub store: Arc<InMemoryTransactionRepository>,
    pub events: EventBus,
    pub notifier: Arc<RecordingNotifier>,
    pub nonce: Arc<NonceService>,
    pub broadcast: Arc<BroadcastService>,
    pub tracker: Arc<TrackerService>,
}

impl Harness {
    pub fn new(backend: MockBackend) -> Self {
        Self::with_roles(vec![(backend, EndpointRole::Primary)])
    }

    /// 节点按传入顺序保存在 `backends` 中（网关内部会按角色重新排序）
    pub fn with_roles(backends: Vec<(MockBackend, EndpointRole)>) -> Self {
        let mocks: Vec<(Arc<MockBackend>, EndpointRole)> = backends
            .into_iter()
            .map(|(b, role)| (Arc::new(b), role))
            .collect();
        let gateway = Arc::new(ChainGateway::new(
            mocks
                .iter()
                .map(|(mock, role)| Backend::new(mock.clone() as Arc<dyn ProviderTrait>, *role))
                .collect(),
        ));
        let mocks: Vec<Arc<MockBackend>> = mocks.into_iter().map(|(b, _)| b).collect();
        let signer = Arc::new(MockSigner::new());
        let store = Arc::new(InMemoryTransactionRepository::new());
        let events = EventBus::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let nonce = Arc::new(NonceService::new(signer.address()));
        let broadcast = Arc::new(BroadcastService::new(
            signer.clone(),
            nonce.clone(),
            TransactionBuilder::new(CHAIN_ID, GasService::default()),
            gateway.clone(),
            store.clone(),
            events.clone(),
            TxConfig::default(),
        ));
        let tracker = Arc::new(TrackerService::new(
            gateway.clone(),
            store.clone(),
            events.clone(),
            notifier.clone(),
            nonce.clone(),
            TrackerConfig::default(),
        ));
        Self {
            backends: mocks,
            signer,
            gateway,
            store,
            events,
            notifier,
            nonce,
            broadcast,
            tracker,
        }
    }

    pub fn backend(&self) -> &MockBackend {
        &self.backends[0]
    }

    /// 同一组件上换一套 tracker 参数
    pub fn tracker_with(&self, config: TrackerConfig) -> TrackerService {
        TrackerService::new(
            self.gateway.clone(),
            self.store.clone(),
            self.events.clone(),
            self.notifier.clone(),
            self.nonce.clone(),
            config,
        )
    }
}

/// 构造一条 created_at 在 `age_secs` 秒之前的 Pending 记录
pub fn aged_record(id: H256, nonce: u64, age_secs: i64) -> TransactionRecord {
    let intent = eth_transfer(U256::exp10(18)).intent;
    let tx = UnsignedTransaction::new(
        account(),
        Some(Address::repeat_byte(0x02)),
        U256::exp10(18),
        Bytes::default(),
        nonce,
        U256::from(20 * GWEI),
        U256::from(21_000u64),
        CHAIN_ID,
    )
    .unwrap();
    let mut record = TransactionRecord::pending(id, &tx, &intent);
    record.created_at = Utc::now() - chrono::Duration::seconds(age_secs);
    record.updated_at = record.created_at;
    record
}

pub fn eth_transfer(amount: U256) -> TxRequest {
    TxRequest::new(TxIntent::Transfer(TransferIntent {
        token: Token::native("ETH"),
        to: Address::repeat_byte(0x02),
        amount,
    }))
}

pub fn dai() -> Token {
    Token::erc20("DAI", 18, Address::repeat_byte(0xda))
}

pub fn exchange() -> Address {
    Address::repeat_byte(0x11)
}

pub fn token_swap(amount: U256) -> TxRequest {
    TxRequest::new(TxIntent::Swap(SwapIntent {
        exchange: exchange(),
        source: dai(),
        dest: Token::native("ETH"),
        source_amount: amount,
        max_dest_amount: U256::MAX,
        min_conversion_rate: U256::zero(),
        recipient: None,
        referrer: Address::zero(),
    }))
}

pub fn drain(rx: &mut Receiver<TxEvent>) -> Vec<TxEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn state_changes(events: &[TxEvent]) -> Vec<(H256, TransactionState, TransactionState)> {
    events
        .iter()
        .filter_map(|e| match e {
            TxEvent::StateChanged { id, old, new } => Some((*id, *old, *new)),
            _ => None,
        })
        .collect()
}
