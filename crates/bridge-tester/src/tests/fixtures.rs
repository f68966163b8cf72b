//! Test fixtures for the bridge flows.
//!
//! [`MockChain`] is an in-memory chain behind the [`ChainClient`] seam. It
//! decodes and recovers every raw transaction it is sent, applies the handful of
//! contract effects the flows depend on, and can be scripted to leave
//! transactions in the pool, revert them or reject broadcasts.

use alloy::{
    consensus::{Transaction as _, TxEnvelope, transaction::SignerRecoverable},
    eips::eip2718::Decodable2718,
    primitives::{Address, B256, Bytes, TxKind, U256, utils::parse_ether},
    signers::local::PrivateKeySigner,
    sol_types::{SolCall, SolValue},
};
use async_trait::async_trait;
use eyre::{bail, eyre};
use parking_lot::{Mutex, MutexGuard};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use crate::{
    accounts::AccountId,
    calls::{IERC20, IL1StandardBridge, IL2StandardBridge, IL2ToL1MessagePasser},
    chain::{CallRequest, ChainClient, ChainEndpoint, ChainKind, GasSuggestion, ReceiptInfo},
    config::{ChainConfig, GWEI, TesterConfig},
    deploy::{CompiledContract, ContractCompiler},
    error::BridgeError,
    ledger::AccountLedger,
    ops::Bridge,
    orchestrator::{BatchOrchestrator, FailurePolicy},
    retry::RetryPolicy,
};

pub(crate) const MOCK_CHAIN_ID: u64 = 31337;

const ANVIL_KEYS: [&str; 5] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "0x7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
    "0x47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926a",
];

/// The first `count` anvil dev keys.
pub(crate) fn signers(count: usize) -> Vec<PrivateKeySigner> {
    ANVIL_KEYS.iter().take(count).map(|key| key.parse().unwrap()).collect()
}

pub(crate) fn ether(amount: &str) -> U256 {
    parse_ether(amount).unwrap()
}

/// What happens to the next fresh transaction a [`MockChain`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inclusion {
    /// Execute and mine immediately.
    Include,
    /// Mine with a failed status, without side effects.
    Revert,
    /// Keep in the pool forever.
    Never,
}

/// A transaction as the mock chain accepted it.
#[derive(Debug, Clone)]
pub(crate) struct SentTx {
    pub(crate) hash: B256,
    pub(crate) from: Address,
    pub(crate) nonce: u64,
    pub(crate) to: TxKind,
    pub(crate) value: U256,
    pub(crate) input: Bytes,
    pub(crate) gas_limit: u64,
    pub(crate) max_fee_per_gas: u128,
}

impl SentTx {
    pub(crate) fn calls<C: SolCall>(&self) -> bool {
        self.input.starts_with(&C::SELECTOR)
    }

    pub(crate) fn decode<C: SolCall>(&self) -> C {
        C::abi_decode(&self.input).unwrap()
    }
}

/// Balance change a deposit causes on the linked chain.
#[derive(Debug, Clone, Copy)]
enum Credit {
    Native { to: Address, amount: U256 },
    Token { token: Address, to: Address, amount: U256 },
}

#[derive(Debug)]
struct State {
    block: u64,
    balances: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    /// Next nonce per sender, as mined.
    nonces: HashMap<Address, u64>,
    pool: HashMap<B256, SentTx>,
    receipts: HashMap<B256, ReceiptInfo>,
    sent: Vec<SentTx>,
    inclusion: VecDeque<Inclusion>,
    send_failures: VecDeque<String>,
    base_fee: Option<u128>,
    priority_fee: Option<u128>,
    unavailable: bool,
    /// Amount `claimFaucet()` mints, per token.
    faucets: HashMap<Address, U256>,
    /// Broadcasts with a lower fee cap are rejected as underpriced.
    reject_below: Option<u128>,
    /// Chain credited by deposits sent here.
    peer: Option<MockChain>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            block: 0,
            balances: HashMap::new(),
            tokens: HashMap::new(),
            allowances: HashMap::new(),
            nonces: HashMap::new(),
            pool: HashMap::new(),
            receipts: HashMap::new(),
            sent: Vec::new(),
            inclusion: VecDeque::new(),
            send_failures: VecDeque::new(),
            base_fee: Some(GWEI),
            priority_fee: Some(GWEI),
            unavailable: false,
            faucets: HashMap::new(),
            reject_below: None,
            peer: None,
        }
    }
}

impl State {
    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn token(&self, token: Address, owner: Address) -> U256 {
        self.tokens.get(&(token, owner)).copied().unwrap_or_default()
    }

    fn next_nonce(&self, account: Address) -> u64 {
        self.nonces.get(&account).copied().unwrap_or_default()
    }

    /// Run `tx` and mine it. Deposits return the credit owed on the peer chain.
    fn execute(&mut self, tx: &SentTx) -> Option<Credit> {
        match self.apply(tx) {
            Ok(credit) => {
                self.mine(tx, true);
                credit
            }
            Err(_reason) => {
                self.mine(tx, false);
                None
            }
        }
    }

    /// Checks come before any mutation so a failure leaves no trace.
    fn apply(&mut self, tx: &SentTx) -> Result<Option<Credit>, &'static str> {
        if self.balance(tx.from) < tx.value {
            return Err("value exceeds balance");
        }

        let mut credit = None;
        if let TxKind::Call(to) = tx.to {
            if tx.input.is_empty() {
                // plain transfer
            } else if tx.calls::<IERC20::claimFaucetCall>() {
                let amount = self.faucets.get(&to).copied().ok_or("faucet disabled")?;
                *self.tokens.entry((to, tx.from)).or_default() += amount;
            } else if tx.calls::<IERC20::approveCall>() {
                let call: IERC20::approveCall = tx.decode();
                self.allowances.insert((to, tx.from, call.spender), call.value);
            } else if tx.calls::<IL1StandardBridge::depositETHToCall>() {
                let call: IL1StandardBridge::depositETHToCall = tx.decode();
                credit = Some(Credit::Native { to: call._to, amount: tx.value });
            } else if tx.calls::<IL1StandardBridge::depositERC20ToCall>() {
                let call: IL1StandardBridge::depositERC20ToCall = tx.decode();
                let allowance = self.allowances.get(&(call._l1Token, tx.from, to)).copied().unwrap_or_default();
                if allowance < call._amount {
                    return Err("allowance too low");
                }
                if self.token(call._l1Token, tx.from) < call._amount {
                    return Err("token balance too low");
                }
                self.allowances.insert((call._l1Token, tx.from, to), allowance - call._amount);
                *self.tokens.entry((call._l1Token, tx.from)).or_default() -= call._amount;
                credit = Some(Credit::Token { token: call._l2Token, to: call._to, amount: call._amount });
            } else if tx.calls::<IL2StandardBridge::withdrawCall>() {
                let call: IL2StandardBridge::withdrawCall = tx.decode();
                if self.token(call._l2Token, tx.from) < call._amount {
                    return Err("token balance too low");
                }
                *self.tokens.entry((call._l2Token, tx.from)).or_default() -= call._amount;
            } else if !tx.calls::<IL2ToL1MessagePasser::initiateWithdrawalCall>() {
                return Err("unknown selector");
            }

            if !tx.value.is_zero() {
                *self.balances.entry(tx.from).or_default() -= tx.value;
                *self.balances.entry(to).or_default() += tx.value;
            }
        } else if !tx.value.is_zero() {
            *self.balances.entry(tx.from).or_default() -= tx.value;
        }
        Ok(credit)
    }

    fn mine(&mut self, tx: &SentTx, success: bool) {
        self.block += 1;
        let next = self.next_nonce(tx.from).max(tx.nonce + 1);
        self.nonces.insert(tx.from, next);
        self.pool.remove(&tx.hash);

        let contract_address = (success && tx.to.is_create()).then(|| tx.from.create(tx.nonce));
        self.receipts.insert(
            tx.hash,
            ReceiptInfo {
                tx_hash: tx.hash,
                success,
                block_number: Some(self.block),
                gas_used: 21_000,
                effective_gas_price: GWEI,
                contract_address,
            },
        );
    }
}

/// Cloneable handle to one in-memory chain.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockChain {
    state: Arc<Mutex<State>>,
}

impl MockChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Default test config for `kind`.
    pub(crate) fn config(&self, kind: ChainKind) -> ChainConfig {
        TesterConfig::fast().chain(kind).clone()
    }

    pub(crate) fn endpoint(&self, kind: ChainKind) -> ChainEndpoint {
        self.endpoint_with(kind, self.config(kind))
    }

    pub(crate) fn endpoint_with(&self, kind: ChainKind, config: ChainConfig) -> ChainEndpoint {
        let retry = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_retries: 2,
        };
        ChainEndpoint::new(kind, config, Arc::new(self.clone())).with_retry_policy(retry)
    }

    /// Deposits mined here credit `peer`.
    pub(crate) fn link_deposits_to(&self, peer: &Self) {
        self.state.lock().peer = Some(peer.clone());
    }

    pub(crate) fn set_balance(&self, account: Address, amount: U256) {
        self.state.lock().balances.insert(account, amount);
    }

    pub(crate) fn balance(&self, account: Address) -> U256 {
        self.state.lock().balance(account)
    }

    pub(crate) fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.lock().tokens.insert((token, owner), amount);
    }

    pub(crate) fn token_balance(&self, token: Address, owner: Address) -> U256 {
        self.state.lock().token(token, owner)
    }

    pub(crate) fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state.lock().allowances.get(&(token, owner, spender)).copied().unwrap_or_default()
    }

    pub(crate) fn set_nonce(&self, account: Address, nonce: u64) {
        self.state.lock().nonces.insert(account, nonce);
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub(crate) fn set_base_fee(&self, base_fee: Option<u128>) {
        self.state.lock().base_fee = base_fee;
    }

    pub(crate) fn enable_faucet(&self, token: Address, amount: U256) {
        self.state.lock().faucets.insert(token, amount);
    }

    /// Decide the fate of the next fresh transactions, in order.
    pub(crate) fn script(&self, inclusions: impl IntoIterator<Item = Inclusion>) {
        self.state.lock().inclusion.extend(inclusions);
    }

    /// Make the next broadcast fail with `message`.
    pub(crate) fn fail_next_send(&self, message: &str) {
        self.state.lock().send_failures.push_back(message.to_string());
    }

    pub(crate) fn reject_below(&self, max_fee_per_gas: u128) {
        self.state.lock().reject_below = Some(max_fee_per_gas);
    }

    /// Mine `tx` now, as another node would, even after it was replaced here.
    pub(crate) fn include(&self, tx: &SentTx) {
        let mut state = self.state.lock();
        state.pool.remove(&tx.hash);
        state.execute(tx);
    }

    /// Forget every pooled transaction, as a node restart would.
    pub(crate) fn drop_pool(&self) {
        self.state.lock().pool.clear();
    }

    /// Every fresh transaction accepted, in order.
    pub(crate) fn sent(&self) -> Vec<SentTx> {
        self.state.lock().sent.clone()
    }

    fn available(&self) -> eyre::Result<MutexGuard<'_, State>> {
        let state = self.state.lock();
        if state.unavailable {
            bail!("connection refused");
        }
        Ok(state)
    }

    fn credit(&self, credit: Credit) {
        let mut state = self.state.lock();
        match credit {
            Credit::Native { to, amount } => *state.balances.entry(to).or_default() += amount,
            Credit::Token { token, to, amount } => *state.tokens.entry((token, to)).or_default() += amount,
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> eyre::Result<u64> {
        self.available()?;
        Ok(MOCK_CHAIN_ID)
    }

    async fn gas_suggestion(&self) -> eyre::Result<GasSuggestion> {
        let state = self.available()?;
        Ok(GasSuggestion { base_fee: state.base_fee, priority_fee: state.priority_fee })
    }

    async fn balance(&self, account: Address) -> eyre::Result<U256> {
        Ok(self.available()?.balance(account))
    }

    async fn pending_nonce(&self, account: Address) -> eyre::Result<u64> {
        let state = self.available()?;
        let pooled = state.pool.values().filter(|tx| tx.from == account).map(|tx| tx.nonce + 1).max();
        Ok(state.next_nonce(account).max(pooled.unwrap_or_default()))
    }

    async fn estimate_gas(&self, request: &CallRequest) -> eyre::Result<u64> {
        self.available()?;
        Ok(match request.to {
            TxKind::Create => 500_000,
            TxKind::Call(_) if request.input.is_empty() => 21_000,
            TxKind::Call(_) => 50_000,
        })
    }

    async fn call(&self, request: &CallRequest) -> eyre::Result<Bytes> {
        let state = self.available()?;
        let TxKind::Call(to) = request.to else {
            bail!("execution reverted");
        };
        let input = &request.input;

        let output = if input.starts_with(&IERC20::balanceOfCall::SELECTOR) {
            let call = IERC20::balanceOfCall::abi_decode(input)?;
            state.token(to, call.owner).abi_encode()
        } else if input.starts_with(&IERC20::allowanceCall::SELECTOR) {
            let call = IERC20::allowanceCall::abi_decode(input)?;
            state.allowances.get(&(to, call.owner, call.spender)).copied().unwrap_or_default().abi_encode()
        } else {
            bail!("execution reverted");
        };
        Ok(output.into())
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> eyre::Result<B256> {
        let (hash, credit) = {
            let mut state = self.available()?;
            if let Some(message) = state.send_failures.pop_front() {
                bail!("{message}");
            }

            let envelope = TxEnvelope::decode_2718(&mut &encoded[..])
                .map_err(|err| eyre!("invalid transaction: {err}"))?;
            let from = envelope.recover_signer().map_err(|err| eyre!("invalid signature: {err}"))?;
            let tx = SentTx {
                hash: *envelope.tx_hash(),
                from,
                nonce: envelope.nonce(),
                to: envelope.kind(),
                value: envelope.value(),
                input: envelope.input().clone(),
                gas_limit: envelope.gas_limit(),
                max_fee_per_gas: envelope.max_fee_per_gas(),
            };

            if state.receipts.contains_key(&tx.hash) {
                bail!("nonce too low");
            }
            if state.reject_below.is_some_and(|floor| tx.max_fee_per_gas < floor) {
                bail!("transaction underpriced");
            }
            if state.pool.contains_key(&tx.hash) {
                bail!("already known");
            }
            let next = state.next_nonce(from);
            if tx.nonce < next {
                bail!("nonce too low: next nonce {next}, tx nonce {}", tx.nonce);
            }
            let cost = tx.value + U256::from(tx.gas_limit) * U256::from(tx.max_fee_per_gas);
            if state.balance(from) < cost {
                bail!("insufficient funds for gas * price + value");
            }

            // replacement
            state.pool.retain(|_, pooled| !(pooled.from == from && pooled.nonce == tx.nonce));
            state.sent.push(tx.clone());

            let credit = match state.inclusion.pop_front().unwrap_or(Inclusion::Include) {
                Inclusion::Include => state.execute(&tx),
                Inclusion::Revert => {
                    state.mine(&tx, false);
                    None
                }
                Inclusion::Never => {
                    state.pool.insert(tx.hash, tx.clone());
                    None
                }
            };
            (tx.hash, credit.and_then(|credit| state.peer.clone().map(|peer| (peer, credit))))
        };

        if let Some((peer, credit)) = credit {
            peer.credit(credit);
        }
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: B256) -> eyre::Result<Option<ReceiptInfo>> {
        Ok(self.available()?.receipts.get(&tx_hash).cloned())
    }

    async fn transaction_known(&self, tx_hash: B256) -> eyre::Result<bool> {
        let state = self.available()?;
        Ok(state.pool.contains_key(&tx_hash) || state.receipts.contains_key(&tx_hash))
    }
}

/// Records every compile request and returns a tiny init code, or fails them all.
#[derive(Debug, Default)]
pub(crate) struct MockCompiler {
    fail: bool,
    compiled: Mutex<Vec<String>>,
}

impl MockCompiler {
    pub(crate) fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub(crate) fn compiled(&self) -> Vec<String> {
        self.compiled.lock().clone()
    }
}

#[async_trait]
impl ContractCompiler for MockCompiler {
    async fn compile(&self, name: &str, _source: &str) -> Result<CompiledContract, BridgeError> {
        self.compiled.lock().push(name.to_string());
        if self.fail {
            return Err(BridgeError::ToolingFailure("solc: command not found".to_string()));
        }
        Ok(CompiledContract {
            name: name.to_string(),
            abi: serde_json::json!([]),
            bytecode: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
        })
    }
}

/// Two linked mock chains, a key set and the matching config.
pub(crate) struct TestEnv {
    pub(crate) l1: MockChain,
    pub(crate) l2: MockChain,
    pub(crate) config: TesterConfig,
    pub(crate) ledger: Arc<AccountLedger>,
    pub(crate) compiler: Arc<MockCompiler>,
}

impl TestEnv {
    pub(crate) fn new(accounts: usize) -> Self {
        Self::with_compiler(accounts, MockCompiler::default())
    }

    pub(crate) fn with_compiler(accounts: usize, compiler: MockCompiler) -> Self {
        let l1 = MockChain::new();
        let l2 = MockChain::new();
        l1.link_deposits_to(&l2);

        Self {
            l1,
            l2,
            config: TesterConfig::fast(),
            ledger: Arc::new(AccountLedger::new(signers(accounts)).unwrap()),
            compiler: Arc::new(compiler),
        }
    }

    pub(crate) fn address(&self, index: usize) -> Address {
        self.ledger.account(AccountId(index)).unwrap().address
    }

    pub(crate) fn chain(&self, kind: ChainKind) -> &MockChain {
        match kind {
            ChainKind::L1 => &self.l1,
            ChainKind::L2 => &self.l2,
        }
    }

    /// Native balance for account `index` on `kind`, in ether.
    pub(crate) fn fund(&self, kind: ChainKind, index: usize, amount: &str) {
        self.chain(kind).set_balance(self.address(index), ether(amount));
    }

    /// Test token balance for account `index` on `kind`, in whole tokens.
    pub(crate) fn fund_token(&self, kind: ChainKind, index: usize, amount: &str) {
        self.chain(kind).set_token_balance(self.config.chain(kind).token, self.address(index), ether(amount));
    }

    pub(crate) fn bridge(&self) -> Bridge {
        Bridge::new(
            Arc::new(self.config.clone()),
            self.l1.endpoint_with(ChainKind::L1, self.config.l1.clone()),
            self.l2.endpoint_with(ChainKind::L2, self.config.l2.clone()),
            self.ledger.clone(),
            self.compiler.clone(),
        )
    }

    pub(crate) fn orchestrator(&self, policy: FailurePolicy) -> BatchOrchestrator {
        BatchOrchestrator::new(Arc::new(self.bridge()), policy)
    }
}
