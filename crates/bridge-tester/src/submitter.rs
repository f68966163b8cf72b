//! Build, sign, broadcast and confirm one logical transaction.
//!
//! A logical transaction is a chain of attempts sharing a single nonce. Each
//! replacement pays more than the one before it; the first attempt to be mined
//! resolves the chain.

use alloy::{
    consensus::TxEip1559,
    eips::eip2718::Encodable2718,
    primitives::{Address, B256, Bytes, TxKind, U256},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    accounts::{Account, AccountId},
    calls::{CallKind, TxRequest},
    chain::{CallRequest, ChainEndpoint, ChainKind, ReceiptInfo, TxStatus},
    config::{FeePolicy, TxPolicy},
    error::{Asset, BridgeError},
    fees::{FeeEstimator, FeeProfile},
    ledger::{AccountLedger, NonceSlot},
    metrics::TesterMetrics,
    retry::is_transient_error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Built,
    Submitted,
    /// Seen in the pool, not yet mined.
    Pending,
    Confirmed,
    Reverted,
    Underpriced,
    /// Superseded by a later attempt with the same nonce. Still polled, since
    /// the pool may mine it before its replacement.
    Replaced,
    /// Given up on.
    Abandoned,
}

/// One signed version of a logical transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionAttempt {
    pub kind: CallKind,
    pub chain: ChainKind,
    pub from: Address,
    pub to: TxKind,
    pub value: U256,
    pub input: Bytes,
    pub fee: FeeProfile,
    pub nonce: u64,
    pub hash: B256,
    pub status: AttemptStatus,
}

impl TransactionAttempt {
    /// Whether the node accepted this attempt and it may still be mined.
    pub const fn is_live(&self) -> bool {
        matches!(self.status, AttemptStatus::Submitted | AttemptStatus::Pending | AttemptStatus::Replaced)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Confirmed,
    Reverted,
    Abandoned,
}

/// Terminal result of [`TransactionSubmitter::submit`].
#[derive(Debug, Clone, Serialize)]
pub struct TxOutcome {
    pub status: OutcomeStatus,
    pub chain: ChainKind,
    pub nonce: u64,
    pub attempts: Vec<TransactionAttempt>,
    pub receipt: Option<ReceiptInfo>,
    /// Why the chain was abandoned.
    pub reason: Option<String>,
}

impl TxOutcome {
    pub const fn is_confirmed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Confirmed)
    }

    /// Hash of the mined attempt, or of the last one broadcast.
    pub fn tx_hash(&self) -> Option<B256> {
        self.receipt
            .as_ref()
            .map(|receipt| receipt.tx_hash)
            .or_else(|| self.attempts.last().map(|attempt| attempt.hash))
    }

    /// Number of fee escalations applied.
    pub fn escalations(&self) -> u32 {
        self.attempts.last().map(|attempt| attempt.fee.bump_count).unwrap_or_default()
    }

    /// The outcome as a classified error, if it is not a confirmation.
    pub fn failure(&self) -> Option<BridgeError> {
        let priced_out =
            self.attempts.last().is_some_and(|attempt| attempt.status == AttemptStatus::Underpriced);
        match self.status {
            OutcomeStatus::Confirmed => None,
            OutcomeStatus::Abandoned if priced_out => {
                Some(BridgeError::PricingRejected { chain: self.chain, attempts: self.attempts.len() })
            }
            OutcomeStatus::Reverted => Some(BridgeError::ExecutionReverted {
                chain: self.chain,
                tx_hash: self.tx_hash().unwrap_or_default(),
            }),
            OutcomeStatus::Abandoned => Some(BridgeError::Abandoned {
                chain: self.chain,
                attempts: self.attempts.len(),
                reason: self.reason.clone().unwrap_or_default(),
            }),
        }
    }
}

/// How a node answered `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    AlreadyKnown,
    Underpriced,
    NonceTooLow,
    InsufficientFunds,
    Transient(String),
    Other(String),
}

pub fn classify_send_error(err: &eyre::Error) -> SendError {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("already known") || msg.contains("known transaction") || msg.contains("already imported") {
        SendError::AlreadyKnown
    } else if msg.contains("underpriced")
        || msg.contains("fee too low")
        || msg.contains("less than block base fee")
        || msg.contains("fee cap less than")
    {
        SendError::Underpriced
    } else if msg.contains("nonce too low") {
        SendError::NonceTooLow
    } else if msg.contains("insufficient funds") {
        SendError::InsufficientFunds
    } else if is_transient_error(err) {
        SendError::Transient(msg)
    } else {
        SendError::Other(msg)
    }
}

/// Result of broadcasting one attempt.
enum Broadcast {
    Sent,
    Underpriced,
    NonceConsumed,
}

/// Pool state of an attempt after a wait window expired.
enum PoolCheck {
    Healthy,
    Stale,
    NonceConsumed,
}

enum Resolution {
    Mined(ReceiptInfo),
    Abandoned(String),
}

/// State of one logical transaction while it is being driven.
struct Run<'a> {
    account: Account,
    request: &'a TxRequest,
    chain: ChainKind,
    chain_id: u64,
    nonce: u64,
    gas_limit: u64,
    attempts: Vec<TransactionAttempt>,
    current_raw: Option<Bytes>,
    first_broadcast: Option<Instant>,
    /// Why no further replacement can be sent.
    held: Option<String>,
}

impl Run<'_> {
    fn has_live_attempt(&self) -> bool {
        self.attempts.iter().any(TransactionAttempt::is_live)
    }

    /// Stop replacing and keep waiting on the attempt already in the pool.
    /// With nothing in the pool, `err` ends the run.
    fn hold(&mut self, err: BridgeError) -> Result<(), BridgeError> {
        if !self.has_live_attempt() {
            return Err(err);
        }
        warn!(
            chain = %self.chain,
            nonce = self.nonce,
            error = %err,
            "Replacement blocked, waiting on the pooled attempt"
        );
        self.held = Some(err.to_string());
        Ok(())
    }
}

pub struct TransactionSubmitter {
    ledger: Arc<AccountLedger>,
    estimator: FeeEstimator,
    policy: TxPolicy,
    metrics: TesterMetrics,
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("estimator", &self.estimator)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<AccountLedger>, fees: FeePolicy, policy: TxPolicy) -> Self {
        Self { ledger, estimator: FeeEstimator::new(fees), policy, metrics: TesterMetrics::default() }
    }

    pub fn with_metrics(mut self, metrics: TesterMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub const fn ledger(&self) -> &Arc<AccountLedger> {
        &self.ledger
    }

    pub const fn estimator(&self) -> &FeeEstimator {
        &self.estimator
    }

    /// Submit `request` from `from` on `endpoint` and drive it to a terminal outcome.
    ///
    /// Fails before any nonce is taken if the account cannot cover
    /// `value + gas_limit * max_fee_per_gas`. On L2 a short balance first waits
    /// up to `l2_credit_wait` for a pending deposit to land. Confirmed and
    /// reverted outcomes consume the nonce. Abandoned ones release it, unless an
    /// attempt is still in the pool.
    pub async fn submit(
        &self,
        endpoint: &ChainEndpoint,
        from: AccountId,
        request: TxRequest,
    ) -> Result<TxOutcome, BridgeError> {
        let account = self.ledger.account(from)?;
        let chain = endpoint.kind();

        let fee = self.estimator.profile_for(endpoint).await?;
        let gas_limit = match request.gas_limit {
            Some(limit) => limit,
            None => self.gas_limit(endpoint, account.address, &request).await,
        };
        let required = required_funds(request.value, gas_limit, &fee);
        self.ensure_funds(endpoint, account, required, true).await?;
        let chain_id = endpoint.chain_id().await?;

        let slot = self.ledger.next_nonce(from, endpoint).await?;
        let mut run = Run {
            account,
            request: &request,
            chain,
            chain_id,
            nonce: slot.value(),
            gas_limit,
            attempts: Vec::new(),
            current_raw: None,
            first_broadcast: None,
            held: None,
        };

        let resolution = self.drive(endpoint, &mut run, fee).await;
        match resolution {
            Ok(Resolution::Mined(receipt)) => Ok(self.finish_mined(slot, run, receipt)),
            Ok(Resolution::Abandoned(reason)) => {
                if let Some(receipt) = self.check_receipts(endpoint, &mut run).await {
                    return Ok(self.finish_mined(slot, run, receipt));
                }
                Ok(self.finish_abandoned(slot, run, reason))
            }
            // Nothing from this run reached the pool.
            Err(err) => {
                self.ledger.release(slot);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        endpoint: &ChainEndpoint,
        run: &mut Run<'_>,
        mut fee: FeeProfile,
    ) -> Result<Resolution, BridgeError> {
        loop {
            match self.broadcast(endpoint, run, fee).await {
                Ok(Broadcast::Sent) => {}
                Ok(Broadcast::Underpriced) => match self.replacement_fee(endpoint, run, &fee).await {
                    Ok(Some(next)) => {
                        fee = next;
                        continue;
                    }
                    Ok(None) => return Ok(Resolution::Abandoned("fee ceiling reached while underpriced".into())),
                    Err(err) => run.hold(err)?,
                },
                Ok(Broadcast::NonceConsumed) if !run.has_live_attempt() => {
                    return Ok(Resolution::Abandoned(format!("nonce {} already used on chain", run.nonce)));
                }
                Ok(Broadcast::NonceConsumed) => {}
                Err(err) => run.hold(err)?,
            }

            let mut windows = 0;
            loop {
                if let Some(receipt) = self.await_receipt(endpoint, run).await {
                    return Ok(Resolution::Mined(receipt));
                }
                windows += 1;

                match self.check_pool(endpoint, run, &fee).await {
                    PoolCheck::Stale if run.held.is_none() => match self.replacement_fee(endpoint, run, &fee).await {
                        Ok(Some(next)) => {
                            fee = next;
                            break;
                        }
                        Ok(None) => return Ok(Resolution::Abandoned("fee ceiling reached".into())),
                        Err(err) => run.hold(err)?,
                    },
                    PoolCheck::NonceConsumed => {
                        return Ok(match self.check_receipts(endpoint, run).await {
                            Some(receipt) => Resolution::Mined(receipt),
                            None => Resolution::Abandoned(format!(
                                "nonce {} consumed by another transaction",
                                run.nonce
                            )),
                        });
                    }
                    _ if windows >= self.policy.max_wait_windows => {
                        let reason = match &run.held {
                            Some(blocked) => {
                                format!("not mined after {windows} wait window(s), replacement blocked: {blocked}")
                            }
                            None => format!("not mined after {windows} wait window(s)"),
                        };
                        return Ok(Resolution::Abandoned(reason));
                    }
                    _ => {
                        debug!(
                            chain = %run.chain,
                            nonce = run.nonce,
                            window = windows,
                            "Transaction still pending, waiting another window"
                        );
                    }
                }
            }
        }
    }

    /// Sign and send one attempt priced at `fee`.
    async fn broadcast(
        &self,
        endpoint: &ChainEndpoint,
        run: &mut Run<'_>,
        fee: FeeProfile,
    ) -> Result<Broadcast, BridgeError> {
        let tx = TxEip1559 {
            chain_id: run.chain_id,
            nonce: run.nonce,
            gas_limit: run.gas_limit,
            max_fee_per_gas: fee.max_fee_per_gas,
            max_priority_fee_per_gas: fee.priority_fee_per_gas,
            to: run.request.to,
            value: run.request.value,
            input: run.request.input.clone(),
            ..Default::default()
        };
        let envelope = self.ledger.sign(run.account.id, tx)?;
        let hash = *envelope.tx_hash();
        let raw: Bytes = envelope.encoded_2718().into();

        run.attempts.push(TransactionAttempt {
            kind: run.request.kind,
            chain: run.chain,
            from: run.account.address,
            to: run.request.to,
            value: run.request.value,
            input: run.request.input.clone(),
            fee,
            nonce: run.nonce,
            hash,
            status: AttemptStatus::Built,
        });
        let index = run.attempts.len() - 1;

        let sent = endpoint.send_raw_transaction(raw.clone()).await;
        let outcome = match sent {
            Ok(_) => Ok(Broadcast::Sent),
            Err(err) => match classify_send_error(&err) {
                SendError::AlreadyKnown => Ok(Broadcast::Sent),
                SendError::Transient(reason) => {
                    warn!(chain = %run.chain, tx_hash = %hash, %reason, "Broadcast failed transiently, polling anyway");
                    Ok(Broadcast::Sent)
                }
                SendError::Underpriced => Ok(Broadcast::Underpriced),
                SendError::NonceTooLow => Ok(Broadcast::NonceConsumed),
                SendError::InsufficientFunds => {
                    let balance = endpoint.get_balance(run.account.address).await.unwrap_or_default();
                    Err(BridgeError::InsufficientFunds {
                        chain: run.chain,
                        account: run.account.address,
                        asset: Asset::Native,
                        balance,
                        required: required_funds(run.request.value, run.gas_limit, &fee),
                    })
                }
                SendError::Other(reason) => Err(BridgeError::Rejected { chain: run.chain, reason }),
            },
        };

        match &outcome {
            Ok(Broadcast::Sent) => {
                for earlier in run.attempts[..index].iter_mut().filter(|attempt| attempt.is_live()) {
                    earlier.status = AttemptStatus::Replaced;
                }
                run.attempts[index].status = AttemptStatus::Submitted;
                run.current_raw = Some(raw);
                run.first_broadcast.get_or_insert_with(Instant::now);
                self.metrics.record_submission();
                info!(
                    chain = %run.chain,
                    kind = %run.request.kind,
                    from = %run.account.address,
                    nonce = run.nonce,
                    tx_hash = %hash,
                    max_fee_per_gas = fee.max_fee_per_gas,
                    priority_fee_per_gas = fee.priority_fee_per_gas,
                    bump_count = fee.bump_count,
                    "Transaction broadcast"
                );
            }
            Ok(Broadcast::Underpriced) => {
                run.attempts[index].status = AttemptStatus::Underpriced;
                warn!(chain = %run.chain, nonce = run.nonce, tx_hash = %hash, "Transaction underpriced");
            }
            Ok(Broadcast::NonceConsumed) | Err(_) => run.attempts[index].status = AttemptStatus::Abandoned,
        }
        outcome
    }

    /// Poll every live attempt until one is mined or the window closes.
    async fn await_receipt(&self, endpoint: &ChainEndpoint, run: &mut Run<'_>) -> Option<ReceiptInfo> {
        let deadline = Instant::now() + self.policy.receipt_timeout();
        loop {
            if let Some(receipt) = self.check_receipts(endpoint, run).await {
                return Some(receipt);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(self.policy.poll_interval()).await;
        }
    }

    /// One pass over the live attempts, newest first.
    async fn check_receipts(&self, endpoint: &ChainEndpoint, run: &mut Run<'_>) -> Option<ReceiptInfo> {
        for attempt in run.attempts.iter_mut().rev().filter(|attempt| attempt.is_live()) {
            match endpoint.get_transaction_receipt(attempt.hash).await {
                Ok(TxStatus::Success(receipt) | TxStatus::Reverted(receipt)) => return Some(receipt),
                Ok(TxStatus::Pending) if attempt.status == AttemptStatus::Submitted => {
                    attempt.status = AttemptStatus::Pending;
                }
                Ok(TxStatus::Pending | TxStatus::Unknown) => {}
                Err(err) => {
                    warn!(chain = %run.chain, tx_hash = %attempt.hash, error = %err, "Receipt lookup failed");
                }
            }
        }
        None
    }

    /// Decide whether the current attempt has been priced out.
    async fn check_pool(&self, endpoint: &ChainEndpoint, run: &Run<'_>, fee: &FeeProfile) -> PoolCheck {
        if let Ok(suggestion) = endpoint.current_gas_suggestion().await {
            if let Some(base_fee) = suggestion.base_fee {
                if !fee.covers(base_fee) {
                    debug!(chain = %run.chain, base_fee, max_fee = fee.max_fee_per_gas, "Fee cap below live base fee");
                    return PoolCheck::Stale;
                }
            }
        }

        let Some(raw) = run.current_raw.clone() else {
            return PoolCheck::Healthy;
        };
        match endpoint.send_raw_transaction(raw).await {
            Ok(_) => PoolCheck::Healthy,
            Err(err) => match classify_send_error(&err) {
                SendError::Underpriced => PoolCheck::Stale,
                SendError::NonceTooLow => PoolCheck::NonceConsumed,
                other => {
                    debug!(chain = %run.chain, nonce = run.nonce, result = ?other, "Re-broadcast check");
                    PoolCheck::Healthy
                }
            },
        }
    }

    /// Price the replacement of `prior`, or `None` at the attempt ceiling.
    ///
    /// Fails when the account cannot cover the replacement's worst-case cost.
    async fn replacement_fee(
        &self,
        endpoint: &ChainEndpoint,
        run: &Run<'_>,
        prior: &FeeProfile,
    ) -> Result<Option<FeeProfile>, BridgeError> {
        let live = self.estimator.profile_for(endpoint).await.unwrap_or(*prior);
        let Some(next) = self.estimator.escalate(prior, &live) else {
            warn!(
                chain = %run.chain,
                nonce = run.nonce,
                attempts = run.attempts.len(),
                "Attempt ceiling reached, giving up"
            );
            return Ok(None);
        };

        let required = required_funds(run.request.value, run.gas_limit, &next);
        self.ensure_funds(endpoint, run.account, required, false).await?;

        self.metrics.record_escalation();
        info!(
            chain = %run.chain,
            nonce = run.nonce,
            bump_count = next.bump_count,
            max_fee_per_gas = next.max_fee_per_gas,
            priority_fee_per_gas = next.priority_fee_per_gas,
            "Escalating fees"
        );
        Ok(Some(next))
    }

    async fn gas_limit(&self, endpoint: &ChainEndpoint, from: Address, request: &TxRequest) -> u64 {
        let cap = if request.is_create() {
            self.policy.create_gas_cap
        } else if request.input.is_empty() {
            self.policy.transfer_gas_cap
        } else {
            self.policy.call_gas_cap
        };

        let call = CallRequest {
            from: Some(from),
            to: request.to,
            value: request.value,
            input: request.input.clone(),
        };
        match endpoint.estimate_gas(&call).await {
            Ok(estimate) => {
                let buffered = estimate.saturating_mul(self.policy.gas_buffer_percent).div_ceil(100);
                debug!(chain = %endpoint.kind(), estimate, gas_limit = buffered.min(cap), "Estimated gas");
                buffered.min(cap)
            }
            Err(err) => {
                warn!(chain = %endpoint.kind(), error = %err, gas_limit = cap, "Gas estimation failed, using cap");
                cap
            }
        }
    }

    /// Check that `account` holds at least `required` native currency.
    async fn ensure_funds(
        &self,
        endpoint: &ChainEndpoint,
        account: Account,
        required: U256,
        wait_for_credit: bool,
    ) -> Result<(), BridgeError> {
        let chain = endpoint.kind();
        let mut balance = endpoint.get_balance(account.address).await?;

        let wait = match chain {
            ChainKind::L2 if wait_for_credit => self.policy.l2_credit_wait(),
            _ => Duration::ZERO,
        };
        if balance < required && !wait.is_zero() {
            info!(
                %chain,
                account = %account.id,
                %balance,
                %required,
                wait_secs = wait.as_secs(),
                "Balance short, waiting for a pending deposit to land"
            );
            let deadline = Instant::now() + wait;
            while balance < required && Instant::now() < deadline {
                tokio::time::sleep(self.policy.poll_interval()).await;
                balance = endpoint.get_balance(account.address).await?;
            }
        }
        self.ledger.record_balance(account.id, chain, balance);

        if balance < required {
            return Err(BridgeError::InsufficientFunds {
                chain,
                account: account.address,
                asset: Asset::Native,
                balance,
                required,
            });
        }
        Ok(())
    }

    fn finish_mined(&self, slot: NonceSlot, mut run: Run<'_>, receipt: ReceiptInfo) -> TxOutcome {
        let (status, attempt_status) = if receipt.success {
            (OutcomeStatus::Confirmed, AttemptStatus::Confirmed)
        } else {
            (OutcomeStatus::Reverted, AttemptStatus::Reverted)
        };

        for attempt in &mut run.attempts {
            if attempt.hash == receipt.tx_hash {
                attempt.status = attempt_status;
            } else if attempt.is_live() {
                attempt.status = AttemptStatus::Abandoned;
            }
        }

        if receipt.success {
            let latency = run.first_broadcast.map(|at| at.elapsed().as_secs_f64()).unwrap_or_default();
            self.metrics.record_confirmed(latency);
            info!(
                chain = %run.chain,
                nonce = run.nonce,
                tx_hash = %receipt.tx_hash,
                gas_used = receipt.gas_used,
                block_number = ?receipt.block_number,
                "Transaction confirmed"
            );
        } else {
            self.metrics.record_reverted();
            warn!(chain = %run.chain, nonce = run.nonce, tx_hash = %receipt.tx_hash, "Transaction reverted");
        }

        self.ledger.confirm(slot);
        TxOutcome {
            status,
            chain: run.chain,
            nonce: run.nonce,
            attempts: run.attempts,
            receipt: Some(receipt),
            reason: None,
        }
    }

    fn finish_abandoned(&self, slot: NonceSlot, mut run: Run<'_>, reason: String) -> TxOutcome {
        let pooled = run.has_live_attempt();
        for attempt in &mut run.attempts {
            if attempt.is_live() || attempt.status == AttemptStatus::Built {
                attempt.status = AttemptStatus::Abandoned;
            }
        }
        self.metrics.record_abandoned();
        warn!(
            chain = %run.chain,
            nonce = run.nonce,
            attempts = run.attempts.len(),
            pooled,
            %reason,
            "Transaction abandoned"
        );

        if pooled {
            self.ledger.resync(slot);
        } else {
            self.ledger.release(slot);
        }
        TxOutcome {
            status: OutcomeStatus::Abandoned,
            chain: run.chain,
            nonce: run.nonce,
            attempts: run.attempts,
            receipt: None,
            reason: Some(reason),
        }
    }
}

/// Worst-case native cost: `value + gas_limit * max_fee_per_gas`.
pub fn required_funds(value: U256, gas_limit: u64, fee: &FeeProfile) -> U256 {
    value.saturating_add(U256::from(gas_limit).saturating_mul(U256::from(fee.max_fee_per_gas)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("replacement transaction underpriced" => SendError::Underpriced)]
    #[test_case("transaction underpriced" => SendError::Underpriced)]
    #[test_case("max fee per gas less than block base fee" => SendError::Underpriced)]
    #[test_case("fee too low" => SendError::Underpriced)]
    #[test_case("already known" => SendError::AlreadyKnown)]
    #[test_case("nonce too low: next nonce 5, tx nonce 4" => SendError::NonceTooLow)]
    #[test_case("insufficient funds for gas * price + value" => SendError::InsufficientFunds)]
    #[test_case("connection refused" => SendError::Transient("connection refused".into()))]
    #[test_case("intrinsic gas too low" => SendError::Other("intrinsic gas too low".into()))]
    fn classifies_node_errors(message: &str) -> SendError {
        classify_send_error(&eyre::eyre!("{message}"))
    }

    #[test]
    fn required_funds_uses_fee_cap() {
        let fee = FeeProfile {
            base_fee_per_gas: 1,
            priority_fee_per_gas: 1,
            max_fee_per_gas: 10,
            bump_count: 0,
        };
        assert_eq!(required_funds(U256::from(5u64), 21_000, &fee), U256::from(210_005u64));
    }

    fn abandoned(statuses: &[AttemptStatus]) -> TxOutcome {
        let fee = FeeProfile { base_fee_per_gas: 1, priority_fee_per_gas: 1, max_fee_per_gas: 2, bump_count: 0 };
        let attempts = statuses
            .iter()
            .map(|&status| TransactionAttempt {
                kind: CallKind::NativeTransfer,
                chain: ChainKind::L2,
                from: Address::ZERO,
                to: TxKind::Call(Address::ZERO),
                value: U256::ZERO,
                input: Bytes::new(),
                fee,
                nonce: 0,
                hash: B256::ZERO,
                status,
            })
            .collect();
        TxOutcome {
            status: OutcomeStatus::Abandoned,
            chain: ChainKind::L2,
            nonce: 0,
            attempts,
            receipt: None,
            reason: Some("fee ceiling reached while underpriced".into()),
        }
    }

    #[test]
    fn priced_out_outcome_reports_pricing_rejection() {
        let outcome = abandoned(&[AttemptStatus::Underpriced, AttemptStatus::Underpriced]);
        assert!(matches!(outcome.failure(), Some(BridgeError::PricingRejected { attempts: 2, .. })));

        let outcome = abandoned(&[AttemptStatus::Underpriced, AttemptStatus::Abandoned]);
        assert!(matches!(outcome.failure(), Some(BridgeError::Abandoned { attempts: 2, .. })));
    }

    #[test]
    fn replaced_attempts_stay_live() {
        let outcome = abandoned(&[AttemptStatus::Replaced, AttemptStatus::Pending, AttemptStatus::Underpriced]);
        let live: Vec<_> = outcome.attempts.iter().map(TransactionAttempt::is_live).collect();
        assert_eq!(live, vec![true, true, false]);
    }
}
