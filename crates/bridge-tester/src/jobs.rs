//! Bridge jobs and the reports they produce.

use alloy::primitives::{Address, B256, U256};
use serde::Serialize;

use crate::{
    accounts::AccountId,
    chain::ChainKind,
    deploy::DeploymentRecord,
    error::BridgeError,
    settlement::SettlementReport,
    submitter::{OutcomeStatus, TxOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// L1 native currency to L2 through the standard bridge.
    EthDeposit,
    /// L2 native currency to L1 through the message passer. Only the L2 leg.
    EthWithdrawInitiate,
    Erc20BridgeL1ToL2,
    Erc20BridgeL2ToL1,
    FaucetClaim(ChainKind),
    L2SelfTransfer,
    ContractDeploySet,
    /// Source-to-target L1 transfer during distribution.
    NativeTransfer,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EthDeposit => f.write_str("ETH deposit L1->L2"),
            Self::EthWithdrawInitiate => f.write_str("ETH withdrawal L2->L1"),
            Self::Erc20BridgeL1ToL2 => f.write_str("ERC-20 bridge L1->L2"),
            Self::Erc20BridgeL2ToL1 => f.write_str("ERC-20 bridge L2->L1"),
            Self::FaucetClaim(chain) => write!(f, "faucet claim on {chain}"),
            Self::L2SelfTransfer => f.write_str("L2 self-transfer"),
            Self::ContractDeploySet => f.write_str("contract deployment set"),
            Self::NativeTransfer => f.write_str("L1 native transfer"),
        }
    }
}

/// One unit of work for a bridge operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgeJob {
    pub kind: JobKind,
    pub account: AccountId,
    pub recipient: Address,
    pub amount: U256,
    /// `amount` is an upper bound. ERC-20 jobs bridge what the account holds
    /// after any faucet claim, up to `amount`.
    pub capped: bool,
}

impl BridgeJob {
    pub const fn new(kind: JobKind, account: AccountId, recipient: Address, amount: U256) -> Self {
        Self { kind, account, recipient, amount, capped: false }
    }

    pub const fn capped(self) -> Self {
        Self { capped: true, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Confirmed,
    Reverted,
    Abandoned,
    InsufficientFunds,
    ToolingFailure,
    /// Not attempted, e.g. gated by balance.
    Skipped,
    /// Some steps confirmed, others did not.
    Partial,
    /// Deterministic rejection or local error.
    Failed,
}

impl JobOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Whether an aborting batch must stop here.
    pub const fn is_terminal_failure(&self) -> bool {
        !matches!(self, Self::Confirmed | Self::Skipped | Self::Partial)
    }
}

impl From<&BridgeError> for JobOutcome {
    fn from(err: &BridgeError) -> Self {
        match err {
            BridgeError::InsufficientFunds { .. } => Self::InsufficientFunds,
            BridgeError::ToolingFailure(_) => Self::ToolingFailure,
            BridgeError::ExecutionReverted { .. } => Self::Reverted,
            BridgeError::Abandoned { .. }
            | BridgeError::EndpointUnavailable { .. }
            | BridgeError::PricingRejected { .. } => Self::Abandoned,
            BridgeError::SettlementTimeout { .. } => Self::Partial,
            BridgeError::Rejected { .. }
            | BridgeError::NonceInFlight { .. }
            | BridgeError::UnknownAccount(_)
            | BridgeError::Signing(_)
            | BridgeError::KeyFile(_)
            | BridgeError::Config { .. } => Self::Failed,
        }
    }
}

impl From<OutcomeStatus> for JobOutcome {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Confirmed => Self::Confirmed,
            OutcomeStatus::Reverted => Self::Reverted,
            OutcomeStatus::Abandoned => Self::Abandoned,
        }
    }
}

/// Work a job leaves outstanding for someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum FollowUp {
    /// The withdrawal must still be proven and finalized on L1 after the
    /// challenge period. Not attempted by this tool.
    ProveAndFinalizeOnL1 { l2_tx_hash: B256 },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: BridgeJob,
    pub outcome: JobOutcome,
    pub transactions: Vec<TxOutcome>,
    pub settlement: Option<SettlementReport>,
    pub follow_up: Option<FollowUp>,
    pub deployments: Vec<DeploymentRecord>,
    /// Observed token balance change, for faucet claims.
    pub token_delta: Option<U256>,
    pub error: Option<String>,
    pub notes: Vec<String>,
    /// The failure cannot be fixed by moving on to other jobs.
    #[serde(skip)]
    pub fatal: bool,
}

impl JobReport {
    pub const fn new(job: BridgeJob) -> Self {
        Self {
            job,
            outcome: JobOutcome::Confirmed,
            transactions: Vec::new(),
            settlement: None,
            follow_up: None,
            deployments: Vec::new(),
            token_delta: None,
            error: None,
            notes: Vec::new(),
            fatal: false,
        }
    }

    pub fn skipped(job: BridgeJob, reason: impl Into<String>) -> Self {
        let mut report = Self::new(job);
        report.outcome = JobOutcome::Skipped;
        report.notes.push(reason.into());
        report
    }

    /// Record a failure that ended the job.
    pub fn fail(&mut self, err: &BridgeError) {
        self.outcome = JobOutcome::from(err);
        self.error = Some(err.to_string());
        self.fatal = !err.is_recoverable_in_batch();
    }

    /// Add a transaction outcome. Returns whether it confirmed; otherwise the
    /// report takes the transaction's outcome.
    pub fn record_tx(&mut self, outcome: TxOutcome) -> bool {
        let confirmed = outcome.is_confirmed();
        if !confirmed {
            self.outcome = outcome.status.into();
            self.error = outcome.failure().map(|err| err.to_string());
        }
        self.transactions.push(outcome);
        confirmed
    }

    /// Add a transaction that does not decide the job's outcome.
    pub fn attach_tx(&mut self, outcome: TxOutcome) {
        self.transactions.push(outcome);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub const fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Hash of the last mined transaction of the job.
    pub fn last_tx_hash(&self) -> Option<B256> {
        self.transactions.iter().rev().find_map(|tx| tx.receipt.as_ref().map(|receipt| receipt.tx_hash))
    }
}

/// Everything one orchestrator run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub jobs: Vec<JobReport>,
    pub skipped_accounts: Vec<AccountId>,
    pub aborted: bool,
}

impl CycleReport {
    pub fn new(cycle: u64) -> Self {
        Self { cycle, ..Default::default() }
    }

    pub fn attempted(&self) -> usize {
        self.jobs.iter().filter(|report| report.outcome != JobOutcome::Skipped).count()
    }

    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|report| report.is_success()).count()
    }

    /// Share of attempted jobs that confirmed, in percent.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 0.0;
        }
        self.succeeded() as f64 * 100.0 / attempted as f64
    }
}
