//! Bridge operations: one flow per protocol, each producing a [`JobReport`].

use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{info, warn};

use crate::{
    accounts::{Account, AccountId},
    calls::Call,
    chain::{ChainEndpoint, ChainKind},
    config::TesterConfig,
    deploy::{CATALOG, ContractCompiler, DeploymentRecord, DeploymentStatus},
    error::{Asset, BridgeError},
    jobs::{BridgeJob, FollowUp, JobKind, JobOutcome, JobReport},
    ledger::AccountLedger,
    metrics::TesterMetrics,
    settlement::SettlementWatcher,
    submitter::{OutcomeStatus, TransactionSubmitter},
};

/// Native and token balances of one account on both chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountBalances {
    pub account: Account,
    pub l1_native: U256,
    pub l2_native: U256,
    pub l1_token: U256,
    pub l2_token: U256,
}

impl AccountBalances {
    pub const fn native(&self, chain: ChainKind) -> U256 {
        match chain {
            ChainKind::L1 => self.l1_native,
            ChainKind::L2 => self.l2_native,
        }
    }

    pub const fn token(&self, chain: ChainKind) -> U256 {
        match chain {
            ChainKind::L1 => self.l1_token,
            ChainKind::L2 => self.l2_token,
        }
    }
}

/// Everything the bridge flows need: both chains, the keys and the submitter.
pub struct Bridge {
    config: Arc<TesterConfig>,
    l1: ChainEndpoint,
    l2: ChainEndpoint,
    ledger: Arc<AccountLedger>,
    submitter: TransactionSubmitter,
    settlement: SettlementWatcher,
    compiler: Arc<dyn ContractCompiler>,
    metrics: TesterMetrics,
    watch_settlement: bool,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("l1", &self.l1)
            .field("l2", &self.l2)
            .field("ledger", &self.ledger)
            .field("watch_settlement", &self.watch_settlement)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    pub fn new(
        config: Arc<TesterConfig>,
        l1: ChainEndpoint,
        l2: ChainEndpoint,
        ledger: Arc<AccountLedger>,
        compiler: Arc<dyn ContractCompiler>,
    ) -> Self {
        let metrics = TesterMetrics::default();
        let submitter = TransactionSubmitter::new(ledger.clone(), config.fees.clone(), config.tx.clone())
            .with_metrics(metrics.clone());
        let settlement = SettlementWatcher::new(config.settlement.clone(), metrics.clone());

        Self {
            l1: l1.with_metrics(metrics.clone()),
            l2: l2.with_metrics(metrics.clone()),
            config,
            ledger,
            submitter,
            settlement,
            compiler,
            metrics,
            watch_settlement: false,
        }
    }

    /// Poll the destination chain for the credit after deposits.
    pub fn with_settlement_watch(mut self, enabled: bool) -> Self {
        self.watch_settlement = enabled;
        self
    }

    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    pub const fn ledger(&self) -> &Arc<AccountLedger> {
        &self.ledger
    }

    pub const fn endpoint(&self, chain: ChainKind) -> &ChainEndpoint {
        match chain {
            ChainKind::L1 => &self.l1,
            ChainKind::L2 => &self.l2,
        }
    }

    /// Read and cache the balances of `account`.
    pub async fn balances(&self, account: Account) -> Result<AccountBalances, BridgeError> {
        let l1_native = self.l1.get_balance(account.address).await?;
        let l2_native = self.l2.get_balance(account.address).await?;
        let l1_token = self.l1.token_balance(self.l1.token(), account.address).await?;
        let l2_token = self.l2.token_balance(self.l2.token(), account.address).await?;

        self.ledger.record_balance(account.id, ChainKind::L1, l1_native);
        self.ledger.record_balance(account.id, ChainKind::L2, l2_native);

        Ok(AccountBalances { account, l1_native, l2_native, l1_token, l2_token })
    }

    /// Job for `kind` with the configured default amount, sent to `account` itself.
    pub fn default_job(&self, kind: JobKind, account: AccountId) -> Result<BridgeJob, BridgeError> {
        let address = self.ledger.account(account)?.address;
        let amounts = &self.config.amounts;
        let amount = match kind {
            JobKind::EthDeposit => amounts.deposit_eth,
            JobKind::EthWithdrawInitiate => amounts.withdraw_eth,
            JobKind::Erc20BridgeL1ToL2 | JobKind::Erc20BridgeL2ToL1 => amounts.erc20,
            JobKind::L2SelfTransfer => amounts.self_transfer,
            JobKind::NativeTransfer => amounts.per_target,
            JobKind::FaucetClaim(_) | JobKind::ContractDeploySet => U256::ZERO,
        };
        Ok(BridgeJob::new(kind, account, address, amount))
    }

    /// Run one job to completion. Failures are captured in the report.
    pub async fn execute(&self, job: BridgeJob) -> JobReport {
        let mut report = JobReport::new(job);
        info!(job = %job.kind, account = %job.account, recipient = %job.recipient, amount = %job.amount, "Starting job");

        let result = match job.kind {
            JobKind::EthDeposit => self.deposit_eth(&job, &mut report).await,
            JobKind::EthWithdrawInitiate => self.withdraw_eth(&job, &mut report).await,
            JobKind::Erc20BridgeL1ToL2 => self.bridge_erc20(&job, ChainKind::L1, &mut report).await,
            JobKind::Erc20BridgeL2ToL1 => self.bridge_erc20(&job, ChainKind::L2, &mut report).await,
            JobKind::FaucetClaim(chain) => self.claim_faucet(&job, chain, &mut report).await,
            JobKind::L2SelfTransfer => self.self_transfer(&job, &mut report).await,
            JobKind::ContractDeploySet => self.deploy_contracts(&job, &mut report).await,
            JobKind::NativeTransfer => self.native_transfer(&job, &mut report).await,
        };
        if let Err(err) = result {
            report.fail(&err);
        }

        self.metrics.record_job(report.is_success());
        if report.is_success() {
            info!(job = %job.kind, account = %job.account, tx_hash = ?report.last_tx_hash(), "Job confirmed");
        } else {
            warn!(
                job = %job.kind,
                account = %job.account,
                outcome = ?report.outcome,
                error = report.error.as_deref().unwrap_or_default(),
                "Job did not confirm"
            );
        }
        report
    }

    /// Submit `call` and record it. Returns whether it confirmed.
    async fn send(
        &self,
        chain: ChainKind,
        from: AccountId,
        call: Call,
        report: &mut JobReport,
    ) -> Result<bool, BridgeError> {
        let endpoint = self.endpoint(chain);
        let request = call.to_request(endpoint.config())?;
        let outcome = self.submitter.submit(endpoint, from, request).await?;
        Ok(report.record_tx(outcome))
    }

    async fn deposit_eth(&self, job: &BridgeJob, report: &mut JobReport) -> Result<(), BridgeError> {
        let before = self.settlement_snapshot(ChainKind::L2, Asset::Native, job.recipient).await;

        let call = Call::DepositEth {
            recipient: job.recipient,
            amount: job.amount,
            l2_gas: self.config.amounts.l2_gas_limit,
        };
        if !self.send(ChainKind::L1, job.account, call, report).await? {
            return Ok(());
        }

        if let Some(before) = before {
            let min_delta = self.config.settlement.min_native_delta.min(job.amount);
            let settlement =
                self.settlement.watch(&self.l2, Asset::Native, job.recipient, before, min_delta).await;
            report.settlement = Some(settlement);
        }
        Ok(())
    }

    async fn withdraw_eth(&self, job: &BridgeJob, report: &mut JobReport) -> Result<(), BridgeError> {
        let call = Call::InitiateWithdrawal {
            target: job.recipient,
            amount: job.amount,
            gas_limit: U256::from(self.config.amounts.withdraw_gas_limit),
        };
        if self.send(ChainKind::L2, job.account, call, report).await? {
            self.require_l1_finalization(report);
        }
        Ok(())
    }

    /// Bridge the configured test token away from `origin`.
    async fn bridge_erc20(
        &self,
        job: &BridgeJob,
        origin: ChainKind,
        report: &mut JobReport,
    ) -> Result<(), BridgeError> {
        let account = self.ledger.account(job.account)?;
        let endpoint = self.endpoint(origin);
        let token = endpoint.token();

        let required = if job.capped { U256::from(1) } else { job.amount };
        let balance = self.ensure_token_balance(origin, account, required, report).await?;
        let amount = job.amount.min(balance);
        if amount < job.amount {
            report.note(format!("amount clamped to held balance {amount}"));
            report.job.amount = amount;
        }
        info!(chain = %origin, account = %account.id, %token, %balance, %amount, "Token balance sufficient");

        match origin {
            ChainKind::L1 => {
                let bridge = self.l1.standard_bridge();
                if !self.ensure_allowance(account, token, bridge, amount, report).await? {
                    return Ok(());
                }

                let before = self.settlement_snapshot(ChainKind::L2, Asset::Token(self.l2.token()), job.recipient).await;
                let call = Call::DepositErc20 {
                    l1_token: token,
                    l2_token: self.l2.token(),
                    recipient: job.recipient,
                    amount,
                    l2_gas: self.config.amounts.l2_gas_limit,
                };
                if !self.send(ChainKind::L1, job.account, call, report).await? {
                    return Ok(());
                }

                if let Some(before) = before {
                    let settlement = self
                        .settlement
                        .watch(&self.l2, Asset::Token(self.l2.token()), job.recipient, before, amount)
                        .await;
                    report.settlement = Some(settlement);
                }
            }
            ChainKind::L2 => {
                let call = Call::WithdrawErc20 { l2_token: token, amount, min_gas: 0 };
                if self.send(ChainKind::L2, job.account, call, report).await? {
                    self.require_l1_finalization(report);
                }
            }
        }
        Ok(())
    }

    /// Make sure `account` holds at least `required` of `chain`'s test token,
    /// claiming from the faucet once if it does not.
    async fn ensure_token_balance(
        &self,
        chain: ChainKind,
        account: Account,
        required: U256,
        report: &mut JobReport,
    ) -> Result<U256, BridgeError> {
        let endpoint = self.endpoint(chain);
        let token = endpoint.token();
        let mut balance = endpoint.token_balance(token, account.address).await?;

        if balance < required && endpoint.config().token_has_faucet {
            report.note(format!("{chain} token balance {balance} below {required}, claiming from faucet"));
            let claimed = async {
                let request = Call::ClaimFaucet { token }.to_request(endpoint.config())?;
                self.submitter.submit(endpoint, account.id, request).await
            }
            .await;

            match claimed {
                Ok(outcome) => {
                    if outcome.status != OutcomeStatus::Confirmed {
                        report.note(format!("faucet claim did not confirm: {:?}", outcome.status));
                    }
                    report.attach_tx(outcome);
                }
                Err(err) => report.note(format!("faucet claim failed: {err}")),
            }
            balance = endpoint.token_balance(token, account.address).await?;
        }

        if balance < required {
            return Err(BridgeError::InsufficientFunds {
                chain,
                account: account.address,
                asset: Asset::Token(token),
                balance,
                required,
            });
        }
        Ok(balance)
    }

    /// Approve `spender` on L1 if its allowance is below `amount`. Returns whether
    /// the allowance is now sufficient.
    async fn ensure_allowance(
        &self,
        account: Account,
        token: Address,
        spender: Address,
        amount: U256,
        report: &mut JobReport,
    ) -> Result<bool, BridgeError> {
        let allowance = self.l1.allowance(token, account.address, spender).await?;
        if allowance >= amount {
            return Ok(true);
        }

        let amounts = &self.config.amounts;
        let approval = amount.saturating_mul(U256::from(amounts.approval_multiplier)).max(amounts.min_approval);
        info!(account = %account.id, %token, %spender, %allowance, %approval, "Approving bridge");
        self.send(ChainKind::L1, account.id, Call::Approve { token, spender, amount: approval }, report).await
    }

    async fn claim_faucet(&self, job: &BridgeJob, chain: ChainKind, report: &mut JobReport) -> Result<(), BridgeError> {
        let endpoint = self.endpoint(chain);
        if !endpoint.config().token_has_faucet {
            return Err(BridgeError::Config {
                field: "token_has_faucet",
                message: format!("{} token has no faucet", endpoint.name()),
            });
        }

        let account = self.ledger.account(job.account)?;
        let token = endpoint.token();
        let before = endpoint.token_balance(token, account.address).await?;

        if !self.send(chain, job.account, Call::ClaimFaucet { token }, report).await? {
            return Ok(());
        }

        let after = endpoint.token_balance(token, account.address).await?;
        let delta = after.saturating_sub(before);
        report.token_delta = Some(delta);
        info!(%chain, account = %account.id, %before, %after, %delta, "Faucet claimed");
        Ok(())
    }

    async fn self_transfer(&self, job: &BridgeJob, report: &mut JobReport) -> Result<(), BridgeError> {
        let own = self.ledger.account(job.account)?.address;
        if job.recipient != own {
            report.note(format!("recipient {} replaced by sender for self-transfer", job.recipient));
        }
        self.send(ChainKind::L2, job.account, Call::NativeTransfer { recipient: own, amount: job.amount }, report)
            .await
            .map(drop)
    }

    async fn native_transfer(&self, job: &BridgeJob, report: &mut JobReport) -> Result<(), BridgeError> {
        let call = Call::NativeTransfer { recipient: job.recipient, amount: job.amount };
        self.send(ChainKind::L1, job.account, call, report).await.map(drop)
    }

    /// Compile the whole catalog, then deploy each template on L2.
    ///
    /// Compilation failures abort the set before anything is sent. Deployment
    /// failures are recorded per template and the set continues.
    async fn deploy_contracts(&self, job: &BridgeJob, report: &mut JobReport) -> Result<(), BridgeError> {
        let deployer = self.ledger.account(job.account)?;

        let mut compiled = Vec::with_capacity(CATALOG.len());
        for template in CATALOG {
            compiled.push((template, self.compiler.compile(template.name, template.source).await?));
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or_default();
        for (template, contract) in compiled {
            let init_code = template.init_code(&contract.bytecode, deployer.address, now);
            let submitted = async {
                let request = Call::Deploy { init_code }.to_request(self.l2.config())?;
                self.submitter.submit(&self.l2, deployer.id, request).await
            }
            .await;

            let status = match submitted {
                Ok(outcome) => {
                    let status = match (&outcome.status, &outcome.receipt) {
                        (OutcomeStatus::Confirmed, Some(receipt)) => DeploymentStatus::Deployed {
                            address: receipt.contract_address,
                            tx_hash: receipt.tx_hash,
                        },
                        (OutcomeStatus::Reverted, _) => DeploymentStatus::Reverted { tx_hash: outcome.tx_hash() },
                        _ => DeploymentStatus::Failed {
                            reason: outcome.reason.clone().unwrap_or_else(|| "abandoned".to_string()),
                        },
                    };
                    report.attach_tx(outcome);
                    status
                }
                Err(err) => DeploymentStatus::Failed { reason: err.to_string() },
            };

            match &status {
                DeploymentStatus::Deployed { address, .. } => {
                    info!(template = template.name, address = ?address, "Contract deployed");
                }
                other => warn!(template = template.name, status = ?other, "Contract deployment failed"),
            }
            report.deployments.push(DeploymentRecord { template: template.name, status });
        }

        let deployed = report.deployments.iter().filter(|record| record.is_deployed()).count();
        report.note(format!("deployed {deployed}/{}", CATALOG.len()));
        report.outcome = match deployed {
            0 => {
                report.error = Some("no template deployed".to_string());
                JobOutcome::Failed
            }
            n if n == CATALOG.len() => JobOutcome::Confirmed,
            _ => JobOutcome::Partial,
        };
        Ok(())
    }

    fn require_l1_finalization(&self, report: &mut JobReport) {
        if let Some(l2_tx_hash) = report.last_tx_hash() {
            report.follow_up = Some(FollowUp::ProveAndFinalizeOnL1 { l2_tx_hash });
            report.note("withdrawal initiated; prove and finalize on L1 after the challenge period");
        }
    }

    async fn settlement_snapshot(&self, chain: ChainKind, asset: Asset, account: Address) -> Option<U256> {
        if !self.watch_settlement {
            return None;
        }
        match self.settlement.snapshot(self.endpoint(chain), asset, account).await {
            Ok(balance) => Some(balance),
            Err(err) => {
                warn!(%chain, %account, error = %err, "Settlement snapshot failed, not watching");
                None
            }
        }
    }
}
