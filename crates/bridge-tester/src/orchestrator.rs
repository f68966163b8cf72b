//! Sequencing of bridge jobs across accounts.
//!
//! The orchestrator owns no chain state of its own. It builds jobs, hands them to
//! [`Bridge::execute`] one at a time and decides, per its [`FailurePolicy`],
//! whether a failed job ends the batch.

use alloy::primitives::U256;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    accounts::Account,
    chain::ChainKind,
    config::PauseRange,
    jobs::{BridgeJob, CycleReport, JobKind, JobReport},
    ops::{AccountBalances, Bridge},
};

/// Jobs the randomized flow runs for every funded account, in shuffled order.
pub const CYCLE_TASKS: [JobKind; 4] = [
    JobKind::Erc20BridgeL1ToL2,
    JobKind::EthWithdrawInitiate,
    JobKind::Erc20BridgeL2ToL1,
    JobKind::L2SelfTransfer,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first terminal failure.
    Abort,
    /// Record the failure and move on.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum OrchestratorState {
    Idle,
    Running { cycle: u64 },
    Completed,
    Aborted,
}

#[derive(Debug)]
pub struct BatchOrchestrator {
    bridge: Arc<Bridge>,
    policy: FailurePolicy,
    state: OrchestratorState,
    rng: StdRng,
    cycles: u64,
}

impl BatchOrchestrator {
    /// Shuffling is seeded from `cycle.shuffle_seed` when configured.
    pub fn new(bridge: Arc<Bridge>, policy: FailurePolicy) -> Self {
        let rng = match bridge.config().cycle.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { bridge, policy, state: OrchestratorState::Idle, rng, cycles: 0 }
    }

    pub const fn state(&self) -> OrchestratorState {
        self.state
    }

    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub const fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Fund every target from the source: an L1 transfer of `per_target`, then a
    /// deposit of the bridge share to the target's L2 address.
    ///
    /// Targets are processed in key file order. A target whose transfer did not
    /// confirm gets no deposit.
    pub async fn distribute(&mut self) -> CycleReport {
        let mut report = self.begin();
        let ledger = self.bridge.ledger().clone();
        let source = ledger.source();
        let amounts = self.bridge.config().amounts.clone();

        let targets: Vec<Account> = ledger.targets().collect();
        if targets.is_empty() {
            warn!("Distribution needs at least one target key after the source");
        }
        info!(
            source = %source.address,
            targets = targets.len(),
            per_target = %amounts.per_target,
            bridge_share = %amounts.bridge_share(),
            "Starting distribution"
        );

        for (index, target) in targets.iter().enumerate() {
            info!(recipient = %target.address, progress = %format!("{}/{}", index + 1, targets.len()), "Funding target");

            let transfer = BridgeJob::new(JobKind::NativeTransfer, source.id, target.address, amounts.per_target);
            let deposit = BridgeJob::new(JobKind::EthDeposit, source.id, target.address, amounts.bridge_share());

            let funded = self.bridge.execute(transfer).await;
            let confirmed = funded.is_success();
            if self.record(&mut report, funded) {
                break;
            }
            if !confirmed {
                report.jobs.push(JobReport::skipped(deposit, "transfer to target did not confirm"));
                continue;
            }

            let bridged = self.bridge.execute(deposit).await;
            if self.record(&mut report, bridged) {
                break;
            }
        }

        self.finish(report)
    }

    /// One pass of the randomized full flow over every account.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = self.begin();
        let pacing = self.bridge.config().pacing.clone();
        let gates = self.bridge.config().gates.clone();

        let mut accounts = self.bridge.ledger().accounts();
        accounts.shuffle(&mut self.rng);
        info!(cycle = report.cycle, accounts = accounts.len(), "Starting cycle");

        'accounts: for (index, account) in accounts.iter().enumerate() {
            if index > 0 {
                self.pause(pacing.account_pause).await;
            }

            let balances = match self.bridge.balances(*account).await {
                Ok(balances) => balances,
                Err(err) => {
                    warn!(account = %account.id, error = %err, "Balance lookup failed, skipping account");
                    report.skipped_accounts.push(account.id);
                    continue;
                }
            };
            info!(
                account = %account.id,
                address = %account.address,
                l1 = %balances.l1_native,
                l2 = %balances.l2_native,
                l1_token = %balances.l1_token,
                l2_token = %balances.l2_token,
                "Account balances"
            );
            if balances.l1_native < gates.min_l1 && balances.l2_native < gates.min_l2 {
                info!(account = %account.id, "Both balances below the gate, skipping account");
                report.skipped_accounts.push(account.id);
                continue;
            }

            let mut tasks = CYCLE_TASKS;
            tasks.shuffle(&mut self.rng);
            for (position, kind) in tasks.into_iter().enumerate() {
                if position > 0 {
                    self.pause(pacing.task_pause).await;
                }
                let job_report = match self.plan(kind, &balances) {
                    Ok(job) => self.bridge.execute(job).await,
                    Err(skipped) => skipped,
                };
                if self.record(&mut report, job_report) {
                    break 'accounts;
                }
            }
        }

        if !report.aborted {
            self.deploy_set(&mut report).await;
        }

        info!(
            cycle = report.cycle,
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            success_rate = %format!("{:.1}%", report.success_rate()),
            "Cycle finished"
        );
        self.finish(report)
    }

    /// Run `jobs` in order under the failure policy.
    pub async fn run_jobs(&mut self, jobs: Vec<BridgeJob>) -> CycleReport {
        let mut report = self.begin();
        let pause = self.bridge.config().pacing.claim_pause;

        for (index, job) in jobs.into_iter().enumerate() {
            if index > 0 && matches!(job.kind, JobKind::FaucetClaim(_)) {
                self.pause(pause).await;
            }
            let job_report = self.bridge.execute(job).await;
            if self.record(&mut report, job_report) {
                break;
            }
        }
        self.finish(report)
    }

    /// Run cycles until `cancel` fires, sleeping the configured interval between
    /// them. Cancellation is observed between cycles only. Failures never stop
    /// the loop, whatever policy the orchestrator was built with.
    pub async fn run_unattended<F>(&mut self, cancel: CancellationToken, mut on_report: F) -> u64
    where
        F: FnMut(&CycleReport),
    {
        self.policy = FailurePolicy::Continue;
        let interval = self.bridge.config().cycle.interval();
        let mut completed = 0;

        loop {
            let report = self.run_cycle().await;
            completed += 1;
            on_report(&report);

            if cancel.is_cancelled() {
                break;
            }
            info!(cycle = report.cycle, next_in_secs = interval.as_secs(), "Sleeping until next cycle");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(cycles = completed, "Unattended loop stopped");
        completed
    }

    /// Choose the amount for one randomized task, or skip it.
    fn plan(&self, kind: JobKind, balances: &AccountBalances) -> Result<BridgeJob, JobReport> {
        let account = balances.account;
        let config = self.bridge.config();
        let gates = &config.gates;

        let mut job = match self.bridge.default_job(kind, account.id) {
            Ok(job) => job,
            Err(err) => {
                let mut failed = JobReport::new(BridgeJob::new(kind, account.id, account.address, U256::ZERO));
                failed.fail(&err);
                return Err(failed);
            }
        };

        let skip = |job: BridgeJob, reason: &str| {
            info!(account = %account.id, job = %kind, reason, "Skipping task");
            Err(JobReport::skipped(job, reason))
        };

        match kind {
            JobKind::Erc20BridgeL1ToL2 => {
                if balances.l1_native < gates.min_l1 {
                    return skip(job, "L1 balance below gate");
                }
                job = job.capped();
                if balances.l1_token.is_zero() {
                    if !config.l1.token_has_faucet {
                        return skip(job, "no L1 test token and no faucet");
                    }
                } else {
                    job.amount = job.amount.min(balances.l1_token);
                }
            }
            JobKind::Erc20BridgeL2ToL1 => {
                if balances.l2_native < gates.min_l2_for_tasks {
                    return skip(job, "L2 balance below gate");
                }
                if balances.l2_token.is_zero() {
                    return skip(job, "no L2 test token");
                }
                job = job.capped();
                job.amount = job.amount.min(balances.l2_token);
            }
            JobKind::EthWithdrawInitiate | JobKind::L2SelfTransfer => {
                if balances.l2_native < gates.min_l2_for_tasks {
                    return skip(job, "L2 balance below gate");
                }
            }
            _ => {}
        }
        Ok(job)
    }

    /// Deploy the contract catalog once per cycle from the source account.
    async fn deploy_set(&mut self, report: &mut CycleReport) {
        let source = self.bridge.ledger().source();
        let job = match self.bridge.default_job(JobKind::ContractDeploySet, source.id) {
            Ok(job) => job,
            Err(err) => {
                warn!(error = %err, "Cannot build deployment job");
                return;
            }
        };

        let gate = self.bridge.config().gates.min_l2_for_tasks;
        let pause = self.bridge.config().pacing.task_pause;
        let funded = self.bridge.endpoint(ChainKind::L2).get_balance(source.address).await;
        let job_report = match funded {
            Ok(balance) if balance >= gate => {
                self.pause(pause).await;
                self.bridge.execute(job).await
            }
            Ok(_) => JobReport::skipped(job, "source L2 balance below gate"),
            Err(err) => {
                let mut failed = JobReport::new(job);
                failed.fail(&err);
                failed
            }
        };
        self.record(report, job_report);
    }

    /// Append `job_report`. Returns whether the batch must stop.
    fn record(&self, report: &mut CycleReport, job_report: JobReport) -> bool {
        let stop = job_report.fatal
            || (self.policy == FailurePolicy::Abort && job_report.outcome.is_terminal_failure());
        if stop {
            warn!(
                cycle = report.cycle,
                job = %job_report.job.kind,
                account = %job_report.job.account,
                outcome = ?job_report.outcome,
                "Stopping batch"
            );
            report.aborted = true;
        }
        report.jobs.push(job_report);
        stop
    }

    async fn pause(&mut self, range: PauseRange) {
        if range.is_zero() {
            return;
        }
        let secs = self.rng.gen_range(range.min_secs..=range.max_secs);
        debug!(secs, "Pausing");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    fn begin(&mut self) -> CycleReport {
        self.cycles += 1;
        self.state = OrchestratorState::Running { cycle: self.cycles };
        CycleReport::new(self.cycles)
    }

    fn finish(&mut self, report: CycleReport) -> CycleReport {
        self.state = if report.aborted { OrchestratorState::Aborted } else { OrchestratorState::Completed };
        report
    }
}
