use alloy_primitives::{Address, U256};
use bridge_tester::{
    accounts::AccountId,
    jobs::{CycleReport, JobKind},
};
use clap::Args;
use eyre::{Result, eyre};
use tracing::info;

use super::{parse_amount, print_cycle};
use crate::opts::GlobalArgs;

/// Options for the single-job subcommands.
#[derive(Args, Debug)]
pub(crate) struct JobArgs {
    /// Account to send from (index in the key file, 0 is the source)
    #[arg(short, long, default_value_t = 0)]
    account: usize,

    /// Amount in ether units, overriding the configured default
    #[arg(long, value_parser = parse_amount)]
    amount: Option<U256>,

    /// Recipient, defaults to the sending account
    #[arg(long)]
    to: Option<Address>,
}

impl JobArgs {
    pub(crate) async fn run(self, global: GlobalArgs, kind: JobKind) -> Result<()> {
        let bridge = global.connect()?;

        let mut job = bridge.default_job(kind, AccountId(self.account))?;
        if let Some(amount) = self.amount {
            job.amount = amount;
        }
        if let Some(to) = self.to {
            job.recipient = to;
        }
        info!(job = %kind, account = %job.account, recipient = %job.recipient, amount = %job.amount, "Running job");

        let report = bridge.execute(job).await;
        let success = report.is_success();
        let error = report.error.clone();

        let cycle = CycleReport { cycle: 1, jobs: vec![report], ..Default::default() };
        print_cycle(&cycle, global.format)?;

        if success {
            Ok(())
        } else {
            Err(eyre!("{kind} did not succeed: {}", error.as_deref().unwrap_or("see report")))
        }
    }
}
