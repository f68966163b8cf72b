use bridge_tester::{BatchOrchestrator, ChainKind, FailurePolicy, accounts::AccountId, jobs::JobKind};
use clap::{Args, ValueEnum};
use eyre::Result;
use std::sync::Arc;

use super::print_cycle;
use crate::opts::GlobalArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FaucetChain {
    L1,
    L2,
    Both,
}

impl FaucetChain {
    fn chains(self) -> &'static [ChainKind] {
        match self {
            Self::L1 => &[ChainKind::L1],
            Self::L2 => &[ChainKind::L2],
            Self::Both => &[ChainKind::L1, ChainKind::L2],
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct FaucetArgs {
    /// Chain whose test token to claim
    #[arg(long, value_enum, default_value_t = FaucetChain::L1)]
    chain: FaucetChain,

    /// Claim for one account only (index in the key file)
    #[arg(short, long)]
    account: Option<usize>,
}

impl FaucetArgs {
    pub(crate) async fn run(self, global: GlobalArgs) -> Result<()> {
        let bridge = Arc::new(global.connect()?);

        let accounts = match self.account {
            Some(index) => vec![bridge.ledger().account(AccountId(index))?],
            None => bridge.ledger().accounts(),
        };

        let mut jobs = Vec::new();
        for account in &accounts {
            for chain in self.chain.chains() {
                jobs.push(bridge.default_job(JobKind::FaucetClaim(*chain), account.id)?);
            }
        }

        let mut orchestrator = BatchOrchestrator::new(bridge, FailurePolicy::Continue);
        let report = orchestrator.run_jobs(jobs).await;
        print_cycle(&report, global.format)
    }
}
