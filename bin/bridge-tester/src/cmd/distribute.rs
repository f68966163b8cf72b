use bridge_tester::{BatchOrchestrator, FailurePolicy};
use clap::Args;
use eyre::{Result, bail};
use std::sync::Arc;

use super::print_cycle;
use crate::opts::GlobalArgs;

#[derive(Args, Debug)]
pub(crate) struct DistributeArgs {
    /// Keep funding the remaining targets after a failure
    #[arg(long)]
    keep_going: bool,
}

impl DistributeArgs {
    pub(crate) async fn run(self, global: GlobalArgs) -> Result<()> {
        let bridge = Arc::new(global.connect()?);
        if bridge.ledger().len() < 2 {
            bail!("distribution needs a source key and at least one target key in {}", global.keys.display());
        }

        let policy = if self.keep_going { FailurePolicy::Continue } else { FailurePolicy::Abort };
        let mut orchestrator = BatchOrchestrator::new(bridge, policy);
        let report = orchestrator.distribute().await;
        print_cycle(&report, global.format)?;

        if report.aborted {
            bail!("distribution stopped after a failure");
        }
        Ok(())
    }
}
