use bridge_tester::{BatchOrchestrator, FailurePolicy};
use clap::Args;
use eyre::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::print_cycle;
use crate::opts::GlobalArgs;

#[derive(Args, Debug)]
pub(crate) struct CycleArgs {
    /// Repeat the cycle until interrupted, sleeping the configured interval in between
    #[arg(long)]
    unattended: bool,

    /// Stop a single cycle at the first failure
    #[arg(long, conflicts_with = "unattended")]
    abort_on_failure: bool,
}

impl CycleArgs {
    pub(crate) async fn run(self, global: GlobalArgs) -> Result<()> {
        let bridge = Arc::new(global.connect()?);
        let format = global.format;

        if !self.unattended {
            let policy =
                if self.abort_on_failure { FailurePolicy::Abort } else { FailurePolicy::Continue };
            let mut orchestrator = BatchOrchestrator::new(bridge, policy);
            let report = orchestrator.run_cycle().await;
            return print_cycle(&report, format);
        }

        let cancel = CancellationToken::new();
        let signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after the current cycle");
                signal.cancel();
            }
        });

        let mut orchestrator = BatchOrchestrator::new(bridge, FailurePolicy::Continue);
        let cycles = orchestrator
            .run_unattended(cancel, |report| {
                if let Err(err) = print_cycle(report, format) {
                    warn!(%err, "Failed to print cycle report");
                }
            })
            .await;
        info!(cycles, "Done");
        Ok(())
    }
}
