use bridge_tester::{accounts::AccountId, jobs::{CycleReport, JobKind}};
use clap::Args;
use eyre::{Result, bail};

use super::print_cycle;
use crate::opts::GlobalArgs;

#[derive(Args, Debug)]
pub(crate) struct DeployArgs {
    /// Account to deploy from (index in the key file)
    #[arg(short, long, default_value_t = 0)]
    account: usize,
}

impl DeployArgs {
    pub(crate) async fn run(self, global: GlobalArgs) -> Result<()> {
        let bridge = global.connect()?;
        let job = bridge.default_job(JobKind::ContractDeploySet, AccountId(self.account))?;

        let report = bridge.execute(job).await;
        let deployed = report.deployments.iter().filter(|record| record.is_deployed()).count();
        let total = report.deployments.len();
        let success = report.is_success();

        let cycle = CycleReport { cycle: 1, jobs: vec![report], ..Default::default() };
        print_cycle(&cycle, global.format)?;

        if !success {
            bail!("deployed {deployed} of {total} contracts");
        }
        Ok(())
    }
}
