use alloy_primitives::utils::format_ether;
use clap::Args;
use eyre::Result;

use crate::opts::{GlobalArgs, OutputFormat};

#[derive(Args, Debug)]
pub(crate) struct StatusArgs {}

impl StatusArgs {
    pub(crate) async fn run(self, global: GlobalArgs) -> Result<()> {
        let bridge = global.connect()?;

        let mut rows = Vec::new();
        for account in bridge.ledger().accounts() {
            rows.push(bridge.balances(account).await?);
        }

        if global.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        println!(
            "{:<4} {:<44} {:>22} {:>22} {:>22} {:>22}",
            "#", "ADDRESS", "L1 ETH", "L2 ETH", "L1 TOKEN", "L2 TOKEN"
        );
        for row in &rows {
            println!(
                "{:<4} {:<44} {:>22} {:>22} {:>22} {:>22}",
                row.account.id.to_string(),
                row.account.address.to_string(),
                format_ether(row.l1_native),
                format_ether(row.l2_native),
                format_ether(row.l1_token),
                format_ether(row.l2_token),
            );
        }
        Ok(())
    }
}
