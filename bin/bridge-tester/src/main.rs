use clap::Parser;
use opts::{TesterCli, TesterSubcommand};

use bridge_tester::jobs::JobKind;

mod cmd;
mod opts;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = TesterCli::parse();
    let global = args.global;

    match args.cmd {
        TesterSubcommand::Distribute(cmd) => cmd.run(global).await,
        TesterSubcommand::Faucet(cmd) => cmd.run(global).await,
        TesterSubcommand::Erc20Deposit(cmd) => cmd.run(global, JobKind::Erc20BridgeL1ToL2).await,
        TesterSubcommand::WithdrawEth(cmd) => cmd.run(global, JobKind::EthWithdrawInitiate).await,
        TesterSubcommand::Erc20Withdraw(cmd) => cmd.run(global, JobKind::Erc20BridgeL2ToL1).await,
        TesterSubcommand::SelfTransfer(cmd) => cmd.run(global, JobKind::L2SelfTransfer).await,
        TesterSubcommand::Deploy(cmd) => cmd.run(global).await,
        TesterSubcommand::Cycle(cmd) => cmd.run(global).await,
        TesterSubcommand::DepositEth(cmd) => cmd.run(global, JobKind::EthDeposit).await,
        TesterSubcommand::Status(cmd) => cmd.run(global).await,
    }
}
