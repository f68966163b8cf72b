use crate::cmd::{
    cycle::CycleArgs, deploy::DeployArgs, distribute::DistributeArgs, faucet::FaucetArgs,
    single::JobArgs, status::StatusArgs,
};
use bridge_tester::accounts::DEFAULT_KEY_FILE;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bridge-tester")]
#[command(version, about = "End-to-end L1 <-> L2 bridge testing", long_about = None)]
pub(crate) struct TesterCli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,

    #[command(subcommand)]
    pub(crate) cmd: TesterSubcommand,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub(crate) struct GlobalArgs {
    /// Key file, one private key per line. The first key is the source account.
    #[arg(short, long, global = true, default_value = DEFAULT_KEY_FILE)]
    pub(crate) keys: PathBuf,

    /// TOML config file (defaults to Sepolia / GIWA Sepolia)
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// L1 RPC URL (overrides config)
    #[arg(long, global = true, env = "L1_RPC")]
    pub(crate) l1_rpc: Option<String>,

    /// L2 RPC URL (overrides config)
    #[arg(long, global = true, env = "L2_RPC")]
    pub(crate) l2_rpc: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,

    /// Poll the destination chain for the credit after deposits
    #[arg(long, global = true)]
    pub(crate) watch_settlement: bool,

    /// solc binary used by the deployment set
    #[arg(long, global = true, default_value = "solc")]
    pub(crate) solc: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TesterSubcommand {
    /// Send L1 funds from the source to every target and bridge a share to L2
    Distribute(DistributeArgs),

    /// Claim test tokens from the faucet
    Faucet(FaucetArgs),

    /// Bridge the test ERC-20 from L1 to L2
    Erc20Deposit(JobArgs),

    /// Initiate an ETH withdrawal from L2 to L1
    WithdrawEth(JobArgs),

    /// Bridge the test ERC-20 from L2 back to L1
    Erc20Withdraw(JobArgs),

    /// Send ETH to yourself on L2
    SelfTransfer(JobArgs),

    /// Compile and deploy the test contract set on L2
    Deploy(DeployArgs),

    /// Run the randomized full flow over every account
    Cycle(CycleArgs),

    /// Deposit ETH from L1 to L2
    DepositEth(JobArgs),

    /// Show balances of every account on both chains
    Status(StatusArgs),
}
