pub(crate) mod cycle;
pub(crate) mod deploy;
pub(crate) mod distribute;
pub(crate) mod faucet;
pub(crate) mod single;
pub(crate) mod status;

use alloy_primitives::{
    U256,
    utils::{format_ether, parse_ether},
};
use bridge_tester::{
    Bridge, ChainEndpoint, ChainKind, TesterConfig,
    accounts::load_key_file,
    deploy::SolcCompiler,
    jobs::{CycleReport, JobReport},
    ledger::AccountLedger,
    rpc::RpcChainClient,
};
use eyre::{Result, WrapErr as _};
use std::sync::Arc;
use tracing::info;

use crate::opts::{GlobalArgs, OutputFormat};

impl GlobalArgs {
    /// Defaults, then the config file, then RPC overrides from flags or env.
    pub(crate) fn load_config(&self) -> Result<TesterConfig> {
        let config = match &self.config {
            Some(path) => TesterConfig::load(path)?,
            None => TesterConfig::default(),
        }
        .with_rpc_overrides(self.l1_rpc.clone(), self.l2_rpc.clone());
        config.validate()?;
        Ok(config)
    }

    /// Load keys and connect to both chains.
    pub(crate) fn connect(&self) -> Result<Bridge> {
        let config = Arc::new(self.load_config()?);
        let signers = load_key_file(&self.keys)?;
        let ledger = Arc::new(AccountLedger::new(signers)?);

        let l1 = endpoint(ChainKind::L1, &config)?;
        let l2 = endpoint(ChainKind::L2, &config)?;
        info!(
            accounts = ledger.len(),
            source = %ledger.source().address,
            l1 = %config.l1.rpc_url,
            l2 = %config.l2.rpc_url,
            "Connected"
        );

        let compiler = Arc::new(SolcCompiler::new(&self.solc));
        Ok(Bridge::new(config, l1, l2, ledger, compiler).with_settlement_watch(self.watch_settlement))
    }
}

fn endpoint(kind: ChainKind, config: &TesterConfig) -> Result<ChainEndpoint> {
    let chain = config.chain(kind).clone();
    let client = RpcChainClient::connect(&chain.rpc_url)
        .wrap_err_with(|| format!("failed to connect to {} at {}", chain.name, chain.rpc_url))?;
    Ok(ChainEndpoint::new(kind, chain, Arc::new(client)))
}

pub(crate) fn parse_amount(raw: &str) -> Result<U256, String> {
    parse_ether(raw.trim()).map_err(|err| format!("invalid ether amount {raw:?}: {err}"))
}

pub(crate) fn print_cycle(report: &CycleReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let title = format!("Run {}", report.cycle);
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!();
    println!("  {:<28} {:<8} {:<20} TX", "JOB", "ACCOUNT", "OUTCOME");
    for job in &report.jobs {
        print_job_row(job);
    }
    println!();

    if !report.skipped_accounts.is_empty() {
        let skipped: Vec<_> = report.skipped_accounts.iter().map(ToString::to_string).collect();
        println!("Skipped accounts: {}", skipped.join(", "));
    }
    println!(
        "Succeeded: {}/{} ({:.1}%)",
        report.succeeded(),
        report.attempted(),
        report.success_rate()
    );
    if report.aborted {
        println!("Stopped early after a failure.");
    }
    Ok(())
}

fn print_job_row(job: &JobReport) {
    let tx = job.last_tx_hash().map(|hash| hash.to_string()).unwrap_or_else(|| "-".to_string());
    println!(
        "  {:<28} {:<8} {:<20} {tx}",
        job.job.kind.to_string(),
        job.job.account.to_string(),
        format!("{:?}", job.outcome),
    );
    if !job.job.amount.is_zero() {
        println!("      amount: {} to {}", format_ether(job.job.amount), job.job.recipient);
    }
    if let Some(error) = &job.error {
        println!("      error: {error}");
    }
    if let Some(settlement) = &job.settlement {
        println!("      settlement on {}: {:?}", settlement.chain, settlement.status);
    }
    if let Some(follow_up) = &job.follow_up {
        println!("      follow-up: {follow_up:?}");
    }
    for deployment in &job.deployments {
        println!("      {:<16} {:?}", deployment.template, deployment.status);
    }
    for note in &job.notes {
        println!("      note: {note}");
    }
}
