//! Immutable tester configuration.
//!
//! Every constant the bridge flows depend on lives here: RPC endpoints, contract
//! addresses, fee policy, amounts and pacing. A [`TesterConfig`] is built once at
//! startup (defaults, then an optional TOML file, then CLI/env overrides) and is
//! shared read-only afterwards.

use alloy::primitives::{
    Address, U256, address,
    utils::{format_ether, parse_ether},
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::{chain::ChainKind, error::BridgeError};

/// One gwei in wei.
pub const GWEI: u128 = 1_000_000_000;

pub const DEFAULT_L1_RPC: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const DEFAULT_L2_RPC: &str = "https://sepolia-rpc.giwa.io";

/// Replacement transactions must pay at least 10% more to be accepted by geth-style pools.
const MIN_BUMP_PERCENT: u64 = 110;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    pub l1: ChainConfig,
    pub l2: ChainConfig,
    pub fees: FeePolicy,
    pub tx: TxPolicy,
    pub amounts: Amounts,
    pub gates: BalanceGates,
    pub pacing: Pacing,
    pub settlement: SettlementPolicy,
    pub cycle: CyclePolicy,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            l1: ChainConfig::sepolia(),
            l2: ChainConfig::giwa_sepolia(),
            fees: FeePolicy::default(),
            tx: TxPolicy::default(),
            amounts: Amounts::default(),
            gates: BalanceGates::default(),
            pacing: Pacing::default(),
            settlement: SettlementPolicy::default(),
            cycle: CyclePolicy::default(),
        }
    }
}

impl TesterConfig {
    /// Load a config from a TOML file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        use eyre::WrapErr as _;

        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the RPC endpoints where an override was given.
    pub fn with_rpc_overrides(mut self, l1_rpc: Option<String>, l2_rpc: Option<String>) -> Self {
        if let Some(url) = l1_rpc {
            self.l1.rpc_url = url;
        }
        if let Some(url) = l2_rpc {
            self.l2.rpc_url = url;
        }
        self
    }

    pub fn chain(&self, kind: ChainKind) -> &ChainConfig {
        match kind {
            ChainKind::L1 => &self.l1,
            ChainKind::L2 => &self.l2,
        }
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.fees.bump_percent < MIN_BUMP_PERCENT {
            return Err(BridgeError::Config {
                field: "fees.bump_percent",
                message: format!(
                    "{} is below the {MIN_BUMP_PERCENT}% replacement minimum",
                    self.fees.bump_percent
                ),
            });
        }
        if self.fees.max_attempts == 0 {
            return Err(BridgeError::Config {
                field: "fees.max_attempts",
                message: "at least one attempt is required".to_string(),
            });
        }
        if self.amounts.bridge_fraction_percent > 100 {
            return Err(BridgeError::Config {
                field: "amounts.bridge_fraction_percent",
                message: format!("{} exceeds 100", self.amounts.bridge_fraction_percent),
            });
        }
        if self.tx.poll_interval_secs == 0 || self.settlement.poll_interval_secs == 0 {
            return Err(BridgeError::Config {
                field: "poll_interval_secs",
                message: "poll intervals must be positive".to_string(),
            });
        }
        if self.tx.max_wait_windows == 0 {
            return Err(BridgeError::Config {
                field: "tx.max_wait_windows",
                message: "at least one receipt wait window is required".to_string(),
            });
        }
        for (field, range) in [
            ("pacing.task_pause", &self.pacing.task_pause),
            ("pacing.account_pause", &self.pacing.account_pause),
            ("pacing.claim_pause", &self.pacing.claim_pause),
        ] {
            if range.min_secs > range.max_secs {
                return Err(BridgeError::Config {
                    field,
                    message: format!("min {} exceeds max {}", range.min_secs, range.max_secs),
                });
            }
        }
        if self.l2.message_passer.is_none() {
            return Err(BridgeError::Config {
                field: "l2.message_passer",
                message: "L2 must define the message passer predeploy".to_string(),
            });
        }
        Ok(())
    }

    /// Config with no pauses and short timeouts, for tests.
    #[cfg(test)]
    pub(crate) fn fast() -> Self {
        let mut config = Self::default();
        config.pacing = Pacing::none();
        config.tx.receipt_timeout_secs = 10;
        config.tx.poll_interval_secs = 1;
        config.tx.l2_credit_wait_secs = 30;
        config.settlement.timeout_secs = 10;
        config.settlement.poll_interval_secs = 1;
        config.cycle.shuffle_seed = Some(7);
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub rpc_url: String,
    /// Fetched from the endpoint when unset.
    pub chain_id: Option<u64>,
    pub standard_bridge: Address,
    pub message_passer: Option<Address>,
    /// Test ERC-20 bridged by the token flows.
    pub token: Address,
    /// Whether `token` exposes a permissionless `claimFaucet()`.
    pub token_has_faucet: bool,
    /// Lowest tip ever offered, in wei.
    pub priority_fee_floor_wei: u128,
    /// `max_fee = base * multiplier / 100 + 2 * tip`.
    pub base_fee_multiplier_percent: u64,
}

impl ChainConfig {
    pub fn sepolia() -> Self {
        Self {
            name: "Ethereum Sepolia".to_string(),
            rpc_url: DEFAULT_L1_RPC.to_string(),
            chain_id: None,
            standard_bridge: address!("77b2ffc0f57598cae1db76cb398059cf5d10a7e7"),
            message_passer: None,
            token: address!("50b1ef6e0fe05a32f3e63f02f3c0151bd9004c7c"),
            token_has_faucet: true,
            priority_fee_floor_wei: 8 * GWEI,
            base_fee_multiplier_percent: 400,
        }
    }

    pub fn giwa_sepolia() -> Self {
        Self {
            name: "GIWA Sepolia".to_string(),
            rpc_url: DEFAULT_L2_RPC.to_string(),
            chain_id: None,
            standard_bridge: address!("4200000000000000000000000000000000000010"),
            message_passer: Some(address!("4200000000000000000000000000000000000016")),
            token: address!("b11e5c9070a57c0c33df102436c440a2c73a4c38"),
            token_has_faucet: true,
            priority_fee_floor_wei: 2 * GWEI,
            base_fee_multiplier_percent: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeePolicy {
    /// Escalation factor applied to both fee fields, in percent.
    pub bump_percent: u64,
    /// Ceiling on attempts (first submission included) for one logical transaction.
    pub max_attempts: u32,
    /// Base fee assumed when the endpoint cannot report one.
    pub fallback_base_fee_wei: u128,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { bump_percent: 125, max_attempts: 5, fallback_base_fee_wei: 2 * GWEI }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TxPolicy {
    pub receipt_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Receipt windows to sit through without a pricing rejection before giving up.
    pub max_wait_windows: u32,
    pub gas_buffer_percent: u64,
    pub transfer_gas_cap: u64,
    pub call_gas_cap: u64,
    pub create_gas_cap: u64,
    /// How long an L2 submission waits for a pending deposit to cover a short
    /// balance before failing. Zero fails immediately.
    pub l2_credit_wait_secs: u64,
}

impl TxPolicy {
    pub const fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn l2_credit_wait(&self) -> Duration {
        Duration::from_secs(self.l2_credit_wait_secs)
    }
}

impl Default for TxPolicy {
    fn default() -> Self {
        Self {
            receipt_timeout_secs: 240,
            poll_interval_secs: 2,
            max_wait_windows: 3,
            gas_buffer_percent: 115,
            transfer_gas_cap: 300_000,
            call_gas_cap: 700_000,
            create_gas_cap: 3_000_000,
            l2_credit_wait_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Amounts {
    /// Native amount the source sends to each target during distribution.
    #[serde(with = "ether")]
    pub per_target: U256,
    /// Share of `per_target` bridged to L2 for each target.
    pub bridge_fraction_percent: u64,
    #[serde(with = "ether")]
    pub deposit_eth: U256,
    #[serde(with = "ether")]
    pub withdraw_eth: U256,
    /// Token amount (18 decimals) moved by the ERC-20 flows.
    #[serde(with = "ether")]
    pub erc20: U256,
    #[serde(with = "ether")]
    pub self_transfer: U256,
    /// Smallest allowance granted to the L1 bridge when approving.
    #[serde(with = "ether")]
    pub min_approval: U256,
    pub approval_multiplier: u64,
    /// Gas forwarded to the L2 side of a deposit.
    pub l2_gas_limit: u32,
    /// Gas limit of the L1 leg of a withdrawal.
    pub withdraw_gas_limit: u32,
}

impl Amounts {
    /// Amount bridged to each target during distribution.
    pub fn bridge_share(&self) -> U256 {
        self.per_target * U256::from(self.bridge_fraction_percent) / U256::from(100)
    }
}

impl Default for Amounts {
    fn default() -> Self {
        Self {
            per_target: gwei(100_000_000),
            bridge_fraction_percent: 50,
            deposit_eth: gwei(200_000),
            withdraw_eth: gwei(100_000),
            erc20: gwei(10_000_000_000),
            self_transfer: gwei(50_000),
            min_approval: gwei(1_000_000_000_000_000),
            approval_multiplier: 10,
            l2_gas_limit: 200_000,
            withdraw_gas_limit: 0,
        }
    }
}

/// Native balances an account needs before the randomized flow touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceGates {
    #[serde(with = "ether")]
    pub min_l1: U256,
    #[serde(with = "ether")]
    pub min_l2: U256,
    #[serde(with = "ether")]
    pub min_l2_for_tasks: U256,
}

impl Default for BalanceGates {
    fn default() -> Self {
        Self { min_l1: gwei(10_000_000), min_l2: gwei(5_000_000), min_l2_for_tasks: gwei(1_000_000) }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PauseRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl PauseRange {
    pub const fn fixed(secs: u64) -> Self {
        Self { min_secs: secs, max_secs: secs }
    }

    pub const fn is_zero(&self) -> bool {
        self.max_secs == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub task_pause: PauseRange,
    pub account_pause: PauseRange,
    pub claim_pause: PauseRange,
}

impl Pacing {
    pub const fn none() -> Self {
        Self {
            task_pause: PauseRange::fixed(0),
            account_pause: PauseRange::fixed(0),
            claim_pause: PauseRange::fixed(0),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            task_pause: PauseRange { min_secs: 3, max_secs: 8 },
            account_pause: PauseRange { min_secs: 10, max_secs: 30 },
            claim_pause: PauseRange { min_secs: 5, max_secs: 15 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementPolicy {
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Smallest native credit counted as an observed deposit.
    #[serde(with = "ether")]
    pub min_native_delta: U256,
}

impl SettlementPolicy {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self { timeout_secs: 300, poll_interval_secs: 5, min_native_delta: gwei(150_000) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CyclePolicy {
    /// Sleep between unattended cycles.
    pub interval_secs: u64,
    /// Fixed seed for account and task shuffling. Entropy when unset.
    pub shuffle_seed: Option<u64>,
}

impl CyclePolicy {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self { interval_secs: 24 * 60 * 60, shuffle_seed: None }
    }
}

fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(GWEI)
}

/// (De)serializes wei amounts as decimal ether strings, e.g. `"0.1"`.
mod ether {
    use super::*;
    use serde::{Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_ether(*value))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_ether(raw.trim()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TesterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.amounts.bridge_share(), parse_ether("0.05").unwrap());
    }

    #[test]
    fn default_config_uses_giwa_for_l2() {
        let config = TesterConfig::default();
        assert_eq!(config.l2.name, "GIWA Sepolia");
        assert_eq!(config.l2.rpc_url, DEFAULT_L2_RPC);
        assert!(config.l2.message_passer.is_some());
        assert!(config.l1.message_passer.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let raw = r#"
            [fees]
            bump_percent = 150

            [amounts]
            per_target = "0.25"

            [l1]
            name = "Local L1"
            rpc_url = "http://localhost:8545"
            chain_id = 31337
            standard_bridge = "0x1111111111111111111111111111111111111111"
            token = "0x2222222222222222222222222222222222222222"
            token_has_faucet = false
            priority_fee_floor_wei = 1000000000
            base_fee_multiplier_percent = 200
        "#;
        let config: TesterConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.fees.bump_percent, 150);
        assert_eq!(config.fees.max_attempts, 5);
        assert_eq!(config.tx.l2_credit_wait(), Duration::from_secs(300));
        assert_eq!(config.amounts.per_target, parse_ether("0.25").unwrap());
        assert_eq!(config.amounts.bridge_share(), parse_ether("0.125").unwrap());
        assert_eq!(config.l1.chain_id, Some(31337));
        assert_eq!(config.l2.name, "GIWA Sepolia");
        config.validate().unwrap();
    }

    #[test]
    fn rejects_weak_bump() {
        let mut config = TesterConfig::default();
        config.fees.bump_percent = 105;
        assert!(matches!(
            config.validate(),
            Err(BridgeError::Config { field: "fees.bump_percent", .. })
        ));
    }

    #[test]
    fn rejects_zero_attempt_ceiling() {
        let mut config = TesterConfig::default();
        config.fees.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rpc_overrides_apply() {
        let config = TesterConfig::default()
            .with_rpc_overrides(Some("http://l1:8545".to_string()), None);
        assert_eq!(config.l1.rpc_url, "http://l1:8545");
        assert_eq!(config.l2.rpc_url, DEFAULT_L2_RPC);
    }
}
