//! Typed contract calls and their wire encoding.

use alloy::{
    primitives::{Address, Bytes, TxKind, U256},
    sol,
    sol_types::SolCall,
};
use serde::Serialize;

use crate::{config::ChainConfig, error::BridgeError};

/// Gas used by a plain value transfer between EOAs.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

sol! {
    /// OP-stack L1 standard bridge
    interface IL1StandardBridge {
        function depositETHTo(address _to, uint32 _l2Gas, bytes calldata _data) external payable;

        function depositERC20To(
            address _l1Token,
            address _l2Token,
            address _to,
            uint256 _amount,
            uint32 _l2Gas,
            bytes calldata _data
        ) external;
    }

    /// OP-stack L2 standard bridge predeploy
    interface IL2StandardBridge {
        function withdraw(
            address _l2Token,
            uint256 _amount,
            uint32 _minGasLimit,
            bytes calldata _extraData
        ) external;
    }

    /// L2ToL1MessagePasser predeploy
    interface IL2ToL1MessagePasser {
        function initiateWithdrawal(address _target, uint256 _gasLimit, bytes calldata _data) external payable;
    }

    /// Test token with a permissionless faucet
    interface IERC20 {
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function claimFaucet() external;
    }
}

/// Tag of a [`Call`], carried by every attempt and report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    DepositEth,
    InitiateWithdrawal,
    DepositErc20,
    WithdrawErc20,
    Approve,
    ClaimFaucet,
    NativeTransfer,
    Deploy,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DepositEth => "depositETHTo",
            Self::InitiateWithdrawal => "initiateWithdrawal",
            Self::DepositErc20 => "depositERC20To",
            Self::WithdrawErc20 => "withdraw",
            Self::Approve => "approve",
            Self::ClaimFaucet => "claimFaucet",
            Self::NativeTransfer => "transfer(native)",
            Self::Deploy => "create",
        };
        f.write_str(name)
    }
}

/// Every state-changing call the tester can make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DepositEth { recipient: Address, amount: U256, l2_gas: u32 },
    InitiateWithdrawal { target: Address, amount: U256, gas_limit: U256 },
    DepositErc20 {
        l1_token: Address,
        l2_token: Address,
        recipient: Address,
        amount: U256,
        l2_gas: u32,
    },
    WithdrawErc20 { l2_token: Address, amount: U256, min_gas: u32 },
    Approve { token: Address, spender: Address, amount: U256 },
    ClaimFaucet { token: Address },
    NativeTransfer { recipient: Address, amount: U256 },
    /// CREATE with init code (bytecode followed by encoded constructor args).
    Deploy { init_code: Bytes },
}

/// A call resolved against a chain, ready for fee pricing and signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub kind: CallKind,
    pub to: TxKind,
    pub value: U256,
    pub input: Bytes,
    /// Fixed gas limit. Estimated when unset.
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    pub fn is_create(&self) -> bool {
        self.to.is_create()
    }
}

impl Call {
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::DepositEth { .. } => CallKind::DepositEth,
            Self::InitiateWithdrawal { .. } => CallKind::InitiateWithdrawal,
            Self::DepositErc20 { .. } => CallKind::DepositErc20,
            Self::WithdrawErc20 { .. } => CallKind::WithdrawErc20,
            Self::Approve { .. } => CallKind::Approve,
            Self::ClaimFaucet { .. } => CallKind::ClaimFaucet,
            Self::NativeTransfer { .. } => CallKind::NativeTransfer,
            Self::Deploy { .. } => CallKind::Deploy,
        }
    }

    /// Resolve the call against `chain`'s contract addresses.
    pub fn to_request(&self, chain: &ChainConfig) -> Result<TxRequest, BridgeError> {
        let kind = self.kind();
        let request = match self {
            Self::DepositEth { recipient, amount, l2_gas } => {
                let input = IL1StandardBridge::depositETHToCall {
                    _to: *recipient,
                    _l2Gas: *l2_gas,
                    _data: Bytes::new(),
                }
                .abi_encode();
                TxRequest {
                    kind,
                    to: TxKind::Call(chain.standard_bridge),
                    value: *amount,
                    input: input.into(),
                    gas_limit: None,
                }
            }
            Self::InitiateWithdrawal { target, amount, gas_limit } => {
                let passer = chain.message_passer.ok_or_else(|| BridgeError::Config {
                    field: "message_passer",
                    message: format!("{} has no message passer", chain.name),
                })?;
                let input = IL2ToL1MessagePasser::initiateWithdrawalCall {
                    _target: *target,
                    _gasLimit: *gas_limit,
                    _data: Bytes::new(),
                }
                .abi_encode();
                TxRequest {
                    kind,
                    to: TxKind::Call(passer),
                    value: *amount,
                    input: input.into(),
                    gas_limit: None,
                }
            }
            Self::DepositErc20 { l1_token, l2_token, recipient, amount, l2_gas } => {
                let input = IL1StandardBridge::depositERC20ToCall {
                    _l1Token: *l1_token,
                    _l2Token: *l2_token,
                    _to: *recipient,
                    _amount: *amount,
                    _l2Gas: *l2_gas,
                    _data: Bytes::new(),
                }
                .abi_encode();
                TxRequest {
                    kind,
                    to: TxKind::Call(chain.standard_bridge),
                    value: U256::ZERO,
                    input: input.into(),
                    gas_limit: None,
                }
            }
            Self::WithdrawErc20 { l2_token, amount, min_gas } => {
                let input = IL2StandardBridge::withdrawCall {
                    _l2Token: *l2_token,
                    _amount: *amount,
                    _minGasLimit: *min_gas,
                    _extraData: Bytes::new(),
                }
                .abi_encode();
                TxRequest {
                    kind,
                    to: TxKind::Call(chain.standard_bridge),
                    value: U256::ZERO,
                    input: input.into(),
                    gas_limit: None,
                }
            }
            Self::Approve { token, spender, amount } => {
                let input = IERC20::approveCall { spender: *spender, value: *amount }.abi_encode();
                token_call(kind, *token, input)
            }
            Self::ClaimFaucet { token } => token_call(kind, *token, IERC20::claimFaucetCall {}.abi_encode()),
            Self::NativeTransfer { recipient, amount } => TxRequest {
                kind,
                to: TxKind::Call(*recipient),
                value: *amount,
                input: Bytes::new(),
                gas_limit: Some(NATIVE_TRANSFER_GAS),
            },
            Self::Deploy { init_code } => TxRequest {
                kind,
                to: TxKind::Create,
                value: U256::ZERO,
                input: init_code.clone(),
                gas_limit: None,
            },
        };
        Ok(request)
    }
}

fn token_call(kind: CallKind, token: Address, input: Vec<u8>) -> TxRequest {
    TxRequest { kind, to: TxKind::Call(token), value: U256::ZERO, input: input.into(), gas_limit: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use alloy::primitives::address;

    const RECIPIENT: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");

    #[test]
    fn deposit_eth_targets_l1_bridge_with_value() {
        let l1 = ChainConfig::sepolia();
        let amount = U256::from(200_000_000_000_000u64);
        let request = Call::DepositEth { recipient: RECIPIENT, amount, l2_gas: 200_000 }
            .to_request(&l1)
            .unwrap();

        assert_eq!(request.to, TxKind::Call(l1.standard_bridge));
        assert_eq!(request.value, amount);
        assert_eq!(&request.input[..4], IL1StandardBridge::depositETHToCall::SELECTOR.as_slice());

        let decoded = IL1StandardBridge::depositETHToCall::abi_decode(&request.input).unwrap();
        assert_eq!(decoded._to, RECIPIENT);
        assert_eq!(decoded._l2Gas, 200_000);
        assert!(decoded._data.is_empty());
    }

    #[test]
    fn withdrawal_requires_message_passer() {
        let call = Call::InitiateWithdrawal {
            target: RECIPIENT,
            amount: U256::from(1u64),
            gas_limit: U256::ZERO,
        };
        assert!(matches!(
            call.to_request(&ChainConfig::sepolia()),
            Err(BridgeError::Config { field: "message_passer", .. })
        ));

        let l2 = ChainConfig::giwa_sepolia();
        let request = call.to_request(&l2).unwrap();
        assert_eq!(request.to, TxKind::Call(l2.message_passer.unwrap()));
        assert_eq!(request.value, U256::from(1u64));
    }

    #[test]
    fn erc20_withdraw_carries_no_value() {
        let l2 = ChainConfig::giwa_sepolia();
        let request = Call::WithdrawErc20 { l2_token: l2.token, amount: U256::from(10u64), min_gas: 0 }
            .to_request(&l2)
            .unwrap();

        assert_eq!(request.value, U256::ZERO);
        assert_eq!(request.to, TxKind::Call(l2.standard_bridge));
        let decoded = IL2StandardBridge::withdrawCall::abi_decode(&request.input).unwrap();
        assert_eq!(decoded._l2Token, l2.token);
        assert_eq!(decoded._amount, U256::from(10u64));
    }

    #[test]
    fn native_transfer_uses_fixed_gas() {
        let request = Call::NativeTransfer { recipient: RECIPIENT, amount: U256::from(5u64) }
            .to_request(&ChainConfig::giwa_sepolia())
            .unwrap();
        assert_eq!(request.gas_limit, Some(NATIVE_TRANSFER_GAS));
        assert!(request.input.is_empty());
    }

    #[test]
    fn deploy_is_create() {
        let request = Call::Deploy { init_code: Bytes::from_static(&[0x60, 0x00]) }
            .to_request(&ChainConfig::giwa_sepolia())
            .unwrap();
        assert!(request.is_create());
        assert_eq!(request.kind, CallKind::Deploy);
    }
}
