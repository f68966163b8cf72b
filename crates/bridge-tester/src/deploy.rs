//! Diagnostic contract catalog and compilation.

use alloy::{
    hex,
    primitives::{Address, B256, Bytes, U256},
    sol_types::SolValue,
};
use async_trait::async_trait;
use serde::Serialize;
use std::{path::PathBuf, process::Stdio};
use tokio::io::AsyncWriteExt as _;
use tracing::debug;

use crate::error::BridgeError;

/// Constructor arguments of a template, resolved at deploy time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorArgs {
    None,
    /// `uint256 initialSupply`
    Supply(u64),
    /// `uint256 unlockTime`, seconds after deployment
    UnlockAfter(u64),
    /// `(address, address)`, both set to the deployer
    DeployerOwners,
}

#[derive(Debug, Clone, Copy)]
pub struct ContractTemplate {
    pub name: &'static str,
    pub source: &'static str,
    pub args: ConstructorArgs,
}

impl ContractTemplate {
    /// ABI-encoded constructor arguments for `deployer` at unix time `now`.
    pub fn constructor_args(&self, deployer: Address, now: u64) -> Vec<u8> {
        match self.args {
            ConstructorArgs::None => Vec::new(),
            ConstructorArgs::Supply(supply) => U256::from(supply).abi_encode(),
            ConstructorArgs::UnlockAfter(secs) => U256::from(now.saturating_add(secs)).abi_encode(),
            ConstructorArgs::DeployerOwners => (deployer, deployer).abi_encode_params(),
        }
    }

    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn init_code(&self, bytecode: &Bytes, deployer: Address, now: u64) -> Bytes {
        let mut code = bytecode.to_vec();
        code.extend(self.constructor_args(deployer, now));
        code.into()
    }
}

/// Templates deployed by the contract deployment set, in order.
pub const CATALOG: &[ContractTemplate] = &[
    ContractTemplate {
        name: "Minimal",
        source: r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;
contract Minimal {}
"#,
        args: ConstructorArgs::None,
    },
    ContractTemplate {
        name: "SimpleStorage",
        source: r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;
contract SimpleStorage {
    uint256 public value;
    function set(uint256 v) public { value = v; }
    function get() public view returns (uint256) { return value; }
}
"#,
        args: ConstructorArgs::None,
    },
    ContractTemplate {
        name: "ERC20Token",
        source: r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;
contract ERC20Token {
    string public name = "TestToken";
    string public symbol = "TTK";
    uint8 public decimals = 18;
    uint256 public totalSupply;
    mapping(address => uint256) public balanceOf;
    event Transfer(address indexed from, address indexed to, uint256 value);
    constructor(uint256 initialSupply) {
        totalSupply = initialSupply * 10 ** uint256(decimals);
        balanceOf[msg.sender] = totalSupply;
    }
    function transfer(address to, uint256 value) public returns (bool) {
        require(balanceOf[msg.sender] >= value, "No balance");
        balanceOf[msg.sender] -= value;
        balanceOf[to] += value;
        emit Transfer(msg.sender, to, value);
        return true;
    }
}
"#,
        args: ConstructorArgs::Supply(1000),
    },
    ContractTemplate {
        name: "SimpleNFT",
        source: r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;
contract SimpleNFT {
    string public name = "SimpleNFT";
    string public symbol = "SNFT";
    uint256 public nextId = 1;
    mapping(uint256 => address) public ownerOf;
    event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    function mint(address to) public {
        ownerOf[nextId] = to;
        emit Transfer(address(0), to, nextId);
        nextId++;
    }
}
"#,
        args: ConstructorArgs::None,
    },
    ContractTemplate {
        name: "Simple1155",
        source: r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;
contract Simple1155 {
    mapping(uint256 => mapping(address => uint256)) public balanceOf;
    event TransferSingle(address indexed from, address indexed to, uint256 id, uint256 value);
    function mint(address to, uint256 id, uint256 amount) public {
        balanceOf[id][to] += amount;
        emit TransferSingle(msg.sender, to, id, amount);
    }
}
"#,
        args: ConstructorArgs::None,
    },
    ContractTemplate {
        name: "TimeLock",
        source: r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;
contract TimeLock {
    uint256 public unlockTime;
    constructor(uint256 _unlockTime) payable {
        require(_unlockTime > block.timestamp, "Too soon");
        unlockTime = _unlockTime;
    }
    function withdraw(address payable to) public {
        require(block.timestamp >= unlockTime, "Locked");
        to.transfer(address(this).balance);
    }
}
"#,
        args: ConstructorArgs::UnlockAfter(3600),
    },
    ContractTemplate {
        name: "SimpleMultiSig",
        source: r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;
contract SimpleMultiSig {
    address[2] public owners;
    uint public required = 2;
    mapping(uint => mapping(address => bool)) public approvals;
    uint public txCount;
    struct Transaction { address to; uint value; bool executed; }
    mapping(uint => Transaction) public txs;

    constructor(address o1, address o2) {
        owners[0] = o1; owners[1] = o2;
    }

    function submitTx(address to, uint value) public {
        txs[txCount] = Transaction(to, value, false);
        txCount++;
    }

    function approve(uint txId) public {
        approvals[txId][msg.sender] = true;
    }

    function execute(uint txId) public {
        require(!txs[txId].executed, "done");
        require(approvals[txId][owners[0]] && approvals[txId][owners[1]], "not enough approvals");
        txs[txId].executed = true;
        payable(txs[txId].to).transfer(txs[txId].value);
    }
    receive() external payable {}
}
"#,
        args: ConstructorArgs::DeployerOwners,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledContract {
    pub name: String,
    pub abi: serde_json::Value,
    pub bytecode: Bytes,
}

/// Turns Solidity source into creation bytecode.
#[async_trait]
pub trait ContractCompiler: Send + Sync {
    /// Compile `source` and return the contract called `name`.
    ///
    /// Any failure is a [`BridgeError::ToolingFailure`].
    async fn compile(&self, name: &str, source: &str) -> Result<CompiledContract, BridgeError>;
}

/// Compiles with a local `solc` binary reading source from stdin.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    binary: PathBuf,
}

impl SolcCompiler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for SolcCompiler {
    fn default() -> Self {
        Self::new("solc")
    }
}

#[async_trait]
impl ContractCompiler for SolcCompiler {
    async fn compile(&self, name: &str, source: &str) -> Result<CompiledContract, BridgeError> {
        let tooling = |what: &str, err: &dyn std::fmt::Display| {
            BridgeError::ToolingFailure(format!("{what} {}: {err}", self.binary.display()))
        };

        let mut child = tokio::process::Command::new(&self.binary)
            .args(["--combined-json", "abi,bin", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| tooling("failed to run", &err))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await.map_err(|err| tooling("failed to feed", &err))?;
        }

        let output = child.wait_with_output().await.map_err(|err| tooling("failed to wait for", &err))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::ToolingFailure(format!("solc failed on {name}: {}", stderr.trim())));
        }

        debug!(contract = name, bytes = output.stdout.len(), "Compiled contract");
        parse_combined_json(&output.stdout, name)
    }
}

/// Extract `name` from `solc --combined-json abi,bin` output.
pub fn parse_combined_json(output: &[u8], name: &str) -> Result<CompiledContract, BridgeError> {
    let json: serde_json::Value = serde_json::from_slice(output)
        .map_err(|err| BridgeError::ToolingFailure(format!("unreadable solc output: {err}")))?;

    let contracts = json
        .get("contracts")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| BridgeError::ToolingFailure("solc output has no contracts".to_string()))?;

    let suffix = format!(":{name}");
    let (_, contract) = contracts
        .iter()
        .find(|(key, _)| key.ends_with(&suffix) || key.as_str() == name)
        .ok_or_else(|| BridgeError::ToolingFailure(format!("contract {name} missing from solc output")))?;

    let bin = contract
        .get("bin")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| BridgeError::ToolingFailure(format!("contract {name} has no bytecode")))?;
    let bytecode = hex::decode(bin)
        .map_err(|err| BridgeError::ToolingFailure(format!("invalid bytecode for {name}: {err}")))?;
    if bytecode.is_empty() {
        return Err(BridgeError::ToolingFailure(format!("contract {name} compiled to empty bytecode")));
    }

    // Older solc releases emit the ABI as an embedded JSON string.
    let abi = match contract.get("abi") {
        Some(serde_json::Value::String(raw)) => serde_json::from_str(raw).unwrap_or(serde_json::Value::Null),
        Some(abi) => abi.clone(),
        None => serde_json::Value::Null,
    };

    Ok(CompiledContract { name: name.to_string(), abi, bytecode: bytecode.into() })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum DeploymentStatus {
    Deployed { address: Option<Address>, tx_hash: B256 },
    Reverted { tx_hash: Option<B256> },
    Failed { reason: String },
}

/// Result of deploying one catalog template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRecord {
    pub template: &'static str,
    #[serde(flatten)]
    pub status: DeploymentStatus,
}

impl DeploymentRecord {
    pub const fn is_deployed(&self) -> bool {
        matches!(self.status, DeploymentStatus::Deployed { .. })
    }
}
