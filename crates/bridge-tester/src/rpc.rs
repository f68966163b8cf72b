//! JSON-RPC chain client backed by an alloy HTTP provider.

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{Address, B256, Bytes, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionInput, TransactionRequest},
    transports::http::reqwest::Url,
};
use async_trait::async_trait;
use eyre::WrapErr as _;
use tracing::debug;

use crate::chain::{CallRequest, ChainClient, GasSuggestion, ReceiptInfo};

/// Read and broadcast access to one chain over HTTP.
///
/// The provider carries no wallet: transactions are signed by the account ledger
/// and pushed with `eth_sendRawTransaction`.
#[derive(Clone)]
pub struct RpcChainClient {
    url: String,
    provider: DynProvider,
}

impl RpcChainClient {
    pub fn connect(url: &str) -> eyre::Result<Self> {
        let parsed: Url = url.parse().wrap_err_with(|| format!("invalid RPC url {url}"))?;
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(parsed)
            .erased();
        Ok(Self { url: url.to_string(), provider })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(request: &CallRequest) -> TransactionRequest {
        TransactionRequest {
            from: request.from,
            to: Some(request.to),
            value: Some(request.value),
            input: TransactionInput::new(request.input.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> eyre::Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn gas_suggestion(&self) -> eyre::Result<GasSuggestion> {
        let base_fee = match self.provider.get_fee_history(1, BlockNumberOrTag::Latest, &[]).await {
            Ok(history) => history.base_fee_per_gas.last().copied(),
            Err(err) => {
                debug!(url = %self.url, error = %err, "Fee history unavailable");
                None
            }
        };
        let priority_fee = self
            .provider
            .get_max_priority_fee_per_gas()
            .await
            .wrap_err("eth_maxPriorityFeePerGas failed")?;
        Ok(GasSuggestion { base_fee, priority_fee: Some(priority_fee) })
    }

    async fn balance(&self, account: Address) -> eyre::Result<U256> {
        Ok(self.provider.get_balance(account).await?)
    }

    async fn pending_nonce(&self, account: Address) -> eyre::Result<u64> {
        Ok(self.provider.get_transaction_count(account).pending().await?)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> eyre::Result<u64> {
        Ok(self.provider.estimate_gas(Self::request(request)).await?)
    }

    async fn call(&self, request: &CallRequest) -> eyre::Result<Bytes> {
        Ok(self.provider.call(Self::request(request)).await?)
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> eyre::Result<B256> {
        let pending = self.provider.send_raw_transaction(&encoded).await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: B256) -> eyre::Result<Option<ReceiptInfo>> {
        let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? else {
            return Ok(None);
        };
        Ok(Some(ReceiptInfo {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            contract_address: receipt.contract_address,
        }))
    }

    async fn transaction_known(&self, tx_hash: B256) -> eyre::Result<bool> {
        Ok(self.provider.get_transaction_by_hash(tx_hash).await?.is_some())
    }
}
