//! Signing keys, nonce allocation and observed balances.

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    network::TxSignerSync,
    primitives::U256,
    signers::local::PrivateKeySigner,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::{
    accounts::{Account, AccountId, Role},
    chain::{ChainEndpoint, ChainKind},
    error::BridgeError,
};

/// Exclusive right to use one nonce on one chain.
///
/// Not `Clone`: every slot is handed back exactly once through
/// [`AccountLedger::confirm`] or [`AccountLedger::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a nonce slot must be confirmed or released"]
pub struct NonceSlot {
    account: AccountId,
    chain: ChainKind,
    value: u64,
}

impl NonceSlot {
    pub const fn account(&self) -> AccountId {
        self.account
    }

    pub const fn chain(&self) -> ChainKind {
        self.chain
    }

    pub const fn value(&self) -> u64 {
        self.value
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct NonceState {
    /// Lowest nonce not yet consumed by a confirmed or reverted transaction.
    next: u64,
    outstanding: bool,
}

struct Entry {
    account: Account,
    signer: PrivateKeySigner,
}

/// Owns every test key. Callers only ever see [`Account`] views.
pub struct AccountLedger {
    entries: Vec<Entry>,
    nonces: Mutex<HashMap<(AccountId, ChainKind), NonceState>>,
    balances: Mutex<HashMap<(AccountId, ChainKind), U256>>,
}

impl std::fmt::Debug for AccountLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountLedger").field("accounts", &self.accounts()).finish_non_exhaustive()
    }
}

impl AccountLedger {
    /// The first signer becomes the source account.
    pub fn new(signers: Vec<PrivateKeySigner>) -> Result<Self, BridgeError> {
        if signers.is_empty() {
            return Err(BridgeError::KeyFile("ledger needs at least one key".to_string()));
        }

        let entries = signers
            .into_iter()
            .enumerate()
            .map(|(index, signer)| Entry {
                account: Account {
                    id: AccountId(index),
                    address: signer.address(),
                    role: if index == 0 { Role::Source } else { Role::Target },
                },
                signer,
            })
            .collect();

        Ok(Self { entries, nonces: Mutex::default(), balances: Mutex::default() })
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.entries.iter().map(|entry| entry.account).collect()
    }

    pub fn source(&self) -> Account {
        self.entries[0].account
    }

    /// Targets in key file order.
    pub fn targets(&self) -> impl Iterator<Item = Account> + '_ {
        self.entries.iter().skip(1).map(|entry| entry.account)
    }

    pub fn account(&self, id: AccountId) -> Result<Account, BridgeError> {
        self.entry(id).map(|entry| entry.account)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocate the next nonce for `account` on `endpoint`'s chain.
    ///
    /// The value is `max(pending tx count, locally tracked next)`. Fails with
    /// [`BridgeError::NonceInFlight`] while another slot for the same pair is
    /// outstanding.
    pub async fn next_nonce(
        &self,
        account: AccountId,
        endpoint: &ChainEndpoint,
    ) -> Result<NonceSlot, BridgeError> {
        let address = self.entry(account)?.account.address;
        let chain = endpoint.kind();
        let key = (account, chain);

        {
            let mut nonces = self.nonces.lock();
            let state = nonces.entry(key).or_default();
            if state.outstanding {
                return Err(BridgeError::NonceInFlight { chain, account: address });
            }
            state.outstanding = true;
        }

        let pending = match endpoint.pending_nonce(address).await {
            Ok(pending) => pending,
            Err(err) => {
                self.nonces.lock().entry(key).or_default().outstanding = false;
                return Err(err);
            }
        };

        let mut nonces = self.nonces.lock();
        let state = nonces.entry(key).or_default();
        let value = pending.max(state.next);
        debug!(%chain, %account, pending, local = state.next, nonce = value, "Allocated nonce");

        Ok(NonceSlot { account, chain, value })
    }

    /// The slot's transaction was mined; its nonce is consumed.
    pub fn confirm(&self, slot: NonceSlot) {
        let mut nonces = self.nonces.lock();
        let state = nonces.entry((slot.account, slot.chain)).or_default();
        state.next = state.next.max(slot.value + 1);
        state.outstanding = false;
        trace!(chain = %slot.chain, account = %slot.account, next = state.next, "Confirmed nonce");
    }

    /// Nothing under the slot was mined; its nonce may be handed out again.
    pub fn release(&self, slot: NonceSlot) {
        let mut nonces = self.nonces.lock();
        let state = nonces.entry((slot.account, slot.chain)).or_default();
        state.next = slot.value;
        state.outstanding = false;
        debug!(chain = %slot.chain, account = %slot.account, nonce = slot.value, "Released nonce");
    }

    /// An attempt under the slot may still sit in the pool. Hands the pair back
    /// without pinning the nonce; the next allocation follows the chain's
    /// pending count, which covers the pooled attempt for as long as it lives.
    pub fn resync(&self, slot: NonceSlot) {
        let mut nonces = self.nonces.lock();
        let state = nonces.entry((slot.account, slot.chain)).or_default();
        state.outstanding = false;
        debug!(chain = %slot.chain, account = %slot.account, nonce = slot.value, "Nonce left to the pool");
    }

    /// Sign an EIP-1559 transaction with `account`'s key.
    pub fn sign(&self, account: AccountId, mut tx: TxEip1559) -> Result<TxEnvelope, BridgeError> {
        let entry = self.entry(account)?;
        let signature = entry
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|err| BridgeError::Signing(err.to_string()))?;
        Ok(tx.into_signed(signature).into())
    }

    pub fn record_balance(&self, account: AccountId, chain: ChainKind, balance: U256) {
        self.balances.lock().insert((account, chain), balance);
    }

    /// Balance last observed through [`Self::record_balance`].
    pub fn last_balance(&self, account: AccountId, chain: ChainKind) -> Option<U256> {
        self.balances.lock().get(&(account, chain)).copied()
    }

    fn entry(&self, id: AccountId) -> Result<&Entry, BridgeError> {
        self.entries.get(id.0).ok_or(BridgeError::UnknownAccount(id.0))
    }
}
