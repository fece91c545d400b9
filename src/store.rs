// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! In-memory backing store with version-guarded conditional updates.
//!
//! The store plays the role of the relational backend: one "row" per wallet,
//! transaction, and ledger entry. A [`WritePlan`] is the unit of atomicity.
//! Committing a plan locks the affected wallet slots for the duration of the
//! commit, checks every version guard, and applies either all of the plan's
//! writes or none of them. Readers outside a commit see the pre- or
//! post-commit wallet, never a partial update.
//!
//! Every balance write is a compare-and-swap on the wallet version, the
//! in-memory analogue of `UPDATE wallets SET ... WHERE id = ? AND
//! version = ?` matching zero rows on conflict. Lost updates surface as
//! [`LedgerError::ConcurrentUpdate`]; the store never blocks a caller to
//! resolve a conflict.

use crate::base::{AccountId, IdempotencyKey, TransactionId, WalletId};
use crate::config::CurrencyCode;
use crate::error::LedgerError;
use crate::ledger::{LedgerBook, LedgerEntry};
use crate::transaction::Transaction;
use crate::wallet::Wallet;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A live wallet row plus the lock serializing commits against it.
#[derive(Debug)]
struct WalletSlot {
    inner: Mutex<Wallet>,
}

/// One version-guarded balance write inside a [`WritePlan`].
#[derive(Debug, Clone)]
pub(crate) struct WalletUpdate {
    pub wallet_id: WalletId,
    /// Version the caller's snapshot was read at; the write applies only if
    /// the stored row still carries it.
    pub expected_version: u64,
    pub new_balance: Decimal,
}

/// All rows written by one atomic unit.
///
/// `updates` must name distinct wallets (one for a deposit or withdrawal,
/// two for a transfer).
#[derive(Debug)]
pub(crate) struct WritePlan {
    pub updates: Vec<WalletUpdate>,
    pub transactions: Vec<Transaction>,
    pub entries: Vec<LedgerEntry>,
    pub idempotency_key: Option<IdempotencyKey>,
}

/// Outcome of committing a [`WritePlan`].
pub(crate) enum CommitOutcome {
    /// Every write applied; holds the committed transactions in plan order.
    Applied(Vec<Arc<Transaction>>),
    /// The idempotency key was already recorded; nothing was written and
    /// the originally committed transactions are returned instead.
    Replayed(Vec<Arc<Transaction>>),
}

/// Concurrent in-memory store for wallets, transactions, and ledger entries.
pub(crate) struct WalletStore {
    /// Wallet rows indexed by id.
    wallets: DashMap<WalletId, Arc<WalletSlot>>,
    /// Unique index: one wallet per account.
    by_account: DashMap<AccountId, WalletId>,
    /// Committed transactions indexed by id.
    transactions: DashMap<TransactionId, Arc<Transaction>>,
    /// Per-wallet transaction ids in commit order.
    transactions_by_wallet: DashMap<WalletId, Vec<TransactionId>>,
    /// Unique index on the idempotency key, mapping to the transactions the
    /// original request committed.
    by_idempotency: DashMap<IdempotencyKey, Vec<TransactionId>>,
    /// Double-entry audit trail.
    ledger: LedgerBook,
}

impl WalletStore {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
            by_account: DashMap::new(),
            transactions: DashMap::new(),
            transactions_by_wallet: DashMap::new(),
            by_idempotency: DashMap::new(),
            ledger: LedgerBook::new(),
        }
    }

    /// Looks up the wallet for an account, creating one (zero balance,
    /// version zero) if absent.
    ///
    /// The entry API makes the check-and-insert atomic, so two racing
    /// callers resolve to a single wallet; this is the unique constraint on
    /// `account_id`.
    pub fn get_or_create(
        &self,
        account_id: &AccountId,
        currency: &CurrencyCode,
    ) -> Result<Wallet, LedgerError> {
        let wallet_id = match self.by_account.entry(account_id.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let wallet = Wallet::new(account_id.clone(), currency.clone());
                let wallet_id = wallet.id;
                // The slot must exist before the account mapping becomes
                // visible to other threads.
                self.wallets.insert(
                    wallet_id,
                    Arc::new(WalletSlot {
                        inner: Mutex::new(wallet),
                    }),
                );
                entry.insert(wallet_id);
                wallet_id
            }
        };
        self.wallet(&wallet_id)
    }

    /// Point-in-time copy of a wallet row.
    pub fn wallet(&self, id: &WalletId) -> Result<Wallet, LedgerError> {
        let slot = self.wallets.get(id).ok_or(LedgerError::NotFound)?;
        let snapshot = slot.inner.lock().clone();
        Ok(snapshot)
    }

    pub fn wallet_for_account(&self, account_id: &AccountId) -> Result<Wallet, LedgerError> {
        let wallet_id = *self
            .by_account
            .get(account_id)
            .ok_or(LedgerError::NotFound)?;
        self.wallet(&wallet_id)
    }

    /// Snapshots of all wallets, ordered by account id.
    pub fn wallets(&self) -> Vec<Wallet> {
        let mut snapshots: Vec<Wallet> = self
            .wallets
            .iter()
            .map(|slot| slot.inner.lock().clone())
            .collect();
        snapshots.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        snapshots
    }

    pub fn transaction(&self, id: &TransactionId) -> Result<Arc<Transaction>, LedgerError> {
        self.transactions
            .get(id)
            .map(|txn| Arc::clone(&txn))
            .ok_or(LedgerError::NotFound)
    }

    /// Transactions committed against a wallet, oldest first.
    pub fn transactions_for_wallet(&self, wallet_id: &WalletId) -> Vec<Arc<Transaction>> {
        let Some(ids) = self.transactions_by_wallet.get(wallet_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.transactions.get(id).map(|txn| Arc::clone(&txn)))
            .collect()
    }

    pub fn ledger(&self) -> &LedgerBook {
        &self.ledger
    }

    /// Commits a plan as one atomic unit.
    ///
    /// Protocol:
    ///
    /// 1. Lock the affected wallet slots in ascending wallet-id order. The
    ///    fixed order makes two opposite-direction transfers between the
    ///    same pair contend on the same first lock instead of deadlocking.
    /// 2. Reserve the idempotency key via the key map's entry, held for the
    ///    rest of the commit; this is the unique constraint. An occupied
    ///    entry means the whole unit already committed once: return the
    ///    original rows and write nothing. A second commit carrying the
    ///    same key blocks on the entry until the first finishes, then
    ///    replays, even when the two touch disjoint wallets.
    /// 3. Check every version guard. Any mismatch aborts with
    ///    [`LedgerError::ConcurrentUpdate`] before a single write happens,
    ///    which is what makes rollback trivial: there is nothing to undo.
    ///    The dropped reservation leaves the key unrecorded, so a failed
    ///    commit stays retriable under the same key.
    /// 4. Apply the balance writes (version + 1), insert the transaction
    ///    and ledger rows, and fill the key reservation, all while still
    ///    holding the wallet locks.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if a referenced wallet does not exist,
    /// [`LedgerError::ConcurrentUpdate`] if any version guard fails.
    pub fn commit(&self, plan: WritePlan) -> Result<CommitOutcome, LedgerError> {
        let WritePlan {
            updates,
            transactions,
            entries,
            idempotency_key,
        } = plan;
        debug_assert!(
            updates
                .iter()
                .all(|u| updates.iter().filter(|v| v.wallet_id == u.wallet_id).count() == 1),
            "plan updates must name distinct wallets"
        );

        let mut slots: Vec<(WalletId, Arc<WalletSlot>)> = Vec::with_capacity(updates.len());
        for update in &updates {
            let slot = self
                .wallets
                .get(&update.wallet_id)
                .ok_or(LedgerError::NotFound)?;
            slots.push((update.wallet_id, Arc::clone(&slot)));
        }
        slots.sort_by_key(|(wallet_id, _)| *wallet_id);

        let mut guards: Vec<_> = slots
            .iter()
            .map(|(wallet_id, slot)| (*wallet_id, slot.inner.lock()))
            .collect();

        // Key reservation. Wallet locks are always taken before the key
        // entry, never the other way round, so the two lock levels cannot
        // form a cycle.
        let reservation = match idempotency_key {
            Some(key) => match self.by_idempotency.entry(key) {
                Entry::Occupied(recorded) => {
                    let existing = recorded
                        .get()
                        .iter()
                        .filter_map(|id| self.transactions.get(id).map(|txn| Arc::clone(&txn)))
                        .collect();
                    return Ok(CommitOutcome::Replayed(existing));
                }
                Entry::Vacant(vacant) => Some(vacant),
            },
            None => None,
        };

        for (wallet_id, guard) in &guards {
            for update in &updates {
                if update.wallet_id == *wallet_id && guard.version != update.expected_version {
                    return Err(LedgerError::ConcurrentUpdate);
                }
            }
        }

        // Every guard passed; apply while still holding all locks.
        let now = Utc::now();
        for (wallet_id, guard) in &mut guards {
            for update in &updates {
                if update.wallet_id == *wallet_id {
                    guard.balance = update.new_balance;
                    guard.version += 1;
                    guard.updated_at = now;
                }
            }
        }

        let mut applied = Vec::with_capacity(transactions.len());
        for txn in transactions {
            debug_assert!(txn.is_balanced(), "transaction legs must balance");
            let txn = Arc::new(txn);
            self.transactions_by_wallet
                .entry(txn.wallet_id)
                .or_default()
                .push(txn.id);
            self.transactions.insert(txn.id, Arc::clone(&txn));
            applied.push(txn);
        }
        for entry in entries {
            self.ledger.append(Arc::new(entry));
        }
        if let Some(vacant) = reservation {
            vacant.insert(applied.iter().map(|txn| txn.id).collect());
        }

        Ok(CommitOutcome::Applied(applied))
    }
}
