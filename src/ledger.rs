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

//! Double-entry audit trail.
//!
//! Every committed [`Transaction`] gets exactly one [`LedgerEntry`], created
//! in the same atomic unit and never updated or deleted. Summing a wallet's
//! credits minus its debits reconstructs the wallet balance; that equality
//! is the audit invariant the whole engine hangs off.
//!
//! [`Transaction`]: crate::Transaction

use crate::base::{LedgerEntryId, TransactionId, WalletId};
use crate::transaction::TransactionKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Side of a double-entry ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
}

impl From<TransactionKind> for EntryType {
    /// Entry type is derived deterministically from the transaction kind.
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::CashIn => EntryType::Credit,
            TransactionKind::CashOut => EntryType::Debit,
        }
    }
}

/// Immutable double-entry audit row, tied 1:1 to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub wallet_id: WalletId,
    pub transaction_id: TransactionId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    /// Wallet balance after this entry was applied.
    pub balance: Decimal,
    pub narration: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed contribution of this entry to the wallet balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}

/// Append-only ledger book.
///
/// Combines a [`DashMap`] for O(1) lookup by entry or transaction id with a
/// per-wallet append-order index. Entries are only ever added, and only by
/// the store while it holds the affected wallet locks, so each wallet's
/// entry sequence is consistent with its balance history.
#[derive(Debug, Default)]
pub struct LedgerBook {
    /// Entries indexed by id.
    entries: DashMap<LedgerEntryId, Arc<LedgerEntry>>,
    /// Unique index enforcing the 1:1 transaction-to-entry relationship.
    by_transaction: DashMap<TransactionId, LedgerEntryId>,
    /// Per-wallet entry ids in append order.
    by_wallet: DashMap<WalletId, Vec<LedgerEntryId>>,
}

impl LedgerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Callers must hold the wallet lock for
    /// `entry.wallet_id` so the per-wallet order matches commit order.
    pub(crate) fn append(&self, entry: Arc<LedgerEntry>) {
        debug_assert!(
            !self.by_transaction.contains_key(&entry.transaction_id),
            "one ledger entry per transaction"
        );
        self.by_transaction.insert(entry.transaction_id, entry.id);
        self.by_wallet
            .entry(entry.wallet_id)
            .or_default()
            .push(entry.id);
        self.entries.insert(entry.id, entry);
    }

    pub fn get(&self, id: &LedgerEntryId) -> Option<Arc<LedgerEntry>> {
        self.entries.get(id).map(|entry| Arc::clone(&entry))
    }

    /// The entry recorded for a transaction, if any.
    pub fn for_transaction(&self, transaction_id: &TransactionId) -> Option<Arc<LedgerEntry>> {
        let id = *self.by_transaction.get(transaction_id)?;
        self.get(&id)
    }

    /// All entries for a wallet, oldest first.
    pub fn for_wallet(&self, wallet_id: &WalletId) -> Vec<Arc<LedgerEntry>> {
        let Some(ids) = self.by_wallet.get(wallet_id) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Reconstructs a wallet balance from its ledger history:
    /// `sum(credits) - sum(debits)`.
    pub fn posted_balance(&self, wallet_id: &WalletId) -> Decimal {
        self.for_wallet(wallet_id)
            .iter()
            .map(|entry| entry.signed_amount())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
