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

//! Ledger engine: deposits, withdrawals, and transfers over versioned
//! wallets.
//!
//! The [`Engine`] is the only component allowed to mutate wallet balances,
//! and it does so exclusively through the store's version-guarded commit.
//! Each operation is a single-shot state transition `Wallet(v) ->
//! Wallet(v+1)`: the engine never auto-retries a lost race, it returns
//! [`LedgerError::ConcurrentUpdate`] so the caller can re-read the wallet
//! and decide its own retry policy.
//!
//! # Operations
//!
//! | Operation | Behavior |
//! |-----------|----------|
//! | `get_or_create_wallet` | Lazily creates the account's wallet |
//! | `deposit` | Credits funds, one transaction + one credit entry |
//! | `withdraw` | Debits funds (fails if insufficient), one debit entry |
//! | `transfer` | Atomically moves funds between two wallets, two legs |
//!
//! # Post-commit hooks
//!
//! After a successful commit, and only then, the engine dispatches one
//! event ([`WalletEvent`]) and refreshes the wallet cache, exactly once per
//! applied mutation. Idempotent replays return the original transaction
//! without firing hooks again.

use crate::base::{AccountId, IdempotencyKey, LedgerEntryId, TransactionId, WalletId};
use crate::config::{CurrencyCode, LedgerConfig};
use crate::error::LedgerError;
use crate::events::{EventSink, NullCache, NullSink, WalletCache, WalletEvent};
use crate::ledger::{EntryType, LedgerEntry};
use crate::money;
use crate::store::{CommitOutcome, WalletStore, WalletUpdate, WritePlan};
use crate::transaction::{Transaction, TransactionKind};
use crate::wallet::Wallet;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Central ledger engine managing wallets and their audit trail.
///
/// The engine is stateless apart from the backing store and holds no lock
/// across calls; concurrent callers coordinate solely through the store's
/// short-lived commit locks and the wallet version compare-and-swap.
pub struct Engine {
    store: WalletStore,
    config: LedgerConfig,
    events: Arc<dyn EventSink>,
    cache: Arc<dyn WalletCache>,
}

impl Engine {
    /// Engine with no-op post-commit hooks.
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_hooks(config, Arc::new(NullSink), Arc::new(NullCache))
    }

    /// Engine wired to an event sink and a wallet cache.
    pub fn with_hooks(
        config: LedgerConfig,
        events: Arc<dyn EventSink>,
        cache: Arc<dyn WalletCache>,
    ) -> Self {
        Self {
            store: WalletStore::new(),
            config,
            events,
            cache,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Looks up the wallet for an account, creating one with zero balance
    /// and the given (or default) currency if absent.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidCurrency`] - Currency not in the allow-list,
    ///   or the account's existing wallet carries a different currency
    ///   (wallet currency is immutable once created).
    pub fn get_or_create_wallet(
        &self,
        account_id: &AccountId,
        currency: Option<&CurrencyCode>,
    ) -> Result<Wallet, LedgerError> {
        if let Some(requested) = currency {
            self.config.ensure_allowed(requested)?;
        }
        let create_with = currency.unwrap_or_else(|| self.config.default_currency());
        let wallet = self.store.get_or_create(account_id, create_with)?;

        if let Some(requested) = currency {
            if wallet.currency != *requested {
                return Err(LedgerError::InvalidCurrency(format!(
                    "wallet currency cannot be changed once created (wallet is {}, requested {})",
                    wallet.currency, requested
                )));
            }
        }
        Ok(wallet)
    }

    /// Fresh snapshot of a wallet; the re-read entry point after a
    /// [`LedgerError::ConcurrentUpdate`].
    pub fn wallet(&self, id: &WalletId) -> Result<Wallet, LedgerError> {
        self.store.wallet(id)
    }

    pub fn wallet_for_account(&self, account_id: &AccountId) -> Result<Wallet, LedgerError> {
        self.store.wallet_for_account(account_id)
    }

    /// Snapshots of all wallets, ordered by account id.
    pub fn wallets(&self) -> Vec<Wallet> {
        self.store.wallets()
    }

    pub fn transaction(&self, id: &TransactionId) -> Result<Transaction, LedgerError> {
        self.store.transaction(id).map(|txn| (*txn).clone())
    }

    /// Transaction history of a wallet, oldest first.
    pub fn transactions_for_wallet(&self, wallet_id: &WalletId) -> Vec<Arc<Transaction>> {
        self.store.transactions_for_wallet(wallet_id)
    }

    /// Ledger entries of a wallet, oldest first.
    pub fn ledger_entries_for_wallet(&self, wallet_id: &WalletId) -> Vec<Arc<LedgerEntry>> {
        self.store.ledger().for_wallet(wallet_id)
    }

    /// Wallet balance reconstructed from the ledger alone:
    /// `sum(credits) - sum(debits)`. Always equal to the stored balance.
    pub fn posted_balance(&self, wallet_id: &WalletId) -> Decimal {
        self.store.ledger().posted_balance(wallet_id)
    }

    /// Credits `amount` to the wallet.
    ///
    /// The caller passes the snapshot it last read; the commit applies only
    /// if that snapshot's version still matches the stored row.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::CurrencyMismatch`] - `currency` differs from the
    ///   wallet currency.
    /// - [`LedgerError::InvalidCurrency`] - `currency` is not allow-listed.
    /// - [`LedgerError::InvalidAmount`] - Amount not strictly positive
    ///   after normalization.
    /// - [`LedgerError::ConcurrentUpdate`] - Another writer committed
    ///   first; re-read the wallet and retry.
    pub fn deposit(
        &self,
        wallet: &Wallet,
        amount: Decimal,
        notes: Option<&str>,
        idempotency_key: Option<&IdempotencyKey>,
        currency: Option<&CurrencyCode>,
    ) -> Result<Transaction, LedgerError> {
        self.ensure_operation_currency(wallet, currency)?;
        let amount = positive_amount(amount)?;

        let before = wallet.balance;
        let after = before + amount;
        let txn = self.build_transaction(
            wallet,
            amount,
            TransactionKind::CashIn,
            notes.unwrap_or("Deposit"),
            before,
            after,
            None,
            idempotency_key,
        );
        let entry = build_entry(&txn, "Wallet deposit (credit)");
        let plan = WritePlan {
            updates: vec![WalletUpdate {
                wallet_id: wallet.id,
                expected_version: wallet.version,
                new_balance: after,
            }],
            transactions: vec![txn],
            entries: vec![entry],
            idempotency_key: idempotency_key.cloned(),
        };

        match self.store.commit(plan)? {
            CommitOutcome::Applied(txns) => {
                let txn = single(txns)?;
                debug!(wallet = %wallet.id, txn = %txn.id, %amount, "deposit applied");
                self.after_commit(
                    &[wallet.id],
                    WalletEvent::WalletCredited {
                        wallet_id: wallet.id,
                        transaction_id: txn.id,
                    },
                );
                Ok(txn)
            }
            CommitOutcome::Replayed(txns) => {
                debug!(wallet = %wallet.id, "deposit replayed from idempotency key");
                single(txns)
            }
        }
    }

    /// Debits `amount` from the wallet.
    ///
    /// # Errors
    ///
    /// Everything [`Engine::deposit`] returns, plus
    /// [`LedgerError::InsufficientFunds`] when the balance is lower than
    /// the amount.
    pub fn withdraw(
        &self,
        wallet: &Wallet,
        amount: Decimal,
        notes: Option<&str>,
        idempotency_key: Option<&IdempotencyKey>,
        currency: Option<&CurrencyCode>,
    ) -> Result<Transaction, LedgerError> {
        self.ensure_operation_currency(wallet, currency)?;
        let amount = positive_amount(amount)?;

        let before = wallet.balance;
        if before < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let after = before - amount;
        let txn = self.build_transaction(
            wallet,
            amount,
            TransactionKind::CashOut,
            notes.unwrap_or("Withdrawal"),
            before,
            after,
            None,
            idempotency_key,
        );
        let entry = build_entry(&txn, "Wallet withdrawal (debit)");
        let plan = WritePlan {
            updates: vec![WalletUpdate {
                wallet_id: wallet.id,
                expected_version: wallet.version,
                new_balance: after,
            }],
            transactions: vec![txn],
            entries: vec![entry],
            idempotency_key: idempotency_key.cloned(),
        };

        match self.store.commit(plan)? {
            CommitOutcome::Applied(txns) => {
                let txn = single(txns)?;
                debug!(wallet = %wallet.id, txn = %txn.id, %amount, "withdrawal applied");
                self.after_commit(
                    &[wallet.id],
                    WalletEvent::WalletDebited {
                        wallet_id: wallet.id,
                        transaction_id: txn.id,
                    },
                );
                Ok(txn)
            }
            CommitOutcome::Replayed(txns) => {
                debug!(wallet = %wallet.id, "withdrawal replayed from idempotency key");
                single(txns)
            }
        }
    }

    /// Atomically moves `amount` from `sender` to `receiver`.
    ///
    /// Both version guards must pass or nothing is applied: a conflict on
    /// the receiver leaves the sender's balance and version untouched. The
    /// debit leg references the receiver's account as counterparty and vice
    /// versa.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::SelfTransfer`] - Sender and receiver are the same
    ///   wallet.
    /// - [`LedgerError::CurrencyMismatch`] - Wallet currencies differ.
    /// - [`LedgerError::InvalidCurrency`] - Either currency fell out of the
    ///   allow-list.
    /// - [`LedgerError::InvalidAmount`] / [`LedgerError::InsufficientFunds`] /
    ///   [`LedgerError::ConcurrentUpdate`] - As for the single-wallet
    ///   operations.
    pub fn transfer(
        &self,
        sender: &Wallet,
        receiver: &Wallet,
        amount: Decimal,
        notes: Option<&str>,
        idempotency_key: Option<&IdempotencyKey>,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        if sender.id == receiver.id {
            return Err(LedgerError::SelfTransfer);
        }
        self.config.ensure_allowed(&sender.currency)?;
        self.config.ensure_allowed(&receiver.currency)?;
        if sender.currency != receiver.currency {
            return Err(LedgerError::CurrencyMismatch {
                wallet: sender.currency.to_string(),
                attempted: receiver.currency.to_string(),
            });
        }
        let amount = positive_amount(amount)?;
        if sender.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let sender_after = sender.balance - amount;
        let receiver_after = receiver.balance + amount;

        let sender_txn = self.build_transaction(
            sender,
            amount,
            TransactionKind::CashOut,
            notes.unwrap_or(&format!("Transfer to wallet {}", receiver.id)),
            sender.balance,
            sender_after,
            Some(receiver.account_id.clone()),
            idempotency_key,
        );
        let receiver_txn = self.build_transaction(
            receiver,
            amount,
            TransactionKind::CashIn,
            notes.unwrap_or(&format!("Transfer from wallet {}", sender.id)),
            receiver.balance,
            receiver_after,
            Some(sender.account_id.clone()),
            idempotency_key,
        );
        let sender_entry = build_entry(&sender_txn, "Transfer out");
        let receiver_entry = build_entry(&receiver_txn, "Transfer in");

        let plan = WritePlan {
            updates: vec![
                WalletUpdate {
                    wallet_id: sender.id,
                    expected_version: sender.version,
                    new_balance: sender_after,
                },
                WalletUpdate {
                    wallet_id: receiver.id,
                    expected_version: receiver.version,
                    new_balance: receiver_after,
                },
            ],
            transactions: vec![sender_txn, receiver_txn],
            entries: vec![sender_entry, receiver_entry],
            idempotency_key: idempotency_key.cloned(),
        };

        match self.store.commit(plan)? {
            CommitOutcome::Applied(txns) => {
                let (sender_txn, receiver_txn) = pair(txns)?;
                debug!(
                    sender = %sender.id,
                    receiver = %receiver.id,
                    %amount,
                    "transfer applied"
                );
                self.after_commit(
                    &[sender.id, receiver.id],
                    WalletEvent::TransferSucceeded {
                        sender_wallet_id: sender.id,
                        receiver_wallet_id: receiver.id,
                        sender_transaction_id: sender_txn.id,
                        receiver_transaction_id: receiver_txn.id,
                    },
                );
                Ok((sender_txn, receiver_txn))
            }
            CommitOutcome::Replayed(txns) => {
                debug!(sender = %sender.id, "transfer replayed from idempotency key");
                pair(txns)
            }
        }
    }

    /// Resolves and validates the operation currency against the wallet.
    fn ensure_operation_currency(
        &self,
        wallet: &Wallet,
        requested: Option<&CurrencyCode>,
    ) -> Result<(), LedgerError> {
        let currency = requested.unwrap_or(&wallet.currency);
        self.config.ensure_allowed(currency)?;
        if *currency != wallet.currency {
            return Err(LedgerError::CurrencyMismatch {
                wallet: wallet.currency.to_string(),
                attempted: currency.to_string(),
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_transaction(
        &self,
        wallet: &Wallet,
        amount: Decimal,
        kind: TransactionKind,
        notes: &str,
        before: Decimal,
        after: Decimal,
        counterparty: Option<AccountId>,
        idempotency_key: Option<&IdempotencyKey>,
    ) -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            wallet_id: wallet.id,
            amount,
            kind,
            notes: notes.to_string(),
            balance_before: before,
            balance_after: after,
            counterparty,
            idempotency_key: idempotency_key.cloned(),
            created_at: Utc::now(),
        }
    }

    /// Post-commit hooks: one event dispatch and a forget-then-refresh per
    /// affected wallet. Runs only after the store confirmed the commit,
    /// never on rollback, never twice for one logical operation.
    fn after_commit(&self, wallets: &[WalletId], event: WalletEvent) {
        self.events.dispatch(event);
        for wallet_id in wallets {
            self.cache.forget(*wallet_id);
            if let Ok(fresh) = self.store.wallet(wallet_id) {
                self.cache.refresh(&fresh);
            }
        }
    }
}

/// Normalizes an amount and rejects anything not strictly positive.
fn positive_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    let amount = money::normalize(amount);
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(amount)
}

fn build_entry(txn: &Transaction, narration: &str) -> LedgerEntry {
    LedgerEntry {
        id: LedgerEntryId::generate(),
        wallet_id: txn.wallet_id,
        transaction_id: txn.id,
        entry_type: EntryType::from(txn.kind),
        amount: txn.amount,
        balance: txn.balance_after,
        narration: narration.to_string(),
        created_at: txn.created_at,
    }
}

fn single(txns: Vec<Arc<Transaction>>) -> Result<Transaction, LedgerError> {
    txns.into_iter()
        .next()
        .map(|txn| (*txn).clone())
        .ok_or(LedgerError::NotFound)
}

fn pair(txns: Vec<Arc<Transaction>>) -> Result<(Transaction, Transaction), LedgerError> {
    let mut iter = txns.into_iter();
    match (iter.next(), iter.next()) {
        (Some(first), Some(second)) => Ok(((*first).clone(), (*second).clone())),
        // A key recorded by a single-leg operation cannot replay a transfer.
        _ => Err(LedgerError::NotFound),
    }
}
