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

//! # Vpay Ledger
//!
//! This library provides a wallet ledger engine: per-account balances
//! mutated only through atomic, auditable operations (deposit, withdrawal,
//! transfer) that are safe under concurrent callers.
//!
//! ## Core Components
//!
//! - [`Engine`]: Orchestrates the operations over versioned wallets
//! - [`Wallet`]: Balance record with a monotonic version counter
//! - [`Transaction`]: Immutable record of one balance-affecting leg
//! - [`LedgerEntry`]: Double-entry audit row, 1:1 with a transaction
//! - [`LedgerError`]: Error taxonomy for operation failures
//!
//! ## Example
//!
//! ```
//! use vpay_ledger_rs::{AccountId, Engine, LedgerConfig};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new(LedgerConfig::default());
//! let wallet = engine
//!     .get_or_create_wallet(&AccountId::new("alice"), None)
//!     .unwrap();
//!
//! let txn = engine.deposit(&wallet, dec!(100.00), None, None, None).unwrap();
//! assert_eq!(txn.balance_after, dec!(100.00));
//!
//! let fresh = engine.wallet(&wallet.id).unwrap();
//! assert_eq!(fresh.balance, dec!(100.00));
//! assert_eq!(fresh.version, 1);
//! ```
//!
//! ## Concurrency
//!
//! The engine holds no long-lived locks. Every balance write is guarded by
//! a compare-and-swap on the wallet's version; a caller whose snapshot went
//! stale gets [`LedgerError::ConcurrentUpdate`], re-reads the wallet, and
//! retries under its own policy. Within a transfer both wallet updates
//! commit in one atomic unit, locked in a fixed canonical order so
//! opposite-direction transfers between the same pair cannot deadlock.

mod base;
pub mod config;
mod engine;
pub mod error;
mod events;
mod ledger;
pub mod money;
mod store;
mod transaction;
mod wallet;

pub use base::{AccountId, IdempotencyKey, LedgerEntryId, TransactionId, WalletId};
pub use config::{CurrencyCode, LedgerConfig};
pub use engine::Engine;
pub use error::LedgerError;
pub use events::{EventSink, NullCache, NullSink, QueueSink, WalletCache, WalletEvent};
pub use ledger::{EntryType, LedgerBook, LedgerEntry};
pub use transaction::{Transaction, TransactionKind};
pub use wallet::Wallet;
