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

//! Error types for ledger operations.

use thiserror::Error;

/// Ledger operation errors.
///
/// All failures are reported synchronously from the operation call; a failure
/// inside the atomic unit rolls back every write performed in that call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Currency is not in the configured allow-list, or a currency change
    /// was attempted on an existing wallet
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// Operation currency differs from the wallet currency, or sender and
    /// receiver currencies differ in a transfer
    #[error("currency mismatch: wallet is {wallet}, attempted {attempted}")]
    CurrencyMismatch { wallet: String, attempted: String },

    /// Amount is zero or negative after normalization
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Debit would exceed the wallet balance
    #[error("insufficient balance")]
    InsufficientFunds,

    /// Sender and receiver are the same wallet
    #[error("cannot transfer to the same wallet")]
    SelfTransfer,

    /// Optimistic version check lost the race to another writer
    #[error("concurrent wallet update detected, please retry")]
    ConcurrentUpdate,

    /// Referenced wallet or transaction does not exist
    #[error("not found")]
    NotFound,
}

impl LedgerError {
    /// True for failures a caller can resolve by re-reading the wallet and
    /// repeating the call unchanged.
    pub fn is_retriable(&self) -> bool {
        matches!(self, LedgerError::ConcurrentUpdate)
    }
}
