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

//! Immutable transaction records.
//!
//! Every balance-affecting operation produces one [`Transaction`] per wallet
//! leg: a deposit or withdrawal produces one, a transfer produces two (a
//! cash-out leg on the sender and a cash-in leg on the receiver). Records
//! are never updated or deleted once committed.

use crate::base::{AccountId, IdempotencyKey, TransactionId, WalletId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a balance-affecting leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Funds entering the wallet (deposit, or the receiving leg of a
    /// transfer).
    #[serde(rename = "cashin")]
    CashIn,
    /// Funds leaving the wallet (withdrawal, or the sending leg of a
    /// transfer).
    #[serde(rename = "cashout")]
    CashOut,
}

/// Immutable record of one balance-affecting leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    /// Positive, normalized amount; direction comes from `kind`.
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub notes: String,
    /// Wallet balance snapshot just before this leg was applied.
    pub balance_before: Decimal,
    /// Wallet balance snapshot just after this leg was applied.
    pub balance_after: Decimal,
    /// Account on the other side of a transfer leg; `None` for plain
    /// deposits and withdrawals.
    pub counterparty: Option<AccountId>,
    pub idempotency_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Checks the arithmetic invariant tying the two balance snapshots to
    /// the amount: `after == before + amount` for cash-in and
    /// `after == before - amount` for cash-out.
    pub fn is_balanced(&self) -> bool {
        match self.kind {
            TransactionKind::CashIn => self.balance_after == self.balance_before + self.amount,
            TransactionKind::CashOut => self.balance_after == self.balance_before - self.amount,
        }
    }
}
