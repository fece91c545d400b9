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

//! Wallet entity: the mutable balance record for one account in one currency.

use crate::base::{AccountId, WalletId};
use crate::config::CurrencyCode;
use crate::money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Point-in-time copy of a wallet row.
///
/// The engine hands out snapshots; the backing store owns the live row. The
/// `version` counter is bumped by every applied mutation and guards the
/// conditional balance update: a snapshot whose version no longer matches
/// the stored row loses the write race and the caller must re-read.
///
/// # Invariants
///
/// - `balance` is never negative and always carries [`money::SCALE`]
///   fractional digits.
/// - `currency` is immutable after first persistence.
/// - No code path outside the store's version-guarded commit writes
///   `balance` or `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub id: WalletId,
    pub account_id: AccountId,
    pub currency: CurrencyCode,
    pub balance: Decimal,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Fresh wallet: zero balance, version zero.
    pub(crate) fn new(account_id: AccountId, currency: CurrencyCode) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::generate(),
            account_id,
            currency,
            balance: money::normalize(Decimal::ZERO),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Serialize for Wallet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Wallet", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("account", &self.account_id)?;
        state.serialize_field("currency", &self.currency)?;
        state.serialize_field("balance", &money::normalize(self.balance))?;
        state.serialize_field("version", &self.version)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD").unwrap()
    }

    #[test]
    fn new_wallet_starts_at_zero_version_zero() {
        let wallet = Wallet::new(AccountId::new("acct-1"), usd());
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.version, 0);
        assert_eq!(wallet.created_at, wallet.updated_at);
    }

    #[test]
    fn serializer_emits_balance_at_money_scale() {
        let mut wallet = Wallet::new(AccountId::new("acct-1"), usd());
        wallet.balance = dec!(123.45);

        let json = serde_json::to_string(&wallet).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["account"], "acct-1");
        assert_eq!(parsed["currency"], "USD");
        assert_eq!(parsed["balance"].as_str().unwrap(), "123.45000000");
        assert_eq!(parsed["version"], 0);
    }

    #[test]
    fn serializer_truncates_excess_digits() {
        let mut wallet = Wallet::new(AccountId::new("acct-2"), usd());
        wallet.balance = dec!(0.123456789);

        let json = serde_json::to_string(&wallet).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["balance"].as_str().unwrap(), "0.12345678");
    }
}
