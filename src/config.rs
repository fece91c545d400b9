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

//! Engine configuration: the currency allow-list and default currency.
//!
//! Configuration is passed explicitly into [`Engine::new`]; operation logic
//! never consults ambient global state.
//!
//! [`Engine::new`]: crate::Engine::new

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 4217 style three-letter currency code.
///
/// Parsing uppercases and validates the shape (three ASCII letters); whether
/// a code is actually usable is decided by the [`LedgerConfig`] allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidCurrency`] unless the input is exactly
    /// three ASCII letters.
    pub fn new(code: &str) -> Result<Self, LedgerError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Configuration value object consumed by the engine.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    allowed: Vec<CurrencyCode>,
    default_currency: CurrencyCode,
}

impl LedgerConfig {
    /// Builds a configuration from an allow-list. The first entry is the
    /// default currency used when a wallet is created without an explicit
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidCurrency`] if the allow-list is empty.
    pub fn new(allowed: Vec<CurrencyCode>) -> Result<Self, LedgerError> {
        let default_currency = allowed
            .first()
            .cloned()
            .ok_or_else(|| LedgerError::InvalidCurrency("empty allow-list".to_string()))?;
        Ok(Self {
            allowed,
            default_currency,
        })
    }

    pub fn default_currency(&self) -> &CurrencyCode {
        &self.default_currency
    }

    pub fn is_allowed(&self, currency: &CurrencyCode) -> bool {
        self.allowed.contains(currency)
    }

    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidCurrency`] if the currency is not in
    /// the allow-list.
    pub fn ensure_allowed(&self, currency: &CurrencyCode) -> Result<(), LedgerError> {
        if self.is_allowed(currency) {
            Ok(())
        } else {
            Err(LedgerError::InvalidCurrency(currency.to_string()))
        }
    }
}

impl Default for LedgerConfig {
    /// USD-only allow-list, matching the schema default.
    fn default() -> Self {
        Self {
            allowed: vec![CurrencyCode("USD".to_string())],
            default_currency: CurrencyCode("USD".to_string()),
        }
    }
}
