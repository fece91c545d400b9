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

//! Fixed-scale decimal money arithmetic.
//!
//! Amounts and balances are [`Decimal`] values carrying exactly [`SCALE`]
//! fractional digits. All arithmetic is exact at that scale; binary floating
//! point never enters the picture. Normalization truncates excess digits
//! toward zero, so an amount is never silently rounded up.

use crate::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Number of fractional digits carried by every stored amount and balance.
pub const SCALE: u32 = 8;

/// Rescales an amount to exactly [`SCALE`] fractional digits.
///
/// Excess digits are truncated toward zero; shorter amounts are padded with
/// trailing zeros, so `30.00` normalizes to `30.00000000`.
pub fn normalize(amount: Decimal) -> Decimal {
    let mut normalized = amount.round_dp_with_strategy(SCALE, RoundingStrategy::ToZero);
    normalized.rescale(SCALE);
    normalized
}

/// Parses an integer, floating literal, or decimal string into a normalized
/// amount.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidAmount`] if the input is not a decimal
/// number. The sign is preserved; positivity is checked by the operation
/// consuming the amount.
pub fn parse(input: &str) -> Result<Decimal, LedgerError> {
    let parsed = Decimal::from_str(input.trim()).map_err(|_| LedgerError::InvalidAmount)?;
    Ok(normalize(parsed))
}
