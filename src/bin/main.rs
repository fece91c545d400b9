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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vpay_ledger_rs::{
    AccountId, CurrencyCode, Engine, IdempotencyKey, LedgerConfig, LedgerError, money,
};

/// Vpay Ledger - Replay wallet operations from a CSV file
///
/// Reads operations from a CSV file and outputs final wallet states to
/// stdout. Supports deposits, withdrawals, and transfers.
#[derive(Parser, Debug)]
#[command(name = "vpay-ledger-rs")]
#[command(about = "A wallet ledger engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,account,counterparty,amount,currency,key,notes
    /// Example: cargo run -- operations.csv > wallets.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Comma-separated currency allow-list; the first entry is the default
    #[arg(long, default_value = "USD")]
    currencies: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match parse_config(&args.currencies) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error in currency allow-list '{}': {}", args.currencies, e);
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match replay_operations(BufReader::new(file), config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_wallets(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn parse_config(currencies: &str) -> Result<LedgerConfig, LedgerError> {
    let allowed = currencies
        .split(',')
        .map(CurrencyCode::new)
        .collect::<Result<Vec<_>, _>>()?;
    LedgerConfig::new(allowed)
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, account, counterparty, amount, currency, key, notes`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    account: String,
    #[serde(default)]
    counterparty: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Applies one CSV record against the engine.
fn apply_record(engine: &Engine, record: CsvRecord) -> Result<(), LedgerError> {
    let account = AccountId::new(record.account);
    let currency = match record.currency.as_deref().filter(|c| !c.is_empty()) {
        Some(code) => Some(CurrencyCode::from_str(code)?),
        None => None,
    };
    let key = record
        .key
        .filter(|k| !k.is_empty())
        .map(IdempotencyKey::new);
    let notes = record.notes.as_deref().filter(|n| !n.is_empty());
    let amount = money::parse(record.amount.as_deref().unwrap_or_default())?;

    let wallet = engine.get_or_create_wallet(&account, currency.as_ref())?;

    match record.op.to_lowercase().as_str() {
        "deposit" => {
            engine.deposit(&wallet, amount, notes, key.as_ref(), currency.as_ref())?;
        }
        "withdraw" | "withdrawal" => {
            engine.withdraw(&wallet, amount, notes, key.as_ref(), currency.as_ref())?;
        }
        "transfer" => {
            let counterparty = record
                .counterparty
                .filter(|c| !c.is_empty())
                .map(AccountId::new)
                .ok_or(LedgerError::NotFound)?;
            // A receiver created on the fly inherits the sender's currency.
            let receiver = engine.get_or_create_wallet(&counterparty, Some(&wallet.currency))?;
            engine.transfer(&wallet, &receiver, amount, notes, key.as_ref())?;
        }
        other => {
            warn!(op = other, "skipping unknown operation");
        }
    }
    Ok(())
}

/// Replays operations from a CSV reader.
///
/// Streaming parse, so arbitrarily large files never load fully into
/// memory. Malformed rows and failed operations are logged and skipped;
/// replay never stops at a bad row.
///
/// # CSV Format
///
/// Expected columns: `op, account, counterparty, amount, currency, key, notes`
/// - `op`: Operation (deposit, withdraw, transfer)
/// - `account`: Opaque account identifier owning the wallet
/// - `counterparty`: Receiving account (transfers only)
/// - `amount`: Decimal amount
/// - `currency`: Optional three-letter code (defaults to the wallet's)
/// - `key`: Optional idempotency key
/// - `notes`: Optional free text
///
/// # Example
///
/// ```csv
/// op,account,counterparty,amount,currency,key,notes
/// deposit,alice,,100.00,USD,,
/// withdraw,alice,,30.00,,,
/// transfer,alice,bob,50.00,,tr-1,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader itself fails; individual operation
/// failures only skip their row.
pub fn replay_operations<R: Read>(reader: R, config: LedgerConfig) -> Result<Engine, csv::Error> {
    let engine = Engine::new(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                if let Err(e) = apply_record(&engine, record) {
                    warn!(error = %e, "skipping failed operation");
                }
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
                continue;
            }
        }
    }

    Ok(engine)
}

/// Writes final wallet states as CSV.
///
/// Columns: `id, account, currency, balance, version`, ordered by account
/// id for stable output.
pub fn write_wallets<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for wallet in engine.wallets() {
        wtr.serialize(&wallet)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn usd_config() -> LedgerConfig {
        LedgerConfig::default()
    }

    #[test]
    fn replay_simple_deposit() {
        let csv = "op,account,counterparty,amount,currency,key,notes\n\
                   deposit,alice,,100.00,,,\n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        let wallet = engine.wallet_for_account(&AccountId::new("alice")).unwrap();
        assert_eq!(wallet.balance, dec!(100.00));
        assert_eq!(wallet.version, 1);
    }

    #[test]
    fn replay_deposit_and_withdrawal() {
        let csv = "op,account,counterparty,amount,currency,key,notes\n\
                   deposit,alice,,100.00,,,\n\
                   withdraw,alice,,30.00,,,\n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        let wallet = engine.wallet_for_account(&AccountId::new("alice")).unwrap();
        assert_eq!(wallet.balance, dec!(70.00));
    }

    #[test]
    fn replay_transfer_creates_receiver() {
        let csv = "op,account,counterparty,amount,currency,key,notes\n\
                   deposit,alice,,100.00,,,\n\
                   transfer,alice,bob,50.00,,,\n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        let alice = engine.wallet_for_account(&AccountId::new("alice")).unwrap();
        let bob = engine.wallet_for_account(&AccountId::new("bob")).unwrap();
        assert_eq!(alice.balance, dec!(50.00));
        assert_eq!(bob.balance, dec!(50.00));
    }

    #[test]
    fn replay_repeated_key_applies_once() {
        let csv = "op,account,counterparty,amount,currency,key,notes\n\
                   deposit,alice,,10.00,,dup-1,\n\
                   deposit,alice,,10.00,,dup-1,\n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        let wallet = engine.wallet_for_account(&AccountId::new("alice")).unwrap();
        assert_eq!(wallet.balance, dec!(10.00));
        assert_eq!(wallet.version, 1);
    }

    #[test]
    fn replay_skips_failed_operations() {
        // Overdraft and unknown op must not stop the replay.
        let csv = "op,account,counterparty,amount,currency,key,notes\n\
                   withdraw,alice,,100.00,,,\n\
                   promote,alice,,1.00,,,\n\
                   deposit,alice,,25.00,,,\n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        let wallet = engine.wallet_for_account(&AccountId::new("alice")).unwrap();
        assert_eq!(wallet.balance, dec!(25.00));
    }

    #[test]
    fn replay_with_whitespace() {
        let csv = "op,account,counterparty,amount,currency,key,notes\n deposit , alice , , 100.00 , , , \n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        let wallet = engine.wallet_for_account(&AccountId::new("alice")).unwrap();
        assert_eq!(wallet.balance, dec!(100.00));
    }

    #[test]
    fn replay_truncates_amounts_past_money_scale() {
        let csv = "op,account,counterparty,amount,currency,key,notes\n\
                   deposit,alice,,0.123456789,,,\n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        // The ninth fractional digit is truncated, not rounded.
        let wallet = engine.wallet_for_account(&AccountId::new("alice")).unwrap();
        assert_eq!(wallet.balance, dec!(0.12345678));
        assert_eq!(wallet.balance.to_string(), "0.12345678");
    }

    #[test]
    fn write_wallets_to_csv() {
        let csv = "op,account,counterparty,amount,currency,key,notes\n\
                   deposit,bob,,200.25,,,\n\
                   deposit,alice,,100.50,,,\n";
        let engine = replay_operations(Cursor::new(csv), usd_config()).unwrap();

        let mut output = Vec::new();
        write_wallets(&engine, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains("id,account,currency,balance,version"));
        // Ordered by account id: alice before bob.
        let alice_pos = output_str.find("alice").unwrap();
        let bob_pos = output_str.find("bob").unwrap();
        assert!(alice_pos < bob_pos);
        assert!(output_str.contains("100.50000000"));
    }

    #[test]
    fn parse_config_splits_allow_list() {
        let config = parse_config("USD,EUR").unwrap();
        assert_eq!(config.default_currency().as_str(), "USD");
        assert!(config.is_allowed(&CurrencyCode::new("EUR").unwrap()));
        assert!(parse_config("").is_err());
    }
}
