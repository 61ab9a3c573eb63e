//! Wallet list loading from CSV exports

use std::collections::HashSet;
use std::path::Path;

use ethers::signers::LocalWallet;
use ethers::types::Address;
use serde::Deserialize;
use tracing::debug;

use crate::shared::errors::AppError;
use crate::shared::types::Account;

#[derive(Debug, Deserialize)]
struct AccountRow {
    #[serde(default)]
    l1_private_key: String,
    l2_address: String,
    l2_private_key: String,
}

/// Load accounts from a CSV file with columns
/// `l1_private_key` (optional), `l2_address`, `l2_private_key`.
/// Both `,` and `;` delimiters are accepted.
pub fn load_accounts_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Account>, AppError> {
    let raw = std::fs::read_to_string(path.as_ref())
        .map_err(|e| AppError::Accounts(format!("read {}: {}", path.as_ref().display(), e)))?;
    parse_accounts_csv(&raw)
}

fn parse_accounts_csv(raw: &str) -> Result<Vec<Account>, AppError> {
    let delimiter = if raw.lines().next().unwrap_or_default().contains(';') {
        b';'
    } else {
        b','
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::Accounts(format!("bad CSV file: {}", e)))?;
    for required in ["l2_address", "l2_private_key"] {
        if !headers.iter().any(|h| h == required) {
            return Err(AppError::Accounts("bad CSV file format".to_string()));
        }
    }

    let mut accounts = Vec::new();
    let mut seen = HashSet::new();
    for (index, row) in reader.deserialize::<AccountRow>().enumerate() {
        let row = row.map_err(|e| AppError::Accounts(format!("row {}: {}", index + 2, e)))?;

        let address: Address = row
            .l2_address
            .parse()
            .map_err(|_| AppError::Accounts(format!("row {}: bad L2 address", index + 2)))?;
        if !seen.insert(address) {
            return Err(AppError::Accounts(format!(
                "row {}: duplicate account {}",
                index + 2,
                row.l2_address
            )));
        }
        let wallet: LocalWallet = row
            .l2_private_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|_| AppError::Accounts(format!("row {}: bad L2 private key", index + 2)))?;

        let l1_private_key = if row.l1_private_key.is_empty() {
            None
        } else {
            // validate eagerly so a bad key fails the load, not a bridge
            row.l1_private_key
                .trim_start_matches("0x")
                .parse::<LocalWallet>()
                .map_err(|_| AppError::Accounts(format!("row {}: bad L1 private key", index + 2)))?;
            Some(row.l1_private_key)
        };

        debug!("Loaded account: {}", row.l2_address);
        accounts.push(Account::new(address, wallet, l1_private_key));
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_B: &str = "0000000000000000000000000000000000000000000000000000000000000002";

    #[test]
    fn loads_comma_separated_rows() {
        let csv = format!(
            "l1_private_key,l2_address,l2_private_key\n\
             {},0x8ba1f109551bD432803012645Ac136ddd64DBA72,{}\n\
             ,0x3355df6D4c9C3035724Fd0e3914dE96A5a83aaf4,{}\n",
            KEY_A, KEY_A, KEY_B
        );
        let accounts = parse_accounts_csv(&csv).unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts[0].l1_private_key.is_some());
        assert!(accounts[1].l1_private_key.is_none());
    }

    #[test]
    fn loads_semicolon_separated_rows() {
        let csv = format!(
            "l1_private_key;l2_address;l2_private_key\n\
             ;0x8ba1f109551bD432803012645Ac136ddd64DBA72;{}\n",
            KEY_A
        );
        let accounts = parse_accounts_csv(&csv).unwrap();
        assert_eq!(accounts.len(), 1);
    }

    #[test]
    fn missing_columns_are_rejected() {
        let csv = "address,key\n0x1,0x2\n";
        assert!(matches!(
            parse_accounts_csv(csv),
            Err(AppError::Accounts(_))
        ));
    }

    #[test]
    fn bad_addresses_and_keys_are_rejected() {
        let csv = format!(
            "l1_private_key,l2_address,l2_private_key\n,not-an-address,{}\n",
            KEY_A
        );
        assert!(parse_accounts_csv(&csv).is_err());

        let csv = "l1_private_key,l2_address,l2_private_key\n\
                   ,0x8ba1f109551bD432803012645Ac136ddd64DBA72,short\n";
        assert!(parse_accounts_csv(csv).is_err());
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let csv = format!(
            "l1_private_key,l2_address,l2_private_key\n\
             ,0x8ba1f109551bD432803012645Ac136ddd64DBA72,{}\n\
             ,0x8ba1f109551bD432803012645Ac136ddd64DBA72,{}\n",
            KEY_A, KEY_B
        );
        assert!(parse_accounts_csv(&csv).is_err());
    }
}
