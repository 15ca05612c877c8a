use alloy::primitives::{B256, hex};
use eyre::Result;
use serde_derive::{Deserialize, Serialize};
use ssz::Encode;

use super::{BLSPubkey, BLSSignature, DepositRecord, ForkVersion, Root};
use crate::networks;

/// Version string the launchpad checks deposit files against
pub const DEPOSIT_CLI_VERSION: &str = "2.7.0";

/// Version of the structured json layout
pub const DEPOSIT_DATA_VERSION: u64 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// One json object per line
    #[default]
    Json,
    /// Single json array in the staking launchpad (deposit-cli) layout
    Launchpad,
    /// One hex encoded SSZ DepositData per line
    Raw,
}

#[derive(Debug, Serialize)]
struct JsonDepositData<'a> {
    name: String,
    account: &'a str,
    pubkey: &'a BLSPubkey,
    withdrawal_credentials: &'a B256,
    signature: &'a BLSSignature,
    amount: u64,
    deposit_data_root: &'a Root,
    deposit_message_root: &'a Root,
    fork_version: &'a ForkVersion,
    version: u64,
}

impl<'a> From<&'a DepositRecord> for JsonDepositData<'a> {
    fn from(record: &'a DepositRecord) -> Self {
        Self {
            name: format!("Deposit for {}", record.account),
            account: &record.account,
            pubkey: &record.data.pubkey,
            withdrawal_credentials: &record.data.withdrawal_credentials,
            signature: &record.data.signature,
            amount: record.data.amount,
            deposit_data_root: &record.deposit_data_root,
            deposit_message_root: &record.deposit_message_root,
            fork_version: &record.fork_version,
            version: DEPOSIT_DATA_VERSION,
        }
    }
}

// Launchpad expects unprefixed hex
#[derive(Debug, Serialize)]
struct LaunchpadDepositData {
    pubkey: String,
    withdrawal_credentials: String,
    amount: u64,
    signature: String,
    deposit_message_root: String,
    deposit_data_root: String,
    fork_version: String,
    network_name: &'static str,
    deposit_cli_version: &'static str,
}

impl From<&DepositRecord> for LaunchpadDepositData {
    fn from(record: &DepositRecord) -> Self {
        Self {
            pubkey: hex::encode(record.data.pubkey),
            withdrawal_credentials: hex::encode(record.data.withdrawal_credentials),
            amount: record.data.amount,
            signature: hex::encode(record.data.signature),
            deposit_message_root: hex::encode(record.deposit_message_root),
            deposit_data_root: hex::encode(record.deposit_data_root),
            fork_version: hex::encode(record.fork_version),
            network_name: networks::name(&record.fork_version),
            deposit_cli_version: DEPOSIT_CLI_VERSION,
        }
    }
}

pub fn raw(record: &DepositRecord) -> String {
    hex::encode_prefixed(record.data.as_ssz_bytes())
}

/// Renders all records in the selected format. Json and raw emit one line
/// per record, launchpad wraps every record in a single array.
pub fn encode(records: &[DepositRecord], format: Format) -> Result<String> {
    let out = match format {
        Format::Json => records
            .iter()
            .map(|record| serde_json::to_string(&JsonDepositData::from(record)))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
        Format::Launchpad => serde_json::to_string(
            &records
                .iter()
                .map(LaunchpadDepositData::from)
                .collect::<Vec<_>>(),
        )?,
        Format::Raw => records.iter().map(raw).collect::<Vec<_>>().join("\n"),
    };
    Ok(out)
}
