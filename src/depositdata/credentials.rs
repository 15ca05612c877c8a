use alloy::primitives::{B256, hex};
use colored::*;
use log::*;
use sha2::{Digest, Sha256};

use super::BLSPubkey;
use crate::{
    account::{self, Account},
    errors::{DepositError, Result},
};

// Hard-coded so deposit data can be generated without a beacon node connection
pub const BLS_WITHDRAWAL_PREFIX: u8 = 0x00;

/// Where the withdrawal credentials come from, exactly one must be given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalSpec<'a> {
    /// Wallet path of the withdrawal account
    Account(&'a str),
    /// Hex encoded BLS public key
    PublicKey(&'a str),
}

impl<'a> WithdrawalSpec<'a> {
    pub fn from_args(account: Option<&'a str>, pubkey: Option<&'a str>) -> Result<Self> {
        let non_empty = |s: Option<&'a str>| s.filter(|s| !s.trim().is_empty());
        match (non_empty(account), non_empty(pubkey)) {
            (Some(path), None) => Ok(WithdrawalSpec::Account(path)),
            (None, Some(pubkey)) => Ok(WithdrawalSpec::PublicKey(pubkey)),
            _ => Err(DepositError::AmbiguousOrMissingWithdrawalSpec),
        }
    }
}

/// `BLS_WITHDRAWAL_PREFIX || sha256(pubkey)[1:]`
pub fn bls_withdrawal_credentials(pubkey: &BLSPubkey) -> B256 {
    let mut credentials: [u8; 32] = Sha256::digest(pubkey.as_slice()).into();
    credentials[0] = BLS_WITHDRAWAL_PREFIX;
    B256::from(credentials)
}

pub fn from_account(account: &dyn Account) -> Result<B256> {
    let pubkey = account::best_public_key(account)?;
    debug!(
        "Withdrawal account {}: {}",
        account.name().white().bold(),
        hex::encode_prefixed(pubkey).blue()
    );
    Ok(bls_withdrawal_credentials(&pubkey))
}

pub fn from_public_key(pubkey: &str) -> Result<B256> {
    let pubkey = parse_public_key(pubkey)?;
    debug!("Withdrawal pubkey: {}", hex::encode_prefixed(pubkey).blue());
    Ok(bls_withdrawal_credentials(&pubkey))
}

/// Decodes a hex BLS public key (optional `0x`) and checks it is a valid
/// point in the G1 subgroup
pub fn parse_public_key(pubkey: &str) -> Result<BLSPubkey> {
    let bytes = hex::decode(pubkey.trim())
        .map_err(|e| DepositError::InvalidPublicKeyEncoding(e.to_string()))?;
    let bytes: [u8; 48] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| DepositError::InvalidPublicKeyLength(bytes.len()))?;
    blst::min_pk::PublicKey::key_validate(&bytes)
        .map_err(|e| DepositError::InvalidPublicKeyPoint(format!("{:?}", e)))?;
    Ok(BLSPubkey::from(bytes))
}
