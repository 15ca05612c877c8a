use alloy::primitives::{
    B256, U256,
    utils::{Unit, parse_units},
};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use super::{BLSPubkey, DepositMessage, Domain, MIN_DEPOSIT_AMOUNT, Root};
use crate::errors::{DepositError, Result};

// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#signingdata
#[derive(Debug, TreeHash)]
struct SigningData {
    object_root: Root,
    domain: Domain,
}

// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#compute_signing_root
pub fn compute_signing_root<T: TreeHash>(object: &T, domain: Domain) -> Root {
    SigningData {
        object_root: object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}

impl DepositMessage {
    pub fn new(pubkey: BLSPubkey, withdrawal_credentials: B256, amount: u64) -> Self {
        Self {
            pubkey,
            withdrawal_credentials,
            amount,
        }
    }

    pub fn root(&self) -> Root {
        self.tree_hash_root()
    }

    pub fn signing_root(&self, domain: Domain) -> Root {
        compute_signing_root(self, domain)
    }
}

/// Parses an ETH denominated value, e.g. "32", "1.5 ether", "32000000000gwei",
/// into gwei. The value must be a whole gwei amount of at least 1 Ether.
pub fn parse_amount(value: &str) -> Result<u64> {
    let invalid = |reason: String| DepositError::InvalidAmount {
        value: value.to_string(),
        reason,
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DepositError::MissingDepositValue);
    }
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let unit = match unit.trim().to_lowercase().as_str() {
        "" | "eth" | "ether" => "ether",
        "gwei" => "gwei",
        "wei" => "wei",
        other => return Err(invalid(format!("unknown unit {:?}", other))),
    };
    let number = number.trim();
    if number.starts_with('-') {
        return Err(invalid("must not be negative".into()));
    }
    let wei: U256 = parse_units(number, unit)
        .map_err(|e| invalid(e.to_string()))?
        .get_absolute();
    let gwei_unit = Unit::GWEI.wei();
    if wei % gwei_unit != U256::ZERO {
        return Err(invalid("must be a whole number of gwei".into()));
    }
    let gwei: u64 = (wei / gwei_unit)
        .try_into()
        .map_err(|_| invalid("too large".into()))?;
    if gwei < MIN_DEPOSIT_AMOUNT {
        return Err(DepositError::AmountBelowMinimum(gwei));
    }
    Ok(gwei)
}
