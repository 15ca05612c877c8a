use alloy::primitives::{B256, hex};
use colored::*;
use log::*;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use super::{Domain, ForkVersion};
use crate::{
    chain::ChainConfig,
    errors::{DepositError, Result},
};

pub type DomainType = [u8; 4];

pub const DOMAIN_DEPOSIT: DomainType = [0x03, 0x00, 0x00, 0x00];

// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#forkdata
#[derive(Debug, TreeHash)]
struct ForkData {
    current_version: ForkVersion,
    genesis_validators_root: B256,
}

pub fn compute_fork_data_root(current_version: ForkVersion, genesis_validators_root: B256) -> B256 {
    ForkData {
        current_version,
        genesis_validators_root,
    }
    .tree_hash_root()
}

// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#compute_domain
pub fn compute_domain(
    domain_type: DomainType,
    fork_version: ForkVersion,
    genesis_validators_root: B256,
) -> Domain {
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root);
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&domain_type);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    Domain::from(domain)
}

/// Deposits are valid across forks so the genesis validators root is never
/// folded in, only the (genesis) fork version
pub fn deposit_domain(fork_version: ForkVersion) -> Domain {
    compute_domain(DOMAIN_DEPOSIT, fork_version, B256::ZERO)
}

pub fn parse_fork_version(fork_version: &str) -> Result<ForkVersion> {
    let bytes = hex::decode(fork_version.trim())
        .map_err(|e| DepositError::InvalidForkVersionEncoding(e.to_string()))?;
    let bytes: [u8; 4] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| DepositError::InvalidForkVersionLength(bytes.len()))?;
    Ok(ForkVersion::from(bytes))
}

/// An explicit fork version always wins, otherwise the genesis fork version
/// is queried from the chain, the fork version is never guessed
pub async fn resolve_fork_version<C: ChainConfig>(
    explicit: Option<&str>,
    chain: Option<&C>,
) -> Result<ForkVersion> {
    if let Some(fork_version) = explicit.filter(|s| !s.trim().is_empty()) {
        return parse_fork_version(fork_version);
    }
    let chain = chain
        .ok_or_else(|| DepositError::ChainConfigUnavailable("no connection configured".into()))?;
    let fork_version = chain.genesis_fork_version().await?;
    debug!(
        "Genesis fork version from chain: {}",
        fork_version.to_string().magenta()
    );
    Ok(fork_version)
}
