//! Deposit data construction and signing.
//!
//! <https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#depositmessage>
pub mod assembler;
pub mod credentials;
pub mod domain;
pub mod format;
pub mod message;
pub mod signer;

use alloy::primitives::{B256, FixedBytes};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

pub use assembler::DepositRecord;
pub use format::Format;

pub type BLSPubkey = FixedBytes<48>;
pub type BLSSignature = FixedBytes<96>;
pub type ForkVersion = FixedBytes<4>;
pub type Domain = B256;
pub type Root = B256;

// Hard-coded so deposit data can be generated without a beacon node connection
pub const MIN_DEPOSIT_AMOUNT: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, TreeHash)]
pub struct DepositMessage {
    /// Validator public key
    pub pubkey: BLSPubkey,
    /// Withdrawal credentials
    pub withdrawal_credentials: B256,
    /// Amount of ether deposited in gwei
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, TreeHash)]
pub struct DepositData {
    /// Validator public key
    pub pubkey: BLSPubkey,
    /// Withdrawal credentials
    pub withdrawal_credentials: B256,
    /// Amount of ether deposited in gwei
    pub amount: u64,
    /// Deposit signature
    pub signature: BLSSignature,
}

impl DepositData {
    pub fn as_deposit_message(&self) -> DepositMessage {
        DepositMessage {
            pubkey: self.pubkey,
            withdrawal_credentials: self.withdrawal_credentials,
            amount: self.amount,
        }
    }
}
