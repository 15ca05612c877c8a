use tree_hash::TreeHash;

use super::{DepositData, DepositMessage, Domain, ForkVersion, Root, signer::VerifiedSignature};
use crate::errors::{DepositError, Result};

/// A finalized, signed deposit for one validator account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRecord {
    /// Fully qualified account name, e.g. "wallet/validator-1"
    pub account: String,
    pub data: DepositData,
    pub deposit_message_root: Root,
    pub deposit_data_root: Root,
    pub fork_version: ForkVersion,
}

/// Combines a message with its verified signature. The signature must have
/// been produced over this message's signing root for the same public key.
pub fn assemble(
    account: &str,
    message: DepositMessage,
    signature: VerifiedSignature,
    domain: Domain,
    fork_version: ForkVersion,
) -> Result<DepositRecord> {
    if signature.pubkey() != message.pubkey
        || signature.signing_root() != message.signing_root(domain)
    {
        return Err(DepositError::SignatureVerificationFailed);
    }
    let deposit_message_root = message.root();
    let data = DepositData {
        pubkey: message.pubkey,
        withdrawal_credentials: message.withdrawal_credentials,
        amount: message.amount,
        signature: signature.signature(),
    };
    let deposit_data_root = data.tree_hash_root();
    Ok(DepositRecord {
        account: account.to_string(),
        data,
        deposit_message_root,
        deposit_data_root,
        fork_version,
    })
}
