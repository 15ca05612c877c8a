use alloy::primitives::hex;
use blst::{
    BLST_ERROR,
    min_pk::{PublicKey, Signature},
};
use colored::*;
use log::*;

use super::{BLSPubkey, BLSSignature, Root};
use crate::{
    account::Account,
    errors::{DepositError, Result},
};

// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/beacon-chain.md#bls-signatures
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// A signature that has been checked against the public key and signing root
/// it was produced for. Only [`sign`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    signature: BLSSignature,
    pubkey: BLSPubkey,
    signing_root: Root,
}

impl VerifiedSignature {
    pub fn signature(&self) -> BLSSignature {
        self.signature
    }

    pub fn pubkey(&self) -> BLSPubkey {
        self.pubkey
    }

    pub fn signing_root(&self) -> Root {
        self.signing_root
    }
}

/// Signs `signing_root` with the account's signing capability and verifies
/// the result before returning it. The account must already be unlocked.
pub fn sign(
    account: &dyn Account,
    pubkey: &BLSPubkey,
    signing_root: Root,
) -> Result<VerifiedSignature> {
    let signer = account.as_signer().ok_or_else(|| {
        DepositError::SigningFailed(format!("account {} cannot sign", account.name()))
    })?;
    let signature = signer
        .sign(signing_root.as_slice())
        .map_err(|e| DepositError::SigningFailed(format!("{:#}", e)))?;
    trace!(
        "{} signed {}: {}",
        account.name().white().bold(),
        signing_root.to_string().blue(),
        hex::encode_prefixed(signature)
    );
    verify(pubkey, signing_root, &signature)?;
    Ok(VerifiedSignature {
        signature,
        pubkey: *pubkey,
        signing_root,
    })
}

pub fn verify(pubkey: &BLSPubkey, signing_root: Root, signature: &BLSSignature) -> Result<()> {
    let pk = PublicKey::from_bytes(pubkey.as_slice())
        .map_err(|e| DepositError::InvalidPublicKeyPoint(format!("{:?}", e)))?;
    let sig = Signature::from_bytes(signature.as_slice())
        .map_err(|_| DepositError::SignatureVerificationFailed)?;
    match sig.verify(true, signing_root.as_slice(), BLS_DST, &[], &pk, true) {
        BLST_ERROR::BLST_SUCCESS => Ok(()),
        err => {
            debug!("signature verification: {:?}", err);
            Err(DepositError::SignatureVerificationFailed)
        }
    }
}
