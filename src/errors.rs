use std::fmt;
use thiserror::Error;

/// Broad classes of deposit data failures, reported with every error.
///
/// Whether an error aborts the invocation depends on where it is raised, not
/// on its kind: anything returned while resolving the shared input stops
/// before a record is produced, anything raised for one account only drops
/// that account's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or ambiguous input, nothing has been produced yet
    Configuration,
    /// An account or public key could not be resolved
    Resolution,
    /// The chain configuration could not be fetched
    Network,
    /// Invalid key material or a bad signature
    Crypto,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Network => "network",
            ErrorKind::Crypto => "crypto",
        };
        f.write_str(kind)
    }
}

#[derive(Debug, Error)]
pub enum DepositError {
    #[error("validator account is required")]
    MissingValidatorAccount,

    #[error("unknown validator account {0:?}")]
    UnknownValidatorAccount(String),

    #[error("exactly one of withdrawal account or withdrawal public key is required")]
    AmbiguousOrMissingWithdrawalSpec,

    #[error("deposit value is required")]
    MissingDepositValue,

    #[error("deposit value {value:?} is invalid: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("deposit value must be at least 1 Ether (got {0} gwei)")]
    AmountBelowMinimum(u64),

    #[error("failed to decode fork version: {0}")]
    InvalidForkVersionEncoding(String),

    #[error("fork version must be exactly 4 bytes in length (got {0})")]
    InvalidForkVersionLength(usize),

    #[error(
        "failed to obtain chain configuration ({0}); supply a connection with --connection \
        or provide a fork version with --fork-version to generate deposit data"
    )]
    ChainConfigUnavailable(String),

    #[error("failed to obtain account {path:?}: {reason}")]
    AccountResolution { path: String, reason: String },

    #[error("account does not provide a public key")]
    NoPublicKeyCapability,

    #[error("failed to decode public key: {0}")]
    InvalidPublicKeyEncoding(String),

    #[error("public key must be exactly 48 bytes in length (got {0})")]
    InvalidPublicKeyLength(usize),

    #[error("public key is not valid: {0}")]
    InvalidPublicKeyPoint(String),

    #[error("failed to sign deposit message: {0}")]
    SigningFailed(String),

    #[error("deposit signature does not verify against the validator public key")]
    SignatureVerificationFailed,
}

impl DepositError {
    pub fn kind(&self) -> ErrorKind {
        use DepositError::*;
        match self {
            MissingValidatorAccount
            | UnknownValidatorAccount(_)
            | AmbiguousOrMissingWithdrawalSpec
            | MissingDepositValue
            | InvalidAmount { .. }
            | AmountBelowMinimum(_)
            | InvalidForkVersionEncoding(_)
            | InvalidForkVersionLength(_) => ErrorKind::Configuration,
            ChainConfigUnavailable(_) => ErrorKind::Network,
            AccountResolution { .. } | NoPublicKeyCapability => ErrorKind::Resolution,
            InvalidPublicKeyEncoding(_)
            | InvalidPublicKeyLength(_)
            | InvalidPublicKeyPoint(_)
            | SigningFailed(_)
            | SignatureVerificationFailed => ErrorKind::Crypto,
        }
    }
}

pub type Result<T, E = DepositError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(
            DepositError::AmbiguousOrMissingWithdrawalSpec.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            DepositError::ChainConfigUnavailable("timeout".into()).kind(),
            ErrorKind::Network
        );
        assert_eq!(DepositError::NoPublicKeyCapability.kind(), ErrorKind::Resolution);
        assert_eq!(DepositError::SignatureVerificationFailed.kind(), ErrorKind::Crypto);
        assert_eq!(
            DepositError::InvalidForkVersionLength(3).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(DepositError::SigningFailed("locked".into()).kind(), ErrorKind::Crypto);
        assert_eq!(ErrorKind::Resolution.to_string(), "resolution");
    }

    #[test]
    fn chain_config_guidance() {
        let msg = DepositError::ChainConfigUnavailable("no connection".into()).to_string();
        assert!(msg.contains("--connection"), "{msg}");
        assert!(msg.contains("--fork-version"), "{msg}");
    }
}
