use colored::*;
use eyre::bail;
use log::*;
use std::sync::Arc;

use alloy::primitives::B256;

use crate::{
    account::{self, Account, AccountResolver},
    chain::ChainConfig,
    config::DepositDataArgs,
    depositdata::{
        DepositMessage, DepositRecord, Domain, ForkVersion, Format, assembler,
        credentials::{self, WithdrawalSpec},
        domain, format,
        message::parse_amount,
        signer,
    },
    errors::{DepositError, Result},
    helpers,
};

/// Everything resolved once per invocation and shared by every account
pub struct DepositDataInput {
    pub format: Format,
    pub withdrawal_credentials: B256,
    pub amount: u64,
    pub fork_version: ForkVersion,
    pub domain: Domain,
    /// Sorted by name
    pub accounts: Vec<Arc<dyn Account>>,
    pub passphrases: Vec<String>,
}

pub async fn input<R, C>(
    args: &DepositDataArgs,
    resolver: &R,
    chain: Option<&C>,
) -> Result<DepositDataInput>
where
    R: AccountResolver + ?Sized,
    C: ChainConfig,
{
    let path = args
        .validator_account
        .as_deref()
        .filter(|path| !path.trim().is_empty())
        .ok_or(DepositError::MissingValidatorAccount)?;
    let mut accounts = resolver.accounts(path)?;
    if accounts.is_empty() {
        return Err(DepositError::UnknownValidatorAccount(path.to_string()));
    }
    accounts.sort_by(|a, b| a.name().cmp(b.name()));
    debug!("Validator accounts: {}", accounts.len().to_string().magenta());

    let format = args.format();

    let spec = WithdrawalSpec::from_args(
        args.withdrawal_account.as_deref(),
        args.withdrawal_pubkey.as_deref(),
    )?;
    let withdrawal_credentials = match spec {
        WithdrawalSpec::Account(path) => {
            credentials::from_account(resolver.account(path)?.as_ref())?
        }
        WithdrawalSpec::PublicKey(pubkey) => credentials::from_public_key(pubkey)?,
    };
    debug!("Withdrawal credentials: {}", withdrawal_credentials.to_string().blue());

    let amount = parse_amount(args.deposit_value.as_deref().unwrap_or_default())?;
    debug!("Deposit value: {}", helpers::format_gwei(amount).green());

    let fork_version = domain::resolve_fork_version(args.fork_version.as_deref(), chain).await?;
    let domain = domain::deposit_domain(fork_version);
    debug!(
        "Fork version: {}, domain: {}",
        fork_version.to_string().magenta(),
        domain.to_string().magenta()
    );

    Ok(DepositDataInput {
        format,
        withdrawal_credentials,
        amount,
        fork_version,
        domain,
        accounts,
        passphrases: args.passphrase.clone(),
    })
}

/// Builds and signs the deposit for one validator account. The account is
/// unlocked only for the duration of the signing call.
pub fn generate(account: &dyn Account, input: &DepositDataInput) -> Result<DepositRecord> {
    let pubkey = account::best_public_key(account)?;
    trace!("{}: {}", account.name().white().bold(), pubkey.to_string().blue());
    let message = DepositMessage::new(pubkey, input.withdrawal_credentials, input.amount);
    let signing_root = message.signing_root(input.domain);
    let signature = {
        let _guard = account::unlock(account, &input.passphrases)?;
        signer::sign(account, &pubkey, signing_root)?
    };
    assembler::assemble(
        account.name(),
        message,
        signature,
        input.domain,
        input.fork_version,
    )
}

#[derive(Debug, Default)]
pub struct Batch {
    pub records: Vec<DepositRecord>,
    /// Account name and the error that stopped its record
    pub failures: Vec<(String, DepositError)>,
}

pub fn generate_all(input: &DepositDataInput) -> Batch {
    let mut batch = Batch::default();
    for account in &input.accounts {
        match generate(account.as_ref(), input) {
            Ok(record) => {
                info!(
                    "Generated deposit data for {}: {}",
                    record.account.white().bold(),
                    record.deposit_data_root.to_string().green()
                );
                batch.records.push(record);
            }
            Err(e) => batch.failures.push((account.name().to_string(), e)),
        }
    }
    batch
}

/// `validator depositdata`: prints the deposit data of every matching account
/// to stdout, failing if any of them could not be generated
pub async fn deposit_data<R, C>(
    args: &DepositDataArgs,
    resolver: &R,
    chain: Option<&C>,
) -> eyre::Result<()>
where
    R: AccountResolver + ?Sized,
    C: ChainConfig,
{
    // Nothing has been signed yet, so any input error ends the invocation
    let input = input(args, resolver, chain).await.map_err(|e| {
        let kind = e.kind();
        eyre::Report::new(e).wrap_err(format!("{} error", kind))
    })?;
    let batch = generate_all(&input);
    for (name, e) in &batch.failures {
        error!("{}: {} error: {}", name.white().bold(), e.kind(), e);
    }

    let out = format::encode(&batch.records, input.format)?;
    if !out.is_empty() {
        println!("{}", out);
    }

    if !batch.failures.is_empty() {
        bail!(
            "failed to generate deposit data for {} of {} accounts",
            batch.failures.len(),
            input.accounts.len()
        );
    }
    Ok(())
}
