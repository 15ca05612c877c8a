#[macro_use]
extern crate log;

use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Result, WrapErr};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

// lib.rs imports
use eth_deposit::{
    account::Wallets,
    chain::Client,
    config::{self, *},
    helpers,
    logger::Logger,
    validator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args with clap
    let args = Cli::parse();

    // Load config file & shellexpand datadir so we can use "~/...", etc
    let mut config = config::merge_args_from_file::<CliArgs>(args.config, args.config_path)?;
    let datadir = config
        .datadir
        .clone()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    config.datadir = Some(PathBuf::from(shellexpand::full(&datadir)?.to_string()));

    // Setup our global logger
    let logger = Logger::new(config.log_level.unwrap_or(3u8));
    logger.set_global()?;
    trace!("{:#?}", config);

    cmd_dispatch(&Cli::command(), &args.command, &config).await
}

async fn cmd_dispatch(app: &clap::Command, cmd: &CliCmd, config: &CliArgs) -> Result<()> {
    match cmd {
        CliCmd::Version {} => {
            let mut ver = app.render_version();
            ver.pop(); // remove "\n"
            println!("version: {}", ver);
        }
        CliCmd::Validator { command } => match command {
            CmdValidator::DepositData(args) => {
                let mut args = args.clone();
                if args.passphrase.is_empty() && std::io::stdin().is_terminal() {
                    args.passphrase
                        .push(helpers::read_password("Passphrase for validator account(s): ")?);
                }

                // One connection for the whole invocation, only if configured
                let client = match config.connection.as_deref().map(str::trim) {
                    Some(url) if !url.is_empty() => {
                        let timeout = Duration::from_secs(config.timeout.unwrap_or(10));
                        debug!("Connection: {} (timeout {:?})", url.green(), timeout);
                        Some(Client::new(url, timeout)?)
                    }
                    _ => None,
                };

                let wallets = Wallets::new(config.datadir.clone().unwrap_or_default());
                validator::deposit_data(&args, &wallets, client.as_ref())
                    .await
                    .wrap_err_with(|| "validator depositdata")?;
            }
        },
    }
    Ok(())
}
