use colored::*;
use eyre::{Result, eyre};
use std::io::Write;

use alloy::primitives::utils::format_units;

/// Reads a passphrase with echo disabled, prompting on stderr
pub fn read_password(prompt: &str) -> Result<String> {
    use termion::input::TermRead;
    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{}", prompt.green())?;
    stderr.flush()?;
    let mut stdin = std::io::stdin().lock();
    let password = stdin.read_passwd(&mut stderr)?;
    writeln!(stderr)?;
    match password {
        Some(password) => Ok(password),
        None => Err(eyre!("Cancelled")),
    }
}

/// Renders a gwei amount as ether, e.g. "32.0 ETH"
pub fn format_gwei(amount: u64) -> String {
    match format_units(amount, 9u8) {
        Ok(eth) => {
            let eth = eth.trim_end_matches('0');
            match eth.strip_suffix('.') {
                Some(whole) => format!("{}.0 ETH", whole),
                None => format!("{} ETH", eth),
            }
        }
        Err(_) => format!("{} gwei", amount),
    }
}
