use std::ffi::OsStr;
use std::path::PathBuf;
use std::{fs::File, io::BufReader};

use eyre::{Result, WrapErr, bail};
use serde_derive::Deserialize;

use clap_serde_derive::{
    ClapSerde,
    clap::{self, Parser, Subcommand},
};

use crate::depositdata::Format;

#[allow(deprecated)]
fn home_dir() -> PathBuf {
    std::env::home_dir().unwrap_or_default()
}

fn datadir() -> PathBuf {
    home_dir().join(".eth-deposit")
}

fn config_file() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
        .join("eth-deposit")
        .join("config.toml")
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file
    #[arg(short, long = "config", default_value = config_file().into_os_string())]
    pub config_path: Option<PathBuf>,

    /// Global arguments
    #[command(flatten)]
    pub config: <CliArgs as ClapSerde>::Opt,

    // Subcommands
    #[command(subcommand)]
    pub command: CliCmd,
}

// Make sure all values are optional or parsing fails if a value
// is missing in the config fill
#[derive(Debug, Clone, ClapSerde, Deserialize)]
pub struct CliArgs {
    /// Logging level (0: critical .. 5: trace)
    #[arg(short, long = "log-level", required = false, default_value = "3")]
    pub log_level: Option<u8>,

    /// Data directory, wallets are read from <datadir>/wallets
    #[arg(long = "datadir", default_value = datadir().into_os_string())]
    pub datadir: Option<PathBuf>,

    /// Beacon node REST URL
    #[arg(long = "connection", required = false)]
    pub connection: Option<String>,

    /// Beacon node request timeout in seconds
    #[arg(long = "timeout", required = false, default_value = "10")]
    pub timeout: Option<u64>,
}

// Command line cmds
#[derive(Subcommand)]
pub enum CliCmd {
    /// Print version information
    #[clap(visible_alias = "ver")]
    Version {},
    #[clap(visible_aliases = &["v"])]
    Validator {
        #[command(subcommand)]
        command: CmdValidator,
    },
}

#[derive(Subcommand)]
pub enum CmdValidator {
    /// Generate signed validator deposit data
    #[clap(name = "depositdata", visible_aliases = &["dd"])]
    DepositData(DepositDataArgs),
}

#[derive(Parser, Debug, Clone, Default)]
pub struct DepositDataArgs {
    /// Validator account(s), "wallet/pattern" where pattern is a regex
    #[arg(long = "validator-account", required = false)]
    pub validator_account: Option<String>,
    /// Withdrawal account, "wallet/account"
    #[arg(long = "withdrawal-account", required = false)]
    pub withdrawal_account: Option<String>,
    /// Withdrawal BLS public key (hex)
    #[arg(long = "withdrawal-pubkey", required = false)]
    pub withdrawal_pubkey: Option<String>,
    /// Deposit value, e.g. "32", "32 ether" or "32000000000 gwei"
    #[arg(long = "deposit-value", required = false)]
    pub deposit_value: Option<String>,
    /// Genesis fork version (hex), queried from the connection if omitted
    #[arg(long = "fork-version", required = false)]
    pub fork_version: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    pub format: Format,
    /// Shorthand for --format launchpad
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with_all = &["raw", "format"])]
    pub launchpad: bool,
    /// Shorthand for --format raw
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "format")]
    pub raw: bool,
    /// Account passphrase, may be repeated
    #[arg(long = "passphrase", required = false)]
    pub passphrase: Vec<String>,
}

impl DepositDataArgs {
    pub fn format(&self) -> Format {
        match (self.launchpad, self.raw) {
            (true, _) => Format::Launchpad,
            (_, true) => Format::Raw,
            _ => self.format,
        }
    }
}

pub fn merge_args_from_file<T>(
    args: <T as ClapSerde>::Opt,
    maybe_path: Option<PathBuf>,
) -> Result<T>
where
    T: ClapSerde + serde::de::DeserializeOwned,
{
    match maybe_path {
        Some(path) => {
            let config_path = std::path::Path::new(&path);
            match config_path.exists() {
                true => {
                    let config = match config_path.extension().and_then(OsStr::to_str) {
                        Some("toml") => read_toml_config::<T, _>(config_path),
                        Some("json") => read_json_config::<T, _>(config_path),
                        Some("jsonc") => read_jsonc_config::<T, _>(config_path),
                        _ => {
                            bail!("Unsupported config file type: {:?}", path);
                        }
                    }?;
                    // Fields which are not None in `other` will be cleared and used to
                    // update `self`. Fields which are None in `other` are left as is.
                    Ok(T::from(args).merge(config))
                }
                false => Ok(T::from(args)),
            }
        }
        None => Ok(T::from(args)),
    }
}

fn read_toml_config<T, P: AsRef<std::path::Path>>(path: P) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
    T: ClapSerde + serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path).wrap_err_with(|| format!("{:?}", path))?;
    Ok(toml::from_str(&content)?)
}

fn read_json_config<T: ClapSerde, P: AsRef<std::path::Path>>(
    path: P,
) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
{
    let f = File::open(path).wrap_err_with(|| format!("{:?}", path))?;
    let json_cfg = serde_json::from_reader::<_, <T as ClapSerde>::Opt>(BufReader::new(f))?;
    Ok(json_cfg)
}

fn read_jsonc_config<T: ClapSerde, P: AsRef<std::path::Path>>(
    path: P,
) -> Result<<T as ClapSerde>::Opt>
where
    P: AsRef<std::path::Path> + std::fmt::Debug + Copy,
{
    let f = File::open(path).wrap_err_with(|| format!("{:?}", path))?;
    let jsonc_cfg = serde_jsonc::from_reader::<_, <T as ClapSerde>::Opt>(BufReader::new(f))?;
    Ok(jsonc_cfg)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn deposit_args(argv: &[&str]) -> DepositDataArgs {
        let cli = Cli::try_parse_from(
            ["eth-deposit", "validator", "depositdata"]
                .iter()
                .chain(argv.iter()),
        )
        .unwrap();
        match cli.command {
            CliCmd::Validator {
                command: CmdValidator::DepositData(args),
            } => args,
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn depositdata_args() {
        let args = deposit_args(&[
            "--validator-account",
            "validators/.*",
            "--withdrawal-pubkey",
            "0xb89bebc6",
            "--deposit-value",
            "32 ether",
            "--passphrase",
            "one",
            "--passphrase",
            "two",
        ]);
        assert_eq!(args.validator_account.as_deref(), Some("validators/.*"));
        assert_eq!(args.withdrawal_pubkey.as_deref(), Some("0xb89bebc6"));
        assert_eq!(args.withdrawal_account, None);
        assert_eq!(args.deposit_value.as_deref(), Some("32 ether"));
        assert_eq!(args.passphrase, vec!["one", "two"]);
        assert_eq!(args.format(), Format::Json);
    }

    #[test]
    fn format_selection() {
        assert_eq!(deposit_args(&["--launchpad"]).format(), Format::Launchpad);
        assert_eq!(deposit_args(&["--raw"]).format(), Format::Raw);
        assert_eq!(deposit_args(&["--format", "raw"]).format(), Format::Raw);
        assert_eq!(deposit_args(&["--format", "launchpad"]).format(), Format::Launchpad);

        let conflicting = |argv: &[&str]| {
            Cli::try_parse_from(
                ["eth-deposit", "v", "dd"].iter().chain(argv.iter()),
            )
            .is_err()
        };
        assert!(conflicting(&["--launchpad", "--raw"]));
        assert!(conflicting(&["--raw", "--format", "json"]));
        assert!(conflicting(&["--format", "xml"]));
    }

    #[test]
    fn config_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_level = 5\nconnection = \"http://localhost:5052\"\n").unwrap();

        let cli = Cli::try_parse_from(["eth-deposit", "--timeout", "3", "version"]).unwrap();
        let config = merge_args_from_file::<CliArgs>(cli.config, Some(path)).unwrap();
        assert_eq!(config.log_level, Some(5));
        assert_eq!(config.connection.as_deref(), Some("http://localhost:5052"));
        assert_eq!(config.timeout, Some(3));
    }

    #[test]
    fn missing_and_unsupported_config() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from(["eth-deposit", "version"]).unwrap();
        let config =
            merge_args_from_file::<CliArgs>(cli.config, Some(dir.path().join("none.toml")))
                .unwrap();
        assert_eq!(config.log_level, Some(3));
        assert_eq!(config.timeout, Some(10));
        assert_eq!(config.connection, None);

        let yaml = dir.path().join("config.yaml");
        std::fs::write(&yaml, "log_level: 5\n").unwrap();
        let cli = Cli::try_parse_from(["eth-deposit", "version"]).unwrap();
        assert!(merge_args_from_file::<CliArgs>(cli.config, Some(yaml)).is_err());
    }
}
