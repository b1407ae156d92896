use {
  clap::{Parser, Subcommand},
  crowdfund_primitives::Amount,
  ed25519_dalek::{Keypair, PublicKey, SecretKey},
  humantime::Duration,
  std::path::{Path, PathBuf},
};

/// Crowdfund Local Devnode
///
/// Runs the crowdfunding client against a single node in-process ledger
/// and a development wallet, for local dev, CI and demo scenarios.
#[derive(Debug, Parser)]
pub struct SystemSettings {
  /// Directory where campaigns are persisted between runs.
  /// Campaigns are kept in memory only when omitted.
  #[clap(long, short, value_name = "PATH")]
  data_dir: Option<PathBuf>,

  /// Block production interval
  #[clap(long, short = 't',
    value_name = "DURATION",
    default_value = "1s")]
  block_time: Duration,

  /// How long to wait for the wallet to sign a transaction
  #[clap(long,
    value_name = "DURATION",
    default_value = "2m")]
  signing_timeout: Duration,

  /// Base58 encoded ed25519 secret key of the development wallet.
  /// A random key is generated when omitted.
  #[clap(long, value_name = "BASE58")]
  wallet_secret: Option<String>,

  /// Makes the development wallet decline every signing request
  #[clap(long)]
  decline: bool,

  #[clap(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Creates a new fundraiser through the full signing flow
  Create {
    /// Fundraiser title
    #[clap(long)]
    title: String,

    /// What the money is raised for
    #[clap(long)]
    description: String,

    /// Amount to raise, in whole or fractional tokens
    #[clap(long, value_name = "AMOUNT")]
    goal: Amount,

    /// Number of days the fundraiser stays open
    #[clap(long, value_name = "DAYS")]
    deadline_days: u32,

    /// Cover image uploaded with the fundraiser
    #[clap(long, value_name = "PATH")]
    image: PathBuf,
  },

  /// Prints all fundraisers, most recent first
  Feed,
}

impl SystemSettings {
  pub fn data_dir(&self) -> Option<&Path> {
    self.data_dir.as_deref()
  }

  pub fn block_time(&self) -> std::time::Duration {
    self.block_time.into()
  }

  pub fn signing_timeout(&self) -> std::time::Duration {
    self.signing_timeout.into()
  }

  pub fn decline(&self) -> bool {
    self.decline
  }

  pub fn command(&self) -> &Command {
    &self.command
  }

  pub fn wallet_keypair(&self) -> anyhow::Result<Keypair> {
    let secret = match &self.wallet_secret {
      Some(encoded) => SecretKey::from_bytes(&bs58::decode(encoded).into_vec()?)?,
      None => SecretKey::from_bytes(&rand::random::<[u8; 32]>())?,
    };
    let public = PublicKey::from(&secret);
    Ok(Keypair { secret, public })
  }
}
