use {
  crowdfund_primitives::{Address, FeeCurrency},
  std::time::Duration,
  url::Url,
};

/// Client-wide configuration shared by all drafts and submissions.
#[derive(Debug, Clone)]
pub struct Config {
  /// Name shown by the wallet app when asking the user to approve
  /// a signing request.
  pub dapp_name: String,

  /// URL the wallet opens to deliver its signing response. The platform
  /// layer routes it back to [`SigningMailbox::deliver_callback`].
  ///
  /// [`SigningMailbox::deliver_callback`]: crate::SigningMailbox::deliver_callback
  pub callback: Url,

  /// Address of the crowdfunding contract that receives
  /// `startProject` calls.
  pub contract: Address,

  /// Currency used to pay transaction fees.
  pub fee_currency: FeeCurrency,

  /// How long a submission waits for the wallet to respond before
  /// the attempt is abandoned.
  pub signing_timeout: Duration,

  /// How long a submission waits for a broadcast transaction to be
  /// included in a block.
  pub confirmation_timeout: Duration,

  /// Upper bound on a single image upload.
  pub upload_timeout: Duration,

  /// How often expired entries are swept from the signing mailbox.
  pub sweep_interval: Duration,

  /// Storage folder under which campaign images are uploaded.
  pub image_prefix: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      dapp_name: "Crowdfund".into(),
      callback: "crowdfund://signing/callback"
        .parse()
        .expect("static callback url"),
      contract: Address::default(),
      fee_currency: FeeCurrency::StableUsd,
      signing_timeout: Duration::from_secs(120),
      confirmation_timeout: Duration::from_secs(60),
      upload_timeout: Duration::from_secs(60),
      sweep_interval: Duration::from_secs(10),
      image_prefix: "fundraiserImages".into(),
    }
  }
}
