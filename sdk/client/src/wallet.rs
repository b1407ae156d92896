use {
  async_trait::async_trait,
  crowdfund_primitives::{SigningRequest, WireError},
  thiserror::Error,
  tokio::sync::mpsc::UnboundedSender,
  tracing::info,
  url::Url,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("Failed to encode signing request: {0}")]
  Encoding(#[from] WireError),

  #[error("Wallet app is unreachable: {0}")]
  Unreachable(String),
}

/// The boundary to an external wallet app that holds the user's keys.
///
/// Dispatching a request only hands it over. The wallet responds
/// out-of-band and the response is routed through the
/// [`SigningMailbox`](crate::SigningMailbox) by its request id.
#[async_trait]
pub trait Wallet: Send + Sync {
  async fn request_signature(&self, request: SigningRequest)
    -> Result<(), Error>;
}

/// Platform hook that launches a deep link, for example by asking the
/// operating system to open the wallet app.
pub trait LinkOpener: Send + Sync {
  fn open(&self, link: Url) -> Result<(), Error>;
}

impl LinkOpener for UnboundedSender<Url> {
  fn open(&self, link: Url) -> Result<(), Error> {
    self
      .send(link)
      .map_err(|_| Error::Unreachable("link receiver closed".into()))
  }
}

/// Wallet integration that encodes signing requests as deep links
/// rooted at the wallet's base URL.
pub struct DeepLinkWallet<O: LinkOpener> {
  base: Url,
  opener: O,
}

impl<O: LinkOpener> DeepLinkWallet<O> {
  pub fn new(base: Url, opener: O) -> Self {
    Self { base, opener }
  }
}

#[async_trait]
impl<O: LinkOpener> Wallet for DeepLinkWallet<O> {
  async fn request_signature(
    &self,
    request: SigningRequest,
  ) -> Result<(), Error> {
    let link = request.to_deep_link(&self.base)?;
    info!(
      "requesting signature {} for {} transaction(s) from wallet",
      request.request_id,
      request.transactions.len()
    );
    self.opener.open(link)
  }
}
