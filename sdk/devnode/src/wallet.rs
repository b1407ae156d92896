use {
  crowdfund_client_sdk::{Delivery, SigningMailbox},
  crowdfund_primitives::{
    Address,
    SigningOutcome,
    SigningRequest,
    SigningResponse,
    Transaction,
  },
  ed25519_dalek::Keypair,
  std::sync::Arc,
  tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle},
  tracing::{debug, info, warn},
  url::Url,
};

/// Stand-in for the external wallet app.
///
/// It receives the deep links the client opens, signs with a local
/// keypair (or declines) and answers by opening the callback URL, which
/// lands in the signing mailbox.
pub struct DevWallet {
  keypair: Keypair,
  decline: bool,
  mailbox: Arc<SigningMailbox>,
}

impl DevWallet {
  pub fn new(
    keypair: Keypair,
    decline: bool,
    mailbox: Arc<SigningMailbox>,
  ) -> Self {
    Self {
      keypair,
      decline,
      mailbox,
    }
  }

  pub fn account(&self) -> Address {
    self.keypair.public.into()
  }

  pub fn spawn(self, mut links: UnboundedReceiver<Url>) -> JoinHandle<()> {
    tokio::spawn(async move {
      while let Some(link) = links.recv().await {
        let callback = match self.respond(&link) {
          Ok(callback) => callback,
          Err(e) => {
            warn!("wallet ignoring signing link {link}: {e}");
            continue;
          }
        };

        match self.mailbox.deliver_callback(&callback) {
          Ok(Delivery::Delivered) => debug!("wallet response delivered"),
          Ok(Delivery::Discarded) => warn!("wallet response was discarded"),
          Err(e) => warn!("wallet produced a malformed callback: {e}"),
        }
      }
    })
  }

  fn respond(&self, link: &Url) -> anyhow::Result<Url> {
    let request = SigningRequest::from_deep_link(link)?;
    info!(
      "wallet asked by {} to sign {} transaction(s)",
      request.dapp_name,
      request.transactions.len()
    );

    let outcome = if self.decline {
      SigningOutcome::Declined("declined by devnode wallet".into())
    } else {
      SigningOutcome::Signed(
        request
          .transactions
          .iter()
          .map(|tx| {
            Ok(
              Transaction::from_bytes(&tx.tx)?
                .sign(&self.keypair)?
                .to_bytes()?,
            )
          })
          .collect::<anyhow::Result<_>>()?,
      )
    };

    Ok(
      SigningResponse {
        request_id: request.request_id,
        outcome,
      }
      .to_callback_url(&request.callback),
    )
  }
}
